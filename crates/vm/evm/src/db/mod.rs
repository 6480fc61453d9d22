use crate::errors::DatabaseError;
use bytes::Bytes;
use ethereum_types::{Address, H256};

pub mod memory;

/// Opaque checkpoint handed out by [`StateDb::snapshot`].
pub type SnapshotId = usize;

/// The account state the dispatcher reads and mutates.
///
/// Implementations must make [`snapshot`](StateDb::snapshot) cheap (no deep
/// copy) and must guarantee that reverting to a snapshot discards every
/// mutation made after it, including mutations made under snapshots that
/// were opened later and never reverted themselves.
pub trait StateDb {
    fn exists(&self, address: Address) -> Result<bool, DatabaseError>;
    /// Whether the account self-destructed earlier in the current transaction.
    fn has_suicided(&self, address: Address) -> Result<bool, DatabaseError>;
    fn suicide(&mut self, address: Address) -> Result<bool, DatabaseError>;

    fn snapshot(&mut self) -> SnapshotId;
    fn revert_to_snapshot(&mut self, id: SnapshotId) -> Result<(), DatabaseError>;

    fn get_code(&self, address: Address) -> Result<Bytes, DatabaseError>;
    fn get_code_hash(&self, address: Address) -> Result<H256, DatabaseError>;
    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), DatabaseError>;

    /// Creates a contract account, tagging it with its creator and the
    /// execution name/alias metadata of the host ledger.
    fn create_account(
        &mut self,
        address: Address,
        creator: Address,
        exec_name: &str,
        alias: &str,
    ) -> Result<(), DatabaseError>;

    /// Native-precision balance.
    fn get_balance(&self, address: Address) -> Result<u64, DatabaseError>;
    fn add_balance(&mut self, address: Address, amount: u64) -> Result<(), DatabaseError>;
    fn sub_balance(&mut self, address: Address, amount: u64) -> Result<(), DatabaseError>;

    fn get_state(&self, address: Address, key: H256) -> Result<H256, DatabaseError>;
    fn set_state(&mut self, address: Address, key: H256, value: H256)
    -> Result<(), DatabaseError>;

    /// Whether the historical state-layout migration applies at `block_number`.
    fn is_state_migration_active(&self, block_number: u64) -> bool;
    /// Moves the account's contract data into the current storage layout.
    fn transfer_state_data(&mut self, address: Address) -> Result<(), DatabaseError>;
}
