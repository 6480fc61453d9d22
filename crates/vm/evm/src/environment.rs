use std::{fmt, sync::Arc};

use ethereum_types::{Address, H256, U256};

use crate::db::StateDb;

/// Checks whether `from` can afford to send `amount` native units.
pub type CanTransferFn = fn(&dyn StateDb, Address, u64) -> bool;

/// Moves `amount` native units from `from` to `to`.
pub type TransferFn = fn(&mut dyn StateDb, Address, Address, u64) -> bool;

/// Resolves the hash of the block at the given height (BLOCKHASH).
pub type GetHashFn = Arc<dyn Fn(u64) -> H256 + Send + Sync>;

/// Chain-level parameters and callbacks for one EVM instance.
///
/// Built once by the transaction executor and never mutated afterwards.
#[derive(Clone)]
pub struct Environment {
    pub can_transfer: CanTransferFn,
    pub transfer: TransferFn,
    pub get_hash: GetHashFn,
    /// The sender of the transaction (ORIGIN).
    pub origin: Address,
    pub gas_price: u32,
    /// Block producer, when the host ledger has one.
    pub coinbase: Option<Address>,
    pub gas_limit: u64,
    pub tx_hash: H256,
    pub block_number: u64,
    pub timestamp: u64,
    pub difficulty: U256,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            can_transfer,
            transfer,
            get_hash: Arc::new(|_| H256::zero()),
            origin: Address::zero(),
            gas_price: 0,
            coinbase: None,
            gas_limit: 0,
            tx_hash: H256::zero(),
            block_number: 0,
            timestamp: 0,
            difficulty: U256::zero(),
        }
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("origin", &self.origin)
            .field("gas_price", &self.gas_price)
            .field("coinbase", &self.coinbase)
            .field("gas_limit", &self.gas_limit)
            .field("tx_hash", &self.tx_hash)
            .field("block_number", &self.block_number)
            .field("timestamp", &self.timestamp)
            .field("difficulty", &self.difficulty)
            .finish_non_exhaustive()
    }
}

/// Default balance check: the sender must hold at least `amount`.
pub fn can_transfer(db: &dyn StateDb, from: Address, amount: u64) -> bool {
    db.get_balance(from)
        .map(|balance| balance >= amount)
        .unwrap_or(false)
}

/// Default value transfer. A zero amount leaves the state untouched, and
/// a transfer the recipient cannot absorb moves nothing.
pub fn transfer(db: &mut dyn StateDb, from: Address, to: Address, amount: u64) -> bool {
    if amount == 0 {
        return true;
    }
    let credit_fits = db
        .get_balance(to)
        .is_ok_and(|balance| balance.checked_add(amount).is_some());
    if !credit_fits || db.sub_balance(from, amount).is_err() {
        return false;
    }
    if db.add_balance(to, amount).is_err() {
        // Hand the debit back.
        let _ = db.add_balance(from, amount);
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::{MemoryAccount, MemoryStateDb};

    #[test]
    fn default_callbacks_move_native_balance() {
        let alice = Address::from_low_u64_be(1);
        let bob = Address::from_low_u64_be(2);
        let mut db = MemoryStateDb::new();
        db.insert_account(alice, MemoryAccount::with_balance(30));

        assert!(can_transfer(&db, alice, 30));
        assert!(!can_transfer(&db, alice, 31));
        assert!(!can_transfer(&db, bob, 1));

        assert!(transfer(&mut db, alice, bob, 12));
        assert_eq!(db.get_balance(alice).unwrap(), 18);
        assert_eq!(db.get_balance(bob).unwrap(), 12);

        assert!(!transfer(&mut db, bob, alice, 13));
        assert_eq!(db.get_balance(bob).unwrap(), 12);
    }

    #[test]
    fn default_transfer_moves_nothing_when_the_credit_overflows() {
        let alice = Address::from_low_u64_be(1);
        let bob = Address::from_low_u64_be(2);
        let mut db = MemoryStateDb::new();
        db.insert_account(alice, MemoryAccount::with_balance(30));
        db.insert_account(bob, MemoryAccount::with_balance(u64::MAX - 1));

        assert!(!transfer(&mut db, alice, bob, 5));
        assert_eq!(db.get_balance(alice).unwrap(), 30);
        assert_eq!(db.get_balance(bob).unwrap(), u64::MAX - 1);
    }
}
