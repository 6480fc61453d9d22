use bytes::Bytes;
use ethereum_types::{Address, H256};
use rustc_hash::{FxHashMap, FxHashSet};

use super::{SnapshotId, StateDb};
use crate::{constants::EMPTY_CODE_HASH, errors::DatabaseError, utils::code_hash};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryAccount {
    pub balance: u64,
    pub code: Bytes,
    pub code_hash: H256,
    pub storage: FxHashMap<H256, H256>,
    pub suicided: bool,
    pub creator: Option<Address>,
    pub exec_name: String,
    pub alias: String,
}

impl Default for MemoryAccount {
    fn default() -> Self {
        Self {
            balance: 0,
            code: Bytes::new(),
            code_hash: EMPTY_CODE_HASH,
            storage: FxHashMap::default(),
            suicided: false,
            creator: None,
            exec_name: String::new(),
            alias: String::new(),
        }
    }
}

impl MemoryAccount {
    pub fn with_balance(balance: u64) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }

    pub fn with_code(balance: u64, code: Bytes) -> Self {
        Self {
            balance,
            code_hash: code_hash(&code),
            code,
            ..Default::default()
        }
    }
}

/// Undo record for a single mutation.
#[derive(Debug, Clone)]
enum JournalEntry {
    /// `previous` is `None` when the account did not exist before.
    AccountReplaced {
        address: Address,
        previous: Option<Box<MemoryAccount>>,
    },
    BalanceChange {
        address: Address,
        previous: u64,
    },
    CodeChange {
        address: Address,
        previous_code: Bytes,
        previous_hash: H256,
    },
    StorageChange {
        address: Address,
        key: H256,
        previous: Option<H256>,
    },
    Suicide {
        address: Address,
        previous_suicided: bool,
        previous_balance: u64,
    },
    StateMigrated {
        address: Address,
    },
}

/// In-memory [`StateDb`] with a linear undo journal.
///
/// A snapshot is the journal length at the time it was taken, so taking one
/// is O(1). Reverting pops and undoes entries down to that length, which
/// also drops everything recorded under snapshots opened afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateDb {
    accounts: FxHashMap<Address, MemoryAccount>,
    journal: Vec<JournalEntry>,
    /// (snapshot id, journal length) in increasing id order.
    revisions: Vec<(SnapshotId, usize)>,
    next_revision: SnapshotId,
    /// Block height from which contract data has to be migrated on access.
    migration_height: Option<u64>,
    migrated: FxHashSet<Address>,
}

impl MemoryStateDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_migration_height(mut self, height: u64) -> Self {
        self.migration_height = Some(height);
        self
    }

    /// Seeds an account outside of the journal.
    pub fn insert_account(&mut self, address: Address, account: MemoryAccount) {
        self.accounts.insert(address, account);
    }

    pub fn account(&self, address: &Address) -> Option<&MemoryAccount> {
        self.accounts.get(address)
    }

    pub fn is_migrated(&self, address: &Address) -> bool {
        self.migrated.contains(address)
    }

    pub fn journal_len(&self) -> usize {
        self.journal.len()
    }

    /// Forgets the journal and every open snapshot, keeping the current state.
    pub fn commit(&mut self) {
        self.journal.clear();
        self.revisions.clear();
    }

    /// Returns the account, creating (and journaling) an empty one if needed.
    fn account_mut_or_create(&mut self, address: Address) -> &mut MemoryAccount {
        if !self.accounts.contains_key(&address) {
            self.journal.push(JournalEntry::AccountReplaced {
                address,
                previous: None,
            });
        }
        self.accounts.entry(address).or_default()
    }

    fn undo(&mut self, entry: JournalEntry) {
        match entry {
            JournalEntry::AccountReplaced { address, previous } => match previous {
                Some(account) => {
                    self.accounts.insert(address, *account);
                }
                None => {
                    self.accounts.remove(&address);
                }
            },
            JournalEntry::BalanceChange { address, previous } => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    account.balance = previous;
                }
            }
            JournalEntry::CodeChange {
                address,
                previous_code,
                previous_hash,
            } => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    account.code = previous_code;
                    account.code_hash = previous_hash;
                }
            }
            JournalEntry::StorageChange {
                address,
                key,
                previous,
            } => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    match previous {
                        Some(value) => account.storage.insert(key, value),
                        None => account.storage.remove(&key),
                    };
                }
            }
            JournalEntry::Suicide {
                address,
                previous_suicided,
                previous_balance,
            } => {
                if let Some(account) = self.accounts.get_mut(&address) {
                    account.suicided = previous_suicided;
                    account.balance = previous_balance;
                }
            }
            JournalEntry::StateMigrated { address } => {
                self.migrated.remove(&address);
            }
        }
    }
}

impl StateDb for MemoryStateDb {
    fn exists(&self, address: Address) -> Result<bool, DatabaseError> {
        Ok(self.accounts.contains_key(&address))
    }

    fn has_suicided(&self, address: Address) -> Result<bool, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .map(|account| account.suicided)
            .unwrap_or_default())
    }

    fn suicide(&mut self, address: Address) -> Result<bool, DatabaseError> {
        let Some(account) = self.accounts.get_mut(&address) else {
            return Ok(false);
        };
        self.journal.push(JournalEntry::Suicide {
            address,
            previous_suicided: account.suicided,
            previous_balance: account.balance,
        });
        account.suicided = true;
        account.balance = 0;
        Ok(true)
    }

    fn snapshot(&mut self) -> SnapshotId {
        let id = self.next_revision;
        self.next_revision = self.next_revision.wrapping_add(1);
        self.revisions.push((id, self.journal.len()));
        id
    }

    fn revert_to_snapshot(&mut self, id: SnapshotId) -> Result<(), DatabaseError> {
        let index = self
            .revisions
            .binary_search_by_key(&id, |(revision, _)| *revision)
            .map_err(|_| DatabaseError::InvalidSnapshot(id))?;
        let (_, journal_len) = self
            .revisions
            .get(index)
            .copied()
            .ok_or(DatabaseError::InvalidSnapshot(id))?;

        while self.journal.len() > journal_len {
            if let Some(entry) = self.journal.pop() {
                self.undo(entry);
            }
        }
        self.revisions.truncate(index);
        Ok(())
    }

    fn get_code(&self, address: Address) -> Result<Bytes, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .map(|account| account.code.clone())
            .unwrap_or_default())
    }

    fn get_code_hash(&self, address: Address) -> Result<H256, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .map(|account| account.code_hash)
            .unwrap_or(EMPTY_CODE_HASH))
    }

    fn set_code(&mut self, address: Address, code: Bytes) -> Result<(), DatabaseError> {
        let new_hash = code_hash(&code);
        let account = self.account_mut_or_create(address);
        let previous_code = std::mem::replace(&mut account.code, code);
        let previous_hash = std::mem::replace(&mut account.code_hash, new_hash);
        self.journal.push(JournalEntry::CodeChange {
            address,
            previous_code,
            previous_hash,
        });
        Ok(())
    }

    fn create_account(
        &mut self,
        address: Address,
        creator: Address,
        exec_name: &str,
        alias: &str,
    ) -> Result<(), DatabaseError> {
        let previous = self.accounts.get(&address).cloned();
        // Value sent ahead of the creation stays with the new account.
        let balance = previous.as_ref().map(|account| account.balance).unwrap_or_default();
        self.journal.push(JournalEntry::AccountReplaced {
            address,
            previous: previous.map(Box::new),
        });
        self.accounts.insert(
            address,
            MemoryAccount {
                balance,
                creator: Some(creator),
                exec_name: exec_name.to_string(),
                alias: alias.to_string(),
                ..Default::default()
            },
        );
        Ok(())
    }

    fn get_balance(&self, address: Address) -> Result<u64, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .map(|account| account.balance)
            .unwrap_or_default())
    }

    fn add_balance(&mut self, address: Address, amount: u64) -> Result<(), DatabaseError> {
        if amount == 0 {
            return Ok(());
        }
        let account = self.account_mut_or_create(address);
        let previous = account.balance;
        account.balance = previous
            .checked_add(amount)
            .ok_or(DatabaseError::BalanceOverflow(address))?;
        self.journal
            .push(JournalEntry::BalanceChange { address, previous });
        Ok(())
    }

    fn sub_balance(&mut self, address: Address, amount: u64) -> Result<(), DatabaseError> {
        if amount == 0 {
            return Ok(());
        }
        let account = self
            .accounts
            .get_mut(&address)
            .ok_or(DatabaseError::BalanceUnderflow(address))?;
        let previous = account.balance;
        account.balance = previous
            .checked_sub(amount)
            .ok_or(DatabaseError::BalanceUnderflow(address))?;
        self.journal
            .push(JournalEntry::BalanceChange { address, previous });
        Ok(())
    }

    fn get_state(&self, address: Address, key: H256) -> Result<H256, DatabaseError> {
        Ok(self
            .accounts
            .get(&address)
            .and_then(|account| account.storage.get(&key).copied())
            .unwrap_or_default())
    }

    fn set_state(
        &mut self,
        address: Address,
        key: H256,
        value: H256,
    ) -> Result<(), DatabaseError> {
        let account = self.account_mut_or_create(address);
        let previous = account.storage.insert(key, value);
        self.journal.push(JournalEntry::StorageChange {
            address,
            key,
            previous,
        });
        Ok(())
    }

    fn is_state_migration_active(&self, block_number: u64) -> bool {
        self.migration_height
            .is_some_and(|height| block_number >= height)
    }

    fn transfer_state_data(&mut self, address: Address) -> Result<(), DatabaseError> {
        if self.migrated.insert(address) {
            self.journal.push(JournalEntry::StateMigrated { address });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn revert_restores_balances_and_storage() {
        let mut db = MemoryStateDb::new();
        db.insert_account(addr(1), MemoryAccount::with_balance(100));

        let snapshot = db.snapshot();
        db.sub_balance(addr(1), 40).unwrap();
        db.add_balance(addr(2), 40).unwrap();
        db.set_state(addr(1), H256::repeat_byte(1), H256::repeat_byte(2))
            .unwrap();

        db.revert_to_snapshot(snapshot).unwrap();

        assert_eq!(db.get_balance(addr(1)).unwrap(), 100);
        assert!(!db.exists(addr(2)).unwrap());
        assert_eq!(
            db.get_state(addr(1), H256::repeat_byte(1)).unwrap(),
            H256::zero()
        );
        assert_eq!(db.journal_len(), 0);
    }

    #[test]
    fn outer_revert_discards_nested_snapshots() {
        let mut db = MemoryStateDb::new();
        db.insert_account(addr(1), MemoryAccount::with_balance(10));

        let outer = db.snapshot();
        db.add_balance(addr(1), 5).unwrap();
        let inner = db.snapshot();
        db.add_balance(addr(1), 7).unwrap();
        // The inner checkpoint is left alone, as a committed nested call would.
        assert!(inner > outer);

        db.revert_to_snapshot(outer).unwrap();
        assert_eq!(db.get_balance(addr(1)).unwrap(), 10);
        assert_eq!(
            db.revert_to_snapshot(inner),
            Err(DatabaseError::InvalidSnapshot(inner))
        );
    }

    #[test]
    fn create_account_keeps_prefunded_balance_and_is_revertible() {
        let mut db = MemoryStateDb::new();
        db.insert_account(addr(1), MemoryAccount::with_balance(50));

        let snapshot = db.snapshot();
        db.sub_balance(addr(1), 20).unwrap();
        db.add_balance(addr(9), 20).unwrap();
        db.create_account(addr(9), addr(1), "user.evm.test", "token")
            .unwrap();
        db.set_code(addr(9), Bytes::from_static(&[0x60, 0x00])).unwrap();

        let created = db.account(&addr(9)).unwrap();
        assert_eq!(created.balance, 20);
        assert_eq!(created.creator, Some(addr(1)));
        assert_eq!(created.alias, "token");
        assert_ne!(created.code_hash, EMPTY_CODE_HASH);

        db.revert_to_snapshot(snapshot).unwrap();
        assert!(db.account(&addr(9)).is_none());
        assert_eq!(db.get_balance(addr(1)).unwrap(), 50);
    }

    #[test]
    fn suicide_marks_account_and_reverts() {
        let mut db = MemoryStateDb::new();
        db.insert_account(addr(3), MemoryAccount::with_balance(8));

        let snapshot = db.snapshot();
        assert!(db.suicide(addr(3)).unwrap());
        assert!(db.has_suicided(addr(3)).unwrap());
        assert_eq!(db.get_balance(addr(3)).unwrap(), 0);

        db.revert_to_snapshot(snapshot).unwrap();
        assert!(!db.has_suicided(addr(3)).unwrap());
        assert_eq!(db.get_balance(addr(3)).unwrap(), 8);
        assert!(!db.suicide(addr(4)).unwrap());
    }

    #[test]
    fn sub_balance_rejects_overdraft() {
        let mut db = MemoryStateDb::new();
        db.insert_account(addr(1), MemoryAccount::with_balance(1));
        assert_eq!(
            db.sub_balance(addr(1), 2),
            Err(DatabaseError::BalanceUnderflow(addr(1)))
        );
        assert_eq!(db.get_balance(addr(1)).unwrap(), 1);
    }

    #[test]
    fn state_migration_is_gated_by_height() {
        let mut db = MemoryStateDb::new().with_migration_height(100);
        assert!(!db.is_state_migration_active(99));
        assert!(db.is_state_migration_active(100));

        let snapshot = db.snapshot();
        db.transfer_state_data(addr(5)).unwrap();
        assert!(db.is_migrated(&addr(5)));
        db.revert_to_snapshot(snapshot).unwrap();
        assert!(!db.is_migrated(&addr(5)));
    }
}
