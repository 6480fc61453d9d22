//! Shared helpers for the dispatcher integration tests.
//!
//! Contracts are modelled as Rust closures keyed by the hash of their
//! (arbitrary) bytecode, so each test scripts exactly the behavior it needs.

#![allow(dead_code)]

use std::{collections::HashMap, rc::Rc};

use bytes::Bytes;
use ethereum_types::{Address, H256};
use ledger_evm::{
    CallFrame, ChainConfig, Environment, Evm, Interpreter, InterpreterOutput, VMConfig, VMError,
    db::{
        StateDb,
        memory::{MemoryAccount, MemoryStateDb},
    },
    errors::ExceptionalHalt,
    utils::code_hash,
};

pub const ORIGIN: u64 = 0x100;
pub const CONTRACT: u64 = 0x42;
pub const OTHER_CONTRACT: u64 = 0x43;
pub const TEST_GAS: u64 = 100_000;

pub type Script =
    Rc<dyn Fn(&mut Evm<'_>, &mut CallFrame, &Bytes, bool) -> Result<InterpreterOutput, VMError>>;

/// Interpreter that runs the script registered for the frame's code hash.
///
/// Unknown code halts with an invalid opcode. A cancelled instance halts
/// with [`ExceptionalHalt::Aborted`] before running anything.
#[derive(Default, Clone)]
pub struct ScriptedInterpreter {
    scripts: HashMap<H256, Script>,
}

impl ScriptedInterpreter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script<F>(mut self, code: &Bytes, script: F) -> Self
    where
        F: Fn(&mut Evm<'_>, &mut CallFrame, &Bytes, bool) -> Result<InterpreterOutput, VMError>
            + 'static,
    {
        self.scripts.insert(code_hash(code), Rc::new(script));
        self
    }
}

impl Interpreter for ScriptedInterpreter {
    fn run(
        &self,
        evm: &mut Evm<'_>,
        frame: &mut CallFrame,
        input: &Bytes,
        read_only: bool,
    ) -> Result<InterpreterOutput, VMError> {
        if evm.is_cancelled() {
            return Ok(halt(ExceptionalHalt::Aborted));
        }
        match self.scripts.get(&frame.code_hash) {
            Some(script) => script(evm, frame, input, read_only),
            None => Ok(halt(ExceptionalHalt::InvalidOpcode(0xfe))),
        }
    }
}

pub fn addr(n: u64) -> Address {
    Address::from_low_u64_be(n)
}

pub fn word(n: u64) -> H256 {
    H256::from_low_u64_be(n)
}

/// Distinct placeholder bytecode, so each contract gets its own hash.
pub fn bytecode(tag: u8) -> Bytes {
    Bytes::from(vec![0x60, tag, 0x00])
}

pub fn halt(halt: ExceptionalHalt) -> InterpreterOutput {
    InterpreterOutput::revert(VMError::ExceptionalHalt(halt), Bytes::new())
}

/// SSTORE as the interpreter would execute it: refused in read-only mode.
pub fn sstore(
    evm: &mut Evm<'_>,
    frame: &CallFrame,
    read_only: bool,
    key: H256,
    value: H256,
) -> Result<Option<InterpreterOutput>, VMError> {
    if read_only || evm.is_read_only() {
        return Ok(Some(halt(ExceptionalHalt::WriteProtection)));
    }
    evm.db.set_state(frame.address, key, value)?;
    Ok(None)
}

pub fn funded_db(accounts: &[(u64, u64)]) -> MemoryStateDb {
    let mut db = MemoryStateDb::new();
    for (address, balance) in accounts {
        db.insert_account(addr(*address), MemoryAccount::with_balance(*balance));
    }
    db
}

pub fn deploy(db: &mut MemoryStateDb, address: u64, code: Bytes) {
    db.insert_account(addr(address), MemoryAccount::with_code(0, code));
}

pub fn new_evm<'a>(
    db: &'a mut MemoryStateDb,
    interpreter: ScriptedInterpreter,
    config: VMConfig,
) -> Evm<'a> {
    let env = Environment {
        origin: addr(ORIGIN),
        gas_limit: TEST_GAS,
        ..Default::default()
    };
    Evm::new(env, db, config, ChainConfig::default(), Rc::new(interpreter)).unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
