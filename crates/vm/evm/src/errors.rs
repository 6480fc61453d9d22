use bytes::Bytes;
use ethereum_types::Address;
use serde::{Deserialize, Serialize};

use crate::db::SnapshotId;

/// Outcome of a contract call, or a fault that aborts the whole call tree.
///
/// The first group of variants is the closed set of dispatcher-level
/// outcomes. They are reported inside [`TxResult::Revert`] and never
/// returned through `Err`. The wrapped variants split into two families:
/// [`ExceptionalHalt`] and [`PrecompileError`] are execution outcomes as
/// well, while [`InternalError`] and [`DatabaseError`] are fatal and are
/// propagated with `?`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum VMError {
    #[error("Max call depth exceeded")]
    DepthExceeded,
    #[error("Insufficient balance for transfer")]
    InsufficientBalance,
    #[error("Call to a destructed account")]
    DestructedAccountCall,
    #[error("Address not found")]
    AddressNotFound,
    #[error("Execution reverted")]
    ExecutionReverted,
    #[error("Contract creation code storage out of gas")]
    CodeStoreOutOfGas,
    #[error("Max code size exceeded")]
    MaxCodeSizeExceeded,
    #[error("Exceptional halt: {0}")]
    ExceptionalHalt(#[from] ExceptionalHalt),
    #[error("Precompile execution error: {0}")]
    Precompile(#[from] PrecompileError),
    #[error("Internal error: {0}")]
    Internal(#[from] InternalError),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
}

impl VMError {
    /// Explicit reverts keep whatever gas the callee left unused.
    pub fn is_revert_opcode(&self) -> bool {
        matches!(self, VMError::ExecutionReverted)
    }

    /// Internal and database faults abort execution instead of being
    /// reported as a failed call.
    pub fn is_internal(&self) -> bool {
        matches!(self, VMError::Internal(_) | VMError::Database(_))
    }
}

/// Opcode-level faults surfaced by the interpreter. The dispatcher treats
/// every variant the same way: revert the call snapshot and burn its gas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ExceptionalHalt {
    #[error("Out of gas")]
    OutOfGas,
    #[error("Write protection")]
    WriteProtection,
    #[error("Invalid opcode 0x{0:02x}")]
    InvalidOpcode(u8),
    #[error("Stack underflow")]
    StackUnderflow,
    #[error("Stack overflow")]
    StackOverflow,
    #[error("Invalid jump")]
    InvalidJump,
    #[error("Execution aborted")]
    Aborted,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum PrecompileError {
    #[error("Error while parsing the calldata")]
    ParsingInputError,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Invalid address encoding")]
    InvalidAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum InternalError {
    #[error("Arithmetic operation overflowed")]
    Overflow,
    #[error("Arithmetic operation underflowed")]
    Underflow,
    #[error("Arithmetic operation divided by zero")]
    DivisionByZero,
    #[error("Type conversion error")]
    TypeConversion,
    #[error("Invalid coin precision {0}: must be non-zero and divide 10^18")]
    InvalidPrecision(u64),
    #[error("Delegate call requires the caller to be a contract frame")]
    MissingParentFrame,
    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DatabaseError {
    #[error("Snapshot {0} cannot be reverted")]
    InvalidSnapshot(SnapshotId),
    #[error("Balance underflow for account {0:#x}")]
    BalanceUnderflow(Address),
    #[error("Balance overflow for account {0:#x}")]
    BalanceOverflow(Address),
    #[error("{0}")]
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxResult {
    Success,
    Revert(VMError),
}

impl TxResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TxResult::Success)
    }

    pub fn error(&self) -> Option<&VMError> {
        match self {
            TxResult::Success => None,
            TxResult::Revert(error) => Some(error),
        }
    }
}

/// What a dispatcher entry point hands back to its caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextResult {
    pub result: TxResult,
    /// Gas returned to the caller. Zero after a non-revert failure.
    pub gas_left: u64,
    pub output: Bytes,
    /// Checkpoint opened for this call. `None` when the call was refused
    /// before any state was touched.
    pub snapshot: Option<SnapshotId>,
}

impl ContextResult {
    /// A call that was refused or short-circuited before opening a snapshot.
    pub fn untouched(result: TxResult, gas: u64) -> Self {
        Self {
            result,
            gas_left: gas,
            output: Bytes::new(),
            snapshot: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    pub fn error(&self) -> Option<&VMError> {
        self.result.error()
    }
}
