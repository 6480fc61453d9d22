use bytes::Bytes;

use crate::{
    call_frame::CallFrame,
    errors::{TxResult, VMError},
    vm::Evm,
};

/// What the bytecode interpreter reports back after running a frame.
///
/// Remaining gas is left in [`CallFrame::gas`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterOutput {
    pub result: TxResult,
    pub output: Bytes,
}

impl InterpreterOutput {
    pub fn success(output: Bytes) -> Self {
        Self {
            result: TxResult::Success,
            output,
        }
    }

    pub fn revert(error: VMError, output: Bytes) -> Self {
        Self {
            result: TxResult::Revert(error),
            output,
        }
    }
}

/// Executes contract bytecode inside a frame prepared by the dispatcher.
///
/// The interpreter gets the [`Evm`] back so nested CALL/CREATE opcodes can
/// re-enter the dispatcher. It must check [`Evm::is_cancelled`] between
/// instructions and stop with [`ExceptionalHalt::Aborted`] once it is set.
/// Writes are forbidden whenever `read_only` is true or
/// [`Evm::is_read_only`] reports an enclosing static call.
///
/// Returning `Err` aborts the whole call tree. Opcode faults must be
/// reported through [`InterpreterOutput::result`] instead.
///
/// [`ExceptionalHalt::Aborted`]: crate::errors::ExceptionalHalt::Aborted
pub trait Interpreter {
    fn run(
        &self,
        evm: &mut Evm<'_>,
        frame: &mut CallFrame,
        input: &Bytes,
        read_only: bool,
    ) -> Result<InterpreterOutput, VMError>;
}
