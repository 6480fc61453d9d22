use std::{
    fmt,
    ops::{Deref, DerefMut},
    rc::Rc,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use bytes::Bytes;
use ethereum_types::{Address, U256};
use malachite::Natural;

use crate::{
    call_frame::{CallFrame, ContractRef},
    config::{ChainConfig, ConfigError, VMConfig},
    constants::{CALL_CREATE_DEPTH, MAX_CODE_SIZE},
    db::StateDb,
    environment::Environment,
    errors::{InternalError, VMError},
    interpreter::{Interpreter, InterpreterOutput},
    precision,
    precompiles::{self, Precompile},
};

/// Shared cancellation flag of one [`Evm`].
///
/// Any thread holding a clone may raise it; nothing ever lowers it. The
/// interpreter polls it between instructions.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    /// Raises the flag. Repeated calls have no further effect.
    pub fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why precheck refused a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precheck {
    Passed,
    /// Nested calls are disabled on this instance. Not an error.
    NotPermitted,
    Failed(VMError),
}

/// The EVM instance: execution context, state view and the bookkeeping
/// shared by every call of one transaction.
///
/// # Call tree
///
/// Every entry point of the dispatcher (see `call_handlers`) runs the
/// precheck, resolves precompiles, opens a snapshot and hands interpreted
/// code to the [`Interpreter`], which re-enters the dispatcher for nested
/// calls. `depth` counts the frames currently running and is raised and
/// lowered by a scoped guard, as is the read-only flag of static calls.
///
/// ```text
///   call ──► precheck ──► snapshot ──► transfer ──► precompile / interpreter
///                                                        │
///             ◄── revert + gas burn on failure ◄─────────┘
/// ```
///
/// An instance serves exactly one transaction and must not be shared.
pub struct Evm<'a> {
    /// Block and transaction context.
    pub env: Environment,
    /// State view for reading and writing accounts.
    pub db: &'a mut dyn StateDb,
    pub config: VMConfig,
    pub chain_config: ChainConfig,
    interpreter: Rc<dyn Interpreter>,
    depth: usize,
    read_only: bool,
    abort: AbortHandle,
    max_code_size: usize,
    /// Whether the running transaction came in through the
    /// Ethereum-compatible submission path.
    is_eth_tx: bool,
    call_gas_temp: u64,
}

impl fmt::Debug for Evm<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evm")
            .field("env", &self.env)
            .field("config", &self.config)
            .field("chain_config", &self.chain_config)
            .field("depth", &self.depth)
            .field("read_only", &self.read_only)
            .field("aborted", &self.abort.is_aborted())
            .field("max_code_size", &self.max_code_size)
            .field("is_eth_tx", &self.is_eth_tx)
            .finish_non_exhaustive()
    }
}

impl<'a> Evm<'a> {
    /// Fails when `chain_config` carries a coin precision that cannot be
    /// bridged to 18 decimals.
    pub fn new(
        env: Environment,
        db: &'a mut dyn StateDb,
        config: VMConfig,
        chain_config: ChainConfig,
        interpreter: Rc<dyn Interpreter>,
    ) -> Result<Self, ConfigError> {
        chain_config.validate()?;
        Ok(Self {
            env,
            db,
            config,
            chain_config,
            interpreter,
            depth: 0,
            read_only: false,
            abort: AbortHandle::default(),
            max_code_size: MAX_CODE_SIZE,
            is_eth_tx: false,
            call_gas_temp: 0,
        })
    }

    /// Asks the running call tree to stop. Safe to call any number of times.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_cancelled(&self) -> bool {
        self.abort.is_aborted()
    }

    /// Handle that cancels this instance from another thread.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Values below 1 or above [`MAX_CODE_SIZE`] are ignored.
    pub fn set_max_code_size(&mut self, max_code_size: usize) {
        if max_code_size < 1 || max_code_size > MAX_CODE_SIZE {
            return;
        }
        self.max_code_size = max_code_size;
    }

    pub fn max_code_size(&self) -> usize {
        self.max_code_size
    }

    pub fn set_eth_tx_flag(&mut self, is_eth_tx: bool) {
        self.is_eth_tx = is_eth_tx;
    }

    pub fn is_eth_tx(&self) -> bool {
        self.is_eth_tx
    }

    pub fn evm_chain_id(&self) -> i32 {
        self.chain_config.evm_chain_id
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// True while a static call is executing anywhere up the call tree.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn call_gas_temp(&self) -> u64 {
        self.call_gas_temp
    }

    pub fn set_call_gas_temp(&mut self, gas: u64) {
        self.call_gas_temp = gas;
    }

    pub fn check_precompile(&self, address: Address) -> bool {
        precompiles::is_precompile(address)
    }

    pub fn resolve_precompile(&self, address: Address) -> Option<Precompile> {
        precompiles::lookup(address)
    }

    pub fn native_to_external(&self, amount: &Natural) -> Result<Natural, InternalError> {
        precision::native_to_external(amount, self.chain_config.coin_precision)
    }

    pub fn external_to_native(&self, amount: &Natural) -> Result<Natural, InternalError> {
        precision::external_to_native(amount, self.chain_config.coin_precision)
    }

    /// Checks that run before any call touches state.
    pub fn precheck(&self, caller: Address, value: u64) -> Precheck {
        if self.config.no_recursion && self.depth > 0 {
            return Precheck::NotPermitted;
        }
        if self.depth > CALL_CREATE_DEPTH {
            return Precheck::Failed(VMError::DepthExceeded);
        }
        if value > 0 && !(self.env.can_transfer)(&*self.db, caller, value) {
            return Precheck::Failed(VMError::InsufficientBalance);
        }
        Precheck::Passed
    }

    /// Value placed in a new frame. Only transactions from the
    /// Ethereum-compatible path carry 18-decimal amounts.
    pub(crate) fn frame_value(&self, value: u64) -> Result<U256, InternalError> {
        if self.is_eth_tx && value != 0 {
            precision::bridge_to_external(value, self.chain_config.coin_precision)
        } else {
            Ok(U256::from(value))
        }
    }

    /// Moves `value` with the environment's transfer callback.
    pub(crate) fn transfer(&mut self, from: Address, to: Address, value: u64) {
        if !(self.env.transfer)(&mut *self.db, from, to, value) {
            tracing::warn!(%from, %to, value, "Value transfer callback reported failure");
        }
    }

    /// Runs `frame` either as a precompile or through the interpreter, one
    /// level deeper in the call tree.
    pub(crate) fn execute_frame(
        &mut self,
        precompile: Option<Precompile>,
        caller: &dyn ContractRef,
        frame: &mut CallFrame,
        input: &Bytes,
        read_only: bool,
    ) -> Result<InterpreterOutput, VMError> {
        if let Some(precompile) = precompile {
            return precompiles::run_precompiled_contract(self, precompile, caller, input, frame);
        }
        let interpreter = Rc::clone(&self.interpreter);
        let mut scope = DepthGuard::enter(self)?;
        interpreter.run(&mut scope, frame, input, read_only)
    }

    /// Whether the tracer has to see this call.
    pub(crate) fn tracing_enabled(&self) -> bool {
        self.config.debug && self.depth == 0 && self.config.tracer.is_some()
    }

    pub(crate) fn capture_start(
        &self,
        from: Address,
        to: Address,
        is_create: bool,
        input: &Bytes,
        gas: u64,
        value: u64,
    ) -> Option<Instant> {
        if !self.tracing_enabled() {
            return None;
        }
        let tracer = self.config.tracer.as_ref()?;
        tracer
            .borrow_mut()
            .capture_start(from, to, is_create, input, gas, value);
        Some(Instant::now())
    }

    pub(crate) fn capture_end(
        &self,
        started: Option<Instant>,
        output: &Bytes,
        gas_used: u64,
        error: Option<&VMError>,
    ) {
        let (Some(started), Some(tracer)) = (started, self.config.tracer.as_ref()) else {
            return;
        };
        tracer
            .borrow_mut()
            .capture_end(output, gas_used, started.elapsed(), error);
    }
}

/// Keeps `depth` raised while a frame runs.
pub(crate) struct DepthGuard<'g, 'a> {
    evm: &'g mut Evm<'a>,
}

impl<'g, 'a> DepthGuard<'g, 'a> {
    fn enter(evm: &'g mut Evm<'a>) -> Result<Self, InternalError> {
        evm.depth = evm.depth.checked_add(1).ok_or(InternalError::Overflow)?;
        Ok(Self { evm })
    }
}

impl Drop for DepthGuard<'_, '_> {
    fn drop(&mut self) {
        self.evm.depth = self.evm.depth.saturating_sub(1);
    }
}

impl<'a> Deref for DepthGuard<'_, 'a> {
    type Target = Evm<'a>;

    fn deref(&self) -> &Self::Target {
        self.evm
    }
}

impl DerefMut for DepthGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.evm
    }
}

/// Forces read-only mode for its lifetime and restores the previous mode
/// on drop.
pub(crate) struct ReadOnlyGuard<'g, 'a> {
    evm: &'g mut Evm<'a>,
    previous: bool,
}

impl<'g, 'a> ReadOnlyGuard<'g, 'a> {
    pub(crate) fn enter(evm: &'g mut Evm<'a>) -> Self {
        let previous = evm.read_only;
        evm.read_only = true;
        Self { evm, previous }
    }
}

impl Drop for ReadOnlyGuard<'_, '_> {
    fn drop(&mut self) {
        self.evm.read_only = self.previous;
    }
}

impl<'a> Deref for ReadOnlyGuard<'_, 'a> {
    type Target = Evm<'a>;

    fn deref(&self) -> &Self::Target {
        self.evm
    }
}

impl DerefMut for ReadOnlyGuard<'_, '_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.evm
    }
}
