//! Entry points of the call dispatcher.
//!
//! Every variant follows the same protocol: precheck, resolve precompiles,
//! open a snapshot, move value, execute, and on failure revert to the
//! snapshot and burn the remaining gas unless the callee reverted
//! explicitly. EVM-level failures come back inside [`ContextResult`];
//! `Err` is reserved for internal and database faults.

use bytes::Bytes;
use ethereum_types::{Address, U256};

use crate::{
    call_frame::{CallFrame, ContractRef},
    constants::CREATE_DATA_GAS,
    db::SnapshotId,
    errors::{ContextResult, InternalError, TxResult, VMError},
    interpreter::InterpreterOutput,
    utils::code_hash,
    vm::{Evm, Precheck, ReadOnlyGuard},
};

impl<'a> Evm<'a> {
    /// Executes the contract at `address` with `input`, moving `value` from
    /// the caller to the callee first.
    pub fn call(
        &mut self,
        caller: &dyn ContractRef,
        address: Address,
        input: Bytes,
        gas: u64,
        value: u64,
    ) -> Result<ContextResult, VMError> {
        let caller_address = caller.address();
        tracing::debug!(
            caller = %caller_address,
            callee = %address,
            gas,
            value,
            input_len = input.len(),
            eth_tx = self.is_eth_tx(),
            depth = self.depth(),
            "CALL"
        );
        if let Some(refused) = self.run_precheck(caller_address, value, gas) {
            return Ok(refused);
        }

        let precompile = self.resolve_precompile(address);
        if !self.db.exists(address)? && precompile.is_none() && value == 0 {
            // Zero-value transfer to an account that does not exist.
            let started = self.capture_start(caller_address, address, false, &input, gas, value);
            self.capture_end(started, &Bytes::new(), 0, None);
            return Ok(ContextResult::untouched(TxResult::Success, gas));
        }

        if self.db.has_suicided(address)? {
            return Ok(destructed(gas));
        }

        let frame_value = self.frame_value(value)?;
        let snapshot = self.db.snapshot();
        self.transfer(caller_address, address, value);
        if self.db.is_state_migration_active(self.env.block_number) {
            self.db.transfer_state_data(address)?;
        }

        let mut frame = CallFrame::new(caller, address, frame_value, gas);
        let output = match precompile {
            Some(precompile) => {
                self.execute_frame(Some(precompile), caller, &mut frame, &input, false)?
            }
            None => {
                self.load_code(&mut frame, address)?;
                if frame.has_code() {
                    let started =
                        self.capture_start(caller_address, address, false, &input, gas, value);
                    let output = self
                        .execute_frame(None, caller, &mut frame, &input, false)
                        .inspect_err(|error| {
                            self.capture_end(
                                started,
                                &Bytes::new(),
                                gas.saturating_sub(frame.gas),
                                Some(error),
                            )
                        })?;
                    self.capture_end(
                        started,
                        &output.output,
                        gas.saturating_sub(frame.gas),
                        output.result.error(),
                    );
                    output
                } else {
                    InterpreterOutput::success(Bytes::new())
                }
            }
        };

        self.settle(snapshot, output, frame.gas)
    }

    /// Runs the code of `address` in the caller's own account context.
    /// No value changes hands.
    pub fn call_code(
        &mut self,
        caller: &dyn ContractRef,
        address: Address,
        input: Bytes,
        gas: u64,
        value: u64,
    ) -> Result<ContextResult, VMError> {
        let caller_address = caller.address();
        tracing::debug!(
            caller = %caller_address,
            code_address = %address,
            gas,
            value,
            input_len = input.len(),
            depth = self.depth(),
            "CALLCODE"
        );
        if let Some(refused) = self.run_precheck(caller_address, value, gas) {
            return Ok(refused);
        }
        if self.db.has_suicided(address)? {
            return Ok(destructed(gas));
        }

        let frame_value = self.frame_value(value)?;
        let snapshot = self.db.snapshot();
        let mut frame = CallFrame::new(caller, caller_address, frame_value, gas);
        let output = self.execute_code_at(caller, address, &mut frame, &input, false)?;

        self.settle(snapshot, output, frame.gas)
    }

    /// Runs the code of `address` on behalf of the caller's caller, keeping
    /// the caller's storage and value.
    pub fn delegate_call(
        &mut self,
        caller: &dyn ContractRef,
        address: Address,
        input: Bytes,
        gas: u64,
    ) -> Result<ContextResult, VMError> {
        let caller_address = caller.address();
        tracing::debug!(
            caller = %caller_address,
            code_address = %address,
            gas,
            input_len = input.len(),
            depth = self.depth(),
            "DELEGATECALL"
        );
        if let Some(refused) = self.run_precheck(caller_address, 0, gas) {
            return Ok(refused);
        }
        let parent = caller
            .as_call_frame()
            .ok_or(InternalError::MissingParentFrame)?;
        if self.db.has_suicided(address)? {
            return Ok(destructed(gas));
        }

        let snapshot = self.db.snapshot();
        let mut frame = CallFrame::new(caller, caller_address, U256::zero(), gas)
            .into_delegate(parent);
        let output = self.execute_code_at(caller, address, &mut frame, &input, false)?;

        self.settle(snapshot, output, frame.gas)
    }

    /// Executes `address` with every state modification forbidden for the
    /// whole call, including nested calls.
    pub fn static_call(
        &mut self,
        caller: &dyn ContractRef,
        address: Address,
        input: Bytes,
        gas: u64,
    ) -> Result<ContextResult, VMError> {
        let caller_address = caller.address();
        tracing::debug!(
            caller = %caller_address,
            callee = %address,
            gas,
            input_len = input.len(),
            depth = self.depth(),
            "STATICCALL"
        );
        if let Some(refused) = self.run_precheck(caller_address, 0, gas) {
            return Ok(refused);
        }

        let precompile = self.resolve_precompile(address);
        if !self.db.exists(address)? && precompile.is_none() && !input.is_empty() {
            tracing::debug!(callee = %address, "Static call to a missing account");
            return Ok(ContextResult::untouched(
                TxResult::Revert(VMError::AddressNotFound),
                gas,
            ));
        }
        if self.db.has_suicided(address)? {
            return Ok(destructed(gas));
        }

        let mut scope = ReadOnlyGuard::enter(self);
        let snapshot = scope.db.snapshot();
        let mut frame = CallFrame::new(caller, address, U256::zero(), gas);
        let output = match precompile {
            Some(precompile) => {
                scope.execute_frame(Some(precompile), caller, &mut frame, &input, true)?
            }
            None => scope.execute_code_at(caller, address, &mut frame, &input, true)?,
        };

        scope.settle(snapshot, output, frame.gas)
    }

    /// Deploys a contract at the precomputed `contract_address`.
    ///
    /// The init code always runs to completion. Its output becomes the
    /// deployed code when it fits the size limit and the remaining gas pays
    /// [`CREATE_DATA_GAS`] per byte.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        caller: &dyn ContractRef,
        contract_address: Address,
        code: Bytes,
        gas: u64,
        exec_name: &str,
        alias: &str,
        value: u64,
    ) -> Result<ContextResult, VMError> {
        let caller_address = caller.address();
        tracing::debug!(
            caller = %caller_address,
            contract = %contract_address,
            gas,
            value,
            code_len = code.len(),
            eth_tx = self.is_eth_tx(),
            depth = self.depth(),
            exec_name,
            alias,
            "CREATE"
        );
        if let Some(refused) = self.run_precheck(caller_address, value, gas) {
            return Ok(refused);
        }

        let frame_value = self.frame_value(value)?;
        self.transfer(caller_address, contract_address, value);

        let mut frame = CallFrame::new(caller, contract_address, frame_value, gas);
        let hash = code_hash(&code);
        frame.set_call_code(contract_address, hash, code.clone());

        let snapshot = self.db.snapshot();
        self.db
            .create_account(contract_address, frame.caller_address, exec_name, alias)?;

        let started = self.capture_start(caller_address, contract_address, true, &code, gas, 0);
        let output = self
            .run_code(caller, &mut frame, &Bytes::new(), false)
            .inspect_err(|error| {
                self.capture_end(started, &Bytes::new(), gas.saturating_sub(frame.gas), Some(error))
            })?;

        let max_code_size_exceeded = output.output.len() > self.max_code_size();
        let mut error = output.result.error().cloned();
        if error.is_none() && !max_code_size_exceeded {
            let code_len = u64::try_from(output.output.len())
                .map_err(|_| InternalError::TypeConversion)?;
            let store_gas = code_len
                .checked_mul(CREATE_DATA_GAS)
                .ok_or(InternalError::Overflow)?;
            if frame.use_gas(store_gas) {
                self.db.set_code(contract_address, output.output.clone())?;
            } else {
                error = Some(VMError::CodeStoreOutOfGas);
            }
        }

        let keeps_state = matches!(error, None | Some(VMError::CodeStoreOutOfGas));
        if max_code_size_exceeded || !keeps_state {
            self.db.revert_to_snapshot(snapshot)?;
            let burned = !error.as_ref().is_some_and(VMError::is_revert_opcode);
            if burned {
                frame.gas = 0;
            }
            tracing::debug!(
                contract = %contract_address,
                max_code_size_exceeded,
                ?error,
                burned,
                "Contract creation reverted"
            );
        }
        if max_code_size_exceeded && error.is_none() {
            error = Some(VMError::MaxCodeSizeExceeded);
        }

        self.capture_end(
            started,
            &output.output,
            gas.saturating_sub(frame.gas),
            error.as_ref(),
        );

        let result = match error {
            Some(error) => TxResult::Revert(error),
            None => TxResult::Success,
        };
        Ok(ContextResult {
            result,
            gas_left: frame.gas,
            output: output.output,
            snapshot: Some(snapshot),
        })
    }

    /// Maps a failed precheck to the result handed back to the caller. Gas
    /// is untouched either way.
    fn run_precheck(&self, caller: Address, value: u64, gas: u64) -> Option<ContextResult> {
        match self.precheck(caller, value) {
            Precheck::Passed => None,
            Precheck::NotPermitted => {
                tracing::debug!(%caller, depth = self.depth(), "Nested call refused");
                Some(ContextResult::untouched(TxResult::Success, gas))
            }
            Precheck::Failed(error) => {
                tracing::debug!(%caller, value, %error, "Precheck failed");
                Some(ContextResult::untouched(TxResult::Revert(error), gas))
            }
        }
    }

    fn load_code(&self, frame: &mut CallFrame, address: Address) -> Result<(), VMError> {
        let code = self.db.get_code(address)?;
        let hash = self.db.get_code_hash(address)?;
        frame.set_call_code(address, hash, code);
        Ok(())
    }

    /// Runs the precompile or the code stored at `code_address` inside
    /// `frame`.
    fn execute_code_at(
        &mut self,
        caller: &dyn ContractRef,
        code_address: Address,
        frame: &mut CallFrame,
        input: &Bytes,
        read_only: bool,
    ) -> Result<InterpreterOutput, VMError> {
        if let Some(precompile) = self.resolve_precompile(code_address) {
            return self.execute_frame(Some(precompile), caller, frame, input, read_only);
        }
        self.load_code(frame, code_address)?;
        self.run_code(caller, frame, input, read_only)
    }

    /// Interprets `frame`. Empty code succeeds without spending gas.
    fn run_code(
        &mut self,
        caller: &dyn ContractRef,
        frame: &mut CallFrame,
        input: &Bytes,
        read_only: bool,
    ) -> Result<InterpreterOutput, VMError> {
        if !frame.has_code() {
            return Ok(InterpreterOutput::success(Bytes::new()));
        }
        self.execute_frame(None, caller, frame, input, read_only)
    }

    /// Applies the failure policy: revert to `snapshot` and burn the gas
    /// left unless the callee reverted explicitly.
    fn settle(
        &mut self,
        snapshot: SnapshotId,
        output: InterpreterOutput,
        gas_left: u64,
    ) -> Result<ContextResult, VMError> {
        let mut gas_left = gas_left;
        if let TxResult::Revert(error) = &output.result {
            self.db.revert_to_snapshot(snapshot)?;
            let burned = !error.is_revert_opcode();
            if burned {
                gas_left = 0;
            }
            tracing::debug!(%error, burned, snapshot, "Call reverted");
        }
        Ok(ContextResult {
            result: output.result,
            gas_left,
            output: output.output,
            snapshot: Some(snapshot),
        })
    }
}

fn destructed(gas: u64) -> ContextResult {
    ContextResult::untouched(TxResult::Revert(VMError::DestructedAccountCall), gas)
}
