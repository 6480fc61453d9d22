use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

use crate::constants::EMPTY_CODE_HASH;

/// Anything that can appear as the caller of a contract call: an external
/// account or a contract frame that is currently executing.
pub trait ContractRef {
    fn address(&self) -> Address;

    /// The executing frame behind this caller, when there is one.
    fn as_call_frame(&self) -> Option<&CallFrame> {
        None
    }
}

impl ContractRef for Address {
    fn address(&self) -> Address {
        *self
    }
}

/// Execution scope of one contract call.
///
/// Frames live only for the duration of the call that created them and are
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallFrame {
    /// Address reported by CALLER.
    pub caller_address: Address,
    /// Account whose storage and balance the code operates on.
    pub address: Address,
    /// Account the executing code was loaded from.
    pub code_address: Option<Address>,
    pub code: Bytes,
    pub code_hash: H256,
    /// Gas still available to this frame.
    pub gas: u64,
    /// Value attached to the call, already bridged when applicable.
    pub value: U256,
    /// Set for DELEGATECALL frames, which act fully on behalf of the
    /// caller's caller.
    pub delegate: bool,
}

impl CallFrame {
    pub fn new(caller: &dyn ContractRef, address: Address, value: U256, gas: u64) -> Self {
        Self {
            caller_address: caller.address(),
            address,
            code_address: None,
            code: Bytes::new(),
            code_hash: EMPTY_CODE_HASH,
            gas,
            value,
            delegate: false,
        }
    }

    pub fn set_call_code(&mut self, code_address: Address, code_hash: H256, code: Bytes) {
        self.code_address = Some(code_address);
        self.code_hash = code_hash;
        self.code = code;
    }

    /// Turns this frame into a delegate of `parent`: it inherits the
    /// parent's caller and value.
    pub fn into_delegate(mut self, parent: &CallFrame) -> Self {
        self.delegate = true;
        self.caller_address = parent.caller_address;
        self.value = parent.value;
        self
    }

    /// Consumes `amount` gas. Returns false, leaving the frame untouched,
    /// when not enough gas is left.
    pub fn use_gas(&mut self, amount: u64) -> bool {
        match self.gas.checked_sub(amount) {
            Some(remaining) => {
                self.gas = remaining;
                true
            }
            None => false,
        }
    }

    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }
}

impl ContractRef for CallFrame {
    fn address(&self) -> Address {
        self.address
    }

    fn as_call_frame(&self) -> Option<&CallFrame> {
        Some(self)
    }
}
