use std::fmt;

use bytes::Bytes;
use ethereum_types::{Address, U256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use lazy_static::lazy_static;
use ripemd::Ripemd160;
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

use crate::{
    call_frame::{CallFrame, ContractRef},
    constants::WORD_SIZE_IN_BYTES_USIZE,
    errors::{ExceptionalHalt, PrecompileError, VMError},
    interpreter::InterpreterOutput,
    precision,
    utils::{keccak, left_pad_word, word_to_address},
    vm::Evm,
};

pub const ECRECOVER_COST: u64 = 3000;
pub const SHA2_256_STATIC_COST: u64 = 60;
pub const SHA2_256_DYNAMIC_BASE: u64 = 12;
pub const RIPEMD_160_STATIC_COST: u64 = 600;
pub const RIPEMD_160_DYNAMIC_BASE: u64 = 120;
pub const IDENTITY_STATIC_COST: u64 = 15;
pub const IDENTITY_DYNAMIC_BASE: u64 = 3;
pub const NATIVE_BALANCE_COST: u64 = 700;

pub const ECRECOVER_ADDRESS: Address = precompile_address(0x01);
pub const SHA2_256_ADDRESS: Address = precompile_address(0x02);
pub const RIPEMD_160_ADDRESS: Address = precompile_address(0x03);
pub const IDENTITY_ADDRESS: Address = precompile_address(0x04);
/// Host-ledger extension: reads an account's native balance.
pub const NATIVE_BALANCE_ADDRESS: Address = precompile_address(0x0100);

const fn precompile_address(low: u16) -> Address {
    let [high_byte, low_byte] = low.to_be_bytes();
    let mut bytes = [0u8; 20];
    bytes[18] = high_byte;
    bytes[19] = low_byte;
    ethereum_types::H160(bytes)
}

/// Native contract that only sees its input.
pub trait PrecompiledContract {
    fn name(&self) -> &'static str;
    fn required_gas(&self, input: &Bytes) -> u64;
    fn run(&self, input: &Bytes) -> Result<Bytes, PrecompileError>;
}

/// Native contract that can read and write ledger state through the [`Evm`].
pub trait StatefulPrecompiledContract {
    fn name(&self) -> &'static str;
    fn required_gas(&self, input: &Bytes) -> u64;
    fn run(
        &self,
        evm: &mut Evm<'_>,
        caller: &dyn ContractRef,
        input: &Bytes,
    ) -> Result<Bytes, VMError>;
}

#[derive(Clone, Copy)]
pub enum Precompile {
    Stateless(&'static (dyn PrecompiledContract + Sync)),
    Stateful(&'static (dyn StatefulPrecompiledContract + Sync)),
}

impl Precompile {
    pub fn name(&self) -> &'static str {
        match self {
            Precompile::Stateless(contract) => contract.name(),
            Precompile::Stateful(contract) => contract.name(),
        }
    }

    pub fn is_stateful(&self) -> bool {
        matches!(self, Precompile::Stateful(_))
    }

    fn required_gas(&self, input: &Bytes) -> u64 {
        match self {
            Precompile::Stateless(contract) => contract.required_gas(input),
            Precompile::Stateful(contract) => contract.required_gas(input),
        }
    }
}

impl fmt::Debug for Precompile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_stateful() {
            "Stateful"
        } else {
            "Stateless"
        };
        f.debug_tuple(kind).field(&self.name()).finish()
    }
}

struct Ecrecover;
struct Sha2256;
struct Ripemd160Hash;
struct Identity;
struct NativeBalance;

static ECRECOVER: Ecrecover = Ecrecover;
static SHA2_256: Sha2256 = Sha2256;
static RIPEMD_160: Ripemd160Hash = Ripemd160Hash;
static IDENTITY: Identity = Identity;
static NATIVE_BALANCE: NativeBalance = NativeBalance;

lazy_static! {
    static ref PRECOMPILED_CONTRACTS: FxHashMap<Address, &'static (dyn PrecompiledContract + Sync)> = {
        let mut contracts: FxHashMap<Address, &'static (dyn PrecompiledContract + Sync)> =
            FxHashMap::default();
        contracts.insert(ECRECOVER_ADDRESS, &ECRECOVER);
        contracts.insert(SHA2_256_ADDRESS, &SHA2_256);
        contracts.insert(RIPEMD_160_ADDRESS, &RIPEMD_160);
        contracts.insert(IDENTITY_ADDRESS, &IDENTITY);
        contracts
    };
    static ref STATEFUL_PRECOMPILED_CONTRACTS: FxHashMap<Address, &'static (dyn StatefulPrecompiledContract + Sync)> = {
        let mut contracts: FxHashMap<Address, &'static (dyn StatefulPrecompiledContract + Sync)> =
            FxHashMap::default();
        contracts.insert(NATIVE_BALANCE_ADDRESS, &NATIVE_BALANCE);
        contracts
    };
}

/// Finds the native contract installed at `address`. Stateless contracts
/// take precedence.
pub fn lookup(address: Address) -> Option<Precompile> {
    if let Some(contract) = PRECOMPILED_CONTRACTS.get(&address) {
        return Some(Precompile::Stateless(*contract));
    }
    STATEFUL_PRECOMPILED_CONTRACTS
        .get(&address)
        .map(|contract| Precompile::Stateful(*contract))
}

pub fn is_precompile(address: Address) -> bool {
    lookup(address).is_some()
}

/// Charges the contract's gas against `frame` and runs it.
///
/// Failures are reported through the returned output, except internal and
/// database faults which abort execution.
pub fn run_precompiled_contract(
    evm: &mut Evm<'_>,
    precompile: Precompile,
    caller: &dyn ContractRef,
    input: &Bytes,
    frame: &mut CallFrame,
) -> Result<InterpreterOutput, VMError> {
    if !frame.use_gas(precompile.required_gas(input)) {
        frame.gas = 0;
        return Ok(InterpreterOutput::revert(
            ExceptionalHalt::OutOfGas.into(),
            Bytes::new(),
        ));
    }

    let result = match precompile {
        Precompile::Stateless(contract) => contract.run(input).map_err(VMError::from),
        Precompile::Stateful(contract) => contract.run(evm, caller, input),
    };

    match result {
        Ok(output) => Ok(InterpreterOutput::success(output)),
        Err(error) if error.is_internal() => Err(error),
        Err(error) => Ok(InterpreterOutput::revert(error, Bytes::new())),
    }
}

/// `static_cost + dynamic_base * words(input)`, saturating so an absurd
/// input simply runs out of gas.
fn word_priced_gas(input: &Bytes, static_cost: u64, dynamic_base: u64) -> u64 {
    let words = u64::try_from(input.len().div_ceil(WORD_SIZE_IN_BYTES_USIZE)).unwrap_or(u64::MAX);
    dynamic_base
        .checked_mul(words)
        .and_then(|dynamic| dynamic.checked_add(static_cost))
        .unwrap_or(u64::MAX)
}

/// Right-pads `input` with zeros up to `target_len` bytes.
fn fill_with_zeros(input: &Bytes, target_len: usize) -> Bytes {
    if input.len() >= target_len {
        return input.clone();
    }
    let mut padded = input.to_vec();
    padded.resize(target_len, 0);
    padded.into()
}

impl PrecompiledContract for Ecrecover {
    fn name(&self) -> &'static str {
        "ECREC"
    }

    fn required_gas(&self, _input: &Bytes) -> u64 {
        ECRECOVER_COST
    }

    /// Recovers the signer of `hash || v || r || s`. Invalid signatures
    /// produce empty output rather than an error.
    fn run(&self, input: &Bytes) -> Result<Bytes, PrecompileError> {
        let input = fill_with_zeros(input, 128);
        let hash = input.get(0..32).ok_or(PrecompileError::ParsingInputError)?;
        let v = input.get(32..64).ok_or(PrecompileError::ParsingInputError)?;
        let signature = input.get(64..128).ok_or(PrecompileError::ParsingInputError)?;

        let (padding, v) = v.split_at(31);
        if padding.iter().any(|byte| *byte != 0) {
            return Ok(Bytes::new());
        }
        let recovery_id = match v.first() {
            Some(27) => RecoveryId::from_byte(0),
            Some(28) => RecoveryId::from_byte(1),
            _ => None,
        };
        let Some(recovery_id) = recovery_id else {
            return Ok(Bytes::new());
        };
        let Ok(signature) = Signature::from_slice(signature) else {
            return Ok(Bytes::new());
        };
        let Ok(key) = VerifyingKey::recover_from_prehash(hash, &signature, recovery_id) else {
            return Ok(Bytes::new());
        };

        let point = key.to_encoded_point(false);
        let public_key = point
            .as_bytes()
            .get(1..)
            .ok_or(PrecompileError::InvalidSignature)?;
        let public_key_hash = keccak(public_key);
        let address = public_key_hash
            .as_bytes()
            .get(12..)
            .ok_or(PrecompileError::InvalidAddress)?;
        Ok(left_pad_word(address))
    }
}

impl PrecompiledContract for Sha2256 {
    fn name(&self) -> &'static str {
        "SHA256"
    }

    fn required_gas(&self, input: &Bytes) -> u64 {
        word_priced_gas(input, SHA2_256_STATIC_COST, SHA2_256_DYNAMIC_BASE)
    }

    fn run(&self, input: &Bytes) -> Result<Bytes, PrecompileError> {
        Ok(Bytes::copy_from_slice(&Sha256::digest(input)))
    }
}

impl PrecompiledContract for Ripemd160Hash {
    fn name(&self) -> &'static str {
        "RIPEMD160"
    }

    fn required_gas(&self, input: &Bytes) -> u64 {
        word_priced_gas(input, RIPEMD_160_STATIC_COST, RIPEMD_160_DYNAMIC_BASE)
    }

    /// The 20-byte digest is left-padded to a full word.
    fn run(&self, input: &Bytes) -> Result<Bytes, PrecompileError> {
        Ok(left_pad_word(&Ripemd160::digest(input)))
    }
}

impl PrecompiledContract for Identity {
    fn name(&self) -> &'static str {
        "ID"
    }

    fn required_gas(&self, input: &Bytes) -> u64 {
        word_priced_gas(input, IDENTITY_STATIC_COST, IDENTITY_DYNAMIC_BASE)
    }

    fn run(&self, input: &Bytes) -> Result<Bytes, PrecompileError> {
        Ok(input.clone())
    }
}

impl StatefulPrecompiledContract for NativeBalance {
    fn name(&self) -> &'static str {
        "NATIVE_BALANCE"
    }

    fn required_gas(&self, _input: &Bytes) -> u64 {
        NATIVE_BALANCE_COST
    }

    /// Input is one word holding the account address. The balance is
    /// returned as a word, in 18 decimals when the transaction came in
    /// through the Ethereum-compatible path.
    fn run(
        &self,
        evm: &mut Evm<'_>,
        _caller: &dyn ContractRef,
        input: &Bytes,
    ) -> Result<Bytes, VMError> {
        let word = input
            .get(0..WORD_SIZE_IN_BYTES_USIZE)
            .ok_or(PrecompileError::ParsingInputError)?;
        let account = word_to_address(U256::from_big_endian(word));

        let balance = evm.db.get_balance(account)?;
        let balance = if evm.is_eth_tx() {
            precision::bridge_to_external(balance, evm.chain_config.coin_precision)?
        } else {
            U256::from(balance)
        };
        Ok(Bytes::copy_from_slice(&balance.to_big_endian()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    #[test]
    fn lookup_resolves_both_tables() {
        assert!(matches!(
            lookup(IDENTITY_ADDRESS),
            Some(Precompile::Stateless(_))
        ));
        assert!(matches!(
            lookup(NATIVE_BALANCE_ADDRESS),
            Some(Precompile::Stateful(_))
        ));
        assert!(lookup(precompile_address(0x05)).is_none());
        assert!(!is_precompile(Address::from_low_u64_be(0xdead)));
        assert_eq!(NATIVE_BALANCE_ADDRESS, Address::from_low_u64_be(0x100));
    }

    #[test]
    fn word_priced_gas_rounds_up_to_whole_words() {
        let input = Bytes::from(vec![0u8; 33]);
        assert_eq!(IDENTITY.required_gas(&input), 15 + 3 * 2);
        assert_eq!(SHA2_256.required_gas(&Bytes::new()), 60);
        assert_eq!(RIPEMD_160.required_gas(&Bytes::from(vec![1u8; 32])), 720);
    }

    #[test]
    fn sha256_and_ripemd160_digests() {
        let sha = SHA2_256.run(&Bytes::new()).unwrap();
        assert_eq!(
            hex::encode(sha),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        let ripemd = RIPEMD_160.run(&Bytes::new()).unwrap();
        assert_eq!(
            hex::encode(ripemd),
            "0000000000000000000000009c1185a5c5e9fc54612808977ee8f548b2258d31"
        );
    }

    #[test]
    fn ecrecover_returns_signer_address() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32].into()).unwrap();
        let point = signing_key.verifying_key().to_encoded_point(false);
        let pubkey_hash = keccak(&point.as_bytes()[1..]);
        let expected = &pubkey_hash.as_bytes()[12..];

        let digest = keccak(b"ledger").0;
        let (signature, recovery_id) = signing_key.sign_prehash_recoverable(&digest).unwrap();

        let mut input = digest.to_vec();
        let mut v = [0u8; 32];
        v[31] = 27 + recovery_id.to_byte();
        input.extend_from_slice(&v);
        input.extend_from_slice(&signature.to_bytes());

        let output = ECRECOVER.run(&Bytes::from(input)).unwrap();
        assert_eq!(output.len(), 32);
        assert_eq!(&output[12..], expected);
    }

    #[test]
    fn ecrecover_with_bad_v_returns_empty_output() {
        let mut input = vec![0u8; 128];
        input[63] = 29;
        assert!(ECRECOVER.run(&Bytes::from(input)).unwrap().is_empty());
        assert!(ECRECOVER.run(&Bytes::new()).unwrap().is_empty());
    }
}
