use bytes::Bytes;
use ethereum_types::{Address, H256, U256};
use sha3::{Digest, Keccak256};

use crate::constants::{EMPTY_CODE_HASH, WORD_SIZE_IN_BYTES_USIZE};

pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(&Keccak256::digest(data.as_ref()))
}

/// Hash used to key contract code. Empty code maps to [`EMPTY_CODE_HASH`].
pub fn code_hash(code: &Bytes) -> H256 {
    if code.is_empty() {
        EMPTY_CODE_HASH
    } else {
        keccak(code)
    }
}

/// Takes the low 20 bytes of a 32-byte big-endian word.
pub fn word_to_address(word: U256) -> Address {
    let bytes = word.to_big_endian();
    Address::from_slice(bytes.get(12..).unwrap_or_default())
}

pub fn address_to_word(address: Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

/// Left-pads `data` with zeros to a full word; longer input is returned as is.
pub fn left_pad_word(data: &[u8]) -> Bytes {
    let mut padded = vec![0u8; WORD_SIZE_IN_BYTES_USIZE.saturating_sub(data.len())];
    padded.extend_from_slice(data);
    Bytes::from(padded)
}
