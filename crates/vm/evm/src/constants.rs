use ethereum_types::H256;

/// Maximum depth of nested CALL/CREATE frames.
pub const CALL_CREATE_DEPTH: usize = 1024;

/// Maximum size of deployed contract code (EIP-170).
pub const MAX_CODE_SIZE: usize = 0x6000;

/// Gas charged per byte of deployed code.
pub const CREATE_DATA_GAS: u64 = 200;

/// 10^18, one ether in wei.
pub const ETH_UNIT: u64 = 1_000_000_000_000_000_000;

/// Native amount precision of the host ledger (1 coin = 10^8 units).
pub const DEFAULT_COIN_PRECISION: u64 = 100_000_000;

/// keccak256 of the empty byte string.
pub const EMPTY_CODE_HASH: H256 = H256([
    0xc5, 0xd2, 0x46, 0x01, 0x86, 0xf7, 0x23, 0x3c, 0x92, 0x7e, 0x7d, 0xb2, 0xdc, 0xc7, 0x03, 0xc0,
    0xe5, 0x00, 0xb6, 0x53, 0xca, 0x82, 0x27, 0x3b, 0x7b, 0xfa, 0xd8, 0x04, 0x5d, 0x85, 0xa4, 0x70,
]);

pub const WORD_SIZE_IN_BYTES_USIZE: usize = 32;
