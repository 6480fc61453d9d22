//! # Ledger EVM
//!
//! The call dispatcher of an Ethereum-compatible execution engine running
//! inside a host ledger whose native amounts use a different precision.
//!
//! ## Overview
//!
//! The crate decides, for every contract invocation, how execution is
//! isolated and how gas is accounted across nested calls:
//! - **Call variants**: CALL, CALLCODE, DELEGATECALL, STATICCALL and CREATE
//! - **Isolation**: one state snapshot per call, reverted on failure
//! - **Gas policy**: failures burn the remaining gas, explicit reverts keep it
//! - **Value bridging**: native amounts are scaled to 18 decimals for
//!   transactions submitted through the Ethereum-compatible path
//!
//! Opcode execution is delegated to an [`interpreter::Interpreter`]
//! supplied by the host.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Evm                                │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │  Precheck   │  │ Precompiles │  │    Environment      │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘ │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐ │
//! │  │  CallFrame  │  │  Precision  │  │  Abort flag/guards  │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//!           │                                   ▲
//!           ▼                                   │ nested calls
//! ┌──────────────────────┐            ┌─────────────────────────┐
//! │       StateDb        │            │       Interpreter       │
//! │ (snapshots, accounts)│            │   (host-provided loop)  │
//! └──────────────────────┘            └─────────────────────────┘
//! ```
//!
//! ## Key Components
//!
//! - [`vm::Evm`]: the instance bound to one transaction
//! - [`call_frame::CallFrame`]: execution scope of each call
//! - [`db::StateDb`]: state view with snapshot/revert
//! - [`environment::Environment`]: block and transaction context
//! - [`precompiles`]: native contracts, stateless and stateful
//! - [`precision`]: native ↔ 18-decimal amount conversion
//!
//! ## Usage
//!
//! ```ignore
//! use ledger_evm::{Evm, Environment};
//!
//! let mut evm = Evm::new(env, &mut db, VMConfig::default(), chain_config, interpreter)?;
//! let result = evm.call(&origin, contract, input, gas, value)?;
//!
//! if result.is_success() {
//!     println!("Gas left: {}", result.gas_left);
//! }
//! ```

pub mod call_frame;
pub mod call_handlers;
pub mod config;
pub mod constants;
pub mod db;
pub mod environment;
pub mod errors;
pub mod interpreter;
pub mod precision;
pub mod precompiles;
pub mod tracing;
pub mod utils;
pub mod vm;

pub use call_frame::{CallFrame, ContractRef};
pub use config::{ChainConfig, ConfigError, VMConfig};
pub use environment::*;
pub use errors::{ContextResult, TxResult, VMError};
pub use interpreter::{Interpreter, InterpreterOutput};
pub use vm::{AbortHandle, Evm};
