//! Shared vocabulary of the lpvault core.
//!
//! This crate holds everything that both the ledger and the external code plugged into it
//! (protocol adapters, strategies, generic contracts) need to agree on: the typed call
//! messages and their return values, the event log entries, the error taxonomy and the
//! capability traits.

pub mod calls;
pub mod errors;
pub mod events;
pub mod models;
pub mod traits;

pub use alloy_primitives::{Address, Bytes, B256, U256};
pub use calls::{Call, ReturnData};
pub use errors::{CoreError, ErrorKind};
pub use events::{Event, LogEntry};
