//! L2CAP (Logical Link Control and Adaptation Protocol) client channels
//!
//! This module provides a blocking, record-preserving client channel on top
//! of the kernel's Bluetooth socket family:
//! - Opening a connection with negotiated MTUs and link security
//! - Readiness polling and cancellable blocking receives
//! - MTU-bounded sends that never fragment
//! - Link MTU, security and peer address queries

pub mod cancel;
pub mod channel;
pub mod constants;
pub mod psm;
pub mod readiness;
mod socket;
pub mod types;
#[cfg(test)]
mod tests;

// Re-export the public API
pub use self::cancel::{CancelToken, Cancellation, NeverCancel};
pub use self::channel::L2capChannel;
pub use self::psm::Psm;
pub use self::readiness::Readiness;
pub use self::types::*;
