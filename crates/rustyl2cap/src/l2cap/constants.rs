//! L2CAP protocol and kernel socket constants
//!
//! Values match `<bluetooth/bluetooth.h>` and `<bluetooth/l2cap.h>` from BlueZ.

use std::time::Duration;

// Socket family and protocol
pub const AF_BLUETOOTH: i32 = 31;
pub const BTPROTO_L2CAP: i32 = 0;

// Socket option level and names
pub const SOL_L2CAP: i32 = 6;
pub const L2CAP_OPTIONS: i32 = 0x01;
pub const L2CAP_LM: i32 = 0x03;

// Link mode bits (L2CAP_LM)
pub const L2CAP_LM_MASTER: u32 = 0x0001;
pub const L2CAP_LM_AUTH: u32 = 0x0002;
pub const L2CAP_LM_ENCRYPT: u32 = 0x0004;
pub const L2CAP_LM_TRUSTED: u32 = 0x0008;
pub const L2CAP_LM_RELIABLE: u32 = 0x0010;
pub const L2CAP_LM_SECURE: u32 = 0x0020;
pub const L2CAP_LM_FIPS: u32 = 0x0040;

// Protocol defaults
pub const L2CAP_DEFAULT_MTU: u16 = 672;
pub const L2CAP_DEFAULT_FLUSH_TO: u16 = 0xFFFF;

/// Interval of a single readiness wait.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Connect timeout accepted by `ConnectOptions::default()`.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
