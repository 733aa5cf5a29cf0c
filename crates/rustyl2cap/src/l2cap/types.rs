//! Type definitions for L2CAP operations
//!
//! This module contains the value types exchanged with the kernel and with
//! callers of [`L2capChannel`](super::L2capChannel).

use bitflags::bitflags;
use std::fmt;
use std::time::Duration;

use super::constants::*;

/// L2CAP link options, laid out exactly like the kernel's `struct l2cap_options`.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LinkOptions {
    /// Outbound MTU (`omtu`)
    pub transmit_mtu: u16,
    /// Inbound MTU (`imtu`)
    pub receive_mtu: u16,
    /// Flush timeout (`flush_to`)
    pub flush_timeout: u16,
    pub mode: u8,
    pub fcs: u8,
    pub max_tx: u8,
    pub txwin_size: u16,
}

impl LinkOptions {
    /// Options requested when opening a client channel.
    ///
    /// A missing or zero transmit MTU falls back to [`L2CAP_DEFAULT_MTU`].
    pub fn requested(receive_mtu: u16, transmit_mtu: Option<u16>) -> Self {
        Self {
            receive_mtu,
            transmit_mtu: transmit_mtu
                .filter(|&mtu| mtu > 0)
                .unwrap_or(L2CAP_DEFAULT_MTU),
            flush_timeout: L2CAP_DEFAULT_FLUSH_TO,
            ..Self::default()
        }
    }
}

bitflags! {
    /// Link mode bits read from and written to `L2CAP_LM`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LinkMode: u32 {
        const MASTER = L2CAP_LM_MASTER;
        const AUTH = L2CAP_LM_AUTH;
        const ENCRYPT = L2CAP_LM_ENCRYPT;
        const TRUSTED = L2CAP_LM_TRUSTED;
        const RELIABLE = L2CAP_LM_RELIABLE;
        const SECURE = L2CAP_LM_SECURE;
        const FIPS = L2CAP_LM_FIPS;
    }
}

impl LinkMode {
    /// Bits requested by a caller asking for authentication and/or encryption.
    pub fn requested(authenticate: bool, encrypt: bool) -> Self {
        let mut mode = LinkMode::empty();
        mode.set(LinkMode::AUTH, authenticate);
        mode.set(LinkMode::ENCRYPT, encrypt);
        mode
    }

    /// Merges `requested` into the current mode.
    ///
    /// Returns `None` when the merge would not change anything, in which case
    /// the kernel link mode must be left untouched.
    pub fn merge(self, requested: LinkMode) -> Option<LinkMode> {
        let merged = self | requested;
        if merged == self {
            None
        } else {
            Some(merged)
        }
    }
}

/// Security classification of a connected channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SecurityOpt {
    /// Neither authentication nor encryption is enforced
    Plaintext = 0,
    /// Authentication is enforced; takes precedence over the encryption bits
    Authenticated = 1,
    /// Encryption is enforced without authentication
    Encrypted = 2,
}

impl SecurityOpt {
    pub fn classify(mode: LinkMode) -> Self {
        if mode.contains(LinkMode::AUTH) {
            SecurityOpt::Authenticated
        } else if mode.intersects(LinkMode::ENCRYPT | LinkMode::SECURE) {
            SecurityOpt::Encrypted
        } else {
            SecurityOpt::Plaintext
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<LinkMode> for SecurityOpt {
    fn from(mode: LinkMode) -> Self {
        Self::classify(mode)
    }
}

impl fmt::Display for SecurityOpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plaintext => write!(f, "Plaintext"),
            Self::Authenticated => write!(f, "Authenticated"),
            Self::Encrypted => write!(f, "Encrypted"),
        }
    }
}

/// Outcome of a blocking receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Received {
    /// One record of this many bytes was placed at the start of the buffer
    Data(usize),
    /// The wait was cancelled before any record arrived
    Cancelled,
}

impl Received {
    pub fn len(&self) -> Option<usize> {
        match self {
            Received::Data(n) => Some(*n),
            Received::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Received::Cancelled)
    }
}

/// Per-channel settings retained for the lifetime of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Also bound reads by the kernel imtu and writes by the kernel omtu
    pub truncate_to_mtu: bool,
    /// Length of one readiness wait
    pub poll_interval: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            truncate_to_mtu: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Parameters for opening a client channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Require an authenticated link
    pub authenticate: bool,
    /// Require an encrypted link
    pub encrypt: bool,
    /// Inbound MTU requested from the kernel
    pub receive_mtu: u16,
    /// Outbound MTU requested from the kernel; `None` uses the protocol default
    pub transmit_mtu: Option<u16>,
    /// Advisory connect timeout. The kernel decides how long `connect` blocks;
    /// this value is logged, not enforced.
    pub timeout: Duration,
    pub channel: ChannelConfig,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            authenticate: false,
            encrypt: false,
            receive_mtu: L2CAP_DEFAULT_MTU,
            transmit_mtu: None,
            timeout: DEFAULT_CONNECT_TIMEOUT,
            channel: ChannelConfig::default(),
        }
    }
}

impl ConnectOptions {
    pub fn with_authenticate(mut self, authenticate: bool) -> Self {
        self.authenticate = authenticate;
        self
    }

    pub fn with_encrypt(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }

    pub fn with_receive_mtu(mut self, mtu: u16) -> Self {
        self.receive_mtu = mtu;
        self
    }

    pub fn with_transmit_mtu(mut self, mtu: u16) -> Self {
        self.transmit_mtu = Some(mtu);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_truncate_to_mtu(mut self, truncate: bool) -> Self {
        self.channel.truncate_to_mtu = truncate;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.channel.poll_interval = interval;
        self
    }

    pub(crate) fn link_options(&self) -> LinkOptions {
        LinkOptions::requested(self.receive_mtu, self.transmit_mtu)
    }

    pub(crate) fn link_mode(&self) -> LinkMode {
        LinkMode::requested(self.authenticate, self.encrypt)
    }
}

/// Number of bytes handed to the kernel for one outgoing record.
///
/// `kernel_mtu` is only supplied when MTU truncation is enabled.
pub fn outgoing_len(buf_len: usize, transmit_mtu: u16, kernel_mtu: Option<u16>) -> usize {
    let len = buf_len.min(usize::from(transmit_mtu));
    match kernel_mtu {
        Some(mtu) => len.min(usize::from(mtu)),
        None => len,
    }
}

/// Number of bytes a receive may place in a buffer of `buf_len`.
pub fn incoming_len(buf_len: usize, kernel_mtu: Option<u16>) -> usize {
    match kernel_mtu {
        Some(mtu) => buf_len.min(usize::from(mtu)),
        None => buf_len,
    }
}
