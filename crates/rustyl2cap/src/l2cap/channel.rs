//! L2CAP Channel implementation
//!
//! [`L2capChannel`] is one client connection over a kernel `SOCK_SEQPACKET`
//! L2CAP socket. The kernel descriptor carries all connection state; the
//! channel only adds the settings it was opened with.
//!
//! A channel may be shared by one reader and one writer thread. There is no
//! locking around the descriptor: `close` swaps it for `-1`, and every other
//! operation started afterwards reports [`L2capError::ConnectionClosed`].
//! A `recv` or `send` already past its descriptor load is not protected, so
//! callers must not close while such a call is in flight.

use std::fmt;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering};

use log::{debug, log_enabled, trace, warn, Level};

use super::cancel::{Cancellation, NeverCancel};
use super::constants::{L2CAP_LM, L2CAP_OPTIONS, SOL_L2CAP};
use super::psm::Psm;
use super::readiness::{self, Readiness};
use super::socket::{self, L2capSocket, SockaddrL2};
use super::types::*;
use crate::addr::BdAddr;
use crate::error::{L2capError, L2capResult};

const CLOSED: RawFd = -1;

/// A connected L2CAP client channel
pub struct L2capChannel {
    fd: AtomicI32,
    config: ChannelConfig,
}

impl L2capChannel {
    /// Opens a client channel to `remote` on `psm`.
    ///
    /// The socket is bound to `local` (use [`BdAddr::any`] to let the kernel
    /// choose the adapter), configured with the requested MTUs and link mode,
    /// then connected. `options.timeout` is advisory: `connect` blocks for as
    /// long as the kernel allows.
    ///
    /// On any failure the socket is released before the error is returned.
    pub fn open(
        local: BdAddr,
        remote: BdAddr,
        psm: impl Into<Psm>,
        options: &ConnectOptions,
    ) -> L2capResult<Self> {
        let psm = psm.into();
        debug!(
            "L2CAP connect {} -> {}, {}, timeout {:?}",
            local, remote, psm, options.timeout
        );

        let sock = L2capSocket::new().map_err(|e| L2capError::io("Failed to create socket", e))?;
        let fd = sock.as_raw_fd();

        // psm 0: the kernel assigns a dynamic channel to client sockets
        sock.bind(&SockaddrL2::new(local, 0))
            .map_err(|e| L2capError::io("Failed to bind socket", e))?;

        let link_options = options.link_options();
        debug!(
            "L2CAP set imtu {}, omtu {}",
            link_options.receive_mtu, link_options.transmit_mtu
        );
        socket::setsockopt(fd, SOL_L2CAP, L2CAP_OPTIONS, &link_options)
            .map_err(|e| L2capError::io("Failed to set L2CAP mtu options", e))?;

        let requested = options.link_mode();
        if !requested.is_empty() {
            let bits: u32 = socket::getsockopt(fd, SOL_L2CAP, L2CAP_LM)
                .map_err(|e| L2capError::io("Failed to read L2CAP link mode", e))?;
            if let Some(mode) = LinkMode::from_bits_retain(bits).merge(requested) {
                debug!("L2CAP set link mode {:?}", mode);
                socket::setsockopt(fd, SOL_L2CAP, L2CAP_LM, &mode.bits())
                    .map_err(|e| L2capError::io("Failed to set L2CAP link mode", e))?;
            }
        }

        sock.connect(&SockaddrL2::new(remote, psm.value()))
            .map_err(|e| L2capError::io("Failed to connect", e))?;
        debug!("L2CAP connected, handle {}", fd);

        let negotiated: LinkOptions = socket::getsockopt(fd, SOL_L2CAP, L2CAP_OPTIONS)
            .map_err(|e| L2capError::io("Failed to get L2CAP link mtu", e))?;
        debug!(
            "L2CAP imtu {}, omtu {}",
            negotiated.receive_mtu, negotiated.transmit_mtu
        );

        Ok(Self {
            fd: AtomicI32::new(sock.into_raw_fd()),
            config: options.channel,
        })
    }

    /// Adopts an already connected sequenced-packet socket.
    ///
    /// # Safety
    ///
    /// `fd` must be an open socket descriptor owned by nobody else.
    pub unsafe fn from_raw_fd_with_config(fd: RawFd, config: ChannelConfig) -> Self {
        Self {
            fd: AtomicI32::new(fd),
            config,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.fd.load(Ordering::SeqCst) == CLOSED
    }

    fn fd(&self) -> L2capResult<RawFd> {
        match self.fd.load(Ordering::SeqCst) {
            CLOSED => Err(L2capError::ConnectionClosed),
            fd => Ok(fd),
        }
    }

    /// A hang-up observed after a local `close` is the local close, not the peer.
    fn settle(&self, state: Readiness) -> Readiness {
        match state {
            Readiness::PeerClosed if self.is_closed() => Readiness::LocallyClosed,
            other => other,
        }
    }

    /// Reports whether a record can be received without blocking.
    ///
    /// Waits at most one poll interval. `Ok(false)` means nothing happened
    /// yet and the caller should ask again.
    pub fn ready(&self) -> L2capResult<bool> {
        let fd = self.fd.load(Ordering::SeqCst);
        let state = self.settle(readiness::wait(fd, self.config.poll_interval, &NeverCancel));
        match state {
            Readiness::Ready => Ok(true),
            Readiness::Waiting | Readiness::Cancelled => Ok(false),
            failed => Err(failed.into_error().unwrap_or(L2capError::ConnectionClosed)),
        }
    }

    /// Blocks until one record arrives and copies it into `buf`.
    ///
    /// A record longer than `buf` is truncated by the kernel; the rest of it
    /// is discarded. Returns [`Received::Cancelled`] if `cancel` fires first.
    pub fn receive<C: Cancellation + ?Sized>(
        &self,
        buf: &mut [u8],
        cancel: &C,
    ) -> L2capResult<Received> {
        if buf.is_empty() {
            return Err(L2capError::InvalidArgument(
                "receive buffer is empty".to_string(),
            ));
        }

        let kernel_mtu = if self.config.truncate_to_mtu {
            Some(self.link_options()?.receive_mtu)
        } else {
            None
        };

        let fd = loop {
            let fd = self.fd.load(Ordering::SeqCst);
            match self.settle(readiness::wait(fd, self.config.poll_interval, cancel)) {
                Readiness::Waiting => continue,
                Readiness::Ready => break fd,
                Readiness::Cancelled => return Ok(Received::Cancelled),
                failed => {
                    return Err(failed.into_error().unwrap_or(L2capError::ConnectionClosed))
                }
            }
        };

        let len = incoming_len(buf.len(), kernel_mtu);
        let count = socket::recv(fd, &mut buf[..len])
            .map_err(|e| L2capError::io("Failed to read", e))?;

        if log_enabled!(Level::Trace) {
            trace!("receive[] returns {}: {}", count, hex::encode(&buf[..count]));
        }
        Ok(Received::Data(count))
    }

    /// Sends at most `transmit_mtu` bytes of `data` as one record.
    ///
    /// Bytes beyond the MTU are dropped, never sent in a second record.
    /// Returns the number of bytes the kernel accepted.
    pub fn send(&self, data: &[u8], transmit_mtu: u16) -> L2capResult<usize> {
        let fd = self.fd()?;

        let kernel_mtu = if self.config.truncate_to_mtu {
            Some(self.link_options()?.transmit_mtu)
        } else {
            None
        };
        let len = outgoing_len(data.len(), transmit_mtu, kernel_mtu);

        let count = socket::send(fd, &data[..len])
            .map_err(|e| L2capError::io("Failed to write", e))?;
        if count < len {
            warn!("L2CAP short write on handle {}: {} of {} bytes", fd, count, len);
        }

        if log_enabled!(Level::Trace) {
            trace!("send[] {} bytes: {}", count, hex::encode(&data[..count]));
        }
        Ok(count)
    }

    /// Reads the current link options from the kernel.
    pub fn link_options(&self) -> L2capResult<LinkOptions> {
        let fd = self.fd()?;
        socket::getsockopt(fd, SOL_L2CAP, L2CAP_OPTIONS)
            .map_err(|e| L2capError::io("Failed to get L2CAP link mtu", e))
    }

    pub fn receive_mtu(&self) -> L2capResult<u16> {
        Ok(self.link_options()?.receive_mtu)
    }

    pub fn transmit_mtu(&self) -> L2capResult<u16> {
        Ok(self.link_options()?.transmit_mtu)
    }

    /// Reads the raw link mode bits.
    pub fn link_mode(&self) -> L2capResult<LinkMode> {
        let fd = self.fd()?;
        let bits: u32 = socket::getsockopt(fd, SOL_L2CAP, L2CAP_LM).map_err(|e| {
            L2capError::io(format!("Failed to get L2CAP ({}) link mode", fd), e)
        })?;
        Ok(LinkMode::from_bits_retain(bits))
    }

    /// Classifies the link security of this channel.
    ///
    /// `expected` does not influence the result; a mismatch is only logged.
    pub fn security_opt(&self, expected: Option<SecurityOpt>) -> L2capResult<SecurityOpt> {
        let actual = SecurityOpt::classify(self.link_mode()?);
        if let Some(expected) = expected.filter(|&e| e != actual) {
            debug!("L2CAP security is {}, expected {}", actual, expected);
        }
        Ok(actual)
    }

    pub fn remote_address(&self) -> L2capResult<BdAddr> {
        let fd = self.fd()?;
        let addr = socket::peer_addr(fd).map_err(|e| {
            L2capError::io(format!("Failed to get L2CAP ({}) peer name", fd), e)
        })?;
        Ok(addr.addr())
    }

    pub fn local_address(&self) -> L2capResult<BdAddr> {
        let fd = self.fd()?;
        let addr = socket::local_addr(fd).map_err(|e| {
            L2capError::io(format!("Failed to get L2CAP ({}) local name", fd), e)
        })?;
        Ok(addr.addr())
    }

    /// Shuts the channel down in both directions and releases the descriptor.
    ///
    /// A failed shutdown is only logged. Calling this on a channel that is
    /// already closed returns the kernel's `EBADF` error.
    pub fn close(&self) -> L2capResult<()> {
        let fd = self.fd.swap(CLOSED, Ordering::SeqCst);
        debug!("L2CAP disconnect, handle {}", fd);

        // Further sends and receives are disallowed from here on.
        if let Err(e) = socket::shutdown(fd) {
            debug!("shutdown failed. [{}] {}", e.raw_os_error().unwrap_or(0), e);
        }
        socket::close(fd).map_err(|e| L2capError::io("Failed to close socket", e))
    }
}

impl fmt::Debug for L2capChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("L2capChannel")
            .field("fd", &self.fd.load(Ordering::SeqCst))
            .field("config", &self.config)
            .finish()
    }
}

impl AsRawFd for L2capChannel {
    /// Returns `-1` once the channel is closed.
    fn as_raw_fd(&self) -> RawFd {
        self.fd.load(Ordering::SeqCst)
    }
}

impl FromRawFd for L2capChannel {
    unsafe fn from_raw_fd(fd: RawFd) -> Self {
        Self::from_raw_fd_with_config(fd, ChannelConfig::default())
    }
}

impl IntoRawFd for L2capChannel {
    fn into_raw_fd(self) -> RawFd {
        self.fd.swap(CLOSED, Ordering::SeqCst)
    }
}

impl Drop for L2capChannel {
    fn drop(&mut self) {
        let fd = self.fd.swap(CLOSED, Ordering::SeqCst);
        if fd != CLOSED {
            let _ = socket::close(fd);
        }
    }
}
