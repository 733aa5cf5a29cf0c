//! L2CAP socket implementation
//!
//! This module provides a thin wrapper around the raw Bluetooth socket
//! interface. Everything above it works with `io::Result` values from here
//! and attaches its own context.

use std::io;
use std::mem;
use std::os::unix::io::{AsRawFd, IntoRawFd, RawFd};

use super::constants::{AF_BLUETOOTH, BTPROTO_L2CAP};
use crate::addr::BdAddr;

// Define the sockaddr_l2 structure
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SockaddrL2 {
    pub l2_family: libc::sa_family_t,
    pub l2_psm: u16,
    pub l2_bdaddr: [u8; 6],
    pub l2_cid: u16,
    pub l2_bdaddr_type: u8,
}

impl SockaddrL2 {
    pub fn new(addr: BdAddr, psm: u16) -> Self {
        Self {
            l2_family: AF_BLUETOOTH as libc::sa_family_t,
            l2_psm: psm.to_le(),
            l2_bdaddr: addr.bytes,
            l2_cid: 0,
            l2_bdaddr_type: 0,
        }
    }

    pub fn addr(&self) -> BdAddr {
        BdAddr::new(self.l2_bdaddr)
    }

    fn as_sockaddr(&self) -> *const libc::sockaddr {
        self as *const _ as *const libc::sockaddr
    }
}

/// An L2CAP socket that is still being set up.
///
/// The descriptor is closed on drop until ownership is released with
/// [`IntoRawFd::into_raw_fd`].
#[derive(Debug)]
pub(crate) struct L2capSocket {
    fd: RawFd,
}

impl L2capSocket {
    /// Opens a sequenced-packet L2CAP socket
    pub fn new() -> io::Result<Self> {
        let fd = unsafe {
            libc::socket(
                AF_BLUETOOTH,
                libc::SOCK_SEQPACKET | libc::SOCK_CLOEXEC,
                BTPROTO_L2CAP,
            )
        };

        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(L2capSocket { fd })
    }

    pub fn bind(&self, addr: &SockaddrL2) -> io::Result<()> {
        let result = unsafe {
            libc::bind(
                self.fd,
                addr.as_sockaddr(),
                mem::size_of::<SockaddrL2>() as libc::socklen_t,
            )
        };
        cvt(result).map(drop)
    }

    /// Blocks until the kernel has established or refused the connection.
    pub fn connect(&self, addr: &SockaddrL2) -> io::Result<()> {
        let result = unsafe {
            libc::connect(
                self.fd,
                addr.as_sockaddr(),
                mem::size_of::<SockaddrL2>() as libc::socklen_t,
            )
        };
        cvt(result).map(drop)
    }
}

impl AsRawFd for L2capSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl IntoRawFd for L2capSocket {
    fn into_raw_fd(self) -> RawFd {
        let fd = self.fd;
        mem::forget(self);
        fd
    }
}

impl Drop for L2capSocket {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.fd);
        }
    }
}

fn cvt(result: libc::c_int) -> io::Result<libc::c_int> {
    if result < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(result)
    }
}

fn cvt_size(result: libc::ssize_t) -> io::Result<usize> {
    if result < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(result as usize)
    }
}

/// Reads a fixed-size socket option.
pub(crate) fn getsockopt<T: Copy + Default>(fd: RawFd, level: i32, name: i32) -> io::Result<T> {
    let mut value = T::default();
    let mut len = mem::size_of::<T>() as libc::socklen_t;
    let result = unsafe {
        libc::getsockopt(
            fd,
            level,
            name,
            &mut value as *mut T as *mut libc::c_void,
            &mut len,
        )
    };
    cvt(result)?;
    Ok(value)
}

/// Writes a fixed-size socket option.
pub(crate) fn setsockopt<T: Copy>(fd: RawFd, level: i32, name: i32, value: &T) -> io::Result<()> {
    let result = unsafe {
        libc::setsockopt(
            fd,
            level,
            name,
            value as *const T as *const libc::c_void,
            mem::size_of::<T>() as libc::socklen_t,
        )
    };
    cvt(result).map(drop)
}

fn check_family(addr: &SockaddrL2) -> io::Result<()> {
    if addr.l2_family != AF_BLUETOOTH as libc::sa_family_t {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "socket address family is not AF_BLUETOOTH",
        ));
    }
    Ok(())
}

pub(crate) fn peer_addr(fd: RawFd) -> io::Result<SockaddrL2> {
    let mut addr = SockaddrL2::default();
    let mut len = mem::size_of::<SockaddrL2>() as libc::socklen_t;
    let result = unsafe {
        libc::getpeername(fd, &mut addr as *mut _ as *mut libc::sockaddr, &mut len)
    };
    cvt(result)?;
    check_family(&addr)?;
    Ok(addr)
}

pub(crate) fn local_addr(fd: RawFd) -> io::Result<SockaddrL2> {
    let mut addr = SockaddrL2::default();
    let mut len = mem::size_of::<SockaddrL2>() as libc::socklen_t;
    let result = unsafe {
        libc::getsockname(fd, &mut addr as *mut _ as *mut libc::sockaddr, &mut len)
    };
    cvt(result)?;
    check_family(&addr)?;
    Ok(addr)
}

/// Receives one record into `buf`.
pub(crate) fn recv(fd: RawFd, buf: &mut [u8]) -> io::Result<usize> {
    let result = unsafe { libc::recv(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len(), 0) };
    cvt_size(result)
}

/// Sends `buf` as one record.
pub(crate) fn send(fd: RawFd, buf: &[u8]) -> io::Result<usize> {
    let result = unsafe {
        libc::send(
            fd,
            buf.as_ptr() as *const libc::c_void,
            buf.len(),
            libc::MSG_NOSIGNAL,
        )
    };
    cvt_size(result)
}

pub(crate) fn shutdown(fd: RawFd) -> io::Result<()> {
    cvt(unsafe { libc::shutdown(fd, libc::SHUT_RDWR) }).map(drop)
}

pub(crate) fn close(fd: RawFd) -> io::Result<()> {
    cvt(unsafe { libc::close(fd) }).map(drop)
}
