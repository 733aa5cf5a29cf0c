//! Bluetooth device address
//!
//! Addresses travel as 64-bit integers outside this crate and as the 6-byte
//! little-endian `bdaddr_t` layout inside kernel structures. `bytes[0]` is the
//! least-significant byte of the integer form.

use std::fmt;
use std::str::FromStr;

use crate::error::L2capError;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    /// `BDADDR_ANY`: lets the kernel pick the local adapter.
    pub const fn any() -> Self {
        Self { bytes: [0; 6] }
    }

    /// Packs the address into the low 48 bits of a `u64`.
    pub fn to_u64(&self) -> u64 {
        self.bytes
            .iter()
            .rev()
            .fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }

    /// Unpacks the low 48 bits of `value`; the upper 16 bits are ignored.
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 6];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = (value >> (8 * i)) as u8;
        }
        Self { bytes }
    }
}

impl From<u64> for BdAddr {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl From<BdAddr> for u64 {
    fn from(addr: BdAddr) -> Self {
        addr.to_u64()
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}

impl FromStr for BdAddr {
    type Err = L2capError;

    /// Parses `AA:BB:CC:DD:EE:FF`, most-significant byte first.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || L2capError::InvalidArgument(format!("invalid device address '{}'", s));

        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            if part.len() != 2 {
                return Err(invalid());
            }
            bytes[5 - i] = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }
        Ok(Self { bytes })
    }
}
