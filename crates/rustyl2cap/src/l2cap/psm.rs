//! Protocol/Service Multiplexer (PSM) values for L2CAP
//!
//! The discovery layer hands us a raw channel number; `Psm` keeps it typed
//! until it is written into `sockaddr_l2`.

use std::fmt;

/// Protocol/Service Multiplexer identifying the remote service endpoint.
///
/// See Bluetooth Core Specification Vol 3, Part A, Section 4.2 and the
/// assigned numbers for logical link control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Psm(pub u16);

impl Psm {
    /// Service Discovery Protocol
    pub const SDP: Psm = Psm(0x0001);
    /// RFCOMM protocol
    pub const RFCOMM: Psm = Psm(0x0003);
    /// BNEP protocol
    pub const BNEP: Psm = Psm(0x000F);
    /// HID Control
    pub const HID_CONTROL: Psm = Psm(0x0011);
    /// HID Interrupt
    pub const HID_INTERRUPT: Psm = Psm(0x0013);
    /// AVCTP protocol
    pub const AVCTP: Psm = Psm(0x0017);
    /// AVDTP protocol
    pub const AVDTP: Psm = Psm(0x0019);
    /// AVCTP Browsing
    pub const AVCTP_BROWSING: Psm = Psm(0x001B);
    /// ATT protocol
    pub const ATT: Psm = Psm(0x001F);

    /// First PSM available for dynamic assignment on BR/EDR.
    pub const DYNAMIC_START: u16 = 0x1001;

    pub fn value(&self) -> u16 {
        self.0
    }

    /// A BR/EDR PSM must be odd and have the lowest bit of its upper byte clear.
    pub fn is_valid(&self) -> bool {
        self.0 & 0x0001 == 0x0001 && self.0 & 0x0100 == 0
    }

    pub fn is_dynamic(&self) -> bool {
        self.0 >= Self::DYNAMIC_START
    }

    fn name(&self) -> Option<&'static str> {
        match *self {
            Psm::SDP => Some("SDP"),
            Psm::RFCOMM => Some("RFCOMM"),
            Psm::BNEP => Some("BNEP"),
            Psm::HID_CONTROL => Some("HID-Control"),
            Psm::HID_INTERRUPT => Some("HID-Interrupt"),
            Psm::AVCTP => Some("AVCTP"),
            Psm::AVDTP => Some("AVDTP"),
            Psm::AVCTP_BROWSING => Some("AVCTP-Browsing"),
            Psm::ATT => Some("ATT"),
            _ => None,
        }
    }
}

impl From<u16> for Psm {
    fn from(value: u16) -> Self {
        Psm(value)
    }
}

impl From<Psm> for u16 {
    fn from(psm: Psm) -> Self {
        psm.0
    }
}

impl fmt::Display for Psm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:04X})", name, self.0),
            None => write!(f, "PSM 0x{:04X}", self.0),
        }
    }
}
