use super::*;

const FRAGMENT: u64 = 1 << 0;
const ADMIN_RECORD: u64 = 1 << 1;
const NO_FRAGMENT: u64 = 1 << 2;
const CUSTODY_REQUEST: u64 = 1 << 3;
const SINGLETON: u64 = 1 << 4;
const ACK_REQUEST: u64 = 1 << 5;
const COS_MASK: u64 = 0x3 << 7;
const COS_SHIFT: u64 = 7;

/// The decoded processing-control flags of the primary block.
///
/// RFC 5050 Section 4.2 packs these into a single SDNV. Note that the wire
/// carries a *must not fragment* bit; it is inverted here so the field reads
/// the same way as the channel attribute that sets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleFlags {
    /// The bundle's application data unit is an administrative record.
    pub is_admin: bool,
    /// The bundle is a fragment.
    pub is_frag: bool,
    /// The bundle may be fragmented in transit.
    pub allow_frag: bool,
    /// Custody transfer is requested.
    pub request_custody: bool,
    /// The destination is a singleton endpoint.
    pub is_singleton: bool,
    /// Application acknowledgement is requested.
    pub ack_app: bool,
    /// Class of service: 0 bulk, 1 normal, 2 expedited.
    pub cos: u8,
    /// Any wire bits this implementation does not interpret, preserved
    /// for re-encoding.
    pub unrecognised: u64,
}

impl Default for BundleFlags {
    fn default() -> Self {
        Self {
            is_admin: false,
            is_frag: false,
            allow_frag: false,
            request_custody: false,
            is_singleton: true,
            ack_app: false,
            cos: 1,
            unrecognised: 0,
        }
    }
}

impl From<u64> for BundleFlags {
    fn from(value: u64) -> Self {
        let known = FRAGMENT | ADMIN_RECORD | NO_FRAGMENT | CUSTODY_REQUEST | SINGLETON
            | ACK_REQUEST
            | COS_MASK;
        Self {
            is_frag: value & FRAGMENT != 0,
            is_admin: value & ADMIN_RECORD != 0,
            allow_frag: value & NO_FRAGMENT == 0,
            request_custody: value & CUSTODY_REQUEST != 0,
            is_singleton: value & SINGLETON != 0,
            ack_app: value & ACK_REQUEST != 0,
            cos: ((value & COS_MASK) >> COS_SHIFT) as u8,
            unrecognised: value & !known,
        }
    }
}

impl From<&BundleFlags> for u64 {
    fn from(value: &BundleFlags) -> Self {
        let mut pcf = value.unrecognised;
        if value.is_frag {
            pcf |= FRAGMENT;
        }
        if value.is_admin {
            pcf |= ADMIN_RECORD;
        }
        if !value.allow_frag {
            pcf |= NO_FRAGMENT;
        }
        if value.request_custody {
            pcf |= CUSTODY_REQUEST;
        }
        if value.is_singleton {
            pcf |= SINGLETON;
        }
        if value.ack_app {
            pcf |= ACK_REQUEST;
        }
        pcf | (((value.cos as u64) << COS_SHIFT) & COS_MASK)
    }
}
