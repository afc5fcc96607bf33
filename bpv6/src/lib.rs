/*!
BPv6 (RFC 5050) bundle wire format with CBHE (`ipn:`) addressing.

A bundle is the concatenation of a primary block, an optional Custody
Transfer Extension Block, an optional integrity block carrying a CRC over the
payload block, and the payload block itself. All multi-byte integers are
SDNVs. [`builder::Builder`] produces a reusable header template whose mutable
fields are patched per send; [`parse::parse`] walks a received byte buffer
back into blocks.
*/

use kestrel_sdnv as sdnv;
use kestrel_sdnv::{Field, Flags};

pub mod acs;
pub mod builder;
pub mod bundle_flags;
pub mod crc;
pub mod eid;
pub mod error;
pub mod parse;

pub mod bib;
pub mod cteb;
pub mod payload_block;
pub mod primary_block;

pub use error::Error;

/// Bundle protocol version implemented by this crate.
pub const VERSION: u8 = 6;

/// Block type codes for the non-primary blocks.
pub mod block_type {
    pub const PAYLOAD: u8 = 0x01;
    pub const CTEB: u8 = 0x0A;
    pub const BIB: u8 = 0x0D;
}

pub(crate) fn read_field(
    block: &[u8],
    at: &mut usize,
    flags: &mut Flags,
) -> Result<Field, Error> {
    let mut field = Field::at(*at);
    let len = sdnv::decode::read(block, &mut field, flags);
    if flags.incomplete {
        return Err(Error::InvalidSdnv(sdnv::decode::Error::Incomplete));
    } else if flags.overflow {
        return Err(Error::InvalidSdnv(sdnv::decode::Error::Overflow));
    }
    *at += len;
    Ok(field)
}

pub(crate) fn write_field(
    block: &mut [u8],
    at: &mut usize,
    value: u64,
    width: usize,
    flags: &mut Flags,
) -> Field {
    let field = Field {
        value,
        index: *at,
        width,
    };
    *at += sdnv::encode::write(block, &field, flags);
    field
}
