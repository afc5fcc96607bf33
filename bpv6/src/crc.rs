/*!
CRC support for the bundle integrity block.

Cipher suite 1 is CRC-16/X-25 and suite 2 is CRC-32/Castagnoli, computed over
the complete payload block (type byte, header SDNVs and payload bytes).
*/

use super::*;

const X25: ::crc::Crc<u16> = ::crc::Crc::<u16>::new(&::crc::CRC_16_IBM_SDLC);
const CASTAGNOLI: ::crc::Crc<u32> = ::crc::Crc::<u32>::new(&::crc::CRC_32_ISCSI);

/// The integrity check applied to outgoing and verified on incoming bundles.
#[allow(non_camel_case_types)]
#[derive(Default, Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CipherSuite {
    /// No integrity block.
    #[default]
    None,
    /// CRC-16/X-25.
    CRC16_X25,
    /// CRC-32/Castagnoli.
    CRC32_CASTAGNOLI,
}

impl From<CipherSuite> for u64 {
    fn from(value: CipherSuite) -> Self {
        match value {
            CipherSuite::None => 0,
            CipherSuite::CRC16_X25 => 1,
            CipherSuite::CRC32_CASTAGNOLI => 2,
        }
    }
}

impl TryFrom<u64> for CipherSuite {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::CRC16_X25),
            2 => Ok(Self::CRC32_CASTAGNOLI),
            v => Err(Error::InvalidCipherSuite(v)),
        }
    }
}

impl CipherSuite {
    /// Width of the security result in bytes.
    pub const fn result_len(&self) -> usize {
        match self {
            CipherSuite::None => 0,
            CipherSuite::CRC16_X25 => 2,
            CipherSuite::CRC32_CASTAGNOLI => 4,
        }
    }

    /// Computes the check value over `data`, widened to `u64`.
    pub fn digest(&self, data: &[u8]) -> u64 {
        match self {
            CipherSuite::None => 0,
            CipherSuite::CRC16_X25 => X25.checksum(data) as u64,
            CipherSuite::CRC32_CASTAGNOLI => CASTAGNOLI.checksum(data) as u64,
        }
    }
}
