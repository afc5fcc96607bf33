/*!
The record format the engine stores bundles under.

A bundle waiting in storage carries a small fixed header ahead of its wire
bytes: the absolute expiry time and the location of the CTEB custody-id
field, so the load path can check lifetime and stamp a custody id without
reparsing the bundle.
*/

use super::*;
use kestrel_sdnv::Field;

const EXPIRY_LEN: usize = 8;
const CID_INDEX_LEN: usize = 4;
const CID_WIDTH_LEN: usize = 1;
const HEADER_LEN: usize = EXPIRY_LEN + CID_INDEX_LEN + CID_WIDTH_LEN;

/// A bundle as retained by the storage service.
#[derive(Debug, Clone)]
pub(crate) struct StoredBundle {
    /// Absolute expiry in seconds; 0 means never.
    pub expiry: u64,
    /// Location of the CTEB custody-id field within `bytes`, when custody
    /// was requested.
    pub cid: Option<Field>,
    /// The encoded bundle.
    pub bytes: Bytes,
}

impl StoredBundle {
    pub fn encode(&self) -> Bytes {
        let mut out = Vec::with_capacity(HEADER_LEN + self.bytes.len());
        out.extend_from_slice(&self.expiry.to_be_bytes());
        match &self.cid {
            Some(cid) => {
                out.extend_from_slice(&(cid.index as u32).to_be_bytes());
                out.push(cid.width as u8);
            }
            None => {
                out.extend_from_slice(&0u32.to_be_bytes());
                out.push(0);
            }
        }
        out.extend_from_slice(&self.bytes);
        Bytes::from(out)
    }

    pub fn decode(data: Bytes) -> Result<Self, Error> {
        if data.len() < HEADER_LEN {
            return Err(Error::CorruptStore);
        }
        let expiry = u64::from_be_bytes(data[..EXPIRY_LEN].try_into().map_err(|_| Error::CorruptStore)?);
        let cid_index = u32::from_be_bytes(
            data[EXPIRY_LEN..EXPIRY_LEN + CID_INDEX_LEN]
                .try_into()
                .map_err(|_| Error::CorruptStore)?,
        ) as usize;
        let cid_width = data[EXPIRY_LEN + CID_INDEX_LEN] as usize;

        let bytes = data.slice(HEADER_LEN..);
        let cid = if cid_index == 0 {
            None
        } else if cid_index + cid_width <= bytes.len() {
            Some(Field::fixed(cid_index, cid_width))
        } else {
            return Err(Error::CorruptStore);
        };

        Ok(Self { expiry, cid, bytes })
    }
}
