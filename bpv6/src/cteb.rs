/*!
The Custody Transfer Extension Block.

Carries the custody id assigned by the current custodian and that
custodian's EID in `ipn:` text form. The custody id is written with a fixed
width so the retransmit engine can stamp a fresh id into a prebuilt bundle
without reassembling it.
*/

use super::*;
use crate::eid::Eid;

const FLAGS_WIDTH: usize = 1;
const BLKLEN_WIDTH: usize = 1;
const CID_WIDTH: usize = 4;

/// A decoded (or templated) custody transfer extension block.
#[derive(Debug, Default, Clone)]
pub struct CtebBlock {
    pub flags: Field,
    pub blklen: Field,
    /// The custody id; `cid.index` is where the retransmit engine patches.
    pub cid: Field,
    pub custodian: Eid,
}

impl CtebBlock {
    pub fn new(custodian: Eid) -> Self {
        Self {
            custodian,
            ..Default::default()
        }
    }

    /// On-the-wire size of this block as written by [`Self::write`].
    pub fn written_len(&self) -> usize {
        1 + FLAGS_WIDTH + BLKLEN_WIDTH + CID_WIDTH + self.custodian.to_string().len()
    }

    /// Reads the block body starting at `at`, which must point just past
    /// the type byte. Returns the block and the offset of the next block.
    pub fn read(block: &[u8], at: usize, flags: &mut Flags) -> Result<(Self, usize), Error> {
        let mut at = at;
        let mut blk = Self::default();
        blk.flags = read_field(block, &mut at, flags)?;
        blk.blklen = read_field(block, &mut at, flags)?;

        let end = at
            .checked_add(blk.blklen.value as usize)
            .filter(|end| *end <= block.len())
            .ok_or(Error::InvalidBlockLength(
                blk.blklen.value,
                block.len() - at,
            ))?;

        blk.cid = read_field(block, &mut at, flags)?;
        if at > end {
            return Err(Error::Truncated);
        }

        blk.custodian = core::str::from_utf8(&block[at..end])
            .map_err(|_| Error::InvalidEidEncoding)?
            .parse()?;

        Ok((blk, end))
    }

    /// Writes the block (type byte included) at `at`, recording field
    /// offsets. Returns the offset of the next block.
    pub fn write(&mut self, block: &mut [u8], at: usize, flags: &mut Flags) -> usize {
        let eid = self.custodian.to_string();

        block[at] = block_type::CTEB;
        let mut at = at + 1;
        self.flags = write_field(block, &mut at, self.flags.value, FLAGS_WIDTH, flags);
        self.blklen = write_field(
            block,
            &mut at,
            (CID_WIDTH + eid.len()) as u64,
            BLKLEN_WIDTH,
            flags,
        );
        self.cid = write_field(block, &mut at, self.cid.value, CID_WIDTH, flags);
        block[at..at + eid.len()].copy_from_slice(eid.as_bytes());
        at + eid.len()
    }
}
