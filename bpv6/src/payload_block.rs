/*!
The payload block: processing flags, a length SDNV and the raw application
data. The length field is written with a fixed width so a header template
can be finished with payloads of any size up to the channel maximum.
*/

use super::*;

const FLAGS_WIDTH: usize = 1;
const BLKLEN_WIDTH: usize = 4;

/// Block processing flag: this is the last block of the bundle.
const LAST_BLOCK: u64 = 1 << 3;

/// A decoded (or templated) payload block header.
#[derive(Debug, Default, Clone)]
pub struct PayloadBlock {
    pub flags: Field,
    pub blklen: Field,
    /// Range of the payload bytes within the parsed buffer.
    pub data: core::ops::Range<usize>,
}

impl PayloadBlock {
    /// On-the-wire size of the header as written by [`Self::write`],
    /// excluding the payload bytes themselves.
    pub const fn header_len() -> usize {
        1 + FLAGS_WIDTH + BLKLEN_WIDTH
    }

    /// Reads the block body starting at `at`, just past the type byte.
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

        blk.data = at..end;
        Ok((blk, end))
    }

    /// Writes the header (type byte included) at `at` with a zero length,
    /// recording the length field's offset for finishing. Returns the offset
    /// where payload bytes begin.
    pub fn write(&mut self, block: &mut [u8], at: usize, flags: &mut Flags) -> usize {
        block[at] = block_type::PAYLOAD;
        let mut at = at + 1;
        self.flags = write_field(block, &mut at, LAST_BLOCK, FLAGS_WIDTH, flags);
        self.blklen = write_field(block, &mut at, 0, BLKLEN_WIDTH, flags);
        self.data = at..at;
        at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kestrel_sdnv::encode;

    #[test]
    fn write_finish_read() {
        let payload = b"sample payload";
        let mut blk = PayloadBlock::default();
        let mut buffer = vec![0u8; PayloadBlock::header_len() + payload.len()];
        let mut sdnv_flags = Flags::default();
        let data_at = blk.write(&mut buffer, 0, &mut sdnv_flags);
        buffer[data_at..].copy_from_slice(payload);

        // Finish the template: patch the true length through the offset.
        let patched = Field {
            value: payload.len() as u64,
            ..blk.blklen
        };
        encode::write(&mut buffer, &patched, &mut sdnv_flags);
        assert!(sdnv_flags.is_clear());

        let (back, end) = PayloadBlock::read(&buffer, 1, &mut sdnv_flags).unwrap();
        assert!(sdnv_flags.is_clear());
        assert_eq!(end, buffer.len());
        assert_eq!(&buffer[back.data.clone()], payload);
        assert_ne!(back.flags.value & (1 << 3), 0);
    }

    #[test]
    fn rejects_length_past_end() {
        // Claims 200 payload bytes but carries none.
        let mut buffer = vec![0u8; PayloadBlock::header_len()];
        let mut blk = PayloadBlock::default();
        let mut sdnv_flags = Flags::default();
        blk.write(&mut buffer, 0, &mut sdnv_flags);
        let patched = Field {
            value: 200,
            ..blk.blklen
        };
        encode::write(&mut buffer, &patched, &mut sdnv_flags);
        assert!(matches!(
            PayloadBlock::read(&buffer, 1, &mut sdnv_flags),
            Err(Error::InvalidBlockLength(200, _))
        ));
    }
}
