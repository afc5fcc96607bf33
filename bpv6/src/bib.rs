/*!
The bundle integrity block: a CRC over the complete payload block.

The security result is written as raw big-endian bytes (2 for CRC16, 4 for
CRC32) after a cipher-suite id and result-length SDNV. The result bytes are
zeroed at template build time and patched once the payload is in place.
*/

use super::*;
use crate::crc::CipherSuite;

const FLAGS_WIDTH: usize = 1;
const BLKLEN_WIDTH: usize = 1;
const SUITE_WIDTH: usize = 1;
const RESULT_LEN_WIDTH: usize = 1;

/// A decoded (or templated) integrity block.
#[derive(Debug, Default, Clone)]
pub struct BibBlock {
    pub flags: Field,
    pub blklen: Field,
    pub cipher_suite: CipherSuite,
    pub suite_id: Field,
    pub result_len: Field,
    /// The check value. `result.index`/`result.width` locate the raw
    /// big-endian bytes within the block for patching and verification.
    pub result: Field,
}

impl BibBlock {
    pub fn new(cipher_suite: CipherSuite) -> Self {
        Self {
            cipher_suite,
            ..Default::default()
        }
    }

    /// On-the-wire size of this block as written by [`Self::write`].
    pub fn written_len(&self) -> usize {
        1 + FLAGS_WIDTH + BLKLEN_WIDTH + SUITE_WIDTH + RESULT_LEN_WIDTH
            + self.cipher_suite.result_len()
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

        blk.suite_id = read_field(block, &mut at, flags)?;
        blk.cipher_suite = CipherSuite::try_from(blk.suite_id.value)?;
        blk.result_len = read_field(block, &mut at, flags)?;
        if blk.result_len.value as usize != blk.cipher_suite.result_len() {
            return Err(Error::InvalidSecurityResultLength(blk.result_len.value));
        }

        let result_end = at + blk.result_len.value as usize;
        if result_end > end {
            return Err(Error::Truncated);
        }
        blk.result = Field {
            value: block[at..result_end]
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)),
            index: at,
            width: blk.result_len.value as usize,
        };

        Ok((blk, end))
    }

    /// Writes the block (type byte included) at `at` with a zeroed security
    /// result, recording its offset for later patching. Returns the offset
    /// of the next block.
    pub fn write(&mut self, block: &mut [u8], at: usize, flags: &mut Flags) -> usize {
        let result_len = self.cipher_suite.result_len();

        block[at] = block_type::BIB;
        let mut at = at + 1;
        self.flags = write_field(block, &mut at, self.flags.value, FLAGS_WIDTH, flags);
        self.blklen = write_field(
            block,
            &mut at,
            (SUITE_WIDTH + RESULT_LEN_WIDTH + result_len) as u64,
            BLKLEN_WIDTH,
            flags,
        );
        self.suite_id = write_field(
            block,
            &mut at,
            u64::from(self.cipher_suite),
            SUITE_WIDTH,
            flags,
        );
        self.result_len = write_field(block, &mut at, result_len as u64, RESULT_LEN_WIDTH, flags);

        self.result = Field {
            value: 0,
            index: at,
            width: result_len,
        };
        block[at..at + result_len].fill(0);
        at + result_len
    }

    /// Patches a computed check value into the recorded result bytes.
    pub fn patch_result(&mut self, block: &mut [u8], value: u64) {
        self.result.value = value;
        for (i, slot) in block[self.result.index..self.result.index + self.result.width]
            .iter_mut()
            .enumerate()
        {
            *slot = (value >> (8 * (self.result.width - 1 - i))) as u8;
        }
    }

    /// Recomputes the check over `payload_block` and compares it with the
    /// received result.
    pub fn verify(&self, payload_block: &[u8]) -> Result<(), Error> {
        let computed = self.cipher_suite.digest(payload_block);
        if computed != self.result.value {
            return Err(Error::IntegrityCheckFailed {
                expected: self.result.value,
                computed,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_patch_read_verify() {
        let payload_block = b"\x01\x08\x05hello";

        let mut blk = BibBlock::new(CipherSuite::CRC16_X25);
        let mut buffer = vec![0u8; blk.written_len()];
        let mut sdnv_flags = Flags::default();
        let next = blk.write(&mut buffer, 0, &mut sdnv_flags);
        assert!(sdnv_flags.is_clear());
        assert_eq!(next, buffer.len());

        blk.patch_result(&mut buffer, blk.cipher_suite.digest(payload_block));

        let (back, end) = BibBlock::read(&buffer, 1, &mut sdnv_flags).unwrap();
        assert!(sdnv_flags.is_clear());
        assert_eq!(end, buffer.len());
        assert_eq!(back.cipher_suite, CipherSuite::CRC16_X25);
        back.verify(payload_block).unwrap();
        assert!(back.verify(b"\x01\x08\x05hellp").is_err());
    }

    #[test]
    fn crc32_result_width() {
        let mut blk = BibBlock::new(CipherSuite::CRC32_CASTAGNOLI);
        let mut buffer = vec![0u8; blk.written_len()];
        let mut sdnv_flags = Flags::default();
        blk.write(&mut buffer, 0, &mut sdnv_flags);
        blk.patch_result(&mut buffer, 0xDEADBEEF);

        let (back, _) = BibBlock::read(&buffer, 1, &mut sdnv_flags).unwrap();
        assert_eq!(back.result.value, 0xDEADBEEF);
        assert_eq!(back.result.width, 4);
    }

    #[test]
    fn rejects_mismatched_result_length() {
        let mut blk = BibBlock::new(CipherSuite::CRC16_X25);
        let mut buffer = vec![0u8; blk.written_len()];
        let mut sdnv_flags = Flags::default();
        blk.write(&mut buffer, 0, &mut sdnv_flags);
        // Claim a 3-byte result for a 2-byte suite.
        buffer[4] = 3;
        assert!(matches!(
            BibBlock::read(&buffer, 1, &mut sdnv_flags),
            Err(Error::InvalidSecurityResultLength(3))
        ));
    }
}
