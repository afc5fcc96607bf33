/*!
The BPv6 primary block with CBHE-compressed endpoint addressing.

Layout: a version byte, then SDNVs for the processing-control flags, block
length, the four endpoint (node, service) pairs, creation timestamp
(seconds, sequence), lifetime, dictionary length (always zero under CBHE)
and, for fragments, the fragment offset and total application data unit
length.

Writes use fixed SDNV widths so a built header is byte-stable and its fields
can be patched in place; reads accept any width.
*/

use super::*;
use crate::bundle_flags::BundleFlags;
use crate::eid::{Eid, Route};

const PCF_WIDTH: usize = 3;
const BLKLEN_WIDTH: usize = 1;
const NODE_WIDTH: usize = 4;
const SERVICE_WIDTH: usize = 2;
const CREATESEC_WIDTH: usize = 6;
const CREATESEQ_WIDTH: usize = 4;
const LIFETIME_WIDTH: usize = 4;
const DICTLEN_WIDTH: usize = 1;
const FRAG_WIDTH: usize = 4;

/// Fixed on-the-wire size of a written primary block.
pub const fn written_len(is_frag: bool) -> usize {
    let fixed = 1
        + PCF_WIDTH
        + BLKLEN_WIDTH
        + 4 * (NODE_WIDTH + SERVICE_WIDTH)
        + CREATESEC_WIDTH
        + CREATESEQ_WIDTH
        + LIFETIME_WIDTH
        + DICTLEN_WIDTH;
    if is_frag {
        fixed + 2 * FRAG_WIDTH
    } else {
        fixed
    }
}

/// A decoded (or templated) primary block.
///
/// Every SDNV is carried as a [`Field`] so its byte offset within the block
/// remains known after a read or write; the creation timestamp fields are
/// patched through those offsets on every send.
#[derive(Debug, Default, Clone)]
pub struct PrimaryBlock {
    pub flags: BundleFlags,
    pub pcf: Field,
    pub blklen: Field,
    pub dstnode: Field,
    pub dstserv: Field,
    pub srcnode: Field,
    pub srcserv: Field,
    pub rptnode: Field,
    pub rptserv: Field,
    pub cstnode: Field,
    pub cstserv: Field,
    pub createsec: Field,
    pub createseq: Field,
    pub lifetime: Field,
    pub dictlen: Field,
    pub fragoffset: Field,
    pub total_len: Field,
}

impl PrimaryBlock {
    /// A template addressed along `route`, with the local endpoint as
    /// custodian.
    pub fn new(route: &Route, flags: BundleFlags, lifetime: u64) -> Self {
        let mut blk = Self {
            flags,
            ..Default::default()
        };
        blk.dstnode.value = route.destination.node;
        blk.dstserv.value = route.destination.service;
        blk.srcnode.value = route.local.node;
        blk.srcserv.value = route.local.service;
        blk.rptnode.value = route.report_to.node;
        blk.rptserv.value = route.report_to.service;
        blk.cstnode.value = route.local.node;
        blk.cstserv.value = route.local.service;
        blk.lifetime.value = lifetime;
        blk
    }

    pub fn source(&self) -> Eid {
        Eid::new(self.srcnode.value, self.srcserv.value)
    }

    pub fn destination(&self) -> Eid {
        Eid::new(self.dstnode.value, self.dstserv.value)
    }

    pub fn report_to(&self) -> Eid {
        Eid::new(self.rptnode.value, self.rptserv.value)
    }

    pub fn custodian(&self) -> Eid {
        Eid::new(self.cstnode.value, self.cstserv.value)
    }

    /// Absolute expiry time in seconds, or 0 for an infinite lifetime.
    pub fn expiry(&self) -> u64 {
        if self.lifetime.value == 0 {
            0
        } else {
            self.createsec.value.saturating_add(self.lifetime.value)
        }
    }

    /// Reads a primary block from the front of `block`.
    ///
    /// Returns the decoded block and the offset of the next block, taken
    /// from the block-length field rather than the fields consumed so that
    /// fields this implementation does not know are stepped over.
    pub fn read(block: &[u8], flags: &mut Flags) -> Result<(Self, usize), Error> {
        if block.is_empty() {
            return Err(Error::Truncated);
        } else if block[0] != VERSION {
            return Err(Error::InvalidVersion(block[0]));
        }

        let mut at = 1;
        let mut blk = Self::default();
        blk.pcf = read_field(block, &mut at, flags)?;
        blk.flags = BundleFlags::from(blk.pcf.value);
        blk.blklen = read_field(block, &mut at, flags)?;

        let end = at
            .checked_add(blk.blklen.value as usize)
            .filter(|end| *end <= block.len())
            .ok_or(Error::InvalidBlockLength(blk.blklen.value, block.len() - at))?;

        blk.dstnode = read_field(block, &mut at, flags)?;
        blk.dstserv = read_field(block, &mut at, flags)?;
        blk.srcnode = read_field(block, &mut at, flags)?;
        blk.srcserv = read_field(block, &mut at, flags)?;
        blk.rptnode = read_field(block, &mut at, flags)?;
        blk.rptserv = read_field(block, &mut at, flags)?;
        blk.cstnode = read_field(block, &mut at, flags)?;
        blk.cstserv = read_field(block, &mut at, flags)?;
        blk.createsec = read_field(block, &mut at, flags)?;
        blk.createseq = read_field(block, &mut at, flags)?;
        blk.lifetime = read_field(block, &mut at, flags)?;
        blk.dictlen = read_field(block, &mut at, flags)?;
        if blk.dictlen.value != 0 {
            return Err(Error::UnsupportedDictionary(blk.dictlen.value));
        }

        if blk.flags.is_frag {
            blk.fragoffset = read_field(block, &mut at, flags)?;
            blk.total_len = read_field(block, &mut at, flags)?;
        }

        if at > end {
            return Err(Error::InvalidBlockLength(blk.blklen.value, at - 1));
        }
        Ok((blk, end))
    }

    /// Writes the block at the front of `block` with fixed field widths,
    /// recording each field's offset. Returns the bytes written.
    pub fn write(&mut self, block: &mut [u8], flags: &mut Flags) -> usize {
        block[0] = VERSION;
        let mut at = 1;

        self.pcf = write_field(block, &mut at, u64::from(&self.flags), PCF_WIDTH, flags);

        let body = written_len(self.flags.is_frag) - 1 - PCF_WIDTH - BLKLEN_WIDTH;
        self.blklen = write_field(block, &mut at, body as u64, BLKLEN_WIDTH, flags);

        for (field, width) in [
            (&mut self.dstnode, NODE_WIDTH),
            (&mut self.dstserv, SERVICE_WIDTH),
            (&mut self.srcnode, NODE_WIDTH),
            (&mut self.srcserv, SERVICE_WIDTH),
            (&mut self.rptnode, NODE_WIDTH),
            (&mut self.rptserv, SERVICE_WIDTH),
            (&mut self.cstnode, NODE_WIDTH),
            (&mut self.cstserv, SERVICE_WIDTH),
            (&mut self.createsec, CREATESEC_WIDTH),
            (&mut self.createseq, CREATESEQ_WIDTH),
            (&mut self.lifetime, LIFETIME_WIDTH),
            (&mut self.dictlen, DICTLEN_WIDTH),
        ] {
            *field = write_field(block, &mut at, field.value, width, flags);
        }

        if self.flags.is_frag {
            self.fragoffset =
                write_field(block, &mut at, self.fragoffset.value, FRAG_WIDTH, flags);
            self.total_len = write_field(block, &mut at, self.total_len.value, FRAG_WIDTH, flags);
        }

        at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_round_trip() {
        let route = Route {
            local: Eid::new(1, 2),
            destination: Eid::new(3, 4),
            report_to: Eid::new(5, 6),
        };
        let flags = BundleFlags {
            request_custody: true,
            ..Default::default()
        };
        let mut blk = PrimaryBlock::new(&route, flags, 3600);
        blk.createsec.value = 1000;
        blk.createseq.value = 42;

        let mut buffer = vec![0u8; written_len(false)];
        let mut sdnv_flags = Flags::default();
        let len = blk.write(&mut buffer, &mut sdnv_flags);
        assert!(sdnv_flags.is_clear());
        assert_eq!(len, written_len(false));

        let (back, consumed) = PrimaryBlock::read(&buffer, &mut sdnv_flags).unwrap();
        assert!(sdnv_flags.is_clear());
        assert_eq!(consumed, len);
        assert_eq!(back.source(), route.local);
        assert_eq!(back.destination(), route.destination);
        assert_eq!(back.report_to(), route.report_to);
        assert_eq!(back.custodian(), route.local);
        assert_eq!(back.createsec.value, 1000);
        assert_eq!(back.createseq.value, 42);
        assert_eq!(back.lifetime.value, 3600);
        assert_eq!(back.expiry(), 4600);
        assert!(back.flags.request_custody);
        assert!(!back.flags.is_admin);
    }

    #[test]
    fn rejects_wrong_version() {
        let block = [7u8, 0, 0, 0];
        assert!(matches!(
            PrimaryBlock::read(&block, &mut Flags::default()),
            Err(Error::InvalidVersion(7))
        ));
    }

    #[test]
    fn infinite_lifetime_never_expires() {
        let blk = PrimaryBlock::new(&Route::default(), BundleFlags::default(), 0);
        assert_eq!(blk.expiry(), 0);
    }
}
