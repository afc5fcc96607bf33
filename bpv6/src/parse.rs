/*!
Bundle disassembly.

Walks the block sequence of a received byte buffer: primary block first,
then extension blocks by type byte, ending at the payload block. Unknown
block types are stepped over using their length field. When an integrity
block is present the payload block's CRC is verified before the bundle is
accepted.
*/

use super::*;
use crate::bib::BibBlock;
use crate::cteb::CtebBlock;
use crate::eid::Eid;
use crate::payload_block::PayloadBlock;
use crate::primary_block::PrimaryBlock;

/// The custody information carried by a CTEB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Custodian {
    /// The peer currently holding custody.
    pub eid: Eid,
    /// The custody id it assigned.
    pub cid: u64,
}

/// A disassembled bundle borrowing from the received buffer.
#[derive(Debug)]
pub struct ParsedBundle<'a> {
    pub primary: PrimaryBlock,
    /// The application data unit.
    pub payload: &'a [u8],
    /// Present when the bundle carried a CTEB.
    pub custodian: Option<Custodian>,
    /// True when an integrity block was present (and verified).
    pub integrity_checked: bool,
}

impl ParsedBundle<'_> {
    /// Whether the bundle's lifetime has elapsed at `sysnow`.
    pub fn is_expired(&self, sysnow: u64) -> bool {
        let expiry = self.primary.expiry();
        expiry != 0 && sysnow >= expiry
    }

    pub fn is_admin_record(&self) -> bool {
        self.primary.flags.is_admin
    }

    /// Whether the sender requested custody transfer and supplied the CTEB
    /// needed to acknowledge it.
    pub fn requests_custody(&self) -> bool {
        self.primary.flags.request_custody && self.custodian.is_some()
    }
}

/// Disassembles `bundle`, verifying the integrity block if one is present.
pub fn parse<'a>(bundle: &'a [u8], flags: &mut Flags) -> Result<ParsedBundle<'a>, Error> {
    let (primary, mut at) = PrimaryBlock::read(bundle, flags)?;

    let mut cteb: Option<CtebBlock> = None;
    let mut bib: Option<BibBlock> = None;
    let mut payload: Option<(PayloadBlock, core::ops::Range<usize>)> = None;

    while at < bundle.len() {
        let type_byte = bundle[at];
        let body_at = at + 1;
        match type_byte {
            block_type::CTEB => {
                if cteb.is_some() {
                    return Err(Error::DuplicateBlock(type_byte));
                }
                let (blk, next) = CtebBlock::read(bundle, body_at, flags)?;
                cteb = Some(blk);
                at = next;
            }
            block_type::BIB => {
                if bib.is_some() {
                    return Err(Error::DuplicateBlock(type_byte));
                }
                let (blk, next) = BibBlock::read(bundle, body_at, flags)?;
                bib = Some(blk);
                at = next;
            }
            block_type::PAYLOAD => {
                if payload.is_some() {
                    return Err(Error::DuplicateBlock(type_byte));
                }
                let (blk, next) = PayloadBlock::read(bundle, body_at, flags)?;
                payload = Some((blk, at..next));
                at = next;
            }
            _ => {
                // Unknown block: step over it by its length field.
                let mut skip = body_at;
                let _flags = read_field(bundle, &mut skip, flags)?;
                let blklen = read_field(bundle, &mut skip, flags)?;
                at = skip
                    .checked_add(blklen.value as usize)
                    .filter(|end| *end <= bundle.len())
                    .ok_or(Error::InvalidBlockLength(
                        blklen.value,
                        bundle.len() - skip,
                    ))?;
            }
        }
    }

    let Some((payload, payload_span)) = payload else {
        return Err(Error::MissingPayload);
    };

    if let Some(bib) = &bib {
        bib.verify(&bundle[payload_span.clone()])?;
    }

    Ok(ParsedBundle {
        primary,
        payload: &bundle[payload.data.clone()],
        custodian: cteb.map(|cteb| Custodian {
            eid: cteb.custodian,
            cid: cteb.cid.value,
        }),
        integrity_checked: bib.is_some(),
    })
}
