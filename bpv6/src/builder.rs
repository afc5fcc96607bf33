/*!
Bundle construction.

[`Builder`] collects the send-side options and produces a [`Template`]: the
fully serialized header bytes (primary block, optional CTEB, optional BIB,
payload block header) with the offsets of every mutable field recorded.
Finishing a template for a payload patches the creation timestamp, payload
length and integrity result into a copy of the header; no block is
re-serialized on the send path.
*/

use super::*;
use crate::bib::BibBlock;
use crate::bundle_flags::BundleFlags;
use crate::crc::CipherSuite;
use crate::cteb::CtebBlock;
use crate::eid::Route;
use crate::payload_block::PayloadBlock;
use crate::primary_block::PrimaryBlock;

// Default values
const DEFAULT_LIFETIME: u64 = 86400;
const DEFAULT_MAX_LENGTH: usize = 4096;

/// Assembles a [`Template`] for a channel's outgoing bundles.
pub struct Builder {
    route: Route,
    lifetime: u64,
    request_custody: bool,
    admin_record: bool,
    allow_fragmentation: bool,
    integrity: CipherSuite,
    max_length: usize,
}

impl Default for Builder {
    fn default() -> Self {
        Self {
            route: Route::default(),
            lifetime: DEFAULT_LIFETIME,
            request_custody: false,
            admin_record: false,
            allow_fragmentation: false,
            integrity: CipherSuite::default(),
            max_length: DEFAULT_MAX_LENGTH,
        }
    }
}

impl Builder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn route(mut self, route: Route) -> Self {
        self.route = route;
        self
    }

    /// Lifetime in seconds; 0 means the bundle never expires.
    pub fn lifetime(mut self, lifetime: u64) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Include a CTEB and request custody transfer.
    pub fn request_custody(mut self, request_custody: bool) -> Self {
        self.request_custody = request_custody;
        self
    }

    /// Mark the payload as an administrative record.
    pub fn admin_record(mut self, admin_record: bool) -> Self {
        self.admin_record = admin_record;
        self
    }

    pub fn allow_fragmentation(mut self, allow_fragmentation: bool) -> Self {
        self.allow_fragmentation = allow_fragmentation;
        self
    }

    /// Include a BIB computed with `integrity`; [`CipherSuite::None`]
    /// omits the block.
    pub fn integrity(mut self, integrity: CipherSuite) -> Self {
        self.integrity = integrity;
        self
    }

    /// Upper bound on the total encoded bundle size.
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn build(self) -> Template {
        let flags = BundleFlags {
            is_admin: self.admin_record,
            request_custody: self.request_custody,
            allow_frag: self.allow_fragmentation,
            ..Default::default()
        };
        let mut primary = PrimaryBlock::new(&self.route, flags, self.lifetime);
        let mut cteb = self
            .request_custody
            .then(|| CtebBlock::new(self.route.local));
        let mut bib = (self.integrity != CipherSuite::None).then(|| BibBlock::new(self.integrity));
        let mut payload = PayloadBlock::default();

        let header_len = primary_block::written_len(false)
            + cteb.as_ref().map_or(0, CtebBlock::written_len)
            + bib.as_ref().map_or(0, BibBlock::written_len)
            + PayloadBlock::header_len();

        let mut header = vec![0u8; header_len];
        let mut flags = Flags::default();
        let mut at = primary.write(&mut header, &mut flags);
        if let Some(cteb) = &mut cteb {
            at = cteb.write(&mut header, at, &mut flags);
        }
        if let Some(bib) = &mut bib {
            at = bib.write(&mut header, at, &mut flags);
        }
        payload.write(&mut header, at, &mut flags);
        debug_assert!(flags.is_clear());

        Template {
            header,
            primary,
            cteb,
            bib,
            payload,
            lifetime: self.lifetime,
            max_length: self.max_length,
            sequence: 0,
        }
    }
}

/// A finished, sendable bundle.
#[derive(Debug, Clone)]
pub struct BuiltBundle {
    /// The complete encoded bundle.
    pub bytes: Vec<u8>,
    /// Location of the CTEB custody id field, when custody was requested.
    pub cid: Option<Field>,
    /// Absolute expiry time in seconds; 0 means never.
    pub expiry: u64,
}

/// A prebuilt bundle header, reused across sends until the channel's
/// attributes change.
pub struct Template {
    header: Vec<u8>,
    primary: PrimaryBlock,
    cteb: Option<CtebBlock>,
    bib: Option<BibBlock>,
    payload: PayloadBlock,
    lifetime: u64,
    max_length: usize,
    sequence: u64,
}

impl Template {
    /// Location of the CTEB custody id field within the header, when
    /// custody is requested.
    pub fn cid_field(&self) -> Option<Field> {
        self.cteb.as_ref().map(|cteb| cteb.cid)
    }

    /// Produces a complete bundle around `payload`, stamped at `sysnow`.
    pub fn finish(&mut self, payload: &[u8], sysnow: u64) -> Result<BuiltBundle, Error> {
        let total = self.header.len() + payload.len();
        if total > self.max_length {
            return Err(Error::BundleTooLarge(total, self.max_length));
        }

        let mut bytes = Vec::with_capacity(total);
        bytes.extend_from_slice(&self.header);
        bytes.extend_from_slice(payload);

        let mut flags = Flags::default();
        sdnv::encode::write(
            &mut bytes,
            &Field {
                value: sysnow,
                ..self.primary.createsec
            },
            &mut flags,
        );
        sdnv::encode::write(
            &mut bytes,
            &Field {
                value: self.sequence,
                ..self.primary.createseq
            },
            &mut flags,
        );
        self.sequence += 1;

        sdnv::encode::write(
            &mut bytes,
            &Field {
                value: payload.len() as u64,
                ..self.payload.blklen
            },
            &mut flags,
        );
        debug_assert!(flags.is_clear());

        if let Some(bib) = &mut self.bib {
            // The payload block starts right after the BIB and runs to the
            // end of the bundle.
            let payload_block = self.header.len() - PayloadBlock::header_len();
            let digest = bib.cipher_suite.digest(&bytes[payload_block..]);
            bib.patch_result(&mut bytes, digest);
        }

        Ok(BuiltBundle {
            bytes,
            cid: self.cid_field(),
            expiry: if self.lifetime == 0 {
                0
            } else {
                sysnow + self.lifetime
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eid::Eid;

    fn test_route() -> Route {
        Route {
            local: Eid::new(4, 1),
            destination: Eid::new(72, 43),
            report_to: Eid::new(4, 1),
        }
    }

    #[test]
    fn finish_stamps_mutable_fields() {
        let mut template = Builder::new()
            .route(test_route())
            .lifetime(100)
            .request_custody(true)
            .integrity(CipherSuite::CRC16_X25)
            .build();

        let first = template.finish(b"one", 5000).unwrap();
        let second = template.finish(b"two!", 5007).unwrap();
        assert_eq!(first.expiry, 5100);
        assert_eq!(second.expiry, 5107);
        assert!(first.cid.is_some());

        let mut flags = Flags::default();
        let a = parse::parse(&first.bytes, &mut flags).unwrap();
        let b = parse::parse(&second.bytes, &mut flags).unwrap();
        assert!(flags.is_clear());
        assert_eq!(a.payload, b"one");
        assert_eq!(b.payload, b"two!");
        assert_eq!(a.primary.createsec.value, 5000);
        assert_eq!(b.primary.createsec.value, 5007);
        assert_eq!(a.primary.createseq.value + 1, b.primary.createseq.value);
    }

    #[test]
    fn respects_max_length() {
        let mut template = Builder::new()
            .route(test_route())
            .max_length(64)
            .build();
        assert!(matches!(
            template.finish(&[0u8; 64], 0),
            Err(Error::BundleTooLarge(_, 64))
        ));
    }

    #[test]
    fn admin_record_without_custody() {
        let mut template = Builder::new()
            .route(test_route())
            .admin_record(true)
            .build();
        let bundle = template.finish(&[0x40, 0x01], 10).unwrap();
        assert!(bundle.cid.is_none());

        let mut flags = Flags::default();
        let parsed = parse::parse(&bundle.bytes, &mut flags).unwrap();
        assert!(parsed.primary.flags.is_admin);
        assert!(parsed.custodian.is_none());
    }
}
