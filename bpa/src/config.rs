use super::*;

pub use kestrel_bpv6::crc::CipherSuite;

/// Policy applied when the active table wraps onto an occupied slot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WrapResponse {
    /// Re-emit the occupying bundle under a fresh custody id.
    #[default]
    Resend,
    /// Report the table full and let the caller retry.
    Block,
    /// Drop the occupying bundle and take its slot.
    Drop,
}

/// A channel's configuration.
///
/// The sizing fields (`active_table_size`, `max_fills_per_dacs`,
/// `max_gaps_per_dacs`, `storage_service_parm`) are fixed at open; the rest
/// can be changed at runtime through [`Setting`].
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Attributes {
    /// Seconds until an outgoing bundle expires; 0 means never.
    pub lifetime: u64,
    /// Include a CTEB and track outgoing bundles for retransmission.
    pub request_custody: bool,
    /// Flag outgoing bundles as administrative records.
    pub admin_record: bool,
    /// Include a BIB over the payload block.
    pub integrity_check: bool,
    /// Set the fragmentation-allowed bit on outgoing bundles.
    pub allow_fragmentation: bool,
    /// Which CRC the BIB carries when `integrity_check` is on.
    pub cipher_suite: CipherSuite,
    /// Seconds before an unacknowledged bundle is retransmitted; 0 never.
    pub timeout: u64,
    /// Upper bound on the encoded size of an outgoing bundle.
    pub max_length: usize,
    /// Behaviour when the active table is full.
    pub wrap_response: WrapResponse,
    /// Keep the same custody id on retransmit instead of assigning anew.
    pub cid_reuse: bool,
    /// Most seconds an accumulated custody signal may wait before flushing.
    pub dacs_rate: u64,
    /// Slots in the active table; the custody id ring modulus.
    pub active_table_size: usize,
    /// Most SDNV fills in one custody signal record.
    pub max_fills_per_dacs: usize,
    /// Most distinct custody id runs accumulated before a signal is forced.
    pub max_gaps_per_dacs: usize,
    /// Opaque parameter handed to the storage service's `create`.
    pub storage_service_parm: Option<String>,
}

impl Default for Attributes {
    fn default() -> Self {
        Self {
            lifetime: 86400,
            request_custody: true,
            admin_record: false,
            integrity_check: true,
            allow_fragmentation: false,
            cipher_suite: CipherSuite::CRC16_X25,
            timeout: 10,
            max_length: 4096,
            wrap_response: WrapResponse::default(),
            cid_reuse: false,
            dacs_rate: 5,
            active_table_size: 16384,
            max_fills_per_dacs: 64,
            max_gaps_per_dacs: 1028,
            storage_service_parm: None,
        }
    }
}

impl Attributes {
    /// Open-time validation of the sizing fields.
    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.active_table_size == 0 {
            return Err(Error::InvalidAttribute("active_table_size must be non-zero"));
        }
        if self.max_gaps_per_dacs == 0 {
            return Err(Error::InvalidAttribute("max_gaps_per_dacs must be non-zero"));
        }
        if self.max_fills_per_dacs < 2 {
            return Err(Error::InvalidAttribute(
                "max_fills_per_dacs must admit at least one run",
            ));
        }
        Ok(())
    }
}

/// A runtime-changeable attribute with its value.
///
/// Carrying the value inside the variant is what makes `set` type-checked:
/// a boolean option cannot receive an integer, and enumerated options only
/// admit their enumerators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    Lifetime(u64),
    RequestCustody(bool),
    AdminRecord(bool),
    IntegrityCheck(bool),
    AllowFragmentation(bool),
    CipherSuite(CipherSuite),
    Timeout(u64),
    MaxLength(usize),
    WrapResponse(WrapResponse),
    CidReuse(bool),
    DacsRate(u64),
}

/// Selects a [`Setting`] for [`channel::Channel::get`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKey {
    Lifetime,
    RequestCustody,
    AdminRecord,
    IntegrityCheck,
    AllowFragmentation,
    CipherSuite,
    Timeout,
    MaxLength,
    WrapResponse,
    CidReuse,
    DacsRate,
}

impl Setting {
    pub(crate) fn apply(self, attributes: &mut Attributes) {
        match self {
            Setting::Lifetime(v) => attributes.lifetime = v,
            Setting::RequestCustody(v) => attributes.request_custody = v,
            Setting::AdminRecord(v) => attributes.admin_record = v,
            Setting::IntegrityCheck(v) => attributes.integrity_check = v,
            Setting::AllowFragmentation(v) => attributes.allow_fragmentation = v,
            Setting::CipherSuite(v) => attributes.cipher_suite = v,
            Setting::Timeout(v) => attributes.timeout = v,
            Setting::MaxLength(v) => attributes.max_length = v,
            Setting::WrapResponse(v) => attributes.wrap_response = v,
            Setting::CidReuse(v) => attributes.cid_reuse = v,
            Setting::DacsRate(v) => attributes.dacs_rate = v,
        }
    }
}

impl Attributes {
    /// Reads the current value of a runtime-changeable attribute.
    pub fn setting(&self, key: SettingKey) -> Setting {
        match key {
            SettingKey::Lifetime => Setting::Lifetime(self.lifetime),
            SettingKey::RequestCustody => Setting::RequestCustody(self.request_custody),
            SettingKey::AdminRecord => Setting::AdminRecord(self.admin_record),
            SettingKey::IntegrityCheck => Setting::IntegrityCheck(self.integrity_check),
            SettingKey::AllowFragmentation => {
                Setting::AllowFragmentation(self.allow_fragmentation)
            }
            SettingKey::CipherSuite => Setting::CipherSuite(self.cipher_suite),
            SettingKey::Timeout => Setting::Timeout(self.timeout),
            SettingKey::MaxLength => Setting::MaxLength(self.max_length),
            SettingKey::WrapResponse => Setting::WrapResponse(self.wrap_response),
            SettingKey::CidReuse => Setting::CidReuse(self.cid_reuse),
            SettingKey::DacsRate => Setting::DacsRate(self.dacs_rate),
        }
    }
}
