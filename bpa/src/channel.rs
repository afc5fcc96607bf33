/*!
The channel: the store/load/process/accept surface over one pair of
endpoints.

A channel owns three storage queues (outgoing bundles, delivered payloads,
outgoing custody signals), a prebuilt bundle template, the custody engine
and the active table of in-flight custody-tracked bundles. One mutex guards
the mutable state; its condition variable wakes loaders blocked on a full
active table when an acknowledgment frees slots.
*/

use super::*;
use crate::config::{Attributes, Setting, SettingKey, WrapResponse};
use crate::custody::CustodyEngine;
use crate::flags::Flags;
use kestrel_bpv6::acs;
use kestrel_bpv6::builder::{Builder, Template};
use kestrel_bpv6::crc::CipherSuite;
use kestrel_bpv6::eid::Route;
use kestrel_sdnv::Field;
use crate::stats::Stats;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use crate::storage::{Sid, StorageQueue, StorageService, Timeout};
use crate::stored::StoredBundle;

/// How long a loader parks on the condition variable when the active table
/// has wrapped, so a stalled link cannot pin the lock.
const WRAP_TIMEOUT: std::time::Duration = std::time::Duration::from_millis(1000);

/// What `process` did with a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A data bundle; its payload is queued for [`Channel::accept`].
    Delivered,
    /// A custody-requesting data bundle; the payload is queued and the
    /// sender's custody id will be covered by a future custody signal.
    CustodyTransfer,
    /// An aggregate custody signal; this many outstanding bundles were
    /// acknowledged and their active-table slots freed.
    Acknowledged(usize),
}

#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    sid: Option<Sid>,
    /// Last (re)transmission time in seconds.
    retx: u64,
}

struct ActiveTable {
    slots: Box<[Slot]>,
    oldest: u64,
    current: u64,
}

impl ActiveTable {
    fn index(&self, cid: u64) -> usize {
        (cid % self.slots.len() as u64) as usize
    }

    /// Advances the oldest marker past freed slots.
    fn sweep_oldest(&mut self) {
        while self.oldest != self.current {
            if self.slots[self.index(self.oldest)].sid.is_some() {
                break;
            }
            self.oldest += 1;
        }
    }
}

struct State {
    attributes: Attributes,
    route: Route,
    template: Option<Template>,
    custody: CustodyEngine,
    table: ActiveTable,
    stats: Stats,
}

impl State {
    /// The outgoing-bundle template, rebuilt after any attribute change.
    fn template(&mut self) -> &mut Template {
        let attributes = &self.attributes;
        let route = self.route;
        self.template.get_or_insert_with(|| {
            Builder::new()
                .route(route)
                .lifetime(attributes.lifetime)
                .request_custody(attributes.request_custody)
                .admin_record(attributes.admin_record)
                .integrity(if attributes.integrity_check {
                    attributes.cipher_suite
                } else {
                    CipherSuite::None
                })
                .allow_fragmentation(attributes.allow_fragmentation)
                .max_length(attributes.max_length)
                .build()
        })
    }
}

/// A bundle picked by the load scan, ready for emission.
struct Selection {
    stored: StoredBundle,
    sid: Sid,
    /// Install at a fresh custody id; otherwise re-emit under `cid`.
    assign_new_cid: bool,
    cid: u64,
}

/// One open endpoint channel.
///
/// Dropping the channel closes it: the storage queues are dropped with it
/// and release whatever they retain.
pub struct Channel {
    bundles: Box<dyn StorageQueue>,
    payloads: Box<dyn StorageQueue>,
    records: Box<dyn StorageQueue>,
    clock: Arc<dyn clock::Clock>,
    state: Mutex<State>,
    wakeup: Condvar,
}

impl Channel {
    /// Opens a channel over `route`, creating its three storage queues.
    pub fn open(
        route: Route,
        storage: &dyn StorageService,
        clock: Arc<dyn clock::Clock>,
        attributes: Attributes,
    ) -> Result<Self, Error> {
        attributes.validate()?;

        let parm = attributes.storage_service_parm.as_deref();
        let bundles = storage.create(parm)?;
        let payloads = storage.create(parm)?;
        let records = storage.create(parm)?;

        let custody = CustodyEngine::new(route, &attributes);
        let table = ActiveTable {
            slots: vec![Slot::default(); attributes.active_table_size].into_boxed_slice(),
            oldest: 1,
            current: 1,
        };

        debug!(local = %route.local, destination = %route.destination, "channel open");

        Ok(Self {
            bundles,
            payloads,
            records,
            clock,
            state: Mutex::new(State {
                attributes,
                route,
                template: None,
                custody,
                table,
                stats: Stats::default(),
            }),
            wakeup: Condvar::new(),
        })
    }

    /// Changes a runtime attribute, invalidating the bundle templates.
    pub fn set(&self, setting: Setting) -> Result<(), Error> {
        let mut state = self.state.lock()?;
        setting.apply(&mut state.attributes);
        state.template = None;
        state.custody.invalidate();
        Ok(())
    }

    /// Reads a runtime attribute.
    pub fn get(&self, key: SettingKey) -> Result<Setting, Error> {
        Ok(self.state.lock()?.attributes.setting(key))
    }

    /// Builds a bundle around `payload` and queues it for transmission.
    pub fn store(&self, payload: &[u8], timeout: Timeout, flags: &mut Flags) -> Result<(), Error> {
        let (sysnow, reliable) = self.clock.now();
        flags.unreliable_time |= !reliable;

        let stored = {
            let mut guard = self.state.lock()?;
            let bundle = guard.template().finish(payload, sysnow)?;
            StoredBundle {
                expiry: bundle.expiry,
                cid: bundle.cid,
                bytes: Bytes::from(bundle.bytes),
            }
        };

        if !self.bundles.enqueue(stored.encode(), timeout)? {
            return Err(Error::Timeout);
        }
        self.state.lock()?.stats.generated += 1;
        Ok(())
    }

    /// Produces the next bundle to hand to the link.
    ///
    /// Preference order: a pending custody signal, a timed-out or wrapped
    /// active bundle, then fresh data from the outgoing queue. A bundle
    /// with a CTEB is installed in the active table and has its custody id
    /// stamped before it is returned.
    pub fn load(&self, timeout: Timeout, flags: &mut Flags) -> Result<Vec<u8>, Error> {
        let (sysnow, reliable) = self.clock.now();
        flags.unreliable_time |= !reliable;

        // Flush any custody signal whose rate window lapsed, then prefer
        // sending signals over data.
        {
            let mut guard = self.state.lock()?;
            let state = &mut *guard;
            state
                .custody
                .tick(&state.attributes, self.records.as_ref(), sysnow, flags)?;
        }
        if let Some((data, sid)) = self.records.dequeue(Timeout::Check)? {
            let stored = StoredBundle::decode(data)?;
            self.records.relinquish(sid)?;
            flags.route_needed = true;
            self.state.lock()?.stats.transmitted += 1;
            return Ok(stored.bytes.to_vec());
        }

        let selection = match self.scan_active_table(sysnow, flags)? {
            Some(selection) => selection,
            None => self.dequeue_fresh(sysnow, timeout, flags)?,
        };
        self.emit(selection, sysnow, flags)
    }

    /// The active-table scan: expire, retransmit, and resolve wrap.
    fn scan_active_table(
        &self,
        sysnow: u64,
        flags: &mut Flags,
    ) -> Result<Option<Selection>, Error> {
        let mut guard = self.state.lock()?;

        while guard.table.oldest != guard.table.current {
            let oldest = guard.table.oldest;
            let ati = guard.table.index(oldest);

            let Some(sid) = guard.table.slots[ati].sid else {
                guard.table.oldest += 1;
                continue;
            };

            let stored = match self.bundles.retrieve(sid, Timeout::Check) {
                Ok(Some(data)) => StoredBundle::decode(data).ok(),
                Ok(None) => None,
                Err(error) => {
                    warn!(%error, sid, "active bundle retrieval failed");
                    None
                }
            };
            let Some(stored) = stored else {
                if let Err(error) = self.bundles.relinquish(sid) {
                    warn!(%error, sid, "relinquish failed for unretrievable bundle");
                }
                guard.table.slots[ati].sid = None;
                guard.table.oldest += 1;
                guard.stats.lost += 1;
                flags.store_failure = true;
                continue;
            };

            if stored.expiry != 0 && sysnow >= stored.expiry {
                if let Err(error) = self.bundles.relinquish(sid) {
                    warn!(%error, sid, "relinquish failed for expired bundle");
                }
                guard.table.slots[ati].sid = None;
                guard.table.oldest += 1;
                guard.stats.expired += 1;
                debug!(cid = oldest, "active bundle expired");
                continue;
            }

            let retx_due = guard.attributes.timeout != 0
                && sysnow >= guard.table.slots[ati].retx + guard.attributes.timeout;
            if retx_due {
                guard.table.oldest += 1;
                guard.stats.retransmitted += 1;
                debug!(cid = oldest, reuse = guard.attributes.cid_reuse, "custody timeout");
                if guard.attributes.cid_reuse {
                    // Same custody id goes back on the wire; the slot stays.
                    return Ok(Some(Selection {
                        stored,
                        sid,
                        assign_new_cid: false,
                        cid: oldest,
                    }));
                }
                guard.table.slots[ati].sid = None;
                return Ok(Some(Selection {
                    stored,
                    sid,
                    assign_new_cid: true,
                    cid: 0,
                }));
            }

            // The oldest bundle is still live. Before dequeueing fresh data,
            // the slot the next custody id maps to must be free.
            let wati = guard.table.index(guard.table.current);
            let Some(wsid) = guard.table.slots[wati].sid else {
                break;
            };
            flags.active_table_wrap = true;

            match guard.attributes.wrap_response {
                WrapResponse::Resend => {
                    guard.table.oldest += 1;
                    let wrapped = match self.bundles.retrieve(wsid, Timeout::Check) {
                        Ok(Some(data)) => StoredBundle::decode(data).ok(),
                        _ => None,
                    };
                    match wrapped {
                        Some(stored) => {
                            guard.stats.retransmitted += 1;
                            // Park briefly so back-to-back wraps do not spin.
                            let _guard = self.wait_wrap(guard)?;
                            return Ok(Some(Selection {
                                stored,
                                sid: wsid,
                                assign_new_cid: true,
                                cid: 0,
                            }));
                        }
                        None => {
                            if let Err(error) = self.bundles.relinquish(wsid) {
                                warn!(%error, sid = wsid, "relinquish failed on wrap resend");
                            }
                            guard.table.slots[wati].sid = None;
                            guard.stats.lost += 1;
                            flags.store_failure = true;
                            // The wrap check ends the scan either way; the
                            // freed slot lets a fresh dequeue proceed.
                            break;
                        }
                    }
                }
                WrapResponse::Block => {
                    // Give an acknowledgment a chance to free the slot, but
                    // report the overflow to this caller either way.
                    let _guard = self.wait_wrap(guard)?;
                    return Err(Error::ActiveTableFull);
                }
                WrapResponse::Drop => {
                    if let Err(error) = self.bundles.relinquish(wsid) {
                        warn!(%error, sid = wsid, "relinquish failed on wrap drop");
                    }
                    guard.table.slots[wati].sid = None;
                    guard.stats.lost += 1;
                    guard.table.oldest += 1;
                    debug!(sid = wsid, "wrapped bundle dropped");
                    // The wrap check ends the scan either way; the freed
                    // slot lets a fresh dequeue proceed.
                    break;
                }
            }
        }

        Ok(None)
    }

    /// Dequeues the next storable bundle, discarding any that expired in
    /// the queue.
    fn dequeue_fresh(
        &self,
        sysnow: u64,
        timeout: Timeout,
        flags: &mut Flags,
    ) -> Result<Selection, Error> {
        loop {
            let dequeued = match self.bundles.dequeue(timeout) {
                Ok(dequeued) => dequeued,
                Err(error) => {
                    flags.store_failure = true;
                    return Err(Error::Storage(error));
                }
            };
            let Some((data, sid)) = dequeued else {
                return Err(Error::Timeout);
            };

            let stored = match StoredBundle::decode(data) {
                Ok(stored) => stored,
                Err(_) => {
                    if let Err(error) = self.bundles.relinquish(sid) {
                        warn!(%error, sid, "relinquish failed for corrupt record");
                    }
                    self.state.lock()?.stats.lost += 1;
                    flags.store_failure = true;
                    continue;
                }
            };

            if stored.expiry != 0 && sysnow >= stored.expiry {
                if let Err(error) = self.bundles.relinquish(sid) {
                    warn!(%error, sid, "relinquish failed for expired bundle");
                }
                self.state.lock()?.stats.expired += 1;
                debug!(sid, "stored bundle expired before transmission");
                continue;
            }

            return Ok(Selection {
                stored,
                sid,
                assign_new_cid: true,
                cid: 0,
            });
        }
    }

    /// Stamps the custody id, installs the active-table entry and hands the
    /// encoded bundle out. Non-custodial bundles are released from storage
    /// here; nothing will ever ask for them again.
    fn emit(&self, selection: Selection, sysnow: u64, flags: &mut Flags) -> Result<Vec<u8>, Error> {
        let mut out = selection.stored.bytes.to_vec();

        if let Some(cid_field) = selection.stored.cid {
            let mut guard = self.state.lock()?;
            let assigned = if selection.assign_new_cid {
                let cid = guard.table.current;
                let ati = guard.table.index(cid);
                guard.table.slots[ati] = Slot {
                    sid: Some(selection.sid),
                    retx: sysnow,
                };
                guard.table.current += 1;
                cid
            } else {
                let ati = guard.table.index(selection.cid);
                guard.table.slots[ati].retx = sysnow;
                selection.cid
            };

            let mut sdnv_flags = kestrel_sdnv::Flags::default();
            kestrel_sdnv::encode::write(
                &mut out,
                &Field {
                    value: assigned,
                    ..cid_field
                },
                &mut sdnv_flags,
            );
            flags.absorb(sdnv_flags);
            guard.stats.transmitted += 1;
        } else {
            self.bundles.relinquish(selection.sid)?;
            self.state.lock()?.stats.transmitted += 1;
        }

        Ok(out)
    }

    /// Dispatches a received bundle: delivery, custody accounting, or
    /// acknowledgment ingestion.
    pub fn process(
        &self,
        bundle: &[u8],
        timeout: Timeout,
        flags: &mut Flags,
    ) -> Result<Disposition, Error> {
        self.state.lock()?.stats.received += 1;

        let (sysnow, reliable) = self.clock.now();
        flags.unreliable_time |= !reliable;

        let mut sdnv_flags = kestrel_sdnv::Flags::default();
        let parsed = kestrel_bpv6::parse::parse(bundle, &mut sdnv_flags);
        flags.absorb(sdnv_flags);
        let parsed = match parsed {
            Ok(parsed) => parsed,
            Err(error) => {
                if matches!(error, kestrel_bpv6::Error::IntegrityCheckFailed { .. }) {
                    flags.integrity_mismatch = true;
                }
                return Err(error.into());
            }
        };

        if parsed.is_expired(sysnow) {
            self.state.lock()?.stats.expired += 1;
            return Err(Error::Expired);
        }

        if parsed.is_admin_record() {
            // An aggregate custody signal: free every acknowledged slot.
            let mut guard = self.state.lock()?;
            let state = &mut *guard;
            let table = &mut state.table;
            let count = acs::read(parsed.payload, |cid| {
                let ati = table.index(cid);
                match table.slots[ati].sid.take() {
                    Some(sid) => match self.bundles.relinquish(sid) {
                        Ok(()) => true,
                        Err(error) => {
                            warn!(%error, cid, "relinquish failed during acknowledgment");
                            false
                        }
                    },
                    None => false,
                }
            })?;
            state.stats.acknowledged += count as u64;
            state.table.sweep_oldest();
            if count > 0 {
                self.wakeup.notify_all();
            }
            debug!(count, "aggregate custody signal processed");
            return Ok(Disposition::Acknowledged(count));
        }

        if !self
            .payloads
            .enqueue(Bytes::copy_from_slice(parsed.payload), timeout)?
        {
            return Err(Error::Timeout);
        }

        if parsed.requests_custody() {
            if let Some(custodian) = parsed.custodian {
                let mut guard = self.state.lock()?;
                let state = &mut *guard;
                state.custody.receive(
                    &state.attributes,
                    self.records.as_ref(),
                    custodian,
                    sysnow,
                    flags,
                )?;
                return Ok(Disposition::CustodyTransfer);
            }
        }

        Ok(Disposition::Delivered)
    }

    /// Hands the next delivered payload to the application.
    pub fn accept(&self, timeout: Timeout, _flags: &mut Flags) -> Result<Vec<u8>, Error> {
        match self.payloads.dequeue(timeout)? {
            None => Err(Error::Timeout),
            Some((data, sid)) => {
                self.payloads.relinquish(sid)?;
                self.state.lock()?.stats.delivered += 1;
                Ok(data.to_vec())
            }
        }
    }

    /// Abandons every in-flight custody-tracked bundle.
    pub fn flush(&self) -> Result<(), Error> {
        let mut guard = self.state.lock()?;
        while guard.table.oldest != guard.table.current {
            let ati = guard.table.index(guard.table.oldest);
            if let Some(sid) = guard.table.slots[ati].sid.take() {
                if let Err(error) = self.bundles.relinquish(sid) {
                    warn!(%error, sid, "relinquish failed during flush");
                }
                guard.stats.lost += 1;
            }
            guard.table.oldest += 1;
        }
        Ok(())
    }

    /// Latches the statistics, sampling queue depths and the active count.
    pub fn stats(&self) -> Result<Stats, Error> {
        let mut guard = self.state.lock()?;
        guard.stats.bundles = self.bundles.count();
        guard.stats.payloads = self.payloads.count();
        guard.stats.records = self.records.count();
        guard.stats.active = guard.table.current - guard.table.oldest;
        Ok(guard.stats)
    }

    fn wait_wrap<'a>(
        &self,
        guard: MutexGuard<'a, State>,
    ) -> Result<MutexGuard<'a, State>, Error> {
        let (guard, _) = self.wakeup.wait_timeout(guard, WRAP_TIMEOUT)?;
        Ok(guard)
    }
}
