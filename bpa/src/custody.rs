/*!
The outbound custody-signal engine.

Custody ids received from a peer accumulate in a bounded range tree until a
flush drains them into aggregate custody signal bundles: admin-record
bundles addressed to that peer, queued for the next `load`. A flush happens
when the tree fills, when the accumulation custodian changes, when the
configured signal rate lapses, or when the channel forces one.
*/

use super::*;
use crate::config::Attributes;
use crate::flags::Flags;
use kestrel_bpv6::acs;
use kestrel_bpv6::builder::{Builder, Template};
use kestrel_bpv6::crc::CipherSuite;
use kestrel_bpv6::eid::{Eid, Route};
use kestrel_bpv6::parse::Custodian;
use crate::rb_tree::{InsertError, RbTree};
use crate::storage::{StorageQueue, Timeout};
use crate::stored::StoredBundle;

pub(crate) struct CustodyEngine {
    route: Route,
    /// The peer whose custody ids are being accumulated.
    custodian: Option<Eid>,
    tree: RbTree,
    last_time: u64,
    max_fills: usize,
    template: Option<Template>,
    template_custodian: Option<Eid>,
}

impl CustodyEngine {
    pub fn new(route: Route, attributes: &Attributes) -> Self {
        Self {
            route,
            custodian: None,
            tree: RbTree::new(attributes.max_gaps_per_dacs),
            last_time: 0,
            max_fills: attributes.max_fills_per_dacs,
            template: None,
            template_custodian: None,
        }
    }

    /// Attributes changed: rebuild the signal template before the next
    /// flush.
    pub fn invalidate(&mut self) {
        self.template = None;
    }

    fn template(&mut self, attributes: &Attributes, custodian: Eid) -> &mut Template {
        if self.template_custodian != Some(custodian) {
            self.template = None;
            self.template_custodian = Some(custodian);
        }
        let route = Route {
            local: self.route.local,
            destination: custodian,
            report_to: self.route.report_to,
        };
        self.template.get_or_insert_with(|| {
            Builder::new()
                .route(route)
                .lifetime(attributes.lifetime)
                .admin_record(true)
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

    /// Accounts a custody id received from `custodian`.
    ///
    /// A change of custodian flushes what was accumulated for the previous
    /// one first; a full tree flushes and retries.
    pub fn receive(
        &mut self,
        attributes: &Attributes,
        queue: &dyn StorageQueue,
        custodian: Custodian,
        sysnow: u64,
        flags: &mut Flags,
    ) -> Result<(), Error> {
        if self.custodian != Some(custodian.eid) {
            self.flush(attributes, queue, sysnow, flags)?;
            self.custodian = Some(custodian.eid);
        }

        match self.tree.insert(custodian.cid) {
            Ok(()) => Ok(()),
            // A retransmission the signal in progress already covers.
            Err(InsertError::Duplicate) => Ok(()),
            Err(InsertError::TreeFull) => {
                self.flush(attributes, queue, sysnow, flags)?;
                self.tree
                    .insert(custodian.cid)
                    .map_err(|_| Error::InvalidAttribute("custody tree has no capacity"))
            }
        }
    }

    /// The rate gate run at the top of every `load`.
    pub fn tick(
        &mut self,
        attributes: &Attributes,
        queue: &dyn StorageQueue,
        sysnow: u64,
        flags: &mut Flags,
    ) -> Result<(), Error> {
        if !self.tree.is_empty() && sysnow >= self.last_time + attributes.dacs_rate {
            self.flush(attributes, queue, sysnow, flags)?;
        }
        Ok(())
    }

    /// Drains the tree into signal bundles on the record queue.
    pub fn flush(
        &mut self,
        attributes: &Attributes,
        queue: &dyn StorageQueue,
        sysnow: u64,
        flags: &mut Flags,
    ) -> Result<(), Error> {
        let Some(custodian) = self.custodian else {
            self.last_time = sysnow;
            return Ok(());
        };

        while !self.tree.is_empty() {
            let mut rec = vec![0u8; acs::record_len(self.max_fills)];
            let max_fills = self.max_fills;
            let tree = &mut self.tree;
            let len = acs::write(&mut rec, max_fills, || tree.pop_first())?;

            let bundle = self
                .template(attributes, custodian)
                .finish(&rec[..len], sysnow)?;
            let stored = StoredBundle {
                expiry: bundle.expiry,
                cid: None,
                bytes: Bytes::from(bundle.bytes),
            };

            if queue.enqueue(stored.encode(), Timeout::Check)? {
                debug!(%custodian, record_len = len, "queued aggregate custody signal");
            } else {
                warn!(%custodian, "record queue full, aggregate custody signal dropped");
                flags.store_failure = true;
            }
        }

        self.last_time = sysnow;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageService;

    fn engine() -> (CustodyEngine, Attributes, Box<dyn StorageQueue>) {
        let attributes = Attributes {
            max_gaps_per_dacs: 4,
            max_fills_per_dacs: 64,
            dacs_rate: 5,
            ..Default::default()
        };
        let route = Route {
            local: Eid::new(1, 1),
            destination: Eid::new(2, 1),
            report_to: Eid::new(1, 1),
        };
        let queue = storage_mem::MemStorage::default().create(None).unwrap();
        (CustodyEngine::new(route, &attributes), attributes, queue)
    }

    fn custodian(node: u64, cid: u64) -> Custodian {
        Custodian {
            eid: Eid::new(node, 1),
            cid,
        }
    }

    fn drain_record(queue: &dyn StorageQueue) -> Vec<u8> {
        let (data, sid) = queue.dequeue(Timeout::Check).unwrap().unwrap();
        queue.relinquish(sid).unwrap();
        let stored = StoredBundle::decode(data).unwrap();
        let mut sdnv_flags = kestrel_sdnv::Flags::default();
        let parsed = kestrel_bpv6::parse::parse(&stored.bytes, &mut sdnv_flags).unwrap();
        assert!(parsed.is_admin_record());
        parsed.payload.to_vec()
    }

    #[test]
    fn rate_gate_holds_then_flushes() {
        let (mut engine, attributes, queue) = engine();
        let mut flags = Flags::default();

        engine
            .receive(&attributes, queue.as_ref(), custodian(2, 1), 100, &mut flags)
            .unwrap();
        engine
            .tick(&attributes, queue.as_ref(), 101, &mut flags)
            .unwrap();
        // last_time was stamped by the custodian-change flush at 100.
        assert!(queue.dequeue(Timeout::Check).unwrap().is_none());

        engine
            .tick(&attributes, queue.as_ref(), 105, &mut flags)
            .unwrap();
        let record = drain_record(queue.as_ref());
        let mut acked = Vec::new();
        acs::read(&record, |cid| {
            acked.push(cid);
            true
        })
        .unwrap();
        assert_eq!(acked, [1]);
    }

    #[test]
    fn custodian_change_flushes_previous() {
        let (mut engine, attributes, queue) = engine();
        let mut flags = Flags::default();

        for cid in [1, 2, 3] {
            engine
                .receive(&attributes, queue.as_ref(), custodian(2, cid), 0, &mut flags)
                .unwrap();
        }
        // A different custodian forces the pending signal out.
        engine
            .receive(&attributes, queue.as_ref(), custodian(7, 50), 1, &mut flags)
            .unwrap();

        let record = drain_record(queue.as_ref());
        let mut acked = Vec::new();
        acs::read(&record, |cid| {
            acked.push(cid);
            true
        })
        .unwrap();
        assert_eq!(acked, [1, 2, 3]);
        assert!(queue.dequeue(Timeout::Check).unwrap().is_none());
    }

    #[test]
    fn full_tree_flushes_and_retries() {
        let (mut engine, attributes, queue) = engine();
        let mut flags = Flags::default();

        // Four disjoint runs fill the 4-node tree; the fifth forces a
        // flush and lands in a fresh tree.
        for cid in [10, 20, 30, 40, 50] {
            engine
                .receive(&attributes, queue.as_ref(), custodian(2, cid), 0, &mut flags)
                .unwrap();
        }

        let record = drain_record(queue.as_ref());
        let mut acked = Vec::new();
        acs::read(&record, |cid| {
            acked.push(cid);
            true
        })
        .unwrap();
        assert_eq!(acked, [10, 20, 30, 40]);

        engine
            .flush(&attributes, queue.as_ref(), 2, &mut flags)
            .unwrap();
        let record = drain_record(queue.as_ref());
        let mut acked = Vec::new();
        acs::read(&record, |cid| {
            acked.push(cid);
            true
        })
        .unwrap();
        assert_eq!(acked, [50]);
    }
}
