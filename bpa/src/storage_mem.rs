/*!
A bounded in-memory storage service.

Each queue holds at most `capacity` byte strings, counting both queued and
retained-but-not-relinquished entries. Enqueue blocks while the queue is at
capacity; dequeue blocks while it is empty; both honour the caller's
[`storage::Timeout`].
*/

use super::*;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Condvar, Mutex};
use crate::storage::{Sid, StorageQueue, StorageService, Timeout};

const DEFAULT_CAPACITY: usize = 1024;

/// Creates queues bounded at `capacity` entries.
#[derive(Debug, Clone, Copy)]
pub struct MemStorage {
    capacity: usize,
}

impl Default for MemStorage {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl MemStorage {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }
}

impl StorageService for MemStorage {
    /// `parm`, when given, overrides the capacity as a decimal entry count.
    fn create(&self, parm: Option<&str>) -> storage::Result<Box<dyn StorageQueue>> {
        let capacity = match parm {
            Some(parm) => parm.parse::<usize>().map_err(storage::Error::from)?,
            None => self.capacity,
        };
        Ok(Box::new(Queue {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                retained: BTreeMap::new(),
                next_sid: 1,
                capacity,
            }),
            arrival: Condvar::new(),
            departure: Condvar::new(),
        }))
    }
}

struct Inner {
    pending: VecDeque<(Sid, Bytes)>,
    retained: BTreeMap<Sid, Bytes>,
    next_sid: Sid,
    capacity: usize,
}

impl Inner {
    fn occupancy(&self) -> usize {
        self.pending.len() + self.retained.len()
    }
}

struct Queue {
    inner: Mutex<Inner>,
    arrival: Condvar,
    departure: Condvar,
}

impl Queue {
    /// Waits on `condvar` until `ready` holds or the timeout lapses.
    /// Returns the guard and whether the condition held.
    fn wait_until<'a>(
        &self,
        mut guard: std::sync::MutexGuard<'a, Inner>,
        condvar: &Condvar,
        timeout: Timeout,
        ready: impl Fn(&Inner) -> bool,
    ) -> storage::Result<(std::sync::MutexGuard<'a, Inner>, bool)> {
        match timeout {
            Timeout::Check => {
                let ok = ready(&guard);
                Ok((guard, ok))
            }
            Timeout::Pend => {
                while !ready(&guard) {
                    guard = condvar.wait(guard).map_err(|_| "storage lock poisoned")?;
                }
                Ok((guard, true))
            }
            Timeout::Millis(ms) => {
                let deadline =
                    std::time::Instant::now() + std::time::Duration::from_millis(ms.into());
                while !ready(&guard) {
                    let now = std::time::Instant::now();
                    if now >= deadline {
                        return Ok((guard, false));
                    }
                    let (g, _) = condvar
                        .wait_timeout(guard, deadline - now)
                        .map_err(|_| "storage lock poisoned")?;
                    guard = g;
                }
                Ok((guard, true))
            }
        }
    }
}

impl StorageQueue for Queue {
    fn enqueue(&self, data: Bytes, timeout: Timeout) -> storage::Result<bool> {
        let guard = self.inner.lock().map_err(|_| "storage lock poisoned")?;
        let (mut inner, ready) = self.wait_until(guard, &self.departure, timeout, |inner| {
            inner.occupancy() < inner.capacity
        })?;
        if !ready {
            return Ok(false);
        }
        let sid = inner.next_sid;
        inner.next_sid += 1;
        inner.pending.push_back((sid, data));
        self.arrival.notify_one();
        Ok(true)
    }

    fn dequeue(&self, timeout: Timeout) -> storage::Result<Option<(Bytes, Sid)>> {
        let guard = self.inner.lock().map_err(|_| "storage lock poisoned")?;
        let (mut inner, ready) = self.wait_until(guard, &self.arrival, timeout, |inner| {
            !inner.pending.is_empty()
        })?;
        if !ready {
            return Ok(None);
        }
        let (sid, data) = inner.pending.pop_front().ok_or("queue emptied during wait")?;
        inner.retained.insert(sid, data.clone());
        Ok(Some((data, sid)))
    }

    fn retrieve(&self, sid: Sid, _timeout: Timeout) -> storage::Result<Option<Bytes>> {
        let inner = self.inner.lock().map_err(|_| "storage lock poisoned")?;
        Ok(inner.retained.get(&sid).cloned())
    }

    fn relinquish(&self, sid: Sid) -> storage::Result<()> {
        let mut inner = self.inner.lock().map_err(|_| "storage lock poisoned")?;
        if inner.retained.remove(&sid).is_some() {
            self.departure.notify_one();
        }
        Ok(())
    }

    fn count(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.occupancy())
            .unwrap_or(0)
    }
}
