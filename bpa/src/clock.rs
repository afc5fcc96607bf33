use super::*;

/// The DTN epoch: 2000-01-01T00:00:00 UTC.
const DTN_EPOCH: time::OffsetDateTime = time::macros::datetime!(2000-01-01 00:00:00 UTC);

/// The time capability the engine consumes.
///
/// Readings are whole seconds since the DTN epoch. The second element of the
/// pair reports whether the reading is trustworthy; an unreliable reading
/// raises [`flags::Flags::unreliable_time`] on the operation that observed
/// it, but processing continues with the value as given.
pub trait Clock: Send + Sync {
    fn now(&self) -> (u64, bool);
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> (u64, bool) {
        let now = time::OffsetDateTime::now_utc();
        if now < DTN_EPOCH {
            (0, false)
        } else {
            ((now - DTN_EPOCH).whole_seconds() as u64, true)
        }
    }
}
