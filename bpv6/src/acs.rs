/*!
The Aggregate Custody Signal record.

An ACS is the payload of an administrative bundle: a record type byte
(`0x40`), a status byte whose low bit signals success, then SDNV fills: the
first acknowledged custody id and the length of its run, followed by
alternating gap/run lengths. Runs count acknowledged ids; gaps count the ids
skipped between runs.
*/

use super::*;

/// Administrative record type: aggregate custody signal.
pub const RECORD_TYPE: u8 = 0x40;

/// Status bit: the signal acknowledges successful custody transfer.
pub const ACK_MASK: u8 = 0x01;

const RECORD_TYPE_INDEX: usize = 0;
const STATUS_INDEX: usize = 1;
const FIRST_CID_INDEX: usize = 2;
const FIRST_CID_WIDTH: usize = 4;
const FILL_WIDTH: usize = 2;

/// A maximal run of consecutive custody ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CidRange {
    /// The first custody id of the run.
    pub first: u64,
    /// The number of ids in the run; never zero.
    pub count: u64,
}

/// The record buffer size needed for `max_fills` fills.
pub const fn record_len(max_fills: usize) -> usize {
    // Type and status bytes, the first custody id, then one fixed-width
    // fill for each run or gap after the first custody id.
    2 + FIRST_CID_WIDTH + FILL_WIDTH * max_fills
}

/// Writes an ACS record into `rec` from ranges drawn lowest-first.
///
/// `next` yields the next pending range, or `None` when the source is
/// drained; it is only invoked while the fill budget allows the range to be
/// written, so an unconsumed range stays pending for the next record. The
/// first custody id and its run count as two fills, as does each gap/run
/// pair. Returns the record length in bytes.
pub fn write(
    rec: &mut [u8],
    max_fills: usize,
    mut next: impl FnMut() -> Option<CidRange>,
) -> Result<usize, Error> {
    let mut flags = Flags::default();

    rec[RECORD_TYPE_INDEX] = RECORD_TYPE;
    rec[STATUS_INDEX] = ACK_MASK;

    let Some(range) = next() else {
        return Err(Error::RecordTooShort);
    };

    let mut at = FIRST_CID_INDEX;
    write_field(rec, &mut at, range.first, FIRST_CID_WIDTH, &mut flags);
    write_field(rec, &mut at, range.count, FILL_WIDTH, &mut flags);
    let mut fills = 2;
    let mut prev = range;

    while fills + 2 <= max_fills {
        let Some(range) = next() else {
            break;
        };

        // The ids missing between the previous run and this one.
        let gap = range.first - (prev.first + prev.count);
        write_field(rec, &mut at, gap, FILL_WIDTH, &mut flags);
        write_field(rec, &mut at, range.count, FILL_WIDTH, &mut flags);
        fills += 2;
        prev = range;
    }

    if flags.incomplete {
        return Err(Error::InvalidSdnv(sdnv::decode::Error::Incomplete));
    } else if flags.overflow {
        return Err(Error::InvalidSdnv(sdnv::decode::Error::Overflow));
    }
    Ok(at)
}

/// Reads an ACS record, invoking `ack` for every custody id of every run
/// when the record's success bit is set.
///
/// Returns the number of invocations for which `ack` returned `true` (ids
/// that matched an outstanding bundle).
pub fn read(rec: &[u8], mut ack: impl FnMut(u64) -> bool) -> Result<usize, Error> {
    if rec.len() <= FIRST_CID_INDEX {
        return Err(Error::RecordTooShort);
    } else if rec[RECORD_TYPE_INDEX] != RECORD_TYPE {
        return Err(Error::InvalidRecordType(rec[RECORD_TYPE_INDEX]));
    }
    let ack_success = rec[STATUS_INDEX] & ACK_MASK == ACK_MASK;

    let mut flags = Flags::default();
    let mut at = FIRST_CID_INDEX;
    let mut cid = read_field(rec, &mut at, &mut flags)?.value;

    let mut in_run = true;
    let mut count = 0;
    while at < rec.len() {
        let fill = read_field(rec, &mut at, &mut flags)?.value;
        if in_run && ack_success {
            for i in 0..fill {
                if ack(cid + i) {
                    count += 1;
                }
            }
        }
        in_run = !in_run;
        cid += fill;
    }

    Ok(count)
}
