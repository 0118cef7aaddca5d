// Congestion-aware path selection and NACK semantics.
//
// Each forwarding decision draws one candidate at random, weighted by the
// candidates' congestion windows, and attempts only that path. Success and
// failure signals feed back into the windows; NACKs are suppressed until
// every attempted path for the entry has answered in vain.

use log::debug;

use crate::packet::{Interest, NackCode, Packet};
use crate::sim::{FaceId, APP_FACE};

use super::tables::{FibEntry, PathCandidate, PitEntry};
use super::ForwarderContext;

/// Weighted random choice: the first candidate whose cumulative congestion
/// window share reaches `r` (uniform in [0, 1)).
pub fn pick(candidates: &[PathCandidate], r: f64) -> Option<usize> {
    let total: u32 = candidates.iter().map(|c| c.cwnd()).sum();
    if total == 0 {
        return None;
    }

    let mut p_sum = 0.0;
    for (index, candidate) in candidates.iter().enumerate() {
        p_sum += f64::from(candidate.cwnd()) / f64::from(total);
        if r <= p_sum {
            return Some(index);
        }
    }

    // r can exceed the accumulated rounding error past the final share
    None
}

/// Attempts to forward `interest` on exactly one weighted-random candidate.
/// A failed attempt (selected path loops back or was already tried) costs
/// that path one cwnd unit; no second candidate is tried in the same call.
pub(super) fn propagate<C: ForwarderContext>(
    fib_entry: &mut FibEntry,
    pit_entry: &mut PitEntry,
    in_face: FaceId,
    interest: &Interest,
    r: f64,
    ctx: &mut C,
) -> bool {
    let index = match pick(fib_entry.candidates(), r) {
        Some(index) => index,
        None => return false,
    };

    let face = fib_entry.candidate(index).face();
    debug!(
        "selected candidate {} (face {:?}, cwnd {}) for {}",
        index,
        face,
        fib_entry.candidate(index).cwnd(),
        interest.name
    );

    if face == in_face || pit_entry.has_outgoing(face) {
        debug!("cannot send {} via {:?}", interest.name, face);
        fib_entry.candidate_mut(index).decrease_cwnd();
        return false;
    }

    pit_entry.add_outgoing(index, face);

    let mut out = interest.as_plain();
    if face != APP_FACE {
        out.hop_count += 1;
    }
    ctx.send(face, Packet::Interest(out));

    true
}

/// The path that delivered the reply earns one cwnd unit.
pub(super) fn will_satisfy(fib_entry: &mut FibEntry, in_face: FaceId) {
    if let Some(index) = fib_entry.candidate_index(in_face) {
        fib_entry.candidate_mut(index).increase_cwnd();
    }
}

/// Every path attempted for the expired entry loses one cwnd unit.
pub(super) fn will_erase_timed_out(fib_entry: &mut FibEntry, pit_entry: &PitEntry) {
    for record in pit_entry.outgoing() {
        fib_entry.candidate_mut(record.candidate).decrease_cwnd();
    }
}

pub(super) enum NackDisposition {
    /// Another attempted path may still answer; the NACK is swallowed.
    Suppressed,
    /// All attempted paths answered in vain; give up on the entry.
    Exhausted,
}

/// Applies cwnd and bookkeeping effects of a received NACK and decides
/// whether it is propagated or suppressed.
pub(super) fn on_nack(
    fib_entry: &mut FibEntry,
    pit_entry: &mut PitEntry,
    in_face: FaceId,
    code: NackCode,
) -> NackDisposition {
    if matches!(code, NackCode::Congestion | NackCode::GiveUp) {
        if let Some(index) = fib_entry.candidate_index(in_face) {
            fib_entry.candidate_mut(index).decrease_cwnd();
        }
    }

    // The neighbor dropped its own pending state; any incoming record we
    // hold for it is dead
    if code == NackCode::GiveUp {
        pit_entry.remove_incoming(in_face);
    }

    pit_entry.set_in_vain(in_face);

    if pit_entry.all_in_vain() {
        NackDisposition::Exhausted
    } else {
        NackDisposition::Suppressed
    }
}
