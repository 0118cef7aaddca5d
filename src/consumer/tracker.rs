// Consumer-side bookkeeping of outstanding requests.
//
// One record per in-flight sequence number, plus an ascending
// (send time, seq) index so the periodic timeout sweep can walk oldest-first
// and stop at the first entry that has not expired.

use std::collections::{BTreeSet, HashMap};

use crate::rto::RtoEstimator;

#[derive(Clone, Copy, Debug)]
pub struct PendingRecord {
    pub first_send_us: u64,
    pub last_send_us: u64,
    /// Number of transmissions, counting the first.
    pub retx_count: u32,
    /// Cleared on the first retransmission; a reply to a retransmitted
    /// request must not feed RTT smoothing.
    pub rtt_eligible: bool,
}

#[derive(Default)]
pub struct PendingTracker {
    records: HashMap<u64, PendingRecord>,
    // Timeout-eligible view, ordered oldest send first
    timeouts: BTreeSet<(u64, u64)>,
    timeout_times: HashMap<u64, u64>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a (re)transmission of `seq` at `now_us` and reports the send
    /// to the RTO estimator. Retransmissions keep their first-send timestamp
    /// and lose RTT eligibility.
    pub fn record<E: RtoEstimator>(&mut self, seq: u64, now_us: u64, estimator: &mut E) {
        let rtt_eligible = match self.records.get_mut(&seq) {
            Some(record) => {
                record.last_send_us = now_us;
                record.retx_count += 1;
                record.rtt_eligible = false;
                false
            }
            None => {
                self.records.insert(
                    seq,
                    PendingRecord {
                        first_send_us: now_us,
                        last_send_us: now_us,
                        retx_count: 1,
                        rtt_eligible: true,
                    },
                );
                true
            }
        };

        if let Some(prev) = self.timeout_times.insert(seq, now_us) {
            self.timeouts.remove(&(prev, seq));
        }
        self.timeouts.insert((now_us, seq));

        estimator.on_sent(seq, now_us, rtt_eligible);
    }

    /// One-pass oldest-first timeout sweep: removes and returns every
    /// sequence whose latest send is at least `rto_us` old. The ascending
    /// order guarantees the sweep can stop at the first survivor.
    pub fn scan_expired(&mut self, now_us: u64, rto_us: u64) -> Vec<u64> {
        let mut expired = Vec::new();

        while let Some(&(send_us, seq)) = self.timeouts.iter().next() {
            if send_us + rto_us <= now_us {
                self.timeouts.remove(&(send_us, seq));
                self.timeout_times.remove(&seq);
                expired.push(seq);
            } else {
                break;
            }
        }

        expired
    }

    /// Drops all bookkeeping for a satisfied sequence, acking the estimator.
    /// The estimator discards the sample itself if the sequence was ever
    /// retransmitted.
    pub fn satisfy<E: RtoEstimator>(
        &mut self,
        seq: u64,
        now_us: u64,
        estimator: &mut E,
    ) -> Option<PendingRecord> {
        self.remove_timeout(seq);

        let record = self.records.remove(&seq);
        if record.is_some() {
            estimator.on_acked(seq, now_us);
        }

        record
    }

    /// Drops all bookkeeping for a permanently failed sequence. No ack is
    /// reported.
    pub fn abandon(&mut self, seq: u64) -> Option<PendingRecord> {
        self.remove_timeout(seq);
        self.records.remove(&seq)
    }

    /// Removes `seq` from the timeout-eligible view only; the record itself
    /// survives for delay accounting. Used when a NACK puts the sequence on
    /// the immediate-retransmit path instead of waiting out the timer.
    pub fn remove_timeout(&mut self, seq: u64) {
        if let Some(send_us) = self.timeout_times.remove(&seq) {
            self.timeouts.remove(&(send_us, seq));
        }
    }

    pub fn get(&self, seq: u64) -> Option<&PendingRecord> {
        self.records.get(&seq)
    }

    /// True if `seq` is awaiting a reply (timeout-eligible).
    pub fn is_outstanding(&self, seq: u64) -> bool {
        self.timeout_times.contains_key(&seq)
    }

    /// Number of timeout-eligible requests in flight.
    pub fn outstanding(&self) -> usize {
        self.timeouts.len()
    }

    /// Number of sequences with any surviving bookkeeping.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockEstimator {
        sent: Vec<(u64, u64, bool)>,
        acked: Vec<(u64, u64)>,
    }

    impl RtoEstimator for MockEstimator {
        fn on_sent(&mut self, seq: u64, now_us: u64, rtt_eligible: bool) {
            self.sent.push((seq, now_us, rtt_eligible));
        }

        fn on_acked(&mut self, seq: u64, now_us: u64) {
            self.acked.push((seq, now_us));
        }

        fn current_timeout_us(&self) -> u64 {
            100_000
        }
    }

    #[test]
    fn round_trip() {
        let mut tracker = PendingTracker::new();
        let mut estimator = MockEstimator::default();

        tracker.record(7, 0, &mut estimator);
        assert!(tracker.is_outstanding(7));

        let record = tracker.satisfy(7, 50_000, &mut estimator).unwrap();
        assert_eq!(record.retx_count, 1);
        assert!(record.rtt_eligible);

        assert!(!tracker.is_outstanding(7));
        assert!(tracker.is_empty());
        assert_eq!(estimator.sent, vec![(7, 0, true)]);
        assert_eq!(estimator.acked, vec![(7, 50_000)]);
    }

    #[test]
    fn timeout_scan_yields_once_in_order() {
        let mut tracker = PendingTracker::new();
        let mut estimator = MockEstimator::default();

        tracker.record(3, 0, &mut estimator);
        tracker.record(1, 10_000, &mut estimator);
        tracker.record(2, 20_000, &mut estimator);

        // rto = 100ms: at t = 115ms the sends at 0 and 10ms have expired
        let expired = tracker.scan_expired(115_000, 100_000);
        assert_eq!(expired, vec![3, 1]);

        // Already-yielded sequences never reappear without a resend
        assert!(tracker.scan_expired(115_000, 100_000).is_empty());

        let expired = tracker.scan_expired(200_000, 100_000);
        assert_eq!(expired, vec![2]);
    }

    #[test]
    fn timeout_exactly_at_boundary() {
        let mut tracker = PendingTracker::new();
        let mut estimator = MockEstimator::default();

        tracker.record(3, 0, &mut estimator);

        assert!(tracker.scan_expired(99_999, 100_000).is_empty());
        assert_eq!(tracker.scan_expired(100_000, 100_000), vec![3]);
    }

    #[test]
    fn retransmission_clears_eligibility() {
        let mut tracker = PendingTracker::new();
        let mut estimator = MockEstimator::default();

        tracker.record(5, 0, &mut estimator);
        tracker.record(5, 30_000, &mut estimator);

        let record = tracker.get(5).unwrap();
        assert_eq!(record.retx_count, 2);
        assert_eq!(record.first_send_us, 0);
        assert_eq!(record.last_send_us, 30_000);
        assert!(!record.rtt_eligible);

        assert_eq!(estimator.sent, vec![(5, 0, true), (5, 30_000, false)]);

        // The resend replaced the timeout index entry rather than adding one
        assert_eq!(tracker.outstanding(), 1);
    }

    #[test]
    fn nack_path_keeps_record() {
        let mut tracker = PendingTracker::new();
        let mut estimator = MockEstimator::default();

        tracker.record(9, 0, &mut estimator);
        tracker.remove_timeout(9);

        assert!(!tracker.is_outstanding(9));
        assert!(tracker.get(9).is_some());
        assert!(tracker.scan_expired(1_000_000, 1).is_empty());

        tracker.abandon(9);
        assert!(tracker.is_empty());
        assert!(estimator.acked.is_empty());
    }
}
