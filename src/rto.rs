// Exponentially weighted mean / deviation RTT estimation in the style of
// RFC 6298: rto = srtt + k * rttvar, clamped below by a floor.

use std::collections::HashMap;

use log::trace;

/// Contract between the consumer core and its retransmission-timeout source.
///
/// `on_sent` with `rtt_eligible = false` marks the sequence's in-flight
/// sample as unusable; a later ack for it must not feed the smoothing. This
/// is how retransmissions and timeouts are kept out of the RTT estimate.
pub trait RtoEstimator {
    fn on_sent(&mut self, seq: u64, now_us: u64, rtt_eligible: bool);
    fn on_acked(&mut self, seq: u64, now_us: u64);
    fn current_timeout_us(&self) -> u64;
}

#[derive(Clone, Copy, Debug)]
pub struct MeanDeviationConfig {
    /// Gain applied to the smoothed RTT, 0 < gain < 1.
    pub gain: f64,
    /// Gain applied to the smoothed deviation, 0 < dev_gain < 1.
    pub dev_gain: f64,
    /// Deviation multiplier in the timeout derivation.
    pub k: f64,
    /// Timeout reported before the first valid sample.
    pub initial_rto_us: u64,
    /// Lower bound on the derived timeout.
    pub min_rto_us: u64,
}

impl Default for MeanDeviationConfig {
    fn default() -> Self {
        Self {
            gain: 0.125,
            dev_gain: 0.25,
            k: 4.0,
            initial_rto_us: 1_000_000,
            min_rto_us: 200_000,
        }
    }
}

impl MeanDeviationConfig {
    pub fn validate(&self) {
        assert!(
            self.gain > 0.0 && self.gain < 1.0,
            "invalid estimator configuration: gain must be in (0, 1)"
        );
        assert!(
            self.dev_gain > 0.0 && self.dev_gain < 1.0,
            "invalid estimator configuration: dev_gain must be in (0, 1)"
        );
        assert!(
            self.k > 0.0,
            "invalid estimator configuration: k must be positive"
        );
        assert!(
            self.min_rto_us > 0,
            "invalid estimator configuration: min_rto_us must be nonzero"
        );
    }
}

/// Mean-deviation RTT estimator.
pub struct MeanDeviation {
    config: MeanDeviationConfig,
    srtt_us: f64,
    rttvar_us: f64,
    rto_us: u64,
    // Send timestamp and sample eligibility per outstanding sequence
    sent: HashMap<u64, (u64, bool)>,
}

impl MeanDeviation {
    pub fn new(config: MeanDeviationConfig) -> Self {
        config.validate();

        Self {
            rto_us: config.initial_rto_us,
            config,
            srtt_us: 0.0,
            rttvar_us: 0.0,
            sent: HashMap::new(),
        }
    }

    fn sample(&mut self, rtt_us: u64) {
        let rtt = rtt_us as f64;

        if self.srtt_us == 0.0 {
            // First sample
            self.srtt_us = rtt;
            self.rttvar_us = rtt / 2.0;
        } else {
            let delta = (self.srtt_us - rtt).abs();
            self.rttvar_us += self.config.dev_gain * (delta - self.rttvar_us);
            self.srtt_us += self.config.gain * (rtt - self.srtt_us);
        }

        let rto = self.srtt_us + self.config.k * self.rttvar_us;
        self.rto_us = (rto as u64).max(self.config.min_rto_us);

        trace!(
            "rtt sample {}us, srtt {:.0}us, rttvar {:.0}us, rto {}us",
            rtt_us,
            self.srtt_us,
            self.rttvar_us,
            self.rto_us
        );
    }
}

impl RtoEstimator for MeanDeviation {
    fn on_sent(&mut self, seq: u64, now_us: u64, rtt_eligible: bool) {
        // A resend overwrites the pending sample; once a sequence is marked
        // ineligible it stays ineligible until it leaves the table.
        let eligible = rtt_eligible && self.sent.get(&seq).map_or(true, |&(_, e)| e);
        self.sent.insert(seq, (now_us, eligible));
    }

    fn on_acked(&mut self, seq: u64, now_us: u64) {
        if let Some((sent_us, eligible)) = self.sent.remove(&seq) {
            if eligible && now_us >= sent_us {
                self.sample(now_us - sent_us);
            }
        }
    }

    fn current_timeout_us(&self) -> u64 {
        self.rto_us
    }
}
