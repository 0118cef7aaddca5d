// Consumer flow controller: issues a paced stream of numbered interests for
// one name prefix, tracks the outstanding ones, and reacts to replies, NACKs
// and timeouts. The pacing policy and the sequence source (sequential or
// popularity-sampled) are chosen once at setup.

use std::collections::BTreeSet;

use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::name::Name;
use crate::packet::{Data, Interest};
use crate::rto::{MeanDeviation, MeanDeviationConfig, RtoEstimator};

pub mod pacing;
pub mod tracker;
pub mod zipf;

use self::pacing::{AimdWindow, Pacing, PacingPolicy, RatePacing, WindowPacing, WindowRule};
use self::tracker::PendingTracker;
use self::zipf::ZipfMandelbrot;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerName {
    // Next paced interest transmission
    Send,
    // Periodic retransmission-timeout sweep
    RetxCheck,
}

/// Host seam for the consumer core: clock, egress, timers, and pass-through
/// delay observability. Setting a timer replaces any previously set instance
/// of the same timer.
pub trait ConsumerContext {
    fn now_us(&self) -> u64;

    fn send_interest(&mut self, interest: Interest);

    fn set_timer(&mut self, timer: TimerName, time_us: u64);

    fn unset_timer(&mut self, timer: TimerName);

    /// Reply delay relative to the most recent (re)send of the sequence.
    fn on_last_delay(&mut self, _seq: u64, _delay_us: u64, _hop_count: u32) {}

    /// Reply delay relative to the first send of the sequence.
    fn on_full_delay(&mut self, _seq: u64, _delay_us: u64, _retx_count: u32, _hop_count: u32) {}
}

/// Order in which the consumer walks the content catalog.
#[derive(Clone, Copy, Debug)]
pub enum RequestMode {
    /// Monotonically increasing sequence numbers.
    Sequential,
    /// Indices drawn from a Zipf-Mandelbrot popularity distribution over a
    /// catalog of `contents` items.
    Sampled { contents: u32, q: f64, s: f64 },
}

#[derive(Clone, Copy, Debug)]
pub enum WindowConfig {
    Fixed(u32),
    Aimd { initial_window: u32 },
}

#[derive(Clone, Copy, Debug)]
pub enum PacingConfig {
    Window(WindowConfig),
    Rate { frequency: f64 },
}

/// Configuration for a [`Consumer`].
#[derive(Clone, Debug)]
pub struct Config {
    /// Name prefix all requests are issued under.
    pub prefix: Name,

    /// First sequence number in sequential mode; also the base of the
    /// issued-request counter that `seq_max` bounds.
    pub start_seq: u64,

    pub request_mode: RequestMode,

    /// Lifetime stamped on each outgoing interest.
    pub lifetime_us: u64,

    /// Cadence of the periodic timeout sweep.
    pub retx_interval_us: u64,

    /// Stop issuing new sequence numbers once this many have been generated.
    pub seq_max: Option<u64>,

    /// Maximum length of the random alphabetic component inserted before the
    /// sequence number; zero disables the component entirely.
    pub rand_component_len_max: usize,

    pub pacing: PacingConfig,

    pub estimator: MeanDeviationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: Name::from_uri("/"),
            start_seq: 0,
            request_mode: RequestMode::Sequential,
            lifetime_us: 2_000_000,
            retx_interval_us: 50_000,
            seq_max: None,
            rand_component_len_max: 0,
            pacing: PacingConfig::Rate { frequency: 10.0 },
            estimator: Default::default(),
        }
    }
}

impl Config {
    fn validate(&self) {
        assert!(
            self.lifetime_us > 0,
            "invalid consumer configuration: lifetime_us must be nonzero"
        );
        assert!(
            self.retx_interval_us > 0,
            "invalid consumer configuration: retx_interval_us must be nonzero"
        );

        match self.pacing {
            PacingConfig::Rate { frequency } => {
                assert!(
                    frequency > 0.0,
                    "invalid consumer configuration: frequency must be positive"
                );
            }
            PacingConfig::Window(WindowConfig::Fixed(window)) => {
                assert!(
                    window >= 1,
                    "invalid consumer configuration: window must be at least 1"
                );
            }
            PacingConfig::Window(WindowConfig::Aimd { initial_window }) => {
                assert!(
                    initial_window >= 1,
                    "invalid consumer configuration: initial window must be at least 1"
                );
            }
        }

        if let RequestMode::Sampled { contents, q, s } = self.request_mode {
            assert!(
                contents >= 1,
                "invalid consumer configuration: catalog size must be at least 1"
            );
            assert!(
                s > 0.0,
                "invalid consumer configuration: skew exponent must be positive"
            );
            assert!(
                q >= 0.0,
                "invalid consumer configuration: offset must be nonnegative"
            );
        }

        self.estimator.validate();
    }
}

enum SeqSource {
    Sequential,
    Sampled(ZipfMandelbrot),
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    pub interests_sent: u64,
    /// Sends that reused a sequence number from the retransmit queue.
    pub retransmissions: u64,
    pub data_received: u64,
    pub nacks_received: u64,
    pub timeouts: u64,
}

/// Consumer flow controller for one prefix.
pub struct Consumer {
    prefix: Name,
    lifetime_us: u64,
    retx_interval_us: u64,
    seq_max: Option<u64>,
    rand_component_len_max: usize,

    source: SeqSource,
    pacing: Pacing,
    estimator: MeanDeviation,
    tracker: PendingTracker,

    // Sequences marked for immediate resend, drained smallest-first
    retx_queue: BTreeSet<u64>,
    // Next unissued sequence number / count of issued requests
    seq: u64,

    active: bool,
    send_pending: bool,

    // Cached random-component template
    rand_component: String,

    rng: SmallRng,
    stats: Stats,
}

impl Consumer {
    pub fn new(config: Config, seed: u64) -> Self {
        config.validate();

        let source = match config.request_mode {
            RequestMode::Sequential => SeqSource::Sequential,
            RequestMode::Sampled { contents, q, s } => {
                SeqSource::Sampled(ZipfMandelbrot::new(contents, q, s))
            }
        };

        let pacing = match config.pacing {
            PacingConfig::Window(WindowConfig::Fixed(window)) => {
                Pacing::Window(WindowPacing::new(WindowRule::Fixed(window)))
            }
            PacingConfig::Window(WindowConfig::Aimd { initial_window }) => {
                Pacing::Window(WindowPacing::new(WindowRule::Aimd(AimdWindow::new(
                    initial_window,
                ))))
            }
            PacingConfig::Rate { frequency } => Pacing::Rate(RatePacing::new(frequency)),
        };

        Self {
            prefix: config.prefix,
            lifetime_us: config.lifetime_us,
            retx_interval_us: config.retx_interval_us,
            seq_max: config.seq_max,
            rand_component_len_max: config.rand_component_len_max,
            source,
            pacing,
            estimator: MeanDeviation::new(config.estimator),
            tracker: PendingTracker::new(),
            retx_queue: BTreeSet::new(),
            seq: config.start_seq,
            active: false,
            send_pending: false,
            rand_component: String::new(),
            rng: SmallRng::seed_from_u64(seed),
            stats: Stats::default(),
        }
    }

    pub fn start<C: ConsumerContext>(&mut self, ctx: &mut C) {
        self.active = true;

        let now_us = ctx.now_us();
        ctx.set_timer(TimerName::RetxCheck, now_us + self.retx_interval_us);

        self.schedule_next_send(ctx);
    }

    pub fn stop<C: ConsumerContext>(&mut self, ctx: &mut C) {
        ctx.unset_timer(TimerName::Send);
        ctx.unset_timer(TimerName::RetxCheck);

        self.send_pending = false;
        self.active = false;
    }

    pub fn handle_timer<C: ConsumerContext>(&mut self, timer: TimerName, ctx: &mut C) {
        if !self.active {
            return;
        }

        match timer {
            TimerName::Send => {
                self.send_pending = false;
                self.send_packet(ctx);
            }
            TimerName::RetxCheck => {
                self.check_retx_timeout(ctx);
            }
        }
    }

    fn check_retx_timeout<C: ConsumerContext>(&mut self, ctx: &mut C) {
        let now_us = ctx.now_us();
        let rto_us = self.estimator.current_timeout_us();

        for seq in self.tracker.scan_expired(now_us, rto_us) {
            self.on_timeout(seq, now_us, ctx);
        }

        ctx.set_timer(TimerName::RetxCheck, now_us + self.retx_interval_us);
    }

    fn on_timeout<C: ConsumerContext>(&mut self, seq: u64, now_us: u64, ctx: &mut C) {
        debug!("timeout for {}, rto {}us", seq, self.estimator.current_timeout_us());

        self.stats.timeouts += 1;

        // A timeout is not a latency measurement; poison the pending sample
        self.estimator.on_sent(seq, now_us, false);

        self.retx_queue.insert(seq);
        self.pacing.adjust_on_timeout();
        self.schedule_next_send(ctx);
    }

    fn send_packet<C: ConsumerContext>(&mut self, ctx: &mut C) {
        if !self.active {
            return;
        }

        // Pending retransmissions take precedence over new sequence numbers
        let retx = self.retx_queue.iter().next().copied();
        let seq = if let Some(seq) = retx {
            self.retx_queue.remove(&seq);
            self.stats.retransmissions += 1;
            seq
        } else {
            if let Some(seq_max) = self.seq_max {
                if self.seq >= seq_max {
                    // Fully issued; outstanding requests still complete
                    return;
                }
            }

            let seq = match &mut self.source {
                SeqSource::Sequential => self.seq,
                SeqSource::Sampled(sampler) => {
                    assert!(
                        self.tracker.outstanding() < sampler.catalog_size() as usize,
                        "content catalog exhausted: {} of {} entries outstanding",
                        self.tracker.outstanding(),
                        sampler.catalog_size()
                    );

                    // Do not issue a duplicate outstanding request
                    loop {
                        let candidate = sampler.draw(&mut self.rng);
                        if !self.tracker.is_outstanding(candidate) {
                            break candidate;
                        }
                    }
                }
            };

            self.seq += 1;
            seq
        };

        let mut name = self.prefix.clone();
        if self.rand_component_len_max > 0 {
            let component = self.random_component();
            name.push(&component);
        }
        name.push_seq(seq);

        let now_us = ctx.now_us();
        self.tracker.record(seq, now_us, &mut self.estimator);

        debug!("> interest for {}", name);

        self.stats.interests_sent += 1;
        ctx.send_interest(Interest::new(name, self.rng.gen(), self.lifetime_us));

        self.schedule_next_send(ctx);
    }

    /// Bounded-length random alphabetic component. The cached template is
    /// regenerated only when it no longer covers the configured maximum
    /// length; individual components are random-length prefixes of it.
    fn random_component(&mut self) -> String {
        let len_max = self.rand_component_len_max;

        if len_max >= self.rand_component.len() {
            self.rand_component.clear();
            for _ in 0..=len_max {
                self.rand_component
                    .push(char::from(b'a' + self.rng.gen_range(0..26)));
            }
        }

        let len = self.rng.gen_range(1..=len_max);
        self.rand_component[..len].to_owned()
    }

    fn schedule_next_send<C: ConsumerContext>(&mut self, ctx: &mut C) {
        // At most one scheduled send at any time
        if !self.active || self.send_pending {
            return;
        }

        if let Some(delay_us) = self.pacing.next_send_delay_us(self.tracker.outstanding()) {
            ctx.set_timer(TimerName::Send, ctx.now_us() + delay_us);
            self.send_pending = true;
        }
    }

    pub fn handle_data<C: ConsumerContext>(&mut self, data: &Data, ctx: &mut C) {
        if !self.active {
            return;
        }

        let seq = match data.name.trailing_seq() {
            Some(seq) => seq,
            None => {
                debug!("data without sequence component: {}", data.name);
                return;
            }
        };

        debug!("< data for {}", seq);
        self.stats.data_received += 1;

        let now_us = ctx.now_us();
        if let Some(record) = self.tracker.get(seq).copied() {
            ctx.on_last_delay(seq, now_us - record.last_send_us, data.hop_count);
            ctx.on_full_delay(
                seq,
                now_us - record.first_send_us,
                record.retx_count,
                data.hop_count,
            );
        }

        self.tracker.satisfy(seq, now_us, &mut self.estimator);
        self.retx_queue.remove(&seq);

        self.pacing.adjust_on_data();
        self.schedule_next_send(ctx);
    }

    pub fn handle_nack<C: ConsumerContext>(&mut self, nack: &Interest, ctx: &mut C) {
        if !self.active {
            return;
        }

        let seq = match nack.name.trailing_seq() {
            Some(seq) => seq,
            None => {
                debug!("nack without sequence component: {}", nack.name);
                return;
            }
        };

        debug!("< nack ({:?}) for {}", nack.nack, seq);
        self.stats.nacks_received += 1;

        // Retry immediately rather than waiting out the timer
        self.retx_queue.insert(seq);
        self.tracker.remove_timeout(seq);

        self.pacing.adjust_on_nack();
        self.schedule_next_send(ctx);
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn outstanding(&self) -> usize {
        self.tracker.outstanding()
    }

    pub fn current_rto_us(&self) -> u64 {
        self.estimator.current_timeout_us()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True once every issued request has been answered and nothing remains
    /// to send or resend.
    pub fn finished(&self) -> bool {
        match self.seq_max {
            Some(seq_max) => {
                self.seq >= seq_max && self.retx_queue.is_empty() && self.tracker.is_empty()
            }
            None => false,
        }
    }
}
