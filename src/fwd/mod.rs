// Forwarding layer of a node: admits interests into the PIT, delegates the
// path decision to the congestion-aware strategy, fans satisfied data back
// out to the requesting faces, and applies the NACK suppression rules.

use log::debug;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::name::Name;
use crate::packet::{Data, Interest, NackCode, Packet};
use crate::sim::FaceId;

pub mod strategy;
pub mod tables;

use self::strategy::NackDisposition;
use self::tables::{Fib, Pit, PitEntry};

/// Host seam for the forwarding layer: clock, per-face egress, and the
/// per-entry expiry timer. Setting an entry's expiry timer replaces any
/// previously scheduled one.
pub trait ForwarderContext {
    fn now_us(&self) -> u64;

    fn send(&mut self, face: FaceId, packet: Packet);

    fn set_expiry_timer(&mut self, name: &Name, time_us: u64);

    fn unset_expiry_timer(&mut self, name: &Name);
}

/// Configuration for a [`Forwarder`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Whether this node emits and honors NACKs.
    pub nacks_enabled: bool,

    /// Congestion window assigned to newly registered path candidates.
    pub initial_cwnd: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nacks_enabled: true,
            initial_cwnd: 1,
        }
    }
}

impl Config {
    fn validate(&self) {
        assert!(
            self.initial_cwnd >= 1,
            "invalid forwarder configuration: initial_cwnd must be at least 1"
        );
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Stats {
    pub interests_received: u64,
    pub interests_forwarded: u64,
    pub data_received: u64,
    pub data_forwarded: u64,
    pub nacks_received: u64,
    pub nacks_sent: u64,
    pub nacks_suppressed: u64,
    pub entries_expired: u64,
}

pub struct Forwarder {
    config: Config,
    fib: Fib,
    pit: Pit,
    rng: SmallRng,
    stats: Stats,
}

impl Forwarder {
    pub fn new(config: Config, seed: u64) -> Self {
        config.validate();

        Self {
            config,
            fib: Fib::new(),
            pit: Pit::new(),
            rng: SmallRng::seed_from_u64(seed),
            stats: Stats::default(),
        }
    }

    pub fn add_route(&mut self, prefix: Name, face: FaceId) {
        self.fib.add_route(prefix, face, self.config.initial_cwnd);
    }

    pub fn fib(&self) -> &Fib {
        &self.fib
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn handle_interest<C: ForwarderContext>(
        &mut self,
        in_face: FaceId,
        interest: Interest,
        ctx: &mut C,
    ) {
        if let Some(code) = interest.nack {
            if self.config.nacks_enabled {
                self.handle_nack(in_face, &interest, code, ctx);
            } else {
                debug!("nacks disabled, dropping nack for {}", interest.name);
            }
            return;
        }

        self.stats.interests_received += 1;

        // A nonce revisiting an entry means the interest looped
        if let Some(entry) = self.pit.get(&interest.name) {
            if entry.has_nonce(interest.nonce) {
                debug!(
                    "duplicate interest for {} (nonce {})",
                    interest.name, interest.nonce
                );
                if self.config.nacks_enabled {
                    self.stats.nacks_sent += 1;
                    ctx.send(in_face, Packet::Interest(interest.as_nack(NackCode::Loop)));
                }
                return;
            }
        }

        let route = match self.fib.lookup(&interest.name) {
            Some(route) => route,
            None => {
                debug!("no route for {}", interest.name);
                if self.config.nacks_enabled {
                    self.stats.nacks_sent += 1;
                    ctx.send(
                        in_face,
                        Packet::Interest(interest.as_nack(NackCode::GiveUp)),
                    );
                }
                return;
            }
        };

        let expiry_us = ctx.now_us() + interest.lifetime_us;

        let entry = self
            .pit
            .get_or_insert_with(&interest.name, || {
                PitEntry::new(route, interest.clone(), expiry_us)
            });

        entry.add_nonce(interest.nonce);
        entry.add_incoming(in_face);

        // A retransmission extends the entry's lifetime
        if expiry_us > entry.expiry_us() {
            entry.set_expiry_us(expiry_us);
        }
        let entry_expiry_us = entry.expiry_us();
        ctx.set_expiry_timer(&interest.name, entry_expiry_us);

        let r = self.rng.gen();
        let propagated = strategy::propagate(
            self.fib.entry_mut(route),
            entry,
            in_face,
            &interest,
            r,
            ctx,
        );

        if propagated {
            self.stats.interests_forwarded += 1;
        } else {
            self.did_exhaust(&interest.name, &interest, ctx);
        }
    }

    pub fn handle_data<C: ForwarderContext>(&mut self, in_face: FaceId, data: Data, ctx: &mut C) {
        self.stats.data_received += 1;

        let entry = match self.pit.remove(&data.name) {
            Some(entry) => entry,
            None => {
                debug!("unsolicited data for {}", data.name);
                return;
            }
        };

        strategy::will_satisfy(self.fib.entry_mut(entry.route()), in_face);

        ctx.unset_expiry_timer(&data.name);

        for &face in entry.incoming() {
            if face != in_face {
                self.stats.data_forwarded += 1;
                ctx.send(face, Packet::Data(data.clone()));
            }
        }
    }

    /// Fires when a pending entry's lifetime elapses with no reply.
    pub fn handle_expiry<C: ForwarderContext>(&mut self, name: &Name, _ctx: &mut C) {
        let entry = match self.pit.remove(name) {
            Some(entry) => entry,
            None => return,
        };

        debug!("pending interest for {} timed out", name);
        self.stats.entries_expired += 1;

        strategy::will_erase_timed_out(self.fib.entry_mut(entry.route()), &entry);
    }

    fn handle_nack<C: ForwarderContext>(
        &mut self,
        in_face: FaceId,
        nack: &Interest,
        code: NackCode,
        ctx: &mut C,
    ) {
        self.stats.nacks_received += 1;
        debug!("nack {:?} for {}", code, nack.name);

        let entry = match self.pit.get_mut(&nack.name) {
            Some(entry) => entry,
            None => {
                debug!("nack for {} without pending entry", nack.name);
                return;
            }
        };

        let disposition = strategy::on_nack(self.fib.entry_mut(entry.route()), entry, in_face, code);

        match disposition {
            NackDisposition::Suppressed => {
                // Another path may still deliver; swallow the NACK
                debug!("not all outgoing in vain for {}", nack.name);
                self.stats.nacks_suppressed += 1;
            }
            NackDisposition::Exhausted => {
                // Re-enter forwarding with the NACK flag cleared, as a fresh
                // interest that has nowhere left to go
                let plain = nack.as_plain();
                self.did_exhaust(&nack.name, &plain, ctx);
            }
        }
    }

    /// All forwarding options for `name` are spent: the entry is dropped and
    /// every requester is told to give up.
    fn did_exhaust<C: ForwarderContext>(&mut self, name: &Name, interest: &Interest, ctx: &mut C) {
        let entry = match self.pit.remove(name) {
            Some(entry) => entry,
            None => return,
        };

        debug!("forwarding options exhausted for {}", name);
        ctx.unset_expiry_timer(name);

        if self.config.nacks_enabled {
            for &face in entry.incoming() {
                self.stats.nacks_sent += 1;
                ctx.send(face, Packet::Interest(interest.as_nack(NackCode::GiveUp)));
            }
        }
    }
}
