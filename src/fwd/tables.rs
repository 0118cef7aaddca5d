// Forwarding tables: the FIB maps name prefixes to indexed lists of path
// candidates carrying per-path congestion windows; the PIT tracks in-flight
// interests and the paths attempted for each. Requests reference candidates
// by (route, index), never by holding onto table internals.

use std::collections::HashMap;

use crate::name::Name;
use crate::packet::Interest;
use crate::sim::FaceId;

/// One next-hop path for a route, with its congestion window.
#[derive(Clone, Copy, Debug)]
pub struct PathCandidate {
    face: FaceId,
    cwnd: u32,
}

impl PathCandidate {
    pub fn new(face: FaceId, initial_cwnd: u32) -> Self {
        debug_assert!(initial_cwnd >= 1);

        Self {
            face,
            cwnd: initial_cwnd.max(1),
        }
    }

    pub fn face(&self) -> FaceId {
        self.face
    }

    pub fn cwnd(&self) -> u32 {
        self.cwnd
    }

    pub fn increase_cwnd(&mut self) {
        self.cwnd = self.cwnd.saturating_add(1);
    }

    /// Floored at one; further decreases are no-ops.
    pub fn decrease_cwnd(&mut self) {
        if self.cwnd > 1 {
            self.cwnd -= 1;
        }
    }
}

/// Stable handle to a FIB entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RouteId(usize);

pub struct FibEntry {
    prefix: Name,
    candidates: Vec<PathCandidate>,
}

impl FibEntry {
    pub fn prefix(&self) -> &Name {
        &self.prefix
    }

    pub fn candidates(&self) -> &[PathCandidate] {
        &self.candidates
    }

    pub fn candidate(&self, index: usize) -> &PathCandidate {
        &self.candidates[index]
    }

    pub fn candidate_mut(&mut self, index: usize) -> &mut PathCandidate {
        &mut self.candidates[index]
    }

    pub fn candidate_index(&self, face: FaceId) -> Option<usize> {
        self.candidates.iter().position(|c| c.face() == face)
    }
}

#[derive(Default)]
pub struct Fib {
    entries: Vec<FibEntry>,
}

impl Fib {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers `face` as a path candidate under `prefix`, creating the
    /// entry on first use.
    pub fn add_route(&mut self, prefix: Name, face: FaceId, initial_cwnd: u32) -> RouteId {
        let index = match self.entries.iter().position(|e| e.prefix == prefix) {
            Some(index) => index,
            None => {
                self.entries.push(FibEntry {
                    prefix,
                    candidates: Vec::new(),
                });
                self.entries.len() - 1
            }
        };

        let entry = &mut self.entries[index];
        if entry.candidate_index(face).is_none() {
            entry.candidates.push(PathCandidate::new(face, initial_cwnd));
        }

        RouteId(index)
    }

    /// Longest-prefix match.
    pub fn lookup(&self, name: &Name) -> Option<RouteId> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| name.has_prefix(&e.prefix))
            .max_by_key(|(_, e)| e.prefix.len())
            .map(|(index, _)| RouteId(index))
    }

    pub fn entry(&self, route: RouteId) -> &FibEntry {
        &self.entries[route.0]
    }

    pub fn entry_mut(&mut self, route: RouteId) -> &mut FibEntry {
        &mut self.entries[route.0]
    }
}

/// Record of one attempted outgoing path for a pending interest.
#[derive(Clone, Copy, Debug)]
pub struct OutRecord {
    pub candidate: usize,
    pub face: FaceId,
    /// Set when the path answered with a NACK instead of data.
    pub in_vain: bool,
}

pub struct PitEntry {
    route: RouteId,
    /// The interest in its plain (non-NACK) form, kept for NACK synthesis.
    interest: Interest,
    nonces: Vec<u32>,
    incoming: Vec<FaceId>,
    outgoing: Vec<OutRecord>,
    expiry_us: u64,
}

impl PitEntry {
    pub fn new(route: RouteId, interest: Interest, expiry_us: u64) -> Self {
        Self {
            route,
            interest: interest.as_plain(),
            nonces: Vec::new(),
            incoming: Vec::new(),
            outgoing: Vec::new(),
            expiry_us,
        }
    }

    pub fn route(&self) -> RouteId {
        self.route
    }

    pub fn interest(&self) -> &Interest {
        &self.interest
    }

    pub fn expiry_us(&self) -> u64 {
        self.expiry_us
    }

    pub fn set_expiry_us(&mut self, expiry_us: u64) {
        self.expiry_us = expiry_us;
    }

    /// True if `nonce` was seen before (a looping or duplicate interest).
    pub fn has_nonce(&self, nonce: u32) -> bool {
        self.nonces.contains(&nonce)
    }

    pub fn add_nonce(&mut self, nonce: u32) {
        if !self.nonces.contains(&nonce) {
            self.nonces.push(nonce);
        }
    }

    pub fn incoming(&self) -> &[FaceId] {
        &self.incoming
    }

    pub fn add_incoming(&mut self, face: FaceId) {
        if !self.incoming.contains(&face) {
            self.incoming.push(face);
        }
    }

    /// Drops the incoming record for a neighbor that abandoned its own
    /// pending state.
    pub fn remove_incoming(&mut self, face: FaceId) {
        self.incoming.retain(|&f| f != face);
    }

    pub fn outgoing(&self) -> &[OutRecord] {
        &self.outgoing
    }

    pub fn has_outgoing(&self, face: FaceId) -> bool {
        self.outgoing.iter().any(|o| o.face == face)
    }

    pub fn add_outgoing(&mut self, candidate: usize, face: FaceId) {
        debug_assert!(!self.has_outgoing(face));

        self.outgoing.push(OutRecord {
            candidate,
            face,
            in_vain: false,
        });
    }

    /// Marks the attempted path through `face` as answered in vain.
    pub fn set_in_vain(&mut self, face: FaceId) {
        if let Some(record) = self.outgoing.iter_mut().find(|o| o.face == face) {
            record.in_vain = true;
        }
    }

    /// True once every attempted path has answered in vain.
    pub fn all_in_vain(&self) -> bool {
        self.outgoing.iter().all(|o| o.in_vain)
    }
}

#[derive(Default)]
pub struct Pit {
    entries: HashMap<Name, PitEntry>,
}

impl Pit {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, name: &Name) -> Option<&PitEntry> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &Name) -> Option<&mut PitEntry> {
        self.entries.get_mut(name)
    }

    pub fn insert(&mut self, name: Name, entry: PitEntry) {
        self.entries.insert(name, entry);
    }

    pub fn get_or_insert_with<F>(&mut self, name: &Name, create: F) -> &mut PitEntry
    where
        F: FnOnce() -> PitEntry,
    {
        self.entries.entry(name.clone()).or_insert_with(create)
    }

    pub fn remove(&mut self, name: &Name) -> Option<PitEntry> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &Name) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cwnd_floor() {
        let mut candidate = PathCandidate::new(FaceId(1), 3);

        for _ in 0..10 {
            candidate.decrease_cwnd();
        }
        assert_eq!(candidate.cwnd(), 1);

        candidate.increase_cwnd();
        assert_eq!(candidate.cwnd(), 2);
    }

    #[test]
    fn longest_prefix_lookup() {
        let mut fib = Fib::new();
        let short = fib.add_route(Name::from_uri("/a"), FaceId(1), 1);
        let long = fib.add_route(Name::from_uri("/a/b"), FaceId(2), 1);

        assert_eq!(fib.lookup(&Name::from_uri("/a/b/3")), Some(long));
        assert_eq!(fib.lookup(&Name::from_uri("/a/x")), Some(short));
        assert_eq!(fib.lookup(&Name::from_uri("/z")), None);
    }

    #[test]
    fn route_accumulates_candidates() {
        let mut fib = Fib::new();
        let route = fib.add_route(Name::from_uri("/a"), FaceId(1), 2);
        let same = fib.add_route(Name::from_uri("/a"), FaceId(2), 2);
        assert_eq!(route, same);

        // Re-adding a face does not duplicate the candidate
        fib.add_route(Name::from_uri("/a"), FaceId(1), 2);

        let entry = fib.entry(route);
        assert_eq!(entry.candidates().len(), 2);
        assert_eq!(entry.candidate_index(FaceId(2)), Some(1));
    }

    #[test]
    fn in_vain_accounting() {
        let mut fib = Fib::new();
        let route = fib.add_route(Name::from_uri("/a"), FaceId(1), 1);

        let interest = Interest::new(Name::from_uri("/a/1"), 9, 2_000_000);
        let mut entry = PitEntry::new(route, interest, 2_000_000);

        entry.add_outgoing(0, FaceId(1));
        entry.add_outgoing(1, FaceId(2));

        assert!(!entry.all_in_vain());
        entry.set_in_vain(FaceId(1));
        assert!(!entry.all_in_vain());
        entry.set_in_vain(FaceId(2));
        assert!(entry.all_in_vain());
    }

    #[test]
    fn nonce_and_incoming_dedup() {
        let mut fib = Fib::new();
        let route = fib.add_route(Name::from_uri("/a"), FaceId(1), 1);

        let interest = Interest::new(Name::from_uri("/a/1"), 9, 2_000_000);
        let mut entry = PitEntry::new(route, interest, 2_000_000);

        entry.add_nonce(9);
        entry.add_nonce(9);
        assert!(entry.has_nonce(9));
        assert!(!entry.has_nonce(10));

        entry.add_incoming(FaceId(4));
        entry.add_incoming(FaceId(4));
        assert_eq!(entry.incoming().len(), 1);

        entry.remove_incoming(FaceId(4));
        assert!(entry.incoming().is_empty());
    }
}
