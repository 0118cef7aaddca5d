// Deterministic discrete-event harness: a single priority queue of events
// ordered by (time, insertion sequence), nodes joined by fixed-delay
// point-to-point links, and one reserved application face per node through
// which consumers and producers talk to their own forwarding layer.
//
// Every handler runs to completion before the next event fires; handlers
// never touch the queue directly but buffer actions that are applied
// afterwards, so no locking or re-entrancy guards are needed anywhere.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::hash::Hasher;

use log::trace;
use siphasher::sip::SipHasher13;

use crate::consumer::{self, Consumer, ConsumerContext};
use crate::fwd::{self, Forwarder, ForwarderContext};
use crate::name::Name;
use crate::packet::{Interest, Packet};
use crate::producer::Producer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceId(pub u32);

/// Face 0 of every node is reserved for its local application.
pub const APP_FACE: FaceId = FaceId(0);

enum EventKind {
    /// Packet arriving at a node's forwarding layer via `face`.
    Deliver {
        node: NodeId,
        face: FaceId,
        packet: Packet,
    },
    /// Packet the forwarding layer pushed out the app face.
    DeliverToApp { node: NodeId, packet: Packet },
    ConsumerStart { node: NodeId },
    ConsumerTimer {
        node: NodeId,
        timer: consumer::TimerName,
    },
    PitExpire { node: NodeId, name: Name },
}

struct ScheduledEvent {
    time_us: u64,
    seq: u64,
    kind: EventKind,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time_us == other.time_us && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, earliest event must surface
        match other.time_us.cmp(&self.time_us) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ordering => ordering,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum TimerKey {
    Consumer(consumer::TimerName),
    Expiry(Name),
}

#[derive(Clone, Copy)]
struct FaceEnd {
    peer: NodeId,
    peer_face: FaceId,
    delay_us: u64,
}

enum App {
    Consumer(Consumer),
    Producer(Producer),
}

struct Node {
    forwarder: Forwarder,
    app: Option<App>,
    faces: HashMap<FaceId, FaceEnd>,
    next_face: u32,
    timers: HashMap<TimerKey, u64>,
}

#[derive(Clone, Copy, Debug)]
pub struct LastDelaySample {
    pub node: NodeId,
    pub seq: u64,
    pub delay_us: u64,
    pub hop_count: u32,
}

#[derive(Clone, Copy, Debug)]
pub struct FullDelaySample {
    pub node: NodeId,
    pub seq: u64,
    pub delay_us: u64,
    pub retx_count: u32,
    pub hop_count: u32,
}

enum Action {
    ForwarderSend {
        node: NodeId,
        face: FaceId,
        packet: Packet,
    },
    AppEgress { node: NodeId, packet: Packet },
    SetTimer {
        node: NodeId,
        key: TimerKey,
        time_us: u64,
    },
    UnsetTimer { node: NodeId, key: TimerKey },
    LastDelay(LastDelaySample),
    FullDelay(FullDelaySample),
}

// Buffers a handler's side effects; the simulator applies them once the
// handler returns.
struct Ctx {
    now_us: u64,
    node: NodeId,
    actions: Vec<Action>,
}

impl Ctx {
    fn new(now_us: u64, node: NodeId) -> Self {
        Self {
            now_us,
            node,
            actions: Vec::new(),
        }
    }
}

impl ForwarderContext for Ctx {
    fn now_us(&self) -> u64 {
        self.now_us
    }

    fn send(&mut self, face: FaceId, packet: Packet) {
        self.actions.push(Action::ForwarderSend {
            node: self.node,
            face,
            packet,
        });
    }

    fn set_expiry_timer(&mut self, name: &Name, time_us: u64) {
        self.actions.push(Action::SetTimer {
            node: self.node,
            key: TimerKey::Expiry(name.clone()),
            time_us,
        });
    }

    fn unset_expiry_timer(&mut self, name: &Name) {
        self.actions.push(Action::UnsetTimer {
            node: self.node,
            key: TimerKey::Expiry(name.clone()),
        });
    }
}

impl ConsumerContext for Ctx {
    fn now_us(&self) -> u64 {
        self.now_us
    }

    fn send_interest(&mut self, interest: Interest) {
        self.actions.push(Action::AppEgress {
            node: self.node,
            packet: Packet::Interest(interest),
        });
    }

    fn set_timer(&mut self, timer: consumer::TimerName, time_us: u64) {
        self.actions.push(Action::SetTimer {
            node: self.node,
            key: TimerKey::Consumer(timer),
            time_us,
        });
    }

    fn unset_timer(&mut self, timer: consumer::TimerName) {
        self.actions.push(Action::UnsetTimer {
            node: self.node,
            key: TimerKey::Consumer(timer),
        });
    }

    fn on_last_delay(&mut self, seq: u64, delay_us: u64, hop_count: u32) {
        self.actions.push(Action::LastDelay(LastDelaySample {
            node: self.node,
            seq,
            delay_us,
            hop_count,
        }));
    }

    fn on_full_delay(&mut self, seq: u64, delay_us: u64, retx_count: u32, hop_count: u32) {
        self.actions.push(Action::FullDelay(FullDelaySample {
            node: self.node,
            seq,
            delay_us,
            retx_count,
            hop_count,
        }));
    }
}

fn derive_seed(master_seed: u64, node: NodeId, salt: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(master_seed, salt);
    hasher.write_u32(node.0);
    hasher.finish()
}

/// Discrete-event simulation of a named-data network.
pub struct Sim {
    time_us: u64,
    queue: BinaryHeap<ScheduledEvent>,
    next_event_seq: u64,
    cancelled: HashSet<u64>,
    nodes: Vec<Node>,
    master_seed: u64,
    last_delays: Vec<LastDelaySample>,
    full_delays: Vec<FullDelaySample>,
}

impl Sim {
    pub fn new(master_seed: u64) -> Self {
        Self {
            time_us: 0,
            queue: BinaryHeap::new(),
            next_event_seq: 0,
            cancelled: HashSet::new(),
            nodes: Vec::new(),
            master_seed,
            last_delays: Vec::new(),
            full_delays: Vec::new(),
        }
    }

    pub fn add_node(&mut self, config: fwd::Config) -> NodeId {
        let node = NodeId(self.nodes.len() as u32);

        self.nodes.push(Node {
            forwarder: Forwarder::new(config, derive_seed(self.master_seed, node, 0)),
            app: None,
            faces: HashMap::new(),
            next_face: 1,
            timers: HashMap::new(),
        });

        node
    }

    /// Attaches a consumer to `node`, starting at `start_time_us`.
    pub fn add_consumer(&mut self, node: NodeId, config: consumer::Config, start_time_us: u64) {
        let seed = derive_seed(self.master_seed, node, 1);

        let slot = &mut self.nodes[node.0 as usize].app;
        assert!(slot.is_none(), "node {:?} already has an application", node);
        *slot = Some(App::Consumer(Consumer::new(config, seed)));

        self.schedule_at(start_time_us, EventKind::ConsumerStart { node });
    }

    /// Attaches a producer to `node` and routes its prefix to the app face.
    pub fn add_producer(&mut self, node: NodeId, prefix: Name) {
        {
            let slot = &mut self.nodes[node.0 as usize].app;
            assert!(slot.is_none(), "node {:?} already has an application", node);
            *slot = Some(App::Producer(Producer::new(prefix.clone())));
        }

        self.nodes[node.0 as usize]
            .forwarder
            .add_route(prefix, APP_FACE);
    }

    /// Joins two nodes with a symmetric fixed-delay link, returning the face
    /// each end assigned to it.
    pub fn add_link(&mut self, a: NodeId, b: NodeId, delay_us: u64) -> (FaceId, FaceId) {
        assert!(a != b, "cannot link {:?} to itself", a);

        let face_a = FaceId(self.nodes[a.0 as usize].next_face);
        self.nodes[a.0 as usize].next_face += 1;
        let face_b = FaceId(self.nodes[b.0 as usize].next_face);
        self.nodes[b.0 as usize].next_face += 1;

        self.nodes[a.0 as usize].faces.insert(
            face_a,
            FaceEnd {
                peer: b,
                peer_face: face_b,
                delay_us,
            },
        );
        self.nodes[b.0 as usize].faces.insert(
            face_b,
            FaceEnd {
                peer: a,
                peer_face: face_a,
                delay_us,
            },
        );

        (face_a, face_b)
    }

    pub fn add_route(&mut self, node: NodeId, prefix: Name, face: FaceId) {
        self.nodes[node.0 as usize].forwarder.add_route(prefix, face);
    }

    pub fn now_us(&self) -> u64 {
        self.time_us
    }

    pub fn consumer(&self, node: NodeId) -> Option<&Consumer> {
        match &self.nodes[node.0 as usize].app {
            Some(App::Consumer(consumer)) => Some(consumer),
            _ => None,
        }
    }

    pub fn producer(&self, node: NodeId) -> Option<&Producer> {
        match &self.nodes[node.0 as usize].app {
            Some(App::Producer(producer)) => Some(producer),
            _ => None,
        }
    }

    pub fn forwarder(&self, node: NodeId) -> &Forwarder {
        &self.nodes[node.0 as usize].forwarder
    }

    pub fn last_delays(&self) -> &[LastDelaySample] {
        &self.last_delays
    }

    pub fn full_delays(&self) -> &[FullDelaySample] {
        &self.full_delays
    }

    /// Stops the consumer on `node` immediately, cancelling its pending
    /// events.
    pub fn stop_consumer(&mut self, node: NodeId) {
        let mut ctx = Ctx::new(self.time_us, node);

        if let Some(App::Consumer(consumer)) = &mut self.nodes[node.0 as usize].app {
            consumer.stop(&mut ctx);
        }

        self.apply(ctx.actions);
    }

    /// Runs every event scheduled up to and including `time_us`.
    pub fn run_until(&mut self, time_us: u64) {
        while let Some(event) = self.queue.pop() {
            if event.time_us > time_us {
                self.queue.push(event);
                break;
            }

            if self.cancelled.remove(&event.seq) {
                continue;
            }

            debug_assert!(event.time_us >= self.time_us);
            self.time_us = event.time_us;

            self.dispatch(event);
        }

        self.time_us = time_us;
    }

    fn schedule(&mut self, delay_us: u64, kind: EventKind) -> u64 {
        self.schedule_at(self.time_us + delay_us, kind)
    }

    fn schedule_at(&mut self, time_us: u64, kind: EventKind) -> u64 {
        let seq = self.next_event_seq;
        self.next_event_seq += 1;

        self.queue.push(ScheduledEvent {
            time_us: time_us.max(self.time_us),
            seq,
            kind,
        });

        seq
    }

    fn dispatch(&mut self, event: ScheduledEvent) {
        let node_id = match &event.kind {
            EventKind::Deliver { node, .. }
            | EventKind::DeliverToApp { node, .. }
            | EventKind::ConsumerStart { node }
            | EventKind::ConsumerTimer { node, .. }
            | EventKind::PitExpire { node, .. } => *node,
        };

        let mut ctx = Ctx::new(self.time_us, node_id);
        let node = &mut self.nodes[node_id.0 as usize];

        match event.kind {
            EventKind::Deliver { face, packet, .. } => match packet {
                Packet::Interest(interest) => {
                    trace!("{}us: {:?} rx interest {}", self.time_us, node_id, interest.name);
                    node.forwarder.handle_interest(face, interest, &mut ctx);
                }
                Packet::Data(data) => {
                    trace!("{}us: {:?} rx data {}", self.time_us, node_id, data.name);
                    node.forwarder.handle_data(face, data, &mut ctx);
                }
            },
            EventKind::DeliverToApp { packet, .. } => match (&mut node.app, packet) {
                (Some(App::Consumer(consumer)), Packet::Data(data)) => {
                    consumer.handle_data(&data, &mut ctx);
                }
                (Some(App::Consumer(consumer)), Packet::Interest(interest))
                    if interest.nack.is_some() =>
                {
                    consumer.handle_nack(&interest, &mut ctx);
                }
                (Some(App::Producer(producer)), Packet::Interest(interest))
                    if interest.nack.is_none() =>
                {
                    if let Some(data) = producer.handle_interest(&interest) {
                        ctx.actions.push(Action::AppEgress {
                            node: node_id,
                            packet: Packet::Data(data),
                        });
                    }
                }
                _ => trace!("{}us: {:?} app dropped packet", self.time_us, node_id),
            },
            EventKind::ConsumerStart { .. } => {
                if let Some(App::Consumer(consumer)) = &mut node.app {
                    consumer.start(&mut ctx);
                }
            }
            EventKind::ConsumerTimer { timer, .. } => {
                node.timers.remove(&TimerKey::Consumer(timer));
                if let Some(App::Consumer(consumer)) = &mut node.app {
                    consumer.handle_timer(timer, &mut ctx);
                }
            }
            EventKind::PitExpire { name, .. } => {
                node.timers.remove(&TimerKey::Expiry(name.clone()));
                node.forwarder.handle_expiry(&name, &mut ctx);
            }
        }

        self.apply(ctx.actions);
    }

    fn apply(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::ForwarderSend { node, face, packet } => {
                    if face == APP_FACE {
                        self.schedule(0, EventKind::DeliverToApp { node, packet });
                    } else if let Some(&end) = self.nodes[node.0 as usize].faces.get(&face) {
                        self.schedule(
                            end.delay_us,
                            EventKind::Deliver {
                                node: end.peer,
                                face: end.peer_face,
                                packet,
                            },
                        );
                    } else {
                        trace!("{:?} sent on unconnected face {:?}", node, face);
                    }
                }
                Action::AppEgress { node, packet } => {
                    self.schedule(
                        0,
                        EventKind::Deliver {
                            node,
                            face: APP_FACE,
                            packet,
                        },
                    );
                }
                Action::SetTimer { node, key, time_us } => {
                    let kind = match key.clone() {
                        TimerKey::Consumer(timer) => EventKind::ConsumerTimer { node, timer },
                        TimerKey::Expiry(name) => EventKind::PitExpire { node, name },
                    };
                    let seq = self.schedule_at(time_us, kind);

                    // Replace semantics: at most one live instance per key
                    if let Some(old) = self.nodes[node.0 as usize].timers.insert(key, seq) {
                        self.cancelled.insert(old);
                    }
                }
                Action::UnsetTimer { node, key } => {
                    if let Some(old) = self.nodes[node.0 as usize].timers.remove(&key) {
                        self.cancelled.insert(old);
                    }
                }
                Action::LastDelay(sample) => self.last_delays.push(sample),
                Action::FullDelay(sample) => self.full_delays.push(sample),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marker_event(node: NodeId) -> EventKind {
        EventKind::ConsumerStart { node }
    }

    #[test]
    fn events_fire_in_time_then_insertion_order() {
        let e1 = ScheduledEvent {
            time_us: 10,
            seq: 1,
            kind: marker_event(NodeId(0)),
        };
        let e2 = ScheduledEvent {
            time_us: 5,
            seq: 2,
            kind: marker_event(NodeId(0)),
        };
        let e3 = ScheduledEvent {
            time_us: 5,
            seq: 3,
            kind: marker_event(NodeId(0)),
        };

        let mut queue = BinaryHeap::new();
        queue.push(e1);
        queue.push(e3);
        queue.push(e2);

        let order: Vec<u64> = std::iter::from_fn(|| queue.pop().map(|e| e.seq)).collect();
        assert_eq!(order, vec![2, 3, 1]);
    }

    #[test]
    fn timer_replacement_cancels_previous() {
        let mut sim = Sim::new(1);
        let node = sim.add_node(fwd::Config::default());

        let key = TimerKey::Consumer(consumer::TimerName::RetxCheck);
        sim.apply(vec![Action::SetTimer {
            node,
            key: key.clone(),
            time_us: 100,
        }]);
        let first = sim.nodes[0].timers[&key];

        sim.apply(vec![Action::SetTimer {
            node,
            key: key.clone(),
            time_us: 200,
        }]);

        assert!(sim.cancelled.contains(&first));
        assert_ne!(sim.nodes[0].timers[&key], first);

        sim.apply(vec![Action::UnsetTimer {
            node,
            key: key.clone(),
        }]);
        assert!(!sim.nodes[0].timers.contains_key(&key));
    }

    #[test]
    fn link_faces_are_symmetric() {
        let mut sim = Sim::new(1);
        let a = sim.add_node(fwd::Config::default());
        let b = sim.add_node(fwd::Config::default());

        let (face_a, face_b) = sim.add_link(a, b, 10_000);
        assert_eq!(face_a, FaceId(1));
        assert_eq!(face_b, FaceId(1));

        let end = sim.nodes[a.0 as usize].faces[&face_a];
        assert_eq!(end.peer, b);
        assert_eq!(end.peer_face, face_b);
        assert_eq!(end.delay_us, 10_000);
    }

    #[test]
    fn derived_seeds_differ_per_node() {
        let s0 = derive_seed(42, NodeId(0), 0);
        let s1 = derive_seed(42, NodeId(1), 0);
        let s0_consumer = derive_seed(42, NodeId(0), 1);

        assert_ne!(s0, s1);
        assert_ne!(s0, s0_consumer);
    }
}
