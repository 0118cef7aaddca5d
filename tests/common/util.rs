#![allow(dead_code)]

use tamarack::consumer::Config as ConsumerConfig;
use tamarack::{fwd, Name, NodeId, Sim};

pub fn prefix() -> Name {
    Name::from_uri("/prefix1")
}

pub struct Chain {
    pub sim: Sim,
    pub consumer: NodeId,
    pub producer: NodeId,
}

/// Consumer and producer joined by one link; the consumer starts at t = 0.
pub fn chain(seed: u64, consumer_config: ConsumerConfig, link_delay_us: u64) -> Chain {
    let mut sim = Sim::new(seed);

    let consumer = sim.add_node(fwd::Config::default());
    let producer = sim.add_node(fwd::Config::default());

    let (consumer_up, _) = sim.add_link(consumer, producer, link_delay_us);

    sim.add_producer(producer, prefix());
    sim.add_route(consumer, prefix(), consumer_up);
    sim.add_consumer(consumer, consumer_config, 0);

    Chain {
        sim,
        consumer,
        producer,
    }
}

pub struct Fork {
    pub sim: Sim,
    pub consumer: NodeId,
    pub router: NodeId,
    pub producer_1: NodeId,
    pub producer_2: NodeId,
}

/// Consumer behind a router with two equal-delay paths to two producers
/// serving the same prefix; the consumer starts at t = 0.
pub fn fork(seed: u64, consumer_config: ConsumerConfig, link_delay_us: u64) -> Fork {
    let mut sim = Sim::new(seed);

    let consumer = sim.add_node(fwd::Config::default());
    let router = sim.add_node(fwd::Config::default());
    let producer_1 = sim.add_node(fwd::Config::default());
    let producer_2 = sim.add_node(fwd::Config::default());

    let (consumer_up, _) = sim.add_link(consumer, router, 1_000);
    let (router_p1, _) = sim.add_link(router, producer_1, link_delay_us);
    let (router_p2, _) = sim.add_link(router, producer_2, link_delay_us);

    sim.add_producer(producer_1, prefix());
    sim.add_producer(producer_2, prefix());

    sim.add_route(consumer, prefix(), consumer_up);
    sim.add_route(router, prefix(), router_p1);
    sim.add_route(router, prefix(), router_p2);

    sim.add_consumer(consumer, consumer_config, 0);

    Fork {
        sim,
        consumer,
        router,
        producer_1,
        producer_2,
    }
}
