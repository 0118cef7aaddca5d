// Multipath balance scenario: one consumer behind a router that splits a
// prefix across two producers. Reports how the congestion-aware strategy
// divided the load.
//
// Usage: mp_balance [aimd|fixed|rate] [seed] [seconds]

use tamarack::consumer::{Config as ConsumerConfig, PacingConfig, WindowConfig};
use tamarack::{Name, Sim};

fn main() {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let pacing_name = args.next().unwrap_or_else(|| "aimd".to_owned());
    let seed: u64 = args
        .next()
        .map(|s| s.parse().expect("invalid seed"))
        .unwrap_or(1);
    let seconds: u64 = args
        .next()
        .map(|s| s.parse().expect("invalid duration"))
        .unwrap_or(30);

    let pacing = match pacing_name.as_str() {
        "aimd" => PacingConfig::Window(WindowConfig::Aimd { initial_window: 1 }),
        "fixed" => PacingConfig::Window(WindowConfig::Fixed(8)),
        "rate" => PacingConfig::Rate { frequency: 100.0 },
        other => {
            eprintln!("unrecognized pacing mode: {}", other);
            std::process::exit(1);
        }
    };

    let prefix = Name::from_uri("/prefix1");

    let mut sim = Sim::new(seed);
    let consumer = sim.add_node(Default::default());
    let router = sim.add_node(Default::default());
    let producer_1 = sim.add_node(Default::default());
    let producer_2 = sim.add_node(Default::default());

    let (consumer_up, _) = sim.add_link(consumer, router, 1_000);
    let (router_p1, _) = sim.add_link(router, producer_1, 10_000);
    let (router_p2, _) = sim.add_link(router, producer_2, 10_000);

    sim.add_producer(producer_1, prefix.clone());
    sim.add_producer(producer_2, prefix.clone());

    sim.add_route(consumer, prefix.clone(), consumer_up);
    sim.add_route(router, prefix.clone(), router_p1);
    sim.add_route(router, prefix.clone(), router_p2);

    sim.add_consumer(
        consumer,
        ConsumerConfig {
            prefix: prefix.clone(),
            pacing,
            ..Default::default()
        },
        0,
    );

    sim.run_until(seconds * 1_000_000);

    let stats = sim
        .consumer(consumer)
        .expect("consumer node has no consumer")
        .stats();
    println!(
        "consumer: {} interests sent, {} data, {} nacks, {} timeouts, {} retransmissions",
        stats.interests_sent,
        stats.data_received,
        stats.nacks_received,
        stats.timeouts,
        stats.retransmissions
    );

    let served_1 = sim.producer(producer_1).expect("missing producer").served();
    let served_2 = sim.producer(producer_2).expect("missing producer").served();
    println!("path 1 served {} interests", served_1);
    println!("path 2 served {} interests", served_2);

    let fib = sim.forwarder(router).fib();
    if let Some(route) = fib.lookup(&prefix) {
        for (index, candidate) in fib.entry(route).candidates().iter().enumerate() {
            println!(
                "router path {} (face {:?}): cwnd {}",
                index,
                candidate.face(),
                candidate.cwnd()
            );
        }
    }

    let full_delays = sim.full_delays();
    if !full_delays.is_empty() {
        let mean_us: u64 =
            full_delays.iter().map(|s| s.delay_us).sum::<u64>() / full_delays.len() as u64;
        println!(
            "mean full delay {:.1}ms over {} replies",
            mean_us as f64 / 1_000.0,
            full_delays.len()
        );
    }
}
