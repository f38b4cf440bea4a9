mod config;
mod demo;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use glam::DVec3;

use config::NodeConfig;
use demo::{CirclingEntity, DEMO_ENTITY, DEMO_TYPE};
use disnet::{EngineConfig, NetEvent, ProtocolEngine, UdpTransport};

#[derive(Parser)]
#[command(name = "disnet-node")]
#[command(about = "Headless DIS entity state node")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = disnet::DEFAULT_PORT)]
    port: u16,

    #[arg(long, default_value = "255.255.255.255", help = "Destination for outbound PDUs")]
    broadcast: String,

    #[arg(short, long, default_value_t = 30)]
    tick_rate: u32,

    #[arg(short, long, help = "TOML engine configuration")]
    config: Option<PathBuf>,

    #[arg(long)]
    site: Option<u32>,

    #[arg(long)]
    application: Option<u32>,

    #[arg(long)]
    exercise: Option<u32>,

    #[arg(long, help = "Publish an entity flying a circle")]
    demo: bool,

    #[arg(long, help = "Exit after this many seconds")]
    run_for: Option<u64>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut engine_config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(site) = args.site {
        engine_config.site = site;
    }
    if let Some(application) = args.application {
        engine_config.application = application;
    }
    if let Some(exercise) = args.exercise {
        engine_config.exercise = exercise;
    }

    let config = NodeConfig {
        bind_addr: format!("{}:{}", args.bind, args.port)
            .parse()
            .context("invalid bind address")?,
        destination: format!("{}:{}", args.broadcast, args.port)
            .parse()
            .context("invalid broadcast address")?,
        tick_rate: args.tick_rate,
        demo: args.demo,
        ..Default::default()
    };

    let transport = UdpTransport::bind(config.bind_addr, config.destination)
        .with_context(|| format!("binding {}", config.bind_addr))?;
    let local_addr = transport.local_addr();
    let engine = ProtocolEngine::with_config(transport, &engine_config)?;

    log::info!(
        "node {} in {} listening on {}",
        engine.federate_name(),
        engine.federation_name(),
        local_addr
    );

    let mut node = Node::new(engine, config);
    let deadline = args.run_for.map(|secs| Instant::now() + Duration::from_secs(secs));
    while deadline.is_none_or(|deadline| Instant::now() < deadline) {
        node.tick_once();
        std::thread::sleep(Duration::from_millis(1));
    }

    node.shutdown();
    log::info!("node shutting down");
    Ok(())
}

struct Node {
    engine: ProtocolEngine<UdpTransport>,
    demo: Option<CirclingEntity>,
    tick_duration: Duration,
    last_tick_time: Instant,
    accumulator: Duration,
    stats_interval: Duration,
    last_stats: Instant,
}

impl Node {
    fn new(mut engine: ProtocolEngine<UdpTransport>, config: NodeConfig) -> Self {
        let demo = config.demo.then(|| {
            let demo = CirclingEntity::new(DVec3::ZERO, 2000.0, Duration::from_secs(120));
            engine.publish(DEMO_ENTITY, DEMO_TYPE, demo.state());
            demo
        });

        Self {
            engine,
            demo,
            tick_duration: config.tick_duration(),
            last_tick_time: Instant::now(),
            accumulator: Duration::ZERO,
            stats_interval: config.stats_interval,
            last_stats: Instant::now(),
        }
    }

    fn tick_once(&mut self) {
        let now = Instant::now();
        self.accumulator += now - self.last_tick_time;
        self.last_tick_time = now;

        while self.accumulator >= self.tick_duration {
            self.accumulator -= self.tick_duration;
            self.tick(self.tick_duration);
        }

        if self.last_stats.elapsed() >= self.stats_interval {
            self.last_stats = Instant::now();
            let stats = self.engine.stats();
            log::info!(
                "rx {} datagrams ({} pdus, {} dropped), tx {} pdus ({} failed)",
                stats.datagrams_received,
                stats.pdus_decoded,
                stats.dropped(),
                stats.pdus_sent,
                stats.send_failures
            );
        }
    }

    fn tick(&mut self, dt: Duration) {
        if let Some(demo) = self.demo.as_mut() {
            let state = demo.advance(dt);
            self.engine.update_true_state(DEMO_ENTITY, state);
        }

        self.engine.tick(dt);

        for event in self.engine.drain_events() {
            log_event(&event);
        }
    }

    fn shutdown(&mut self) {
        if self.demo.take().is_some() {
            self.engine.unpublish(DEMO_ENTITY);
        }
    }
}

fn log_event(event: &NetEvent) {
    match event {
        NetEvent::EntityDiscovered {
            id,
            entity_type,
            untyped,
        } => {
            log::info!(
                "discovered {} type {}{}",
                id,
                entity_type,
                if *untyped { " (unmapped)" } else { "" }
            );
        }
        NetEvent::EntityUpdated { id } => log::trace!("update from {}", id),
        NetEvent::EntityRemoved { id, reason } => {
            log::info!("entity {} {}", id, reason.as_str());
        }
        NetEvent::Fire(pdu) => {
            log::info!("{} fired at {}", pdu.firing_entity, pdu.target_entity);
        }
        NetEvent::Detonation(pdu) => {
            log::info!("detonation from {} result {:?}", pdu.firing_entity, pdu.result());
        }
        NetEvent::Emission { pdu, handlers } => {
            log::debug!(
                "{} emitting on {} systems, handlers {:?}",
                pdu.emitting_entity,
                pdu.systems.len(),
                handlers
            );
        }
        NetEvent::Signal(pdu) => log::debug!("signal from {}", pdu.entity_id),
        NetEvent::Transmitter(pdu) => {
            log::debug!("transmitter {} {:?}", pdu.entity_id, pdu.transmit_state());
        }
        NetEvent::Unrecognized { header, body } => {
            log::debug!("unrecognized pdu type {} ({} bytes)", header.pdu_type, body.len());
        }
        other => log::info!("simulation management: {:?}", other),
    }
}
