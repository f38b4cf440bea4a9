use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub bind_addr: SocketAddr,
    pub destination: SocketAddr,
    pub tick_rate: u32,
    pub demo: bool,
    pub stats_interval: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], disnet::DEFAULT_PORT)),
            destination: SocketAddr::from(([255, 255, 255, 255], disnet::DEFAULT_PORT)),
            tick_rate: 30,
            demo: false,
            stats_interval: Duration::from_secs(10),
        }
    }
}

impl NodeConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}
