use std::time::Duration;

use conway_client::GRID_SIZE;

/// Settings for the in-process server.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Module name clients must ask for
    pub module_name: String,
    pub grid_size: usize,
    /// Boards 0..grid_count exist; 0 is random, the rest hold patterns
    pub grid_count: u32,
    /// `None` leaves stepping to explicit `step` calls
    pub tick_interval: Option<Duration>,
    pub handshake_delay: Duration,
    pub seed_density: f32,
    pub reset_density: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            module_name: "conway".to_string(),
            grid_size: GRID_SIZE,
            grid_count: 4,
            tick_interval: Some(Duration::from_micros(1_000_000 / 30)),
            handshake_delay: Duration::from_millis(50),
            seed_density: 0.2,
            reset_density: 0.1,
        }
    }
}
