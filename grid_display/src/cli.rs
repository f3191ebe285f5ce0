use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use conway_client::{GRID_SIZE, GridId, ViewerConfig};
use conway_sim::SimConfig;

use crate::logging::{LogConfig, LogLevel};

#[derive(Parser, Debug, Clone)]
#[command(name = "grid_display", about = "Live viewer and editor for a server-driven Game of Life board")]
pub struct Args {
    /// Backend address
    #[arg(long, env = "CONWAY_URI", default_value = "local://conway")]
    pub uri: String,

    /// Server module to open
    #[arg(long, env = "CONWAY_MODULE", default_value = "conway")]
    pub module: String,

    /// Board shown at startup
    #[arg(long, env = "CONWAY_GRID_ID", default_value_t = 0)]
    pub grid_id: u32,

    /// Side length of every board
    #[arg(long, env = "CONWAY_GRID_SIZE", default_value_t = GRID_SIZE)]
    pub grid_size: usize,

    /// Number of boards the local server hosts
    #[arg(long, env = "CONWAY_GRIDS", default_value_t = 4)]
    pub grids: u32,

    /// Milliseconds between generations; 0 pauses the simulation
    #[arg(long, env = "CONWAY_TICK_MS", default_value_t = 33)]
    pub tick_ms: u64,

    /// Seconds to wait for a subscription before reporting it
    #[arg(long, env = "CONWAY_SUBSCRIBE_TIMEOUT", default_value_t = 10)]
    pub subscribe_timeout: u64,

    /// Where the session token is kept
    #[arg(long, env = "CONWAY_SESSION_FILE")]
    pub session_file: Option<PathBuf>,

    #[arg(long, value_enum, env = "CONWAY_LOG_LEVEL", default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[arg(long, env = "CONWAY_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

impl Args {
    pub fn viewer_config(&self) -> ViewerConfig {
        ViewerConfig {
            uri: self.uri.clone(),
            module_name: self.module.clone(),
            grid_id: GridId(self.grid_id),
            grid_size: self.grid_size,
            subscription_timeout: Duration::from_secs(self.subscribe_timeout),
            session_file: self.session_file.clone(),
        }
    }

    pub fn sim_config(&self) -> SimConfig {
        SimConfig {
            grid_size: self.grid_size,
            grid_count: self.grids,
            tick_interval: (self.tick_ms > 0).then(|| Duration::from_millis(self.tick_ms)),
            ..SimConfig::default()
        }
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig { level: self.log_level, file: self.log_file.clone() }
    }
}
