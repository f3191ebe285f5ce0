use std::path::PathBuf;
use std::time::Duration;

use crate::grid::{GRID_SIZE, GridId};

/// Viewer settings. The binary fills this from its command line.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Backend address, e.g. `local://conway`
    pub uri: String,
    /// Server module the link is opened against
    pub module_name: String,
    /// Board shown at mount
    pub grid_id: GridId,
    /// Side length of every board
    pub grid_size: usize,
    /// How long a subscription may sit in `Subscribing` before it is reported
    pub subscription_timeout: Duration,
    /// Overrides the platform default location of the session file
    pub session_file: Option<PathBuf>,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            uri: "local://conway".to_string(),
            module_name: "conway".to_string(),
            grid_id: GridId(0),
            grid_size: GRID_SIZE,
            subscription_timeout: Duration::from_secs(10),
            session_file: None,
        }
    }
}
