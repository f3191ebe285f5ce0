use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::grid::GridId;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("link to the server was lost")]
    Disconnected,
    #[error("not connected to the server")]
    NotConnected,
    #[error("subscription for grid {grid_id} not applied after {waited:?}")]
    SubscriptionTimeout { grid_id: GridId, waited: Duration },
    #[error("cell index {index} outside grid of {cell_count} cells")]
    CellOutOfRange { index: usize, cell_count: usize },
    #[error("row for grid {grid_id} has {actual} cells, expected {expected}")]
    MalformedRow { grid_id: GridId, expected: usize, actual: usize },
    #[error("session store: {0}")]
    Session(#[from] SessionError),
    #[error("backend rejected request: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("unable to determine a config directory")]
    NoConfigDir,
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode session file: {0}")]
    Encode(#[from] toml::ser::Error),
    #[error("failed to decode session file: {0}")]
    Decode(#[from] toml::de::Error),
}
