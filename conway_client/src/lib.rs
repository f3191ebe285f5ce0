//! Client-side core of the Conway grid viewer.
//!
//! The server owns the board and pushes whole-row replacements; this crate
//! mirrors those rows, stages local cell toggles, submits them in batches
//! and renders the composed view onto a raster that is repainted
//! incrementally.

pub mod backend;
pub mod config;
pub mod connection;
pub mod error;
pub mod grid;
pub mod pending;
pub mod render;
pub mod session;
pub mod state;
pub mod subscription;
pub mod viewer;

#[cfg(test)]
mod test_support;

pub use backend::{
    Backend, ConnectParams, EventSink, Identity, LinkEvent, Query, QueryId, Relation, RemoteCall,
};
pub use config::ViewerConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{ClientError, SessionError};
pub use grid::{CellMatrix, GRID_SIZE, GridId, GridInfoRow, GridRow};
pub use pending::PendingEditBuffer;
pub use render::{Damage, GridRenderer, Palette, PixelRect};
pub use session::SessionStore;
pub use state::{GridInfo, GridSnapshot, GridStateStore};
pub use subscription::{SubscriptionController, SubscriptionHandle, SubscriptionState};
pub use viewer::GridViewer;
