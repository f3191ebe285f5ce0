// backend.rs - The seam between the viewer core and whatever serves the grid rows

use std::fmt;

use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::grid::{GridId, GridInfoRow, GridRow};

/// Identity assigned by the server at handshake, rendered as hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(pub String);

impl Identity {
    pub fn to_hex_string(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Grid,
    GridInfo,
}

impl Relation {
    pub fn table_name(self) -> &'static str {
        match self {
            Relation::Grid => "grid",
            Relation::GridInfo => "grid_info",
        }
    }
}

/// Row filter selecting one relation's rows for one grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Query {
    pub relation: Relation,
    pub grid_id: GridId,
}

impl Query {
    pub fn matches_grid(&self, relation: Relation, grid_id: GridId) -> bool {
        self.relation == relation && self.grid_id == grid_id
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT * FROM {} WHERE gridid = {}", self.relation.table_name(), self.grid_id)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub uri: String,
    pub module_name: String,
    pub token: Option<String>,
}

/// Mutations the server applies on our behalf. Results only ever come back
/// through the row feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    SubmitCellToggles { grid_id: GridId, indices: Vec<usize> },
    ResetGrid { grid_id: GridId },
}

/// Everything a link can tell us, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Connected { identity: Identity, token: String },
    Disconnected,
    ConnectError(String),
    SubscriptionApplied(QueryId),
    SubscriptionEnded(QueryId),
    GridInserted(GridRow),
    GridUpdated { old: GridRow, new: GridRow },
    InfoInserted(GridInfoRow),
    InfoUpdated { old: GridInfoRow, new: GridInfoRow },
}

pub type EventSink = mpsc::UnboundedSender<LinkEvent>;
pub type EventStream = mpsc::UnboundedReceiver<LinkEvent>;

/// A server link. Every method returns immediately; outcomes arrive as
/// [`LinkEvent`]s on the sink handed to [`Backend::connect`].
pub trait Backend: Send + Sync {
    fn connect(&self, params: ConnectParams, events: EventSink);

    fn disconnect(&self);

    fn subscribe(&self, id: QueryId, queries: &[Query]) -> Result<(), ClientError>;

    fn unsubscribe(&self, id: QueryId) -> Result<(), ClientError>;

    fn call(&self, call: RemoteCall) -> Result<(), ClientError>;
}
