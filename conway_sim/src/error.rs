use conway_client::{ClientError, GridId, QueryId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("no client is connected")]
    NotConnected,
    #[error("grid {0} does not exist")]
    NoSuchGrid(GridId),
    #[error("subscription {0:?} is not registered")]
    UnknownSubscription(QueryId),
    #[error("row task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<SimError> for ClientError {
    fn from(err: SimError) -> Self {
        match err {
            SimError::NotConnected => ClientError::NotConnected,
            other => ClientError::Backend(other.to_string()),
        }
    }
}
