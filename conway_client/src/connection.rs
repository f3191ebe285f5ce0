// connection.rs - Lifecycle of the single link to the backend

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::backend::{Backend, ConnectParams, EventStream, Identity, LinkEvent};
use crate::config::ViewerConfig;
use crate::error::ClientError;
use crate::session::SessionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

/// Caller-owned connection context.
///
/// Owns the backend link, the session store and the identity handed out at
/// handshake. Other components borrow it; only this type starts or tears
/// down the link. Events are drained on the owning thread via [`poll`].
///
/// [`poll`]: ConnectionManager::poll
pub struct ConnectionManager {
    backend: Arc<dyn Backend>,
    session: SessionStore,
    uri: String,
    module_name: String,
    state: ConnectionState,
    identity: Option<Identity>,
    // Bumped on every successful handshake.
    epoch: u64,
    events: Option<EventStream>,
}

impl ConnectionManager {
    pub fn new(backend: Arc<dyn Backend>, session: SessionStore, config: &ViewerConfig) -> Self {
        Self {
            backend,
            session,
            uri: config.uri.clone(),
            module_name: config.module_name.clone(),
            state: ConnectionState::Disconnected,
            identity: None,
            epoch: 0,
            events: None,
        }
    }

    /// Starts a handshake using the cached token, if any. Returns immediately.
    pub fn connect(&mut self) {
        if matches!(self.state, ConnectionState::Connecting | ConnectionState::Connected) {
            debug!(state = ?self.state, "connect ignored, link already live");
            return;
        }
        let token = self.session.load();
        let (tx, rx) = mpsc::unbounded_channel();
        // A fresh channel per attempt: anything a superseded link still sends is dropped.
        self.events = Some(rx);
        self.state = ConnectionState::Connecting;
        info!(uri = %self.uri, module = %self.module_name, has_token = token.is_some(), "connecting");
        self.backend.connect(
            ConnectParams { uri: self.uri.clone(), module_name: self.module_name.clone(), token },
            tx,
        );
    }

    /// Asks the backend to close the link. The resulting `Disconnected`
    /// event is delivered through [`poll`](Self::poll) like any other drop.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Connected || self.state == ConnectionState::Connecting {
            info!("disconnect requested");
            self.backend.disconnect();
        }
    }

    /// Drains pending link events, applies connection transitions and hands
    /// back everything the caller should react to, in arrival order.
    pub fn poll(&mut self) -> Vec<LinkEvent> {
        let mut drained = Vec::new();
        if let Some(rx) = self.events.as_mut() {
            while let Ok(event) = rx.try_recv() {
                drained.push(event);
            }
        }

        let mut out = Vec::with_capacity(drained.len());
        for event in drained {
            if self.apply(&event) {
                out.push(event);
            }
        }
        out
    }

    fn apply(&mut self, event: &LinkEvent) -> bool {
        match event {
            LinkEvent::Connected { identity, token } => {
                if self.state == ConnectionState::Connected {
                    warn!("duplicate connect notification ignored");
                    return false;
                }
                self.state = ConnectionState::Connected;
                self.identity = Some(identity.clone());
                self.epoch += 1;
                if let Err(err) = self.session.save(token) {
                    warn!(%err, "failed to persist session token");
                }
                info!(identity = identity.to_hex_string(), epoch = self.epoch, "connected");
                true
            }
            LinkEvent::Disconnected => {
                if self.state == ConnectionState::Disconnected {
                    return false;
                }
                self.state = ConnectionState::Disconnected;
                self.identity = None;
                info!("disconnected");
                true
            }
            LinkEvent::ConnectError(message) => {
                error!(%message, "error connecting");
                self.state = ConnectionState::Error(message.clone());
                self.identity = None;
                true
            }
            other => {
                if self.state != ConnectionState::Connected {
                    debug!(event = ?other, "dropping event received without a live link");
                    return false;
                }
                true
            }
        }
    }

    /// The backend, provided the link is currently up.
    pub fn link(&self) -> Result<&Arc<dyn Backend>, ClientError> {
        match &self.state {
            ConnectionState::Connected => Ok(&self.backend),
            ConnectionState::Error(message) => Err(ClientError::Connection(message.clone())),
            _ if self.epoch > 0 => Err(ClientError::Disconnected),
            _ => Err(ClientError::NotConnected),
        }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingBackend;

    fn manager(backend: &Arc<RecordingBackend>) -> ConnectionManager {
        ConnectionManager::new(backend.clone(), SessionStore::in_memory(), &ViewerConfig::default())
    }

    #[test]
    fn handshake_persists_token_and_connects() {
        let backend = Arc::new(RecordingBackend::default());
        let mut conn = manager(&backend);
        conn.connect();
        assert_eq!(conn.state(), &ConnectionState::Connecting);
        assert_eq!(backend.connects(), vec![None]);

        backend.accept("abc123", "tok-1");
        let events = conn.poll();
        assert_eq!(events.len(), 1);
        assert!(conn.is_connected());
        assert_eq!(conn.identity().map(|id| id.to_hex_string()), Some("abc123"));
        assert_eq!(conn.session().load().as_deref(), Some("tok-1"));
        assert_eq!(conn.epoch(), 1);
    }

    #[test]
    fn reconnect_presents_cached_token() {
        let backend = Arc::new(RecordingBackend::default());
        let mut conn = manager(&backend);
        conn.connect();
        backend.accept("abc", "tok-1");
        conn.poll();
        backend.drop_link();
        conn.poll();
        assert_eq!(conn.state(), &ConnectionState::Disconnected);
        assert!(matches!(conn.link(), Err(ClientError::Disconnected)));

        conn.connect();
        assert_eq!(backend.connects(), vec![None, Some("tok-1".to_string())]);
    }

    #[test]
    fn duplicate_connect_notification_is_ignored() {
        let backend = Arc::new(RecordingBackend::default());
        let mut conn = manager(&backend);
        conn.connect();
        backend.accept("abc", "tok-1");
        backend.accept("abc", "tok-2");
        let events = conn.poll();
        assert_eq!(events.len(), 1);
        assert_eq!(conn.epoch(), 1);
        assert_eq!(conn.session().load().as_deref(), Some("tok-1"));
    }

    #[test]
    fn handshake_failure_enters_error_state_without_retry() {
        let backend = Arc::new(RecordingBackend::default());
        let mut conn = manager(&backend);
        conn.connect();
        backend.reject("bad module");
        conn.poll();
        assert_eq!(conn.state(), &ConnectionState::Error("bad module".into()));
        assert!(matches!(conn.link(), Err(ClientError::Connection(_))));
        assert_eq!(backend.connects().len(), 1);
        assert_eq!(conn.session().load(), None);
    }

    #[test]
    fn row_events_before_handshake_are_dropped() {
        let backend = Arc::new(RecordingBackend::default());
        let mut conn = manager(&backend);
        conn.connect();
        backend.push(LinkEvent::SubscriptionApplied(crate::backend::QueryId(1)));
        assert!(conn.poll().is_empty());
        assert!(matches!(conn.link(), Err(ClientError::NotConnected)));
    }
}
