use std::sync::Arc;
use std::time::Duration;

use conway_client::{
    Backend, ClientError, ConnectParams, LinkEvent, ConnectionManager, ConnectionState, GridId, GridViewer, SessionStore,
    SubscriptionState, ViewerConfig,
};
use conway_sim::{LocalServer, STATUS_RUNNING, STATUS_STABLE, SimConfig};
use tokio::runtime::Handle;

const SIDE: usize = 20;

fn sim_config() -> SimConfig {
    SimConfig {
        grid_size: SIDE,
        grid_count: 6,
        tick_interval: None,
        handshake_delay: Duration::ZERO,
        ..SimConfig::default()
    }
}

fn viewer_config(grid_id: u32) -> ViewerConfig {
    ViewerConfig { grid_size: SIDE, grid_id: GridId(grid_id), ..ViewerConfig::default() }
}

struct Harness {
    server: LocalServer,
    conn: ConnectionManager,
    viewer: GridViewer,
}

impl Harness {
    async fn start(grid_id: u32) -> Self {
        Self::start_with(grid_id, viewer_config(grid_id)).await
    }

    async fn start_with(grid_id: u32, config: ViewerConfig) -> Self {
        let server = LocalServer::new(sim_config(), Handle::current());
        let mut conn = ConnectionManager::new(Arc::new(server.clone()), SessionStore::in_memory(), &config);
        let viewer = GridViewer::mount(&conn, &viewer_config(grid_id));
        conn.connect();
        let mut harness = Self { server, conn, viewer };
        harness.settle().await;
        harness
    }

    fn pump(&mut self) {
        for event in self.conn.poll() {
            self.viewer.handle_event(&self.conn, event);
        }
    }

    /// Lets spawned server tasks run, then drains everything they sent.
    async fn settle(&mut self) {
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.pump();
        }
    }
}

#[tokio::test]
async fn viewer_receives_snapshot_then_applied() {
    let mut h = Harness::start(0).await;
    assert!(h.conn.is_connected());
    assert!(h.conn.session().load().is_some());
    assert!(!h.viewer.is_loading());
    assert_eq!(h.viewer.subscription_state(), SubscriptionState::Active);

    let authoritative = h.server.grid(GridId(0)).unwrap();
    let snapshot = h.viewer.snapshot().unwrap();
    assert_eq!(snapshot.cells.as_slice(), authoritative.cells.as_slice());
    assert_eq!(snapshot.generation, 0);
    assert_eq!(h.viewer.info().unwrap().status, STATUS_RUNNING);
}

#[tokio::test]
async fn submitted_toggles_come_back_through_the_feed() {
    let mut h = Harness::start(1).await;
    let before = h.server.grid(GridId(1)).unwrap().cells;

    h.viewer.toggle(0).unwrap();
    h.viewer.toggle(21).unwrap();
    let sent = h.viewer.submit(&h.conn).unwrap();
    assert_eq!(sent, vec![0, 21]);
    assert!(h.viewer.pending().is_empty());

    h.settle().await;
    let cells = &h.viewer.snapshot().unwrap().cells;
    assert_eq!(cells.is_alive(0), !before[0]);
    assert_eq!(cells.is_alive(21), !before[21]);
    assert_eq!(cells.as_slice(), h.server.grid(GridId(1)).unwrap().cells.as_slice());
}

#[tokio::test]
async fn steps_advance_generation_in_viewer() {
    let mut h = Harness::start(1).await;
    h.server.step().await.unwrap();
    h.server.step().await.unwrap();
    h.settle().await;

    assert_eq!(h.viewer.snapshot().unwrap().generation, 2);
    assert_eq!(h.viewer.info().unwrap().generation, 2);
    assert_eq!(
        h.viewer.snapshot().unwrap().cells.as_slice(),
        h.server.grid(GridId(1)).unwrap().cells.as_slice()
    );
}

#[tokio::test]
async fn oscillator_is_reported_stable_until_perturbed() {
    // grid 5 holds the beacon, a period-two oscillator
    let mut h = Harness::start(5).await;
    for _ in 0..3 {
        h.server.step().await.unwrap();
    }
    h.settle().await;
    assert_eq!(h.viewer.info().unwrap().status, STATUS_STABLE);
    let generation = h.viewer.snapshot().unwrap().generation;

    h.server.step().await.unwrap();
    h.settle().await;
    assert_eq!(h.viewer.snapshot().unwrap().generation, generation);

    h.viewer.toggle(0).unwrap();
    h.viewer.submit(&h.conn).unwrap();
    h.settle().await;
    assert_eq!(h.viewer.info().unwrap().status, STATUS_RUNNING);
}

#[tokio::test]
async fn reset_replaces_the_board() {
    let mut h = Harness::start(2).await;
    h.viewer.reset(&h.conn).unwrap();
    h.settle().await;
    assert_eq!(
        h.viewer.snapshot().unwrap().cells.as_slice(),
        h.server.grid(GridId(2)).unwrap().cells.as_slice()
    );
}

#[tokio::test]
async fn unsupported_uri_is_a_connection_error() {
    let config = ViewerConfig { uri: "wss://example.invalid".into(), ..viewer_config(0) };
    let mut h = Harness::start_with(0, config).await;
    assert!(matches!(h.conn.state(), ConnectionState::Error(_)));
    assert!(matches!(h.viewer.last_error(), Some(ClientError::Connection(_))));
    assert!(h.viewer.snapshot().is_none());
    h.pump();
    assert!(h.viewer.is_loading());
}

#[tokio::test]
async fn disconnect_then_reconnect_resubscribes_explicitly() {
    let mut h = Harness::start(0).await;
    let token = h.conn.session().load();

    h.conn.disconnect();
    h.settle().await;
    assert_eq!(h.conn.state(), &ConnectionState::Disconnected);
    assert_eq!(h.viewer.subscription_state(), SubscriptionState::Unsubscribed);
    assert!(h.viewer.is_stale());
    assert!(matches!(h.viewer.submit(&h.conn), Ok(ref sent) if sent.is_empty()));
    h.viewer.toggle(3).unwrap();
    assert!(matches!(h.viewer.submit(&h.conn), Err(ClientError::Disconnected)));
    assert!(h.viewer.pending().contains(3));

    h.conn.connect();
    h.settle().await;
    assert!(h.conn.is_connected());
    assert_eq!(h.conn.session().load(), token);
    assert_eq!(h.viewer.subscription_state(), SubscriptionState::Active);
    assert!(!h.viewer.is_stale());
}

#[tokio::test]
async fn switching_grids_moves_the_subscription() {
    let mut h = Harness::start(0).await;
    h.viewer.set_grid_id(&h.conn, GridId(3));
    h.settle().await;
    assert_eq!(h.viewer.grid_id(), GridId(3));
    assert_eq!(h.viewer.subscription_state(), SubscriptionState::Active);
    assert_eq!(
        h.viewer.snapshot().unwrap().cells.as_slice(),
        h.server.grid(GridId(3)).unwrap().cells.as_slice()
    );

    // Updates to the old board no longer reach the viewer.
    h.server.step().await.unwrap();
    h.settle().await;
    assert_eq!(h.viewer.snapshot().unwrap().grid_id, GridId(3));
}

#[tokio::test]
async fn second_handshake_replaces_the_live_link() {
    let mut h = Harness::start(0).await;
    assert!(h.conn.is_connected());

    let (sink, mut stream) = tokio::sync::mpsc::unbounded_channel();
    let params = ConnectParams { uri: "local://conway".into(), module_name: "conway".into(), token: None };
    h.server.connect(params, sink);
    h.settle().await;

    assert_eq!(h.conn.state(), &ConnectionState::Disconnected);
    assert!(h.viewer.is_stale());
    assert!(matches!(stream.try_recv(), Ok(LinkEvent::Connected { .. })));
}
