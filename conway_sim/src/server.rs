// server.rs - In-process authoritative server behind the client's Backend seam

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use conway_client::{
    Backend, ClientError, ConnectParams, EventSink, GridId, GridInfoRow, GridRow, Identity,
    LinkEvent, Query, QueryId, Relation, RemoteCall,
};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::SimConfig;
use crate::error::SimError;
use crate::life::{CycleDetector, step_cells};
use crate::patterns::{self, PATTERNS};

pub const STATUS_RUNNING: &str = "running";
pub const STATUS_STABLE: &str = "stable";

struct Board {
    row: GridRow,
    info: GridInfoRow,
    // Bumped by every client mutation so an in-flight step can tell it is outdated.
    revision: u64,
    cycles: CycleDetector,
}

struct Link {
    sink: EventSink,
    subscriptions: HashMap<QueryId, Vec<Query>>,
    ticker: Option<JoinHandle<()>>,
}

impl Link {
    fn wants(&self, relation: Relation, grid_id: GridId) -> bool {
        self.subscriptions
            .values()
            .flatten()
            .any(|query| query.matches_grid(relation, grid_id))
    }

    fn send(&self, event: LinkEvent) {
        if self.sink.send(event).is_err() {
            debug!("client receiver gone, event dropped");
        }
    }
}

struct World {
    boards: BTreeMap<GridId, Board>,
    link: Option<Link>,
    // Handshake in flight: attempt number and where to report.
    handshake: Option<(u64, EventSink)>,
    attempts: u64,
}

struct Shared {
    config: SimConfig,
    world: Mutex<World>,
}

/// Owns the canonical boards, advances them on a timer and serves one
/// client link at a time. Every row change goes out as a whole-row update.
#[derive(Clone)]
pub struct LocalServer {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl LocalServer {
    pub fn new(config: SimConfig, runtime: Handle) -> Self {
        let seed = seed_from_clock();
        let boards = (0..config.grid_count)
            .map(|id| {
                let grid_id = GridId(id);
                let cells = match id {
                    0 => patterns::random_cells(config.grid_size, config.seed_density, seed),
                    n => patterns::pattern_cells(config.grid_size, &PATTERNS[(n as usize - 1) % PATTERNS.len()]),
                };
                (grid_id, Board::new(grid_id, cells))
            })
            .collect();
        info!(grids = config.grid_count, size = config.grid_size, "local server initialised");

        Self {
            shared: Arc::new(Shared {
                config,
                world: Mutex::new(World { boards, link: None, handshake: None, attempts: 0 }),
            }),
            runtime,
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.shared.config
    }

    /// Current authoritative row, for inspection.
    pub fn grid(&self, grid_id: GridId) -> Option<GridRow> {
        self.shared.world.lock().boards.get(&grid_id).map(|board| board.row.clone())
    }

    pub fn info(&self, grid_id: GridId) -> Option<GridInfoRow> {
        self.shared.world.lock().boards.get(&grid_id).map(|board| board.info.clone())
    }

    /// Advances every running board by one generation.
    pub async fn step(&self) -> Result<(), SimError> {
        self.shared.step().await
    }

    fn start_ticker(&self) -> Option<JoinHandle<()>> {
        let interval = self.shared.config.tick_interval?;
        let shared = self.shared.clone();
        Some(self.runtime.spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                if let Err(err) = shared.step().await {
                    warn!(%err, "generation step failed");
                }
            }
        }))
    }

    fn with_link<T>(&self, f: impl FnOnce(&mut World) -> Result<T, SimError>) -> Result<T, ClientError> {
        let mut world = self.shared.world.lock();
        if world.link.is_none() {
            return Err(SimError::NotConnected.into());
        }
        f(&mut world).map_err(ClientError::from)
    }
}

impl Board {
    fn new(grid_id: GridId, cells: Vec<bool>) -> Self {
        Self {
            row: GridRow { grid_id, cells, generation: 0 },
            info: GridInfoRow { grid_id, generation: 0, status: STATUS_RUNNING.to_string() },
            revision: 0,
            cycles: CycleDetector::default(),
        }
    }

    fn is_stable(&self) -> bool {
        self.info.status == STATUS_STABLE
    }
}

impl World {
    /// Replaces the board's rows and tells the client about whatever changed.
    fn publish(&mut self, grid_id: GridId, cells: Vec<bool>, generation: u64, status: &str) {
        let Some(board) = self.boards.get_mut(&grid_id) else {
            return;
        };
        let new_row = GridRow { grid_id, cells, generation };
        let old_row = std::mem::replace(&mut board.row, new_row.clone());
        let new_info = GridInfoRow { grid_id, generation, status: status.to_string() };
        let old_info = std::mem::replace(&mut board.info, new_info.clone());

        let Some(link) = self.link.as_ref() else {
            return;
        };
        if link.wants(Relation::Grid, grid_id) {
            link.send(LinkEvent::GridUpdated { old: old_row, new: new_row });
        }
        if old_info != new_info && link.wants(Relation::GridInfo, grid_id) {
            link.send(LinkEvent::InfoUpdated { old: old_info, new: new_info });
        }
    }

    fn toggle_cells(&mut self, grid_id: GridId, indices: &[usize]) -> Result<(), SimError> {
        let board = self.boards.get_mut(&grid_id).ok_or(SimError::NoSuchGrid(grid_id))?;
        let mut cells = board.row.cells.clone();
        for &index in indices {
            match cells.get_mut(index) {
                Some(cell) => *cell = !*cell,
                None => warn!(%grid_id, index, "toggle outside board ignored"),
            }
        }
        board.revision += 1;
        board.cycles.reset();
        let generation = board.row.generation;
        info!(%grid_id, count = indices.len(), "cells toggled");
        self.publish(grid_id, cells, generation, STATUS_RUNNING);
        Ok(())
    }

    fn reset(&mut self, grid_id: GridId, side: usize, density: f32) -> Result<(), SimError> {
        let board = self.boards.get_mut(&grid_id).ok_or(SimError::NoSuchGrid(grid_id))?;
        board.revision += 1;
        board.cycles.reset();
        let generation = board.row.generation;
        let seed = seed_from_clock() ^ u64::from(grid_id.0) ^ board.revision;
        let cells = patterns::random_cells(side, density, seed);
        info!(%grid_id, "grid reset");
        self.publish(grid_id, cells, generation, STATUS_RUNNING);
        Ok(())
    }
}

impl Shared {
    async fn step(&self) -> Result<(), SimError> {
        let side = self.config.grid_size;
        let jobs: Vec<(GridId, u64, Arc<Vec<bool>>)> = {
            let world = self.world.lock();
            world
                .boards
                .iter()
                .filter(|(_, board)| !board.is_stable())
                .map(|(grid_id, board)| (*grid_id, board.revision, Arc::new(board.row.cells.clone())))
                .collect()
        };

        for (grid_id, revision, cells) in jobs {
            let next = step_cells(cells, side).await?;

            let mut world = self.world.lock();
            let Some(board) = world.boards.get_mut(&grid_id) else {
                continue;
            };
            if board.revision != revision {
                debug!(%grid_id, "board changed during step, result discarded");
                continue;
            }
            let generation = board.row.generation + 1;
            let status = if board.cycles.check(&next) { STATUS_STABLE } else { STATUS_RUNNING };
            if status == STATUS_STABLE {
                info!(%grid_id, generation, "board is stable");
            }
            world.publish(grid_id, next, generation, status);
        }
        Ok(())
    }
}

impl Backend for LocalServer {
    fn connect(&self, params: ConnectParams, events: EventSink) {
        if !params.uri.starts_with("local://") {
            let message = format!("unsupported uri '{}', expected local://", params.uri);
            let _ = events.send(LinkEvent::ConnectError(message));
            return;
        }
        if params.module_name != self.shared.config.module_name {
            let message = format!("no module named '{}'", params.module_name);
            let _ = events.send(LinkEvent::ConnectError(message));
            return;
        }

        let attempt = {
            let mut world = self.shared.world.lock();
            world.attempts += 1;
            world.handshake = Some((world.attempts, events));
            world.attempts
        };

        let server = self.clone();
        let delay = self.shared.config.handshake_delay;
        self.runtime.spawn(async move {
            time::sleep(delay).await;
            let ticker = server.start_ticker();
            let mut world = server.shared.world.lock();
            let sink = match world.handshake.take() {
                Some((current, sink)) if current == attempt => sink,
                other => {
                    world.handshake = other;
                    if let Some(ticker) = ticker {
                        ticker.abort();
                    }
                    debug!(attempt, "handshake superseded");
                    return;
                }
            };
            if let Some(previous) = world.link.take() {
                if let Some(ticker) = previous.ticker.as_ref() {
                    ticker.abort();
                }
                previous.send(LinkEvent::Disconnected);
            }

            let identity = Identity(Uuid::new_v4().simple().to_string());
            let token = params.token.unwrap_or_else(|| format!("local-{}", Uuid::new_v4().simple()));
            info!(identity = identity.to_hex_string(), "client connected");
            let link = Link { sink, subscriptions: HashMap::new(), ticker };
            link.send(LinkEvent::Connected { identity, token });
            world.link = Some(link);
        });
    }

    fn disconnect(&self) {
        let mut world = self.shared.world.lock();
        if let Some(link) = world.link.take() {
            if let Some(ticker) = link.ticker.as_ref() {
                ticker.abort();
            }
            info!("client disconnected");
            link.send(LinkEvent::Disconnected);
        } else if let Some((_, sink)) = world.handshake.take() {
            let _ = sink.send(LinkEvent::Disconnected);
        }
    }

    fn subscribe(&self, id: QueryId, queries: &[Query]) -> Result<(), ClientError> {
        self.with_link(|world| {
            let World { boards, link, .. } = world;
            let link = link.as_mut().ok_or(SimError::NotConnected)?;
            for query in queries {
                let Some(board) = boards.get(&query.grid_id) else {
                    debug!(%query, "subscription matches no rows yet");
                    continue;
                };
                match query.relation {
                    Relation::Grid => link.send(LinkEvent::GridInserted(board.row.clone())),
                    Relation::GridInfo => link.send(LinkEvent::InfoInserted(board.info.clone())),
                }
            }
            link.subscriptions.insert(id, queries.to_vec());
            link.send(LinkEvent::SubscriptionApplied(id));
            debug!(id = id.0, "subscription applied");
            Ok(())
        })
    }

    fn unsubscribe(&self, id: QueryId) -> Result<(), ClientError> {
        self.with_link(|world| {
            let link = world.link.as_mut().ok_or(SimError::NotConnected)?;
            link.subscriptions.remove(&id).ok_or(SimError::UnknownSubscription(id))?;
            link.send(LinkEvent::SubscriptionEnded(id));
            Ok(())
        })
    }

    fn call(&self, call: RemoteCall) -> Result<(), ClientError> {
        let side = self.shared.config.grid_size;
        let density = self.shared.config.reset_density;
        self.with_link(|world| match call {
            RemoteCall::SubmitCellToggles { grid_id, indices } => world.toggle_cells(grid_id, &indices),
            RemoteCall::ResetGrid { grid_id } => world.reset(grid_id, side, density),
        })
    }
}

fn seed_from_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or_default()
}
