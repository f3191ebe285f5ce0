// viewer.rs - One mounted grid: state, staged edits, hover and rendering wired together

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::backend::{LinkEvent, RemoteCall};
use crate::config::ViewerConfig;
use crate::connection::ConnectionManager;
use crate::error::ClientError;
use crate::grid::{CellMatrix, GridId};
use crate::pending::PendingEditBuffer;
use crate::render::{Damage, GridRenderer};
use crate::state::{GridInfo, GridSnapshot, GridStateStore};
use crate::subscription::{SubscriptionController, SubscriptionState};

/// Viewer for a single grid id.
///
/// Owns everything the grid needs on the client side. Dropping it (or
/// calling [`unmount`](Self::unmount)) retires its subscriptions and
/// discards its state; nothing it registered outlives it.
pub struct GridViewer {
    grid_id: GridId,
    grid_size: usize,
    config: ViewerConfig,
    store: GridStateStore,
    pending: PendingEditBuffer,
    hover: Option<usize>,
    renderer: GridRenderer,
    subscriptions: SubscriptionController,
    placeholder: CellMatrix,
    // Set once a snapshot is shown but the link behind it went away.
    stale: bool,
    // After teardown every mutating entry point is a no-op.
    unmounted: bool,
    last_error: Option<ClientError>,
}

impl GridViewer {
    pub fn mount(conn: &ConnectionManager, config: &ViewerConfig) -> Self {
        let grid_size = config.grid_size;
        let mut viewer = Self {
            grid_id: config.grid_id,
            grid_size,
            config: config.clone(),
            store: GridStateStore::new(grid_size),
            pending: PendingEditBuffer::new(grid_size * grid_size),
            hover: None,
            renderer: GridRenderer::new(grid_size, 0),
            subscriptions: SubscriptionController::new(conn),
            placeholder: CellMatrix::placeholder(grid_size),
            stale: false,
            unmounted: false,
            last_error: None,
        };
        info!(grid_id = %viewer.grid_id, grid_size, "viewer mounted");
        if conn.is_connected() {
            viewer.subscribe(conn);
        }
        viewer
    }

    fn subscribe(&mut self, conn: &ConnectionManager) {
        if let Err(err) = self.subscriptions.subscribe(conn, self.grid_id) {
            warn!(%err, grid_id = %self.grid_id, "subscribe failed");
            self.last_error = Some(err);
        }
    }

    /// Reacts to one event drained from [`ConnectionManager::poll`].
    pub fn handle_event(&mut self, conn: &ConnectionManager, event: LinkEvent) {
        if self.unmounted {
            debug!(grid_id = %self.grid_id, "event after unmount ignored");
            return;
        }
        match event {
            LinkEvent::Connected { .. } => {
                self.last_error = None;
                self.subscribe(conn);
            }
            LinkEvent::Disconnected => {
                self.subscriptions.invalidate_all();
                self.stale = self.store.get(self.grid_id).is_some();
                self.last_error = Some(ClientError::Disconnected);
            }
            LinkEvent::ConnectError(message) => {
                self.last_error = Some(ClientError::Connection(message));
            }
            LinkEvent::SubscriptionApplied(query_id) => {
                if self.subscriptions.on_applied(query_id) == Some(self.grid_id) {
                    self.stale = false;
                    self.last_error = None;
                }
            }
            LinkEvent::SubscriptionEnded(query_id) => self.subscriptions.on_ended(query_id),
            LinkEvent::GridInserted(row) => {
                if self.owns(row.grid_id) {
                    let applied = self.store.apply_insert(row);
                    self.record(applied);
                }
            }
            LinkEvent::GridUpdated { old, new } => {
                if self.owns(new.grid_id) {
                    let applied = self.store.apply_update(&old, new);
                    self.record(applied);
                }
            }
            LinkEvent::InfoInserted(row) => {
                if self.owns(row.grid_id) {
                    self.store.apply_info_insert(row);
                }
            }
            LinkEvent::InfoUpdated { old, new } => {
                if self.owns(new.grid_id) {
                    self.store.apply_info_update(&old, new);
                }
            }
        }
    }

    fn owns(&self, grid_id: GridId) -> bool {
        if grid_id != self.grid_id {
            debug!(%grid_id, mounted = %self.grid_id, "row for another grid ignored");
            return false;
        }
        true
    }

    fn record(&mut self, result: Result<(), ClientError>) {
        if let Err(err) = result {
            self.last_error = Some(err);
        }
    }

    /// Reports a subscription that has been loading for too long. Never retries.
    pub fn check_timeouts(&mut self, now: Instant) {
        if self.unmounted {
            return;
        }
        let limit = self.config.subscription_timeout;
        if let Some(err) = self.subscriptions.check_timeouts(now, limit).pop() {
            self.last_error = Some(err);
        }
    }

    /// Switches to another grid: the old subscription is retired (a pending
    /// one is cancelled), its state and staged edits are dropped.
    pub fn set_grid_id(&mut self, conn: &ConnectionManager, grid_id: GridId) {
        if self.unmounted || grid_id == self.grid_id {
            return;
        }
        info!(from = %self.grid_id, to = %grid_id, "switching grid");
        self.subscriptions.retire(self.grid_id);
        self.store.discard(self.grid_id);
        self.pending.clear();
        self.hover = None;
        self.stale = false;
        self.renderer.invalidate();
        self.grid_id = grid_id;
        if conn.is_connected() {
            self.subscribe(conn);
        }
    }

    pub fn pointer_moved(&mut self, position: Option<(f32, f32)>) {
        if self.unmounted {
            return;
        }
        self.hover = position.and_then(|(x, y)| self.renderer.hit_test(x, y));
    }

    pub fn pointer_left(&mut self) {
        self.hover = None;
    }

    /// Stages (or unstages) the clicked cell. Clicks off the board do nothing.
    pub fn clicked(&mut self, x: f32, y: f32) -> Option<usize> {
        if self.unmounted {
            return None;
        }
        let index = self.renderer.hit_test(x, y)?;
        match self.pending.toggle(index) {
            Ok(staged) => {
                debug!(index, staged, "cell toggled");
                Some(index)
            }
            Err(err) => {
                warn!(%err, "toggle rejected");
                None
            }
        }
    }

    /// Stages or unstages one cell. After unmount nothing is staged.
    pub fn toggle(&mut self, index: usize) -> Result<bool, ClientError> {
        if self.unmounted {
            return Ok(false);
        }
        self.pending.toggle(index)
    }

    /// Sends all staged toggles as one call. The buffer is emptied at the
    /// moment the call is issued; if there is no live link or the backend
    /// refuses the call, the edits stay staged.
    pub fn submit(&mut self, conn: &ConnectionManager) -> Result<Vec<usize>, ClientError> {
        if self.unmounted || self.pending.is_empty() {
            return Ok(Vec::new());
        }
        let link = conn.link()?;
        let indices = self.pending.flush_and_get();
        info!(grid_id = %self.grid_id, count = indices.len(), "submitting cell toggles");
        let call = RemoteCall::SubmitCellToggles { grid_id: self.grid_id, indices: indices.clone() };
        if let Err(err) = link.call(call) {
            warn!(%err, grid_id = %self.grid_id, "submission refused, edits kept");
            self.pending.restore(indices);
            return Err(err);
        }
        Ok(indices)
    }

    pub fn reset(&mut self, conn: &ConnectionManager) -> Result<(), ClientError> {
        if self.unmounted {
            return Ok(());
        }
        let link = conn.link()?;
        info!(grid_id = %self.grid_id, "resetting grid");
        link.call(RemoteCall::ResetGrid { grid_id: self.grid_id })
    }

    pub fn resize(&mut self, side: usize) -> bool {
        self.renderer.resize(side)
    }

    /// Brings the raster up to date and reports what was repainted.
    pub fn render(&mut self) -> Damage {
        if self.unmounted {
            return Damage::None;
        }
        let matrix = match self.store.get(self.grid_id) {
            Some(snapshot) => &snapshot.cells,
            None => &self.placeholder,
        };
        self.renderer.render(matrix, &self.pending, self.hover)
    }

    /// Retires subscriptions and discards all state for the mounted grid.
    pub fn unmount(&mut self) {
        if self.unmounted {
            return;
        }
        self.unmounted = true;
        info!(grid_id = %self.grid_id, "viewer unmounted");
        self.subscriptions.retire_all();
        self.store.discard(self.grid_id);
        self.pending.clear();
        self.hover = None;
    }

    pub fn grid_id(&self) -> GridId {
        self.grid_id
    }

    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// True until the initial snapshot for the mounted grid has been applied
    /// and has actually delivered a row.
    pub fn is_loading(&self) -> bool {
        if self.snapshot().is_none() {
            return true;
        }
        self.subscriptions.state(self.grid_id) != SubscriptionState::Active && !self.stale
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted
    }

    /// True while the last snapshot is shown without a live subscription.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.subscriptions.state(self.grid_id)
    }

    pub fn snapshot(&self) -> Option<&GridSnapshot> {
        self.store.get(self.grid_id)
    }

    pub fn info(&self) -> Option<&GridInfo> {
        self.store.get_info(self.grid_id)
    }

    pub fn cells(&self) -> &CellMatrix {
        self.snapshot().map_or(&self.placeholder, |snapshot| &snapshot.cells)
    }

    pub fn pending(&self) -> &PendingEditBuffer {
        &self.pending
    }

    pub fn hover(&self) -> Option<usize> {
        self.hover
    }

    pub fn renderer(&self) -> &GridRenderer {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut GridRenderer {
        &mut self.renderer
    }

    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }
}

impl Drop for GridViewer {
    fn drop(&mut self) {
        self.unmount();
    }
}
