// subscription.rs - Row-filter subscriptions, one per grid id

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::backend::{Backend, Query, QueryId, Relation};
use crate::connection::ConnectionManager;
use crate::error::ClientError;
use crate::grid::GridId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Unsubscribed,
    Subscribing,
    Active,
    Unsubscribing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub query_id: QueryId,
    pub grid_id: GridId,
}

#[derive(Debug)]
struct Entry {
    handle: SubscriptionHandle,
    state: SubscriptionState,
    epoch: u64,
    requested_at: Instant,
    timeout_reported: bool,
}

/// Issues and retires the `grid` + `grid_info` filters for a grid.
///
/// One subscription covers both relations, so `Active` means the matrix and
/// the info record have both arrived. Dropping the controller retires
/// everything it still holds.
pub struct SubscriptionController {
    backend: Arc<dyn Backend>,
    next_query: u64,
    entries: HashMap<GridId, Entry>,
    // Retired while still subscribing; unsubscribed as soon as they apply.
    cancelled: HashMap<QueryId, GridId>,
    retiring: HashMap<QueryId, GridId>,
}

impl SubscriptionController {
    pub fn new(conn: &ConnectionManager) -> Self {
        Self {
            backend: conn.backend().clone(),
            next_query: 1,
            entries: HashMap::new(),
            cancelled: HashMap::new(),
            retiring: HashMap::new(),
        }
    }

    pub fn queries_for(grid_id: GridId) -> [Query; 2] {
        [
            Query { relation: Relation::Grid, grid_id },
            Query { relation: Relation::GridInfo, grid_id },
        ]
    }

    /// Subscribes to `grid_id`. Calling again for the same grid on the same
    /// connection while subscribing or active returns the existing handle.
    pub fn subscribe(
        &mut self,
        conn: &ConnectionManager,
        grid_id: GridId,
    ) -> Result<SubscriptionHandle, ClientError> {
        let link = conn.link()?;
        if let Some(entry) = self.entries.get(&grid_id) {
            let live = matches!(entry.state, SubscriptionState::Subscribing | SubscriptionState::Active);
            if live && entry.epoch == conn.epoch() {
                debug!(%grid_id, query = entry.handle.query_id.0, "already subscribed");
                return Ok(entry.handle);
            }
        }

        let query_id = QueryId(self.next_query);
        self.next_query += 1;
        let queries = Self::queries_for(grid_id);
        link.subscribe(query_id, &queries)?;
        for query in &queries {
            debug!(query = %query, id = query_id.0, "subscribing");
        }

        let handle = SubscriptionHandle { query_id, grid_id };
        self.entries.insert(
            grid_id,
            Entry {
                handle,
                state: SubscriptionState::Subscribing,
                epoch: conn.epoch(),
                requested_at: Instant::now(),
                timeout_reported: false,
            },
        );
        Ok(handle)
    }

    /// Full initial snapshot has arrived. Returns the grid that is now
    /// trustworthy, or `None` when the notification belongs to a
    /// subscription that was already retired.
    pub fn on_applied(&mut self, query_id: QueryId) -> Option<GridId> {
        if let Some(grid_id) = self.cancelled.remove(&query_id) {
            debug!(%grid_id, query = query_id.0, "stale subscription applied, retiring");
            match self.backend.unsubscribe(query_id) {
                Ok(()) => {
                    self.retiring.insert(query_id, grid_id);
                }
                Err(err) => warn!(%err, query = query_id.0, "failed to retire stale subscription"),
            }
            return None;
        }

        let entry = self
            .entries
            .values_mut()
            .find(|entry| entry.handle.query_id == query_id && entry.state == SubscriptionState::Subscribing);
        match entry {
            Some(entry) => {
                entry.state = SubscriptionState::Active;
                info!(grid_id = %entry.handle.grid_id, "client cache initialized");
                Some(entry.handle.grid_id)
            }
            None => {
                debug!(query = query_id.0, "ignoring applied for unknown subscription");
                None
            }
        }
    }

    pub fn on_ended(&mut self, query_id: QueryId) {
        if let Some(grid_id) = self.retiring.remove(&query_id) {
            debug!(%grid_id, query = query_id.0, "subscription retired");
        }
    }

    pub fn is_active(&self, handle: SubscriptionHandle) -> bool {
        self.entries
            .get(&handle.grid_id)
            .is_some_and(|entry| entry.handle == handle && entry.state == SubscriptionState::Active)
    }

    /// Retires an active subscription. Returns `false` without doing
    /// anything when the handle is not active.
    pub fn unsubscribe(&mut self, handle: SubscriptionHandle) -> Result<bool, ClientError> {
        if !self.is_active(handle) {
            return Ok(false);
        }
        self.backend.unsubscribe(handle.query_id)?;
        self.entries.remove(&handle.grid_id);
        self.retiring.insert(handle.query_id, handle.grid_id);
        info!(grid_id = %handle.grid_id, "unsubscribing");
        Ok(true)
    }

    /// Retires whatever is held for `grid_id`, active or still subscribing.
    pub fn retire(&mut self, grid_id: GridId) {
        let Some(entry) = self.entries.get(&grid_id) else {
            return;
        };
        let handle = entry.handle;
        match entry.state {
            SubscriptionState::Active => {
                if let Err(err) = self.unsubscribe(handle) {
                    warn!(%err, %grid_id, "unsubscribe failed");
                    self.entries.remove(&grid_id);
                }
            }
            SubscriptionState::Subscribing => {
                self.entries.remove(&grid_id);
                self.cancelled.insert(handle.query_id, grid_id);
                debug!(%grid_id, query = handle.query_id.0, "cancelled pending subscription");
            }
            SubscriptionState::Unsubscribing | SubscriptionState::Unsubscribed => {
                self.entries.remove(&grid_id);
            }
        }
    }

    pub fn retire_all(&mut self) {
        let grids: Vec<GridId> = self.entries.keys().copied().collect();
        for grid_id in grids {
            self.retire(grid_id);
        }
    }

    /// The link dropped: nothing held is valid any more. No resubscription
    /// happens here.
    pub fn invalidate_all(&mut self) {
        if !self.entries.is_empty() {
            info!(count = self.entries.len(), "subscriptions invalidated by disconnect");
        }
        self.entries.clear();
        self.cancelled.clear();
        self.retiring.clear();
    }

    pub fn state(&self, grid_id: GridId) -> SubscriptionState {
        if let Some(entry) = self.entries.get(&grid_id) {
            return entry.state;
        }
        if self.retiring.values().chain(self.cancelled.values()).any(|retired| *retired == grid_id) {
            return SubscriptionState::Unsubscribing;
        }
        SubscriptionState::Unsubscribed
    }

    pub fn handle(&self, grid_id: GridId) -> Option<SubscriptionHandle> {
        self.entries.get(&grid_id).map(|entry| entry.handle)
    }

    /// Reports subscriptions stuck in `Subscribing` for longer than `limit`.
    /// Each one is reported once; nothing is retried.
    pub fn check_timeouts(&mut self, now: Instant, limit: Duration) -> Vec<ClientError> {
        let mut overdue = Vec::new();
        for entry in self.entries.values_mut() {
            if entry.state != SubscriptionState::Subscribing || entry.timeout_reported {
                continue;
            }
            let waited = now.saturating_duration_since(entry.requested_at);
            if waited >= limit {
                entry.timeout_reported = true;
                warn!(grid_id = %entry.handle.grid_id, ?waited, "subscription not applied");
                overdue.push(ClientError::SubscriptionTimeout { grid_id: entry.handle.grid_id, waited });
            }
        }
        overdue
    }
}

impl Drop for SubscriptionController {
    fn drop(&mut self) {
        // Nobody is left to wait for `applied`, so pending ones go too.
        let held = self.entries.drain().map(|(_, entry)| entry.handle.query_id);
        for query_id in held.chain(self.cancelled.drain().map(|(query_id, _)| query_id)) {
            if let Err(err) = self.backend.unsubscribe(query_id) {
                debug!(%err, query = query_id.0, "unsubscribe on teardown failed");
            }
        }
    }
}
