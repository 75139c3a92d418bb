//! Case room registry.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::broadcast;

use crate::chat::protocol::ServerEvent;
use crate::types::CaseId;

/// Per-room broadcast capacity. A receiver that lags this far behind loses
/// frames (broadcast semantics); clients resynchronize via the REST history.
const ROOM_CAPACITY: usize = 64;

/// Registry of live case rooms, shared through [`crate::AppState`].
#[derive(Clone, Default)]
pub struct ChatRooms {
    rooms: Arc<DashMap<CaseId, broadcast::Sender<ServerEvent>>>,
}

impl ChatRooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a case room, creating it on first join.
    pub fn subscribe(&self, case_id: CaseId) -> broadcast::Receiver<ServerEvent> {
        self.rooms
            .entry(case_id)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Broadcast an event to a room. A room with no live subscribers is
    /// dropped from the registry instead.
    pub fn broadcast(&self, case_id: CaseId, event: ServerEvent) {
        if let Some(sender) = self.rooms.get(&case_id) {
            if sender.send(event).is_err() {
                drop(sender);
                self.rooms.remove_if(&case_id, |_, s| s.receiver_count() == 0);
            }
        }
    }

    /// Number of live rooms; used by tests and the health surface.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
