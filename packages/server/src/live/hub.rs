use std::collections::HashSet;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::event::PushEvent;

/// A connected client. Events pushed to it arrive on `events`.
pub struct Session {
    pub id: Uuid,
    pub user_id: i32,
    pub events: mpsc::UnboundedReceiver<PushEvent>,
}

struct SessionHandle {
    user_id: i32,
    tx: mpsc::UnboundedSender<PushEvent>,
}

/// Routes push events to connected sessions by user and by contest room.
///
/// There is no offline queue. An event for a user without a live session is dropped;
/// clients recover by re-fetching.
#[derive(Default)]
pub struct NotificationHub {
    sessions: DashMap<Uuid, SessionHandle>,
    users: DashMap<i32, HashSet<Uuid>>,
    rooms: DashMap<i32, HashSet<Uuid>>,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, user_id: i32) -> Session {
        let (tx, events) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.sessions.insert(id, SessionHandle { user_id, tx });
        self.users.entry(user_id).or_default().insert(id);
        debug!(session_id = %id, user_id, "Live session connected");
        Session {
            id,
            user_id,
            events,
        }
    }

    pub fn disconnect(&self, session_id: Uuid) {
        let Some((_, handle)) = self.sessions.remove(&session_id) else {
            return;
        };
        self.users.remove_if_mut(&handle.user_id, |_, ids| {
            ids.remove(&session_id);
            ids.is_empty()
        });
        self.rooms.retain(|_, ids| {
            ids.remove(&session_id);
            !ids.is_empty()
        });
        debug!(session_id = %session_id, user_id = handle.user_id, "Live session disconnected");
    }

    /// Returns false if the session is not connected.
    pub fn join_room(&self, contest_id: i32, session_id: Uuid) -> bool {
        if !self.sessions.contains_key(&session_id) {
            return false;
        }
        self.rooms.entry(contest_id).or_default().insert(session_id);
        true
    }

    pub fn leave_room(&self, contest_id: i32, session_id: Uuid) {
        self.rooms.remove_if_mut(&contest_id, |_, ids| {
            ids.remove(&session_id);
            ids.is_empty()
        });
    }

    /// Deliver to every session of `user_id`. Returns how many sessions received it.
    pub fn push_to_user(&self, user_id: i32, event: PushEvent) -> usize {
        let targets: Vec<Uuid> = self
            .users
            .get(&user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        self.deliver(&targets, event)
    }

    /// Deliver to every session in the contest room. Returns how many sessions received it.
    pub fn broadcast_to_room(&self, contest_id: i32, event: PushEvent) -> usize {
        let targets: Vec<Uuid> = self
            .rooms
            .get(&contest_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        self.deliver(&targets, event)
    }

    fn deliver(&self, targets: &[Uuid], event: PushEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for id in targets {
            let sent = self
                .sessions
                .get(id)
                .map(|handle| handle.tx.send(event.clone()).is_ok());
            match sent {
                Some(true) => delivered += 1,
                Some(false) => closed.push(*id),
                None => {}
            }
        }

        // Map guards are released above; pruning takes write locks.
        for id in closed {
            self.disconnect(id);
        }

        debug!(event = event.name(), delivered, "Pushed live event");
        delivered
    }
}
