//! Connection registry and broadcast paths.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, trace};

use formline_types::FormView;

use crate::event::HubEvent;

/// Opaque handle for one registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Connections in the originating session that received the event.
    pub session_delivered: usize,
    /// Admin connections that received the event.
    pub admin_delivered: usize,
    /// Dead connections dropped from the registry during this broadcast.
    pub pruned: usize,
}

type Group = HashMap<ConnectionId, UnboundedSender<HubEvent>>;

enum Membership {
    Session(String),
    Admin,
}

#[derive(Default)]
struct Registry {
    sessions: HashMap<String, Group>,
    admins: Group,
    members: HashMap<ConnectionId, Membership>,
}

impl Registry {
    fn remove(&mut self, id: ConnectionId) {
        match self.members.remove(&id) {
            Some(Membership::Session(session_id)) => {
                if let Some(group) = self.sessions.get_mut(&session_id) {
                    group.remove(&id);
                    if group.is_empty() {
                        self.sessions.remove(&session_id);
                    }
                }
            }
            Some(Membership::Admin) => {
                self.admins.remove(&id);
            }
            None => {}
        }
    }
}

/// Fan-out hub for session and admin subscribers.
///
/// Callers share one hub behind an `Arc`; each websocket connection joins a
/// group and forwards its receiver to the socket.
#[derive(Default)]
pub struct FanoutHub {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
}

impl FanoutHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> ConnectionId {
        ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a connection in a session group.
    pub fn join_session(&self, session_id: &str) -> (ConnectionId, UnboundedReceiver<HubEvent>) {
        let id = self.next_id();
        let (tx, rx) = unbounded_channel();

        let mut registry = self.registry.lock();
        registry
            .sessions
            .entry(session_id.to_string())
            .or_default()
            .insert(id, tx);
        registry
            .members
            .insert(id, Membership::Session(session_id.to_string()));

        debug!(session_id = %session_id, connection = id.0, "connection joined session group");
        (id, rx)
    }

    /// Register a connection in the admin group.
    pub fn join_admins(&self) -> (ConnectionId, UnboundedReceiver<HubEvent>) {
        let id = self.next_id();
        let (tx, rx) = unbounded_channel();

        let mut registry = self.registry.lock();
        registry.admins.insert(id, tx);
        registry.members.insert(id, Membership::Admin);

        debug!(connection = id.0, "connection joined admin group");
        (id, rx)
    }

    /// Remove a connection from whatever group it joined.
    pub fn leave(&self, id: ConnectionId) {
        self.registry.lock().remove(id);
    }

    /// Number of live connections across all groups.
    pub fn connection_count(&self) -> usize {
        self.registry.lock().members.len()
    }

    /// Announce a newly logged form.
    ///
    /// The owning session's subscribers get `ReceiveUserForm`; every admin
    /// subscriber gets `AdminReceiveForm`. Anonymous forms (no session) go to
    /// admins only. The two deliveries are independent.
    pub fn broadcast_new_form(
        &self,
        session_id: Option<&str>,
        form: &FormView,
    ) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut registry = self.registry.lock();

        if let Some(session_id) = session_id {
            let dead = match registry.sessions.get(session_id) {
                Some(group) => send_to_group(group, || HubEvent::ReceiveUserForm {
                    form: form.clone(),
                }),
                None => Vec::new(),
            };
            report.session_delivered = registry
                .sessions
                .get(session_id)
                .map_or(0, |g| g.len() - dead.len());
            report.pruned += dead.len();
            for id in dead {
                registry.remove(id);
            }
        }

        let dead = send_to_group(&registry.admins, || HubEvent::AdminReceiveForm {
            form: form.clone(),
        });
        report.admin_delivered = registry.admins.len() - dead.len();
        report.pruned += dead.len();
        for id in dead {
            registry.remove(id);
        }

        trace!(
            form_id = form.id,
            session = report.session_delivered,
            admin = report.admin_delivered,
            "broadcast new form"
        );
        report
    }

    /// Announce a form state change to admin subscribers.
    pub fn broadcast_state_change(&self, form: &FormView) -> DeliveryReport {
        let mut registry = self.registry.lock();
        let dead = send_to_group(&registry.admins, || HubEvent::FormStateChanged {
            form: form.clone(),
        });

        let report = DeliveryReport {
            session_delivered: 0,
            admin_delivered: registry.admins.len() - dead.len(),
            pruned: dead.len(),
        };
        for id in dead {
            registry.remove(id);
        }
        report
    }
}

/// Send an event to every connection in a group, returning the ids whose
/// receiver side is gone.
fn send_to_group(group: &Group, event: impl Fn() -> HubEvent) -> Vec<ConnectionId> {
    let mut dead = Vec::new();
    for (id, sender) in group {
        if sender.send(event()).is_err() {
            debug!(connection = id.0, "pruning dead connection");
            dead.push(*id);
        }
    }
    dead
}
