//! Connection registry: live sessions by session id.

use crate::errors::RelayError;
use crate::protocol::{IdentityId, ServerEvent, SessionId};
use crate::scheduler::Debouncer;
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Arguments carried by an eviction timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionTicket {
    pub identity_id: IdentityId,
    /// Session that disconnected and armed the timer.
    pub session_id: SessionId,
}

/// Outbound channel to one session.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    session_id: SessionId,
    sender: mpsc::Sender<ServerEvent>,
}

impl SessionHandle {
    pub fn new(session_id: impl Into<SessionId>, sender: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            session_id: session_id.into(),
            sender,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Queue an event without waiting.
    ///
    /// A full or closed channel is a `NotificationFailure`; the event is lost.
    pub fn deliver(&self, event: ServerEvent) -> Result<(), RelayError> {
        self.sender.try_send(event).map_err(|e| {
            let reason = match e {
                TrySendError::Full(_) => "channel full",
                TrySendError::Closed(_) => "channel closed",
            };
            RelayError::NotificationFailure {
                session_id: self.session_id.clone(),
                reason: reason.to_string(),
            }
        })
    }
}

/// A live session.
#[derive(Debug)]
pub struct Client {
    pub handle: SessionHandle,
    /// Identity bound by a successful join or reconnect.
    pub user_id: Option<IdentityId>,
    /// Eviction timer for this connection, armed on disconnect.
    pub eviction: Debouncer<EvictionTicket>,
}

impl Client {
    #[must_use]
    pub fn session_id(&self) -> &str {
        self.handle.session_id()
    }
}

/// Session id to [`Client`].
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    clients: HashMap<SessionId, Client>,
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a client for a newly connected session.
    pub fn register(&mut self, handle: SessionHandle, eviction: Debouncer<EvictionTicket>) {
        let session_id = handle.session_id().to_string();
        self.clients.insert(
            session_id,
            Client {
                handle,
                user_id: None,
                eviction,
            },
        );
    }

    #[must_use]
    pub fn lookup(&self, session_id: &str) -> Option<&Client> {
        self.clients.get(session_id)
    }

    pub fn lookup_mut(&mut self, session_id: &str) -> Option<&mut Client> {
        self.clients.get_mut(session_id)
    }

    /// Remove a client. A client still bound to an identity arms its
    /// eviction timer on the way out.
    pub fn remove(&mut self, session_id: &str) -> Option<Client> {
        let client = self.clients.remove(session_id)?;

        if let Some(identity_id) = &client.user_id {
            client.eviction.trigger(EvictionTicket {
                identity_id: identity_id.clone(),
                session_id: session_id.to_string(),
            });
        }

        Some(client)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
