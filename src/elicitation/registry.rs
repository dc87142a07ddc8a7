//! Pending elicitation bookkeeping.
//!
//! Each registered request resolves exactly once: by an explicit answer, an
//! explicit cancellation, or the waiter's own timeout. The entry is removed
//! from the registry in the same critical section that resolves it, so a late
//! `resolve` after any terminal cause is a harmless `false`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::types::ElicitationId;

/// A request for human input that a tool is currently blocked on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElicitationRequest {
    pub id: ElicitationId,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option_schema: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// How a wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ElicitationOutcome {
    Answered(serde_json::Value),
    Cancelled,
    TimedOut,
}

impl ElicitationOutcome {
    /// Timeouts are indistinguishable from cancellation for the tool.
    pub fn is_cancellation(&self) -> bool {
        !matches!(self, Self::Answered(_))
    }
}

enum Resolution {
    Answered(serde_json::Value),
    Cancelled,
}

struct PendingElicitation {
    request: ElicitationRequest,
    responder: oneshot::Sender<Resolution>,
}

/// Registry of in-flight elicitations, keyed by id.
///
/// Cheap to clone; clones share the same table.
#[derive(Clone, Default)]
pub struct ElicitationRegistry {
    pending: Arc<Mutex<HashMap<ElicitationId, PendingElicitation>>>,
}

impl std::fmt::Debug for ElicitationRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElicitationRegistry")
            .field("pending", &self.len())
            .finish()
    }
}

impl ElicitationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new unresolved request and return the handle its owner waits on.
    pub fn register(
        &self,
        id: ElicitationId,
        prompt: impl Into<String>,
        option_schema: Option<serde_json::Value>,
    ) -> Result<WaitHandle, RelayError> {
        let (responder, receiver) = oneshot::channel();
        let mut pending = self.lock();
        if pending.contains_key(&id) {
            return Err(RelayError::DuplicateElicitation(id.to_string()));
        }
        let request = ElicitationRequest {
            id: id.clone(),
            prompt: prompt.into(),
            option_schema,
            created_at: Utc::now(),
        };
        pending.insert(id.clone(), PendingElicitation { request, responder });
        debug!(elicitation_id = %id, "elicitation registered");

        Ok(WaitHandle {
            id,
            receiver,
            registry: self.clone(),
        })
    }

    /// Answer a pending request. Returns `false` if nothing is pending under `id`.
    pub fn resolve(&self, id: &str, payload: serde_json::Value) -> bool {
        self.settle(id, Resolution::Answered(payload))
    }

    /// Cancel a pending request. Returns `false` if nothing is pending under `id`.
    pub fn cancel(&self, id: &str) -> bool {
        self.settle(id, Resolution::Cancelled)
    }

    /// Cancel every pending request. Returns how many were cancelled.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<PendingElicitation> = self.lock().drain().map(|(_, p)| p).collect();
        let count = drained.len();
        for pending in drained {
            let _ = pending.responder.send(Resolution::Cancelled);
        }
        if count > 0 {
            debug!(count, "cancelled all pending elicitations");
        }
        count
    }

    /// Snapshot of the requests currently waiting for an answer, oldest first.
    pub fn pending(&self) -> Vec<ElicitationRequest> {
        let mut requests: Vec<ElicitationRequest> =
            self.lock().values().map(|p| p.request.clone()).collect();
        requests.sort_by_key(|r| r.created_at);
        requests
    }

    pub fn contains(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn settle(&self, id: &str, resolution: Resolution) -> bool {
        let Some(pending) = self.remove(id) else {
            debug!(elicitation_id = id, "no pending elicitation to settle");
            return false;
        };
        // Waiter dropped between removal and send.
        if pending.responder.send(resolution).is_err() {
            warn!(elicitation_id = id, "elicitation waiter already gone");
            return false;
        }
        true
    }

    fn remove(&self, id: &str) -> Option<PendingElicitation> {
        self.lock().remove(id)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<ElicitationId, PendingElicitation>> {
        // Poisoning leaves the map intact.
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Suspension point for one registered elicitation.
///
/// Dropping an un-awaited handle deregisters its entry.
pub struct WaitHandle {
    id: ElicitationId,
    receiver: oneshot::Receiver<Resolution>,
    registry: ElicitationRegistry,
}

impl WaitHandle {
    pub fn id(&self) -> &ElicitationId {
        &self.id
    }

    /// Wait up to `timeout` for a resolution.
    ///
    /// On expiry the entry removes itself, unless a resolution won the race
    /// for it, in which case that resolution is returned.
    pub async fn wait(mut self, timeout: Duration) -> ElicitationOutcome {
        match tokio::time::timeout(timeout, &mut self.receiver).await {
            Ok(Ok(resolution)) => resolution.into_outcome(),
            Ok(Err(_)) => ElicitationOutcome::Cancelled,
            Err(_) => {
                let outcome = self.expire();
                if outcome == ElicitationOutcome::TimedOut {
                    warn!(elicitation_id = %self.id, ?timeout, "elicitation timed out");
                }
                outcome
            }
        }
    }

    /// Settle a wait whose deadline passed.
    ///
    /// If a resolver already took the entry, the receiver is closed before
    /// reading so a send still in flight fails instead of reporting success.
    fn expire(&mut self) -> ElicitationOutcome {
        if self.registry.remove(self.id.as_str()).is_some() {
            return ElicitationOutcome::TimedOut;
        }
        self.receiver.close();
        match self.receiver.try_recv() {
            Ok(resolution) => resolution.into_outcome(),
            Err(_) => ElicitationOutcome::Cancelled,
        }
    }
}

impl Drop for WaitHandle {
    fn drop(&mut self) {
        self.registry.remove(self.id.as_str());
    }
}

impl Resolution {
    fn into_outcome(self) -> ElicitationOutcome {
        match self {
            Self::Answered(payload) => ElicitationOutcome::Answered(payload),
            Self::Cancelled => ElicitationOutcome::Cancelled,
        }
    }
}
