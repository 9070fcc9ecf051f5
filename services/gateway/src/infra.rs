use admission_desk::workflows::admissions::{
    DeliveryError, NotificationDispatcher, OutboundMessage, ParticipantId,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::debug;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) outbox: Arc<OutboxDispatcher>,
}

/// Queue of rendered messages waiting for the chat transport to pick them up.
///
/// Only participants that have contacted the gateway can be messaged, matching
/// chat platforms that refuse to open a conversation with a stranger.
#[derive(Debug)]
pub(crate) struct OutboxDispatcher {
    capacity: usize,
    contacts: Mutex<HashSet<ParticipantId>>,
    pending: Mutex<VecDeque<OutboundMessage>>,
}

impl OutboxDispatcher {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            contacts: Mutex::new(HashSet::new()),
            pending: Mutex::new(VecDeque::new()),
        }
    }

    pub(crate) fn register_contact(&self, participant: ParticipantId) {
        self.contacts
            .lock()
            .expect("outbox contacts mutex poisoned")
            .insert(participant);
    }

    /// Remove and return every queued message in delivery order.
    pub(crate) fn drain(&self) -> Vec<OutboundMessage> {
        self.pending
            .lock()
            .expect("outbox queue mutex poisoned")
            .drain(..)
            .collect()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.lock().expect("outbox queue mutex poisoned").len()
    }
}

impl NotificationDispatcher for OutboxDispatcher {
    fn send(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        let known = self
            .contacts
            .lock()
            .map_err(|_| failed(message, "outbox contacts unavailable"))?
            .contains(&message.recipient);
        if !known {
            return Err(failed(message, "recipient has not started a conversation"));
        }

        let mut pending = self
            .pending
            .lock()
            .map_err(|_| failed(message, "outbox queue unavailable"))?;
        if pending.len() >= self.capacity {
            return Err(failed(message, "outbox is full"));
        }
        pending.push_back(message.clone());
        debug!(recipient = %message.recipient, queued = pending.len(), "message queued");
        Ok(())
    }

    fn observe_sender(&self, participant: &ParticipantId) {
        self.register_contact(participant.clone());
    }
}

fn failed(message: &OutboundMessage, reason: &str) -> DeliveryError {
    DeliveryError::Failed {
        recipient: message.recipient.clone(),
        reason: reason.to_string(),
    }
}
