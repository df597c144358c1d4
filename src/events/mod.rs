use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

/// Domain events emitted by the services. Consumed by a logging task;
/// a future consumer could fan these out to a message bus.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    RequestCreated {
        request_id: Uuid,
        created_by: Uuid,
    },
    RequestUpdated {
        request_id: Uuid,
    },
    LevelApproved {
        request_id: Uuid,
        level: i16,
        approver: Uuid,
    },
    RequestRejected {
        request_id: Uuid,
        level: i16,
        approver: Uuid,
    },
    RequestApproved {
        request_id: Uuid,
    },
    PurchaseOrderCreated {
        request_id: Uuid,
        purchase_order_id: Uuid,
        po_number: String,
    },
    ReceiptValidated {
        request_id: Uuid,
        receipt_id: Uuid,
        validated: bool,
        discrepancy_count: usize,
    },
}

/// Cloneable handle for emitting events.
#[derive(Clone, Debug)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.tx.send(event).await
    }

    /// Sends an event, logging instead of failing when the consumer is gone.
    /// Event delivery is never allowed to fail a request.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.tx.send(event).await {
            error!("failed to emit event: {}", e);
        }
    }
}

/// Drains the event channel, logging each event. Runs for the lifetime
/// of the server.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(json) => info!(event = %json, "domain event"),
            Err(e) => error!("failed to serialize event: {}", e),
        }
    }
    info!("event channel closed");
}
