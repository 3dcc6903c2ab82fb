use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging a warning instead of failing the caller
    /// when the channel is closed or full
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Failed to publish event");
        }
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Catalog events
    CategoryCreated(Uuid),
    CategoryUpdated(Uuid),
    CategoryDeleted(Uuid),
    SupplierCreated(Uuid),
    SupplierUpdated(Uuid),
    SupplierDeleted(Uuid),
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeleted(Uuid),

    // Purchase events
    PurchaseCreated(Uuid),
    PurchaseDeleted(Uuid),
    PurchaseLineAdded {
        purchase_id: Uuid,
        line_id: Uuid,
    },
    PurchaseLineUpdated {
        purchase_id: Uuid,
        line_id: Uuid,
    },
    PurchaseLineRemoved {
        purchase_id: Uuid,
        line_id: Uuid,
    },

    // Sale events
    SaleCreated(Uuid),
    SaleDeleted(Uuid),
    SaleLineAdded {
        sale_id: Uuid,
        line_id: Uuid,
    },
    SaleLineUpdated {
        sale_id: Uuid,
        line_id: Uuid,
    },
    SaleLineRemoved {
        sale_id: Uuid,
        line_id: Uuid,
    },

    // Expense events
    ExpenseCreated(Uuid),
    ExpenseUpdated(Uuid),
    ExpenseDeleted(Uuid),
}

/// Consumes events from the channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::PurchaseLineAdded {
                purchase_id,
                line_id,
            } => {
                info!(
                    "Purchase line added: purchase={}, line={}",
                    purchase_id, line_id
                );
            }
            Event::PurchaseLineUpdated {
                purchase_id,
                line_id,
            } => {
                info!(
                    "Purchase line updated: purchase={}, line={}",
                    purchase_id, line_id
                );
            }
            Event::PurchaseLineRemoved {
                purchase_id,
                line_id,
            } => {
                info!(
                    "Purchase line removed: purchase={}, line={}",
                    purchase_id, line_id
                );
            }
            Event::SaleLineAdded { sale_id, line_id } => {
                info!("Sale line added: sale={}, line={}", sale_id, line_id);
            }
            Event::SaleLineUpdated { sale_id, line_id } => {
                info!("Sale line updated: sale={}, line={}", sale_id, line_id);
            }
            Event::SaleLineRemoved { sale_id, line_id } => {
                info!("Sale line removed: sale={}, line={}", sale_id, line_id);
            }
            // Add more event handlers as needed
            _ => {
                info!("No specific handler for event: {:?}", event);
            }
        }
    }

    warn!("Event processing loop has ended");
}
