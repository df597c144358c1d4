use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::extraction::DocumentExtractor;
use crate::services::notifications::{HttpNotifier, NoopNotifier, Notifier};
use crate::services::storage::{FileStore, LocalFileStore};
use crate::services::{
    ApprovalService, PurchaseOrderService, PurchaseRequestService, ReceiptService,
};

pub mod approvals;
pub mod common;
pub mod files;
pub mod receipts;
pub mod requests;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub requests: Arc<PurchaseRequestService>,
    pub approvals: Arc<ApprovalService>,
    pub purchase_orders: Arc<PurchaseOrderService>,
    pub receipts: Arc<ReceiptService>,
    pub file_store: Arc<dyn FileStore>,
}

impl AppServices {
    /// Wires the services from explicit components. Tests inject the
    /// in-memory store and the no-op notifier here.
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
        file_store: Arc<dyn FileStore>,
        notifier: Arc<dyn Notifier>,
        extractor: DocumentExtractor,
    ) -> Self {
        let purchase_orders = Arc::new(PurchaseOrderService::new(
            db_pool.clone(),
            file_store.clone(),
            extractor.clone(),
            event_sender.clone(),
            notifier.clone(),
        ));
        let requests = Arc::new(PurchaseRequestService::new(
            db_pool.clone(),
            file_store.clone(),
            extractor.clone(),
            event_sender.clone(),
            notifier.clone(),
        ));
        let approvals = Arc::new(ApprovalService::new(
            db_pool.clone(),
            event_sender.clone(),
            notifier.clone(),
            purchase_orders.clone(),
        ));
        let receipts = Arc::new(ReceiptService::new(
            db_pool,
            file_store.clone(),
            extractor,
            event_sender,
            notifier,
        ));

        Self {
            requests,
            approvals,
            purchase_orders,
            receipts,
            file_store,
        }
    }

    /// Builds the production wiring from configuration.
    pub fn from_config(
        config: &AppConfig,
        db_pool: Arc<DbPool>,
        event_sender: EventSender,
    ) -> Result<Self, ServiceError> {
        let file_store: Arc<dyn FileStore> =
            Arc::new(LocalFileStore::new(config.storage_root.clone()));
        let notifier: Arc<dyn Notifier> = if config.notifier.enabled {
            Arc::new(HttpNotifier::new(&config.notifier)?)
        } else {
            Arc::new(NoopNotifier)
        };
        let extractor = DocumentExtractor::new(&config.ai_extraction);

        Ok(Self::new(
            db_pool,
            event_sender,
            file_store,
            notifier,
            extractor,
        ))
    }
}
