pub mod approvals;
pub mod notifications;
pub mod purchase_orders;
pub mod receipts;
pub mod reconciliation;
pub mod requests;
pub mod storage;

pub use approvals::ApprovalService;
pub use purchase_orders::PurchaseOrderService;
pub use receipts::ReceiptService;
pub use requests::PurchaseRequestService;
