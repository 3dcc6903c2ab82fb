pub mod categories;
pub mod common;
pub mod expenses;
pub mod products;
pub mod purchases;
pub mod reports;
pub mod sales;
pub mod suppliers;

use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub categories: Arc<crate::services::categories::CategoryService>,
    pub suppliers: Arc<crate::services::suppliers::SupplierService>,
    pub products: Arc<crate::services::products::ProductService>,
    pub purchases: Arc<crate::services::purchases::PurchaseService>,
    pub sales: Arc<crate::services::sales::SaleService>,
    pub expenses: Arc<crate::services::expenses::ExpenseService>,
    pub reports: Arc<crate::services::reports::ReportService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        let categories = Arc::new(crate::services::categories::CategoryService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let suppliers = Arc::new(crate::services::suppliers::SupplierService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let products = Arc::new(crate::services::products::ProductService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let purchases = Arc::new(crate::services::purchases::PurchaseService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let sales = Arc::new(crate::services::sales::SaleService::new(
            db_pool.clone(),
            event_sender.clone(),
        ));
        let expenses = Arc::new(crate::services::expenses::ExpenseService::new(
            db_pool.clone(),
            event_sender,
        ));
        let reports = Arc::new(crate::services::reports::ReportService::new(db_pool));

        Self {
            categories,
            suppliers,
            products,
            purchases,
            sales,
            expenses,
            reports,
        }
    }
}
