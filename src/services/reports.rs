use crate::{
    db::DbPool,
    entities::expense::{self, Entity as ExpenseEntity},
    entities::purchase::{self, Entity as PurchaseEntity},
    entities::sale::{self, Entity as SaleEntity},
    errors::ServiceError,
    money::round_currency,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Select};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, instrument};

/// Spend, revenue, and profit over a date range.
#[derive(Debug, Serialize)]
pub struct SummaryReport {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub purchase_total: Decimal,
    pub sale_total: Decimal,
    pub expense_total: Decimal,
    pub profit: Decimal,
}

/// Service for financial summaries.
///
/// Reads the denormalized purchase and sale totals rather than re-summing
/// line items; the line services keep those totals transactionally
/// consistent.
#[derive(Clone)]
pub struct ReportService {
    db_pool: Arc<DbPool>,
}

impl ReportService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Computes purchase, sale, and expense totals over `[start, end)` and
    /// the resulting profit. Either bound may be omitted.
    #[instrument(skip(self))]
    pub async fn summary(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<SummaryReport, ServiceError> {
        let db = &*self.db_pool;

        let purchases = Self::bounded(PurchaseEntity::find(), purchase::Column::PurchaseDate, start, end)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch purchases for summary report");
                ServiceError::DatabaseError(e)
            })?;
        let purchase_total = round_currency(
            purchases
                .iter()
                .fold(Decimal::ZERO, |acc, p| acc + p.total),
        );

        let sales = Self::bounded(SaleEntity::find(), sale::Column::SaleDate, start, end)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch sales for summary report");
                ServiceError::DatabaseError(e)
            })?;
        let sale_total = round_currency(sales.iter().fold(Decimal::ZERO, |acc, s| acc + s.total));

        let expenses = Self::bounded(ExpenseEntity::find(), expense::Column::ExpenseDate, start, end)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch expenses for summary report");
                ServiceError::DatabaseError(e)
            })?;
        let expense_total = round_currency(
            expenses
                .iter()
                .fold(Decimal::ZERO, |acc, x| acc + x.amount),
        );

        let profit = round_currency(sale_total - purchase_total - expense_total);

        Ok(SummaryReport {
            start_date: start,
            end_date: end,
            purchase_total,
            sale_total,
            expense_total,
            profit,
        })
    }

    fn bounded<E: EntityTrait>(
        query: Select<E>,
        date_column: impl ColumnTrait,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Select<E> {
        let mut query = query;
        if let Some(start) = start {
            query = query.filter(date_column.gte(start));
        }
        if let Some(end) = end {
            query = query.filter(date_column.lt(end));
        }
        query
    }
}
