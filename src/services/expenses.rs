use crate::{
    db::DbPool,
    entities::expense::{self, Entity as ExpenseEntity, Model as ExpenseModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewExpense {
    pub description: String,
    pub amount: Decimal,
    pub expense_date: Option<chrono::DateTime<Utc>>,
}

/// Service for operating expenses.
#[derive(Clone)]
pub struct ExpenseService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ExpenseService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn create_expense(&self, input: NewExpense) -> Result<ExpenseModel, ServiceError> {
        Self::check_amount(input.amount)?;

        let db = &*self.db_pool;
        let now = Utc::now();
        let expense_id = Uuid::new_v4();

        let expense_active_model = expense::ActiveModel {
            id: Set(expense_id),
            description: Set(input.description),
            amount: Set(input.amount),
            expense_date: Set(input.expense_date.unwrap_or(now)),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let expense_model = expense_active_model.insert(db).await.map_err(|e| {
            error!(error = %e, expense_id = %expense_id, "Failed to create expense");
            ServiceError::DatabaseError(e)
        })?;

        info!(expense_id = %expense_id, amount = %expense_model.amount, "Expense created");
        self.event_sender
            .send_or_log(Event::ExpenseCreated(expense_id))
            .await;

        Ok(expense_model)
    }

    #[instrument(skip(self), fields(expense_id = %expense_id))]
    pub async fn get_expense(&self, expense_id: Uuid) -> Result<ExpenseModel, ServiceError> {
        let db = &*self.db_pool;

        ExpenseEntity::find_by_id(expense_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, expense_id = %expense_id, "Failed to fetch expense");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Expense {} not found", expense_id)))
    }

    /// Lists expenses, most recent first. Returns the page plus the total
    /// row count.
    #[instrument(skip(self))]
    pub async fn list_expenses(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ExpenseModel>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = ExpenseEntity::find()
            .order_by_desc(expense::Column::ExpenseDate)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count expenses");
            ServiceError::DatabaseError(e)
        })?;

        let expenses = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, page = page, per_page = per_page, "Failed to fetch expenses page");
                ServiceError::DatabaseError(e)
            })?;

        Ok((expenses, total))
    }

    #[instrument(skip(self, input), fields(expense_id = %expense_id))]
    pub async fn update_expense(
        &self,
        expense_id: Uuid,
        input: NewExpense,
    ) -> Result<ExpenseModel, ServiceError> {
        Self::check_amount(input.amount)?;

        let db = &*self.db_pool;

        let expense = ExpenseEntity::find_by_id(expense_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, expense_id = %expense_id, "Failed to fetch expense for update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(expense_id = %expense_id, "Expense not found for update");
                ServiceError::NotFound(format!("Expense {} not found", expense_id))
            })?;

        let expense_date = input.expense_date.unwrap_or(expense.expense_date);

        let mut expense_active_model: expense::ActiveModel = expense.into();
        expense_active_model.description = Set(input.description);
        expense_active_model.amount = Set(input.amount);
        expense_active_model.expense_date = Set(expense_date);
        expense_active_model.updated_at = Set(Some(Utc::now()));

        let expense_model = expense_active_model.update(db).await.map_err(|e| {
            error!(error = %e, expense_id = %expense_id, "Failed to update expense");
            ServiceError::DatabaseError(e)
        })?;

        info!(expense_id = %expense_id, "Expense updated");
        self.event_sender
            .send_or_log(Event::ExpenseUpdated(expense_id))
            .await;

        Ok(expense_model)
    }

    #[instrument(skip(self), fields(expense_id = %expense_id))]
    pub async fn delete_expense(&self, expense_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let result = ExpenseEntity::delete_by_id(expense_id)
            .exec(db)
            .await
            .map_err(|e| {
                error!(error = %e, expense_id = %expense_id, "Failed to delete expense");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Expense {} not found",
                expense_id
            )));
        }

        info!(expense_id = %expense_id, "Expense deleted");
        self.event_sender
            .send_or_log(Event::ExpenseDeleted(expense_id))
            .await;

        Ok(())
    }

    fn check_amount(amount: Decimal) -> Result<(), ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "amount must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
