use crate::{
    db::DbPool,
    entities::product::Entity as ProductEntity,
    entities::sale::{self, Entity as SaleEntity, Model as SaleModel},
    entities::sale_line::{self, Entity as SaleLineEntity, Model as SaleLineModel},
    errors::ServiceError,
    events::{Event, EventSender},
    money::line_subtotal,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Input for creating a sale header. Lines are added afterward and the
/// total starts at 0.00.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub customer_name: Option<String>,
    pub sale_date: Option<chrono::DateTime<Utc>>,
}

/// Line payload shared by create and update. Numeric rules are enforced by
/// the subtotal calculator after the parent and product ids resolve, so an
/// unknown id reports NotFound rather than a validation failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLineItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// A sale header together with its line items.
#[derive(Debug, Serialize)]
pub struct SaleWithLines {
    #[serde(flatten)]
    pub sale: SaleModel,
    pub lines: Vec<SaleLineModel>,
}

/// Service for sales and their line items. Mirror of the purchase service:
/// line mutations and the matching `total` adjustment share one
/// transaction, and the adjustment is an in-place SQL increment.
#[derive(Clone)]
pub struct SaleService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SaleService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a sale header with an empty total.
    #[instrument(skip(self, input))]
    pub async fn create_sale(&self, input: NewSale) -> Result<SaleModel, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();
        let sale_id = Uuid::new_v4();

        let sale_active_model = sale::ActiveModel {
            id: Set(sale_id),
            customer_name: Set(input.customer_name),
            sale_date: Set(input.sale_date.unwrap_or(now)),
            total: Set(Decimal::new(0, 2)),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let sale_model = sale_active_model.insert(db).await.map_err(|e| {
            error!(error = %e, sale_id = %sale_id, "Failed to create sale");
            ServiceError::DatabaseError(e)
        })?;

        info!(sale_id = %sale_id, "Sale created");
        self.event_sender
            .send_or_log(Event::SaleCreated(sale_id))
            .await;

        Ok(sale_model)
    }

    /// Retrieves a sale together with its lines.
    #[instrument(skip(self), fields(sale_id = %sale_id))]
    pub async fn get_sale(&self, sale_id: Uuid) -> Result<SaleWithLines, ServiceError> {
        let db = &*self.db_pool;

        let sale = SaleEntity::find_by_id(sale_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, sale_id = %sale_id, "Failed to fetch sale");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", sale_id)))?;

        let lines = SaleLineEntity::find()
            .filter(sale_line::Column::SaleId.eq(sale_id))
            .order_by_asc(sale_line::Column::CreatedAt)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, sale_id = %sale_id, "Failed to fetch sale lines");
                ServiceError::DatabaseError(e)
            })?;

        Ok(SaleWithLines { sale, lines })
    }

    /// Lists sale headers, newest first. Returns the page plus the total row
    /// count.
    #[instrument(skip(self))]
    pub async fn list_sales(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<SaleModel>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = SaleEntity::find()
            .order_by_desc(sale::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count sales");
            ServiceError::DatabaseError(e)
        })?;

        let sales = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, page = page, per_page = per_page, "Failed to fetch sales page");
                ServiceError::DatabaseError(e)
            })?;

        Ok((sales, total))
    }

    /// Lists the line items of one sale, oldest first.
    #[instrument(skip(self), fields(sale_id = %sale_id))]
    pub async fn list_line_items(
        &self,
        sale_id: Uuid,
    ) -> Result<Vec<SaleLineModel>, ServiceError> {
        let db = &*self.db_pool;

        let exists = SaleEntity::find_by_id(sale_id).one(db).await.map_err(|e| {
            error!(error = %e, sale_id = %sale_id, "Failed to fetch sale");
            ServiceError::DatabaseError(e)
        })?;
        if exists.is_none() {
            return Err(ServiceError::NotFound(format!("Sale {} not found", sale_id)));
        }

        SaleLineEntity::find()
            .filter(sale_line::Column::SaleId.eq(sale_id))
            .order_by_asc(sale_line::Column::CreatedAt)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, sale_id = %sale_id, "Failed to fetch sale lines");
                ServiceError::DatabaseError(e)
            })
    }

    /// Deletes a sale header. Refused while line items still reference it.
    #[instrument(skip(self), fields(sale_id = %sale_id))]
    pub async fn delete_sale(&self, sale_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, sale_id = %sale_id, "Failed to start transaction for sale deletion");
            ServiceError::DatabaseError(e)
        })?;

        let sale = SaleEntity::find_by_id(sale_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, sale_id = %sale_id, "Failed to fetch sale for deletion");
                ServiceError::DatabaseError(e)
            })?;
        if sale.is_none() {
            return Err(ServiceError::NotFound(format!("Sale {} not found", sale_id)));
        }

        let line_count = SaleLineEntity::find()
            .filter(sale_line::Column::SaleId.eq(sale_id))
            .count(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, sale_id = %sale_id, "Failed to count sale lines");
                ServiceError::DatabaseError(e)
            })?;
        if line_count > 0 {
            warn!(sale_id = %sale_id, line_count = line_count, "Refusing to delete sale with lines");
            return Err(ServiceError::Conflict(format!(
                "Sale {} still has {} line item(s)",
                sale_id, line_count
            )));
        }

        SaleEntity::delete_by_id(sale_id)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, sale_id = %sale_id, "Failed to delete sale");
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, sale_id = %sale_id, "Failed to commit sale deletion");
            ServiceError::DatabaseError(e)
        })?;

        info!(sale_id = %sale_id, "Sale deleted");
        self.event_sender
            .send_or_log(Event::SaleDeleted(sale_id))
            .await;

        Ok(())
    }

    /// Adds a line item to a sale and increments the sale total by the
    /// line's subtotal in the same transaction.
    #[instrument(skip(self, input), fields(sale_id = %sale_id, product_id = %input.product_id))]
    pub async fn add_line_item(
        &self,
        sale_id: Uuid,
        input: NewLineItem,
    ) -> Result<SaleLineModel, ServiceError> {
        let db = &*self.db_pool;
        let line_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, sale_id = %sale_id, "Failed to start transaction for line creation");
            ServiceError::DatabaseError(e)
        })?;

        let sale = SaleEntity::find_by_id(sale_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, sale_id = %sale_id, "Failed to fetch sale for line creation");
                ServiceError::DatabaseError(e)
            })?;
        if sale.is_none() {
            warn!(sale_id = %sale_id, "Sale not found for line creation");
            return Err(ServiceError::NotFound(format!("Sale {} not found", sale_id)));
        }

        let product = ProductEntity::find_by_id(input.product_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %input.product_id, "Failed to fetch product for line creation");
                ServiceError::DatabaseError(e)
            })?;
        if product.is_none() {
            warn!(product_id = %input.product_id, "Product not found for line creation");
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                input.product_id
            )));
        }

        let subtotal = line_subtotal(input.quantity, input.unit_price)?;

        let line_active_model = sale_line::ActiveModel {
            id: Set(line_id),
            sale_id: Set(sale_id),
            product_id: Set(input.product_id),
            quantity: Set(input.quantity),
            unit_price: Set(input.unit_price),
            subtotal: Set(subtotal),
            ..Default::default()
        };

        let line_model = line_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to insert sale line");
            ServiceError::DatabaseError(e)
        })?;

        self.apply_total_delta(&txn, sale_id, subtotal).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to commit sale line creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(sale_id = %sale_id, line_id = %line_id, subtotal = %subtotal, "Sale line added");
        self.event_sender
            .send_or_log(Event::SaleLineAdded { sale_id, line_id })
            .await;

        Ok(line_model)
    }

    /// Replaces a line item and adjusts the sale total by the subtotal
    /// delta, not by re-adding the new subtotal.
    #[instrument(skip(self, input), fields(line_id = %line_id))]
    pub async fn update_line_item(
        &self,
        line_id: Uuid,
        input: NewLineItem,
    ) -> Result<SaleLineModel, ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to start transaction for line update");
            ServiceError::DatabaseError(e)
        })?;

        let line = SaleLineEntity::find_by_id(line_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, line_id = %line_id, "Failed to fetch sale line for update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(line_id = %line_id, "Sale line not found for update");
                ServiceError::NotFound(format!("Sale line {} not found", line_id))
            })?;

        let product = ProductEntity::find_by_id(input.product_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %input.product_id, "Failed to fetch product for line update");
                ServiceError::DatabaseError(e)
            })?;
        if product.is_none() {
            warn!(product_id = %input.product_id, "Product not found for line update");
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                input.product_id
            )));
        }

        let new_subtotal = line_subtotal(input.quantity, input.unit_price)?;
        let old_subtotal = line.subtotal;
        let sale_id = line.sale_id;

        let mut line_active_model: sale_line::ActiveModel = line.into();
        line_active_model.product_id = Set(input.product_id);
        line_active_model.quantity = Set(input.quantity);
        line_active_model.unit_price = Set(input.unit_price);
        line_active_model.subtotal = Set(new_subtotal);
        line_active_model.updated_at = Set(Some(Utc::now()));

        let line_model = line_active_model.update(&txn).await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to update sale line");
            ServiceError::DatabaseError(e)
        })?;

        self.apply_total_delta(&txn, sale_id, new_subtotal - old_subtotal)
            .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to commit sale line update");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            sale_id = %sale_id,
            line_id = %line_id,
            old_subtotal = %old_subtotal,
            new_subtotal = %new_subtotal,
            "Sale line updated"
        );
        self.event_sender
            .send_or_log(Event::SaleLineUpdated { sale_id, line_id })
            .await;

        Ok(line_model)
    }

    /// Removes a line item, decrementing the sale total by the line's stored
    /// subtotal in the same transaction.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn remove_line_item(&self, line_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to start transaction for line removal");
            ServiceError::DatabaseError(e)
        })?;

        let line = SaleLineEntity::find_by_id(line_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, line_id = %line_id, "Failed to fetch sale line for removal");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(line_id = %line_id, "Sale line not found for removal");
                ServiceError::NotFound(format!("Sale line {} not found", line_id))
            })?;

        let sale_id = line.sale_id;
        let subtotal = line.subtotal;

        self.apply_total_delta(&txn, sale_id, -subtotal).await?;

        SaleLineEntity::delete_by_id(line_id)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, line_id = %line_id, "Failed to delete sale line");
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to commit sale line removal");
            ServiceError::DatabaseError(e)
        })?;

        info!(sale_id = %sale_id, line_id = %line_id, subtotal = %subtotal, "Sale line removed");
        self.event_sender
            .send_or_log(Event::SaleLineRemoved { sale_id, line_id })
            .await;

        Ok(())
    }

    /// Applies `delta` to the sale total in place
    /// (`SET total = total + delta`). Must run inside the same transaction
    /// as the line mutation it accounts for.
    async fn apply_total_delta(
        &self,
        txn: &DatabaseTransaction,
        sale_id: Uuid,
        delta: Decimal,
    ) -> Result<(), ServiceError> {
        let result = SaleEntity::update_many()
            .col_expr(
                sale::Column::Total,
                Expr::col(sale::Column::Total).add(delta),
            )
            .col_expr(sale::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(sale::Column::Id.eq(sale_id))
            .exec(txn)
            .await
            .map_err(|e| {
                error!(error = %e, sale_id = %sale_id, "Failed to adjust sale total");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            warn!(sale_id = %sale_id, "Sale vanished while adjusting total");
            return Err(ServiceError::NotFound(format!("Sale {} not found", sale_id)));
        }

        Ok(())
    }
}
