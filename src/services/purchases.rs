use crate::{
    db::DbPool,
    entities::product::Entity as ProductEntity,
    entities::purchase::{self, Entity as PurchaseEntity, Model as PurchaseModel},
    entities::purchase_line::{self, Entity as PurchaseLineEntity, Model as PurchaseLineModel},
    entities::supplier::Entity as SupplierEntity,
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

/// Input for creating a purchase header. Lines are added afterward and the
/// total starts at 0.00.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchase {
    pub supplier_id: Uuid,
    pub purchase_date: Option<chrono::DateTime<Utc>>,
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

/// A purchase header together with its line items.
#[derive(Debug, Serialize)]
pub struct PurchaseWithLines {
    #[serde(flatten)]
    pub purchase: PurchaseModel,
    pub lines: Vec<PurchaseLineModel>,
}

/// Service for purchases and their line items.
///
/// Every line mutation runs in one transaction with the adjustment of the
/// parent's `total`, and the adjustment is an in-place SQL increment rather
/// than a read-modify-write, so the invariant
/// `total == sum(line.subtotal)` holds under concurrent writers.
#[derive(Clone)]
pub struct PurchaseService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl PurchaseService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a purchase header with an empty total.
    #[instrument(skip(self, input), fields(supplier_id = %input.supplier_id))]
    pub async fn create_purchase(&self, input: NewPurchase) -> Result<PurchaseModel, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();
        let purchase_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for purchase creation");
            ServiceError::DatabaseError(e)
        })?;

        let supplier = SupplierEntity::find_by_id(input.supplier_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, supplier_id = %input.supplier_id, "Failed to fetch supplier");
                ServiceError::DatabaseError(e)
            })?;
        if supplier.is_none() {
            warn!(supplier_id = %input.supplier_id, "Supplier not found for purchase creation");
            return Err(ServiceError::NotFound(format!(
                "Supplier {} not found",
                input.supplier_id
            )));
        }

        let purchase_active_model = purchase::ActiveModel {
            id: Set(purchase_id),
            supplier_id: Set(input.supplier_id),
            purchase_date: Set(input.purchase_date.unwrap_or(now)),
            total: Set(Decimal::new(0, 2)),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let purchase_model = purchase_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to create purchase");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to commit purchase creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(purchase_id = %purchase_id, supplier_id = %input.supplier_id, "Purchase created");
        self.event_sender
            .send_or_log(Event::PurchaseCreated(purchase_id))
            .await;

        Ok(purchase_model)
    }

    /// Retrieves a purchase together with its lines.
    #[instrument(skip(self), fields(purchase_id = %purchase_id))]
    pub async fn get_purchase(&self, purchase_id: Uuid) -> Result<PurchaseWithLines, ServiceError> {
        let db = &*self.db_pool;

        let purchase = PurchaseEntity::find_by_id(purchase_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, purchase_id = %purchase_id, "Failed to fetch purchase");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Purchase {} not found", purchase_id))
            })?;

        let lines = PurchaseLineEntity::find()
            .filter(purchase_line::Column::PurchaseId.eq(purchase_id))
            .order_by_asc(purchase_line::Column::CreatedAt)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, purchase_id = %purchase_id, "Failed to fetch purchase lines");
                ServiceError::DatabaseError(e)
            })?;

        Ok(PurchaseWithLines { purchase, lines })
    }

    /// Lists purchase headers, newest first. Returns the page plus the total
    /// row count.
    #[instrument(skip(self))]
    pub async fn list_purchases(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<PurchaseModel>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = PurchaseEntity::find()
            .order_by_desc(purchase::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count purchases");
            ServiceError::DatabaseError(e)
        })?;

        let purchases = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, page = page, per_page = per_page, "Failed to fetch purchases page");
                ServiceError::DatabaseError(e)
            })?;

        Ok((purchases, total))
    }

    /// Lists the line items of one purchase, oldest first.
    #[instrument(skip(self), fields(purchase_id = %purchase_id))]
    pub async fn list_line_items(
        &self,
        purchase_id: Uuid,
    ) -> Result<Vec<PurchaseLineModel>, ServiceError> {
        let db = &*self.db_pool;

        let exists = PurchaseEntity::find_by_id(purchase_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, purchase_id = %purchase_id, "Failed to fetch purchase");
                ServiceError::DatabaseError(e)
            })?;
        if exists.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Purchase {} not found",
                purchase_id
            )));
        }

        PurchaseLineEntity::find()
            .filter(purchase_line::Column::PurchaseId.eq(purchase_id))
            .order_by_asc(purchase_line::Column::CreatedAt)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, purchase_id = %purchase_id, "Failed to fetch purchase lines");
                ServiceError::DatabaseError(e)
            })
    }

    /// Deletes a purchase header. Refused while line items still reference
    /// it.
    #[instrument(skip(self), fields(purchase_id = %purchase_id))]
    pub async fn delete_purchase(&self, purchase_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to start transaction for purchase deletion");
            ServiceError::DatabaseError(e)
        })?;

        let purchase = PurchaseEntity::find_by_id(purchase_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, purchase_id = %purchase_id, "Failed to fetch purchase for deletion");
                ServiceError::DatabaseError(e)
            })?;
        if purchase.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Purchase {} not found",
                purchase_id
            )));
        }

        let line_count = PurchaseLineEntity::find()
            .filter(purchase_line::Column::PurchaseId.eq(purchase_id))
            .count(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, purchase_id = %purchase_id, "Failed to count purchase lines");
                ServiceError::DatabaseError(e)
            })?;
        if line_count > 0 {
            warn!(purchase_id = %purchase_id, line_count = line_count, "Refusing to delete purchase with lines");
            return Err(ServiceError::Conflict(format!(
                "Purchase {} still has {} line item(s)",
                purchase_id, line_count
            )));
        }

        PurchaseEntity::delete_by_id(purchase_id)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, purchase_id = %purchase_id, "Failed to delete purchase");
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to commit purchase deletion");
            ServiceError::DatabaseError(e)
        })?;

        info!(purchase_id = %purchase_id, "Purchase deleted");
        self.event_sender
            .send_or_log(Event::PurchaseDeleted(purchase_id))
            .await;

        Ok(())
    }

    /// Adds a line item to a purchase and increments the purchase total by
    /// the line's subtotal in the same transaction.
    #[instrument(skip(self, input), fields(purchase_id = %purchase_id, product_id = %input.product_id))]
    pub async fn add_line_item(
        &self,
        purchase_id: Uuid,
        input: NewLineItem,
    ) -> Result<PurchaseLineModel, ServiceError> {
        let db = &*self.db_pool;
        let line_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, purchase_id = %purchase_id, "Failed to start transaction for line creation");
            ServiceError::DatabaseError(e)
        })?;

        let purchase = PurchaseEntity::find_by_id(purchase_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, purchase_id = %purchase_id, "Failed to fetch purchase for line creation");
                ServiceError::DatabaseError(e)
            })?;
        if purchase.is_none() {
            warn!(purchase_id = %purchase_id, "Purchase not found for line creation");
            return Err(ServiceError::NotFound(format!(
                "Purchase {} not found",
                purchase_id
            )));
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

        let line_active_model = purchase_line::ActiveModel {
            id: Set(line_id),
            purchase_id: Set(purchase_id),
            product_id: Set(input.product_id),
            quantity: Set(input.quantity),
            unit_price: Set(input.unit_price),
            subtotal: Set(subtotal),
            ..Default::default()
        };

        let line_model = line_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to insert purchase line");
            ServiceError::DatabaseError(e)
        })?;

        self.apply_total_delta(&txn, purchase_id, subtotal).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to commit purchase line creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(purchase_id = %purchase_id, line_id = %line_id, subtotal = %subtotal, "Purchase line added");
        self.event_sender
            .send_or_log(Event::PurchaseLineAdded {
                purchase_id,
                line_id,
            })
            .await;

        Ok(line_model)
    }

    /// Replaces a line item and adjusts the purchase total by the subtotal
    /// delta, not by re-adding the new subtotal.
    #[instrument(skip(self, input), fields(line_id = %line_id))]
    pub async fn update_line_item(
        &self,
        line_id: Uuid,
        input: NewLineItem,
    ) -> Result<PurchaseLineModel, ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to start transaction for line update");
            ServiceError::DatabaseError(e)
        })?;

        let line = PurchaseLineEntity::find_by_id(line_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, line_id = %line_id, "Failed to fetch purchase line for update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(line_id = %line_id, "Purchase line not found for update");
                ServiceError::NotFound(format!("Purchase line {} not found", line_id))
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
        let purchase_id = line.purchase_id;

        let mut line_active_model: purchase_line::ActiveModel = line.into();
        line_active_model.product_id = Set(input.product_id);
        line_active_model.quantity = Set(input.quantity);
        line_active_model.unit_price = Set(input.unit_price);
        line_active_model.subtotal = Set(new_subtotal);
        line_active_model.updated_at = Set(Some(Utc::now()));

        let line_model = line_active_model.update(&txn).await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to update purchase line");
            ServiceError::DatabaseError(e)
        })?;

        self.apply_total_delta(&txn, purchase_id, new_subtotal - old_subtotal)
            .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to commit purchase line update");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            purchase_id = %purchase_id,
            line_id = %line_id,
            old_subtotal = %old_subtotal,
            new_subtotal = %new_subtotal,
            "Purchase line updated"
        );
        self.event_sender
            .send_or_log(Event::PurchaseLineUpdated {
                purchase_id,
                line_id,
            })
            .await;

        Ok(line_model)
    }

    /// Removes a line item, decrementing the purchase total by the line's
    /// stored subtotal in the same transaction.
    #[instrument(skip(self), fields(line_id = %line_id))]
    pub async fn remove_line_item(&self, line_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to start transaction for line removal");
            ServiceError::DatabaseError(e)
        })?;

        let line = PurchaseLineEntity::find_by_id(line_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, line_id = %line_id, "Failed to fetch purchase line for removal");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(line_id = %line_id, "Purchase line not found for removal");
                ServiceError::NotFound(format!("Purchase line {} not found", line_id))
            })?;

        let purchase_id = line.purchase_id;
        let subtotal = line.subtotal;

        self.apply_total_delta(&txn, purchase_id, -subtotal).await?;

        PurchaseLineEntity::delete_by_id(line_id)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, line_id = %line_id, "Failed to delete purchase line");
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, line_id = %line_id, "Failed to commit purchase line removal");
            ServiceError::DatabaseError(e)
        })?;

        info!(purchase_id = %purchase_id, line_id = %line_id, subtotal = %subtotal, "Purchase line removed");
        self.event_sender
            .send_or_log(Event::PurchaseLineRemoved {
                purchase_id,
                line_id,
            })
            .await;

        Ok(())
    }

    /// Applies `delta` to the purchase total in place
    /// (`SET total = total + delta`). Must run inside the same transaction
    /// as the line mutation it accounts for.
    async fn apply_total_delta(
        &self,
        txn: &DatabaseTransaction,
        purchase_id: Uuid,
        delta: Decimal,
    ) -> Result<(), ServiceError> {
        let result = PurchaseEntity::update_many()
            .col_expr(
                purchase::Column::Total,
                Expr::col(purchase::Column::Total).add(delta),
            )
            .col_expr(purchase::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(purchase::Column::Id.eq(purchase_id))
            .exec(txn)
            .await
            .map_err(|e| {
                error!(error = %e, purchase_id = %purchase_id, "Failed to adjust purchase total");
                ServiceError::DatabaseError(e)
            })?;

        if result.rows_affected == 0 {
            warn!(purchase_id = %purchase_id, "Purchase vanished while adjusting total");
            return Err(ServiceError::NotFound(format!(
                "Purchase {} not found",
                purchase_id
            )));
        }

        Ok(())
    }
}
