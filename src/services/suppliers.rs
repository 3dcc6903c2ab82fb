use crate::{
    db::DbPool,
    entities::product::{self, Entity as ProductEntity},
    entities::purchase::{self, Entity as PurchaseEntity},
    entities::supplier::{self, Entity as SupplierEntity, Model as SupplierModel},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSupplier {
    pub name: String,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Service for suppliers.
#[derive(Clone)]
pub struct SupplierService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SupplierService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_supplier(&self, input: NewSupplier) -> Result<SupplierModel, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();
        let supplier_id = Uuid::new_v4();

        let supplier_active_model = supplier::ActiveModel {
            id: Set(supplier_id),
            name: Set(input.name),
            contact_name: Set(input.contact_name),
            email: Set(input.email),
            phone: Set(input.phone),
            address: Set(input.address),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let supplier_model = supplier_active_model.insert(db).await.map_err(|e| {
            error!(error = %e, supplier_id = %supplier_id, "Failed to create supplier");
            ServiceError::DatabaseError(e)
        })?;

        info!(supplier_id = %supplier_id, "Supplier created");
        self.event_sender
            .send_or_log(Event::SupplierCreated(supplier_id))
            .await;

        Ok(supplier_model)
    }

    #[instrument(skip(self), fields(supplier_id = %supplier_id))]
    pub async fn get_supplier(&self, supplier_id: Uuid) -> Result<SupplierModel, ServiceError> {
        let db = &*self.db_pool;

        SupplierEntity::find_by_id(supplier_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, supplier_id = %supplier_id, "Failed to fetch supplier");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Supplier {} not found", supplier_id)))
    }

    /// Lists suppliers alphabetically. Returns the page plus the total row
    /// count.
    #[instrument(skip(self))]
    pub async fn list_suppliers(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<SupplierModel>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = SupplierEntity::find()
            .order_by_asc(supplier::Column::Name)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count suppliers");
            ServiceError::DatabaseError(e)
        })?;

        let suppliers = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, page = page, per_page = per_page, "Failed to fetch suppliers page");
                ServiceError::DatabaseError(e)
            })?;

        Ok((suppliers, total))
    }

    #[instrument(skip(self, input), fields(supplier_id = %supplier_id))]
    pub async fn update_supplier(
        &self,
        supplier_id: Uuid,
        input: NewSupplier,
    ) -> Result<SupplierModel, ServiceError> {
        let db = &*self.db_pool;

        let supplier = SupplierEntity::find_by_id(supplier_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, supplier_id = %supplier_id, "Failed to fetch supplier for update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(supplier_id = %supplier_id, "Supplier not found for update");
                ServiceError::NotFound(format!("Supplier {} not found", supplier_id))
            })?;

        let mut supplier_active_model: supplier::ActiveModel = supplier.into();
        supplier_active_model.name = Set(input.name);
        supplier_active_model.contact_name = Set(input.contact_name);
        supplier_active_model.email = Set(input.email);
        supplier_active_model.phone = Set(input.phone);
        supplier_active_model.address = Set(input.address);
        supplier_active_model.updated_at = Set(Some(Utc::now()));

        let supplier_model = supplier_active_model.update(db).await.map_err(|e| {
            error!(error = %e, supplier_id = %supplier_id, "Failed to update supplier");
            ServiceError::DatabaseError(e)
        })?;

        info!(supplier_id = %supplier_id, "Supplier updated");
        self.event_sender
            .send_or_log(Event::SupplierUpdated(supplier_id))
            .await;

        Ok(supplier_model)
    }

    /// Deletes a supplier. Refused while products or purchases still
    /// reference it.
    #[instrument(skip(self), fields(supplier_id = %supplier_id))]
    pub async fn delete_supplier(&self, supplier_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, supplier_id = %supplier_id, "Failed to start transaction for supplier deletion");
            ServiceError::DatabaseError(e)
        })?;

        let supplier = SupplierEntity::find_by_id(supplier_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, supplier_id = %supplier_id, "Failed to fetch supplier for deletion");
                ServiceError::DatabaseError(e)
            })?;
        if supplier.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Supplier {} not found",
                supplier_id
            )));
        }

        let product_count = ProductEntity::find()
            .filter(product::Column::SupplierId.eq(supplier_id))
            .count(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, supplier_id = %supplier_id, "Failed to count supplier products");
                ServiceError::DatabaseError(e)
            })?;
        if product_count > 0 {
            warn!(supplier_id = %supplier_id, product_count = product_count, "Refusing to delete supplier with products");
            return Err(ServiceError::Conflict(format!(
                "Supplier {} is still referenced by {} product(s)",
                supplier_id, product_count
            )));
        }

        let purchase_count = PurchaseEntity::find()
            .filter(purchase::Column::SupplierId.eq(supplier_id))
            .count(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, supplier_id = %supplier_id, "Failed to count supplier purchases");
                ServiceError::DatabaseError(e)
            })?;
        if purchase_count > 0 {
            warn!(supplier_id = %supplier_id, purchase_count = purchase_count, "Refusing to delete supplier with purchases");
            return Err(ServiceError::Conflict(format!(
                "Supplier {} is still referenced by {} purchase(s)",
                supplier_id, purchase_count
            )));
        }

        SupplierEntity::delete_by_id(supplier_id)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, supplier_id = %supplier_id, "Failed to delete supplier");
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, supplier_id = %supplier_id, "Failed to commit supplier deletion");
            ServiceError::DatabaseError(e)
        })?;

        info!(supplier_id = %supplier_id, "Supplier deleted");
        self.event_sender
            .send_or_log(Event::SupplierDeleted(supplier_id))
            .await;

        Ok(())
    }
}
