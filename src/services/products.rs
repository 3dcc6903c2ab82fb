use crate::{
    db::DbPool,
    entities::category::Entity as CategoryEntity,
    entities::product::{self, Entity as ProductEntity, Model as ProductModel},
    entities::purchase_line::{self, Entity as PurchaseLineEntity},
    entities::sale_line::{self, Entity as SaleLineEntity},
    entities::supplier::Entity as SupplierEntity,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub category_id: Uuid,
    pub supplier_id: Uuid,
    pub purchase_price: Decimal,
    pub sale_price: Decimal,
    pub stock: i32,
    pub min_stock: i32,
    pub max_stock: i32,
}

/// Service for the product catalog.
#[derive(Clone)]
pub struct ProductService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a product after resolving its category and supplier.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: NewProduct) -> Result<ProductModel, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();
        let product_id = Uuid::new_v4();

        Self::check_prices(&input)?;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for product creation");
            ServiceError::DatabaseError(e)
        })?;

        Self::check_references(&txn, input.category_id, input.supplier_id).await?;

        let product_active_model = product::ActiveModel {
            id: Set(product_id),
            name: Set(input.name),
            category_id: Set(input.category_id),
            supplier_id: Set(input.supplier_id),
            purchase_price: Set(input.purchase_price),
            sale_price: Set(input.sale_price),
            stock: Set(input.stock),
            min_stock: Set(input.min_stock),
            max_stock: Set(input.max_stock),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let product_model = product_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to create product");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to commit product creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %product_id, "Product created");
        self.event_sender
            .send_or_log(Event::ProductCreated(product_id))
            .await;

        Ok(product_model)
    }

    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        let db = &*self.db_pool;

        ProductEntity::find_by_id(product_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to fetch product");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    /// Lists products alphabetically. Returns the page plus the total row
    /// count.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = ProductEntity::find()
            .order_by_asc(product::Column::Name)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count products");
            ServiceError::DatabaseError(e)
        })?;

        let products = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, page = page, per_page = per_page, "Failed to fetch products page");
                ServiceError::DatabaseError(e)
            })?;

        Ok((products, total))
    }

    /// Lists products whose stock has fallen to or below their minimum.
    #[instrument(skip(self))]
    pub async fn list_low_stock(&self) -> Result<Vec<ProductModel>, ServiceError> {
        let db = &*self.db_pool;

        ProductEntity::find()
            .filter(Expr::col(product::Column::Stock).lte(Expr::col(product::Column::MinStock)))
            .order_by_asc(product::Column::Name)
            .all(db)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to fetch low stock products");
                ServiceError::DatabaseError(e)
            })
    }

    #[instrument(skip(self, input), fields(product_id = %product_id))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        input: NewProduct,
    ) -> Result<ProductModel, ServiceError> {
        let db = &*self.db_pool;

        Self::check_prices(&input)?;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to start transaction for product update");
            ServiceError::DatabaseError(e)
        })?;

        let product = ProductEntity::find_by_id(product_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to fetch product for update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(product_id = %product_id, "Product not found for update");
                ServiceError::NotFound(format!("Product {} not found", product_id))
            })?;

        Self::check_references(&txn, input.category_id, input.supplier_id).await?;

        let mut product_active_model: product::ActiveModel = product.into();
        product_active_model.name = Set(input.name);
        product_active_model.category_id = Set(input.category_id);
        product_active_model.supplier_id = Set(input.supplier_id);
        product_active_model.purchase_price = Set(input.purchase_price);
        product_active_model.sale_price = Set(input.sale_price);
        product_active_model.stock = Set(input.stock);
        product_active_model.min_stock = Set(input.min_stock);
        product_active_model.max_stock = Set(input.max_stock);
        product_active_model.updated_at = Set(Some(Utc::now()));

        let product_model = product_active_model.update(&txn).await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to update product");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to commit product update");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %product_id, "Product updated");
        self.event_sender
            .send_or_log(Event::ProductUpdated(product_id))
            .await;

        Ok(product_model)
    }

    /// Deletes a product. Refused while purchase or sale lines still
    /// reference it.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn delete_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to start transaction for product deletion");
            ServiceError::DatabaseError(e)
        })?;

        let product = ProductEntity::find_by_id(product_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to fetch product for deletion");
                ServiceError::DatabaseError(e)
            })?;
        if product.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Product {} not found",
                product_id
            )));
        }

        let purchase_line_count = PurchaseLineEntity::find()
            .filter(purchase_line::Column::ProductId.eq(product_id))
            .count(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to count purchase lines for product");
                ServiceError::DatabaseError(e)
            })?;
        let sale_line_count = SaleLineEntity::find()
            .filter(sale_line::Column::ProductId.eq(product_id))
            .count(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to count sale lines for product");
                ServiceError::DatabaseError(e)
            })?;
        if purchase_line_count > 0 || sale_line_count > 0 {
            warn!(
                product_id = %product_id,
                purchase_line_count = purchase_line_count,
                sale_line_count = sale_line_count,
                "Refusing to delete product referenced by lines"
            );
            return Err(ServiceError::Conflict(format!(
                "Product {} is still referenced by {} line item(s)",
                product_id,
                purchase_line_count + sale_line_count
            )));
        }

        ProductEntity::delete_by_id(product_id)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, product_id = %product_id, "Failed to delete product");
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, product_id = %product_id, "Failed to commit product deletion");
            ServiceError::DatabaseError(e)
        })?;

        info!(product_id = %product_id, "Product deleted");
        self.event_sender
            .send_or_log(Event::ProductDeleted(product_id))
            .await;

        Ok(())
    }

    fn check_prices(input: &NewProduct) -> Result<(), ServiceError> {
        if input.purchase_price < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "purchase_price cannot be negative".to_string(),
            ));
        }
        if input.sale_price < Decimal::ZERO {
            return Err(ServiceError::InvalidInput(
                "sale_price cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    async fn check_references<C: ConnectionTrait>(
        conn: &C,
        category_id: Uuid,
        supplier_id: Uuid,
    ) -> Result<(), ServiceError> {
        let category = CategoryEntity::find_by_id(category_id)
            .one(conn)
            .await
            .map_err(|e| {
                error!(error = %e, category_id = %category_id, "Failed to fetch category");
                ServiceError::DatabaseError(e)
            })?;
        if category.is_none() {
            warn!(category_id = %category_id, "Category not found for product");
            return Err(ServiceError::NotFound(format!(
                "Category {} not found",
                category_id
            )));
        }

        let supplier = SupplierEntity::find_by_id(supplier_id)
            .one(conn)
            .await
            .map_err(|e| {
                error!(error = %e, supplier_id = %supplier_id, "Failed to fetch supplier");
                ServiceError::DatabaseError(e)
            })?;
        if supplier.is_none() {
            warn!(supplier_id = %supplier_id, "Supplier not found for product");
            return Err(ServiceError::NotFound(format!(
                "Supplier {} not found",
                supplier_id
            )));
        }

        Ok(())
    }
}
