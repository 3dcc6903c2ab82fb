use crate::{
    db::DbPool,
    entities::category::{self, Entity as CategoryEntity, Model as CategoryModel},
    entities::product::{self, Entity as ProductEntity},
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
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

/// Service for product categories.
#[derive(Clone)]
pub struct CategoryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CategoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(&self, input: NewCategory) -> Result<CategoryModel, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();
        let category_id = Uuid::new_v4();

        let category_active_model = category::ActiveModel {
            id: Set(category_id),
            name: Set(input.name),
            description: Set(input.description),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let category_model = category_active_model.insert(db).await.map_err(|e| {
            error!(error = %e, category_id = %category_id, "Failed to create category");
            ServiceError::DatabaseError(e)
        })?;

        info!(category_id = %category_id, "Category created");
        self.event_sender
            .send_or_log(Event::CategoryCreated(category_id))
            .await;

        Ok(category_model)
    }

    #[instrument(skip(self), fields(category_id = %category_id))]
    pub async fn get_category(&self, category_id: Uuid) -> Result<CategoryModel, ServiceError> {
        let db = &*self.db_pool;

        CategoryEntity::find_by_id(category_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, category_id = %category_id, "Failed to fetch category");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", category_id)))
    }

    /// Lists categories alphabetically. Returns the page plus the total row
    /// count.
    #[instrument(skip(self))]
    pub async fn list_categories(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<CategoryModel>, u64), ServiceError> {
        let db = &*self.db_pool;

        let paginator = CategoryEntity::find()
            .order_by_asc(category::Column::Name)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count categories");
            ServiceError::DatabaseError(e)
        })?;

        let categories = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, page = page, per_page = per_page, "Failed to fetch categories page");
                ServiceError::DatabaseError(e)
            })?;

        Ok((categories, total))
    }

    #[instrument(skip(self, input), fields(category_id = %category_id))]
    pub async fn update_category(
        &self,
        category_id: Uuid,
        input: NewCategory,
    ) -> Result<CategoryModel, ServiceError> {
        let db = &*self.db_pool;

        let category = CategoryEntity::find_by_id(category_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, category_id = %category_id, "Failed to fetch category for update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(category_id = %category_id, "Category not found for update");
                ServiceError::NotFound(format!("Category {} not found", category_id))
            })?;

        let mut category_active_model: category::ActiveModel = category.into();
        category_active_model.name = Set(input.name);
        category_active_model.description = Set(input.description);
        category_active_model.updated_at = Set(Some(Utc::now()));

        let category_model = category_active_model.update(db).await.map_err(|e| {
            error!(error = %e, category_id = %category_id, "Failed to update category");
            ServiceError::DatabaseError(e)
        })?;

        info!(category_id = %category_id, "Category updated");
        self.event_sender
            .send_or_log(Event::CategoryUpdated(category_id))
            .await;

        Ok(category_model)
    }

    /// Deletes a category. Refused while products still reference it.
    #[instrument(skip(self), fields(category_id = %category_id))]
    pub async fn delete_category(&self, category_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, category_id = %category_id, "Failed to start transaction for category deletion");
            ServiceError::DatabaseError(e)
        })?;

        let category = CategoryEntity::find_by_id(category_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, category_id = %category_id, "Failed to fetch category for deletion");
                ServiceError::DatabaseError(e)
            })?;
        if category.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Category {} not found",
                category_id
            )));
        }

        let product_count = ProductEntity::find()
            .filter(product::Column::CategoryId.eq(category_id))
            .count(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, category_id = %category_id, "Failed to count category products");
                ServiceError::DatabaseError(e)
            })?;
        if product_count > 0 {
            warn!(category_id = %category_id, product_count = product_count, "Refusing to delete category with products");
            return Err(ServiceError::Conflict(format!(
                "Category {} is still referenced by {} product(s)",
                category_id, product_count
            )));
        }

        CategoryEntity::delete_by_id(category_id)
            .exec(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, category_id = %category_id, "Failed to delete category");
                ServiceError::DatabaseError(e)
            })?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, category_id = %category_id, "Failed to commit category deletion");
            ServiceError::DatabaseError(e)
        })?;

        info!(category_id = %category_id, "Category deleted");
        self.event_sender
            .send_or_log(Event::CategoryDeleted(category_id))
            .await;

        Ok(())
    }
}
