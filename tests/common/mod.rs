use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request},
    middleware, Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use shopkeeper_api::{
    config::AppConfig,
    db,
    entities::{category, product, purchase, sale, supplier},
    events::{self, EventSender},
    handlers::AppServices,
    services::{
        categories::NewCategory, products::NewProduct, purchases::NewPurchase, sales::NewSale,
        suppliers::NewSupplier,
    },
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

/// Helper harness for spinning up an application state backed by a
/// file-based SQLite database in a temporary directory.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    _db_dir: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_dir = tempfile::tempdir().expect("create temp dir for test database");
        let db_path = db_dir.path().join("shopkeeper_test.db");

        // Minimal configuration suitable for tests.
        let mut cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_path.display()),
            "127.0.0.1".to_string(),
            0,
            "development".to_string(),
        );
        cfg.auto_migrate = true;
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), event_sender.clone());

        let state = AppState {
            db: db_arc,
            config: Arc::new(cfg),
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", shopkeeper_api::api_v1_routes())
            .layer(middleware::from_fn(
                shopkeeper_api::tracing::request_id_middleware,
            ))
            .with_state(state.clone());

        Self {
            router,
            state,
            _db_dir: db_dir,
            _event_task: event_task,
        }
    }

    /// Send a JSON request against the router.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.send(request).await
    }

    /// Like `request`, with extra headers on top of the JSON defaults.
    #[allow(dead_code)]
    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.send(request).await
    }

    /// Dispatch an already-built request, for tests that need odd bodies
    /// or headers.
    #[allow(dead_code)]
    pub async fn send(&self, request: Request<Body>) -> axum::response::Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    #[allow(dead_code)]
    pub async fn seed_category(&self, name: &str) -> category::Model {
        self.state
            .services
            .categories
            .create_category(NewCategory {
                name: name.to_string(),
                description: None,
            })
            .await
            .expect("seed category for tests")
    }

    #[allow(dead_code)]
    pub async fn seed_supplier(&self, name: &str) -> supplier::Model {
        self.state
            .services
            .suppliers
            .create_supplier(NewSupplier {
                name: name.to_string(),
                contact_name: None,
                email: None,
                phone: None,
                address: None,
            })
            .await
            .expect("seed supplier for tests")
    }

    #[allow(dead_code)]
    pub async fn seed_product(&self, name: &str) -> product::Model {
        self.seed_product_with_stock(name, 50, 5).await
    }

    #[allow(dead_code)]
    pub async fn seed_product_with_stock(
        &self,
        name: &str,
        stock: i32,
        min_stock: i32,
    ) -> product::Model {
        let category = self.seed_category(&format!("Category for {}", name)).await;
        let supplier = self.seed_supplier(&format!("Supplier for {}", name)).await;

        self.state
            .services
            .products
            .create_product(NewProduct {
                name: name.to_string(),
                category_id: category.id,
                supplier_id: supplier.id,
                purchase_price: Decimal::new(1_000, 2),
                sale_price: Decimal::new(1_500, 2),
                stock,
                min_stock,
                max_stock: 100,
            })
            .await
            .expect("seed product for tests")
    }

    #[allow(dead_code)]
    pub async fn seed_purchase(&self) -> purchase::Model {
        let supplier = self.seed_supplier("Purchase supplier").await;

        self.state
            .services
            .purchases
            .create_purchase(NewPurchase {
                supplier_id: supplier.id,
                purchase_date: None,
            })
            .await
            .expect("seed purchase for tests")
    }

    #[allow(dead_code)]
    pub async fn seed_sale(&self) -> sale::Model {
        self.state
            .services
            .sales
            .create_sale(NewSale {
                customer_name: Some("Walk-in customer".to_string()),
                sale_date: None,
            })
            .await
            .expect("seed sale for tests")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

/// Read a response body into a JSON value.
pub async fn response_json(response: axum::response::Response) -> Value {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&body_bytes).expect("parse response body")
}
