mod common;

use std::str::FromStr;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::json;
use shopkeeper_api::entities::{
    sale::Entity as SaleEntity,
    sale_line::{Column as SaleLineColumn, Entity as SaleLineEntity},
};
use uuid::Uuid;

use common::{response_json, TestApp};

async fn sale_total(app: &TestApp, sale_id: Uuid) -> Decimal {
    SaleEntity::find_by_id(sale_id)
        .one(&*app.state.db)
        .await
        .expect("query sale")
        .expect("sale should exist")
        .total
}

#[tokio::test]
async fn sale_lifecycle_keeps_total_in_step_with_lines() {
    let app = TestApp::new().await;
    let product = app.seed_product("House blend beans").await;

    // Header first; totals start pinned at zero.
    let response = app
        .request(
            Method::POST,
            "/api/v1/sales",
            Some(json!({ "customer_name": "Corner cafe" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], json!("0.00"));
    assert_eq!(body["data"]["customer_name"], json!("Corner cafe"));
    let sale_id = Uuid::parse_str(body["data"]["id"].as_str().expect("sale id")).unwrap();

    // 2 x 15.00 -> 30.00
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/sales/{}/lines", sale_id),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 2,
                "unit_price": "15.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let first_line = response_json(response).await;
    assert_eq!(first_line["data"]["subtotal"], json!("30.00"));
    let first_line_id = first_line["data"]["id"].as_str().expect("line id").to_string();
    assert_eq!(sale_total(&app, sale_id).await, Decimal::from_str("30.00").unwrap());

    // 4 x 2.50 -> total 40.00
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/sales/{}/lines", sale_id),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 4,
                "unit_price": "2.50"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let second_line_id = response_json(response).await["data"]["id"]
        .as_str()
        .expect("line id")
        .to_string();
    assert_eq!(sale_total(&app, sale_id).await, Decimal::from_str("40.00").unwrap());

    // Reprice the first line: 2 x 25.00 -> subtotal 50.00, total 60.00
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/sales/lines/{}", first_line_id),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 2,
                "unit_price": "25.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response_json(response).await["data"]["subtotal"],
        json!("50.00")
    );
    assert_eq!(sale_total(&app, sale_id).await, Decimal::from_str("60.00").unwrap());

    // Drop the second line -> total 50.00
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/sales/lines/{}", second_line_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response_json(response).await["message"],
        json!("Sale line deleted")
    );
    assert_eq!(sale_total(&app, sale_id).await, Decimal::from_str("50.00").unwrap());

    // Header view agrees with the database.
    let response = app
        .request(Method::GET, &format!("/api/v1/sales/{}", sale_id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], json!("50.00"));
    assert_eq!(body["data"]["lines"].as_array().expect("lines").len(), 1);
}

#[tokio::test]
async fn sale_works_without_a_customer_name() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::POST, "/api/v1/sales", Some(json!({})))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    assert!(body["success"].as_bool().unwrap_or(false));
    assert_eq!(body["data"]["customer_name"], json!(null));
    assert_eq!(body["data"]["total"], json!("0.00"));
}

#[tokio::test]
async fn concurrent_sale_lines_sum_to_the_stored_total() {
    let app = Arc::new(TestApp::new().await);
    let sale = app.seed_sale().await;
    let product = app.seed_product("Espresso shots").await;

    let mut tasks = Vec::new();
    for n in 1..=6u32 {
        let app = app.clone();
        let sale_id = sale.id;
        let product_id = product.id;
        tasks.push(tokio::spawn(async move {
            let response = app
                .request(
                    Method::POST,
                    &format!("/api/v1/sales/{}/lines", sale_id),
                    Some(json!({
                        "product_id": product_id.to_string(),
                        "quantity": n,
                        "unit_price": "1.00"
                    })),
                )
                .await;
            response.status()
        }));
    }

    for task in tasks {
        assert_eq!(task.await.expect("task join"), StatusCode::CREATED);
    }

    let lines = SaleLineEntity::find()
        .filter(SaleLineColumn::SaleId.eq(sale.id))
        .all(&*app.state.db)
        .await
        .expect("query sale lines");
    assert_eq!(lines.len(), 6);

    let sum: Decimal = lines.iter().map(|line| line.subtotal).sum();
    let total = sale_total(&app, sale.id).await;
    assert_eq!(total, sum);
    // 1 + 2 + ... + 6 at 1.00 each
    assert_eq!(total, Decimal::from_str("21.00").unwrap());
}

#[tokio::test]
async fn missing_ids_resolve_before_quantity_checks() {
    let app = TestApp::new().await;
    let sale = app.seed_sale().await;

    // Both the product id and the quantity are bad; the id lookup reports first.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/sales/{}/lines", sale.id),
            Some(json!({
                "product_id": Uuid::new_v4().to_string(),
                "quantity": -1,
                "unit_price": "1.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/sales/{}/lines", Uuid::new_v4()),
            Some(json!({
                "product_id": Uuid::new_v4().to_string(),
                "quantity": 1,
                "unit_price": "1.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let count = SaleLineEntity::find()
        .filter(SaleLineColumn::SaleId.eq(sale.id))
        .count(&*app.state.db)
        .await
        .expect("count sale lines");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn invalid_sale_line_is_rejected_before_any_write() {
    let app = TestApp::new().await;
    let sale = app.seed_sale().await;
    let product = app.seed_product("Filter paper").await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/sales/{}/lines", sale.id),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 0,
                "unit_price": "3.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Bad Request"));

    assert_eq!(sale_total(&app, sale.id).await, Decimal::from_str("0.00").unwrap());
}

#[tokio::test]
async fn deleting_a_sale_with_lines_conflicts() {
    let app = TestApp::new().await;
    let sale = app.seed_sale().await;
    let product = app.seed_product("Gift cards").await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/sales/{}/lines", sale.id),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 1,
                "unit_price": "25.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let line_id = response_json(response).await["data"]["id"]
        .as_str()
        .expect("line id")
        .to_string();

    let response = app
        .request(Method::DELETE, &format!("/api/v1/sales/{}", sale.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Clearing the line unblocks the delete.
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/sales/lines/{}", line_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(Method::DELETE, &format!("/api/v1/sales/{}", sale.id), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response_json(response).await["message"],
        json!("Sale deleted")
    );

    assert!(SaleEntity::find_by_id(sale.id)
        .one(&*app.state.db)
        .await
        .expect("query sale")
        .is_none());
}

#[tokio::test]
async fn sale_listing_paginates_newest_first() {
    let app = TestApp::new().await;
    for _ in 0..5 {
        app.seed_sale().await;
    }

    let response = app
        .request(Method::GET, "/api/v1/sales?page=2&per_page=2", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["items"].as_array().expect("items").len(), 2);
    assert_eq!(body["data"]["pagination"]["total"], json!(5));
    assert_eq!(body["data"]["pagination"]["total_pages"], json!(3));
    assert_eq!(body["data"]["pagination"]["page"], json!(2));
}
