mod common;

use std::str::FromStr;
use std::sync::Arc;

use axum::http::{Method, StatusCode};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};
use shopkeeper_api::entities::{
    purchase::Entity as PurchaseEntity,
    purchase_line::{Column as PurchaseLineColumn, Entity as PurchaseLineEntity},
};
use uuid::Uuid;

use common::{response_json, TestApp};

async fn purchase_total(app: &TestApp, purchase_id: Uuid) -> Decimal {
    PurchaseEntity::find_by_id(purchase_id)
        .one(&*app.state.db)
        .await
        .expect("query purchase")
        .expect("purchase should exist")
        .total
}

async fn line_count(app: &TestApp, purchase_id: Uuid) -> u64 {
    PurchaseLineEntity::find()
        .filter(PurchaseLineColumn::PurchaseId.eq(purchase_id))
        .count(&*app.state.db)
        .await
        .expect("count purchase lines")
}

/// Identity helper that pins down the closure's higher-ranked lifetime so it
/// can return a future borrowing its `&TestApp` argument.
fn constrain<F>(f: F) -> F
where
    F: for<'a> Fn(&'a TestApp) -> std::pin::Pin<Box<dyn std::future::Future<Output = Value> + 'a>>,
{
    f
}

#[tokio::test]
async fn new_purchase_starts_with_zero_total() {
    let app = TestApp::new().await;
    let supplier = app.seed_supplier("Fresh produce co").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/purchases",
            Some(json!({ "supplier_id": supplier.id.to_string() })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    assert!(body["success"].as_bool().unwrap_or(false));
    assert_eq!(body["data"]["total"], json!("0.00"));
    assert_eq!(body["data"]["supplier_id"], supplier.id.to_string());
}

#[tokio::test]
async fn create_purchase_with_unknown_supplier_returns_not_found() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/purchases",
            Some(json!({ "supplier_id": Uuid::new_v4().to_string() })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = response_json(response).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Not Found"));
}

#[tokio::test]
async fn adding_a_line_sets_subtotal_and_grows_parent_total() {
    let app = TestApp::new().await;
    let purchase = app.seed_purchase().await;
    let product = app.seed_product("Olive oil").await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchases/{}/lines", purchase.id),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 3,
                "unit_price": "10.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    assert_eq!(body["data"]["subtotal"], json!("30.00"));
    assert_eq!(body["data"]["unit_price"], json!("10.00"));
    assert_eq!(body["data"]["quantity"], json!(3));
    assert_eq!(body["data"]["purchase_id"], purchase.id.to_string());

    assert_eq!(
        purchase_total(&app, purchase.id).await,
        Decimal::from_str("30.00").unwrap()
    );
}

#[tokio::test]
async fn total_follows_line_create_update_delete() {
    let app = TestApp::new().await;
    let purchase = app.seed_purchase().await;
    let product = app.seed_product("Coffee beans").await;

    let get_total = constrain(|app| {
        let id = purchase.id;
        Box::pin(async move {
            let response = app
                .request(Method::GET, &format!("/api/v1/purchases/{}", id), None)
                .await;
            assert_eq!(response.status(), StatusCode::OK);
            response_json(response).await["data"]["total"].clone()
        })
    });

    assert_eq!(get_total(&app).await, json!("0.00"));

    // First line: 3 x 10.00 = 30.00
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchases/{}/lines", purchase.id),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 3,
                "unit_price": "10.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let first_line_id = response_json(response).await["data"]["id"]
        .as_str()
        .expect("line id")
        .to_string();
    assert_eq!(get_total(&app).await, json!("30.00"));

    // Second line: 1 x 10.00, total 40.00
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchases/{}/lines", purchase.id),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 1,
                "unit_price": "10.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let second_line_id = response_json(response).await["data"]["id"]
        .as_str()
        .expect("line id")
        .to_string();
    assert_eq!(get_total(&app).await, json!("40.00"));

    // Grow the first line to 5 x 10.00; the delta (+20.00) lands on the total.
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/purchases/lines/{}", first_line_id),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 5,
                "unit_price": "10.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["subtotal"], json!("50.00"));
    assert_eq!(get_total(&app).await, json!("60.00"));

    // Remove the second line; its stored subtotal comes back off the total.
    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/purchases/lines/{}", second_line_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["message"], json!("Purchase line deleted"));
    assert_eq!(get_total(&app).await, json!("50.00"));

    assert_eq!(line_count(&app, purchase.id).await, 1);
    assert_eq!(
        purchase_total(&app, purchase.id).await,
        Decimal::from_str("50.00").unwrap()
    );
}

#[tokio::test]
async fn concurrent_line_creates_keep_total_equal_to_line_sum() {
    let app = Arc::new(TestApp::new().await);
    let purchase = app.seed_purchase().await;
    let product = app.seed_product("Bottled water").await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let app = app.clone();
        let purchase_id = purchase.id;
        let product_id = product.id;
        tasks.push(tokio::spawn(async move {
            let response = app
                .request(
                    Method::POST,
                    &format!("/api/v1/purchases/{}/lines", purchase_id),
                    Some(json!({
                        "product_id": product_id.to_string(),
                        "quantity": 1,
                        "unit_price": "2.50"
                    })),
                )
                .await;
            response.status()
        }));
    }

    for task in tasks {
        assert_eq!(task.await.expect("task join"), StatusCode::CREATED);
    }

    let lines = PurchaseLineEntity::find()
        .filter(PurchaseLineColumn::PurchaseId.eq(purchase.id))
        .all(&*app.state.db)
        .await
        .expect("query purchase lines");
    assert_eq!(lines.len(), 8);

    let sum: Decimal = lines.iter().map(|line| line.subtotal).sum();
    let total = purchase_total(&app, purchase.id).await;
    assert_eq!(total, sum);
    assert_eq!(total, Decimal::from_str("20.00").unwrap());
}

#[tokio::test]
async fn non_positive_line_input_is_rejected_without_writing() {
    let app = TestApp::new().await;
    let purchase = app.seed_purchase().await;
    let product = app.seed_product("Flour").await;

    for payload in [
        json!({
            "product_id": product.id.to_string(),
            "quantity": 0,
            "unit_price": "10.00"
        }),
        json!({
            "product_id": product.id.to_string(),
            "quantity": 2,
            "unit_price": "-1.00"
        }),
        json!({
            "product_id": product.id.to_string(),
            "quantity": 2,
            "unit_price": "0.00"
        }),
    ] {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/purchases/{}/lines", purchase.id),
                Some(payload),
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response_json(response).await;
        assert_eq!(body["success"], json!(false));
    }

    assert_eq!(line_count(&app, purchase.id).await, 0);
    assert_eq!(
        purchase_total(&app, purchase.id).await,
        Decimal::from_str("0.00").unwrap()
    );
}

#[tokio::test]
async fn unknown_ids_win_over_invalid_quantities() {
    let app = TestApp::new().await;
    let purchase = app.seed_purchase().await;
    let product = app.seed_product("Sugar").await;

    // Unknown product beats the bad quantity: id resolution happens first.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchases/{}/lines", purchase.id),
            Some(json!({
                "product_id": Uuid::new_v4().to_string(),
                "quantity": 0,
                "unit_price": "10.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Unknown parent with an otherwise valid payload.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchases/{}/lines", Uuid::new_v4()),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 1,
                "unit_price": "10.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    assert_eq!(line_count(&app, purchase.id).await, 0);
}

#[tokio::test]
async fn updating_an_unknown_line_returns_not_found() {
    let app = TestApp::new().await;
    let product = app.seed_product("Yeast").await;

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/purchases/lines/{}", Uuid::new_v4()),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 1,
                "unit_price": "3.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rejected_line_update_leaves_line_and_total_untouched() {
    let app = TestApp::new().await;
    let purchase = app.seed_purchase().await;
    let product = app.seed_product("Salt").await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchases/{}/lines", purchase.id),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 4,
                "unit_price": "5.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let line_id = response_json(response).await["data"]["id"]
        .as_str()
        .expect("line id")
        .to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/purchases/lines/{}", line_id),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": -2,
                "unit_price": "5.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let line = PurchaseLineEntity::find_by_id(Uuid::parse_str(&line_id).unwrap())
        .one(&*app.state.db)
        .await
        .expect("query line")
        .expect("line should still exist");
    assert_eq!(line.quantity, 4);
    assert_eq!(line.subtotal, Decimal::from_str("20.00").unwrap());
    assert_eq!(
        purchase_total(&app, purchase.id).await,
        Decimal::from_str("20.00").unwrap()
    );
}

#[tokio::test]
async fn purchase_delete_is_blocked_until_lines_are_removed() {
    let app = TestApp::new().await;
    let purchase = app.seed_purchase().await;
    let product = app.seed_product("Cocoa").await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/purchases/{}/lines", purchase.id),
            Some(json!({
                "product_id": product.id.to_string(),
                "quantity": 2,
                "unit_price": "8.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let line_id = response_json(response).await["data"]["id"]
        .as_str()
        .expect("line id")
        .to_string();

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/purchases/{}", purchase.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["error"], json!("Conflict"));

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/purchases/lines/{}", line_id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/purchases/{}", purchase.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["message"], json!("Purchase deleted"));

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/purchases/{}", purchase.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn purchase_detail_includes_its_lines() {
    let app = TestApp::new().await;
    let purchase = app.seed_purchase().await;
    let product = app.seed_product("Paper bags").await;

    for quantity in [2, 3] {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/purchases/{}/lines", purchase.id),
                Some(json!({
                    "product_id": product.id.to_string(),
                    "quantity": quantity,
                    "unit_price": "1.50"
                })),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/purchases/{}", purchase.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let lines = body["data"]["lines"].as_array().expect("lines array");
    assert_eq!(lines.len(), 2);
    assert_eq!(body["data"]["total"], json!("7.50"));

    // The standalone line listing agrees with the embedded one.
    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/purchases/{}/lines", purchase.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"].as_array().expect("lines array").len(), 2);
}

#[tokio::test]
async fn purchase_list_is_paginated() {
    let app = TestApp::new().await;
    for _ in 0..3 {
        app.seed_purchase().await;
    }

    let response = app
        .request(Method::GET, "/api/v1/purchases?page=1&per_page=2", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    let data = &body["data"];
    assert_eq!(data["items"].as_array().expect("items").len(), 2);
    assert_eq!(data["pagination"]["total"], json!(3));
    assert_eq!(data["pagination"]["total_pages"], json!(2));
    assert_eq!(data["pagination"]["page"], json!(1));
}

#[tokio::test]
async fn malformed_purchase_id_is_a_bad_request() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/purchases/not-a-uuid", None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let value: Value = response_json(
        app.request(
            Method::GET,
            &format!("/api/v1/purchases/{}", Uuid::new_v4()),
            None,
        )
        .await,
    )
    .await;
    assert_eq!(value["success"], json!(false));
}
