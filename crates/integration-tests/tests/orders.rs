//! Order placement, totals and write atomicity.
//!
//! These tests require a running server, a migrated and seeded database and
//! `RISHOP_API_KEY` / `RISHOP_DATABASE_URL` in the environment.

use reqwest::StatusCode;
use serde_json::json;

use ri_shop_api::db::{OrderRepository, ProductRepository};
use ri_shop_api::models::{NewOrder, NewOrderLine};
use ri_shop_core::{OrderStatus, ProductId, UserId};
use ri_shop_integration_tests::{TestContext, envelope, unique};

#[tokio::test]
#[ignore = "Requires running server and seeded database"]
async fn test_place_order_snapshots_product() {
    let ctx = TestContext::new().await;
    let customer = ctx.sign_up_customer().await;

    let resp = customer
        .bearer(ctx.client.post(ctx.url("/orders/")))
        .json(&json!({
            "address": "X",
            "contact": "Y",
            "products": [{"qty": 2, "product": {"id": "P000001", "price": 0.01}}]
        }))
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order = envelope(resp).await["data"].clone();

    assert_eq!(order["status"], "waiting");
    assert_eq!(order["user_id"], customer.user_id.as_str());
    let lines = order["products"].as_array().cloned().unwrap_or_default();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["qty"], 2);
    assert_eq!(lines[0]["product"]["title"], "Coffee");
    assert_eq!(lines[0]["product"]["price"], 150.0);
    assert_eq!(lines[0]["product"]["category"]["title"], "food & beverage");
    assert_eq!(order["total_paid"], 300.0);

    // The owner can read it back; another customer cannot
    let path = format!("/orders/{}/{}", customer.user_id, order["id"].as_str().unwrap_or_default());
    let resp = customer
        .bearer(ctx.client.get(ctx.url(&path)))
        .send()
        .await
        .expect("Failed to get order");
    assert_eq!(resp.status(), StatusCode::OK);

    let stranger = ctx.sign_up_customer().await;
    let resp = stranger
        .bearer(ctx.client.get(ctx.url(&path)))
        .send()
        .await
        .expect("Failed to get order");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running server and seeded database"]
async fn test_total_paid_matches_lines() {
    let ctx = TestContext::new().await;
    let customer = ctx.sign_up_customer().await;

    let resp = customer
        .bearer(ctx.client.post(ctx.url("/orders")))
        .json(&json!({
            "address": "Bangkok",
            "contact": "0800000000",
            "products": [
                {"qty": 3, "product": {"id": "P000001"}},
                {"qty": 1, "product": {"id": "P000002"}}
            ]
        }))
        .send()
        .await
        .expect("Failed to place order");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let order = envelope(resp).await["data"].clone();
    let order_id = order["id"].as_str().unwrap_or_default().to_owned();

    let expected: f64 = sqlx::query_scalar(
        r#"
        SELECT COALESCE(SUM(("product"->>'price')::FLOAT * "qty"), 0)
        FROM "products_orders"
        WHERE "order_id" = $1
        "#,
    )
    .bind(&order_id)
    .fetch_one(&ctx.pool)
    .await
    .expect("Failed to sum lines");

    let total = order["total_paid"].as_f64().unwrap_or_default();
    assert!((total - expected).abs() < f64::EPSILON);
    assert!((total - 650.0).abs() < f64::EPSILON);
}

#[tokio::test]
#[ignore = "Requires running server and seeded database"]
async fn test_customer_may_only_cancel() {
    let ctx = TestContext::new().await;
    let customer = ctx.sign_up_customer().await;

    let resp = customer
        .bearer(ctx.client.post(ctx.url("/orders")))
        .json(&json!({
            "address": "X",
            "contact": "Y",
            "products": [{"qty": 1, "product": {"id": "P000001"}}]
        }))
        .send()
        .await
        .expect("Failed to place order");
    let order = envelope(resp).await["data"].clone();
    let path = format!("/orders/{}/{}", customer.user_id, order["id"].as_str().unwrap_or_default());

    let resp = customer
        .bearer(ctx.client.patch(ctx.url(&path)))
        .json(&json!({"status": "completed"}))
        .send()
        .await
        .expect("Failed to update order");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = customer
        .bearer(ctx.client.patch(ctx.url(&path)))
        .json(&json!({"status": "canceled"}))
        .send()
        .await
        .expect("Failed to update order");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(envelope(resp).await["data"]["status"], "canceled");
}

#[tokio::test]
#[ignore = "Requires seeded database"]
async fn test_failed_lines_leave_no_order() {
    let ctx = TestContext::new().await;
    let customer = ctx.sign_up_customer().await;
    let address = format!("atomicity-{}", unique());

    let coffee = ProductRepository::new(&ctx.pool)
        .find_one(&ProductId::new("P000001"))
        .await
        .expect("Failed to load P000001");

    // qty 0 passes the header insert and violates the line check
    let order = NewOrder {
        user_id: UserId::new(customer.user_id.clone()),
        address: address.clone(),
        contact: "Y".to_owned(),
        transfer_slip: None,
        status: OrderStatus::Waiting,
        lines: vec![NewOrderLine {
            qty: 0,
            product: coffee,
        }],
    };
    let result = OrderRepository::new(&ctx.pool).insert(&order).await;
    assert!(result.is_err());

    let remaining: i64 =
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM "orders" WHERE "address" = $1"#)
            .bind(&address)
            .fetch_one(&ctx.pool)
            .await
            .expect("Failed to count orders");
    assert_eq!(remaining, 0);
}
