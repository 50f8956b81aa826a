//! Catalog reads and writes against the seeded fixture.
//!
//! These tests require a running server, a migrated and seeded database
//! (`ri-shop-cli seed`) and `RISHOP_API_KEY` / `RISHOP_DATABASE_URL`.

use reqwest::StatusCode;
use serde_json::{Value, json};

use ri_shop_integration_tests::{TestContext, envelope};

fn coffee() -> Value {
    json!({
        "id": "P000001",
        "title": "Coffee",
        "description": "Just a food & beverage product",
        "category": {"id": 1, "title": "food & beverage"},
        "created_at": "2023-11-15T22:21:05.247324",
        "updated_at": "2023-11-15T22:21:05.247324",
        "price": 150.0,
        "images": [
            {
                "id": "c580fe73-afb3-47d1-a9df-eed24fdaea9b",
                "filename": "fb1_1.jpg",
                "url": "https://i.pinimg.com/564x/4a/1c/4a/4a1c4a9755e4d3bdfcb45a1c3a58712f.jpg"
            },
            {
                "id": "43bcd3fa-6f7f-4251-b196-f30ad4ea625e",
                "filename": "fb1_2.jpg",
                "url": "https://i.pinimg.com/564x/4a/1c/4a/4a1c4a9755e4d3bdfcb45a1c3a58712f.jpg"
            },
            {
                "id": "77d9e690-b722-4039-b0fe-5f7d9af0e6b4",
                "filename": "fb1_3.jpg",
                "url": "https://i.pinimg.com/564x/4a/1c/4a/4a1c4a9755e4d3bdfcb45a1c3a58712f.jpg"
            }
        ]
    })
}

#[tokio::test]
#[ignore = "Requires running server and seeded database"]
async fn test_find_one_product() {
    let ctx = TestContext::new().await;

    let resp = ctx
        .with_key(ctx.client.get(ctx.url("/products/P000001")))
        .send()
        .await
        .expect("Failed to get product");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(envelope(resp).await["data"], coffee());

    let resp = ctx
        .with_key(ctx.client.get(ctx.url("/products/P0000999")))
        .send()
        .await
        .expect("Failed to get product");
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        envelope(resp).await["message"],
        "get product failed: sql: no rows in result set"
    );
}

#[tokio::test]
#[ignore = "Requires running server and seeded database"]
async fn test_product_without_images_has_empty_list() {
    let ctx = TestContext::new().await;
    let admin = ctx.sign_in_admin().await;

    let resp = admin
        .bearer(ctx.client.post(ctx.url("/products")))
        .json(&json!({
            "title": format!("Plain {}", ri_shop_integration_tests::unique()),
            "description": "No pictures",
            "price": 10.5,
            "category": {"id": 1}
        }))
        .send()
        .await
        .expect("Failed to insert product");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = envelope(resp).await;
    assert_eq!(created["data"]["images"], json!([]));
    let id = created["data"]["id"].as_str().unwrap_or_default().to_owned();

    let resp = ctx
        .with_key(ctx.client.get(ctx.url(&format!("/products/{id}"))))
        .send()
        .await
        .expect("Failed to get product");
    let body = envelope(resp).await;
    assert_eq!(body["data"]["images"], json!([]));
    assert_eq!(body["data"]["category"]["id"], 1);

    let resp = admin
        .bearer(ctx.client.delete(ctx.url(&format!("/products/{id}"))))
        .send()
        .await
        .expect("Failed to delete product");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore = "Requires running server and seeded database"]
async fn test_search_products_paginates() {
    let ctx = TestContext::new().await;

    let resp = ctx
        .with_key(ctx.client.get(ctx.url("/products?search=COFFEE&limit=1&page=0")))
        .send()
        .await
        .expect("Failed to search products");
    assert_eq!(resp.status(), StatusCode::OK);
    let body = envelope(resp).await;
    assert_eq!(body["data"]["page"], 1);
    assert_eq!(body["data"]["limit"], 3);
    assert!(body["data"]["total_item"].as_i64().unwrap_or_default() >= 1);
    let titles: Vec<&str> = body["data"]["data"]
        .as_array()
        .map(|rows| rows.iter().filter_map(|p| p["title"].as_str()).collect())
        .unwrap_or_default();
    assert!(titles.contains(&"Coffee"));
}
