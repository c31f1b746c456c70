use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Duration;
use serde_json::json;

use super::helpers::{admin_request, json_body, order_body, test_config, TestServer};
use crate::middleware::ADMIN_TOKEN_HEADER;

#[actix_web::test]
async fn admin_routes_need_the_token() {
    let server = TestServer::new().await;
    let (status, _) = server.call(TestRequest::post().uri("/admin/sweep-expired")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::get().uri("/admin/orders").insert_header((ADMIN_TOKEN_HEADER, "guess"));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = server.call(admin_request(TestRequest::get().uri("/admin/orders"))).await;
    assert_eq!(status, StatusCode::OK);
    server.teardown().await;
}

#[actix_web::test]
async fn admin_routes_are_disabled_without_a_token() {
    let server = TestServer::with_config(test_config(None)).await;
    let (status, _) = server.call(admin_request(TestRequest::post().uri("/admin/sweep-expired"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    server.teardown().await;
}

#[actix_web::test]
async fn sweep_expires_overdue_orders() {
    let server = TestServer::new().await;
    server.add_item("mug", 3).await;
    let req = TestRequest::post().uri("/orders").set_json(order_body("old", "12", &[("mug", 2)]));
    assert_eq!(server.call(req).await.0, StatusCode::CREATED);
    server.clock.advance(Duration::minutes(10));
    let req = TestRequest::post().uri("/orders").set_json(order_body("new", "13", &[("mug", 1)]));
    assert_eq!(server.call(req).await.0, StatusCode::CREATED);
    server.clock.advance(Duration::minutes(6));

    let (status, body) = server.call(admin_request(TestRequest::post().uri("/admin/sweep-expired"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result = json_body(&body);
    assert_eq!(result["expired"], 1);
    assert_eq!(result["orders"][0]["order_id"], "old");
    assert_eq!(server.stock_of("mug").await, 2);

    let (_, body) = server.call(admin_request(TestRequest::post().uri("/admin/sweep-expired"))).await;
    assert_eq!(json_body(&body)["expired"], 0);
    server.teardown().await;
}

#[actix_web::test]
async fn search_orders() {
    let server = TestServer::new().await;
    server.add_item("mug", 10).await;
    for id in ["shop-1", "shop-2", "other-1"] {
        let req = TestRequest::post().uri("/orders").set_json(order_body(id, "5", &[("mug", 1)]));
        assert_eq!(server.call(req).await.0, StatusCode::CREATED);
    }
    assert_eq!(server.call(TestRequest::post().uri("/orders/shop-2/cancel")).await.0, StatusCode::OK);

    let (status, body) = server.call(admin_request(TestRequest::get().uri("/admin/orders?status=pending"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body).as_array().map(Vec::len), Some(2));

    let (_, body) = server.call(admin_request(TestRequest::get().uri("/admin/orders?q=shop"))).await;
    assert_eq!(json_body(&body).as_array().map(Vec::len), Some(2));

    let req = TestRequest::get().uri("/admin/orders?status=pending,cancelled&q=shop");
    let (_, body) = server.call(admin_request(req)).await;
    assert_eq!(json_body(&body).as_array().map(Vec::len), Some(2));

    let (status, _) = server.call(admin_request(TestRequest::get().uri("/admin/orders?status=lost"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    server.teardown().await;
}

#[actix_web::test]
async fn upsert_items() {
    let server = TestServer::new().await;
    let item = json!({ "sku": "mug", "name": "Mug", "price": "12.50", "stock": 4 });
    let (status, body) = server.call(admin_request(TestRequest::post().uri("/admin/items").set_json(&item))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json_body(&body)["stock"], 4);

    let items = json!([
        { "sku": "mug", "name": "Mug", "price": "12.50", "stock": 7 },
        { "sku": "spoon", "name": "Spoon", "price": "2", "stock": 20 }
    ]);
    let req = admin_request(TestRequest::post().uri("/admin/items/bulk").set_json(&items));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json_body(&body).as_array().map(Vec::len), Some(2));
    assert_eq!(server.stock_of("mug").await, 7);

    let bad = json!({ "sku": "mug", "name": "Mug", "price": "12.50", "stock": -1 });
    let (status, _) = server.call(admin_request(TestRequest::post().uri("/admin/items").set_json(&bad))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(server.stock_of("mug").await, 7);
    server.teardown().await;
}

#[actix_web::test]
async fn adjust_stock() {
    let server = TestServer::new().await;
    server.add_item("mug", 4).await;
    let adjust = |sku: &str, delta: i64| {
        admin_request(TestRequest::post().uri(&format!("/admin/items/{sku}/adjust")).set_json(json!({ "delta": delta })))
    };

    let (status, body) = server.call(adjust("mug", 6)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json_body(&body)["stock"], 10);

    let (status, _) = server.call(adjust("mug", -10)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.stock_of("mug").await, 0);

    let (status, body) = server.call(adjust("mug", -1)).await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(server.stock_of("mug").await, 0);

    let (status, _) = server.call(adjust("teapot", 1)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::post().uri("/admin/items/mug/adjust").set_json(json!({ "delta": 1 }));
    assert_eq!(server.call(req).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(server.stock_of("mug").await, 0);
    server.teardown().await;
}

#[actix_web::test]
async fn delete_items() {
    let server = TestServer::new().await;
    server.add_item("mug", 5).await;
    server.add_item("spoon", 5).await;
    let req = TestRequest::post().uri("/orders").set_json(order_body("ord-1", "10", &[("mug", 2)]));
    assert_eq!(server.call(req).await.0, StatusCode::CREATED);

    // Never ordered, so it is removed outright
    let (status, body) = server.call(admin_request(TestRequest::delete().uri("/admin/items/spoon"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json_body(&body)["result"], "deleted");
    assert!(server.state.inventory_api.item("spoon").await.expect("Error fetching item").is_none());

    // Referenced by ord-1, so it is kept with no stock
    let (status, body) = server.call(admin_request(TestRequest::delete().uri("/admin/items/mug"))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body = json_body(&body);
    assert_eq!(body["result"], "retired");
    assert_eq!(body["sku"], "mug");
    assert_eq!(body["stock"], 0);
    assert_eq!(server.stock_of("mug").await, 0);
    let (status, _) = server.call(TestRequest::get().uri("/orders/ord-1/items")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = server.call(admin_request(TestRequest::delete().uri("/admin/items/spoon"))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(server.call(TestRequest::delete().uri("/admin/items/mug")).await.0, StatusCode::UNAUTHORIZED);
    server.teardown().await;
}
