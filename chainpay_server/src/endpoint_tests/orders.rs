use actix_web::{http::StatusCode, test::TestRequest};
use chrono::Duration;

use super::helpers::{json_body, order_body, TestServer};

#[actix_web::test]
async fn health() {
    let server = TestServer::new().await;
    let (status, body) = server.call(TestRequest::get().uri("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "👍️\n");
    server.teardown().await;
}

#[actix_web::test]
async fn create_order_returns_payment_instructions() {
    let server = TestServer::new().await;
    server.add_item("mug", 3).await;
    let req = TestRequest::post().uri("/orders").set_json(order_body("ord-1", "25.5", &[("mug", 2)]));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let order = json_body(&body);
    assert_eq!(order["order_id"], "ord-1");
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment"]["amount_units"], "25500000");
    assert_eq!(order["payment"]["pay_to"], super::helpers::SHOP);
    assert_eq!(server.stock_of("mug").await, 1);

    // The same order again is not an error, and reserves nothing more
    let req = TestRequest::post().uri("/orders").set_json(order_body("ord-1", "25.5", &[("mug", 2)]));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.stock_of("mug").await, 1);
    server.teardown().await;
}

#[actix_web::test]
async fn conflicting_orders_are_rejected() {
    let server = TestServer::new().await;
    server.add_item("mug", 3).await;
    let req = TestRequest::post().uri("/orders").set_json(order_body("ord-1", "25.5", &[("mug", 1)]));
    assert_eq!(server.call(req).await.0, StatusCode::CREATED);

    let req = TestRequest::post().uri("/orders").set_json(order_body("ord-1", "30", &[("mug", 1)]));
    let (status, body) = server.call(req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(json_body(&body)["error"].as_str().is_some());

    let req = TestRequest::post().uri("/orders").set_json(order_body("ord-2", "10", &[("mug", 5)]));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(server.stock_of("mug").await, 2);
    server.teardown().await;
}

#[actix_web::test]
async fn bad_orders_are_rejected() {
    let server = TestServer::new().await;
    server.add_item("mug", 3).await;
    let cases = [
        order_body("ord-1", "-1", &[("mug", 1)]),
        order_body("ord-2", "10", &[("mug", 0)]),
        order_body("ord-3", "10", &[("teapot", 1)]),
        serde_json::json!({ "order_id": "ord-4", "asset": "DOGE", "amount": "10" }),
        serde_json::json!({ "asset": "USDT" }),
    ];
    for case in cases {
        let (status, body) = server.call(TestRequest::post().uri("/orders").set_json(&case)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{case} gave {body}");
    }
    assert_eq!(server.stock_of("mug").await, 3);
    server.teardown().await;
}

#[actix_web::test]
async fn fetch_order_and_items() {
    let server = TestServer::new().await;
    server.add_item("mug", 3).await;
    server.add_item("spoon", 5).await;
    let req = TestRequest::post().uri("/orders").set_json(order_body("ord-1", "12", &[("mug", 1), ("spoon", 2)]));
    assert_eq!(server.call(req).await.0, StatusCode::CREATED);

    let (status, body) = server.call(TestRequest::get().uri("/orders/ord-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["amount"], "12");

    let (status, body) = server.call(TestRequest::get().uri("/orders/ord-1/items")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body).as_array().map(Vec::len), Some(2));

    let (status, _) = server.call(TestRequest::get().uri("/orders/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.teardown().await;
}

#[actix_web::test]
async fn expired_orders_lose_their_payment_instructions() {
    let server = TestServer::new().await;
    server.add_item("mug", 3).await;
    let req = TestRequest::post().uri("/orders").set_json(order_body("ord-1", "12", &[("mug", 1)]));
    assert_eq!(server.call(req).await.0, StatusCode::CREATED);
    server.clock.advance(Duration::minutes(16));

    let (status, body) = server.call(TestRequest::get().uri("/orders/ord-1")).await;
    assert_eq!(status, StatusCode::OK);
    let order = json_body(&body);
    assert_eq!(order["status"], "expired");
    assert!(order.get("payment").is_none());
    assert_eq!(server.stock_of("mug").await, 3);
    server.teardown().await;
}

#[actix_web::test]
async fn cancel_order() {
    let server = TestServer::new().await;
    server.add_item("mug", 3).await;
    let req = TestRequest::post().uri("/orders").set_json(order_body("ord-1", "12", &[("mug", 2)]));
    assert_eq!(server.call(req).await.0, StatusCode::CREATED);

    let (status, body) = server.call(TestRequest::post().uri("/orders/ord-1/cancel")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "cancelled");
    assert_eq!(server.stock_of("mug").await, 3);

    // Cancelling twice changes nothing
    let (status, _) = server.call(TestRequest::post().uri("/orders/ord-1/cancel")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(server.stock_of("mug").await, 3);

    let (status, _) = server.call(TestRequest::post().uri("/orders/nope/cancel")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    server.teardown().await;
}

#[actix_web::test]
async fn list_items() {
    let server = TestServer::new().await;
    server.add_item("mug", 3).await;
    let (status, body) = server.call(TestRequest::get().uri("/items")).await;
    assert_eq!(status, StatusCode::OK);
    let items = json_body(&body);
    assert_eq!(items[0]["sku"], "mug");
    assert_eq!(items[0]["stock"], 3);
    server.teardown().await;
}
