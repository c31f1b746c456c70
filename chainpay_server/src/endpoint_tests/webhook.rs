use actix_web::{http::StatusCode, test::TestRequest};

use super::helpers::{json_body, order_body, sign, usdt_webhook, TestServer, SIGNATURE_HEADER};

const TX: &str = "0xaaaa000000000000000000000000000000000000000000000000000000000001";

async fn server_with_order() -> TestServer {
    let server = TestServer::new().await;
    server.add_item("mug", 3).await;
    let req = TestRequest::post().uri("/orders").set_json(order_body("ord-1", "25.5", &[("mug", 1)]));
    assert_eq!(server.call(req).await.0, StatusCode::CREATED);
    server
}

fn signed(uri: &str, body: Vec<u8>) -> TestRequest {
    let signature = sign(&body);
    TestRequest::post()
        .uri(uri)
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, signature))
        .set_payload(body)
}

#[actix_web::test]
async fn signed_webhook_pays_the_order() {
    let server = server_with_order().await;
    let (status, body) = server.call(signed("/webhook", usdt_webhook(25_500_000, TX))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let summary = json_body(&body);
    assert_eq!(summary["paid"][0], "ord-1");

    let (_, body) = server.call(TestRequest::get().uri("/orders/ord-1")).await;
    let order = json_body(&body);
    assert_eq!(order["status"], "paid");
    assert_eq!(order["tx_hash"], TX);

    // Redelivery is acknowledged without paying anything twice
    let (status, body) = server.call(signed("/webhook", usdt_webhook(25_500_000, TX))).await;
    assert_eq!(status, StatusCode::OK);
    let summary = json_body(&body);
    assert_eq!(summary["already_processed"][0], "ord-1");
    assert_eq!(summary["paid"].as_array().map(Vec::len), Some(0));
    server.teardown().await;
}

#[actix_web::test]
async fn alchemy_path_is_an_alias() {
    let server = server_with_order().await;
    let (status, body) = server.call(signed("/webhook/alchemy", usdt_webhook(25_500_000, TX))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(json_body(&body)["paid"][0], "ord-1");
    server.teardown().await;
}

#[actix_web::test]
async fn unsigned_webhooks_are_rejected() {
    let server = server_with_order().await;
    let body = usdt_webhook(25_500_000, TX);
    let req = TestRequest::post().uri("/webhook").set_payload(body.clone());
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = TestRequest::post().uri("/webhook").insert_header((SIGNATURE_HEADER, "sha256=00ff")).set_payload(body);
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A valid signature over a different body
    let req = TestRequest::post()
        .uri("/webhook")
        .insert_header((SIGNATURE_HEADER, sign(b"{}")))
        .set_payload(usdt_webhook(25_500_000, TX));
    let (status, _) = server.call(req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = server.call(TestRequest::get().uri("/orders/ord-1")).await;
    assert_eq!(json_body(&body)["status"], "pending");
    server.teardown().await;
}

#[actix_web::test]
async fn malformed_payloads_are_bad_requests() {
    let server = server_with_order().await;
    let (status, _) = server.call(signed("/webhook", b"not json".to_vec())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    server.teardown().await;
}

#[actix_web::test]
async fn unmatched_transfers_are_acknowledged() {
    let server = server_with_order().await;
    let (status, body) = server.call(signed("/webhook", usdt_webhook(1_000_000, TX))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["unmatched"], 1);
    let (_, body) = server.call(TestRequest::get().uri("/orders/ord-1")).await;
    assert_eq!(json_body(&body)["status"], "pending");
    server.teardown().await;
}
