mod common;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use common::{Harness, SECRET, notification_body, signature_for};
use stampforge::domain::artifact::{PaymentStatus, decode_image};
use stampforge::domain::payment::GatewayStatus;
use stampforge::domain::ports::ArtifactStore;
use stampforge::infrastructure::multipart::MultipartForm;
use stampforge::interfaces::http::router;
use tower::ServiceExt;

async fn send(h: &Harness, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router(h.app_state()).oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn multipart_request(uri: &str, form: MultipartForm) -> Request<Body> {
    let (content_type, body) = form.finish();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", content_type)
        .body(Body::from(body))
        .unwrap()
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new();
    let (status, body) = send(&h, empty_request("GET", "/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "ok");
}

#[tokio::test]
async fn test_generate_and_query() {
    let h = Harness::new();

    let (status, body) = send(
        &h,
        json_request("POST", "/images/generate", serde_json::json!({ "prompt": "a red fox" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let created = json(&body);
    let id = created["id"].as_str().unwrap().to_string();
    assert!(created["stampImg"].is_string());
    assert!(created["previewImg"].is_string());
    assert!(created.get("paymentStatus").is_none());

    let (status, body) = send(&h, empty_request("GET", &format!("/images/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body), created);

    let (status, body) = send(&h, empty_request("GET", "/images")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().unwrap().len(), 1);

    let (status, _) = send(&h, empty_request("DELETE", &format!("/images/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&h, empty_request("GET", &format!("/images/{}", id))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["error"].is_string());
}

#[tokio::test]
async fn test_generate_without_prompt_is_bad_request() {
    let h = Harness::new();
    let (status, _) = send(
        &h,
        json_request("POST", "/images/generate", serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_provider_errors_map_to_gateway_statuses() {
    let h = Harness::new();

    h.provider.set_mode(common::ProviderMode::Rejects);
    let (status, body) = send(
        &h,
        json_request("POST", "/images/generate", serde_json::json!({ "prompt": "a red fox" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json(&body)["provider"]["name"], "content_moderation");

    h.provider.set_mode(common::ProviderMode::Down);
    let (status, _) = send(
        &h,
        json_request("POST", "/images/preview-first", serde_json::json!({ "prompt": "a red fox" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_sketch_upload() {
    let h = Harness::new();

    let form = MultipartForm::new()
        .text("prompt", "a blue wave")
        .file("sketch", "sketch.png", "image/png", b"lines");
    let (status, body) = send(&h, multipart_request("/images/sketch", form)).await;
    assert_eq!(status, StatusCode::CREATED);
    let stamp = decode_image(json(&body)["stampImg"].as_str().unwrap()).unwrap();
    assert_eq!(stamp, b"sketch-stamp:a blue wave|lines|");

    let form = MultipartForm::new().text("prompt", "a blue wave");
    let (status, _) = send(&h, multipart_request("/images/sketch", form)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_remove_background_and_upscale() {
    let h = Harness::new();

    let form = MultipartForm::new().file("image", "photo.png", "image/png", b"photo");
    let (status, body) = send(&h, multipart_request("/images/remove-background", form)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(json(&body)["removedBackgroundImg"].is_string());

    let form = MultipartForm::new().file("image", "photo.png", "image/png", b"photo");
    let (status, body) = send(&h, multipart_request("/images/upscale", form)).await;
    assert_eq!(status, StatusCode::OK);
    let result = decode_image(json(&body)["result"].as_str().unwrap()).unwrap();
    assert_eq!(result, b"upscaled:photo|");

    // Only the background-removal record was stored.
    assert_eq!(h.store.get_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_delete_all() {
    let h = Harness::new();
    for prompt in ["a red fox", "a blue wave"] {
        h.pipeline.generate_from_prompt(prompt).await.unwrap();
    }

    let (status, body) = send(&h, empty_request("DELETE", "/images")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["deleted"], 2);
    assert!(h.store.get_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_attach_payment_routes() {
    let h = Harness::new();
    let artifact = h.pipeline.generate_from_prompt("a red fox").await.unwrap();
    let request = serde_json::json!({
        "itemTitle": "Custom t-shirt",
        "itemPrice": 79.9,
        "backUrlSuccess": "https://shop.example.com/thanks",
    });

    let (status, _) = send(
        &h,
        json_request("POST", "/payments/image/missing", request.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(h.gateway.session_count(), 0);

    let uri = format!("/payments/image/{}", artifact.id);
    let (status, body) = send(&h, json_request("POST", &uri, request)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json(&body)["paymentStatus"], "PENDING");

    let (status, body) = send(&h, empty_request("GET", &uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["paymentId"], "pref-1");
    assert_eq!(json(&body)["artifactId"], artifact.id.as_str());
}

#[tokio::test]
async fn test_status_patch() {
    let h = Harness::new();
    let artifact = h.pipeline.generate_from_prompt("a red fox").await.unwrap();
    h.payments
        .attach_payment(&artifact.id, common::payment_request())
        .await
        .unwrap();
    let uri = format!("/payments/{}/status", artifact.id);

    let (status, _) = send(
        &h,
        json_request("PATCH", &uri, serde_json::json!({ "status": "bogus" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &h,
        json_request("PATCH", &uri, serde_json::json!({ "status": "rejected" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["paymentStatus"], "REJECTED");

    let (status, _) = send(
        &h,
        json_request("PATCH", &uri, serde_json::json!({ "status": "APPROVED" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(
        &h,
        empty_request("POST", &format!("/payments/image/{}/deliver", artifact.id)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

fn webhook_request(body: String, signature: Option<String>, query: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/payments/notification{}", query))
        .header("content-type", "application/json")
        .header("x-request-id", "req-1");
    if let Some(signature) = signature {
        builder = builder.header("x-signature", signature);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_webhook_approval_flow() {
    let h = Harness::new();
    let artifact = h.pipeline.generate_from_prompt("a red fox").await.unwrap();
    h.payments
        .attach_payment(&artifact.id, common::payment_request())
        .await
        .unwrap();
    h.gateway.report("555", GatewayStatus::Approved, &artifact.id);

    let signature = signature_for(SECRET, "555", "req-1", "1700000000");
    let body = notification_body("payment", "555").to_string();

    let (status, text) = send(
        &h,
        webhook_request(body.clone(), Some(signature.clone()), "?data.id=555&type=payment"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(text).unwrap(), "Payment processed");

    let (status, text) = send(&h, webhook_request(body, Some(signature), "")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(text).unwrap(), "Payment already APPROVED");

    let stored = h.store.get(&artifact.id).await.unwrap().unwrap();
    assert_eq!(stored.payment_status, Some(PaymentStatus::Approved));
    assert_eq!(h.mailer.sent().len(), 1);
}

#[tokio::test]
async fn test_webhook_rejections() {
    let h = Harness::new();

    let body = notification_body("payment", "555").to_string();
    let (status, _) = send(&h, webhook_request(body.clone(), None, "")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let forged = signature_for("wrong", "555", "req-1", "1");
    let (status, _) = send(&h, webhook_request(body.clone(), Some(forged), "")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A garbage body with a bad signature is still refused as forged.
    let (status, _) = send(&h, webhook_request("not json".to_string(), None, "")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Authentic but malformed.
    let signature = signature_for(SECRET, "9", "req-1", "1");
    let (status, _) = send(
        &h,
        webhook_request("not json".to_string(), Some(signature), "?data.id=9"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Authentic, but the gateway cannot describe the payment.
    let signature = signature_for(SECRET, "555", "req-1", "1");
    let (status, _) = send(&h, webhook_request(body, Some(signature), "")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_webhook_for_unattached_artifact_is_ok() {
    let h = Harness::new();
    let artifact = h.pipeline.generate_from_prompt("a red fox").await.unwrap();
    h.gateway.report("555", GatewayStatus::Approved, &artifact.id);

    let signature = signature_for(SECRET, "555", "req-1", "1700000000");
    let body = notification_body("payment", "555").to_string();
    let (status, _) = send(&h, webhook_request(body, Some(signature), "")).await;

    assert_eq!(status, StatusCode::OK);
    let stored = h.store.get(&artifact.id).await.unwrap().unwrap();
    assert!(stored.payment_status.is_none());
    assert!(h.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_attach_without_stamp_is_conflict() {
    let h = Harness::new();
    let artifact = h.pipeline.generate_preview_first("a red fox").await.unwrap();
    let request = serde_json::json!({
        "itemTitle": "Custom t-shirt",
        "itemPrice": 79.9,
        "backUrlSuccess": "https://shop.example.com/thanks",
    });

    let uri = format!("/payments/image/{}", artifact.id);
    let (status, _) = send(&h, json_request("POST", &uri, request)).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(h.gateway.session_count(), 0);
}

#[tokio::test]
async fn test_unknown_route() {
    let h = Harness::new();
    let (status, _) = send(&h, empty_request("GET", "/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
