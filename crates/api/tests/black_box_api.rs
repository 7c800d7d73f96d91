use reqwest::StatusCode;
use serde_json::json;

use tenderdesk_core::AdminId;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = tenderdesk_api::app::build_app().await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn admin_header() -> String {
    AdminId::new().to_string()
}

fn tender_body() -> serde_json::Value {
    json!({
        "title": "Substation breakers",
        "description": "10 MCBs for Warehouse-1",
        "items": [{ "name": "MCB", "quantity": 10, "unit": "piece" }],
        "store": "Warehouse-1",
    })
}

fn bid_body() -> serde_json::Value {
    json!({
        "lines": [{ "item": "MCB", "price": 9950 }],
        "contact_info": { "name": "Acme", "email": "a@x.com", "phone": "9876543210" },
    })
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", srv.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_identity_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    let client = reqwest::Client::new();
    let res = client
        .post(format!("{}/tenders", srv.base_url))
        .json(&tender_body())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tender_browsing_and_bidding_are_public() {
    let srv = TestServer::spawn().await;
    let admin = admin_header();
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/tenders", srv.base_url))
        .header("x-admin-id", &admin)
        .json(&tender_body())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let tender: serde_json::Value = res.json().await.unwrap();
    let tender_id = tender["id"].as_str().unwrap().to_string();

    // Browsing requires no identity.
    let res = client
        .get(format!("{}/tenders", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let listed: serde_json::Value = res.json().await.unwrap();
    assert_eq!(listed["items"].as_array().unwrap().len(), 1);

    // Neither does submitting a bid.
    let res = client
        .post(format!("{}/tenders/{}/bids", srv.base_url, tender_id))
        .json(&bid_body())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let bid: serde_json::Value = res.json().await.unwrap();
    assert_eq!(bid["status"], "pending");
    assert_eq!(bid["contact_info"]["email"], "a@x.com");
}

#[tokio::test]
async fn bid_submission_rejects_malformed_contact_info() {
    let srv = TestServer::spawn().await;
    let admin = admin_header();
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/tenders", srv.base_url))
        .header("x-admin-id", &admin)
        .json(&tender_body())
        .send()
        .await
        .unwrap();
    let tender: serde_json::Value = res.json().await.unwrap();
    let tender_id = tender["id"].as_str().unwrap();

    let mut body = bid_body();
    body["contact_info"]["email"] = json!("not-an-email");
    let res = client
        .post(format!("{}/tenders/{}/bids", srv.base_url, tender_id))
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let err: serde_json::Value = res.json().await.unwrap();
    assert_eq!(err["error"], "validation_error");
}

#[tokio::test]
async fn full_award_flow_updates_every_aggregate() {
    let srv = TestServer::spawn().await;
    let admin = admin_header();
    let client = reqwest::Client::new();

    // Provision the catalog target.
    let res = client
        .post(format!("{}/products", srv.base_url))
        .header("x-admin-id", &admin)
        .json(&json!({ "name": "MCB", "stock": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    // Open the tender and take two bids.
    let res = client
        .post(format!("{}/tenders", srv.base_url))
        .header("x-admin-id", &admin)
        .json(&tender_body())
        .send()
        .await
        .unwrap();
    let tender: serde_json::Value = res.json().await.unwrap();
    let tender_id = tender["id"].as_str().unwrap().to_string();

    let mut bid_ids = Vec::new();
    for _ in 0..2 {
        let res = client
            .post(format!("{}/tenders/{}/bids", srv.base_url, tender_id))
            .json(&bid_body())
            .send()
            .await
            .unwrap();
        let bid: serde_json::Value = res.json().await.unwrap();
        bid_ids.push(bid["id"].as_str().unwrap().to_string());
    }

    // Award the first bid.
    let res = client
        .post(format!("{}/tenders/{}/award", srv.base_url, tender_id))
        .header("x-admin-id", &admin)
        .json(&json!({
            "winning_bid_id": bid_ids[0],
            "items": [{ "name": "MCB", "quantity": 10 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: serde_json::Value = res.json().await.unwrap();
    assert_eq!(outcome["tender"]["status"], "awarded");
    assert!(outcome["unresolved_items"].as_array().unwrap().is_empty());

    // Every competing bid is resolved.
    let res = client
        .get(format!("{}/tenders/{}/bids", srv.base_url, tender_id))
        .header("x-admin-id", &admin)
        .send()
        .await
        .unwrap();
    let bids: serde_json::Value = res.json().await.unwrap();
    let statuses: Vec<_> = bids["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| (b["id"].as_str().unwrap().to_string(), b["status"].clone()))
        .collect();
    for (id, status) in &statuses {
        if id == &bid_ids[0] {
            assert_eq!(status, &json!("accepted"));
        } else {
            assert_eq!(status, &json!("rejected"));
        }
    }

    // Stock went up by the awarded quantity.
    let res = client
        .get(format!("{}/products", srv.base_url))
        .header("x-admin-id", &admin)
        .send()
        .await
        .unwrap();
    let products: serde_json::Value = res.json().await.unwrap();
    assert_eq!(products["items"][0]["stock"], 15);

    // The store ledger was created lazily with the awarded line.
    let res = client
        .get(format!("{}/stores", srv.base_url))
        .header("x-admin-id", &admin)
        .send()
        .await
        .unwrap();
    let stores: serde_json::Value = res.json().await.unwrap();
    assert_eq!(stores["items"][0]["name"], "Warehouse-1");
    assert_eq!(stores["items"][0]["items"][0]["quantity"], 10);

    // A second award attempt is a state-machine violation.
    let res = client
        .post(format!("{}/tenders/{}/award", srv.base_url, tender_id))
        .header("x-admin-id", &admin)
        .json(&json!({
            "winning_bid_id": bid_ids[1],
            "items": [{ "name": "MCB", "quantity": 10 }],
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn closing_a_tender_rejects_pending_bids() {
    let srv = TestServer::spawn().await;
    let admin = admin_header();
    let client = reqwest::Client::new();

    let res = client
        .post(format!("{}/tenders", srv.base_url))
        .header("x-admin-id", &admin)
        .json(&tender_body())
        .send()
        .await
        .unwrap();
    let tender: serde_json::Value = res.json().await.unwrap();
    let tender_id = tender["id"].as_str().unwrap().to_string();

    client
        .post(format!("{}/tenders/{}/bids", srv.base_url, tender_id))
        .json(&bid_body())
        .send()
        .await
        .unwrap();

    let res = client
        .post(format!("{}/tenders/{}/close", srv.base_url, tender_id))
        .header("x-admin-id", &admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let closed: serde_json::Value = res.json().await.unwrap();
    assert_eq!(closed["status"], "closed");

    // Bidding against a closed tender fails.
    let res = client
        .post(format!("{}/tenders/{}/bids", srv.base_url, tender_id))
        .json(&bid_body())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let res = client
        .get(format!("{}/tenders/{}/bids", srv.base_url, tender_id))
        .header("x-admin-id", &admin)
        .send()
        .await
        .unwrap();
    let bids: serde_json::Value = res.json().await.unwrap();
    assert!(bids["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|b| b["status"] == "rejected"));
}
