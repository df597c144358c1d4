mod common;

use axum::http::{Method, StatusCode};
use procurement_api::auth::Role;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{expect_status, MultipartPart, TestApp};

const PROFORMA_TEXT: &[u8] =
    b"Vendor: Acme Supplies\n2 x Mouse @ $25.00\n1 Laptop Stand 45.00\nTotal: $95.00\n";

struct Actors {
    staff_id: Uuid,
    staff: String,
    manager1: String,
    manager2: String,
    finance: String,
}

fn actors(app: &TestApp) -> Actors {
    let staff_id = Uuid::new_v4();
    Actors {
        staff_id,
        staff: app.token(staff_id, "Sam", Role::Staff),
        manager1: app.token(Uuid::new_v4(), "Maya", Role::ManagerLevel1),
        manager2: app.token(Uuid::new_v4(), "Mel", Role::ManagerLevel2),
        finance: app.token(Uuid::new_v4(), "Fin", Role::Finance),
    }
}

async fn create_request(app: &TestApp, staff_token: &str) -> String {
    let payload = json!({
        "title": "Office kit",
        "description": "Replacement peripherals",
        "items": [
            {"description": "Mouse", "quantity": 2, "unit_price": "25.00"},
            {"description": "Laptop Stand", "quantity": 1, "unit_price": "45.00"}
        ]
    })
    .to_string();
    let parts = [
        MultipartPart {
            name: "payload",
            filename: None,
            content_type: "application/json",
            data: payload.as_bytes(),
        },
        MultipartPart {
            name: "proforma",
            filename: Some("proforma.txt"),
            content_type: "text/plain",
            data: PROFORMA_TEXT,
        },
    ];
    let response = app
        .request_multipart(Method::POST, "/api/v1/purchase-requests", staff_token, &parts)
        .await;
    let body = expect_status(response, StatusCode::CREATED).await;
    body["id"].as_str().unwrap().to_string()
}

async fn approve_fully(app: &TestApp, actors: &Actors, id: &str) {
    for token in [&actors.manager1, &actors.manager2, &actors.finance] {
        let response = app
            .request_json(
                Method::POST,
                &format!("/api/v1/purchase-requests/{}/approve", id),
                Some(token),
                None,
            )
            .await;
        expect_status(response, StatusCode::OK).await;
    }
}

async fn upload_receipt(app: &TestApp, token: &str, id: &str, content: &[u8]) -> (StatusCode, Value) {
    let parts = [MultipartPart {
        name: "file",
        filename: Some("receipt.txt"),
        content_type: "text/plain",
        data: content,
    }];
    let response = app
        .request_multipart(
            Method::POST,
            &format!("/api/v1/purchase-requests/{}/receipts", id),
            token,
            &parts,
        )
        .await;
    let status = response.status();
    (status, common::response_json(response).await)
}

#[tokio::test]
async fn receipt_upload_requires_a_purchase_order() {
    let app = TestApp::new().await;
    let actors = actors(&app);
    let id = create_request(&app, &actors.staff).await;

    let (status, _) = upload_receipt(&app, &actors.staff, &id, b"Acme Supplies\nTotal: $95.00").await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn matching_receipt_validates_cleanly() {
    let app = TestApp::new().await;
    let actors = actors(&app);
    let id = create_request(&app, &actors.staff).await;
    approve_fully(&app, &actors, &id).await;

    let receipt = b"Acme Supplies\n2 x Mouse @ $25.00\n1 Laptop Stand 45.00\nTotal: $95.00\n";
    let (status, body) = upload_receipt(&app, &actors.staff, &id, receipt).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["validated"], true);
    assert_eq!(body["reconciliation"]["validated"], true);
    assert_eq!(
        body["reconciliation"]["discrepancies"].as_array().unwrap().len(),
        0
    );
    assert!(body["file_key"].as_str().unwrap().starts_with("receipts/"));
}

#[tokio::test]
async fn discrepant_receipt_is_stored_with_flags() {
    let app = TestApp::new().await;
    let actors = actors(&app);
    let id = create_request(&app, &actors.staff).await;
    approve_fully(&app, &actors, &id).await;

    let receipt = b"Other Corp\n1 x Pencil @ $200.00\nTotal: $200.00\n";
    let (status, body) = upload_receipt(&app, &actors.staff, &id, receipt).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["validated"], false);

    let kinds: Vec<&str> = body["reconciliation"]["discrepancies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["type"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"vendor_mismatch"));
    assert!(kinds.contains(&"amount_mismatch"));
    assert!(kinds.contains(&"item_count_mismatch"));
    assert!(kinds.contains(&"item_mismatch"));

    let amount = body["reconciliation"]["discrepancies"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["type"] == "amount_mismatch")
        .unwrap()
        .clone();
    assert_eq!(amount["receipt_amount"], "200.00");
    assert_eq!(amount["po_amount"], "95.00");
}

#[tokio::test]
async fn receipt_listing_and_access_control() {
    let app = TestApp::new().await;
    let actors = actors(&app);
    let id = create_request(&app, &actors.staff).await;
    approve_fully(&app, &actors, &id).await;

    let receipt = b"Acme Supplies\n2 x Mouse @ $25.00\n1 Laptop Stand 45.00\nTotal: $95.00\n";
    upload_receipt(&app, &actors.staff, &id, receipt).await;
    upload_receipt(&app, &actors.finance, &id, receipt).await;

    // An unrelated staff member cannot attach receipts.
    let other = app.token(Uuid::new_v4(), "Alex", Role::Staff);
    let (status, _) = upload_receipt(&app, &other, &id, receipt).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let response = app
        .request_json(
            Method::GET,
            &format!("/api/v1/purchase-requests/{}/receipts", id),
            Some(&actors.staff),
            None,
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    let receipts = body.as_array().unwrap();
    assert_eq!(receipts.len(), 2);
    assert_eq!(receipts[0]["uploaded_by"], json!(actors.staff_id));

    let response = app
        .request_json(
            Method::GET,
            "/api/v1/purchase-requests/00000000-0000-0000-0000-000000000000/receipts",
            Some(&actors.staff),
            None,
        )
        .await;
    expect_status(response, StatusCode::NOT_FOUND).await;
}

#[tokio::test]
async fn stored_files_can_be_downloaded() {
    let app = TestApp::new().await;
    let actors = actors(&app);
    let id = create_request(&app, &actors.staff).await;
    approve_fully(&app, &actors, &id).await;

    let response = app
        .request_json(
            Method::GET,
            &format!("/api/v1/purchase-requests/{}", id),
            Some(&actors.staff),
            None,
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    let document_key = body["purchase_order"]["document_key"]
        .as_str()
        .expect("purchase order document key")
        .to_string();

    let response = app
        .request_json(
            Method::GET,
            &format!("/api/v1/files/{}", document_key),
            Some(&actors.staff),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("PURCHASE ORDER"));
    assert!(text.contains("Total: 95.00"));
}
