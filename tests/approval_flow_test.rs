mod common;

use axum::http::{Method, StatusCode};
use procurement_api::auth::Role;
use serde_json::{json, Value};
use uuid::Uuid;

use common::{expect_status, MultipartPart, TestApp};

const PROFORMA_TEXT: &[u8] = b"Vendor: Acme Supplies\n2 x Mouse @ $25.00\n1 Laptop Stand 45.00\nTotal: $95.00\n";

fn create_payload() -> Value {
    json!({
        "title": "Office kit",
        "description": "Replacement peripherals",
        "items": [
            {"description": "Mouse", "quantity": 2, "unit_price": "25.00"},
            {"description": "Laptop Stand", "quantity": 1, "unit_price": "45.00"}
        ]
    })
}

async fn create_request(app: &TestApp, staff_token: &str) -> Value {
    let payload = create_payload().to_string();
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
    expect_status(response, StatusCode::CREATED).await
}

#[tokio::test]
async fn full_approval_flow_generates_a_purchase_order() {
    let app = TestApp::new().await;
    let staff = app.token(Uuid::new_v4(), "Sam", Role::Staff);
    let manager1 = app.token(Uuid::new_v4(), "Maya", Role::ManagerLevel1);
    let manager2 = app.token(Uuid::new_v4(), "Mel", Role::ManagerLevel2);
    let finance = app.token(Uuid::new_v4(), "Fin", Role::Finance);

    let created = create_request(&app, &staff).await;
    let id = created["id"].as_str().expect("request id").to_string();
    assert_eq!(created["status"], "pending");
    assert_eq!(created["amount"], "95.00");
    assert_eq!(created["items"].as_array().unwrap().len(), 2);

    // Finance cannot jump ahead of the manager levels.
    let response = app
        .request_json(
            Method::POST,
            &format!("/api/v1/purchase-requests/{}/approve", id),
            Some(&finance),
            None,
        )
        .await;
    expect_status(response, StatusCode::CONFLICT).await;

    // Staff cannot approve at all.
    let response = app
        .request_json(
            Method::POST,
            &format!("/api/v1/purchase-requests/{}/approve", id),
            Some(&staff),
            None,
        )
        .await;
    expect_status(response, StatusCode::FORBIDDEN).await;

    // The manager levels may decide in either order; level 2 goes first here.
    let response = app
        .request_json(
            Method::POST,
            &format!("/api/v1/purchase-requests/{}/approve", id),
            Some(&manager2),
            None,
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["approval"]["level"], 2);
    assert_eq!(body["approval"]["approved"], true);
    assert_eq!(body["status"], "pending");

    // One manager approval is not enough for finance.
    let response = app
        .request_json(
            Method::POST,
            &format!("/api/v1/purchase-requests/{}/approve", id),
            Some(&finance),
            None,
        )
        .await;
    expect_status(response, StatusCode::CONFLICT).await;

    // Level 1 approves once, and only once.
    let response = app
        .request_json(
            Method::POST,
            &format!("/api/v1/purchase-requests/{}/approve", id),
            Some(&manager1),
            Some(json!({"comments": "looks fine"})),
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["approval"]["level"], 1);
    assert_eq!(body["status"], "pending");

    let response = app
        .request_json(
            Method::POST,
            &format!("/api/v1/purchase-requests/{}/approve", id),
            Some(&manager1),
            None,
        )
        .await;
    expect_status(response, StatusCode::CONFLICT).await;

    let response = app
        .request_json(
            Method::POST,
            &format!("/api/v1/purchase-requests/{}/approve", id),
            Some(&finance),
            None,
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["status"], "approved");
    let po = &body["purchase_order"];
    assert!(po["po_number"].as_str().unwrap().starts_with("PO-"));
    assert_eq!(po["vendor"], "Acme Supplies");
    assert_eq!(po["total_amount"], "95.00");
    assert_eq!(po["item_snapshot"].as_array().unwrap().len(), 2);

    // Approving an already approved request conflicts.
    let response = app
        .request_json(
            Method::POST,
            &format!("/api/v1/purchase-requests/{}/approve", id),
            Some(&finance),
            None,
        )
        .await;
    expect_status(response, StatusCode::CONFLICT).await;

    // Detail view shows the terminal state and both manager approvals.
    let response = app
        .request_json(
            Method::GET,
            &format!("/api/v1/purchase-requests/{}", id),
            Some(&staff),
            None,
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["status"], "approved");
    assert_eq!(body["approvals"].as_array().unwrap().len(), 2);
    assert!(body["purchase_order"].is_object());
    assert!(body["purchase_order_id"].is_string());

    // Terminal requests cannot be edited.
    let response = app
        .request_json(
            Method::PUT,
            &format!("/api/v1/purchase-requests/{}", id),
            Some(&staff),
            Some(json!({"title": "Renamed"})),
        )
        .await;
    expect_status(response, StatusCode::CONFLICT).await;
}

#[tokio::test]
async fn rejection_is_terminal() {
    let app = TestApp::new().await;
    let staff = app.token(Uuid::new_v4(), "Sam", Role::Staff);
    let manager1 = app.token(Uuid::new_v4(), "Maya", Role::ManagerLevel1);
    let manager2 = app.token(Uuid::new_v4(), "Mel", Role::ManagerLevel2);
    let finance = app.token(Uuid::new_v4(), "Fin", Role::Finance);

    let created = create_request(&app, &staff).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Rejection belongs to the manager levels; finance only gates approval.
    let response = app
        .request_json(
            Method::POST,
            &format!("/api/v1/purchase-requests/{}/reject", id),
            Some(&finance),
            None,
        )
        .await;
    expect_status(response, StatusCode::FORBIDDEN).await;

    let response = app
        .request_json(
            Method::POST,
            &format!("/api/v1/purchase-requests/{}/reject", id),
            Some(&manager1),
            Some(json!({"comments": "over budget"})),
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["status"], "rejected");
    assert_eq!(body["approval"]["approved"], false);

    // Nothing moves after a rejection.
    let response = app
        .request_json(
            Method::POST,
            &format!("/api/v1/purchase-requests/{}/approve", id),
            Some(&manager2),
            None,
        )
        .await;
    expect_status(response, StatusCode::CONFLICT).await;

    let response = app
        .request_json(
            Method::GET,
            &format!("/api/v1/purchase-requests/{}", id),
            Some(&staff),
            None,
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["status"], "rejected");
    assert!(body["purchase_order"].is_null() || body.get("purchase_order").is_none());

    // The failed approval left no row behind; only the rejection is recorded.
    let approvals = body["approvals"].as_array().unwrap();
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0]["approved"], false);
}

#[tokio::test]
async fn editing_a_pending_request_recomputes_the_amount() {
    let app = TestApp::new().await;
    let staff_id = Uuid::new_v4();
    let staff = app.token(staff_id, "Sam", Role::Staff);
    let other_staff = app.token(Uuid::new_v4(), "Alex", Role::Staff);

    let created = create_request(&app, &staff).await;
    let id = created["id"].as_str().unwrap().to_string();

    // Only the creator may edit.
    let response = app
        .request_json(
            Method::PUT,
            &format!("/api/v1/purchase-requests/{}", id),
            Some(&other_staff),
            Some(json!({"title": "Hijacked"})),
        )
        .await;
    expect_status(response, StatusCode::FORBIDDEN).await;

    let response = app
        .request_json(
            Method::PUT,
            &format!("/api/v1/purchase-requests/{}", id),
            Some(&staff),
            Some(json!({
                "items": [
                    {"description": "Keyboard", "quantity": 3, "unit_price": "40.00"}
                ]
            })),
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["amount"], "120.00");
    assert_eq!(body["items"].as_array().unwrap().len(), 1);
    assert_eq!(body["items"][0]["description"], "Keyboard");
}

#[tokio::test]
async fn omitted_items_are_populated_from_the_proforma() {
    let app = TestApp::new().await;
    let staff = app.token(Uuid::new_v4(), "Sam", Role::Staff);

    let payload = json!({"title": "Office kit", "description": ""}).to_string();
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
        .request_multipart(Method::POST, "/api/v1/purchase-requests", &staff, &parts)
        .await;
    let body = expect_status(response, StatusCode::CREATED).await;
    let descriptions: Vec<&str> = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["description"].as_str().unwrap())
        .collect();
    assert_eq!(descriptions, vec!["Mouse", "Laptop Stand"]);
    assert_eq!(body["amount"], "95.00");

    // Without items or a proforma there is nothing to buy.
    let bare = [MultipartPart {
        name: "payload",
        filename: None,
        content_type: "application/json",
        data: payload.as_bytes(),
    }];
    let response = app
        .request_multipart(Method::POST, "/api/v1/purchase-requests", &staff, &bare)
        .await;
    expect_status(response, StatusCode::BAD_REQUEST).await;
}

#[tokio::test]
async fn create_requires_auth_and_staff_role() {
    let app = TestApp::new().await;
    let manager = app.token(Uuid::new_v4(), "Maya", Role::ManagerLevel1);

    let response = app
        .request_json(Method::GET, "/api/v1/purchase-requests", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let payload = create_payload().to_string();
    let parts = [MultipartPart {
        name: "payload",
        filename: None,
        content_type: "application/json",
        data: payload.as_bytes(),
    }];
    let response = app
        .request_multipart(Method::POST, "/api/v1/purchase-requests", &manager, &parts)
        .await;
    expect_status(response, StatusCode::FORBIDDEN).await;
}

#[tokio::test]
async fn list_filters_by_status() {
    let app = TestApp::new().await;
    let staff = app.token(Uuid::new_v4(), "Sam", Role::Staff);

    create_request(&app, &staff).await;
    create_request(&app, &staff).await;

    let response = app
        .request_json(
            Method::GET,
            "/api/v1/purchase-requests?status=pending",
            Some(&staff),
            None,
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["requests"].as_array().unwrap().len(), 2);

    let response = app
        .request_json(
            Method::GET,
            "/api/v1/purchase-requests?status=approved",
            Some(&staff),
            None,
        )
        .await;
    let body = expect_status(response, StatusCode::OK).await;
    assert_eq!(body["total"], 0);

    let response = app
        .request_json(
            Method::GET,
            "/api/v1/purchase-requests/00000000-0000-0000-0000-000000000000",
            Some(&staff),
            None,
        )
        .await;
    expect_status(response, StatusCode::NOT_FOUND).await;
}
