//! HTTP-level tests: the real router over an in-memory database, driven
//! with `tower::ServiceExt::oneshot`.

use apotheca_api::{router, AppConfig, AppState};
use apotheca_core::{Money, Role};
use apotheca_db::repository::branch::NewBranch;
use apotheca_db::repository::product::{ImportRow, NewProduct};
use apotheca_db::repository::staff::{NewPharmacist, NewUser};
use apotheca_db::{Database, DbConfig};
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

const PIN: &str = "2468";
const ADMIN_PASSWORD: &str = "admin-pass-1";
const BARCODE: &str = "4800000000123";

struct TestApp {
    app: Router,
    branch_id: String,
    staff_id: String,
    product_id: String,
}

async fn spawn_app() -> TestApp {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();

    let branch = db
        .branches()
        .create(&NewBranch {
            branch_code: "B01".to_string(),
            branch_name: "Main Branch".to_string(),
            address: None,
        })
        .await
        .unwrap();

    db.staff()
        .create_user(&NewUser {
            employee_id: "ADMIN-001".to_string(),
            name: "Admin".to_string(),
            email: None,
            role: Role::Admin,
            branch_id: None,
            password: ADMIN_PASSWORD.to_string(),
        })
        .await
        .unwrap();

    let pharmacist = db
        .staff()
        .create_pharmacist(&NewPharmacist {
            name: "Counter One".to_string(),
            branch_id: branch.id.clone(),
            pin: PIN.to_string(),
        })
        .await
        .unwrap();

    let product = db
        .products()
        .create(&NewProduct {
            name: "Paracetamol 500mg".to_string(),
            brand_name: Some("Biogesic".to_string()),
            barcode: Some(BARCODE.to_string()),
            price_cents: Money::from_cents(550),
            critical_level: 10,
            ..Default::default()
        })
        .await
        .unwrap();

    db.products()
        .bulk_import(
            &branch.id,
            &[ImportRow {
                barcode: BARCODE.to_string(),
                name: None,
                brand_name: None,
                price_cents: None,
                quantity: 5,
                expiry_date: None,
            }],
        )
        .await
        .unwrap();

    let state = AppState::new(db, AppConfig::default()).unwrap();

    TestApp {
        app: router(state),
        branch_id: branch.id,
        staff_id: pharmacist.id,
        product_id: product.id,
    }
}

impl TestApp {
    async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn pos_login(&self) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/pos/login",
                None,
                Some(json!({ "staffId": self.staff_id, "pin": PIN })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body
    }

    async fn pms_token(&self) -> String {
        let (status, body) = self
            .send(
                Method::POST,
                "/api/auth/pms/login",
                None,
                Some(json!({ "employeeId": "ADMIN-001", "password": ADMIN_PASSWORD })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body["token"].as_str().unwrap().to_string()
    }

    fn sale_body(&self, login: &Value, quantity: i64, tendered: i64) -> Value {
        json!({
            "branchId": self.branch_id,
            "sessionId": login["session"]["id"],
            "pharmacistSessionId": login["pharmacistSession"]["id"],
            "items": [
                { "productId": self.product_id, "quantity": quantity, "unitPriceCents": 550 }
            ],
            "paymentMethod": "CASH",
            "amountTenderedCents": tendered
        })
    }
}

#[tokio::test]
async fn test_health_is_public() {
    let app = spawn_app().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_auth_gates() {
    let app = spawn_app().await;

    let (status, body) = app
        .send(Method::GET, "/api/products/search?query=para", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .send(Method::GET, "/api/products/search?query=para", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A PMS token is the wrong role for the counter
    let pms = app.pms_token().await;
    let (status, _) = app
        .send(Method::GET, "/api/products/search?query=para", Some(&pms), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // and a pharmacist token is the wrong role for the back office
    let login = app.pos_login().await;
    let pos = login["token"].as_str().unwrap();
    let (status, _) = app
        .send(Method::GET, "/api/pms/suppliers", Some(pos), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bad_credentials_rejected() {
    let app = spawn_app().await;

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/pms/login",
            None,
            Some(json!({ "employeeId": "ADMIN-001", "password": "wrong-password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/pos/login",
            None,
            Some(json!({ "staffId": app.staff_id, "pin": "0000" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_counter_flow() {
    let app = spawn_app().await;
    let login = app.pos_login().await;
    let token = login["token"].as_str().unwrap();

    let (status, body) = app
        .send(Method::GET, "/api/products/search?query=bio", Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["id"], app.product_id);

    let (status, body) = app
        .send(
            Method::GET,
            &format!("/api/sales/next-sequence?branchId={}", app.branch_id),
            Some(token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dailySequence"], 1);
    assert!(body["invoiceNumber"].as_str().unwrap().starts_with("B01-"));

    let (status, sale) = app
        .send(Method::POST, "/api/sales", Some(token), Some(app.sale_body(&login, 2, 2_000)))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", sale);
    assert_eq!(sale["dailySequence"], 1);
    assert_eq!(sale["totalCents"], 1_100);
    assert_eq!(sale["changeCents"], 900);
    assert!(sale["invoiceNumber"].as_str().unwrap().ends_with("-0001"));

    let sale_id = sale["saleId"].as_str().unwrap();
    let (status, detail) = app
        .send(Method::GET, &format!("/api/sales/{}", sale_id), Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["invoiceNumber"], sale["invoiceNumber"]);
    assert_eq!(detail["items"][0]["quantity"], 2);

    let (status, listing) = app
        .send(Method::GET, &format!("/api/products/barcode/{}", BARCODE), Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["stock"], 3);

    // Logout closes the session; the same token can no longer sell
    let (status, _) = app
        .send(Method::POST, "/api/auth/pos/logout", Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(Method::POST, "/api/sales", Some(token), Some(app.sale_body(&login, 1, 1_000)))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_sale_error_statuses() {
    let app = spawn_app().await;
    let login = app.pos_login().await;
    let token = login["token"].as_str().unwrap();

    // 7 of 5 in stock
    let (status, body) = app
        .send(Method::POST, "/api/sales", Some(token), Some(app.sale_body(&login, 7, 10_000)))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("Insufficient stock"));

    // Underpaid
    let (status, _) = app
        .send(Method::POST, "/api/sales", Some(token), Some(app.sale_body(&login, 1, 100)))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::GET, "/api/products/search?query=pa", Some(token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(Method::GET, "/api/products/barcode/0000000000000", Some(token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Stock untouched by the failed attempts
    let (_, listing) = app
        .send(Method::GET, &format!("/api/products/barcode/{}", BARCODE), Some(token), None)
        .await;
    assert_eq!(listing["stock"], 5);
}

#[tokio::test]
async fn test_malformed_sale_body_is_bad_request() {
    let app = spawn_app().await;
    let login = app.pos_login().await;
    let token = login["token"].as_str().unwrap();

    let (status, body) = app
        .send(
            Method::POST,
            "/api/sales",
            Some(token),
            Some(json!({ "branchId": app.branch_id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("sessionId"));

    let mut wrong_type = app.sale_body(&login, 1, 1_000);
    wrong_type["items"][0]["quantity"] = json!("two");
    let (status, body) = app
        .send(Method::POST, "/api/sales", Some(token), Some(wrong_type))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_sale_must_use_the_token_sessions() {
    let app = spawn_app().await;
    let login = app.pos_login().await;
    let token = login["token"].as_str().unwrap();

    let mut foreign = app.sale_body(&login, 1, 1_000);
    foreign["sessionId"] = json!("another-counter-session");
    let (status, _) = app
        .send(Method::POST, "/api/sales", Some(token), Some(foreign))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut foreign = app.sale_body(&login, 1, 1_000);
    foreign["pharmacistSessionId"] = json!("someone-else");
    let (status, _) = app
        .send(Method::POST, "/api/sales", Some(token), Some(foreign))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::POST, "/api/sales", Some(token), Some(app.sale_body(&login, 1, 1_000)))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_hold_and_discard() {
    let app = spawn_app().await;
    let login = app.pos_login().await;
    let token = login["token"].as_str().unwrap();
    let session_id = login["session"]["id"].as_str().unwrap();

    let (status, held) = app
        .send(
            Method::POST,
            "/api/transactions/hold",
            Some(token),
            Some(json!({
                "sessionId": session_id,
                "branchId": app.branch_id,
                "items": [{ "productId": app.product_id, "quantity": 1, "unitPriceCents": 550 }],
                "note": "back in 5"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", held);
    assert_eq!(held["holdNumber"], 1);
    let held_id = held["id"].as_str().unwrap();

    let (_, items) = app
        .send(Method::GET, &format!("/api/transactions/held/{}/items", held_id), Some(token), None)
        .await;
    assert_eq!(items.as_array().unwrap().len(), 1);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/transactions/held/{}", held_id), Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = app
        .send(Method::GET, &format!("/api/transactions/held/{}", session_id), Some(token), None)
        .await;
    assert!(list.as_array().unwrap().is_empty());

    let (_, list) = app
        .send(
            Method::GET,
            &format!("/api/transactions/held/{}?showAll=true", session_id),
            Some(token),
            None,
        )
        .await;
    assert_eq!(list[0]["status"], "DISCARDED");
}

#[tokio::test]
async fn test_back_office() {
    let app = spawn_app().await;
    let token = app.pms_token().await;

    let (status, supplier) = app
        .send(
            Method::POST,
            "/api/pms/suppliers",
            Some(&token),
            Some(json!({ "supplierName": "Metro Drug" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", supplier);
    let supplier_id = supplier["id"].as_str().unwrap();

    let (status, link) = app
        .send(
            Method::POST,
            "/api/pms/product-suppliers",
            Some(&token),
            Some(json!({
                "productId": app.product_id,
                "supplierId": supplier_id,
                "supplierPriceCents": 400,
                "isPreferred": true
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, entry) = app
        .send(
            Method::POST,
            &format!("/api/pms/products/{}/calculate-price", app.product_id),
            Some(&token),
            Some(json!({ "markupBps": 5000 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", entry);
    assert_eq!(entry["unitPriceCents"], 600);

    let (_, history) = app
        .send(
            Method::GET,
            &format!("/api/pms/products/{}/price-history", app.product_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let link_uri = format!("/api/pms/product-suppliers/{}", link["id"].as_str().unwrap());
    let (status, updated) = app
        .send(
            Method::PUT,
            &link_uri,
            Some(&token),
            Some(json!({ "supplierPriceCents": 420, "isPreferred": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", updated);
    assert_eq!(updated["supplierPriceCents"], 420);

    let (_, history) = app
        .send(
            Method::GET,
            &format!("/api/pms/products/{}/price-history", app.product_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(history.as_array().unwrap().len(), 2);

    let (status, removed) = app.send(Method::DELETE, &link_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(removed["status"], "ARCHIVED");
    let (status, _) = app.send(Method::DELETE, &link_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, low) = app
        .send(
            Method::GET,
            &format!("/api/pms/dashboard/low-stock?branchId={}", app.branch_id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(low[0]["stock"], 5);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/pms/suppliers/{}", supplier_id), Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, suppliers) = app
        .send(Method::GET, "/api/pms/suppliers", Some(&token), None)
        .await;
    assert!(suppliers.as_array().unwrap().is_empty());

    let restore = format!("/api/pms/suppliers/{}/restore", supplier_id);
    let (status, restored) = app.send(Method::POST, &restore, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK, "{}", restored);
    assert_eq!(restored["status"], "ACTIVE");
    let (status, _) = app.send(Method::POST, &restore, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .send(
            Method::POST,
            "/api/pms/suppliers/bulk-archive",
            Some(&token),
            Some(json!({ "supplierIds": [supplier_id], "archiveReason": "Closed account" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["archived"], 1);

    // Admin area: duplicate branch code is a conflict
    let (status, _) = app
        .send(
            Method::POST,
            "/api/admin/branches",
            Some(&token),
            Some(json!({ "branchCode": "B01", "branchName": "Again" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_prescription_recorded_at_counter() {
    let app = spawn_app().await;
    let login = app.pos_login().await;
    let token = login["token"].as_str().unwrap();

    let (status, created) = app
        .send(
            Method::POST,
            "/api/prescriptions",
            Some(token),
            Some(json!({
                "patientName": "Rosa Mendoza",
                "age": 67,
                "doctorName": "Dr. Jose Rizal",
                "prcNumber": "0123456",
                "prescriptionDate": "2026-03-14",
                "items": [
                    { "productId": app.product_id, "quantity": 10, "instructions": "1 tablet every 6 hours" }
                ]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", created);
    assert_eq!(created["branchId"], app.branch_id.as_str());
    assert_eq!(created["pharmacistId"], app.staff_id.as_str());
    assert_eq!(created["items"][0]["productName"], "Paracetamol 500mg");

    let id = created["id"].as_str().unwrap();
    let (status, fetched) = app
        .send(Method::GET, &format!("/api/prescriptions/{}", id), Some(token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["patientName"], "Rosa Mendoza");

    let (status, body) = app
        .send(
            Method::POST,
            "/api/prescriptions",
            Some(token),
            Some(json!({ "patientName": "No Doctor", "doctorName": "" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    // back office tokens cannot record prescriptions
    let pms = app.pms_token().await;
    let (status, _) = app
        .send(
            Method::POST,
            "/api/prescriptions",
            Some(&pms),
            Some(json!({ "patientName": "X", "doctorName": "Y" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = spawn_app().await;

    let (status, body) = app
        .send(
            Method::POST,
            "/api/auth/forgot-password",
            None,
            Some(json!({ "employeeId": "ADMIN-001" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    // Development config echoes the code
    let code = body["resetCode"].as_str().unwrap().to_string();

    let (_, body) = app
        .send(
            Method::POST,
            "/api/auth/forgot-password",
            None,
            Some(json!({ "employeeId": "NOBODY-404" })),
        )
        .await;
    assert_eq!(body["success"], true);
    assert!(body.get("resetCode").is_none());

    let (_, body) = app
        .send(
            Method::POST,
            "/api/auth/verify-reset-token",
            None,
            Some(json!({ "employeeId": "ADMIN-001", "token": code })),
        )
        .await;
    assert_eq!(body["valid"], true);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(json!({ "employeeId": "ADMIN-001", "token": code, "newPassword": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/auth/pms/login",
            None,
            Some(json!({ "employeeId": "ADMIN-001", "password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}
