use axum::http::StatusCode;
use fundledger::api::{self, AppState};
use fundledger::config::Config;
use fundledger::db::init_db;
use fundledger::db::repo::settings;
use fundledger::{DbPlanCatalog, LedgerCoordinator, PlanCatalog, Repository};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

async fn setup_test_app() -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool.clone()));
    let config = Config::for_database(db_path);

    let mut conn = repo.acquire().await.unwrap();
    settings::seed_referral_settings(&mut conn, &config.referral_settings())
        .await
        .unwrap();
    drop(conn);

    let catalog: Arc<dyn PlanCatalog> = Arc::new(DbPlanCatalog::new(pool));
    let coordinator = Arc::new(LedgerCoordinator::new(repo.clone(), catalog, &config));
    let state = AppState::new(repo, config, coordinator);

    (api::create_router(state), temp_dir)
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = axum::http::Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn approved_user(app: &axum::Router, id: &str, amount: &str) {
    let (status, _) = send(app, "POST", "/v1/users", Some(json!({ "id": id }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, deposit) = send(
        app,
        "POST",
        "/v1/deposits",
        Some(json!({ "userId": id, "amount": amount })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/v1/deposits/{}/decision", deposit["id"].as_str().unwrap());
    let (status, _) = send(app, "POST", &uri, Some(json!({ "decision": "approve" }))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_health_endpoints() {
    let (app, _temp) = setup_test_app().await;

    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_deposit_lifecycle_over_http() {
    let (app, _temp) = setup_test_app().await;
    let (status, user) = send(&app, "POST", "/v1/users", Some(json!({ "id": "alice" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["id"], "alice");
    assert_eq!(user["availableBalance"], "0");

    let (status, deposit) = send(
        &app,
        "POST",
        "/v1/deposits",
        Some(json!({ "userId": "alice", "amount": "1000.50" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(deposit["status"], "pending");
    assert_eq!(deposit["amount"], "1000.5");
    let deposit_id = deposit["id"].as_str().unwrap().to_string();

    let uri = format!("/v1/deposits/{}/decision", deposit_id);
    let (status, decided) = send(&app, "POST", &uri, Some(json!({ "decision": "approve" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["deposit"]["status"], "approved");
    assert_eq!(decided["balance"], "1000.5");

    let (status, body) = send(&app, "POST", &uri, Some(json!({ "decision": "approve" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "already_processed");

    let (status, fetched) = send(&app, "GET", &format!("/v1/deposits/{}", deposit_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "approved");

    let (status, history) = send(&app, "GET", "/v1/users/alice/transactions", None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = history["transactions"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["kind"], "deposit");
    assert_eq!(rows[0]["amount"], "1000.5");
}

#[tokio::test]
async fn test_withdrawal_over_http() {
    let (app, _temp) = setup_test_app().await;
    approved_user(&app, "bob", "1000").await;

    let (status, requested) = send(
        &app,
        "POST",
        "/v1/withdrawals",
        Some(json!({ "userId": "bob", "amount": "300", "payoutDetails": "iban:DE00" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(requested["balance"], "700");
    assert_eq!(requested["withdrawal"]["status"], "pending");

    let uri = format!(
        "/v1/withdrawals/{}/decision",
        requested["withdrawal"]["id"].as_str().unwrap()
    );
    let (status, failed) = send(&app, "POST", &uri, Some(json!({ "decision": "fail" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(failed["withdrawal"]["status"], "failed");
    assert_eq!(failed["balance"], "1000");

    let (status, report) = send(&app, "GET", "/v1/users/bob/reconciliation", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["consistent"], true);
    assert_eq!(report["entryCount"], 3);
}

#[tokio::test]
async fn test_overdraft_is_rejected_with_code() {
    let (app, _temp) = setup_test_app().await;
    approved_user(&app, "carol", "50").await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/withdrawals",
        Some(json!({ "userId": "carol", "amount": "75", "payoutDetails": "iban:FR00" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "insufficient_funds");
}

#[tokio::test]
async fn test_bad_requests() {
    let (app, _temp) = setup_test_app().await;
    send(&app, "POST", "/v1/users", Some(json!({ "id": "dave" }))).await;

    let (status, body) = send(
        &app,
        "POST",
        "/v1/deposits",
        Some(json!({ "userId": "dave", "amount": "ten" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "validation_error");

    let (status, _) = send(
        &app,
        "POST",
        "/v1/deposits",
        Some(json!({ "userId": "dave", "amount": "-5" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, deposit) = send(
        &app,
        "POST",
        "/v1/deposits",
        Some(json!({ "userId": "dave", "amount": "5" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/v1/deposits/{}/decision", deposit["id"].as_str().unwrap());
    let (status, _) = send(&app, "POST", &uri, Some(json!({ "decision": "maybe" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/v1/events?limit=0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_records_are_not_found() {
    let (app, _temp) = setup_test_app().await;

    let (status, body) = send(&app, "GET", "/v1/users/ghost", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, _) = send(&app, "GET", "/v1/deposits/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, "GET", "/v1/withdrawals/nope", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/deposits",
        Some(json!({ "userId": "ghost", "amount": "10" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_investment_over_http() {
    let (app, _temp) = setup_test_app().await;
    send(&app, "POST", "/v1/users", Some(json!({ "id": "erin" }))).await;

    let (status, deposit) = send(
        &app,
        "POST",
        "/v1/investments",
        Some(json!({ "userId": "erin", "planId": "starter", "amount": "500" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(deposit["planId"], "starter");

    let uri = format!("/v1/deposits/{}/decision", deposit["id"].as_str().unwrap());
    let (status, decided) = send(&app, "POST", &uri, Some(json!({ "decision": "approve" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(decided["balance"], "0");
    assert_eq!(decided["investment"]["status"], "active");
    assert_eq!(decided["investment"]["planId"], "starter");

    let (status, user) = send(&app, "GET", "/v1/users/erin", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["activeInvestments"], 1);

    let (status, _) = send(
        &app,
        "POST",
        "/v1/investments",
        Some(json!({ "userId": "erin", "planId": "starter", "amount": "100" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_referral_commission_and_events_feed() {
    let (app, _temp) = setup_test_app().await;
    send(&app, "POST", "/v1/users", Some(json!({ "id": "sponsor" }))).await;
    let (status, user) = send(
        &app,
        "POST",
        "/v1/users",
        Some(json!({ "id": "friend", "referredBy": "sponsor" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["referredBy"], "sponsor");

    let (_, deposit) = send(
        &app,
        "POST",
        "/v1/deposits",
        Some(json!({ "userId": "friend", "amount": "200" })),
    )
    .await;
    let uri = format!("/v1/deposits/{}/decision", deposit["id"].as_str().unwrap());
    let (status, decided) = send(&app, "POST", &uri, Some(json!({ "decision": "approve" }))).await;
    assert_eq!(status, StatusCode::OK);
    let commissions = decided["commissions"].as_array().unwrap();
    assert_eq!(commissions.len(), 1);
    assert_eq!(commissions[0]["referrerId"], "sponsor");
    assert_eq!(commissions[0]["amount"], "20");

    let (status, sponsor) = send(&app, "GET", "/v1/users/sponsor", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sponsor["availableBalance"], "20");

    let (status, feed) = send(&app, "GET", "/v1/events?afterSeq=0&limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    let kinds: Vec<_> = feed["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap().to_string())
        .collect();
    assert!(kinds.contains(&"commission_earned".to_string()));
    let next = feed["nextSeq"].as_i64().unwrap();

    let (_, rest) = send(&app, "GET", &format!("/v1/events?afterSeq={}", next), None).await;
    assert!(rest["events"].as_array().unwrap().is_empty());

    let (status, level) = send(&app, "POST", "/v1/users/sponsor/level", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(level["level"], 0);
    assert_eq!(level["activeReferrals"], 1);

    let (status, queue) = send(&app, "GET", "/v1/reconciliation-queue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(queue["items"].as_array().unwrap().is_empty());
}
