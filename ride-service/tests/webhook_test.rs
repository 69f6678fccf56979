//! Squad webhook reconciliation integration tests.
//!
//! Every delivery gets a 200 so the gateway stops retrying; the interesting
//! part is what lands (or doesn't) in the ledger.

mod common;

use common::{sign_webhook, TestApp};
use rust_decimal::Decimal;
use uuid::Uuid;

fn funding_body(reference: &str, amount_minor: i64, email: &str, status: &str) -> String {
    serde_json::json!({
        "data": {
            "transaction_ref": reference,
            "amount": amount_minor,
            "customer": { "email": email },
            "payment_status": status
        }
    })
    .to_string()
}

async fn post_webhook(app: &TestApp, body: &str, signature: Option<&str>) -> reqwest::Response {
    let mut request = app
        .client
        .post(format!("{}/webhooks/squad", app.address))
        .header("content-type", "application/json")
        .body(body.to_string());
    if let Some(signature) = signature {
        request = request.header("squad-signature", signature.to_string());
    }
    request.send().await.unwrap()
}

#[tokio::test]
async fn successful_transfer_funds_the_wallet() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let user = app.seed_user("rider").await;
    app.seed_wallet(user, Decimal::ZERO).await;
    let email = format!("{}@test.example", user);

    let reference = format!("SQ_{}", Uuid::new_v4());
    // 500000 kobo = 5000 in major units.
    let body = funding_body(&reference, 500_000, &email, "success");
    let response = post_webhook(&app, &body, Some(&sign_webhook(&body))).await;

    assert_eq!(response.status(), 200);
    let ack: serde_json::Value = response.json().await.unwrap();
    assert_eq!(ack["received"], true);

    assert_eq!(app.wallet_balance(user).await, Decimal::from(5000));

    let (tx_type, method, status): (String, String, String) = sqlx::query_as(
        r#"
        SELECT tx_type::text, payment_method::text, status::text
        FROM transactions WHERE reference = $1
        "#,
    )
    .bind(&reference)
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(tx_type, "credit");
    assert_eq!(method, "virtual_account");
    assert_eq!(status, "successful");
}

#[tokio::test]
async fn duplicate_deliveries_fund_only_once() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let user = app.seed_user("rider").await;
    app.seed_wallet(user, Decimal::ZERO).await;
    let email = format!("{}@test.example", user);

    let reference = format!("SQ_{}", Uuid::new_v4());
    let body = funding_body(&reference, 100_000, &email, "success");
    let signature = sign_webhook(&body);

    assert_eq!(post_webhook(&app, &body, Some(&signature)).await.status(), 200);
    assert_eq!(post_webhook(&app, &body, Some(&signature)).await.status(), 200);

    assert_eq!(app.wallet_balance(user).await, Decimal::from(1000));

    let entry_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE reference = $1")
            .bind(&reference)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(entry_count, 1);
}

#[tokio::test]
async fn unsigned_or_forged_deliveries_are_acknowledged_but_ignored() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let user = app.seed_user("rider").await;
    app.seed_wallet(user, Decimal::ZERO).await;
    let email = format!("{}@test.example", user);

    let body = funding_body(&format!("SQ_{}", Uuid::new_v4()), 100_000, &email, "success");

    let response = post_webhook(&app, &body, None).await;
    assert_eq!(response.status(), 200);
    let ack: serde_json::Value = response.json().await.unwrap();
    assert_eq!(ack["received"], false);

    let forged = sign_webhook("something else entirely");
    let response = post_webhook(&app, &body, Some(&forged)).await;
    assert_eq!(response.status(), 200);
    let ack: serde_json::Value = response.json().await.unwrap();
    assert_eq!(ack["received"], false);

    assert_eq!(app.wallet_balance(user).await, Decimal::ZERO);
}

#[tokio::test]
async fn pending_entry_is_confirmed_and_credited() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let user = app.seed_user("rider").await;
    app.seed_wallet(user, Decimal::ZERO).await;
    let email = format!("{}@test.example", user);

    let reference = format!("SQ_{}", Uuid::new_v4());
    sqlx::query(
        r#"
        INSERT INTO transactions
            (transaction_id, user_id, tx_type, amount, description, reference,
             status, payment_method)
        VALUES ($1, $2, 'credit', 250, 'Card funding', $3, 'pending', 'card')
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user)
    .bind(&reference)
    .execute(&app.pool)
    .await
    .unwrap();

    let body = funding_body(&reference, 25_000, &email, "success");
    let response = post_webhook(&app, &body, Some(&sign_webhook(&body))).await;
    assert_eq!(response.status(), 200);

    assert_eq!(app.wallet_balance(user).await, Decimal::from(250));

    let status: String =
        sqlx::query_scalar("SELECT status::text FROM transactions WHERE reference = $1")
            .bind(&reference)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(status, "successful");

    // A late duplicate is a no-op against the now-terminal entry.
    let response = post_webhook(&app, &body, Some(&sign_webhook(&body))).await;
    assert_eq!(response.status(), 200);
    assert_eq!(app.wallet_balance(user).await, Decimal::from(250));
}

#[tokio::test]
async fn failed_payment_marks_the_entry_without_crediting() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let user = app.seed_user("rider").await;
    app.seed_wallet(user, Decimal::ZERO).await;
    let email = format!("{}@test.example", user);

    let reference = format!("SQ_{}", Uuid::new_v4());
    sqlx::query(
        r#"
        INSERT INTO transactions
            (transaction_id, user_id, tx_type, amount, description, reference,
             status, payment_method)
        VALUES ($1, $2, 'credit', 250, 'Card funding', $3, 'pending', 'card')
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user)
    .bind(&reference)
    .execute(&app.pool)
    .await
    .unwrap();

    let body = funding_body(&reference, 25_000, &email, "failed");
    let response = post_webhook(&app, &body, Some(&sign_webhook(&body))).await;
    assert_eq!(response.status(), 200);

    assert_eq!(app.wallet_balance(user).await, Decimal::ZERO);
    let status: String =
        sqlx::query_scalar("SELECT status::text FROM transactions WHERE reference = $1")
            .bind(&reference)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(status, "failed");
}

#[tokio::test]
async fn store_failure_is_still_acknowledged_with_200() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let user = app.seed_user("rider").await;
    app.seed_wallet(user, Decimal::ZERO).await;
    let email = format!("{}@test.example", user);

    // Break the ledger underneath the reconciler. The gateway must still get
    // a 200 acknowledgement; internal failures are logged, not surfaced.
    sqlx::query("DROP TABLE transactions")
        .execute(&app.pool)
        .await
        .unwrap();

    let body = funding_body(&format!("SQ_{}", Uuid::new_v4()), 100_000, &email, "success");
    let response = post_webhook(&app, &body, Some(&sign_webhook(&body))).await;

    assert_eq!(response.status(), 200);
    let ack: serde_json::Value = response.json().await.unwrap();
    assert_eq!(ack["received"], false);
}

#[tokio::test]
async fn funding_for_an_unknown_customer_changes_nothing() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    let reference = format!("SQ_{}", Uuid::new_v4());
    let body = funding_body(&reference, 100_000, "nobody@test.example", "success");
    let response = post_webhook(&app, &body, Some(&sign_webhook(&body))).await;
    assert_eq!(response.status(), 200);

    let entry_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM transactions WHERE reference = $1")
            .bind(&reference)
            .fetch_one(&app.pool)
            .await
            .unwrap();
    assert_eq!(entry_count, 0);
}
