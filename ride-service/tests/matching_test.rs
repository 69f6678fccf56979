//! Driver matching integration tests, driven through the public API: the
//! `nearby_drivers` count on a ride request reflects who is eligible.

mod common;

use common::{ride_request_body, TestApp};
use rust_decimal::Decimal;

async fn nearby_drivers(app: &TestApp, rider: uuid::Uuid) -> u64 {
    let response = app
        .post("/rides", rider, "rider")
        .json(&ride_request_body("cash"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    let ride: serde_json::Value = response.json().await.unwrap();
    ride["nearby_drivers"].as_u64().unwrap()
}

#[tokio::test]
async fn only_drivers_inside_the_radius_count() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let rider = app.seed_user("rider").await;
    app.seed_wallet(rider, Decimal::from(5000)).await;

    // Pickup is at [3.3792, 6.5244]. One driver a few hundred meters away,
    // one the next city over.
    let near_user = app.seed_user("driver").await;
    app.seed_driver(near_user, 3.3810, 6.5250).await;
    let far_user = app.seed_user("driver").await;
    app.seed_driver(far_user, 3.9000, 7.4000).await;

    assert_eq!(nearby_drivers(&app, rider).await, 1);
}

#[tokio::test]
async fn unavailable_and_unapproved_drivers_are_skipped() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let rider = app.seed_user("rider").await;
    app.seed_wallet(rider, Decimal::from(5000)).await;

    let busy_user = app.seed_user("driver").await;
    let busy_driver = app.seed_driver(busy_user, 3.3800, 6.5246).await;
    sqlx::query("UPDATE drivers SET is_available = FALSE WHERE driver_id = $1")
        .bind(busy_driver)
        .execute(&app.pool)
        .await
        .unwrap();

    let unapproved_user = app.seed_user("driver").await;
    let unapproved_driver = app.seed_driver(unapproved_user, 3.3801, 6.5247).await;
    sqlx::query("UPDATE drivers SET is_approved = FALSE WHERE driver_id = $1")
        .bind(unapproved_driver)
        .execute(&app.pool)
        .await
        .unwrap();

    assert_eq!(nearby_drivers(&app, rider).await, 0);
}

#[tokio::test]
async fn availability_and_location_updates_feed_matching() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let rider = app.seed_user("rider").await;
    app.seed_wallet(rider, Decimal::from(5000)).await;

    // Driver starts far away, then reports in near the pickup.
    let driver_user = app.seed_user("driver").await;
    app.seed_driver(driver_user, 3.9000, 7.4000).await;
    assert_eq!(nearby_drivers(&app, rider).await, 0);

    let response = app
        .patch("/drivers/location", driver_user, "driver")
        .json(&serde_json::json!({ "coordinates": [3.3793, 6.5245] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(nearby_drivers(&app, rider).await, 1);

    // Going off shift removes them again.
    let response = app
        .patch("/drivers/availability", driver_user, "driver")
        .json(&serde_json::json!({ "is_available": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(nearby_drivers(&app, rider).await, 0);
}

#[tokio::test]
async fn driver_endpoints_reject_non_drivers() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let rider = app.seed_user("rider").await;

    let response = app
        .patch("/drivers/availability", rider, "rider")
        .json(&serde_json::json!({ "is_available": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
}
