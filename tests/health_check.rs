//! Integration tests for the health endpoint and request logging

use session_auth::configuration::{get_configuration, StoreBackend};
use session_auth::startup::Application;

async fn spawn_app() -> String {
    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.application.port = 0;
    configuration.database.backend = StoreBackend::Memory;
    configuration.password.hash_cost = 4;

    let application = Application::build(&configuration)
        .await
        .expect("Failed to build application.");
    let address = format!("http://127.0.0.1:{}", application.port());
    let _ = tokio::spawn(application.run_until_stopped());

    address
}

#[tokio::test]
async fn health_check_works() {
    let addr = spawn_app().await;

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let addr = spawn_app().await;

    let response = reqwest::Client::new()
        .get(&format!("{}/health_check", addr))
        .send()
        .await
        .expect("Failed to execute request");

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Missing x-request-id header");
    assert!(!request_id.is_empty());
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let addr = spawn_app().await;

    let response = reqwest::Client::new()
        .get(&format!("{}/does-not-exist", addr))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(404, response.status().as_u16());
}
