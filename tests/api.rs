//! End-to-end tests driving the API over HTTP.

use axum::http::StatusCode;
use axum_test::TestServer;
use rusqlite::Connection;
use serde_json::{Value, json};

use posada_lobo_blanco::{AppState, build_router};

fn new_test_server() -> TestServer {
    let connection =
        Connection::open_in_memory().expect("Could not open in-memory SQLite database");
    let state = AppState::new(connection).expect("Could not initialize database");

    TestServer::new(build_router(state))
}

async fn create_sword(server: &TestServer) -> i64 {
    let response = server
        .post("/goods")
        .json(&json!({
            "name": "Sword",
            "description": "Sharp",
            "price": 100,
            "stock": 10
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    response.json::<Value>()["id"].as_i64().unwrap()
}

async fn create_geralt(server: &TestServer) {
    let response = server
        .post("/hunters")
        .json(&json!({ "name": "Geralt", "level": 5 }))
        .await;

    response.assert_status(StatusCode::CREATED);
}

async fn stock_of(server: &TestServer, good_id: i64) -> i64 {
    let response = server.get(&format!("/goods/{good_id}")).await;
    response.assert_status_ok();
    response.json::<Value>()["stock"].as_i64().unwrap()
}

#[tokio::test]
async fn root_route_greets_in_spanish() {
    let server = new_test_server();

    let response = server.get("/").await;

    response.assert_status_ok();
    response.assert_text("Bienvenido a la Posada del Lobo Blanco");
}

#[tokio::test]
async fn unknown_route_returns_404_message() {
    let server = new_test_server();

    let response = server.get("/taberna").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["message"], "Ruta no encontrada");
}

#[tokio::test]
async fn good_creation_echoes_record() {
    let server = new_test_server();

    let response = server
        .post("/goods")
        .json(&json!({
            "name": "Sword",
            "description": "Sharp",
            "price": 100,
            "stock": 10
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["name"], "Sword");
    assert_eq!(body["description"], "Sharp");
    assert_eq!(body["price"], 100.0);
    assert_eq!(body["stock"], 10);
}

#[tokio::test]
async fn good_creation_without_price_returns_400() {
    let server = new_test_server();

    let response = server
        .post("/goods")
        .json(&json!({ "name": "Sword", "description": "Sharp", "stock": 10 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["message"],
        "Nombre, descripción, precio y stock son obligatorios"
    );
}

#[tokio::test]
async fn empty_collections_follow_observed_statuses() {
    let server = new_test_server();

    server.get("/hunters").await.assert_status_ok();
    server.get("/goods").await.assert_status_ok();

    let merchants = server.get("/merchants").await;
    merchants.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(
        merchants.json::<Value>()["message"],
        "No se encontraron mercaderes"
    );

    let transactions = server.get("/transactions").await;
    transactions.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(
        transactions.json::<Value>()["message"],
        "No se encontraron transacciones"
    );
}

#[tokio::test]
async fn hunter_level_out_of_bounds_returns_400() {
    let server = new_test_server();

    let response = server
        .post("/hunters")
        .json(&json!({ "name": "Geralt", "level": 101 }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["message"], "El nivel máximo es 100");
}

#[tokio::test]
async fn missing_hunter_returns_404_message() {
    let server = new_test_server();

    let response = server.get("/hunters/12345").await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["message"], "Cazador no encontrado");
}

#[tokio::test]
async fn purchase_computes_total_and_round_trips_stock() {
    let server = new_test_server();
    let sword_id = create_sword(&server).await;
    create_geralt(&server).await;

    let response = server
        .post("/transactions")
        .json(&json!({
            "Type": "hunter",
            "name_transactor": "Geralt",
            "goods": [{ "good": "Sword", "quantity": 3 }],
            "date": "2025-01-01",
            "hour": "10:00"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body = response.json::<Value>();
    assert_eq!(body["totalAmount"], 300.0);
    assert_eq!(body["name_transactor"], "Geralt");
    assert_eq!(stock_of(&server, sword_id).await, 7);

    let transaction_id = body["id"].as_i64().unwrap();
    let deletion = server.delete(&format!("/transactions/{transaction_id}")).await;

    deletion.assert_status_ok();
    assert_eq!(
        deletion.json::<Value>()["message"],
        "Transacción eliminada exitosamente"
    );
    assert_eq!(stock_of(&server, sword_id).await, 10);
}

#[tokio::test]
async fn purchase_with_insufficient_stock_mutates_nothing() {
    let server = new_test_server();
    let sword_id = create_sword(&server).await;
    create_geralt(&server).await;

    let response = server
        .post("/transactions")
        .json(&json!({
            "Type": "hunter",
            "name_transactor": "Geralt",
            "goods": [{ "good": "Sword", "quantity": 11 }],
            "date": "2025-01-01",
            "hour": "10:00"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["message"],
        "Stock insuficiente para el bien: Sword"
    );
    assert_eq!(stock_of(&server, sword_id).await, 10);

    let transactions = server.get("/transactions").await;
    transactions.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn merchant_restock_increments_stock() {
    let server = new_test_server();
    let sword_id = create_sword(&server).await;

    server
        .post("/merchants")
        .json(&json!({ "name": "Hattori", "location": "Novigrad" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .post("/transactions")
        .json(&json!({
            "Type": "merchant",
            "name_transactor": "Hattori",
            "goods": [{ "good": "Sword", "quantity": 5 }],
            "date": "2025-01-01",
            "hour": "09:00"
        }))
        .await;

    response.assert_status(StatusCode::CREATED);
    assert_eq!(stock_of(&server, sword_id).await, 15);

    let search = server
        .get("/transactions/search/by-merchant")
        .add_query_param("merchant", "Hattori")
        .await;
    search.assert_status_ok();
    assert_eq!(search.json::<Value>().as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn restock_with_unrepresentable_quantity_mutates_nothing() {
    let server = new_test_server();
    let sword_id = create_sword(&server).await;

    server
        .post("/merchants")
        .json(&json!({ "name": "Hattori" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .post("/transactions")
        .json(&json!({
            "Type": "merchant",
            "name_transactor": "Hattori",
            "goods": [{ "good": "Sword", "quantity": i64::MAX }],
            "date": "2025-01-01",
            "hour": "09:00"
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["message"],
        "Stock insuficiente para el bien: Sword"
    );
    assert_eq!(stock_of(&server, sword_id).await, 10);

    server
        .get("/transactions")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn transaction_searches_return_404_when_empty() {
    let server = new_test_server();

    let by_buyer = server
        .get("/transactions/search/by-buyer")
        .add_query_param("buyer", "Nadie")
        .await;
    by_buyer.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(
        by_buyer.json::<Value>()["message"],
        "No se encontraron transacciones para este comprador"
    );

    let by_date = server
        .get("/transactions/search/by-date")
        .add_query_param("date", "1999-01-01")
        .await;
    by_date.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(
        by_date.json::<Value>()["message"],
        "No se encontraron transacciones para esta fecha"
    );
}

#[tokio::test]
async fn deleting_hunter_removes_their_transactions() {
    let server = new_test_server();
    let sword_id = create_sword(&server).await;
    create_geralt(&server).await;

    server
        .post("/transactions")
        .json(&json!({
            "Type": "hunter",
            "name_transactor": "Geralt",
            "goods": [{ "good": "Sword", "quantity": 3 }],
            "date": "2025-01-01",
            "hour": "10:00"
        }))
        .await
        .assert_status(StatusCode::CREATED);

    let hunters = server.get("/hunters").await.json::<Value>();
    let hunter_id = hunters[0]["id"].as_i64().unwrap();

    let deletion = server.delete(&format!("/hunters/{hunter_id}")).await;
    deletion.assert_status_ok();
    assert_eq!(deletion.json::<Value>()["message"], "Cazador eliminado");

    // The goods were bought all the same; only the record of who bought
    // them goes away.
    server
        .get("/transactions")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert_eq!(stock_of(&server, sword_id).await, 7);
}

#[tokio::test]
async fn deleting_good_reverses_and_removes_referencing_transactions() {
    let server = new_test_server();
    let sword_id = create_sword(&server).await;
    create_geralt(&server).await;

    let shield = server
        .post("/goods")
        .json(&json!({
            "name": "Shield",
            "description": "Wooden",
            "price": 50,
            "stock": 10
        }))
        .await;
    shield.assert_status(StatusCode::CREATED);
    let shield_id = shield.json::<Value>()["id"].as_i64().unwrap();

    server
        .post("/transactions")
        .json(&json!({
            "Type": "hunter",
            "name_transactor": "Geralt",
            "goods": [
                { "good": "Sword", "quantity": 3 },
                { "good": "Shield", "quantity": 2 }
            ],
            "date": "2025-01-01",
            "hour": "10:00"
        }))
        .await
        .assert_status(StatusCode::CREATED);
    assert_eq!(stock_of(&server, shield_id).await, 8);

    server
        .delete(&format!("/goods/{sword_id}"))
        .await
        .assert_status_ok();

    server
        .get("/transactions")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert_eq!(stock_of(&server, shield_id).await, 10);
    server
        .get(&format!("/goods/{sword_id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn good_search_without_criteria_returns_400() {
    let server = new_test_server();
    create_sword(&server).await;

    let response = server.get("/goods/search/by-all").await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["message"],
        "Debe proporcionar al menos un criterio de búsqueda"
    );
}

#[tokio::test]
async fn good_search_by_name_filters() {
    let server = new_test_server();
    create_sword(&server).await;

    let response = server
        .get("/goods/search/by-name")
        .add_query_param("name", "Sword")
        .await;

    response.assert_status_ok();
    let body = response.json::<Value>();
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Sword");

    let missing = server
        .get("/goods/search/by-name")
        .add_query_param("name", "Axe")
        .await;
    missing.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn merchant_name_search_is_case_insensitive_substring() {
    let server = new_test_server();
    server
        .post("/merchants")
        .json(&json!({ "name": "Hattori" }))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .get("/merchants/search/by-name")
        .add_query_param("name", "hatt")
        .await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()[0]["name"], "Hattori");
}

#[tokio::test]
async fn empty_update_returns_400() {
    let server = new_test_server();
    create_geralt(&server).await;

    let hunters = server.get("/hunters").await.json::<Value>();
    let hunter_id = hunters[0]["id"].as_i64().unwrap();

    let response = server
        .put(&format!("/hunters/{hunter_id}"))
        .json(&json!({}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<Value>()["message"],
        "Por favor, proporciona al menos un campo para actualizar"
    );
}
