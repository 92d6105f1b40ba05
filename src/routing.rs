//! Application router configuration.

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;

use crate::{
    AppState, endpoints,
    good::{
        create_good_endpoint, delete_good_endpoint, delete_goods_by_query_endpoint,
        get_good_endpoint, get_goods_endpoint, search_goods_endpoint, update_good_endpoint,
        update_goods_by_query_endpoint,
    },
    hunter::{
        create_hunter_endpoint, delete_hunter_endpoint, delete_hunters_by_name_endpoint,
        get_hunter_endpoint, get_hunters_by_name_endpoint, get_hunters_endpoint,
        update_hunter_endpoint, update_hunters_by_name_endpoint,
    },
    merchant::{
        create_merchant_endpoint, delete_merchant_endpoint, delete_merchants_by_name_endpoint,
        get_merchant_endpoint, get_merchants_by_name_endpoint, get_merchants_endpoint,
        update_merchant_endpoint, update_merchants_by_name_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_transaction_endpoint,
        get_transactions_by_buyer_endpoint, get_transactions_by_date_endpoint,
        get_transactions_by_merchant_endpoint, get_transactions_endpoint,
        update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let hunter_routes = Router::new()
        .route(
            endpoints::HUNTERS,
            get(get_hunters_endpoint).post(create_hunter_endpoint),
        )
        .route(
            endpoints::HUNTERS_BY_NAME,
            get(get_hunters_by_name_endpoint)
                .put(update_hunters_by_name_endpoint)
                .delete(delete_hunters_by_name_endpoint),
        )
        .route(
            endpoints::HUNTER,
            get(get_hunter_endpoint)
                .put(update_hunter_endpoint)
                .delete(delete_hunter_endpoint),
        );

    let merchant_routes = Router::new()
        .route(
            endpoints::MERCHANTS,
            get(get_merchants_endpoint).post(create_merchant_endpoint),
        )
        .route(
            endpoints::MERCHANTS_BY_NAME,
            get(get_merchants_by_name_endpoint)
                .put(update_merchants_by_name_endpoint)
                .delete(delete_merchants_by_name_endpoint),
        )
        .route(
            endpoints::MERCHANT,
            get(get_merchant_endpoint)
                .put(update_merchant_endpoint)
                .delete(delete_merchant_endpoint),
        );

    // Every good search route accepts the full filter; the per-field paths
    // exist so clients can keep the URLs they already use.
    let good_search_handlers = get(search_goods_endpoint)
        .put(update_goods_by_query_endpoint)
        .delete(delete_goods_by_query_endpoint);

    let good_routes = Router::new()
        .route(
            endpoints::GOODS,
            get(get_goods_endpoint).post(create_good_endpoint),
        )
        .route(endpoints::GOODS_BY_NAME, good_search_handlers.clone())
        .route(
            endpoints::GOODS_BY_DESCRIPTION,
            good_search_handlers.clone(),
        )
        .route(endpoints::GOODS_BY_PRICE, good_search_handlers.clone())
        .route(endpoints::GOODS_BY_STOCK, good_search_handlers.clone())
        .route(endpoints::GOODS_BY_ALL, good_search_handlers)
        .route(
            endpoints::GOOD,
            get(get_good_endpoint)
                .put(update_good_endpoint)
                .delete(delete_good_endpoint),
        );

    let transaction_routes = Router::new()
        .route(
            endpoints::TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_BY_BUYER,
            get(get_transactions_by_buyer_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_BY_MERCHANT,
            get(get_transactions_by_merchant_endpoint),
        )
        .route(
            endpoints::TRANSACTIONS_BY_DATE,
            get(get_transactions_by_date_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            get(get_transaction_endpoint)
                .put(update_transaction_endpoint)
                .delete(delete_transaction_endpoint),
        );

    Router::new()
        .route(endpoints::ROOT, get(get_welcome))
        .merge(hunter_routes)
        .merge(merchant_routes)
        .merge(good_routes)
        .merge(transaction_routes)
        .fallback(get_not_found)
        .with_state(state)
}

/// The innkeeper greets anyone who knocks on the front door.
async fn get_welcome() -> Response {
    "Bienvenido a la Posada del Lobo Blanco".into_response()
}

async fn get_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Ruta no encontrada" })),
    )
        .into_response()
}

#[cfg(test)]
mod root_route_tests {
    use axum::{http::StatusCode, response::IntoResponse};

    use crate::routing::get_welcome;

    #[tokio::test]
    async fn root_greets_visitors() {
        let response = get_welcome().await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Bienvenido a la Posada del Lobo Blanco");
    }
}
