//! Posada del Lobo Blanco is a small inn-keeping REST API for managing
//! hunters, merchants, goods and the transactions between them.
//!
//! This library provides a JSON REST API backed by a SQLite database. The
//! interesting part lives in [transaction]: creating or deleting a
//! transaction adjusts the stock of every referenced good atomically.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde::Serialize;
use serde_json::json;
use tokio::signal;

pub mod db;
pub mod endpoints;
pub mod good;
pub mod hunter;
pub mod merchant;
pub mod routing;
pub mod state;
pub mod transaction;

pub use routing::build_router;
pub use state::AppState;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A good was submitted without one of its required fields.
    #[error("a required good field is missing")]
    MissingGoodFields,

    /// A good was submitted with a negative price or stock count.
    #[error("good price and stock must not be negative")]
    NegativeGoodValues,

    /// A hunter was submitted without a name or level.
    #[error("a required hunter field is missing")]
    MissingHunterFields,

    /// A hunter name shorter than two characters was submitted.
    #[error("hunter name is too short")]
    HunterNameTooShort,

    /// A hunter name longer than fifty characters was submitted.
    #[error("hunter name is too long")]
    HunterNameTooLong,

    /// A hunter level below the minimum of 1 was submitted.
    #[error("hunter level is below the minimum")]
    LevelTooLow,

    /// A hunter level above the maximum of 100 was submitted.
    #[error("hunter level is above the maximum")]
    LevelTooHigh,

    /// A string that is not one of the known specializations was submitted.
    #[error("{0:?} is not a valid specialization")]
    InvalidSpecialization(String),

    /// A merchant was submitted without a name.
    #[error("a merchant requires a name")]
    MissingMerchantName,

    /// A by-name search route was called without the `name` query parameter.
    #[error("the name query parameter is missing")]
    MissingQueryName,

    /// An update request contained no fields to apply.
    #[error("an update requires at least one field")]
    EmptyUpdate,

    /// A multi-field search was attempted without any criteria.
    ///
    /// Returning the entire collection from a search route would be
    /// surprising, so zero criteria is treated as a client error.
    #[error("a search requires at least one criterion")]
    NoSearchCriteria,

    /// A transaction was submitted without one of its required fields.
    ///
    /// `totalAmount` is not required: it is always computed server-side
    /// from the referenced goods' prices and the requested quantities.
    #[error("a required transaction field is missing")]
    MissingTransactionFields,

    /// A transaction was submitted with a `Type` other than "hunter" or "merchant".
    #[error("{0:?} is not a valid transactor type")]
    InvalidTransactorKind(String),

    /// A transaction line was submitted with a quantity below 1.
    #[error("transaction quantities must be at least 1")]
    InvalidQuantity,

    /// The named transactor does not exist for the submitted transaction type.
    #[error("no transactor named {0:?}")]
    TransactorNotFound(String),

    /// A transaction line referenced a good that does not exist.
    #[error("no good named {0:?}")]
    MissingTransactionGood(String),

    /// Applying or reversing a transaction would drive a good's stock below zero.
    ///
    /// The whole workflow is rejected: no stock change is persisted.
    #[error("insufficient stock for the good {0:?}")]
    InsufficientStock(String),

    /// The requested hunter does not exist.
    #[error("the requested hunter could not be found")]
    HunterNotFound,

    /// The requested merchant does not exist.
    #[error("the requested merchant could not be found")]
    MerchantNotFound,

    /// No merchants exist in the database.
    #[error("there are no merchants in the database")]
    NoMerchants,

    /// The requested good does not exist.
    #[error("the requested good could not be found")]
    GoodNotFound,

    /// The requested transaction does not exist.
    #[error("the requested transaction could not be found")]
    TransactionNotFound,

    /// No transactions exist in the database.
    #[error("there are no transactions in the database")]
    NoTransactions,

    /// No transactions match the requested buyer.
    #[error("no transactions were found for the buyer")]
    NoTransactionsForBuyer,

    /// No transactions match the requested merchant.
    #[error("no transactions were found for the merchant")]
    NoTransactionsForMerchant,

    /// No transactions match the requested date.
    #[error("no transactions were found for the date")]
    NoTransactionsForDate,

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLock,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        tracing::error!("an unhandled SQL error occurred: {}", value);
        Error::SqlError(value)
    }
}

/// The JSON body sent to the client when a request fails.
#[derive(Debug, Serialize)]
struct ErrorBody {
    /// A human-readable description of the failure, in the innkeeper's tongue.
    message: String,
    /// An optional diagnostic string. Never carries internal details.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl Error {
    /// The HTTP status and client-facing message for the error.
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            Error::MissingGoodFields => (
                StatusCode::BAD_REQUEST,
                "Nombre, descripción, precio y stock son obligatorios".to_owned(),
            ),
            Error::NegativeGoodValues => (
                StatusCode::BAD_REQUEST,
                "El precio y el stock no pueden ser negativos".to_owned(),
            ),
            Error::MissingHunterFields => {
                (StatusCode::BAD_REQUEST,"Nombre y nivel son obligatorios".to_owned())
            }
            Error::HunterNameTooShort => (
                StatusCode::BAD_REQUEST,
                "El nombre debe tener al menos 2 caracteres".to_owned(),
            ),
            Error::HunterNameTooLong => (
                StatusCode::BAD_REQUEST,
                "El nombre no puede exceder los 50 caracteres".to_owned(),
            ),
            Error::LevelTooLow => (StatusCode::BAD_REQUEST,"El nivel mínimo es 1".to_owned()),
            Error::LevelTooHigh => (StatusCode::BAD_REQUEST,"El nivel máximo es 100".to_owned()),
            Error::InvalidSpecialization(raw) => (
                StatusCode::BAD_REQUEST,
                format!("Especialización no válida: {raw}"),
            ),
            Error::MissingMerchantName => (StatusCode::BAD_REQUEST,"El nombre es obligatorio".to_owned()),
            Error::MissingQueryName => (StatusCode::BAD_REQUEST,"Nombre es obligatorio".to_owned()),
            Error::EmptyUpdate => (
                StatusCode::BAD_REQUEST,
                "Por favor, proporciona al menos un campo para actualizar".to_owned(),
            ),
            Error::NoSearchCriteria => (
                StatusCode::BAD_REQUEST,
                "Debe proporcionar al menos un criterio de búsqueda".to_owned(),
            ),
            Error::MissingTransactionFields => (
                StatusCode::BAD_REQUEST,
                "Todos los campos son obligatorios (excepto totalAmount)".to_owned(),
            ),
            Error::InvalidTransactorKind(_) => {
                (StatusCode::BAD_REQUEST,"Tipo de transactor no válido".to_owned())
            }
            Error::InvalidQuantity => (
                StatusCode::BAD_REQUEST,
                "La cantidad de cada bien debe ser al menos 1".to_owned(),
            ),
            Error::TransactorNotFound(name) => {
                (StatusCode::NOT_FOUND,format!("Transactor no encontrado: {name}"))
            }
            Error::MissingTransactionGood(name) => {
                (StatusCode::NOT_FOUND,format!("Bien no encontrado: {name}"))
            }
            Error::InsufficientStock(name) => (
                StatusCode::BAD_REQUEST,
                format!("Stock insuficiente para el bien: {name}"),
            ),
            Error::HunterNotFound => (StatusCode::NOT_FOUND,"Cazador no encontrado".to_owned()),
            Error::MerchantNotFound => (StatusCode::NOT_FOUND,"Mercader no encontrado".to_owned()),
            Error::NoMerchants => (StatusCode::NOT_FOUND,"No se encontraron mercaderes".to_owned()),
            Error::GoodNotFound => (StatusCode::NOT_FOUND,"Bien no encontrado".to_owned()),
            Error::TransactionNotFound => (StatusCode::NOT_FOUND,"Transacción no encontrada".to_owned()),
            Error::NoTransactions => (StatusCode::NOT_FOUND,"No se encontraron transacciones".to_owned()),
            Error::NoTransactionsForBuyer => (
                StatusCode::NOT_FOUND,
                "No se encontraron transacciones para este comprador".to_owned(),
            ),
            Error::NoTransactionsForMerchant => (
                StatusCode::NOT_FOUND,
                "No se encontraron transacciones para este mercader".to_owned(),
            ),
            Error::NoTransactionsForDate => (
                StatusCode::NOT_FOUND,
                "No se encontraron transacciones para esta fecha".to_owned(),
            ),
            // Any errors that reach this point are not intended to be shown to the client.
            Error::DatabaseLock | Error::SqlError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error interno del servidor".to_owned(),
            ),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if let Error::SqlError(ref error) = self {
            tracing::error!("An unexpected error occurred: {}", error);
        }

        let (status, message) = self.status_and_message();

        (
            status,
            Json(ErrorBody {
                message,
                error: None,
            }),
        )
            .into_response()
    }
}

/// A JSON body with a single confirmation message, e.g. after a deletion.
pub(crate) fn message_body(message: &str) -> Json<serde_json::Value> {
    Json(json!({ "message": message }))
}
