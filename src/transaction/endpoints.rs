//! The API routes for transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{AppState, Error, message_body};

use super::{
    models::{GoodLine, Transaction, TransactionFormData, TransactionId, TransactionUpdate},
    query::{
        create_transaction, delete_transaction, get_all_transactions, get_transaction,
        get_transactions_by_buyer, get_transactions_by_date, get_transactions_by_merchant,
        update_transaction,
    },
};

/// The state needed for the transaction endpoints.
#[derive(Debug, Clone)]
pub struct TransactionEndpointState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for TransactionEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The query parameters for the buyer search route.
#[derive(Debug, Serialize, Deserialize)]
pub struct BuyerQuery {
    /// The name of the buying hunter.
    #[serde(alias = "name_transactor")]
    pub buyer: Option<String>,
}

/// The query parameters for the merchant search route.
#[derive(Debug, Serialize, Deserialize)]
pub struct MerchantQuery {
    /// The name of the selling merchant.
    #[serde(alias = "name_transactor")]
    pub merchant: Option<String>,
}

/// The query parameters for the date search route.
#[derive(Debug, Serialize, Deserialize)]
pub struct DateQuery {
    /// The date to match, as an opaque string.
    pub date: Option<String>,
}

/// A route handler for listing all transactions.
pub async fn get_transactions_endpoint(
    State(state): State<TransactionEndpointState>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state)?;
    let transactions = get_all_transactions(&connection)?;

    if transactions.is_empty() {
        return Err(Error::NoTransactions);
    }

    Ok(Json(transactions).into_response())
}

/// A route handler for recording a new transaction.
///
/// The stock of every referenced good is adjusted as part of the same
/// database transaction. Any caller-supplied total is ignored.
pub async fn create_transaction_endpoint(
    State(state): State<TransactionEndpointState>,
    Json(form_data): Json<TransactionFormData>,
) -> Result<Response, Error> {
    let (Some(raw_kind), Some(transactor), Some(raw_lines), Some(date), Some(hour)) = (
        form_data.kind,
        form_data.name_transactor,
        form_data.goods,
        form_data.date,
        form_data.hour,
    ) else {
        return Err(Error::MissingTransactionFields);
    };

    if raw_lines.is_empty() {
        return Err(Error::MissingTransactionFields);
    }

    let kind = raw_kind.parse()?;
    let lines = raw_lines
        .into_iter()
        .map(|line| {
            let good = line.good.ok_or(Error::MissingTransactionFields)?;

            Ok(GoodLine {
                good,
                quantity: line.quantity.unwrap_or(1),
            })
        })
        .collect::<Result<Vec<_>, Error>>()?;

    let connection = lock_connection(&state)?;
    let transaction = create_transaction(kind, &transactor, &lines, &date, &hour, &connection)?;

    Ok((StatusCode::CREATED, Json(transaction)).into_response())
}

/// A route handler for getting a transaction by its ID.
pub async fn get_transaction_endpoint(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<TransactionEndpointState>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state)?;
    let transaction = get_transaction(transaction_id, &connection)?;

    Ok(Json(transaction).into_response())
}

/// A route handler for listing the transactions of a buying hunter.
pub async fn get_transactions_by_buyer_endpoint(
    State(state): State<TransactionEndpointState>,
    Query(query): Query<BuyerQuery>,
) -> Result<Response, Error> {
    let transactions = match query.buyer {
        Some(buyer) => {
            let connection = lock_connection(&state)?;
            get_transactions_by_buyer(&buyer, &connection)?
        }
        None => Vec::new(),
    };

    if transactions.is_empty() {
        return Err(Error::NoTransactionsForBuyer);
    }

    Ok(Json(transactions).into_response())
}

/// A route handler for listing the transactions of a selling merchant.
pub async fn get_transactions_by_merchant_endpoint(
    State(state): State<TransactionEndpointState>,
    Query(query): Query<MerchantQuery>,
) -> Result<Response, Error> {
    let transactions = match query.merchant {
        Some(merchant) => {
            let connection = lock_connection(&state)?;
            get_transactions_by_merchant(&merchant, &connection)?
        }
        None => Vec::new(),
    };

    if transactions.is_empty() {
        return Err(Error::NoTransactionsForMerchant);
    }

    Ok(Json(transactions).into_response())
}

/// A route handler for listing the transactions recorded on a date.
pub async fn get_transactions_by_date_endpoint(
    State(state): State<TransactionEndpointState>,
    Query(query): Query<DateQuery>,
) -> Result<Response, Error> {
    let transactions = match query.date {
        Some(date) => {
            let connection = lock_connection(&state)?;
            get_transactions_by_date(&date, &connection)?
        }
        None => Vec::new(),
    };

    if transactions.is_empty() {
        return Err(Error::NoTransactionsForDate);
    }

    Ok(Json(transactions).into_response())
}

/// A route handler for updating the bookkeeping fields of a transaction.
pub async fn update_transaction_endpoint(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<TransactionEndpointState>,
    Json(update): Json<TransactionUpdate>,
) -> Result<Response, Error> {
    if update.is_empty() {
        return Err(Error::EmptyUpdate);
    }

    let connection = lock_connection(&state)?;
    let transaction: Transaction = update_transaction(transaction_id, &update, &connection)?;

    Ok(Json(transaction).into_response())
}

/// A route handler for deleting a transaction, reversing its stock effects.
pub async fn delete_transaction_endpoint(
    Path(transaction_id): Path<TransactionId>,
    State(state): State<TransactionEndpointState>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state)?;
    delete_transaction(transaction_id, &connection)?;

    Ok(message_body("Transacción eliminada exitosamente").into_response())
}

fn lock_connection(
    state: &TransactionEndpointState,
) -> Result<std::sync::MutexGuard<'_, Connection>, Error> {
    state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)
}
