//! This file defines the `Good` type, the inventory item traded at the inn,
//! along with its API routes and database queries.
//!
//! Goods carry the stock counts that the transaction workflow mutates, so
//! this module also exposes the stock adjustment helper used by
//! [crate::transaction].

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row, ToSql};
use serde::{Deserialize, Serialize};

use crate::{AppState, Error, message_body};

/// The database ID of a good.
pub type GoodId = i64;

/// An item held in the inn's inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Good {
    /// The ID of the good.
    pub id: GoodId,
    /// The name of the good, e.g. 'Espada de plata'.
    pub name: String,
    /// What the good is, for anyone who cannot tell from the name.
    pub description: Option<String>,
    /// The price of a single unit.
    pub price: f64,
    /// How many units are on the shelves. Never negative.
    pub stock: i64,
}

/// The state needed for the good endpoints.
#[derive(Debug, Clone)]
pub struct GoodEndpointState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for GoodEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The form data for creating a good.
///
/// Every field is optional at the serde level so a missing field produces
/// the domain's 400 message instead of a deserialization rejection.
#[derive(Debug, Serialize, Deserialize)]
pub struct GoodFormData {
    /// The name of the good.
    pub name: Option<String>,
    /// The description of the good.
    pub description: Option<String>,
    /// The unit price of the good.
    pub price: Option<f64>,
    /// The stock count of the good.
    pub stock: Option<i64>,
}

/// A partial update to a good. Absent fields are left unchanged.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GoodUpdate {
    /// The new name, if any.
    pub name: Option<String>,
    /// The new description, if any.
    pub description: Option<String>,
    /// The new price, if any.
    pub price: Option<f64>,
    /// The new stock count, if any.
    pub stock: Option<i64>,
}

impl GoodUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
    }

    fn validate(&self) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::EmptyUpdate);
        }

        if self.price.is_some_and(|price| price < 0.0) || self.stock.is_some_and(|stock| stock < 0)
        {
            return Err(Error::NegativeGoodValues);
        }

        Ok(())
    }
}

/// The filter for good searches. Absent fields impose no constraint,
/// present fields require an exact match.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GoodFilter {
    /// Match goods with exactly this name.
    pub name: Option<String>,
    /// Match goods with exactly this description.
    pub description: Option<String>,
    /// Match goods with exactly this price.
    pub price: Option<f64>,
    /// Match goods with exactly this stock count.
    pub stock: Option<i64>,
}

impl GoodFilter {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.stock.is_none()
    }

    fn where_clause(&self) -> (String, Vec<&dyn ToSql>) {
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<&dyn ToSql> = Vec::new();

        if let Some(name) = &self.name {
            clauses.push("name = ?");
            params.push(name);
        }

        if let Some(description) = &self.description {
            clauses.push("description = ?");
            params.push(description);
        }

        if let Some(price) = &self.price {
            clauses.push("price = ?");
            params.push(price);
        }

        if let Some(stock) = &self.stock {
            clauses.push("stock = ?");
            params.push(stock);
        }

        (clauses.join(" AND "), params)
    }
}

/// A route handler for listing all goods.
pub async fn get_goods_endpoint(State(state): State<GoodEndpointState>) -> Result<Response, Error> {
    let connection = lock_connection(&state)?;
    let goods = get_all_goods(&connection)?;

    Ok(Json(goods).into_response())
}

/// A route handler for creating a new good.
pub async fn create_good_endpoint(
    State(state): State<GoodEndpointState>,
    Json(form_data): Json<GoodFormData>,
) -> Result<Response, Error> {
    let (Some(name), Some(description), Some(price), Some(stock)) = (
        form_data.name,
        form_data.description,
        form_data.price,
        form_data.stock,
    ) else {
        return Err(Error::MissingGoodFields);
    };

    if price < 0.0 || stock < 0 {
        return Err(Error::NegativeGoodValues);
    }

    let connection = lock_connection(&state)?;
    let good = create_good(&name, &description, price, stock, &connection)?;

    Ok((StatusCode::CREATED, Json(good)).into_response())
}

/// A route handler for getting a good by its ID.
pub async fn get_good_endpoint(
    Path(good_id): Path<GoodId>,
    State(state): State<GoodEndpointState>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state)?;
    let good = get_good(good_id, &connection)?;

    Ok(Json(good).into_response())
}

/// A route handler for searching goods by any combination of fields.
pub async fn search_goods_endpoint(
    State(state): State<GoodEndpointState>,
    Query(filter): Query<GoodFilter>,
) -> Result<Response, Error> {
    if filter.is_empty() {
        return Err(Error::NoSearchCriteria);
    }

    let connection = lock_connection(&state)?;
    let goods = query_goods(&filter, &connection)?;

    if goods.is_empty() {
        return Err(Error::GoodNotFound);
    }

    Ok(Json(goods).into_response())
}

/// A route handler for updating a good by its ID.
pub async fn update_good_endpoint(
    Path(good_id): Path<GoodId>,
    State(state): State<GoodEndpointState>,
    Json(update): Json<GoodUpdate>,
) -> Result<Response, Error> {
    update.validate()?;

    let connection = lock_connection(&state)?;
    let good = update_good(good_id, &update, &connection)?;

    Ok(Json(good).into_response())
}

/// A route handler for updating every good matching a filter.
pub async fn update_goods_by_query_endpoint(
    State(state): State<GoodEndpointState>,
    Query(filter): Query<GoodFilter>,
    Json(update): Json<GoodUpdate>,
) -> Result<Response, Error> {
    if filter.is_empty() {
        return Err(Error::NoSearchCriteria);
    }

    update.validate()?;

    let connection = lock_connection(&state)?;
    let goods = update_goods_by_query(&filter, &update, &connection)?;

    Ok(Json(goods).into_response())
}

/// A route handler for deleting a good by its ID.
///
/// Deleting a good removes every transaction that references it, reversing
/// the stock effects those transactions had on other goods.
pub async fn delete_good_endpoint(
    Path(good_id): Path<GoodId>,
    State(state): State<GoodEndpointState>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state)?;
    delete_good(good_id, &connection)?;

    Ok(message_body("Bien eliminado").into_response())
}

/// A route handler for deleting every good matching a filter.
pub async fn delete_goods_by_query_endpoint(
    State(state): State<GoodEndpointState>,
    Query(filter): Query<GoodFilter>,
) -> Result<Response, Error> {
    if filter.is_empty() {
        return Err(Error::NoSearchCriteria);
    }

    let connection = lock_connection(&state)?;
    delete_goods_by_query(&filter, &connection)?;

    Ok(message_body("Bien(es) eliminado(s)").into_response())
}

fn lock_connection(
    state: &GoodEndpointState,
) -> Result<std::sync::MutexGuard<'_, Connection>, Error> {
    state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)
}

/// Create a good in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_good(
    name: &str,
    description: &str,
    price: f64,
    stock: i64,
    connection: &Connection,
) -> Result<Good, Error> {
    connection.execute(
        "INSERT INTO good (name, description, price, stock) VALUES (?1, ?2, ?3, ?4);",
        (name, description, price, stock),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Good {
        id,
        name: name.to_owned(),
        description: Some(description.to_owned()),
        price,
        stock,
    })
}

/// Retrieve the good with `good_id` from the database.
///
/// # Errors
/// This function will return an error if the good does not exist or if there
/// is an SQL error.
pub fn get_good(good_id: GoodId, connection: &Connection) -> Result<Good, Error> {
    connection
        .prepare("SELECT id, name, description, price, stock FROM good WHERE id = :id;")?
        .query_row(&[(":id", &good_id)], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::GoodNotFound,
            error => error.into(),
        })
}

/// Retrieve every good in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_goods(connection: &Connection) -> Result<Vec<Good>, Error> {
    connection
        .prepare("SELECT id, name, description, price, stock FROM good ORDER BY id ASC;")?
        .query_map([], map_row)?
        .map(|maybe_good| maybe_good.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the goods matching `filter`.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn query_goods(filter: &GoodFilter, connection: &Connection) -> Result<Vec<Good>, Error> {
    let (clause, params) = filter.where_clause();

    let sql = if clause.is_empty() {
        "SELECT id, name, description, price, stock FROM good ORDER BY id ASC;".to_owned()
    } else {
        format!(
            "SELECT id, name, description, price, stock FROM good WHERE {clause} ORDER BY id ASC;"
        )
    };

    connection
        .prepare(&sql)?
        .query_map(params.as_slice(), map_row)?
        .map(|maybe_good| maybe_good.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the single good named `name`, if one exists.
///
/// Transactions reference goods by name on the wire, so the workflow
/// resolves each name to a row with this lookup.
pub(crate) fn find_good_by_name(
    name: &str,
    connection: &Connection,
) -> Result<Option<Good>, Error> {
    let mut statement =
        connection.prepare("SELECT id, name, description, price, stock FROM good WHERE name = :name;")?;
    let mut rows = statement.query_map(&[(":name", &name)], map_row)?;

    rows.next().transpose().map_err(|error| error.into())
}

/// Apply `delta` to the stock of the good with `good_id`.
///
/// # Errors
/// Returns [Error::InsufficientStock] naming the good if the adjustment
/// would drive its stock below zero or past the representable range. The
/// row is not modified in either case.
pub(crate) fn adjust_stock(
    good_id: GoodId,
    delta: i64,
    connection: &Connection,
) -> Result<(), Error> {
    let good = get_good(good_id, connection)?;

    let Some(new_stock) = good.stock.checked_add(delta).filter(|stock| *stock >= 0) else {
        return Err(Error::InsufficientStock(good.name));
    };

    connection.execute(
        "UPDATE good SET stock = ?1 WHERE id = ?2;",
        (new_stock, good_id),
    )?;

    Ok(())
}

/// Update the good with `good_id`, merging the provided fields over the
/// stored ones.
///
/// # Errors
/// This function will return an error if the good does not exist or if there
/// is an SQL error.
pub fn update_good(
    good_id: GoodId,
    update: &GoodUpdate,
    connection: &Connection,
) -> Result<Good, Error> {
    let good = get_good(good_id, connection)?;

    let merged = Good {
        id: good.id,
        name: update.name.clone().unwrap_or(good.name),
        description: update.description.clone().or(good.description),
        price: update.price.unwrap_or(good.price),
        stock: update.stock.unwrap_or(good.stock),
    };

    connection.execute(
        "UPDATE good SET name = ?1, description = ?2, price = ?3, stock = ?4 WHERE id = ?5;",
        (
            &merged.name,
            &merged.description,
            merged.price,
            merged.stock,
            merged.id,
        ),
    )?;

    Ok(merged)
}

/// Apply the same partial update to every good matching `filter`.
///
/// The updates run inside a single SQL transaction: either every match is
/// updated or none are.
///
/// # Errors
/// This function will return an error if no goods match or if there is an
/// SQL error.
pub fn update_goods_by_query(
    filter: &GoodFilter,
    update: &GoodUpdate,
    connection: &Connection,
) -> Result<Vec<Good>, Error> {
    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Immediate,
    )?;

    let matches = query_goods(filter, &transaction)?;

    if matches.is_empty() {
        return Err(Error::GoodNotFound);
    }

    let updated = matches
        .into_iter()
        .map(|good| update_good(good.id, update, &transaction))
        .collect::<Result<Vec<_>, _>>()?;

    transaction.commit()?;

    Ok(updated)
}

/// Delete the good with `good_id`.
///
/// Any transaction referencing the good has its stock effects on the
/// surviving goods reversed and is then deleted, so no orphan transactions
/// remain. The whole cascade runs inside a single SQL transaction.
///
/// # Errors
/// This function will return an error if the good does not exist, if a
/// stock reversal would drive another good's stock below zero, or if there
/// is an SQL error.
pub fn delete_good(good_id: GoodId, connection: &Connection) -> Result<(), Error> {
    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Immediate,
    )?;

    // Confirms the good exists before touching anything else.
    get_good(good_id, &transaction)?;

    crate::transaction::remove_transactions_referencing_good(good_id, &transaction)?;

    transaction.execute("DELETE FROM good WHERE id = ?1;", [good_id])?;

    transaction.commit()?;

    Ok(())
}

/// Delete every good matching `filter`, cascading as [delete_good] does.
///
/// # Errors
/// This function will return an error if no goods match or if there is an
/// SQL error.
pub fn delete_goods_by_query(filter: &GoodFilter, connection: &Connection) -> Result<(), Error> {
    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Immediate,
    )?;

    let matches = query_goods(filter, &transaction)?;

    if matches.is_empty() {
        return Err(Error::GoodNotFound);
    }

    for good in &matches {
        crate::transaction::remove_transactions_referencing_good(good.id, &transaction)?;
        transaction.execute("DELETE FROM good WHERE id = ?1;", [good.id])?;
    }

    transaction.commit()?;

    Ok(())
}

/// Create the table for goods.
pub fn create_good_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS good (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            price REAL NOT NULL CHECK (price >= 0),
            stock INTEGER NOT NULL CHECK (stock >= 0)
        );

        CREATE INDEX IF NOT EXISTS idx_good_name ON good(name);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Good, rusqlite::Error> {
    Ok(Good {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        stock: row.get(4)?,
    })
}
