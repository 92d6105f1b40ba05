//! This file defines the `Merchant` type, the types needed to create a
//! merchant and the API routes for the merchant type.
//!
//! Merchants sell goods to the inn. Unlike hunters, their name search is a
//! case-insensitive substring match.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{AppState, Error, message_body, transaction::TransactorKind};

/// The database ID of a merchant.
pub type MerchantId = i64;

/// A merchant trading with the inn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Merchant {
    /// The ID of the merchant.
    pub id: MerchantId,
    /// The name of the merchant.
    pub name: String,
    /// Where the merchant trades from.
    pub location: Option<String>,
    /// What the merchant deals in.
    pub specialty: Option<String>,
    /// When the merchant was registered.
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The state needed for the merchant endpoints.
#[derive(Debug, Clone)]
pub struct MerchantEndpointState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for MerchantEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The form data for creating a merchant.
#[derive(Debug, Serialize, Deserialize)]
pub struct MerchantFormData {
    /// The name of the merchant.
    pub name: Option<String>,
    /// Where the merchant trades from.
    pub location: Option<String>,
    /// What the merchant deals in.
    pub specialty: Option<String>,
}

/// A partial update to a merchant. Absent fields are left unchanged.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MerchantUpdate {
    /// The new name, if any.
    pub name: Option<String>,
    /// The new location, if any.
    pub location: Option<String>,
    /// The new specialty, if any.
    pub specialty: Option<String>,
}

impl MerchantUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.location.is_none() && self.specialty.is_none()
    }
}

/// The `?name=` query parameter for the by-name routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct NameQuery {
    /// The name to search for.
    pub name: Option<String>,
}

/// A route handler for listing all merchants.
pub async fn get_merchants_endpoint(
    State(state): State<MerchantEndpointState>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state)?;
    let merchants = get_all_merchants(&connection)?;

    if merchants.is_empty() {
        return Err(Error::NoMerchants);
    }

    Ok(Json(merchants).into_response())
}

/// A route handler for creating a new merchant.
pub async fn create_merchant_endpoint(
    State(state): State<MerchantEndpointState>,
    Json(form_data): Json<MerchantFormData>,
) -> Result<Response, Error> {
    let Some(name) = form_data.name.filter(|name| !name.trim().is_empty()) else {
        return Err(Error::MissingMerchantName);
    };

    let connection = lock_connection(&state)?;
    let merchant = create_merchant(
        &name,
        form_data.location.as_deref(),
        form_data.specialty.as_deref(),
        &connection,
    )?;

    Ok((StatusCode::CREATED, Json(merchant)).into_response())
}

/// A route handler for getting a merchant by its ID.
pub async fn get_merchant_endpoint(
    Path(merchant_id): Path<MerchantId>,
    State(state): State<MerchantEndpointState>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state)?;
    let merchant = get_merchant(merchant_id, &connection)?;

    Ok(Json(merchant).into_response())
}

/// A route handler for searching merchants by name.
///
/// Matches case-insensitively on any part of the name.
pub async fn get_merchants_by_name_endpoint(
    State(state): State<MerchantEndpointState>,
    Query(query): Query<NameQuery>,
) -> Result<Response, Error> {
    let name = query.name.ok_or(Error::MissingQueryName)?;

    let connection = lock_connection(&state)?;
    let merchants = get_merchants_by_name(&name, &connection)?;

    if merchants.is_empty() {
        return Err(Error::MerchantNotFound);
    }

    Ok(Json(merchants).into_response())
}

/// A route handler for updating a merchant by its ID.
pub async fn update_merchant_endpoint(
    Path(merchant_id): Path<MerchantId>,
    State(state): State<MerchantEndpointState>,
    Json(update): Json<MerchantUpdate>,
) -> Result<Response, Error> {
    if update.is_empty() {
        return Err(Error::EmptyUpdate);
    }

    let connection = lock_connection(&state)?;
    let merchant = update_merchant(merchant_id, &update, &connection)?;

    Ok(Json(merchant).into_response())
}

/// A route handler for updating every merchant matching a name search.
pub async fn update_merchants_by_name_endpoint(
    State(state): State<MerchantEndpointState>,
    Query(query): Query<NameQuery>,
    Json(update): Json<MerchantUpdate>,
) -> Result<Response, Error> {
    let name = query.name.ok_or(Error::MissingQueryName)?;

    if update.is_empty() {
        return Err(Error::EmptyUpdate);
    }

    let connection = lock_connection(&state)?;
    let merchants = update_merchants_by_name(&name, &update, &connection)?;

    Ok(Json(merchants).into_response())
}

/// A route handler for deleting a merchant by its ID.
///
/// Every transaction recorded against the merchant is removed as well. Stock
/// is not restored.
pub async fn delete_merchant_endpoint(
    Path(merchant_id): Path<MerchantId>,
    State(state): State<MerchantEndpointState>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state)?;
    delete_merchant(merchant_id, &connection)?;

    Ok(message_body("Mercader eliminado").into_response())
}

/// A route handler for deleting every merchant matching a name search.
pub async fn delete_merchants_by_name_endpoint(
    State(state): State<MerchantEndpointState>,
    Query(query): Query<NameQuery>,
) -> Result<Response, Error> {
    let name = query.name.ok_or(Error::MissingQueryName)?;

    let connection = lock_connection(&state)?;
    delete_merchants_by_name(&name, &connection)?;

    Ok(message_body("Mercader eliminado").into_response())
}

fn lock_connection(
    state: &MerchantEndpointState,
) -> Result<std::sync::MutexGuard<'_, Connection>, Error> {
    state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)
}

/// Create a merchant in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_merchant(
    name: &str,
    location: Option<&str>,
    specialty: Option<&str>,
    connection: &Connection,
) -> Result<Merchant, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO merchant (name, location, specialty, created_at) \
        VALUES (?1, ?2, ?3, ?4);",
        (name, location, specialty, created_at),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Merchant {
        id,
        name: name.to_owned(),
        location: location.map(str::to_owned),
        specialty: specialty.map(str::to_owned),
        created_at,
    })
}

/// Retrieve the merchant with `merchant_id` from the database.
///
/// # Errors
/// This function will return an error if the merchant does not exist or if
/// there is an SQL error.
pub fn get_merchant(merchant_id: MerchantId, connection: &Connection) -> Result<Merchant, Error> {
    connection
        .prepare(
            "SELECT id, name, location, specialty, created_at FROM merchant WHERE id = :id;",
        )?
        .query_row(&[(":id", &merchant_id)], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::MerchantNotFound,
            error => error.into(),
        })
}

/// Retrieve every merchant in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_merchants(connection: &Connection) -> Result<Vec<Merchant>, Error> {
    connection
        .prepare(
            "SELECT id, name, location, specialty, created_at FROM merchant ORDER BY id ASC;",
        )?
        .query_map([], map_row)?
        .map(|maybe_merchant| maybe_merchant.map_err(|error| error.into()))
        .collect()
}

/// Retrieve every merchant whose name contains `name`, ignoring case.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_merchants_by_name(name: &str, connection: &Connection) -> Result<Vec<Merchant>, Error> {
    connection
        .prepare(
            "SELECT id, name, location, specialty, created_at FROM merchant \
            WHERE name LIKE '%' || :name || '%' ORDER BY id ASC;",
        )?
        .query_map(&[(":name", &name)], map_row)?
        .map(|maybe_merchant| maybe_merchant.map_err(|error| error.into()))
        .collect()
}

/// Retrieve the first merchant named exactly `name`, if one exists.
///
/// Transactions reference their transactor by name on the wire, so the
/// workflow resolves the name to a row with this lookup.
pub(crate) fn find_merchant_by_name(
    name: &str,
    connection: &Connection,
) -> Result<Option<Merchant>, Error> {
    let mut statement = connection.prepare(
        "SELECT id, name, location, specialty, created_at FROM merchant \
        WHERE name = :name ORDER BY id ASC LIMIT 1;",
    )?;
    let mut rows = statement.query_map(&[(":name", &name)], map_row)?;

    rows.next().transpose().map_err(|error| error.into())
}

/// Update the merchant with `merchant_id`, merging the provided fields over
/// the stored ones.
///
/// # Errors
/// This function will return an error if the merchant does not exist or if
/// there is an SQL error.
pub fn update_merchant(
    merchant_id: MerchantId,
    update: &MerchantUpdate,
    connection: &Connection,
) -> Result<Merchant, Error> {
    let merchant = get_merchant(merchant_id, connection)?;

    let name = update.name.clone().unwrap_or(merchant.name);
    let location = update.location.clone().or(merchant.location);
    let specialty = update.specialty.clone().or(merchant.specialty);

    connection.execute(
        "UPDATE merchant SET name = ?1, location = ?2, specialty = ?3 WHERE id = ?4;",
        (&name, &location, &specialty, merchant_id),
    )?;

    Ok(Merchant {
        id: merchant_id,
        name,
        location,
        specialty,
        created_at: merchant.created_at,
    })
}

/// Apply the same partial update to every merchant matching the name search.
///
/// # Errors
/// This function will return an error if no merchants match or if there is an
/// SQL error.
pub fn update_merchants_by_name(
    name: &str,
    update: &MerchantUpdate,
    connection: &Connection,
) -> Result<Vec<Merchant>, Error> {
    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Immediate,
    )?;

    let matches = get_merchants_by_name(name, &transaction)?;

    if matches.is_empty() {
        return Err(Error::MerchantNotFound);
    }

    let updated = matches
        .into_iter()
        .map(|merchant| update_merchant(merchant.id, update, &transaction))
        .collect::<Result<Vec<_>, _>>()?;

    transaction.commit()?;

    Ok(updated)
}

/// Delete the merchant with `merchant_id` along with every transaction
/// recorded against them, atomically.
///
/// # Errors
/// This function will return an error if the merchant does not exist or if
/// there is an SQL error.
pub fn delete_merchant(merchant_id: MerchantId, connection: &Connection) -> Result<(), Error> {
    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Immediate,
    )?;

    get_merchant(merchant_id, &transaction)?;

    crate::transaction::remove_transactions_for_transactor(
        TransactorKind::Merchant,
        merchant_id,
        &transaction,
    )?;

    transaction.execute("DELETE FROM merchant WHERE id = ?1;", [merchant_id])?;

    transaction.commit()?;

    Ok(())
}

/// Delete every merchant matching the name search, cascading as
/// [delete_merchant] does.
///
/// # Errors
/// This function will return an error if no merchants match or if there is an
/// SQL error.
pub fn delete_merchants_by_name(name: &str, connection: &Connection) -> Result<(), Error> {
    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Immediate,
    )?;

    let matches = get_merchants_by_name(name, &transaction)?;

    if matches.is_empty() {
        return Err(Error::MerchantNotFound);
    }

    for merchant in &matches {
        crate::transaction::remove_transactions_for_transactor(
            TransactorKind::Merchant,
            merchant.id,
            &transaction,
        )?;
        transaction.execute("DELETE FROM merchant WHERE id = ?1;", [merchant.id])?;
    }

    transaction.commit()?;

    Ok(())
}

/// Create the table for merchants.
pub fn create_merchant_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS merchant (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            location TEXT,
            specialty TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_merchant_name ON merchant(name);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Merchant, rusqlite::Error> {
    Ok(Merchant {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        specialty: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod merchant_query_tests {
    use rusqlite::Connection;

    use crate::{
        Error,
        db::initialize,
        merchant::{
            Merchant, MerchantUpdate, create_merchant, delete_merchant, get_all_merchants,
            get_merchant, get_merchants_by_name, update_merchant, update_merchants_by_name,
        },
    };

    fn get_test_db_connection() -> Connection {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).expect("Could not initialize database");
        connection
    }

    fn create_test_merchant(name: &str, connection: &Connection) -> Merchant {
        create_merchant(name, Some("Novigrad"), Some("armas"), connection)
            .expect("Could not create test merchant")
    }

    #[test]
    fn create_merchant_succeeds() {
        let connection = get_test_db_connection();

        let merchant = create_test_merchant("Hattori", &connection);

        assert!(merchant.id > 0);
        assert_eq!(merchant.name, "Hattori");
        assert_eq!(merchant.location.as_deref(), Some("Novigrad"));
        assert_eq!(merchant.specialty.as_deref(), Some("armas"));
    }

    #[test]
    fn get_merchant_round_trips() {
        let connection = get_test_db_connection();
        let inserted = create_test_merchant("Hattori", &connection);

        let selected = get_merchant(inserted.id, &connection).expect("Could not get merchant");

        assert_eq!(selected.id, inserted.id);
        assert_eq!(selected.name, inserted.name);
        assert_eq!(selected.location, inserted.location);
        assert_eq!(selected.specialty, inserted.specialty);
    }

    #[test]
    fn get_merchant_with_invalid_id_returns_not_found() {
        let connection = get_test_db_connection();

        assert_eq!(get_merchant(999, &connection), Err(Error::MerchantNotFound));
    }

    #[test]
    fn get_merchants_by_name_matches_substring_case_insensitively() {
        let connection = get_test_db_connection();
        create_test_merchant("Hattori", &connection);
        create_test_merchant("Bram", &connection);

        let matches = get_merchants_by_name("hatt", &connection).unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "Hattori");
    }

    #[test]
    fn update_merchant_merges_fields() {
        let connection = get_test_db_connection();
        let merchant = create_test_merchant("Hattori", &connection);

        let updated = update_merchant(
            merchant.id,
            &MerchantUpdate {
                location: Some("Oxenfurt".to_owned()),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();

        assert_eq!(updated.name, "Hattori");
        assert_eq!(updated.location.as_deref(), Some("Oxenfurt"));
        assert_eq!(updated.specialty.as_deref(), Some("armas"));
    }

    #[test]
    fn update_merchants_by_name_updates_every_match() {
        let connection = get_test_db_connection();
        create_test_merchant("Hattori", &connection);
        create_test_merchant("Hattori", &connection);

        let updated = update_merchants_by_name(
            "Hattori",
            &MerchantUpdate {
                specialty: Some("espadas".to_owned()),
                ..Default::default()
            },
            &connection,
        )
        .unwrap();

        assert_eq!(updated.len(), 2);
        assert!(
            updated
                .iter()
                .all(|merchant| merchant.specialty.as_deref() == Some("espadas"))
        );
    }

    #[test]
    fn delete_merchant_succeeds() {
        let connection = get_test_db_connection();
        let merchant = create_test_merchant("Hattori", &connection);

        delete_merchant(merchant.id, &connection).expect("Could not delete merchant");

        assert_eq!(
            get_merchant(merchant.id, &connection),
            Err(Error::MerchantNotFound)
        );
        assert!(get_all_merchants(&connection).unwrap().is_empty());
    }

    #[test]
    fn delete_merchants_by_name_with_no_match_returns_not_found() {
        let connection = get_test_db_connection();

        assert_eq!(
            super::delete_merchants_by_name("nadie", &connection),
            Err(Error::MerchantNotFound)
        );
    }
}
