//! This file defines the `Hunter` type, the types needed to create a hunter
//! and the API routes for the hunter type.
//!
//! Hunters buy goods from the inn, so deleting one also removes the
//! transactions recorded against them.

use std::{
    fmt::Display,
    str::FromStr,
    sync::{Arc, Mutex},
};

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

/// The database ID of a hunter.
pub type HunterId = i64;

/// The name of a hunter.
///
/// Between 2 and 50 characters after trimming surrounding whitespace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct HunterName(String);

impl HunterName {
    /// Create a hunter name.
    ///
    /// # Errors
    ///
    /// This function will return [Error::HunterNameTooShort] or
    /// [Error::HunterNameTooLong] if the trimmed name is outside 2-50 characters.
    pub fn new(name: &str) -> Result<Self, Error> {
        let name = name.trim();
        let length = name.chars().count();

        if length < 2 {
            Err(Error::HunterNameTooShort)
        } else if length > 50 {
            Err(Error::HunterNameTooLong)
        } else {
            Ok(Self(name.to_string()))
        }
    }

    /// Create a hunter name without validation.
    ///
    /// The caller should ensure the string is within the length bounds.
    pub fn new_unchecked(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for HunterName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for HunterName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The experience level of a hunter, between 1 and 100.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct Level(i64);

impl Level {
    /// Create a level.
    ///
    /// # Errors
    ///
    /// This function will return [Error::LevelTooLow] or [Error::LevelTooHigh]
    /// if `level` is outside 1-100.
    pub fn new(level: i64) -> Result<Self, Error> {
        if level < 1 {
            Err(Error::LevelTooLow)
        } else if level > 100 {
            Err(Error::LevelTooHigh)
        } else {
            Ok(Self(level))
        }
    }

    /// Create a level without validation.
    pub fn new_unchecked(level: i64) -> Self {
        Self(level)
    }

    /// The numeric value of the level.
    pub fn value(self) -> i64 {
        self.0
    }
}

/// What a hunter is good at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Specialization {
    /// The default school: steel and silver.
    #[default]
    Swords,
    /// Ranged combat.
    Bow,
    /// Signs and spellcraft.
    Magic,
    /// Potions, oils and bombs.
    Alchemy,
    /// Going unnoticed.
    Stealth,
}

impl Specialization {
    fn as_str(self) -> &'static str {
        match self {
            Specialization::Swords => "swords",
            Specialization::Bow => "bow",
            Specialization::Magic => "magic",
            Specialization::Alchemy => "alchemy",
            Specialization::Stealth => "stealth",
        }
    }
}

impl FromStr for Specialization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "swords" => Ok(Specialization::Swords),
            "bow" => Ok(Specialization::Bow),
            "magic" => Ok(Specialization::Magic),
            "alchemy" => Ok(Specialization::Alchemy),
            "stealth" => Ok(Specialization::Stealth),
            other => Err(Error::InvalidSpecialization(other.to_string())),
        }
    }
}

impl Display for Specialization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A hunter registered at the inn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hunter {
    /// The ID of the hunter.
    pub id: HunterId,
    /// The name of the hunter.
    pub name: HunterName,
    /// The experience level of the hunter.
    pub level: Level,
    /// The hunter's school.
    pub specialization: Specialization,
    /// Where the hunter hails from.
    pub origin: Option<String>,
    /// When the hunter was registered.
    #[serde(rename = "createdAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// The state needed for the hunter endpoints.
#[derive(Debug, Clone)]
pub struct HunterEndpointState {
    /// The database connection.
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for HunterEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
        }
    }
}

/// The form data for creating a hunter.
#[derive(Debug, Serialize, Deserialize)]
pub struct HunterFormData {
    /// The name of the hunter.
    pub name: Option<String>,
    /// The level of the hunter.
    pub level: Option<i64>,
    /// The school of the hunter. Defaults to swords.
    pub specialization: Option<String>,
    /// Where the hunter hails from.
    pub origin: Option<String>,
}

/// A partial update to a hunter. Absent fields are left unchanged.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct HunterUpdate {
    /// The new name, if any.
    pub name: Option<String>,
    /// The new level, if any.
    pub level: Option<i64>,
    /// The new specialization, if any.
    pub specialization: Option<String>,
    /// The new origin, if any.
    pub origin: Option<String>,
}

impl HunterUpdate {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.level.is_none()
            && self.specialization.is_none()
            && self.origin.is_none()
    }
}

/// The `?name=` query parameter for the by-name routes.
#[derive(Debug, Serialize, Deserialize)]
pub struct NameQuery {
    /// The name to search for.
    pub name: Option<String>,
}

/// A route handler for listing all hunters.
pub async fn get_hunters_endpoint(
    State(state): State<HunterEndpointState>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state)?;
    let hunters = get_all_hunters(&connection)?;

    Ok(Json(hunters).into_response())
}

/// A route handler for creating a new hunter.
pub async fn create_hunter_endpoint(
    State(state): State<HunterEndpointState>,
    Json(form_data): Json<HunterFormData>,
) -> Result<Response, Error> {
    let (Some(raw_name), Some(raw_level)) = (form_data.name, form_data.level) else {
        return Err(Error::MissingHunterFields);
    };

    let name = HunterName::new(&raw_name)?;
    let level = Level::new(raw_level)?;
    let specialization = match form_data.specialization {
        Some(raw) => raw.parse()?,
        None => Specialization::default(),
    };

    let connection = lock_connection(&state)?;
    let hunter = create_hunter(
        name,
        level,
        specialization,
        form_data.origin.as_deref(),
        &connection,
    )?;

    Ok((StatusCode::CREATED, Json(hunter)).into_response())
}

/// A route handler for getting a hunter by its ID.
pub async fn get_hunter_endpoint(
    Path(hunter_id): Path<HunterId>,
    State(state): State<HunterEndpointState>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state)?;
    let hunter = get_hunter(hunter_id, &connection)?;

    Ok(Json(hunter).into_response())
}

/// A route handler for getting hunters by name.
pub async fn get_hunters_by_name_endpoint(
    State(state): State<HunterEndpointState>,
    Query(query): Query<NameQuery>,
) -> Result<Response, Error> {
    let name = query.name.ok_or(Error::MissingQueryName)?;

    let connection = lock_connection(&state)?;
    let hunters = get_hunters_by_name(&name, &connection)?;

    if hunters.is_empty() {
        return Err(Error::HunterNotFound);
    }

    Ok(Json(hunters).into_response())
}

/// A route handler for updating a hunter by its ID.
pub async fn update_hunter_endpoint(
    Path(hunter_id): Path<HunterId>,
    State(state): State<HunterEndpointState>,
    Json(update): Json<HunterUpdate>,
) -> Result<Response, Error> {
    if update.is_empty() {
        return Err(Error::EmptyUpdate);
    }

    let connection = lock_connection(&state)?;
    let hunter = update_hunter(hunter_id, &update, &connection)?;

    Ok(Json(hunter).into_response())
}

/// A route handler for updating every hunter with a given name.
pub async fn update_hunters_by_name_endpoint(
    State(state): State<HunterEndpointState>,
    Query(query): Query<NameQuery>,
    Json(update): Json<HunterUpdate>,
) -> Result<Response, Error> {
    let name = query.name.ok_or(Error::MissingQueryName)?;

    if update.is_empty() {
        return Err(Error::EmptyUpdate);
    }

    let connection = lock_connection(&state)?;
    let hunters = update_hunters_by_name(&name, &update, &connection)?;

    Ok(Json(hunters).into_response())
}

/// A route handler for deleting a hunter by its ID.
///
/// Every transaction recorded against the hunter is removed as well. Stock
/// is not restored: the goods really did change hands.
pub async fn delete_hunter_endpoint(
    Path(hunter_id): Path<HunterId>,
    State(state): State<HunterEndpointState>,
) -> Result<Response, Error> {
    let connection = lock_connection(&state)?;
    delete_hunter(hunter_id, &connection)?;

    Ok(message_body("Cazador eliminado").into_response())
}

/// A route handler for deleting every hunter with a given name.
pub async fn delete_hunters_by_name_endpoint(
    State(state): State<HunterEndpointState>,
    Query(query): Query<NameQuery>,
) -> Result<Response, Error> {
    let name = query.name.ok_or(Error::MissingQueryName)?;

    let connection = lock_connection(&state)?;
    delete_hunters_by_name(&name, &connection)?;

    Ok(message_body("Cazador eliminado").into_response())
}

fn lock_connection(
    state: &HunterEndpointState,
) -> Result<std::sync::MutexGuard<'_, Connection>, Error> {
    state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLock)
}

/// Create a hunter in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_hunter(
    name: HunterName,
    level: Level,
    specialization: Specialization,
    origin: Option<&str>,
    connection: &Connection,
) -> Result<Hunter, Error> {
    let created_at = OffsetDateTime::now_utc();

    connection.execute(
        "INSERT INTO hunter (name, level, specialization, origin, created_at) \
        VALUES (?1, ?2, ?3, ?4, ?5);",
        (
            name.as_ref(),
            level.value(),
            specialization.as_str(),
            origin,
            created_at,
        ),
    )?;

    let id = connection.last_insert_rowid();

    Ok(Hunter {
        id,
        name,
        level,
        specialization,
        origin: origin.map(str::to_owned),
        created_at,
    })
}

/// Retrieve the hunter with `hunter_id` from the database.
///
/// # Errors
/// This function will return an error if the hunter does not exist or if
/// there is an SQL error.
pub fn get_hunter(hunter_id: HunterId, connection: &Connection) -> Result<Hunter, Error> {
    connection
        .prepare(
            "SELECT id, name, level, specialization, origin, created_at FROM hunter \
            WHERE id = :id;",
        )?
        .query_row(&[(":id", &hunter_id)], map_row)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::HunterNotFound,
            error => error.into(),
        })
}

/// Retrieve every hunter in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_hunters(connection: &Connection) -> Result<Vec<Hunter>, Error> {
    connection
        .prepare(
            "SELECT id, name, level, specialization, origin, created_at FROM hunter \
            ORDER BY id ASC;",
        )?
        .query_map([], map_row)?
        .map(|maybe_hunter| maybe_hunter.map_err(|error| error.into()))
        .collect()
}

/// Retrieve every hunter named exactly `name`.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_hunters_by_name(name: &str, connection: &Connection) -> Result<Vec<Hunter>, Error> {
    connection
        .prepare(
            "SELECT id, name, level, specialization, origin, created_at FROM hunter \
            WHERE name = :name ORDER BY id ASC;",
        )?
        .query_map(&[(":name", &name)], map_row)?
        .map(|maybe_hunter| maybe_hunter.map_err(|error| error.into()))
        .collect()
}

/// Update the hunter with `hunter_id`, merging the provided fields over the
/// stored ones. Provided fields are validated the same way as at creation.
///
/// # Errors
/// This function will return an error if the hunter does not exist, if a
/// provided field fails validation, or if there is an SQL error.
pub fn update_hunter(
    hunter_id: HunterId,
    update: &HunterUpdate,
    connection: &Connection,
) -> Result<Hunter, Error> {
    let hunter = get_hunter(hunter_id, connection)?;

    let name = match &update.name {
        Some(raw) => HunterName::new(raw)?,
        None => hunter.name,
    };
    let level = match update.level {
        Some(raw) => Level::new(raw)?,
        None => hunter.level,
    };
    let specialization = match &update.specialization {
        Some(raw) => raw.parse()?,
        None => hunter.specialization,
    };
    let origin = update.origin.clone().or(hunter.origin);

    connection.execute(
        "UPDATE hunter SET name = ?1, level = ?2, specialization = ?3, origin = ?4 \
        WHERE id = ?5;",
        (
            name.as_ref(),
            level.value(),
            specialization.as_str(),
            &origin,
            hunter_id,
        ),
    )?;

    Ok(Hunter {
        id: hunter_id,
        name,
        level,
        specialization,
        origin,
        created_at: hunter.created_at,
    })
}

/// Apply the same partial update to every hunter named exactly `name`.
///
/// # Errors
/// This function will return an error if no hunters match or if there is an
/// SQL error.
pub fn update_hunters_by_name(
    name: &str,
    update: &HunterUpdate,
    connection: &Connection,
) -> Result<Vec<Hunter>, Error> {
    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Immediate,
    )?;

    let matches = get_hunters_by_name(name, &transaction)?;

    if matches.is_empty() {
        return Err(Error::HunterNotFound);
    }

    let updated = matches
        .into_iter()
        .map(|hunter| update_hunter(hunter.id, update, &transaction))
        .collect::<Result<Vec<_>, _>>()?;

    transaction.commit()?;

    Ok(updated)
}

/// Delete the hunter with `hunter_id` along with every transaction recorded
/// against them, atomically.
///
/// # Errors
/// This function will return an error if the hunter does not exist or if
/// there is an SQL error.
pub fn delete_hunter(hunter_id: HunterId, connection: &Connection) -> Result<(), Error> {
    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Immediate,
    )?;

    get_hunter(hunter_id, &transaction)?;

    crate::transaction::remove_transactions_for_transactor(
        TransactorKind::Hunter,
        hunter_id,
        &transaction,
    )?;

    transaction.execute("DELETE FROM hunter WHERE id = ?1;", [hunter_id])?;

    transaction.commit()?;

    Ok(())
}

/// Delete every hunter named exactly `name`, cascading as [delete_hunter] does.
///
/// # Errors
/// This function will return an error if no hunters match or if there is an
/// SQL error.
pub fn delete_hunters_by_name(name: &str, connection: &Connection) -> Result<(), Error> {
    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Immediate,
    )?;

    let matches = get_hunters_by_name(name, &transaction)?;

    if matches.is_empty() {
        return Err(Error::HunterNotFound);
    }

    for hunter in &matches {
        crate::transaction::remove_transactions_for_transactor(
            TransactorKind::Hunter,
            hunter.id,
            &transaction,
        )?;
        transaction.execute("DELETE FROM hunter WHERE id = ?1;", [hunter.id])?;
    }

    transaction.commit()?;

    Ok(())
}

/// Create the table for hunters.
pub fn create_hunter_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS hunter (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            level INTEGER NOT NULL,
            specialization TEXT NOT NULL,
            origin TEXT,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_hunter_name ON hunter(name);",
    )?;

    Ok(())
}

fn map_row(row: &Row) -> Result<Hunter, rusqlite::Error> {
    let raw_name: String = row.get(1)?;
    let raw_specialization: String = row.get(3)?;

    let specialization = raw_specialization.parse().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            Box::new(error),
        )
    })?;

    Ok(Hunter {
        id: row.get(0)?,
        name: HunterName::new_unchecked(&raw_name),
        level: Level::new_unchecked(row.get(2)?),
        specialization,
        origin: row.get(4)?,
        created_at: row.get(5)?,
    })
}


#[cfg(test)]
mod level_tests {
    use crate::{Error, hunter::Level};

    #[test]
    fn new_fails_below_one() {
        assert_eq!(Level::new(0), Err(Error::LevelTooLow));
    }

    #[test]
    fn new_fails_above_one_hundred() {
        assert_eq!(Level::new(101), Err(Error::LevelTooHigh));
    }

    #[test]
    fn new_succeeds_on_bounds() {
        assert!(Level::new(1).is_ok());
        assert!(Level::new(100).is_ok());
    }
}


#[cfg(test)]
mod hunter_endpoint_tests {
    use std::sync::{Arc, Mutex};

    use axum::{
        Json,
        extract::{Path, State},
        http::StatusCode,
        response::{IntoResponse, Response},
    };
    use rusqlite::Connection;

    use crate::{
        db::initialize,
        hunter::{HunterFormData, create_hunter_endpoint, get_hunter_endpoint},
    };

    use super::HunterEndpointState;

    fn get_test_state() -> HunterEndpointState {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");

        HunterEndpointState {
            db_connection: Arc::new(Mutex::new(connection)),
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        serde_json::from_slice(&body).expect("response body should be JSON")
    }

    #[tokio::test]
    async fn create_hunter_returns_201_with_default_specialization() {
        let state = get_test_state();
        let form = HunterFormData {
            name: Some("Geralt".to_owned()),
            level: Some(5),
            specialization: None,
            origin: None,
        };

        let response = create_hunter_endpoint(State(state), Json(form))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_json(response).await;
        assert_eq!(body["name"], "Geralt");
        assert_eq!(body["level"], 5);
        assert_eq!(body["specialization"], "swords");
    }

    #[tokio::test]
    async fn create_hunter_without_level_returns_400() {
        let state = get_test_state();
        let form = HunterFormData {
            name: Some("Geralt".to_owned()),
            level: None,
            specialization: None,
            origin: None,
        };

        let response = create_hunter_endpoint(State(state), Json(form))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Nombre y nivel son obligatorios");
    }

    #[tokio::test]
    async fn create_hunter_with_invalid_specialization_returns_400() {
        let state = get_test_state();
        let form = HunterFormData {
            name: Some("Geralt".to_owned()),
            level: Some(5),
            specialization: Some("dancing".to_owned()),
            origin: None,
        };

        let response = create_hunter_endpoint(State(state), Json(form))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Especialización no válida: dancing");
    }

    #[tokio::test]
    async fn get_hunter_with_invalid_id_returns_404() {
        let state = get_test_state();

        let response = get_hunter_endpoint(Path(999), State(state))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Cazador no encontrado");
    }
}
