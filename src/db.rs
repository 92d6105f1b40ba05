//! Database initialization for the application's SQLite schema.

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};

use crate::{
    Error, good::create_good_table, hunter::create_hunter_table, merchant::create_merchant_table,
    transaction::create_transaction_tables,
};

/// Create the tables for every domain model.
///
/// Table creation happens inside a single exclusive transaction so a
/// partially initialized schema is never left behind.
///
/// # Errors
/// Returns an error if there is an SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    // Foreign keys are off by default in SQLite. The transaction tables rely
    // on them for cascading line deletion.
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction =
        SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_good_table(&transaction)?;
    create_hunter_table(&transaction)?;
    create_merchant_table(&transaction)?;
    create_transaction_tables(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod initialize_tests {
    use rusqlite::Connection;

    use super::initialize;

    #[test]
    fn initialize_creates_all_tables() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).expect("Could not initialize database");

        let count: i64 = connection
            .prepare(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                AND name IN ('good', 'hunter', 'merchant', 'transaction', 'transaction_good');",
            )
            .unwrap()
            .query_row([], |row| row.get(0))
            .unwrap();

        assert_eq!(count, 5);
    }

    #[test]
    fn initialize_is_idempotent() {
        let connection = Connection::open_in_memory().unwrap();

        initialize(&connection).expect("Could not initialize database");
        initialize(&connection).expect("Second initialize should succeed");
    }
}
