//! Database queries and the stock-mutating workflows for transactions.

use rusqlite::{Connection, Row};

use crate::{Error, good, good::GoodId, hunter, merchant};

use super::models::{GoodLine, Transaction, TransactionId, TransactionUpdate, TransactorKind};

const SELECT_TRANSACTIONS: &str = "SELECT t.id, t.kind, t.total_amount, t.date, t.hour, \
    COALESCE(h.name, m.name) AS transactor \
    FROM \"transaction\" t \
    LEFT JOIN hunter h ON t.kind = 'hunter' AND h.id = t.transactor_id \
    LEFT JOIN merchant m ON t.kind = 'merchant' AND m.id = t.transactor_id";

/// A transaction row without its goods lines.
struct TransactionRecord {
    id: TransactionId,
    kind: TransactorKind,
    transactor: String,
    total_amount: f64,
    date: String,
    hour: String,
}

impl TransactionRecord {
    fn with_goods(self, goods: Vec<GoodLine>) -> Transaction {
        Transaction {
            id: self.id,
            kind: self.kind,
            transactor: self.transactor,
            goods,
            total_amount: self.total_amount,
            date: self.date,
            hour: self.hour,
        }
    }
}

/// Record a new transaction and apply its stock effects, atomically.
///
/// The total is computed from the stored unit prices. A hunter transaction
/// decrements the stock of each good, a merchant transaction increments it.
///
/// # Errors
/// This function will return an error if the transactor or any good cannot
/// be resolved by name, if a quantity is below one, if a decrement would
/// drive a good's stock below zero, or if there is an SQL error. Nothing is
/// persisted in any of these cases.
pub fn create_transaction(
    kind: TransactorKind,
    transactor_name: &str,
    lines: &[GoodLine],
    date: &str,
    hour: &str,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Immediate,
    )?;

    let transactor_id = resolve_transactor(kind, transactor_name, &transaction)?;

    let mut resolved = Vec::with_capacity(lines.len());
    let mut total_amount = 0.0;

    for line in lines {
        if line.quantity < 1 {
            return Err(Error::InvalidQuantity);
        }

        let good = good::find_good_by_name(&line.good, &transaction)?
            .ok_or_else(|| Error::MissingTransactionGood(line.good.clone()))?;

        total_amount += good.price * line.quantity as f64;
        resolved.push((good, line.quantity));
    }

    for (good, quantity) in &resolved {
        good::adjust_stock(good.id, kind.stock_sign() * quantity, &transaction)?;
    }

    transaction.execute(
        "INSERT INTO \"transaction\" (kind, transactor_id, total_amount, date, hour) \
        VALUES (?1, ?2, ?3, ?4, ?5);",
        (kind.as_str(), transactor_id, total_amount, date, hour),
    )?;

    let id = transaction.last_insert_rowid();

    for (good, quantity) in &resolved {
        transaction.execute(
            "INSERT INTO transaction_good (transaction_id, good_id, quantity) \
            VALUES (?1, ?2, ?3);",
            (id, good.id, quantity),
        )?;
    }

    transaction.commit()?;

    Ok(Transaction {
        id,
        kind,
        transactor: transactor_name.to_owned(),
        goods: lines.to_vec(),
        total_amount,
        date: date.to_owned(),
        hour: hour.to_owned(),
    })
}

fn resolve_transactor(
    kind: TransactorKind,
    name: &str,
    connection: &Connection,
) -> Result<i64, Error> {
    let id = match kind {
        TransactorKind::Hunter => hunter::get_hunters_by_name(name, connection)?
            .into_iter()
            .next()
            .map(|hunter| hunter.id),
        TransactorKind::Merchant => {
            merchant::find_merchant_by_name(name, connection)?.map(|merchant| merchant.id)
        }
    };

    id.ok_or_else(|| Error::TransactorNotFound(name.to_owned()))
}

/// Retrieve the transaction with `transaction_id`.
///
/// # Errors
/// This function will return an error if the transaction does not exist or
/// if there is an SQL error.
pub fn get_transaction(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let record = connection
        .prepare(&format!("{SELECT_TRANSACTIONS} WHERE t.id = :id;"))?
        .query_row(&[(":id", &transaction_id)], map_record)
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TransactionNotFound,
            error => error.into(),
        })?;

    let goods = get_lines(record.id, connection)?;

    Ok(record.with_goods(goods))
}

/// Retrieve every transaction in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_transactions(connection: &Connection) -> Result<Vec<Transaction>, Error> {
    let records = connection
        .prepare(&format!("{SELECT_TRANSACTIONS} ORDER BY t.id ASC;"))?
        .query_map([], map_record)?
        .collect::<Result<Vec<_>, _>>()?;

    attach_goods(records, connection)
}

/// Retrieve every transaction where a hunter named `name` was the buyer.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_transactions_by_buyer(
    name: &str,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let records = connection
        .prepare(&format!(
            "{SELECT_TRANSACTIONS} WHERE t.kind = 'hunter' AND h.name = :name \
            ORDER BY t.id ASC;"
        ))?
        .query_map(&[(":name", &name)], map_record)?
        .collect::<Result<Vec<_>, _>>()?;

    attach_goods(records, connection)
}

/// Retrieve every transaction where a merchant named `name` was the seller.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_transactions_by_merchant(
    name: &str,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let records = connection
        .prepare(&format!(
            "{SELECT_TRANSACTIONS} WHERE t.kind = 'merchant' AND m.name = :name \
            ORDER BY t.id ASC;"
        ))?
        .query_map(&[(":name", &name)], map_record)?
        .collect::<Result<Vec<_>, _>>()?;

    attach_goods(records, connection)
}

/// Retrieve every transaction recorded for `date`, compared as an opaque
/// string.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_transactions_by_date(
    date: &str,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let records = connection
        .prepare(&format!(
            "{SELECT_TRANSACTIONS} WHERE t.date = :date ORDER BY t.id ASC;"
        ))?
        .query_map(&[(":date", &date)], map_record)?
        .collect::<Result<Vec<_>, _>>()?;

    attach_goods(records, connection)
}

/// Update the bookkeeping fields of the transaction with `transaction_id`.
///
/// The transactor and goods are fixed after creation, so only the total,
/// date and hour can change.
///
/// # Errors
/// This function will return an error if the transaction does not exist or
/// if there is an SQL error.
pub fn update_transaction(
    transaction_id: TransactionId,
    update: &TransactionUpdate,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let transaction = get_transaction(transaction_id, connection)?;

    let total_amount = update.total_amount.unwrap_or(transaction.total_amount);
    let date = update.date.clone().unwrap_or(transaction.date);
    let hour = update.hour.clone().unwrap_or(transaction.hour);

    connection.execute(
        "UPDATE \"transaction\" SET total_amount = ?1, date = ?2, hour = ?3 WHERE id = ?4;",
        (total_amount, &date, &hour, transaction_id),
    )?;

    Ok(Transaction {
        total_amount,
        date,
        hour,
        ..transaction
    })
}

/// Delete the transaction with `transaction_id`, reversing its stock
/// effects, atomically.
///
/// Reversal mirrors creation: a hunter transaction puts the goods back on
/// the shelf, a merchant transaction takes them off again. A reversal that
/// would drive a good's stock below zero aborts the whole deletion.
///
/// # Errors
/// This function will return an error if the transaction does not exist, if
/// a reversal would drive stock below zero, or if there is an SQL error.
pub fn delete_transaction(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<(), Error> {
    let transaction = rusqlite::Transaction::new_unchecked(
        connection,
        rusqlite::TransactionBehavior::Immediate,
    )?;

    let kind = get_kind(transaction_id, &transaction)?;

    let lines = get_internal_lines(transaction_id, &transaction)?;

    for (good_id, quantity) in lines {
        good::adjust_stock(good_id, -kind.stock_sign() * quantity, &transaction)?;
    }

    transaction.execute(
        "DELETE FROM transaction_good WHERE transaction_id = ?1;",
        [transaction_id],
    )?;
    transaction.execute(
        "DELETE FROM \"transaction\" WHERE id = ?1;",
        [transaction_id],
    )?;

    transaction.commit()?;

    Ok(())
}

/// Remove every transaction recorded against the given transactor.
///
/// Stock is left untouched: the goods really did change hands, removing the
/// transactor does not undo that. Runs on the caller's connection so it can
/// take part in a larger atomic deletion.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn remove_transactions_for_transactor(
    kind: TransactorKind,
    transactor_id: i64,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "DELETE FROM transaction_good WHERE transaction_id IN \
        (SELECT id FROM \"transaction\" WHERE kind = ?1 AND transactor_id = ?2);",
        (kind.as_str(), transactor_id),
    )?;
    connection.execute(
        "DELETE FROM \"transaction\" WHERE kind = ?1 AND transactor_id = ?2;",
        (kind.as_str(), transactor_id),
    )?;

    Ok(())
}

/// Remove every transaction referencing the good with `good_id`, reversing
/// the stock effects of their other lines.
///
/// The referenced good is about to be deleted, so its own lines are not
/// reversed. Runs on the caller's connection so the good deletion stays
/// atomic.
///
/// # Errors
/// This function will return an error if a reversal would drive another
/// good's stock below zero or if there is an SQL error.
pub fn remove_transactions_referencing_good(
    good_id: GoodId,
    connection: &Connection,
) -> Result<(), Error> {
    let affected = connection
        .prepare(
            "SELECT id, kind FROM \"transaction\" WHERE id IN \
            (SELECT transaction_id FROM transaction_good WHERE good_id = :good) \
            ORDER BY id ASC;",
        )?
        .query_map(&[(":good", &good_id)], |row| {
            let raw_kind: String = row.get(1)?;
            Ok((row.get::<_, TransactionId>(0)?, raw_kind))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    for (transaction_id, raw_kind) in affected {
        let kind: TransactorKind = raw_kind.parse()?;

        let surviving: Vec<(GoodId, i64)> = connection
            .prepare(
                "SELECT good_id, quantity FROM transaction_good \
                WHERE transaction_id = :id AND good_id != :good;",
            )?
            .query_map(
                &[(":id", &transaction_id), (":good", &good_id)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        for (other_good_id, quantity) in surviving {
            good::adjust_stock(other_good_id, -kind.stock_sign() * quantity, connection)?;
        }

        connection.execute(
            "DELETE FROM transaction_good WHERE transaction_id = ?1;",
            [transaction_id],
        )?;
        connection.execute(
            "DELETE FROM \"transaction\" WHERE id = ?1;",
            [transaction_id],
        )?;
    }

    Ok(())
}

/// Create the tables for transactions and their goods lines.
pub fn create_transaction_tables(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
            id INTEGER PRIMARY KEY,
            kind TEXT NOT NULL CHECK (kind IN ('hunter', 'merchant')),
            transactor_id INTEGER NOT NULL,
            total_amount REAL NOT NULL CHECK (total_amount >= 0),
            date TEXT NOT NULL,
            hour TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS transaction_good (
            id INTEGER PRIMARY KEY,
            transaction_id INTEGER NOT NULL
                REFERENCES \"transaction\"(id) ON DELETE CASCADE,
            good_id INTEGER NOT NULL REFERENCES good(id),
            quantity INTEGER NOT NULL CHECK (quantity >= 1)
        );

        CREATE INDEX IF NOT EXISTS idx_transaction_transactor
            ON \"transaction\"(kind, transactor_id);
        CREATE INDEX IF NOT EXISTS idx_transaction_good_good
            ON transaction_good(good_id);",
    )?;

    Ok(())
}

fn get_kind(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<TransactorKind, Error> {
    let raw_kind: String = connection
        .query_row(
            "SELECT kind FROM \"transaction\" WHERE id = :id;",
            &[(":id", &transaction_id)],
            |row| row.get(0),
        )
        .map_err(|error| match error {
            rusqlite::Error::QueryReturnedNoRows => Error::TransactionNotFound,
            error => error.into(),
        })?;

    raw_kind.parse()
}

fn get_internal_lines(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Vec<(GoodId, i64)>, Error> {
    connection
        .prepare(
            "SELECT good_id, quantity FROM transaction_good WHERE transaction_id = :id \
            ORDER BY id ASC;",
        )?
        .query_map(&[(":id", &transaction_id)], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .map(|maybe_line| maybe_line.map_err(|error| error.into()))
        .collect()
}

fn get_lines(
    transaction_id: TransactionId,
    connection: &Connection,
) -> Result<Vec<GoodLine>, Error> {
    connection
        .prepare(
            "SELECT g.name, tg.quantity FROM transaction_good tg \
            JOIN good g ON g.id = tg.good_id \
            WHERE tg.transaction_id = :id ORDER BY tg.id ASC;",
        )?
        .query_map(&[(":id", &transaction_id)], |row| {
            Ok(GoodLine {
                good: row.get(0)?,
                quantity: row.get(1)?,
            })
        })?
        .map(|maybe_line| maybe_line.map_err(|error| error.into()))
        .collect()
}

fn attach_goods(
    records: Vec<TransactionRecord>,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    records
        .into_iter()
        .map(|record| {
            let goods = get_lines(record.id, connection)?;
            Ok(record.with_goods(goods))
        })
        .collect()
}

fn map_record(row: &Row) -> Result<TransactionRecord, rusqlite::Error> {
    let raw_kind: String = row.get(1)?;
    let kind = raw_kind.parse().map_err(|error: Error| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(error))
    })?;

    Ok(TransactionRecord {
        id: row.get(0)?,
        kind,
        total_amount: row.get(2)?,
        date: row.get(3)?,
        hour: row.get(4)?,
        transactor: row.get(5)?,
    })
}
