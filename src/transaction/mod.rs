//! Transactions record goods changing hands at the inn: hunters buy from the
//! stock, merchants restock it. Creating or deleting a transaction therefore
//! also adjusts the stock of every referenced good, atomically.
//!
//! On the wire a transaction names its transactor and goods. Internally both
//! are stored as foreign-key ids and the names are resolved back at read
//! time, so renaming a hunter or good does not orphan its history.

mod endpoints;
mod models;
mod query;

pub use endpoints::{
    TransactionEndpointState, create_transaction_endpoint, delete_transaction_endpoint,
    get_transaction_endpoint, get_transactions_by_buyer_endpoint,
    get_transactions_by_date_endpoint, get_transactions_by_merchant_endpoint,
    get_transactions_endpoint, update_transaction_endpoint,
};
pub use models::{
    GoodLine, GoodLineFormData, Transaction, TransactionFormData, TransactionId,
    TransactionUpdate, TransactorKind,
};
pub use query::{
    create_transaction, create_transaction_tables, delete_transaction, get_all_transactions,
    get_transaction, get_transactions_by_buyer, get_transactions_by_date,
    get_transactions_by_merchant, remove_transactions_for_transactor,
    remove_transactions_referencing_good, update_transaction,
};
