//! The transaction types and their wire shapes.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// The database ID of a transaction.
pub type TransactionId = i64;

/// Which side of the counter the transactor stands on.
///
/// A hunter buys goods, depleting stock. A merchant sells goods to the inn,
/// replenishing it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "lowercase")]
pub enum TransactorKind {
    /// The transactor is a hunter making a purchase.
    Hunter,
    /// The transactor is a merchant restocking the inn.
    Merchant,
}

impl TransactorKind {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            TransactorKind::Hunter => "hunter",
            TransactorKind::Merchant => "merchant",
        }
    }

    /// The sign of the stock change this transactor causes at creation.
    pub(crate) fn stock_sign(self) -> i64 {
        match self {
            TransactorKind::Hunter => -1,
            TransactorKind::Merchant => 1,
        }
    }
}

impl FromStr for TransactorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hunter" => Ok(TransactorKind::Hunter),
            "merchant" => Ok(TransactorKind::Merchant),
            other => Err(Error::InvalidTransactorKind(other.to_string())),
        }
    }
}

impl Display for TransactorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One line of a transaction: a good and how many of it changed hands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodLine {
    /// The name of the good.
    pub good: String,
    /// How many units changed hands.
    pub quantity: i64,
}

/// A recorded exchange of goods, with names resolved for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// Whether the transactor was a hunter or a merchant.
    #[serde(rename = "Type")]
    pub kind: TransactorKind,
    /// The name of the hunter or merchant.
    #[serde(rename = "name_transactor")]
    pub transactor: String,
    /// The goods that changed hands.
    pub goods: Vec<GoodLine>,
    /// The sum of unit price times quantity across all goods.
    #[serde(rename = "totalAmount")]
    pub total_amount: f64,
    /// The date of the exchange, as given by the client.
    pub date: String,
    /// The hour of the exchange, as given by the client.
    pub hour: String,
}

/// The form data for creating a transaction.
///
/// `total_amount` is accepted but ignored: the total is always computed from
/// the stored unit prices.
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionFormData {
    /// Whether the transactor is a hunter or a merchant.
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    /// The name of the hunter or merchant.
    pub name_transactor: Option<String>,
    /// The goods changing hands.
    pub goods: Option<Vec<GoodLineFormData>>,
    /// Ignored; the total is computed server-side.
    #[serde(rename = "totalAmount")]
    pub total_amount: Option<f64>,
    /// The date of the exchange.
    pub date: Option<String>,
    /// The hour of the exchange.
    pub hour: Option<String>,
}

/// One goods line as submitted by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoodLineFormData {
    /// The name of the good.
    pub good: Option<String>,
    /// How many units change hands. Defaults to 1.
    pub quantity: Option<i64>,
}

/// A partial update to a transaction.
///
/// Only the bookkeeping fields can be edited after the fact; the transactor
/// and goods are fixed because their stock effects have already been applied.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TransactionUpdate {
    /// The new total, if any.
    #[serde(rename = "totalAmount")]
    pub total_amount: Option<f64>,
    /// The new date, if any.
    pub date: Option<String>,
    /// The new hour, if any.
    pub hour: Option<String>,
}

impl TransactionUpdate {
    pub(crate) fn is_empty(&self) -> bool {
        self.total_amount.is_none() && self.date.is_none() && self.hour.is_none()
    }
}

#[cfg(test)]
mod transactor_kind_tests {
    use crate::Error;

    use super::TransactorKind;

    #[test]
    fn parses_known_kinds() {
        assert_eq!("hunter".parse(), Ok(TransactorKind::Hunter));
        assert_eq!("merchant".parse(), Ok(TransactorKind::Merchant));
    }

    #[test]
    fn rejects_unknown_kind() {
        assert_eq!(
            "wizard".parse::<TransactorKind>(),
            Err(Error::InvalidTransactorKind("wizard".to_string()))
        );
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&TransactorKind::Hunter).unwrap();

        assert_eq!(json, "\"hunter\"");
    }
}
