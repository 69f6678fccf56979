//! Wallet and ledger transaction models.
//!
//! The wallet balance is never mutated directly by handlers: every change
//! goes through a settlement, top-up, or reconciliation posting that also
//! records a matching `Transaction` row in the same database transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Wallet {
    pub wallet_id: Uuid,
    pub user_id: Uuid,
    pub balance: Decimal,
    pub virtual_account_number: Option<String>,
    pub virtual_account_name: Option<String>,
    pub virtual_account_bank: Option<String>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Credit,
    Debit,
    Commission,
    Refund,
}

impl TransactionType {
    /// Whether a successful transaction of this type moves the wallet balance
    /// up, down, or not at all (commission is owed to the platform, not held
    /// in a user wallet).
    pub fn balance_effect(self) -> i8 {
        match self {
            Self::Credit | Self::Refund => 1,
            Self::Debit => -1,
            Self::Commission => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Successful,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionMethod {
    Wallet,
    VirtualAccount,
    Cash,
    Card,
    BankTransfer,
}

/// Append-only ledger entry. `reference` is globally unique and doubles as
/// the idempotency key for gateway reconciliation.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Transaction {
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub reference: String,
    pub status: TransactionStatus,
    pub payment_method: TransactionMethod,
    pub gateway_payload: Option<serde_json::Value>,
    pub ride_id: Option<Uuid>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}
