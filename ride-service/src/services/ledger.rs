//! Ledger postings: the money side of ride settlement.
//!
//! Every posting here runs inside a caller-owned sqlx transaction, so a
//! settlement either commits every wallet mutation and transaction record or
//! none of them. Wallet rows are locked `FOR UPDATE` in a fixed order to
//! serialize concurrent postings against the same wallets.

use crate::models::{
    PaymentMethod, Ride, Transaction, TransactionMethod, TransactionStatus, TransactionType,
    Wallet,
};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::{Postgres, Transaction as SqlxTransaction};
use uuid::Uuid;

/// Input for a single ledger entry.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub description: String,
    pub reference: String,
    pub status: TransactionStatus,
    pub payment_method: TransactionMethod,
    pub gateway_payload: Option<serde_json::Value>,
    pub ride_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct LedgerService;

impl LedgerService {
    /// Post the settlement for a completed ride.
    ///
    /// Wallet rides: re-validate the rider balance at settlement time (it may
    /// have dropped since the ride was requested), debit the rider by the
    /// fare, credit the driver their share, and record the debit, credit, and
    /// commission entries as successful. Cash rides: no wallet movement; the
    /// driver credit is recorded as successful and the commission stays
    /// pending until settled out of band.
    ///
    /// Insufficient balance fails with a `Payment` error, which rolls back
    /// the whole transition: the ride stays ongoing and nothing is written.
    pub async fn settle_ride(
        &self,
        tx: &mut SqlxTransaction<'_, Postgres>,
        ride: &Ride,
        driver_user_id: Uuid,
    ) -> Result<(), AppError> {
        match ride.payment_method {
            PaymentMethod::Wallet => self.settle_wallet_ride(tx, ride, driver_user_id).await,
            PaymentMethod::Cash => self.settle_cash_ride(tx, ride, driver_user_id).await,
        }
    }

    async fn settle_wallet_ride(
        &self,
        tx: &mut SqlxTransaction<'_, Postgres>,
        ride: &Ride,
        driver_user_id: Uuid,
    ) -> Result<(), AppError> {
        // An unprovisioned driver must not block payout; the rider, who has
        // to cover the fare, must already hold a wallet.
        ensure_wallet(tx, driver_user_id).await?;

        // Lock both wallets in a fixed order so two settlements touching the
        // same pair cannot deadlock.
        let mut lock_order = [ride.rider_id, driver_user_id];
        lock_order.sort();
        let mut rider_wallet = None;
        for user_id in lock_order {
            let wallet = lock_wallet(tx, user_id).await?.ok_or_else(|| {
                AppError::Payment(anyhow::anyhow!("Wallet not found for user {}", user_id))
            })?;
            if user_id == ride.rider_id {
                rider_wallet = Some(wallet);
            }
        }
        let rider_wallet = rider_wallet
            .ok_or_else(|| AppError::Payment(anyhow::anyhow!("Rider wallet not found")))?;

        if rider_wallet.balance < ride.fare {
            return Err(AppError::Payment(anyhow::anyhow!(
                "Insufficient wallet balance: have {}, need {}",
                rider_wallet.balance,
                ride.fare
            )));
        }

        adjust_balance(tx, ride.rider_id, -ride.fare).await?;
        adjust_balance(tx, driver_user_id, ride.driver_amount).await?;

        insert_transaction(
            tx,
            NewTransaction {
                user_id: ride.rider_id,
                tx_type: TransactionType::Debit,
                amount: ride.fare,
                description: format!("Payment for ride {}", ride.ride_id),
                reference: format!("RIDE_PAYMENT_{}", Uuid::new_v4()),
                status: TransactionStatus::Successful,
                payment_method: TransactionMethod::Wallet,
                gateway_payload: None,
                ride_id: Some(ride.ride_id),
            },
        )
        .await?;

        insert_transaction(
            tx,
            NewTransaction {
                user_id: driver_user_id,
                tx_type: TransactionType::Credit,
                amount: ride.driver_amount,
                description: format!("Earnings from ride {}", ride.ride_id),
                reference: format!("DRIVER_EARNING_{}", Uuid::new_v4()),
                status: TransactionStatus::Successful,
                payment_method: TransactionMethod::Wallet,
                gateway_payload: None,
                ride_id: Some(ride.ride_id),
            },
        )
        .await?;

        insert_transaction(
            tx,
            NewTransaction {
                user_id: driver_user_id,
                tx_type: TransactionType::Commission,
                amount: ride.commission_amount,
                description: format!("Commission from ride {}", ride.ride_id),
                reference: format!("COMMISSION_{}", Uuid::new_v4()),
                status: TransactionStatus::Successful,
                payment_method: TransactionMethod::Wallet,
                gateway_payload: None,
                ride_id: Some(ride.ride_id),
            },
        )
        .await?;

        tracing::info!(
            ride_id = %ride.ride_id,
            fare = %ride.fare,
            driver_amount = %ride.driver_amount,
            commission = %ride.commission_amount,
            "Wallet settlement posted"
        );

        Ok(())
    }

    async fn settle_cash_ride(
        &self,
        tx: &mut SqlxTransaction<'_, Postgres>,
        ride: &Ride,
        driver_user_id: Uuid,
    ) -> Result<(), AppError> {
        insert_transaction(
            tx,
            NewTransaction {
                user_id: driver_user_id,
                tx_type: TransactionType::Credit,
                amount: ride.driver_amount,
                description: format!("Cash earnings from ride {}", ride.ride_id),
                reference: format!("DRIVER_CASH_EARNING_{}", Uuid::new_v4()),
                status: TransactionStatus::Successful,
                payment_method: TransactionMethod::Cash,
                gateway_payload: None,
                ride_id: Some(ride.ride_id),
            },
        )
        .await?;

        // Commission on cash rides is owed by the driver and settled out of
        // band; the entry stays pending until then.
        insert_transaction(
            tx,
            NewTransaction {
                user_id: driver_user_id,
                tx_type: TransactionType::Commission,
                amount: ride.commission_amount,
                description: format!("Commission owed from cash ride {}", ride.ride_id),
                reference: format!("CASH_COMMISSION_{}", Uuid::new_v4()),
                status: TransactionStatus::Pending,
                payment_method: TransactionMethod::Cash,
                gateway_payload: None,
                ride_id: Some(ride.ride_id),
            },
        )
        .await?;

        tracing::info!(
            ride_id = %ride.ride_id,
            driver_amount = %ride.driver_amount,
            commission_owed = %ride.commission_amount,
            "Cash settlement posted"
        );

        Ok(())
    }
}

/// Create an empty wallet for the user if none exists yet. Safe to call
/// inside a transaction that later locks the same row.
pub(crate) async fn ensure_wallet(
    tx: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO wallets (wallet_id, user_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Lock a wallet row for the duration of the enclosing transaction.
pub(crate) async fn lock_wallet(
    tx: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
) -> Result<Option<Wallet>, AppError> {
    let wallet =
        sqlx::query_as::<_, Wallet>("SELECT * FROM wallets WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;

    Ok(wallet)
}

/// Apply a signed delta to a wallet balance. The CHECK constraint on the
/// column is the last line of defense against a negative balance; callers
/// validate first.
pub(crate) async fn adjust_balance(
    tx: &mut SqlxTransaction<'_, Postgres>,
    user_id: Uuid,
    delta: Decimal,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE wallets
        SET balance = balance + $2, updated_utc = now()
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(delta)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Insert a ledger entry.
pub(crate) async fn insert_transaction(
    tx: &mut SqlxTransaction<'_, Postgres>,
    input: NewTransaction,
) -> Result<Transaction, AppError> {
    let transaction = sqlx::query_as::<_, Transaction>(
        r#"
        INSERT INTO transactions
            (transaction_id, user_id, tx_type, amount, description, reference,
             status, payment_method, gateway_payload, ride_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(input.user_id)
    .bind(input.tx_type)
    .bind(input.amount)
    .bind(&input.description)
    .bind(&input.reference)
    .bind(input.status)
    .bind(input.payment_method)
    .bind(&input.gateway_payload)
    .bind(input.ride_id)
    .fetch_one(&mut **tx)
    .await?;

    Ok(transaction)
}
