//! Wallet provisioning, balance queries, and admin top-ups.

use crate::models::{
    Transaction, TransactionMethod, TransactionStatus, TransactionType, Wallet,
};
use crate::services::database::Database;
use crate::services::gateway::SquadClient;
use crate::services::ledger::{self, NewTransaction};
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::instrument;
use uuid::Uuid;

#[derive(Clone)]
pub struct WalletService {
    db: Database,
    gateway: SquadClient,
}

impl WalletService {
    pub fn new(db: Database, gateway: SquadClient) -> Self {
        Self { db, gateway }
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<Wallet, AppError> {
        self.db
            .get_wallet(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Wallet not found")))
    }

    pub async fn transactions(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Transaction>, AppError> {
        self.db.list_transactions(user_id, limit, offset).await
    }

    /// Ensure the user has a wallet, and attach a dedicated virtual account
    /// for bank-transfer funding when the gateway is configured.
    ///
    /// Both steps are idempotent: an existing wallet is returned as-is, and
    /// account creation is skipped once the wallet already carries one.
    /// Gateway failures are logged and swallowed; the wallet works without a
    /// virtual account, it just cannot be funded by transfer yet.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn provision(&self, user_id: Uuid) -> Result<Wallet, AppError> {
        let user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User not found")))?;

        sqlx::query(
            r#"
            INSERT INTO wallets (wallet_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        let wallet = self.balance(user_id).await?;
        if wallet.virtual_account_number.is_some() {
            return Ok(wallet);
        }

        match self.gateway.create_virtual_account(&user).await {
            Ok(Some(account)) => {
                let wallet = sqlx::query_as::<_, Wallet>(
                    r#"
                    UPDATE wallets
                    SET virtual_account_number = $2, virtual_account_name = $3,
                        virtual_account_bank = $4, updated_utc = now()
                    WHERE user_id = $1
                    RETURNING *
                    "#,
                )
                .bind(user_id)
                .bind(&account.account_number)
                .bind(&account.account_name)
                .bind(&account.bank_name)
                .fetch_one(self.db.pool())
                .await?;
                tracing::info!(account_number = %account.account_number, "Virtual account attached");
                Ok(wallet)
            }
            Ok(None) => Ok(wallet),
            Err(e) => {
                tracing::warn!(error = %e, "Virtual account creation failed, wallet left without one");
                Ok(wallet)
            }
        }
    }

    /// Admin credit to a user wallet. The balance change and the ledger entry
    /// land in one database transaction.
    #[instrument(skip(self), fields(user_id = %user_id, amount = %amount))]
    pub async fn admin_topup(
        &self,
        user_id: Uuid,
        amount: Decimal,
    ) -> Result<Transaction, AppError> {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(anyhow::anyhow!(
                "Top-up amount must be positive"
            )));
        }

        let mut tx = self.db.pool().begin().await?;

        ledger::lock_wallet(&mut tx, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Wallet not found")))?;
        ledger::adjust_balance(&mut tx, user_id, amount).await?;

        let transaction = ledger::insert_transaction(
            &mut tx,
            NewTransaction {
                user_id,
                tx_type: TransactionType::Credit,
                amount,
                description: "Admin wallet top-up".to_string(),
                reference: format!("TOPUP_{}", Uuid::new_v4()),
                status: TransactionStatus::Successful,
                payment_method: TransactionMethod::Wallet,
                gateway_payload: None,
                ride_id: None,
            },
        )
        .await?;

        tx.commit().await?;

        tracing::info!(reference = %transaction.reference, "Wallet topped up");
        Ok(transaction)
    }
}
