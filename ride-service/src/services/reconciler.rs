//! Gateway webhook reconciliation.
//!
//! Every webhook is acknowledged with 200 regardless of outcome, so the
//! gateway never retries forever against a bug on our side. The outcome enum
//! records what actually happened for logging and metrics.

use crate::models::{TransactionMethod, TransactionStatus, TransactionType};
use crate::services::database::Database;
use crate::services::gateway::SquadClient;
use crate::services::ledger::{self, NewTransaction};
use crate::services::metrics::WEBHOOK_EVENTS_TOTAL;
use rust_decimal::Decimal;
use service_core::error::AppError;
use tracing::instrument;

/// What a webhook delivery amounted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    MissingSignature,
    InvalidSignature,
    MalformedPayload,
    /// A pending ledger entry was confirmed and any balance effect applied.
    TransactionSettled { reference: String },
    /// A pending ledger entry was marked failed.
    TransactionFailed { reference: String },
    /// The referenced entry was already in a terminal state; no-op.
    AlreadyResolved { reference: String },
    /// A successful payment with no prior entry funded the payer's wallet.
    WalletFunded { reference: String },
    /// Funding payment from an email we have no user for.
    UnknownUser,
    /// Unsuccessful payment we had no record of; nothing to do.
    Ignored,
}

impl ReconcileOutcome {
    fn metric_label(&self) -> &'static str {
        match self {
            Self::MissingSignature => "missing_signature",
            Self::InvalidSignature => "invalid_signature",
            Self::MalformedPayload => "malformed_payload",
            Self::TransactionSettled { .. } => "settled",
            Self::TransactionFailed { .. } => "failed",
            Self::AlreadyResolved { .. } => "already_resolved",
            Self::WalletFunded { .. } => "wallet_funded",
            Self::UnknownUser => "unknown_user",
            Self::Ignored => "ignored",
        }
    }
}

#[derive(Clone)]
pub struct PaymentReconciler {
    db: Database,
    gateway: SquadClient,
}

impl PaymentReconciler {
    pub fn new(db: Database, gateway: SquadClient) -> Self {
        Self { db, gateway }
    }

    /// Reconcile one webhook delivery against the ledger.
    #[instrument(skip_all)]
    pub async fn process(
        &self,
        signature: Option<&str>,
        body: &str,
    ) -> Result<ReconcileOutcome, AppError> {
        let outcome = self.process_inner(signature, body).await?;
        WEBHOOK_EVENTS_TOTAL
            .with_label_values(&[outcome.metric_label()])
            .inc();
        tracing::info!(outcome = ?outcome, "Webhook reconciled");
        Ok(outcome)
    }

    async fn process_inner(
        &self,
        signature: Option<&str>,
        body: &str,
    ) -> Result<ReconcileOutcome, AppError> {
        let signature = match signature {
            Some(s) => s,
            None => return Ok(ReconcileOutcome::MissingSignature),
        };

        let valid = self
            .gateway
            .verify_webhook_signature(body, signature)
            .map_err(AppError::Internal)?;
        if !valid {
            return Ok(ReconcileOutcome::InvalidSignature);
        }

        let event = match self.gateway.parse_webhook_event(body) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable webhook payload");
                return Ok(ReconcileOutcome::MalformedPayload);
            }
        };

        let reference = event.data.transaction_ref.clone();
        let success = event.data.payment_status.eq_ignore_ascii_case("success")
            || event.data.payment_status.eq_ignore_ascii_case("successful");
        let payload = serde_json::from_str::<serde_json::Value>(body).ok();

        let mut tx = self.db.pool().begin().await?;

        // Serialize concurrent deliveries for the same reference.
        let existing = sqlx::query_as::<_, crate::models::Transaction>(
            "SELECT * FROM transactions WHERE reference = $1 FOR UPDATE",
        )
        .bind(&reference)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            Some(entry) => {
                if entry.status != TransactionStatus::Pending {
                    ReconcileOutcome::AlreadyResolved { reference }
                } else if success {
                    sqlx::query(
                        r#"
                        UPDATE transactions
                        SET status = 'successful', gateway_payload = $2, updated_utc = now()
                        WHERE transaction_id = $1
                        "#,
                    )
                    .bind(entry.transaction_id)
                    .bind(&payload)
                    .execute(&mut *tx)
                    .await?;

                    // Confirmed credits move the balance now; debits were
                    // already applied when the entry was posted.
                    if entry.tx_type.balance_effect() > 0 {
                        ledger::ensure_wallet(&mut tx, entry.user_id).await?;
                        ledger::adjust_balance(&mut tx, entry.user_id, entry.amount).await?;
                    }
                    ReconcileOutcome::TransactionSettled { reference }
                } else {
                    sqlx::query(
                        r#"
                        UPDATE transactions
                        SET status = 'failed', gateway_payload = $2, updated_utc = now()
                        WHERE transaction_id = $1
                        "#,
                    )
                    .bind(entry.transaction_id)
                    .bind(&payload)
                    .execute(&mut *tx)
                    .await?;
                    ReconcileOutcome::TransactionFailed { reference }
                }
            }
            None if success => {
                // No prior entry: a transfer straight into a virtual account.
                // Gateway amounts are in minor units.
                let user = sqlx::query_as::<_, crate::models::User>(
                    r#"
                    SELECT user_id, first_name, last_name, email, phone, role,
                           created_utc, updated_utc
                    FROM users WHERE email = $1
                    "#,
                )
                .bind(&event.data.customer.email)
                .fetch_optional(&mut *tx)
                .await?;

                let user = match user {
                    Some(user) => user,
                    None => {
                        tracing::warn!(
                            reference = %reference,
                            "Funding payment for unknown customer email"
                        );
                        return Ok(ReconcileOutcome::UnknownUser);
                    }
                };

                let amount = Decimal::new(event.data.amount, 2);
                if amount <= Decimal::ZERO {
                    tracing::warn!(reference = %reference, "Non-positive funding amount");
                    return Ok(ReconcileOutcome::Ignored);
                }

                let inserted = ledger::insert_transaction(
                    &mut tx,
                    NewTransaction {
                        user_id: user.user_id,
                        tx_type: TransactionType::Credit,
                        amount,
                        description: "Wallet funding via bank transfer".to_string(),
                        reference: reference.clone(),
                        status: TransactionStatus::Successful,
                        payment_method: TransactionMethod::VirtualAccount,
                        gateway_payload: payload,
                        ride_id: None,
                    },
                )
                .await;

                match inserted {
                    Ok(_) => {
                        ledger::ensure_wallet(&mut tx, user.user_id).await?;
                        ledger::adjust_balance(&mut tx, user.user_id, amount).await?;
                        ReconcileOutcome::WalletFunded { reference }
                    }
                    // Concurrent duplicate delivery hit the unique reference
                    // constraint first; the other delivery did the work.
                    Err(e) if is_unique_violation(&e) => {
                        return Ok(ReconcileOutcome::AlreadyResolved { reference });
                    }
                    Err(e) => return Err(e),
                }
            }
            None => ReconcileOutcome::Ignored,
        };

        tx.commit().await?;
        Ok(outcome)
    }
}

fn is_unique_violation(err: &AppError) -> bool {
    match err {
        AppError::Database(e) => e
            .downcast_ref::<sqlx::Error>()
            .and_then(|e| e.as_database_error())
            .map(|d| d.is_unique_violation())
            .unwrap_or(false),
        _ => false,
    }
}
