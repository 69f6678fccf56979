pub mod database;
pub mod fare;
pub mod gateway;
pub mod ledger;
pub mod matching;
pub mod metrics;
pub mod reconciler;
pub mod rides;
pub mod wallets;

pub use database::Database;
pub use fare::FareCalculator;
pub use gateway::SquadClient;
pub use ledger::LedgerService;
pub use matching::MatchingService;
pub use reconciler::{PaymentReconciler, ReconcileOutcome};
pub use rides::{RideRequest, RideService};
pub use wallets::WalletService;
