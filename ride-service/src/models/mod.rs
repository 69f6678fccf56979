pub mod driver;
pub mod ride;
pub mod user;
pub mod wallet;

pub use driver::Driver;
pub use ride::{CancelActor, Location, PaymentMethod, PaymentStatus, Ride, RideStatus};
pub use user::{Role, User};
pub use wallet::{Transaction, TransactionMethod, TransactionStatus, TransactionType, Wallet};
