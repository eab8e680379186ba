pub mod amount;
pub mod category;
pub mod key;
pub mod transaction;

pub use amount::{Amount, AmountError};
pub use category::{CategoryTable, OTHERS};
pub use key::derive_key;
pub use transaction::{CanonicalTransaction, Destination, Direction, TransactionError};
