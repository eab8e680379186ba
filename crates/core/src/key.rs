use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use super::amount::Amount;

/// Derive an idempotency key from stable fields when the source did not
/// supply a reference number. Inputs are exactly the fields that survive a
/// reprocess of the same email; wall-clock time must never appear here.
pub fn derive_key(
    card_or_account: Option<&str>,
    amount: Amount,
    date: NaiveDate,
    institution: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(card_or_account.unwrap_or_default().as_bytes());
    hasher.update(b"|");
    hasher.update(amount.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(date.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(institution.unwrap_or_default().as_bytes());
    let digest: [u8; 32] = hasher.finalize().into();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    // 32 hex chars keep the column compact; collisions at that width are
    // beyond the volume of any mailbox.
    hex[..32].to_string()
}
