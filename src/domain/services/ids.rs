//! Identifier generation

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Random entity identifier such as `inv_3f2c...`
pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Payment transaction id: `TXN-<unix millis>-<9 random chars>`
pub fn transaction_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("TXN-{}-{}", Utc::now().timestamp_millis(), suffix.to_uppercase())
}
