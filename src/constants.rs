use std::time::Duration;

/// How long an unconfirmed transaction may live before it is reaped.
pub const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(600);

/// Bound on every request against the ledger service.
pub const LEDGER_API_TIMEOUT: Duration = Duration::from_secs(60);

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_BILL_SPLIT_CATEGORY: &str = "Bill Split";

/// Budget assigned to categories provisioned on a participant's behalf.
pub const PROVISIONED_CATEGORY_BUDGET: f64 = 0.0;

// Audit action names.
pub const TRANSACTION_STARTED: &str = "transaction_started";
pub const AMOUNT_SET: &str = "amount_set";
pub const CURRENCY_SET: &str = "currency_set";
pub const CATEGORY_SET: &str = "category_set";
pub const PARTICIPANT_CONFIRMED: &str = "participant_confirmed";
pub const SETTLEMENT_SUCCEEDED: &str = "settlement_succeeded";
pub const SETTLEMENT_FAILED: &str = "settlement_failed";
pub const TRANSACTION_CANCELLED: &str = "transaction_cancelled";
pub const TRANSACTION_EXPIRED: &str = "transaction_expired";
