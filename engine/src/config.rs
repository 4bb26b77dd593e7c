use std::time::Duration;

use rust_decimal::Decimal;

/// Configuration loaded from environment variables at startup.
pub struct Config {
    pub database_url: String,
    /// Cadence at which the `RoundScheduler` looks for rounds to close.
    /// `spec.md` §4.6 mandates 5s.
    pub scheduler_tick_interval: Duration,
    /// Starting balance for a newly-materialized user (`spec.md` §6:
    /// "a demo constant, e.g. 1000; configurable").
    pub initial_balance: Decimal,
    /// Bound on the Store/Ledger calls inside a mutating call's critical
    /// section (`spec.md` §5: "these must be bounded: the engine times
    /// them out on Store unavailability and surfaces a transient failure").
    pub store_call_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        use std::env::var;

        let scheduler_tick_interval_ms: u64 = var("SCHEDULER_TICK_INTERVAL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5_000);

        let initial_balance: Decimal = var("INITIAL_BALANCE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(Decimal::from(1000));

        let store_call_timeout_ms: u64 = var("STORE_CALL_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5_000);

        Config {
            database_url: var("DATABASE_URL").expect("DATABASE_URL must be set"),
            scheduler_tick_interval: Duration::from_millis(scheduler_tick_interval_ms),
            initial_balance,
            store_call_timeout: Duration::from_millis(store_call_timeout_ms),
        }
    }
}
