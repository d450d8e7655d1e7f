//! Database schema definitions and column families.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Plans, keyed by big-endian `plan_idx` so iteration follows index order.
    pub const PLANS: &str = "plans";

    /// Subscription records, keyed by account.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Custodial balances, keyed by account.
    pub const BALANCES: &str = "balances";

    /// Engine-wide values such as collected revenue.
    pub const META: &str = "meta";

    /// Event records, keyed by event id (ULID).
    pub const EVENTS: &str = "events";

    /// Index: events by account, keyed by `account || event_id`.
    /// Value is empty (index only).
    pub const EVENTS_BY_ACCOUNT: &str = "events_by_account";
}

/// Keys inside the [`cf::META`] column family.
pub mod meta {
    /// Revenue charged but not yet withdrawn.
    pub const PAID_AMOUNT: &[u8] = b"paid_amount";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::PLANS,
        cf::SUBSCRIPTIONS,
        cf::BALANCES,
        cf::META,
        cf::EVENTS,
        cf::EVENTS_BY_ACCOUNT,
    ]
}
