//! Application state.

use std::sync::Arc;

use tokio::sync::Mutex;

use prepaid_billing_core::{AcceptAllTransfer, BillingEngine, Clock};
use prepaid_billing_store::{Store, StoreError};

use crate::config::ServiceConfig;
use crate::error::ApiError;

/// Application state shared across handlers.
pub struct AppState {
    /// The billing engine. Every call holds this lock for its whole duration,
    /// persistence included, so operations are serialised.
    pub engine: Mutex<BillingEngine>,

    /// The storage backend.
    pub store: Arc<dyn Store>,

    /// Service configuration.
    pub config: ServiceConfig,

    /// Engine time source.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create the application state, rebuilding the engine from `store`.
    ///
    /// # Errors
    ///
    /// Returns an error if the persisted state cannot be loaded.
    pub fn new(
        store: Arc<dyn Store>,
        config: ServiceConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        let engine = load_engine(store.as_ref(), &clock)?;

        tracing::info!(
            plans = engine.plan_count(),
            paid_amount = engine.paid_amount(),
            "Billing engine loaded"
        );
        if config.admin_api_key.is_none() {
            tracing::warn!("ADMIN_API_KEY not configured - admin routes are disabled");
        }
        if config.jwt_secret.is_none() {
            tracing::warn!("JWT_SECRET not configured - account routes are disabled");
        }

        Ok(Self {
            engine: Mutex::new(engine),
            store,
            config,
            clock,
        })
    }

    /// Run a mutating engine operation and persist what it changed.
    ///
    /// Only successful operations are persisted. If persisting fails the
    /// engine is reloaded from the store, so memory never runs ahead of what
    /// was written.
    pub async fn execute<T>(
        &self,
        op: impl FnOnce(&mut BillingEngine) -> prepaid_billing_core::Result<T>,
    ) -> Result<T, ApiError> {
        let mut engine = self.engine.lock().await;
        let outcome = op(&mut engine);

        let changes = engine.take_changes();
        let value = match outcome {
            Ok(value) => value,
            Err(err) => {
                // failed operations roll themselves back; leftovers are never persisted
                if !changes.is_empty() {
                    tracing::error!(
                        error = %err,
                        events = changes.events.len(),
                        "Failed operation left changes behind, reloading engine"
                    );
                    *engine = load_engine(self.store.as_ref(), &self.clock)?;
                }
                return Err(err.into());
            }
        };

        if !changes.is_empty() {
            if let Err(err) = self.store.apply(&changes) {
                tracing::error!(
                    error = %err,
                    events = changes.events.len(),
                    "Failed to persist changes, reloading engine"
                );
                *engine = load_engine(self.store.as_ref(), &self.clock)?;
                return Err(err.into());
            }
            tracing::debug!(events = changes.events.len(), "Changes persisted");
        }

        Ok(value)
    }

    /// Read from the engine under the lock.
    pub async fn read<T>(&self, f: impl FnOnce(&BillingEngine) -> T) -> T {
        let engine = self.engine.lock().await;
        f(&engine)
    }
}

fn load_engine(store: &dyn Store, clock: &Arc<dyn Clock>) -> Result<BillingEngine, StoreError> {
    Ok(BillingEngine::from_state(
        store.load_state()?,
        AcceptAllTransfer,
        Arc::clone(clock),
    ))
}
