//! Session lifecycle: exactly-once teardown on auth failure, token storage.
//!
//! Many requests can fail with 401 at the same time when a token expires.
//! [`SessionGate::teardown`] flips an atomic flag so only the first caller
//! runs the teardown hooks (clear the cache, drop the token, redirect);
//! every later caller is a no-op until the next [`SessionGate::reset`].

use crate::error::{Error, Result};
use crate::storage::{LocalStore, AUTH_TOKEN_KEY};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Callback run once per session teardown.
pub type TeardownHook = Arc<dyn Fn(&Error) + Send + Sync>;

/// Exactly-once session teardown switch.
#[derive(Default)]
pub struct SessionGate {
    torn_down: AtomicBool,
    teardowns: AtomicU64,
    hooks: Mutex<Vec<TeardownHook>>,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook run on teardown (e.g. redirect to sign-in).
    pub fn on_teardown<F>(&self, hook: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        if let Ok(mut hooks) = self.hooks.lock() {
            hooks.push(Arc::new(hook));
        }
    }

    /// Tear the session down. Returns `true` only for the call that actually
    /// ran the hooks.
    pub fn teardown(&self, cause: &Error) -> bool {
        if self
            .torn_down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Session already torn down, ignoring: {}", cause);
            return false;
        }

        self.teardowns.fetch_add(1, Ordering::Relaxed);
        warn!("Session teardown: {}", cause);

        // Hooks run outside the lock so they may register further hooks.
        let hooks: Vec<TeardownHook> = match self.hooks.lock() {
            Ok(hooks) => hooks.clone(),
            Err(_) => Vec::new(),
        };
        for hook in hooks {
            hook(cause);
        }
        true
    }

    /// Re-arm the gate after a new sign-in.
    pub fn reset(&self) {
        self.torn_down.store(false, Ordering::Release);
        info!("Session started");
    }

    /// False between a teardown and the next reset.
    pub fn is_active(&self) -> bool {
        !self.torn_down.load(Ordering::Acquire)
    }

    /// Number of teardowns performed over the gate's lifetime.
    pub fn teardown_count(&self) -> u64 {
        self.teardowns.load(Ordering::Relaxed)
    }
}

/// Auth token persisted in the local store.
#[derive(Clone)]
pub struct AuthTokenStore<S: LocalStore> {
    store: S,
}

impl<S: LocalStore> AuthTokenStore<S> {
    pub fn new(store: S) -> Self {
        AuthTokenStore { store }
    }

    /// # Errors
    /// Returns `Err` if the local store cannot be read.
    pub async fn token(&self) -> Result<Option<String>> {
        self.store.get(AUTH_TOKEN_KEY).await
    }

    /// # Errors
    /// Returns `Err` if the token is empty or the local store cannot be written.
    pub async fn set_token(&self, token: &str) -> Result<()> {
        if token.trim().is_empty() {
            return Err(Error::ConfigError("Auth token must not be empty".to_string()));
        }
        self.store.set(AUTH_TOKEN_KEY, token.to_string()).await
    }

    /// # Errors
    /// Returns `Err` if the local store cannot be written.
    pub async fn clear(&self) -> Result<()> {
        self.store.delete(AUTH_TOKEN_KEY).await
    }
}

impl<S: LocalStore + 'static> AuthTokenStore<S> {
    /// Drop the persisted token whenever `gate` tears the session down.
    ///
    /// The delete runs on the current Tokio runtime; outside a runtime the
    /// hook only logs.
    pub fn clear_on_teardown(&self, gate: &SessionGate) {
        let tokens = self.clone();
        gate.on_teardown(move |_| {
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                warn!("No runtime to clear the auth token on teardown");
                return;
            };
            let tokens = tokens.clone();
            runtime.spawn(async move {
                if let Err(e) = tokens.clear().await {
                    warn!("Failed to clear auth token: {}", e);
                }
            });
        });
    }
}
