pub mod lifecycle;
pub mod scheduler;

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use tokio::sync::RwLock;

use crate::{config::AppConfig, dao::match_store::MatchStore, error::ServiceError};

pub use self::scheduler::{SchedulerState, SchedulerStatus, TickReport};

/// Handle to the application state shared by routes and background tasks.
pub type SharedState = Arc<AppState>;

/// Central application state storing configuration, the store handle and scheduler bookkeeping.
pub struct AppState {
    config: AppConfig,
    match_store: RwLock<Option<Arc<dyn MatchStore>>>,
    degraded: AtomicBool,
    scheduler: SchedulerState,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            config,
            match_store: RwLock::new(None),
            degraded: AtomicBool::new(true),
            scheduler: SchedulerState::new(),
        })
    }

    /// Build a state with `store` already installed.
    pub async fn with_store(config: AppConfig, store: Arc<dyn MatchStore>) -> SharedState {
        let state = Self::new(config);
        state.set_match_store(store).await;
        state
    }

    /// Configuration loaded at startup.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current match store, if one is installed.
    pub async fn match_store(&self) -> Option<Arc<dyn MatchStore>> {
        let guard = self.match_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the current match store or fail with [`ServiceError::Degraded`].
    pub async fn require_match_store(&self) -> Result<Arc<dyn MatchStore>, ServiceError> {
        self.match_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new match store implementation and leave degraded mode.
    pub async fn set_match_store(&self, store: Arc<dyn MatchStore>) {
        {
            let mut guard = self.match_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current match store and enter degraded mode.
    pub async fn clear_match_store(&self) {
        {
            let mut guard = self.match_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Flip the degraded flag, returning whether it changed.
    pub fn update_degraded(&self, value: bool) -> bool {
        self.degraded.swap(value, Ordering::SeqCst) != value
    }

    /// Tick lease and counters of the lifecycle scheduler.
    pub fn scheduler(&self) -> &SchedulerState {
        &self.scheduler
    }
}
