//! Single-flight engine resolution
//!
//! The resolver binds a context to exactly one engine. The first request
//! starts a load; every request arriving while it runs awaits the same
//! shared future. A settled result is memoized until a forced reload.
//!
//! State transitions:
//! - `Unresolved`/`Failed` + any request -> `Resolving`
//! - `Resolving` + request -> joins the attempt (forced requests wait for it
//!   to settle, then start their own)
//! - `Resolving` -> `Resolved` on success, `Failed` on error
//! - `Resolved` + request -> returns the handle; forced -> `Resolving`

use super::{EngineHandle, EngineLoader};
use crate::error::{BoxError, Error, Result};
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveOptions {
    /// Reload even when an engine is already resolved
    pub force: bool,
}

impl ResolveOptions {
    pub fn forced() -> Self {
        Self { force: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverStatus {
    Unresolved,
    Resolving,
    Resolved,
    Failed,
}

type Resolution = Shared<BoxFuture<'static, Result<EngineHandle>>>;

enum ResolverState {
    Unresolved,
    Resolving { attempt: u64, resolution: Resolution },
    Resolved(EngineHandle),
    Failed(Error),
}

#[derive(Debug, Clone, Copy)]
enum LoaderOrigin {
    Custom,
    Pinned,
    Bundled,
}

impl LoaderOrigin {
    fn failure(self, message: &str, cause: BoxError) -> Error {
        match self {
            LoaderOrigin::Custom | LoaderOrigin::Pinned => Error::resolution(message, Some(cause)),
            LoaderOrigin::Bundled => Error::unavailable(message, Some(cause)),
        }
    }
}

enum Pending {
    Join(Resolution),
    AwaitThenRetry(Resolution),
}

pub struct EngineResolver {
    state: Arc<Mutex<ResolverState>>,
    attempts: AtomicU64,
    pinned: Mutex<Option<EngineLoader>>,
}

impl Default for EngineResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EngineResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineResolver")
            .field("status", &self.status())
            .field("attempts", &self.attempts())
            .field("pinned", &self.pinned.lock().is_some())
            .finish()
    }
}

impl EngineResolver {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ResolverState::Unresolved)),
            attempts: AtomicU64::new(0),
            pinned: Mutex::new(None),
        }
    }

    /// Makes `loader` the source for requests that name none
    pub fn pin(&self, loader: EngineLoader) {
        *self.pinned.lock() = Some(loader);
    }

    pub fn status(&self) -> ResolverStatus {
        match &*self.state.lock() {
            ResolverState::Unresolved => ResolverStatus::Unresolved,
            ResolverState::Resolving { .. } => ResolverStatus::Resolving,
            ResolverState::Resolved(_) => ResolverStatus::Resolved,
            ResolverState::Failed(_) => ResolverStatus::Failed,
        }
    }

    /// Number of loads started so far
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The resolved engine, if any, without triggering a load
    pub fn current(&self) -> Option<EngineHandle> {
        match &*self.state.lock() {
            ResolverState::Resolved(handle) => Some(handle.clone()),
            _ => None,
        }
    }

    /// The error of the last settled attempt, if it failed
    pub fn last_error(&self) -> Option<Error> {
        match &*self.state.lock() {
            ResolverState::Failed(error) => Some(error.clone()),
            _ => None,
        }
    }

    /// Returns the memoized engine, resolving it first if needed
    pub async fn resolved_engine(&self) -> Result<EngineHandle> {
        self.resolve(None, ResolveOptions::default()).await
    }

    /// Resolves the engine through `loader`, or through the pinned or bundled
    /// loader when `loader` is `None`
    ///
    /// A failure of an explicitly chosen loader is reported as
    /// [`Error::EngineResolution`] and never falls back to the bundled engine.
    pub async fn resolve(
        &self,
        loader: Option<EngineLoader>,
        options: ResolveOptions,
    ) -> Result<EngineHandle> {
        let mut loader = loader;
        loop {
            let pending = {
                let mut state = self.state.lock();
                match &*state {
                    ResolverState::Resolved(handle) if !options.force => {
                        return Ok(handle.clone());
                    }
                    ResolverState::Resolving { attempt, resolution } => {
                        if options.force {
                            debug!(attempt, "forced resolution waiting for in-flight attempt");
                            Pending::AwaitThenRetry(resolution.clone())
                        } else {
                            debug!(attempt, "joining in-flight engine resolution");
                            Pending::Join(resolution.clone())
                        }
                    }
                    _ => Pending::Join(self.start_attempt(&mut state, loader.take())),
                }
            };

            match pending {
                Pending::Join(resolution) => return resolution.await,
                Pending::AwaitThenRetry(resolution) => {
                    let _ = resolution.await;
                }
            }
        }
    }

    fn start_attempt(&self, state: &mut ResolverState, loader: Option<EngineLoader>) -> Resolution {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let (loader, origin) = match loader {
            Some(loader) => (loader, LoaderOrigin::Custom),
            None => match self.pinned.lock().clone() {
                Some(loader) => (loader, LoaderOrigin::Pinned),
                None => (EngineLoader::bundled(), LoaderOrigin::Bundled),
            },
        };
        debug!(attempt, ?origin, "engine resolution started");

        let shared_state = Arc::clone(&self.state);
        let resolution = async move {
            let result = load_engine(&loader, origin).await;

            let mut state = shared_state.lock();
            let current = matches!(&*state, ResolverState::Resolving { attempt: a, .. } if *a == attempt);
            if current {
                *state = match &result {
                    Ok(handle) => ResolverState::Resolved(handle.clone()),
                    Err(error) => {
                        warn!(attempt, error = %error, "engine resolution failed");
                        ResolverState::Failed(error.clone())
                    }
                };
            }
            result
        }
        .boxed()
        .shared();

        *state = ResolverState::Resolving {
            attempt,
            resolution: resolution.clone(),
        };
        resolution
    }
}

async fn load_engine(loader: &EngineLoader, origin: LoaderOrigin) -> Result<EngineHandle> {
    let module = loader.load().await.map_err(|cause| {
        origin.failure(
            match origin {
                LoaderOrigin::Bundled => "the bundled engine could not be loaded",
                _ => "custom engine loader failed",
            },
            cause,
        )
    })?;
    let engine = module
        .into_engine()
        .await
        .map_err(|cause| origin.failure("loaded value is not a usable engine", cause))?;

    info!(engine = engine.name(), version = engine.version(), "document engine loaded");
    Ok(EngineHandle::new(engine))
}
