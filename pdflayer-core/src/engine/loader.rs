//! Engine loaders and the values they produce
//!
//! A loader yields a raw [`LoadedModule`]. Turning that into an engine is a
//! two-step protocol: unwrap at most one default-export wrapper, then, if the
//! value defers its own initialization, call its `resolve_engine`.

use super::Engine;
use crate::error::BoxError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// A bundle that initializes its engine on demand
#[async_trait]
pub trait DeferredEngine: Send + Sync {
    async fn resolve_engine(&self) -> Result<Arc<dyn Engine>, BoxError>;
}

/// Raw value produced by an [`EngineLoader`]
pub enum LoadedModule {
    Engine(Arc<dyn Engine>),
    /// Default-export wrapper around another value
    WithDefault(Box<LoadedModule>),
    Deferred(Arc<dyn DeferredEngine>),
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadedModule::Engine(engine) => f.debug_tuple("Engine").field(&engine.name()).finish(),
            LoadedModule::WithDefault(inner) => f.debug_tuple("WithDefault").field(inner).finish(),
            LoadedModule::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

impl LoadedModule {
    pub fn engine(engine: impl Engine + 'static) -> Self {
        LoadedModule::Engine(Arc::new(engine))
    }

    pub fn with_default(inner: LoadedModule) -> Self {
        LoadedModule::WithDefault(Box::new(inner))
    }

    pub fn deferred(bundle: impl DeferredEngine + 'static) -> Self {
        LoadedModule::Deferred(Arc::new(bundle))
    }

    /// Unwraps one default wrapper, then any deferred indirection
    pub async fn into_engine(self) -> Result<Arc<dyn Engine>, BoxError> {
        let unwrapped = match self {
            LoadedModule::WithDefault(inner) => *inner,
            other => other,
        };
        match unwrapped {
            LoadedModule::Engine(engine) => Ok(engine),
            LoadedModule::Deferred(bundle) => bundle.resolve_engine().await,
            LoadedModule::WithDefault(_) => {
                Err("loaded module is wrapped in more than one default export".into())
            }
        }
    }
}

type LoadFn = dyn Fn() -> BoxFuture<'static, Result<LoadedModule, BoxError>> + Send + Sync;

/// Zero-argument async factory producing a [`LoadedModule`]
#[derive(Clone)]
pub struct EngineLoader {
    load: Arc<LoadFn>,
}

impl fmt::Debug for EngineLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EngineLoader")
    }
}

impl EngineLoader {
    pub fn new<F, Fut>(load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<LoadedModule, BoxError>> + Send + 'static,
    {
        Self {
            load: Arc::new(move || load().boxed()),
        }
    }

    /// Loader that always yields the same engine instance
    pub fn from_engine(engine: Arc<dyn Engine>) -> Self {
        Self::new(move || {
            let engine = Arc::clone(&engine);
            async move { Ok::<_, BoxError>(LoadedModule::Engine(engine)) }
        })
    }

    pub fn load(&self) -> BoxFuture<'static, Result<LoadedModule, BoxError>> {
        (self.load)()
    }

    /// The bundled engine: a fresh instance on every load
    #[cfg(feature = "lopdf-engine")]
    pub fn bundled() -> Self {
        Self::new(|| async { Ok::<_, BoxError>(LoadedModule::engine(super::LopdfEngine::new())) })
    }

    #[cfg(not(feature = "lopdf-engine"))]
    pub fn bundled() -> Self {
        Self::new(|| async {
            Err::<LoadedModule, BoxError>(
                "this build does not include the bundled engine (enable the `lopdf-engine` feature)"
                    .into(),
            )
        })
    }
}
