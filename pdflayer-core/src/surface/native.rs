//! Off-screen canvases from an optional native graphics module
//!
//! The module is loaded on the first [`NativeCanvasFactory::prepare`] call
//! and never before. Concurrent callers share one load; a failed load leaves
//! the slot empty so a later call can retry.

use super::globals::{GraphicsConstructors, GraphicsGlobals};
use super::Canvas;
use crate::error::{BoxError, Error, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Native graphics backend able to allocate off-screen canvases
pub trait NativeGraphicsModule: Send + Sync {
    fn name(&self) -> &str;

    fn create_canvas(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>>;

    /// Constructors injected into the environment when the module loads
    fn constructors(&self) -> GraphicsConstructors {
        GraphicsConstructors::default()
    }
}

type LoadModule = dyn Fn() -> BoxFuture<'static, std::result::Result<Arc<dyn NativeGraphicsModule>, BoxError>>
    + Send
    + Sync;

/// Async factory for the native module
#[derive(Clone)]
pub struct NativeModuleLoader {
    load: Arc<LoadModule>,
}

impl NativeModuleLoader {
    pub fn new<F, Fut>(load: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<Arc<dyn NativeGraphicsModule>, BoxError>>
            + Send
            + 'static,
    {
        Self {
            load: Arc::new(move || load().boxed()),
        }
    }

    /// Loader for the bundled tiny-skia module
    #[cfg(feature = "skia")]
    pub fn skia() -> Self {
        Self::new(|| async {
            Ok::<_, BoxError>(Arc::new(super::skia::SkiaModule::new()) as Arc<dyn NativeGraphicsModule>)
        })
    }
}

pub struct NativeCanvasFactory {
    loader: NativeModuleLoader,
    module: OnceCell<Arc<dyn NativeGraphicsModule>>,
    globals: Arc<GraphicsGlobals>,
}

impl NativeCanvasFactory {
    pub fn new(loader: NativeModuleLoader, globals: Arc<GraphicsGlobals>) -> Self {
        Self {
            loader,
            module: OnceCell::new(),
            globals,
        }
    }

    pub fn is_prepared(&self) -> bool {
        self.module.initialized()
    }

    /// Loads the module once and injects its missing constructors
    pub async fn prepare(&self) -> Result<Arc<dyn NativeGraphicsModule>> {
        let module = self
            .module
            .get_or_try_init(|| async {
                debug!("loading native graphics module");
                let module = (self.loader.load)().await.map_err(|e| {
                    Error::unsupported(format!("native graphics module failed to load: {}", e))
                })?;
                self.globals.inject_missing(&module.constructors());
                info!(module = module.name(), "native graphics module loaded");
                Ok::<_, Error>(module)
            })
            .await?;
        Ok(Arc::clone(module))
    }

    pub fn create_canvas(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>> {
        let module = self.module.get().ok_or_else(|| {
            Error::unsupported("native graphics module has not been prepared")
        })?;
        module.create_canvas(width, height)
    }
}
