use crate::config::ExtractionConfig;
use crate::engine::{DocumentHandle, EngineHandle, EngineLoader, EngineResolver, ResolveOptions};
use crate::environment::Environment;
use crate::error::Result;
use crate::surface::{NativeModuleLoader, SurfaceFactory};
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// One-shot configuration applied before first use
#[derive(Debug, Clone, Default)]
pub struct EngineConfiguration {
    /// Replaces the bundled engine for this context
    pub engine_loader: Option<EngineLoader>,
}

/// Owns the engine resolver, the drawing-surface factory, the environment they
/// were chosen for and the extraction defaults
pub struct PdfContext {
    environment: Environment,
    config: ExtractionConfig,
    resolver: EngineResolver,
    surfaces: SurfaceFactory,
}

impl fmt::Debug for PdfContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfContext")
            .field("environment", &self.environment)
            .field("resolver", &self.resolver)
            .field("surfaces", &self.surfaces)
            .finish()
    }
}

impl Default for PdfContext {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfContext {
    /// Context for the current process with default configuration
    pub fn new() -> Self {
        Self::with_config(ExtractionConfig::default())
    }

    pub fn with_config(config: ExtractionConfig) -> Self {
        Self::new_with_dependencies(Environment::detect(), default_native_loader(), config)
    }

    /// Create a context with full dependency injection
    ///
    /// The surface factory variant is chosen here, once. The native module is
    /// only loaded when a page is first rendered.
    pub fn new_with_dependencies(
        environment: Environment,
        native: Option<NativeModuleLoader>,
        config: ExtractionConfig,
    ) -> Self {
        let surfaces = SurfaceFactory::select(&environment, native, config.surface.backend);
        debug!(runtime = %environment.runtime(), surface = ?surfaces.kind(), "context created");
        Self {
            environment,
            config,
            resolver: EngineResolver::new(),
            surfaces,
        }
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn resolver(&self) -> &EngineResolver {
        &self.resolver
    }

    pub fn surface_factory(&self) -> &SurfaceFactory {
        &self.surfaces
    }

    /// Pins `configuration.engine_loader` and resolves it immediately,
    /// replacing any engine resolved so far. Without a loader this is a
    /// no-op.
    pub async fn configure(&self, configuration: EngineConfiguration) -> Result<()> {
        let Some(loader) = configuration.engine_loader else {
            return Ok(());
        };
        self.resolver.pin(loader.clone());
        self.resolver
            .resolve(Some(loader), ResolveOptions::forced())
            .await
            .map(|_| ())
    }

    pub async fn resolved_engine(&self) -> Result<EngineHandle> {
        self.resolver.resolved_engine().await
    }

    pub async fn resolve_engine(
        &self,
        loader: Option<EngineLoader>,
        options: ResolveOptions,
    ) -> Result<EngineHandle> {
        self.resolver.resolve(loader, options).await
    }

    /// Opens `data` with the active engine
    pub async fn open_document(&self, data: impl Into<Vec<u8>>) -> Result<DocumentHandle> {
        let engine = self.resolved_engine().await?;
        engine.get_document(data.into()).await
    }
}

#[cfg(feature = "skia")]
fn default_native_loader() -> Option<NativeModuleLoader> {
    Some(NativeModuleLoader::skia())
}

#[cfg(not(feature = "skia"))]
fn default_native_loader() -> Option<NativeModuleLoader> {
    None
}

static GLOBAL: OnceLock<PdfContext> = OnceLock::new();

/// The process-wide context, created on first access
pub fn global() -> &'static PdfContext {
    GLOBAL.get_or_init(PdfContext::new)
}

/// [`PdfContext::configure`] on the process-wide context
pub async fn configure(configuration: EngineConfiguration) -> Result<()> {
    global().configure(configuration).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use crate::engine::{Engine, LoadedModule, ResolverStatus};
    use crate::error::{BoxError, Error};
    use crate::surface::SurfaceKind;
    use std::sync::Arc;

    fn context() -> PdfContext {
        PdfContext::new_with_dependencies(Environment::unknown(), None, ExtractionConfig::default())
    }

    #[tokio::test]
    async fn test_configure_without_loader_is_noop() {
        let ctx = context();
        ctx.configure(EngineConfiguration::default()).await.unwrap();
        assert_eq!(ctx.resolver().status(), ResolverStatus::Unresolved);
        assert_eq!(ctx.resolver().attempts(), 0);
    }

    #[tokio::test]
    async fn test_configure_pins_loader() {
        let ctx = context();
        let engine: Arc<dyn Engine> = Arc::new(FakeEngine::default());
        let loader = EngineLoader::from_engine(engine);

        ctx.configure(EngineConfiguration {
            engine_loader: Some(loader),
        })
        .await
        .unwrap();
        let first = ctx.resolved_engine().await.unwrap();
        let reloaded = ctx.resolve_engine(None, ResolveOptions::forced()).await.unwrap();

        assert_eq!(first.name(), "fake");
        assert_eq!(reloaded.name(), "fake");
        assert!(!first.ptr_eq(&reloaded));
    }

    #[tokio::test]
    async fn test_configure_reports_loader_failure() {
        let ctx = context();
        let loader = EngineLoader::new(|| async {
            Err::<LoadedModule, BoxError>("engine build missing".into())
        });

        let err = ctx
            .configure(EngineConfiguration {
                engine_loader: Some(loader),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::EngineResolution { .. }));
    }

    #[tokio::test]
    async fn test_open_document_uses_active_engine() {
        let ctx = context();
        ctx.configure(EngineConfiguration {
            engine_loader: Some(EngineLoader::from_engine(Arc::new(FakeEngine::default()))),
        })
        .await
        .unwrap();

        assert!(ctx.open_document(b"%PDF-1.7".to_vec()).await.is_ok());
        assert!(ctx.open_document(b"garbage".to_vec()).await.is_err());
    }

    #[test]
    fn test_unknown_environment_disables_surfaces() {
        assert_eq!(context().surface_factory().kind(), SurfaceKind::Disabled);
    }
}
