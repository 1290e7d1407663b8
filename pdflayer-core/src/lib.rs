// pdflayer Core Library
//
// Engine-agnostic PDF extraction: lazily resolved document engines and
// pluggable drawing surfaces behind one context object.

pub mod config;
pub mod context;
pub mod engine;
pub mod environment;
pub mod error;
pub mod pipelines;
pub mod surface;
pub mod types;

// Re-export main types and functions for easy use
pub use config::{DatePriority, ExtractionConfig, SurfaceBackend};
pub use context::{configure, global, EngineConfiguration, PdfContext};
pub use engine::{
    DeferredEngine, DocumentHandle, DocumentSource, Engine, EngineDocument, EngineHandle,
    EngineLoader, EnginePage, EngineResolver, LoadedModule, RenderTarget, ResolveOptions,
    ResolverStatus,
};
pub use environment::{Environment, Runtime};
pub use error::{Error, Result};
pub use pipelines::{MetaOptions, RenderOptions, TextOptions};
pub use surface::{DrawingSurface, SurfaceFactory, SurfaceKind};
pub use types::*;

// Re-export the bundled engine for direct use
#[cfg(feature = "lopdf-engine")]
pub use engine::LopdfEngine;
