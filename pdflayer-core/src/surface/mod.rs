//! Drawing surfaces
//!
//! A [`DrawingSurface`] pairs a pixel-backed [`Canvas`] with its
//! [`Context2d`]. Surfaces are handed out by a [`SurfaceFactory`], whose
//! variant is fixed when the factory is built:
//! - `Browser` draws through a canvas created by the host document
//! - `Native` draws through an off-screen canvas from a lazily loaded
//!   native graphics module
//! - `Disabled` refuses every operation

pub mod browser;
pub mod globals;
pub mod native;
#[cfg(feature = "skia")]
pub mod skia;

use crate::config::SurfaceBackend;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::types::{Matrix, Rgba};
use std::fmt;
use tracing::{debug, warn};

pub use browser::{BrowserCanvasFactory, HostDocument};
pub use globals::{GraphicsConstructors, GraphicsGlobals, InjectionReport, PathRecorder};
pub use native::{NativeCanvasFactory, NativeGraphicsModule, NativeModuleLoader};
#[cfg(feature = "skia")]
pub use skia::{SkiaCanvas, SkiaModule};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathSegment {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    CubicTo(f64, f64, f64, f64, f64, f64),
    Rect(f64, f64, f64, f64),
    Close,
}

/// Path under construction, in user space
pub trait Path2D: Send {
    fn move_to(&mut self, x: f64, y: f64);
    fn line_to(&mut self, x: f64, y: f64);
    fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64);
    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn close_path(&mut self);
    fn segments(&self) -> &[PathSegment];

    fn is_empty(&self) -> bool {
        self.segments().is_empty()
    }
}

/// Straight RGBA pixels, row-major, top row first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// 2D drawing context of a canvas
///
/// Transforms compose like a browser canvas: `transform(m)` post-multiplies
/// the current matrix, so `m` applies to coordinates before what was already
/// set.
pub trait Context2d: Send {
    fn save(&mut self);
    fn restore(&mut self);
    fn transform(&mut self, matrix: &Matrix);
    fn set_transform(&mut self, matrix: &Matrix);
    fn current_transform(&self) -> Matrix;
    fn set_fill_style(&mut self, color: Rgba);
    fn set_stroke_style(&mut self, color: Rgba);
    fn set_line_width(&mut self, width: f64);
    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64);
    fn fill(&mut self, path: &dyn Path2D, rule: FillRule);
    fn stroke(&mut self, path: &dyn Path2D);
    /// Draws `image` with its top-left pixel at `(x, y)`, one user unit per pixel
    fn draw_image(&mut self, image: &ImageData, x: f64, y: f64);
}

/// Pixel buffer with a 2D context
pub trait Canvas: Send {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    /// Resizes the canvas, clearing it. `(0, 0)` releases the pixel buffer.
    /// A size the canvas cannot hold fails and leaves it as it was.
    fn set_dimensions(&mut self, width: u32, height: u32) -> Result<()>;
    fn context(&mut self) -> &mut dyn Context2d;
    fn to_png(&self) -> Result<Vec<u8>>;
}

/// A canvas paired with its context
#[derive(Default)]
pub struct DrawingSurface {
    canvas: Option<Box<dyn Canvas>>,
}

impl fmt::Debug for DrawingSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DrawingSurface")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("active", &self.is_active())
            .finish()
    }
}

impl DrawingSurface {
    pub fn new(canvas: Box<dyn Canvas>) -> Self {
        Self { canvas: Some(canvas) }
    }

    pub fn is_active(&self) -> bool {
        self.canvas.is_some()
    }

    pub fn width(&self) -> u32 {
        self.canvas.as_ref().map_or(0, |canvas| canvas.width())
    }

    pub fn height(&self) -> u32 {
        self.canvas.as_ref().map_or(0, |canvas| canvas.height())
    }

    pub fn canvas(&self) -> Result<&dyn Canvas> {
        self.canvas.as_deref().ok_or(Error::SurfaceNotInitialized)
    }

    pub fn context(&mut self) -> Result<&mut dyn Context2d> {
        match self.canvas.as_mut() {
            Some(canvas) => Ok(canvas.context()),
            None => Err(Error::SurfaceNotInitialized),
        }
    }

    pub fn to_png(&self) -> Result<Vec<u8>> {
        self.canvas()?.to_png()
    }
}

/// Which backend a factory draws through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    Browser,
    Native,
    Disabled,
}

pub enum SurfaceFactory {
    Browser(BrowserCanvasFactory),
    Native(NativeCanvasFactory),
    Disabled,
}

impl fmt::Debug for SurfaceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SurfaceFactory").field(&self.kind()).finish()
    }
}

impl SurfaceFactory {
    /// Chooses the variant for `env`
    ///
    /// `Auto` prefers the host document, then the native module on a server
    /// process. A native module is never loaded here; see [`Self::prepare`].
    pub fn select(
        env: &Environment,
        native: Option<NativeModuleLoader>,
        backend: SurfaceBackend,
    ) -> Self {
        let factory = match (backend, env.host_document(), native) {
            (SurfaceBackend::Disabled, _, _) => SurfaceFactory::Disabled,
            (SurfaceBackend::Native, _, Some(loader)) => {
                SurfaceFactory::Native(NativeCanvasFactory::new(loader, env.globals()))
            }
            (SurfaceBackend::Native, _, None) => {
                warn!("native surface backend requested but no native module loader is available");
                SurfaceFactory::Disabled
            }
            (SurfaceBackend::Auto, Some(document), _) => {
                SurfaceFactory::Browser(BrowserCanvasFactory::new(document))
            }
            (SurfaceBackend::Auto, None, Some(loader)) if env.is_server_process() => {
                SurfaceFactory::Native(NativeCanvasFactory::new(loader, env.globals()))
            }
            (SurfaceBackend::Auto, None, _) => SurfaceFactory::Disabled,
        };
        debug!(kind = ?factory.kind(), "surface factory selected");
        factory
    }

    pub fn kind(&self) -> SurfaceKind {
        match self {
            SurfaceFactory::Browser(_) => SurfaceKind::Browser,
            SurfaceFactory::Native(_) => SurfaceKind::Native,
            SurfaceFactory::Disabled => SurfaceKind::Disabled,
        }
    }

    /// Makes the factory ready to create surfaces, loading the native module
    /// on first call
    pub async fn prepare(&self) -> Result<()> {
        match self {
            SurfaceFactory::Browser(_) => Ok(()),
            SurfaceFactory::Native(factory) => factory.prepare().await.map(|_| ()),
            SurfaceFactory::Disabled => Err(disabled()),
        }
    }

    pub fn create(&self, width: u32, height: u32) -> Result<DrawingSurface> {
        if let SurfaceFactory::Disabled = self {
            return Err(disabled());
        }
        check_dimensions(width, height)?;

        let canvas = match self {
            SurfaceFactory::Browser(factory) => factory.create_canvas(width, height)?,
            SurfaceFactory::Native(factory) => factory.create_canvas(width, height)?,
            SurfaceFactory::Disabled => return Err(disabled()),
        };
        debug!(width, height, "drawing surface created");
        Ok(DrawingSurface::new(canvas))
    }

    /// Resizes `surface` in place, clearing its pixels
    pub fn reset(&self, surface: &mut DrawingSurface, width: u32, height: u32) -> Result<()> {
        if let SurfaceFactory::Disabled = self {
            return Err(disabled());
        }
        let canvas = surface.canvas.as_mut().ok_or(Error::SurfaceNotInitialized)?;
        check_dimensions(width, height)?;
        canvas.set_dimensions(width, height)
    }

    /// Zeroes the surface's dimensions and drops its canvas
    pub fn destroy(&self, surface: &mut DrawingSurface) -> Result<()> {
        if let SurfaceFactory::Disabled = self {
            return Err(disabled());
        }
        let mut canvas = surface.canvas.take().ok_or(Error::SurfaceNotInitialized)?;
        canvas.set_dimensions(0, 0)
    }
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::InvalidDimensions { width, height });
    }
    Ok(())
}

fn disabled() -> Error {
    Error::unsupported("no drawing surface backend is available in this environment")
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory canvas that records calls

    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    pub struct CallLog {
        pub calls: Vec<String>,
    }

    pub struct RecordingCanvas {
        pub width: u32,
        pub height: u32,
        pub log: Arc<Mutex<CallLog>>,
        context: RecordingContext,
    }

    impl RecordingCanvas {
        pub fn new(width: u32, height: u32) -> Self {
            let log = Arc::new(Mutex::new(CallLog::default()));
            Self {
                width,
                height,
                context: RecordingContext {
                    log: Arc::clone(&log),
                    transform: Matrix::identity(),
                    stack: Vec::new(),
                },
                log,
            }
        }
    }

    struct RecordingContext {
        log: Arc<Mutex<CallLog>>,
        transform: Matrix,
        stack: Vec<Matrix>,
    }

    impl RecordingContext {
        fn record(&self, call: impl Into<String>) {
            if let Ok(mut log) = self.log.lock() {
                log.calls.push(call.into());
            }
        }
    }

    impl Context2d for RecordingContext {
        fn save(&mut self) {
            self.stack.push(self.transform);
            self.record("save");
        }
        fn restore(&mut self) {
            if let Some(transform) = self.stack.pop() {
                self.transform = transform;
            }
            self.record("restore");
        }
        fn transform(&mut self, matrix: &Matrix) {
            self.transform = self.transform.multiply(matrix);
            self.record("transform");
        }
        fn set_transform(&mut self, matrix: &Matrix) {
            self.transform = *matrix;
            self.record("set_transform");
        }
        fn current_transform(&self) -> Matrix {
            self.transform
        }
        fn set_fill_style(&mut self, color: Rgba) {
            self.record(format!("fill_style {},{},{}", color.r, color.g, color.b));
        }
        fn set_stroke_style(&mut self, color: Rgba) {
            self.record(format!("stroke_style {},{},{}", color.r, color.g, color.b));
        }
        fn set_line_width(&mut self, width: f64) {
            self.record(format!("line_width {}", width));
        }
        fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
            self.record(format!("fill_rect {} {} {} {}", x, y, width, height));
        }
        fn fill(&mut self, path: &dyn Path2D, rule: FillRule) {
            self.record(format!("fill {:?} {}", rule, path.segments().len()));
        }
        fn stroke(&mut self, path: &dyn Path2D) {
            self.record(format!("stroke {}", path.segments().len()));
        }
        fn draw_image(&mut self, image: &ImageData, _x: f64, _y: f64) {
            self.record(format!("draw_image {}x{}", image.width, image.height));
        }
    }

    impl Canvas for RecordingCanvas {
        fn width(&self) -> u32 {
            self.width
        }
        fn height(&self) -> u32 {
            self.height
        }
        fn set_dimensions(&mut self, width: u32, height: u32) -> Result<()> {
            self.width = width;
            self.height = height;
            self.context.record(format!("set_dimensions {}x{}", width, height));
            Ok(())
        }
        fn context(&mut self) -> &mut dyn Context2d {
            &mut self.context
        }
        fn to_png(&self) -> Result<Vec<u8>> {
            Ok(b"\x89PNG".to_vec())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{CallLog, RecordingCanvas};
    use super::*;
    use parking_lot::Mutex;
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Default)]
    struct FakeDocument {
        logs: Mutex<Vec<Arc<StdMutex<CallLog>>>>,
    }

    impl HostDocument for FakeDocument {
        fn create_canvas(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>> {
            let canvas = RecordingCanvas::new(width, height);
            self.logs.lock().push(Arc::clone(&canvas.log));
            Ok(Box::new(canvas))
        }
    }

    fn browser_factory() -> SurfaceFactory {
        browser_factory_with(Arc::new(FakeDocument::default()))
    }

    fn browser_factory_with(document: Arc<FakeDocument>) -> SurfaceFactory {
        let env = Environment::unknown().with_host_document(document);
        SurfaceFactory::select(&env, None, SurfaceBackend::Auto)
    }

    #[test]
    fn test_select_prefers_host_document() {
        assert_eq!(browser_factory().kind(), SurfaceKind::Browser);
    }

    #[test]
    fn test_select_without_capabilities_is_disabled() {
        let factory = SurfaceFactory::select(&Environment::unknown(), None, SurfaceBackend::Auto);
        assert_eq!(factory.kind(), SurfaceKind::Disabled);
    }

    #[test]
    fn test_configured_disabled_wins_over_host_document() {
        let env = Environment::unknown().with_host_document(Arc::new(FakeDocument::default()));
        let factory = SurfaceFactory::select(&env, None, SurfaceBackend::Disabled);
        assert_eq!(factory.kind(), SurfaceKind::Disabled);
    }

    #[test]
    fn test_create_rejects_zero_dimensions() {
        let factory = browser_factory();

        for (width, height) in [(0, 10), (10, 0), (0, 0)] {
            match factory.create(width, height) {
                Err(Error::InvalidDimensions { .. }) => {}
                other => panic!("expected InvalidDimensions, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_reset_resizes_in_place() {
        let factory = browser_factory();
        let mut surface = factory.create(10, 20).unwrap();

        factory.reset(&mut surface, 30, 40).unwrap();
        assert_eq!((surface.width(), surface.height()), (30, 40));

        assert!(matches!(
            factory.reset(&mut surface, 0, 40),
            Err(Error::InvalidDimensions { width: 0, height: 40 })
        ));
    }

    #[test]
    fn test_destroy_zeroes_and_invalidates() {
        let document = Arc::new(FakeDocument::default());
        let factory = browser_factory_with(Arc::clone(&document));
        let mut surface = factory.create(10, 20).unwrap();

        factory.destroy(&mut surface).unwrap();

        let log = Arc::clone(&document.logs.lock()[0]);
        assert_eq!(log.lock().unwrap().calls, ["set_dimensions 0x0"]);
        assert_eq!((surface.width(), surface.height()), (0, 0));
        assert!(!surface.is_active());
        assert!(matches!(surface.context(), Err(Error::SurfaceNotInitialized)));
        assert!(matches!(factory.destroy(&mut surface), Err(Error::SurfaceNotInitialized)));
        assert!(matches!(
            factory.reset(&mut surface, 5, 5),
            Err(Error::SurfaceNotInitialized)
        ));
    }

    #[test]
    fn test_never_created_surface_is_rejected() {
        let factory = browser_factory();
        let mut surface = DrawingSurface::default();

        assert!(matches!(factory.reset(&mut surface, 5, 5), Err(Error::SurfaceNotInitialized)));
        assert!(matches!(factory.destroy(&mut surface), Err(Error::SurfaceNotInitialized)));
    }

    #[tokio::test]
    async fn test_disabled_factory_refuses_everything() {
        let factory = SurfaceFactory::Disabled;
        let mut surface = DrawingSurface::default();

        assert!(matches!(factory.prepare().await, Err(Error::UnsupportedEnvironment(_))));
        assert!(matches!(factory.create(10, 10), Err(Error::UnsupportedEnvironment(_))));
        assert!(matches!(
            factory.reset(&mut surface, 10, 10),
            Err(Error::UnsupportedEnvironment(_))
        ));
        assert!(matches!(
            factory.destroy(&mut surface),
            Err(Error::UnsupportedEnvironment(_))
        ));
    }
}
