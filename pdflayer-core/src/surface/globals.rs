//! Ambient graphics constructors
//!
//! Rendering code builds matrices, image buffers and paths through the
//! constructors registered here instead of naming a backend. A host may
//! register its own; a native module fills in whatever is still missing when
//! it loads. A registered constructor is never replaced.

use super::{ImageData, Path2D, PathSegment};
use crate::error::{Error, Result};
use crate::types::Matrix;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

pub type MatrixConstructor = Arc<dyn Fn([f64; 6]) -> Matrix + Send + Sync>;
pub type ImageDataConstructor =
    Arc<dyn Fn(u32, u32, Option<Vec<u8>>) -> Result<ImageData> + Send + Sync>;
pub type PathConstructor = Arc<dyn Fn() -> Box<dyn Path2D> + Send + Sync>;

/// Constructors offered by a host document or native module
#[derive(Clone, Default)]
pub struct GraphicsConstructors {
    pub matrix: Option<MatrixConstructor>,
    pub image_data: Option<ImageDataConstructor>,
    pub path: Option<PathConstructor>,
}

impl fmt::Debug for GraphicsConstructors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsConstructors")
            .field("matrix", &self.matrix.is_some())
            .field("image_data", &self.image_data.is_some())
            .field("path", &self.path.is_some())
            .finish()
    }
}

impl GraphicsConstructors {
    /// Backend-independent constructors
    pub fn standard() -> Self {
        Self {
            matrix: Some(Arc::new(Matrix::from_values)),
            image_data: Some(Arc::new(standard_image_data)),
            path: Some(Arc::new(|| Box::new(PathRecorder::default()) as Box<dyn Path2D>)),
        }
    }
}

fn standard_image_data(width: u32, height: u32, data: Option<Vec<u8>>) -> Result<ImageData> {
    let expected = width as usize * height as usize * 4;
    let data = match data {
        Some(data) if data.len() != expected => {
            return Err(Error::engine(format!(
                "image data holds {} bytes, expected {} for {}x{} RGBA",
                data.len(),
                expected,
                width,
                height
            )));
        }
        Some(data) => data,
        None => vec![0; expected],
    };
    Ok(ImageData { width, height, data })
}

/// Which constructors an injection actually installed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InjectionReport {
    pub matrix: bool,
    pub image_data: bool,
    pub path: bool,
}

impl InjectionReport {
    pub fn any(&self) -> bool {
        self.matrix || self.image_data || self.path
    }
}

/// Per-environment constructor slots
#[derive(Default)]
pub struct GraphicsGlobals {
    matrix: OnceLock<MatrixConstructor>,
    image_data: OnceLock<ImageDataConstructor>,
    path: OnceLock<PathConstructor>,
}

impl fmt::Debug for GraphicsGlobals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphicsGlobals")
            .field("matrix", &self.has_matrix())
            .field("image_data", &self.has_image_data())
            .field("path", &self.has_path())
            .finish()
    }
}

impl GraphicsGlobals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a matrix constructor; returns false if one was already present
    pub fn provide_matrix(&self, constructor: MatrixConstructor) -> bool {
        self.matrix.set(constructor).is_ok()
    }

    pub fn provide_image_data(&self, constructor: ImageDataConstructor) -> bool {
        self.image_data.set(constructor).is_ok()
    }

    pub fn provide_path(&self, constructor: PathConstructor) -> bool {
        self.path.set(constructor).is_ok()
    }

    /// Installs each offered constructor whose slot is still empty
    pub fn inject_missing(&self, offered: &GraphicsConstructors) -> InjectionReport {
        let report = InjectionReport {
            matrix: offered
                .matrix
                .clone()
                .is_some_and(|constructor| self.provide_matrix(constructor)),
            image_data: offered
                .image_data
                .clone()
                .is_some_and(|constructor| self.provide_image_data(constructor)),
            path: offered
                .path
                .clone()
                .is_some_and(|constructor| self.provide_path(constructor)),
        };
        if report.any() {
            debug!(?report, "graphics constructors injected");
        }
        report
    }

    pub fn has_matrix(&self) -> bool {
        self.matrix.get().is_some()
    }

    pub fn has_image_data(&self) -> bool {
        self.image_data.get().is_some()
    }

    pub fn has_path(&self) -> bool {
        self.path.get().is_some()
    }

    pub fn matrix(&self, values: [f64; 6]) -> Result<Matrix> {
        let constructor = self.matrix.get().ok_or_else(|| missing("matrix"))?;
        Ok(constructor(values))
    }

    pub fn image_data(&self, width: u32, height: u32, data: Option<Vec<u8>>) -> Result<ImageData> {
        let constructor = self.image_data.get().ok_or_else(|| missing("image data"))?;
        constructor(width, height, data)
    }

    pub fn path(&self) -> Result<Box<dyn Path2D>> {
        let constructor = self.path.get().ok_or_else(|| missing("path"))?;
        Ok(constructor())
    }
}

fn missing(what: &str) -> Error {
    Error::unsupported(format!("no {} constructor is registered", what))
}

/// Path that records its segments for any canvas to replay
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathRecorder {
    segments: Vec<PathSegment>,
}

impl Path2D for PathRecorder {
    fn move_to(&mut self, x: f64, y: f64) {
        self.segments.push(PathSegment::MoveTo(x, y));
    }

    fn line_to(&mut self, x: f64, y: f64) {
        self.segments.push(PathSegment::LineTo(x, y));
    }

    fn bezier_curve_to(&mut self, cp1x: f64, cp1y: f64, cp2x: f64, cp2y: f64, x: f64, y: f64) {
        self.segments
            .push(PathSegment::CubicTo(cp1x, cp1y, cp2x, cp2y, x, y));
    }

    fn rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        self.segments.push(PathSegment::Rect(x, y, width, height));
    }

    fn close_path(&mut self) {
        self.segments.push(PathSegment::Close);
    }

    fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}
