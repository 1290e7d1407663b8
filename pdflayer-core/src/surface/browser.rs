//! Canvases created by a host document

use super::globals::GraphicsConstructors;
use super::Canvas;
use crate::error::Result;
use std::sync::Arc;

/// Window-like host able to create canvases
pub trait HostDocument: Send + Sync {
    fn create_canvas(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>>;

    /// Constructors the host already provides
    fn constructors(&self) -> GraphicsConstructors {
        GraphicsConstructors::default()
    }
}

#[derive(Clone)]
pub struct BrowserCanvasFactory {
    document: Arc<dyn HostDocument>,
}

impl BrowserCanvasFactory {
    pub fn new(document: Arc<dyn HostDocument>) -> Self {
        Self { document }
    }

    pub fn create_canvas(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>> {
        self.document.create_canvas(width, height)
    }
}
