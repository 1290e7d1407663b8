use crate::config::ExtractionConfig;
use crate::context::PdfContext;
use crate::engine::{DocumentSource, EnginePage, RenderTarget};
use crate::error::Result;
use crate::surface::DrawingSurface;
use crate::types::{RenderOutput, Viewport};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, warn};

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderOptions {
    pub scale: f64,
    /// Target width in pixels; takes precedence over `height` and `scale`
    pub width: Option<f64>,
    /// Target height in pixels; takes precedence over `scale`
    pub height: Option<f64>,
    pub to_data_url: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::from(&ExtractionConfig::default())
    }
}

impl From<&ExtractionConfig> for RenderOptions {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            scale: config.render.scale,
            width: None,
            height: None,
            to_data_url: config.render.to_data_url,
        }
    }
}

impl RenderOptions {
    fn viewport(&self, page: &dyn EnginePage) -> Viewport {
        let base = page.get_viewport(1.0);
        let scale = match (self.width, self.height) {
            (Some(width), _) => width / base.width,
            (None, Some(height)) => height / base.height,
            (None, None) => self.scale,
        };
        page.get_viewport(scale)
    }
}

impl PdfContext {
    /// Rasterizes one page to PNG
    pub async fn render_page_as_image(
        &self,
        source: impl Into<DocumentSource>,
        page_number: u32,
        options: RenderOptions,
    ) -> Result<RenderOutput> {
        let document = self.document(source.into()).await?;
        let page = super::page(&document, page_number).await?;
        let viewport = options.viewport(page.as_ref());
        let (width, height) = viewport.pixel_size();

        let surfaces = self.surface_factory();
        surfaces.prepare().await?;
        let mut surface = surfaces.create(width, height)?;
        debug!(page = page_number, width, height, "rendering page");

        let png = self.paint(page.as_ref(), &mut surface, &viewport).await;
        if let Err(e) = surfaces.destroy(&mut surface) {
            warn!(error = %e, "drawing surface was not released cleanly");
        }
        let png = png?;

        Ok(if options.to_data_url {
            RenderOutput::DataUrl(format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(&png)))
        } else {
            RenderOutput::Png(png)
        })
    }

    async fn paint(
        &self,
        page: &dyn EnginePage,
        surface: &mut DrawingSurface,
        viewport: &Viewport,
    ) -> Result<Vec<u8>> {
        let globals = self.environment().globals();
        {
            let mut target = RenderTarget {
                context: surface.context()?,
                globals: &globals,
            };
            page.render(&mut target, viewport).await?;
        }
        surface.to_png()
    }
}
