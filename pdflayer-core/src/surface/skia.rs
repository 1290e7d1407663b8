//! tiny-skia native graphics module

use super::globals::GraphicsConstructors;
use super::native::NativeGraphicsModule;
use super::{Canvas, Context2d, FillRule, ImageData, Path2D, PathSegment};
use crate::error::{Error, Result};
use crate::types::{Matrix, Rgba};
use tiny_skia::{
    FillRule as SkiaFillRule, FilterQuality, IntSize, Paint, Path, PathBuilder, Pixmap,
    PixmapPaint, Rect, Stroke, Transform,
};

#[derive(Debug, Default)]
pub struct SkiaModule;

impl SkiaModule {
    pub fn new() -> Self {
        Self
    }
}

impl NativeGraphicsModule for SkiaModule {
    fn name(&self) -> &str {
        "tiny-skia"
    }

    fn create_canvas(&self, width: u32, height: u32) -> Result<Box<dyn Canvas>> {
        Ok(Box::new(SkiaCanvas::new(width, height)?))
    }

    fn constructors(&self) -> GraphicsConstructors {
        GraphicsConstructors::standard()
    }
}

#[derive(Debug, Clone, Copy)]
struct DrawState {
    transform: Matrix,
    fill: Rgba,
    stroke: Rgba,
    line_width: f64,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Matrix::identity(),
            fill: Rgba::BLACK,
            stroke: Rgba::BLACK,
            line_width: 1.0,
        }
    }
}

/// Off-screen RGBA canvas backed by a tiny-skia pixmap
pub struct SkiaCanvas {
    pixmap: Option<Pixmap>,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl SkiaCanvas {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        let pixmap = Pixmap::new(width, height).ok_or(Error::InvalidDimensions { width, height })?;
        Ok(Self {
            pixmap: Some(pixmap),
            state: DrawState::default(),
            stack: Vec::new(),
        })
    }

    pub fn pixmap(&self) -> Option<&Pixmap> {
        self.pixmap.as_ref()
    }

    fn paint(color: Rgba) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        paint.anti_alias = true;
        paint
    }
}

fn to_transform(matrix: &Matrix) -> Transform {
    Transform::from_row(
        matrix.a as f32,
        matrix.b as f32,
        matrix.c as f32,
        matrix.d as f32,
        matrix.e as f32,
        matrix.f as f32,
    )
}

fn to_fill_rule(rule: FillRule) -> SkiaFillRule {
    match rule {
        FillRule::NonZero => SkiaFillRule::Winding,
        FillRule::EvenOdd => SkiaFillRule::EvenOdd,
    }
}

fn build_path(segments: &[PathSegment]) -> Option<Path> {
    let mut builder = PathBuilder::new();
    for segment in segments {
        match *segment {
            PathSegment::MoveTo(x, y) => builder.move_to(x as f32, y as f32),
            PathSegment::LineTo(x, y) => builder.line_to(x as f32, y as f32),
            PathSegment::CubicTo(x1, y1, x2, y2, x, y) => builder.cubic_to(
                x1 as f32, y1 as f32, x2 as f32, y2 as f32, x as f32, y as f32,
            ),
            // Spelled out so negative widths keep their orientation
            PathSegment::Rect(x, y, width, height) => {
                builder.move_to(x as f32, y as f32);
                builder.line_to((x + width) as f32, y as f32);
                builder.line_to((x + width) as f32, (y + height) as f32);
                builder.line_to(x as f32, (y + height) as f32);
                builder.close();
            }
            PathSegment::Close => builder.close(),
        }
    }
    builder.finish()
}

/// Converts straight RGBA to the premultiplied layout tiny-skia stores
fn premultiply(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for pixel in data.chunks_exact(4) {
        let alpha = pixel[3] as u16;
        for &channel in &pixel[..3] {
            out.push(((channel as u16 * alpha + 127) / 255) as u8);
        }
        out.push(pixel[3]);
    }
    out
}

impl Context2d for SkiaCanvas {
    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn transform(&mut self, matrix: &Matrix) {
        self.state.transform = self.state.transform.multiply(matrix);
    }

    fn set_transform(&mut self, matrix: &Matrix) {
        self.state.transform = *matrix;
    }

    fn current_transform(&self) -> Matrix {
        self.state.transform
    }

    fn set_fill_style(&mut self, color: Rgba) {
        self.state.fill = color;
    }

    fn set_stroke_style(&mut self, color: Rgba) {
        self.state.stroke = color;
    }

    fn set_line_width(&mut self, width: f64) {
        self.state.line_width = width.max(0.0);
    }

    fn fill_rect(&mut self, x: f64, y: f64, width: f64, height: f64) {
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };
        let left = x.min(x + width) as f32;
        let top = y.min(y + height) as f32;
        if let Some(rect) = Rect::from_xywh(left, top, width.abs() as f32, height.abs() as f32) {
            pixmap.fill_rect(
                rect,
                &Self::paint(self.state.fill),
                to_transform(&self.state.transform),
                None,
            );
        }
    }

    fn fill(&mut self, path: &dyn Path2D, rule: FillRule) {
        let (Some(pixmap), Some(path)) = (self.pixmap.as_mut(), build_path(path.segments())) else {
            return;
        };
        pixmap.fill_path(
            &path,
            &Self::paint(self.state.fill),
            to_fill_rule(rule),
            to_transform(&self.state.transform),
            None,
        );
    }

    fn stroke(&mut self, path: &dyn Path2D) {
        let (Some(pixmap), Some(path)) = (self.pixmap.as_mut(), build_path(path.segments())) else {
            return;
        };
        let stroke = Stroke {
            width: self.state.line_width as f32,
            ..Stroke::default()
        };
        pixmap.stroke_path(
            &path,
            &Self::paint(self.state.stroke),
            &stroke,
            to_transform(&self.state.transform),
            None,
        );
    }

    fn draw_image(&mut self, image: &ImageData, x: f64, y: f64) {
        let Some(pixmap) = self.pixmap.as_mut() else {
            return;
        };
        let Some(size) = IntSize::from_wh(image.width, image.height) else {
            return;
        };
        let Some(source) = Pixmap::from_vec(premultiply(&image.data), size) else {
            return;
        };
        let placement = self
            .state
            .transform
            .multiply(&Matrix::new(1.0, 0.0, 0.0, 1.0, x, y));
        let paint = PixmapPaint {
            quality: FilterQuality::Bilinear,
            ..PixmapPaint::default()
        };
        pixmap.draw_pixmap(0, 0, source.as_ref(), &paint, to_transform(&placement), None);
    }
}

impl Canvas for SkiaCanvas {
    fn width(&self) -> u32 {
        self.pixmap.as_ref().map_or(0, Pixmap::width)
    }

    fn height(&self) -> u32 {
        self.pixmap.as_ref().map_or(0, Pixmap::height)
    }

    fn set_dimensions(&mut self, width: u32, height: u32) -> Result<()> {
        self.pixmap = if width == 0 || height == 0 {
            None
        } else {
            Some(Pixmap::new(width, height).ok_or(Error::InvalidDimensions { width, height })?)
        };
        self.state = DrawState::default();
        self.stack.clear();
        Ok(())
    }

    fn context(&mut self) -> &mut dyn Context2d {
        self
    }

    fn to_png(&self) -> Result<Vec<u8>> {
        let pixmap = self
            .pixmap
            .as_ref()
            .ok_or_else(|| Error::Encode("canvas has no pixels".to_string()))?;
        pixmap.encode_png().map_err(|e| Error::Encode(e.to_string()))
    }
}
