//! Paints page content onto a 2D context
//!
//! Paths, fills, strokes, colors and images are drawn. Glyphs are not: text
//! is available through text content extraction instead.

use super::content::{form_matrix, form_operations, form_resources, is_form, numbers, MAX_FORM_DEPTH};
use super::images::{decode_image, is_image, xobject_stream};
use crate::engine::RenderTarget;
use crate::error::Result;
use crate::surface::{Context2d, FillRule, GraphicsGlobals, Path2D};
use crate::types::{Rgba, Viewport};
use lopdf::content::Operation;
use lopdf::{Dictionary, Document};
use tracing::debug;

pub(super) fn render_page(
    doc: &Document,
    operations: &[Operation],
    resources: &Dictionary,
    target: &mut RenderTarget<'_>,
    viewport: &Viewport,
) -> Result<()> {
    let context = &mut *target.context;
    let [x0, y0, x1, y1] = viewport.view_box;

    context.save();
    context.set_transform(&viewport.transform);
    context.set_fill_style(Rgba::WHITE);
    context.fill_rect(x0, y0, x1 - x0, y1 - y0);
    context.set_fill_style(Rgba::BLACK);
    context.set_stroke_style(Rgba::BLACK);
    context.set_line_width(1.0);

    let mut painter = Painter {
        doc,
        globals: target.globals,
        path: None,
        current_point: (0.0, 0.0),
    };
    let result = painter.run(context, operations, resources, 0);
    context.restore();
    result
}

struct Painter<'a> {
    doc: &'a Document,
    globals: &'a GraphicsGlobals,
    path: Option<Box<dyn Path2D>>,
    current_point: (f64, f64),
}

impl<'a> Painter<'a> {
    fn run(
        &mut self,
        context: &mut dyn Context2d,
        operations: &[Operation],
        resources: &Dictionary,
        depth: usize,
    ) -> Result<()> {
        for operation in operations {
            let values = numbers(&operation.operands);
            match (operation.operator.as_str(), values.as_slice()) {
                ("q", _) => context.save(),
                ("Q", _) => context.restore(),
                ("cm", &[a, b, c, d, e, f]) => {
                    let matrix = self.globals.matrix([a, b, c, d, e, f])?;
                    context.transform(&matrix);
                }
                ("w", &[width]) => context.set_line_width(width),

                ("g", &[gray]) => context.set_fill_style(gray_color(gray)),
                ("G", &[gray]) => context.set_stroke_style(gray_color(gray)),
                ("rg", &[r, g, b]) => context.set_fill_style(rgb_color(r, g, b)),
                ("RG", &[r, g, b]) => context.set_stroke_style(rgb_color(r, g, b)),
                ("k", &[c, m, y, k]) => context.set_fill_style(cmyk_color(c, m, y, k)),
                ("K", &[c, m, y, k]) => context.set_stroke_style(cmyk_color(c, m, y, k)),
                ("sc" | "scn", components) => {
                    if let Some(color) = component_color(components) {
                        context.set_fill_style(color);
                    }
                }
                ("SC" | "SCN", components) => {
                    if let Some(color) = component_color(components) {
                        context.set_stroke_style(color);
                    }
                }

                ("m", &[x, y]) => {
                    self.path()?.move_to(x, y);
                    self.current_point = (x, y);
                }
                ("l", &[x, y]) => {
                    self.path()?.line_to(x, y);
                    self.current_point = (x, y);
                }
                ("c", &[x1, y1, x2, y2, x3, y3]) => {
                    self.path()?.bezier_curve_to(x1, y1, x2, y2, x3, y3);
                    self.current_point = (x3, y3);
                }
                ("v", &[x2, y2, x3, y3]) => {
                    let (x1, y1) = self.current_point;
                    self.path()?.bezier_curve_to(x1, y1, x2, y2, x3, y3);
                    self.current_point = (x3, y3);
                }
                ("y", &[x1, y1, x3, y3]) => {
                    self.path()?.bezier_curve_to(x1, y1, x3, y3, x3, y3);
                    self.current_point = (x3, y3);
                }
                ("h", _) => self.path()?.close_path(),
                ("re", &[x, y, w, h]) => {
                    self.path()?.rect(x, y, w, h);
                    self.current_point = (x, y);
                }

                ("f" | "F", _) => self.paint(context, Some(FillRule::NonZero), false, false),
                ("f*", _) => self.paint(context, Some(FillRule::EvenOdd), false, false),
                ("S", _) => self.paint(context, None, true, false),
                ("s", _) => self.paint(context, None, true, true),
                ("B", _) => self.paint(context, Some(FillRule::NonZero), true, false),
                ("B*", _) => self.paint(context, Some(FillRule::EvenOdd), true, false),
                ("b", _) => self.paint(context, Some(FillRule::NonZero), true, true),
                ("b*", _) => self.paint(context, Some(FillRule::EvenOdd), true, true),
                ("n", _) => self.path = None,

                ("Do", _) => self.paint_xobject(context, operation, resources, depth)?,
                _ => {}
            }
        }
        Ok(())
    }

    /// The path under construction, started on first use
    fn path(&mut self) -> Result<&mut dyn Path2D> {
        let path = match self.path.take() {
            Some(path) => path,
            None => self.globals.path()?,
        };
        Ok(self.path.insert(path).as_mut())
    }

    fn paint(&mut self, context: &mut dyn Context2d, fill: Option<FillRule>, stroke: bool, close: bool) {
        let Some(mut path) = self.path.take() else {
            return;
        };
        if close {
            path.close_path();
        }
        if let Some(rule) = fill {
            context.fill(path.as_ref(), rule);
        }
        if stroke {
            context.stroke(path.as_ref());
        }
    }

    fn paint_xobject(
        &mut self,
        context: &mut dyn Context2d,
        operation: &Operation,
        resources: &Dictionary,
        depth: usize,
    ) -> Result<()> {
        let doc = self.doc;
        let Some(name) = operation.operands.first().and_then(super::objects::name) else {
            return Ok(());
        };
        let Some((_, stream)) = xobject_stream(doc, resources, name) else {
            return Ok(());
        };

        if is_image(doc, &stream.dict) {
            let image = match decode_image(doc, stream) {
                Ok(image) => image,
                Err(e) => {
                    debug!(error = %e, "image not drawn");
                    return Ok(());
                }
            };
            let (width, height) = (image.width as f64, image.height as f64);
            let data = self
                .globals
                .image_data(image.width, image.height, Some(image.to_rgba()))?;
            // Image space is the unit square with the first row at the top
            let unit = self
                .globals
                .matrix([1.0 / width, 0.0, 0.0, -1.0 / height, 0.0, 1.0])?;
            context.save();
            context.transform(&unit);
            context.draw_image(&data, 0.0, 0.0);
            context.restore();
        } else if is_form(doc, &stream.dict) && depth < MAX_FORM_DEPTH {
            let operations = match form_operations(stream) {
                Ok(operations) => operations,
                Err(e) => {
                    debug!(error = %e, "form not drawn");
                    return Ok(());
                }
            };
            let matrix = self.globals.matrix(form_matrix(doc, stream).to_values())?;
            context.save();
            context.transform(&matrix);
            let saved_path = self.path.take();
            let result = self.run(context, &operations, form_resources(doc, stream, resources), depth + 1);
            self.path = saved_path;
            context.restore();
            result?;
        }
        Ok(())
    }
}

fn channel(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn gray_color(gray: f64) -> Rgba {
    let v = channel(gray);
    Rgba::opaque(v, v, v)
}

fn rgb_color(r: f64, g: f64, b: f64) -> Rgba {
    Rgba::opaque(channel(r), channel(g), channel(b))
}

fn cmyk_color(c: f64, m: f64, y: f64, k: f64) -> Rgba {
    let k = k.clamp(0.0, 1.0);
    rgb_color((1.0 - c) * (1.0 - k), (1.0 - m) * (1.0 - k), (1.0 - y) * (1.0 - k))
}

/// Color from `sc`/`scn` operands; pattern names are ignored
fn component_color(components: &[f64]) -> Option<Rgba> {
    match *components {
        [gray] => Some(gray_color(gray)),
        [r, g, b] => Some(rgb_color(r, g, b)),
        [c, m, y, k] => Some(cmyk_color(c, m, y, k)),
        _ => None,
    }
}
