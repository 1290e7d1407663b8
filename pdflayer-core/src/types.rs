use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ===== GEOMETRY =====

/// 2D affine transform `[a b c d e f]`, mapping `(x, y)` to
/// `(a*x + c*y + e, b*x + d*y + f)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const fn new(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self { a, b, c, d, e, f }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn from_values(values: [f64; 6]) -> Self {
        let [a, b, c, d, e, f] = values;
        Self::new(a, b, c, d, e, f)
    }

    pub fn to_values(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }

    /// `self × other`: `other` is applied first, then `self`
    pub fn multiply(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            e: self.a * other.e + self.c * other.f + self.e,
            f: self.b * other.e + self.d * other.f + self.f,
        }
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.e,
            self.b * x + self.d * y + self.f,
        )
    }
}

/// Non-premultiplied 8-bit colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::opaque(0, 0, 0);
    pub const WHITE: Rgba = Rgba::opaque(255, 255, 255);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

/// Page viewport: the page's view box projected to device space at a scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub view_box: [f64; 4],
    pub scale: f64,
    pub rotation: i32,
    pub width: f64,
    pub height: f64,
    pub transform: Matrix,
}

impl Viewport {
    /// Builds the device transform for `view_box` (`[x0 y0 x1 y1]`), flipping
    /// the y axis so that the top-left corner maps to the origin.
    pub fn new(view_box: [f64; 4], scale: f64, rotation: i32) -> Self {
        let rotation = rotation.rem_euclid(360);
        let center_x = (view_box[2] + view_box[0]) / 2.0;
        let center_y = (view_box[3] + view_box[1]) / 2.0;

        let (rotate_a, rotate_b, rotate_c, rotate_d) = match rotation {
            90 => (0.0, 1.0, 1.0, 0.0),
            180 => (-1.0, 0.0, 0.0, 1.0),
            270 => (0.0, -1.0, -1.0, 0.0),
            _ => (1.0, 0.0, 0.0, -1.0),
        };

        let (offset_x, offset_y, width, height) = if rotate_a == 0.0 {
            (
                (center_y - view_box[1]).abs() * scale,
                (center_x - view_box[0]).abs() * scale,
                (view_box[3] - view_box[1]) * scale,
                (view_box[2] - view_box[0]) * scale,
            )
        } else {
            (
                (center_x - view_box[0]).abs() * scale,
                (center_y - view_box[1]).abs() * scale,
                (view_box[2] - view_box[0]) * scale,
                (view_box[3] - view_box[1]) * scale,
            )
        };

        let transform = Matrix::new(
            rotate_a * scale,
            rotate_b * scale,
            rotate_c * scale,
            rotate_d * scale,
            offset_x - rotate_a * scale * center_x - rotate_c * scale * center_y,
            offset_y - rotate_b * scale * center_x - rotate_d * scale * center_y,
        );

        Self {
            view_box,
            scale,
            rotation: if matches!(rotation, 90 | 180 | 270) { rotation } else { 0 },
            width,
            height,
            transform,
        }
    }

    /// Pixel size of a canvas holding this viewport
    pub fn pixel_size(&self) -> (u32, u32) {
        (to_pixels(self.width), to_pixels(self.height))
    }
}

fn to_pixels(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.floor().min(u32::MAX as f64) as u32
    } else {
        0
    }
}

// ===== ENGINE DATA =====

/// One run of text reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub str: String,
    /// The run ends a line
    pub has_eol: bool,
    pub transform: Matrix,
    pub font_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextContent {
    pub items: Vec<TextItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub subtype: String,
    pub rect: [f64; 4],
    pub url: Option<String>,
}

/// Argument of an operator list entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OperatorArg {
    Number(f64),
    Name(String),
    Bytes(Vec<u8>),
    Array(Vec<OperatorArg>),
    Bool(bool),
    Null,
}

impl OperatorArg {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            OperatorArg::Name(name) => Some(name),
            _ => None,
        }
    }
}

/// Parallel opcode / argument sequences describing a page's drawing instructions
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OperatorList {
    pub fn_array: Vec<u32>,
    pub args_array: Vec<Vec<OperatorArg>>,
}

impl OperatorList {
    pub fn push(&mut self, op: u32, args: Vec<OperatorArg>) {
        self.fn_array.push(op);
        self.args_array.push(args);
    }

    pub fn len(&self) -> usize {
        self.fn_array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fn_array.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[OperatorArg])> {
        self.fn_array
            .iter()
            .copied()
            .zip(self.args_array.iter().map(Vec::as_slice))
    }
}

/// Opcode numbering used by an engine's operator lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpsTable {
    pub save: u32,
    pub restore: u32,
    pub transform: u32,
    pub construct_path: u32,
    pub fill: u32,
    pub stroke: u32,
    pub show_text: u32,
    pub paint_form_x_object_begin: u32,
    pub paint_form_x_object_end: u32,
    pub paint_image_x_object: u32,
    pub paint_inline_image_x_object: u32,
    pub paint_image_mask_x_object: u32,
}

impl Default for OpsTable {
    fn default() -> Self {
        Self {
            save: 10,
            restore: 11,
            transform: 12,
            construct_path: 91,
            fill: 22,
            stroke: 20,
            show_text: 44,
            paint_form_x_object_begin: 74,
            paint_form_x_object_end: 75,
            paint_image_x_object: 85,
            paint_inline_image_x_object: 86,
            paint_image_mask_x_object: 83,
        }
    }
}

/// Pixel layout reported by the engine. Informational only: extraction
/// derives channels from the data length instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageKind {
    Grayscale1Bpp,
    Rgb24Bpp,
    Rgba32Bpp,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageObject {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub data: Option<Vec<u8>>,
    pub kind: Option<ImageKind>,
}

/// A value of the flattened XMP store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    List(Vec<String>),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(text) => Some(text),
            MetadataValue::List(items) => items.first().map(String::as_str),
        }
    }
}

pub type XmpMetadata = BTreeMap<String, MetadataValue>;

/// What an engine reports for `get_metadata`
#[derive(Debug, Clone, Default)]
pub struct RawMetadata {
    pub info: serde_json::Map<String, serde_json::Value>,
    pub metadata: Option<XmpMetadata>,
}

// ===== PIPELINE OUTPUT =====

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PageText {
    Pages(Vec<String>),
    Merged(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedText {
    pub total_pages: u32,
    pub text: PageText,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetaDates {
    pub creation_date: Option<DateTime<FixedOffset>>,
    pub modification_date: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentMeta {
    pub info: serde_json::Map<String, serde_json::Value>,
    pub metadata: XmpMetadata,
    /// Present only when date parsing was requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<MetaDates>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedLinks {
    pub total_pages: u32,
    pub links: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedImage {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutput {
    Png(Vec<u8>),
    DataUrl(String),
}
