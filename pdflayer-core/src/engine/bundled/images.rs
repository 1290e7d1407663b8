//! Decoding of image XObjects into 8-bit pixel buffers

use super::objects::{get, get_dict, get_name, get_number, name, number, resolve};
use crate::error::{Error, Result};
use crate::types::{ImageKind, ImageObject};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::debug;

/// Decoded image, gray, RGB or RGBA depending on `channels`
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub data: Vec<u8>,
}

impl DecodedImage {
    pub fn into_image_object(self) -> ImageObject {
        let kind = match self.channels {
            1 => ImageKind::Grayscale1Bpp,
            3 => ImageKind::Rgb24Bpp,
            _ => ImageKind::Rgba32Bpp,
        };
        ImageObject {
            width: Some(self.width),
            height: Some(self.height),
            data: Some(self.data),
            kind: Some(kind),
        }
    }

    /// Straight RGBA copy for drawing
    pub fn to_rgba(&self) -> Vec<u8> {
        match self.channels {
            4 => self.data.clone(),
            3 => self
                .data
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            _ => self.data.iter().flat_map(|&g| [g, g, g, 255]).collect(),
        }
    }
}

pub(super) fn is_image(doc: &Document, dict: &Dictionary) -> bool {
    get_name(doc, dict, b"Subtype") == Some(&b"Image"[..])
}

/// An image object whose pixels could not be decoded keeps its size but has
/// no data
pub(super) fn image_object(doc: &Document, stream: &Stream) -> ImageObject {
    match decode_image(doc, stream) {
        Ok(image) => image.into_image_object(),
        Err(e) => {
            debug!(error = %e, "image data left undecoded");
            ImageObject {
                width: get_number(doc, &stream.dict, b"Width").map(|w| w as u32),
                height: get_number(doc, &stream.dict, b"Height").map(|h| h as u32),
                data: None,
                kind: None,
            }
        }
    }
}

pub(super) fn decode_image(doc: &Document, stream: &Stream) -> Result<DecodedImage> {
    let dict = &stream.dict;
    let width = dimension(doc, dict, b"Width")?;
    let height = dimension(doc, dict, b"Height")?;

    let mut image = match last_filter(doc, dict).as_deref() {
        Some(b"DCTDecode") => decode_jpeg(stream)?,
        Some(b"JPXDecode") | Some(b"JBIG2Decode") | Some(b"CCITTFaxDecode") => {
            return Err(Error::engine("unsupported image filter"));
        }
        _ => decode_raw(doc, stream, width, height)?,
    };

    if let Some(Object::Stream(mask)) = get(doc, dict, b"SMask") {
        apply_soft_mask(doc, &mut image, mask);
    }
    Ok(image)
}

fn dimension(doc: &Document, dict: &Dictionary, key: &[u8]) -> Result<u32> {
    match get_number(doc, dict, key) {
        Some(value) if value >= 1.0 => Ok(value as u32),
        _ => Err(Error::engine(format!(
            "image {} is missing or invalid",
            String::from_utf8_lossy(key)
        ))),
    }
}

fn last_filter(doc: &Document, dict: &Dictionary) -> Option<Vec<u8>> {
    match get(doc, dict, b"Filter")? {
        Object::Name(filter) => Some(filter.clone()),
        Object::Array(filters) => filters
            .last()
            .and_then(|f| resolve(doc, f))
            .and_then(name)
            .map(<[u8]>::to_vec),
        _ => None,
    }
}

fn decode_jpeg(stream: &Stream) -> Result<DecodedImage> {
    let decoded = image::load_from_memory_with_format(&stream.content, image::ImageFormat::Jpeg)
        .map_err(|e| Error::engine_with_source("JPEG image could not be decoded", Box::new(e)))?;
    let (width, height) = (decoded.width(), decoded.height());
    let image = match decoded.color().channel_count() {
        1 => DecodedImage {
            width,
            height,
            channels: 1,
            data: decoded.into_luma8().into_raw(),
        },
        _ => DecodedImage {
            width,
            height,
            channels: 3,
            data: decoded.into_rgb8().into_raw(),
        },
    };
    Ok(image)
}

enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    Indexed {
        base: Box<ColorSpace>,
        palette: Vec<u8>,
    },
}

impl ColorSpace {
    fn components(&self) -> usize {
        match self {
            ColorSpace::Gray | ColorSpace::Indexed { .. } => 1,
            ColorSpace::Rgb => 3,
            ColorSpace::Cmyk => 4,
        }
    }
}

fn color_space(doc: &Document, object: Option<&Object>, depth: usize) -> ColorSpace {
    let Some(object) = object.and_then(|o| resolve(doc, o)) else {
        return ColorSpace::Gray;
    };
    if depth > 4 {
        return ColorSpace::Rgb;
    }
    match object {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => ColorSpace::Gray,
            b"DeviceCMYK" | b"CMYK" => ColorSpace::Cmyk,
            _ => ColorSpace::Rgb,
        },
        Object::Array(items) => {
            let family = items.first().and_then(|f| resolve(doc, f)).and_then(name);
            match family {
                Some(b"ICCBased") => {
                    let components = items
                        .get(1)
                        .and_then(|s| resolve(doc, s))
                        .and_then(|s| match s {
                            Object::Stream(stream) => get_number(doc, &stream.dict, b"N"),
                            _ => None,
                        })
                        .unwrap_or(3.0) as usize;
                    match components {
                        1 => ColorSpace::Gray,
                        4 => ColorSpace::Cmyk,
                        _ => ColorSpace::Rgb,
                    }
                }
                Some(b"Indexed") | Some(b"I") => {
                    let base = color_space(doc, items.get(1), depth + 1);
                    let palette = match items.get(3).and_then(|l| resolve(doc, l)) {
                        Some(Object::String(bytes, _)) => bytes.clone(),
                        Some(Object::Stream(stream)) => stream_bytes(stream).unwrap_or_default(),
                        _ => Vec::new(),
                    };
                    ColorSpace::Indexed {
                        base: Box::new(base),
                        palette,
                    }
                }
                Some(b"CalGray") | Some(b"DeviceGray") => ColorSpace::Gray,
                Some(b"DeviceCMYK") => ColorSpace::Cmyk,
                Some(b"DeviceN") | Some(b"Separation") => ColorSpace::Gray,
                _ => ColorSpace::Rgb,
            }
        }
        _ => ColorSpace::Rgb,
    }
}

fn stream_bytes(stream: &Stream) -> Result<Vec<u8>> {
    if stream.dict.get(b"Filter").is_err() {
        return Ok(stream.content.clone());
    }
    stream
        .decompressed_content()
        .map_err(|e| Error::engine_with_source("stream could not be decompressed", Box::new(e)))
}

/// Unpacks `bits`-per-sample rows into one byte per sample, scaled to 0..=255
fn unpack_samples(data: &[u8], bits: u32, samples_per_row: usize, rows: usize, scale: bool) -> Vec<u8> {
    if bits == 8 {
        return data.to_vec();
    }
    if bits == 16 {
        return data.chunks_exact(2).map(|pair| pair[0]).collect();
    }
    let row_bytes = (samples_per_row * bits as usize).div_ceil(8);
    let max = (1u32 << bits) - 1;
    let available = data.len() * 8 / bits as usize;
    let mut out = Vec::with_capacity((samples_per_row * rows).min(available));
    for row in data.chunks(row_bytes).take(rows) {
        for sample in 0..samples_per_row {
            let bit = sample * bits as usize;
            let Some(&byte) = row.get(bit / 8) else {
                out.push(0);
                continue;
            };
            let shift = 8 - bits as usize - (bit % 8);
            let value = ((byte >> shift) as u32) & max;
            out.push(if scale { (value * 255 / max) as u8 } else { value as u8 });
        }
    }
    out
}

/// Rejects sample data shorter than the declared rows, before anything is
/// allocated for them
fn check_length(raw: &[u8], bits: u32, samples_per_row: usize, rows: usize) -> Result<()> {
    let row_bytes = (samples_per_row as u64 * bits as u64).div_ceil(8);
    let expected = row_bytes.saturating_mul(rows as u64);
    if (raw.len() as u64) < expected {
        return Err(Error::engine(format!(
            "image data is truncated: {} of {} bytes",
            raw.len(),
            expected
        )));
    }
    Ok(())
}

fn cmyk_to_rgb(data: &[u8]) -> Vec<u8> {
    data.chunks_exact(4)
        .flat_map(|p| {
            let k = 255 - p[3] as u16;
            [
                ((255 - p[0] as u16) * k / 255) as u8,
                ((255 - p[1] as u16) * k / 255) as u8,
                ((255 - p[2] as u16) * k / 255) as u8,
            ]
        })
        .collect()
}

fn decode_raw(doc: &Document, stream: &Stream, width: u32, height: u32) -> Result<DecodedImage> {
    let dict = &stream.dict;
    let raw = stream_bytes(stream)?;
    let pixels = width as usize * height as usize;

    let image_mask = matches!(get(doc, dict, b"ImageMask"), Some(Object::Boolean(true)));
    if image_mask {
        check_length(&raw, 1, width as usize, height as usize)?;
        let mut data = unpack_samples(&raw, 1, width as usize, height as usize, true);
        // Samples of 0 are painted unless the decode array is inverted
        if !decode_is_inverted(doc, dict) {
            data.iter_mut().for_each(|value| *value = 255 - *value);
        }
        return finish(width, height, 1, data, pixels);
    }

    let bits = get_number(doc, dict, b"BitsPerComponent").unwrap_or(8.0) as u32;
    if ![1, 2, 4, 8, 16].contains(&bits) {
        return Err(Error::engine(format!("unsupported bits per component: {}", bits)));
    }

    let space = color_space(doc, get(doc, dict, b"ColorSpace"), 0);
    let samples_per_row = width as usize * space.components();
    check_length(&raw, bits, samples_per_row, height as usize)?;

    match space {
        ColorSpace::Indexed { base, palette } => {
            let indices = unpack_samples(&raw, bits, samples_per_row, height as usize, false);
            let base_components = base.components();
            let mut data = Vec::with_capacity(pixels * base_components);
            for &index in indices.iter().take(pixels) {
                let start = index as usize * base_components;
                match palette.get(start..start + base_components) {
                    Some(entry) => data.extend_from_slice(entry),
                    None => data.extend(std::iter::repeat(0).take(base_components)),
                }
            }
            match *base {
                ColorSpace::Cmyk => finish(width, height, 3, cmyk_to_rgb(&data), pixels),
                ColorSpace::Gray => finish(width, height, 1, data, pixels),
                _ => finish(width, height, 3, data, pixels),
            }
        }
        ColorSpace::Gray => {
            let data = unpack_samples(&raw, bits, samples_per_row, height as usize, true);
            finish(width, height, 1, data, pixels)
        }
        ColorSpace::Rgb => {
            let data = unpack_samples(&raw, bits, samples_per_row, height as usize, true);
            finish(width, height, 3, data, pixels)
        }
        ColorSpace::Cmyk => {
            let data = unpack_samples(&raw, bits, samples_per_row, height as usize, true);
            finish(width, height, 3, cmyk_to_rgb(&data), pixels)
        }
    }
}

fn decode_is_inverted(doc: &Document, dict: &Dictionary) -> bool {
    match get(doc, dict, b"Decode") {
        Some(Object::Array(values)) => values.first().and_then(number) == Some(1.0),
        _ => false,
    }
}

fn finish(width: u32, height: u32, channels: u8, mut data: Vec<u8>, pixels: usize) -> Result<DecodedImage> {
    let expected = pixels * channels as usize;
    if data.len() < expected {
        return Err(Error::engine(format!(
            "image data is truncated: {} of {} bytes",
            data.len(),
            expected
        )));
    }
    data.truncate(expected);
    Ok(DecodedImage {
        width,
        height,
        channels,
        data,
    })
}

/// Adds the soft mask as an alpha channel when it matches the image size
fn apply_soft_mask(doc: &Document, image: &mut DecodedImage, mask: &Stream) {
    let Ok(alpha) = decode_raw(doc, mask, image.width, image.height) else {
        return;
    };
    if alpha.channels != 1 || alpha.width != image.width || alpha.height != image.height {
        return;
    }
    let color: Vec<u8> = match image.channels {
        1 => image.data.iter().flat_map(|&g| [g, g, g]).collect(),
        3 => std::mem::take(&mut image.data),
        _ => return,
    };
    image.data = color
        .chunks_exact(3)
        .zip(alpha.data.iter())
        .flat_map(|(rgb, &a)| [rgb[0], rgb[1], rgb[2], a])
        .collect();
    image.channels = 4;
}

/// The XObject named `name` in `resources`, with the entry as written
pub(super) fn xobject_stream<'a>(doc: &'a Document, resources: &'a Dictionary, name: &[u8]) -> Option<(&'a Object, &'a Stream)> {
    let xobjects = get_dict(doc, resources, b"XObject")?;
    let entry = xobjects.get(name).ok()?;
    match resolve(doc, entry)? {
        Object::Stream(stream) => Some((entry, stream)),
        _ => None,
    }
}
