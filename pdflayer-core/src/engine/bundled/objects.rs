//! Helpers over lopdf's object model

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

const MAX_REFERENCE_CHAIN: usize = 32;

/// Follows references until a direct object is reached
pub(super) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    let mut current = object;
    for _ in 0..MAX_REFERENCE_CHAIN {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            _ => return Some(current),
        }
    }
    None
}

pub(super) fn get<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    resolve(doc, dict.get(key).ok()?)
}

/// Dictionary of a dictionary or stream object
pub(super) fn as_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, object)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

pub(super) fn get_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    as_dict(doc, dict.get(key).ok()?)
}

pub(super) fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(*value as f64),
        _ => None,
    }
}

pub(super) fn get_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    number(get(doc, dict, key)?)
}

pub(super) fn name(object: &Object) -> Option<&[u8]> {
    match object {
        Object::Name(name) => Some(name),
        _ => None,
    }
}

pub(super) fn get_name<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    name(get(doc, dict, key)?)
}

/// Looks `key` up on a page node, then on its ancestors
pub(super) fn inherited<'a>(doc: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..MAX_REFERENCE_CHAIN {
        if let Some(value) = get(doc, node, key) {
            return Some(value);
        }
        node = get_dict(doc, node, b"Parent")?;
    }
    None
}

/// Normalized `[x0 y0 x1 y1]` with `x0 <= x1` and `y0 <= y1`
pub(super) fn rect(doc: &Document, object: &Object) -> Option<[f64; 4]> {
    let Object::Array(values) = resolve(doc, object)? else {
        return None;
    };
    if values.len() != 4 {
        return None;
    }
    let mut coords = [0.0; 4];
    for (slot, value) in coords.iter_mut().zip(values) {
        *slot = number(resolve(doc, value)?)?;
    }
    Some([
        coords[0].min(coords[2]),
        coords[1].min(coords[3]),
        coords[0].max(coords[2]),
        coords[1].max(coords[3]),
    ])
}

/// Decodes a PDF text string: UTF-16BE or UTF-8 with a byte-order mark,
/// otherwise single-byte
pub(super) fn decode_text(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(utf8) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(utf8).into_owned();
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// JSON rendition of a direct or referenced object
pub(super) fn to_json(doc: &Document, object: &Object, depth: usize) -> Value {
    if depth > 8 {
        return Value::Null;
    }
    let Some(object) = resolve(doc, object) else {
        return Value::Null;
    };
    match object {
        Object::Null => Value::Null,
        Object::Boolean(value) => Value::Bool(*value),
        Object::Integer(value) => Value::from(*value),
        Object::Real(value) => Value::from(*value as f64),
        Object::Name(name) => Value::String(String::from_utf8_lossy(name).into_owned()),
        Object::String(bytes, _) => Value::String(decode_text(bytes)),
        Object::Array(items) => Value::Array(items.iter().map(|i| to_json(doc, i, depth + 1)).collect()),
        Object::Dictionary(dict) => Value::Object(dict_to_json(doc, dict, depth + 1)),
        Object::Stream(stream) => Value::Object(dict_to_json(doc, &stream.dict, depth + 1)),
        Object::Reference(_) => Value::Null,
    }
}

fn dict_to_json(doc: &Document, dict: &Dictionary, depth: usize) -> Map<String, Value> {
    dict.iter()
        .map(|(key, value)| (String::from_utf8_lossy(key).into_owned(), to_json(doc, value, depth)))
        .collect()
}

pub(super) fn trailer_dict<'a>(doc: &'a Document, key: &[u8]) -> Option<&'a Dictionary> {
    get_dict(doc, &doc.trailer, key)
}

/// Content fingerprint from the size and the first and last kilobyte
pub(super) fn fingerprint(data: &[u8]) -> String {
    let chunk_size = 1024;
    let mut hasher = Sha256::new();

    hasher.update(data.len().to_le_bytes());

    let start_end = std::cmp::min(chunk_size, data.len());
    hasher.update(&data[0..start_end]);

    if data.len() > chunk_size {
        let end_start = data.len() - chunk_size;
        hasher.update(&data[end_start..]);
    }

    format!("{:x}", hasher.finalize())
}

pub(super) fn object_key(id: ObjectId) -> String {
    format!("g_{}_{}", id.0, id.1)
}

/// Inverse of [`object_key`]
pub(super) fn parse_object_key(key: &str) -> Option<ObjectId> {
    let rest = key.strip_prefix("g_")?;
    let (number, generation) = rest.split_once('_')?;
    Some((number.parse().ok()?, generation.parse().ok()?))
}
