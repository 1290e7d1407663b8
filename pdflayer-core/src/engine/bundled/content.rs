//! Content stream interpretation: operator lists, text runs and annotations

use super::images::{is_image, xobject_stream};
use super::objects::{as_dict, decode_text, get, get_dict, get_name, number, object_key, rect, resolve};
use crate::error::{Error, Result};
use crate::types::{Annotation, Matrix, OperatorArg, OperatorList, OpsTable, TextItem};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::debug;

/// Form XObjects nested deeper than this are not entered
pub(super) const MAX_FORM_DEPTH: usize = 8;

/// Kerning adjustment (thousandths of text space) read as a word gap
const WORD_GAP: f64 = -250.0;

pub(super) fn decode_operations(bytes: &[u8]) -> Result<Vec<Operation>> {
    Content::decode(bytes)
        .map(|content| content.operations)
        .map_err(|e| Error::engine_with_source("content stream could not be parsed", Box::new(e)))
}

pub(super) fn form_operations(stream: &Stream) -> Result<Vec<Operation>> {
    let bytes = if stream.dict.get(b"Filter").is_ok() {
        stream
            .decompressed_content()
            .map_err(|e| Error::engine_with_source("form content could not be decompressed", Box::new(e)))?
    } else {
        stream.content.clone()
    };
    decode_operations(&bytes)
}

/// Resources of a form, falling back to the enclosing ones
pub(super) fn form_resources<'a>(doc: &'a Document, form: &'a Stream, outer: &'a Dictionary) -> &'a Dictionary {
    get_dict(doc, &form.dict, b"Resources").unwrap_or(outer)
}

pub(super) fn form_matrix(doc: &Document, form: &Stream) -> Matrix {
    match get(doc, &form.dict, b"Matrix") {
        Some(Object::Array(values)) if values.len() == 6 => {
            let mut matrix = [0.0; 6];
            for (slot, value) in matrix.iter_mut().zip(values) {
                *slot = resolve(doc, value).and_then(number).unwrap_or(0.0);
            }
            Matrix::from_values(matrix)
        }
        _ => Matrix::identity(),
    }
}

pub(super) fn is_form(doc: &Document, dict: &Dictionary) -> bool {
    get_name(doc, dict, b"Subtype") == Some(&b"Form"[..])
}

pub(super) fn numbers(operands: &[Object]) -> Vec<f64> {
    operands.iter().filter_map(number).collect()
}

pub(super) fn page_image_key(page_number: u32, name: &[u8]) -> String {
    format!("img_p{}_{}", page_number, String::from_utf8_lossy(name))
}

fn to_arg(object: &Object) -> OperatorArg {
    match object {
        Object::Integer(_) | Object::Real(_) => OperatorArg::Number(number(object).unwrap_or(0.0)),
        Object::Name(name) => OperatorArg::Name(String::from_utf8_lossy(name).into_owned()),
        Object::String(bytes, _) => OperatorArg::Bytes(bytes.clone()),
        Object::Array(items) => OperatorArg::Array(items.iter().map(to_arg).collect()),
        Object::Boolean(value) => OperatorArg::Bool(*value),
        _ => OperatorArg::Null,
    }
}

// ===== OPERATOR LISTS =====

pub(super) struct OperatorListBuilder<'a> {
    doc: &'a Document,
    ops: &'a OpsTable,
    page_number: u32,
    list: OperatorList,
}

impl<'a> OperatorListBuilder<'a> {
    pub fn new(doc: &'a Document, ops: &'a OpsTable, page_number: u32) -> Self {
        Self {
            doc,
            ops,
            page_number,
            list: OperatorList::default(),
        }
    }

    pub fn build(mut self, operations: &[Operation], resources: &Dictionary) -> OperatorList {
        self.walk(operations, resources, 0);
        self.list
    }

    fn walk(&mut self, operations: &[Operation], resources: &Dictionary, depth: usize) {
        let ops = self.ops;
        for operation in operations {
            let args = || operation.operands.iter().map(to_arg).collect::<Vec<_>>();
            match operation.operator.as_str() {
                "q" => self.list.push(ops.save, Vec::new()),
                "Q" => self.list.push(ops.restore, Vec::new()),
                "cm" => self.list.push(ops.transform, args()),
                "m" | "l" | "c" | "v" | "y" | "h" | "re" => {
                    let mut path = vec![OperatorArg::Name(operation.operator.clone())];
                    path.extend(args());
                    self.list.push(ops.construct_path, path);
                }
                "S" | "s" => self.list.push(ops.stroke, vec![OperatorArg::Name(operation.operator.clone())]),
                "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                    self.list.push(ops.fill, vec![OperatorArg::Name(operation.operator.clone())])
                }
                "Tj" | "TJ" | "'" | "\"" => self.list.push(ops.show_text, args()),
                "BI" | "EI" => self.list.push(ops.paint_inline_image_x_object, Vec::new()),
                "Do" => self.paint_xobject(operation, resources, depth),
                _ => {}
            }
        }
    }

    fn paint_xobject(&mut self, operation: &Operation, resources: &Dictionary, depth: usize) {
        let doc = self.doc;
        let Some(name) = operation.operands.first().and_then(super::objects::name) else {
            return;
        };
        let Some((entry, stream)) = xobject_stream(doc, resources, name) else {
            debug!(name = %String::from_utf8_lossy(name), "XObject not found in resources");
            return;
        };

        if is_image(doc, &stream.dict) {
            let key = match entry {
                Object::Reference(id) => object_key(*id),
                _ => page_image_key(self.page_number, name),
            };
            let width = get(doc, &stream.dict, b"Width").and_then(number).unwrap_or(0.0);
            let height = get(doc, &stream.dict, b"Height").and_then(number).unwrap_or(0.0);
            let op = if matches!(get(doc, &stream.dict, b"ImageMask"), Some(Object::Boolean(true))) {
                self.ops.paint_image_mask_x_object
            } else {
                self.ops.paint_image_x_object
            };
            self.list.push(
                op,
                vec![
                    OperatorArg::Name(key),
                    OperatorArg::Number(width),
                    OperatorArg::Number(height),
                ],
            );
        } else if is_form(doc, &stream.dict) && depth < MAX_FORM_DEPTH {
            let matrix = form_matrix(doc, stream);
            self.list.push(
                self.ops.paint_form_x_object_begin,
                matrix.to_values().into_iter().map(OperatorArg::Number).collect(),
            );
            match form_operations(stream) {
                Ok(operations) => {
                    self.walk(&operations, form_resources(doc, stream, resources), depth + 1)
                }
                Err(e) => debug!(error = %e, "form XObject skipped"),
            }
            self.list.push(self.ops.paint_form_x_object_end, Vec::new());
        }
    }
}

// ===== TEXT =====

pub(super) struct TextExtractor<'a> {
    doc: &'a Document,
    items: Vec<TextItem>,
    line_matrix: Matrix,
    text_matrix: Matrix,
    leading: f64,
    font: Option<String>,
}

impl<'a> TextExtractor<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            items: Vec::new(),
            line_matrix: Matrix::identity(),
            text_matrix: Matrix::identity(),
            leading: 0.0,
            font: None,
        }
    }

    pub fn extract(mut self, operations: &[Operation], resources: &Dictionary) -> Vec<TextItem> {
        self.walk(operations, resources, 0);
        self.items
    }

    fn walk(&mut self, operations: &[Operation], resources: &Dictionary, depth: usize) {
        for operation in operations {
            let operands = &operation.operands;
            match operation.operator.as_str() {
                "BT" => {
                    self.line_matrix = Matrix::identity();
                    self.text_matrix = Matrix::identity();
                }
                "Tf" => {
                    self.font = operands
                        .first()
                        .and_then(super::objects::name)
                        .map(|n| String::from_utf8_lossy(n).into_owned());
                }
                "TL" => {
                    if let Some(leading) = operands.first().and_then(number) {
                        self.leading = leading;
                    }
                }
                "Td" | "TD" => {
                    let values = numbers(operands);
                    if let [tx, ty] = values[..] {
                        if operation.operator == "TD" {
                            self.leading = -ty;
                        }
                        self.move_line(tx, ty);
                    }
                }
                "Tm" => {
                    let values = numbers(operands);
                    if let Ok(values) = <[f64; 6]>::try_from(values) {
                        self.line_matrix = Matrix::from_values(values);
                        self.text_matrix = self.line_matrix;
                    }
                }
                "T*" => self.next_line(),
                "Tj" => {
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(decode_text(bytes));
                    }
                }
                "'" => {
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.first() {
                        self.show(decode_text(bytes));
                    }
                }
                "\"" => {
                    self.next_line();
                    if let Some(Object::String(bytes, _)) = operands.get(2) {
                        self.show(decode_text(bytes));
                    }
                }
                "TJ" => {
                    if let Some(Object::Array(parts)) = operands.first() {
                        self.show(spaced_text(parts));
                    }
                }
                "Do" => self.enter_form(operation, resources, depth),
                _ => {}
            }
        }
    }

    fn move_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = self
            .line_matrix
            .multiply(&Matrix::new(1.0, 0.0, 0.0, 1.0, tx, ty));
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    /// A run starting on a different baseline ends the previous run's line
    fn show(&mut self, text: String) {
        if text.is_empty() {
            return;
        }
        let transform = self.text_matrix;
        if let Some(last) = self.items.last_mut() {
            if (last.transform.f - transform.f).abs() > 0.01 {
                last.has_eol = true;
            }
        }
        self.items.push(TextItem {
            str: text,
            has_eol: false,
            transform,
            font_name: self.font.clone(),
        });
    }

    fn enter_form(&mut self, operation: &Operation, resources: &Dictionary, depth: usize) {
        let doc = self.doc;
        if depth >= MAX_FORM_DEPTH {
            return;
        }
        let Some(name) = operation.operands.first().and_then(super::objects::name) else {
            return;
        };
        let Some((_, stream)) = xobject_stream(doc, resources, name) else {
            return;
        };
        if !is_form(doc, &stream.dict) {
            return;
        }
        if let Ok(operations) = form_operations(stream) {
            self.walk(&operations, form_resources(doc, stream, resources), depth + 1);
        }
    }
}

fn spaced_text(parts: &[Object]) -> String {
    let mut text = String::new();
    for part in parts {
        match part {
            Object::String(bytes, _) => text.push_str(&decode_text(bytes)),
            other => {
                if number(other).is_some_and(|gap| gap <= WORD_GAP) && !text.ends_with(' ') {
                    text.push(' ');
                }
            }
        }
    }
    text
}

// ===== ANNOTATIONS =====

pub(super) fn annotations(doc: &Document, page: &Dictionary) -> Vec<Annotation> {
    let Some(Object::Array(entries)) = get(doc, page, b"Annots") else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| as_dict(doc, entry))
        .filter_map(|annotation| {
            let subtype = get_name(doc, annotation, b"Subtype")?;
            Some(Annotation {
                subtype: String::from_utf8_lossy(subtype).into_owned(),
                rect: annotation
                    .get(b"Rect")
                    .ok()
                    .and_then(|r| rect(doc, r))
                    .unwrap_or_default(),
                url: link_url(doc, annotation),
            })
        })
        .collect()
}

fn link_url(doc: &Document, annotation: &Dictionary) -> Option<String> {
    let action = get_dict(doc, annotation, b"A")?;
    if get_name(doc, action, b"S") != Some(&b"URI"[..]) {
        return None;
    }
    match get(doc, action, b"URI")? {
        Object::String(bytes, _) => Some(decode_text(bytes)).filter(|url| !url.is_empty()),
        _ => None,
    }
}
