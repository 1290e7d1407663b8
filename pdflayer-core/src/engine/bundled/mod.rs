//! Bundled engine built on lopdf
//!
//! Used when no custom loader is supplied. Parsing is synchronous, so every
//! async method here completes without yielding.

mod content;
mod images;
mod objects;
mod render;

use super::{DocumentHandle, Engine, EngineDocument, EnginePage, RenderTarget};
use crate::engine::xmp::parse_xmp;
use crate::error::{Error, Result};
use crate::types::{
    Annotation, ImageObject, OperatorList, OpsTable, RawMetadata, TextContent, Viewport, XmpMetadata,
};
use async_trait::async_trait;
use content::{annotations, decode_operations, OperatorListBuilder, TextExtractor};
use lopdf::content::Operation;
use lopdf::{Dictionary, Document, Object, ObjectId};
use objects::{
    as_dict, decode_text, fingerprint, get, get_dict, get_number, inherited, parse_object_key, rect,
    to_json, trailer_dict,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// US Letter, for pages without a usable MediaBox
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

const INFO_KEYS: &[&str] = &[
    "Title",
    "Author",
    "Subject",
    "Keywords",
    "Creator",
    "Producer",
    "CreationDate",
    "ModDate",
    "Trapped",
];

#[derive(Debug, Default)]
pub struct LopdfEngine {
    ops: OpsTable,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Engine for LopdfEngine {
    fn name(&self) -> &str {
        "lopdf"
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn ops(&self) -> &OpsTable {
        &self.ops
    }

    async fn get_document(&self, data: Vec<u8>) -> Result<DocumentHandle> {
        let doc = Document::load_mem(&data)
            .map_err(|e| Error::engine_with_source("document could not be parsed", Box::new(e)))?;
        if doc.trailer.get(b"Encrypt").is_ok() {
            return Err(Error::engine("encrypted documents are not supported"));
        }

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        let fingerprint = fingerprint(&data);
        debug!(pages = pages.len(), fingerprint = %fingerprint, "document opened");

        Ok(DocumentHandle::new(LopdfDocument {
            doc: Arc::new(doc),
            pages,
            fingerprint,
            ops: self.ops,
        }))
    }
}

pub struct LopdfDocument {
    doc: Arc<Document>,
    pages: Vec<ObjectId>,
    fingerprint: String,
    ops: OpsTable,
}

impl LopdfDocument {
    fn catalog(&self) -> Option<&Dictionary> {
        trailer_dict(&self.doc, b"Root")
    }

    fn info(&self) -> Map<String, Value> {
        let doc = self.doc.as_ref();
        let mut info = Map::new();
        info.insert("PDFFormatVersion".into(), Value::String(doc.version.clone()));

        let catalog = self.catalog();
        let language = catalog
            .and_then(|c| get(doc, c, b"Lang"))
            .and_then(|lang| match lang {
                Object::String(bytes, _) => Some(Value::String(decode_text(bytes))),
                _ => None,
            })
            .unwrap_or(Value::Null);
        info.insert("Language".into(), language);

        let acro_form = catalog.and_then(|c| get_dict(doc, c, b"AcroForm"));
        let signature_flags = acro_form
            .and_then(|form| get_number(doc, form, b"SigFlags"))
            .unwrap_or(0.0) as i64;
        info.insert("IsLinearized".into(), Value::Bool(is_linearized(doc)));
        info.insert("IsAcroFormPresent".into(), Value::Bool(acro_form.is_some()));
        info.insert(
            "IsXFAPresent".into(),
            Value::Bool(acro_form.is_some_and(|form| form.get(b"XFA").is_ok())),
        );
        info.insert(
            "IsCollectionPresent".into(),
            Value::Bool(catalog.is_some_and(|c| c.get(b"Collection").is_ok())),
        );
        info.insert("IsSignaturesPresent".into(), Value::Bool(signature_flags & 1 == 1));

        if let Some(document_info) = trailer_dict(doc, b"Info") {
            let mut custom = Map::new();
            for (key, value) in document_info.iter() {
                let key = String::from_utf8_lossy(key).into_owned();
                let value = to_json(doc, value, 0);
                if INFO_KEYS.contains(&key.as_str()) {
                    info.insert(key, value);
                } else {
                    custom.insert(key, value);
                }
            }
            if !custom.is_empty() {
                info.insert("Custom".into(), Value::Object(custom));
            }
        }
        info
    }

    fn xmp(&self) -> Option<XmpMetadata> {
        let doc = self.doc.as_ref();
        let reference = self.catalog()?.get(b"Metadata").ok()?;
        let Some(Object::Stream(stream)) = objects::resolve(doc, reference) else {
            return None;
        };
        let bytes = if stream.dict.get(b"Filter").is_ok() {
            stream.decompressed_content().ok()?
        } else {
            stream.content.clone()
        };

        match parse_xmp(&String::from_utf8_lossy(&bytes)) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(error = %e, "XMP metadata ignored");
                None
            }
        }
    }
}

fn is_linearized(doc: &Document) -> bool {
    doc.objects.values().any(|object| match object {
        Object::Dictionary(dict) => dict.get(b"Linearized").is_ok(),
        _ => false,
    })
}

#[async_trait]
impl EngineDocument for LopdfDocument {
    fn num_pages(&self) -> u32 {
        self.pages.len() as u32
    }

    fn fingerprint(&self) -> Option<String> {
        Some(self.fingerprint.clone())
    }

    fn ops(&self) -> &OpsTable {
        &self.ops
    }

    async fn get_metadata(&self) -> Result<RawMetadata> {
        Ok(RawMetadata {
            info: self.info(),
            metadata: self.xmp(),
        })
    }

    async fn get_page(&self, page_number: u32) -> Result<Box<dyn EnginePage>> {
        let page_id = page_number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
            .copied()
            .ok_or(Error::PageOutOfRange {
                page: page_number,
                num_pages: self.num_pages(),
            })?;
        let doc = self.doc.as_ref();
        let page = doc
            .get_dictionary(page_id)
            .map_err(|e| Error::engine_with_source("page object could not be read", Box::new(e)))?;

        let view_box = inherited(doc, page, b"CropBox")
            .or_else(|| inherited(doc, page, b"MediaBox"))
            .and_then(|object| rect(doc, object))
            .filter(|[x0, y0, x1, y1]| x1 > x0 && y1 > y0)
            .unwrap_or(DEFAULT_MEDIA_BOX);
        let rotate = inherited(doc, page, b"Rotate")
            .and_then(objects::number)
            .unwrap_or(0.0) as i32;

        Ok(Box::new(LopdfPage {
            doc: Arc::clone(&self.doc),
            number: page_number,
            page_id,
            view_box,
            rotate,
            ops: self.ops,
        }))
    }

    async fn get_common_object(&self, key: &str) -> Result<Option<ImageObject>> {
        let Some(id) = parse_object_key(key) else {
            return Ok(None);
        };
        let doc = self.doc.as_ref();
        match doc.get_object(id) {
            Ok(Object::Stream(stream)) if images::is_image(doc, &stream.dict) => {
                Ok(Some(images::image_object(doc, stream)))
            }
            _ => Ok(None),
        }
    }
}

pub struct LopdfPage {
    doc: Arc<Document>,
    number: u32,
    page_id: ObjectId,
    view_box: [f64; 4],
    rotate: i32,
    ops: OpsTable,
}

impl LopdfPage {
    fn dict(&self) -> Result<&Dictionary> {
        self.doc
            .get_dictionary(self.page_id)
            .map_err(|e| Error::engine_with_source("page object could not be read", Box::new(e)))
    }

    fn resources(&self) -> Result<Dictionary> {
        let doc = self.doc.as_ref();
        Ok(inherited(doc, self.dict()?, b"Resources")
            .and_then(|object| as_dict(doc, object))
            .cloned()
            .unwrap_or_else(Dictionary::new))
    }

    fn operations(&self) -> Result<Vec<Operation>> {
        let bytes = self
            .doc
            .get_page_content(self.page_id)
            .map_err(|e| Error::engine_with_source("page content could not be read", Box::new(e)))?;
        decode_operations(&bytes)
    }
}

#[async_trait]
impl EnginePage for LopdfPage {
    fn page_number(&self) -> u32 {
        self.number
    }

    fn view_box(&self) -> [f64; 4] {
        self.view_box
    }

    fn rotate(&self) -> i32 {
        self.rotate
    }

    async fn get_operator_list(&self) -> Result<OperatorList> {
        let operations = self.operations()?;
        let resources = self.resources()?;
        Ok(OperatorListBuilder::new(&self.doc, &self.ops, self.number).build(&operations, &resources))
    }

    async fn get_text_content(&self) -> Result<TextContent> {
        let operations = self.operations()?;
        let resources = self.resources()?;
        Ok(TextContent {
            items: TextExtractor::new(&self.doc).extract(&operations, &resources),
        })
    }

    async fn get_annotations(&self) -> Result<Vec<Annotation>> {
        Ok(annotations(&self.doc, self.dict()?))
    }

    async fn get_object(&self, key: &str) -> Result<Option<ImageObject>> {
        let prefix = format!("img_p{}_", self.number);
        let Some(name) = key.strip_prefix(prefix.as_str()) else {
            return Ok(None);
        };
        let doc = self.doc.as_ref();
        let resources = self.resources()?;
        Ok(images::xobject_stream(doc, &resources, name.as_bytes())
            .filter(|(_, stream)| images::is_image(doc, &stream.dict))
            .map(|(_, stream)| images::image_object(doc, stream)))
    }

    async fn render(&self, target: &mut RenderTarget<'_>, viewport: &Viewport) -> Result<()> {
        let operations = self.operations()?;
        let resources = self.resources()?;
        render::render_page(&self.doc, &operations, &resources, target, viewport)
    }
}
