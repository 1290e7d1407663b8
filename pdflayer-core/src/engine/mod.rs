//! Document engine capabilities
//!
//! An engine opens documents; documents hand out pages; pages report their
//! operators, text, annotations and objects, and can draw themselves onto a
//! 2D context. Every pipeline is written against these traits only.

pub mod date;
pub mod loader;
pub mod resolver;
pub mod xmp;

#[cfg(feature = "lopdf-engine")]
pub mod bundled;

use crate::error::Result;
use crate::surface::{Context2d, GraphicsGlobals};
use crate::types::{
    Annotation, ImageObject, OperatorList, OpsTable, RawMetadata, TextContent, Viewport,
};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

pub use loader::{DeferredEngine, EngineLoader, LoadedModule};
pub use resolver::{EngineResolver, ResolveOptions, ResolverStatus};

#[cfg(feature = "lopdf-engine")]
pub use bundled::LopdfEngine;

#[async_trait]
pub trait Engine: Send + Sync {
    /// Engine identifier for logging
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Opcode numbering used in this engine's operator lists
    fn ops(&self) -> &OpsTable;

    async fn get_document(&self, data: Vec<u8>) -> Result<DocumentHandle>;

    /// Parses a PDF date string (`D:YYYYMMDDHHmmSSOHH'mm'`)
    fn parse_date(&self, input: &str) -> Option<DateTime<FixedOffset>> {
        date::parse_pdf_date(input)
    }
}

#[async_trait]
pub trait EngineDocument: Send + Sync {
    fn num_pages(&self) -> u32;

    /// Stable content identifier, when the engine computes one
    fn fingerprint(&self) -> Option<String> {
        None
    }

    /// Opcode numbering of the engine that opened this document
    fn ops(&self) -> &OpsTable;

    /// Date parser of the engine that opened this document
    fn parse_date(&self, input: &str) -> Option<DateTime<FixedOffset>> {
        date::parse_pdf_date(input)
    }

    async fn get_metadata(&self) -> Result<RawMetadata>;

    /// `page_number` is 1-based and already validated by the caller
    async fn get_page(&self, page_number: u32) -> Result<Box<dyn EnginePage>>;

    /// Looks up an object in the document-wide namespace
    async fn get_common_object(&self, key: &str) -> Result<Option<ImageObject>>;
}

/// Where a page renders to
pub struct RenderTarget<'a> {
    pub context: &'a mut dyn Context2d,
    pub globals: &'a GraphicsGlobals,
}

#[async_trait]
pub trait EnginePage: Send + Sync {
    fn page_number(&self) -> u32;

    /// `[x0 y0 x1 y1]` in default user space
    fn view_box(&self) -> [f64; 4];

    fn rotate(&self) -> i32 {
        0
    }

    fn get_viewport(&self, scale: f64) -> Viewport {
        Viewport::new(self.view_box(), scale, self.rotate())
    }

    async fn get_operator_list(&self) -> Result<OperatorList>;

    async fn get_text_content(&self) -> Result<TextContent>;

    async fn get_annotations(&self) -> Result<Vec<Annotation>>;

    /// Looks up an object in this page's namespace
    async fn get_object(&self, key: &str) -> Result<Option<ImageObject>>;

    async fn render(&self, target: &mut RenderTarget<'_>, viewport: &Viewport) -> Result<()>;
}

struct Resolution {
    engine: Arc<dyn Engine>,
}

/// Shared reference to a loaded engine
///
/// Every call to [`EngineHandle::new`] starts a new identity, even for an
/// engine that was handed out before.
#[derive(Clone)]
pub struct EngineHandle(Arc<Resolution>);

impl EngineHandle {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self(Arc::new(Resolution { engine }))
    }

    /// Whether both handles came from the same resolution
    pub fn ptr_eq(&self, other: &EngineHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for EngineHandle {
    type Target = dyn Engine;

    fn deref(&self) -> &Self::Target {
        self.0.engine.as_ref()
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("name", &self.name())
            .field("version", &self.version())
            .finish()
    }
}

/// One opened document, owned by the caller
#[derive(Clone)]
pub struct DocumentHandle(Arc<dyn EngineDocument>);

impl DocumentHandle {
    pub fn new(document: impl EngineDocument + 'static) -> Self {
        Self(Arc::new(document))
    }

    pub fn from_arc(document: Arc<dyn EngineDocument>) -> Self {
        Self(document)
    }
}

impl Deref for DocumentHandle {
    type Target = dyn EngineDocument;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentHandle")
            .field("num_pages", &self.0.num_pages())
            .field("fingerprint", &self.0.fingerprint())
            .finish()
    }
}

/// Input accepted by every pipeline: raw bytes or an already opened document
#[derive(Debug, Clone)]
pub enum DocumentSource {
    Bytes(Vec<u8>),
    Document(DocumentHandle),
}

impl From<Vec<u8>> for DocumentSource {
    fn from(data: Vec<u8>) -> Self {
        DocumentSource::Bytes(data)
    }
}

impl From<&[u8]> for DocumentSource {
    fn from(data: &[u8]) -> Self {
        DocumentSource::Bytes(data.to_vec())
    }
}

impl From<&Vec<u8>> for DocumentSource {
    fn from(data: &Vec<u8>) -> Self {
        DocumentSource::Bytes(data.clone())
    }
}

impl From<DocumentHandle> for DocumentSource {
    fn from(document: DocumentHandle) -> Self {
        DocumentSource::Document(document)
    }
}

impl From<&DocumentHandle> for DocumentSource {
    fn from(document: &DocumentHandle) -> Self {
        DocumentSource::Document(document.clone())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted engine for resolver and pipeline tests

    use super::*;
    use crate::error::Error;
    use crate::types::{ImageKind, TextItem};
    use std::collections::HashMap;

    #[derive(Debug, Clone, Default)]
    pub struct FakePage {
        pub texts: Vec<(&'static str, bool)>,
        pub annotations: Vec<Annotation>,
        pub operators: OperatorList,
        pub objects: HashMap<String, ImageObject>,
    }

    #[derive(Debug, Clone, Default)]
    pub struct FakeDocument {
        pub pages: Vec<FakePage>,
        pub metadata: RawMetadata,
        pub common_objects: HashMap<String, ImageObject>,
        pub ops: OpsTable,
    }

    #[derive(Debug, Default)]
    pub struct FakeEngine {
        pub document: FakeDocument,
        pub ops: OpsTable,
    }

    impl FakeEngine {
        pub fn new(document: FakeDocument) -> Self {
            Self {
                document,
                ops: OpsTable::default(),
            }
        }
    }

    pub fn image(width: u32, height: u32, channels: usize) -> ImageObject {
        ImageObject {
            width: Some(width),
            height: Some(height),
            data: Some(vec![7; width as usize * height as usize * channels]),
            kind: Some(ImageKind::Rgba32Bpp),
        }
    }

    #[async_trait]
    impl Engine for FakeEngine {
        fn name(&self) -> &str {
            "fake"
        }

        fn version(&self) -> &str {
            "0.0.0"
        }

        fn ops(&self) -> &OpsTable {
            &self.ops
        }

        async fn get_document(&self, data: Vec<u8>) -> Result<DocumentHandle> {
            if !data.starts_with(b"%PDF") {
                return Err(Error::engine("not a PDF"));
            }
            let mut document = self.document.clone();
            document.ops = self.ops;
            Ok(DocumentHandle::new(document))
        }
    }

    #[async_trait]
    impl EngineDocument for FakeDocument {
        fn num_pages(&self) -> u32 {
            self.pages.len() as u32
        }

        fn ops(&self) -> &OpsTable {
            &self.ops
        }

        async fn get_metadata(&self) -> Result<RawMetadata> {
            Ok(self.metadata.clone())
        }

        async fn get_page(&self, page_number: u32) -> Result<Box<dyn EnginePage>> {
            let page = self
                .pages
                .get(page_number as usize - 1)
                .cloned()
                .ok_or_else(|| Error::engine("no such page"))?;
            Ok(Box::new(NumberedPage {
                number: page_number,
                page,
            }))
        }

        async fn get_common_object(&self, key: &str) -> Result<Option<ImageObject>> {
            Ok(self.common_objects.get(key).cloned())
        }
    }

    struct NumberedPage {
        number: u32,
        page: FakePage,
    }

    #[async_trait]
    impl EnginePage for NumberedPage {
        fn page_number(&self) -> u32 {
            self.number
        }

        fn view_box(&self) -> [f64; 4] {
            [0.0, 0.0, 200.0, 100.0]
        }

        async fn get_operator_list(&self) -> Result<OperatorList> {
            Ok(self.page.operators.clone())
        }

        async fn get_text_content(&self) -> Result<TextContent> {
            let items = self
                .page
                .texts
                .iter()
                .map(|(text, has_eol)| TextItem {
                    str: text.to_string(),
                    has_eol: *has_eol,
                    transform: Default::default(),
                    font_name: None,
                })
                .collect();
            Ok(TextContent { items })
        }

        async fn get_annotations(&self) -> Result<Vec<Annotation>> {
            Ok(self.page.annotations.clone())
        }

        async fn get_object(&self, key: &str) -> Result<Option<ImageObject>> {
            Ok(self.page.objects.get(key).cloned())
        }

        async fn render(&self, target: &mut RenderTarget<'_>, viewport: &Viewport) -> Result<()> {
            target.context.set_transform(&viewport.transform);
            target.context.fill_rect(0.0, 0.0, 200.0, 100.0);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FakeDocument, FakeEngine};
    use super::*;

    #[test]
    fn test_handle_identity() {
        let engine: Arc<dyn Engine> = Arc::new(FakeEngine::default());
        let first = EngineHandle::new(Arc::clone(&engine));
        let second = first.clone();
        let same_engine = EngineHandle::new(Arc::clone(&engine));
        let other = EngineHandle::new(Arc::new(FakeEngine::default()));

        assert!(first.ptr_eq(&second));
        assert!(!first.ptr_eq(&same_engine));
        assert!(!first.ptr_eq(&other));
    }

    #[tokio::test]
    async fn test_document_keeps_engine_ops() {
        let mut engine = FakeEngine::new(FakeDocument::default());
        engine.ops.paint_image_x_object = 999;

        let document = engine.get_document(b"%PDF".to_vec()).await.unwrap();

        assert_eq!(document.ops().paint_image_x_object, 999);
        assert!(document.parse_date("D:2007").is_some());
    }

    #[tokio::test]
    async fn test_document_source_conversions() {
        let bytes = b"%PDF-1.7".to_vec();
        assert!(matches!(DocumentSource::from(&bytes), DocumentSource::Bytes(_)));
        assert!(matches!(DocumentSource::from(&bytes[..]), DocumentSource::Bytes(_)));

        let engine = FakeEngine::new(FakeDocument::default());
        let document = engine.get_document(bytes).await.unwrap();
        assert!(matches!(DocumentSource::from(&document), DocumentSource::Document(_)));
    }

    #[test]
    fn test_default_date_parser() {
        let engine = FakeEngine::default();
        let date = engine.parse_date("D:20070223175637+02'00'").unwrap();
        assert_eq!(date.to_rfc3339(), "2007-02-23T17:56:37+02:00");
    }
}
