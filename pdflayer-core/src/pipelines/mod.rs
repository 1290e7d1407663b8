//! Extraction pipelines
//!
//! Every pipeline takes a [`DocumentSource`], resolving the engine first when
//! it is given bytes, and validates page numbers before asking for a page.

mod images;
mod links;
mod meta;
mod render;
mod text;

pub use meta::MetaOptions;
pub use render::RenderOptions;
pub use text::TextOptions;

use crate::context::PdfContext;
use crate::engine::{DocumentHandle, DocumentSource, EnginePage};
use crate::error::{Error, Result};

impl PdfContext {
    /// The document behind `source`, opened with the active engine if needed
    pub(crate) async fn document(&self, source: DocumentSource) -> Result<DocumentHandle> {
        match source {
            DocumentSource::Document(document) => Ok(document),
            DocumentSource::Bytes(data) => self.open_document(data).await,
        }
    }
}

pub(crate) async fn page(document: &DocumentHandle, page_number: u32) -> Result<Box<dyn EnginePage>> {
    let num_pages = document.num_pages();
    if page_number == 0 || page_number > num_pages {
        return Err(Error::PageOutOfRange {
            page: page_number,
            num_pages,
        });
    }
    document.get_page(page_number).await
}


#[cfg(test)]
mod tests {
    use super::testing::context_with;
    use super::*;
    use crate::engine::testing::{FakeDocument, FakePage};

    #[tokio::test]
    async fn test_page_numbers_are_validated() {
        let ctx = context_with(FakeDocument {
            pages: vec![FakePage::default()],
            ..Default::default()
        })
        .await;
        let document = ctx.open_document(b"%PDF".to_vec()).await.unwrap();

        assert!(page(&document, 1).await.is_ok());
        for page_number in [0, 2] {
            assert!(matches!(
                page(&document, page_number).await.err(),
                Some(Error::PageOutOfRange { num_pages: 1, .. })
            ));
        }
    }
}
