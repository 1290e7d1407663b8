use crate::context::PdfContext;
use crate::engine::DocumentSource;
use crate::error::Result;
use crate::types::ExtractedLinks;

const LINK_SUBTYPE: &str = "Link";

impl PdfContext {
    /// URLs of every link annotation, in page order
    pub async fn extract_links(&self, source: impl Into<DocumentSource>) -> Result<ExtractedLinks> {
        let document = self.document(source.into()).await?;
        let total_pages = document.num_pages();

        let mut links = Vec::new();
        for page_number in 1..=total_pages {
            let page = super::page(&document, page_number).await?;
            links.extend(
                page.get_annotations()
                    .await?
                    .into_iter()
                    .filter(|annotation| annotation.subtype == LINK_SUBTYPE)
                    .filter_map(|annotation| annotation.url)
                    .filter(|url| !url.is_empty()),
            );
        }

        Ok(ExtractedLinks { total_pages, links })
    }
}
