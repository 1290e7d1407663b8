use crate::config::ExtractionConfig;
use crate::context::PdfContext;
use crate::engine::{DocumentHandle, DocumentSource};
use crate::error::Result;
use crate::types::{ExtractedText, PageText, TextContent};
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextOptions {
    /// One string for the whole document, whitespace runs collapsed
    pub merge_pages: bool,
}

impl From<&ExtractionConfig> for TextOptions {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            merge_pages: config.text.merge_pages,
        }
    }
}

impl PdfContext {
    pub async fn extract_text(
        &self,
        source: impl Into<DocumentSource>,
        options: TextOptions,
    ) -> Result<ExtractedText> {
        let document = self.document(source.into()).await?;
        let pages = page_texts(&document).await?;
        let total_pages = document.num_pages();

        let text = if options.merge_pages {
            PageText::Merged(collapse_whitespace(&pages.join("\n")))
        } else {
            PageText::Pages(pages)
        };
        Ok(ExtractedText { total_pages, text })
    }
}

async fn page_texts(document: &DocumentHandle) -> Result<Vec<String>> {
    let mut pages = Vec::with_capacity(document.num_pages() as usize);
    for page_number in 1..=document.num_pages() {
        let page = super::page(document, page_number).await?;
        pages.push(join_items(&page.get_text_content().await?));
    }
    Ok(pages)
}

fn join_items(content: &TextContent) -> String {
    let mut text = String::new();
    for item in &content.items {
        text.push_str(&item.str);
        if item.has_eol {
            text.push('\n');
        }
    }
    text
}

static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{FakeDocument, FakePage};
    use crate::pipelines::testing::context_with;

    async fn context() -> PdfContext {
        context_with(FakeDocument {
            pages: two_pages(),
            ..Default::default()
        })
        .await
    }

    fn two_pages() -> Vec<FakePage> {
        vec![
            FakePage {
                texts: vec![("Dummy", false), (" PDF", true), ("file", false)],
                ..Default::default()
            },
            FakePage {
                texts: vec![("  second\tpage ", true)],
                ..Default::default()
            },
        ]
    }

    #[tokio::test]
    async fn test_per_page_text() {
        let ctx = context().await;

        let result = ctx.extract_text(b"%PDF".to_vec(), TextOptions::default()).await.unwrap();

        assert_eq!(result.total_pages, 2);
        assert_eq!(
            result.text,
            PageText::Pages(vec!["Dummy PDF\nfile".into(), "  second\tpage \n".into()])
        );
    }

    #[tokio::test]
    async fn test_merged_text_collapses_whitespace() {
        let ctx = context().await;

        let result = ctx
            .extract_text(b"%PDF".to_vec(), TextOptions { merge_pages: true })
            .await
            .unwrap();

        assert_eq!(result.text, PageText::Merged("Dummy PDF file second page ".into()));
    }

    #[tokio::test]
    async fn test_open_document_is_reused() {
        let ctx = context().await;
        let document = ctx.open_document(b"%PDF".to_vec()).await.unwrap();

        let first = ctx.extract_text(&document, TextOptions::default()).await.unwrap();
        let second = ctx.extract_text(&document, TextOptions::default()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(ctx.resolver().attempts(), 1);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = ExtractionConfig::default();
        config.text.merge_pages = true;
        assert!(TextOptions::from(&config).merge_pages);
    }
}
