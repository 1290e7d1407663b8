use crate::config::{DatePriority, ExtractionConfig};
use crate::context::PdfContext;
use crate::engine::date::parse_xmp_date;
use crate::engine::{DocumentHandle, DocumentSource};
use crate::error::Result;
use crate::types::{DocumentMeta, MetaDates, XmpMetadata};
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetaOptions {
    pub parse_dates: bool,
    pub date_priority: DatePriority,
}

impl From<&ExtractionConfig> for MetaOptions {
    fn from(config: &ExtractionConfig) -> Self {
        Self {
            parse_dates: config.meta.parse_dates,
            date_priority: config.meta.date_priority,
        }
    }
}

impl PdfContext {
    pub async fn get_meta(
        &self,
        source: impl Into<DocumentSource>,
        options: MetaOptions,
    ) -> Result<DocumentMeta> {
        let document = self.document(source.into()).await?;
        let raw = document.get_metadata().await?;
        let metadata = raw.metadata.unwrap_or_default();

        let dates = if options.parse_dates {
            Some(MetaDates {
                creation_date: pick(
                    options.date_priority,
                    info_date(&document, &raw.info, "CreationDate"),
                    xmp_date(&metadata, "xmp:createdate"),
                ),
                modification_date: pick(
                    options.date_priority,
                    info_date(&document, &raw.info, "ModDate"),
                    xmp_date(&metadata, "xmp:modifydate"),
                ),
            })
        } else {
            None
        };

        Ok(DocumentMeta {
            info: raw.info,
            metadata,
            dates,
        })
    }
}

fn info_date(document: &DocumentHandle, info: &Map<String, Value>, key: &str) -> Option<DateTime<FixedOffset>> {
    document.parse_date(info.get(key)?.as_str()?)
}

fn xmp_date(metadata: &XmpMetadata, key: &str) -> Option<DateTime<FixedOffset>> {
    parse_xmp_date(metadata.get(key)?.as_text()?)
}

fn pick(
    priority: DatePriority,
    info: Option<DateTime<FixedOffset>>,
    xmp: Option<DateTime<FixedOffset>>,
) -> Option<DateTime<FixedOffset>> {
    match priority {
        DatePriority::Xmp => xmp.or(info),
        DatePriority::Info => info.or(xmp),
    }
}
