use crate::context::PdfContext;
use crate::engine::DocumentSource;
use crate::error::Result;
use crate::types::{ExtractedImage, ImageObject};
use tracing::debug;

/// Keys in the document-wide object namespace carry this prefix
const COMMON_OBJECT_PREFIX: &str = "g_";

impl PdfContext {
    /// Images painted on `page_number`, in paint order
    ///
    /// Channels are derived from the data length; objects whose length is not
    /// an exact 1, 3 or 4 bytes per pixel are skipped.
    pub async fn extract_images(
        &self,
        source: impl Into<DocumentSource>,
        page_number: u32,
    ) -> Result<Vec<ExtractedImage>> {
        let document = self.document(source.into()).await?;
        let page = super::page(&document, page_number).await?;
        let paint_image = document.ops().paint_image_x_object;

        let operators = page.get_operator_list().await?;
        let mut images = Vec::new();
        for (op, args) in operators.iter() {
            if op != paint_image {
                continue;
            }
            let Some(key) = args.first().and_then(|arg| arg.as_name()) else {
                continue;
            };
            let object = if key.starts_with(COMMON_OBJECT_PREFIX) {
                document.get_common_object(key).await?
            } else {
                page.get_object(key).await?
            };
            match object.and_then(|object| extracted(object, key)) {
                Some(image) => images.push(image),
                None => debug!(key, "image object skipped"),
            }
        }
        Ok(images)
    }
}

fn extracted(object: ImageObject, key: &str) -> Option<ExtractedImage> {
    let (data, width, height) = (object.data?, object.width?, object.height?);
    let pixels = width as usize * height as usize;
    if pixels == 0 || data.len() % pixels != 0 {
        return None;
    }
    let channels = match data.len() / pixels {
        channels @ (1 | 3 | 4) => channels as u8,
        _ => return None,
    };
    Some(ExtractedImage {
        data,
        width,
        height,
        channels,
        key: key.to_string(),
    })
}
