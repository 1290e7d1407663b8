//! End-to-end pipeline tests over the bundled engine
//!
//! Fixtures are generated in memory with lopdf (see `common`), so no files
//! are needed on disk.

#![cfg(feature = "lopdf-engine")]

mod common;

use common::{dummy_pdf, image_pdf, links_pdf, LINKS};
use pdflayer_core::error::BoxError;
use pdflayer_core::{
    EngineConfiguration, EngineLoader, Environment, Error, ExtractionConfig, LoadedModule,
    MetaOptions, PageText, PdfContext, RenderOptions, RenderOutput, ResolveOptions,
    ResolverStatus, SurfaceBackend, TextOptions,
};

// ============================================================================
// Fixture helpers
// ============================================================================

fn context() -> PdfContext {
    PdfContext::new_with_dependencies(Environment::unknown(), None, ExtractionConfig::default())
}

// ============================================================================
// Engine resolution
// ============================================================================

#[tokio::test]
async fn test_bundled_engine_is_default() {
    let ctx = context();

    let first = ctx.resolved_engine().await.unwrap();
    let second = ctx.resolved_engine().await.unwrap();

    assert_eq!(first.name(), "lopdf");
    assert!(first.ptr_eq(&second));
    assert_eq!(ctx.resolver().attempts(), 1);
}

#[tokio::test]
async fn test_forced_reload_replaces_handle() {
    let ctx = context();
    let first = ctx.resolved_engine().await.unwrap();

    let reloaded = ctx.resolve_engine(None, ResolveOptions::forced()).await.unwrap();

    assert!(!first.ptr_eq(&reloaded));
    assert!(reloaded.ptr_eq(&ctx.resolved_engine().await.unwrap()));
}

#[tokio::test]
async fn test_malformed_document_is_engine_error() {
    let err = context()
        .extract_text(b"this is not a PDF".to_vec(), TextOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Engine { .. }));
}

// ============================================================================
// Text and metadata
// ============================================================================

#[tokio::test]
async fn test_dummy_pdf_text() {
    let ctx = context();

    let pages = ctx.extract_text(dummy_pdf(), TextOptions::default()).await.unwrap();
    let merged = ctx
        .extract_text(dummy_pdf(), TextOptions { merge_pages: true })
        .await
        .unwrap();

    assert_eq!(pages.total_pages, 1);
    assert_eq!(pages.text, PageText::Pages(vec!["Dummy PDF file".to_string()]));
    assert_eq!(merged.text, PageText::Merged("Dummy PDF file".to_string()));
}

#[tokio::test]
async fn test_dummy_pdf_meta() {
    let ctx = context();

    let plain = ctx.get_meta(dummy_pdf(), MetaOptions::default()).await.unwrap();
    let parsed = ctx
        .get_meta(
            dummy_pdf(),
            MetaOptions {
                parse_dates: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(plain.info["Creator"], "Writer");
    assert_eq!(plain.info["PDFFormatVersion"], "1.4");
    assert_eq!(plain.info["CreationDate"], common::DUMMY_CREATION_DATE);
    assert!(plain.dates.is_none());

    let dates = parsed.dates.unwrap();
    assert_eq!(
        dates.creation_date.map(|d| d.to_rfc3339()).as_deref(),
        Some("2007-02-23T17:56:37+02:00")
    );
    assert_eq!(dates.modification_date, None);
}

// ============================================================================
// Links and images
// ============================================================================

#[tokio::test]
async fn test_links_across_pages() {
    let links = context().extract_links(links_pdf()).await.unwrap();

    assert_eq!(links.total_pages, 2);
    assert_eq!(links.links, LINKS);
}

#[tokio::test]
async fn test_image_extraction() {
    let images = context().extract_images(image_pdf(), 1).await.unwrap();

    assert_eq!(images.len(), 1);
    let image = &images[0];
    assert_eq!((image.width, image.height, image.channels), (2, 2, 3));
    assert_eq!(
        image.data.len(),
        (image.width * image.height) as usize * image.channels as usize
    );
    assert!(image.key.starts_with("g_"));
    assert_eq!(&image.data[..3], &[255, 0, 0]);
}

#[tokio::test]
async fn test_page_out_of_range() {
    let err = context().extract_images(image_pdf(), 2).await.unwrap_err();
    assert!(matches!(err, Error::PageOutOfRange { page: 2, num_pages: 1 }));
}

#[tokio::test]
async fn test_open_document_serves_every_pipeline() {
    let ctx = context();
    let document = ctx.open_document(links_pdf()).await.unwrap();

    let text = ctx.extract_text(&document, TextOptions::default()).await.unwrap();
    let links = ctx.extract_links(&document).await.unwrap();

    assert_eq!(text.total_pages, 2);
    assert_eq!(links.links.len(), 4);
    assert_eq!(ctx.resolver().attempts(), 1);
}

#[tokio::test]
async fn test_open_document_outlives_failed_reconfigure() {
    let ctx = context();
    let document = ctx.open_document(image_pdf()).await.unwrap();

    let gone = EngineLoader::new(|| async { Err::<LoadedModule, BoxError>("gone".into()) });
    let err = ctx
        .configure(EngineConfiguration {
            engine_loader: Some(gone),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::EngineResolution { .. }));
    assert_eq!(ctx.resolver().status(), ResolverStatus::Failed);

    let images = ctx.extract_images(&document, 1).await.unwrap();
    let meta = ctx
        .get_meta(
            &document,
            MetaOptions {
                parse_dates: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(images.len(), 1);
    assert!(meta.dates.is_some());
}

#[tokio::test]
async fn test_oversized_image_declaration_is_skipped() {
    let images = context().extract_images(common::huge_image_pdf(), 1).await.unwrap();
    assert!(images.is_empty());
}

// ============================================================================
// Rendering
// ============================================================================

#[tokio::test]
async fn test_render_without_surface_backend() {
    let mut config = ExtractionConfig::default();
    config.surface.backend = SurfaceBackend::Disabled;
    let ctx = PdfContext::new_with_dependencies(Environment::detect(), None, config);

    let err = ctx
        .render_page_as_image(image_pdf(), 1, RenderOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::UnsupportedEnvironment(_)));
}

#[cfg(feature = "skia")]
#[tokio::test]
async fn test_render_png_with_native_module() {
    use pdflayer_core::surface::NativeModuleLoader;

    let ctx = PdfContext::new_with_dependencies(
        Environment::detect(),
        Some(NativeModuleLoader::skia()),
        ExtractionConfig::default(),
    );

    let png = ctx
        .render_page_as_image(image_pdf(), 1, RenderOptions::default())
        .await
        .unwrap();
    let url = ctx
        .render_page_as_image(
            image_pdf(),
            1,
            RenderOptions {
                width: Some(306.0),
                to_data_url: true,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    match png {
        RenderOutput::Png(bytes) => assert!(bytes.starts_with(b"\x89PNG\r\n\x1a\n")),
        other => panic!("expected PNG bytes, got {:?}", other),
    }
    match url {
        RenderOutput::DataUrl(url) => assert!(url.starts_with("data:image/png;base64,iVBORw0KGgo")),
        other => panic!("expected a data URL, got {:?}", other),
    }
}
