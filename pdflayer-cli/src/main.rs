use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use pdflayer_cli::output::{
    default_png_path, load_config, resolve_config_path, write_json, ConfigOrigin,
};
use pdflayer_core::{
    DocumentHandle, MetaOptions, PdfContext, RenderOptions, RenderOutput, TextOptions,
};

#[derive(Parser)]
#[command(name = "pdflayer")]
#[command(about = "Extract text, metadata, links and images from PDFs, and render pages to PNG")]
struct Args {
    /// Path to custom config file (YAML format)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write results to this file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract text per page
    Text {
        input: PathBuf,
        /// Merge all pages into one whitespace-collapsed string
        #[arg(long)]
        merge: bool,
    },
    /// Show the info dictionary and XMP metadata
    Meta {
        input: PathBuf,
        /// Parse creation and modification dates
        #[arg(long)]
        parse_dates: bool,
    },
    /// List link annotation URLs
    Links { input: PathBuf },
    /// List the images painted on a page
    Images {
        input: PathBuf,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
    },
    /// Render a page to PNG
    Render {
        input: PathBuf,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        scale: Option<f64>,
        /// Target width in pixels (overrides --scale)
        #[arg(long)]
        width: Option<f64>,
        /// Target height in pixels (overrides --scale)
        #[arg(long)]
        height: Option<f64>,
        /// Print a data URL instead of writing a PNG file
        #[arg(long)]
        data_url: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref());
    let (config, origin) = load_config(config_path.as_deref());
    match &origin {
        ConfigOrigin::File(path) => eprintln!("📋 Loaded config from: {}", path.display()),
        ConfigOrigin::Fallback { path, error } => eprintln!(
            "⚠️  Could not load config from {} ({}), using defaults",
            path.display(),
            error
        ),
        ConfigOrigin::Default => eprintln!("📋 Using default config"),
    }

    let ctx = PdfContext::with_config(config);
    let output = args.output.as_deref();

    if let Err(e) = run(&ctx, args.command, output).await {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(ctx: &PdfContext, command: Command, output: Option<&Path>) -> Result<()> {
    match command {
        Command::Text { input, merge } => {
            let document = open(ctx, &input).await?;
            let mut options = TextOptions::from(ctx.config());
            options.merge_pages |= merge;
            let text = ctx.extract_text(&document, options).await?;
            write_json(&text, output)
        }
        Command::Meta { input, parse_dates } => {
            let document = open(ctx, &input).await?;
            let mut options = MetaOptions::from(ctx.config());
            options.parse_dates |= parse_dates;
            let meta = ctx.get_meta(&document, options).await?;
            write_json(&meta, output)
        }
        Command::Links { input } => {
            let document = open(ctx, &input).await?;
            let links = ctx.extract_links(&document).await?;
            eprintln!("🔗 {} links across {} pages", links.links.len(), links.total_pages);
            write_json(&links, output)
        }
        Command::Images { input, page } => {
            let document = open(ctx, &input).await?;
            let images = ctx.extract_images(&document, page).await?;
            eprintln!("🖼️  {} images on page {}", images.len(), page);
            write_json(&images, output)
        }
        Command::Render {
            input,
            page,
            scale,
            width,
            height,
            data_url,
        } => {
            let document = open(ctx, &input).await?;
            let mut options = RenderOptions::from(ctx.config());
            if let Some(scale) = scale {
                options.scale = scale;
            }
            options.width = width;
            options.height = height;
            options.to_data_url |= data_url;

            match ctx.render_page_as_image(&document, page, options).await? {
                RenderOutput::DataUrl(url) => {
                    println!("{}", url);
                }
                RenderOutput::Png(png) => {
                    let path = output
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| default_png_path(&input, page));
                    std::fs::write(&path, png)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    eprintln!("💾 Page {} rendered to: {}", page, path.display());
                }
            }
            Ok(())
        }
    }
}

async fn open(ctx: &PdfContext, input: &Path) -> Result<DocumentHandle> {
    let data = std::fs::read(input).with_context(|| format!("failed to read {}", input.display()))?;
    eprintln!("📄 Processing: {}", input.display());
    let document = ctx.open_document(data).await?;
    let engine = ctx.resolved_engine().await?;
    eprintln!(
        "🦀 {} pages, engine {} {}",
        document.num_pages(),
        engine.name(),
        engine.version()
    );
    Ok(document)
}
