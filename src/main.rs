//! Los Libros Reader CLI
//!
//! Drives the reading core against EPUB files on local disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use los_libros_reader::html::plain_text;
use los_libros_reader::session::{FsByteSource, JsonProgressStore};
use los_libros_reader::{
    load_book, paginate, Config, GlyphMetrics, LayoutConfig, ParsedBook, ReadingSession,
    Viewport,
};

#[derive(Parser)]
#[command(name = "los-libros-reader", version, about = "Paginate and read EPUB books")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show metadata, spine warnings and chapters
    Info {
        /// Path to the EPUB file
        book: PathBuf,

        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Paginate a book and list its pages
    Pages {
        book: PathBuf,

        #[command(flatten)]
        layout: LayoutArgs,
    },

    /// Open a reading session, move around and print what is visible
    Read {
        book: PathBuf,

        /// Jump to this 1-based page first
        #[arg(long)]
        page: Option<usize>,

        /// Pages (spreads) to move forward
        #[arg(long, default_value_t = 0)]
        next: usize,

        /// Pages (spreads) to move back
        #[arg(long, default_value_t = 0)]
        prev: usize,

        #[command(flatten)]
        layout: LayoutArgs,
    },
}

/// Layout overrides on top of the configured defaults
#[derive(Args, Debug, Clone)]
struct LayoutArgs {
    #[arg(long)]
    font_size: Option<f32>,

    #[arg(long)]
    line_height: Option<f32>,

    #[arg(long)]
    margin: Option<f32>,

    #[arg(long)]
    font_family: Option<String>,

    /// Show two pages side by side
    #[arg(long)]
    double_page: bool,

    /// Viewport width in px
    #[arg(long)]
    width: Option<f32>,

    /// Viewport height in px
    #[arg(long)]
    height: Option<f32>,
}

impl LayoutArgs {
    fn apply(&self, config: &mut Config) {
        let layout = &mut config.reader.layout;
        if let Some(size) = self.font_size {
            layout.font_size = size;
        }
        if let Some(line_height) = self.line_height {
            layout.line_height = line_height;
        }
        if let Some(margin) = self.margin {
            layout.margin = margin;
        }
        if let Some(family) = &self.font_family {
            layout.font_family = family.clone();
        }
        if self.double_page {
            layout.double_page = true;
        }
        *layout = layout.clone().clamped();

        if let Some(width) = self.width {
            config.reader.viewport.width = width;
        }
        if let Some(height) = self.height {
            config.reader.viewport.height = height;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "los_libros_reader=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let mut config = Config::from_env().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from env: {}, using defaults", e);
        Config::default()
    });

    let cli = Cli::parse();
    match cli.command {
        Command::Info { book, json } => show_info(&book, json).await,
        Command::Pages { book, layout } => {
            layout.apply(&mut config);
            list_pages(&book, &config).await
        }
        Command::Read {
            book,
            page,
            next,
            prev,
            layout,
        } => {
            layout.apply(&mut config);
            read(&book, &config, page, next, prev).await
        }
    }
}

async fn parse_book(path: &Path) -> anyhow::Result<ParsedBook> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let book = tokio::task::spawn_blocking(move || load_book(bytes)).await??;
    Ok(book)
}

async fn show_info(path: &Path, json: bool) -> anyhow::Result<()> {
    let book = parse_book(path).await?;

    if json {
        let chapters: Vec<serde_json::Value> = book
            .chapters
            .iter()
            .map(|c| {
                serde_json::json!({
                    "id": c.id,
                    "title": c.title,
                    "sourcePath": c.source_path,
                    "spineIndex": c.spine_index,
                    "characters": plain_text(&c.content).chars().count(),
                })
            })
            .collect();
        let output = serde_json::json!({
            "metadata": book.metadata,
            "warnings": book.warnings,
            "chapters": chapters,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let meta = &book.metadata;
    println!("File: {}", path.display());
    println!("Title: {}", meta.title);
    println!("Author: {}", meta.author);
    println!("Language: {}", meta.language);
    if let Some(identifier) = &meta.identifier {
        println!("Identifier: {}", identifier);
    }
    if let Some(publisher) = &meta.publisher {
        println!("Publisher: {}", publisher);
    }
    if let Some(cover) = &meta.cover_href {
        println!("Cover: {}", cover);
    }
    for warning in &book.warnings {
        println!("Warning: {}", warning);
    }
    println!("Chapters: {}", book.chapters.len());
    for chapter in &book.chapters {
        println!("  {:>3}. {} ({})", chapter.spine_index + 1, chapter.title, chapter.source_path);
    }

    Ok(())
}

async fn list_pages(path: &Path, config: &Config) -> anyhow::Result<()> {
    let book = parse_book(path).await?;
    let layout: LayoutConfig = config.reader.layout.clone();
    let viewport: Viewport = config.reader.viewport;

    let pages = tokio::task::spawn_blocking(move || {
        paginate(&book.chapters, &layout, &viewport, &GlyphMetrics)
    })
    .await??;

    println!("{} pages", pages.len());
    for (index, page) in pages.iter().enumerate() {
        println!(
            "{:>5}  {:<40}  p{:<3}  {} chars",
            index + 1,
            page.chapter_title,
            page.page_in_chapter,
            plain_text(&page.content).chars().count()
        );
    }

    Ok(())
}

async fn read(
    path: &Path,
    config: &Config,
    page: Option<usize>,
    next: usize,
    prev: usize,
) -> anyhow::Result<()> {
    let book_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .context("Book path has no file name")?;

    let store = Arc::new(JsonProgressStore::open(&config.library.progress_file).await?);
    let record = store
        .record_for(&book_id, &path.to_string_lossy())
        .await;

    let session = ReadingSession::new(
        Arc::new(FsByteSource::new(&config.library.library_dir)),
        store,
        Arc::new(GlyphMetrics),
        config.session_settings(),
    );

    session.open_book(record).await?;

    if let Some(page) = page {
        if page == 0 || page > session.page_count() {
            tracing::warn!("Page {} is out of range (1-{})", page, session.page_count());
        } else {
            session.go_to_page(page - 1);
        }
    }
    for _ in 0..next {
        if !session.go_to_next() {
            break;
        }
    }
    for _ in 0..prev {
        if !session.go_to_prev() {
            break;
        }
    }

    let total = session.page_count();
    for visible in session.visible_pages() {
        println!(
            "--- Page {}/{} - {} ---",
            visible.id + 1,
            total,
            visible.chapter_title
        );
        println!("{}", plain_text(&visible.content));
    }

    if let Some(progress) = session.progress() {
        println!("--- {:.1}% read ---", progress.fraction * 100.0);
    }

    session.close().await;
    Ok(())
}
