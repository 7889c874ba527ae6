use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inkmark_core::{
    AnnotationRepository, AnnotationSession, Category, Marker, MarkerDraft, MarkerId,
    SessionConfig, SessionEvent, UnitRect,
};
use inkmark_render::PageRasterizer;
use inkmark_storage::{sidecar_path, JsonFileRepository, Storage};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

type CliSession = AnnotationSession<JsonFileRepository, Box<dyn PageRasterizer>>;

#[derive(Debug, Parser)]
#[command(name = "inkmark")]
#[command(about = "Numbered margin markers and ink for PDF pages")]
pub struct Cli {
    /// Session configuration as JSON.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log progress to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable page geometry.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Render a page with its annotations to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        /// Zoom factor; defaults to the saved viewer preference.
        #[arg(long)]
        zoom: Option<f32>,
        /// Marker to draw as selected.
        #[arg(long, value_name = "ID")]
        selected: Option<MarkerId>,
        #[arg(long, value_name = "PATH")]
        store: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// List markers as JSON.
    Markers {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        /// Only markers of this page.
        #[arg(long)]
        page: Option<u32>,
        #[arg(long, value_name = "PATH")]
        store: Option<PathBuf>,
    },
    /// Add a numbered marker anchored to a region of a page.
    AddMarker {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        page: u32,
        /// Defaults to the smallest index free on the page.
        #[arg(long)]
        index: Option<u32>,
        #[arg(long, default_value_t = Category::Note)]
        category: Category,
        #[arg(long, default_value = "")]
        label: String,
        /// Anchor region in page units: x,y,width,height.
        #[arg(long, value_parser = parse_rect)]
        rect: UnitRect,
        /// Text the marker refers to.
        #[arg(long)]
        text: Option<String>,
        #[arg(long, value_name = "PATH")]
        store: Option<PathBuf>,
    },
    /// Remove all ink from a page.
    ClearInk {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        page: u32,
        #[arg(long, value_name = "PATH")]
        store: Option<PathBuf>,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    page: u32,
    width_pt: f32,
    height_pt: f32,
    rotation: u32,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { file } => run_info(&file),
        Commands::Render { file, page, zoom, selected, store, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_render(&file, page, zoom, selected, store, output.as_deref(), config)
        }
        Commands::Markers { file, page, store } => run_markers(&file, page, store),
        Commands::AddMarker { file, page, index, category, label, rect, text, store } => {
            let config = load_config(cli.config.as_deref())?;
            let draft = MarkerDraft {
                page_number: page,
                index_number: index.unwrap_or(0),
                anchor_region: rect,
                trigger_text: text,
                label,
                category,
            };
            run_add_marker(&file, draft, index.is_none(), store, config)
        }
        Commands::ClearInk { file, page, store } => {
            let config = load_config(cli.config.as_deref())?;
            run_clear_ink(&file, page, store, config)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "info" } else { "warn" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}

fn load_config(path: Option<&Path>) -> Result<SessionConfig> {
    let Some(path) = path else {
        return Ok(SessionConfig::default());
    };

    let bytes =
        fs::read(path).with_context(|| format!("failed to read config {}", path.display()))?;
    let config: SessionConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config.validate().with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}

fn run_info(file: &Path) -> Result<()> {
    let rasterizer = open_pdf(file)?;

    let page_count = rasterizer.page_count();
    let pages = (0..page_count)
        .map(|index| -> Result<PageOutput> {
            let info = rasterizer.page_info(index)?;
            Ok(PageOutput {
                page: index + 1,
                width_pt: info.width_pt,
                height_pt: info.height_pt,
                rotation: info.rotation.degrees(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let payload = InfoOutput { path: file.display().to_string(), page_count, pages };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");

    Ok(())
}

fn run_render(
    file: &Path,
    page: u32,
    zoom: Option<f32>,
    selected: Option<MarkerId>,
    store: Option<PathBuf>,
    output: Option<&Path>,
    config: SessionConfig,
) -> Result<()> {
    let zoom = zoom.unwrap_or_else(preferred_zoom);
    let mut session = open_session(file, store, config)?;

    session.set_zoom(zoom);
    show_page(&mut session, page)?;
    if selected.is_some() {
        session.select_marker(selected);
    }

    let image = session
        .composite()
        .context("no page was rendered")?
        .context("failed to paint annotations")?;

    let output = output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }

    image
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());

    Ok(())
}

fn run_markers(file: &Path, page: Option<u32>, store: Option<PathBuf>) -> Result<()> {
    ensure_pdf_exists(file)?;
    let repository = open_store(file, store)?;

    let markers: Vec<Marker> = match page {
        Some(page) => repository.list_markers(page)?,
        None => repository.records().markers.clone(),
    };

    let json = serde_json::to_string_pretty(&markers)?;
    println!("{json}");

    Ok(())
}

fn run_add_marker(
    file: &Path,
    mut draft: MarkerDraft,
    pick_index: bool,
    store: Option<PathBuf>,
    config: SessionConfig,
) -> Result<()> {
    let mut session = open_session(file, store, config)?;

    let page_count = session.page_count();
    if draft.page_number == 0 || draft.page_number > page_count {
        anyhow::bail!("--page {} is out of range (page_count={page_count})", draft.page_number);
    }
    if pick_index {
        draft.index_number = session.next_free_index(draft.page_number)?;
    }

    let marker = session.create_marker(draft).context("failed to add marker")?;

    let json = serde_json::to_string_pretty(&marker)?;
    println!("{json}");

    Ok(())
}

fn run_clear_ink(
    file: &Path,
    page: u32,
    store: Option<PathBuf>,
    config: SessionConfig,
) -> Result<()> {
    let mut session = open_session(file, store, config)?;
    show_page(&mut session, page)?;

    let removed = session.clear_page_strokes();
    println!("{removed}");

    Ok(())
}

fn open_session(file: &Path, store: Option<PathBuf>, config: SessionConfig) -> Result<CliSession> {
    let rasterizer = open_pdf(file)?;
    let repository = open_store(file, store)?;

    AnnotationSession::new(rasterizer, repository, config).context("invalid session config")
}

/// Navigate to `page` and block until it is on screen.
fn show_page(session: &mut CliSession, page: u32) -> Result<()> {
    session.set_page(page).with_context(|| {
        format!("--page {page} is out of range (page_count={})", session.page_count())
    })?;
    session.wait_for_render();

    for event in session.drain_events() {
        if let SessionEvent::RenderFailed { page_number, message } = event {
            anyhow::bail!("failed to render page {page_number}: {message}");
        }
    }
    if session.page_state().map(|state| state.page_number) != Some(page) {
        anyhow::bail!("page {page} did not render");
    }

    Ok(())
}

fn open_pdf(file: &Path) -> Result<Box<dyn PageRasterizer>> {
    ensure_pdf_exists(file)?;

    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    inkmark_render::open_document(bytes).context("failed to open PDF")
}

fn open_store(file: &Path, store: Option<PathBuf>) -> Result<JsonFileRepository> {
    let path = store.unwrap_or_else(|| sidecar_path(file));
    JsonFileRepository::open(&path)
        .with_context(|| format!("failed to load annotations from {}", path.display()))
}

/// Saved zoom, or 1.0 when preferences are unavailable.
fn preferred_zoom() -> f32 {
    let storage = match std::env::var_os("INKMARK_DATA_DIR") {
        Some(root) => Ok(Storage::with_root(root)),
        None => Storage::from_default_project(),
    };

    match storage.and_then(|storage| storage.load_preferences()) {
        Ok(preferences) => preferences.zoom,
        Err(err) => {
            log::debug!("using default zoom: {err}");
            1.0
        }
    }
}

fn parse_rect(value: &str) -> Result<UnitRect, String> {
    let parts = value
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| format!("expected x,y,width,height: {err}"))?;

    match parts.as_slice() {
        &[x, y, width, height] => Ok(UnitRect::new(x, y, width, height)),
        _ => Err(format!("expected 4 comma-separated numbers, got {}", parts.len())),
    }
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-p{page}.png"))
}
