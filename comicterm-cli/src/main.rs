use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::Command as ProcessCommand;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use comicterm_archive::{is_supported_archive, ArchiveCursor};
use comicterm_core::{natural_cmp, project_dirs, Config, ProgressStore, RenderMode, Session, SessionMode};
use comicterm_render::{compute_visible_region, text_art};
use comicterm_tty::{CellGeometry, EventMapper, KittyRenderer, UiEvent};
use crossterm::cursor;
use crossterm::event;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Vertical pixels reserved below the page for the status line.
const STATUS_MARGIN_PX: u32 = 100;

#[derive(Debug, Parser)]
#[command(
    name = "comicterm",
    version,
    about = "terminal comic archive viewer with kitty graphics"
)]
struct Args {
    /// Directory to browse (defaults to the first configured library path,
    /// then the current directory)
    directory: Option<PathBuf>,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, Clear(ClearType::All), cursor::MoveTo(0, 0), cursor::Show);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let dirs = project_dirs()?;
    let _log_guard = init_logging(&dirs)?;

    let mut config = Config::load(&dirs.config_dir().join("config.conf"));
    let mut progress = ProgressStore::load(dirs.data_local_dir().join("progress.json"));

    let start_dir = match args.directory {
        Some(dir) => dir,
        None => config
            .library_paths
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    if !start_dir.is_dir() {
        return Err(anyhow!(
            "invalid directory: {} (set library paths in the config file or pass one as an argument)",
            start_dir.display()
        ));
    }

    let mut listing = Listing::open(start_dir)?;
    let mut session = Session::new();
    let mapper = EventMapper::new(&config);

    let _raw = RawModeGuard::new()?;
    {
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, cursor::Hide)?;
    }
    let mut renderer = KittyRenderer::new(io::stdout());
    let mut dirty = true;

    loop {
        if dirty {
            match session.mode() {
                SessionMode::Listing => draw_listing(&mut renderer, &listing, config.show_help)?,
                SessionMode::Viewing => {
                    draw_view(&mut renderer, &mut session, &mut progress, &config)?
                }
            }
            dirty = false;
        }

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        let ev = event::read()?;
        let ui_event = match session.mode() {
            SessionMode::Listing => mapper.map_listing(&ev),
            SessionMode::Viewing => mapper.map_viewing(&ev),
        };

        match ui_event {
            UiEvent::Quit => break,
            UiEvent::CloseView => {
                session.close();
                dirty = true;
            }
            UiEvent::Refresh => {
                listing.rescan();
                dirty = true;
            }
            UiEvent::ToggleHelp => {
                config.show_help = !config.show_help;
                dirty = true;
            }
            UiEvent::MoveSelection(delta) => {
                dirty = listing.move_selection(delta);
            }
            UiEvent::SelectFirst => {
                dirty = listing.select_first();
            }
            UiEvent::SelectLast => {
                dirty = listing.select_last();
            }
            UiEvent::Activate => {
                activate_selection(&mut listing, &mut session, &mut renderer, &progress, &config)?;
                dirty = true;
            }
            UiEvent::Command(cmd) => {
                dirty = session.apply(cmd);
            }
            UiEvent::Redraw => dirty = true,
            UiEvent::None => {}
        }
    }

    Ok(())
}

fn init_logging(dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "comicterm.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // File only; stdout belongs to the page renderer.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

#[derive(Debug, Clone)]
struct FileEntry {
    name: String,
    path: PathBuf,
    is_directory: bool,
}

/// The directory browser: parent link first, then directories, then
/// archives, each group naturally sorted.
struct Listing {
    dir: PathBuf,
    entries: Vec<FileEntry>,
    selected: usize,
}

impl Listing {
    fn open(dir: PathBuf) -> Result<Self> {
        let mut listing = Self {
            dir,
            entries: Vec::new(),
            selected: 0,
        };
        listing.rescan();
        Ok(listing)
    }

    fn rescan(&mut self) {
        self.entries.clear();

        if let Some(parent) = self.dir.parent() {
            self.entries.push(FileEntry {
                name: "..".to_string(),
                path: parent.to_path_buf(),
                is_directory: true,
            });
        }

        let mut dirs = Vec::new();
        let mut files = Vec::new();
        match fs::read_dir(&self.dir) {
            Ok(iter) => {
                for entry in iter.flatten() {
                    let path = entry.path();
                    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    let entry = FileEntry {
                        name: name.to_string(),
                        path: path.clone(),
                        is_directory: path.is_dir(),
                    };
                    if entry.is_directory {
                        dirs.push(entry);
                    } else if is_supported_archive(&path) {
                        files.push(entry);
                    }
                }
            }
            Err(err) => {
                warn!(dir = %self.dir.display(), %err, "failed to scan directory");
            }
        }

        dirs.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        files.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        self.entries.extend(dirs);
        self.entries.extend(files);

        if self.selected >= self.entries.len() {
            self.selected = 0;
        }
    }

    fn selected_entry(&self) -> Option<&FileEntry> {
        self.entries.get(self.selected)
    }

    fn move_selection(&mut self, delta: isize) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let last = (self.entries.len() - 1) as isize;
        let next = (self.selected as isize + delta).clamp(0, last) as usize;
        if next == self.selected {
            return false;
        }
        self.selected = next;
        true
    }

    fn select_first(&mut self) -> bool {
        if self.selected == 0 {
            return false;
        }
        self.selected = 0;
        true
    }

    fn select_last(&mut self) -> bool {
        let last = self.entries.len().saturating_sub(1);
        if self.selected == last {
            return false;
        }
        self.selected = last;
        true
    }

    fn enter_directory(&mut self, path: PathBuf) {
        self.dir = path;
        self.selected = 0;
        self.rescan();
    }

    fn counts(&self) -> (usize, usize) {
        let folders = self
            .entries
            .iter()
            .filter(|e| e.is_directory && e.name != "..")
            .count();
        let comics = self.entries.iter().filter(|e| !e.is_directory).count();
        (folders, comics)
    }
}

fn activate_selection(
    listing: &mut Listing,
    session: &mut Session,
    renderer: &mut KittyRenderer<io::Stdout>,
    progress: &ProgressStore,
    config: &Config,
) -> Result<()> {
    let Some(entry) = listing.selected_entry().cloned() else {
        return Ok(());
    };

    if entry.is_directory {
        listing.enter_directory(entry.path);
        return Ok(());
    }

    match ArchiveCursor::open(&entry.path) {
        Ok(cursor) => {
            let start_page = progress.get(&entry.name).unwrap_or(0);
            session.open(entry.name, Box::new(cursor), start_page, config.double_page);
        }
        Err(err) => {
            warn!(path = %entry.path.display(), %err, "failed to open archive");
            show_transient_message(renderer, &format!("[Failed to open archive: {}]", err))?;
        }
    }
    Ok(())
}

fn show_transient_message(renderer: &mut KittyRenderer<io::Stdout>, message: &str) -> Result<()> {
    let writer = renderer.writer();
    crossterm::execute!(writer, Print("\r\n"), Print(message), Print("\r\n"))?;
    std::thread::sleep(Duration::from_secs(1));
    Ok(())
}

fn draw_listing(
    renderer: &mut KittyRenderer<io::Stdout>,
    listing: &Listing,
    show_help: bool,
) -> Result<()> {
    renderer.clear_all()?;
    let (_, rows) = terminal::size()?;
    let writer = renderer.writer();

    crossterm::queue!(
        writer,
        Print(format!("comicterm - {}\r\n", listing.dir.display()))
    )?;
    if show_help {
        crossterm::queue!(
            writer,
            Print("Enter=open | r=refresh | g/G=first/last | j/k=down/up | ?=help | q=quit\r\n")
        )?;
    }
    crossterm::queue!(writer, Print("\r\n"))?;

    let lines_available = usize::from(rows).saturating_sub(if show_help { 6 } else { 5 });
    let start = listing.selected.saturating_sub(lines_available / 2);
    let end = listing.entries.len().min(start + lines_available.max(1));

    for (idx, entry) in listing.entries[start..end].iter().enumerate() {
        let prefix = if entry.is_directory { "[d] " } else { "    " };
        if start + idx == listing.selected {
            crossterm::queue!(
                writer,
                SetAttribute(Attribute::Reverse),
                Print(format!("> {}{}", prefix, entry.name)),
                SetAttribute(Attribute::Reset),
                Print("\r\n")
            )?;
        } else {
            crossterm::queue!(writer, Print(format!("  {}{}\r\n", prefix, entry.name)))?;
        }
    }

    let (folders, comics) = listing.counts();
    crossterm::queue!(
        writer,
        Print(format!("\r\n{} folders, {} comics\r\n", folders, comics))
    )?;
    writer.flush()?;
    Ok(())
}

fn draw_view(
    renderer: &mut KittyRenderer<io::Stdout>,
    session: &mut Session,
    progress: &mut ProgressStore,
    config: &Config,
) -> Result<()> {
    renderer.begin_sync_update()?;
    renderer.clear_all()?;

    let window = terminal::window_size()?;
    let geometry = CellGeometry::new(
        window.columns,
        window.rows,
        u32::from(window.width),
        u32::from(window.height),
    );

    let Some(view) = session.view_mut() else {
        renderer.end_sync_update()?;
        return Ok(());
    };
    let page_count = view.page_count();
    let current = view.state.current_page;
    let spread = view.state.effective_double_page(config.render_mode)
        && current + 1 < page_count;

    if spread {
        let half_cols = geometry.cols / 2;
        let half_px = geometry.pixel_width / 2;
        for (offset, page) in [(0u16, current), (half_cols, current + 1)] {
            render_page(renderer, view, config, geometry, offset, half_px, page)?;
        }
    } else {
        render_page(
            renderer,
            view,
            config,
            geometry,
            0,
            geometry.pixel_width,
            current,
        )?;
    }

    draw_view_status(renderer, session, config, geometry)?;
    renderer.end_sync_update()?;

    // Persistence and readahead after the frame is on screen.
    let Some(view) = session.view_mut() else {
        return Ok(());
    };
    if let Err(err) = progress.record(&view.name, view.state.current_page) {
        warn!(%err, "failed to save reading progress");
    }
    view.preload_adjacent();
    Ok(())
}

/// Loads and displays one page, degrading read or decode failures to a
/// placeholder line so navigation keeps working.
fn render_page(
    renderer: &mut KittyRenderer<io::Stdout>,
    view: &mut comicterm_core::ViewInstance,
    config: &Config,
    geometry: CellGeometry,
    col_offset: u16,
    width_px: u32,
    page: usize,
) -> Result<()> {
    let shown = view
        .load_page(page)
        .and_then(|bytes| display_page(renderer, &bytes, view, config, geometry, col_offset, width_px));
    if let Err(err) = shown {
        warn!(page, %err, "failed to render page");
        draw_page_placeholder(renderer, col_offset, page, &err)?;
    }
    Ok(())
}

fn display_page(
    renderer: &mut KittyRenderer<io::Stdout>,
    bytes: &[u8],
    view: &mut comicterm_core::ViewInstance,
    config: &Config,
    geometry: CellGeometry,
    col_offset: u16,
    width_px: u32,
) -> Result<()> {
    match config.render_mode {
        RenderMode::Kitty => {
            display_page_kitty(renderer, bytes, view, geometry, col_offset, width_px)
        }
        RenderMode::Timg => {
            let cols = (width_px / geometry.cell_width()).max(1);
            let rows = u32::from(geometry.rows).saturating_sub(3).max(1);
            display_page_timg(bytes, cols, rows)
        }
        RenderMode::Ascii => display_page_ascii(renderer, bytes, geometry),
    }
}

fn display_page_kitty(
    renderer: &mut KittyRenderer<io::Stdout>,
    bytes: &[u8],
    view: &mut comicterm_core::ViewInstance,
    geometry: CellGeometry,
    col_offset: u16,
    width_px: u32,
) -> Result<()> {
    let target_w = width_px.max(1);
    let target_h = geometry
        .pixel_height
        .saturating_sub(STATUS_MARGIN_PX)
        .max(1);

    let state = &mut view.state;
    let region = compute_visible_region(
        bytes,
        target_w,
        target_h,
        state.zoom,
        state.pan_x,
        state.pan_y,
    )?;
    // The clamped pan becomes the new view state so repeated pans do not
    // accumulate past the edges.
    state.pan_x = region.pan_x;
    state.pan_y = region.pan_y;

    let (cells_w, cells_h) = geometry.cells_for(region.image.width, region.image.height);
    let fit_cols = target_w / geometry.cell_width();
    let fit_rows = target_h / geometry.cell_height();
    let col = u32::from(col_offset) + fit_cols.saturating_sub(cells_w) / 2;
    let row = fit_rows.saturating_sub(cells_h) / 2;

    renderer.move_to(col.min(u16::MAX.into()) as u16, row.min(u16::MAX.into()) as u16)?;
    renderer.draw(&region.image, cells_w, cells_h)?;
    Ok(())
}

fn display_page_timg(bytes: &[u8], cols: u32, rows: u32) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new().context("failed to create temp page file")?;
    tmp.write_all(bytes)
        .context("failed to write temp page file")?;
    tmp.flush()?;

    let status = ProcessCommand::new("timg")
        .arg("-g")
        .arg(format!("{}x{}", cols, rows))
        .arg(tmp.path())
        .status()
        .context("failed to run timg (is it installed?)")?;
    if !status.success() {
        return Err(anyhow!("timg exited with {}", status));
    }
    Ok(())
}

fn display_page_ascii(
    renderer: &mut KittyRenderer<io::Stdout>,
    bytes: &[u8],
    geometry: CellGeometry,
) -> Result<()> {
    let lines = text_art(bytes, geometry.cols, geometry.rows)?;
    let writer = renderer.writer();
    for line in lines {
        crossterm::queue!(writer, Print(line), Print("\r\n"))?;
    }
    writer.flush()?;
    Ok(())
}

fn draw_page_placeholder(
    renderer: &mut KittyRenderer<io::Stdout>,
    col_offset: u16,
    page: usize,
    err: &anyhow::Error,
) -> Result<()> {
    renderer.move_to(col_offset, 1)?;
    let writer = renderer.writer();
    crossterm::queue!(
        writer,
        Print(format!("[Page {} unavailable: {}]", page + 1, err))
    )?;
    writer.flush()?;
    Ok(())
}

fn draw_view_status(
    renderer: &mut KittyRenderer<io::Stdout>,
    session: &Session,
    config: &Config,
    geometry: CellGeometry,
) -> Result<()> {
    let Some(view) = session.view() else {
        return Ok(());
    };

    renderer.move_to(0, geometry.rows.saturating_sub(1))?;
    let writer = renderer.writer();
    crossterm::queue!(writer, Clear(ClearType::CurrentLine))?;

    if config.show_help {
        let page_count = view.page_count();
        let current = view.state.current_page;
        let pages = if view.state.double_page {
            format!(
                "Pages {}-{}/{}",
                current + 1,
                (current + 2).min(page_count),
                page_count
            )
        } else {
            format!("Page {}/{}", current + 1, page_count)
        };
        let zoom = (view.state.zoom * 100.0).round() as u32;
        crossterm::queue!(
            writer,
            Print(format!(
                "{} | Zoom: {}% | =/-=zoom | 0=reset | arrows/hl=nav | Shift+arrows/HJKL=pan | s=spread | q=back",
                pages, zoom
            ))
        )?;
    }
    writer.flush()?;
    Ok(())
}
