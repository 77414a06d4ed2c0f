use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const ZOOM_MIN: f32 = 0.5;
pub const ZOOM_MAX: f32 = 3.0;
pub const ZOOM_STEP: f32 = 0.1;
pub const ZOOM_EPSILON: f32 = 0.001;
pub const PAN_STEP: i32 = 50;

/// Pages further than this from the most recently loaded index are evicted.
pub const CACHE_WINDOW: usize = 2;

/// Compares names the way a human reads them: embedded digit runs are
/// compared by numeric magnitude instead of character order, so "page9"
/// sorts before "page10". Leading zeros do not affect magnitude; when every
/// compared position is equal the shorter string sorts first.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0usize, 0usize);

    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let end_a = digit_run_end(a, i);
            let end_b = digit_run_end(b, j);
            match compare_digit_runs(&a[i..end_a], &b[j..end_b]) {
                Ordering::Equal => {
                    i = end_a;
                    j = end_b;
                }
                unequal => return unequal,
            }
        } else {
            match a[i].cmp(&b[j]) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                unequal => return unequal,
            }
        }
    }

    a.len().cmp(&b.len())
}

fn digit_run_end(bytes: &[u8], start: usize) -> usize {
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    end
}

fn compare_digit_runs(a: &[u8], b: &[u8]) -> Ordering {
    let a = &a[a.iter().take_while(|&&c| c == b'0').count()..];
    let b = &b[b.iter().take_while(|&&c| c == b'0').count()..];
    // With leading zeros stripped, a longer run is a larger number and equal
    // lengths compare digit-by-digit.
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// One image-bearing entry of an open archive, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEntry {
    pub name: String,
    /// Position of the entry in container order, used to drive the
    /// forward-only cursor.
    pub archive_index: usize,
}

/// Raw RGB8 pixels of a rendered page region.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Random-access facade over a forward-only page container.
pub trait PageSource {
    fn page_count(&self) -> usize;
    fn entries(&self) -> &[PageEntry];
    /// Returns the still-encoded bytes of the page at the given logical
    /// (display-order) index.
    fn read_page(&mut self, logical_index: usize) -> Result<Vec<u8>>;
}

/// Bounded page-byte cache keyed by logical index. Eviction is purely by
/// numeric distance from the most recently loaded index, not by recency:
/// jumping far away collapses the cache to the new neighborhood on the very
/// next insert.
#[derive(Debug, Default)]
pub struct PageCache {
    entries: HashMap<usize, Vec<u8>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_load(&mut self, index: usize, source: &mut dyn PageSource) -> Result<Vec<u8>> {
        if let Some(bytes) = self.entries.get(&index) {
            return Ok(bytes.clone());
        }

        let bytes = source.read_page(index)?;
        self.entries
            .retain(|&cached, _| cached.abs_diff(index) <= CACHE_WINDOW);
        self.entries.insert(index, bytes.clone());
        Ok(bytes)
    }

    pub fn preload_adjacent(&mut self, current: usize, source: &mut dyn PageSource) {
        if current + 1 < source.page_count() {
            if let Err(err) = self.get_or_load(current + 1, source) {
                warn!(page = current + 1, %err, "failed to preload next page");
            }
        }
        if let Some(prev) = current.checked_sub(1) {
            if let Err(err) = self.get_or_load(prev, source) {
                warn!(page = prev, %err, "failed to preload previous page");
            }
        }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn cached_indices(&self) -> Vec<usize> {
        self.entries.keys().copied().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Which renderer turns a visible region into terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    #[default]
    Kitty,
    Timg,
    Ascii,
}

impl RenderMode {
    fn from_config_value(value: &str) -> Self {
        match value {
            "timg" => RenderMode::Timg,
            "ascii" => RenderMode::Ascii,
            _ => RenderMode::Kitty,
        }
    }
}

/// Zoom, pan and layout state of the currently viewed document. Pan is
/// re-clamped on every render because the valid range depends on the current
/// zoom and the decoded image size.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub current_page: usize,
    pub zoom: f32,
    pub pan_x: i32,
    pub pan_y: i32,
    pub double_page: bool,
}

impl ViewState {
    pub fn new(double_page: bool) -> Self {
        Self {
            current_page: 0,
            zoom: 1.0,
            pan_x: 0,
            pan_y: 0,
            double_page,
        }
    }

    pub fn is_zoomed(&self) -> bool {
        (self.zoom - 1.0).abs() >= ZOOM_EPSILON
    }

    /// Double-page composition silently degrades to single page whenever the
    /// view is zoomed or the backend is the text-art fallback, regardless of
    /// the stored preference.
    pub fn effective_double_page(&self, mode: RenderMode) -> bool {
        self.double_page && !self.is_zoomed() && mode != RenderMode::Ascii
    }

    pub fn navigation_step(&self) -> usize {
        if self.double_page {
            2
        } else {
            1
        }
    }
}

/// Navigation and view commands applied to the active document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    NextPage,
    PrevPage,
    FirstPage,
    LastPage,
    ZoomIn,
    ZoomOut,
    ZoomReset,
    Pan { dx: i32, dy: i32 },
    ToggleSpread,
}

pub struct ViewInstance {
    pub name: String,
    pub source: Box<dyn PageSource>,
    pub cache: PageCache,
    pub state: ViewState,
}

impl ViewInstance {
    pub fn load_page(&mut self, index: usize) -> Result<Vec<u8>> {
        self.cache.get_or_load(index, self.source.as_mut())
    }

    pub fn preload_adjacent(&mut self) {
        let current = self.state.current_page;
        self.cache.preload_adjacent(current, self.source.as_mut());
    }

    pub fn page_count(&self) -> usize {
        self.source.page_count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Listing,
    Viewing,
}

/// Single active document session. Opening a new document destroys the
/// previous one: the archive handle is dropped and the cache cleared.
#[derive(Default)]
pub struct Session {
    view: Option<ViewInstance>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> SessionMode {
        if self.view.is_some() {
            SessionMode::Viewing
        } else {
            SessionMode::Listing
        }
    }

    pub fn open(
        &mut self,
        name: String,
        source: Box<dyn PageSource>,
        start_page: usize,
        double_page: bool,
    ) {
        let page_count = source.page_count();
        let mut state = ViewState::new(double_page);
        if start_page < page_count {
            state.current_page = start_page;
        }
        self.view = Some(ViewInstance {
            name,
            source,
            cache: PageCache::new(),
            state,
        });
    }

    pub fn close(&mut self) {
        if let Some(view) = self.view.as_mut() {
            view.cache.clear();
        }
        self.view = None;
    }

    pub fn view(&self) -> Option<&ViewInstance> {
        self.view.as_ref()
    }

    pub fn view_mut(&mut self) -> Option<&mut ViewInstance> {
        self.view.as_mut()
    }

    /// Applies a command to the active view. Returns true when the screen
    /// must be redrawn.
    pub fn apply(&mut self, command: Command) -> bool {
        let Some(view) = self.view.as_mut() else {
            return false;
        };
        let page_count = view.source.page_count();
        let state = &mut view.state;
        let step = state.navigation_step();

        match command {
            Command::NextPage => {
                if state.current_page + step < page_count {
                    state.current_page += step;
                    true
                } else {
                    false
                }
            }
            Command::PrevPage => {
                if state.current_page > 0 {
                    state.current_page = state.current_page.saturating_sub(step);
                    true
                } else {
                    false
                }
            }
            Command::FirstPage => {
                state.current_page = 0;
                true
            }
            Command::LastPage => {
                state.current_page = page_count.saturating_sub(1);
                true
            }
            Command::ZoomIn => {
                state.zoom = (state.zoom + ZOOM_STEP).min(ZOOM_MAX);
                true
            }
            Command::ZoomOut => {
                state.zoom = (state.zoom - ZOOM_STEP).max(ZOOM_MIN);
                true
            }
            Command::ZoomReset => {
                state.zoom = 1.0;
                state.pan_x = 0;
                state.pan_y = 0;
                true
            }
            Command::Pan { dx, dy } => {
                // Nothing to pan at fit scale.
                if !state.is_zoomed() {
                    return false;
                }
                state.pan_x += dx;
                state.pan_y += dy;
                true
            }
            Command::ToggleSpread => {
                state.double_page = !state.double_page;
                true
            }
        }
    }
}

/// On-disk shape of the progress file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedProgress {
    pages: HashMap<String, usize>,
}

/// Persisted "display name -> last viewed page" map, rewritten after every
/// page render. Malformed or missing state loads as empty, never an error.
pub struct ProgressStore {
    path: PathBuf,
    state: PersistedProgress,
}

impl ProgressStore {
    pub fn load(path: PathBuf) -> Self {
        let state = match File::open(&path) {
            Ok(mut file) => {
                let mut buf = String::new();
                match file.read_to_string(&mut buf) {
                    Ok(_) => serde_json::from_str(&buf).unwrap_or_else(|err| {
                        warn!(path = %path.display(), %err, "ignoring malformed progress file");
                        PersistedProgress::default()
                    }),
                    Err(err) => {
                        warn!(path = %path.display(), %err, "failed to read progress file");
                        PersistedProgress::default()
                    }
                }
            }
            Err(_) => PersistedProgress::default(),
        };
        Self { path, state }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.state.pages.get(name).copied()
    }

    pub fn record(&mut self, name: &str, page: usize) -> Result<()> {
        self.state.pages.insert(name.to_string(), page);
        self.save()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("failed to create {:?}", parent))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let payload = serde_json::to_string_pretty(&self.state)?;
        let mut file =
            File::create(&tmp).with_context(|| format!("failed to open temp file {:?}", tmp))?;
        file.write_all(payload.as_bytes())?;
        file.flush()?;
        fs::rename(tmp, &self.path)?;
        Ok(())
    }
}

static DEFAULT_KEYMAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("quit", "q"),
        ("refresh", "r"),
        ("toggle_help", "?"),
        ("first_page", "g"),
        ("last_page", "G"),
        ("next", "l"),
        ("prev", "h"),
        ("up", "k"),
        ("down", "j"),
        ("zoom_in", "="),
        ("zoom_out", "-"),
        ("zoom_out_alt", "_"),
        ("zoom_reset", "0"),
        ("pan_up", "K"),
        ("pan_down", "J"),
        ("pan_left", "H"),
        ("pan_right", "L"),
        ("toggle_spread", "s"),
        ("double_page", "d"),
    ])
});

/// Startup configuration. Built once from the key/value config file and never
/// mutated afterward; the runtime-togglable bits (double page, help) are
/// copied into session state at open time.
#[derive(Debug, Clone)]
pub struct Config {
    pub render_mode: RenderMode,
    pub double_page: bool,
    pub show_help: bool,
    pub library_paths: Vec<PathBuf>,
    keymap: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            render_mode: RenderMode::Kitty,
            double_page: false,
            show_help: false,
            library_paths: Vec::new(),
            keymap: DEFAULT_KEYMAP
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

impl Config {
    /// Parses the `key = value` config file. A missing or unreadable file
    /// yields the defaults; unrecognized keys are keymap overrides.
    pub fn load(path: &Path) -> Self {
        let mut config = Self::default();
        let Ok(contents) = fs::read_to_string(path) else {
            return config;
        };
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            config.apply_entry(key.trim(), value.trim());
        }
        config
    }

    fn apply_entry(&mut self, key: &str, value: &str) {
        match key {
            "double_page" => self.double_page = parse_bool(value),
            "show_help" => self.show_help = parse_bool(value),
            "render_mode" => self.render_mode = RenderMode::from_config_value(value),
            "library" => self.library_paths.push(PathBuf::from(value)),
            _ => {
                self.keymap.insert(key.to_string(), value.to_string());
            }
        }
    }

    pub fn set_binding(&mut self, action: &str, key: &str) {
        self.keymap.insert(action.to_string(), key.to_string());
    }

    /// The key bound to a navigation action, falling back to the built-in
    /// default when the action is unknown.
    pub fn binding(&self, action: &str) -> &str {
        self.keymap
            .get(action)
            .map(String::as_str)
            .or_else(|| DEFAULT_KEYMAP.get(action).copied())
            .unwrap_or("")
    }
}

fn parse_bool(value: &str) -> bool {
    value == "true" || value == "1"
}

/// Platform directories for config, progress state and logs.
pub fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("net", "comicterm", "comicterm")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordered(names: &[&str]) -> Vec<String> {
        let mut names: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        names.sort_by(|a, b| natural_cmp(a, b));
        names
    }

    #[test]
    fn natural_ordering_ranks_numeric_runs_by_magnitude() {
        assert_eq!(natural_cmp("page9", "page10"), Ordering::Less);
        assert_eq!(natural_cmp("page10", "page9"), Ordering::Greater);
        assert_eq!(natural_cmp("page2", "page2"), Ordering::Equal);
    }

    #[test]
    fn natural_ordering_ignores_leading_zeros_and_breaks_ties_by_length() {
        // Same magnitude; the shorter spelling sorts first.
        assert_eq!(natural_cmp("page10", "page010"), Ordering::Less);
        assert_eq!(natural_cmp("page010", "page10"), Ordering::Greater);
        assert_eq!(natural_cmp("page009", "page10"), Ordering::Less);
    }

    #[test]
    fn natural_ordering_falls_back_to_lexical_comparison() {
        assert_eq!(natural_cmp("alpha", "beta"), Ordering::Less);
        assert_eq!(natural_cmp("a1x", "a1y"), Ordering::Less);
        assert_eq!(natural_cmp("abc", "abcd"), Ordering::Less);
    }

    #[test]
    fn archive_entry_scenario_sorts_naturally() {
        assert_eq!(
            ordered(&["p2.jpg", "p10.jpg", "p1.jpg"]),
            vec!["p1.jpg", "p2.jpg", "p10.jpg"]
        );
    }

    struct FakeSource {
        pages: usize,
        reads: Vec<usize>,
        fail_on: Option<usize>,
    }

    impl FakeSource {
        fn new(pages: usize) -> Self {
            Self {
                pages,
                reads: Vec::new(),
                fail_on: None,
            }
        }
    }

    impl PageSource for FakeSource {
        fn page_count(&self) -> usize {
            self.pages
        }

        fn entries(&self) -> &[PageEntry] {
            &[]
        }

        fn read_page(&mut self, logical_index: usize) -> Result<Vec<u8>> {
            if logical_index >= self.pages {
                anyhow::bail!("page {} out of range", logical_index);
            }
            if self.fail_on == Some(logical_index) {
                anyhow::bail!("entry {} is corrupt", logical_index);
            }
            self.reads.push(logical_index);
            Ok(vec![logical_index as u8])
        }
    }

    #[test]
    fn cache_keeps_only_the_proximity_window() {
        let mut source = FakeSource::new(50);
        let mut cache = PageCache::new();
        for page in 0..=4 {
            cache.get_or_load(page, &mut source).unwrap();
        }
        cache.get_or_load(40, &mut source).unwrap();

        let mut kept = cache.cached_indices();
        kept.sort_unstable();
        assert_eq!(kept, vec![40]);

        cache.preload_adjacent(40, &mut source);
        let mut kept = cache.cached_indices();
        kept.sort_unstable();
        assert_eq!(kept, vec![39, 40, 41]);
    }

    #[test]
    fn cache_serves_repeated_reads_without_touching_the_source() {
        let mut source = FakeSource::new(10);
        let mut cache = PageCache::new();
        cache.get_or_load(3, &mut source).unwrap();
        cache.get_or_load(3, &mut source).unwrap();
        assert_eq!(source.reads, vec![3]);
    }

    #[test]
    fn cache_window_invariant_holds_after_every_load() {
        let mut source = FakeSource::new(100);
        let mut cache = PageCache::new();
        for &page in &[0, 1, 2, 7, 8, 3, 99, 98] {
            cache.get_or_load(page, &mut source).unwrap();
            for cached in cache.cached_indices() {
                assert!(
                    cached.abs_diff(page) <= CACHE_WINDOW,
                    "page {} survived a load of {}",
                    cached,
                    page
                );
            }
        }
    }

    #[test]
    fn preload_failure_is_not_fatal() {
        let mut source = FakeSource::new(10);
        source.fail_on = Some(5);
        let mut cache = PageCache::new();
        cache.preload_adjacent(4, &mut source);
        assert!(cache.contains(3));
        assert!(!cache.contains(5));
    }

    fn viewing_session(pages: usize, double_page: bool) -> Session {
        let mut session = Session::new();
        session.open(
            "test.cbz".to_string(),
            Box::new(FakeSource::new(pages)),
            0,
            double_page,
        );
        session
    }

    #[test]
    fn session_mode_tracks_open_document() {
        let mut session = Session::new();
        assert_eq!(session.mode(), SessionMode::Listing);
        session.open("a.cbz".into(), Box::new(FakeSource::new(3)), 0, false);
        assert_eq!(session.mode(), SessionMode::Viewing);
        session.close();
        assert_eq!(session.mode(), SessionMode::Listing);
    }

    #[test]
    fn navigation_clamps_to_document_bounds() {
        let mut session = viewing_session(3, false);
        assert!(session.apply(Command::NextPage));
        assert!(session.apply(Command::NextPage));
        assert!(!session.apply(Command::NextPage));
        assert_eq!(session.view().unwrap().state.current_page, 2);
        assert!(session.apply(Command::FirstPage));
        assert!(!session.apply(Command::PrevPage));
    }

    #[test]
    fn double_page_navigation_moves_two_pages() {
        let mut session = viewing_session(10, true);
        session.apply(Command::NextPage);
        assert_eq!(session.view().unwrap().state.current_page, 2);
        session.apply(Command::PrevPage);
        assert_eq!(session.view().unwrap().state.current_page, 0);
    }

    #[test]
    fn zoom_clamps_to_configured_range() {
        let mut session = viewing_session(3, false);
        for _ in 0..40 {
            session.apply(Command::ZoomIn);
        }
        assert!((session.view().unwrap().state.zoom - ZOOM_MAX).abs() < 1e-4);
        for _ in 0..60 {
            session.apply(Command::ZoomOut);
        }
        assert!((session.view().unwrap().state.zoom - ZOOM_MIN).abs() < 1e-4);
        session.apply(Command::ZoomReset);
        assert_eq!(session.view().unwrap().state.zoom, 1.0);
    }

    #[test]
    fn pan_is_ignored_at_fit_scale() {
        let mut session = viewing_session(3, false);
        assert!(!session.apply(Command::Pan {
            dx: -PAN_STEP,
            dy: 0
        }));
        session.apply(Command::ZoomIn);
        assert!(session.apply(Command::Pan {
            dx: -PAN_STEP,
            dy: 0
        }));
        assert_eq!(session.view().unwrap().state.pan_x, -PAN_STEP);
    }

    #[test]
    fn zoom_reset_clears_pan() {
        let mut session = viewing_session(3, false);
        session.apply(Command::ZoomIn);
        session.apply(Command::Pan { dx: -50, dy: -50 });
        session.apply(Command::ZoomReset);
        let state = &session.view().unwrap().state;
        assert_eq!((state.pan_x, state.pan_y), (0, 0));
    }

    #[test]
    fn double_page_is_force_disabled_outside_fit_zoom() {
        let mut state = ViewState::new(true);
        assert!(state.effective_double_page(RenderMode::Kitty));
        assert!(state.effective_double_page(RenderMode::Timg));
        assert!(!state.effective_double_page(RenderMode::Ascii));

        state.zoom = 1.2;
        assert!(!state.effective_double_page(RenderMode::Kitty));
        state.zoom = 1.0 + ZOOM_EPSILON / 2.0;
        assert!(state.effective_double_page(RenderMode::Kitty));
    }

    #[test]
    fn opening_a_document_restores_a_valid_saved_page() {
        let mut session = Session::new();
        session.open("a.cbz".into(), Box::new(FakeSource::new(5)), 3, false);
        assert_eq!(session.view().unwrap().state.current_page, 3);
        // Out-of-range saved pages fall back to the first page.
        session.open("b.cbz".into(), Box::new(FakeSource::new(5)), 9, false);
        assert_eq!(session.view().unwrap().state.current_page, 0);
    }

    #[test]
    fn progress_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut store = ProgressStore::load(path.clone());
        store.record("vol1.cbz", 12).unwrap();
        store.record("vol2.cbz", 0).unwrap();

        let reloaded = ProgressStore::load(path);
        assert_eq!(reloaded.get("vol1.cbz"), Some(12));
        assert_eq!(reloaded.get("vol2.cbz"), Some(0));
        assert_eq!(reloaded.get("vol3.cbz"), None);
    }

    #[test]
    fn progress_file_stores_pages_under_a_named_object() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut store = ProgressStore::load(path.clone());
        store.record("vol1.cbz", 7).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["pages"]["vol1.cbz"], 7);
    }

    #[test]
    fn malformed_progress_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, "{not json").unwrap();
        let store = ProgressStore::load(path);
        assert_eq!(store.get("anything"), None);
    }

    #[test]
    fn config_parses_recognized_keys_and_keymap_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("comicterm.conf");
        fs::write(
            &path,
            "# comment\n\
             render_mode = timg\n\
             double_page = true\n\
             show_help = 1\n\
             library = /media/comics\n\
             next = n\n\
             not a key value line\n",
        )
        .unwrap();

        let config = Config::load(&path);
        assert_eq!(config.render_mode, RenderMode::Timg);
        assert!(config.double_page);
        assert!(config.show_help);
        assert_eq!(config.library_paths, vec![PathBuf::from("/media/comics")]);
        assert_eq!(config.binding("next"), "n");
        assert_eq!(config.binding("prev"), "h");
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        let config = Config::load(Path::new("/nonexistent/comicterm.conf"));
        assert_eq!(config.render_mode, RenderMode::Kitty);
        assert!(!config.double_page);
        assert_eq!(config.binding("quit"), "q");
    }
}
