//! Terminal output and input for comicterm: the kitty graphics protocol
//! writer, pixel/cell geometry, and the mapping from key events to commands.

use std::io::Write;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use comicterm_core::{Command, Config, PageImage, PAN_STEP};
use crossterm::{
    cursor,
    event::{Event, KeyCode, KeyEvent},
    terminal::{Clear, ClearType},
};
use tracing::trace;

/// Kitty payload chunk size in base64 characters.
const CHUNK_SIZE: usize = 4096;

/// Assumed pixel size of one character cell when the terminal does not
/// report a pixel geometry.
const FALLBACK_CELL_W: u32 = 10;
const FALLBACK_CELL_H: u32 = 20;

/// Terminal geometry in both cells and pixels. Derives the per-cell pixel
/// size used to translate an image crop into a cell placement.
#[derive(Debug, Clone, Copy)]
pub struct CellGeometry {
    pub cols: u16,
    pub rows: u16,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl CellGeometry {
    pub fn new(cols: u16, rows: u16, pixel_width: u32, pixel_height: u32) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        // Some terminals report a zero pixel window; assume a typical cell.
        let pixel_width = if pixel_width == 0 {
            u32::from(cols) * FALLBACK_CELL_W
        } else {
            pixel_width
        };
        let pixel_height = if pixel_height == 0 {
            u32::from(rows) * FALLBACK_CELL_H
        } else {
            pixel_height
        };
        Self {
            cols,
            rows,
            pixel_width,
            pixel_height,
        }
    }

    pub fn cell_width(&self) -> u32 {
        (self.pixel_width / u32::from(self.cols)).max(1)
    }

    pub fn cell_height(&self) -> u32 {
        (self.pixel_height / u32::from(self.rows)).max(1)
    }

    /// Number of cells a pixel region occupies, rounding up so the image
    /// never paints outside its reserved cells.
    pub fn cells_for(&self, px_w: u32, px_h: u32) -> (u32, u32) {
        let cw = self.cell_width();
        let ch = self.cell_height();
        ((px_w + cw - 1) / cw, (px_h + ch - 1) / ch)
    }
}

/// Writes pages to a kitty-compatible terminal as raw RGB transmissions.
pub struct KittyRenderer<W: Write> {
    writer: W,
}

impl<W: Write> KittyRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Transmits and places an image at the current cursor position. The
    /// base64 payload is split into escape-sequence chunks; only the first
    /// carries the format and placement keys, the rest carry just the
    /// more-data flag.
    pub fn draw(&mut self, image: &PageImage, cell_cols: u32, cell_rows: u32) -> Result<()> {
        let encoded = BASE64.encode(&image.pixels);
        trace!(
            width = image.width,
            height = image.height,
            payload = encoded.len(),
            "transmitting kitty frame"
        );

        let mut chunks = encoded.as_bytes().chunks(CHUNK_SIZE).peekable();
        let mut first = true;
        while let Some(chunk) = chunks.next() {
            let more = if chunks.peek().is_some() { 1 } else { 0 };
            if first {
                write!(
                    self.writer,
                    "\u{1b}_Gf=24,a=T,s={},v={},c={},r={},m={};",
                    image.width,
                    image.height,
                    cell_cols.max(1),
                    cell_rows.max(1),
                    more
                )?;
                first = false;
            } else {
                write!(self.writer, "\u{1b}_Gm={};", more)?;
            }
            self.writer.write_all(chunk)?;
            write!(self.writer, "\u{1b}\\")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    pub fn move_to(&mut self, col: u16, row: u16) -> Result<()> {
        crossterm::queue!(&mut self.writer, cursor::MoveTo(col, row))?;
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// Ends a synchronized update so the terminal presents all buffered
    /// changes at once.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// What the event loop should do in response to one input event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiEvent {
    Command(Command),
    ToggleHelp,
    Refresh,
    /// Leave the page view and return to the listing.
    CloseView,
    Quit,
    MoveSelection(isize),
    SelectFirst,
    SelectLast,
    Activate,
    Redraw,
    None,
}

#[derive(Debug, Clone, Copy)]
struct Bindings {
    quit: char,
    refresh: char,
    toggle_help: char,
    first_page: char,
    last_page: char,
    next: char,
    prev: char,
    up: char,
    down: char,
    zoom_in: char,
    zoom_out: char,
    zoom_out_alt: char,
    zoom_reset: char,
    pan_up: char,
    pan_down: char,
    pan_left: char,
    pan_right: char,
    toggle_spread: char,
    double_page: char,
}

fn first_char(config: &Config, action: &str) -> char {
    config.binding(action).chars().next().unwrap_or('\u{0}')
}

/// Translates raw terminal events into [`UiEvent`]s using the configured
/// keymap. Listing and viewing use the same characters but different
/// meanings, so each has its own mapping.
pub struct EventMapper {
    bindings: Bindings,
}

impl EventMapper {
    pub fn new(config: &Config) -> Self {
        Self {
            bindings: Bindings {
                quit: first_char(config, "quit"),
                refresh: first_char(config, "refresh"),
                toggle_help: first_char(config, "toggle_help"),
                first_page: first_char(config, "first_page"),
                last_page: first_char(config, "last_page"),
                next: first_char(config, "next"),
                prev: first_char(config, "prev"),
                up: first_char(config, "up"),
                down: first_char(config, "down"),
                zoom_in: first_char(config, "zoom_in"),
                zoom_out: first_char(config, "zoom_out"),
                zoom_out_alt: first_char(config, "zoom_out_alt"),
                zoom_reset: first_char(config, "zoom_reset"),
                pan_up: first_char(config, "pan_up"),
                pan_down: first_char(config, "pan_down"),
                pan_left: first_char(config, "pan_left"),
                pan_right: first_char(config, "pan_right"),
                toggle_spread: first_char(config, "toggle_spread"),
                double_page: first_char(config, "double_page"),
            },
        }
    }

    pub fn map_listing(&self, event: &Event) -> UiEvent {
        match event {
            Event::Resize(..) => UiEvent::Redraw,
            Event::Key(KeyEvent { code, .. }) => match code {
                KeyCode::Enter => UiEvent::Activate,
                KeyCode::Up => UiEvent::MoveSelection(-1),
                KeyCode::Down => UiEvent::MoveSelection(1),
                KeyCode::Char(c) => {
                    let b = &self.bindings;
                    if *c == b.quit {
                        UiEvent::Quit
                    } else if *c == b.refresh {
                        UiEvent::Refresh
                    } else if *c == b.toggle_help {
                        UiEvent::ToggleHelp
                    } else if *c == b.first_page {
                        UiEvent::SelectFirst
                    } else if *c == b.last_page {
                        UiEvent::SelectLast
                    } else if *c == b.up {
                        UiEvent::MoveSelection(-1)
                    } else if *c == b.down {
                        UiEvent::MoveSelection(1)
                    } else {
                        UiEvent::None
                    }
                }
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }

    pub fn map_viewing(&self, event: &Event) -> UiEvent {
        match event {
            Event::Resize(..) => UiEvent::Redraw,
            Event::Key(KeyEvent {
                code, modifiers, ..
            }) => match code {
                KeyCode::Esc => UiEvent::CloseView,
                // Shift-arrows pan, plain left/right turn pages.
                KeyCode::Right if modifiers.contains(crossterm::event::KeyModifiers::SHIFT) => {
                    UiEvent::Command(Command::Pan {
                        dx: -PAN_STEP,
                        dy: 0,
                    })
                }
                KeyCode::Left if modifiers.contains(crossterm::event::KeyModifiers::SHIFT) => {
                    UiEvent::Command(Command::Pan { dx: PAN_STEP, dy: 0 })
                }
                KeyCode::Up if modifiers.contains(crossterm::event::KeyModifiers::SHIFT) => {
                    UiEvent::Command(Command::Pan { dx: 0, dy: PAN_STEP })
                }
                KeyCode::Down if modifiers.contains(crossterm::event::KeyModifiers::SHIFT) => {
                    UiEvent::Command(Command::Pan {
                        dx: 0,
                        dy: -PAN_STEP,
                    })
                }
                KeyCode::Right => UiEvent::Command(Command::NextPage),
                KeyCode::Left => UiEvent::Command(Command::PrevPage),
                KeyCode::Char(c) => {
                    let b = &self.bindings;
                    if *c == b.quit {
                        UiEvent::CloseView
                    } else if *c == b.next {
                        UiEvent::Command(Command::NextPage)
                    } else if *c == b.prev {
                        UiEvent::Command(Command::PrevPage)
                    } else if *c == b.first_page {
                        UiEvent::Command(Command::FirstPage)
                    } else if *c == b.last_page {
                        UiEvent::Command(Command::LastPage)
                    } else if *c == b.zoom_in {
                        UiEvent::Command(Command::ZoomIn)
                    } else if *c == b.zoom_out || *c == b.zoom_out_alt {
                        UiEvent::Command(Command::ZoomOut)
                    } else if *c == b.zoom_reset {
                        UiEvent::Command(Command::ZoomReset)
                    } else if *c == b.pan_up {
                        UiEvent::Command(Command::Pan { dx: 0, dy: PAN_STEP })
                    } else if *c == b.pan_down {
                        UiEvent::Command(Command::Pan {
                            dx: 0,
                            dy: -PAN_STEP,
                        })
                    } else if *c == b.pan_left {
                        UiEvent::Command(Command::Pan { dx: PAN_STEP, dy: 0 })
                    } else if *c == b.pan_right {
                        UiEvent::Command(Command::Pan {
                            dx: -PAN_STEP,
                            dy: 0,
                        })
                    } else if *c == b.toggle_spread || *c == b.double_page {
                        UiEvent::Command(Command::ToggleSpread)
                    } else if *c == b.toggle_help {
                        UiEvent::ToggleHelp
                    } else {
                        UiEvent::None
                    }
                }
                _ => UiEvent::None,
            },
            _ => UiEvent::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState, KeyModifiers};

    fn key_event(code: KeyCode) -> Event {
        key_event_with_modifiers(code, KeyModifiers::NONE)
    }

    fn key_event_with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn mapper() -> EventMapper {
        EventMapper::new(&Config::default())
    }

    #[test]
    fn kitty_draw_emits_protocol() {
        let mut renderer = KittyRenderer::new(Vec::new());
        let image = PageImage {
            width: 1,
            height: 1,
            pixels: vec![255, 0, 0],
        };

        renderer.draw(&image, 10, 5).unwrap();
        let output = String::from_utf8(renderer.writer).unwrap();
        assert!(output.starts_with("\u{1b}_Gf=24,a=T,s=1,v=1,c=10,r=5,m=0;"));
        assert!(output.ends_with("\u{1b}\\"));
    }

    #[test]
    fn kitty_draw_chunks_long_payloads() {
        let mut renderer = KittyRenderer::new(Vec::new());
        // 64x64 RGB is 12288 raw bytes, 16384 base64 chars, 4 chunks.
        let image = PageImage {
            width: 64,
            height: 64,
            pixels: vec![7; 64 * 64 * 3],
        };

        renderer.draw(&image, 6, 3).unwrap();
        let output = String::from_utf8(renderer.writer).unwrap();
        let frames: Vec<&str> = output
            .split("\u{1b}\\")
            .filter(|f| !f.is_empty())
            .collect();
        assert_eq!(frames.len(), 4);
        assert!(frames[0].starts_with("\u{1b}_Gf=24,a=T,"));
        assert!(frames[0].contains("m=1;"));
        assert!(frames[1].starts_with("\u{1b}_Gm=1;"));
        assert!(frames[3].starts_with("\u{1b}_Gm=0;"));

        // The payload reassembles into the original pixels.
        let payload: String = frames
            .iter()
            .map(|f| f.split_once(';').unwrap().1)
            .collect();
        assert_eq!(BASE64.decode(payload).unwrap(), image.pixels);
    }

    #[test]
    fn cell_geometry_rounds_up() {
        let geo = CellGeometry::new(80, 24, 800, 480);
        assert_eq!(geo.cell_width(), 10);
        assert_eq!(geo.cell_height(), 20);
        assert_eq!(geo.cells_for(95, 41), (10, 3));
        assert_eq!(geo.cells_for(100, 40), (10, 2));
    }

    #[test]
    fn cell_geometry_assumes_a_cell_size_without_pixel_reports() {
        let geo = CellGeometry::new(80, 24, 0, 0);
        assert_eq!(geo.cell_width(), FALLBACK_CELL_W);
        assert_eq!(geo.cell_height(), FALLBACK_CELL_H);
        assert_eq!(geo.pixel_width, 800);
        assert_eq!(geo.pixel_height, 480);
    }

    #[test]
    fn listing_keys_move_and_activate() {
        let m = mapper();
        assert_eq!(
            m.map_listing(&key_event(KeyCode::Char('j'))),
            UiEvent::MoveSelection(1)
        );
        assert_eq!(
            m.map_listing(&key_event(KeyCode::Char('k'))),
            UiEvent::MoveSelection(-1)
        );
        assert_eq!(
            m.map_listing(&key_event(KeyCode::Up)),
            UiEvent::MoveSelection(-1)
        );
        assert_eq!(m.map_listing(&key_event(KeyCode::Enter)), UiEvent::Activate);
        assert_eq!(
            m.map_listing(&key_event(KeyCode::Char('g'))),
            UiEvent::SelectFirst
        );
        assert_eq!(
            m.map_listing(&key_event_with_modifiers(
                KeyCode::Char('G'),
                KeyModifiers::SHIFT
            )),
            UiEvent::SelectLast
        );
        assert_eq!(m.map_listing(&key_event(KeyCode::Char('q'))), UiEvent::Quit);
        assert_eq!(
            m.map_listing(&key_event(KeyCode::Char('r'))),
            UiEvent::Refresh
        );
        assert_eq!(m.map_listing(&key_event(KeyCode::Char('x'))), UiEvent::None);
    }

    #[test]
    fn viewing_keys_navigate_and_zoom() {
        let m = mapper();
        assert_eq!(
            m.map_viewing(&key_event(KeyCode::Char('l'))),
            UiEvent::Command(Command::NextPage)
        );
        assert_eq!(
            m.map_viewing(&key_event(KeyCode::Char('h'))),
            UiEvent::Command(Command::PrevPage)
        );
        assert_eq!(
            m.map_viewing(&key_event(KeyCode::Right)),
            UiEvent::Command(Command::NextPage)
        );
        assert_eq!(
            m.map_viewing(&key_event(KeyCode::Char('='))),
            UiEvent::Command(Command::ZoomIn)
        );
        assert_eq!(
            m.map_viewing(&key_event(KeyCode::Char('-'))),
            UiEvent::Command(Command::ZoomOut)
        );
        assert_eq!(
            m.map_viewing(&key_event(KeyCode::Char('_'))),
            UiEvent::Command(Command::ZoomOut)
        );
        assert_eq!(
            m.map_viewing(&key_event(KeyCode::Char('0'))),
            UiEvent::Command(Command::ZoomReset)
        );
        assert_eq!(
            m.map_viewing(&key_event(KeyCode::Char('s'))),
            UiEvent::Command(Command::ToggleSpread)
        );
        assert_eq!(
            m.map_viewing(&key_event(KeyCode::Char('q'))),
            UiEvent::CloseView
        );
        assert_eq!(m.map_viewing(&key_event(KeyCode::Esc)), UiEvent::CloseView);
    }

    #[test]
    fn viewing_pan_keys_and_shift_arrows_pan() {
        let m = mapper();
        assert_eq!(
            m.map_viewing(&key_event_with_modifiers(
                KeyCode::Char('H'),
                KeyModifiers::SHIFT
            )),
            UiEvent::Command(Command::Pan { dx: PAN_STEP, dy: 0 })
        );
        assert_eq!(
            m.map_viewing(&key_event_with_modifiers(
                KeyCode::Char('J'),
                KeyModifiers::SHIFT
            )),
            UiEvent::Command(Command::Pan {
                dx: 0,
                dy: -PAN_STEP
            })
        );
        assert_eq!(
            m.map_viewing(&key_event_with_modifiers(
                KeyCode::Right,
                KeyModifiers::SHIFT
            )),
            UiEvent::Command(Command::Pan {
                dx: -PAN_STEP,
                dy: 0
            })
        );
        assert_eq!(
            m.map_viewing(&key_event_with_modifiers(KeyCode::Up, KeyModifiers::SHIFT)),
            UiEvent::Command(Command::Pan { dx: 0, dy: PAN_STEP })
        );
    }

    #[test]
    fn rebound_keys_replace_the_defaults() {
        let mut config = Config::default();
        config.set_binding("next", "n");
        let m = EventMapper::new(&config);

        assert_eq!(
            m.map_viewing(&key_event(KeyCode::Char('n'))),
            UiEvent::Command(Command::NextPage)
        );
        assert_eq!(m.map_viewing(&key_event(KeyCode::Char('x'))), UiEvent::None);
    }

    #[test]
    fn resize_forces_a_redraw_in_both_modes() {
        let m = mapper();
        assert_eq!(m.map_listing(&Event::Resize(100, 40)), UiEvent::Redraw);
        assert_eq!(m.map_viewing(&Event::Resize(100, 40)), UiEvent::Redraw);
    }
}
