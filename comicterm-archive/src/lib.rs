use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use comicterm_core::{natural_cmp, PageEntry, PageSource};
use flate2::read::GzDecoder;
use thiserror::Error;
use tracing::{debug, warn};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];
const ARCHIVE_EXTENSIONS: &[&str] = &["cbz", "zip", "cbt", "tar", "tgz", "gz"];

/// Why a path could not be opened as a page container. Surfaced to the
/// listing view as a transient message; the session is left untouched.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("failed to open {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a recognized archive container")]
    UnknownFormat { path: PathBuf },
    #[error("{path} contains no raster image entries")]
    NoPages { path: PathBuf },
}

/// True when the file name looks like a container the cursor can open.
pub fn is_supported_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            ARCHIVE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

fn has_image_extension(name: &str) -> bool {
    if name.ends_with('/') {
        return false;
    }
    name.rsplit_once('.')
        .map(|(_, ext)| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known))
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerKind {
    Zip,
    Tar,
    TarGz,
}

/// The underlying container formats only permit forward streaming reads, so
/// the cursor tracks where the open handle sits and recreates it whenever a
/// request points at or behind that position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorPos {
    Unopened,
    PositionedAt(usize),
}

struct EntryData {
    name: String,
    data: Option<Vec<u8>>,
}

enum ContainerStream {
    Zip(BufReader<File>),
    Tar(TarStream),
}

impl ContainerStream {
    /// Advances to the next container entry. The payload is decoded only
    /// when `want_data` is set; otherwise it is skipped in place.
    fn next_entry(&mut self, want_data: bool) -> Result<Option<EntryData>> {
        match self {
            ContainerStream::Zip(reader) => {
                let Some(mut file) = zip::read::read_zipfile_from_stream(reader)
                    .context("failed to read zip entry header")?
                else {
                    return Ok(None);
                };
                let name = file.name().to_string();
                let data = if want_data {
                    let mut buf = Vec::new();
                    file.read_to_end(&mut buf)
                        .with_context(|| format!("failed to decode zip entry {}", name))?;
                    Some(buf)
                } else {
                    io::copy(&mut file, &mut io::sink())
                        .with_context(|| format!("failed to skip zip entry {}", name))?;
                    None
                };
                Ok(Some(EntryData { name, data }))
            }
            ContainerStream::Tar(stream) => stream.next_entry(want_data),
        }
    }
}

struct TarStream {
    // `entries` borrows the archive below; declared first so it drops before
    // the archive it points into.
    entries: tar::Entries<'static, Box<dyn Read>>,
    _archive: Box<tar::Archive<Box<dyn Read>>>,
}

impl TarStream {
    fn new(reader: Box<dyn Read>) -> Result<Self> {
        let mut archive = Box::new(tar::Archive::new(reader));
        let archive_ptr: *mut tar::Archive<Box<dyn Read>> = &mut *archive;
        // SAFETY: `entries` holds a mutable borrow of the archive obtained
        // through a raw pointer. The archive is heap-allocated and owned by
        // the same struct, so its address stays stable while `entries` is
        // alive, and the field order above guarantees `entries` drops first.
        let entries: tar::Entries<'static, Box<dyn Read>> = unsafe {
            (*archive_ptr)
                .entries()
                .context("failed to read tar entries")?
        };
        Ok(Self {
            entries,
            _archive: archive,
        })
    }

    fn next_entry(&mut self, want_data: bool) -> Result<Option<EntryData>> {
        let Some(entry) = self.entries.next() else {
            return Ok(None);
        };
        let mut entry = entry.context("failed to read tar entry header")?;
        let name = entry
            .path()
            .context("tar entry has an undecodable path")?
            .to_string_lossy()
            .into_owned();
        let data = if want_data {
            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .with_context(|| format!("failed to decode tar entry {}", name))?;
            Some(buf)
        } else {
            // The entries iterator skips unread payloads on its own.
            None
        };
        Ok(Some(EntryData { name, data }))
    }
}

fn detect_kind(path: &Path) -> Result<ContainerKind, OpenError> {
    let mut file = File::open(path).map_err(|source| OpenError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let mut header = [0u8; 262];
    let mut filled = 0;
    while filled < header.len() {
        match file.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(source) => {
                return Err(OpenError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }
    }

    if filled >= 4 && header[..4] == *b"PK\x03\x04" {
        return Ok(ContainerKind::Zip);
    }
    if filled >= 2 && header[..2] == [0x1f, 0x8b] {
        return Ok(ContainerKind::TarGz);
    }
    if filled >= 262 && &header[257..262] == b"ustar" {
        return Ok(ContainerKind::Tar);
    }
    Err(OpenError::UnknownFormat {
        path: path.to_path_buf(),
    })
}

fn open_stream(path: &Path, kind: ContainerKind) -> Result<ContainerStream> {
    let file = File::open(path).with_context(|| format!("failed to reopen {:?}", path))?;
    Ok(match kind {
        ContainerKind::Zip => ContainerStream::Zip(BufReader::new(file)),
        ContainerKind::Tar => {
            TarStream::new(Box::new(BufReader::new(file))).map(ContainerStream::Tar)?
        }
        ContainerKind::TarGz => TarStream::new(Box::new(GzDecoder::new(BufReader::new(file))))
            .map(ContainerStream::Tar)?,
    })
}

/// Emulated random access over a forward-only archive. Opening indexes every
/// image-bearing entry in container order and sorts the index naturally by
/// name; page reads then advance a streaming handle, recreating it from the
/// start of the container whenever the target is not strictly ahead.
pub struct ArchiveCursor {
    path: PathBuf,
    kind: ContainerKind,
    entries: Vec<PageEntry>,
    stream: Option<ContainerStream>,
    pos: CursorPos,
}

impl ArchiveCursor {
    pub fn open(path: &Path) -> Result<Self, OpenError> {
        let kind = detect_kind(path)?;
        let mut stream = open_stream(path, kind).map_err(|_| OpenError::UnknownFormat {
            path: path.to_path_buf(),
        })?;

        let mut entries = Vec::new();
        let mut container_index = 0usize;
        loop {
            match stream.next_entry(false) {
                Ok(Some(entry)) => {
                    if has_image_extension(&entry.name) {
                        entries.push(PageEntry {
                            name: entry.name,
                            archive_index: container_index,
                        });
                    }
                    container_index += 1;
                }
                Ok(None) => break,
                Err(err) => {
                    // Index what was enumerable before the damage.
                    warn!(path = %path.display(), %err, "stopped indexing at damaged entry");
                    break;
                }
            }
        }

        if entries.is_empty() {
            return Err(OpenError::NoPages {
                path: path.to_path_buf(),
            });
        }

        entries.sort_by(|a, b| natural_cmp(&a.name, &b.name));
        debug!(path = %path.display(), pages = entries.len(), "indexed archive");

        Ok(Self {
            path: path.to_path_buf(),
            kind,
            entries,
            stream: None,
            pos: CursorPos::Unopened,
        })
    }

    /// Container-order index of the entry the handle most recently consumed,
    /// or None when no handle is positioned.
    pub fn position(&self) -> Option<usize> {
        match self.pos {
            CursorPos::PositionedAt(n) => Some(n),
            CursorPos::Unopened => None,
        }
    }

    fn rewind(&mut self) -> Result<()> {
        debug!(path = %self.path.display(), "recreating forward-only archive handle");
        self.stream = Some(open_stream(&self.path, self.kind)?);
        self.pos = CursorPos::Unopened;
        Ok(())
    }

    /// The single rewind-or-advance decision: recreate the handle when the
    /// target is at or behind the current position, then scan forward,
    /// skipping payloads, until the target entry is decoded.
    fn seek_to(&mut self, target: usize) -> Result<Vec<u8>> {
        let must_rewind = match self.pos {
            CursorPos::PositionedAt(last) => target <= last || self.stream.is_none(),
            CursorPos::Unopened => true,
        };
        if must_rewind {
            self.rewind()?;
        }

        loop {
            let next_index = match self.pos {
                CursorPos::Unopened => 0,
                CursorPos::PositionedAt(n) => n + 1,
            };
            let want_data = next_index == target;
            let step = self
                .stream
                .as_mut()
                .ok_or_else(|| anyhow!("archive handle was not recreated"))?
                .next_entry(want_data);

            match step {
                Ok(Some(entry)) => {
                    self.pos = CursorPos::PositionedAt(next_index);
                    if let Some(data) = entry.data {
                        return Ok(data);
                    }
                }
                Ok(None) => {
                    self.stream = None;
                    self.pos = CursorPos::Unopened;
                    return Err(anyhow!(
                        "container ended before entry {} was reached",
                        target
                    ));
                }
                Err(err) => {
                    // A damaged entry poisons the handle but not the session;
                    // the next read starts from a fresh handle.
                    self.stream = None;
                    self.pos = CursorPos::Unopened;
                    return Err(err);
                }
            }
        }
    }
}

impl PageSource for ArchiveCursor {
    fn page_count(&self) -> usize {
        self.entries.len()
    }

    fn entries(&self) -> &[PageEntry] {
        &self.entries
    }

    fn read_page(&mut self, logical_index: usize) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .get(logical_index)
            .ok_or_else(|| anyhow!("page {} out of range", logical_index))?;
        let target = entry.archive_index;
        let name = entry.name.clone();
        let bytes = self
            .seek_to(target)
            .with_context(|| format!("failed to read page {} ({})", logical_index, name))?;
        if bytes.is_empty() {
            return Err(anyhow!(
                "page {} ({}) has an empty payload",
                logical_index,
                name
            ));
        }
        Ok(bytes)
    }
}
