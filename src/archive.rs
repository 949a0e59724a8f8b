//! Directory-tree operations: the primary embedding surface.
//!
//! ```no_run
//! use miniar::archive::{self, ArchiveOptions};
//! use miniar::locate::Located;
//! use std::io::Read;
//!
//! // Pack a tree into a gzip-wrapped container
//! archive::create("site", "site.mar", &ArchiveOptions::default())?;
//!
//! // Restore it
//! archive::extract("site.mar", "restored")?;
//!
//! // Stream one entry without extracting the rest
//! if let Located::Found { mut reader, .. } = archive::open_entry("site.mar", "css/main.css")? {
//!     let mut css = String::new();
//!     reader.read_to_string(&mut css)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Component, Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::codec::{CodecId, DEFAULT_COMPRESSION_LEVEL};
use crate::error::{ArchiveError, Result};
use crate::frame::Entry;
use crate::io_stream::{ArchiveReader, ArchiveWriter, DEFAULT_CHUNK_SIZE};
use crate::locate::{locate, Located};

// ── ArchiveOptions ───────────────────────────────────────────────────────────

/// Configuration for [`archive`] and [`create`].
#[derive(Debug, Clone)]
pub struct ArchiveOptions {
    /// Transform applied to the whole container.
    pub codec:        CodecId,
    pub level:        i32,
    /// When set, the root directory's own name is the first path segment of
    /// every entry and the root itself is emitted as a directory frame.
    pub include_root: bool,
    /// Size of the buffer used to stream file content.
    pub chunk_size:   usize,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            codec:        CodecId::Gzip,
            level:        DEFAULT_COMPRESSION_LEVEL,
            include_root: false,
            chunk_size:   DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ArchiveOptions {
    /// Uncompressed container.
    pub fn raw() -> Self {
        Self { codec: CodecId::None, ..Self::default() }
    }
}

// ── Summaries ────────────────────────────────────────────────────────────────

/// Counters reported by [`archive`] and [`unarchive`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub directories:   usize,
    pub files:         usize,
    pub content_bytes: u64,
    /// Files that vanished between listing and opening.
    pub skipped:       usize,
}

// ── Writing ──────────────────────────────────────────────────────────────────

/// Pack the tree under `root` into `sink` and return the sink.
///
/// Entries are emitted pre-order with siblings sorted by file name, so the
/// same tree always produces the same container.  Symlinks and special
/// files are not archived.
pub fn archive<P: AsRef<Path>, W: Write>(root: P, sink: W, opts: &ArchiveOptions) -> Result<(W, Summary)> {
    let root = resolve_root(root.as_ref())?;
    let walk = WalkDir::new(&root).follow_links(false).sort_by_file_name();
    archive_walk(&root, walk, sink, opts)
}

/// Frame every item `walk` yields under the already resolved `root`.
fn archive_walk<I, W>(root: &Path, walk: I, sink: W, opts: &ArchiveOptions) -> Result<(W, Summary)>
where
    I: IntoIterator<Item = walkdir::Result<DirEntry>>,
    W: Write,
{
    let strip_base = if opts.include_root {
        root.parent().unwrap_or(root)
    } else {
        root
    };

    let mut writer = ArchiveWriter::with_options(sink, opts)?;
    let mut summary = Summary::default();

    for item in walk {
        let item = match item {
            Ok(item) => item,
            Err(e) if e.depth() > 0 && is_not_found(e.io_error()) => {
                tracing::warn!(error = %e, "entry vanished during traversal, skipping");
                summary.skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let rel = relative_path(strip_base, item.path())?;
        let file_type = item.file_type();

        if file_type.is_dir() {
            // the stripped root has no name of its own
            if rel.is_empty() {
                continue;
            }
            writer.add_directory(&rel)?;
            summary.directories += 1;
        } else if file_type.is_file() {
            let Some(file) = open_source(item.path())? else {
                tracing::warn!(path = %item.path().display(), "file vanished before archiving, skipping");
                summary.skipped += 1;
                continue;
            };
            let len = file.metadata()?.len();
            writer.add_file(&rel, len, file)?;
            summary.files += 1;
            summary.content_bytes += len;
        } else {
            tracing::debug!(path = %item.path().display(), "not a regular file or directory, skipping");
        }
    }

    let sink = writer.finish()?;
    tracing::info!(
        root = %root.display(),
        codec = opts.codec.name(),
        dirs = summary.directories,
        files = summary.files,
        bytes = summary.content_bytes,
        skipped = summary.skipped,
        "archive complete"
    );
    Ok((sink, summary))
}

/// Open a file found by the traversal, or `None` if it is already gone.
fn open_source(path: &Path) -> Result<Option<File>> {
    match File::open(path) {
        Ok(f) => Ok(Some(f)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn resolve_root(root: &Path) -> Result<PathBuf> {
    let meta = match fs::metadata(root) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ArchiveError::DirectoryNotFound(root.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    if !meta.is_dir() {
        return Err(ArchiveError::NotADirectory(root.to_path_buf()));
    }
    Ok(fs::canonicalize(root)?)
}

fn is_not_found(err: Option<&io::Error>) -> bool {
    err.map_or(false, |e| e.kind() == io::ErrorKind::NotFound)
}

/// `path` relative to `base`, as `/`-separated UTF-8.  Empty for `base` itself.
fn relative_path(base: &Path, path: &Path) -> Result<String> {
    let rel = path.strip_prefix(base).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is outside {}", path.display(), base.display()),
        )
    })?;

    let mut out = String::new();
    for comp in rel.components() {
        let part = comp
            .as_os_str()
            .to_str()
            .ok_or_else(|| ArchiveError::NonUtf8Path(path.to_path_buf()))?;
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(part);
    }
    Ok(out)
}

// ── Reading ──────────────────────────────────────────────────────────────────

/// Restore every entry of `source` under `output_root`.
pub fn unarchive<R: Read, P: AsRef<Path>>(source: R, output_root: P) -> Result<Summary> {
    let output_root = output_root.as_ref();
    prepare_output_root(output_root)?;

    let mut archive = ArchiveReader::open(source)?;
    let mut buf = vec![0u8; DEFAULT_CHUNK_SIZE];
    let mut summary = Summary::default();

    while let Some(entry) = archive.next_entry()? {
        let target = entry_target(output_root, entry.path())?;
        match &entry {
            Entry::Directory { path } => {
                fs::create_dir_all(&target)?;
                summary.directories += 1;
                tracing::debug!(path = path.as_str(), "restored dir");
            }
            Entry::File { path, len } => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut file = File::create(&target)?;
                let copied = archive.copy_content(&mut file, &mut buf)?;
                file.flush()?;
                summary.files += 1;
                summary.content_bytes += copied;
                tracing::debug!(path = path.as_str(), len, "restored file");
            }
        }
    }

    tracing::info!(
        output = %output_root.display(),
        codec = archive.codec().name(),
        dirs = summary.directories,
        files = summary.files,
        bytes = summary.content_bytes,
        "unarchive complete"
    );
    Ok(summary)
}

fn prepare_output_root(output_root: &Path) -> Result<()> {
    if output_root.exists() && !output_root.is_dir() {
        return Err(ArchiveError::InvalidOutput {
            path:   output_root.to_path_buf(),
            reason: "exists and is not a directory",
        });
    }
    fs::create_dir_all(output_root)?;
    Ok(())
}

/// Join an archived path onto `root`, refusing anything that would land
/// outside it.
fn entry_target(root: &Path, rel: &str) -> Result<PathBuf> {
    let mut target = root.to_path_buf();
    let mut named = false;
    for comp in Path::new(rel).components() {
        match comp {
            Component::Normal(part) => {
                target.push(part);
                named = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ArchiveError::UnsafePath(rel.to_owned()))
            }
        }
    }
    if !named {
        return Err(ArchiveError::UnsafePath(rel.to_owned()));
    }
    Ok(target)
}

/// Enumerate the entries of `source` without extracting anything.
pub fn list<R: Read>(source: R) -> Result<Vec<Entry>> {
    let mut archive = ArchiveReader::open(source)?;
    let mut entries = Vec::new();
    while let Some(entry) = archive.next_entry()? {
        entries.push(entry);
    }
    Ok(entries)
}

// ── Path-level helpers ───────────────────────────────────────────────────────

/// Pack `root` into a new file at `output`.
pub fn create<P: AsRef<Path>, Q: AsRef<Path>>(root: P, output: Q, opts: &ArchiveOptions) -> Result<Summary> {
    let out = BufWriter::new(File::create(output.as_ref())?);
    let (out, summary) = archive(root, out, opts)?;
    out.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(summary)
}

/// Restore the container file at `archive_path` under `output_root`.
pub fn extract<P: AsRef<Path>, Q: AsRef<Path>>(archive_path: P, output_root: Q) -> Result<Summary> {
    unarchive(open_archive_file(archive_path.as_ref())?, output_root)
}

/// Entries of the container file at `archive_path`.
pub fn list_file<P: AsRef<Path>>(archive_path: P) -> Result<Vec<Entry>> {
    list(open_archive_file(archive_path.as_ref())?)
}

/// Locate `entry_path` inside the container file at `archive_path`.
pub fn open_entry<P: AsRef<Path>>(archive_path: P, entry_path: &str) -> Result<Located<BufReader<File>>> {
    locate(open_archive_file(archive_path.as_ref())?, entry_path)
}

fn open_archive_file(path: &Path) -> Result<BufReader<File>> {
    if !path.exists() {
        return Err(ArchiveError::ArchiveNotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(ArchiveError::NotAFile(path.to_path_buf()));
    }
    Ok(BufReader::new(File::open(path)?))
}
