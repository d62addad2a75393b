//! Backup-preserving line rewriter.
//!
//! Every rewrite snapshots the original file to `<path>.bak`, streams the
//! backup through a [`LineTransform`] and atomically replaces the original
//! with the result. Nothing at the original path is touched until the new
//! content is fully written and synced, so a failed rewrite always leaves
//! both the original and its backup intact. A rewrite that changes no line
//! leaves the original alone, mtime included. Replaced files and backups keep
//! the original's permissions.
//!
//! Line terminators: the terminator of the first terminated line (`\n` or
//! `\r\n`) is used for every emitted line, so mixed input is normalised when
//! some line changes. A missing final terminator stays missing.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Suffix appended to a rewritten file's path to form its backup.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Maps one input line to zero or more output lines.
pub trait LineTransform {
    fn transform(&mut self, line: &str) -> Vec<String>;
}

impl<F> LineTransform for F
where
    F: FnMut(&str) -> Vec<String>,
{
    fn transform(&mut self, line: &str) -> Vec<String> {
        self(line)
    }
}

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("Failed to back up {path}: {source}")]
    Backup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error rewriting {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl RewriteError {
    fn io(path: &Path, source: io::Error) -> Self {
        RewriteError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Line counts for one pass through the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub lines_in: usize,
    pub lines_out: usize,
}

/// Result of rewriting a file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "RewriteOutcome reports whether the file existed and changed"]
pub enum RewriteOutcome {
    /// Target file does not exist; nothing was done
    Missing { file: PathBuf },
    /// File was rewritten and a backup written next to it
    Rewritten {
        file: PathBuf,
        backup: PathBuf,
        changed: bool,
        stats: StreamStats,
    },
}

/// Path of the backup written for `path`.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Run `transform` over every line read from `reader`, writing to `writer`.
pub fn rewrite_stream<R, W, T>(
    mut reader: R,
    writer: &mut W,
    transform: &mut T,
) -> io::Result<StreamStats>
where
    R: BufRead,
    W: Write,
    T: LineTransform + ?Sized,
{
    let mut stats = StreamStats::default();
    let mut terminator: Option<&'static str> = None;
    let mut wrote_any = false;
    let mut ends_terminated = false;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        ends_terminated = false;
        if buf.last() == Some(&b'\n') {
            buf.pop();
            let crlf = buf.last() == Some(&b'\r');
            if crlf {
                buf.pop();
            }
            if terminator.is_none() {
                terminator = Some(if crlf { "\r\n" } else { "\n" });
            }
            ends_terminated = true;
        }

        stats.lines_in += 1;
        let line = std::str::from_utf8(&buf).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("line {} is not valid UTF-8", stats.lines_in),
            )
        })?;

        let eol = terminator.unwrap_or("\n");
        for out in transform.transform(line) {
            if wrote_any {
                writer.write_all(eol.as_bytes())?;
            }
            writer.write_all(out.as_bytes())?;
            wrote_any = true;
            stats.lines_out += 1;
        }
    }

    if wrote_any && ends_terminated {
        writer.write_all(terminator.unwrap_or("\n").as_bytes())?;
    }

    Ok(stats)
}

/// Run the engine over an in-memory string.
pub fn rewrite_str<T: LineTransform>(input: &str, mut transform: T) -> io::Result<String> {
    let mut out = Vec::with_capacity(input.len());
    rewrite_stream(input.as_bytes(), &mut out, &mut transform)?;
    String::from_utf8(out).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Rewrite `path` in place, keeping the pre-rewrite content at `<path>.bak`.
///
/// A missing file is reported as [`RewriteOutcome::Missing`], not an error.
pub fn rewrite_file<T: LineTransform>(
    path: &Path,
    mut transform: T,
) -> Result<RewriteOutcome, RewriteError> {
    if !path.is_file() {
        return Ok(RewriteOutcome::Missing {
            file: path.to_path_buf(),
        });
    }

    let parent = parent_dir(path);
    let backup = backup_path(path);

    // 1. Snapshot the original (replaces any previous backup)
    snapshot(path, &backup, parent).map_err(|source| RewriteError::Backup {
        path: backup.clone(),
        source,
    })?;

    // 2. Stream backup -> temp file in the same directory
    let mut temp = new_temp(parent).map_err(|e| RewriteError::io(path, e))?;
    let stats = {
        let reader = BufReader::new(File::open(&backup).map_err(|e| RewriteError::io(&backup, e))?);
        let mut writer = BufWriter::new(temp.as_file_mut());
        let stats = rewrite_stream(reader, &mut writer, &mut transform)
            .map_err(|e| RewriteError::io(path, e))?;
        writer.flush().map_err(|e| RewriteError::io(path, e))?;
        stats
    };

    let before = fs::read(&backup).map_err(|e| RewriteError::io(&backup, e))?;
    let after = fs::read(temp.path()).map_err(|e| RewriteError::io(path, e))?;
    let changed = !same_lines(&before, &after);
    if !changed {
        return Ok(RewriteOutcome::Rewritten {
            file: path.to_path_buf(),
            backup,
            changed,
            stats,
        });
    }

    copy_permissions(path, &temp).map_err(|e| RewriteError::io(path, e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| RewriteError::io(path, e))?;

    // 3. Atomic replace
    temp.persist(path)
        .map_err(|e| RewriteError::io(path, e.error))?;

    // Bump mtime so incremental builds pick the file up
    filetime::set_file_mtime(path, filetime::FileTime::now())
        .map_err(|e| RewriteError::io(path, e))?;

    Ok(RewriteOutcome::Rewritten {
        file: path.to_path_buf(),
        backup,
        changed,
        stats,
    })
}

/// Put the backup of `path` back in place. Returns `false` if there is none.
pub fn restore_backup(path: &Path) -> Result<bool, RewriteError> {
    let backup = backup_path(path);
    if !backup.is_file() {
        return Ok(false);
    }
    fs::rename(&backup, path).map_err(|e| RewriteError::io(path, e))?;
    Ok(true)
}

/// Whether two buffers hold the same lines, ignoring `\n` versus `\r\n`.
pub fn same_lines(a: &[u8], b: &[u8]) -> bool {
    fn lines(buf: &[u8]) -> impl Iterator<Item = &[u8]> + '_ {
        buf.split(|&byte| byte == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
    }
    lines(a).eq(lines(b))
}

/// Atomic file write: tempfile in the same directory + fsync + rename.
///
/// An existing file keeps its permissions.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let mut temp = new_temp(parent_dir(path))?;
    temp.write_all(content)?;
    match copy_permissions(path, &temp) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn snapshot(path: &Path, backup: &Path, parent: &Path) -> io::Result<()> {
    let mut temp = new_temp(parent)?;
    let mut source = File::open(path)?;
    io::copy(&mut source, temp.as_file_mut())?;
    copy_permissions(path, &temp)?;
    temp.as_file().sync_all()?;
    temp.persist(backup).map_err(|e| e.error)?;
    Ok(())
}

/// Temp file in `dir` created with `0o666 & !umask`, like `File::create`,
/// rather than tempfile's private `0o600`.
#[cfg_attr(not(unix), allow(unused_mut))]
fn new_temp(dir: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o666));
    }
    builder.tempfile_in(dir)
}

fn copy_permissions(from: &Path, temp: &NamedTempFile) -> io::Result<()> {
    let permissions = fs::metadata(from)?.permissions();
    temp.as_file().set_permissions(permissions)
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}
