//! Crash-safe replacement of a file on disk.
//!
//! A workbook is staged in a hidden sibling of its destination and only
//! renamed into place once its bytes are synced. A reader therefore sees the
//! old file or the new one, never a truncated ZIP.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use tempfile::TempPath;

const STAGING_PREFIX: &str = ".vocab-";
const STAGING_SUFFIX: &str = ".tmp";

/// Error from [`atomic_write`]. Payload failures stay in the caller's type.
#[derive(Debug, thiserror::Error)]
pub enum AtomicWriteError<E> {
    #[error("filesystem error: {0}")]
    Io(#[from] io::Error),
    #[error("payload writer failed: {0}")]
    Writer(#[source] E),
}

/// Replace `dest` with the bytes `write_fn` produces.
///
/// Missing parent directories are created. On any error `dest` keeps its
/// previous contents and the staging file is gone.
pub fn atomic_write<T, E>(
    dest: impl AsRef<Path>,
    write_fn: impl FnOnce(&mut File) -> Result<T, E>,
) -> Result<T, AtomicWriteError<E>> {
    let dest = dest.as_ref();
    let (staged, value) = stage_beside(dest, write_fn)?;
    commit(staged, dest)?;
    Ok(value)
}

/// Run `write_fn` against a synced file in `dest`'s directory.
///
/// The returned [`TempPath`] deletes the file when dropped.
fn stage_beside<T, E>(
    dest: &Path,
    write_fn: impl FnOnce(&mut File) -> Result<T, E>,
) -> Result<(TempPath, T), AtomicWriteError<E>> {
    let dir = containing_dir(dest);
    fs::create_dir_all(dir)?;

    let mut staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(STAGING_SUFFIX)
        .tempfile_in(dir)?;
    log::debug!("staging {} at {}", dest.display(), staging.path().display());

    let value = write_fn(staging.as_file_mut()).map_err(AtomicWriteError::Writer)?;
    let file = staging.as_file_mut();
    file.flush()?;
    file.sync_all()?;

    Ok((staging.into_temp_path(), value))
}

fn commit(staged: TempPath, dest: &Path) -> io::Result<()> {
    rename_over(&staged, dest)?;
    // The staged name no longer exists; stop the guard from removing it.
    let _ = staged.keep();

    let dir = containing_dir(dest);
    if let Err(err) = File::open(dir).and_then(|handle| handle.sync_all()) {
        // Windows cannot open a directory this way.
        log::debug!("could not sync {} after commit: {err}", dir.display());
    }
    Ok(())
}

/// Directory holding `path`, with `.` standing in for a bare file name.
fn containing_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

#[cfg(not(windows))]
fn rename_over(from: &Path, to: &Path) -> io::Result<()> {
    fs::rename(from, to)
}

#[cfg(windows)]
fn rename_over(from: &Path, to: &Path) -> io::Result<()> {
    use std::os::windows::ffi::OsStrExt as _;
    use windows_sys::Win32::Storage::FileSystem::{MoveFileExW, MOVEFILE_REPLACE_EXISTING};

    let nul_terminated =
        |path: &Path| -> Vec<u16> { path.as_os_str().encode_wide().chain([0]).collect() };
    let (from, to) = (nul_terminated(from), nul_terminated(to));
    // SAFETY: both buffers are NUL-terminated and outlive the call.
    match unsafe { MoveFileExW(from.as_ptr(), to.as_ptr(), MOVEFILE_REPLACE_EXISTING) } {
        0 => Err(io::Error::last_os_error()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn listing(dir: &Path) -> Vec<PathBuf> {
        let mut out: Vec<_> = fs::read_dir(dir)
            .expect("read_dir")
            .map(|e| e.expect("dir entry").path())
            .filter(|p| p.is_file())
            .collect();
        out.sort();
        out
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("words.xlsx");
        fs::write(&dest, b"old").expect("seed dest");

        atomic_write(&dest, |file| file.write_all(b"new")).expect("atomic write");

        assert_eq!(fs::read(&dest).expect("read dest"), b"new");
        assert_eq!(listing(tmp.path()), vec![dest]);
    }

    #[test]
    fn atomic_write_creates_missing_parent_directories() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("exports/2024/words.xlsx");

        atomic_write(&dest, |file| file.write_all(b"zip")).expect("atomic write");

        assert_eq!(fs::read(&dest).expect("read dest"), b"zip");
    }

    #[test]
    fn writer_error_keeps_dest_and_removes_the_staging_file() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("words.xlsx");
        let sentinel = b"sentinel-workbook";
        fs::write(&dest, sentinel).expect("seed dest");

        let err = atomic_write(&dest, |file| {
            file.write_all(b"partial").expect("write partial bytes");
            Err::<(), _>(io::Error::new(io::ErrorKind::Other, "simulated failure"))
        })
        .expect_err("writer error should propagate");

        assert!(matches!(err, AtomicWriteError::Writer(_)), "got {err}");
        assert_eq!(err.to_string(), "payload writer failed: simulated failure");
        assert_eq!(fs::read(&dest).expect("read dest"), sentinel);
        assert_eq!(listing(tmp.path()), vec![dest]);
    }

    #[test]
    fn atomic_write_returns_writer_value() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("count.bin");

        let written = atomic_write(&dest, |file| {
            file.write_all(b"12345")?;
            Ok::<_, io::Error>(5usize)
        })
        .expect("atomic write");

        assert_eq!(written, 5);
    }

    #[test]
    fn staging_file_is_hidden_next_to_dest() {
        let tmp = tempfile::tempdir().expect("temp dir");
        let dest = tmp.path().join("words.xlsx");

        let (staged, ()) =
            stage_beside(&dest, |file| file.write_all(b"zip")).expect("stage");
        let name = staged
            .file_name()
            .and_then(|name| name.to_str())
            .expect("utf-8 name")
            .to_string();
        assert!(name.starts_with(STAGING_PREFIX) && name.ends_with(STAGING_SUFFIX), "{name}");
        assert_eq!(staged.parent(), Some(tmp.path()));
        assert!(!dest.exists());

        drop(staged);
        assert!(listing(tmp.path()).is_empty());
    }

    #[test]
    fn bare_file_names_live_in_the_current_directory() {
        assert_eq!(containing_dir(Path::new("words.xlsx")), Path::new("."));
        assert_eq!(containing_dir(Path::new("out/words.xlsx")), Path::new("out"));
    }
}
