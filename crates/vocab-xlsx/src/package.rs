use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::XlsxError;

/// Default maximum uncompressed size of a single part inflated into memory.
pub const DEFAULT_MAX_PART_BYTES: u64 = 256 * 1024 * 1024; // 256MiB

/// Default maximum uncompressed size across all parts of one package.
pub const DEFAULT_MAX_TOTAL_BYTES: u64 = 512 * 1024 * 1024; // 512MiB

/// Guardrails applied while inflating a package into memory.
///
/// Workbooks built from vocabulary lists are tiny; the limits only exist so a
/// corrupt or hostile ZIP cannot exhaust memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XlsxPackageLimits {
    pub max_part_bytes: u64,
    pub max_total_bytes: u64,
}

impl Default for XlsxPackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: DEFAULT_MAX_PART_BYTES,
            max_total_bytes: DEFAULT_MAX_TOTAL_BYTES,
        }
    }
}

/// Every part of an OPC container, keyed by its path inside the ZIP.
///
/// Explicit directory entries (`xl/media/`) are not parts but are kept so a
/// rewritten container lists the same entries as the one it was read from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XlsxPackage {
    parts: BTreeMap<String, Vec<u8>>,
    directories: BTreeSet<String>,
}

impl XlsxPackage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a container from disk.
    ///
    /// The file is read fully and closed before parsing, so nothing holds the
    /// path open while it is later replaced.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, XlsxError> {
        Self::open_limited(path, XlsxPackageLimits::default())
    }

    pub fn open_limited(
        path: impl AsRef<Path>,
        limits: XlsxPackageLimits,
    ) -> Result<Self, XlsxError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_bytes_limited(&bytes, limits)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, XlsxError> {
        Self::from_bytes_limited(bytes, XlsxPackageLimits::default())
    }

    pub fn from_bytes_limited(bytes: &[u8], limits: XlsxPackageLimits) -> Result<Self, XlsxError> {
        let mut zip = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = BTreeMap::new();
        let mut directories = BTreeSet::new();
        let mut total: u64 = 0;

        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            if file.is_dir() {
                directories.insert(file.name().to_string());
                continue;
            }
            if !file.is_file() {
                continue;
            }

            let name = file.name().to_string();
            if file.size() > limits.max_part_bytes {
                return Err(XlsxError::PartTooLarge {
                    part: name,
                    size: file.size(),
                    max: limits.max_part_bytes,
                });
            }

            // The declared size can lie; cap the actual read one byte past the limit.
            let mut buf = Vec::new();
            file.by_ref()
                .take(limits.max_part_bytes.saturating_add(1))
                .read_to_end(&mut buf)?;
            let size = buf.len() as u64;
            if size > limits.max_part_bytes {
                return Err(XlsxError::PartTooLarge {
                    part: name,
                    size,
                    max: limits.max_part_bytes,
                });
            }

            total = total.saturating_add(size);
            if total > limits.max_total_bytes {
                return Err(XlsxError::PackageTooLarge {
                    total,
                    max: limits.max_total_bytes,
                });
            }

            parts.insert(name, buf);
        }

        log::debug!(
            "loaded package with {} parts and {} directories ({total} bytes)",
            parts.len(),
            directories.len()
        );
        Ok(Self { parts, directories })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    pub fn contains_part(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    /// Like [`XlsxPackage::part`], but a missing part is an error.
    pub fn required_part(&self, name: &str) -> Result<&[u8], XlsxError> {
        self.part(name)
            .ok_or_else(|| XlsxError::MissingPart(name.to_string()))
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    pub fn directory_names(&self) -> impl Iterator<Item = &str> {
        self.directories.iter().map(String::as_str)
    }

    pub fn set_part(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.parts.insert(name.into(), bytes);
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn write_to_bytes(&self) -> Result<Vec<u8>, XlsxError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(buf)
    }

    /// Write every part, Deflate-compressed, and every directory entry, all in
    /// name order.
    pub fn write_to<W: Write>(&self, mut w: W) -> Result<(), XlsxError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);

        let mut entries: Vec<(&str, Option<&[u8]>)> = self
            .parts
            .iter()
            .map(|(name, bytes)| (name.as_str(), Some(bytes.as_slice())))
            .chain(self.directories.iter().map(|name| (name.as_str(), None)))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));

        for (name, bytes) in entries {
            match bytes {
                Some(bytes) => {
                    zip.start_file(name, options)?;
                    zip.write_all(bytes)?;
                }
                None => zip.add_directory(name, FileOptions::<()>::default())?,
            }
        }

        let cursor = zip.finish()?;
        w.write_all(&cursor.into_inner())?;
        Ok(())
    }

    /// Persist through a sibling temp file that is renamed over `path`.
    ///
    /// On failure the previous contents of `path` (if any) are untouched.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), XlsxError> {
        let path = path.as_ref();
        vocab_fs::atomic_write(path, |file| self.write_to(file))?;
        log::debug!("wrote {} parts to {}", self.parts.len(), path.display());
        Ok(())
    }
}
