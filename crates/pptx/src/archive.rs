//! Unpacking and repacking of PPTX containers.
//!
//! A .pptx is a ZIP archive of XML parts plus media. Transform passes work
//! on an extracted copy in a fresh temporary directory and write a new
//! archive from it afterwards.

use regex::Regex;
use restyle_core::{Error, Result};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Slide part file names: `slide` + digits + `.xml`.
static SLIDE_PART_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^slide(\d+)\.xml$").unwrap());

/// Name prefix of every temporary directory this crate creates.
pub const SCRATCH_PREFIX: &str = "pptx-restyle-";

/// Part that consumers expect to find first in the archive.
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// An archive extracted into a temporary directory.
///
/// The directory is removed by [`ExtractedPackage::cleanup`] or, failing
/// that, when the value is dropped.
#[derive(Debug)]
pub struct ExtractedPackage {
    dir: Option<TempDir>,
    root: PathBuf,
    entries: Vec<String>,
}

impl ExtractedPackage {
    /// Extract `source` into a new directory under the system temp dir.
    pub fn unpack(source: &Path) -> Result<Self> {
        Self::unpack_in(source, &std::env::temp_dir())
    }

    /// Extract `source` into a new temporary directory under `parent`.
    pub fn unpack_in(source: &Path, parent: &Path) -> Result<Self> {
        if !source.is_file() {
            return Err(Error::NotFound(source.to_path_buf()));
        }

        let file = File::open(source)?;
        let mut archive = ZipArchive::new(BufReader::new(file))
            .map_err(|e| Error::CorruptArchive(format!("{}: {}", source.display(), e)))?;

        let dir = scratch_dir(parent)?;
        let root = dir.path().to_path_buf();
        let mut entries = Vec::with_capacity(archive.len());

        for idx in 0..archive.len() {
            let mut entry = archive
                .by_index(idx)
                .map_err(|e| Error::CorruptArchive(format!("{}: {}", source.display(), e)))?;
            let name = entry.name().to_string();

            let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
                log::warn!("Skipping archive entry with unsafe path: {}", name);
                continue;
            };
            let target = root.join(relative);

            if entry.is_dir() {
                fs::create_dir_all(&target)?;
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }

            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)
                .map_err(|e| Error::CorruptArchive(format!("{}: entry '{}': {}", source.display(), name, e)))?;
            entries.push(name);
        }

        log::debug!(
            "Extracted {} parts from {} into {}",
            entries.len(),
            source.display(),
            root.display()
        );

        Ok(Self {
            dir: Some(dir),
            root,
            entries,
        })
    }

    /// Root of the extracted tree.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Entry names in their original archive order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Slide parts of the extracted tree.
    pub fn slide_parts(&self) -> Result<Vec<PathBuf>> {
        list_slide_parts(&self.root)
    }

    /// Write the tree to `dest`, keeping the original entry order and
    /// appending any files that were added since extraction.
    pub fn repack(&self, dest: &Path) -> Result<()> {
        let on_disk = collect_files(&self.root)?;
        let mut names: Vec<String> = self
            .entries
            .iter()
            .filter(|name| on_disk.contains(name))
            .cloned()
            .collect();
        names.extend(on_disk.into_iter().filter(|name| !self.entries.contains(name)));
        write_archive(&self.root, &names, dest)
    }

    /// Remove the temporary directory. Safe to call more than once.
    pub fn cleanup(&mut self) -> Result<()> {
        if let Some(dir) = self.dir.take() {
            dir.close()?;
            log::debug!("Removed {}", self.root.display());
        }
        Ok(())
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.dir.is_none()
    }
}

/// Fresh, uniquely named temporary directory under `parent`.
pub fn scratch_dir(parent: &Path) -> Result<TempDir> {
    Ok(tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir_in(parent)?)
}

/// Pack every file under `dir` into a deflate-compressed archive at `dest`,
/// naming entries by their path relative to `dir`.
pub fn pack(dir: &Path, dest: &Path) -> Result<()> {
    let mut names = collect_files(dir)?;
    if let Some(idx) = names.iter().position(|n| n == CONTENT_TYPES_PART) {
        let content_types = names.remove(idx);
        names.insert(0, content_types);
    }
    write_archive(dir, &names, dest)
}

/// Slide parts under `dir/ppt/slides`, ordered by slide number.
///
/// Ordering is numeric (`slide2.xml` before `slide10.xml`); a missing
/// slides directory yields an empty list.
pub fn list_slide_parts(dir: &Path) -> Result<Vec<PathBuf>> {
    let slides_dir = dir.join("ppt").join("slides");
    if !slides_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut slides: Vec<(u64, String, PathBuf)> = Vec::new();
    for entry in fs::read_dir(&slides_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(number) = slide_number(&name) {
            slides.push((number, name, entry.path()));
        }
    }

    slides.sort();
    Ok(slides.into_iter().map(|(_, _, path)| path).collect())
}

/// Number of a slide part from its file name, e.g. `slide12.xml` → 12.
pub fn slide_number(file_name: &str) -> Option<u64> {
    SLIDE_PART_REGEX
        .captures(file_name)
        .and_then(|c| c[1].parse().ok())
}

/// Relative `/`-separated paths of all files under `dir`, sorted.
fn collect_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::IoError(io::Error::other(e.to_string())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| Error::IoError(io::Error::other(e.to_string())))?;
        let name: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        names.push(name.join("/"));
    }
    Ok(names)
}

fn write_archive(root: &Path, names: &[String], dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| Error::save(dest, e))?;
    }

    let file = File::create(dest).map_err(|e| Error::save(dest, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(file));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for name in names {
        let bytes = fs::read(root.join(name))?;
        zip.start_file(name.as_str(), options)
            .map_err(|e| Error::ZipError(format!("{}: {}", name, e)))?;
        zip.write_all(&bytes).map_err(|e| Error::save(dest, e))?;
    }

    let mut writer = zip
        .finish()
        .map_err(|e| Error::ZipError(format!("{}: {}", dest.display(), e)))?;
    writer.flush().map_err(|e| Error::save(dest, e))?;

    log::debug!("Packed {} parts into {}", names.len(), dest.display());
    Ok(())
}
