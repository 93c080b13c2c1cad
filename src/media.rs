//! Media files that travel alongside a page.
//!
//! Everything in a page directory whose extension is in the media set is
//! copied next to the rendered page. Copies are "copy if newer": a file is
//! copied when the destination is missing or the source's modification time
//! is strictly newer. The copy takes over the source's modification time so
//! a second run sees the pair as up to date.
//!
//! A file named `thumb.*` is the page's preview image. It is copied but kept
//! out of the `images` list so templates don't show it twice.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What a media file is, decided by extension (case-insensitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
    Video,
    Document,
    Script,
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4"];
const DOCUMENT_EXTENSIONS: &[&str] = &["html", "pdf", "fcstd"];
const SCRIPT_EXTENSIONS: &[&str] = &["js", "pde", "class"];

/// Classify a file by extension. `None` for files that are not copied.
pub fn classify(path: &Path) -> Option<MediaKind> {
    let ext = path.extension()?.to_string_lossy().to_lowercase();
    let ext = ext.as_str();
    if IMAGE_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Image)
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Audio)
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Video)
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Document)
    } else if SCRIPT_EXTENSIONS.contains(&ext) {
        Some(MediaKind::Script)
    } else {
        None
    }
}

/// True for `thumb.*`, compared case-insensitively.
pub fn is_thumbnail(file_name: &str) -> bool {
    Path::new(file_name)
        .file_stem()
        .is_some_and(|stem| stem.to_string_lossy().eq_ignore_ascii_case("thumb"))
}

/// True when `dest` is missing or `src` was modified strictly after it.
pub fn is_newer(src: &Path, dest: &Path) -> io::Result<bool> {
    let dest_meta = match fs::metadata(dest) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    let src_modified = fs::metadata(src)?.modified()?;
    Ok(src_modified > dest_meta.modified()?)
}

/// Copy `src` into `dest_dir` when it is newer than the existing copy.
///
/// Returns the destination path when a copy was made.
pub fn copy_if_newer(src: &Path, dest_dir: &Path) -> io::Result<Option<PathBuf>> {
    let Some(name) = src.file_name() else {
        return Ok(None);
    };
    let dest = dest_dir.join(name);
    if !is_newer(src, &dest)? {
        return Ok(None);
    }
    fs::copy(src, &dest)?;
    let modified = fs::metadata(src)?.modified()?;
    fs::File::options()
        .write(true)
        .open(&dest)?
        .set_modified(modified)?;
    Ok(Some(dest))
}

/// Media found in one page directory, split the way templates use it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MediaListing {
    /// Image file names, without the thumbnail.
    pub images: Vec<String>,
    /// Script-like file names (`.js`, `.pde`, `.class`).
    pub scripts: Vec<String>,
    /// Every non-script media file name, without the thumbnail.
    pub media: Vec<String>,
    /// Destination paths actually written in this run.
    pub copied: Vec<PathBuf>,
}

/// Copy every media file of `src_dir` listed in `files` into `dest_dir`.
///
/// `files` is the directory's file list in sorted order; listings keep that
/// order. `dest_dir` must already exist.
pub fn copy_media(src_dir: &Path, files: &[String], dest_dir: &Path) -> io::Result<MediaListing> {
    let mut listing = MediaListing::default();
    for name in files {
        let src = src_dir.join(name);
        let Some(kind) = classify(&src) else {
            continue;
        };
        if let Some(dest) = copy_if_newer(&src, dest_dir)? {
            tracing::debug!(file = %dest.display(), "copied media");
            listing.copied.push(dest);
        }
        match kind {
            MediaKind::Script => listing.scripts.push(name.clone()),
            _ if is_thumbnail(name) => {}
            MediaKind::Image => {
                listing.images.push(name.clone());
                listing.media.push(name.clone());
            }
            _ => listing.media.push(name.clone()),
        }
    }
    Ok(listing)
}
