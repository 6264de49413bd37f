use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{MkabookError, Result};

/// Extensions recognised as input audio
pub const AUDIO_EXTENSIONS: &[&str] = &["mka", "m4a", "m4b", "flac", "ogg", "mp3"];

/// Cover art names probed in order
pub const COVER_SEARCH_ITEMS: &[&str] = &["cover.jpg", "cover.jpeg", "cover.png"];

/// Chapter definition names probed in order
pub const CHAPTERS_SEARCH_ITEMS: &[&str] =
    &["chapters.xml", "chapter.xml", "chapters.txt", "chapter.txt"];

/// Immediate entries of `dir`, sorted by path
fn immediate_entries(dir: &Path) -> Result<Vec<walkdir::DirEntry>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let message = e.to_string();
            MkabookError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, message)),
            )
        })?;
        entries.push(entry);
    }
    Ok(entries)
}

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// Find input audio files directly inside `dir`.
///
/// `exclude` keeps a previously written audiobook in the same directory from
/// being picked up as an input on the next run.
pub fn discover_audio_files(dir: &Path, exclude: Option<&Path>) -> Result<Vec<PathBuf>> {
    let files: Vec<PathBuf> = immediate_entries(dir)?
        .into_iter()
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| is_audio_file(path))
        .filter(|path| exclude.map_or(true, |excluded| !same_file(path, excluded)))
        .collect();

    debug!("🔍 Found {} audio files in {}", files.len(), dir.display());
    Ok(files)
}

/// First of `names` that exists as a regular file in `dir`
pub fn find_first_file(dir: &Path, names: &[&str]) -> Option<PathBuf> {
    names
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// Sub-directories of `root`, each one a batch item
pub fn discover_items(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(MkabookError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let items = immediate_entries(root)?
        .into_iter()
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.into_path())
        .collect();

    Ok(items)
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn test_discover_audio_files_filters_and_sorts() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        touch(dir, "02 - Part.mp3");
        touch(dir, "01 - Part.MP3");
        touch(dir, "cover.jpg");
        touch(dir, "notes.txt");
        touch(dir, "03 - Part.m4b");
        std::fs::create_dir(dir.join("extras.mp3")).unwrap();

        let files = discover_audio_files(dir, None).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["01 - Part.MP3", "02 - Part.mp3", "03 - Part.m4b"]);
    }

    #[test]
    fn test_discover_audio_files_skips_excluded_output() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        touch(dir, "part1.flac");
        let previous = touch(dir, "Book.mka");

        let files = discover_audio_files(dir, Some(&previous)).unwrap();
        assert_eq!(files, vec![dir.join("part1.flac")]);
    }

    #[test]
    fn test_find_first_file_respects_order() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        touch(dir, "cover.png");
        touch(dir, "cover.jpeg");

        assert_eq!(
            find_first_file(dir, COVER_SEARCH_ITEMS),
            Some(dir.join("cover.jpeg"))
        );
        assert_eq!(find_first_file(dir, CHAPTERS_SEARCH_ITEMS), None);
    }

    #[test]
    fn test_discover_items_only_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        std::fs::create_dir(root.join("b-book")).unwrap();
        std::fs::create_dir(root.join("a-book")).unwrap();
        touch(root, "stray.mp3");

        let items = discover_items(root).unwrap();
        assert_eq!(items, vec![root.join("a-book"), root.join("b-book")]);
    }

    #[test]
    fn test_discover_items_rejects_file_root() {
        let temp_dir = TempDir::new().unwrap();
        let file = touch(temp_dir.path(), "book.mp3");

        let err = discover_items(&file).unwrap_err();
        assert!(matches!(err, MkabookError::NotADirectory { .. }));
    }
}
