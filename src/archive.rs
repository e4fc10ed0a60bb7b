//! Zips the result file once the scan is over.
use anyhow::Context;
use log::{debug, warn};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// `<output>.zip`, next to the output file.
pub fn archive_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".zip");
    PathBuf::from(name)
}

/// Writes a deflate zip of `src` to `dst`.
///
/// `src` may be a file or a directory, which is walked recursively. Entry
/// names are relative to the parent of `src`. Entries that cannot be read
/// are skipped. The archive is assembled in memory and only written to
/// `dst` once complete; `src` is left in place.
pub fn compress(src: &Path, dst: &Path) -> anyhow::Result<()> {
    let base = src.parent().unwrap_or_else(|| Path::new(""));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry while archiving: {e}");
                continue;
            }
        };
        let Some(name) = entry_name(base, entry.path()) else {
            continue;
        };

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
            continue;
        }

        let content = match fs::read(entry.path()) {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping {} while archiving: {e}", entry.path().display());
                continue;
            }
        };
        debug!("Archiving {name} ({} bytes)", content.len());
        zip.start_file(name, options)?;
        zip.write_all(&content)?;
    }

    let buffer = zip.finish()?.into_inner();
    fs::write(dst, buffer).with_context(|| format!("Could not write {}", dst.display()))
}

/// Zip entry names always use `/`.
fn entry_name(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<_> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::{archive_path, compress};
    use std::fs;
    use std::io::Read;
    use std::path::Path;
    use zip::{CompressionMethod, ZipArchive};

    #[test]
    fn archive_path_appends_extension() {
        assert_eq!(
            archive_path(Path::new("out/result.json")),
            Path::new("out/result.json.zip")
        );
    }

    #[test]
    fn single_file_is_deflated_and_kept() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("result.json");
        fs::write(&src, "{\"ip\":\"203.0.113.1\"}\n".repeat(100)).unwrap();
        let dst = archive_path(&src);

        compress(&src, &dst).unwrap();

        assert!(src.exists());
        let mut archive = ZipArchive::new(fs::File::open(&dst).unwrap()).unwrap();
        assert_eq!(archive.len(), 1);
        let mut entry = archive.by_index(0).unwrap();
        assert_eq!(entry.name(), "result.json");
        assert_eq!(entry.compression(), CompressionMethod::Deflated);
        let mut content = String::new();
        entry.read_to_string(&mut content).unwrap();
        assert_eq!(content.lines().count(), 100);
    }

    #[test]
    fn directory_is_walked_with_relative_names() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("scan");
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("a.json"), "a").unwrap();
        fs::write(root.join("nested").join("b.json"), "b").unwrap();
        let dst = dir.path().join("scan.zip");

        compress(&root, &dst).unwrap();

        let archive = ZipArchive::new(fs::File::open(&dst).unwrap()).unwrap();
        let mut names: Vec<&str> = archive.file_names().collect();
        names.sort_unstable();
        assert_eq!(
            names,
            ["scan/", "scan/a.json", "scan/nested/", "scan/nested/b.json"]
        );
    }

    #[test]
    fn missing_source_gives_empty_archive() {
        let dir = tempfile::tempdir().unwrap();
        let dst = dir.path().join("none.zip");

        compress(&dir.path().join("missing.json"), &dst).unwrap();

        let archive = ZipArchive::new(fs::File::open(&dst).unwrap()).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
