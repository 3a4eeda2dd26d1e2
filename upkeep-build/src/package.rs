//! Portable archive of the build output.
//!
//! Entries are stored relative to the build directory's parent, so the
//! archive unpacks into a single top-level folder named after the build
//! directory. The archive is written to `<name>.tmp` and renamed into place.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{io_err, BuildError};
use crate::tree;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSummary {
    pub path: PathBuf,
    pub files: usize,
    pub bytes: u64,
}

/// Zip `build_dir` into `archive`, replacing any previous archive.
pub fn package(build_dir: &Path, archive: &Path) -> Result<PackageSummary, BuildError> {
    if !build_dir.is_dir() {
        tracing::error!("cannot package: build directory {} not found", build_dir.display());
        return Err(BuildError::NothingToSnapshot {
            path: build_dir.to_path_buf(),
        });
    }
    if let Some(parent) = archive.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
    }
    tracing::info!("creating portable archive {}", archive.display());

    let mut tmp_name = archive.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = archive.with_file_name(tmp_name);

    let files = match write_archive(build_dir, &tmp) {
        Ok(files) => files,
        Err(err) => {
            tracing::error!(error = %err, "packaging failed");
            if let Err(cleanup) = tree::remove(&tmp) {
                tracing::warn!(error = %cleanup, "could not remove partial archive");
            }
            return Err(err);
        }
    };
    std::fs::rename(&tmp, archive).map_err(|e| io_err(archive, e))?;

    let bytes = std::fs::metadata(archive).map_err(|e| io_err(archive, e))?.len();
    tracing::info!(files, bytes, "portable archive created: {}", archive.display());
    Ok(PackageSummary {
        path: archive.to_path_buf(),
        files,
        bytes,
    })
}

fn write_archive(build_dir: &Path, tmp: &Path) -> Result<usize, BuildError> {
    let base = build_dir.parent().unwrap_or(build_dir);
    let out = File::create(tmp).map_err(|e| io_err(tmp, e))?;
    let mut zip = ZipWriter::new(BufWriter::new(out));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut count = 0;
    for path in tree::files(build_dir)? {
        if path.is_dir() {
            tracing::warn!(path = %path.display(), "skipping directory symlink");
            continue;
        }
        zip.start_file(tree::relative_name(base, &path), options)?;
        let mut file = File::open(&path).map_err(|e| io_err(&path, e))?;
        io::copy(&mut file, &mut zip).map_err(|e| io_err(&path, e))?;
        count += 1;
    }
    let mut writer = zip.finish()?;
    io::Write::flush(&mut writer).map_err(|e| io_err(tmp, e))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    fn build_tree(root: &Path) -> PathBuf {
        let build = root.join("freeze_build/cx_freeze");
        std::fs::create_dir_all(build.join("lib")).unwrap();
        std::fs::write(build.join("DocuReader.exe"), b"MZ-new").unwrap();
        std::fs::write(build.join("lib/python3.dll"), b"dll").unwrap();
        build
    }

    #[test]
    fn entries_are_relative_to_build_parent() {
        let tmp = TempDir::new().unwrap();
        let build = build_tree(tmp.path());
        let archive = tmp.path().join("DocuReader-0.2.3-portable.zip");

        let summary = package(&build, &archive).unwrap();
        assert_eq!(summary.files, 2);
        assert!(!tmp.path().join("DocuReader-0.2.3-portable.zip.tmp").exists());

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, ["cx_freeze/DocuReader.exe", "cx_freeze/lib/python3.dll"]);

        let mut exe = Vec::new();
        zip.by_name("cx_freeze/DocuReader.exe")
            .unwrap()
            .read_to_end(&mut exe)
            .unwrap();
        assert_eq!(exe, b"MZ-new");
    }

    #[test]
    fn existing_archive_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let build = build_tree(tmp.path());
        let archive = tmp.path().join("out.zip");
        std::fs::write(&archive, b"stale").unwrap();

        package(&build, &archive).unwrap();
        assert!(zip::ZipArchive::new(File::open(&archive).unwrap()).is_ok());
    }

    #[test]
    fn missing_build_dir_fails_without_leaving_files() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("out.zip");
        assert!(package(&tmp.path().join("absent"), &archive).is_err());
        assert!(!archive.exists());
    }
}
