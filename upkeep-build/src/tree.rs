//! Directory-tree helpers shared by backup and packaging.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{io_err, BuildError};

/// Recursively copy `src` into `dst` (created if missing).
///
/// Symlinks are recreated as links on Unix and followed elsewhere.
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> Result<u64, BuildError> {
    std::fs::create_dir_all(dst).map_err(|e| io_err(dst, e))?;
    let mut copied = 0;
    for entry in std::fs::read_dir(src).map_err(|e| io_err(src, e))? {
        let entry = entry.map_err(|e| io_err(src, e))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| io_err(&from, e))?;

        if file_type.is_dir() {
            copied += copy_tree(&from, &to)?;
        } else if file_type.is_symlink() {
            copy_link(&from, &to)?;
            copied += 1;
        } else {
            std::fs::copy(&from, &to).map_err(|e| io_err(&from, e))?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[cfg(unix)]
fn copy_link(from: &Path, to: &Path) -> Result<(), BuildError> {
    let target = std::fs::read_link(from).map_err(|e| io_err(from, e))?;
    std::os::unix::fs::symlink(&target, to).map_err(|e| io_err(to, e))
}

#[cfg(not(unix))]
fn copy_link(from: &Path, to: &Path) -> Result<(), BuildError> {
    std::fs::copy(from, to).map(|_| ()).map_err(|e| io_err(from, e))
}

/// Every non-directory entry below `root`, sorted.
pub(crate) fn files(root: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let mut out = Vec::new();
    collect(root, &mut out)?;
    out.sort();
    Ok(out)
}

fn collect(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), BuildError> {
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        if entry.file_type().map_err(|e| io_err(&path, e))?.is_dir() {
            collect(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}

/// `/`-separated path of `path` relative to `base`.
pub(crate) fn relative_name(base: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(base).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// SHA-256 of every file below `root`, keyed by relative name.
///
/// Symlinks hash their target path rather than the pointee.
pub(crate) fn digest(root: &Path) -> Result<BTreeMap<String, String>, BuildError> {
    let mut digests = BTreeMap::new();
    for path in files(root)? {
        let meta = std::fs::symlink_metadata(&path).map_err(|e| io_err(&path, e))?;
        let mut h = Sha256::new();
        if meta.file_type().is_symlink() {
            let target = std::fs::read_link(&path).map_err(|e| io_err(&path, e))?;
            h.update(target.to_string_lossy().as_bytes());
        } else {
            let mut file = File::open(&path).map_err(|e| io_err(&path, e))?;
            io::copy(&mut file, &mut h).map_err(|e| io_err(&path, e))?;
        }
        digests.insert(relative_name(root, &path), hex::encode(h.finalize()));
    }
    Ok(digests)
}

/// Remove `path` whether it is a directory, a file or absent.
pub(crate) fn remove(path: &Path) -> Result<(), BuildError> {
    let result = match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    };
    result.map_err(|e| io_err(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample(root: &Path) {
        std::fs::create_dir_all(root.join("lib/nested")).unwrap();
        std::fs::write(root.join("DocuReader.exe"), b"MZ\x90\x00").unwrap();
        std::fs::write(root.join("lib/nested/data.bin"), b"payload").unwrap();
    }

    #[test]
    fn copy_preserves_contents() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        sample(&src);
        let dst = tmp.path().join("dst");

        assert_eq!(copy_tree(&src, &dst).unwrap(), 2);
        assert_eq!(digest(&src).unwrap(), digest(&dst).unwrap());
    }

    #[test]
    fn digest_keys_are_relative_and_slash_separated() {
        let tmp = TempDir::new().unwrap();
        sample(tmp.path());
        let keys: Vec<String> = digest(tmp.path()).unwrap().into_keys().collect();
        assert_eq!(keys, ["DocuReader.exe", "lib/nested/data.bin"]);
    }

    #[test]
    fn remove_tolerates_missing_paths() {
        let tmp = TempDir::new().unwrap();
        remove(&tmp.path().join("absent")).unwrap();
        sample(&tmp.path().join("tree"));
        remove(&tmp.path().join("tree")).unwrap();
        assert!(!tmp.path().join("tree").exists());
    }
}
