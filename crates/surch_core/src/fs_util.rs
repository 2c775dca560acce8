use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Writes `content` to `path` atomically by writing to a temporary file
/// first, syncing to disk, then renaming into place. Missing parent
/// directories are created.
pub fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    ensure_parent_dir(path)?;

    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()?;

    // Drop file handle before rename (Windows compatibility)
    drop(file);

    fs::rename(&temp_path, path)
}

/// Creates the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Recursively removes `dir`. Returns `false` if it did not exist.
pub fn remove_dir_if_exists(dir: &Path) -> io::Result<bool> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn atomic_write_creates_missing_parents() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("results").join("acme").join("results.json");

        atomic_write(&target, "{}").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "{}");
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("results.json");
        fs::write(&target, "old content").unwrap();

        atomic_write(&target, "new content").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "new content");
    }

    #[test]
    fn atomic_write_does_not_leave_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("results.json");

        atomic_write(&target, "content").unwrap();

        assert!(!target.with_extension("tmp").exists());
        assert!(target.exists());
    }

    #[test]
    fn remove_dir_if_exists_reports_whether_it_removed() {
        let dir = tempfile::tempdir().unwrap();
        let clone = dir.path().join("acme").join("widgets");
        fs::create_dir_all(clone.join(".git")).unwrap();

        assert!(remove_dir_if_exists(&clone).unwrap());
        assert!(!clone.exists());
        assert!(!remove_dir_if_exists(&clone).unwrap());
    }
}
