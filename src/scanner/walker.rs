//! Recursive directory scanner that yields the regular files of one tree.
//!
//! The scanner is read-only and single-threaded: it lists each directory once,
//! depth-first, and fails fast on the first directory it cannot list so that a
//! partial tree never reaches the pairing stage.

#![allow(missing_docs)]

use std::ffi::{OsStr, OsString};
use std::fs::{self, FileType};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::{PdError, Result};

/// A regular file discovered during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct FileRecord {
    /// Base file name as printable text. See [`display_name`].
    pub name: String,
    /// Base file name exactly as the filesystem reported it; the pairing key.
    #[serde(skip)]
    pub key: OsString,
    /// Absolute path of the file.
    pub path: PathBuf,
}

impl FileRecord {
    /// Build a record from an absolute path. Returns `None` for paths without
    /// a final component (such as `/`).
    pub fn from_path(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let key = path.file_name()?.to_os_string();
        Some(Self {
            name: display_name(&key),
            key,
            path,
        })
    }
}

/// Printable form of a file name.
///
/// Valid UTF-8 is returned unchanged. Anything else keeps its undecodable
/// bytes as `\xNN` escapes, so two distinct names never print the same.
pub fn display_name(name: &OsStr) -> String {
    match name.to_str() {
        Some(text) => text.to_string(),
        None => {
            let quoted = format!("{name:?}");
            quoted
                .strip_prefix('"')
                .and_then(|s| s.strip_suffix('"'))
                .unwrap_or(&quoted)
                .to_string()
        }
    }
}

/// Filters applied while scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    /// Drop files whose name ends with `metadata_extension`.
    pub exclude_metadata: bool,
    /// Case-sensitive name suffix marking metadata files.
    pub metadata_extension: String,
    /// Resolve symlinks; when off they are neither files nor directories.
    pub follow_symlinks: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            exclude_metadata: true,
            metadata_extension: ".xml".to_string(),
            follow_symlinks: false,
        }
    }
}

impl ScanOptions {
    /// Whether `name` carries the metadata suffix.
    #[must_use]
    pub fn is_metadata(&self, name: &str) -> bool {
        name.ends_with(&self.metadata_extension)
    }

    fn includes(&self, name: &str) -> bool {
        !(self.exclude_metadata && self.is_metadata(name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    File,
    Directory,
    Other,
}

impl From<FileType> for EntryKind {
    fn from(file_type: FileType) -> Self {
        if file_type.is_file() {
            Self::File
        } else if file_type.is_dir() {
            Self::Directory
        } else {
            Self::Other
        }
    }
}

/// Recursive file scanner for one directory tree.
pub struct DirectoryScanner<'a> {
    options: ScanOptions,
    observer: Option<Box<dyn Fn(&FileRecord) + 'a>>,
}

impl<'a> DirectoryScanner<'a> {
    pub fn new(options: ScanOptions) -> Self {
        Self {
            options,
            observer: None,
        }
    }

    /// Set a callback invoked for every accepted file, in discovery order.
    #[must_use]
    pub fn with_observer<F>(mut self, callback: F) -> Self
    where
        F: Fn(&FileRecord) + 'a,
    {
        self.observer = Some(Box::new(callback));
        self
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan `root` and return every accepted regular file below it.
    ///
    /// Order is depth-first by construction but callers must not rely on it.
    /// Any directory that cannot be listed aborts the scan.
    pub fn scan(&self, root: &Path) -> Result<Vec<FileRecord>> {
        let meta = fs::metadata(root).map_err(|source| PdError::directory_access(root, source))?;
        if !meta.is_dir() {
            return Err(PdError::NotADirectory {
                path: root.to_path_buf(),
            });
        }
        let root = std::path::absolute(root).map_err(|source| PdError::io(root, source))?;

        let mut records = Vec::new();
        self.scan_directory(&root, &mut records)?;
        Ok(records)
    }

    fn scan_directory(&self, dir: &Path, records: &mut Vec<FileRecord>) -> Result<()> {
        let entries = fs::read_dir(dir).map_err(|source| PdError::directory_access(dir, source))?;

        for entry_result in entries {
            let entry = entry_result.map_err(|source| PdError::directory_access(dir, source))?;
            let path = entry.path();

            match self.classify(&entry)? {
                EntryKind::File => {
                    let key = entry.file_name();
                    if !self.options.includes(&key.to_string_lossy()) {
                        continue;
                    }
                    let record = FileRecord {
                        name: display_name(&key),
                        key,
                        path,
                    };
                    if let Some(observer) = &self.observer {
                        observer(&record);
                    }
                    records.push(record);
                }
                EntryKind::Directory => self.scan_directory(&path, records)?,
                EntryKind::Other => {}
            }
        }
        Ok(())
    }

    fn classify(&self, entry: &fs::DirEntry) -> Result<EntryKind> {
        let file_type = entry
            .file_type()
            .map_err(|source| PdError::directory_access(entry.path(), source))?;
        if !file_type.is_symlink() {
            return Ok(file_type.into());
        }
        if !self.options.follow_symlinks {
            return Ok(EntryKind::Other);
        }
        match fs::metadata(entry.path()) {
            Ok(meta) => Ok(meta.file_type().into()),
            // Dangling link.
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(EntryKind::Other),
            Err(source) => Err(PdError::directory_access(entry.path(), source)),
        }
    }
}

/// Scan `root` with the default metadata suffix.
pub fn scan(root: &Path, exclude_metadata: bool) -> Result<Vec<FileRecord>> {
    DirectoryScanner::new(ScanOptions {
        exclude_metadata,
        ..ScanOptions::default()
    })
    .scan(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, rel).unwrap();
    }

    fn names(records: &[FileRecord]) -> HashSet<String> {
        records.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn excludes_metadata_files_when_requested() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.xml");
        touch(tmp.path(), "a.js");

        let records = scan(tmp.path(), true).unwrap();
        assert_eq!(names(&records), HashSet::from(["a.js".to_string()]));
    }

    #[test]
    fn includes_every_file_when_not_excluding() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.xml");
        touch(tmp.path(), "a.js");
        touch(tmp.path(), "nested/b.xml");

        let records = scan(tmp.path(), false).unwrap();
        assert_eq!(records.len(), 3);
        assert!(names(&records).contains("b.xml"));
    }

    #[test]
    fn recurses_into_subdirectories() {
        let tmp = TempDir::new().unwrap();
        // root/
        //   top.txt
        //   a/
        //     mid.txt
        //     b/
        //       deep.txt
        touch(tmp.path(), "top.txt");
        touch(tmp.path(), "a/mid.txt");
        touch(tmp.path(), "a/b/deep.txt");
        fs::create_dir_all(tmp.path().join("empty")).unwrap();

        let records = scan(tmp.path(), true).unwrap();
        assert_eq!(
            names(&records),
            HashSet::from([
                "top.txt".to_string(),
                "mid.txt".to_string(),
                "deep.txt".to_string()
            ])
        );
        let deep = records.iter().find(|r| r.name == "deep.txt").unwrap();
        assert!(deep.path.is_absolute());
        assert!(deep.path.ends_with(Path::new("a").join("b").join("deep.txt")));
    }

    #[test]
    fn metadata_suffix_is_case_sensitive() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "upper.XML");
        touch(tmp.path(), "lower.xml");

        let records = scan(tmp.path(), true).unwrap();
        assert_eq!(names(&records), HashSet::from(["upper.XML".to_string()]));
    }

    #[test]
    fn suffix_match_is_plain_not_extension_based() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "layout-meta.xml");
        touch(tmp.path(), "xml");
        touch(tmp.path(), "notes.xml.bak");

        let records = scan(tmp.path(), true).unwrap();
        assert_eq!(
            names(&records),
            HashSet::from(["xml".to_string(), "notes.xml.bak".to_string()])
        );
    }

    #[test]
    fn custom_metadata_extension() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Account.cls");
        touch(tmp.path(), "Account.cls-meta.xml");
        touch(tmp.path(), "Account.json");

        let scanner = DirectoryScanner::new(ScanOptions {
            metadata_extension: ".json".to_string(),
            ..ScanOptions::default()
        });
        let records = scanner.scan(tmp.path()).unwrap();
        assert_eq!(
            names(&records),
            HashSet::from([
                "Account.cls".to_string(),
                "Account.cls-meta.xml".to_string()
            ])
        );
    }

    #[test]
    fn missing_root_is_directory_access_error() {
        let tmp = TempDir::new().unwrap();
        let err = scan(&tmp.path().join("missing"), true).unwrap_err();
        assert!(matches!(err, PdError::DirectoryAccess { .. }));
        assert!(err.to_string().contains("missing"));
        assert!(err.is_fatal());
    }

    #[test]
    fn file_root_is_rejected() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "plain.txt");
        let err = scan(&tmp.path().join("plain.txt"), true).unwrap_err();
        assert!(matches!(err, PdError::NotADirectory { .. }));
    }

    #[test]
    fn rescanning_unchanged_tree_yields_same_names() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "x/1.js");
        touch(tmp.path(), "y/2.js");
        touch(tmp.path(), "3.xml");

        let first = scan(tmp.path(), false).unwrap();
        let second = scan(tmp.path(), false).unwrap();
        assert_eq!(names(&first), names(&second));
    }

    #[test]
    fn scan_does_not_touch_the_tree() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a/1.js");
        let before = fs::read_dir(tmp.path().join("a")).unwrap().count();
        scan(tmp.path(), true).unwrap();
        let after = fs::read_dir(tmp.path().join("a")).unwrap().count();
        assert_eq!(before, after);
        assert_eq!(fs::read_to_string(tmp.path().join("a/1.js")).unwrap(), "a/1.js");
    }

    #[test]
    fn observer_sees_each_accepted_file() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.js");
        touch(tmp.path(), "sub/b.js");
        touch(tmp.path(), "skip.xml");

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let scanner = DirectoryScanner::new(ScanOptions::default())
            .with_observer(move |record| sink.borrow_mut().push(record.name.clone()));
        let records = scanner.scan(tmp.path()).unwrap();

        assert_eq!(seen.borrow().len(), records.len());
        assert!(!seen.borrow().contains(&"skip.xml".to_string()));
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_skipped_unless_followed() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        touch(outside.path(), "linked/inner.js");
        touch(outside.path(), "target.js");
        touch(tmp.path(), "real.js");
        std::os::unix::fs::symlink(outside.path().join("target.js"), tmp.path().join("alias.js"))
            .unwrap();
        std::os::unix::fs::symlink(outside.path().join("linked"), tmp.path().join("dirlink"))
            .unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone.js"), tmp.path().join("dangling.js"))
            .unwrap();

        let plain = scan(tmp.path(), true).unwrap();
        assert_eq!(names(&plain), HashSet::from(["real.js".to_string()]));

        let following = DirectoryScanner::new(ScanOptions {
            follow_symlinks: true,
            ..ScanOptions::default()
        })
        .scan(tmp.path())
        .unwrap();
        assert_eq!(
            names(&following),
            HashSet::from([
                "real.js".to_string(),
                "alias.js".to_string(),
                "inner.js".to_string()
            ])
        );
    }

    #[test]
    fn file_record_from_path() {
        let record = FileRecord::from_path("/tmp/src/Test1.js").unwrap();
        assert_eq!(record.name, "Test1.js");
        assert_eq!(record.key, OsString::from("Test1.js"));
        assert!(FileRecord::from_path("/").is_none());
    }

    #[cfg(unix)]
    #[test]
    fn undecodable_names_keep_distinct_keys_and_labels() {
        use std::os::unix::ffi::OsStrExt;

        let ff = FileRecord::from_path(Path::new(OsStr::from_bytes(b"/s/a\xff.js"))).unwrap();
        let fe = FileRecord::from_path(Path::new(OsStr::from_bytes(b"/s/a\xfe.js"))).unwrap();
        assert_ne!(ff.key, fe.key);
        assert_ne!(ff.name, fe.name);
        assert_eq!(ff.name, "a\\xFF.js");
    }

    // Linux filesystems accept arbitrary bytes in names; APFS does not.
    #[cfg(target_os = "linux")]
    #[test]
    fn scan_reports_raw_name_for_undecodable_file() {
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        let raw = OsStr::from_bytes(b"odd\xff.js");
        fs::write(tmp.path().join(raw), "x").unwrap();
        touch(tmp.path(), "odd\u{fffd}.js");

        let records = scan(tmp.path(), true).unwrap();
        assert_eq!(records.len(), 2);
        let keys: HashSet<&OsStr> = records.iter().map(|r| r.key.as_os_str()).collect();
        assert!(keys.contains(raw));
        assert_eq!(names(&records).len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn unresolvable_entry_below_root_aborts_scan() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "top.js");
        touch(tmp.path(), "sub/inner.js");
        // A link to itself cannot be resolved (ELOOP).
        std::os::unix::fs::symlink("loop", tmp.path().join("sub").join("loop")).unwrap();

        let scanner = DirectoryScanner::new(ScanOptions {
            follow_symlinks: true,
            ..ScanOptions::default()
        });
        match scanner.scan(tmp.path()) {
            Err(PdError::DirectoryAccess { path, .. }) => {
                assert!(path.ends_with(Path::new("sub").join("loop")), "{path:?}");
            }
            other => panic!("expected DirectoryAccess, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn unlistable_subdirectory_aborts_scan() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "top.js");
        touch(tmp.path(), "locked/hidden.js");
        let locked = tmp.path().join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Root ignores directory permissions; nothing to check then.
        let listable = fs::read_dir(&locked).is_ok();
        let result = scan(tmp.path(), true);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if listable {
            return;
        }

        match result {
            Err(PdError::DirectoryAccess { path, .. }) => {
                assert_eq!(path, std::path::absolute(&locked).unwrap());
            }
            other => panic!("expected DirectoryAccess, got {other:?}"),
        }
    }
}
