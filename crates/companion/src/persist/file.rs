//! [`FileRepo`]: one JSON file per collection, replaced by atomic rename.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use tracing::debug;

use super::{PersistError, RecordRepo};

/// Stores a document at `path`, writing `path.tmp` first and renaming it over
/// the target so readers never see a partial file.
#[derive(Debug, Clone)]
pub struct FileRepo {
    path: PathBuf,
}

impl FileRepo {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `dir/name`, the layout used for the service's record directory.
    pub fn in_dir(dir: impl AsRef<Path>, name: &str) -> Self {
        Self::new(dir.as_ref().join(name))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RecordRepo for FileRepo {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    fn load(&self) -> Result<Option<String>, PersistError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, contents: &str) -> Result<(), PersistError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(contents.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), bytes = contents.len(), "record file saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    fn scratch_dir() -> PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("companion-records-{}-{n}", std::process::id()))
    }

    #[test]
    fn missing_file_loads_as_none() {
        let repo = FileRepo::in_dir(scratch_dir(), "absent.json");
        assert!(repo.load().unwrap().is_none());
    }

    #[test]
    fn save_creates_directory_and_replaces_contents() {
        let dir = scratch_dir();
        let repo = FileRepo::in_dir(&dir, "metrics.json");

        repo.save(r#"{"v":1}"#).unwrap();
        repo.save(r#"{"v":2}"#).unwrap();

        assert_eq!(repo.load().unwrap().as_deref(), Some(r#"{"v":2}"#));
        assert!(!repo.tmp_path().exists(), "temporary file is renamed away");
        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn describe_names_the_path() {
        let repo = FileRepo::new("data/records/profiles.json");
        assert_eq!(repo.describe(), "file:data/records/profiles.json");
        assert_eq!(
            repo.tmp_path(),
            PathBuf::from("data/records/profiles.json.tmp")
        );
    }
}
