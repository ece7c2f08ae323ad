//! Voxnote store crate - per-folder plain-text transcript persistence.
//!
//! Each folder is a directory under the store root; each persisted utterance
//! is its own one-line `.txt` file named after the capture time in epoch
//! milliseconds. Entries are append-only: once written they are deleted or
//! listed, never rewritten in place.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use voxnote_core::error::{Result, VoxnoteError};
use voxnote_core::types::Utterance;

/// Sort key for an entry file: epoch milliseconds from the stem, then the
/// collision suffix, with the unsuffixed file first within a millisecond.
fn entry_order(path: &Path) -> (i64, u32) {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let (millis, suffix) = match stem.split_once('-') {
        Some((millis, suffix)) => (millis, suffix.parse().unwrap_or(0)),
        None => (stem, 0),
    };
    (millis.parse().unwrap_or(i64::MAX), suffix)
}

/// Append-only transcript storage rooted at a single directory.
pub struct TranscriptStore {
    root: PathBuf,
}

impl TranscriptStore {
    /// Open a store at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "Transcript store opened");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder_path(&self, folder: &str) -> Result<PathBuf> {
        if folder.is_empty() || folder.contains(['/', '\\']) || folder == "." || folder == ".." {
            return Err(VoxnoteError::Storage(format!(
                "invalid folder name: {folder:?}"
            )));
        }
        Ok(self.root.join(folder))
    }

    /// Persist one utterance into `folder`, creating the folder on demand.
    ///
    /// The entry file is named `<millis>.txt` after the utterance timestamp;
    /// if two utterances land in the same millisecond a numeric suffix keeps
    /// them distinct. Returns the path written.
    pub fn append(&self, folder: &str, utterance: &Utterance) -> Result<PathBuf> {
        let dir = self.folder_path(folder)?;
        fs::create_dir_all(&dir)?;

        let millis = utterance.timestamp.timestamp_millis();
        let mut path = dir.join(format!("{millis}.txt"));
        let mut suffix = 1u32;
        while path.exists() {
            path = dir.join(format!("{millis}-{suffix}.txt"));
            suffix += 1;
        }

        fs::write(&path, format!("{}\n", utterance.render_line()))?;
        debug!(folder, path = %path.display(), "Utterance persisted");
        Ok(path)
    }

    fn entry_files(&self, folder: &str) -> Result<Vec<PathBuf>> {
        let dir = self.folder_path(folder)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
            .collect();
        files.sort();
        // Capture-time order. Lexical order alone would put `<millis>-1.txt`
        // before `<millis>.txt`; the stable sort keeps it as the tiebreaker
        // for stems that don't parse.
        files.sort_by_key(|p| entry_order(p));
        Ok(files)
    }

    /// Stored lines in `folder`, ordered by capture time.
    ///
    /// `filter` narrows the result to lines containing the given text,
    /// case-insensitively. A missing folder lists as empty.
    pub fn list(&self, folder: &str, filter: Option<&str>) -> Result<Vec<String>> {
        let needle = filter.map(str::to_lowercase);
        let mut lines = Vec::new();
        for path in self.entry_files(folder)? {
            let line = fs::read_to_string(&path)?.trim_end().to_string();
            if let Some(needle) = &needle {
                if !line.to_lowercase().contains(needle) {
                    continue;
                }
            }
            lines.push(line);
        }
        Ok(lines)
    }

    /// Parsed utterances in `folder`, ordered by capture time.
    ///
    /// Entries that no longer parse are skipped with a warning rather than
    /// failing the whole read.
    pub fn read_utterances(&self, folder: &str) -> Result<Vec<Utterance>> {
        let mut utterances = Vec::new();
        for path in self.entry_files(folder)? {
            let line = fs::read_to_string(&path)?;
            match Utterance::parse_line(line.trim_end()) {
                Some(utterance) => utterances.push(utterance),
                None => warn!(path = %path.display(), "Skipping unparseable entry"),
            }
        }
        Ok(utterances)
    }

    /// Delete every entry in `folder` whose full stored line matches `line`.
    /// Returns the number of entries removed.
    pub fn remove_entry(&self, folder: &str, line: &str) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_files(folder)? {
            if fs::read_to_string(&path)?.trim_end() == line {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
        debug!(folder, removed, "Entries removed");
        Ok(removed)
    }

    /// Delete every entry in `folder`, keeping the folder itself.
    pub fn clear(&self, folder: &str) -> Result<()> {
        for path in self.entry_files(folder)? {
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// Folder names under the root, sorted.
    pub fn folders(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }

    pub fn create_folder(&self, folder: &str) -> Result<()> {
        fs::create_dir_all(self.folder_path(folder)?)?;
        Ok(())
    }

    /// Rename `from` to `to`. Fails if `to` already exists.
    pub fn rename_folder(&self, from: &str, to: &str) -> Result<()> {
        let src = self.folder_path(from)?;
        let dst = self.folder_path(to)?;
        if !src.is_dir() {
            return Err(VoxnoteError::Storage(format!("no such folder: {from:?}")));
        }
        if dst.exists() {
            return Err(VoxnoteError::Storage(format!(
                "folder already exists: {to:?}"
            )));
        }
        fs::rename(src, dst)?;
        Ok(())
    }

    /// Delete `folder` and all of its entries.
    pub fn delete_folder(&self, folder: &str) -> Result<()> {
        let dir = self.folder_path(folder)?;
        if !dir.is_dir() {
            return Err(VoxnoteError::Storage(format!("no such folder: {folder:?}")));
        }
        fs::remove_dir_all(dir)?;
        Ok(())
    }
}

// ===== Tests =====

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};

    fn utterance_at(millis: i64, text: &str) -> Utterance {
        Utterance {
            timestamp: Local.timestamp_millis_opt(millis).unwrap(),
            text: text.to_string(),
        }
    }

    fn test_store() -> (tempfile::TempDir, TranscriptStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::open(dir.path().join("data")).unwrap();
        (dir, store)
    }

    #[test]
    fn test_append_and_list() {
        let (_dir, store) = test_store();
        store
            .append("General", &utterance_at(1_700_000_000_000, "compra leche"))
            .unwrap();
        store
            .append("General", &utterance_at(1_700_000_001_000, "llama a Ana"))
            .unwrap();

        let lines = store.list("General", None).unwrap();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("compra leche"));
        assert!(lines[1].ends_with("llama a Ana"));
    }

    #[test]
    fn test_list_filter_is_case_insensitive() {
        let (_dir, store) = test_store();
        store
            .append("General", &utterance_at(1_700_000_000_000, "Compra Leche"))
            .unwrap();
        store
            .append("General", &utterance_at(1_700_000_001_000, "llama a Ana"))
            .unwrap();

        let lines = store.list("General", Some("leche")).unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("Compra Leche"));
    }

    #[test]
    fn test_list_missing_folder_is_empty() {
        let (_dir, store) = test_store();
        assert!(store.list("nope", None).unwrap().is_empty());
    }

    #[test]
    fn test_same_millisecond_entries_both_kept() {
        let (_dir, store) = test_store();
        let u = utterance_at(1_700_000_000_000, "uno");
        let first = store.append("General", &u).unwrap();
        let second = store.append("General", &u).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.list("General", None).unwrap().len(), 2);
    }

    #[test]
    fn test_same_millisecond_entries_keep_write_order() {
        let (_dir, store) = test_store();
        store
            .append("General", &utterance_at(1_700_000_000_000, "uno"))
            .unwrap();
        store
            .append("General", &utterance_at(1_700_000_000_000, "dos"))
            .unwrap();
        store
            .append("General", &utterance_at(1_700_000_001_000, "tres"))
            .unwrap();

        let lines = store.list("General", None).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("uno"));
        assert!(lines[1].ends_with("dos"));
        assert!(lines[2].ends_with("tres"));
    }

    #[test]
    fn test_read_utterances_round_trip() {
        let (_dir, store) = test_store();
        let original = utterance_at(1_700_000_000_000, "compra leche");
        store.append("General", &original).unwrap();

        let read = store.read_utterances("General").unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].text, original.text);
        // Stored precision is seconds.
        assert_eq!(
            read[0].timestamp.timestamp(),
            original.timestamp.timestamp()
        );
    }

    #[test]
    fn test_remove_entry() {
        let (_dir, store) = test_store();
        store
            .append("General", &utterance_at(1_700_000_000_000, "borrar esto"))
            .unwrap();
        store
            .append("General", &utterance_at(1_700_000_001_000, "conservar"))
            .unwrap();

        let line = store.list("General", Some("borrar")).unwrap().remove(0);
        assert_eq!(store.remove_entry("General", &line).unwrap(), 1);

        let remaining = store.list("General", None).unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].ends_with("conservar"));
    }

    #[test]
    fn test_clear_keeps_folder() {
        let (_dir, store) = test_store();
        store
            .append("General", &utterance_at(1_700_000_000_000, "x"))
            .unwrap();
        store.clear("General").unwrap();
        assert!(store.list("General", None).unwrap().is_empty());
        assert_eq!(store.folders().unwrap(), vec!["General".to_string()]);
    }

    #[test]
    fn test_folder_management() {
        let (_dir, store) = test_store();
        store.create_folder("Trabajo").unwrap();
        store.create_folder("Casa").unwrap();
        assert_eq!(
            store.folders().unwrap(),
            vec!["Casa".to_string(), "Trabajo".to_string()]
        );

        store.rename_folder("Casa", "Hogar").unwrap();
        assert_eq!(
            store.folders().unwrap(),
            vec!["Hogar".to_string(), "Trabajo".to_string()]
        );

        store.delete_folder("Trabajo").unwrap();
        assert_eq!(store.folders().unwrap(), vec!["Hogar".to_string()]);
    }

    #[test]
    fn test_rename_to_existing_folder_fails() {
        let (_dir, store) = test_store();
        store.create_folder("A").unwrap();
        store.create_folder("B").unwrap();
        assert!(matches!(
            store.rename_folder("A", "B"),
            Err(VoxnoteError::Storage(_))
        ));
    }

    #[test]
    fn test_invalid_folder_name_rejected() {
        let (_dir, store) = test_store();
        let u = utterance_at(1_700_000_000_000, "x");
        assert!(store.append("../escape", &u).is_err());
        assert!(store.append("", &u).is_err());
        assert!(store.create_folder("a/b").is_err());
    }
}
