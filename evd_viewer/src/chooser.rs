use std::path::{Path, PathBuf};

use walkdir::WalkDir;

const EVENT_FILE_EXTENSION: &str = "jsonl";

/// Event files found under a directory, offered by the "choose file" flow.
#[derive(Debug, Clone, Default)]
pub struct FileChooser {
    root: PathBuf,
    entries: Vec<PathBuf>,
}

impl FileChooser {
    pub fn scan(root: &Path) -> Self {
        let mut entries = Vec::new();
        for entry in WalkDir::new(root).follow_links(true).into_iter() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("failed to traverse {}: {err}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let is_event_file = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(EVENT_FILE_EXTENSION));
            if is_event_file {
                entries.push(entry.into_path());
            }
        }
        entries.sort();
        log::debug!(
            "file chooser found {} event files under {}",
            entries.len(),
            root.display()
        );
        Self {
            root: root.to_path_buf(),
            entries,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Entry path relative to the chooser root, for button labels.
    pub fn entry_label(&self, index: usize) -> Option<String> {
        let path = self.entries.get(index)?;
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        Some(relative.display().to_string())
    }
}
