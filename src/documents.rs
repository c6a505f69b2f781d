//! In-memory document store.
//!
//! Holds extracted text by document id. Only plain-text formats are accepted;
//! binary formats need an extraction step that lives outside this crate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::MAX_FILE_SIZE;
use crate::models::{DocumentInfo, DocumentType};
use crate::{Error, Result};

const SUMMARY_CHARS: usize = 200;

#[derive(Debug, Clone)]
struct StoredDocument {
    info: DocumentInfo,
    content: String,
}

pub struct DocumentStore {
    documents: RwLock<HashMap<String, StoredDocument>>,
    max_file_size: usize,
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(MAX_FILE_SIZE)
    }
}

impl DocumentStore {
    pub fn new(max_file_size: usize) -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            max_file_size,
        }
    }

    /// Store an uploaded file and return its metadata.
    pub fn add(&self, filename: &str, bytes: &[u8]) -> Result<DocumentInfo> {
        if bytes.len() > self.max_file_size {
            return Err(Error::FileTooLarge {
                size: bytes.len(),
                limit: self.max_file_size,
            });
        }

        let doc_type = DocumentType::from_filename(filename)
            .ok_or_else(|| Error::UnsupportedFileType(filename.to_string()))?;

        let content = String::from_utf8_lossy(bytes).into_owned();
        let summary: String = content.chars().take(SUMMARY_CHARS).collect();

        let info = DocumentInfo {
            id: Uuid::new_v4().to_string(),
            name: filename.to_string(),
            doc_type,
            upload_time: Utc::now().to_rfc3339(),
            size: bytes.len(),
            content_summary: (!summary.trim().is_empty()).then_some(summary),
        };

        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                info.id.clone(),
                StoredDocument {
                    info: info.clone(),
                    content,
                },
            );

        info!("Document uploaded: {} ({})", info.name, info.id);
        Ok(info)
    }

    /// Load every supported file under `dir`; unsupported files are skipped.
    pub fn load_dir<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<DocumentInfo>> {
        let mut loaded = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::IoError(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if DocumentType::from_filename(&name).is_none() {
                continue;
            }

            let bytes = std::fs::read(entry.path())?;
            match self.add(&name, &bytes) {
                Ok(info) => loaded.push(info),
                Err(err) => warn!("Skipping {}: {}", entry.path().display(), err),
            }
        }

        Ok(loaded)
    }

    /// Texts of the given ids, in request order. Unknown ids are skipped.
    pub fn get_content(&self, ids: &[String]) -> Vec<String> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        ids.iter()
            .filter_map(|id| documents.get(id).map(|d| d.content.clone()))
            .collect()
    }

    /// Pairs of (id, text) for indexing.
    pub fn get_named_content(&self, ids: &[String]) -> Vec<(String, String)> {
        let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
        ids.iter()
            .filter_map(|id| documents.get(id).map(|d| (id.clone(), d.content.clone())))
            .collect()
    }

    /// Metadata for all documents, oldest upload first.
    pub fn list(&self) -> Vec<DocumentInfo> {
        let mut infos: Vec<DocumentInfo> = self
            .documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|d| d.info.clone())
            .collect();
        infos.sort_by(|a, b| a.upload_time.cmp(&b.upload_time).then(a.name.cmp(&b.name)));
        infos
    }

    pub fn delete(&self, id: &str) -> bool {
        let removed = self
            .documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some();
        if removed {
            info!("Document deleted: {}", id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_and_fetch_text_document() {
        let store = DocumentStore::default();
        let info = store.add("notes.txt", b"Patient report: all clear").unwrap();

        assert_eq!(info.doc_type, DocumentType::Txt);
        assert_eq!(info.size, 25);
        assert_eq!(
            info.content_summary.as_deref(),
            Some("Patient report: all clear")
        );
        assert_eq!(
            store.get_content(&[info.id.clone()]),
            vec!["Patient report: all clear".to_string()]
        );
    }

    #[test]
    fn rejects_unsupported_and_oversized_files() {
        let store = DocumentStore::new(4);

        let err = store.add("scan.pdf", b"%PDF").unwrap_err();
        assert!(matches!(err, Error::UnsupportedFileType(_)));

        let err = store.add("big.txt", b"12345").unwrap_err();
        assert!(matches!(err, Error::FileTooLarge { size: 5, limit: 4 }));
        assert!(store.is_empty());
    }

    #[test]
    fn get_content_skips_unknown_ids_and_keeps_order() {
        let store = DocumentStore::default();
        let a = store.add("a.txt", b"alpha").unwrap();
        let b = store.add("b.md", b"beta").unwrap();

        let content = store.get_content(&[b.id.clone(), "missing".to_string(), a.id.clone()]);
        assert_eq!(content, vec!["beta".to_string(), "alpha".to_string()]);
    }

    #[test]
    fn delete_reports_whether_document_existed() {
        let store = DocumentStore::default();
        let info = store.add("a.txt", b"alpha").unwrap();

        assert!(store.delete(&info.id));
        assert!(!store.delete(&info.id));
        assert!(store.list().is_empty());
    }

    #[test]
    fn load_dir_picks_up_text_files_only() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(dir.path().join("one.txt"), "first").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("two.md"), "# second").unwrap();
        std::fs::write(dir.path().join("image.png"), [0u8, 1, 2]).unwrap();

        let store = DocumentStore::default();
        let loaded = store.load_dir(dir.path()).unwrap();

        let mut names: Vec<String> = loaded.into_iter().map(|d| d.name).collect();
        names.sort();
        assert_eq!(names, vec!["one.txt".to_string(), "two.md".to_string()]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn whitespace_only_document_has_no_summary() {
        let store = DocumentStore::default();
        let info = store.add("blank.txt", b"   \n").unwrap();
        assert!(info.content_summary.is_none());
    }
}
