//! Listing commands: models, retrieval variants, documents.

use std::path::Path;

use anyhow::Result;

use crate::config::Settings;
use crate::documents::DocumentStore;
use crate::models::DocumentInfo;
use crate::providers::ProviderRouter;

pub fn llms(settings: &Settings) {
    let llms = ProviderRouter::from_settings(settings).available_llms();
    if llms.is_empty() {
        println!("No provider API keys configured (GEMINI_API_KEY, GROQ_API_KEY, COHERE_API_KEY)");
        return;
    }
    for llm in llms {
        println!("{}", llm);
    }
}

pub fn variants(settings: &Settings) {
    for variant in settings.rag_variants() {
        println!("{}", variant);
    }
}

pub fn docs(settings: &Settings, dir: &Path) -> Result<()> {
    let store = DocumentStore::new(settings.max_file_size);
    let loaded = store.load_dir(dir)?;
    println!("Documents: {}\n", loaded.len());
    for doc in &loaded {
        println!("{}", format_document(doc));
    }
    Ok(())
}

fn format_document(doc: &DocumentInfo) -> String {
    let summary = doc
        .content_summary
        .as_deref()
        .map(|s| s.lines().next().unwrap_or_default().chars().take(60).collect::<String>())
        .unwrap_or_default();
    format!(
        "{:<36}  {:<24}  {:>9} B  {}",
        doc.id, doc.name, doc.size, summary
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DocumentType;

    #[test]
    fn document_line_shows_first_summary_line() {
        let doc = DocumentInfo {
            id: "id-1".into(),
            name: "notes.md".into(),
            doc_type: DocumentType::Md,
            upload_time: "2024-01-01T00:00:00Z".into(),
            size: 42,
            content_summary: Some("# Title\nbody".into()),
        };
        let line = format_document(&doc);
        assert!(line.starts_with("id-1"));
        assert!(line.contains("notes.md"));
        assert!(line.contains("42 B"));
        assert!(line.ends_with("# Title"));
    }
}
