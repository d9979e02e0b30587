use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

use crate::error::{AppError, AppResult};
use crate::lenient;
use crate::models::{Catalog, Question, QuestionType};

/// Shape of `questions.json`: reordering exercises and vocabulary items
#[derive(Debug, Default, Deserialize)]
struct CatalogDocument {
    #[serde(default, deserialize_with = "lenient::seq")]
    questions: Option<Vec<CatalogEntry>>,
    #[serde(default, deserialize_with = "lenient::seq")]
    vocab: Option<Vec<CatalogEntry>>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(default, deserialize_with = "lenient::string")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    jp: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    en: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    unit: Option<String>,
}

/// Load the catalog, treating a missing or unreadable document as empty.
pub fn load(path: &Path) -> Catalog {
    match try_load(path) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable catalog");
            Catalog::new()
        }
    }
}

/// Load the catalog; a missing file is an empty catalog, anything else
/// that prevents parsing is an error.
pub fn try_load(path: &Path) -> AppResult<Catalog> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Catalog::new()),
        Err(e) => return Err(e.into()),
    };
    parse(&content)
}

pub fn parse(content: &str) -> AppResult<Catalog> {
    let value: Value = serde_json::from_str(content)?;
    if !value.is_object() {
        return Err(AppError::CatalogShape);
    }
    let document: CatalogDocument = serde_json::from_value(value)?;

    let mut catalog = Catalog::new();
    let sections = [
        (document.questions, QuestionType::Reorder),
        (document.vocab, QuestionType::Vocab),
    ];
    for (entries, kind) in sections {
        for entry in entries.unwrap_or_default() {
            let Some(id) = entry.id.filter(|id| !id.is_empty()) else {
                continue;
            };
            catalog.insert(
                id.clone(),
                Question {
                    id,
                    jp: entry.jp,
                    en: entry.en,
                    unit: entry.unit,
                    kind,
                },
            );
        }
    }

    tracing::debug!(questions = catalog.len(), "catalog loaded");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_both_sections() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(
            temp_file,
            r#"{{
                "questions": [{{"id": "r1", "jp": "私は学生です", "en": "I am a student", "unit": "u1"}}],
                "vocab": [{{"id": "v1", "jp": "犬", "en": "dog", "unit": "animals"}}]
            }}"#
        )
        .unwrap();

        let catalog = load(temp_file.path());

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog["r1"].kind, QuestionType::Reorder);
        assert_eq!(catalog["v1"].kind, QuestionType::Vocab);
        assert_eq!(catalog["v1"].en.as_deref(), Some("dog"));
        assert_eq!(catalog["v1"].unit.as_deref(), Some("animals"));
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = load(&dir.path().join("questions.json"));
        assert!(catalog.is_empty());
        assert!(try_load(&dir.path().join("questions.json")).is_ok());
    }

    #[test]
    fn test_malformed_document_is_empty() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{{\"questions\": [").unwrap();

        assert!(load(temp_file.path()).is_empty());
        assert!(matches!(try_load(temp_file.path()), Err(AppError::Json(_))));
    }

    #[test]
    fn test_non_object_document_is_rejected() {
        assert!(matches!(parse("[1, 2, 3]"), Err(AppError::CatalogShape)));
    }

    #[test]
    fn test_entries_without_id_are_skipped() {
        let catalog = parse(
            r#"{"questions": [{"jp": "no id"}, {"id": "", "jp": "blank"}, "junk", {"id": "r1"}],
                "vocab": null}"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains_key("r1"));
        assert_eq!(catalog["r1"].jp, None);
    }

    #[test]
    fn test_vocab_wins_on_duplicate_id() {
        let catalog = parse(
            r#"{"questions": [{"id": "x", "en": "from questions"}],
                "vocab": [{"id": "x", "en": "from vocab"}]}"#,
        )
        .unwrap();

        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog["x"].en.as_deref(), Some("from vocab"));
        assert_eq!(catalog["x"].kind, QuestionType::Vocab);
    }
}
