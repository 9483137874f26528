//! Loader for cleaned question-answer corpora.
//!
//! The cleaning pipeline emits a JSON array of objects with `id`, `question`,
//! `answer` and optional `source`, `link` and `tags`.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::types::Record;

#[derive(Error, Debug)]
pub enum CorpusError {
    #[error("Failed to read corpus '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "Failed to parse corpus '{}': {source}\nSuggestion: Expected a JSON array of {{\"id\", \"question\", \"answer\"}} objects",
        .path.display()
    )]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Reads every record of a corpus file, in file order.
///
/// Only the shape is checked here; ids, questions and answers are validated
/// when the records are built into an index.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<Record>, CorpusError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| CorpusError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let records = parse_records(&content).map_err(|source| CorpusError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), records = records.len(), "loaded corpus");
    Ok(records)
}

/// Parses a corpus from JSON text.
pub fn parse_records(json: &str) -> Result<Vec<Record>, serde_json::Error> {
    serde_json::from_str(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_records() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("qa.json");
        std::fs::write(
            &path,
            r#"[
                {"id": "1", "question": "墨尔本怎么坐公交车", "answer": "使用Myki卡", "tags": ["交通"]},
                {"id": 2, "question": "租房需要注意什么", "answer": "仔细阅读合同", "source": "faq.xlsx"}
            ]"#,
        )
        .unwrap();

        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].tags, vec!["交通".to_string()]);
        assert_eq!(records[1].id, "2");
        assert_eq!(records[1].source, "faq.xlsx");
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        assert!(matches!(
            load_records(temp_dir.path().join("absent.json")),
            Err(CorpusError::Read { .. })
        ));
    }

    #[test]
    fn test_not_an_array() {
        assert!(parse_records(r#"{"id": "1"}"#).is_err());
        assert!(parse_records("[]").unwrap().is_empty());
    }
}
