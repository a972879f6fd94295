//! Corpus input and response log output.
//!
//! The corpus is JSONL with a `text` field per record. The response log
//! echoes each attempted record with a `responses` field holding the raw
//! model output, or the `Interrupted` / `Error` marker.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{error, info, instrument, warn};

use crate::error::GenerationError;
use crate::generator::ResponseEntry;

/// One input document.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Record id; the zero-based record index when the input has none
    pub id: String,
    pub text: String,
    /// Every input field except `text`, echoed into the response log
    pub extra: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            extra: Map::new(),
        }
    }

    fn from_record(index: usize, value: Value) -> Result<Self, GenerationError> {
        let Value::Object(mut fields) = value else {
            return Err(GenerationError::InvalidInput(format!(
                "record {} is not a JSON object",
                index
            )));
        };
        let text = match fields.remove("text") {
            Some(Value::String(s)) => s,
            Some(Value::Null) => String::new(),
            Some(other) => other.to_string(),
            None => {
                return Err(GenerationError::InvalidInput(format!(
                    "record {} has no text field",
                    index
                )))
            }
        };
        let id = match fields.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => index.to_string(),
        };
        Ok(Self {
            id,
            text,
            extra: fields,
        })
    }

    fn to_log_record(&self, index: usize, entry: &ResponseEntry) -> Value {
        let mut record = self.extra.clone();
        record
            .entry("id")
            .or_insert_with(|| Value::from(index as u64));
        record.insert("text".to_string(), Value::String(self.text.clone()));
        record.insert(
            "responses".to_string(),
            Value::String(entry.as_str().to_string()),
        );
        Value::Object(record)
    }
}

/// Load a JSONL corpus. Blank lines are skipped.
#[instrument]
pub fn load_documents(path: &Path) -> Result<Vec<Document>, GenerationError> {
    let reader = BufReader::new(File::open(path)?);
    let mut documents = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line).map_err(|e| {
            GenerationError::InvalidInput(format!("line {}: {}", line_no + 1, e))
        })?;
        documents.push(Document::from_record(documents.len(), value)?);
    }

    info!(count = documents.len(), "Loaded documents");
    Ok(documents)
}

/// Write one JSON object per response, pairing each with its document.
///
/// Only documents that were attempted appear in the log.
#[instrument(skip(documents, responses), fields(count = responses.len()))]
pub fn write_response_log(
    path: &Path,
    documents: &[Document],
    responses: &[ResponseEntry],
) -> Result<(), GenerationError> {
    if responses.len() > documents.len() {
        return Err(GenerationError::InvalidInput(format!(
            "{} responses for {} documents",
            responses.len(),
            documents.len()
        )));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    for (index, (doc, entry)) in documents.iter().zip(responses).enumerate() {
        serde_json::to_writer(&mut writer, &doc.to_log_record(index, entry))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

/// Where the responses ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The JSONL log was written
    Written(PathBuf),
    /// The log failed; responses went to the plain-text backup
    BackedUp(PathBuf),
}

/// Write the response log, falling back to a plain-text backup.
///
/// The backup holds one response per line. Only a failure to write the
/// backup as well is an error.
pub fn persist_responses(
    path: &Path,
    backup_path: &Path,
    documents: &[Document],
    responses: &[ResponseEntry],
) -> Result<PersistOutcome, GenerationError> {
    match write_response_log(path, documents, responses) {
        Ok(()) => {
            info!(path = %path.display(), "Wrote response log");
            Ok(PersistOutcome::Written(path.to_path_buf()))
        }
        Err(e) => {
            error!(error = %e, path = %path.display(), "Response log write failed, writing backup");
            write_backup(backup_path, responses)?;
            warn!(path = %backup_path.display(), "Responses saved to backup");
            Ok(PersistOutcome::BackedUp(backup_path.to_path_buf()))
        }
    }
}

fn write_backup(path: &Path, responses: &[ResponseEntry]) -> Result<(), GenerationError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for entry in responses {
        writeln!(writer, "{}", entry.as_str())?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_documents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docs.jsonl");
        fs::write(
            &path,
            "{\"id\": \"a\", \"text\": \"first\", \"label\": \"x\"}\n\n{\"text\": \"\"}\n{\"id\": 7, \"text\": \"third\"}\n",
        )
        .unwrap();

        let docs = load_documents(&path).unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].id, "a");
        assert_eq!(docs[0].extra.get("label"), Some(&Value::from("x")));
        assert_eq!(docs[1].id, "1");
        assert_eq!(docs[1].text, "");
        assert_eq!(docs[2].id, "7");
    }

    #[test]
    fn test_load_rejects_missing_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docs.jsonl");
        fs::write(&path, "{\"id\": 1}\n").unwrap();
        assert!(matches!(
            load_documents(&path),
            Err(GenerationError::InvalidInput(_))
        ));

        fs::write(&path, "not json\n").unwrap();
        assert!(load_documents(&path).is_err());
    }

    #[test]
    fn test_response_log_covers_attempted_documents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("log.jsonl");
        let mut first = Document::new("d0", "alpha");
        first
            .extra
            .insert("source".to_string(), Value::from("news"));
        let docs = vec![first, Document::new("d1", "beta"), Document::new("d2", "gamma")];
        let responses = vec![
            ResponseEntry::Completed("[1] Trade: goods".to_string()),
            ResponseEntry::Interrupted,
        ];

        write_response_log(&path, &docs, &responses).unwrap();

        let lines: Vec<Value> = fs::read_to_string(&path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["text"], "alpha");
        assert_eq!(lines[0]["source"], "news");
        assert_eq!(lines[0]["responses"], "[1] Trade: goods");
        assert_eq!(lines[1]["id"], 1);
        assert_eq!(lines[1]["responses"], "Interrupted");
    }

    #[test]
    fn test_persist_falls_back_to_backup() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "a file, not a directory").unwrap();
        let bad_path = blocker.join("log.jsonl");
        let backup = dir.path().join("log_backup_gpt-4.txt");

        let docs = vec![Document::new("0", "a"), Document::new("1", "b")];
        let responses = vec![
            ResponseEntry::Completed("[1] Trade: goods".to_string()),
            ResponseEntry::Error,
        ];

        let outcome = persist_responses(&bad_path, &backup, &docs, &responses).unwrap();
        assert_eq!(outcome, PersistOutcome::BackedUp(backup.clone()));
        assert_eq!(
            fs::read_to_string(&backup).unwrap(),
            "[1] Trade: goods\nError\n"
        );
    }

    #[test]
    fn test_persist_writes_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        let backup = dir.path().join("backup.txt");
        let docs = vec![Document::new("0", "a")];
        let responses = vec![ResponseEntry::Completed("none".to_string())];

        let outcome = persist_responses(&path, &backup, &docs, &responses).unwrap();
        assert_eq!(outcome, PersistOutcome::Written(path.clone()));
        assert!(!backup.exists());
    }
}
