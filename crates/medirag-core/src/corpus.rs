//! A leaf's document corpus and how it is turned into indexable documents.
//!
//! Records are attribute maps (one per row of the source table). A corpus
//! with a text column holds longform notes and is chunked by sentence; a
//! corpus without one is structured and yields one document per record.

use std::path::Path;

use serde_json::Value;

use medirag_contracts::{
    attributes::{value_as_key, AttributeMap},
    document::Document,
    error::{MediragError, MediragResult},
};

/// Upper bound on the characters of sentence text packed into one chunk.
pub const MAX_CHUNK_CHARS: usize = 800;

/// Metadata key holding a chunk's position within its source record.
pub const TEXT_INDEX_KEY: &str = "text_index";

/// Metadata key holding a structured record's position in the corpus.
pub const ROW_KEY: &str = "row";

/// The records owned by one leaf.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    records: Vec<AttributeMap>,
    text_column: Option<String>,
}

impl Corpus {
    /// A corpus of structured records; every column becomes content.
    pub fn structured(records: Vec<AttributeMap>) -> Self {
        Self { records, text_column: None }
    }

    /// A corpus of longform records whose `text_column` is chunked.
    pub fn unstructured(records: Vec<AttributeMap>, text_column: impl Into<String>) -> Self {
        Self {
            records,
            text_column: Some(text_column.into()),
        }
    }

    /// Load records from a JSON file holding an array of objects.
    pub fn from_json_file(path: &Path, text_column: Option<String>) -> MediragResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| MediragError::Config {
            reason: format!("failed to read corpus file '{}': {}", path.display(), e),
        })?;
        let rows: Vec<Value> = serde_json::from_str(&contents).map_err(|e| MediragError::Config {
            reason: format!("corpus file '{}' is not a JSON array: {}", path.display(), e),
        })?;

        let mut records = Vec::with_capacity(rows.len());
        for (i, row) in rows.into_iter().enumerate() {
            match row {
                Value::Object(record) => records.push(record),
                other => {
                    return Err(MediragError::Config {
                        reason: format!(
                            "corpus file '{}' row {} is not an object: {}",
                            path.display(),
                            i,
                            other
                        ),
                    })
                }
            }
        }
        Ok(Self { records, text_column })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<AttributeMap> {
        self.records
    }

    /// Produce the documents to index. Scores are zero until an index ranks them.
    pub fn documents(&self) -> Vec<Document> {
        match &self.text_column {
            Some(column) => self.chunked_documents(column),
            None => self.row_documents(),
        }
    }

    fn chunked_documents(&self, column: &str) -> Vec<Document> {
        let mut documents = Vec::new();
        for record in &self.records {
            let text = record.get(column).map(value_as_key).unwrap_or_default();
            let prefix = record
                .get("name")
                .map(|name| format!("For patient with name of {}: ", value_as_key(name)))
                .unwrap_or_default();

            let mut metadata = record.clone();
            metadata.remove(column);

            for (text_index, chunk) in pack_chunks(&split_sentences(&text)).into_iter().enumerate() {
                let mut chunk_metadata = metadata.clone();
                chunk_metadata.insert(TEXT_INDEX_KEY.to_string(), Value::from(text_index));
                documents.push(Document::new(format!("{prefix}{chunk}"), chunk_metadata, 0.0));
            }
        }
        documents
    }

    fn row_documents(&self) -> Vec<Document> {
        self.records
            .iter()
            .enumerate()
            .map(|(row, record)| {
                let content = record
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value_as_key(value)))
                    .collect::<Vec<_>>()
                    .join("\n");
                let mut metadata = record.clone();
                metadata.insert(ROW_KEY.to_string(), Value::from(row));
                Document::new(content, metadata, 0.0)
            })
            .collect()
    }
}

/// Split free text into sentences.
///
/// Whitespace runs (including newlines) collapse to one space. A sentence
/// ends at a period whose preceding character is not a digit, so decimals
/// such as "2.5 mg" stay inside their sentence. Trailing text without a
/// closing period is kept as a final sentence.
pub fn split_sentences(text: &str) -> Vec<String> {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut previous: Option<char> = None;
    for ch in normalized.chars() {
        current.push(ch);
        if ch == '.' && previous.is_some_and(|p| !p.is_ascii_digit()) {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
        previous = Some(ch);
    }
    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Greedily pack sentences into chunks of at most `MAX_CHUNK_CHARS`
/// characters of sentence text. A single sentence longer than the bound
/// becomes its own chunk.
pub fn pack_chunks(sentences: &[String]) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_len = 0;

    for sentence in sentences {
        let len = sentence.chars().count();
        if current_len + len > MAX_CHUNK_CHARS && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current_len = 0;
        }
        current.push(sentence);
        current_len += len;
    }
    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}
