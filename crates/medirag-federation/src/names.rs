//! A gazetteer-backed person-name extractor.

use std::collections::BTreeSet;

use medirag_core::traits::NameExtractor;

/// Finds occurrences of known patient names in query text.
///
/// Matching is case-insensitive, on word boundaries, and ignores a trailing
/// possessive (`Edward Fisher's` matches `Edward Fisher`). Returned names use
/// the spelling they were registered with, which is the spelling stored in
/// document metadata.
#[derive(Debug, Clone, Default)]
pub struct GazetteerNameExtractor {
    // (lowercased, as registered)
    names: Vec<(String, String)>,
}

impl GazetteerNameExtractor {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .map(Into::into)
            .map(|name: String| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .map(|name| (name.to_lowercase(), name))
            .collect();
        Self { names }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl NameExtractor for GazetteerNameExtractor {
    fn extract_person_names(&self, text: &str) -> BTreeSet<String> {
        let haystack = text.to_lowercase();
        self.names
            .iter()
            .filter(|(needle, _)| contains_word(&haystack, needle))
            .map(|(_, name)| name.clone())
            .collect()
    }
}

// An apostrophe is not alphanumeric, so a possessive suffix ends the word.
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
