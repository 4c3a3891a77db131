//! Source-link document mapping.
//!
//! The source-link blob is a JSON object mapping document paths (optionally ending in a
//! single `*` wildcard) to retrievable URLs. Resolution rules:
//!
//! - exact entries beat wildcard entries
//! - among wildcard entries, the longest matching prefix wins
//! - comparisons ignore ASCII case (build paths routinely mix drive-letter casing)
//! - matched suffixes are spliced into the URL's `*` with backslashes normalized
//!
//! Targets must be absolute http(s) URLs; anything else makes the whole mapping
//! malformed, which the evaluator reports as an invalid source link.

use crate::Result;

/// A parsed source-link mapping.
pub struct SourceLinkMap {
    /// Pattern/URL pairs in document order
    entries: Vec<(String, String)>,
}

impl SourceLinkMap {
    /// Parse a source-link JSON blob.
    ///
    /// # Arguments
    /// * `json` - The blob contents as UTF-8 text
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] when the blob is not valid JSON, lacks a
    /// `documents` object, or maps to a non-http(s) target.
    pub fn parse(json: &str) -> Result<SourceLinkMap> {
        let value: serde_json::Value = serde_json::from_str(json)
            .map_err(|e| malformed_error!("Source link blob is not valid JSON - {}", e))?;

        let Some(documents) = value.get("documents").and_then(|d| d.as_object()) else {
            return Err(malformed_error!("Source link blob has no documents object"));
        };

        let mut entries = Vec::with_capacity(documents.len());
        for (pattern, target) in documents {
            let Some(url) = target.as_str() else {
                return Err(malformed_error!(
                    "Source link target for '{}' is not a string",
                    pattern
                ));
            };

            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(malformed_error!(
                    "Source link target for '{}' is not an http(s) URL - {}",
                    pattern,
                    url
                ));
            }

            if pattern.matches('*').count() > 1 || url.matches('*').count() > 1 {
                return Err(malformed_error!(
                    "Source link entry '{}' has more than one wildcard",
                    pattern
                ));
            }

            entries.push((pattern.clone(), url.to_string()));
        }

        Ok(SourceLinkMap { entries })
    }

    /// Returns `true` when the mapping contains no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of pattern entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Resolve a document path to its retrieval URL, if the mapping covers it.
    #[must_use]
    pub fn resolve(&self, document: &str) -> Option<String> {
        let mut best: Option<(usize, String)> = None;

        for (pattern, url) in &self.entries {
            if let Some(star) = pattern.find('*') {
                let prefix = &pattern[..star];
                if !starts_with_ignore_ascii_case(document, prefix) {
                    continue;
                }

                let suffix = &document[prefix.len()..];
                let resolved = url.replacen('*', &suffix.replace('\\', "/"), 1);
                // Longest prefix wins among wildcards
                if best.as_ref().is_none_or(|(len, _)| *len < prefix.len()) {
                    best = Some((prefix.len(), resolved));
                }
            } else if document.eq_ignore_ascii_case(pattern) {
                // An exact entry always wins
                return Some(url.clone());
            }
        }

        best.map(|(_, url)| url)
    }
}

fn starts_with_ignore_ascii_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len() && text.as_bytes()[..prefix.len()].eq_ignore_ascii_case(prefix.as_bytes())
}
