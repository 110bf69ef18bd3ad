//! Deduplication key for analysis requests

use std::fmt;

/// Identity of a logical analysis request: media URL, question and answer
///
/// Two requests with the same key are the same operation; the governor keeps
/// at most one of them in flight.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnalysisRequestKey(String);

impl AnalysisRequestKey {
    pub fn new(media_url: &str, question_text: &str, user_answer: Option<&str>) -> Self {
        let answer = user_answer.unwrap_or_default();
        let mut key = String::with_capacity(media_url.len() + question_text.len() + answer.len());
        key.push_str(media_url);
        key.push_str(question_text);
        key.push_str(answer);
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnalysisRequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_answer_equals_empty_answer() {
        assert_eq!(
            AnalysisRequestKey::new("u", "q", None),
            AnalysisRequestKey::new("u", "q", Some(""))
        );
    }

    #[test]
    fn test_answer_changes_key() {
        assert_ne!(
            AnalysisRequestKey::new("u", "q", Some("sim")),
            AnalysisRequestKey::new("u", "q", Some("não"))
        );
    }
}
