//! Wire models of the remote analysis function

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::analysis::MediaType;

/// Body sent to the analysis function
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Public URL of the uploaded media
    pub media_url: String,

    /// Checklist question the media documents
    pub question_text: String,

    /// Answer the inspector gave, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_answer: Option<String>,

    /// Media category derived from the URL extension
    pub media_type: MediaType,

    /// Epoch milliseconds at dispatch
    pub timestamp: i64,

    /// 8 character correlation ID
    pub request_id: String,
}

/// Structured 5W2H plan as sent by the analysis function
///
/// Every field is optional and tolerates numbers or booleans in place of text.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlanPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub what: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub why: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub who: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub when: Option<String>,
    #[serde(default, rename = "where", deserialize_with = "lenient_string")]
    pub where_: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub how: Option<String>,
    #[serde(default, alias = "how_much", deserialize_with = "lenient_string")]
    pub how_much: Option<String>,
}

/// Successful body of the analysis function
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResponse {
    /// Free-text analysis of the media
    #[serde(default, alias = "analysis")]
    pub comment: Option<String>,

    /// Suggested corrective plan
    #[serde(default, alias = "action_plan")]
    pub action_plan: Option<ActionPlanPayload>,

    /// Model confidence, if reported
    #[serde(default)]
    pub confidence: Option<f64>,

    /// Full decoded body, kept for auditing
    #[serde(skip)]
    pub raw: Value,
}

impl AnalysisResponse {
    /// Decode a response body, keeping the raw JSON alongside the typed fields
    pub fn from_value(value: Value) -> crate::error::Result<Self> {
        let mut response: AnalysisResponse = serde_json::from_value(value.clone())?;
        response.raw = value;
        Ok(response)
    }

    /// The comment, if it carries any text
    pub fn comment_text(&self) -> Option<&str> {
        self.comment
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => Some(other.to_string()),
    })
}
