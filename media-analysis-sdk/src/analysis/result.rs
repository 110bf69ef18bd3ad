//! Normalization of analysis function responses
//!
//! Classifies the free-text comment for non-conformities and cleans up the
//! suggested 5W2H action plan before handing a [`MediaAnalysisResult`] to the
//! caller.

use serde::Serialize;
use serde_json::Value;

use super::MediaType;
use crate::core::{ActionPlanPayload, AnalysisResponse};

/// Phrases that mark a comment as describing a non-conformity
pub const NON_CONFORMITY_KEYWORDS: &[&str] = &[
    "não conforme",
    "irregular",
    "incorreto",
    "problema",
    "erro",
    "falha",
    "inadequado",
    "insuficiente",
    "deficiente",
    "precário",
];

/// Placeholder the model writes into plan fields it has nothing for
pub const NO_ACTION_SENTINEL: &str = "nenhuma ação sugerida";

const CONFORM_CONFIDENCE: f64 = 0.85;
const NON_CONFORM_CONFIDENCE: f64 = 0.9;

/// Corrective action plan in 5W2H form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlan {
    pub what: String,
    pub why: String,
    pub who: String,
    pub when: String,
    #[serde(rename = "where")]
    pub where_: String,
    pub how: String,
    pub how_much: String,
}

impl ActionPlan {
    /// Build a plan from the wire payload; `None` when no field says anything
    pub fn from_payload(payload: &ActionPlanPayload) -> Option<Self> {
        let plan = Self {
            what: meaningful(&payload.what),
            why: meaningful(&payload.why),
            who: meaningful(&payload.who),
            when: meaningful(&payload.when),
            where_: meaningful(&payload.where_),
            how: meaningful(&payload.how),
            how_much: meaningful(&payload.how_much),
        };

        if plan.fields().iter().all(|(_, value)| value.is_empty()) {
            None
        } else {
            Some(plan)
        }
    }

    fn fields(&self) -> [(&'static str, &str); 7] {
        [
            ("What", &self.what),
            ("Why", &self.why),
            ("Who", &self.who),
            ("When", &self.when),
            ("Where", &self.where_),
            ("How", &self.how),
            ("How much", &self.how_much),
        ]
    }

    /// Human readable 5W2H text, one line per filled field
    pub fn to_suggestion(&self) -> String {
        self.fields()
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(label, value)| format!("{}: {}", label, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Normalized outcome of one successful analysis
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaAnalysisResult {
    pub analysis: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub is_conform: bool,
    pub has_non_conformity: bool,
    pub action_plan: Option<ActionPlan>,
    pub action_plan_suggestion: Option<String>,
    pub confidence: f64,
    pub question_text: String,
    pub user_answer: Option<String>,
    pub raw_data: Value,
}

impl MediaAnalysisResult {
    /// Normalize a response; the caller has already checked the comment is present
    pub fn from_response(
        response: &AnalysisResponse,
        media_type: MediaType,
        question_text: &str,
        user_answer: Option<&str>,
    ) -> Self {
        let analysis = response.comment_text().unwrap_or_default().to_string();
        let has_non_conformity = detect_non_conformity(&analysis);
        let action_plan = response.action_plan.as_ref().and_then(ActionPlan::from_payload);
        let action_plan_suggestion = action_plan.as_ref().map(ActionPlan::to_suggestion);

        let confidence = match response.confidence {
            Some(c) if c.is_finite() => c.clamp(0.0, 1.0),
            _ if has_non_conformity || action_plan.is_some() => NON_CONFORM_CONFIDENCE,
            _ => CONFORM_CONFIDENCE,
        };

        Self {
            analysis,
            media_type,
            is_conform: !has_non_conformity,
            has_non_conformity,
            action_plan,
            action_plan_suggestion,
            confidence,
            question_text: question_text.to_string(),
            user_answer: user_answer.map(str::to_string),
            raw_data: response.raw.clone(),
        }
    }
}

/// Case-insensitive keyword scan of an analysis comment
pub fn detect_non_conformity(comment: &str) -> bool {
    let lower = comment.to_lowercase();
    NON_CONFORMITY_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
}

fn meaningful(field: &Option<String>) -> String {
    match field.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() && value.to_lowercase() != NO_ACTION_SENTINEL => value.to_string(),
        _ => String::new(),
    }
}
