//! Response normalizer: free-text model reply → AnalysisResult.
//!
//! Never fails. The model's output format is not guaranteed, so:
//! 1. strip code fences and parse the reply as a JSON object
//! 2. otherwise parse the first balanced `{...}` span in the reply
//! 3. otherwise synthesize a renderable result from the raw text

use super::types::{
    AnalysisResult, CookingFeedback, DishEvaluation, IngredientsReport, Recipe,
};
use crate::workflow::Stage;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Characters of raw reply kept in a synthesized result.
pub const FALLBACK_TEXT_CHARS: usize = 200;

const EMPTY_REPLY_TEXT: &str = "The assistant returned an empty reply. Try another photo.";

static LEADING_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^```[A-Za-z0-9_+-]*[ \t]*\r?\n?").ok());
static TRAILING_FENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\r?\n?[ \t]*```$").ok());

/// Which recovery step produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParsePath {
    /// The (fence-stripped) reply was a JSON object.
    Direct,
    /// A JSON object was found embedded in surrounding prose.
    Extracted,
    /// Nothing parsed; the result was built from the raw text.
    Synthesized,
}

/// Normalize a model reply for the given stage.
pub fn normalize(raw: &str, stage: Stage) -> AnalysisResult {
    normalize_detailed(raw, stage).0
}

/// Like [`normalize`], also reporting which path succeeded.
pub fn normalize_detailed(raw: &str, stage: Stage) -> (AnalysisResult, ParsePath) {
    let stripped = strip_code_fences(raw);

    if let Some(object) = parse_object(&stripped) {
        if let Some(result) = from_json(object, stage) {
            return (result, ParsePath::Direct);
        }
    }

    if let Some(span) = first_balanced_object(raw) {
        if let Some(result) = parse_object(span).and_then(|object| from_json(object, stage)) {
            log::info!("[NORMALIZE] Extracted embedded JSON ({} chars)", span.len());
            return (result, ParsePath::Extracted);
        }
    }

    log::warn!(
        "[NORMALIZE] No usable JSON in {} reply ({} chars), synthesizing",
        stage,
        raw.len()
    );
    (synthesize(&stripped, stage), ParsePath::Synthesized)
}

/// Remove a leading ```` ```lang ```` marker and a trailing ```` ``` ````.
pub fn strip_code_fences(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    for fence in [&*LEADING_FENCE, &*TRAILING_FENCE].into_iter().flatten() {
        text = fence.replace(&text, "").into_owned();
    }
    text.trim().to_string()
}

/// The first `{...}` span whose braces balance, ignoring braces inside
/// JSON strings. An opening brace that never closes is skipped in favour
/// of the next one that does. Single pass over the text.
pub fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut open: Vec<usize> = Vec::new();
    let mut earliest: Option<(usize, usize)> = None;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in text.as_bytes().iter().enumerate().skip(start) {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                let Some(o) = open.pop() else { continue };
                if open.is_empty() {
                    return Some(&text[o..=i]);
                }
                if earliest.map_or(true, |(first, _)| o < first) {
                    earliest = Some((o, i));
                }
            }
            _ => {}
        }
    }
    earliest.map(|(o, c)| &text[o..=c])
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Build the stage's report from a parsed JSON object.
///
/// An ingredients reply that puts the recipe at the top level (`steps`
/// or `name` but no `recipe` key) is read as the recipe itself. Objects
/// with none of the stage's fields give `None`.
pub fn from_json(object: Map<String, Value>, stage: Stage) -> Option<AnalysisResult> {
    let result = match stage {
        Stage::Ingredients => {
            let flat_recipe = !object.contains_key("recipe")
                && (object.contains_key("steps") || object.contains_key("name"));
            if flat_recipe {
                let recipe: Recipe = serde_json::from_value(Value::Object(object)).ok()?;
                AnalysisResult::Ingredients(IngredientsReport {
                    ingredients: recipe.ingredients.clone(),
                    recipe: Some(recipe),
                    extra: Map::new(),
                })
            } else {
                let report: IngredientsReport =
                    serde_json::from_value(Value::Object(object)).ok()?;
                AnalysisResult::Ingredients(report)
            }
        }
        Stage::Cooking => {
            AnalysisResult::Cooking(serde_json::from_value(Value::Object(object)).ok()?)
        }
        Stage::Finished => {
            AnalysisResult::Finished(serde_json::from_value(Value::Object(object)).ok()?)
        }
    };
    has_known_fields(&result).then_some(result)
}

fn has_known_fields(result: &AnalysisResult) -> bool {
    match result {
        AnalysisResult::Ingredients(r) => r.recipe.is_some() || r.ingredients.is_some(),
        AnalysisResult::Cooking(f) => {
            f.feedback.is_some() || f.next_step.is_some() || f.looks_good.is_some() || f.tips.is_some()
        }
        AnalysisResult::Finished(e) => {
            e.overall_score.is_some()
                || e.social_media_worthy.is_some()
                || e.presentation.is_some()
                || e.cooking_quality.is_some()
                || e.nutrition.is_some()
                || e.compliments.is_some()
                || e.improvement_tips.is_some()
        }
        AnalysisResult::Unavailable(_) => true,
    }
}

/// Result built from the raw text when no JSON could be recovered.
///
/// The ingredients fallback carries no steps, so it never moves the
/// workflow into Cooking.
pub fn synthesize(raw: &str, stage: Stage) -> AnalysisResult {
    let text = fallback_text(raw);
    match stage {
        Stage::Ingredients => AnalysisResult::Ingredients(IngredientsReport {
            recipe: Some(Recipe {
                name: Some("AI-Generated Recipe".to_string()),
                description: Some(text),
                ..Default::default()
            }),
            ..Default::default()
        }),
        Stage::Cooking => AnalysisResult::Cooking(CookingFeedback {
            feedback: Some(text),
            ..Default::default()
        }),
        Stage::Finished => AnalysisResult::Finished(DishEvaluation {
            compliments: Some(text),
            ..Default::default()
        }),
    }
}

fn fallback_text(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return EMPTY_REPLY_TEXT.to_string();
    }
    if trimmed.chars().count() <= FALLBACK_TEXT_CHARS {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(FALLBACK_TEXT_CHARS).collect();
    format!("{}...", head.trim_end())
}
