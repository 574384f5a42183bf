//! Analysis result types: one report shape per workflow stage.
//!
//! These match the JSON shapes requested by the prompts in prompts.rs,
//! but nothing about the model's reply is guaranteed: every field is
//! optional and unknown fields are carried through in `extra`.

use super::lenient;
use crate::workflow::Stage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Result of one analysis, keyed by the stage it was requested for.
///
/// Serializes untagged, so the relay returns the same JSON shape the
/// model produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AnalysisResult {
    Ingredients(IngredientsReport),
    Cooking(CookingFeedback),
    Finished(DishEvaluation),
    /// The analysis could not run at all (missing credential).
    Unavailable(Unavailable),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Unavailable {
    #[serde(skip)]
    pub stage: Stage,
    pub error: String,
}

/// Reply to the ingredients prompt: what was seen and what to cook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientsReport {
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::any", skip_serializing_if = "Option::is_none")]
    pub recipe: Option<Recipe>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub cooking_time: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub servings: Option<String>,
    #[serde(default, deserialize_with = "lenient::nutrition", skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<NutritionNote>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
    pub tips: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reply to the cooking-progress prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookingFeedback {
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
    /// The prompt spells this key `looksgood`.
    #[serde(
        default,
        rename = "looksgood",
        alias = "looksGood",
        deserialize_with = "lenient::boolean",
        skip_serializing_if = "Option::is_none"
    )]
    pub looks_good: Option<bool>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
    pub tips: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Reply to the finished-dish prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DishEvaluation {
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub overall_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::boolean", skip_serializing_if = "Option::is_none")]
    pub social_media_worthy: Option<bool>,
    #[serde(default, deserialize_with = "lenient::any", skip_serializing_if = "Option::is_none")]
    pub presentation: Option<Review>,
    #[serde(default, deserialize_with = "lenient::any", skip_serializing_if = "Option::is_none")]
    pub cooking_quality: Option<Review>,
    #[serde(default, deserialize_with = "lenient::nutrition", skip_serializing_if = "Option::is_none")]
    pub nutrition: Option<NutritionNote>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub compliments: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
    pub improvement_tips: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A review section: either a plain sentence or a scored breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Review {
    Summary(String),
    Scored(ScoredReview),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredReview {
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub assessment: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
    pub strengths: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient::string_list", skip_serializing_if = "Option::is_none")]
    pub improvements: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NutritionNote {
    Summary(String),
    Detailed(NutritionBreakdown),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionBreakdown {
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub estimated_calories: Option<String>,
    #[serde(default, deserialize_with = "lenient::number", skip_serializing_if = "Option::is_none")]
    pub health_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient::string", skip_serializing_if = "Option::is_none")]
    pub macros: Option<String>,
}

impl Recipe {
    /// Steps, or an empty slice when the model sent none.
    pub fn steps(&self) -> &[String] {
        self.steps.as_deref().unwrap_or_default()
    }

    pub fn has_steps(&self) -> bool {
        !self.steps().is_empty()
    }
}

impl Review {
    /// One sentence suitable for reading aloud.
    pub fn summary(&self) -> Option<String> {
        match self {
            Review::Summary(text) => Some(text.clone()),
            Review::Scored(review) => review
                .assessment
                .clone()
                .or_else(|| review.strengths.as_ref().map(|s| s.join(", "))),
        }
    }
}

impl AnalysisResult {
    pub fn stage(&self) -> Stage {
        match self {
            AnalysisResult::Ingredients(_) => Stage::Ingredients,
            AnalysisResult::Cooking(_) => Stage::Cooking,
            AnalysisResult::Finished(_) => Stage::Finished,
            AnalysisResult::Unavailable(u) => u.stage,
        }
    }

    /// The recipe carried by an ingredients result, if any.
    pub fn recipe(&self) -> Option<&Recipe> {
        match self {
            AnalysisResult::Ingredients(report) => report.recipe.as_ref(),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            AnalysisResult::Unavailable(u) => Some(&u.error),
            _ => None,
        }
    }

    /// Text to hand to the speech queue: cooking feedback, or the
    /// presentation review of a finished dish.
    pub fn spoken_summary(&self) -> Option<String> {
        match self {
            AnalysisResult::Cooking(feedback) => feedback.feedback.clone(),
            AnalysisResult::Finished(evaluation) => evaluation
                .presentation
                .as_ref()
                .and_then(Review::summary)
                .or_else(|| evaluation.compliments.clone()),
            _ => None,
        }
    }

    /// Configuration failure surfaced in place of a normal result.
    pub fn unavailable(stage: Stage, error: impl Into<String>) -> Self {
        AnalysisResult::Unavailable(Unavailable {
            stage,
            error: error.into(),
        })
    }

    /// Placeholder shown when the remote call fails, so the user always
    /// has something to look at.
    pub fn placeholder(stage: Stage) -> Self {
        match stage {
            Stage::Ingredients => AnalysisResult::Ingredients(IngredientsReport {
                ingredients: Some(strings(&[
                    "Chicken breast",
                    "Bell peppers",
                    "Onions",
                    "Garlic",
                    "Olive oil",
                    "Salt",
                    "Pepper",
                ])),
                recipe: Some(Recipe {
                    name: Some("Mediterranean Chicken Stir-Fry".to_string()),
                    description: Some(
                        "AI analysis is unavailable right now, showing a sample recipe".to_string(),
                    ),
                    steps: Some(strings(&[
                        "Heat olive oil in a large pan over medium-high heat",
                        "Season chicken with salt and pepper, then add to pan",
                        "Cook chicken for 5-6 minutes until golden brown",
                        "Add sliced bell peppers and onions to the pan",
                        "Add minced garlic and cook for 2-3 minutes",
                        "Stir everything together and cook for another 2 minutes",
                        "Serve hot with rice or quinoa",
                    ])),
                    cooking_time: Some("20 minutes".to_string()),
                    difficulty: Some("Easy".to_string()),
                    nutrition: Some(NutritionNote::Summary(
                        "High in protein, rich in vitamins A and C".to_string(),
                    )),
                    ..Default::default()
                }),
                extra: Map::new(),
            }),
            Stage::Cooking => AnalysisResult::Cooking(CookingFeedback {
                feedback: Some(
                    "Great job! The colors look vibrant and everything is cooking evenly."
                        .to_string(),
                ),
                next_step: Some("Continue with the next step of the recipe".to_string()),
                looks_good: Some(true),
                tips: Some(strings(&[
                    "Keep stirring to prevent burning",
                    "Add a splash of water if needed",
                ])),
                extra: Map::new(),
            }),
            Stage::Finished => AnalysisResult::Finished(DishEvaluation {
                presentation: Some(Review::Summary(
                    "Beautiful presentation! The colors are vibrant and the dish looks appetizing."
                        .to_string(),
                )),
                cooking_quality: Some(Review::Summary(
                    "Excellent technique, everything looks cooked just right.".to_string(),
                )),
                nutrition: Some(NutritionNote::Summary(
                    "A good balance of protein, vitamins, and minerals.".to_string(),
                )),
                ..Default::default()
            }),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
