//! Prompt templates: one per workflow stage.
//!
//! These prompts are the contract between the coach and the model:
//! each ends with the exact JSON shape the normalizer expects back.

use crate::workflow::Stage;

pub const GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const TEMPERATURE: f32 = 0.7;
pub const TOP_K: u32 = 40;
pub const TOP_P: f32 = 0.95;
pub const MAX_OUTPUT_TOKENS: u32 = 1024;

/// Instruction text plus the JSON reply shape it asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptTemplate {
    pub instruction: &'static str,
    pub schema: &'static str,
}

impl PromptTemplate {
    /// Full prompt as sent to the model.
    pub fn text(&self) -> String {
        format!("{}\n\nRespond in JSON format:\n{}", self.instruction, self.schema)
    }
}

const INGREDIENTS_INSTRUCTION: &str = "Analyze this image of ingredients and suggest a delicious recipe.
Please provide:
1. List of ingredients you can identify
2. A complete recipe with steps
3. Estimated cooking time
4. Difficulty level
5. Nutritional highlights

Reply with a single JSON object and nothing else.";

const INGREDIENTS_SCHEMA: &str = r#"{
  "ingredients": ["ingredient1", "ingredient2"],
  "recipe": {
    "name": "Recipe Name",
    "steps": ["step1", "step2"],
    "cookingTime": "30 minutes",
    "difficulty": "Easy",
    "nutrition": "High in protein, low in carbs"
  }
}"#;

const COOKING_INSTRUCTION: &str = "Analyze this cooking progress photo and provide feedback.
Is this step completed correctly? What should the user do next?

Reply with a single JSON object and nothing else.";

const COOKING_SCHEMA: &str = r#"{
  "feedback": "Detailed feedback about the cooking progress",
  "nextStep": "What to do next",
  "looksgood": true,
  "tips": ["tip1", "tip2"]
}"#;

const FINISHED_INSTRUCTION: &str =
    "Analyze this finished dish photo and provide a comprehensive evaluation.

Reply with a single JSON object and nothing else.";

const FINISHED_SCHEMA: &str = r#"{
  "overallScore": 4.2,
  "socialMediaWorthy": true,
  "presentation": {
    "score": 4.5,
    "strengths": ["Beautiful plating", "Great color contrast"],
    "improvements": ["Add garnish", "Better lighting"]
  },
  "cookingQuality": {
    "score": 4.0,
    "assessment": "Well-cooked with good technique"
  },
  "nutrition": {
    "estimatedCalories": "450-500",
    "healthScore": 4.2,
    "macros": "High protein, moderate carbs, good fats"
  },
  "compliments": "Excellent work! This looks restaurant-quality.",
  "improvementTips": ["Try adding fresh herbs", "Consider plating height"]
}"#;

/// Pick the template for a stage. Pure and deterministic.
pub fn select_prompt(stage: Stage) -> PromptTemplate {
    match stage {
        Stage::Ingredients => PromptTemplate {
            instruction: INGREDIENTS_INSTRUCTION,
            schema: INGREDIENTS_SCHEMA,
        },
        Stage::Cooking => PromptTemplate {
            instruction: COOKING_INSTRUCTION,
            schema: COOKING_SCHEMA,
        },
        Stage::Finished => PromptTemplate {
            instruction: FINISHED_INSTRUCTION,
            schema: FINISHED_SCHEMA,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_prompt_asks_for_json() {
        for stage in Stage::ALL {
            let text = select_prompt(stage).text();
            assert!(!text.trim().is_empty());
            assert!(text.contains("JSON"), "{stage} prompt does not mention JSON");
        }
    }

    #[test]
    fn prompts_are_deterministic() {
        for stage in Stage::ALL {
            assert_eq!(select_prompt(stage), select_prompt(stage));
            assert_eq!(select_prompt(stage).text(), select_prompt(stage).text());
        }
    }

    #[test]
    fn schemas_are_valid_json() {
        for stage in Stage::ALL {
            let schema = select_prompt(stage).schema;
            let parsed: serde_json::Value = serde_json::from_str(schema)
                .unwrap_or_else(|e| panic!("{stage} schema is not JSON: {e}"));
            assert!(parsed.is_object());
        }
    }

    #[test]
    fn stages_get_distinct_prompts() {
        assert_ne!(select_prompt(Stage::Ingredients), select_prompt(Stage::Cooking));
        assert_ne!(select_prompt(Stage::Cooking), select_prompt(Stage::Finished));
    }
}
