//! Cooking workflow state machine.
//!
//! Ingredients → Cooking → Finished, with restart from Finished.
//! All mutation goes through the named transitions below; the step
//! index is clamped after every one of them.

use crate::llm::types::{AnalysisResult, Recipe};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Phase of the cooking workflow. The lowercase names are the wire
/// identifiers shared with prompts and the relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Ingredients,
    Cooking,
    Finished,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Ingredients, Stage::Cooking, Stage::Finished];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Ingredients => "ingredients",
            Stage::Cooking => "cooking",
            Stage::Finished => "finished",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown stage '{0}' (expected ingredients, cooking or finished)")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    /// Case-sensitive: "Cooking" is not a stage.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| UnknownStage(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {action} while in the {stage} stage")]
    WrongStage { action: &'static str, stage: Stage },
    #[error("no recipe with steps yet, photograph your ingredients first")]
    NoRecipe,
}

/// What a transition did, for logging and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stayed,
    Entered(Stage),
    /// The result belonged to a stage the workflow has already left.
    DiscardedStale,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowState {
    stage: Stage,
    current_step_index: usize,
    recipe: Option<Recipe>,
    last_result: Option<AnalysisResult>,
    processing: bool,
}

impl WorkflowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn current_step_index(&self) -> usize {
        self.current_step_index
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        self.recipe.as_ref()
    }

    pub fn last_result(&self) -> Option<&AnalysisResult> {
        self.last_result.as_ref()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// The step the cook is on, while cooking.
    pub fn current_step(&self) -> Option<&str> {
        if self.stage != Stage::Cooking {
            return None;
        }
        self.recipe
            .as_ref()?
            .steps()
            .get(self.current_step_index)
            .map(String::as_str)
    }

    /// Claim the processing flag. Returns false if an analysis is
    /// already in flight.
    pub fn begin_processing(&mut self) -> bool {
        if self.processing {
            return false;
        }
        self.processing = true;
        true
    }

    pub fn end_processing(&mut self) {
        self.processing = false;
    }

    /// Record an analysis result and advance to Cooking when an
    /// ingredients result carries a recipe with steps.
    pub fn apply_result(&mut self, result: AnalysisResult) -> Transition {
        if result.stage() != self.stage {
            log::warn!(
                "[WORKFLOW] Dropping {} result, workflow is in {}",
                result.stage(),
                self.stage
            );
            return Transition::DiscardedStale;
        }

        let mut transition = Transition::Stayed;
        if self.stage == Stage::Ingredients {
            if let Some(recipe) = result.recipe() {
                self.recipe = Some(recipe.clone());
                if recipe.has_steps() {
                    self.stage = Stage::Cooking;
                    self.current_step_index = 0;
                    transition = Transition::Entered(Stage::Cooking);
                    log::info!(
                        "[WORKFLOW] Recipe with {} steps, entering cooking",
                        recipe.steps().len()
                    );
                }
            }
        }

        self.last_result = Some(result);
        self.clamp_step_index();
        transition
    }

    /// Advance one step. No-op outside Cooking or at the last step.
    pub fn next_step(&mut self) -> bool {
        let Some(last) = self.last_step_index() else {
            return false;
        };
        let before = self.current_step_index;
        self.current_step_index = (before + 1).min(last);
        self.clamp_step_index();
        self.current_step_index != before
    }

    /// Go back one step. No-op outside Cooking or at the first step.
    pub fn previous_step(&mut self) -> bool {
        if self.last_step_index().is_none() {
            return false;
        }
        let before = self.current_step_index;
        self.current_step_index = before.saturating_sub(1);
        self.clamp_step_index();
        self.current_step_index != before
    }

    /// Explicit Ingredients → Cooking (the "start cooking" command).
    pub fn start_cooking(&mut self) -> Result<(), TransitionError> {
        match self.stage {
            Stage::Cooking => Ok(()),
            Stage::Ingredients => {
                if !self.recipe.as_ref().is_some_and(Recipe::has_steps) {
                    return Err(TransitionError::NoRecipe);
                }
                self.stage = Stage::Cooking;
                self.current_step_index = 0;
                Ok(())
            }
            stage => Err(TransitionError::WrongStage {
                action: "start cooking",
                stage,
            }),
        }
    }

    /// Cooking → Finished. Only ever user-initiated.
    pub fn finish(&mut self) -> Result<(), TransitionError> {
        if self.stage != Stage::Cooking {
            return Err(TransitionError::WrongStage {
                action: "finish",
                stage: self.stage,
            });
        }
        self.stage = Stage::Finished;
        self.last_result = None;
        self.clamp_step_index();
        log::info!("[WORKFLOW] Entering finished");
        Ok(())
    }

    /// Finished → Ingredients, clearing everything from the last session.
    pub fn restart(&mut self) -> Result<(), TransitionError> {
        if self.stage != Stage::Finished {
            return Err(TransitionError::WrongStage {
                action: "restart",
                stage: self.stage,
            });
        }
        let processing = self.processing;
        *self = Self {
            processing,
            ..Self::default()
        };
        log::info!("[WORKFLOW] Restarted");
        Ok(())
    }

    /// Index of the last step, when step navigation is meaningful.
    fn last_step_index(&self) -> Option<usize> {
        if self.stage != Stage::Cooking {
            return None;
        }
        let count = self.recipe.as_ref()?.steps().len();
        count.checked_sub(1)
    }

    fn clamp_step_index(&mut self) {
        let count = self.recipe.as_ref().map_or(0, |r| r.steps().len());
        self.current_step_index = self.current_step_index.min(count.saturating_sub(1));
    }
}
