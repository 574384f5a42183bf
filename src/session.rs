//! Interactive terminal session: the presentation layer.
//!
//! Reads one command per line from stdin, drives the `Coach`, and prints
//! the workflow state after every event.

use cooking_coach_lib::capture::ImageSource;
use cooking_coach_lib::llm::types::{AnalysisResult, NutritionNote, Review};
use cooking_coach_lib::pipeline::{Coach, Origin, PipelineReport, TriggerOutcome, VoiceReply};
use cooking_coach_lib::{Stage, WorkflowState};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  photo <path>    analyze an image file for the current stage
  camera          open the camera preview
  snap            capture the preview and analyze it
  cancel          close the camera
  next | back     move between recipe steps
  start           start cooking the current recipe
  finish          done cooking, photograph the dish next
  restart         begin again from ingredients
  say <words>     voice command (\"next step\", \"take photo\", ...)
  state           print the workflow state as JSON
  help | quit";

pub async fn run(coach: Coach) -> Result<(), Box<dyn std::error::Error>> {
    println!("Cooking Coach ({} backend). Type 'help' for commands.", coach.backend_id());
    render(&coach.snapshot());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}> ", coach.snapshot().stage());
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        let (command, arg) = line.split_once(' ').unwrap_or((line, ""));
        let arg = arg.trim();

        match command {
            "" => continue,
            "quit" | "exit" | "q" => break,
            "help" | "?" => println!("{HELP}"),
            "photo" | "p" => {
                if arg.is_empty() {
                    println!("usage: photo <path>");
                    continue;
                }
                trigger(&coach, ImageSource::File(arg.into())).await;
            }
            "camera" | "c" => match coach.start_camera().await {
                Ok(()) => println!("Camera on. 'snap' to capture, 'cancel' to close."),
                Err(e) => println!("! {}", e),
            },
            "snap" | "s" => trigger(&coach, ImageSource::Camera).await,
            "cancel" => {
                coach.stop_camera().await;
                println!("Camera off.");
            }
            "next" | "n" => {
                if !coach.next_step() {
                    println!("(no further step)");
                }
                render(&coach.snapshot());
            }
            "back" | "b" | "prev" => {
                if !coach.previous_step() {
                    println!("(already at the first step)");
                }
                render(&coach.snapshot());
            }
            "start" => transition(&coach, coach.start_cooking()),
            "finish" | "f" => transition(&coach, coach.finish()),
            "restart" | "r" => transition(&coach, coach.restart()),
            "say" => match coach.handle_voice(arg).await {
                Ok(VoiceReply::Unrecognized) => println!("(no command heard in {:?})", arg),
                Ok(VoiceReply::CameraStarted) => println!("Camera on. Say \"take photo\" again to capture."),
                Ok(VoiceReply::Captured(outcome)) => show_outcome(&coach, outcome),
                Ok(_) => render(&coach.snapshot()),
                Err(e) => println!("! {}", e),
            },
            "state" => println!("{}", serde_json::to_string_pretty(&coach.snapshot())?),
            other => println!("Unknown command '{}'. Type 'help'.", other),
        }
    }

    coach.shutdown().await;
    Ok(())
}

async fn trigger(coach: &Coach, source: ImageSource) {
    println!("Analyzing...");
    match coach.capture_and_analyze(source).await {
        Ok(outcome) => show_outcome(coach, outcome),
        Err(e) => println!("! {}", e),
    }
}

fn transition(coach: &Coach, result: Result<(), cooking_coach_lib::workflow::TransitionError>) {
    match result {
        Ok(()) => render(&coach.snapshot()),
        Err(e) => println!("! {}", e),
    }
}

fn show_outcome(coach: &Coach, outcome: TriggerOutcome) {
    match outcome {
        TriggerOutcome::Ignored => println!("(still analyzing the previous photo)"),
        TriggerOutcome::Completed(report) => {
            note_origin(&report);
            render(&coach.snapshot());
        }
    }
}

fn note_origin(report: &PipelineReport) {
    match report.origin {
        Origin::Placeholder => println!("(analysis failed, showing a sample {} result)", report.stage),
        Origin::Unavailable => {}
        Origin::Model(_) => println!("(analyzed in {}ms)", report.elapsed_ms),
    }
}

/// Print the current stage, recipe progress and latest result.
pub fn render(state: &WorkflowState) {
    println!();
    match state.stage() {
        Stage::Ingredients => println!("== Step 1: photograph your ingredients =="),
        Stage::Cooking => println!("== Step 2: cooking =="),
        Stage::Finished => println!("== Step 3: photograph the finished dish =="),
    }

    if let Some(recipe) = state.recipe() {
        if let Some(name) = &recipe.name {
            println!("Recipe: {}", name);
        }
        if state.stage() == Stage::Cooking {
            let total = recipe.steps().len();
            if let Some(step) = state.current_step() {
                println!("Step {}/{}: {}", state.current_step_index() + 1, total, step);
            }
        }
    }

    if let Some(result) = state.last_result() {
        render_result(result);
    }
    println!();
}

pub fn render_result(result: &AnalysisResult) {
    match result {
        AnalysisResult::Ingredients(report) => {
            if let Some(ingredients) = &report.ingredients {
                println!("Ingredients: {}", ingredients.join(", "));
            }
            if let Some(recipe) = &report.recipe {
                if let Some(description) = &recipe.description {
                    println!("{}", description);
                }
                let facts: Vec<String> = [
                    recipe.cooking_time.as_ref().map(|t| format!("time {}", t)),
                    recipe.difficulty.as_ref().map(|d| format!("difficulty {}", d)),
                    recipe.servings.as_ref().map(|s| format!("serves {}", s)),
                ]
                .into_iter()
                .flatten()
                .collect();
                if !facts.is_empty() {
                    println!("({})", facts.join(", "));
                }
                for (i, step) in recipe.steps().iter().enumerate() {
                    println!("  {}. {}", i + 1, step);
                }
                print_nutrition(recipe.nutrition.as_ref());
            }
        }
        AnalysisResult::Cooking(feedback) => {
            let verdict = match feedback.looks_good {
                Some(true) => "[looks good] ",
                Some(false) => "[needs attention] ",
                None => "",
            };
            if let Some(text) = &feedback.feedback {
                println!("{}{}", verdict, text);
            }
            if let Some(next) = &feedback.next_step {
                println!("Next: {}", next);
            }
            print_list("Tips", feedback.tips.as_deref());
        }
        AnalysisResult::Finished(evaluation) => {
            if let Some(score) = evaluation.overall_score {
                println!("Overall: {:.1}/5", score);
            }
            if evaluation.social_media_worthy == Some(true) {
                println!("Social-media worthy!");
            }
            print_review("Presentation", evaluation.presentation.as_ref());
            print_review("Cooking", evaluation.cooking_quality.as_ref());
            print_nutrition(evaluation.nutrition.as_ref());
            if let Some(compliments) = &evaluation.compliments {
                println!("{}", compliments);
            }
            print_list("Try next time", evaluation.improvement_tips.as_deref());
        }
        AnalysisResult::Unavailable(u) => println!("! AI analysis unavailable: {}", u.error),
    }
}

fn print_review(label: &str, review: Option<&Review>) {
    let Some(review) = review else { return };
    match review {
        Review::Summary(text) => println!("{}: {}", label, text),
        Review::Scored(scored) => {
            let score = scored.score.map(|s| format!(" {:.1}/5", s)).unwrap_or_default();
            println!("{}:{} {}", label, score, scored.assessment.as_deref().unwrap_or(""));
            print_list("  Strengths", scored.strengths.as_deref());
            print_list("  Improve", scored.improvements.as_deref());
        }
    }
}

fn print_nutrition(note: Option<&NutritionNote>) {
    match note {
        Some(NutritionNote::Summary(text)) => println!("Nutrition: {}", text),
        Some(NutritionNote::Detailed(n)) => {
            if let Some(macros) = &n.macros {
                println!("Nutrition: {}", macros);
            }
            if let Some(calories) = &n.estimated_calories {
                println!("Calories: {}", calories);
            }
        }
        None => {}
    }
}

fn print_list(label: &str, items: Option<&[String]>) {
    if let Some(items) = items.filter(|items| !items.is_empty()) {
        println!("{}:", label);
        for item in items {
            println!("  - {}", item);
        }
    }
}
