//! Voice command parsing.
//!
//! Transcripts come from whatever recognizer the host has; matching is
//! case-insensitive substring search, checked in a fixed order so a
//! transcript naming two commands resolves to the first one listed.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    NextStep,
    PreviousStep,
    StartCooking,
    TakePhoto,
}

const PHRASES: &[(&[&str], VoiceCommand)] = &[
    (&["next step", "continue"], VoiceCommand::NextStep),
    (&["previous step", "go back"], VoiceCommand::PreviousStep),
    (&["start cooking"], VoiceCommand::StartCooking),
    (&["take photo", "capture"], VoiceCommand::TakePhoto),
];

/// Map a recognized transcript to a command, if it contains one.
pub fn parse_command(transcript: &str) -> Option<VoiceCommand> {
    let transcript = transcript.to_lowercase();
    PHRASES
        .iter()
        .find(|(phrases, _)| phrases.iter().any(|p| transcript.contains(p)))
        .map(|(_, command)| *command)
}
