//! Sliding-window extraction over dialogue turns.

use std::fmt;

use serde::Deserialize;

use crate::{Renderer, SEP_TOKEN};

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Speaker {
    User,
    System,
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Speaker::User => "USER",
            Speaker::System => "SYSTEM",
        })
    }
}

/// One utterance in a dialogue, with the structured dialogue actions
/// attached to it (empty for user turns).
#[derive(Debug, Clone, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub utterance: String,
    #[serde(default)]
    pub frames: Vec<Frame>,
}

/// A service frame holding the dialogue acts of one turn.
#[derive(Debug, Clone, Deserialize)]
pub struct Frame {
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// A single dialogue act, e.g. REQUEST(city) or INFORM(price=cheap).
#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    pub act: String,
    #[serde(default)]
    pub slot: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// A (context, target) training pair derived from a contiguous span
/// of turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Window {
    pub context: String,
    pub target: String,
}

/// Collapse newlines and tabs to spaces and trim, so a field stays on
/// one physical line of a tab-separated file.
pub fn clean_field(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\n', '\r', '\t'], " ")
        .trim()
        .to_string()
}

/// Slice a dialogue into fixed-context training windows.
///
/// Every window ends at a SYSTEM turn: the context is the preceding turns
/// serialized as `SPEAKER: utterance <s> ` segments, suffixed with the
/// rendered synthetic utterance for that turn, and the target is the turn's
/// ground-truth utterance. Truncated windows (fewer than `k` turns of
/// history) are emitted at the start of the dialogue; after that every
/// window spans exactly `k` preceding turns. Windows whose rendered
/// utterance or target is empty are dropped.
///
/// Pure function over its inputs; no state survives across dialogues.
pub fn build_windows<R: Renderer>(turns: &[Turn], k: usize, renderer: &R) -> Vec<Window> {
    let mut windows = Vec::new();

    // Truncated windows at the dialogue start, ending before index k.
    // The final turn of the dialogue never ends a truncated window.
    let last = turns.len().saturating_sub(1);
    for end in 0..k.min(last) {
        extend_windows(&mut windows, turns, 0, end, renderer);
    }

    // Full windows of exactly k preceding turns.
    for start in 0..turns.len().saturating_sub(k) {
        extend_windows(&mut windows, turns, start, start + k, renderer);
    }

    windows
}

/// Emit the window ending at `turns[end]` with history `turns[start..end]`,
/// if that turn is a SYSTEM turn and nothing forces a drop.
fn extend_windows<R: Renderer>(
    windows: &mut Vec<Window>,
    turns: &[Turn],
    start: usize,
    end: usize,
    renderer: &R,
) {
    let last_turn = &turns[end];
    if last_turn.speaker != Speaker::System {
        return;
    }

    let rendered = renderer.render(last_turn);
    if rendered.trim().is_empty() || last_turn.utterance.trim().is_empty() {
        return;
    }

    let mut context = String::new();
    for turn in &turns[start..end] {
        context.push_str(&format!(
            "{}: {} {} ",
            turn.speaker, turn.utterance, SEP_TOKEN
        ));
    }
    context.push_str("SYSTEM: ");
    context.push_str(&rendered);

    windows.push(Window {
        context: clean_field(&context),
        target: clean_field(&last_turn.utterance),
    });
}
