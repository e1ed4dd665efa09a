//! Core logic for serializing dialogue corpora into k-turn training windows.
//!
//! This crate converts multi-turn dialogue records into (context, target)
//! training pairs: the context is the last k turns of the conversation plus
//! a templated system utterance, the target is the ground-truth utterance
//! the model should produce.

use std::path::Path;

use thiserror::Error;

/// Trait for rendering a synthetic system utterance from a turn's
/// structured dialogue actions.
///
/// The production implementation is [`TemplateRenderer`], driven by an
/// external template table. Tests substitute fixed stub renderers, and
/// multiple renderers with different tables can coexist.
pub trait Renderer {
    /// Render the synthetic utterance for a SYSTEM turn.
    ///
    /// Returns an empty string when nothing can be rendered; callers drop
    /// windows with empty renders rather than treating this as an error.
    fn render(&self, turn: &Turn) -> String;
}

// Blanket implementation for references to Renderers
impl<R: Renderer + ?Sized> Renderer for &R {
    fn render(&self, turn: &Turn) -> String {
        (*self).render(turn)
    }
}

mod bleu;
mod corpus;
mod template;
mod window;

pub use bleu::{corpus_bleu, read_score_pairs, tokenize_intl, BleuScore};
pub use corpus::{
    discover_dialogue_files, load_fewshot_ids, read_corpus, read_corpus_filtered,
    read_dialogue_file, shuffle_windows, write_tsv, Dialogue,
};
pub use template::{TemplateRenderer, TemplateTable, DEFAULT_TEMPLATE_KEY};
pub use window::{build_windows, clean_field, Action, Frame, Speaker, Turn, Window};

/// Boundary token inserted between serialized turns in a context.
pub const SEP_TOKEN: &str = "<s>";

/// Window sizes the experiment grid supports.
pub const K_VALUES: &[usize] = &[0, 1, 3, 5, 7];

/// Few-shot split sizes.
pub const FEWSHOT_SIZES: &[usize] = &[5, 10, 20, 40, 80];

/// Errors surfaced by corpus reading, template loading, and scoring.
#[derive(Debug, Error)]
pub enum Error {
    /// A dialogue record lacks a required field or is otherwise
    /// unparseable. Fatal for the whole input file.
    #[error("malformed dialogue record in {path}: {source}")]
    MalformedRecord {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed template table {path}: {source}")]
    MalformedTemplates {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed score row in {path}: expected 2 columns, got {found}")]
    MalformedScoreRow { path: String, found: usize },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("failed to read {path}: {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("{path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Error::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
