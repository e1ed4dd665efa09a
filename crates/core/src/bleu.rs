//! Corpus-level BLEU for scoring generated utterances against references.
//!
//! Case-sensitive, international tokenization, exponential smoothing and
//! a brevity penalty, matching the defaults the evaluation pipeline uses.

use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

const MAX_NGRAM_ORDER: usize = 4;

// International tokenization: punctuation adjacent to a non-digit is
// split off on both sides, symbols are always split off.
static PUNCT_AFTER_NONDIGIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\P{N})(\p{P})").unwrap());
static PUNCT_BEFORE_NONDIGIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\p{P})(\P{N})").unwrap());
static SYMBOL_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\p{S})").unwrap());

/// Tokenize a line with the international (mteval-v14) rules.
pub fn tokenize_intl(line: &str) -> Vec<String> {
    let line = PUNCT_AFTER_NONDIGIT_RE.replace_all(line, "$1 $2 ");
    let line = PUNCT_BEFORE_NONDIGIT_RE.replace_all(&line, " $1 $2");
    let line = SYMBOL_RE.replace_all(&line, " $1 ");
    line.split_whitespace().map(str::to_string).collect()
}

/// Corpus-level BLEU with its component statistics.
#[derive(Debug, Clone, Copy)]
pub struct BleuScore {
    pub score: f64,
    pub precisions: [f64; MAX_NGRAM_ORDER],
    pub brevity_penalty: f64,
    pub hyp_len: usize,
    pub ref_len: usize,
}

fn extract_ngrams(tokens: &[String]) -> HashMap<Vec<String>, usize> {
    let mut counts = HashMap::new();
    for n in 1..=MAX_NGRAM_ORDER.min(tokens.len()) {
        for ngram in tokens.windows(n) {
            *counts.entry(ngram.to_vec()).or_insert(0) += 1;
        }
    }
    counts
}

/// Compute corpus BLEU over (hypothesis, reference) pairs.
///
/// N-gram counts are clipped against the reference; orders with zero
/// matches are smoothed exponentially (precision `100 / (2^m * total)`
/// for the m-th such order).
pub fn corpus_bleu(pairs: &[(String, String)]) -> BleuScore {
    let mut correct = [0usize; MAX_NGRAM_ORDER];
    let mut total = [0usize; MAX_NGRAM_ORDER];
    let mut hyp_len = 0usize;
    let mut ref_len = 0usize;

    for (hyp, reference) in pairs {
        let hyp_tokens = tokenize_intl(hyp);
        let ref_tokens = tokenize_intl(reference);
        hyp_len += hyp_tokens.len();
        ref_len += ref_tokens.len();

        let ref_counts = extract_ngrams(&ref_tokens);
        for (ngram, count) in extract_ngrams(&hyp_tokens) {
            let order = ngram.len() - 1;
            total[order] += count;
            correct[order] += count.min(*ref_counts.get(&ngram).unwrap_or(&0));
        }
    }

    let mut precisions = [0.0f64; MAX_NGRAM_ORDER];
    let mut smooth = 1.0f64;
    for n in 0..MAX_NGRAM_ORDER {
        if total[n] == 0 {
            continue;
        }
        if correct[n] == 0 {
            smooth *= 2.0;
            precisions[n] = 100.0 / (smooth * total[n] as f64);
        } else {
            precisions[n] = 100.0 * correct[n] as f64 / total[n] as f64;
        }
    }

    let brevity_penalty = if hyp_len == 0 {
        0.0
    } else if hyp_len < ref_len {
        (1.0 - ref_len as f64 / hyp_len as f64).exp()
    } else {
        1.0
    };

    let log_sum: f64 = precisions
        .iter()
        .map(|&p| if p > 0.0 { p.ln() } else { -9999999999.0 })
        .sum();
    let score = brevity_penalty * (log_sum / MAX_NGRAM_ORDER as f64).exp();

    BleuScore {
        score,
        precisions,
        brevity_penalty,
        hyp_len,
        ref_len,
    }
}

/// Read (hypothesis, reference) pairs from a two-column TSV.
pub fn read_score_pairs(path: &Path) -> Result<Vec<(String, String)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .from_path(path)
        .map_err(|e| Error::Csv {
            path: path.display().to_string(),
            source: e,
        })?;

    let mut pairs = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| Error::Csv {
            path: path.display().to_string(),
            source: e,
        })?;
        if record.len() < 2 {
            return Err(Error::MalformedScoreRow {
                path: path.display().to_string(),
                found: record.len(),
            });
        }
        pairs.push((record[0].to_string(), record[1].to_string()));
    }
    Ok(pairs)
}
