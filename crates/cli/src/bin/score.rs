//! Score a TSV of (hypothesis, reference) pairs with corpus BLEU.

use std::path::PathBuf;

use clap::Parser;

use dialogue_turns_serializer_core::{corpus_bleu, read_score_pairs};

/// Compute corpus BLEU over a two-column TSV.
#[derive(Parser, Debug)]
#[command(name = "dialogue-turns-score")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TSV file of (hypothesis, reference) pairs
    #[arg(long)]
    tsv: PathBuf,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let pairs = read_score_pairs(&args.tsv)?;
    println!("Scoring {} pairs from {:?}", pairs.len(), args.tsv);

    let bleu = corpus_bleu(&pairs);

    println!("BLEU: {:.2}", bleu.score);
    println!(
        "  precisions: {:.1}/{:.1}/{:.1}/{:.1}",
        bleu.precisions[0], bleu.precisions[1], bleu.precisions[2], bleu.precisions[3]
    );
    println!("  brevity penalty: {:.3}", bleu.brevity_penalty);
    println!("  lengths: hyp={} ref={}", bleu.hyp_len, bleu.ref_len);

    Ok(())
}
