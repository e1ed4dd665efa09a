//! CLI tool for serializing dialogue corpora into k-turn training windows.
//!
//! Reads schema-guided dialogue JSON files, slices each dialogue into
//! (context, target) pairs with a sliding window of k preceding turns, and
//! writes one TSV per data split. Few-shot mode restricts extraction to a
//! fixed list of dialogue ids.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use dialogue_turns_serializer_core::{
    load_fewshot_ids, read_corpus, read_corpus_filtered, shuffle_windows, write_tsv, Error,
    TemplateRenderer, TemplateTable, FEWSHOT_SIZES, K_VALUES,
};

/// Data split of the dialogue dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Split {
    Train,
    Dev,
    Test,
}

impl Split {
    fn dir_name(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Dev => "dev",
            Split::Test => "test",
        }
    }
}

/// Serialize dialogue JSON files to k-turn TSV training data.
#[derive(Parser, Debug)]
#[command(name = "dialogue-turns-serialize")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root directory containing train/dev/test dialogue files
    #[arg(long)]
    dataset_root: PathBuf,

    /// Template JSON file or directory mapping dialogue acts to templates
    #[arg(long)]
    templates: PathBuf,

    /// Output directory for TSV files
    #[arg(long)]
    write_dir: PathBuf,

    /// Number of preceding turns per window
    #[arg(long, default_value = "1", value_parser = parse_k)]
    k: usize,

    /// Data split to process
    #[arg(long, value_enum, default_value_t = Split::Train)]
    data_dir: Split,

    /// Shuffle windows before writing
    #[arg(long)]
    shuffle: bool,

    /// Build a few-shot split (always reads the train split)
    #[arg(long)]
    create_fewshot_split: bool,

    /// Number of few-shot example dialogues
    #[arg(long, value_parser = parse_fewshot)]
    num_fewshot_examples: Option<usize>,

    /// Directory containing `<n>_shot.txt` dialogue-id lists
    #[arg(long)]
    fewshot_splits: Option<PathBuf>,
}

fn parse_k(s: &str) -> Result<usize, String> {
    let k: usize = s.parse().map_err(|e| format!("invalid k: {}", e))?;
    if K_VALUES.contains(&k) {
        Ok(k)
    } else {
        Err(format!("k must be one of {:?}", K_VALUES))
    }
}

fn parse_fewshot(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|e| format!("invalid example count: {}", e))?;
    if FEWSHOT_SIZES.contains(&n) {
        Ok(n)
    } else {
        Err(format!("example count must be one of {:?}", FEWSHOT_SIZES))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let table = TemplateTable::load(&args.templates)?;
    let renderer = TemplateRenderer::new(table);

    let (mut windows, out_path) = if args.create_fewshot_split {
        let n = args.num_fewshot_examples.ok_or_else(|| {
            Error::Configuration(
                "--create-fewshot-split requires --num-fewshot-examples".to_string(),
            )
        })?;
        let splits_dir = args.fewshot_splits.clone().ok_or_else(|| {
            Error::Configuration("--create-fewshot-split requires --fewshot-splits".to_string())
        })?;

        let ids_path = splits_dir.join(format!("{}_shot.txt", n));
        if !ids_path.is_file() {
            return Err(Error::Configuration(format!(
                "few-shot id list not found: {}",
                ids_path.display()
            ))
            .into());
        }
        let ids = load_fewshot_ids(&ids_path)?;
        println!("Few-shot split: {} ids from {:?}", ids.len(), ids_path);

        let data_dir = args.dataset_root.join(Split::Train.dir_name());
        println!("Dataset dir: {:?}", data_dir);
        let windows = read_corpus_filtered(&data_dir, &ids, args.k, &renderer)?;

        let out = args
            .write_dir
            .join(format!("{}_shot", n))
            .join(format!("turns_{}.tsv", args.k));
        (windows, out)
    } else {
        let data_dir = args.dataset_root.join(args.data_dir.dir_name());
        println!("Dataset dir: {:?}", data_dir);
        let windows = read_corpus(&data_dir, args.k, &renderer)?;

        let out = args
            .write_dir
            .join(format!("turns_{}", args.k))
            .join(format!("{}.tsv", args.data_dir.dir_name()));
        (windows, out)
    };

    if args.shuffle {
        shuffle_windows(&mut windows);
    }

    write_tsv(&windows, &out_path)?;

    println!("\n[summary]");
    println!("  Windows written: {}", windows.len());
    println!("  k: {}", args.k);
    println!("  Output: {:?}", out_path);

    Ok(())
}
