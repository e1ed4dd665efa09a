//! Corpus iteration: reads dialogue files and accumulates windows.

use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::window::{build_windows, Turn, Window};
use crate::{Error, Renderer, Result};

/// One dialogue record from an input file. Both fields are required;
/// a record missing either aborts processing of the whole file.
#[derive(Debug, Deserialize)]
pub struct Dialogue {
    pub dialogue_id: String,
    pub turns: Vec<Turn>,
}

/// Discover dialogue files under a directory.
///
/// Schema files describing the dataset rather than containing dialogues
/// are skipped. Paths are returned sorted for deterministic output order.
pub fn discover_dialogue_files(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().map_or(false, |ext| ext == "json"))
        .filter(|e| !e.file_name().to_string_lossy().starts_with("schema"))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

fn parse_dialogues(path: &Path) -> Result<Vec<Dialogue>> {
    let raw = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    serde_json::from_str(&raw).map_err(|e| Error::MalformedRecord {
        path: path.display().to_string(),
        source: e,
    })
}

/// Extract every window from a single dialogue file, in source order.
pub fn read_dialogue_file<R: Renderer>(path: &Path, k: usize, renderer: &R) -> Result<Vec<Window>> {
    let dialogues = parse_dialogues(path)?;
    let mut windows = Vec::new();
    for dialogue in &dialogues {
        windows.extend(build_windows(&dialogue.turns, k, renderer));
    }
    Ok(windows)
}

/// Extract windows from every dialogue file under `root`.
///
/// Files are processed in parallel; the returned windows preserve file
/// order and, within a file, dialogue and turn order.
pub fn read_corpus<R>(root: &Path, k: usize, renderer: &R) -> Result<Vec<Window>>
where
    R: Renderer + Sync,
{
    read_corpus_inner(root, k, renderer, None)
}

/// Like [`read_corpus`], restricted to dialogues whose id is in
/// `allowed_ids` (few-shot mode).
pub fn read_corpus_filtered<R>(
    root: &Path,
    allowed_ids: &HashSet<String>,
    k: usize,
    renderer: &R,
) -> Result<Vec<Window>>
where
    R: Renderer + Sync,
{
    read_corpus_inner(root, k, renderer, Some(allowed_ids))
}

fn read_corpus_inner<R>(
    root: &Path,
    k: usize,
    renderer: &R,
    allowed_ids: Option<&HashSet<String>>,
) -> Result<Vec<Window>>
where
    R: Renderer + Sync,
{
    let files = discover_dialogue_files(root);
    if files.is_empty() {
        return Err(Error::Configuration(format!(
            "no dialogue files found under {}",
            root.display()
        )));
    }

    let per_file: Vec<Vec<Window>> = files
        .par_iter()
        .map(|path| {
            let dialogues = parse_dialogues(path)?;
            let mut windows = Vec::new();
            for dialogue in &dialogues {
                if let Some(ids) = allowed_ids {
                    if !ids.contains(&dialogue.dialogue_id) {
                        continue;
                    }
                }
                windows.extend(build_windows(&dialogue.turns, k, renderer));
            }
            Ok(windows)
        })
        .collect::<Result<_>>()?;

    Ok(per_file.into_iter().flatten().collect())
}

/// Load a few-shot id list, one dialogue id per line. Blank lines are
/// ignored.
pub fn load_fewshot_ids(path: &Path) -> Result<HashSet<String>> {
    let file = fs::File::open(path).map_err(|e| Error::io(path, e))?;
    let mut ids = HashSet::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| Error::io(path, e))?;
        let id = line.trim();
        if !id.is_empty() {
            ids.insert(id.to_string());
        }
    }
    Ok(ids)
}

/// Deterministically shuffle windows using a multiplicative-hash sort key
/// per index. Reordering is a presentation concern; extraction itself
/// always preserves source order.
pub fn shuffle_windows(windows: &mut Vec<Window>) {
    let mut keyed: Vec<(usize, Window)> = std::mem::take(windows).into_iter().enumerate().collect();
    keyed.sort_by_key(|(i, _)| i.wrapping_mul(2654435761) % 1000);
    *windows = keyed.into_iter().map(|(_, w)| w).collect();
}

/// Write windows as `<context>\t<target>` lines.
///
/// The parent directory is created if needed. Callers build the full
/// window list before calling this, so a failed run never leaves
/// partially-extracted output behind.
pub fn write_tsv(windows: &[Window], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }

    let file = fs::File::create(path).map_err(|e| Error::io(path, e))?;
    let mut out = BufWriter::new(file);
    for window in windows {
        writeln!(out, "{}\t{}", window.context, window.target).map_err(|e| Error::io(path, e))?;
    }
    out.flush().map_err(|e| Error::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Renderer returning a fixed string for every SYSTEM turn.
    struct FixedRenderer(&'static str);

    impl Renderer for FixedRenderer {
        fn render(&self, _turn: &Turn) -> String {
            self.0.to_string()
        }
    }

    const DIALOGUES_A: &str = r#"[
        {
            "dialogue_id": "d1",
            "turns": [
                {"speaker": "USER", "utterance": "Book a ticket."},
                {"speaker": "SYSTEM", "utterance": "Please confirm the booking."},
                {"speaker": "USER", "utterance": "Confirmed."}
            ]
        },
        {
            "dialogue_id": "d2",
            "turns": [
                {"speaker": "USER", "utterance": "Find a hotel."},
                {"speaker": "SYSTEM", "utterance": "Which city?"}
            ]
        }
    ]"#;

    fn write_corpus_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_read_dialogue_file() {
        let temp = TempDir::new().unwrap();
        let path = write_corpus_file(temp.path(), "dialogues_001.json", DIALOGUES_A);

        let windows = read_dialogue_file(&path, 1, &FixedRenderer("rendered")).unwrap();
        assert_eq!(windows.len(), 2);
        assert_eq!(
            windows[0].context,
            "USER: Book a ticket. <s> SYSTEM: rendered"
        );
        assert_eq!(windows[0].target, "Please confirm the booking.");
        assert_eq!(windows[1].target, "Which city?");
    }

    #[test]
    fn test_discover_skips_schema_files() {
        let temp = TempDir::new().unwrap();
        write_corpus_file(temp.path(), "dialogues_001.json", DIALOGUES_A);
        write_corpus_file(temp.path(), "schema.json", "[]");
        write_corpus_file(temp.path(), "notes.txt", "ignored");

        let files = discover_dialogue_files(temp.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("dialogues_001.json"));
    }

    #[test]
    fn test_read_corpus_preserves_file_order() {
        let temp = TempDir::new().unwrap();
        write_corpus_file(
            temp.path(),
            "dialogues_002.json",
            r#"[{"dialogue_id": "d3", "turns": [
                {"speaker": "USER", "utterance": "Second file."},
                {"speaker": "SYSTEM", "utterance": "From file two."}
            ]}]"#,
        );
        write_corpus_file(temp.path(), "dialogues_001.json", DIALOGUES_A);

        let windows = read_corpus(temp.path(), 1, &FixedRenderer("rendered")).unwrap();
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0].target, "Please confirm the booking.");
        assert_eq!(windows[2].target, "From file two.");
    }

    #[test]
    fn test_read_corpus_filtered() {
        let temp = TempDir::new().unwrap();
        write_corpus_file(temp.path(), "dialogues_001.json", DIALOGUES_A);

        let ids: HashSet<String> = ["d1".to_string()].into_iter().collect();
        let windows = read_corpus_filtered(temp.path(), &ids, 1, &FixedRenderer("rendered")).unwrap();

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].target, "Please confirm the booking.");
    }

    #[test]
    fn test_malformed_record_is_fatal_for_file() {
        let temp = TempDir::new().unwrap();
        let path = write_corpus_file(
            temp.path(),
            "dialogues_bad.json",
            r#"[{"dialogue_id": "d1"}]"#,
        );

        let err = read_dialogue_file(&path, 1, &FixedRenderer("rendered")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("dialogues_bad.json"));
        assert!(message.contains("turns"));
    }

    #[test]
    fn test_empty_corpus_is_configuration_error() {
        let temp = TempDir::new().unwrap();
        let err = read_corpus(temp.path(), 1, &FixedRenderer("rendered")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_load_fewshot_ids() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("5_shot.txt");
        fs::write(&path, "d1\nd2\n\n  d3  \n").unwrap();

        let ids = load_fewshot_ids(&path).unwrap();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("d3"));
    }

    #[test]
    fn test_shuffle_is_deterministic() {
        let make = || {
            (0..10)
                .map(|i| Window {
                    context: format!("c{}", i),
                    target: format!("t{}", i),
                })
                .collect::<Vec<_>>()
        };

        let mut a = make();
        let mut b = make();
        shuffle_windows(&mut a);
        shuffle_windows(&mut b);

        assert_eq!(a, b);
        assert_ne!(a, make());
        assert_eq!(a.len(), 10);
    }

    #[test]
    fn test_write_tsv_round_trip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("turns_1").join("train.tsv");

        let windows = vec![
            Window {
                context: "USER: Hi <s> SYSTEM: rendered".to_string(),
                target: "Hello.".to_string(),
            },
            Window {
                context: "SYSTEM: rendered".to_string(),
                target: "Goodbye.".to_string(),
            },
        ];
        write_tsv(&windows, &path).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        for (line, window) in lines.iter().zip(&windows) {
            let (context, target) = line.split_once('\t').unwrap();
            assert_eq!(context, window.context);
            assert_eq!(target, window.target);
            assert!(!target.contains('\t'));
        }
    }
}
