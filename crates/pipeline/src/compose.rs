//! The `compose-batches` job: corpora in, batch JSON out.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;

use mteval_core::batch::{batches_to_json, join_target_ids};
use mteval_core::composer::{compose, ComposerConfig};
use mteval_core::corpus::{align_to_source, load_documents, Corpus, Encoding};
use mteval_core::error::CoreError;
use mteval_core::packer::{pack_exact_fit, DocEntry, MAX_DOC_LENGTH};

/// Parameters of one composition run.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    pub batch_size: usize,
    pub source_language: String,
    pub target_language: String,
    pub source_file: PathBuf,
    pub reference_file: PathBuf,
    /// One system output file, or a directory of them (one system per
    /// file, named by file stem).
    pub system_path: PathBuf,
    pub refs: usize,
    pub bad_refs: usize,
    pub redundant: usize,
    pub required_annotations: i32,
    pub random_seed: u64,
    pub randomize: bool,
    pub character_based: bool,
    pub unicode: bool,
}

/// Run the whole composition pipeline and return the batch JSON.
pub fn run(opts: &ComposeOptions) -> Result<String, CoreError> {
    let encoding = if opts.unicode {
        Encoding::Utf16
    } else {
        Encoding::Utf8
    };

    let source = load_documents(&opts.source_file, encoding)?;
    tracing::info!(
        docs = source.doc_count(),
        segments = source.segment_count(),
        "loaded source corpus"
    );

    let raw_refs = load_documents(&opts.reference_file, encoding)?;
    let (refs, missing) = align_to_source(&source, &raw_refs)?;
    if missing > 0 {
        tracing::warn!(missing, "reference corpus has missing segments");
    }

    let systems = discover_systems(&opts.system_path, encoding)?;
    tracing::info!(systems = systems.len(), "loaded system outputs");

    let mut aligned = Vec::with_capacity(systems.len());
    for (name, corpus) in systems {
        let (corpus, missing) = align_to_source(&source, &corpus)?;
        if missing > 0 {
            tracing::warn!(system = %name, missing, "system output has missing segments");
        }
        aligned.push((name, corpus));
    }
    let merged = merge_identical(aligned);

    let targets: HashMap<String, Corpus> = merged.iter().cloned().collect();
    let docs = doc_entries(&source, &merged);
    if docs.is_empty() {
        return Err(CoreError::Validation(
            "no documents short enough to evaluate".to_string(),
        ));
    }

    let mut rng = StdRng::seed_from_u64(opts.random_seed);
    let tasks = pack_exact_fit(&docs, opts.batch_size, &mut rng)?;
    tracing::info!(tasks = tasks.len(), "packed documents into tasks");

    let config = ComposerConfig {
        batch_size: opts.batch_size,
        source_language: opts.source_language.clone(),
        target_language: opts.target_language.clone(),
        required_annotations: opts.required_annotations,
        source_id: basename(&opts.source_file),
        refs: opts.refs,
        bad_refs: opts.bad_refs,
        redundant: opts.redundant,
        random_seed: opts.random_seed,
        randomize: opts.randomize,
        character_based: opts.character_based,
    };
    let batches = compose(&tasks, &source, &targets, &refs, &config, &mut rng)?;
    tracing::info!(batches = batches.len(), "composed batches");

    batches_to_json(&batches)
}

/// Load system outputs from a file or a directory of files.
///
/// Directory entries are processed in name order so system discovery is
/// deterministic.
pub fn discover_systems(
    path: &Path,
    encoding: Encoding,
) -> Result<Vec<(String, Corpus)>, CoreError> {
    if path.is_dir() {
        let mut files: Vec<PathBuf> = std::fs::read_dir(path)
            .map_err(|e| {
                CoreError::MalformedCorpus(format!("cannot read {}: {e}", path.display()))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        files.sort();
        if files.is_empty() {
            return Err(CoreError::MalformedCorpus(format!(
                "{} contains no system output files",
                path.display()
            )));
        }
        files
            .iter()
            .map(|file| Ok((stem(file), load_documents(file, encoding)?)))
            .collect()
    } else {
        Ok(vec![(stem(path), load_documents(path, encoding)?)])
    }
}

/// Merge systems with byte-identical aligned output into one entry under
/// a "+"-joined name.
pub fn merge_identical(systems: Vec<(String, Corpus)>) -> Vec<(String, Corpus)> {
    let mut merged: Vec<(Vec<String>, Corpus)> = Vec::new();
    for (name, corpus) in systems {
        match merged.iter_mut().find(|(_, c)| *c == corpus) {
            Some((names, _)) => names.push(name),
            None => merged.push((vec![name], corpus)),
        }
    }
    merged
        .into_iter()
        .map(|(names, corpus)| (join_target_ids(&names), corpus))
        .collect()
}

/// Build packable entries: every short-enough document crossed with every
/// merged system. Oversized documents are excluded with a warning.
pub fn doc_entries(source: &Corpus, systems: &[(String, Corpus)]) -> Vec<DocEntry> {
    let mut entries = Vec::new();
    for doc in source.docs() {
        if doc.len() > MAX_DOC_LENGTH {
            tracing::warn!(
                doc_id = %doc.doc_id,
                len = doc.len(),
                max = MAX_DOC_LENGTH,
                "document too long, excluded from evaluation"
            );
            continue;
        }
        for (target_id, _) in systems {
            entries.push(DocEntry {
                len: doc.len(),
                doc_id: doc.doc_id.clone(),
                target_id: target_id.clone(),
            });
        }
    }
    entries
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| basename(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mteval_core::corpus::parse_documents;

    fn corpus(text: &str) -> Corpus {
        parse_documents(text).unwrap()
    }

    const DOC_A: &str = "<doc docid=\"a\"><seg id=\"1\">x</seg></doc>";
    const DOC_B: &str = "<doc docid=\"a\"><seg id=\"1\">y</seg></doc>";

    #[test]
    fn identical_systems_merge_under_joined_name() {
        let systems = vec![
            ("sys-b".to_string(), corpus(DOC_A)),
            ("sys-a".to_string(), corpus(DOC_A)),
            ("sys-c".to_string(), corpus(DOC_B)),
        ];
        let merged = merge_identical(systems);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].0, "sys-a+sys-b");
        assert_eq!(merged[1].0, "sys-c");
    }

    #[test]
    fn distinct_systems_stay_separate() {
        let systems = vec![
            ("sys-a".to_string(), corpus(DOC_A)),
            ("sys-b".to_string(), corpus(DOC_B)),
        ];
        assert_eq!(merge_identical(systems).len(), 2);
    }

    #[test]
    fn oversized_documents_excluded() {
        let segs: String = (1..=MAX_DOC_LENGTH + 1)
            .map(|i| format!("<seg id=\"{i}\">s</seg>"))
            .collect();
        let text = format!("<doc docid=\"big\">{segs}</doc><doc docid=\"ok\"><seg id=\"1\">s</seg></doc>");
        let source = corpus(&text);
        let systems = vec![("sys-a".to_string(), corpus(DOC_A))];
        let entries = doc_entries(&source, &systems);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].doc_id, "ok");
    }

    #[test]
    fn entries_cross_documents_with_systems() {
        let text = "<doc docid=\"a\"><seg id=\"1\">x</seg></doc>\
                    <doc docid=\"b\"><seg id=\"1\">y</seg></doc>";
        let source = corpus(text);
        let systems = vec![
            ("sys-a".to_string(), corpus(DOC_A)),
            ("sys-b".to_string(), corpus(DOC_B)),
        ];
        let entries = doc_entries(&source, &systems);
        assert_eq!(entries.len(), 4);
    }

    #[test]
    fn discover_systems_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("sys-b.sgm"), DOC_A).unwrap();
        std::fs::write(dir.path().join("sys-a.sgm"), DOC_B).unwrap();
        let systems = discover_systems(dir.path(), Encoding::Utf8).unwrap();
        let names: Vec<&str> = systems.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["sys-a", "sys-b"]);
    }

    #[test]
    fn discover_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("online-x.sgm");
        std::fs::write(&file, DOC_A).unwrap();
        let systems = discover_systems(&file, Encoding::Utf8).unwrap();
        assert_eq!(systems.len(), 1);
        assert_eq!(systems[0].0, "online-x");
    }

    #[test]
    fn empty_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_systems(dir.path(), Encoding::Utf8).is_err());
    }
}
