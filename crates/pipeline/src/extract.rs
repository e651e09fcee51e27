//! The `extract-subset` job: recover the evaluated source segments from a
//! batch JSON document, one file per system.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use mteval_core::batch::{parse_batches, Batch, ItemType};
use mteval_core::corpus::{load_documents, Corpus, Encoding};
use mteval_core::error::CoreError;

/// Parameters of one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub source_file: PathBuf,
    pub batch_json: PathBuf,
    pub target_dir: PathBuf,
    /// Write output as UTF-16 LE with BOM instead of UTF-8.
    pub unicode: bool,
    /// Item ids to leave out of the extraction.
    pub ignore_ids: Vec<i32>,
}

/// Run the extraction and write one filtered file per system.
pub fn run(opts: &ExtractOptions) -> Result<(), CoreError> {
    let source = load_documents(&opts.source_file, Encoding::Utf8)?;
    let json = std::fs::read_to_string(&opts.batch_json).map_err(|e| {
        CoreError::Validation(format!("cannot read {}: {e}", opts.batch_json.display()))
    })?;
    let batches = parse_batches(&json)?;
    let ignore: HashSet<i32> = opts.ignore_ids.iter().copied().collect();

    let per_system = filtered_lines(&batches, &source, &ignore)?;
    let filename = filtered_filename(&opts.source_file);

    for (system, lines) in &per_system {
        let dir = opts.target_dir.join(system);
        std::fs::create_dir_all(&dir).map_err(|e| {
            CoreError::Validation(format!("cannot create {}: {e}", dir.display()))
        })?;
        let path = dir.join(&filename);
        std::fs::write(&path, encode(lines, opts.unicode)).map_err(|e| {
            CoreError::Validation(format!("cannot write {}: {e}", path.display()))
        })?;
        tracing::info!(system = %system, lines = lines.len(), path = %path.display(), "wrote subset");
    }
    Ok(())
}

/// Collect the source lines each system was judged on, in batch order.
///
/// The n-th judgeable TGT item of a document block maps to the n-th
/// segment of that source document. Ignored item ids still advance the
/// mapping; they only suppress the output line.
pub fn filtered_lines(
    batches: &[Batch],
    source: &Corpus,
    ignore: &HashSet<i32>,
) -> Result<BTreeMap<String, Vec<String>>, CoreError> {
    let mut out: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for batch in batches {
        // Ordinal of the next TGT item per (system, document) block.
        let mut ordinals: HashMap<(String, String), usize> = HashMap::new();

        for item in &batch.items {
            if item.item_type != ItemType::Tgt || item.is_complete_document {
                continue;
            }
            let key = (item.target_id.clone(), item.document_id.clone());
            let ordinal = ordinals.entry(key).or_insert(0);
            let index = *ordinal;
            *ordinal += 1;

            if ignore.contains(&item.item_id) {
                continue;
            }

            let doc = source.doc(&item.document_id).ok_or_else(|| {
                CoreError::Validation(format!(
                    "batch {} references unknown document '{}'",
                    batch.task.batch_no, item.document_id
                ))
            })?;
            let seg = doc.segments.get(index).ok_or_else(|| {
                CoreError::Validation(format!(
                    "document '{}' has no segment at position {index}",
                    item.document_id
                ))
            })?;
            out.entry(item.target_id.clone())
                .or_default()
                .push(seg.text.clone());
        }
    }
    Ok(out)
}

/// Output name derived from the source corpus file.
pub fn filtered_filename(source_file: &Path) -> String {
    let stem = source_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "source".to_string());
    format!("{stem}.filtered.txt")
}

/// Join lines with CRLF and encode as UTF-8 or BOM-prefixed UTF-16 LE.
fn encode(lines: &[String], unicode: bool) -> Vec<u8> {
    let mut text = lines.join("\r\n");
    text.push_str("\r\n");
    if !unicode {
        return text.into_bytes();
    }
    let mut bytes = vec![0xFF, 0xFE];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_le_bytes());
    }
    bytes
}
