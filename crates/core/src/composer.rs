//! Batch composition.
//!
//! Expands packed document tasks into annotation item lists: every document
//! contributes a document header, one TGT item per segment in order, and a
//! document trailer; hidden quality-control items (REF, BAD) are injected
//! next to a random subset of TGT items, and CHK items repeating earlier
//! TGT items are appended at the end. Item ids are reassigned as 0-based
//! batch positions once the item list is final.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::badref::DonorPool;
use crate::batch::{Batch, BatchMeta, Item, ItemType};
use crate::corpus::{Corpus, Segment};
use crate::error::CoreError;
use crate::packer::Task;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Batch-composition parameters.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Segment capacity used when packing; recorded in batch metadata.
    pub batch_size: usize,
    pub source_language: String,
    pub target_language: String,
    pub required_annotations: i32,
    /// Basename of the source corpus file, recorded on every item.
    pub source_id: String,
    /// Hidden reference items per batch.
    pub refs: usize,
    /// Hidden corrupted-reference items per batch.
    pub bad_refs: usize,
    /// Repeated-item (CHK) count per batch.
    pub redundant: usize,
    pub random_seed: u64,
    /// Shuffle document order within each batch.
    pub randomize: bool,
    /// Count corruption lengths in characters instead of tokens.
    pub character_based: bool,
}

// ---------------------------------------------------------------------------
// Composition
// ---------------------------------------------------------------------------

/// Compose one batch per packed task.
///
/// `targets` maps each `targetID` (system name, or "+"-joined set) to its
/// source-aligned output corpus. The donor pool for BAD items is rebuilt
/// from `refs` and reshuffled at every batch boundary, so no reference
/// segment donates twice within one batch.
pub fn compose(
    tasks: &[Task],
    source: &Corpus,
    targets: &HashMap<String, Corpus>,
    refs: &Corpus,
    config: &ComposerConfig,
    rng: &mut impl Rng,
) -> Result<Vec<Batch>, CoreError> {
    let mut donor_pool = DonorPool::from_corpus(refs, rng);

    let mut batches = Vec::with_capacity(tasks.len());
    for (task_index, task) in tasks.iter().enumerate() {
        donor_pool.reset(rng);
        let items = compose_items(task, source, targets, refs, &mut donor_pool, config, rng)?;
        batches.push(Batch {
            task: BatchMeta {
                batch_no: (task_index + 1) as i32,
                batch_size: config.batch_size as i32,
                source_language: config.source_language.clone(),
                target_language: config.target_language.clone(),
                required_annotations: config.required_annotations,
                random_seed: config.random_seed,
            },
            items,
        });
    }
    Ok(batches)
}

fn compose_items(
    task: &Task,
    source: &Corpus,
    targets: &HashMap<String, Corpus>,
    refs: &Corpus,
    donor_pool: &mut DonorPool,
    config: &ComposerConfig,
    rng: &mut impl Rng,
) -> Result<Vec<Item>, CoreError> {
    let mut entries = task.clone();
    if config.randomize {
        entries.shuffle(rng);
    }

    // Document blocks with their judgeable TGT items, before injection.
    let mut items: Vec<Item> = Vec::new();
    // Positions in `items` holding per-segment TGT items, paired with the
    // segment's in-document index.
    let mut tgt_slots: Vec<(usize, usize)> = Vec::new();

    for entry in &entries {
        let src_doc = source.doc(&entry.doc_id).ok_or_else(|| {
            CoreError::Validation(format!(
                "document '{}' not present in the source corpus",
                entry.doc_id
            ))
        })?;
        let tgt_corpus = targets.get(&entry.target_id).ok_or_else(|| {
            CoreError::Validation(format!("no output corpus for system '{}'", entry.target_id))
        })?;
        let tgt_doc = tgt_corpus.doc(&entry.doc_id).ok_or_else(|| {
            CoreError::Validation(format!(
                "document '{}' not present in output of system '{}'",
                entry.doc_id, entry.target_id
            ))
        })?;
        if tgt_doc.len() != src_doc.len() {
            return Err(CoreError::Validation(format!(
                "document '{}' has {} source segments but {} output segments",
                entry.doc_id,
                src_doc.len(),
                tgt_doc.len()
            )));
        }

        let src_full = join_texts(src_doc.segments.iter().map(|s| s.text.as_str()));
        let tgt_full = join_texts(tgt_doc.segments.iter().map(|s| s.text.as_str()));

        // Document header: the complete source document for context.
        items.push(boundary_item(
            config,
            entry,
            ItemType::Src,
            &src_full,
            &src_full,
        ));

        for (i, src_seg) in src_doc.segments.iter().enumerate() {
            let src_ctx = join_texts(src_doc.segments[..i].iter().map(|s| s.text.as_str()));
            let tgt_ctx = join_texts(tgt_doc.segments[..i].iter().map(|s| s.text.as_str()));
            tgt_slots.push((items.len(), i));
            items.push(Item {
                item_index: 0,
                block: -1,
                source_id: config.source_id.clone(),
                source_context_left: Some(src_ctx),
                source_text: src_seg.text.clone(),
                target_id: entry.target_id.clone(),
                target_context_left: Some(tgt_ctx),
                target_text: tgt_doc.segments[i].text.clone(),
                item_id: 0,
                item_type: ItemType::Tgt,
                document_id: entry.doc_id.clone(),
                is_complete_document: false,
            });
        }

        // Document trailer: the complete candidate document for a
        // document-level judgment.
        items.push(boundary_item(
            config,
            entry,
            ItemType::Tgt,
            &src_full,
            &tgt_full,
        ));
    }

    inject_quality_controls(&mut items, &tgt_slots, refs, donor_pool, config, rng)?;
    append_repeats(&mut items, config, rng)?;

    // Seal the batch: ids become 0-based positions over the final order.
    for (pos, item) in items.iter_mut().enumerate() {
        item.item_id = pos as i32;
        item.item_index = pos as i32;
    }
    Ok(items)
}

fn boundary_item(
    config: &ComposerConfig,
    entry: &crate::packer::DocEntry,
    item_type: ItemType,
    source_text: &str,
    target_text: &str,
) -> Item {
    Item {
        item_index: 0,
        block: -1,
        source_id: config.source_id.clone(),
        source_context_left: None,
        source_text: source_text.to_string(),
        target_id: entry.target_id.clone(),
        target_context_left: None,
        target_text: target_text.to_string(),
        item_id: 0,
        item_type,
        document_id: entry.doc_id.clone(),
        is_complete_document: true,
    }
}

/// Inject REF and BAD items immediately after a random disjoint subset of
/// TGT items, mirroring the chosen item's document context and `targetID`.
///
/// Each slot carries the mirrored item's in-document segment index, so
/// the matching reference segment is looked up directly rather than
/// reconstructed from rendered item text.
fn inject_quality_controls(
    items: &mut Vec<Item>,
    tgt_slots: &[(usize, usize)],
    refs: &Corpus,
    donor_pool: &mut DonorPool,
    config: &ComposerConfig,
    rng: &mut impl Rng,
) -> Result<(), CoreError> {
    let wanted = config.refs + config.bad_refs;
    if wanted == 0 {
        return Ok(());
    }
    if wanted > tgt_slots.len() {
        return Err(CoreError::QuotaUnsatisfiable(format!(
            "{} quality-control items requested but only {} target items available",
            wanted,
            tgt_slots.len()
        )));
    }

    let mut chosen: Vec<usize> = rand::seq::index::sample(rng, tgt_slots.len(), wanted).into_vec();
    chosen.shuffle(rng);
    // The first `refs` picks become REF, the rest BAD.
    let mut plan: Vec<(usize, usize, ItemType)> = chosen
        .iter()
        .enumerate()
        .map(|(i, &slot)| {
            let kind = if i < config.refs {
                ItemType::Ref
            } else {
                ItemType::Bad
            };
            let (pos, seg_index) = tgt_slots[slot];
            (pos, seg_index, kind)
        })
        .collect();
    // Insert back-to-front so earlier positions stay valid.
    plan.sort_unstable_by(|a, b| b.0.cmp(&a.0));

    for (pos, seg_index, kind) in plan {
        let mirrored = items[pos].clone();
        let ref_seg = reference_segment(refs, &mirrored.document_id, seg_index)?;

        let mut injected = mirrored.clone();
        injected.item_type = kind;
        injected.target_text = match kind {
            ItemType::Ref => ref_seg.text.clone(),
            ItemType::Bad => {
                let key = (mirrored.document_id.clone(), ref_seg.seg_id.clone());
                donor_pool.bad_reference_for(
                    &key,
                    &mirrored.target_text,
                    config.character_based,
                    rng,
                )?
            }
            _ => unreachable!("only REF and BAD are injected"),
        };
        items.insert(pos + 1, injected);
    }
    Ok(())
}

/// Append CHK items repeating distinct earlier TGT items verbatim.
fn append_repeats(
    items: &mut Vec<Item>,
    config: &ComposerConfig,
    rng: &mut impl Rng,
) -> Result<(), CoreError> {
    if config.redundant == 0 {
        return Ok(());
    }
    let tgt_positions: Vec<usize> = items
        .iter()
        .enumerate()
        .filter(|(_, i)| i.item_type == ItemType::Tgt && !i.is_complete_document)
        .map(|(pos, _)| pos)
        .collect();
    if config.redundant > tgt_positions.len() {
        return Err(CoreError::QuotaUnsatisfiable(format!(
            "{} repeated items requested but only {} target items available",
            config.redundant,
            tgt_positions.len()
        )));
    }

    let mut chosen: Vec<usize> =
        rand::seq::index::sample(rng, tgt_positions.len(), config.redundant).into_vec();
    chosen.sort_unstable();

    let mut repeats = Vec::with_capacity(config.redundant);
    for slot in chosen {
        let mut copy = items[tgt_positions[slot]].clone();
        copy.item_type = ItemType::Chk;
        repeats.push(copy);
    }
    // A tail in mirrored-item order would give the repeats away.
    repeats.shuffle(rng);
    items.extend(repeats);
    Ok(())
}

/// The reference segment at a given in-document position.
fn reference_segment<'a>(
    refs: &'a Corpus,
    doc_id: &str,
    seg_index: usize,
) -> Result<&'a Segment, CoreError> {
    let doc = refs.doc(doc_id).ok_or_else(|| {
        CoreError::Validation(format!(
            "document '{doc_id}' not present in the reference corpus"
        ))
    })?;
    doc.segments.get(seg_index).ok_or_else(|| {
        CoreError::Validation(format!(
            "document '{doc_id}' has no reference segment at position {seg_index}"
        ))
    })
}

fn join_texts<'a>(texts: impl Iterator<Item = &'a str>) -> String {
    texts.collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::parse_documents;
    use crate::packer::DocEntry;
    use assert_matches::assert_matches;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng(seed: u64) -> StdRng {
        StdRng::seed_from_u64(seed)
    }

    fn source() -> Corpus {
        parse_documents(
            "<doc docid=\"doc-a\">\
               <seg id=\"1\">a one two three four five six</seg>\
               <seg id=\"2\">b one two three four five six</seg>\
             </doc>\
             <doc docid=\"doc-b\">\
               <seg id=\"1\">c one two three four five six</seg>\
               <seg id=\"2\">d one two three four five six</seg>\
               <seg id=\"3\">e one two three four five six</seg>\
             </doc>",
        )
        .unwrap()
    }

    fn outputs() -> Corpus {
        parse_documents(
            "<doc docid=\"doc-a\">\
               <seg id=\"1\">A eins zwei drei vier funf sechs</seg>\
               <seg id=\"2\">B eins zwei drei vier funf sechs</seg>\
             </doc>\
             <doc docid=\"doc-b\">\
               <seg id=\"1\">C eins zwei drei vier funf sechs</seg>\
               <seg id=\"2\">D eins zwei drei vier funf sechs</seg>\
               <seg id=\"3\">E eins zwei drei vier funf sechs</seg>\
             </doc>",
        )
        .unwrap()
    }

    fn references() -> Corpus {
        parse_documents(
            "<doc docid=\"doc-a\">\
               <seg id=\"1\">RA eins zwei drei vier funf sechs</seg>\
               <seg id=\"2\">RB eins zwei drei vier funf sechs</seg>\
             </doc>\
             <doc docid=\"doc-b\">\
               <seg id=\"1\">RC eins zwei drei vier funf sechs</seg>\
               <seg id=\"2\">RD eins zwei drei vier funf sechs</seg>\
               <seg id=\"3\">RE eins zwei drei vier funf sechs</seg>\
             </doc>",
        )
        .unwrap()
    }

    fn task() -> Task {
        vec![
            DocEntry {
                len: 2,
                doc_id: "doc-a".to_string(),
                target_id: "sys-a".to_string(),
            },
            DocEntry {
                len: 3,
                doc_id: "doc-b".to_string(),
                target_id: "sys-a".to_string(),
            },
        ]
    }

    fn config(refs: usize, bad_refs: usize, redundant: usize) -> ComposerConfig {
        ComposerConfig {
            batch_size: 100,
            source_language: "eng".to_string(),
            target_language: "deu".to_string(),
            required_annotations: 1,
            source_id: "corpus.sgm".to_string(),
            refs,
            bad_refs,
            redundant,
            random_seed: 42,
            randomize: true,
            character_based: false,
        }
    }

    fn targets() -> HashMap<String, Corpus> {
        HashMap::from([("sys-a".to_string(), outputs())])
    }

    fn compose_one(cfg: &ComposerConfig, seed: u64) -> Batch {
        let mut r = rng(seed);
        compose(&[task()], &source(), &targets(), &references(), cfg, &mut r)
            .unwrap()
            .remove(0)
    }

    #[test]
    fn quotas_are_met_exactly() {
        let batch = compose_one(&config(2, 1, 2), 7);
        assert_eq!(batch.count_of(ItemType::Ref), 2);
        assert_eq!(batch.count_of(ItemType::Bad), 1);
        assert_eq!(batch.count_of(ItemType::Chk), 2);
        assert_eq!(batch.count_of(ItemType::Src), 2);
        // 5 per-segment TGTs plus 2 document trailers.
        assert_eq!(batch.count_of(ItemType::Tgt), 7);
    }

    #[test]
    fn item_ids_form_compact_zero_based_range() {
        let batch = compose_one(&config(1, 1, 1), 11);
        let mut ids: Vec<i32> = batch.items.iter().map(|i| i.item_id).collect();
        ids.sort_unstable();
        let expected: Vec<i32> = (0..batch.items.len() as i32).collect();
        assert_eq!(ids, expected);
        for item in &batch.items {
            assert_eq!(item.item_index, item.item_id);
        }
    }

    #[test]
    fn document_blocks_are_contiguous() {
        let batch = compose_one(&config(1, 1, 0), 3);
        let doc_ids: Vec<&str> = batch.items.iter().map(|i| i.document_id.as_str()).collect();
        let mut seen: Vec<&str> = Vec::new();
        for id in doc_ids {
            match seen.last() {
                Some(&last) if last == id => {}
                _ => {
                    assert!(!seen.contains(&id), "document '{id}' split across blocks");
                    seen.push(id);
                }
            }
        }
    }

    #[test]
    fn injected_items_mirror_their_target() {
        let batch = compose_one(&config(2, 2, 0), 19);
        for (pos, item) in batch.items.iter().enumerate() {
            if matches!(item.item_type, ItemType::Ref | ItemType::Bad) {
                let prev = &batch.items[pos - 1];
                assert_eq!(prev.item_type, ItemType::Tgt);
                assert_eq!(prev.document_id, item.document_id);
                assert_eq!(prev.target_id, item.target_id);
                assert_eq!(prev.source_text, item.source_text);
                assert_ne!(prev.target_text, item.target_text);
            }
        }
    }

    #[test]
    fn ref_items_carry_reference_text() {
        let batch = compose_one(&config(3, 0, 0), 23);
        for item in &batch.items {
            if item.item_type == ItemType::Ref {
                assert!(item.target_text.starts_with('R'), "{}", item.target_text);
            }
        }
    }

    #[test]
    fn bad_items_differ_from_candidate_by_a_span() {
        let batch = compose_one(&config(0, 3, 0), 29);
        let bads: Vec<&Item> = batch
            .items
            .iter()
            .filter(|i| i.item_type == ItemType::Bad)
            .collect();
        assert_eq!(bads.len(), 3);
        for bad in bads {
            // Same token count as the candidate it corrupts.
            assert_eq!(bad.target_text.split(' ').count(), 7);
        }
    }

    #[test]
    fn repeats_copy_earlier_targets_verbatim() {
        let batch = compose_one(&config(0, 0, 3), 31);
        let chk_start = batch
            .items
            .iter()
            .position(|i| i.item_type == ItemType::Chk)
            .unwrap();
        let mut mirrored = Vec::new();
        for chk in &batch.items[chk_start..] {
            assert_eq!(chk.item_type, ItemType::Chk);
            let original = batch.items[..chk_start]
                .iter()
                .find(|i| {
                    i.item_type == ItemType::Tgt
                        && !i.is_complete_document
                        && i.document_id == chk.document_id
                        && i.source_text == chk.source_text
                        && i.target_text == chk.target_text
                })
                .expect("every CHK repeats an earlier TGT");
            assert!(
                !mirrored.iter().any(|m: &String| *m == original.source_text),
                "two CHK items repeat the same target"
            );
            mirrored.push(original.source_text.clone());
        }
    }

    #[test]
    fn multiline_and_empty_segments_keep_injection_aligned() {
        let source = parse_documents(
            "<doc docid=\"doc-m\">\
               <seg id=\"1\">s one\nextra line</seg>\
               <seg id=\"2\"></seg>\
               <seg id=\"3\">s three</seg>\
             </doc>",
        )
        .unwrap();
        let outputs = parse_documents(
            "<doc docid=\"doc-m\">\
               <seg id=\"1\">t one</seg>\
               <seg id=\"2\">t two</seg>\
               <seg id=\"3\">t three</seg>\
             </doc>",
        )
        .unwrap();
        let refs = parse_documents(
            "<doc docid=\"doc-m\">\
               <seg id=\"1\">r one</seg>\
               <seg id=\"2\">r two</seg>\
               <seg id=\"3\">r three</seg>\
             </doc>",
        )
        .unwrap();
        let task: Task = vec![DocEntry {
            len: 3,
            doc_id: "doc-m".to_string(),
            target_id: "sys-a".to_string(),
        }];
        let targets = HashMap::from([("sys-a".to_string(), outputs)]);

        let mut r = rng(17);
        let batch = compose(&[task], &source, &targets, &refs, &config(3, 0, 0), &mut r)
            .unwrap()
            .remove(0);

        let mut seen = 0;
        for (pos, item) in batch.items.iter().enumerate() {
            if item.item_type == ItemType::Ref {
                seen += 1;
                let prev = &batch.items[pos - 1];
                let expected = match prev.target_text.as_str() {
                    "t one" => "r one",
                    "t two" => "r two",
                    "t three" => "r three",
                    other => panic!("unexpected mirrored text '{other}'"),
                };
                assert_eq!(item.target_text, expected);
            }
        }
        assert_eq!(seen, 3);
    }

    #[test]
    fn repeat_block_order_is_shuffled() {
        let mut any_unsorted = false;
        for seed in 0..8 {
            let batch = compose_one(&config(0, 0, 4), seed);
            let chk_start = batch
                .items
                .iter()
                .position(|i| i.item_type == ItemType::Chk)
                .unwrap();
            let mirrored: Vec<usize> = batch.items[chk_start..]
                .iter()
                .map(|chk| {
                    batch.items[..chk_start]
                        .iter()
                        .position(|i| {
                            i.item_type == ItemType::Tgt
                                && !i.is_complete_document
                                && i.target_text == chk.target_text
                        })
                        .unwrap()
                })
                .collect();
            if mirrored.windows(2).any(|w| w[0] > w[1]) {
                any_unsorted = true;
            }
        }
        assert!(any_unsorted, "repeats always appear in mirrored order");
    }

    #[test]
    fn oversubscribed_quota_rejected() {
        // Only 5 judgeable targets in the task.
        let mut r = rng(1);
        let result = compose(
            &[task()],
            &source(),
            &targets(),
            &references(),
            &config(4, 2, 0),
            &mut r,
        );
        assert_matches!(result, Err(CoreError::QuotaUnsatisfiable(_)));
    }

    #[test]
    fn oversubscribed_repeats_rejected() {
        let mut r = rng(1);
        let result = compose(
            &[task()],
            &source(),
            &targets(),
            &references(),
            &config(0, 0, 6),
            &mut r,
        );
        assert_matches!(result, Err(CoreError::QuotaUnsatisfiable(_)));
    }

    #[test]
    fn unknown_system_rejected() {
        let mut r = rng(1);
        let mut bad_task = task();
        bad_task[0].target_id = "sys-z".to_string();
        let result = compose(
            &[bad_task],
            &source(),
            &targets(),
            &references(),
            &config(0, 0, 0),
            &mut r,
        );
        assert_matches!(result, Err(CoreError::Validation(_)));
    }

    #[test]
    fn batch_metadata_is_sequential() {
        let mut r = rng(5);
        let batches = compose(
            &[task(), task()],
            &source(),
            &targets(),
            &references(),
            &config(0, 0, 0),
            &mut r,
        )
        .unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].task.batch_no, 1);
        assert_eq!(batches[1].task.batch_no, 2);
        assert_eq!(batches[0].task.random_seed, 42);
    }

    #[test]
    fn contexts_accumulate_within_document() {
        let batch = compose_one(&config(0, 0, 0), 13);
        for item in &batch.items {
            if item.item_type == ItemType::Tgt && !item.is_complete_document {
                let ctx = item.source_context_left.as_deref().unwrap();
                if !ctx.is_empty() {
                    assert!(
                        ctx.lines().all(|line| line.ends_with("six")),
                        "context must hold whole preceding segments"
                    );
                }
            }
        }
    }

    #[test]
    fn deterministic_under_fixed_seed() {
        let a = compose_one(&config(1, 1, 1), 77);
        let b = compose_one(&config(1, 1, 1), 77);
        let ja = serde_json::to_string(&a).unwrap();
        let jb = serde_json::to_string(&b).unwrap();
        assert_eq!(ja, jb);
    }

    #[test]
    fn boundary_items_flank_each_document() {
        let batch = compose_one(&config(0, 0, 0), 41);
        let mut pos = 0;
        while pos < batch.items.len() {
            let doc_id = batch.items[pos].document_id.clone();
            let block: Vec<&Item> = batch
                .items
                .iter()
                .filter(|i| i.document_id == doc_id)
                .collect();
            let first = block.first().unwrap();
            let last = block.last().unwrap();
            assert_eq!(first.item_type, ItemType::Src);
            assert!(first.is_complete_document);
            assert_eq!(last.item_type, ItemType::Tgt);
            assert!(last.is_complete_document);
            pos += block.len();
        }
    }
}
