//! The `batch-stats` job: quick diagnostics over a batch JSON document.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use mteval_core::batch::{parse_batches, Batch};
use mteval_core::error::CoreError;

/// Aggregate counts over a batch JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub batches: usize,
    pub items: usize,
    /// Item count per item type, keyed by wire name.
    pub type_counts: BTreeMap<String, usize>,
    /// Distinct document ids judged per system.
    pub system_docs: BTreeMap<String, BTreeSet<String>>,
}

impl BatchStats {
    pub fn from_batches(batches: &[Batch]) -> Self {
        let mut type_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut system_docs: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut items = 0;

        for batch in batches {
            for item in &batch.items {
                items += 1;
                *type_counts
                    .entry(item.item_type.as_str().to_string())
                    .or_insert(0) += 1;
                system_docs
                    .entry(item.target_id.clone())
                    .or_default()
                    .insert(item.document_id.clone());
            }
        }
        Self {
            batches: batches.len(),
            items,
            type_counts,
            system_docs,
        }
    }

    /// Human-readable report.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("batches: {}\n", self.batches));
        out.push_str(&format!("items:   {}\n", self.items));
        out.push_str("item types:\n");
        for (name, count) in &self.type_counts {
            out.push_str(&format!("  {name}: {count}\n"));
        }
        out.push_str("documents per system:\n");
        for (system, docs) in &self.system_docs {
            out.push_str(&format!("  {system}: {}\n", docs.len()));
        }
        out
    }
}

/// Load a batch JSON file and aggregate its statistics.
pub fn run(batch_json: &Path) -> Result<BatchStats, CoreError> {
    let json = std::fs::read_to_string(batch_json).map_err(|e| {
        CoreError::Validation(format!("cannot read {}: {e}", batch_json.display()))
    })?;
    let batches = parse_batches(&json)?;
    Ok(BatchStats::from_batches(&batches))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mteval_core::batch::{BatchMeta, Item, ItemType};

    fn item(item_id: i32, item_type: ItemType, doc: &str, system: &str) -> Item {
        Item {
            item_index: item_id,
            block: -1,
            source_id: "src.sgm".to_string(),
            source_context_left: None,
            source_text: String::new(),
            target_id: system.to_string(),
            target_context_left: None,
            target_text: String::new(),
            item_id,
            item_type,
            document_id: doc.to_string(),
            is_complete_document: false,
        }
    }

    fn sample() -> Vec<Batch> {
        vec![Batch {
            task: BatchMeta {
                batch_no: 1,
                batch_size: 100,
                source_language: "eng".to_string(),
                target_language: "deu".to_string(),
                required_annotations: 1,
                random_seed: 1,
            },
            items: vec![
                item(0, ItemType::Tgt, "d1", "sys-a"),
                item(1, ItemType::Tgt, "d2", "sys-a"),
                item(2, ItemType::Ref, "d1", "sys-a"),
                item(3, ItemType::Tgt, "d1", "sys-b"),
            ],
        }]
    }

    #[test]
    fn counts_types_and_documents() {
        let stats = BatchStats::from_batches(&sample());
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.items, 4);
        assert_eq!(stats.type_counts["TGT"], 3);
        assert_eq!(stats.type_counts["REF"], 1);
        assert_eq!(stats.system_docs["sys-a"].len(), 2);
        assert_eq!(stats.system_docs["sys-b"].len(), 1);
    }

    #[test]
    fn render_mentions_every_section() {
        let text = BatchStats::from_batches(&sample()).render();
        assert!(text.contains("batches: 1"));
        assert!(text.contains("TGT: 3"));
        assert!(text.contains("sys-a: 2"));
    }
}
