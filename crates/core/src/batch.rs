//! Batch and item wire types.
//!
//! These structs serialize to the batch JSON consumed by the dispatcher
//! and by downstream result tooling; the field names are part of the wire
//! format and must not change.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Item type
// ---------------------------------------------------------------------------

/// Annotation item categories.
///
/// SRC items give source context, TGT items are the candidates under
/// judgment, REF and BAD are hidden quality controls (human reference and
/// synthesized wrong reference), CHK is a redundant copy of an earlier TGT
/// probing annotator consistency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    #[serde(rename = "SRC")]
    Src,
    #[serde(rename = "TGT")]
    Tgt,
    #[serde(rename = "REF")]
    Ref,
    #[serde(rename = "BAD")]
    Bad,
    #[serde(rename = "CHK")]
    Chk,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Src => "SRC",
            Self::Tgt => "TGT",
            Self::Ref => "REF",
            Self::Bad => "BAD",
            Self::Chk => "CHK",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, CoreError> {
        match s {
            "SRC" => Ok(Self::Src),
            "TGT" => Ok(Self::Tgt),
            "REF" => Ok(Self::Ref),
            "BAD" => Ok(Self::Bad),
            "CHK" => Ok(Self::Chk),
            _ => Err(CoreError::Validation(format!(
                "Invalid item type '{s}'. Must be one of: SRC, TGT, REF, BAD, CHK"
            ))),
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Items and batches
// ---------------------------------------------------------------------------

/// Join system names into a shared `targetID` for identical outputs.
///
/// Names are sorted before joining so the encoding is stable regardless of
/// discovery order.
pub fn join_target_ids<S: AsRef<str>>(names: &[S]) -> String {
    let mut sorted: Vec<&str> = names.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    sorted.join("+")
}

/// One annotation item inside a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Sequential item number within the batch; mirrors `itemID`.
    #[serde(rename = "_item")]
    pub item_index: i32,
    /// Block number, unused by this pipeline; always -1.
    #[serde(rename = "_block")]
    pub block: i32,
    /// Basename of the corpus file the batch was composed from.
    #[serde(rename = "sourceID")]
    pub source_id: String,
    #[serde(rename = "sourceContextLeft", skip_serializing_if = "Option::is_none")]
    pub source_context_left: Option<String>,
    #[serde(rename = "sourceText")]
    pub source_text: String,
    /// System name, or a "+"-joined set when systems share the output.
    #[serde(rename = "targetID")]
    pub target_id: String,
    #[serde(rename = "targetContextLeft", skip_serializing_if = "Option::is_none")]
    pub target_context_left: Option<String>,
    #[serde(rename = "targetText")]
    pub target_text: String,
    /// 0-based position within the batch, assigned after all injections.
    #[serde(rename = "itemID")]
    pub item_id: i32,
    #[serde(rename = "itemType")]
    pub item_type: ItemType,
    #[serde(rename = "documentID")]
    pub document_id: String,
    /// Marks document-boundary items used for document-level judgments.
    #[serde(rename = "isCompleteDocument")]
    pub is_complete_document: bool,
}

/// Batch-level metadata, serialized under the `task` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchMeta {
    /// 1-based batch number across the campaign.
    #[serde(rename = "batchNo")]
    pub batch_no: i32,
    #[serde(rename = "batchSize")]
    pub batch_size: i32,
    #[serde(rename = "sourceLanguage")]
    pub source_language: String,
    #[serde(rename = "targetLanguage")]
    pub target_language: String,
    #[serde(rename = "requiredAnnotations")]
    pub required_annotations: i32,
    #[serde(rename = "randomSeed")]
    pub random_seed: u64,
}

/// A sealed, ordered list of items forming one unit of annotation work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub task: BatchMeta,
    pub items: Vec<Item>,
}

impl Batch {
    /// Segment count, excluding document-boundary items.
    pub fn segment_count(&self) -> usize {
        self.items.iter().filter(|i| !i.is_complete_document).count()
    }

    /// Number of items of the given type.
    pub fn count_of(&self, item_type: ItemType) -> usize {
        self.items.iter().filter(|i| i.item_type == item_type).count()
    }

    /// Look up an item by its `itemID`.
    pub fn item(&self, item_id: i32) -> Option<&Item> {
        self.items.iter().find(|i| i.item_id == item_id)
    }
}

/// Parse a batch JSON document (top-level array of batches).
pub fn parse_batches(json: &str) -> Result<Vec<Batch>, CoreError> {
    serde_json::from_str(json)
        .map_err(|e| CoreError::Validation(format!("invalid batch JSON: {e}")))
}

/// Serialize batches to the wire format.
pub fn batches_to_json(batches: &[Batch]) -> Result<String, CoreError> {
    serde_json::to_string_pretty(batches)
        .map_err(|e| CoreError::Internal(format!("cannot serialize batches: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_type_round_trips() {
        for s in ["SRC", "TGT", "REF", "BAD", "CHK"] {
            assert_eq!(ItemType::from_str(s).unwrap().as_str(), s);
        }
    }

    #[test]
    fn item_type_invalid_rejected() {
        assert!(ItemType::from_str("XXX").is_err());
        assert!(ItemType::from_str("tgt").is_err());
    }

    #[test]
    fn join_target_ids_sorts_and_joins() {
        assert_eq!(join_target_ids(&["sys-b", "sys-a"]), "sys-a+sys-b");
        assert_eq!(join_target_ids(&["only"]), "only");
    }

    #[test]
    fn item_serializes_with_wire_field_names() {
        let item = Item {
            item_index: 0,
            block: -1,
            source_id: "corpus.sgm".to_string(),
            source_context_left: Some(String::new()),
            source_text: "src".to_string(),
            target_id: "sys-a".to_string(),
            target_context_left: Some(String::new()),
            target_text: "tgt".to_string(),
            item_id: 0,
            item_type: ItemType::Tgt,
            document_id: "doc-1".to_string(),
            is_complete_document: false,
        };
        let value = serde_json::to_value(&item).unwrap();
        for key in [
            "_item",
            "_block",
            "sourceID",
            "sourceContextLeft",
            "sourceText",
            "targetID",
            "targetContextLeft",
            "targetText",
            "itemID",
            "itemType",
            "documentID",
            "isCompleteDocument",
        ] {
            assert!(value.get(key).is_some(), "missing wire field {key}");
        }
        assert_eq!(value["itemType"], "TGT");
    }

    #[test]
    fn context_fields_omitted_when_absent() {
        let item = Item {
            item_index: 0,
            block: -1,
            source_id: "corpus.sgm".to_string(),
            source_context_left: None,
            source_text: "full doc".to_string(),
            target_id: "sys-a".to_string(),
            target_context_left: None,
            target_text: "full doc".to_string(),
            item_id: 9,
            item_type: ItemType::Tgt,
            document_id: "doc-1".to_string(),
            is_complete_document: true,
        };
        let value = serde_json::to_value(&item).unwrap();
        assert!(value.get("sourceContextLeft").is_none());
        assert!(value.get("targetContextLeft").is_none());
    }

    #[test]
    fn batch_json_round_trips() {
        let batch = Batch {
            task: BatchMeta {
                batch_no: 1,
                batch_size: 100,
                source_language: "eng".to_string(),
                target_language: "deu".to_string(),
                required_annotations: 1,
                random_seed: 123456,
            },
            items: vec![],
        };
        let json = batches_to_json(&[batch]).unwrap();
        let parsed = parse_batches(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].task.batch_no, 1);
        assert_eq!(parsed[0].task.random_seed, 123456);
    }

    #[test]
    fn invalid_batch_json_rejected() {
        assert!(parse_batches("{not json").is_err());
    }
}
