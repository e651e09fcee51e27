//! Parallel-corpus loader.
//!
//! Parses document-structured text (SGML-style `<doc docid=...>` elements
//! wrapping `<seg id=...>` elements) into an ordered mapping from document
//! id to an ordered sequence of (segment-id, text) pairs. A line-oriented
//! form with externally supplied ids is also supported.
//!
//! The loader is byte-preserving for segment text apart from basic SGML
//! entity unescaping. Attribute quoting is lenient: double, single, or
//! bare values are all accepted.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Placeholder inserted for segments missing from a parallel side.
pub const MISSING_TRANSLATION_MESSAGE: &str = "NO TRANSLATION AVAILABLE";

/// Matches a `<doc ...>...</doc>` element, body non-greedy.
static DOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<doc\b([^>]*)>(.*?)</doc\s*>").expect("valid regex")
});

/// Matches a `<seg ...>...</seg>` element, body non-greedy.
static SEG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<seg\b([^>]*)>(.*?)</seg\s*>").expect("valid regex")
});

/// Matches a single `name=value` attribute with lenient quoting.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)([a-z][\w.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
        .expect("valid regex")
});

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Input text encoding. UTF-8 unless the caller selects UTF-16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    /// UTF-16, BOM-aware; little-endian assumed when no BOM is present.
    Utf16,
}

impl Encoding {
    /// Decode raw file bytes into a string.
    pub fn decode(self, bytes: &[u8]) -> Result<String, CoreError> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| CoreError::Encoding(format!("invalid UTF-8: {e}"))),
            Encoding::Utf16 => decode_utf16(bytes),
        }
    }
}

fn decode_utf16(bytes: &[u8]) -> Result<String, CoreError> {
    let (little_endian, data) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (true, rest),
        [0xFE, 0xFF, rest @ ..] => (false, rest),
        _ => (true, bytes),
    };
    if data.len() % 2 != 0 {
        return Err(CoreError::Encoding(
            "UTF-16 input has an odd number of bytes".to_string(),
        ));
    }
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|pair| {
            if little_endian {
                u16::from_le_bytes([pair[0], pair[1]])
            } else {
                u16::from_be_bytes([pair[0], pair[1]])
            }
        })
        .collect();
    String::from_utf16(&units)
        .map_err(|e| CoreError::Encoding(format!("invalid UTF-16: {e}")))
}

// ---------------------------------------------------------------------------
// Corpus model
// ---------------------------------------------------------------------------

/// One (segment-id, text) pair within a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub seg_id: String,
    pub text: String,
}

/// An ordered sequence of segments belonging to one source document.
/// Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub doc_id: String,
    pub segments: Vec<Segment>,
}

impl Document {
    /// Segment count.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Look up a segment by id.
    pub fn segment(&self, seg_id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.seg_id == seg_id)
    }
}

/// An ordered collection of documents with id-based lookup.
///
/// Document order is input order; within a document, segment order is
/// input order as well.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    docs: Vec<Document>,
    index: HashMap<String, usize>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document, rejecting duplicate document ids.
    pub fn push(&mut self, doc: Document) -> Result<(), CoreError> {
        if self.index.contains_key(&doc.doc_id) {
            return Err(CoreError::MalformedCorpus(format!(
                "duplicate document id '{}'",
                doc.doc_id
            )));
        }
        self.index.insert(doc.doc_id.clone(), self.docs.len());
        self.docs.push(doc);
        Ok(())
    }

    /// All documents in input order.
    pub fn docs(&self) -> &[Document] {
        &self.docs
    }

    /// Look up a document by id.
    pub fn doc(&self, doc_id: &str) -> Option<&Document> {
        self.index.get(doc_id).map(|&i| &self.docs[i])
    }

    pub fn doc_count(&self) -> usize {
        self.docs.len()
    }

    /// Total segment count across all documents.
    pub fn segment_count(&self) -> usize {
        self.docs.iter().map(Document::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Load a document-structured corpus file.
pub fn load_documents(path: &Path, encoding: Encoding) -> Result<Corpus, CoreError> {
    let bytes = std::fs::read(path).map_err(|e| {
        CoreError::MalformedCorpus(format!("cannot read {}: {e}", path.display()))
    })?;
    let text = encoding.decode(&bytes)?;
    parse_documents(&text)
}

/// Parse SGML-style document markup into a [`Corpus`].
///
/// Each `<doc>` must carry a `docid` (or `id`) attribute and each `<seg>`
/// an `id` attribute; segment ids must be unique within their document.
pub fn parse_documents(text: &str) -> Result<Corpus, CoreError> {
    let mut corpus = Corpus::new();

    for doc_caps in DOC_RE.captures_iter(text) {
        let attrs = parse_attributes(&doc_caps[1]);
        let doc_id = attrs
            .get("docid")
            .or_else(|| attrs.get("id"))
            .cloned()
            .ok_or_else(|| {
                CoreError::MalformedCorpus("doc element missing docid attribute".to_string())
            })?;

        let mut seen_ids = HashSet::new();
        let mut segments = Vec::new();
        for seg_caps in SEG_RE.captures_iter(&doc_caps[2]) {
            let seg_attrs = parse_attributes(&seg_caps[1]);
            let seg_id = seg_attrs.get("id").cloned().ok_or_else(|| {
                CoreError::MalformedCorpus(format!(
                    "seg element in document '{doc_id}' missing id attribute"
                ))
            })?;
            if !seen_ids.insert(seg_id.clone()) {
                return Err(CoreError::MalformedCorpus(format!(
                    "duplicate segment id '{seg_id}' in document '{doc_id}'"
                )));
            }
            segments.push(Segment {
                seg_id,
                text: unescape(seg_caps[2].trim()),
            });
        }

        corpus.push(Document { doc_id, segments })?;
    }

    if corpus.doc_count() == 0 {
        return Err(CoreError::MalformedCorpus(
            "no doc elements found".to_string(),
        ));
    }
    Ok(corpus)
}

/// Parse a line-oriented corpus where the i-th line pairs with the i-th
/// externally supplied (doc-id, seg-id).
pub fn parse_plain_lines(text: &str, ids: &[(String, String)]) -> Result<Corpus, CoreError> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() != ids.len() {
        return Err(CoreError::MalformedCorpus(format!(
            "{} lines but {} segment ids",
            lines.len(),
            ids.len()
        )));
    }

    let mut corpus = Corpus::new();
    let mut current: Option<Document> = None;
    for (line, (doc_id, seg_id)) in lines.iter().zip(ids) {
        if let Some(done) = current.take_if(|d| &d.doc_id != doc_id) {
            corpus.push(done)?;
        }
        let doc = current.get_or_insert_with(|| Document {
            doc_id: doc_id.clone(),
            segments: Vec::new(),
        });
        if doc.segment(seg_id).is_some() {
            return Err(CoreError::MalformedCorpus(format!(
                "duplicate segment id '{seg_id}' in document '{doc_id}'"
            )));
        }
        doc.segments.push(Segment {
            seg_id: seg_id.clone(),
            text: (*line).to_string(),
        });
    }
    if let Some(done) = current.take() {
        corpus.push(done)?;
    }

    if corpus.doc_count() == 0 {
        return Err(CoreError::MalformedCorpus("empty corpus".to_string()));
    }
    Ok(corpus)
}

/// Fill segments missing from `parallel` (relative to `source`) with the
/// [`MISSING_TRANSLATION_MESSAGE`] placeholder, preserving source order.
///
/// Returns the aligned corpus and the number of placeholders inserted.
pub fn align_to_source(source: &Corpus, parallel: &Corpus) -> Result<(Corpus, usize), CoreError> {
    let mut aligned = Corpus::new();
    let mut missing = 0;
    for src_doc in source.docs() {
        let par_doc = parallel.doc(&src_doc.doc_id);
        let mut segments = Vec::with_capacity(src_doc.len());
        for src_seg in &src_doc.segments {
            let text = par_doc
                .and_then(|d| d.segment(&src_seg.seg_id))
                .map(|s| s.text.clone())
                .unwrap_or_else(|| {
                    missing += 1;
                    MISSING_TRANSLATION_MESSAGE.to_string()
                });
            segments.push(Segment {
                seg_id: src_seg.seg_id.clone(),
                text,
            });
        }
        aligned.push(Document {
            doc_id: src_doc.doc_id.clone(),
            segments,
        })?;
    }
    Ok((aligned, missing))
}

fn parse_attributes(raw: &str) -> HashMap<String, String> {
    let mut attrs = HashMap::new();
    for caps in ATTR_RE.captures_iter(raw) {
        let name = caps[1].to_ascii_lowercase();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        attrs.insert(name, value);
    }
    attrs
}

/// Undo the basic SGML character entities.
fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
