//! Bad-reference synthesis for hidden quality-control items.
//!
//! A bad reference is a candidate segment in which one contiguous phrase
//! has been replaced by a same-length phrase taken from an unrelated
//! reference segment. The phrase length grows with segment length so that
//! shorter segments receive proportionally larger corruptions:
//!
//! | segment length | phrase length |
//! |----------------|---------------|
//! | (0, 1]         | 1             |
//! | (1, 5]         | 2             |
//! | (5, 8]         | 3             |
//! | (8, 15]        | 4             |
//! | (15, 20]       | 5             |
//! | (20, max]      | 6             |
//!
//! Lengths are counted in whitespace tokens, or in characters for
//! character-based scripts, where the phrase length is doubled.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::corpus::Corpus;
use crate::error::CoreError;

/// A (document-id, segment-id) pair identifying one segment.
pub type SegKey = (String, String);

/// Phrase length for a segment of `seg_len` units.
pub fn phrase_length(seg_len: usize, character_based: bool) -> usize {
    let base = match seg_len {
        0..=1 => 1,
        2..=5 => 2,
        6..=8 => 3,
        9..=15 => 4,
        16..=20 => 5,
        _ => 6,
    };
    if character_based {
        2 * base
    } else {
        base
    }
}

/// Number of length units in `text` (tokens, or characters when
/// character-based). Tokenization splits on single spaces so that the
/// output of [`make_bad_reference`] re-joins byte-identically.
pub fn unit_count(text: &str, character_based: bool) -> usize {
    if character_based {
        text.chars().count()
    } else {
        text.split(' ').count()
    }
}

fn units(text: &str, character_based: bool) -> Vec<String> {
    if character_based {
        text.chars().map(String::from).collect()
    } else {
        text.split(' ').map(String::from).collect()
    }
}

/// Replace one contiguous phrase of `seg_text` with a same-length phrase
/// sampled from `donor_text`.
///
/// The replacement offset is chosen uniformly at random among all valid
/// offsets, as is the donor offset. Fails with `DonorTooShort` when the
/// donor cannot supply a phrase of the required length.
pub fn make_bad_reference(
    seg_text: &str,
    donor_text: &str,
    character_based: bool,
    rng: &mut impl Rng,
) -> Result<String, CoreError> {
    let seg = units(seg_text, character_based);
    let donor = units(donor_text, character_based);
    let phrase_len = phrase_length(seg.len(), character_based);

    if donor.len() < phrase_len {
        return Err(CoreError::DonorTooShort { phrase_len });
    }

    let seg_pos = rng.random_range(0..=seg.len().saturating_sub(phrase_len));
    let donor_pos = rng.random_range(0..=donor.len() - phrase_len);

    let mut out: Vec<&str> = Vec::with_capacity(seg.len());
    out.extend(seg[..seg_pos].iter().map(String::as_str));
    out.extend(donor[donor_pos..donor_pos + phrase_len].iter().map(String::as_str));
    out.extend(
        seg.iter()
            .skip(seg_pos + phrase_len)
            .map(String::as_str),
    );

    let joiner = if character_based { "" } else { " " };
    Ok(out.join(joiner))
}

// ---------------------------------------------------------------------------
// Donor pool
// ---------------------------------------------------------------------------

/// A shuffled pool of reference segments serving as corruption donors.
///
/// Each donor serves at most one bad reference between resets; the
/// composer resets the pool at each batch boundary. A donor is skipped
/// when it is the target segment itself or too short for the required
/// phrase length; when the scan exhausts the pool the synthesis fails
/// with `DonorTooShort`.
#[derive(Debug, Clone)]
pub struct DonorPool {
    entries: Vec<(SegKey, String)>,
    cursor: usize,
}

impl DonorPool {
    /// Build a pool from every segment of a reference corpus.
    pub fn from_corpus(refs: &Corpus, rng: &mut impl Rng) -> Self {
        let mut entries: Vec<(SegKey, String)> = Vec::with_capacity(refs.segment_count());
        for doc in refs.docs() {
            for seg in &doc.segments {
                entries.push((
                    (doc.doc_id.clone(), seg.seg_id.clone()),
                    seg.text.clone(),
                ));
            }
        }
        entries.shuffle(rng);
        Self { entries, cursor: 0 }
    }

    /// Return all donors to the pool and reshuffle. Called per batch.
    pub fn reset(&mut self, rng: &mut impl Rng) {
        self.cursor = 0;
        self.entries.shuffle(rng);
    }

    /// Total donors in the pool.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Donors still available before the next reset.
    pub fn remaining(&self) -> usize {
        self.entries.len() - self.cursor
    }

    /// Synthesize a bad reference for `seg_text`, drawing the next
    /// acceptable donor from the pool.
    pub fn bad_reference_for(
        &mut self,
        target: &SegKey,
        seg_text: &str,
        character_based: bool,
        rng: &mut impl Rng,
    ) -> Result<String, CoreError> {
        let phrase_len =
            phrase_length(unit_count(seg_text, character_based), character_based);

        for i in self.cursor..self.entries.len() {
            let acceptable = {
                let (key, text) = &self.entries[i];
                key != target && unit_count(text, character_based) >= phrase_len
            };
            if acceptable {
                self.entries.swap(self.cursor, i);
                let donor_text = self.entries[self.cursor].1.clone();
                self.cursor += 1;
                return make_bad_reference(seg_text, &donor_text, character_based, rng);
            }
        }
        Err(CoreError::DonorTooShort { phrase_len })
    }
}
