use crate::core::ObjectRef;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

lazy_static! {
    static ref WORD: Regex = Regex::new(r"[A-Za-z0-9]+").expect("word pattern is valid");
}

/// Split text into lowercase alphanumeric terms.
pub fn tokenize(text: &str) -> Vec<String> {
    WORD.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Token vocabulary and postings backing one full-text index.
///
/// Terms are interned once and never evicted when objects are unindexed,
/// so the vocabulary can hold entries no live record references. A full
/// rebuild through [`Lexicon::clear`] is the only way to shed them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Lexicon {
    tokens: HashMap<String, u64>,
    next_token: u64,
    #[serde(skip)]
    postings: HashMap<u64, BTreeSet<ObjectRef>>,
    #[serde(skip)]
    by_object: HashMap<ObjectRef, Vec<u64>>,
}

impl Lexicon {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern(&mut self, term: &str) -> u64 {
        if let Some(id) = self.tokens.get(term) {
            return *id;
        }
        let id = self.next_token;
        self.next_token += 1;
        self.tokens.insert(term.to_string(), id);
        id
    }

    /// Replace the indexed text for `object_ref`.
    pub fn index(&mut self, object_ref: ObjectRef, text: &str) {
        self.unindex(&object_ref);
        let mut ids: Vec<u64> = tokenize(text)
            .iter()
            .map(|term| self.intern(term))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        for id in &ids {
            self.postings.entry(*id).or_default().insert(object_ref);
        }
        if !ids.is_empty() {
            self.by_object.insert(object_ref, ids);
        }
    }

    /// Drop postings for `object_ref`, leaving the vocabulary untouched.
    pub fn unindex(&mut self, object_ref: &ObjectRef) {
        if let Some(ids) = self.by_object.remove(object_ref) {
            for id in ids {
                if let Some(refs) = self.postings.get_mut(&id) {
                    refs.remove(object_ref);
                    if refs.is_empty() {
                        self.postings.remove(&id);
                    }
                }
            }
        }
    }

    /// Objects whose indexed text contains every term of `query`.
    pub fn search(&self, query: &str) -> BTreeSet<ObjectRef> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return BTreeSet::new();
        }
        let mut result: Option<BTreeSet<ObjectRef>> = None;
        for term in terms {
            let matches = self
                .tokens
                .get(&term)
                .and_then(|id| self.postings.get(id))
                .cloned()
                .unwrap_or_default();
            result = Some(match result {
                Some(acc) => acc.intersection(&matches).copied().collect(),
                None => matches,
            });
            if result.as_ref().is_some_and(BTreeSet::is_empty) {
                break;
            }
        }
        result.unwrap_or_default()
    }

    /// Drop all postings while keeping the vocabulary, ahead of a re-feed.
    pub fn unindex_all(&mut self) {
        self.postings.clear();
        self.by_object.clear();
    }

    /// Discard postings and the entire vocabulary.
    pub fn clear(&mut self) {
        self.tokens.clear();
        self.postings.clear();
        self.by_object.clear();
        self.next_token = 0;
    }

    pub fn vocabulary_len(&self) -> usize {
        self.tokens.len()
    }

    pub fn has_term(&self, term: &str) -> bool {
        self.tokens.contains_key(term)
    }
}
