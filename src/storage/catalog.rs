use super::lexicon::Lexicon;
use super::query::{Predicate, Query};
use super::schema::{CatalogSchema, IndexKind};
use crate::core::{CatalogError, ObjectRef, Result, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

/// The projection a catalog keeps for one object: the values its indexes
/// were fed plus the stored metadata columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Record {
    pub index_values: BTreeMap<String, Value>,
    pub metadata: BTreeMap<String, Value>,
}

/// One named catalog: schema, records and the derived search structures.
///
/// Postings and lexicon occurrence lists are rebuilt from the records on
/// load, only the records, schema and lexicon vocabularies are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub name: String,
    pub schema: CatalogSchema,
    records: BTreeMap<ObjectRef, Record>,
    lexicons: HashMap<String, Lexicon>,
    #[serde(skip)]
    postings: BTreeMap<String, BTreeMap<Value, BTreeSet<ObjectRef>>>,
    #[serde(skip)]
    keyword_postings: BTreeMap<String, BTreeMap<String, BTreeSet<ObjectRef>>>,
}

impl Catalog {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: CatalogSchema::new(),
            records: BTreeMap::new(),
            lexicons: HashMap::new(),
            postings: BTreeMap::new(),
            keyword_postings: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, object_ref: &ObjectRef) -> Option<&Record> {
        self.records.get(object_ref)
    }

    pub fn contains(&self, object_ref: &ObjectRef) -> bool {
        self.records.contains_key(object_ref)
    }

    /// Every cataloged reference, ascending.
    pub fn object_refs(&self) -> Vec<ObjectRef> {
        self.records.keys().copied().collect()
    }

    pub fn lexicon(&self, index: &str) -> Option<&Lexicon> {
        self.lexicons.get(index)
    }

    /// Replace the whole record for `object_ref`.
    pub fn upsert(&mut self, object_ref: ObjectRef, record: Record) {
        self.unpost(&object_ref);
        self.records.insert(object_ref, record);
        self.post(&object_ref);
    }

    /// Merge a partial recomputation into an existing record, creating the
    /// record when the object was not cataloged yet.
    pub fn apply_values(
        &mut self,
        object_ref: ObjectRef,
        index_values: BTreeMap<String, Value>,
        metadata: BTreeMap<String, Value>,
    ) {
        self.unpost(&object_ref);
        let record = self.records.entry(object_ref).or_default();
        record.index_values.extend(index_values);
        record.metadata.extend(metadata);
        self.post(&object_ref);
    }

    pub fn remove(&mut self, object_ref: &ObjectRef) -> bool {
        self.unpost(object_ref);
        self.records.remove(object_ref).is_some()
    }

    /// Drop every record and reset the lexicons, vocabulary included.
    pub fn clear(&mut self) {
        self.records.clear();
        self.postings.clear();
        self.keyword_postings.clear();
        for lexicon in self.lexicons.values_mut() {
            lexicon.clear();
        }
    }

    /// Drop an index's derived state after its schema entry is removed.
    pub fn drop_index_state(&mut self, name: &str) {
        self.postings.remove(name);
        self.keyword_postings.remove(name);
        self.lexicons.remove(name);
        for record in self.records.values_mut() {
            record.index_values.remove(name);
        }
    }

    pub fn drop_column_state(&mut self, name: &str) {
        for record in self.records.values_mut() {
            record.metadata.remove(name);
        }
    }

    /// Rebuild postings and lexicon occurrences from the stored records.
    pub fn rehydrate(&mut self) {
        self.postings.clear();
        self.keyword_postings.clear();
        for lexicon in self.lexicons.values_mut() {
            lexicon.unindex_all();
        }
        let refs: Vec<ObjectRef> = self.records.keys().copied().collect();
        for object_ref in refs {
            self.post(&object_ref);
        }
    }

    fn post(&mut self, object_ref: &ObjectRef) {
        let Some(record) = self.records.get(object_ref) else {
            return;
        };
        let entries: Vec<(String, IndexKind, Value)> = self
            .schema
            .indexes()
            .iter()
            .filter_map(|idx| {
                record
                    .index_values
                    .get(&idx.name)
                    .filter(|value| !value.is_null())
                    .map(|value| (idx.name.clone(), idx.kind, value.clone()))
            })
            .collect();
        for (name, kind, value) in entries {
            match kind {
                IndexKind::Field | IndexKind::Range | IndexKind::Boolean => {
                    self.postings
                        .entry(name)
                        .or_default()
                        .entry(value)
                        .or_default()
                        .insert(*object_ref);
                }
                IndexKind::Keyword => {
                    let terms = self.keyword_postings.entry(name).or_default();
                    for term in keyword_terms(&value) {
                        terms.entry(term).or_default().insert(*object_ref);
                    }
                }
                IndexKind::FullText => {
                    let text = value.to_string();
                    self.lexicons
                        .entry(name)
                        .or_default()
                        .index(*object_ref, &text);
                }
            }
        }
    }

    fn unpost(&mut self, object_ref: &ObjectRef) {
        let Some(record) = self.records.get(object_ref) else {
            return;
        };
        let names: Vec<(String, IndexKind)> = self
            .schema
            .indexes()
            .iter()
            .filter(|idx| record.index_values.contains_key(&idx.name))
            .map(|idx| (idx.name.clone(), idx.kind))
            .collect();
        for (name, kind) in names {
            match kind {
                IndexKind::Field | IndexKind::Range | IndexKind::Boolean => {
                    if let Some(by_value) = self.postings.get_mut(&name) {
                        by_value.retain(|_, refs| {
                            refs.remove(object_ref);
                            !refs.is_empty()
                        });
                    }
                }
                IndexKind::Keyword => {
                    if let Some(by_term) = self.keyword_postings.get_mut(&name) {
                        by_term.retain(|_, refs| {
                            refs.remove(object_ref);
                            !refs.is_empty()
                        });
                    }
                }
                IndexKind::FullText => {
                    if let Some(lexicon) = self.lexicons.get_mut(&name) {
                        lexicon.unindex(object_ref);
                    }
                }
            }
        }
    }

    /// Evaluate a conjunctive query, returning matching references ascending.
    pub fn search(&self, query: &Query) -> Result<Vec<ObjectRef>> {
        if query.predicates().is_empty() {
            return Ok(self.object_refs());
        }
        let mut result: Option<BTreeSet<ObjectRef>> = None;
        for predicate in query.predicates() {
            let matches = self.evaluate(predicate)?;
            result = Some(match result {
                Some(acc) => acc.intersection(&matches).copied().collect(),
                None => matches,
            });
            if result.as_ref().is_some_and(BTreeSet::is_empty) {
                return Ok(Vec::new());
            }
        }
        Ok(result.unwrap_or_default().into_iter().collect())
    }

    fn evaluate(&self, predicate: &Predicate) -> Result<BTreeSet<ObjectRef>> {
        let index = self.schema.index(predicate.index_name()).ok_or_else(|| {
            CatalogError::Schema(format!(
                "catalog '{}' has no index '{}'",
                self.name,
                predicate.index_name()
            ))
        })?;
        let kind = index.kind;
        match predicate {
            Predicate::Eq(name, value) => match kind {
                IndexKind::Keyword => Ok(self.keyword_lookup(name, &value.to_string())),
                IndexKind::FullText => Ok(self.text_lookup(name, &value.to_string())),
                _ => Ok(self.exact_lookup(name, value)),
            },
            Predicate::AnyOf(name, values) => {
                let mut acc = BTreeSet::new();
                for value in values {
                    let matches = match kind {
                        IndexKind::Keyword => self.keyword_lookup(name, &value.to_string()),
                        IndexKind::FullText => self.text_lookup(name, &value.to_string()),
                        _ => self.exact_lookup(name, value),
                    };
                    acc.extend(matches);
                }
                Ok(acc)
            }
            Predicate::Within(name, low, high) => {
                if kind != IndexKind::Range {
                    return Err(CatalogError::Schema(format!(
                        "index '{}' has kind {}, range queries need RANGE",
                        name, kind
                    )));
                }
                let mut acc = BTreeSet::new();
                if let Some(by_value) = self.postings.get(name.as_str()) {
                    let range = (
                        low.as_ref()
                            .map_or(Bound::Unbounded, |v| Bound::Included(v.clone())),
                        high.as_ref()
                            .map_or(Bound::Unbounded, |v| Bound::Included(v.clone())),
                    );
                    for refs in by_value.range(range).map(|(_, refs)| refs) {
                        acc.extend(refs.iter().copied());
                    }
                }
                Ok(acc)
            }
            Predicate::Contains(name, text) => match kind {
                IndexKind::FullText => Ok(self.text_lookup(name, text)),
                IndexKind::Keyword => Ok(self.keyword_lookup(name, text)),
                _ => Err(CatalogError::Schema(format!(
                    "index '{}' has kind {}, contains queries need FULLTEXT or KEYWORD",
                    name, kind
                ))),
            },
        }
    }

    fn exact_lookup(&self, name: &str, value: &Value) -> BTreeSet<ObjectRef> {
        self.postings
            .get(name)
            .and_then(|by_value| by_value.get(value))
            .cloned()
            .unwrap_or_default()
    }

    fn keyword_lookup(&self, name: &str, term: &str) -> BTreeSet<ObjectRef> {
        self.keyword_postings
            .get(name)
            .and_then(|by_term| by_term.get(term))
            .cloned()
            .unwrap_or_default()
    }

    fn text_lookup(&self, name: &str, query: &str) -> BTreeSet<ObjectRef> {
        self.lexicons
            .get(name)
            .map(|lexicon| lexicon.search(query))
            .unwrap_or_default()
    }

    /// Clear one lexicon completely ahead of a wholesale re-feed.
    pub fn reset_lexicon(&mut self, index: &str) {
        if let Some(lexicon) = self.lexicons.get_mut(index) {
            lexicon.clear();
        }
    }
}

fn keyword_terms(value: &Value) -> Vec<String> {
    match value {
        Value::Keywords(terms) => terms.clone(),
        other => vec![other.to_string()],
    }
}
