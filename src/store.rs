use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str;

use fst::automaton::Str;
use fst::{Automaton, IntoStreamer, Set, Streamer};
use once_cell::sync::Lazy;
use rapidfuzz::distance::levenshtein;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::data::{CoordinateTable, ProjectedPair, SearchIndex, WordRecord, WordRecords};
use crate::error::{FetchError, InitializationError, LoadError, OptionalLoadError};

pub const WORD_DATA_DOCUMENT: &str = "word_data.json";
pub const SEARCH_INDEX_DOCUMENT: &str = "search_index.json";
pub const COORDINATES_DOCUMENT: &str = "tsne_coords.json";
pub const DEMO_DOCUMENT: &str = "demo_word_data.json";

const MIN_SUGGESTION_PREFIX: usize = 2;
const DEMO_SUGGESTION_PREFIX: usize = 3;
const NEAR_MATCH_THRESHOLD: f64 = 0.5;

static BUILTIN_DEMO_JSON: &str = include_str!("../data/demo_word_data.json");

static BUILTIN_DEMO: Lazy<Result<WordRecords, String>> =
    Lazy::new(|| serde_json::from_str(BUILTIN_DEMO_JSON).map_err(|err| err.to_string()));

/// Where the static documents come from.
pub trait DocumentSource {
    fn fetch(&self, name: &str) -> Result<String, FetchError>;

    fn describe(&self) -> String;
}

/// Reads documents from a data directory on disk.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentSource for DirectorySource {
    fn fetch(&self, name: &str) -> Result<String, FetchError> {
        let path = self.root.join(name);
        match fs::read_to_string(&path) {
            Ok(body) => Ok(body),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(FetchError::Missing(path.display().to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}

/// In-memory documents, keyed by document name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, body: impl Into<String>) -> Self {
        self.documents.insert(name.to_string(), body.into());
        self
    }
}

impl DocumentSource for MemorySource {
    fn fetch(&self, name: &str) -> Result<String, FetchError> {
        self.documents
            .get(name)
            .cloned()
            .ok_or_else(|| FetchError::Missing(name.to_string()))
    }

    fn describe(&self) -> String {
        format!("memory ({} documents)", self.documents.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetOrigin {
    Primary,
    DemoDocument,
    BuiltinDemo,
}

/// Immutable dataset for a session.
pub struct DataStore {
    records: WordRecords,
    search: SearchIndex,
    coordinates: Option<CoordinateTable>,
    vocabulary: Set<Vec<u8>>,
    origin: DatasetOrigin,
}

impl DataStore {
    /// Loads word records and the search index, degrading to demo data when
    /// either is unusable. The coordinate table is best-effort.
    pub fn load(source: &dyn DocumentSource) -> Result<Self, InitializationError> {
        match load_primary(source) {
            Ok((records, search)) => {
                let coordinates = match load_coordinates(source) {
                    Ok(table) => Some(table),
                    Err(err) => {
                        log_optional(&err);
                        None
                    }
                };
                let store = Self::from_parts(records, search, coordinates, DatasetOrigin::Primary)?;
                info!(
                    source = %source.describe(),
                    words = store.len(),
                    coordinates = store.has_coordinates(),
                    "Loaded word data"
                );
                Ok(store)
            }
            Err(err) => {
                warn!(
                    source = %source.describe(),
                    error = %err,
                    "Could not load data files, using demo data"
                );
                match load_demo_document(source) {
                    Ok(records) => {
                        let search = demo_search_index(&records);
                        let store =
                            Self::from_parts(records, search, None, DatasetOrigin::DemoDocument)?;
                        info!(words = store.len(), "Loaded demo data from file");
                        Ok(store)
                    }
                    Err(err) => {
                        log_optional(&err);
                        Self::builtin_demo()
                    }
                }
            }
        }
    }

    /// The demo vocabulary compiled into the binary.
    pub fn builtin_demo() -> Result<Self, InitializationError> {
        let records = BUILTIN_DEMO
            .as_ref()
            .map_err(|err| InitializationError::BuiltinDemo(err.clone()))?
            .clone();
        let search = demo_search_index(&records);
        let store = Self::from_parts(records, search, None, DatasetOrigin::BuiltinDemo)?;
        info!(words = store.len(), "Using built-in demo data");
        Ok(store)
    }

    pub fn from_parts(
        records: WordRecords,
        search: SearchIndex,
        coordinates: Option<CoordinateTable>,
        origin: DatasetOrigin,
    ) -> Result<Self, InitializationError> {
        let records = normalize_keys(records);
        if records.is_empty() {
            return Err(InitializationError::EmptyDataset);
        }
        let search = SearchIndex {
            words: search.words.iter().map(|w| normalize_word(w)).collect(),
            suggestions: search
                .suggestions
                .into_iter()
                .map(|(prefix, words)| (normalize_word(&prefix), words))
                .collect(),
        };
        let coordinates = coordinates.map(normalize_keys);
        let mut keys: Vec<&str> = records.keys().map(String::as_str).collect();
        keys.sort_unstable();
        let vocabulary =
            Set::from_iter(keys).map_err(|err| InitializationError::Index(err.to_string()))?;
        Ok(Self {
            records,
            search,
            coordinates,
            vocabulary,
            origin,
        })
    }

    /// Exact, case-insensitive lookup.
    pub fn lookup(&self, word: &str) -> Option<&WordRecord> {
        self.records.get(&normalize_word(word))
    }

    pub fn contains(&self, word: &str) -> bool {
        self.lookup(word).is_some()
    }

    /// Configured autocomplete list for an exact prefix key.
    pub fn suggestions_for(&self, prefix: &str) -> Vec<String> {
        let prefix = normalize_word(prefix);
        if prefix.chars().count() < MIN_SUGGESTION_PREFIX {
            return Vec::new();
        }
        self.search
            .suggestions
            .get(&prefix)
            .cloned()
            .unwrap_or_default()
    }

    /// Known words starting with `prefix`, in byte order.
    pub fn words_with_prefix(&self, prefix: &str, limit: usize) -> Vec<String> {
        let prefix = normalize_word(prefix);
        let automaton = Str::new(&prefix).starts_with();
        let mut stream = self.vocabulary.search(automaton).into_stream();
        let mut results = Vec::new();
        while let Some(key) = stream.next() {
            if results.len() >= limit {
                break;
            }
            if let Ok(word) = str::from_utf8(key) {
                results.push(word.to_string());
            }
        }
        results
    }

    /// Known words that look like `word`, best match first. Used for hints
    /// only; lookup never goes through this.
    pub fn closest_words(&self, word: &str, limit: usize) -> Vec<String> {
        let query = normalize_word(word);
        if query.is_empty() || limit == 0 {
            return Vec::new();
        }
        let mut scored: Vec<(f64, &str)> = self
            .records
            .keys()
            .filter(|key| **key != query)
            .filter_map(|key| {
                let score = levenshtein::normalized_similarity(query.chars(), key.chars());
                (score >= NEAR_MATCH_THRESHOLD).then_some((score, key.as_str()))
            })
            .collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });
        scored
            .into_iter()
            .take(limit)
            .map(|(_, word)| word.to_string())
            .collect()
    }

    pub fn coordinates_for(&self, word: &str) -> Option<&ProjectedPair> {
        self.coordinates
            .as_ref()
            .and_then(|table| table.get(&normalize_word(word)))
    }

    pub fn has_coordinates(&self) -> bool {
        self.coordinates.is_some()
    }

    pub fn origin(&self) -> DatasetOrigin {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Words listed by the search index, falling back to every record key.
    pub fn known_words(&self) -> Vec<String> {
        if self.search.words.is_empty() {
            self.words_with_prefix("", self.len())
        } else {
            self.search.words.clone()
        }
    }
}

/// Lookup key for a user-supplied word.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}

fn normalize_keys<V>(map: HashMap<String, V>) -> HashMap<String, V> {
    let mut normalized = HashMap::with_capacity(map.len());
    for (key, value) in map {
        let lower = normalize_word(&key);
        let exact = lower == key;
        match normalized.entry(lower) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            // An already-lowercase key beats a differently cased duplicate.
            Entry::Occupied(mut slot) if exact => {
                slot.insert(value);
            }
            Entry::Occupied(_) => {}
        }
    }
    normalized
}

fn fetch_json<T: DeserializeOwned>(
    source: &dyn DocumentSource,
    document: &'static str,
) -> Result<T, LoadError> {
    let body = source
        .fetch(document)
        .map_err(|source| LoadError::Fetch { document, source })?;
    serde_json::from_str(&body).map_err(|source| LoadError::Parse { document, source })
}

fn load_primary(source: &dyn DocumentSource) -> Result<(WordRecords, SearchIndex), LoadError> {
    let records = fetch_json(source, WORD_DATA_DOCUMENT)?;
    let search = fetch_json(source, SEARCH_INDEX_DOCUMENT)?;
    Ok((records, search))
}

fn load_coordinates(source: &dyn DocumentSource) -> Result<CoordinateTable, OptionalLoadError> {
    Ok(fetch_json(source, COORDINATES_DOCUMENT)?)
}

fn load_demo_document(source: &dyn DocumentSource) -> Result<WordRecords, OptionalLoadError> {
    let records: WordRecords = fetch_json(source, DEMO_DOCUMENT)?;
    if records.is_empty() {
        return Err(OptionalLoadError(LoadError::Fetch {
            document: DEMO_DOCUMENT,
            source: FetchError::Missing(format!("{DEMO_DOCUMENT} (empty)")),
        }));
    }
    Ok(records)
}

fn log_optional(err: &OptionalLoadError) {
    match &err.0 {
        LoadError::Fetch {
            source: FetchError::Missing(_),
            ..
        } => debug!(document = err.0.document(), "Optional document not present"),
        other => warn!(document = other.document(), error = %other, "Optional document unusable"),
    }
}

fn demo_search_index(records: &WordRecords) -> SearchIndex {
    let mut words: Vec<String> = records.keys().map(|w| normalize_word(w)).collect();
    words.sort();
    let mut suggestions: HashMap<String, Vec<String>> = HashMap::new();
    for word in &words {
        let chars: Vec<char> = word.chars().collect();
        for len in 1..=DEMO_SUGGESTION_PREFIX.min(chars.len()) {
            let prefix: String = chars[..len].iter().collect();
            suggestions.entry(prefix).or_default().push(word.clone());
        }
    }
    SearchIndex { words, suggestions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ShiftClass;

    const WORD_DATA: &str = r#"{
        "Ветер": {
            "cosine_similarity": 0.61,
            "neighbor_overlap": 0.2,
            "shift_type": "Strong Shift",
            "shift_class": "danger",
            "canonical_neighbors": [["буря", 0.7], ["волна", 0.6]],
            "naive_neighbors": [["погода", 0.66]]
        },
        "волна": {
            "cosine_similarity": 0.8,
            "neighbor_overlap": 0.5,
            "shift_type": "Stable",
            "shift_class": "success",
            "canonical_neighbors": [["море", 0.9]],
            "naive_neighbors": [["море", 0.85]]
        }
    }"#;

    const SEARCH_INDEX: &str = r#"{
        "words": ["ветер", "волна"],
        "suggestions": {"в": ["ветер", "волна"], "ве": ["ветер"], "ВО": ["волна"]}
    }"#;

    fn primary_source() -> MemorySource {
        MemorySource::new()
            .with(WORD_DATA_DOCUMENT, WORD_DATA)
            .with(SEARCH_INDEX_DOCUMENT, SEARCH_INDEX)
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        let store = DataStore::load(&primary_source()).unwrap();
        assert_eq!(store.origin(), DatasetOrigin::Primary);
        let expected = store.lookup("ветер").unwrap();
        for variant in ["ВЕТЕР", "Ветер", "вЕтЕр", "  ветер "] {
            assert_eq!(store.lookup(variant), Some(expected), "variant {variant:?}");
        }
        assert_eq!(expected.shift_class, ShiftClass::Danger);
        assert!(store.lookup("ветерок").is_none());
    }

    #[test]
    fn suggestions_need_two_characters() {
        let store = DataStore::load(&primary_source()).unwrap();
        assert!(store.suggestions_for("в").is_empty());
        assert_eq!(store.suggestions_for("Ве"), vec!["ветер".to_string()]);
        assert_eq!(store.suggestions_for("во"), vec!["волна".to_string()]);
        assert!(store.suggestions_for("вх").is_empty());
    }

    #[test]
    fn missing_search_index_falls_back_to_builtin_demo() {
        let source = MemorySource::new().with(WORD_DATA_DOCUMENT, WORD_DATA);
        let store = DataStore::load(&source).unwrap();
        assert_eq!(store.origin(), DatasetOrigin::BuiltinDemo);
        assert!(store.lookup("ветер").is_none());
        assert!(store.lookup("Поэзия").is_some());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn corrupt_word_data_prefers_demo_document() {
        let demo = r#"{"море": {"cosine_similarity": 0.7, "neighbor_overlap": 0.3, "shift_type": "Context Shift", "shift_class": "warning", "canonical_neighbors": [["волна", 0.8]], "naive_neighbors": [["пляж", 0.7]]}}"#;
        let source = MemorySource::new()
            .with(WORD_DATA_DOCUMENT, "{not json")
            .with(SEARCH_INDEX_DOCUMENT, SEARCH_INDEX)
            .with(DEMO_DOCUMENT, demo);
        let store = DataStore::load(&source).unwrap();
        assert_eq!(store.origin(), DatasetOrigin::DemoDocument);
        assert!(store.contains("МОРЕ"));
        assert_eq!(store.suggestions_for("мо"), vec!["море".to_string()]);
    }

    #[test]
    fn broken_coordinates_do_not_fail_load() {
        let source = primary_source().with(COORDINATES_DOCUMENT, "[1, 2");
        let store = DataStore::load(&source).unwrap();
        assert_eq!(store.origin(), DatasetOrigin::Primary);
        assert!(!store.has_coordinates());

        let coords = r#"{"Волна": {"canonical": {"x": 1.0, "y": 1.0}, "naive": {"x": 2.0, "y": -1.0}}}"#;
        let store = DataStore::load(&primary_source().with(COORDINATES_DOCUMENT, coords)).unwrap();
        assert!(store.has_coordinates());
        assert_eq!(store.coordinates_for("волна").unwrap().naive.x, 2.0);
    }

    #[test]
    fn empty_dataset_is_an_initialization_error() {
        let source = MemorySource::new()
            .with(WORD_DATA_DOCUMENT, "{}")
            .with(SEARCH_INDEX_DOCUMENT, "{}");
        assert!(matches!(
            DataStore::load(&source),
            Err(InitializationError::EmptyDataset)
        ));
    }

    #[test]
    fn prefix_browse_and_near_matches() {
        let store = DataStore::load(&primary_source()).unwrap();
        assert_eq!(store.words_with_prefix("В", 10), vec!["ветер", "волна"]);
        assert_eq!(store.words_with_prefix("", 1), vec!["ветер"]);
        assert_eq!(store.closest_words("ветры", 3), vec!["ветер"]);
        assert!(store.closest_words("", 3).is_empty());
    }

    #[test]
    fn builtin_demo_has_documented_record() {
        let store = DataStore::builtin_demo().unwrap();
        let record = store.lookup("поэзия").unwrap();
        assert_eq!(record.cosine_similarity, 0.75);
        assert_eq!(record.canonical_neighbors[0].word, "стих");
        assert_eq!(record.naive_neighbors[0].word, "творчество");
        assert_eq!(store.suggestions_for("по"), vec!["поэзия".to_string()]);
        assert_eq!(store.known_words(), vec!["душа", "любовь", "поэзия"]);
    }
}
