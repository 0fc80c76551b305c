//! Files related by shared taxonomy terms.
//!
//! Detected labels are stored by the host as terms on each file. Two files
//! are "similar" when they share at least one term from a chosen vocabulary
//! (for instance the dominant colors).

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub type FileId = u64;
pub type TermId = u64;

/// Query capability over the host's file/term storage.
pub trait LabelStore: Send + Sync {
    /// Ids of every term in `vocabulary`.
    fn vocabulary_terms(&self, vocabulary: &str) -> Vec<TermId>;

    /// Terms attached to `file`.
    fn file_terms(&self, file: FileId) -> Vec<TermId>;

    /// Files carrying at least one of `terms`.
    fn files_with_any(&self, terms: &[TermId]) -> Vec<FileId>;

    /// Display title of `file`.
    fn file_title(&self, file: FileId) -> Option<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimilarFile {
    pub id: FileId,
    pub title: String,
}

/// Files sharing a `vocabulary` term with `file`, excluding `file` itself,
/// ordered by id. An empty result means nothing matched.
pub fn similar_files(store: &dyn LabelStore, file: FileId, vocabulary: &str) -> Vec<SimilarFile> {
    let vocab: BTreeSet<TermId> = store.vocabulary_terms(vocabulary).into_iter().collect();
    let shared: Vec<TermId> = store
        .file_terms(file)
        .into_iter()
        .filter(|t| vocab.contains(t))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if shared.is_empty() {
        return Vec::new();
    }

    let ids: BTreeSet<FileId> = store
        .files_with_any(&shared)
        .into_iter()
        .filter(|id| *id != file)
        .collect();

    tracing::debug!(file, vocabulary, shared = shared.len(), matches = ids.len(), "Similar files");

    ids.into_iter()
        .map(|id| SimilarFile {
            id,
            title: store.file_title(id).unwrap_or_else(|| format!("File {id}")),
        })
        .collect()
}

/// [`LabelStore`] held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLabelStore {
    vocabularies: HashMap<String, BTreeSet<TermId>>,
    term_names: HashMap<TermId, String>,
    files: BTreeMap<FileId, (String, BTreeSet<TermId>)>,
    next_term: TermId,
}

impl InMemoryLabelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `name` in `vocabulary`, creating the term if needed.
    pub fn term(&mut self, vocabulary: &str, name: &str) -> TermId {
        if let Some(id) = self.vocabularies.get(vocabulary).and_then(|terms| {
            terms
                .iter()
                .copied()
                .find(|t| self.term_names.get(t).map(String::as_str) == Some(name))
        }) {
            return id;
        }

        self.next_term += 1;
        let id = self.next_term;
        self.term_names.insert(id, name.to_string());
        self.vocabularies.entry(vocabulary.to_string()).or_default().insert(id);
        id
    }

    pub fn term_name(&self, term: TermId) -> Option<&str> {
        self.term_names.get(&term).map(String::as_str)
    }

    pub fn add_file(&mut self, file: FileId, title: impl Into<String>) {
        self.files.entry(file).or_default().0 = title.into();
    }

    /// Attach term names from `vocabulary` (e.g. detected labels) to `file`.
    pub fn tag_file<I, S>(&mut self, file: FileId, vocabulary: &str, names: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ids: Vec<TermId> = names
            .into_iter()
            .map(|n| self.term(vocabulary, n.as_ref()))
            .collect();
        self.files.entry(file).or_default().1.extend(ids);
    }
}

impl LabelStore for InMemoryLabelStore {
    fn vocabulary_terms(&self, vocabulary: &str) -> Vec<TermId> {
        self.vocabularies
            .get(vocabulary)
            .map(|t| t.iter().copied().collect())
            .unwrap_or_default()
    }

    fn file_terms(&self, file: FileId) -> Vec<TermId> {
        self.files
            .get(&file)
            .map(|(_, t)| t.iter().copied().collect())
            .unwrap_or_default()
    }

    fn files_with_any(&self, terms: &[TermId]) -> Vec<FileId> {
        self.files
            .iter()
            .filter(|(_, (_, t))| terms.iter().any(|term| t.contains(term)))
            .map(|(id, _)| *id)
            .collect()
    }

    fn file_title(&self, file: FileId) -> Option<String> {
        self.files
            .get(&file)
            .map(|(title, _)| title.clone())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InMemoryLabelStore {
        let mut store = InMemoryLabelStore::new();
        store.add_file(1, "sunset.jpg");
        store.add_file(2, "beach.jpg");
        store.add_file(3, "forest.jpg");
        store.add_file(4, "tomato.jpg");
        store.tag_file(1, "dominant_color", ["orange", "purple"]);
        store.tag_file(2, "dominant_color", ["orange", "blue"]);
        store.tag_file(3, "dominant_color", ["green"]);
        store.tag_file(4, "dominant_color", ["red"]);
        store.tag_file(4, "labels", ["vegetable"]);
        store.tag_file(3, "labels", ["vegetable"]);
        store
    }

    #[test]
    fn finds_files_sharing_a_term() {
        let store = store();
        let similar = similar_files(&store, 1, "dominant_color");
        assert_eq!(
            similar,
            vec![SimilarFile {
                id: 2,
                title: "beach.jpg".into()
            }]
        );
    }

    #[test]
    fn other_vocabularies_are_ignored() {
        let store = store();
        // 3 and 4 share only a "labels" term
        assert!(similar_files(&store, 4, "dominant_color").is_empty());
        let by_label = similar_files(&store, 4, "labels");
        assert_eq!(by_label.len(), 1);
        assert_eq!(by_label[0].id, 3);
    }

    #[test]
    fn unknown_file_has_no_matches() {
        assert!(similar_files(&store(), 99, "dominant_color").is_empty());
    }

    #[test]
    fn terms_are_reused_per_vocabulary() {
        let mut store = InMemoryLabelStore::new();
        let a = store.term("colors", "red");
        let b = store.term("colors", "red");
        let c = store.term("labels", "red");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.term_name(c), Some("red"));
    }

    #[test]
    fn untitled_files_get_a_fallback_title() {
        let mut store = InMemoryLabelStore::new();
        store.tag_file(1, "v", ["x"]);
        store.tag_file(2, "v", ["x"]);
        let similar = similar_files(&store, 1, "v");
        assert_eq!(similar[0].title, "File 2");
    }
}
