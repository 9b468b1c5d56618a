//! Exhaustive top-K ranking over an in-memory [`Dataset`].
//!
//! Every stored vector is scored against the query; results are ordered by
//! descending similarity, and entries with equal similarity keep their
//! dataset order. The same query over the same corpus always yields the
//! same list.

use std::cmp::Ordering;

use glimpse_core::model::{append_query, Dataset, IndexEntry, Vector};
use glimpse_core::store::DatasetStore;

use crate::error::{SearchError, SearchResult};

/// One ranked result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub id: String,
    pub url: String,
    pub similarity: f32,
}

impl SearchHit {
    /// The result URL with presentation parameters (e.g. a thumbnail size).
    #[must_use]
    pub fn display_url(&self, query: &str) -> String {
        append_query(&self.url, query)
    }
}

#[derive(Debug, Clone, Copy)]
struct Scored {
    index: usize,
    similarity: f32,
}

/// NaN sorts below every real score.
fn key(similarity: f32) -> f32 {
    if similarity.is_nan() {
        f32::NEG_INFINITY
    } else {
        similarity
    }
}

/// Higher similarity first, then lower dataset position.
fn rank(a: &Scored, b: &Scored) -> Ordering {
    key(b.similarity)
        .total_cmp(&key(a.similarity))
        .then(a.index.cmp(&b.index))
}

/// Keep the best `top_k` of `scored`, sorted by [`rank`].
fn best(mut scored: Vec<Scored>, top_k: usize) -> Vec<Scored> {
    if scored.len() > top_k {
        scored.select_nth_unstable_by(top_k - 1, rank);
        scored.truncate(top_k);
    }
    scored.sort_by(rank);
    scored
}

fn score(entries: &[IndexEntry], offset: usize, query: &Vector) -> Vec<Scored> {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| Scored {
            index: offset + i,
            similarity: entry.vector.dot(query),
        })
        .collect()
}

/// Answers similarity queries against a loaded dataset.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    dataset: Dataset,
}

impl QueryEngine {
    #[must_use]
    pub fn new(dataset: Dataset) -> Self {
        Self { dataset }
    }

    /// Load the persisted dataset behind `store`.
    pub fn open(store: &DatasetStore) -> SearchResult<Self> {
        let dataset = store.load()?;
        log::info!(
            "Loaded {} embeddings from {}",
            dataset.len(),
            store.vectors_path().display()
        );
        Ok(Self::new(dataset))
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn len(&self) -> usize {
        self.dataset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    fn check(&self, query: &Vector) -> SearchResult<()> {
        if query.dimension() == self.dataset.dimension() {
            Ok(())
        } else {
            Err(SearchError::DimensionMismatch {
                expected: self.dataset.dimension(),
                actual: query.dimension(),
            })
        }
    }

    fn hits(&self, ranked: Vec<Scored>) -> Vec<SearchHit> {
        let entries = self.dataset.entries();
        ranked
            .into_iter()
            .map(|s| {
                let entry = &entries[s.index];
                SearchHit {
                    id: entry.id().to_string(),
                    url: entry.url().to_string(),
                    similarity: s.similarity,
                }
            })
            .collect()
    }

    /// The `top_k` entries most similar to `query`.
    ///
    /// # Errors
    /// Returns [`SearchError::DimensionMismatch`] if the query and corpus
    /// dimensions differ, even when the corpus is empty.
    pub fn search(&self, query: &Vector, top_k: usize) -> SearchResult<Vec<SearchHit>> {
        self.check(query)?;
        if top_k == 0 || self.dataset.is_empty() {
            return Ok(Vec::new());
        }

        let scored = score(self.dataset.entries(), 0, query);
        Ok(self.hits(best(scored, top_k)))
    }

    /// Same result as [`search`](Self::search), scoring `shards` contiguous
    /// slices of the corpus on scoped threads.
    ///
    /// # Errors
    /// As `search`; also [`SearchError::ShardPanicked`] if a worker panics.
    pub fn search_sharded(
        &self,
        query: &Vector,
        top_k: usize,
        shards: usize,
    ) -> SearchResult<Vec<SearchHit>> {
        self.check(query)?;
        let entries = self.dataset.entries();
        if top_k == 0 || entries.is_empty() {
            return Ok(Vec::new());
        }

        let chunk = entries.len().div_ceil(shards.max(1));
        let partials = std::thread::scope(|scope| {
            let handles: Vec<_> = entries
                .chunks(chunk)
                .enumerate()
                .map(|(n, slice)| {
                    scope.spawn(move || best(score(slice, n * chunk, query), top_k))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().map_err(|_| SearchError::ShardPanicked))
                .collect::<SearchResult<Vec<_>>>()
        })?;

        let merged = partials.into_iter().flatten().collect();
        Ok(self.hits(best(merged, top_k)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glimpse_core::model::{CatalogRecord, StoreLayout};
    use tempfile::TempDir;

    fn corpus(dimension: usize, vectors: &[(&str, Vec<f32>)]) -> Dataset {
        let mut dataset = Dataset::new(dimension);
        for (id, values) in vectors {
            dataset
                .insert(IndexEntry::new(
                    CatalogRecord::new(*id, format!("https://images.unsplash.com/{id}")),
                    Vector::new(values.clone()),
                ))
                .unwrap();
        }
        dataset
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.id.as_str()).collect()
    }

    #[test]
    fn test_ranks_by_cosine_similarity() {
        let engine = QueryEngine::new(corpus(
            2,
            &[
                ("a", vec![1.0, 0.0]),
                ("b", vec![0.0, 1.0]),
                ("c", vec![0.707, 0.707]),
            ],
        ));

        let hits = engine.search(&Vector::new(vec![1.0, 0.0]), 3).unwrap();

        assert_eq!(ids(&hits), vec!["a", "c", "b"]);
        assert!((hits[0].similarity - 1.0).abs() < 1e-6);
        assert!((hits[1].similarity - 0.707).abs() < 1e-6);
        assert!(hits[2].similarity.abs() < 1e-6);
    }

    #[test]
    fn test_truncates_to_top_k() {
        let engine = QueryEngine::new(corpus(
            2,
            &[
                ("a", vec![1.0, 0.0]),
                ("b", vec![0.0, 1.0]),
                ("c", vec![0.707, 0.707]),
            ],
        ));
        let query = Vector::new(vec![1.0, 0.0]);

        assert_eq!(ids(&engine.search(&query, 2).unwrap()), vec!["a", "c"]);
        assert_eq!(engine.search(&query, 10).unwrap().len(), 3);
        assert!(engine.search(&query, 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_keep_dataset_order() {
        let engine = QueryEngine::new(corpus(
            2,
            &[
                ("first", vec![0.0, 1.0]),
                ("best", vec![1.0, 0.0]),
                ("second", vec![0.0, 1.0]),
                ("third", vec![0.0, 1.0]),
            ],
        ));
        let query = Vector::new(vec![1.0, 0.0]);

        let hits = engine.search(&query, 3).unwrap();
        assert_eq!(ids(&hits), vec!["best", "first", "second"]);
        assert_eq!(engine.search(&query, 3).unwrap(), hits);
    }

    #[test]
    fn test_empty_corpus() {
        let engine = QueryEngine::new(Dataset::new(2));
        assert!(engine.search(&Vector::new(vec![1.0, 0.0]), 5).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let engine = QueryEngine::new(corpus(2, &[("a", vec![1.0, 0.0])]));
        let query = Vector::new(vec![1.0, 0.0, 0.0]);

        assert!(matches!(
            engine.search(&query, 5),
            Err(SearchError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert!(engine.search_sharded(&query, 5, 4).is_err());
        // Checked before the empty-corpus shortcut.
        assert!(QueryEngine::new(Dataset::new(2)).search(&query, 5).is_err());
    }

    #[test]
    fn test_sharded_matches_sequential() {
        // Coarse components produce many exact ties.
        let vectors: Vec<(String, Vec<f32>)> = (0..97)
            .map(|i| {
                let x = ((i * 37) % 5) as f32;
                let y = ((i * 11) % 3) as f32 + 1.0;
                (format!("p{i}"), vec![x, y])
            })
            .collect();
        let refs: Vec<(&str, Vec<f32>)> = vectors
            .iter()
            .map(|(id, v)| (id.as_str(), v.clone()))
            .collect();
        let engine = QueryEngine::new(corpus(2, &refs));
        let query = Vector::new(vec![0.6, 0.8]);

        for top_k in [1, 10, 97, 200] {
            let expected = engine.search(&query, top_k).unwrap();
            for shards in [1, 2, 3, 8, 200] {
                assert_eq!(
                    engine.search_sharded(&query, top_k, shards).unwrap(),
                    expected,
                    "top_k={top_k} shards={shards}"
                );
            }
        }
    }

    #[test]
    fn test_open_from_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = DatasetStore::in_dir(temp_dir.path(), StoreLayout::Positional, 2);
        store
            .save(&corpus(2, &[("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]))
            .unwrap();

        let engine = QueryEngine::open(&store).unwrap();
        assert_eq!(engine.len(), 2);
        let hits = engine.search(&Vector::new(vec![0.0, 1.0]), 1).unwrap();
        assert_eq!(ids(&hits), vec!["b"]);
    }

    #[test]
    fn test_nan_scores_rank_last() {
        let engine = QueryEngine::new(corpus(
            2,
            &[
                ("broken", vec![f32::NAN, 0.0]),
                ("far", vec![-1.0, 0.0]),
                ("near", vec![1.0, 0.0]),
            ],
        ));
        let query = Vector::new(vec![1.0, 0.0]);

        let hits = engine.search(&query, 3).unwrap();
        assert_eq!(ids(&hits), vec!["near", "far", "broken"]);
        assert_eq!(ids(&engine.search(&query, 1).unwrap()), vec!["near"]);
        assert_eq!(engine.search_sharded(&query, 3, 3).unwrap(), hits);
    }

    #[test]
    fn test_open_refuses_truncated_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = DatasetStore::in_dir(temp_dir.path(), StoreLayout::Positional, 2);
        store
            .save(&corpus(2, &[("a", vec![1.0, 0.0]), ("b", vec![0.0, 1.0])]))
            .unwrap();

        // One entry is 2 x 4 bytes; cut the second short.
        let bytes = std::fs::read(store.vectors_path()).unwrap();
        std::fs::write(store.vectors_path(), &bytes[..12]).unwrap();

        assert!(matches!(
            QueryEngine::open(&store),
            Err(SearchError::Store(glimpse_core::Error::CorruptStore { .. }))
        ));
    }

    #[test]
    fn test_display_url_adds_thumbnail_query() {
        let hit = SearchHit {
            id: "a".to_string(),
            url: "https://images.unsplash.com/photo-a".to_string(),
            similarity: 0.3,
        };
        assert_eq!(
            hit.display_url("w=512&h=512&fit=max&q=90"),
            "https://images.unsplash.com/photo-a?w=512&h=512&fit=max&q=90"
        );
    }
}
