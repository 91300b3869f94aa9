//! Exemplar store with k-nearest-neighbor majority voting.

use std::collections::BTreeMap;

use crate::similarity::nearest;
use crate::types::{FeatureVector, MatcherError, NeighborVote};

/// Incrementally updatable nearest-neighbor classifier over feature vectors.
pub trait ExemplarMatcher {
    /// Store a labeled vector.
    fn add_exemplar(&mut self, vector: FeatureVector, label: &str) -> Result<(), MatcherError>;

    /// Whether `add_exemplar` would accept `vector`. Stores nothing.
    fn check_exemplar(&self, _vector: &FeatureVector) -> Result<(), MatcherError> {
        Ok(())
    }

    /// Majority label among the `k` exemplars nearest to `vector`.
    ///
    /// A zero-magnitude `vector` is rejected with [`MatcherError::ZeroQuery`].
    fn query(&self, vector: &FeatureVector, k: usize) -> Result<NeighborVote, MatcherError>;

    fn exemplar_count(&self) -> usize;

    fn exemplar_count_for(&self, label: &str) -> usize;

    /// Drop every exemplar.
    fn clear(&mut self);
}

#[derive(Debug, Clone)]
struct Exemplar {
    vector: FeatureVector,
    label: String,
}

/// Brute-force cosine kNN classifier.
#[derive(Debug, Clone, Default)]
pub struct KnnClassifier {
    exemplars: Vec<Exemplar>,
    dimension: Option<usize>,
}

impl KnnClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vector length fixed by the first exemplar.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

impl ExemplarMatcher for KnnClassifier {
    fn add_exemplar(&mut self, vector: FeatureVector, label: &str) -> Result<(), MatcherError> {
        self.check_exemplar(&vector)?;
        if self.dimension.is_none() {
            self.dimension = Some(vector.len());
        }

        self.exemplars.push(Exemplar {
            vector,
            label: label.to_string(),
        });
        Ok(())
    }

    fn check_exemplar(&self, vector: &FeatureVector) -> Result<(), MatcherError> {
        match self.dimension {
            Some(expected) if expected != vector.len() => Err(MatcherError::DimensionMismatch {
                expected,
                actual: vector.len(),
            }),
            _ => Ok(()),
        }
    }

    fn query(&self, vector: &FeatureVector, k: usize) -> Result<NeighborVote, MatcherError> {
        if k == 0 {
            return Err(MatcherError::InvalidK);
        }
        let expected = self.dimension.ok_or(MatcherError::Empty)?;
        if expected != vector.len() {
            return Err(MatcherError::DimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        if vector.as_slice().iter().all(|x| *x == 0.0) {
            return Err(MatcherError::ZeroQuery);
        }

        let neighbors = nearest(
            vector.as_slice(),
            self.exemplars.iter().map(|e| e.vector.as_slice()),
            k,
        );
        let considered = neighbors.len();

        // Votes per label, remembering the rank at which each label first appeared.
        let mut votes: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for (rank, n) in neighbors.iter().enumerate() {
            let label = self.exemplars[n.index].label.as_str();
            votes.entry(label).or_insert((0, rank)).0 += 1;
        }

        let label = votes
            .iter()
            .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
            .map(|(label, _)| label.to_string())
            .ok_or(MatcherError::Empty)?;

        let confidences = votes
            .into_iter()
            .map(|(label, (count, _))| (label.to_string(), count as f32 / considered as f32))
            .collect();

        tracing::debug!(
            "kNN query over {} exemplars (k={k}) voted {label}",
            self.exemplars.len()
        );

        Ok(NeighborVote { label, confidences })
    }

    fn exemplar_count(&self) -> usize {
        self.exemplars.len()
    }

    fn exemplar_count_for(&self, label: &str) -> usize {
        self.exemplars.iter().filter(|e| e.label == label).count()
    }

    fn clear(&mut self) {
        self.exemplars.clear();
        self.dimension = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[f32]) -> FeatureVector {
        FeatureVector::normalized(values.to_vec())
    }

    fn trained() -> KnnClassifier {
        let mut knn = KnnClassifier::new();
        knn.add_exemplar(v(&[1.0, 0.0]), "cat").unwrap();
        knn.add_exemplar(v(&[0.9, 0.1]), "cat").unwrap();
        knn.add_exemplar(v(&[0.8, 0.2]), "cat").unwrap();
        knn.add_exemplar(v(&[0.0, 1.0]), "dog").unwrap();
        knn.add_exemplar(v(&[0.1, 0.9]), "dog").unwrap();
        knn.add_exemplar(v(&[0.2, 0.8]), "dog").unwrap();
        knn
    }

    #[test]
    fn test_empty_query_fails() {
        let knn = KnnClassifier::new();
        assert_eq!(knn.query(&v(&[1.0, 0.0]), 3), Err(MatcherError::Empty));
    }

    #[test]
    fn test_zero_k_rejected() {
        assert_eq!(trained().query(&v(&[1.0, 0.0]), 0), Err(MatcherError::InvalidK));
    }

    #[test]
    fn test_majority_vote() {
        let vote = trained().query(&v(&[0.95, 0.05]), 3).unwrap();
        assert_eq!(vote.label, "cat");
        assert!((vote.confidence() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_split_vote_confidence() {
        let vote = trained().query(&v(&[0.5, 0.5]), 3).unwrap();
        let total: f32 = vote.confidences.values().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!((vote.confidence() - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_k_larger_than_store() {
        let mut knn = KnnClassifier::new();
        knn.add_exemplar(v(&[1.0, 0.0]), "cat").unwrap();
        let vote = knn.query(&v(&[0.0, 1.0]), 3).unwrap();
        assert_eq!(vote.label, "cat");
        assert!((vote.confidence() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_tie_goes_to_nearest_label() {
        let mut knn = KnnClassifier::new();
        knn.add_exemplar(v(&[0.0, 1.0]), "dog").unwrap();
        knn.add_exemplar(v(&[1.0, 0.0]), "cat").unwrap();
        let vote = knn.query(&v(&[0.9, 0.1]), 2).unwrap();
        assert_eq!(vote.label, "cat");
        assert!((vote.confidence() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_zero_query_rejected() {
        let knn = trained();
        assert_eq!(
            knn.query(&FeatureVector::new(vec![0.0, 0.0]), 3),
            Err(MatcherError::ZeroQuery)
        );
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut knn = trained();
        let err = knn.add_exemplar(v(&[1.0, 0.0, 0.0]), "cat").unwrap_err();
        assert_eq!(err, MatcherError::DimensionMismatch { expected: 2, actual: 3 });
        assert_eq!(knn.check_exemplar(&v(&[1.0, 0.0, 0.0])), Err(err));
        assert_eq!(knn.check_exemplar(&v(&[0.0, 1.0])), Ok(()));
        assert_eq!(knn.exemplar_count(), 6);
        assert!(knn.query(&v(&[1.0]), 3).is_err());
    }

    #[test]
    fn test_weighted_exemplars_shift_vote() {
        let mut knn = trained();
        let probe = v(&[0.45, 0.55]);
        assert_eq!(knn.query(&probe, 3).unwrap().label, "dog");

        for _ in 0..3 {
            knn.add_exemplar(probe.clone(), "cat").unwrap();
        }
        let vote = knn.query(&probe, 3).unwrap();
        assert_eq!(vote.label, "cat");
        assert_eq!(knn.exemplar_count_for("cat"), 6);
    }

    #[test]
    fn test_clear() {
        let mut knn = trained();
        knn.clear();
        assert_eq!(knn.exemplar_count(), 0);
        assert_eq!(knn.dimension(), None);
        assert_eq!(knn.exemplar_count_for("cat"), 0);
    }
}
