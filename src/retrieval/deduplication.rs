//! Candidate deduplication by id

use crate::retrieval::ScoredCandidate;
use std::collections::HashSet;

/// Deduplicate candidates by id, keeping the first (highest ranked) instance
pub fn deduplicate_candidates(candidates: Vec<ScoredCandidate>) -> Vec<ScoredCandidate> {
    let mut seen: HashSet<i64> = HashSet::new();

    candidates
        .into_iter()
        .filter(|candidate| seen.insert(candidate.id))
        .collect()
}

/// Drop every candidate whose id is already in `taken`
pub fn exclude_ids(
    candidates: Vec<ScoredCandidate>,
    taken: &HashSet<i64>,
) -> Vec<ScoredCandidate> {
    candidates
        .into_iter()
        .filter(|candidate| !taken.contains(&candidate.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deduplication_keeps_first() {
        let candidates = vec![
            ScoredCandidate::lexical(1, 0.9),
            ScoredCandidate::lexical(2, 0.8),
            ScoredCandidate::vector(1, 0.95),
        ];

        let deduped = deduplicate_candidates(candidates);

        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].id, 1);
        assert_eq!(deduped[0].score, 0.9);
        assert_eq!(deduped[1].id, 2);
    }

    #[test]
    fn test_exclude_ids() {
        let taken: HashSet<i64> = [2, 3].into_iter().collect();
        let kept = exclude_ids(
            vec![
                ScoredCandidate::vector(1, 0.5),
                ScoredCandidate::vector(2, 0.4),
                ScoredCandidate::vector(4, 0.3),
            ],
            &taken,
        );

        let ids: Vec<i64> = kept.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 4]);
    }
}
