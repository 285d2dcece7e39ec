//! Rank Evaluation
//!
//! Pure standing computation over a membership snapshot. All I/O lives in
//! the coordinator; this module only sorts and indexes.

use crate::error::{Error, Result};

/// A candidate's standing within one membership snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// Zero-based position in the sorted snapshot
    pub rank: usize,
    /// The sibling immediately ahead, if any
    pub predecessor: Option<String>,
}

impl Standing {
    /// The candidate leads iff nobody is ahead of it
    pub fn is_leader(&self) -> bool {
        self.rank == 0
    }
}

/// Compute `self_name`'s rank and immediate predecessor within `snapshot`.
///
/// `snapshot` must contain `self_name` exactly once. Any other count means
/// this candidate's own membership node vanished or was duplicated, which
/// is unrecoverable under the current identity. Ordering is lexicographic;
/// the service's fixed-width sequence suffixes make that equal to arrival
/// order, and ties are impossible because suffixes are unique.
pub fn evaluate(snapshot: &[String], self_name: &str) -> Result<Standing> {
    let occurrences = snapshot.iter().filter(|name| *name == self_name).count();
    if occurrences != 1 {
        return Err(Error::InconsistentState {
            candidate: self_name.to_string(),
        });
    }

    let mut ordered: Vec<&str> = snapshot.iter().map(String::as_str).collect();
    ordered.sort_unstable();

    let rank = ordered
        .iter()
        .position(|name| *name == self_name)
        .expect("self occurs in snapshot");
    let predecessor = (rank > 0).then(|| ordered[rank - 1].to_string());

    Ok(Standing { rank, predecessor })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rank_is_sorted_position() {
        // Input order must not matter: only the sorted position does.
        let snapshot = names(&["c_0000000002", "c_0000000000", "c_0000000001"]);

        let standing = evaluate(&snapshot, "c_0000000001").unwrap();
        assert_eq!(standing.rank, 1);
        assert_eq!(standing.predecessor.as_deref(), Some("c_0000000000"));
        assert!(!standing.is_leader());
    }

    #[test]
    fn test_lowest_name_is_leader() {
        let snapshot = names(&["c_0000000000", "c_0000000001", "c_0000000002"]);

        let standing = evaluate(&snapshot, "c_0000000000").unwrap();
        assert_eq!(standing.rank, 0);
        assert_eq!(standing.predecessor, None);
        assert!(standing.is_leader());
    }

    #[test]
    fn test_exactly_one_leader_per_snapshot() {
        let snapshot = names(&[
            "c_0000000007",
            "c_0000000003",
            "c_0000000010",
            "c_0000000004",
        ]);

        let leaders = snapshot
            .iter()
            .filter(|name| evaluate(&snapshot, name).unwrap().is_leader())
            .count();
        assert_eq!(leaders, 1);
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let snapshot = names(&["c_0000000005", "c_0000000001", "c_0000000009"]);

        let first = evaluate(&snapshot, "c_0000000005").unwrap();
        let second = evaluate(&snapshot, "c_0000000005").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_chain_contracts_when_predecessor_leaves() {
        let snapshot = names(&["c_0000000000", "c_0000000001", "c_0000000002"]);
        let before = evaluate(&snapshot, "c_0000000002").unwrap();
        assert_eq!(before.predecessor.as_deref(), Some("c_0000000001"));

        // The predecessor departs; the next one up the chain takes its place.
        let contracted = names(&["c_0000000000", "c_0000000002"]);
        let after = evaluate(&contracted, "c_0000000002").unwrap();
        assert_eq!(after.rank, 1);
        assert_eq!(after.predecessor.as_deref(), Some("c_0000000000"));
    }

    #[test]
    fn test_follower_promotes_when_head_leaves() {
        let snapshot = names(&["c_0000000000", "c_0000000001", "c_0000000002"]);
        assert_eq!(evaluate(&snapshot, "c_0000000001").unwrap().rank, 1);

        let contracted = names(&["c_0000000001", "c_0000000002"]);
        let standing = evaluate(&contracted, "c_0000000001").unwrap();
        assert!(standing.is_leader());
        assert_eq!(standing.predecessor, None);
    }

    #[test]
    fn test_missing_self_is_a_protocol_break() {
        let snapshot = names(&["c_0000000000", "c_0000000002"]);

        let result = evaluate(&snapshot, "c_0000000001");
        assert!(matches!(
            result,
            Err(Error::InconsistentState { candidate }) if candidate == "c_0000000001"
        ));
    }

    #[test]
    fn test_duplicated_self_is_a_protocol_break() {
        let snapshot = names(&["c_0000000001", "c_0000000001"]);

        assert!(matches!(
            evaluate(&snapshot, "c_0000000001"),
            Err(Error::InconsistentState { .. })
        ));
    }

    #[test]
    fn test_single_candidate_leads() {
        let snapshot = names(&["c_0000000042"]);

        let standing = evaluate(&snapshot, "c_0000000042").unwrap();
        assert!(standing.is_leader());
        assert_eq!(standing.predecessor, None);
    }
}
