//! Trust graph nodes, the depth→score table and aggregate stats.

use serde::{Deserialize, Serialize};

use crate::{BuildRun, Pubkey, DEFAULT_SCORES};

/// A scored key in one build generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GraphNode {
    #[ts(type = "string")]
    pub pubkey: Pubkey,
    /// Shortest follow distance from any seeder. Seeders are depth 0.
    pub depth: u32,
    pub score: f64,
}

/// Number of nodes at one depth.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct DepthCount {
    pub depth: u32,
    pub count: u64,
}

/// Read-only summary of the committed generation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ts_rs::TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct GraphStats {
    pub total_nodes: u64,
    pub nodes_by_depth: Vec<DepthCount>,
    pub last_build: Option<BuildRun>,
}

/// Invalid depth→score table.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreTableError {
    #[error("score table is empty")]
    Empty,

    #[error("score at depth {depth} out of range [0,1]: {score}")]
    OutOfRange { depth: u32, score: f64 },

    #[error("score at depth {depth} ({score}) exceeds the score at depth {prev_depth}")]
    Increasing {
        depth: u32,
        score: f64,
        prev_depth: u32,
    },
}

/// Depth→score lookup, indexed by depth.
///
/// The table length fixes the maximum depth: a depth with no entry has no
/// score, and such nodes are left out of the graph entirely.
#[derive(Clone, Debug, PartialEq)]
pub struct ScoreTable {
    scores: Vec<f64>,
}

impl ScoreTable {
    /// Build a table. Scores must be in `[0, 1]` and non-increasing with depth.
    pub fn new(scores: Vec<f64>) -> Result<Self, ScoreTableError> {
        if scores.is_empty() {
            return Err(ScoreTableError::Empty);
        }
        for (depth, &score) in scores.iter().enumerate() {
            let depth = depth as u32;
            if !(0.0..=1.0).contains(&score) {
                return Err(ScoreTableError::OutOfRange { depth, score });
            }
            if depth > 0 && score > scores[depth as usize - 1] {
                return Err(ScoreTableError::Increasing {
                    depth,
                    score,
                    prev_depth: depth - 1,
                });
            }
        }
        Ok(Self { scores })
    }

    /// Deepest depth that still carries a score.
    pub fn max_depth(&self) -> u32 {
        (self.scores.len() - 1) as u32
    }

    /// Score for a depth, `None` beyond the maximum depth.
    pub fn score_for(&self, depth: u32) -> Option<f64> {
        self.scores.get(depth as usize).copied()
    }

    /// The same table cut down to `max_depth`.
    pub fn truncated(&self, max_depth: u32) -> Self {
        let len = (max_depth as usize + 1).min(self.scores.len());
        Self {
            scores: self.scores[..len].to_vec(),
        }
    }

    pub fn scores(&self) -> &[f64] {
        &self.scores
    }
}

impl Default for ScoreTable {
    fn default() -> Self {
        Self {
            scores: DEFAULT_SCORES.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = ScoreTable::default();
        assert_eq!(table.max_depth(), 2);
        assert_eq!(table.score_for(0), Some(1.0));
        assert_eq!(table.score_for(1), Some(0.4));
        assert_eq!(table.score_for(2), Some(0.1));
        assert_eq!(table.score_for(3), None);
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(ScoreTable::new(vec![]), Err(ScoreTableError::Empty));
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(matches!(
            ScoreTable::new(vec![1.5]),
            Err(ScoreTableError::OutOfRange { depth: 0, .. })
        ));
        assert!(matches!(
            ScoreTable::new(vec![1.0, -0.1]),
            Err(ScoreTableError::OutOfRange { depth: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_increasing() {
        assert!(matches!(
            ScoreTable::new(vec![1.0, 0.2, 0.3]),
            Err(ScoreTableError::Increasing { depth: 2, .. })
        ));
    }

    #[test]
    fn test_truncated() {
        let table = ScoreTable::default().truncated(1);
        assert_eq!(table.max_depth(), 1);
        assert_eq!(table.score_for(2), None);

        // Truncating past the end keeps the table as is.
        let same = ScoreTable::default().truncated(9);
        assert_eq!(same, ScoreTable::default());
    }
}
