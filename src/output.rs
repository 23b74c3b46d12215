//! Result types for an embedding run.

use crate::error::{MdVideoError, TranscodeError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a reference was left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Absolute path, protocol-relative or external URL.
    NotRelative,
    /// Extension is not one of `avi`, `mp4`, `mov`, `mkv`.
    UnsupportedExtension,
    /// The document has no parent directory to resolve against.
    NoParentDirectory,
    /// No inventory file matches the resolved path.
    NoMatchingFile,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::NotRelative => "not a relative reference",
            SkipReason::UnsupportedExtension => "not a supported video type",
            SkipReason::NoParentDirectory => "document has no parent directory",
            SkipReason::NoMatchingFile => "no matching file",
        })
    }
}

/// What happened to one image node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum NodeOutcome {
    /// Node rewritten to an `html` node.
    Converted {
        variants: usize,
        width: u32,
        height: u32,
    },
    /// Node left untouched; not an error.
    Skipped { reason: SkipReason },
    /// Transcoding failed; node left untouched.
    Failed { error: TranscodeError },
}

impl NodeOutcome {
    pub fn is_converted(&self) -> bool {
        matches!(self, NodeOutcome::Converted { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, NodeOutcome::Failed { .. })
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            NodeOutcome::Skipped { reason } => Some(*reason),
            _ => None,
        }
    }
}

/// Per-node entry of an [`EmbedReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeReport {
    /// Position among the document's image nodes (0-indexed, document order).
    pub index: usize,
    pub url: String,
    /// Resolved absolute path, when resolution got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(flatten)]
    pub outcome: NodeOutcome,
    /// Time spent in the transcoder (0 for skipped nodes).
    pub duration_ms: u64,
}

/// Aggregate counts for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedStats {
    /// Image nodes found in the document.
    pub images: usize,
    pub converted: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
}

impl EmbedStats {
    pub fn from_nodes(nodes: &[NodeReport], total_duration_ms: u64) -> Self {
        Self {
            images: nodes.len(),
            converted: nodes.iter().filter(|n| n.outcome.is_converted()).count(),
            skipped: nodes
                .iter()
                .filter(|n| n.outcome.skip_reason().is_some())
                .count(),
            failed: nodes.iter().filter(|n| n.outcome.is_failed()).count(),
            total_duration_ms,
        }
    }
}

/// Everything a run did, in document order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedReport {
    pub nodes: Vec<NodeReport>,
    pub stats: EmbedStats,
}

impl EmbedReport {
    /// Turn any per-video failure into an error.
    pub fn into_result(self) -> Result<Self, MdVideoError> {
        if self.stats.failed > 0 {
            let first_error = self
                .nodes
                .iter()
                .find_map(|n| match &n.outcome {
                    NodeOutcome::Failed { error } => Some(error.to_string()),
                    _ => None,
                })
                .unwrap_or_default();
            return Err(MdVideoError::PartialFailure {
                failed: self.stats.failed,
                total: self.stats.converted + self.stats.failed,
                first_error,
            });
        }
        Ok(self)
    }
}

/// Result of embedding videos into a markdown text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkdownOutput {
    /// The rewritten document; identical to the input when nothing converted.
    pub markdown: String,
    pub report: EmbedReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(index: usize, outcome: NodeOutcome) -> NodeReport {
        NodeReport {
            index,
            url: format!("v{index}.mp4"),
            path: None,
            outcome,
            duration_ms: 0,
        }
    }

    fn sample() -> Vec<NodeReport> {
        vec![
            report(
                0,
                NodeOutcome::Converted {
                    variants: 2,
                    width: 480,
                    height: 270,
                },
            ),
            report(
                1,
                NodeOutcome::Skipped {
                    reason: SkipReason::NoMatchingFile,
                },
            ),
            report(
                2,
                NodeOutcome::Failed {
                    error: TranscodeError::Other("boom".into()),
                },
            ),
        ]
    }

    #[test]
    fn stats_count_each_outcome() {
        let stats = EmbedStats::from_nodes(&sample(), 12);
        assert_eq!(
            stats,
            EmbedStats {
                images: 3,
                converted: 1,
                skipped: 1,
                failed: 1,
                total_duration_ms: 12,
            }
        );
    }

    #[test]
    fn into_result_reports_partial_failure() {
        let nodes = sample();
        let stats = EmbedStats::from_nodes(&nodes, 0);
        let err = EmbedReport { nodes, stats }.into_result().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("1/2"), "got: {msg}");
        assert!(msg.contains("boom"));
    }

    #[test]
    fn report_serialises_with_flat_status() {
        let json = serde_json::to_value(&sample()[1]).unwrap();
        assert_eq!(json["status"], "skipped");
        assert_eq!(json["reason"], "no_matching_file");
        assert!(json.get("path").is_none());
    }
}
