//! Command outcome judgement.
//!
//! The node and relay binaries only report success as human readable text,
//! so success is a literal substring match against one captured stream. The
//! match lives behind [`OutcomeJudge`] so a structured status source can
//! replace it without touching the workflows.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::exec::ExecOutput;

/// Which captured stream a marker is looked up in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => f.write_str("stdout"),
            Stream::Stderr => f.write_str("stderr"),
        }
    }
}

/// Literal text whose presence in a stream means success.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuccessMarker {
    pub stream: Stream,
    pub needle: String,
}

impl SuccessMarker {
    pub fn stdout(needle: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stdout,
            needle: needle.into(),
        }
    }

    pub fn stderr(needle: impl Into<String>) -> Self {
        Self {
            stream: Stream::Stderr,
            needle: needle.into(),
        }
    }
}

/// Why a completed command was judged a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReasonCode {
    MarkerMissing { stream: Stream, marker: String },
}

/// Verdict on a completed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    Failure { reason: ReasonCode },
}

impl CommandOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CommandOutcome::Success)
    }
}

/// Pure containment test of `expected` in a captured stream.
pub fn contains_marker(stream: &[u8], expected: &str) -> bool {
    if expected.is_empty() {
        return true;
    }
    stream
        .windows(expected.len())
        .any(|window| window == expected.as_bytes())
}

/// Turns captured output into a [`CommandOutcome`].
pub trait OutcomeJudge: Send + Sync {
    fn judge(&self, output: &ExecOutput, marker: &SuccessMarker) -> CommandOutcome;
}

/// Judge that looks for the marker as a literal substring.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringJudge;

impl OutcomeJudge for SubstringJudge {
    fn judge(&self, output: &ExecOutput, marker: &SuccessMarker) -> CommandOutcome {
        if contains_marker(output.stream(marker.stream), &marker.needle) {
            CommandOutcome::Success
        } else {
            CommandOutcome::Failure {
                reason: ReasonCode::MarkerMissing {
                    stream: marker.stream,
                    marker: marker.needle.clone(),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_marker() {
        assert!(contains_marker(b"height: 12\ncode: 0\n", "code: 0"));
        assert!(!contains_marker(b"code: 5", "code: 0"));
        assert!(!contains_marker(b"", "code: 0"));
        assert!(contains_marker(b"anything", ""));
    }

    #[test]
    fn test_contains_marker_handles_non_utf8() {
        let stream = [0xff, 0xfe, b'o', b'k'];
        assert!(contains_marker(&stream, "ok"));
    }

    #[test]
    fn test_substring_judge_reads_requested_stream() {
        let output = ExecOutput {
            stdout: b"code: 0".to_vec(),
            stderr: b"successfully opened init channel".to_vec(),
        };
        let judge = SubstringJudge;

        assert!(judge
            .judge(&output, &SuccessMarker::stdout("code: 0"))
            .is_success());
        assert!(judge
            .judge(&output, &SuccessMarker::stderr("opened init channel"))
            .is_success());

        let outcome = judge.judge(&output, &SuccessMarker::stderr("code: 0"));
        assert_eq!(
            outcome,
            CommandOutcome::Failure {
                reason: ReasonCode::MarkerMissing {
                    stream: Stream::Stderr,
                    marker: "code: 0".to_string(),
                }
            }
        );
    }
}
