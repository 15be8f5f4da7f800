//! Phantom-action watcher.
//!
//! Voice models sometimes *say* they will do something ("let me check your
//! balance") without emitting the matching tool call. Each assistant turn
//! is scanned against a pattern table mapping spoken commitments to
//! expected tool names; an unfulfilled commitment earns exactly one
//! corrective text turn, and the phantom is logged.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// One commitment → expected tool mapping.
#[derive(Debug, Clone, Deserialize)]
pub struct PhantomRule {
    /// Lowercase substrings that signal the commitment.
    pub patterns: Vec<String>,
    /// Tool that must appear in the same turn.
    pub tool: String,
}

/// A detected phantom commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phantom {
    /// The matched pattern (for the corrective message and the log).
    pub commitment: String,
    pub expected_tool: String,
}

#[derive(Debug, Error)]
pub enum PhantomRulesError {
    #[error("failed to read phantom rules file `{path}`: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse phantom rules file `{path}`: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
}

/// Scans assistant turns for unfulfilled spoken commitments.
#[derive(Debug, Clone)]
pub struct PhantomWatcher {
    rules: Vec<PhantomRule>,
}

impl Default for PhantomWatcher {
    fn default() -> Self {
        Self {
            rules: default_rules(),
        }
    }
}

impl PhantomWatcher {
    /// Watcher with an explicit rule table.
    #[must_use]
    pub const fn new(rules: Vec<PhantomRule>) -> Self {
        Self { rules }
    }

    /// Load a rule table from a JSON file (`[{patterns: [...], tool}]`),
    /// replacing the default list wholesale.
    pub fn from_file(path: &Path) -> Result<Self, PhantomRulesError> {
        let text = std::fs::read_to_string(path).map_err(|source| PhantomRulesError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let rules: Vec<PhantomRule> =
            serde_json::from_str(&text).map_err(|source| PhantomRulesError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        Ok(Self { rules })
    }

    /// Check a finished assistant turn.
    ///
    /// `turn_text` is the concatenated assistant transcript of the turn;
    /// `tools_called` are the tool names invoked during it. Returns the
    /// first unfulfilled commitment, if any.
    #[must_use]
    pub fn check(&self, turn_text: &str, tools_called: &[String]) -> Option<Phantom> {
        let lower = turn_text.to_lowercase();
        for rule in &self.rules {
            for pattern in &rule.patterns {
                if lower.contains(pattern.as_str()) {
                    if tools_called.iter().any(|t| t == &rule.tool) {
                        break; // commitment fulfilled; next rule
                    }
                    let phantom = Phantom {
                        commitment: pattern.clone(),
                        expected_tool: rule.tool.clone(),
                    };
                    warn!(
                        commitment = %phantom.commitment,
                        expected_tool = %phantom.expected_tool,
                        "Phantom action: spoken commitment without tool call"
                    );
                    return Some(phantom);
                }
            }
        }
        None
    }

    /// The corrective text turn for a detected phantom. Prefixed with the
    /// internal marker so its transcript echo never reaches the client.
    #[must_use]
    pub fn correction(phantom: &Phantom) -> String {
        format!(
            "[SYSTEM: OVERRIDE] You said you would \"{}\" but did not call {}. Call {} now.",
            phantom.commitment, phantom.expected_tool, phantom.expected_tool
        )
    }
}

/// The curated default table.
fn default_rules() -> Vec<PhantomRule> {
    let rule = |patterns: &[&str], tool: &str| PhantomRule {
        patterns: patterns.iter().map(|p| (*p).to_string()).collect(),
        tool: tool.to_string(),
    };
    vec![
        rule(
            &["check your balance", "look at your balance", "pull up your balance"],
            "agentcore_balance",
        ),
        rule(
            &["check your transactions", "look at your transactions", "recent transactions"],
            "get_account_transactions",
        ),
        rule(
            &["raise a dispute", "open a dispute", "create a dispute"],
            "create_dispute_case",
        ),
        rule(
            &["verify your identity", "run a security check", "confirm your identity"],
            "perform_idv_check",
        ),
    ]
}
