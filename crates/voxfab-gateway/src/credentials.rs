//! Partial-credential extraction for handoff carry-forward.
//!
//! Callers sometimes volunteer an account number or sort code before the
//! session reaches the verification agent. Free-form text (last user
//! message, workflow variables) is scanned for credential-shaped strings so
//! the successor agent prompts only for what is still missing — whichever
//! of the two is present is stored, even alone.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use voxfab_core::SessionMemory;

/// Credentials found in free-form text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FoundCredentials {
    pub account: Option<String>,
    pub sort_code: Option<String>,
}

impl FoundCredentials {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.account.is_none() && self.sort_code.is_none()
    }

    /// Fold into a memory patch (only the fields that were found).
    #[must_use]
    pub fn into_patch(self) -> SessionMemory {
        SessionMemory {
            account: self.account,
            sort_code: self.sort_code,
            ..SessionMemory::default()
        }
    }
}

fn account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 8 digits, not embedded in a longer digit run.
    RE.get_or_init(|| Regex::new(r"(?:^|\D)(\d{8})(?:\D|$)").unwrap())
}

fn sort_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // 6 digits, or NN-NN-NN.
    RE.get_or_init(|| Regex::new(r"(?:^|\D)(\d{2}-\d{2}-\d{2}|\d{6})(?:\D|$)").unwrap())
}

/// Scan one text for account-number-like and sort-code-like strings.
#[must_use]
pub fn extract_credentials(text: &str) -> FoundCredentials {
    let account = account_re()
        .captures(text)
        .map(|c| c[1].to_string());

    // Avoid reading the inside of the 8-digit account as a sort code.
    let masked = account.as_ref().map_or_else(
        || text.to_string(),
        |a| text.replacen(a.as_str(), "#", 1),
    );
    let sort_code = sort_code_re()
        .captures(&masked)
        .map(|c| c[1].replace('-', ""));

    FoundCredentials { account, sort_code }
}

/// Scan every string leaf in a workflow-variables object.
#[must_use]
pub fn extract_from_variables(variables: &Value) -> FoundCredentials {
    let mut found = FoundCredentials::default();
    scan_value(variables, &mut found);
    found
}

fn scan_value(value: &Value, found: &mut FoundCredentials) {
    match value {
        Value::String(text) => {
            let creds = extract_credentials(text);
            if found.account.is_none() {
                found.account = creds.account;
            }
            if found.sort_code.is_none() {
                found.sort_code = creds.sort_code;
            }
        }
        Value::Array(items) => {
            for item in items {
                scan_value(item, found);
            }
        }
        Value::Object(map) => {
            for item in map.values() {
                scan_value(item, found);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn account_number_alone_is_found() {
        let found = extract_credentials("my account is 12345678 thanks");
        assert_eq!(found.account.as_deref(), Some("12345678"));
        assert_eq!(found.sort_code, None);
    }

    #[test]
    fn sort_code_alone_in_both_spellings() {
        let found = extract_credentials("sort code 112233");
        assert_eq!(found.sort_code.as_deref(), Some("112233"));
        assert_eq!(found.account, None);

        let found = extract_credentials("it's 11-22-33");
        assert_eq!(found.sort_code.as_deref(), Some("112233"));
    }

    #[test]
    fn both_credentials_in_one_utterance() {
        let found = extract_credentials("account 12345678, sort code 11-22-33");
        assert_eq!(found.account.as_deref(), Some("12345678"));
        assert_eq!(found.sort_code.as_deref(), Some("112233"));
    }

    #[test]
    fn account_digits_are_not_misread_as_sort_code() {
        let found = extract_credentials("the number is 12345678");
        assert_eq!(found.account.as_deref(), Some("12345678"));
        assert_eq!(found.sort_code, None);
    }

    #[test]
    fn longer_digit_runs_match_nothing() {
        let found = extract_credentials("card 1234567890123456");
        assert!(found.is_empty());
    }

    #[test]
    fn ordinary_speech_matches_nothing() {
        assert!(extract_credentials("I want to check my balance").is_empty());
    }

    #[test]
    fn workflow_variables_are_scanned_recursively() {
        let variables = json!({
            "collected": {"accountNumber": "given as 12345678"},
            "notes": ["sort code was 11-22-33"]
        });
        let found = extract_from_variables(&variables);
        assert_eq!(found.account.as_deref(), Some("12345678"));
        assert_eq!(found.sort_code.as_deref(), Some("112233"));
    }
}
