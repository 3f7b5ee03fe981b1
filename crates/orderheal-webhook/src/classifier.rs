//! Error classification
//!
//! Matches POS error text against the [`ErrorCatalog`].

use orderheal_core::FailReason;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::{catalog::ErrorCatalog, events::ErrorInfo, ErrorSolution};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("Unsupported error code, no catalog entry matches: {0}")]
    NoMatch(String),
}

/// Result of a successful classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub solution: ErrorSolution,
    /// Offending product or attribute id, only looked for on stop-list entries
    pub extracted_id: Option<String>,
}

impl Classification {
    pub fn fail_reason(&self, message: &str) -> FailReason {
        FailReason {
            code: self.solution.code.clone(),
            business_name: self.solution.business_name.clone(),
            reason: self.solution.reason.clone(),
            solution: self.solution.solution.clone(),
            message: message.to_string(),
        }
    }

    /// Whether a stop-list correction can be attempted
    pub fn stop_list_target(&self) -> Option<&str> {
        if self.solution.send_stop_list_status {
            self.extracted_id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    catalog: Arc<ErrorCatalog>,
}

impl ErrorClassifier {
    pub fn new(catalog: Arc<ErrorCatalog>) -> Self {
        Self { catalog }
    }

    pub fn classify(&self, error: &ErrorInfo) -> Result<Classification, ClassifyError> {
        self.classify_text(&error.raw_text())
    }

    pub fn classify_text(&self, text: &str) -> Result<Classification, ClassifyError> {
        let entry = self
            .catalog
            .first_match(text)
            .ok_or_else(|| ClassifyError::NoMatch(text.to_string()))?;

        let solution = entry.solution().clone();
        let extracted_id = if solution.send_stop_list_status {
            entry.extract(text)
        } else {
            None
        };

        debug!(
            code = %solution.code,
            extracted_id = ?extracted_id,
            "Classified POS error"
        );

        Ok(Classification {
            solution,
            extracted_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solution(code: &str, contains: &[&str], pattern: Option<&str>, stop_list: bool) -> ErrorSolution {
        ErrorSolution {
            code: code.to_string(),
            business_name: format!("business {}", code),
            reason: format!("reason {}", code),
            solution: format!("solution {}", code),
            contains: contains.iter().map(|s| s.to_string()).collect(),
            extraction_pattern: pattern.map(String::from),
            send_to_telegram: false,
            send_stop_list_status: stop_list,
        }
    }

    fn classifier(solutions: Vec<ErrorSolution>) -> ErrorClassifier {
        ErrorClassifier::new(Arc::new(ErrorCatalog::new(solutions).unwrap()))
    }

    #[test]
    fn test_first_match_wins() {
        let classifier = classifier(vec![
            solution("4", &["Product", "not found"], Some(r"Product (\S+) not found"), true),
            solution("99", &["not found"], None, false),
        ]);

        let result = classifier
            .classify(&ErrorInfo::new("X", "Product p-1 not found", ""))
            .unwrap();
        assert_eq!(result.solution.code, "4");
        assert_eq!(result.extracted_id.as_deref(), Some("p-1"));

        let generic = classifier
            .classify(&ErrorInfo::new("X", "Terminal not found", ""))
            .unwrap();
        assert_eq!(generic.solution.code, "99");
        assert_eq!(generic.extracted_id, None);
    }

    #[test]
    fn test_order_decides_ties() {
        let generic_first = classifier(vec![
            solution("99", &["not found"], None, false),
            solution("4", &["Product", "not found"], None, true),
        ]);

        let result = generic_first
            .classify(&ErrorInfo::new("X", "Product p-1 not found", ""))
            .unwrap();
        assert_eq!(result.solution.code, "99");
    }

    #[test]
    fn test_no_match() {
        let classifier = classifier(vec![solution("1", &["timeout"], None, false)]);

        let err = classifier
            .classify(&ErrorInfo::new("X", "Something odd", "happened"))
            .unwrap_err();
        assert_eq!(err, ClassifyError::NoMatch("Something odd happened".to_string()));
    }

    #[test]
    fn test_description_is_scanned() {
        let classifier = classifier(vec![solution(
            "5",
            &[],
            Some(r"modifier ([a-z0-9-]+)"),
            true,
        )]);

        let result = classifier
            .classify(&ErrorInfo::new("X", "Order rejected", "unknown modifier mod-7"))
            .unwrap();
        assert_eq!(result.stop_list_target(), Some("mod-7"));
    }

    #[test]
    fn test_missing_id_is_not_an_error() {
        let classifier = classifier(vec![solution(
            "4",
            &["Product"],
            Some(r"Product id=(\w+)"),
            true,
        )]);

        let result = classifier
            .classify(&ErrorInfo::new("X", "Product missing", ""))
            .unwrap();
        assert_eq!(result.solution.code, "4");
        assert_eq!(result.stop_list_target(), None);
    }

    #[test]
    fn test_fail_reason_from_solution() {
        let classification = Classification {
            solution: solution("4", &["x"], None, false),
            extracted_id: None,
        };

        let reason = classification.fail_reason("raw message");
        assert_eq!(reason.code, "4");
        assert_eq!(reason.business_name, "business 4");
        assert_eq!(reason.message, "raw message");
    }
}
