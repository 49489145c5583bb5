//! Value-correlation result shape and the over-correlation rule.
//!
//! A value shared by more attributes than the configured threshold is an
//! "over-correlating value": it is reported as such and not correlated
//! further, which bounds the cost of very common values.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::backend::Attribute;

/// Default over-correlation threshold.
pub const DEFAULT_CORRELATION_THRESHOLD: u64 = 20;

/// Result payload of a `correlate_value` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub found_correlations: bool,
    pub is_over_correlating_value: bool,
    /// Distinct event ids sharing the value, sorted.
    pub events: Vec<String>,
}

impl CorrelationResult {
    pub fn over_correlating() -> Self {
        Self {
            found_correlations: false,
            is_over_correlating_value: true,
            events: Vec::new(),
        }
    }
}

/// Apply the correlation rule.
///
/// `total` is the number of attributes carrying the value and `attributes`
/// the ones that were fetched. Correlations exist when at least two
/// distinct events share the value.
pub fn correlate(total: u64, attributes: &[Attribute], threshold: u64) -> CorrelationResult {
    if total > threshold {
        return CorrelationResult::over_correlating();
    }

    let events: BTreeSet<&str> = attributes.iter().map(|a| a.event_id.as_str()).collect();
    let found_correlations = events.len() >= 2;

    CorrelationResult {
        found_correlations,
        is_over_correlating_value: false,
        events: if found_correlations {
            events.into_iter().map(str::to_string).collect()
        } else {
            Vec::new()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(id: u32, event: &str) -> Attribute {
        Attribute {
            id: id.to_string(),
            event_id: event.to_string(),
            value: "1.1.1.1".to_string(),
        }
    }

    #[test]
    fn two_events_correlate() {
        let attrs = [attr(1, "e1"), attr(2, "e2")];
        let result = correlate(2, &attrs, DEFAULT_CORRELATION_THRESHOLD);
        assert!(result.found_correlations);
        assert!(!result.is_over_correlating_value);
        assert_eq!(result.events, vec!["e1", "e2"]);
    }

    #[test]
    fn same_event_does_not_correlate() {
        let attrs = [attr(1, "e1"), attr(2, "e1")];
        let result = correlate(2, &attrs, DEFAULT_CORRELATION_THRESHOLD);
        assert!(!result.found_correlations);
        assert!(result.events.is_empty());
    }

    #[test]
    fn threshold_is_inclusive() {
        let attrs: Vec<_> = (0..20).map(|i| attr(i, &format!("e{i}"))).collect();
        let result = correlate(20, &attrs, 20);
        assert!(result.found_correlations);
        assert_eq!(result.events.len(), 20);
    }

    #[test]
    fn above_threshold_is_over_correlating() {
        let result = correlate(21, &[], 20);
        assert_eq!(result, CorrelationResult::over_correlating());
    }
}
