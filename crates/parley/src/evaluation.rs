//! Scoring predicted calls against reference calls.

use crate::JsonValue;
use crate::call::ToolCall;
use crate::json::to_spaced_string;
use std::collections::HashSet;
use std::ops::AddAssign;

/// Comparison of the calls made in one turn with the reference calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallComparison {
    /// Whether both call lists are equal up to letter case and order.
    pub exact_match: bool,
    /// Number of distinct reference function names that were called.
    pub correct_functions: usize,
    /// Number of distinct called function names absent from the reference.
    pub incorrect_functions: usize,
}

impl CallComparison {
    /// Compares `actual` calls with `gold` calls.
    pub fn compare(actual: &[ToolCall], gold: &[ToolCall]) -> Result<Self, serde_json::Error> {
        let exact_match = normalize(actual)? == normalize(gold)?;
        let actual_names = actual.iter().map(|call| call.name.as_str()).collect::<HashSet<_>>();
        let gold_names = gold.iter().map(|call| call.name.as_str()).collect::<HashSet<_>>();
        Ok(Self {
            exact_match,
            correct_functions: gold_names.intersection(&actual_names).count(),
            incorrect_functions: actual_names.difference(&gold_names).count(),
        })
    }
}

/// Lower-cases every call and sorts the calls by their serialized form.
fn normalize(calls: &[ToolCall]) -> Result<Vec<JsonValue>, serde_json::Error> {
    let mut normalized = Vec::with_capacity(calls.len());
    for call in calls {
        let text = to_spaced_string(call)?.to_lowercase();
        normalized.push((text.clone(), serde_json::from_str::<JsonValue>(&text)?));
    }
    normalized.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(normalized.into_iter().map(|(_, value)| value).collect())
}

/// Totals over many compared turns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Number of compared turns.
    pub turns: usize,
    /// Number of exactly matching turns.
    pub exact_matches: usize,
    /// Sum of correct function names.
    pub correct_functions: usize,
    /// Sum of incorrect function names.
    pub incorrect_functions: usize,
}

impl Summary {
    /// Adds one comparison.
    pub fn record(&mut self, comparison: CallComparison) {
        self.turns += 1;
        self.exact_matches += usize::from(comparison.exact_match);
        self.correct_functions += comparison.correct_functions;
        self.incorrect_functions += comparison.incorrect_functions;
    }

    /// Returns the number of predicted function names counted.
    #[inline]
    pub fn total_functions(&self) -> usize {
        self.correct_functions + self.incorrect_functions
    }

    /// Returns the share of exactly matching turns, or `0.0` without turns.
    pub fn exact_match_rate(&self) -> f64 {
        if self.turns == 0 {
            0.0
        } else {
            self.exact_matches as f64 / self.turns as f64
        }
    }
}

impl AddAssign<CallComparison> for Summary {
    #[inline]
    fn add_assign(&mut self, comparison: CallComparison) {
        self.record(comparison);
    }
}

impl FromIterator<CallComparison> for Summary {
    fn from_iter<T: IntoIterator<Item = CallComparison>>(iter: T) -> Self {
        let mut summary = Self::default();
        for comparison in iter {
            summary.record(comparison);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Map;
    use serde_json::json;

    fn call(name: &str, arguments: JsonValue) -> ToolCall {
        ToolCall::new(name, arguments.as_object().cloned().unwrap_or_else(Map::new))
    }

    #[test]
    fn ignores_case_and_order() {
        let actual = [
            call("buy", json!({"item_name": "iron sword"})),
            call("check_price", json!({"item_name": "Iron Sword", "count": 1})),
        ];
        let gold = [
            call("check_price", json!({"count": 1, "item_name": "IRON SWORD"})),
            call("buy", json!({"item_name": "Iron Sword"})),
        ];
        let comparison = CallComparison::compare(&actual, &gold).unwrap();
        assert!(comparison.exact_match);
        assert_eq!(comparison.correct_functions, 2);
        assert_eq!(comparison.incorrect_functions, 0);
    }

    #[test]
    fn counts_function_names() {
        let actual = [
            call("check_price", json!({})),
            call("check_price", json!({"item_name": "x"})),
            call("sell", json!({})),
        ];
        let gold = [call("check_price", json!({})), call("buy", json!({}))];
        let comparison = CallComparison::compare(&actual, &gold).unwrap();
        assert!(!comparison.exact_match);
        assert_eq!(comparison.correct_functions, 1);
        assert_eq!(comparison.incorrect_functions, 1);

        let summary = [comparison, CallComparison::compare(&[], &[]).unwrap()]
            .into_iter()
            .collect::<Summary>();
        assert_eq!(summary.turns, 2);
        assert_eq!(summary.exact_matches, 1);
        assert_eq!(summary.total_functions(), 2);
        assert_eq!(summary.exact_match_rate(), 0.5);
    }
}
