//! Metric and name normalization for backend constraints

use std::collections::BTreeMap;

use tracing::warn;

use crate::callback::MetricValue;

/// Strip parenthesis characters from a metric key.
///
/// The backend rejects `(` and `)` in metric names, so `"loss(total)"`
/// becomes `"losstotal"`.
#[must_use]
pub fn sanitize_metric_key(key: &str) -> String {
    key.chars().filter(|c| !matches!(c, '(' | ')')).collect()
}

/// Derive the model-registry name from an experiment name.
///
/// Path separators are not valid in registry names; `"team/proj"` becomes
/// `"team_proj"`. Pure function: the experiment name itself is never mutated.
#[must_use]
pub fn registry_model_name(experiment_name: &str) -> String {
    experiment_name.replace('/', "_")
}

/// Normalize a trainer metrics mapping for submission.
///
/// Keys are sanitized and values coerced to `f64`. Entries whose values do
/// not coerce are skipped with a warning; one malformed metric must not end
/// tracking for the run.
#[must_use]
pub fn coerce_metrics(metrics: &BTreeMap<String, MetricValue>) -> BTreeMap<String, f64> {
    metrics
        .iter()
        .filter_map(|(key, value)| match value.as_f64() {
            Some(v) => Some((sanitize_metric_key(key), v)),
            None => {
                warn!("skipping non-numeric metric '{key}': {value:?}");
                None
            }
        })
        .collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Sanitized keys never contain parentheses, and sanitizing is idempotent
        #[test]
        fn sanitize_removes_all_parens(key in "[a-zA-Z0-9_/()]{0,32}") {
            let sanitized = sanitize_metric_key(&key);
            prop_assert!(!sanitized.contains('('));
            prop_assert!(!sanitized.contains(')'));
            prop_assert_eq!(sanitize_metric_key(&sanitized), sanitized.clone());
        }

        /// Registry names never contain path separators
        #[test]
        fn registry_name_has_no_separator(name in "[a-zA-Z0-9_/]{0,32}") {
            let registry = registry_model_name(&name);
            prop_assert!(!registry.contains('/'));
            prop_assert_eq!(registry.len(), name.len());
        }

        /// Coercion never invents entries
        #[test]
        fn coercion_never_grows(entries in proptest::collection::btree_map(
            "[a-z()]{1,8}",
            prop_oneof![
                (-1e6f64..1e6).prop_map(MetricValue::Float),
                "[a-z0-9.]{1,6}".prop_map(MetricValue::Text),
            ],
            0..16,
        )) {
            let coerced = coerce_metrics(&entries);
            prop_assert!(coerced.len() <= entries.len());
        }
    }
}
