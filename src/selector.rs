//! # Label Selector Matching
//!
//! Shared `LabelSelector` evaluation used by the source resolver (matching
//! `configMap`/`secret` sources by label), the bundle reconciler (matching
//! namespaces), and watch fan-in (matching namespace/source events back to
//! bundles). Kept in one place so the three call sites agree on the
//! "empty selector matches everything" rule.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A label selector, shaped like `k8s-openapi`'s own
/// `apimachinery::pkg::apis::meta::v1::LabelSelector` on the wire, but
/// defined locally so it can derive `JsonSchema` — this crate's
/// `k8s-openapi` dependency doesn't carry the `schemars` feature, and
/// embedding the upstream type in a CRD spec struct would fail to compile.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_expressions: Option<Vec<LabelSelectorRequirement>>,
}

/// One `matchExpressions` entry: `operator` is one of `In`, `NotIn`,
/// `Exists`, `DoesNotExist`; unrecognised operators never match.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelectorRequirement {
    pub key: String,
    pub operator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<String>>,
}

/// Whether `labels` satisfies `selector`. An absent selector, or one with no
/// `matchLabels` and no `matchExpressions`, matches every object.
pub fn matches(selector: Option<&LabelSelector>, labels: &BTreeMap<String, String>) -> bool {
    let Some(selector) = selector else {
        return true;
    };

    let match_labels = selector.match_labels.as_ref();
    let match_expressions = selector.match_expressions.as_ref();

    if match_labels.is_none_or(std::collections::BTreeMap::is_empty)
        && match_expressions.is_none_or(Vec::is_empty)
    {
        return true;
    }

    if let Some(match_labels) = match_labels {
        for (key, value) in match_labels {
            if labels.get(key) != Some(value) {
                return false;
            }
        }
    }

    if let Some(expressions) = match_expressions {
        for expr in expressions {
            if !matches_expression(expr, labels) {
                return false;
            }
        }
    }

    true
}

fn matches_expression(expr: &LabelSelectorRequirement, labels: &BTreeMap<String, String>) -> bool {
    let values = expr.values.as_deref().unwrap_or(&[]);
    match expr.operator.as_str() {
        "In" => labels.get(&expr.key).is_some_and(|v| values.contains(v)),
        "NotIn" => !labels.get(&expr.key).is_some_and(|v| values.contains(v)),
        "Exists" => labels.contains_key(&expr.key),
        "DoesNotExist" => !labels.contains_key(&expr.key),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn absent_selector_matches_everything() {
        assert!(matches(None, &labels(&[])));
        assert!(matches(None, &labels(&[("a", "b")])));
    }

    #[test]
    fn empty_selector_matches_everything() {
        let selector = LabelSelector::default();
        assert!(matches(Some(&selector), &labels(&[("a", "b")])));
    }

    #[test]
    fn match_labels_requires_exact_value() {
        let selector = LabelSelector {
            match_labels: Some(labels(&[("tier", "prod")])),
            match_expressions: None,
        };
        assert!(matches(Some(&selector), &labels(&[("tier", "prod")])));
        assert!(!matches(Some(&selector), &labels(&[("tier", "dev")])));
        assert!(!matches(Some(&selector), &labels(&[])));
    }

    #[test]
    fn match_expressions_exists_and_in() {
        let selector = LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![
                LabelSelectorRequirement {
                    key: "env".to_string(),
                    operator: "In".to_string(),
                    values: Some(vec!["prod".to_string(), "staging".to_string()]),
                },
                LabelSelectorRequirement {
                    key: "team".to_string(),
                    operator: "Exists".to_string(),
                    values: None,
                },
            ]),
        };
        assert!(matches(Some(&selector), &labels(&[("env", "prod"), ("team", "x")])));
        assert!(!matches(Some(&selector), &labels(&[("env", "dev"), ("team", "x")])));
        assert!(!matches(Some(&selector), &labels(&[("env", "prod")])));
    }
}
