//! Attribute schemas for node types, including the three custom blocks.
//!
//! A supplied value that is absent, `null`, or an empty string falls back to
//! the schema default. Unknown attribute names are dropped.

use serde_json::{json, Value};

use super::node::{Attrs, NodeType};
use super::DocumentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrKind {
    Text,
    OptionalText,
    TextList,
    Flag,
    /// Heading level, 1 to 3
    Level,
    Count,
}

struct AttrRule {
    name: &'static str,
    kind: AttrKind,
    default: fn() -> Value,
}

const HEADING: &[AttrRule] = &[AttrRule {
    name: "level",
    kind: AttrKind::Level,
    default: || json!(1),
}];

const ORDERED_LIST: &[AttrRule] = &[AttrRule {
    name: "start",
    kind: AttrKind::Count,
    default: || json!(1),
}];

const CODE_BLOCK: &[AttrRule] = &[AttrRule {
    name: "language",
    kind: AttrKind::OptionalText,
    default: || Value::Null,
}];

const IMAGE: &[AttrRule] = &[
    AttrRule {
        name: "src",
        kind: AttrKind::OptionalText,
        default: || Value::Null,
    },
    AttrRule {
        name: "alt",
        kind: AttrKind::OptionalText,
        default: || Value::Null,
    },
    AttrRule {
        name: "title",
        kind: AttrKind::OptionalText,
        default: || Value::Null,
    },
];

const PRICING_CARD: &[AttrRule] = &[
    AttrRule {
        name: "title",
        kind: AttrKind::Text,
        default: || json!("Standard Plan"),
    },
    AttrRule {
        name: "price",
        kind: AttrKind::Text,
        default: || json!("$49"),
    },
    AttrRule {
        name: "period",
        kind: AttrKind::Text,
        default: || json!("month"),
    },
    AttrRule {
        name: "features",
        kind: AttrKind::TextList,
        default: default_features,
    },
    AttrRule {
        name: "highlighted",
        kind: AttrKind::Flag,
        default: || json!(false),
    },
];

const FEATURE_LIST: &[AttrRule] = &[
    AttrRule {
        name: "title",
        kind: AttrKind::Text,
        default: || json!("Features"),
    },
    AttrRule {
        name: "features",
        kind: AttrKind::TextList,
        default: default_features,
    },
];

const CALL_TO_ACTION: &[AttrRule] = &[
    AttrRule {
        name: "title",
        kind: AttrKind::Text,
        default: || json!("Ready to get started?"),
    },
    AttrRule {
        name: "description",
        kind: AttrKind::Text,
        default: || json!("Join thousands of satisfied customers today."),
    },
    AttrRule {
        name: "buttonText",
        kind: AttrKind::Text,
        default: || json!("Get Started"),
    },
    AttrRule {
        name: "buttonLink",
        kind: AttrKind::Text,
        default: || json!("#"),
    },
];

fn default_features() -> Value {
    json!(["Feature 1", "Feature 2", "Feature 3"])
}

fn rules(kind: NodeType) -> &'static [AttrRule] {
    match kind {
        NodeType::Heading => HEADING,
        NodeType::OrderedList => ORDERED_LIST,
        NodeType::CodeBlock => CODE_BLOCK,
        NodeType::Image => IMAGE,
        NodeType::PricingCard => PRICING_CARD,
        NodeType::FeatureList => FEATURE_LIST,
        NodeType::CallToAction => CALL_TO_ACTION,
        _ => &[],
    }
}

/// Every declared attribute of `kind` at its default value.
pub fn default_attrs(kind: NodeType) -> Attrs {
    rules(kind)
        .iter()
        .map(|rule| (rule.name.to_string(), (rule.default)()))
        .collect()
}

/// Attributes for a new node: defaults overlaid with `supplied`. Missing,
/// `null` and empty-string values all take the default.
pub fn create_attrs(kind: NodeType, supplied: &Attrs) -> Result<Attrs, DocumentError> {
    overlay(kind, default_attrs(kind), supplied, is_blank)
}

/// Shallow merge of `patch` over `existing`, validated against the schema.
/// An empty string is stored as given; only `null` resets to the default.
pub fn merge_attrs(kind: NodeType, existing: &Attrs, patch: &Attrs) -> Result<Attrs, DocumentError> {
    let mut base = default_attrs(kind);
    for rule in rules(kind) {
        if let Some(value) = existing.get(rule.name).filter(|value| !value.is_null()) {
            base.insert(rule.name.to_string(), value.clone());
        }
    }
    overlay(kind, base, patch, Value::is_null)
}

fn overlay(
    kind: NodeType,
    mut merged: Attrs,
    patch: &Attrs,
    takes_default: fn(&Value) -> bool,
) -> Result<Attrs, DocumentError> {
    for (name, value) in patch {
        let Some(rule) = rules(kind).iter().find(|rule| rule.name == name) else {
            tracing::debug!(node_type = %kind, attr = %name, "Dropping undeclared attribute");
            continue;
        };
        if takes_default(value) {
            merged.insert(rule.name.to_string(), (rule.default)());
            continue;
        }
        validate(kind, rule, value)?;
        merged.insert(rule.name.to_string(), value.clone());
    }

    Ok(merged)
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn validate(kind: NodeType, rule: &AttrRule, value: &Value) -> Result<(), DocumentError> {
    let invalid = |reason: &str| DocumentError::InvalidAttribute {
        node_type: kind,
        attr: rule.name.to_string(),
        reason: reason.to_string(),
    };

    match rule.kind {
        AttrKind::Text | AttrKind::OptionalText => {
            if !value.is_string() {
                return Err(invalid("expected a string"));
            }
        }
        AttrKind::TextList => {
            let items = value
                .as_array()
                .ok_or_else(|| invalid("expected an array of strings"))?;
            if !items.iter().all(Value::is_string) {
                return Err(invalid("expected an array of strings"));
            }
        }
        AttrKind::Flag => {
            if !value.is_boolean() {
                return Err(invalid("expected a boolean"));
            }
        }
        AttrKind::Level => match value.as_u64() {
            Some(1..=3) => {}
            _ => return Err(invalid("expected an integer between 1 and 3")),
        },
        AttrKind::Count => {
            if value.as_u64().is_none() {
                return Err(invalid("expected a non-negative integer"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(value: Value) -> Attrs {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_pricing_card_defaults_under_supplied_title() {
        let created = create_attrs(NodeType::PricingCard, &attrs(json!({"title": "Pro"}))).unwrap();
        assert_eq!(created["title"], "Pro");
        assert_eq!(created["price"], "$49");
        assert_eq!(created["period"], "month");
        assert_eq!(created["features"], default_features());
        assert_eq!(created["highlighted"], false);
    }

    #[test]
    fn test_call_to_action_defaults() {
        let created = create_attrs(NodeType::CallToAction, &Attrs::new()).unwrap();
        assert_eq!(created["title"], "Ready to get started?");
        assert_eq!(
            created["description"],
            "Join thousands of satisfied customers today."
        );
        assert_eq!(created["buttonText"], "Get Started");
        assert_eq!(created["buttonLink"], "#");
    }

    #[test]
    fn test_empty_string_falls_back_to_default() {
        let created =
            create_attrs(NodeType::FeatureList, &attrs(json!({"title": "", "features": null})))
                .unwrap();
        assert_eq!(created["title"], "Features");
        assert_eq!(created["features"], default_features());
    }

    #[test]
    fn test_merge_is_partial() {
        let existing = create_attrs(
            NodeType::PricingCard,
            &attrs(json!({"title": "Pro", "price": "$99"})),
        )
        .unwrap();
        let merged = merge_attrs(
            NodeType::PricingCard,
            &existing,
            &attrs(json!({"highlighted": true})),
        )
        .unwrap();
        assert_eq!(merged["title"], "Pro");
        assert_eq!(merged["price"], "$99");
        assert_eq!(merged["highlighted"], true);
    }

    #[test]
    fn test_update_keeps_empty_strings() {
        let existing = create_attrs(NodeType::PricingCard, &attrs(json!({"title": "Pro"}))).unwrap();
        let merged = merge_attrs(
            NodeType::PricingCard,
            &existing,
            &attrs(json!({"title": "", "price": null})),
        )
        .unwrap();
        assert_eq!(merged["title"], "");
        assert_eq!(merged["price"], default_attrs(NodeType::PricingCard)["price"]);

        let again = merge_attrs(NodeType::PricingCard, &merged, &Attrs::new()).unwrap();
        assert_eq!(again["title"], "");
    }

    #[test]
    fn test_rejects_malformed_values() {
        let err = create_attrs(
            NodeType::PricingCard,
            &attrs(json!({"features": ["ok", 3]})),
        )
        .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidAttribute { ref attr, .. } if attr == "features"));

        let err = merge_attrs(NodeType::Heading, &Attrs::new(), &attrs(json!({"level": 4})))
            .unwrap_err();
        assert!(matches!(err, DocumentError::InvalidAttribute { .. }));
    }

    #[test]
    fn test_unknown_attrs_are_dropped() {
        let merged = merge_attrs(
            NodeType::Paragraph,
            &Attrs::new(),
            &attrs(json!({"color": "red"})),
        )
        .unwrap();
        assert!(merged.is_empty());
    }
}
