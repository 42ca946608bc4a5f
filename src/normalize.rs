//! Normalization of raw variant specifications.
//!
//! Runs once per node, in two passes that each build a new structure:
//! 1. `build_groups` - compound detection and option wrapping
//! 2. `expand_boolean_groups` - boolean shorthand expansion and merging
//!
//! A raw group is resolved by exactly one path, chosen by the shape of its
//! value: an option-map whose keys are all known variant keys (compound), an
//! ordinary option-map, or a bare fragment (shorthand).

use crate::error::{shape_of, Result, VariantError};
use crate::node::{OptionEntry, VariantGroup, VariantNode};
use crate::option_value::OptionValue;
use crate::selection::Selection;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Prefix marking a negated boolean shorthand key (`"!disabled"`).
pub const NEGATION_MARKER: char = '!';

/// A group after the first pass.
enum StagedGroup {
    /// Ordinary option-map.
    Options(BTreeMap<OptionValue, OptionEntry>),
    /// A bare fragment or compound node standing for a boolean variant.
    Shorthand(OptionEntry),
}

/// Normalize a raw spec into canonical groups, in declared order.
pub(crate) fn normalize(
    variants: &Mapping,
    parent_keys: &BTreeSet<String>,
) -> Result<Vec<VariantGroup>> {
    let staged = build_groups(variants, parent_keys)?;
    Ok(expand_boolean_groups(staged))
}

/// Variant keys as written in a raw spec, negation markers included.
pub(crate) fn raw_keys(variants: &Mapping) -> Result<BTreeSet<String>> {
    variants.keys().map(variant_key).collect()
}

fn variant_key(key: &Value) -> Result<String> {
    match key {
        Value::String(s) => Ok(s.clone()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(VariantError::InvalidVariantKey {
            found: shape_of(other),
        }),
    }
}

fn build_groups(
    variants: &Mapping,
    parent_keys: &BTreeSet<String>,
) -> Result<Vec<(String, StagedGroup)>> {
    variants
        .iter()
        .map(|(key, value)| {
            let key = variant_key(key)?;
            let group = match value {
                Value::String(fragment) => {
                    StagedGroup::Shorthand(OptionEntry::Fragment(fragment.clone()))
                }
                Value::Mapping(options) if is_compound(options, parent_keys) => {
                    StagedGroup::Shorthand(nested(None, options, parent_keys)?)
                }
                Value::Mapping(options) => {
                    StagedGroup::Options(build_options(&key, options, parent_keys)?)
                }
                other => {
                    return Err(VariantError::InvalidGroup {
                        key,
                        found: shape_of(other),
                    })
                }
            };
            Ok((key, group))
        })
        .collect()
}

/// An option-map is a compound rule set when every one of its keys names a
/// variant known to the enclosing scope.
fn is_compound(options: &Mapping, parent_keys: &BTreeSet<String>) -> bool {
    options.keys().all(|option| {
        variant_key(option)
            .map(|key| parent_keys.contains(&key))
            .unwrap_or(false)
    })
}

fn build_options(
    key: &str,
    options: &Mapping,
    parent_keys: &BTreeSet<String>,
) -> Result<BTreeMap<OptionValue, OptionEntry>> {
    options
        .iter()
        .map(|(option, value)| {
            let option =
                OptionValue::from_yaml(option).ok_or_else(|| VariantError::InvalidOptionKey {
                    key: key.to_string(),
                    found: shape_of(option),
                })?;
            Ok((option, build_entry(value, parent_keys)?))
        })
        .collect()
}

fn build_entry(value: &Value, parent_keys: &BTreeSet<String>) -> Result<OptionEntry> {
    match value {
        Value::String(fragment) => Ok(OptionEntry::Fragment(fragment.clone())),
        Value::Mapping(variants) => nested(None, variants, parent_keys),
        Value::Sequence(pair) => match pair.as_slice() {
            [Value::String(base), Value::Mapping(variants)] => {
                nested(Some(base.clone()), variants, parent_keys)
            }
            _ => Ok(OptionEntry::Opaque(value.clone())),
        },
        other => Ok(OptionEntry::Opaque(other.clone())),
    }
}

fn nested(
    base: Option<String>,
    variants: &Mapping,
    parent_keys: &BTreeSet<String>,
) -> Result<OptionEntry> {
    let node = VariantNode::with_parent_keys(base, variants, Selection::new(), parent_keys)?;
    Ok(OptionEntry::Nested(Box::new(node)))
}

/// Expand shorthand groups into boolean option-maps and merge groups that
/// share a base key. Markers are stripped before merging, so a key that still
/// carries one afterwards (`"!!k"`, or `"!k"` with an option-map) can never
/// match a real variant and is dropped.
fn expand_boolean_groups(staged: Vec<(String, StagedGroup)>) -> Vec<VariantGroup> {
    let mut groups: Vec<VariantGroup> = Vec::with_capacity(staged.len());

    for (raw_key, group) in staged {
        let (key, options) = match group {
            StagedGroup::Shorthand(entry) => {
                let (key, enabled) = match raw_key.strip_prefix(NEGATION_MARKER) {
                    Some(base) => (base.to_string(), false),
                    None => (raw_key.clone(), true),
                };
                (key, BTreeMap::from([(OptionValue::Bool(enabled), entry)]))
            }
            StagedGroup::Options(options) => (raw_key.clone(), options),
        };

        if key.starts_with(NEGATION_MARKER) {
            warn!(key = %raw_key, "dropping variant group with unresolvable negation marker");
            continue;
        }

        match groups.iter_mut().find(|existing| existing.key == key) {
            Some(existing) => existing.options.extend(options),
            None => groups.push(VariantGroup { key, options }),
        }
    }

    groups
}
