//! Component configuration - the serde surface for variant definitions.
//!
//! Configuration is parsed from in-memory YAML or JSON text; where that text
//! comes from is up to the caller.

use crate::error::Result;
use crate::node::VariantNode;
use crate::selection::Selection;
use serde::{Deserialize, Serialize};
use serde_yaml::Mapping;

/// Definition of one component's variants.
///
/// ```yaml
/// base: btn
/// variants:
///   size:
///     sm: btn-sm
///     lg: btn-lg
///   disabled: btn-disabled
///   "!disabled": cursor-pointer
/// defaults:
///   size: sm
/// expected_possibilities: 2
/// ```
///
/// Negated keys must be quoted in YAML, since a bare `!` starts a tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentConfig {
    /// Fragment always included.
    #[serde(default, alias = "classes", skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Raw variant spec, in declared order.
    #[serde(default)]
    pub variants: Mapping,
    /// Values used when a render omits a key.
    #[serde(default)]
    pub defaults: Selection,
    /// Combination count the component is expected to have, checked by
    /// [`VariantRegistry::verify`](crate::VariantRegistry::verify).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_possibilities: Option<u64>,
}

impl ComponentConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Normalize into a node.
    pub fn build(&self) -> Result<VariantNode> {
        VariantNode::new(self.base.clone(), &self.variants, self.defaults.clone())
    }
}

impl VariantNode {
    /// Build a node from a YAML [`ComponentConfig`] document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        ComponentConfig::from_yaml_str(yaml)?.build()
    }

    /// Build a node from a JSON [`ComponentConfig`] document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        ComponentConfig::from_json_str(json)?.build()
    }
}
