//! Variant Registry
//!
//! Holds named components loaded from one configuration document and checks
//! declared combination counts against the normalized variants.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::ComponentConfig;
use crate::error::{Result, VariantError};
use crate::node::VariantNode;
use crate::selection::Selection;

/// Document shape accepted by the registry loaders.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryDocument {
    #[serde(default)]
    components: BTreeMap<String, ComponentConfig>,
}

#[derive(Debug)]
struct RegisteredComponent {
    node: VariantNode,
    expected_possibilities: Option<u64>,
}

/// Named variant nodes.
#[derive(Debug, Default)]
pub struct VariantRegistry {
    components: BTreeMap<String, RegisteredComponent>,
}

impl VariantRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a YAML document of the form `components: { name: config, ... }`
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let document: RegistryDocument = serde_yaml::from_str(yaml)?;
        Self::from_configs(document.components)
    }

    /// Load a JSON document of the form `{"components": {"name": config}}`
    pub fn from_json_str(json: &str) -> Result<Self> {
        let document: RegistryDocument = serde_json::from_str(json)?;
        Self::from_configs(document.components)
    }

    /// Build every config; fails on the first one that does not normalize.
    pub fn from_configs<I, S>(configs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, ComponentConfig)>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for (name, config) in configs {
            registry.insert_config(name, &config)?;
        }
        info!(components = registry.len(), "loaded variant registry");
        Ok(registry)
    }

    /// Register a config under `name`, replacing any existing component.
    pub fn insert_config(&mut self, name: impl Into<String>, config: &ComponentConfig) -> Result<()> {
        let name = name.into();
        debug!(component = %name, "registering component");
        let node = config.build()?;
        self.components.insert(
            name,
            RegisteredComponent {
                node,
                expected_possibilities: config.expected_possibilities,
            },
        );
        Ok(())
    }

    /// Register an already built node under `name`.
    pub fn insert(&mut self, name: impl Into<String>, node: VariantNode) {
        self.components.insert(
            name.into(),
            RegisteredComponent {
                node,
                expected_possibilities: None,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&VariantNode> {
        self.components.get(name).map(|c| &c.node)
    }

    /// Component names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.components.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Render a named component.
    pub fn render(&self, name: &str, selection: &Selection) -> Result<String> {
        self.get(name)
            .ok_or_else(|| VariantError::UnknownComponent(name.to_string()))?
            .render(selection)
    }

    /// Check every component that declares `expected_possibilities`.
    ///
    /// Returns the first mismatch, or the first counting error.
    pub fn verify(&self) -> Result<()> {
        for (name, component) in &self.components {
            let Some(expected) = component.expected_possibilities else {
                continue;
            };
            let actual = component.node.possibilities()?;
            if actual != expected {
                return Err(VariantError::PossibilitiesMismatch {
                    component: name.clone(),
                    expected,
                    actual,
                });
            }
        }
        Ok(())
    }
}
