//! Class Variants - declarative style variants resolved to class strings.
//!
//! A component describes, once, every visual state it supports:
//! - variant groups (`size: { sm: ..., lg: ... }`)
//! - boolean shorthand (`disabled: "..."`, negated as `"!disabled": "..."`)
//! - compound rules whose output depends on several keys at once
//! - nested specs, optionally with their own base fragment
//!
//! The raw spec is normalized once into a [`VariantNode`]; rendering a
//! [`Selection`] is then a memoized lookup.
//!
//! # Architecture
//!
//! ```text
//! ComponentConfig (YAML / JSON)
//! └── VariantNode::new
//!     ├── normalize: compound detection -> boolean expansion
//!     ├── render(selection) -> String   (memoized per effective selection)
//!     └── possibilities() -> u64        (structural combination count)
//! ```
//!
//! # Example
//!
//! ```
//! use class_variants::{Selection, VariantNode};
//!
//! let node = VariantNode::from_yaml_str(r#"
//! base: btn
//! variants:
//!   size:
//!     sm: btn-sm
//!     lg: btn-lg
//!   disabled: btn-disabled
//! defaults:
//!   size: sm
//! "#).unwrap();
//!
//! assert_eq!(node.render(&Selection::new()).unwrap(), "btn btn-sm");
//!
//! let selection = Selection::new().with("size", "lg").with("disabled", true);
//! assert_eq!(node.render(&selection).unwrap(), "btn btn-lg btn-disabled");
//! assert_eq!(node.possibilities().unwrap(), 2);
//! ```

mod config;
mod error;
mod node;
mod normalize;
mod option_value;
mod registry;
mod selection;

// Re-exports
pub use config::ComponentConfig;
pub use error::{Result, VariantError};
pub use node::{OptionEntry, VariantGroup, VariantNode};
pub use normalize::NEGATION_MARKER;
pub use option_value::OptionValue;
pub use registry::VariantRegistry;
pub use selection::Selection;
