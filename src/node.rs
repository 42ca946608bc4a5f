//! Variant resolver node - the single recursive structure behind rendering
//! and counting.
//!
//! A node is normalized once at construction and is immutable afterwards,
//! except for its memo, which only ever grows. Nested nodes are owned by the
//! option entry that holds them.

use crate::error::{shape_of, Result, VariantError};
use crate::normalize::{normalize, raw_keys};
use crate::option_value::OptionValue;
use crate::selection::Selection;
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

/// What an option value resolves to.
#[derive(Debug)]
pub enum OptionEntry {
    /// Literal output text.
    Fragment(String),
    /// Nested node, rendered with the full effective selection.
    Nested(Box<VariantNode>),
    /// A value of unexpected shape, kept as written. Rendering or counting it
    /// is an error.
    Opaque(Value),
}

fn malformed(key: &str, option: &OptionValue, value: &Value) -> VariantError {
    VariantError::MalformedOption {
        key: key.to_string(),
        option: option.to_string(),
        found: shape_of(value),
    }
}

/// One canonical variant group: a key and its option-map.
#[derive(Debug)]
pub struct VariantGroup {
    pub(crate) key: String,
    pub(crate) options: BTreeMap<OptionValue, OptionEntry>,
}

impl VariantGroup {
    /// The variant key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Look up the entry for an option value.
    pub fn option(&self, value: &OptionValue) -> Option<&OptionEntry> {
        self.options.get(value)
    }

    /// All option entries, ordered by option value.
    pub fn options(&self) -> impl Iterator<Item = (&OptionValue, &OptionEntry)> {
        self.options.iter()
    }

    /// Number of distinct outputs this group contributes.
    fn possibilities(&self) -> Result<u64> {
        self.options.iter().try_fold(0u64, |total, (option, entry)| {
            let weight = match entry {
                OptionEntry::Fragment(_) => 1,
                OptionEntry::Nested(node) => node.possibilities()?,
                OptionEntry::Opaque(value) => return Err(malformed(&self.key, option, value)),
            };
            total
                .checked_add(weight)
                .ok_or_else(|| VariantError::PossibilitiesOverflow {
                    key: self.key.clone(),
                })
        })
    }
}

/// A normalized variant specification with a per-node render memo.
///
/// `render` is safe to call from several threads: the memo sits behind a lock
/// and a race on the same key computes the same string twice, keeping one.
pub struct VariantNode {
    base: Option<String>,
    groups: Vec<VariantGroup>,
    defaults: Selection,
    known_keys: BTreeSet<String>,
    memo: RwLock<HashMap<Selection, String>>,
    compositions: AtomicU64,
}

impl VariantNode {
    /// Build a node whose enclosing scope is its own raw variant keys.
    pub fn new(base: Option<String>, variants: &Mapping, defaults: Selection) -> Result<Self> {
        let parent_keys = raw_keys(variants)?;
        Self::with_parent_keys(base, variants, defaults, &parent_keys)
    }

    /// Build a node whose compound detection checks against `parent_keys`.
    pub fn with_parent_keys(
        base: Option<String>,
        variants: &Mapping,
        defaults: Selection,
        parent_keys: &BTreeSet<String>,
    ) -> Result<Self> {
        let groups = normalize(variants, parent_keys)?;
        let known_keys = collect_known_keys(&groups);

        debug!(
            groups = groups.len(),
            known_keys = known_keys.len(),
            has_base = base.is_some(),
            "normalized variant node"
        );

        Ok(Self {
            base,
            groups,
            defaults,
            known_keys,
            memo: RwLock::new(HashMap::new()),
            compositions: AtomicU64::new(0),
        })
    }

    /// Render the output string for `overrides` layered on the defaults.
    ///
    /// Keys outside [`known_keys`](Self::known_keys) are ignored and a
    /// selected value without an entry contributes nothing. Reaching an
    /// opaque entry is an error; errors are not memoized.
    pub fn render(&self, overrides: &Selection) -> Result<String> {
        let effective = overrides
            .merged_over(&self.defaults)
            .restricted_to(&self.known_keys);

        if let Some(hit) = self.memo_read().get(&effective) {
            trace!(selection = ?effective, "render memo hit");
            return Ok(hit.clone());
        }

        trace!(selection = ?effective, "render memo miss");
        let rendered = self.compose(&effective)?;
        self.compositions.fetch_add(1, Ordering::Relaxed);

        Ok(self
            .memo_write()
            .entry(effective)
            .or_insert(rendered)
            .clone())
    }

    fn compose(&self, effective: &Selection) -> Result<String> {
        let mut parts: Vec<String> = Vec::with_capacity(self.groups.len() + 1);

        if let Some(base) = &self.base {
            parts.push(base.clone());
        }

        for group in &self.groups {
            let Some(chosen) = effective.get(&group.key) else {
                continue;
            };
            match group.options.get(chosen) {
                Some(OptionEntry::Fragment(fragment)) => parts.push(fragment.clone()),
                // Nested rules see the whole selection, not just this key.
                Some(OptionEntry::Nested(node)) => parts.push(node.render(effective)?),
                Some(OptionEntry::Opaque(value)) => {
                    return Err(malformed(&group.key, chosen, value))
                }
                None => {}
            }
        }

        Ok(squeeze(&parts.join(" ")))
    }

    /// Number of distinct renderings, as a structural count.
    ///
    /// Each group contributes the sum of its entries (1 per fragment, the
    /// nested count per nested node); groups multiply. A node without groups
    /// has exactly one rendering.
    pub fn possibilities(&self) -> Result<u64> {
        self.groups.iter().try_fold(1u64, |product, group| {
            product
                .checked_mul(group.possibilities()?)
                .ok_or_else(|| VariantError::PossibilitiesOverflow {
                    key: group.key.clone(),
                })
        })
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    /// Canonical groups in declared order.
    pub fn groups(&self) -> &[VariantGroup] {
        &self.groups
    }

    /// Find a group by key.
    pub fn group(&self, key: &str) -> Option<&VariantGroup> {
        self.groups.iter().find(|group| group.key == key)
    }

    pub fn defaults(&self) -> &Selection {
        &self.defaults
    }

    /// Keys this node (or any nested node) reacts to.
    pub fn known_keys(&self) -> &BTreeSet<String> {
        &self.known_keys
    }

    /// Number of memoized selections.
    pub fn memo_len(&self) -> usize {
        self.memo_read().len()
    }

    /// Number of renders that missed the memo and composed a string.
    pub fn compositions(&self) -> u64 {
        self.compositions.load(Ordering::Relaxed)
    }

    // The memo only ever holds complete strings, so a poisoned lock is safe
    // to keep using.
    fn memo_read(&self) -> RwLockReadGuard<'_, HashMap<Selection, String>> {
        self.memo.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn memo_write(&self) -> RwLockWriteGuard<'_, HashMap<Selection, String>> {
        self.memo.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for VariantNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariantNode")
            .field("base", &self.base)
            .field("groups", &self.groups)
            .field("defaults", &self.defaults)
            .field("known_keys", &self.known_keys)
            .field("memo_len", &self.memo_len())
            .finish()
    }
}

fn collect_known_keys(groups: &[VariantGroup]) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    for group in groups {
        keys.insert(group.key.clone());
        for entry in group.options.values() {
            if let OptionEntry::Nested(node) = entry {
                keys.extend(node.known_keys.iter().cloned());
            }
        }
    }
    keys
}

/// Collapse whitespace runs to one space and trim.
pub(crate) fn squeeze(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn spec(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn button() -> VariantNode {
        VariantNode::new(
            Some("btn".into()),
            &spec(
                r#"
size:
  sm: btn-sm
  lg: btn-lg
disabled: btn-disabled
"#,
            ),
            Selection::new().with("size", "sm"),
        )
        .unwrap()
    }

    fn compound() -> VariantNode {
        VariantNode::new(
            None,
            &spec(
                r#"
size:
  sm: text-sm
  lg: text-lg
color:
  primary: text-blue
  secondary: text-gray
emphasis:
  size:
    lg:
      color:
        primary: ring-4
"#,
            ),
            Selection::new(),
        )
        .unwrap()
    }

    #[test]
    fn test_render_defaults() {
        assert_eq!(button().render(&Selection::new()).unwrap(), "btn btn-sm");
    }

    #[test]
    fn test_render_overrides() {
        let node = button();
        let selection = Selection::new().with("size", "lg").with("disabled", true);
        assert_eq!(node.render(&selection).unwrap(), "btn btn-lg btn-disabled");
    }

    #[test]
    fn test_unknown_key_shares_memo_entry() {
        let node = button();
        assert_eq!(node.render(&Selection::new()).unwrap(), "btn btn-sm");
        let selection = Selection::new().with("color", "ignored");
        assert_eq!(node.render(&selection).unwrap(), "btn btn-sm");
        // Explicitly selecting the default resolves to the same entry too
        let selection = Selection::new().with("size", "sm");
        assert_eq!(node.render(&selection).unwrap(), "btn btn-sm");

        assert_eq!(node.compositions(), 1);
        assert_eq!(node.memo_len(), 1);
    }

    #[test]
    fn test_missing_option_is_noop() {
        let node = button();
        let selection = Selection::new().with("size", "xxl").with("disabled", false);
        assert_eq!(node.render(&selection).unwrap(), "btn");
    }

    #[test]
    fn test_shorthand_matches_explicit_boolean() {
        let shorthand = VariantNode::new(None, &spec("active: is-active\n"), Selection::new()).unwrap();
        let explicit = VariantNode::new(
            None,
            &spec("active:\n  true: is-active\n"),
            Selection::new(),
        )
        .unwrap();

        for selection in [
            Selection::new().with("active", true),
            Selection::new().with("active", false),
            Selection::new(),
        ] {
            assert_eq!(
                shorthand.render(&selection).unwrap(),
                explicit.render(&selection).unwrap()
            );
        }
        assert_eq!(
            shorthand.render(&Selection::new().with("active", true)).unwrap(),
            "is-active"
        );
        assert_eq!(shorthand.render(&Selection::new()).unwrap(), "");
    }

    #[test]
    fn test_negated_shorthand() {
        let node = VariantNode::new(
            None,
            &spec("active: \"on\"\n\"!active\": \"off\"\n"),
            Selection::new(),
        )
        .unwrap();

        assert_eq!(node.render(&Selection::new().with("active", true)).unwrap(), "on");
        assert_eq!(node.render(&Selection::new().with("active", false)).unwrap(), "off");
        assert!(node.known_keys().iter().all(|k| !k.starts_with('!')));
    }

    #[test]
    fn test_compound_sees_full_selection() {
        let node = compound();
        let selection = Selection::new()
            .with("size", "lg")
            .with("color", "primary")
            .with("emphasis", true);
        assert_eq!(node.render(&selection).unwrap(), "text-lg text-blue ring-4");

        let selection = Selection::new()
            .with("size", "lg")
            .with("color", "secondary")
            .with("emphasis", true);
        assert_eq!(node.render(&selection).unwrap(), "text-lg text-gray");

        let selection = Selection::new().with("size", "lg").with("color", "primary");
        assert_eq!(node.render(&selection).unwrap(), "text-lg text-blue");
    }

    #[test]
    fn test_known_keys_closed_under_nesting() {
        let node = VariantNode::new(
            Some("card".into()),
            &spec(
                r#"
size:
  lg: [text-lg, {tone: {dark: bg-black}}]
"#,
            ),
            Selection::new(),
        )
        .unwrap();

        let keys: Vec<_> = node.known_keys().iter().map(String::as_str).collect();
        assert_eq!(keys, vec!["size", "tone"]);

        let selection = Selection::new().with("size", "lg").with("tone", "dark");
        assert_eq!(node.render(&selection).unwrap(), "card text-lg bg-black");
    }

    #[test]
    fn test_whitespace_is_squeezed() {
        let node = VariantNode::new(
            Some("  base   one ".into()),
            &spec("size:\n  sm: \"  two\\t three  \"\n"),
            Selection::new().with("size", "sm"),
        )
        .unwrap();
        assert_eq!(node.render(&Selection::new()).unwrap(), "base one two three");
    }

    #[test]
    fn test_possibilities() {
        let two = VariantNode::new(None, &spec("size:\n  sm: a\n  lg: b\n"), Selection::new()).unwrap();
        assert_eq!(two.possibilities().unwrap(), 2);

        let product = VariantNode::new(
            None,
            &spec("size: {sm: a, md: b, lg: c}\ncolor: {red: r, blue: b}\n"),
            Selection::new(),
        )
        .unwrap();
        assert_eq!(product.possibilities().unwrap(), 6);

        let nested = VariantNode::new(
            None,
            &spec("size:\n  sm: a\n  lg:\n    tone: {dark: d, light: l, dim: m}\n"),
            Selection::new(),
        )
        .unwrap();
        assert_eq!(nested.possibilities().unwrap(), 1 + 3);

        assert_eq!(button().possibilities().unwrap(), 2);
        assert_eq!(compound().possibilities().unwrap(), 4);
    }

    #[test]
    fn test_empty_node_has_one_possibility() {
        let node = VariantNode::new(Some("plain".into()), &Mapping::new(), Selection::new()).unwrap();
        assert_eq!(node.possibilities().unwrap(), 1);
        assert_eq!(node.render(&Selection::new().with("x", "y")).unwrap(), "plain");
    }

    #[test]
    fn test_opaque_entry_is_an_error() {
        let node = VariantNode::new(None, &spec("size:\n  sm: 3\n  lg: big\n"), Selection::new()).unwrap();

        let err = node.possibilities().unwrap_err();
        assert_eq!(err.code(), "MALFORMED_OPTION");

        let err = node.render(&Selection::new().with("size", "sm")).unwrap_err();
        assert!(matches!(err, VariantError::MalformedOption { ref key, .. } if key == "size"));
        assert_eq!(node.memo_len(), 0);

        // Options that are well formed still render
        assert_eq!(node.render(&Selection::new().with("size", "lg")).unwrap(), "big");
    }

    #[test]
    fn test_concurrent_renders_agree() {
        let node = Arc::new(button());
        let selection = Selection::new().with("size", "lg").with("disabled", true);

        let results: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let node = Arc::clone(&node);
                    let selection = selection.clone();
                    scope.spawn(move || node.render(&selection).unwrap())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(results.iter().all(|r| r == "btn btn-lg btn-disabled"));
        assert_eq!(node.memo_len(), 1);
    }

    #[test]
    fn test_squeeze() {
        assert_eq!(squeeze("  a   b \n c  "), "a b c");
        assert_eq!(squeeze("   "), "");
    }
}
