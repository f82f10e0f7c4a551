//! `${VAR}` template expansion with cycle detection

use crate::store::EnvSource;
use regex::{Captures, Regex};
use std::collections::HashSet;
use std::sync::LazyLock;

static TEMPLATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_]*)\}").expect("valid regex"));
static UNRESOLVED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{[^}]*\}").expect("valid regex"));

/// Expands `${NAME}` placeholders by looking names up in an [`EnvSource`].
///
/// Resolution never fails. Placeholders that are empty, missing, cyclic, or
/// that expand to text still naming an unresolved variable are left in place.
pub struct TemplateResolver<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: EnvSource + ?Sized> TemplateResolver<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Expands every placeholder in `value`, which is the raw value of `key`.
    pub fn resolve(&self, key: &str, value: &str) -> String {
        self.expand(key, value, &HashSet::new())
    }

    // `active` holds the keys on the current resolution path. Each branch
    // gets its own copy so sibling references never see each other.
    fn expand(&self, key: &str, value: &str, active: &HashSet<String>) -> String {
        if active.contains(key) {
            return value.to_string();
        }

        let mut path = active.clone();
        path.insert(key.to_string());

        TEMPLATE
            .replace_all(value, |caps: &Captures<'_>| {
                let token = &caps[0];
                let name = &caps[1];
                self.substitute(key, name, &path)
                    .unwrap_or_else(|| token.to_string())
            })
            .into_owned()
    }

    fn substitute(&self, key: &str, name: &str, path: &HashSet<String>) -> Option<String> {
        if name.is_empty() {
            return None;
        }

        if path.contains(name) {
            tracing::trace!(key, reference = name, "template cycle, keeping placeholder");
            return None;
        }

        let raw = self.source.get_raw(name).filter(|raw| !raw.is_empty())?;
        let resolved = self.expand(name, raw, path);

        if resolved.contains(&format!("${{{key}}}")) {
            tracing::trace!(key, reference = name, "indirect template cycle, keeping placeholder");
            return None;
        }

        if resolved == raw && UNRESOLVED.is_match(&resolved) {
            return None;
        }

        Some(resolved)
    }
}

/// Expands `value` for `key` against `source`.
pub fn resolve_template<S: EnvSource + ?Sized>(source: &S, key: &str, value: &str) -> String {
    TemplateResolver::new(source).resolve(key, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn source(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_simple_substitution() {
        let env = source(&[("HOST", "localhost"), ("PORT", "5432")]);
        assert_eq!(
            resolve_template(&env, "URL", "postgres://${HOST}:${PORT}/db"),
            "postgres://localhost:5432/db"
        );
    }

    #[test]
    fn test_nested_substitution() {
        let env = source(&[("A", "${B}-a"), ("B", "${C}-b"), ("C", "c")]);
        assert_eq!(resolve_template(&env, "X", "${A}"), "c-b-a");
    }

    #[test]
    fn test_resolved_text_is_unchanged() {
        let env = source(&[("A", "1")]);
        assert_eq!(resolve_template(&env, "X", "plain value"), "plain value");
    }

    #[test]
    fn test_direct_cycle() {
        let env = source(&[("A", "${A}")]);
        assert_eq!(resolve_template(&env, "A", "${A}"), "${A}");
    }

    #[test]
    fn test_indirect_cycle() {
        let env = source(&[("A", "${B}"), ("B", "${A}")]);
        assert_eq!(resolve_template(&env, "A", "${B}"), "${B}");
        assert_eq!(resolve_template(&env, "B", "${A}"), "${A}");
    }

    #[test]
    fn test_diamond() {
        let env = source(&[("A", "${B}${C}"), ("B", "x"), ("C", "y")]);
        assert_eq!(resolve_template(&env, "A", "${B}${C}"), "xy");

        let env = source(&[("B", "${D}"), ("C", "${D}"), ("D", "d")]);
        assert_eq!(resolve_template(&env, "A", "${B}+${C}"), "d+d");
    }

    #[test]
    fn test_missing_empty_and_blank_names_are_preserved() {
        let env = source(&[("EMPTY", "")]);
        assert_eq!(
            resolve_template(&env, "X", "${MISSING}/${EMPTY}/${}"),
            "${MISSING}/${EMPTY}/${}"
        );
    }

    #[test]
    fn test_unresolvable_reference_is_preserved() {
        let env = source(&[("A", "${NOPE}")]);
        assert_eq!(resolve_template(&env, "X", "${A}"), "${A}");
    }

    #[test]
    fn test_non_word_names_are_left_alone() {
        let env = source(&[("A-B", "x")]);
        assert_eq!(resolve_template(&env, "X", "${A-B}"), "${A-B}");
    }
}
