//! `${NAME}` substitution.
//!
//! Substitution is lenient: unknown names are left in place so callers can
//! report them with context afterwards (see [`unresolved`]).

use super::types::VariableMapping;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{(\w+)\}").expect("static token pattern"));

/// Marker whose presence means substitution is incomplete.
pub const PLACEHOLDER_OPEN: &str = "${";

/// Replace every `${NAME}` whose name is in `vars`.
pub fn substitute(text: &str, vars: &VariableMapping) -> String {
    if !text.contains(PLACEHOLDER_OPEN) {
        return text.to_string();
    }
    TOKEN
        .replace_all(text, |caps: &Captures| match vars.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Names of `${NAME}` tokens left in `text`, in order of appearance, deduplicated.
pub fn unresolved(text: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in TOKEN.captures_iter(text) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// True if `text` still carries a placeholder opening, matched or not.
pub fn has_placeholder(text: &str) -> bool {
    text.contains(PLACEHOLDER_OPEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn vars(pairs: &[(&str, &str)]) -> VariableMapping {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_substitute_single() {
        let v = vars(&[("NAME", "world")]);
        assert_eq!(substitute("hello ${NAME}", &v), "hello world");
    }

    #[test]
    fn test_substitute_multiple_and_repeated() {
        let v = vars(&[("A", "X"), ("B", "Y")]);
        assert_eq!(substitute("${A}-${B}-${A}", &v), "X-Y-X");
    }

    #[test]
    fn test_substitute_unknown_left_in_place() {
        let v = vars(&[("A", "X")]);
        assert_eq!(substitute("${A} ${MISSING}", &v), "X ${MISSING}");
    }

    #[test]
    fn test_substitute_ignores_shell_forms() {
        let v = vars(&[("HOME", "nope")]);
        assert_eq!(substitute("$HOME ${HOME:-x} $(pwd)", &v), "$HOME ${HOME:-x} $(pwd)");
    }

    #[test]
    fn test_substitute_empty_value() {
        let v = vars(&[("EMPTY", "")]);
        assert_eq!(substitute("a${EMPTY}b", &v), "ab");
    }

    #[test]
    fn test_substitute_does_not_recurse() {
        let v = vars(&[("A", "${B}"), ("B", "deep")]);
        assert_eq!(substitute("${A}", &v), "${B}");
    }

    #[test]
    fn test_unresolved_lists_names_once() {
        assert_eq!(
            unresolved("${X} and ${Y} and ${X}"),
            vec!["X".to_string(), "Y".to_string()]
        );
        assert!(unresolved("plain $X").is_empty());
    }

    #[test]
    fn test_has_placeholder() {
        assert!(has_placeholder("a ${B"));
        assert!(!has_placeholder("a $B"));
    }

    fn text_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                "[a-z ]{0,6}",
                Just("${A}".to_string()),
                Just("${B}".to_string()),
                Just("${C}".to_string()),
                Just("$".to_string()),
            ],
            0..8,
        )
        .prop_map(|parts| parts.concat())
    }

    proptest! {
        /// Property: once every token resolves, a second pass changes nothing.
        #[test]
        fn substitute_is_idempotent(
            text in text_strategy(),
            a in "[a-z0-9 ]{0,5}",
            b in "[a-z0-9 ]{0,5}",
            c in "[a-z0-9 ]{0,5}",
        ) {
            let v = vars(&[("A", a.as_str()), ("B", b.as_str()), ("C", c.as_str())]);
            let once = substitute(&text, &v);
            prop_assert!(unresolved(&once).is_empty());
            prop_assert_eq!(substitute(&once, &v), once);
        }
    }
}
