//! Glob-style key patterns for [`KeyValueStore::keys`](crate::KeyValueStore::keys).
//!
//! `*` matches any run of characters (including none) and `?` exactly one
//! character. Every other character is literal.

use wildmatch::WildMatchPattern;

/// Compiled key glob.
pub type KeyPattern = WildMatchPattern<'*', '?'>;

/// The pattern that matches every key.
pub const MATCH_ALL: &str = "*";

/// Whether `pattern` matches every key (one or more `*` and nothing else).
pub fn is_match_all(pattern: &str) -> bool {
    !pattern.is_empty() && pattern.chars().all(|c| c == '*')
}

/// Translate a key glob to a SQL `LIKE` pattern with backslash escapes.
pub fn to_sql_like(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '*' => out.push('%'),
            '?' => out.push('_'),
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_everything() {
        let p = KeyPattern::new(MATCH_ALL);
        assert!(p.matches(""));
        assert!(p.matches("p1"));
        assert!(p.matches("plan:with:colons"));
    }

    #[test]
    fn match_all_detection() {
        assert!(is_match_all("*"));
        assert!(is_match_all("**"));
        assert!(!is_match_all(""));
        assert!(!is_match_all("plan*"));
        assert!(!is_match_all("?"));
    }

    #[test]
    fn globs_match_keys() {
        assert!(KeyPattern::new("plan*").matches("plan-42"));
        assert!(!KeyPattern::new("plan*").matches("xplan"));
        assert!(KeyPattern::new("p?").matches("p1"));
        assert!(!KeyPattern::new("p?").matches("p12"));
        assert!(!KeyPattern::new("plan-1").matches("Plan-1"));
        assert!(KeyPattern::new("plan[1]").matches("plan[1]"));
    }

    #[test]
    fn sql_like_translation() {
        assert_eq!(to_sql_like("*"), "%");
        assert_eq!(to_sql_like("p?-*"), "p_-%");
        assert_eq!(to_sql_like("100%_x"), "100\\%\\_x");
        assert_eq!(to_sql_like("a\\b"), "a\\\\b");
        assert_eq!(to_sql_like("plan[1]"), "plan[1]");
    }
}
