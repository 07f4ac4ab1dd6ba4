//! Glob pattern matching for `fetch`'s layer selection: selects exactly the
//! layers whose `filepath` annotation matches a given pattern.
//!
//! No glob crate is in the dependency stack; `regex` is already a
//! `modctl-core` dependency via the remote client's own needs, so patterns
//! are translated to an anchored regex rather than pulling in a dedicated
//! glob crate.
//!
//! Supported syntax: `*` (any run of characters, including `/`), `?` (any
//! single character), literal characters escaped otherwise. This matches
//! flat, single-segment patterns such as `file*.txt`; there is no `**`
//! distinct from `*` since layer paths are matched as whole strings,
//! not split into path segments first.

use regex::Regex;

/// Compiles `pattern` into a regex matching filepaths it selects.
pub fn compile(pattern: &str) -> Regex {
    let mut regex_source = String::with_capacity(pattern.len() * 2 + 2);
    regex_source.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => regex_source.push_str(".*"),
            '?' => regex_source.push('.'),
            _ => {
                if is_regex_meta_character(ch) {
                    regex_source.push('\\');
                }
                regex_source.push(ch);
            }
        }
    }
    regex_source.push('$');
    Regex::new(&regex_source).expect("glob-derived regex is always syntactically valid")
}

fn is_regex_meta_character(ch: char) -> bool {
    matches!(ch, '.' | '+' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$' | '\\')
}

/// True if `filepath` matches any of `patterns`.
pub fn matches_any(patterns: &[Regex], filepath: &str) -> bool {
    patterns.iter().any(|re| re.is_match(filepath))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_any_run_of_characters() {
        let re = compile("file*.txt");
        assert!(re.is_match("file1.txt"));
        assert!(re.is_match("file2.txt"));
        assert!(!re.is_match("foo/bar.bin"));
    }

    #[test]
    fn question_mark_matches_single_character() {
        let re = compile("file?.txt");
        assert!(re.is_match("file1.txt"));
        assert!(!re.is_match("file12.txt"));
    }

    #[test]
    fn literal_dots_are_escaped() {
        let re = compile("config.json");
        assert!(re.is_match("config.json"));
        assert!(!re.is_match("configXjson"));
    }

    #[test]
    fn matches_any_checks_every_pattern() {
        let patterns = vec![compile("file*.txt"), compile("*.md")];
        assert!(matches_any(&patterns, "file1.txt"));
        assert!(matches_any(&patterns, "README.md"));
        assert!(!matches_any(&patterns, "foo/bar.bin"));
    }
}
