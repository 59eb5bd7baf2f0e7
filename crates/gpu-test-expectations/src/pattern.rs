//! Shell-style wildcard matching of test names.

/// Match `name` against `pattern`, where `*` matches any run of characters
/// (including `/`) and `?` matches exactly one.
pub fn wildcard_match(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();
    let (mut p, mut n) = (0, 0);
    // Position of the last `*` and the name index it was tried at.
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        match pattern.get(p).copied() {
            Some('*') => {
                backtrack = Some((p, n));
                p += 1;
            }
            Some(c) if c == '?' || c == name[n] => {
                p += 1;
                n += 1;
            }
            _ => match backtrack {
                Some((star, tried)) => {
                    p = star + 1;
                    n = tried + 1;
                    backtrack = Some((star, tried + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_patterns() {
        assert!(wildcard_match("conformance/a.html", "conformance/a.html"));
        assert!(!wildcard_match("conformance/a.html", "conformance/a.htm"));
        assert!(!wildcard_match("conformance/a.htm", "conformance/a.html"));
    }

    #[test]
    fn test_star_spans_directories() {
        assert!(wildcard_match("conformance/*", "conformance/glsl/misc/a.html"));
        assert!(wildcard_match("conformance/glsl/functions/*", "conformance/glsl/functions/x.html"));
        assert!(!wildcard_match("conformance/glsl/functions/*", "conformance/glsl/misc/x.html"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("a*b*c", "aXXbYYbc"));
    }

    #[test]
    fn test_question_mark_matches_one_char() {
        assert!(wildcard_match("tex-2d-rgb?.html", "tex-2d-rgba.html"));
        assert!(!wildcard_match("tex-2d-rgb?.html", "tex-2d-rgb.html"));
    }
}
