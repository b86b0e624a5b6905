//! Minimal glob dialect for path exclusion
//!
//! `**` crosses directory separators, `*` stays within one segment, and
//! every other character is literal. The derived regex is anchored to the
//! whole path. No character classes, no brace expansion.

use regex::Regex;

/// Translate an exclusion glob into an anchored regex source string.
pub fn glob_to_regex(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            // Literal character; escape regex metacharacters.
            '.' | '+' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '$' | '|' | '?' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('$');
    out
}

/// Compile an exclusion glob. Every metacharacter in the input is either
/// translated or escaped, so the derived regex source is always valid.
pub fn compile(pattern: &str) -> Regex {
    Regex::new(&glob_to_regex(pattern)).expect("escaped glob translates to a valid regex")
}
