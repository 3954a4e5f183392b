//! Format strings for transform replacements.
//!
//! `$n` inserts capture group `n`. `\n` is a newline and `\t` the buffer's
//! indent unit. `\u` and `\l` change the case of the next character; `\U`
//! and `\L` change everything up to `\E`. `(?n:then:else)` picks a branch
//! on whether group `n` matched. Any other escaped character is literal.

use regex::Captures;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Case {
    Upper,
    Lower,
}

#[derive(Default)]
struct Folding {
    next: Option<Case>,
    until_end: Option<Case>,
}

impl Folding {
    fn push(&mut self, out: &mut String, text: &str) {
        for c in text.chars() {
            match self.next.take().or(self.until_end) {
                Some(Case::Upper) => out.extend(c.to_uppercase()),
                Some(Case::Lower) => out.extend(c.to_lowercase()),
                None => out.push(c),
            }
        }
    }
}

/// Expands `format` against one regex match.
pub fn expand_format(format: &str, captures: &Captures<'_>, indent_unit: &str) -> String {
    let mut out = String::new();
    expand_into(format, captures, indent_unit, &mut Folding::default(), &mut out);
    out
}

fn group<'t>(captures: &Captures<'t>, n: usize) -> &'t str {
    captures.get(n).map_or("", |m| m.as_str())
}

fn expand_into(format: &str, captures: &Captures<'_>, indent_unit: &str, folding: &mut Folding, out: &mut String) {
    let mut pos = 0;
    while let Some(c) = format[pos..].chars().next() {
        pos += c.len_utf8();
        match c {
            '$' => {
                let digits = format[pos..].bytes().take_while(u8::is_ascii_digit).count();
                match format[pos..pos + digits].parse::<usize>() {
                    Ok(n) => {
                        folding.push(out, group(captures, n));
                        pos += digits;
                    }
                    Err(_) => folding.push(out, "$"),
                }
            }
            '\\' => {
                let Some(e) = format[pos..].chars().next() else {
                    folding.push(out, "\\");
                    continue;
                };
                pos += e.len_utf8();
                match e {
                    'n' => out.push('\n'),
                    't' => out.push_str(indent_unit),
                    'u' => folding.next = Some(Case::Upper),
                    'l' => folding.next = Some(Case::Lower),
                    'U' => folding.until_end = Some(Case::Upper),
                    'L' => folding.until_end = Some(Case::Lower),
                    'E' => folding.until_end = None,
                    _ => {
                        let mut buf = [0; 4];
                        folding.push(out, e.encode_utf8(&mut buf));
                    }
                }
            }
            '(' if format[pos..].starts_with('?') => match conditional(&format[pos + 1..]) {
                Some((n, then, otherwise, len)) => {
                    let branch = if group(captures, n).is_empty() { otherwise } else { then };
                    expand_into(branch, captures, indent_unit, folding, out);
                    pos += 1 + len;
                }
                None => folding.push(out, "("),
            },
            _ => {
                let mut buf = [0; 4];
                folding.push(out, c.encode_utf8(&mut buf));
            }
        }
    }
}

/// Splits `n:then:else)` into its parts and the length consumed. The else
/// branch is optional.
fn conditional(s: &str) -> Option<(usize, &str, &str, usize)> {
    let digits = s.bytes().take_while(u8::is_ascii_digit).count();
    let n = s[..digits].parse().ok()?;
    let body = s[digits..].strip_prefix(':')?;
    let body_start = digits + 1;

    let mut depth = 0;
    let mut split = None;
    let mut chars = body.char_indices();
    while let Some((i, c)) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            ')' => {
                let (then, otherwise) = match split {
                    Some(at) => (&body[..at], &body[at + 1..i]),
                    None => (&body[..i], ""),
                };
                return Some((n, then, otherwise, body_start + i + 1));
            }
            ':' if depth == 0 && split.is_none() => split = Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod format_tests {
    use regex::Regex;

    use super::*;

    fn fmt(regex: &str, input: &str, format: &str) -> String {
        let re = Regex::new(regex).unwrap();
        let captures = re.captures(input).unwrap();
        expand_format(format, &captures, "  ")
    }

    #[test]
    fn inserts_groups_and_escapes() {
        assert_eq!(fmt(r"(\w+)-(\w+)", "foo-bar", "$2_$1"), "bar_foo");
        assert_eq!(fmt(r"(\w+)", "foo", r"<$1>\n\t\$x\\"), "<foo>\n  $x\\");
        assert_eq!(fmt(r"(\w+)", "foo", "$9|$x"), "|$x");
    }

    #[test]
    fn folds_case() {
        assert_eq!(fmt(r"(\w+) (\w+)", "hello world", r"\u$1 \U$2\E!"), "Hello WORLD!");
        assert_eq!(fmt(r"(\w+)", "ABC", r"\L$1 \u\L$1"), "abc Abc");
        assert_eq!(fmt(r"(\w+)", "ABC", r"\l$1"), "aBC");
    }

    #[test]
    fn picks_conditional_branches() {
        let format = r"(?1:got $1:none)(?2:\(two\))";
        assert_eq!(fmt(r"(a)?(b)?", "a", format), "got a");
        assert_eq!(fmt(r"(a)?(b)?", "b", format), "none(two)");
        assert_eq!(fmt(r"(a)", "a", "(?1:(x)y)"), "(x)y");
        assert_eq!(fmt(r"(a)", "a", "(?1:open"), "(?1:open");
        assert_eq!(fmt(r"(a)", "a", "(plain)"), "(plain)");
    }
}
