use regex::RegexBuilder;

use crate::format::expand_format;

/// `regex/format/flags`: a substitution over a tab stop or variable.
///
/// Flags: `g` replaces every match instead of the first, `i` ignores case
/// and `m` makes `^` and `$` match at line breaks. Other letters are
/// ignored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transform {
    pub regex: String,
    pub format: String,
    pub flags: String,
}

impl Transform {
    pub fn is_global(&self) -> bool {
        self.flags.contains('g')
    }

    /// Substitutes the matches in `input`. A regex that does not compile
    /// leaves the input as it is.
    pub fn apply(&self, input: &str, indent_unit: &str) -> String {
        let regex = match RegexBuilder::new(&self.regex)
            .case_insensitive(self.flags.contains('i'))
            .multi_line(self.flags.contains('m'))
            .build()
        {
            Ok(regex) => regex,
            Err(e) => {
                log::warn!("Invalid snippet transform /{}/: {}", self.regex, e);
                return input.to_owned();
            }
        };

        let mut out = String::new();
        let mut pos = 0;
        while let Some(captures) = regex.captures_at(input, pos) {
            let Some(found) = captures.get(0) else { break };
            out.push_str(&input[pos..found.start()]);
            out.push_str(&expand_format(&self.format, &captures, indent_unit));
            pos = found.end();
            if found.is_empty() {
                // Step over one character so an empty match cannot repeat.
                if let Some(c) = input[pos..].chars().next() {
                    out.push(c);
                    pos += c.len_utf8();
                }
            }
            if pos >= input.len() || !self.is_global() {
                break;
            }
        }
        out.push_str(&input[pos.min(input.len())..]);
        out
    }
}
