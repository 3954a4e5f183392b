//! Parser for the snippet template language.
//!
//! ```text
//! $1  ${1}  ${1:placeholder}  ${1|command}  ${1:placeholder|command}
//! ${1/regex/format/flags}
//! $VAR  ${VAR}  ${VAR:fallback}  ${VAR/regex/format/flags}
//! `command`
//! ```
//!
//! `\$`, `` \` ``, `\}`, `\|` and `\\` escape the character. A `$`
//! construct that does not parse is kept as literal text. That includes a
//! placeholder still open at the end of the template: `${1:x` is text, not
//! a tab stop running to the end.

use crate::transform::Transform;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Node {
    Text(String),
    /// A tab stop. Its first occurrence defines it; later ones mirror it.
    TabStop {
        index: u32,
        placeholder: Vec<Node>,
        pipe: Option<String>,
    },
    /// Output of a regex substitution over tab stop `index`.
    Transform { index: u32, transform: Transform },
    Variable {
        name: String,
        fallback: Option<Vec<Node>>,
    },
    VariableTransform { name: String, transform: Transform },
    /// A command whose output replaces it.
    Shell(String),
}

pub fn parse_template(template: &str) -> Vec<Node> {
    let mut parser = Parser {
        src: template,
        pos: 0,
    };
    parser.nodes(Context::Top).0
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Context {
    Top,
    Placeholder,
    Fallback,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Close {
    Eof,
    Brace,
    Pipe,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

fn flush(text: &mut String, nodes: &mut Vec<Node>) {
    if !text.is_empty() {
        nodes.push(Node::Text(std::mem::take(text)));
    }
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn nodes(&mut self, context: Context) -> (Vec<Node>, Close) {
        let mut nodes = Vec::new();
        let mut text = String::new();
        while let Some(c) = self.bump() {
            match c {
                '\\' => match self.peek() {
                    Some(e @ ('$' | '`' | '}' | '|' | '\\')) => {
                        self.bump();
                        text.push(e);
                    }
                    _ => text.push('\\'),
                },
                '$' => {
                    let resume = self.pos;
                    match self.dollar() {
                        Some(node) => {
                            flush(&mut text, &mut nodes);
                            nodes.push(node);
                        }
                        None => {
                            self.pos = resume;
                            text.push('$');
                        }
                    }
                }
                '`' => match self.raw_until('`') {
                    Some(command) => {
                        flush(&mut text, &mut nodes);
                        nodes.push(Node::Shell(command.replace("\\`", "`")));
                    }
                    None => text.push('`'),
                },
                '}' if context != Context::Top => {
                    flush(&mut text, &mut nodes);
                    return (nodes, Close::Brace);
                }
                '|' if context == Context::Placeholder => {
                    flush(&mut text, &mut nodes);
                    return (nodes, Close::Pipe);
                }
                _ => text.push(c),
            }
        }
        flush(&mut text, &mut nodes);
        (nodes, Close::Eof)
    }

    /// Everything up to the next unescaped `end`, which is consumed.
    /// Escapes are kept. Leaves the position alone if there is no `end`.
    fn raw_until(&mut self, end: char) -> Option<String> {
        let rest = &self.src[self.pos..];
        let mut chars = rest.char_indices();
        while let Some((i, c)) = chars.next() {
            if c == '\\' {
                chars.next();
            } else if c == end {
                self.pos += i + c.len_utf8();
                return Some(rest[..i].to_owned());
            }
        }
        None
    }

    fn number(&mut self) -> Option<u32> {
        let rest = &self.src[self.pos..];
        let len = rest.bytes().take_while(u8::is_ascii_digit).count();
        let n = rest[..len].parse().ok()?;
        self.pos += len;
        Some(n)
    }

    fn name(&mut self) -> String {
        let rest = &self.src[self.pos..];
        let len = rest
            .bytes()
            .take_while(|b| b.is_ascii_alphanumeric() || *b == b'_')
            .count();
        self.pos += len;
        rest[..len].to_owned()
    }

    fn dollar(&mut self) -> Option<Node> {
        match self.peek()? {
            '{' => {
                self.bump();
                match self.peek()? {
                    c if c.is_ascii_digit() => self.braced_tab_stop(),
                    c if c.is_ascii_alphabetic() || c == '_' => self.braced_variable(),
                    _ => None,
                }
            }
            c if c.is_ascii_digit() => Some(Node::TabStop {
                index: self.number()?,
                placeholder: Vec::new(),
                pipe: None,
            }),
            c if c.is_ascii_alphabetic() || c == '_' => Some(Node::Variable {
                name: self.name(),
                fallback: None,
            }),
            _ => None,
        }
    }

    fn braced_tab_stop(&mut self) -> Option<Node> {
        let index = self.number()?;
        let (placeholder, pipe) = match self.bump()? {
            '}' => (Vec::new(), None),
            ':' => match self.nodes(Context::Placeholder) {
                (nodes, Close::Brace) => (nodes, None),
                (nodes, Close::Pipe) => (nodes, self.pipe()?),
                (_, Close::Eof) => return None,
            },
            '|' => (Vec::new(), self.pipe()?),
            '/' => {
                let transform = self.transform()?;
                return Some(Node::Transform { index, transform });
            }
            _ => return None,
        };
        Some(Node::TabStop {
            index,
            placeholder,
            pipe,
        })
    }

    /// The command after `|`, up to the closing brace. An empty command
    /// is no pipe at all.
    fn pipe(&mut self) -> Option<Option<String>> {
        let command = self.raw_until('}')?;
        Some((!command.is_empty()).then(|| command.replace("\\}", "}")))
    }

    fn braced_variable(&mut self) -> Option<Node> {
        let name = self.name();
        match self.bump()? {
            '}' => Some(Node::Variable {
                name,
                fallback: None,
            }),
            ':' => match self.nodes(Context::Fallback) {
                (fallback, Close::Brace) => Some(Node::Variable {
                    name,
                    fallback: Some(fallback),
                }),
                _ => None,
            },
            '/' => {
                let transform = self.transform()?;
                Some(Node::VariableTransform { name, transform })
            }
            _ => None,
        }
    }

    /// `regex/format/flags}`, after the first slash.
    fn transform(&mut self) -> Option<Transform> {
        let regex = self.raw_until('/')?.replace("\\/", "/");
        let format = self.raw_until('/')?;
        let flags = self.raw_until('}')?;
        if !flags.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
        Some(Transform {
            regex,
            format,
            flags,
        })
    }
}

#[cfg(test)]
mod syntax_tests {
    use super::*;

    fn text(s: &str) -> Node {
        Node::Text(s.to_owned())
    }

    fn stop(index: u32, placeholder: Vec<Node>) -> Node {
        Node::TabStop {
            index,
            placeholder,
            pipe: None,
        }
    }

    #[test]
    fn parses_stops_and_nested_placeholders() {
        assert_eq!(
            parse_template("for ${1:i} in ${2:0..${3:n}} {\n\t$0\n}"),
            vec![
                text("for "),
                stop(1, vec![text("i")]),
                text(" in "),
                stop(2, vec![text("0.."), stop(3, vec![text("n")])]),
                text(" {\n\t"),
                stop(0, vec![]),
                text("\n}"),
            ]
        );
        assert_eq!(parse_template("${12}$7x"), vec![stop(12, vec![]), stop(7, vec![]), text("x")]);
    }

    #[test]
    fn escapes_are_literal() {
        assert_eq!(parse_template(r"\$1 \`ls\` \} \| \\ \n"), vec![text(r"$1 `ls` } | \ \n")]);
        assert_eq!(parse_template(r"${1:a\}b}"), vec![stop(1, vec![text("a}b")])]);
    }

    #[test]
    fn malformed_dollars_stay_literal() {
        assert_eq!(parse_template("cost: $"), vec![text("cost: $")]);
        assert_eq!(parse_template("$ 5"), vec![text("$ 5")]);
        assert_eq!(parse_template("${1:open"), vec![text("${1:open")]);
        assert_eq!(parse_template("${-}"), vec![text("${-}")]);
        assert_eq!(parse_template("${1/a/b/!}"), vec![text("${1/a/b/!}")]);
        assert_eq!(parse_template("`unterminated"), vec![text("`unterminated")]);
    }

    #[test]
    fn unterminated_placeholder_is_literal() {
        assert_eq!(
            parse_template("a ${1:x ${2:y}"),
            vec![text("a ${1:x "), stop(2, vec![text("y")])]
        );
        assert_eq!(parse_template("${VAR:fallback"), vec![text("${VAR:fallback")]);
        assert_eq!(parse_template("${1:a|cmd"), vec![text("${1:a|cmd")]);
    }

    #[test]
    fn parses_pipes_transforms_and_shell() {
        assert_eq!(
            parse_template("${1:name|tr a-z A-Z}${2|date}${3|}"),
            vec![
                Node::TabStop {
                    index: 1,
                    placeholder: vec![text("name")],
                    pipe: Some("tr a-z A-Z".to_owned()),
                },
                Node::TabStop {
                    index: 2,
                    placeholder: vec![],
                    pipe: Some("date".to_owned()),
                },
                stop(3, vec![]),
            ]
        );
        assert_eq!(
            parse_template(r"${1/(\w+)\/x/\u$1/gi}"),
            vec![Node::Transform {
                index: 1,
                transform: Transform {
                    regex: r"(\w+)/x".to_owned(),
                    format: r"\u$1".to_owned(),
                    flags: "gi".to_owned(),
                },
            }]
        );
        assert_eq!(parse_template("`echo \\`hi\\``"), vec![Node::Shell("echo `hi`".to_owned())]);
    }

    #[test]
    fn parses_variables() {
        assert_eq!(
            parse_template("$TM_FILENAME ${USER} ${NAME:${1:anon}}"),
            vec![
                Node::Variable {
                    name: "TM_FILENAME".to_owned(),
                    fallback: None,
                },
                text(" "),
                Node::Variable {
                    name: "USER".to_owned(),
                    fallback: None,
                },
                text(" "),
                Node::Variable {
                    name: "NAME".to_owned(),
                    fallback: Some(vec![stop(1, vec![text("anon")])]),
                },
            ]
        );
        assert_eq!(
            parse_template("${TM_FILENAME/\\..*$//}"),
            vec![Node::VariableTransform {
                name: "TM_FILENAME".to_owned(),
                transform: Transform {
                    regex: "\\..*$".to_owned(),
                    format: String::new(),
                    flags: String::new(),
                },
            }]
        );
        // A pipe only means something inside a tab stop.
        assert_eq!(
            parse_template("${X:a|b}"),
            vec![Node::Variable {
                name: "X".to_owned(),
                fallback: Some(vec![text("a|b")]),
            }]
        );
    }
}
