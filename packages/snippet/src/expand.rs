//! Expansion of a parsed template into text plus the intervals a session
//! tracks.

use std::collections::BTreeMap;

use crate::env::Environment;
use crate::error::SnippetError;
use crate::runner::CommandRunner;
use crate::syntax::Node;
use crate::transform::Transform;

/// A span of the expansion, relative to where it was inserted. Intervals
/// are numbered in the order they open, so a parent always comes before
/// its children and earlier text before later text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Interval {
    pub start: usize,
    pub end: usize,
    pub parent: Option<usize>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TabStop {
    pub interval: usize,
    pub pipe: Option<String>,
    pub mirrors: Vec<usize>,
}

/// A transform of tab stop `source`, written into `interval`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Binding {
    pub source: u32,
    pub interval: usize,
    pub transform: Transform,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Expansion {
    pub text: String,
    pub intervals: Vec<Interval>,
    pub tab_stops: BTreeMap<u32, TabStop>,
    pub transforms: Vec<Binding>,
    /// Where the cursor goes when the session ends.
    pub end: usize,
}

pub(crate) fn expand<R: CommandRunner + ?Sized>(
    nodes: &[Node],
    runner: &R,
    env: &Environment,
    indent_unit: &str,
) -> Result<Expansion, SnippetError> {
    let mut expander = Expander {
        runner,
        env,
        indent_unit,
        out: Expansion::default(),
        end: None,
        parent: None,
    };
    expander.nodes(nodes);

    let mut out = expander.out;
    out.end = expander.end.unwrap_or(out.text.len());
    if let Some(b) = out.transforms.iter().find(|b| !out.tab_stops.contains_key(&b.source)) {
        return Err(SnippetError::UndefinedTabStop(b.source));
    }
    Ok(out)
}

struct Expander<'a, R: ?Sized> {
    runner: &'a R,
    env: &'a Environment,
    indent_unit: &'a str,
    out: Expansion,
    end: Option<usize>,
    parent: Option<usize>,
}

impl<R: CommandRunner + ?Sized> Expander<'_, R> {
    fn nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            match node {
                Node::Text(text) if self.indent_unit != "\t" => {
                    let text = text.replace('\t', self.indent_unit);
                    self.out.text.push_str(&text);
                }
                Node::Text(text) => self.out.text.push_str(text),
                Node::TabStop {
                    index: 0,
                    placeholder,
                    pipe: None,
                } if placeholder.is_empty() => {
                    self.end = Some(self.out.text.len());
                }
                Node::TabStop {
                    index,
                    placeholder,
                    pipe,
                } => {
                    let interval = self.open();
                    if let Some(stop) = self.out.tab_stops.get_mut(index) {
                        stop.mirrors.push(interval);
                    } else {
                        self.out.tab_stops.insert(
                            *index,
                            TabStop {
                                interval,
                                pipe: pipe.clone(),
                                mirrors: Vec::new(),
                            },
                        );
                        self.nodes(placeholder);
                    }
                    self.close(interval);
                }
                Node::Transform { index, transform } => {
                    let interval = self.open();
                    self.close(interval);
                    self.out.transforms.push(Binding {
                        source: *index,
                        interval,
                        transform: transform.clone(),
                    });
                }
                Node::Variable { name, fallback } => {
                    match (self.env.get(name).filter(|v| !v.is_empty()), fallback) {
                        (Some(value), _) => self.out.text.push_str(value),
                        (None, Some(fallback)) => self.nodes(fallback),
                        (None, None) => {}
                    }
                }
                Node::VariableTransform { name, transform } => {
                    let value = self.env.get(name).unwrap_or_default();
                    let text = transform.apply(value, self.indent_unit);
                    self.out.text.push_str(&text);
                }
                Node::Shell(command) => match self.runner.run(command, "", self.env) {
                    Ok(mut output) => {
                        if output.ends_with('\n') {
                            output.pop();
                        }
                        self.out.text.push_str(&output);
                    }
                    Err(e) => log::warn!("Snippet command `{}` failed: {}", command, e),
                },
            }
        }
    }

    fn open(&mut self) -> usize {
        let pos = self.out.text.len();
        self.out.intervals.push(Interval {
            start: pos,
            end: pos,
            parent: self.parent,
        });
        let id = self.out.intervals.len() - 1;
        self.parent = Some(id);
        id
    }

    fn close(&mut self, id: usize) {
        let interval = &mut self.out.intervals[id];
        interval.end = self.out.text.len();
        self.parent = interval.parent;
    }
}

/// Grows or moves everything past `pos` by `diff`: intervals containing
/// `pos` are resized, later ones moved.
pub(crate) fn shift_from(intervals: &mut [Interval], end: &mut usize, pos: usize, diff: isize) {
    if diff == 0 {
        return;
    }
    for interval in intervals.iter_mut().filter(|iv| pos < iv.end) {
        if pos < interval.start {
            interval.start = interval.start.saturating_add_signed(diff);
        }
        interval.end = interval.end.saturating_add_signed(diff);
    }
    if *end > pos {
        *end = end.saturating_add_signed(diff);
    }
}

impl Expansion {
    /// Follows every line break with `indent`, keeping the intervals on
    /// the text they covered.
    pub fn indent_lines(&mut self, indent: &str) {
        if indent.is_empty() || !self.text.contains('\n') {
            return;
        }
        let mut text = String::with_capacity(self.text.len());
        for c in self.text.chars() {
            if c == '\n' {
                shift_from(&mut self.intervals, &mut self.end, text.len(), indent.len() as isize);
                text.push('\n');
                text.push_str(indent);
            } else {
                text.push(c);
            }
        }
        self.text = text;
    }
}
