//! Interactive snippet sessions.
//!
//! A session starts by inserting the expanded template at the cursor and
//! selecting the first tab stop. Typing into the current stop keeps its
//! mirrors and transforms in sync and moves everything after it, so the
//! other stops keep covering their text. Tabbing past the last stop, or
//! editing outside the current one, ends the session.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::buffer::TextBuffer;
use crate::env::Environment;
use crate::error::SnippetError;
use crate::expand::{expand, Binding, Interval, TabStop};
use crate::runner::{CommandRunner, NoCommands};
use crate::syntax::parse_template;

struct Session {
    /// Buffer position the expansion was inserted at. Intervals and `end`
    /// are relative to it.
    offset: usize,
    intervals: Vec<Interval>,
    tab_stops: BTreeMap<u32, TabStop>,
    transforms: Vec<Binding>,
    end: usize,
    current: u32,
    indent: String,
    indent_unit: String,
    env: Environment,
}

impl Session {
    fn range(&self, interval: usize) -> Range<usize> {
        let iv = &self.intervals[interval];
        self.offset + iv.start..self.offset + iv.end
    }

    fn stop_range(&self, stop: u32) -> Option<Range<usize>> {
        self.tab_stops.get(&stop).map(|ts| self.range(ts.interval))
    }

    fn is_descendant(&self, mut id: usize, ancestor: usize) -> bool {
        while let Some(parent) = self.intervals[id].parent {
            if parent == ancestor {
                return true;
            }
            id = parent;
        }
        false
    }

    /// Applies a change of `diff` bytes at the end of interval `id`. Its
    /// ancestors grow with it. Later intervals move, except descendants
    /// starting at the same offset, which only grow.
    fn update_intervals(&mut self, id: usize, diff: isize) {
        if diff == 0 {
            return;
        }
        let start = self.intervals[id].start;
        self.intervals[id].end = self.intervals[id].end.saturating_add_signed(diff);

        let mut parent = self.intervals[id].parent;
        while let Some(p) = parent {
            self.intervals[p].end = self.intervals[p].end.saturating_add_signed(diff);
            parent = self.intervals[p].parent;
        }

        for later in id + 1..self.intervals.len() {
            if self.intervals[later].start != start || !self.is_descendant(later, id) {
                self.intervals[later].start = self.intervals[later].start.saturating_add_signed(diff);
            }
            self.intervals[later].end = self.intervals[later].end.saturating_add_signed(diff);
        }

        if self.end >= start {
            self.end = self.end.saturating_add_signed(diff);
        }
    }

    /// Drops the stops, mirrors and transforms nested in `id`, whose text
    /// the user has just overwritten. Their intervals collapse onto the
    /// start of `id`.
    fn remove_nested(&mut self, id: usize) {
        let nested: Vec<usize> = (id + 1..self.intervals.len())
            .filter(|&later| self.is_descendant(later, id))
            .collect();
        if nested.is_empty() {
            return;
        }
        let start = self.intervals[id].start;
        for &n in &nested {
            self.intervals[n].start = start;
            self.intervals[n].end = start;
        }
        self.tab_stops.retain(|_, ts| !nested.contains(&ts.interval));
        for ts in self.tab_stops.values_mut() {
            ts.mirrors.retain(|m| !nested.contains(m));
        }
        self.transforms.retain(|b| !nested.contains(&b.interval));
    }

    fn indent_text(&self, text: &str) -> String {
        if self.indent.is_empty() {
            text.to_owned()
        } else {
            text.replace('\n', &format!("\n{}", self.indent))
        }
    }

    /// Brings the mirrors and transforms of `stop` up to date after its
    /// text changed by `diff` bytes.
    fn changed_tab_stop<B: TextBuffer + ?Sized>(&mut self, buf: &mut B, stop: u32, diff: isize, init: bool) {
        let Some(ts) = self.tab_stops.get(&stop) else {
            return;
        };
        let id = ts.interval;
        self.update_intervals(id, diff);
        if !init {
            self.remove_nested(id);
        }

        let source = self.range(id);
        let content = buf.text(source.start, source.end);
        let mirrors = self.tab_stops.get(&stop).map(|ts| ts.mirrors.clone()).unwrap_or_default();
        for m in mirrors {
            let target = self.range(m);
            buf.delete(target.start, target.end);
            buf.insert(target.start, &content);
            self.update_intervals(m, content.len() as isize - target.len() as isize);
        }

        let bindings: Vec<(usize, _)> = self
            .transforms
            .iter()
            .filter(|b| b.source == stop)
            .map(|b| (b.interval, b.transform.clone()))
            .collect();
        for (interval, transform) in bindings {
            let source = self.range(id);
            let input = buf.text(source.start, source.end);
            let output = self.indent_text(&transform.apply(&input, &self.indent_unit));
            let target = self.range(interval);
            buf.delete(target.start, target.end);
            buf.insert(target.start, &output);
            self.update_intervals(interval, output.len() as isize - target.len() as isize);
        }
    }
}

/// Drives one snippet session at a time over a [`TextBuffer`].
pub struct SnippetEngine<R = NoCommands> {
    runner: R,
    session: Option<Session>,
}

impl Default for SnippetEngine<NoCommands> {
    fn default() -> Self {
        SnippetEngine::new(NoCommands)
    }
}

impl<R: CommandRunner> SnippetEngine<R> {
    pub fn new(runner: R) -> Self {
        SnippetEngine {
            runner,
            session: None,
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn current_tab(&self) -> Option<u32> {
        self.session.as_ref().map(|s| s.current)
    }

    /// Buffer range of tab stop `stop` in the running session.
    pub fn tab_stop_range(&self, stop: u32) -> Option<Range<usize>> {
        self.session.as_ref()?.stop_range(stop)
    }

    /// Where the cursor goes when the session ends.
    pub fn end_position(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.offset + s.end)
    }

    /// Expands `template` at the cursor and selects its first tab stop.
    /// Any running session is discarded first. Nothing is inserted if the
    /// template transforms a tab stop it never defines.
    pub fn start_snippet<B: TextBuffer + ?Sized>(
        &mut self,
        buf: &mut B,
        template: &str,
        env: &Environment,
    ) -> Result<(), SnippetError> {
        self.clear();
        if template.is_empty() {
            return Ok(());
        }

        let indent_unit = buf.indent_unit();
        let nodes = parse_template(template);
        let mut expansion = expand(&nodes, &self.runner, env, &indent_unit)?;
        let offset = buf.pos();
        let indent = buf.line_indent(offset);
        expansion.indent_lines(&indent);
        buf.insert(offset, &expansion.text);
        log::debug!(
            "Started snippet: {} bytes, {} tab stops",
            expansion.text.len(),
            expansion.tab_stops.len()
        );

        let mut session = Session {
            offset,
            intervals: expansion.intervals,
            tab_stops: expansion.tab_stops,
            transforms: expansion.transforms,
            end: expansion.end,
            current: 0,
            indent,
            indent_unit,
            env: env.clone(),
        };
        let stops: Vec<u32> = session.tab_stops.keys().copied().collect();
        for stop in stops {
            session.changed_tab_stop(buf, stop, 0, true);
        }
        self.session = Some(session);
        self.next_tab(buf);
        Ok(())
    }

    /// Checks that the cursor is still within the current tab stop. If it
    /// is not, the buffer was changed behind the session's back and the
    /// session is cleared.
    pub fn validate<B: TextBuffer + ?Sized>(&mut self, buf: &B) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        let pos = buf.pos();
        let valid = session
            .stop_range(session.current)
            .is_some_and(|range| range.start <= pos && pos <= range.end);
        if !valid {
            log::debug!("Cursor left the snippet, ending session");
            self.clear();
        }
        valid
    }

    /// Moves to the next tab stop, piping the current one first if it has
    /// a command. Past the last numbered stop the session ends on stop 0
    /// or the end position.
    pub fn next_tab<B: TextBuffer + ?Sized>(&mut self, buf: &mut B) {
        let Some(session) = &self.session else {
            return;
        };
        let current = session.current;
        if current != 0 {
            self.pipe(buf, current);
        }

        let Some(session) = &self.session else {
            return;
        };
        let next = session
            .tab_stops
            .range(current + 1..)
            .next()
            .map(|(&stop, ts)| (stop, ts.interval, ts.pipe.is_some()));
        buf.remove_all_selections();

        match next {
            Some((stop, interval, has_pipe)) => {
                let range = session.range(interval);
                let is_last = session.tab_stops.range(stop + 1..).next().is_none();
                let at_end = session.intervals[interval].start == session.end;
                buf.set_pos(range.start);
                buf.select(range.start, range.end);
                if let Some(session) = &mut self.session {
                    session.current = stop;
                }
                if range.is_empty() && is_last && at_end && !has_pipe {
                    self.clear();
                }
            }
            None => {
                let last = session
                    .tab_stops
                    .get(&0)
                    .map(|ts| (ts.pipe.is_some(), session.range(ts.interval)));
                match last {
                    Some((true, _)) => {
                        if let Some(session) = &mut self.session {
                            session.current = 0;
                        }
                        self.pipe(buf, 0);
                    }
                    Some((false, range)) => {
                        if !range.is_empty() {
                            buf.select(range.start, range.end);
                        }
                        buf.set_pos(range.end);
                    }
                    None => buf.set_pos(session.offset + session.end),
                }
                self.clear();
            }
        }
    }

    /// Moves back to the previous numbered tab stop. Does nothing on the
    /// first one.
    pub fn prev_tab<B: TextBuffer + ?Sized>(&mut self, buf: &mut B) {
        let Some(session) = &mut self.session else {
            return;
        };
        if session.current <= 1 {
            return;
        }
        let Some((&stop, ts)) = session.tab_stops.range(1..session.current).next_back() else {
            return;
        };
        let range = session.range(ts.interval);
        session.current = stop;
        buf.remove_all_selections();
        buf.set_pos(range.start);
        buf.select(range.start, range.end);
    }

    /// Types `text` at the cursor. Inside the current tab stop it replaces
    /// the selection and updates the stop's mirrors and transforms;
    /// anywhere else it is inserted as is and the session ends.
    pub fn insert<B: TextBuffer + ?Sized>(&mut self, buf: &mut B, text: &str) {
        let mut pos = buf.pos();
        let Some(session) = &mut self.session else {
            let len = buf.insert(pos, text);
            buf.set_pos(pos + len);
            return;
        };

        let current = session.current;
        match session.stop_range(current) {
            Some(range) if range.start <= pos && pos <= range.end => {
                let mut diff = 0;
                if buf.is_selected() {
                    buf.remove_all_selections();
                    buf.delete(range.start, range.end);
                    diff -= range.len() as isize;
                    pos = range.start;
                    buf.set_pos(pos);
                }
                let len = if text == "\n" {
                    buf.insert_newline()
                } else {
                    let len = buf.insert(pos, text);
                    buf.set_pos(pos + len);
                    len
                };
                diff += len as isize;
                session.changed_tab_stop(buf, current, diff, false);
            }
            _ => {
                let len = buf.insert(pos, text);
                buf.set_pos(pos + len);
                self.clear();
            }
        }
    }

    /// Deletes `start..end`. Inside the current tab stop the stop shrinks
    /// and its mirrors follow; anywhere else the session ends.
    pub fn delete<B: TextBuffer + ?Sized>(&mut self, buf: &mut B, start: usize, end: usize) {
        let Some(session) = &mut self.session else {
            buf.delete(start, end);
            return;
        };
        let current = session.current;
        match session.stop_range(current) {
            Some(range) if range.start <= start && end <= range.end => {
                buf.remove_all_selections();
                if start < end {
                    buf.delete(start, end);
                    session.changed_tab_stop(buf, current, -((end - start) as isize), false);
                }
            }
            _ => {
                buf.delete(start, end);
                self.clear();
            }
        }
    }

    /// Ends the session, leaving the text as it is.
    pub fn clear(&mut self) {
        self.session = None;
    }

    /// Puts the cursor on the end position and ends the session.
    pub fn goto_end_and_clear<B: TextBuffer + ?Sized>(&mut self, buf: &mut B) {
        if let Some(session) = &self.session {
            buf.set_pos(session.offset + session.end);
        }
        self.clear();
    }

    /// Runs the command attached to `stop` with the stop's text as input,
    /// and replaces the text with its output.
    fn pipe<B: TextBuffer + ?Sized>(&mut self, buf: &mut B, stop: u32) {
        let Some(session) = &self.session else {
            return;
        };
        let Some(ts) = session.tab_stops.get(&stop) else {
            return;
        };
        let Some(command) = ts.pipe.clone() else {
            return;
        };

        let mut env = session.env.clone();
        env.set("TM_SNIPPET", buf.text(session.offset, session.offset + session.end));
        for (n, other) in &session.tab_stops {
            let range = session.range(other.interval);
            env.set(format!("TM_TABSTOP_{}", n), buf.text(range.start, range.end));
        }
        let range = session.range(ts.interval);
        let input = buf.text(range.start, range.end);

        match self.runner.run(&command, &input, &env) {
            Ok(mut output) if !output.is_empty() => {
                if output.ends_with('\n') {
                    output.pop();
                }
                buf.remove_all_selections();
                buf.set_pos(range.start);
                buf.select(range.start, range.end);
                self.insert(buf, &output);
            }
            Ok(_) => {}
            Err(e) => log::warn!("Snippet pipe `{}` failed: {}", command, e),
        }
    }
}
