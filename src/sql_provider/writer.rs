//! Output buffer and per-statement render state.
//!
//! Rendering never recurses into a nested expression or query. A builder
//! that reaches one calls [`SqlWriter::defer`], which leaves a slot in the
//! output and queues a task; the generator drains the queue and each task
//! fills its own slot. The slots are stitched together by [`SqlWriter::finish`].

use std::collections::HashMap;

use crate::ast::{AliasSet, ElementType, Node, NodeId, ReservedWords, SqlTree};
use crate::error::{QueryError, QueryResult};
use crate::value::Value;

use super::flags::SqlProviderFlags;
use super::value_to_sql::ValueToSqlConverter;

/// A piece of deferred rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTask {
    Expression(NodeId),
    /// A query nested in another; re-entering one prints `...`.
    Query(NodeId),
}

#[derive(Debug)]
enum Segment {
    Text(String),
    Slot(usize),
}

/// Output slot of one task, plus the render state it was queued with.
#[derive(Debug)]
struct Frame {
    task: Option<RenderTask>,
    indent: usize,
    /// Nearest enclosing frame that renders a query.
    outer: Option<usize>,
    /// Query this frame renders.
    entered: Option<NodeId>,
    out: Vec<Segment>,
}

/// Marks a region whose text is returned instead of kept; see [`SqlWriter::begin_capture`].
#[derive(Debug)]
pub struct Capture {
    frame: usize,
    previous: usize,
    floor: usize,
}

impl Capture {
    /// Number of queued tasks that belong to the enclosing output.
    pub fn floor(&self) -> usize {
        self.floor
    }
}

/// Accumulates SQL text for one statement.
pub struct SqlWriter<'a> {
    pub tree: &'a SqlTree,
    pub flags: SqlProviderFlags,
    converter: &'a ValueToSqlConverter,
    reserved: &'a ReservedWords,
    aliases: AliasSet,
    /// Table or query node to the alias of the table source that wraps it.
    source_aliases: HashMap<NodeId, String>,
    frames: Vec<Frame>,
    current: usize,
    pending: Vec<usize>,
    sql: String,
    indent: usize,
}

impl<'a> SqlWriter<'a> {
    pub fn new(
        tree: &'a SqlTree,
        root: NodeId,
        flags: SqlProviderFlags,
        converter: &'a ValueToSqlConverter,
        reserved: &'a ReservedWords,
    ) -> QueryResult<Self> {
        let aliases = tree.query(root)?.aliases.clone().unwrap_or_default();
        let mut source_aliases = HashMap::new();
        for ts in tree.find_parent_first(root, &[ElementType::TableSource]) {
            let ts = tree.table_source(ts)?;
            if let Some(alias) = &ts.alias {
                source_aliases.insert(ts.source, alias.clone());
            }
        }

        Ok(Self {
            tree,
            flags,
            converter,
            reserved,
            aliases,
            source_aliases,
            frames: vec![Frame {
                task: None,
                indent: 0,
                outer: None,
                entered: None,
                out: Vec::new(),
            }],
            current: 0,
            pending: Vec::new(),
            sql: String::with_capacity(256),
            indent: 0,
        })
    }

    pub fn push(&mut self, text: &str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    pub fn push_indent(&mut self) -> &mut Self {
        for _ in 0..self.indent {
            self.sql.push('\t');
        }
        self
    }

    pub fn newline(&mut self) -> &mut Self {
        self.sql.push('\n');
        self
    }

    /// Indented line followed by a newline.
    pub fn line(&mut self, text: &str) -> &mut Self {
        self.push_indent().push(text).newline()
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn outdent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    pub fn literal(&mut self, value: &Value) -> QueryResult<()> {
        if self.converter.try_convert(&mut self.sql, value) {
            Ok(())
        } else {
            Err(QueryError::render(format!(
                "no literal form for {:?} value",
                value.scalar_type()
            )))
        }
    }

    /// Leave a slot here for `task` and queue it.
    pub fn defer(&mut self, task: RenderTask) {
        let frame = self.new_frame(Some(task));
        self.flush();
        self.frames[self.current].out.push(Segment::Slot(frame));
        self.pending.push(frame);
    }

    /// Next queued task above `floor`, made the current output.
    pub fn next_task(&mut self, floor: usize) -> Option<RenderTask> {
        if self.pending.len() <= floor {
            return None;
        }
        let frame = self.pending.pop()?;
        self.switch_to(frame);
        self.frames[frame].task
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Redirect output into a detached buffer until [`SqlWriter::end_capture`].
    pub fn begin_capture(&mut self) -> Capture {
        let frame = self.new_frame(None);
        let previous = self.current;
        self.switch_to(frame);
        Capture {
            frame,
            previous,
            floor: self.pending.len(),
        }
    }

    /// Text written since `capture` began; tasks queued in it must have run.
    pub fn end_capture(&mut self, capture: Capture) -> QueryResult<String> {
        if self.pending.len() > capture.floor {
            return Err(QueryError::internal("captured output has unrendered parts"));
        }
        let indent = self.frames[capture.frame].indent;
        self.switch_to(capture.previous);
        self.indent = indent;
        Ok(self.assemble(capture.frame))
    }

    /// Alias of the table source wrapping a table or query.
    pub fn source_alias(&self, source: NodeId) -> Option<&str> {
        self.source_aliases.get(&source).map(String::as_str)
    }

    /// `n` aliases free in this statement, not kept allocated.
    pub fn temp_aliases(&self, n: usize, prefix: &str) -> Vec<String> {
        self.aliases.get_temp_aliases(n, prefix, self.reserved)
    }

    /// Start rendering `query` in the current output; false when it is
    /// already being rendered further out.
    pub fn enter(&mut self, query: NodeId) -> bool {
        let mut scope = self.scope(self.current);
        while let Some(f) = scope {
            if self.frames[f].entered == Some(query) {
                return false;
            }
            scope = self.frames[f].outer;
        }
        self.frames[self.current].entered = Some(query);
        true
    }

    /// Innermost query being rendered.
    pub fn current_query(&self) -> Option<NodeId> {
        self.scope(self.current).and_then(|f| self.frames[f].entered)
    }

    pub fn is_query(&self, id: NodeId) -> bool {
        matches!(self.tree.node(id), Node::Query(_))
    }

    pub fn finish(mut self) -> String {
        self.flush();
        self.assemble(0).trim_end().to_string()
    }

    fn scope(&self, frame: usize) -> Option<usize> {
        match self.frames[frame].entered {
            Some(_) => Some(frame),
            None => self.frames[frame].outer,
        }
    }

    fn new_frame(&mut self, task: Option<RenderTask>) -> usize {
        let frame = Frame {
            task,
            indent: self.indent,
            outer: self.scope(self.current),
            entered: None,
            out: Vec::new(),
        };
        self.frames.push(frame);
        self.frames.len() - 1
    }

    fn flush(&mut self) {
        if !self.sql.is_empty() {
            let text = std::mem::take(&mut self.sql);
            self.frames[self.current].out.push(Segment::Text(text));
        }
    }

    fn switch_to(&mut self, frame: usize) {
        self.flush();
        self.current = frame;
        self.indent = self.frames[frame].indent;
    }

    /// Text of `frame` with every slot replaced by its task's output.
    fn assemble(&mut self, frame: usize) -> String {
        let mut sql = String::new();
        let mut stack = vec![std::mem::take(&mut self.frames[frame].out).into_iter()];
        while let Some(segments) = stack.last_mut() {
            match segments.next() {
                Some(Segment::Text(text)) => sql.push_str(&text),
                Some(Segment::Slot(slot)) => {
                    let out = std::mem::take(&mut self.frames[slot].out);
                    stack.push(out.into_iter());
                }
                None => {
                    stack.pop();
                }
            }
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql_provider::{GenericGenerator, SqlGenerator};

    fn writer<'a>(
        tree: &'a SqlTree,
        root: NodeId,
        converter: &'a ValueToSqlConverter,
        reserved: &'a ReservedWords,
    ) -> SqlWriter<'a> {
        SqlWriter::new(tree, root, GenericGenerator::new().flags(), converter, reserved).unwrap()
    }

    #[test]
    fn test_slots_are_filled_in_place() {
        let mut tree = SqlTree::new();
        let root = tree.new_query();
        let value = tree.value(1);
        let converter = ValueToSqlConverter::with_defaults();
        let reserved = ReservedWords::builtin();
        let mut w = writer(&tree, root, &converter, &reserved);

        w.push("a ");
        w.defer(RenderTask::Expression(value));
        w.push(" c");
        assert_eq!(w.next_task(0), Some(RenderTask::Expression(value)));
        w.push("b");
        assert_eq!(w.next_task(0), None);
        assert_eq!(w.finish(), "a b c");
    }

    #[test]
    fn test_enter_rejects_query_on_render_path() {
        let mut tree = SqlTree::new();
        let root = tree.new_query();
        let converter = ValueToSqlConverter::with_defaults();
        let reserved = ReservedWords::builtin();
        let mut w = writer(&tree, root, &converter, &reserved);

        assert!(w.enter(root));
        w.defer(RenderTask::Query(root));
        w.next_task(0);
        assert!(!w.enter(root));
        assert_eq!(w.current_query(), Some(root));
    }

    #[test]
    fn test_capture_returns_text_and_restores_output() {
        let mut tree = SqlTree::new();
        let root = tree.new_query();
        let value = tree.value(1);
        let converter = ValueToSqlConverter::with_defaults();
        let reserved = ReservedWords::builtin();
        let mut w = writer(&tree, root, &converter, &reserved);

        w.push("x = ");
        let capture = w.begin_capture();
        w.push("(");
        w.defer(RenderTask::Expression(value));
        w.push(")");
        let floor = capture.floor();
        while w.next_task(floor).is_some() {
            w.push("42");
        }
        let text = w.end_capture(capture).unwrap();
        assert_eq!(text, "(42)");
        w.push(&text);
        assert_eq!(w.finish(), "x = (42)");
    }

    #[test]
    fn test_capture_with_queued_tasks_fails() {
        let mut tree = SqlTree::new();
        let root = tree.new_query();
        let value = tree.value(1);
        let converter = ValueToSqlConverter::with_defaults();
        let reserved = ReservedWords::builtin();
        let mut w = writer(&tree, root, &converter, &reserved);

        let capture = w.begin_capture();
        w.defer(RenderTask::Expression(value));
        assert!(w.end_capture(capture).is_err());
    }
}
