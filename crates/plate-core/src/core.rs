use std::collections::BTreeMap;
use std::ops::Range;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ops::{Op, Path, Transaction};
use crate::plugin::{CommandError, PluginRegistry, QueryError};
use crate::tree::{
    clamp_to_char_boundary, element_at_path, inline_spans, inline_text, node_at_path,
    point_for_global_offset, point_global_offset,
};
use crate::value::DocumentValue;

pub type Attrs = BTreeMap<String, serde_json::Value>;
pub type ElementKind = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Document {
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "snake_case")]
pub enum Node {
    Element(ElementNode),
    Text(TextNode),
    Void(VoidNode),
}

impl Node {
    pub fn text(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(TextNode {
            text: text.into(),
            marks,
        })
    }

    pub fn element(kind: impl Into<String>, attrs: Attrs, children: Vec<Node>) -> Self {
        Node::Element(ElementNode {
            kind: kind.into(),
            attrs,
            children,
        })
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::element(
            "paragraph",
            Attrs::default(),
            vec![Self::text(text, Marks::default())],
        )
    }

    pub fn heading(level: u64, text: impl Into<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("level".to_string(), Value::from(level));
        Self::element("heading", attrs, vec![Self::text(text, Marks::default())])
    }

    pub fn divider() -> Self {
        Node::Void(VoidNode {
            kind: "divider".to_string(),
            attrs: Attrs::default(),
        })
    }

    pub fn image(src: impl Into<String>, alt: Option<String>) -> Self {
        let mut attrs = Attrs::default();
        attrs.insert("src".to_string(), Value::String(src.into()));
        if let Some(alt) = alt {
            attrs.insert("alt".to_string(), Value::String(alt));
        }
        Node::Void(VoidNode {
            kind: "image".to_string(),
            attrs,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
    #[serde(default)]
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoidNode {
    pub kind: ElementKind,
    #[serde(default)]
    pub attrs: Attrs,
}

impl VoidNode {
    /// Placeholder text an inline void contributes to its block's text.
    pub fn inline_text(&self) -> &'static str {
        "\u{fffc}"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    pub text: String,
    #[serde(default)]
    pub marks: Marks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Marks {
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    #[serde(default)]
    pub strikethrough: bool,
    #[serde(default)]
    pub code: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: Point,
    pub focus: Point,
}

impl Selection {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }
}

/// A position inside the flattened inline text of one text block.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockPoint {
    pub block: Path,
    pub offset: usize,
}

impl BlockPoint {
    pub fn new(block: Path, offset: usize) -> Self {
        Self { block, offset }
    }
}

/// A byte range inside the flattened inline text of one text block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockRange {
    pub block: Path,
    pub range: Range<usize>,
}

impl BlockRange {
    pub fn new(block: Path, range: Range<usize>) -> Self {
        Self { block, range }
    }

    pub fn start(&self) -> BlockPoint {
        BlockPoint::new(self.block.clone(), self.range.start)
    }

    pub fn end(&self) -> BlockPoint {
        BlockPoint::new(self.block.clone(), self.range.end)
    }

    pub fn contains(&self, point: &BlockPoint) -> bool {
        point.block == self.block && self.range.start <= point.offset && point.offset <= self.range.end
    }
}

#[derive(Debug, Clone)]
pub struct UndoRecord {
    pub inverse_ops: Vec<Op>,
    pub selection_before: Selection,
    pub selection_after: Selection,
}

/// Marker for [`Editor::rollback`]: everything applied after it can be discarded.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    doc: Document,
    selection: Selection,
    undo_total: usize,
}

#[derive(Debug, Default, Clone)]
pub struct EditorConfig {
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
}

impl EditorConfig {
    pub fn with_defaults(mut self) -> Self {
        if self.max_undo == 0 {
            self.max_undo = 200;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = 100;
        }
        self
    }
}

pub struct Editor {
    doc: Document,
    selection: Selection,
    selected_node: Option<Path>,
    registry: PluginRegistry,
    config: EditorConfig,
    undo_stack: Vec<UndoRecord>,
    redo_stack: Vec<UndoRecord>,
    undo_trimmed: usize,
}

impl Editor {
    pub fn new(doc: Document, selection: Selection, registry: PluginRegistry) -> Self {
        Self::with_config(doc, selection, registry, EditorConfig::default())
    }

    pub fn with_config(
        doc: Document,
        selection: Selection,
        registry: PluginRegistry,
        config: EditorConfig,
    ) -> Self {
        let mut editor = Self {
            doc,
            selection,
            selected_node: None,
            registry,
            config: config.with_defaults(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            undo_trimmed: 0,
        };
        editor.normalize_in_place();
        editor
    }

    pub fn with_richtext_plugins() -> Self {
        Self::from_document(
            Document {
                children: vec![Node::paragraph("")],
            },
            PluginRegistry::richtext(),
        )
    }

    /// Build an editor with the caret at the start of the first text leaf.
    pub fn from_document(doc: Document, registry: PluginRegistry) -> Self {
        let selection = Selection::collapsed(Point::new(vec![0, 0], 0));
        Self::new(doc, selection, registry)
    }

    pub fn doc(&self) -> &Document {
        &self.doc
    }

    pub fn value(&self) -> DocumentValue {
        DocumentValue::from_document(self.doc.clone())
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = selection;
        self.selected_node = None;
        self.normalize_selection_in_place();
    }

    /// Select a whole void node (an image, a divider) instead of a text range.
    pub fn select_node(&mut self, path: Path) -> Result<(), PathError> {
        match node_at_path(&self.doc, &path) {
            Some(Node::Void(_)) => {
                self.selected_node = Some(path);
                Ok(())
            }
            Some(_) => Err(PathError::NotVoid),
            None => Err(PathError::Missing(path)),
        }
    }

    pub fn selected_node(&self) -> Option<&Path> {
        self.selected_node.as_ref()
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        let Some(record) = self.undo_stack.pop() else {
            return false;
        };
        tracing::debug!(ops = record.inverse_ops.len(), "undo");
        let redo = self.replay(record, false);
        self.redo_stack.push(redo);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(record) = self.redo_stack.pop() else {
            return false;
        };
        tracing::debug!(ops = record.inverse_ops.len(), "redo");
        let undo = self.replay(record, true);
        self.undo_stack.push(undo);
        true
    }

    /// Apply a recorded op list and return the record that reverses it.
    fn replay(&mut self, record: UndoRecord, forward: bool) -> UndoRecord {
        let UndoRecord {
            inverse_ops,
            selection_before,
            selection_after,
        } = record;

        let mut reversed: Vec<Op> = Vec::with_capacity(inverse_ops.len());
        for op in inverse_ops {
            match self.apply_op(op) {
                Ok(inv) => reversed.push(inv),
                Err(err) => {
                    tracing::warn!(%err, "history replay stopped early");
                    break;
                }
            }
        }
        reversed.reverse();

        self.selection = if forward {
            selection_after.clone()
        } else {
            selection_before.clone()
        };
        self.selected_node = None;
        self.normalize_in_place();

        UndoRecord {
            inverse_ops: reversed,
            selection_before,
            selection_after,
        }
    }

    pub fn apply(&mut self, tx: Transaction) -> Result<(), ApplyError> {
        tracing::trace!(
            source = tx.meta.source.as_deref().unwrap_or("unknown"),
            ops = tx.ops.len(),
            "apply transaction"
        );
        let selection_before = self.selection.clone();

        let mut inverse_ops: Vec<Op> = Vec::new();
        for op in tx.ops {
            inverse_ops.push(self.apply_op(op)?);
        }

        if let Some(sel) = tx.selection_after {
            self.selection = sel;
        }
        self.selected_node = None;

        let anchor = self.block_point(&self.selection.anchor);
        let focus = self.block_point(&self.selection.focus);
        inverse_ops.append(&mut self.normalize_with_inverse_ops()?);
        inverse_ops.reverse();
        self.restore_block_points(anchor, focus);

        self.normalize_selection_in_place();

        self.undo_stack.push(UndoRecord {
            inverse_ops,
            selection_before,
            selection_after: self.selection.clone(),
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > self.config.max_undo {
            self.undo_stack.remove(0);
            self.undo_trimmed += 1;
        }

        Ok(())
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            doc: self.doc.clone(),
            selection: self.selection.clone(),
            undo_total: self.undo_trimmed + self.undo_stack.len(),
        }
    }

    /// Restore the document captured by `checkpoint` and drop the history
    /// recorded since.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        let Checkpoint {
            doc,
            selection,
            undo_total,
        } = checkpoint;
        let keep = undo_total.saturating_sub(self.undo_trimmed);
        tracing::debug!(
            dropped = self.undo_stack.len().saturating_sub(keep),
            "rollback to checkpoint"
        );
        self.undo_stack.truncate(keep);
        self.redo_stack.clear();
        self.doc = doc;
        self.selection = selection;
        self.selected_node = None;
    }

    pub fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        let Some(command) = self.registry.command(id) else {
            return Err(CommandError::new(format!("Unknown command: {id}")));
        };
        (command.handler)(self, args)
    }

    pub fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, QueryError> {
        let Some(query) = self.registry.query(id) else {
            return Err(QueryError::new(format!("Unknown query: {id}")));
        };
        (query.handler)(self, args)
    }

    pub fn run_query<T>(&self, id: &str, args: Option<Value>) -> Result<T, QueryError>
    where
        T: DeserializeOwned,
    {
        let value = self.run_query_json(id, args)?;
        serde_json::from_value(value)
            .map_err(|err| QueryError::new(format!("Failed to decode query result: {err}")))
    }

    /// Leaf merging and splitting move text between leaves without changing
    /// block offsets, so points are carried across normalization in block
    /// coordinates.
    fn restore_block_points(&mut self, anchor: Option<BlockPoint>, focus: Option<BlockPoint>) {
        let resolve = |doc: &Document, bp: Option<BlockPoint>| {
            let bp = bp?;
            let el = element_at_path(doc, &bp.block)?;
            el.children
                .iter()
                .any(|n| matches!(n, Node::Text(_)))
                .then(|| point_for_global_offset(&bp.block, &el.children, bp.offset))
        };
        if let Some(point) = resolve(&self.doc, anchor) {
            self.selection.anchor = point;
        }
        if let Some(point) = resolve(&self.doc, focus) {
            self.selection.focus = point;
        }
    }

    fn normalize_in_place(&mut self) {
        if let Err(err) = self.normalize_with_inverse_ops() {
            tracing::warn!(%err, "normalization failed");
        }
        self.normalize_selection_in_place();
    }

    fn normalize_selection_in_place(&mut self) {
        self.selection = self
            .registry
            .normalize_selection(&self.doc, &self.selection);
    }

    fn normalize_with_inverse_ops(&mut self) -> Result<Vec<Op>, ApplyError> {
        let mut inverse_ops: Vec<Op> = Vec::new();
        for _ in 0..self.config.max_normalize_iterations {
            let ops = self.registry.normalize(&self.doc);
            if ops.is_empty() {
                return Ok(inverse_ops);
            }
            for op in ops {
                inverse_ops.push(self.apply_op(op)?);
            }
        }
        Err(ApplyError::NormalizeDidNotConverge(
            self.config.max_normalize_iterations,
        ))
    }

    fn apply_op(&mut self, op: Op) -> Result<Op, ApplyError> {
        apply_op_to(&mut self.doc, &mut self.selection, op)
    }
}

/// Text-level queries and edits expressed in block coordinates.
impl Editor {
    pub fn block_point(&self, point: &Point) -> Option<BlockPoint> {
        let (child_ix, block) = point.path.split_last()?;
        let el = element_at_path(&self.doc, block)?;
        Some(BlockPoint::new(
            block.to_vec(),
            point_global_offset(&el.children, *child_ix, point.offset),
        ))
    }

    /// Selection bounds in document order.
    pub fn selection_bounds(&self) -> Option<(BlockPoint, BlockPoint)> {
        let anchor = self.block_point(&self.selection.anchor)?;
        let focus = self.block_point(&self.selection.focus)?;
        if anchor <= focus {
            Some((anchor, focus))
        } else {
            Some((focus, anchor))
        }
    }

    /// True when the text selection covers at least one position.
    pub fn is_expanded(&self) -> bool {
        self.selection_bounds()
            .is_some_and(|(start, end)| start != end)
    }

    /// The caret position, when the selection is a collapsed text selection.
    pub fn caret(&self) -> Option<BlockPoint> {
        if self.selected_node.is_some() {
            return None;
        }
        let (start, end) = self.selection_bounds()?;
        (start == end).then_some(start)
    }

    pub fn block_text(&self, block: &[usize]) -> Option<String> {
        element_at_path(&self.doc, block).map(|el| inline_text(&el.children))
    }

    pub fn text_in_range(&self, range: &BlockRange) -> Option<String> {
        let text = self.block_text(&range.block)?;
        text.get(range.range.clone()).map(str::to_string)
    }

    pub fn delete_range(&mut self, range: &BlockRange) -> Result<(), ApplyError> {
        let tx = self.delete_range_transaction(range)?;
        if tx.is_empty() {
            return Ok(());
        }
        self.apply(tx)
    }

    fn delete_range_transaction(&self, range: &BlockRange) -> Result<Transaction, ApplyError> {
        let el = element_at_path(&self.doc, &range.block)
            .ok_or_else(|| PathError::Missing(range.block.clone()))?;
        let (from, to) = (range.range.start, range.range.end);
        let spans = inline_spans(&el.children);

        let mut ops = Vec::new();
        for &(ix, start, end) in spans.iter().rev() {
            if to <= start || from >= end {
                continue;
            }
            let mut path = range.block.clone();
            path.push(ix);
            match &el.children[ix] {
                Node::Text(t) => {
                    let local_from = clamp_to_char_boundary(&t.text, from.saturating_sub(start));
                    let local_to = clamp_to_char_boundary(&t.text, to - start);
                    if local_from < local_to {
                        ops.push(Op::RemoveText {
                            path,
                            range: local_from..local_to,
                        });
                    }
                }
                Node::Void(_) if from <= start && end <= to => {
                    ops.push(Op::RemoveNode { path });
                }
                _ => {}
            }
        }

        let caret = spans
            .iter()
            .find(|&&(ix, start, end)| {
                matches!(el.children[ix], Node::Text(_)) && start <= from && from <= end
            })
            .map(|&(ix, start, _)| {
                let mut path = range.block.clone();
                path.push(ix);
                Point::new(path, from - start)
            });

        let tx = Transaction::new(ops).source("input:delete_range");
        Ok(match caret {
            Some(point) => tx.selection_after(Selection::collapsed(point)),
            None => tx,
        })
    }

    /// Type `text` at the caret, replacing a single-block selection first.
    pub fn insert_text(&mut self, text: &str) -> Result<(), ApplyError> {
        if text.is_empty() {
            return Ok(());
        }
        if let Some((start, end)) = self.selection_bounds() {
            if start != end && start.block == end.block {
                self.delete_range(&BlockRange::new(start.block.clone(), start.offset..end.offset))?;
            } else if start != end {
                self.collapse_to(&start);
            }
        }
        self.selected_node = None;

        let focus = self.selection.focus.clone();
        self.apply(
            Transaction::new(vec![Op::InsertText {
                path: focus.path,
                offset: focus.offset,
                text: text.to_string(),
            }])
            .source("input:insert_text"),
        )
    }

    /// Delete the selection, or the character before the caret. Returns
    /// `false` when there was nothing to delete inside the block.
    pub fn delete_backward(&mut self) -> Result<bool, ApplyError> {
        let Some((start, end)) = self.selection_bounds() else {
            return Ok(false);
        };
        if start != end {
            if start.block != end.block {
                return Ok(false);
            }
            self.delete_range(&BlockRange::new(start.block, start.offset..end.offset))?;
            return Ok(true);
        }
        if start.offset == 0 {
            return Ok(false);
        }
        let text = self.block_text(&start.block).unwrap_or_default();
        let prev_len = text
            .get(..start.offset)
            .and_then(|s| s.chars().next_back())
            .map(char::len_utf8)
            .unwrap_or(1);
        let from = start.offset.saturating_sub(prev_len);
        self.delete_range(&BlockRange::new(start.block, from..start.offset))?;
        Ok(true)
    }

    /// Collapse the selection onto a block position.
    pub fn collapse_to(&mut self, point: &BlockPoint) {
        let Some(el) = element_at_path(&self.doc, &point.block) else {
            return;
        };
        let target = point_for_global_offset(&point.block, &el.children, point.offset);
        self.set_selection(Selection::collapsed(target));
    }

    /// The leaf-level selection spanning `range`, if its block exists.
    pub fn selection_for(&self, range: &BlockRange) -> Option<Selection> {
        let el = element_at_path(&self.doc, &range.block)?;
        Some(Selection::new(
            point_for_global_offset(&range.block, &el.children, range.range.start),
            point_for_global_offset(&range.block, &el.children, range.range.end),
        ))
    }
}

fn apply_op_to(doc: &mut Document, selection: &mut Selection, op: Op) -> Result<Op, ApplyError> {
    match op {
        Op::InsertText { path, offset, text } => {
            let text_node = node_text_mut(doc, &path)?;
            let offset = clamp_to_char_boundary(&text_node.text, offset);
            text_node.text.insert_str(offset, &text);
            shift_points_after_insert(selection, &path, offset, text.len());
            Ok(Op::RemoveText {
                path,
                range: offset..offset + text.len(),
            })
        }
        Op::RemoveText { path, range } => {
            let text_node = node_text_mut(doc, &path)?;
            let start = clamp_to_char_boundary(&text_node.text, range.start);
            let end = clamp_to_char_boundary(&text_node.text, range.end);
            if start >= end {
                return Ok(Op::InsertText {
                    path,
                    offset: start,
                    text: String::new(),
                });
            }
            let removed: String = text_node.text.drain(start..end).collect();
            shift_points_after_remove(selection, &path, start..end);
            Ok(Op::InsertText {
                path,
                offset: start,
                text: removed,
            })
        }
        Op::InsertNode { path, node } => {
            siblings_mut(doc, &path, false)?.insert(last_index(&path), node);
            shift_points_after_node_insert(selection, &path);
            Ok(Op::RemoveNode { path })
        }
        Op::RemoveNode { path } => {
            let removed = siblings_mut(doc, &path, true)?.remove(last_index(&path));
            remap_points_after_node_remove(selection, &path);
            Ok(Op::InsertNode {
                path,
                node: removed,
            })
        }
        Op::SetNodeAttrs { path, patch } => {
            let old = match node_mut(doc, &path)? {
                Node::Element(el) => patch.apply_to(&mut el.attrs),
                Node::Void(v) => patch.apply_to(&mut v.attrs),
                Node::Text(_) => return Err(PathError::NoAttrs.into()),
            };
            Ok(Op::SetNodeAttrs { path, patch: old })
        }
        Op::SetTextMarks { path, marks } => {
            let text_node = node_text_mut(doc, &path)?;
            let old = std::mem::replace(&mut text_node.marks, marks);
            Ok(Op::SetTextMarks { path, marks: old })
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    InvalidPath(#[from] PathError),
    #[error("normalization did not converge after {0} iterations")]
    NormalizeDidNotConverge(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("no node at path {0:?}")]
    Missing(Path),
    #[error("path out of bounds at depth {depth}: {index} >= {len}")]
    OutOfBounds {
        depth: usize,
        index: usize,
        len: usize,
    },
    #[error("node at depth {0} is not a container")]
    NotContainer(usize),
    #[error("expected a text node")]
    NotText,
    #[error("expected a void node")]
    NotVoid,
    #[error("text nodes have no attrs")]
    NoAttrs,
}

fn last_index(path: &[usize]) -> usize {
    path.last().copied().unwrap_or(0)
}

fn shift_points_after_insert(selection: &mut Selection, path: &[usize], offset: usize, len: usize) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path == path && point.offset >= offset {
            point.offset += len;
        }
    }
}

fn shift_points_after_remove(selection: &mut Selection, path: &[usize], range: Range<usize>) {
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path != path || point.offset <= range.start {
            continue;
        }
        point.offset = if point.offset >= range.end {
            point.offset - (range.end - range.start)
        } else {
            range.start
        };
    }
}

fn shift_points_after_node_insert(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent)) = path.split_last() else {
        return;
    };
    let depth = parent.len();
    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() > depth && point.path.starts_with(parent) && point.path[depth] >= index {
            point.path[depth] += 1;
        }
    }
}

fn remap_points_after_node_remove(selection: &mut Selection, path: &[usize]) {
    let Some((&index, parent)) = path.split_last() else {
        return;
    };
    let depth = parent.len();

    for point in [&mut selection.anchor, &mut selection.focus] {
        if point.path.len() <= depth || !point.path.starts_with(parent) {
            continue;
        }
        let ix = point.path[depth];
        if ix > index {
            point.path[depth] = ix - 1;
            continue;
        }
        if ix < index {
            continue;
        }

        point.path.truncate(depth + 1);
        point.path[depth] = index.saturating_sub(1);
        point.offset = 0;
    }
}

fn node_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut Node, PathError> {
    let (first, rest) = path.split_first().ok_or(PathError::Empty)?;
    let len = doc.children.len();
    let mut node = doc.children.get_mut(*first).ok_or(PathError::OutOfBounds {
        depth: 0,
        index: *first,
        len,
    })?;
    for (depth, &ix) in rest.iter().enumerate() {
        node = match node {
            Node::Element(el) => {
                let len = el.children.len();
                el.children.get_mut(ix).ok_or(PathError::OutOfBounds {
                    depth: depth + 1,
                    index: ix,
                    len,
                })?
            }
            Node::Void(_) | Node::Text(_) => return Err(PathError::NotContainer(depth)),
        };
    }
    Ok(node)
}

fn node_text_mut<'a>(doc: &'a mut Document, path: &[usize]) -> Result<&'a mut TextNode, PathError> {
    match node_mut(doc, path)? {
        Node::Text(t) => Ok(t),
        _ => Err(PathError::NotText),
    }
}

/// The sibling list containing `path`, bounds-checked for insert or remove.
fn siblings_mut<'a>(
    doc: &'a mut Document,
    path: &[usize],
    removing: bool,
) -> Result<&'a mut Vec<Node>, PathError> {
    let (&index, parent) = path.split_last().ok_or(PathError::Empty)?;
    let children = if parent.is_empty() {
        &mut doc.children
    } else {
        match node_mut(doc, parent)? {
            Node::Element(el) => &mut el.children,
            Node::Void(_) | Node::Text(_) => return Err(PathError::NotContainer(parent.len() - 1)),
        }
    };
    let len = children.len();
    if (removing && index >= len) || (!removing && index > len) {
        return Err(PathError::OutOfBounds {
            depth: parent.len(),
            index,
            len,
        });
    }
    Ok(children)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttrPatch {
    #[serde(default)]
    pub set: Attrs,
    #[serde(default)]
    pub remove: Vec<String>,
}

impl AttrPatch {
    pub fn set(key: impl Into<String>, value: Value) -> Self {
        let mut set = Attrs::default();
        set.insert(key.into(), value);
        Self {
            set,
            remove: Vec::new(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self {
            set: Attrs::default(),
            remove: vec![key.into()],
        }
    }

    /// Apply to `attrs`, returning the patch that undoes it.
    fn apply_to(&self, attrs: &mut Attrs) -> AttrPatch {
        let mut inverse = AttrPatch::default();
        for (k, v) in &self.set {
            match attrs.insert(k.clone(), v.clone()) {
                Some(prev) => {
                    inverse.set.insert(k.clone(), prev);
                }
                None => inverse.remove.push(k.clone()),
            }
        }
        for key in &self.remove {
            if let Some(prev) = attrs.remove(key) {
                inverse.set.insert(key.clone(), prev);
            }
        }
        inverse
    }
}
