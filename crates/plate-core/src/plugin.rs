use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Document, Editor, Marks, Node, Point, Selection, TextNode};
use crate::ops::{Op, Transaction};
use crate::tree::{child_path, element_at_path, inline_text, node_at_path, text_blocks_in_order};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct QueryError {
    message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate node spec kind: {0}")]
    DuplicateNodeKind(String),
    #[error("duplicate command id: {0}")]
    DuplicateCommand(String),
    #[error("duplicate query id: {0}")]
    DuplicateQuery(String),
}

pub type CommandHandler =
    Arc<dyn Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync>;
pub type QueryHandler = Arc<dyn Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync>;

#[derive(Clone)]
pub struct CommandSpec {
    pub id: String,
    pub label: String,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub args_example: Option<Value>,
    pub handler: CommandHandler,
}

impl CommandSpec {
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        handler: impl Fn(&mut Editor, Option<Value>) -> Result<(), CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            description: None,
            keywords: Vec::new(),
            args_example: None,
            handler: Arc::new(handler),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    pub fn args_example(mut self, args_example: Value) -> Self {
        self.args_example = Some(args_example);
        self
    }
}

#[derive(Clone)]
pub struct QuerySpec {
    pub id: String,
    pub handler: QueryHandler,
}

impl QuerySpec {
    pub fn new(
        id: impl Into<String>,
        handler: impl Fn(&Editor, Option<Value>) -> Result<Value, QueryError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            handler: Arc::new(handler),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    Any,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub kind: String,
    pub role: NodeRole,
    pub is_void: bool,
    pub children: ChildConstraint,
}

impl NodeSpec {
    pub fn text_block(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::InlineOnly,
        }
    }

    pub fn void_block(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            role: NodeRole::Block,
            is_void: true,
            children: ChildConstraint::None,
        }
    }
}

pub trait NormalizePass: Send + Sync {
    fn id(&self) -> &'static str;
    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op>;
}

pub trait PlatePlugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        Vec::new()
    }
    fn commands(&self) -> Vec<CommandSpec> {
        Vec::new()
    }
    fn queries(&self) -> Vec<QuerySpec> {
        Vec::new()
    }
}

#[derive(Default)]
pub struct PluginRegistry {
    node_specs: HashMap<String, NodeSpec>,
    normalize_passes: Vec<Box<dyn NormalizePass>>,
    commands: HashMap<String, CommandSpec>,
    queries: HashMap<String, QuerySpec>,
}

impl PluginRegistry {
    pub fn new(plugins: impl IntoIterator<Item = Box<dyn PlatePlugin>>) -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        for plugin in plugins {
            registry.register_plugin(plugin)?;
        }
        Ok(registry)
    }

    pub fn core() -> Self {
        Self::builtin(core_plugins())
    }

    /// Paragraphs plus marks, headings, lists, to-dos, quotes, code blocks,
    /// dividers and images.
    pub fn richtext() -> Self {
        Self::builtin(richtext_plugins())
    }

    fn builtin(plugins: Vec<Box<dyn PlatePlugin>>) -> Self {
        let mut registry = Self::default();
        for plugin in plugins {
            let id = plugin.id();
            if let Err(err) = registry.register_plugin(plugin) {
                tracing::error!(plugin = id, %err, "builtin plugin rejected");
            }
        }
        registry
    }

    pub fn register_plugin(&mut self, plugin: Box<dyn PlatePlugin>) -> Result<(), RegistryError> {
        for spec in plugin.node_specs() {
            if self.node_specs.contains_key(&spec.kind) {
                return Err(RegistryError::DuplicateNodeKind(spec.kind));
            }
            self.node_specs.insert(spec.kind.clone(), spec);
        }

        self.normalize_passes.extend(plugin.normalize_passes());

        for cmd in plugin.commands() {
            if self.commands.contains_key(&cmd.id) {
                return Err(RegistryError::DuplicateCommand(cmd.id));
            }
            self.commands.insert(cmd.id.clone(), cmd);
        }

        for query in plugin.queries() {
            if self.queries.contains_key(&query.id) {
                return Err(RegistryError::DuplicateQuery(query.id));
            }
            self.queries.insert(query.id.clone(), query);
        }

        tracing::trace!(plugin = plugin.id(), "registered plugin");
        Ok(())
    }

    pub fn node_specs(&self) -> &HashMap<String, NodeSpec> {
        &self.node_specs
    }

    pub fn normalize_passes(&self) -> &[Box<dyn NormalizePass>] {
        &self.normalize_passes
    }

    pub fn commands(&self) -> &HashMap<String, CommandSpec> {
        &self.commands
    }

    pub fn command(&self, id: &str) -> Option<CommandSpec> {
        self.commands.get(id).cloned()
    }

    pub fn queries(&self) -> &HashMap<String, QuerySpec> {
        &self.queries
    }

    pub fn query(&self, id: &str) -> Option<QuerySpec> {
        self.queries.get(id).cloned()
    }

    pub fn is_known_kind(&self, kind: &str) -> bool {
        self.node_specs.contains_key(kind)
    }

    pub fn normalize(&self, doc: &Document) -> Vec<Op> {
        let mut ops: Vec<Op> = Vec::new();
        for pass in &self.normalize_passes {
            let pass_ops = pass.run(doc, self);
            if !pass_ops.is_empty() {
                tracing::trace!(pass = pass.id(), ops = pass_ops.len(), "normalize");
                ops.extend(pass_ops);
                // Later passes must see the document these ops produce.
                break;
            }
        }
        ops
    }

    pub fn normalize_selection(&self, doc: &Document, selection: &Selection) -> Selection {
        let fallback = first_text_point(doc).unwrap_or(Point {
            path: vec![0],
            offset: 0,
        });

        let anchor = normalize_point_to_existing_text(doc, &selection.anchor).unwrap_or_else(|| {
            normalize_point_to_existing_text(doc, &selection.focus).unwrap_or_else(|| fallback.clone())
        });
        let focus =
            normalize_point_to_existing_text(doc, &selection.focus).unwrap_or_else(|| anchor.clone());

        Selection { anchor, focus }
    }
}

fn core_plugins() -> Vec<Box<dyn PlatePlugin>> {
    vec![
        Box::new(CoreParagraphPlugin),
        Box::new(CoreDividerPlugin),
        Box::new(CoreNormalizePlugin),
        Box::new(CoreCommandsPlugin),
    ]
}

pub(crate) fn richtext_plugins() -> Vec<Box<dyn PlatePlugin>> {
    let mut plugins = core_plugins();
    plugins.push(Box::new(crate::marks::MarksPlugin));
    plugins.extend(crate::blocks::block_plugins());
    plugins
}

fn first_text_point(doc: &Document) -> Option<Point> {
    first_text_under(&doc.children, &mut Vec::new())
}

fn first_text_under(children: &[Node], path: &mut Vec<usize>) -> Option<Point> {
    for (ix, node) in children.iter().enumerate() {
        path.push(ix);
        let found = match node {
            Node::Text(_) => Some(Point::new(path.clone(), 0)),
            Node::Element(el) => first_text_under(&el.children, path),
            Node::Void(_) => None,
        };
        path.pop();
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Resolve `point` to the nearest existing text leaf, clamping indices and the
/// offset along the way.
fn normalize_point_to_existing_text(doc: &Document, point: &Point) -> Option<Point> {
    if point.path.is_empty() || doc.children.is_empty() {
        return None;
    }

    let mut resolved_path: Vec<usize> = Vec::new();
    let mut children: &[Node] = &doc.children;

    for &wanted in &point.path {
        if children.is_empty() {
            break;
        }
        let ix = wanted.min(children.len() - 1);
        resolved_path.push(ix);
        match &children[ix] {
            Node::Text(t) => {
                let offset = crate::tree::clamp_to_char_boundary(&t.text, point.offset);
                return Some(Point::new(resolved_path, offset));
            }
            Node::Element(el) => children = &el.children,
            Node::Void(_) => break,
        }
    }

    match node_at_path(doc, &resolved_path)? {
        Node::Text(t) => Some(Point::new(
            resolved_path,
            crate::tree::clamp_to_char_boundary(&t.text, point.offset),
        )),
        Node::Element(el) => first_text_under(&el.children, &mut resolved_path.clone()),
        Node::Void(_) => {
            // Step to a text leaf next to the void, preferring the one before it.
            let (&ix, parent) = resolved_path.split_last()?;
            let siblings = crate::tree::children_at_path(doc, parent)?;
            let before = siblings[..ix].iter().enumerate().rev().find_map(|(i, n)| match n {
                Node::Text(t) => Some(Point::new(child_path(parent, i), t.text.len())),
                _ => None,
            });
            before.or_else(|| {
                siblings
                    .iter()
                    .enumerate()
                    .skip(ix + 1)
                    .find_map(|(i, n)| matches!(n, Node::Text(_)).then(|| Point::new(child_path(parent, i), 0)))
            })
        }
    }
}

/// Apply a command transaction, treating an empty transaction as a no-op.
pub(crate) fn commit(editor: &mut Editor, tx: Result<Transaction, String>, what: &str) -> Result<(), CommandError> {
    let tx = tx.map_err(CommandError::new)?;
    if tx.is_empty() {
        return Ok(());
    }
    editor
        .apply(tx)
        .map_err(|e| CommandError::new(format!("Failed to {what}: {e}")))
}

/// Insert a void block after the focused block, followed by an empty paragraph
/// that receives the caret. An empty focused paragraph is replaced.
pub(crate) fn insert_void_block(editor: &Editor, node: Node, source: &str) -> Result<Transaction, String> {
    let focus = &editor.selection().focus;
    let block_path = focus
        .path
        .split_last()
        .map(|(_, p)| p)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| "No active block".to_string())?;
    let (&block_ix, parent) = block_path
        .split_last()
        .ok_or_else(|| "No active block".to_string())?;

    let replace_empty = element_at_path(editor.doc(), block_path)
        .is_some_and(|el| el.kind == "paragraph" && inline_text(&el.children).is_empty());

    let mut ops = Vec::new();
    let insert_at = if replace_empty {
        ops.push(Op::RemoveNode {
            path: block_path.to_vec(),
        });
        block_ix
    } else {
        block_ix + 1
    };

    let paragraph_path = child_path(parent, insert_at + 1);
    ops.push(Op::InsertNode {
        path: child_path(parent, insert_at),
        node,
    });
    ops.push(Op::InsertNode {
        path: paragraph_path.clone(),
        node: Node::paragraph(""),
    });

    Ok(Transaction::new(ops)
        .selection_after(Selection::collapsed(Point::new(child_path(&paragraph_path, 0), 0)))
        .source(source))
}

struct CoreParagraphPlugin;

impl PlatePlugin for CoreParagraphPlugin {
    fn id(&self) -> &'static str {
        "core.paragraph"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block("paragraph")]
    }
}

struct CoreDividerPlugin;

impl PlatePlugin for CoreDividerPlugin {
    fn id(&self) -> &'static str {
        "core.divider"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::void_block("divider")]
    }
}

struct CoreNormalizePlugin;

impl PlatePlugin for CoreNormalizePlugin {
    fn id(&self) -> &'static str {
        "core.normalize"
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![
            Box::new(EnsureNonEmptyDocument),
            Box::new(EnsureTextBlockHasTextLeaf),
            Box::new(MergeAdjacentTextLeaves),
        ]
    }
}

struct EnsureNonEmptyDocument;

impl NormalizePass for EnsureNonEmptyDocument {
    fn id(&self) -> &'static str {
        "core.ensure_non_empty_document"
    }

    fn run(&self, doc: &Document, _registry: &PluginRegistry) -> Vec<Op> {
        if doc.children.is_empty() {
            return vec![Op::InsertNode {
                path: vec![0],
                node: Node::paragraph(""),
            }];
        }
        Vec::new()
    }
}

struct EnsureTextBlockHasTextLeaf;

impl NormalizePass for EnsureTextBlockHasTextLeaf {
    fn id(&self) -> &'static str {
        "core.ensure_text_block_has_text_leaf"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        text_blocks_in_order(doc, registry)
            .into_iter()
            .filter(|block| !block.el.children.iter().any(|n| matches!(n, Node::Text(_))))
            .map(|block| Op::InsertNode {
                path: child_path(&block.path, 0),
                node: Node::Text(TextNode {
                    text: String::new(),
                    marks: Marks::default(),
                }),
            })
            .collect()
    }
}

struct MergeAdjacentTextLeaves;

impl NormalizePass for MergeAdjacentTextLeaves {
    fn id(&self) -> &'static str {
        "core.merge_adjacent_text_leaves"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        let mut ops = Vec::new();

        for block in text_blocks_in_order(doc, registry) {
            let children = &block.el.children;
            let mut ix = children.len();
            while ix > 0 {
                ix -= 1;
                let Node::Text(right) = &children[ix] else {
                    continue;
                };

                let mut start = ix;
                while start > 0 {
                    let Some(Node::Text(left)) = children.get(start - 1) else {
                        break;
                    };
                    if left.marks != right.marks {
                        break;
                    }
                    start -= 1;
                }
                if start == ix {
                    continue;
                }

                let Some(Node::Text(first)) = children.get(start) else {
                    continue;
                };
                let appended: String = children[start + 1..=ix]
                    .iter()
                    .filter_map(|n| match n {
                        Node::Text(t) => Some(t.text.as_str()),
                        _ => None,
                    })
                    .collect();

                if !appended.is_empty() {
                    ops.push(Op::InsertText {
                        path: child_path(&block.path, start),
                        offset: first.text.len(),
                        text: appended,
                    });
                }
                for remove_ix in (start + 1..=ix).rev() {
                    ops.push(Op::RemoveNode {
                        path: child_path(&block.path, remove_ix),
                    });
                }

                ix = start;
            }
        }

        ops
    }
}

struct CoreCommandsPlugin;

impl PlatePlugin for CoreCommandsPlugin {
    fn id(&self) -> &'static str {
        "core.commands"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("core.insert_divider", "Insert divider", |editor, _args| {
                let tx = insert_void_block(editor, Node::divider(), "command:core.insert_divider");
                commit(editor, tx, "insert divider")
            })
            .description("Insert a divider block and a trailing paragraph.")
            .keywords(["divider", "separator", "hr", "horizontal rule"]),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_plugins_register_without_conflicts() {
        assert!(PluginRegistry::new(richtext_plugins()).is_ok());
    }

    #[test]
    fn duplicate_command_ids_are_rejected() {
        struct Twice;
        impl PlatePlugin for Twice {
            fn id(&self) -> &'static str {
                "twice"
            }
            fn commands(&self) -> Vec<CommandSpec> {
                vec![
                    CommandSpec::new("x.run", "Run", |_, _| Ok(())),
                    CommandSpec::new("x.run", "Run again", |_, _| Ok(())),
                ]
            }
        }

        let plugins: Vec<Box<dyn PlatePlugin>> = vec![Box::new(Twice)];
        assert_eq!(
            PluginRegistry::new(plugins).err(),
            Some(RegistryError::DuplicateCommand("x.run".to_string()))
        );
    }

    #[test]
    fn selection_inside_a_void_moves_to_neighbouring_text() {
        let doc = Document {
            children: vec![Node::element(
                "paragraph",
                Default::default(),
                vec![
                    Node::text("ab", Marks::default()),
                    Node::image("x.png", None),
                    Node::text("cd", Marks::default()),
                ],
            )],
        };
        let point = normalize_point_to_existing_text(&doc, &Point::new(vec![0, 1], 0));
        assert_eq!(point, Some(Point::new(vec![0, 0], 2)));
    }
}
