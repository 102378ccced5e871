//! Block types: headings, lists, to-dos, quotes, code blocks and images.
//!
//! Changing a block's type replaces the element in place (remove + insert at
//! the same path) with the same children, so text points stay valid.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{AttrPatch, Attrs, Document, Editor, ElementNode, Node, Point, Selection};
use crate::ops::{Op, Path, Transaction};
use crate::plugin::{
    ChildConstraint, CommandError, CommandSpec, NodeRole, NodeSpec, NormalizePass, PlatePlugin,
    PluginRegistry, QueryError, QuerySpec, commit, insert_void_block,
};
use crate::tree::{
    child_path, children_at_path, element_at_path, node_at_path, ordered_selection_points,
    selected_block_ranges, text_blocks_in_order, walk_block_containers,
};

/// Attributes that belong to a block type and are dropped on conversion.
const TYPE_ATTRS: [&str; 5] = ["level", "list_type", "list_index", "checked", "language"];

/// Type information about the block holding the focus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveBlock {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    #[serde(default)]
    pub in_blockquote: bool,
}

pub(crate) fn block_plugins() -> Vec<Box<dyn PlatePlugin>> {
    vec![
        Box::new(BlockTypePlugin),
        Box::new(HeadingPlugin),
        Box::new(CodeBlockPlugin),
        Box::new(BlockquotePlugin),
        Box::new(TodoPlugin),
        Box::new(ListPlugin),
        Box::new(ImagePlugin),
    ]
}

fn focus_block_path(editor: &Editor) -> Option<&[usize]> {
    editor
        .selection()
        .focus
        .path
        .split_last()
        .map(|(_, p)| p)
        .filter(|p| !p.is_empty())
}

fn focus_block(editor: &Editor) -> Option<&ElementNode> {
    element_at_path(editor.doc(), focus_block_path(editor)?)
}

fn retagged(el: &ElementNode, kind: &str, attrs: &[(&str, Value)]) -> ElementNode {
    let mut next_attrs = el.attrs.clone();
    for key in TYPE_ATTRS {
        next_attrs.remove(key);
    }
    for (key, value) in attrs {
        next_attrs.insert((*key).to_string(), value.clone());
    }
    ElementNode {
        kind: kind.to_string(),
        attrs: next_attrs,
        children: el.children.clone(),
    }
}

/// Convert every selected text block with `retag`, skipping blocks it leaves
/// unchanged.
fn retag_selected(
    editor: &Editor,
    source: &str,
    retag: impl Fn(&ElementNode) -> Option<ElementNode>,
) -> Result<Transaction, String> {
    let ranges = selected_block_ranges(editor.doc(), editor.registry(), editor.selection())?;

    let mut ops = Vec::new();
    for (block, _) in ranges {
        let Some(next) = retag(block.el) else {
            continue;
        };
        if &next == block.el {
            continue;
        }
        ops.extend(Op::replace_node(block.path, Node::Element(next)));
    }

    Ok(Transaction::new(ops)
        .selection_after(editor.selection().clone())
        .source(source))
}

fn all_selected(editor: &Editor, pred: impl Fn(&ElementNode) -> bool) -> bool {
    selected_block_ranges(editor.doc(), editor.registry(), editor.selection())
        .is_ok_and(|ranges| !ranges.is_empty() && ranges.iter().all(|(b, _)| pred(b.el)))
}

fn heading_level(el: &ElementNode) -> Option<u64> {
    (el.kind == "heading").then(|| {
        el.attrs
            .get("level")
            .and_then(Value::as_u64)
            .unwrap_or(1)
            .clamp(1, 6)
    })
}

fn list_type(el: &ElementNode) -> Option<&str> {
    if el.kind != "list_item" {
        return None;
    }
    el.attrs.get("list_type").and_then(Value::as_str)
}

fn active_block(editor: &Editor) -> Value {
    let Some(el) = focus_block(editor) else {
        return Value::Null;
    };
    let block = ActiveBlock {
        kind: el.kind.clone(),
        level: heading_level(el),
        list_type: list_type(el).map(str::to_string),
        checked: (el.kind == "todo_item")
            .then(|| el.attrs.get("checked").and_then(Value::as_bool).unwrap_or(false)),
        in_blockquote: is_in_blockquote(editor),
    };
    serde_json::to_value(block).unwrap_or(Value::Null)
}

struct BlockTypePlugin;

impl PlatePlugin for BlockTypePlugin {
    fn id(&self) -> &'static str {
        "block"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.set_paragraph", "Set paragraph", |editor, _args| {
                let tx = retag_selected(editor, "command:block.set_paragraph", |el| {
                    Some(retagged(el, "paragraph", &[]))
                });
                commit(editor, tx, "set paragraph")
            })
            .description("Convert the selected text blocks into plain paragraphs.")
            .keywords(["paragraph", "text", "plain"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("block.active", |editor, _args| Ok(active_block(editor)))]
    }
}

struct HeadingPlugin;

impl PlatePlugin for HeadingPlugin {
    fn id(&self) -> &'static str {
        "heading"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block("heading")]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeHeadingLevels)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("block.set_heading", "Set heading", |editor, args| {
                let level = args
                    .as_ref()
                    .and_then(|v| v.get("level"))
                    .and_then(Value::as_u64)
                    .unwrap_or(1)
                    .clamp(1, 6);
                let tx = retag_selected(editor, "command:block.set_heading", |el| {
                    Some(retagged(el, "heading", &[("level", Value::from(level))]))
                });
                commit(editor, tx, "set heading")
            })
            .description("Convert the selected text blocks into a heading.")
            .keywords(["heading", "title", "h1", "h2", "h3", "h4", "h5", "h6"])
            .args_example(serde_json::json!({ "level": 2 })),
            CommandSpec::new("block.unset_heading", "Unset heading", |editor, _args| {
                let tx = retag_selected(editor, "command:block.unset_heading", |el| {
                    (el.kind == "heading").then(|| retagged(el, "paragraph", &[]))
                });
                commit(editor, tx, "unset heading")
            })
            .description("Convert headings back to paragraphs.")
            .keywords(["heading", "paragraph", "title", "reset"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("block.heading_level", |editor, _args| {
            Ok(focus_block(editor)
                .and_then(heading_level)
                .map(Value::from)
                .unwrap_or(Value::Null))
        })]
    }
}

struct NormalizeHeadingLevels;

impl NormalizePass for NormalizeHeadingLevels {
    fn id(&self) -> &'static str {
        "heading.normalize_levels"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        text_blocks_in_order(doc, registry)
            .into_iter()
            .filter_map(|block| {
                let level = heading_level(block.el)?;
                let current = block.el.attrs.get("level").and_then(Value::as_u64);
                (current != Some(level)).then(|| Op::SetNodeAttrs {
                    path: block.path,
                    patch: AttrPatch::set("level", Value::from(level)),
                })
            })
            .collect()
    }
}

struct CodeBlockPlugin;

impl PlatePlugin for CodeBlockPlugin {
    fn id(&self) -> &'static str {
        "code_block"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block("code_block")]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("code_block.toggle", "Toggle code block", |editor, _args| {
                let unset = all_selected(editor, |el| el.kind == "code_block");
                let tx = retag_selected(editor, "command:code_block.toggle", |el| {
                    Some(if unset {
                        retagged(el, "paragraph", &[])
                    } else {
                        retagged(el, "code_block", &[])
                    })
                });
                commit(editor, tx, "toggle code block")
            })
            .description("Toggle code block for the selected text blocks.")
            .keywords(["code block", "code", "pre", "monospace"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("code_block.is_active", |editor, _args| {
            Ok(Value::Bool(
                focus_block(editor).is_some_and(|el| el.kind == "code_block"),
            ))
        })]
    }
}

struct BlockquotePlugin;

impl PlatePlugin for BlockquotePlugin {
    fn id(&self) -> &'static str {
        "blockquote"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec {
            kind: "blockquote".to_string(),
            role: NodeRole::Block,
            is_void: false,
            children: ChildConstraint::BlockOnly,
        }]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeBlockquoteChildren)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new(
                "blockquote.wrap_selection",
                "Wrap selection in blockquote",
                |editor, _args| {
                    let tx = wrap_selection_in_blockquote(editor);
                    commit(editor, tx, "wrap blockquote")
                },
            )
            .description("Wrap selected blocks in a blockquote container.")
            .keywords(["blockquote", "quote", "wrap"]),
            CommandSpec::new("blockquote.unwrap", "Unwrap blockquote", |editor, _args| {
                let tx = unwrap_nearest_blockquote(editor);
                commit(editor, tx, "unwrap blockquote")
            })
            .description("Unwrap the nearest blockquote container.")
            .keywords(["blockquote", "quote", "unwrap"]),
            CommandSpec::new("blockquote.toggle", "Toggle blockquote", |editor, _args| {
                let tx = if is_in_blockquote(editor) {
                    unwrap_nearest_blockquote(editor)
                } else {
                    wrap_selection_in_blockquote(editor)
                };
                commit(editor, tx, "toggle blockquote")
            })
            .description("Wrap the selection in a blockquote, or unwrap the enclosing one.")
            .keywords(["blockquote", "quote"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![QuerySpec::new("blockquote.is_active", |editor, _args| {
            Ok(Value::Bool(is_in_blockquote(editor)))
        })]
    }
}

struct NormalizeBlockquoteChildren;

impl NormalizePass for NormalizeBlockquoteChildren {
    fn id(&self) -> &'static str {
        "blockquote.ensure_non_empty"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        walk_block_containers(doc, registry, &mut |children, parent, ops| {
            for (ix, node) in children.iter().enumerate() {
                if let Node::Element(el) = node {
                    if el.kind == "blockquote" && el.children.is_empty() {
                        ops.push(Op::InsertNode {
                            path: child_path(&child_path(parent, ix), 0),
                            node: Node::paragraph(""),
                        });
                    }
                }
            }
        })
    }
}

fn is_in_blockquote(editor: &Editor) -> bool {
    nearest_blockquote_path(editor.doc(), &editor.selection().focus.path).is_some()
}

fn nearest_blockquote_path(doc: &Document, point_path: &[usize]) -> Option<Path> {
    let mut path: Path = point_path.to_vec();
    while !path.is_empty() {
        if let Some(Node::Element(el)) = node_at_path(doc, &path) {
            if el.kind == "blockquote" {
                return Some(path);
            }
        }
        path.pop();
    }
    None
}

fn wrap_selection_in_blockquote(editor: &Editor) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    let (start, end) = ordered_selection_points(&sel);
    let block_of = |point: &Point| -> Result<(usize, Path), String> {
        let block = point
            .path
            .split_last()
            .map(|(_, p)| p)
            .ok_or_else(|| "Selection is not in a text block".to_string())?;
        let (ix, parent) = block
            .split_last()
            .ok_or_else(|| "Selection is not in a block node".to_string())?;
        Ok((*ix, parent.to_vec()))
    };
    let (start_ix, parent) = block_of(&start)?;
    let (end_ix, end_parent) = block_of(&end)?;
    if parent != end_parent {
        return Err("Selection must be within a single block container".into());
    }
    let (start_ix, end_ix) = (start_ix.min(end_ix), start_ix.max(end_ix));

    let siblings =
        children_at_path(editor.doc(), &parent).ok_or("Selection parent is not a container")?;
    if end_ix >= siblings.len() {
        return Err("Selection block range is out of bounds".into());
    }

    let quote = Node::element(
        "blockquote",
        Attrs::default(),
        siblings[start_ix..=end_ix].to_vec(),
    );

    let mut ops: Vec<Op> = (start_ix..=end_ix)
        .rev()
        .map(|ix| Op::RemoveNode {
            path: child_path(&parent, ix),
        })
        .collect();
    ops.push(Op::InsertNode {
        path: child_path(&parent, start_ix),
        node: quote,
    });

    let depth = parent.len();
    let remap = |point: &Point| -> Point {
        if !point.path.starts_with(&parent) || point.path.len() < depth + 2 {
            return point.clone();
        }
        let block_ix = point.path[depth];
        if block_ix < start_ix || block_ix > end_ix {
            return point.clone();
        }
        let mut path = child_path(&parent, start_ix);
        path.push(block_ix - start_ix);
        path.extend_from_slice(&point.path[depth + 1..]);
        Point::new(path, point.offset)
    };

    Ok(Transaction::new(ops)
        .selection_after(Selection::new(remap(&sel.anchor), remap(&sel.focus)))
        .source("command:blockquote.wrap_selection"))
}

fn unwrap_nearest_blockquote(editor: &Editor) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    let Some(quote_path) = nearest_blockquote_path(editor.doc(), &sel.focus.path) else {
        return Ok(Transaction::new(Vec::new()).source("command:blockquote.unwrap"));
    };
    let (&quote_ix, parent) = quote_path
        .split_last()
        .ok_or_else(|| "Invalid blockquote path".to_string())?;
    let quote = element_at_path(editor.doc(), &quote_path).ok_or("Blockquote node not found")?;

    let mut ops = vec![Op::RemoveNode {
        path: quote_path.clone(),
    }];
    for (i, node) in quote.children.iter().cloned().enumerate() {
        ops.push(Op::InsertNode {
            path: child_path(parent, quote_ix + i),
            node,
        });
    }

    let remap = |point: &Point| -> Point {
        if point.path.len() <= quote_path.len() || !point.path.starts_with(&quote_path) {
            return point.clone();
        }
        let inner_ix = point.path[quote_path.len()];
        let mut path = child_path(parent, quote_ix + inner_ix);
        path.extend_from_slice(&point.path[quote_path.len() + 1..]);
        Point::new(path, point.offset)
    };

    Ok(Transaction::new(ops)
        .selection_after(Selection::new(remap(&sel.anchor), remap(&sel.focus)))
        .source("command:blockquote.unwrap"))
}

struct TodoPlugin;

impl PlatePlugin for TodoPlugin {
    fn id(&self) -> &'static str {
        "todo"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block("todo_item")]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeTodoCheckedAttr)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("todo.toggle", "Toggle todo item", |editor, _args| {
                let unset = all_selected(editor, |el| el.kind == "todo_item");
                let tx = retag_selected(editor, "command:todo.toggle", |el| {
                    if unset {
                        return Some(retagged(el, "paragraph", &[]));
                    }
                    if el.kind == "todo_item" {
                        return None;
                    }
                    Some(retagged(el, "todo_item", &[("checked", Value::Bool(false))]))
                });
                commit(editor, tx, "toggle todo")
            })
            .description("Toggle to-do item block type for the selected text blocks.")
            .keywords(["todo", "task", "checkbox"]),
            CommandSpec::new("todo.toggle_checked", "Toggle todo checked", |editor, args| {
                let tx = toggle_todo_checked(editor, args.as_ref());
                commit(editor, tx, "toggle todo checked")
            })
            .description("Toggle checked state for the focused (or given) to-do item.")
            .keywords(["todo", "task", "checkbox", "checked"])
            .args_example(serde_json::json!({ "path": [0] })),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("todo.is_active", |editor, _args| {
                Ok(Value::Bool(
                    focus_block(editor).is_some_and(|el| el.kind == "todo_item"),
                ))
            }),
            QuerySpec::new("todo.is_checked", |editor, _args| {
                Ok(Value::Bool(focus_block(editor).is_some_and(|el| {
                    el.kind == "todo_item"
                        && el.attrs.get("checked").and_then(Value::as_bool).unwrap_or(false)
                })))
            }),
        ]
    }
}

fn parse_path_arg(args: Option<&Value>) -> Option<Path> {
    let path = args?.get("path")?.as_array()?;
    path.iter()
        .map(|v| v.as_u64().map(|ix| ix as usize))
        .collect()
}

fn toggle_todo_checked(editor: &Editor, args: Option<&Value>) -> Result<Transaction, String> {
    let block_path = parse_path_arg(args)
        .or_else(|| focus_block_path(editor).map(<[usize]>::to_vec))
        .ok_or("No active block")?;

    let Some(el) = element_at_path(editor.doc(), &block_path).filter(|el| el.kind == "todo_item")
    else {
        return Ok(Transaction::new(Vec::new()).source("command:todo.toggle_checked"));
    };
    let checked = el.attrs.get("checked").and_then(Value::as_bool).unwrap_or(false);

    Ok(Transaction::new(vec![Op::SetNodeAttrs {
        path: block_path,
        patch: AttrPatch::set("checked", Value::Bool(!checked)),
    }])
    .selection_after(editor.selection().clone())
    .source("command:todo.toggle_checked"))
}

struct NormalizeTodoCheckedAttr;

impl NormalizePass for NormalizeTodoCheckedAttr {
    fn id(&self) -> &'static str {
        "todo.normalize_checked_attr"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        text_blocks_in_order(doc, registry)
            .into_iter()
            .filter(|block| {
                block.el.kind == "todo_item"
                    && block.el.attrs.get("checked").and_then(Value::as_bool).is_none()
            })
            .map(|block| Op::SetNodeAttrs {
                path: block.path,
                patch: AttrPatch::set("checked", Value::Bool(false)),
            })
            .collect()
    }
}

struct ListPlugin;

impl PlatePlugin for ListPlugin {
    fn id(&self) -> &'static str {
        "list"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::text_block("list_item")]
    }

    fn normalize_passes(&self) -> Vec<Box<dyn NormalizePass>> {
        vec![Box::new(NormalizeOrderedListIndices)]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("list.toggle_bulleted", "Toggle bulleted list", |editor, _args| {
                let tx = toggle_list(editor, "bulleted");
                commit(editor, tx, "toggle list")
            })
            .description("Toggle bulleted list for the selected blocks.")
            .keywords(["list", "bulleted", "unordered", "ul"]),
            CommandSpec::new("list.toggle_ordered", "Toggle ordered list", |editor, _args| {
                let tx = toggle_list(editor, "ordered");
                commit(editor, tx, "toggle list")
            })
            .description("Toggle ordered list for the selected blocks.")
            .keywords(["list", "ordered", "numbered", "ol"]),
            CommandSpec::new("list.unwrap", "Unwrap list item", |editor, _args| {
                let tx = retag_selected(editor, "command:list.unwrap", |el| {
                    (el.kind == "list_item").then(|| retagged(el, "paragraph", &[]))
                });
                commit(editor, tx, "unwrap list")
            })
            .description("Convert list items back to paragraphs.")
            .keywords(["list", "unwrap", "paragraph"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("list.active_type", |editor, _args| {
                Ok(focus_block(editor)
                    .and_then(list_type)
                    .map(|t| Value::String(t.to_string()))
                    .unwrap_or(Value::Null))
            }),
            QuerySpec::new("list.is_active", |editor, args| {
                let expected = args
                    .as_ref()
                    .and_then(|v| v.get("type"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| QueryError::new("Missing args.type"))?;
                Ok(Value::Bool(
                    focus_block(editor).and_then(list_type) == Some(expected),
                ))
            }),
        ]
    }
}

fn toggle_list(editor: &Editor, kind: &str) -> Result<Transaction, String> {
    let unset = all_selected(editor, |el| list_type(el) == Some(kind));
    retag_selected(editor, &format!("command:list.toggle_{kind}"), |el| {
        Some(if unset {
            retagged(el, "paragraph", &[])
        } else {
            retagged(el, "list_item", &[("list_type", Value::String(kind.to_string()))])
        })
    })
}

struct NormalizeOrderedListIndices;

impl NormalizePass for NormalizeOrderedListIndices {
    fn id(&self) -> &'static str {
        "list.normalize_ordered_indices"
    }

    fn run(&self, doc: &Document, registry: &PluginRegistry) -> Vec<Op> {
        walk_block_containers(doc, registry, &mut |children, parent, ops| {
            let mut counter: u64 = 0;
            for (ix, node) in children.iter().enumerate() {
                let Node::Element(el) = node else {
                    counter = 0;
                    continue;
                };
                if list_type(el) != Some("ordered") {
                    counter = 0;
                    if el.attrs.contains_key("list_index") {
                        ops.push(Op::SetNodeAttrs {
                            path: child_path(parent, ix),
                            patch: AttrPatch::remove("list_index"),
                        });
                    }
                    continue;
                }

                counter += 1;
                let desired = Value::from(counter);
                if el.attrs.get("list_index") != Some(&desired) {
                    ops.push(Op::SetNodeAttrs {
                        path: child_path(parent, ix),
                        patch: AttrPatch::set("list_index", desired),
                    });
                }
            }
        })
    }
}

struct ImagePlugin;

impl PlatePlugin for ImagePlugin {
    fn id(&self) -> &'static str {
        "image"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        vec![NodeSpec::void_block("image")]
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            CommandSpec::new("image.insert", "Insert image", |editor, args| {
                let src = args
                    .as_ref()
                    .and_then(|v| v.get("src"))
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| CommandError::new("Missing args.src"))?
                    .to_string();
                let alt = args
                    .as_ref()
                    .and_then(|v| v.get("alt"))
                    .and_then(Value::as_str)
                    .map(str::to_string);

                let tx = insert_void_block(editor, Node::image(src, alt), "command:image.insert");
                commit(editor, tx, "insert image")
            })
            .description("Insert a block image node (void).")
            .keywords(["image", "img", "media", "picture"])
            .args_example(
                serde_json::json!({ "src": "https://example.com/image.png", "alt": "Alt text" }),
            ),
        ]
    }
}
