//! Inline marks: toggling over ranges and at the caret, links, and the
//! coverage queries a toolbar needs to highlight its buttons.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Editor, Marks, Node, Point, Selection, TextNode};
use crate::ops::{Op, Transaction};
use crate::plugin::{CommandError, CommandSpec, PlatePlugin, QueryError, QuerySpec, commit};
use crate::tree::{
    child_path, clamp_to_char_boundary, element_at_path, inline_spans, node_at_path,
    point_for_global_offset, point_global_offset, selected_block_ranges,
};

/// Which marks cover every selected character.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkCoverage {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub code: bool,
    pub link: bool,
}

pub(crate) struct MarksPlugin;

impl PlatePlugin for MarksPlugin {
    fn id(&self) -> &'static str {
        "marks"
    }

    fn commands(&self) -> Vec<CommandSpec> {
        vec![
            toggle_command("bold", |m| m.bold, |m, v| m.bold = v)
                .keywords(["bold", "strong", "mark"]),
            toggle_command("italic", |m| m.italic, |m, v| m.italic = v)
                .keywords(["italic", "emphasis", "mark"]),
            toggle_command("underline", |m| m.underline, |m, v| m.underline = v)
                .keywords(["underline", "mark"]),
            toggle_command(
                "strikethrough",
                |m| m.strikethrough,
                |m, v| m.strikethrough = v,
            )
            .keywords(["strikethrough", "strike", "mark"]),
            toggle_command("code", |m| m.code, |m, v| m.code = v)
                .keywords(["code", "monospace", "mark"]),
            CommandSpec::new("marks.set_link", "Set link", |editor, args| {
                let url = args
                    .as_ref()
                    .and_then(|v| v.get("url"))
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| CommandError::new("Missing args.url"))?
                    .to_string();
                let tx = set_link_mark(editor, Some(url), "command:marks.set_link");
                commit(editor, tx, "set link")
            })
            .description("Set link mark on the current selection or caret.")
            .keywords(["link", "url", "hyperlink"])
            .args_example(serde_json::json!({ "url": "https://example.com" })),
            CommandSpec::new("marks.unset_link", "Unset link", |editor, _args| {
                let tx = set_link_mark(editor, None, "command:marks.unset_link");
                commit(editor, tx, "unset link")
            })
            .description("Remove link mark from the current selection or caret.")
            .keywords(["link", "unlink", "url", "hyperlink"]),
        ]
    }

    fn queries(&self) -> Vec<QuerySpec> {
        vec![
            QuerySpec::new("marks.get_active", |editor, _args| {
                serde_json::to_value(active_marks(editor))
                    .map_err(|err| QueryError::new(format!("Failed to encode marks: {err}")))
            }),
            QuerySpec::new("marks.covering", |editor, _args| {
                serde_json::to_value(mark_coverage(editor))
                    .map_err(|err| QueryError::new(format!("Failed to encode coverage: {err}")))
            }),
            QuerySpec::new("marks.link_href", |editor, _args| {
                Ok(link_href(editor).map(Value::String).unwrap_or(Value::Null))
            }),
            QuerySpec::new("marks.is_bold_active", |editor, _args| {
                Ok(Value::Bool(active_marks(editor).bold))
            }),
            QuerySpec::new("marks.is_italic_active", |editor, _args| {
                Ok(Value::Bool(active_marks(editor).italic))
            }),
            QuerySpec::new("marks.is_underline_active", |editor, _args| {
                Ok(Value::Bool(active_marks(editor).underline))
            }),
            QuerySpec::new("marks.is_strikethrough_active", |editor, _args| {
                Ok(Value::Bool(active_marks(editor).strikethrough))
            }),
            QuerySpec::new("marks.is_code_active", |editor, _args| {
                Ok(Value::Bool(active_marks(editor).code))
            }),
        ]
    }
}

fn toggle_command(name: &'static str, get: fn(&Marks) -> bool, set: fn(&mut Marks, bool)) -> CommandSpec {
    let id = format!("marks.toggle_{name}");
    let source = format!("command:{id}");
    let what = format!("toggle {name}");
    CommandSpec::new(id, format!("Toggle {name}"), move |editor, _args| {
        let tx = toggle_bool_mark(editor, get, set, &source);
        commit(editor, tx, &what)
    })
    .description(format!("Toggle {name} on the current selection or caret."))
}

/// Marks of the text leaf holding the focus.
fn active_marks(editor: &Editor) -> Marks {
    match node_at_path(editor.doc(), &editor.selection().focus.path) {
        Some(Node::Text(text)) => text.marks.clone(),
        _ => Marks::default(),
    }
}

/// Marks of every non-empty text leaf overlapping the selection.
fn selected_text_marks(editor: &Editor) -> Vec<&Marks> {
    let Ok(ranges) = selected_block_ranges(editor.doc(), editor.registry(), editor.selection())
    else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for (block, range) in ranges {
        if range.is_empty() {
            continue;
        }
        for (ix, start, end) in inline_spans(&block.el.children) {
            if range.end <= start || range.start >= end {
                continue;
            }
            if let Node::Text(t) = &block.el.children[ix] {
                if !t.text.is_empty() {
                    out.push(&t.marks);
                }
            }
        }
    }
    out
}

fn all_selected_have(editor: &Editor, get: impl Fn(&Marks) -> bool) -> bool {
    let marks = selected_text_marks(editor);
    !marks.is_empty() && marks.into_iter().all(get)
}

fn mark_coverage(editor: &Editor) -> MarkCoverage {
    let marks = selected_text_marks(editor);
    if marks.is_empty() {
        return MarkCoverage::default();
    }
    MarkCoverage {
        bold: marks.iter().all(|m| m.bold),
        italic: marks.iter().all(|m| m.italic),
        underline: marks.iter().all(|m| m.underline),
        strikethrough: marks.iter().all(|m| m.strikethrough),
        code: marks.iter().all(|m| m.code),
        link: marks.iter().all(|m| m.link.is_some()),
    }
}

/// The href at the start of the selection, or at the caret.
fn link_href(editor: &Editor) -> Option<String> {
    if editor.selection().is_collapsed() {
        return active_marks(editor).link;
    }
    selected_text_marks(editor)
        .into_iter()
        .find_map(|m| m.link.clone())
}

fn toggle_bool_mark(
    editor: &Editor,
    get: fn(&Marks) -> bool,
    set: fn(&mut Marks, bool),
    source: &str,
) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    let (ops, selection_after) = if sel.is_collapsed() {
        toggle_mark_at_caret(editor, |mut marks| {
            let target = !get(&marks);
            set(&mut marks, target);
            marks
        })?
    } else {
        let target = !all_selected_have(editor, get);
        apply_mark_range(editor, &sel, &|mut marks: Marks| {
            set(&mut marks, target);
            marks
        })?
    };
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source(source))
}

fn set_link_mark(editor: &Editor, url: Option<String>, source: &str) -> Result<Transaction, String> {
    let sel = editor.selection().clone();
    let apply = |mut marks: Marks| {
        marks.link = url.clone();
        marks
    };
    let (ops, selection_after) = if sel.is_collapsed() {
        toggle_mark_at_caret(editor, apply)?
    } else {
        apply_mark_range(editor, &sel, &apply)?
    };
    Ok(Transaction::new(ops)
        .selection_after(selection_after)
        .source(source))
}

/// Split the focused leaf around the caret so the next typed text carries the
/// new marks.
fn toggle_mark_at_caret(
    editor: &Editor,
    apply: impl Fn(Marks) -> Marks,
) -> Result<(Vec<Op>, Selection), String> {
    let focus = editor.selection().focus.clone();
    let (&child_ix, block_path) = focus
        .path
        .split_last()
        .ok_or_else(|| "Selection is not in a text node".to_string())?;

    let el = element_at_path(editor.doc(), block_path)
        .ok_or_else(|| "Selection is not in a text block".to_string())?;
    let Some(Node::Text(text)) = el.children.get(child_ix) else {
        return Err("Selection is not in a text node".into());
    };

    let cursor = clamp_to_char_boundary(&text.text, focus.offset);
    let marks_before = text.marks.clone();
    let marks_after = apply(marks_before.clone());

    if text.text.is_empty() {
        return Ok((
            vec![Op::SetTextMarks {
                path: focus.path.clone(),
                marks: marks_after,
            }],
            Selection::collapsed(Point::new(focus.path.clone(), 0)),
        ));
    }

    let left = &text.text[..cursor];
    let right = &text.text[cursor..];

    let mut replacement: Vec<Node> = Vec::new();
    let mut caret_child_ix = child_ix;
    if !left.is_empty() {
        replacement.push(Node::text(left, marks_before.clone()));
        caret_child_ix += 1;
    }
    replacement.push(Node::Text(TextNode {
        text: String::new(),
        marks: marks_after,
    }));
    if !right.is_empty() {
        replacement.push(Node::text(right, marks_before));
    }

    let mut ops = vec![Op::RemoveNode {
        path: focus.path.clone(),
    }];
    for (i, node) in replacement.into_iter().enumerate() {
        ops.push(Op::InsertNode {
            path: child_path(block_path, child_ix + i),
            node,
        });
    }

    let selection_after = Selection::collapsed(Point::new(child_path(block_path, caret_child_ix), 0));
    Ok((ops, selection_after))
}

/// Rewrite the children of every selected block with `apply` run over the
/// selected slice. Normalization merges the resulting leaves afterwards.
fn apply_mark_range(
    editor: &Editor,
    sel: &Selection,
    apply: &dyn Fn(Marks) -> Marks,
) -> Result<(Vec<Op>, Selection), String> {
    let ranges = selected_block_ranges(editor.doc(), editor.registry(), sel)?;

    let mut ops: Vec<Op> = Vec::new();
    let mut anchor = sel.anchor.clone();
    let mut focus = sel.focus.clone();

    for (block, range) in ranges {
        let children = block.el.children.as_slice();
        if range.is_empty() {
            continue;
        }

        let next = apply_marks_in_block(children, range.start, range.end, apply);

        for child_ix in (0..children.len()).rev() {
            ops.push(Op::RemoveNode {
                path: child_path(&block.path, child_ix),
            });
        }
        for (child_ix, node) in next.iter().cloned().enumerate() {
            ops.push(Op::InsertNode {
                path: child_path(&block.path, child_ix),
                node,
            });
        }

        for point in [&mut anchor, &mut focus] {
            let Some((&leaf, parent)) = point.path.split_last() else {
                continue;
            };
            if parent != block.path.as_slice() {
                continue;
            }
            let global = point_global_offset(children, leaf, point.offset);
            *point = point_for_global_offset(&block.path, &next, global);
        }
    }

    Ok((ops, Selection { anchor, focus }))
}

fn apply_marks_in_block(
    children: &[Node],
    start_global: usize,
    end_global: usize,
    apply: &dyn Fn(Marks) -> Marks,
) -> Vec<Node> {
    let mut out: Vec<Node> = Vec::with_capacity(children.len() + 2);

    for (ix, node_start, node_end) in inline_spans(children) {
        let node = &children[ix];
        let Node::Text(t) = node else {
            out.push(node.clone());
            continue;
        };
        if end_global <= node_start || start_global >= node_end {
            out.push(node.clone());
            continue;
        }

        let sel_start = clamp_to_char_boundary(&t.text, start_global.saturating_sub(node_start));
        let sel_end = clamp_to_char_boundary(&t.text, end_global - node_start);

        let prefix = &t.text[..sel_start];
        let middle = &t.text[sel_start..sel_end];
        let suffix = &t.text[sel_end..];

        if !prefix.is_empty() {
            out.push(Node::text(prefix, t.marks.clone()));
        }
        if !middle.is_empty() {
            out.push(Node::text(middle, apply(t.marks.clone())));
        }
        if !suffix.is_empty() {
            out.push(Node::text(suffix, t.marks.clone()));
        }
    }

    if out.is_empty() {
        out.push(Node::text("", Marks::default()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(s: &str) -> Node {
        Node::text(s, Marks::default())
    }

    #[test]
    fn marks_apply_only_to_the_selected_slice() {
        let out = apply_marks_in_block(&[plain("hello")], 1, 3, &|mut m| {
            m.bold = true;
            m
        });
        assert_eq!(out.len(), 3);
        let Node::Text(middle) = &out[1] else {
            panic!("expected text");
        };
        assert_eq!(middle.text, "el");
        assert!(middle.marks.bold);
    }

    #[test]
    fn voids_pass_through_untouched() {
        let children = vec![plain("ab"), Node::image("x.png", None), plain("cd")];
        let out = apply_marks_in_block(&children, 0, 100, &|mut m| {
            m.italic = true;
            m
        });
        assert_eq!(out.len(), 3);
        assert!(matches!(out[1], Node::Void(_)));
    }
}
