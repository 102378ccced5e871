use plate_core::{
    ActiveBlock, Attrs, Document, Editor, ElementNode, Node, PluginRegistry, Point, Selection,
};

fn editor_with(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document { children }, selection, PluginRegistry::richtext())
}

fn caret(path: Vec<usize>, offset: usize) -> Selection {
    Selection::collapsed(Point::new(path, offset))
}

fn kinds(editor: &Editor) -> Vec<&str> {
    editor
        .doc()
        .children
        .iter()
        .map(|n| match n {
            Node::Element(el) => el.kind.as_str(),
            Node::Void(v) => v.kind.as_str(),
            Node::Text(_) => "text",
        })
        .collect()
}

fn block(editor: &Editor, ix: usize) -> &ElementNode {
    let Some(Node::Element(el)) = editor.doc().children.get(ix) else {
        panic!("expected element block at {ix}");
    };
    el
}

#[test]
fn set_heading_retags_and_reports_level() {
    let mut editor = Editor::with_richtext_plugins();
    assert_eq!(
        editor
            .run_query::<Option<u64>>("block.heading_level", None)
            .unwrap(),
        None
    );

    editor
        .run_command("block.set_heading", Some(serde_json::json!({ "level": 2 })))
        .unwrap();
    assert_eq!(block(&editor, 0).kind, "heading");
    assert_eq!(
        editor
            .run_query::<Option<u64>>("block.heading_level", None)
            .unwrap(),
        Some(2)
    );

    editor.run_command("block.unset_heading", None).unwrap();
    assert_eq!(block(&editor, 0).kind, "paragraph");
    assert!(block(&editor, 0).attrs.get("level").is_none());
}

#[test]
fn setting_the_same_heading_twice_records_one_undo_step() {
    let mut editor = Editor::with_richtext_plugins();
    let args = Some(serde_json::json!({ "level": 1 }));
    editor.run_command("block.set_heading", args.clone()).unwrap();
    editor.run_command("block.set_heading", args).unwrap();

    assert!(editor.undo());
    assert_eq!(block(&editor, 0).kind, "paragraph");
    assert!(!editor.can_undo());
}

#[test]
fn out_of_range_heading_levels_are_clamped() {
    let mut attrs = Attrs::default();
    attrs.insert("level".to_string(), serde_json::json!(42));
    let heading = Node::element("heading", attrs, vec![Node::text("x", Default::default())]);
    let editor = editor_with(vec![heading], caret(vec![0, 0], 0));

    assert_eq!(
        block(&editor, 0).attrs.get("level").and_then(|v| v.as_u64()),
        Some(6)
    );
}

#[test]
fn block_conversions_keep_the_caret_and_text() {
    let mut editor = editor_with(vec![Node::paragraph("hello")], caret(vec![0, 0], 3));

    editor.run_command("code_block.toggle", None).unwrap();
    assert_eq!(block(&editor, 0).kind, "code_block");
    assert_eq!(editor.selection().focus, Point::new(vec![0, 0], 3));
    assert_eq!(editor.block_text(&[0]).as_deref(), Some("hello"));

    editor.run_command("code_block.toggle", None).unwrap();
    assert_eq!(block(&editor, 0).kind, "paragraph");
}

#[test]
fn list_toggle_applies_to_every_selected_block() {
    let selection = Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![2, 0], 1));
    let mut editor = editor_with(
        vec![
            Node::paragraph("a"),
            Node::paragraph("b"),
            Node::paragraph("c"),
            Node::paragraph("d"),
        ],
        selection,
    );

    editor.run_command("list.toggle_ordered", None).unwrap();
    assert_eq!(
        kinds(&editor),
        vec!["list_item", "list_item", "list_item", "paragraph"]
    );
    let indices: Vec<_> = (0..3)
        .map(|ix| block(&editor, ix).attrs.get("list_index").and_then(|v| v.as_u64()))
        .collect();
    assert_eq!(indices, vec![Some(1), Some(2), Some(3)]);

    editor.run_command("list.toggle_ordered", None).unwrap();
    assert_eq!(
        kinds(&editor),
        vec!["paragraph", "paragraph", "paragraph", "paragraph"]
    );
    assert!(block(&editor, 0).attrs.get("list_index").is_none());
}

#[test]
fn switching_list_type_keeps_items_as_list_items() {
    let mut editor = editor_with(vec![Node::paragraph("item")], caret(vec![0, 0], 0));
    editor.run_command("list.toggle_bulleted", None).unwrap();
    editor.run_command("list.toggle_ordered", None).unwrap();

    assert_eq!(
        editor
            .run_query::<Option<String>>("list.active_type", None)
            .unwrap()
            .as_deref(),
        Some("ordered")
    );
    assert!(
        editor
            .run_query::<bool>("list.is_active", Some(serde_json::json!({ "type": "ordered" })))
            .unwrap()
    );
}

#[test]
fn todo_toggle_and_checked_state() {
    let mut editor = Editor::with_richtext_plugins();

    editor.run_command("todo.toggle", None).unwrap();
    assert!(editor.run_query::<bool>("todo.is_active", None).unwrap());
    assert!(!editor.run_query::<bool>("todo.is_checked", None).unwrap());

    editor.run_command("todo.toggle_checked", None).unwrap();
    assert!(editor.run_query::<bool>("todo.is_checked", None).unwrap());

    editor.run_command("todo.toggle", None).unwrap();
    assert_eq!(block(&editor, 0).kind, "paragraph");
    assert!(block(&editor, 0).attrs.get("checked").is_none());
}

#[test]
fn todo_items_without_checked_attr_are_filled_in() {
    let todo = Node::element("todo_item", Attrs::default(), vec![Node::text("x", Default::default())]);
    let editor = editor_with(vec![todo], caret(vec![0, 0], 0));

    assert_eq!(
        block(&editor, 0).attrs.get("checked").and_then(|v| v.as_bool()),
        Some(false)
    );
}

#[test]
fn blockquote_toggle_wraps_then_unwraps() {
    let selection = Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![1, 0], 1));
    let mut editor = editor_with(
        vec![Node::paragraph("a"), Node::paragraph("b"), Node::paragraph("c")],
        selection,
    );

    editor.run_command("blockquote.toggle", None).unwrap();
    assert_eq!(kinds(&editor), vec!["blockquote", "paragraph"]);
    assert_eq!(block(&editor, 0).children.len(), 2);
    assert_eq!(editor.selection().focus, Point::new(vec![0, 1, 0], 1));
    assert!(editor.run_query::<bool>("blockquote.is_active", None).unwrap());

    editor.run_command("blockquote.toggle", None).unwrap();
    assert_eq!(kinds(&editor), vec!["paragraph", "paragraph", "paragraph"]);
    assert_eq!(editor.selection().focus, Point::new(vec![1, 0], 1));
}

#[test]
fn empty_blockquote_gets_a_paragraph() {
    let quote = Node::element("blockquote", Attrs::default(), Vec::new());
    let editor = editor_with(vec![quote], caret(vec![0], 0));

    assert_eq!(block(&editor, 0).children.len(), 1);
    assert_eq!(editor.selection().focus.path, vec![0, 0, 0]);
}

#[test]
fn image_insert_adds_void_and_trailing_paragraph() {
    let mut editor = editor_with(vec![Node::paragraph("hello")], caret(vec![0, 0], 2));

    editor
        .run_command(
            "image.insert",
            Some(serde_json::json!({ "src": "https://example.com/a.png", "alt": "A" })),
        )
        .unwrap();

    assert_eq!(kinds(&editor), vec!["paragraph", "image", "paragraph"]);
    let Node::Void(image) = &editor.doc().children[1] else {
        panic!("expected image void");
    };
    assert_eq!(
        image.attrs.get("src").and_then(|v| v.as_str()),
        Some("https://example.com/a.png")
    );
    assert_eq!(editor.selection().focus, Point::new(vec![2, 0], 0));
}

#[test]
fn image_insert_without_src_fails() {
    let mut editor = Editor::with_richtext_plugins();
    let err = editor
        .run_command("image.insert", Some(serde_json::json!({ "src": "  " })))
        .unwrap_err();
    assert!(err.message().contains("src"));
}

#[test]
fn divider_replaces_an_empty_paragraph() {
    let mut editor = editor_with(
        vec![Node::paragraph("intro"), Node::paragraph("")],
        caret(vec![1, 0], 0),
    );

    editor.run_command("core.insert_divider", None).unwrap();

    assert_eq!(kinds(&editor), vec!["paragraph", "divider", "paragraph"]);
    assert_eq!(editor.selection().focus, Point::new(vec![2, 0], 0));
}

#[test]
fn active_block_describes_the_focused_block() {
    let mut editor = Editor::with_richtext_plugins();
    editor
        .run_command("block.set_heading", Some(serde_json::json!({ "level": 3 })))
        .unwrap();

    let active = editor.run_query::<ActiveBlock>("block.active", None).unwrap();
    assert_eq!(active.kind, "heading");
    assert_eq!(active.level, Some(3));
    assert!(!active.in_blockquote);

    editor.run_command("block.set_paragraph", None).unwrap();
    let active = editor.run_query::<ActiveBlock>("block.active", None).unwrap();
    assert_eq!(active.kind, "paragraph");
    assert_eq!(active.level, None);
}
