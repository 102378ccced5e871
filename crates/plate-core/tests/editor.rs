use plate_core::{
    BlockPoint, BlockRange, Document, DocumentValue, Editor, Marks, Node, Op, PathError, PluginRegistry,
    Point, Selection, Transaction,
};

fn editor_with_text(text: &str) -> Editor {
    let doc = Document {
        children: vec![Node::paragraph(text)],
    };
    Editor::new(
        doc,
        Selection::collapsed(Point::new(vec![0, 0], 0)),
        PluginRegistry::core(),
    )
}

#[test]
fn undo_redo_replays_multi_op_transactions() {
    let mut editor = editor_with_text("XYZ");
    let selection_before = editor.selection().clone();

    let tx = Transaction::new(vec![
        Op::RemoveText {
            path: vec![0, 0],
            range: 0..3,
        },
        Op::InsertText {
            path: vec![0, 0],
            offset: 0,
            text: "a".to_string(),
        },
        Op::InsertNode {
            path: vec![1],
            node: Node::paragraph("bXYZ"),
        },
    ])
    .selection_after(Selection::collapsed(Point::new(vec![1, 0], 1)))
    .source("test:paste_newline");

    editor.apply(tx).unwrap();
    let doc_after = editor.doc().clone();
    let selection_after = editor.selection().clone();
    assert_eq!(doc_after.children.len(), 2);

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("XYZ")]);
    assert_eq!(editor.selection(), &selection_before);

    assert!(editor.redo());
    assert_eq!(editor.doc(), &doc_after);
    assert_eq!(editor.selection(), &selection_after);
}

#[test]
fn typing_moves_the_caret_and_backspace_removes_one_char() {
    let mut editor = editor_with_text("");
    editor.insert_text("hé/").unwrap();
    assert_eq!(editor.block_text(&[0]).as_deref(), Some("hé/"));
    assert_eq!(editor.caret(), Some(BlockPoint::new(vec![0], 4)));

    assert!(editor.delete_backward().unwrap());
    assert!(editor.delete_backward().unwrap());
    assert_eq!(editor.block_text(&[0]).as_deref(), Some("h"));
    assert_eq!(editor.caret(), Some(BlockPoint::new(vec![0], 1)));
}

#[test]
fn backspace_at_block_start_is_a_no_op() {
    let mut editor = editor_with_text("abc");
    assert!(!editor.delete_backward().unwrap());
    assert!(!editor.can_undo());
}

#[test]
fn typing_over_a_range_replaces_it() {
    let mut editor = editor_with_text("hello world");
    editor.set_selection(Selection::new(
        Point::new(vec![0, 0], 6),
        Point::new(vec![0, 0], 11),
    ));
    assert!(editor.is_expanded());
    assert_eq!(editor.caret(), None);

    editor.insert_text("there").unwrap();
    assert_eq!(editor.block_text(&[0]).as_deref(), Some("hello there"));
    assert_eq!(editor.caret(), Some(BlockPoint::new(vec![0], 11)));
}

#[test]
fn delete_range_spans_leaves_and_places_the_caret() {
    let mut editor = editor_with_text("");
    let paragraph = Node::element(
        "paragraph",
        Default::default(),
        vec![
            Node::text("ab", Default::default()),
            Node::text(
                "cd",
                plate_core::Marks {
                    bold: true,
                    ..Default::default()
                },
            ),
        ],
    );
    editor
        .apply(Transaction::new(Op::replace_node(vec![0], paragraph).into()))
        .unwrap();

    let range = BlockRange::new(vec![0], 1..3);
    assert_eq!(editor.text_in_range(&range).as_deref(), Some("bc"));

    editor.delete_range(&range).unwrap();
    assert_eq!(editor.block_text(&[0]).as_deref(), Some("ad"));
    assert_eq!(editor.caret(), Some(BlockPoint::new(vec![0], 1)));
}

#[test]
fn rollback_restores_document_and_drops_history() {
    let mut editor = editor_with_text("");
    editor.insert_text("keep").unwrap();
    let checkpoint = editor.checkpoint();

    editor.insert_text(" drop").unwrap();
    editor.run_command("core.insert_divider", None).unwrap();
    assert_eq!(editor.doc().children.len(), 3);

    editor.rollback(checkpoint);
    assert_eq!(editor.doc().children, vec![Node::paragraph("keep")]);
    assert_eq!(editor.caret(), Some(BlockPoint::new(vec![0], 4)));
    assert!(!editor.can_redo());

    assert!(editor.undo());
    assert_eq!(editor.doc().children, vec![Node::paragraph("")]);
    assert!(!editor.can_undo());
}

#[test]
fn node_selection_only_targets_voids() {
    let mut editor = editor_with_text("text");
    editor.run_command("core.insert_divider", None).unwrap();

    assert_eq!(editor.select_node(vec![0]), Err(PathError::NotVoid));
    assert_eq!(
        editor.select_node(vec![9]),
        Err(PathError::Missing(vec![9]))
    );

    editor.select_node(vec![1]).unwrap();
    assert_eq!(editor.selected_node(), Some(&vec![1]));
    assert_eq!(editor.caret(), None);

    editor.set_selection(Selection::collapsed(Point::new(vec![0, 0], 2)));
    assert_eq!(editor.selected_node(), None);
    assert_eq!(editor.caret(), Some(BlockPoint::new(vec![0], 2)));
}

#[test]
fn value_round_trips_through_json() {
    let mut editor = Editor::with_richtext_plugins();
    editor.insert_text("Title").unwrap();
    editor
        .run_command("block.set_heading", Some(serde_json::json!({ "level": 1 })))
        .unwrap();

    let json = editor.value().to_json_pretty().unwrap();
    let value = DocumentValue::from_json_str(&json).unwrap();
    assert_eq!(value.schema, "plate");
    assert_eq!(value.version, 1);
    assert_eq!(value.document, *editor.doc());

    let reloaded = Editor::from_document(value.into_document(), PluginRegistry::richtext());
    assert_eq!(reloaded.block_text(&[0]).as_deref(), Some("Title"));
}

#[test]
fn value_defaults_schema_and_version() {
    let value = DocumentValue::from_json(serde_json::json!({
        "document": { "children": [] }
    }))
    .unwrap();
    assert_eq!(value.schema, "plate");
    assert_eq!(value.version, 1);

    let editor = Editor::from_document(value.into_document(), PluginRegistry::richtext());
    assert_eq!(editor.doc().children, vec![Node::paragraph("")]);
}

#[test]
fn selection_for_maps_block_offsets_onto_leaves() {
    let paragraph = Node::element(
        "paragraph",
        Default::default(),
        vec![
            Node::text("ab", Marks { bold: true, ..Marks::default() }),
            Node::text("cd", Marks::default()),
        ],
    );
    let mut editor = Editor::from_document(
        Document {
            children: vec![paragraph],
        },
        PluginRegistry::core(),
    );

    let selection = editor
        .selection_for(&BlockRange::new(vec![0], 1..3))
        .unwrap();
    editor.set_selection(selection);
    assert_eq!(
        editor.selection_bounds(),
        Some((BlockPoint::new(vec![0], 1), BlockPoint::new(vec![0], 3)))
    );
    assert!(editor.selection_for(&BlockRange::new(vec![4], 0..1)).is_none());
}
