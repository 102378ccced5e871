use plate_core::{
    BlockPoint, Document, Editor, MarkCoverage, Marks, Node, PluginRegistry, Point, Selection,
};

fn editor_with(children: Vec<Node>, selection: Selection) -> Editor {
    Editor::new(Document { children }, selection, PluginRegistry::richtext())
}

fn range(block: usize, from: usize, to: usize) -> Selection {
    Selection::new(Point::new(vec![block, 0], from), Point::new(vec![block, 0], to))
}

fn leaves(editor: &Editor, block: usize) -> Vec<(String, Marks)> {
    let Node::Element(el) = &editor.doc().children[block] else {
        panic!("expected element block");
    };
    el.children
        .iter()
        .filter_map(|n| match n {
            Node::Text(t) => Some((t.text.clone(), t.marks.clone())),
            _ => None,
        })
        .collect()
}

fn coverage(editor: &Editor) -> MarkCoverage {
    editor.run_query("marks.covering", None).unwrap()
}

#[test]
fn toggle_bold_splits_only_the_selected_slice() {
    let mut editor = editor_with(vec![Node::paragraph("abcde")], range(0, 1, 3));

    editor.run_command("marks.toggle_bold", None).unwrap();

    let texts: Vec<_> = leaves(&editor, 0)
        .into_iter()
        .map(|(text, marks)| (text, marks.bold))
        .collect();
    assert_eq!(
        texts,
        vec![
            ("a".to_string(), false),
            ("bc".to_string(), true),
            ("de".to_string(), false),
        ]
    );
    assert_eq!(
        editor.selection_bounds(),
        Some((BlockPoint::new(vec![0], 1), BlockPoint::new(vec![0], 3)))
    );

    editor.run_command("marks.toggle_bold", None).unwrap();
    assert_eq!(
        leaves(&editor, 0),
        vec![("abcde".to_string(), Marks::default())]
    );
}

#[test]
fn partially_bold_range_is_not_covered_and_toggles_to_fully_bold() {
    let bold = Marks {
        bold: true,
        ..Marks::default()
    };
    let paragraph = Node::element(
        "paragraph",
        Default::default(),
        vec![Node::text("ab", bold.clone()), Node::text("cd", Marks::default())],
    );
    let selection = Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![0, 1], 2));
    let mut editor = editor_with(vec![paragraph], selection);

    assert!(!coverage(&editor).bold);

    editor.run_command("marks.toggle_bold", None).unwrap();

    assert!(coverage(&editor).bold);
    assert_eq!(leaves(&editor, 0), vec![("abcd".to_string(), bold)]);
}

#[test]
fn coverage_spans_blocks() {
    let selection = Selection::new(Point::new(vec![0, 0], 1), Point::new(vec![1, 0], 2));
    let mut editor = editor_with(
        vec![Node::paragraph("one"), Node::paragraph("two")],
        selection,
    );

    editor.run_command("marks.toggle_italic", None).unwrap();
    let covered = coverage(&editor);
    assert!(covered.italic);
    assert!(!covered.bold);

    let first = leaves(&editor, 0);
    assert_eq!(first[0], ("o".to_string(), Marks::default()));
    assert!(first[1].1.italic);
}

#[test]
fn collapsed_selection_covers_nothing() {
    let editor = editor_with(vec![Node::paragraph("abc")], range(0, 1, 1));
    assert_eq!(coverage(&editor), MarkCoverage::default());
}

#[test]
fn toggling_at_the_caret_marks_the_next_typed_text() {
    let mut editor = editor_with(vec![Node::paragraph("hello")], range(0, 5, 5));

    editor.run_command("marks.toggle_bold", None).unwrap();
    assert!(editor.run_query::<bool>("marks.is_bold_active", None).unwrap());

    editor.insert_text(" world").unwrap();
    let texts: Vec<_> = leaves(&editor, 0)
        .into_iter()
        .map(|(text, marks)| (text, marks.bold))
        .collect();
    assert_eq!(
        texts,
        vec![("hello".to_string(), false), (" world".to_string(), true)]
    );
}

#[test]
fn link_set_query_and_unset() {
    let mut editor = editor_with(vec![Node::paragraph("see docs")], range(0, 4, 8));

    assert_eq!(
        editor
            .run_query::<Option<String>>("marks.link_href", None)
            .unwrap(),
        None
    );

    editor
        .run_command(
            "marks.set_link",
            Some(serde_json::json!({ "url": "https://example.com" })),
        )
        .unwrap();
    assert!(coverage(&editor).link);
    assert_eq!(
        editor
            .run_query::<Option<String>>("marks.link_href", None)
            .unwrap()
            .as_deref(),
        Some("https://example.com")
    );

    editor.run_command("marks.unset_link", None).unwrap();
    assert!(!coverage(&editor).link);
    assert_eq!(
        leaves(&editor, 0),
        vec![("see docs".to_string(), Marks::default())]
    );
}

#[test]
fn set_link_requires_url() {
    let mut editor = editor_with(vec![Node::paragraph("x")], range(0, 0, 1));
    let err = editor.run_command("marks.set_link", None).unwrap_err();
    assert!(err.message().contains("url"));
}

#[test]
fn mark_toggle_is_one_undo_step() {
    let mut editor = editor_with(vec![Node::paragraph("abc")], range(0, 0, 3));
    editor.run_command("marks.toggle_underline", None).unwrap();
    assert!(coverage(&editor).underline);

    assert!(editor.undo());
    assert_eq!(
        leaves(&editor, 0),
        vec![("abc".to_string(), Marks::default())]
    );
}
