use plate_core::{Document, Editor, MarkCoverage, Node, PluginRegistry, Point, Selection};
use plate_slash::{CommandCatalog, EditorMount, Key, MarkKind, MountOptions, SelectionToolbar, query};
use proptest::prelude::*;

fn arb_query() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9-]{0,8}"
}

fn typed(query: &str) -> EditorMount {
    let mut mount = EditorMount::mount(MountOptions::new()).unwrap();
    mount.insert_text("/").unwrap();
    mount.insert_text(query).unwrap();
    mount
}

proptest! {
    /// Every candidate matches the query, and nothing matching is left out.
    #[test]
    fn prop_filter_is_exact(q in arb_query()) {
        let catalog = CommandCatalog::builtin();
        let needle = q.to_lowercase();
        let found = catalog.filter(&q);

        for (ix, command) in catalog.commands().iter().enumerate() {
            let matches = command.title.to_lowercase().contains(&needle)
                || command.description.to_lowercase().contains(&needle)
                || command
                    .search_terms
                    .iter()
                    .any(|term| term.to_lowercase().contains(&needle));
            prop_assert_eq!(found.contains(&ix), matches, "command {}", command.title);
        }
        prop_assert!(found.windows(2).all(|pair| pair[0] < pair[1]));
    }

    /// The open menu always shows the filter for the typed query, with the
    /// first candidate selected.
    #[test]
    fn prop_typed_query_drives_candidates(q in arb_query()) {
        let mount = typed(&q);
        let menu = mount.menu();

        prop_assert!(menu.is_open());
        prop_assert_eq!(menu.session().map(|s| s.query.as_str()), Some(q.as_str()));
        let expected = menu.catalog().filter(&q);
        prop_assert_eq!(menu.candidates(), expected.as_slice());
        prop_assert_eq!(menu.selected_index(), Some(0));
    }

    /// Navigating a full lap returns to the first candidate, and the selected
    /// row is always inside the visible window.
    #[test]
    fn prop_navigation_wraps(q in "[a-z]{0,2}", down in any::<bool>()) {
        let mut mount = typed(&q);
        let len = mount.menu().candidates().len();
        let key = if down { Key::ArrowDown } else { Key::ArrowUp };

        for _ in 0..len {
            mount.key_down(key.clone()).unwrap();
            let selected = mount.menu().selected_index().unwrap();
            prop_assert!(mount.menu().visible_range().contains(&selected) || len == 0);
        }
        prop_assert_eq!(mount.menu().selected_index(), Some(0));
    }

    /// Extending the query after navigating always resets the selection.
    #[test]
    fn prop_query_change_resets_selection(steps in 1usize..6, extra in "[a-z]") {
        let mut mount = typed("");
        for _ in 0..steps {
            mount.key_down(Key::ArrowDown).unwrap();
        }
        mount.insert_text(&extra).unwrap();

        prop_assert!(mount.menu().is_open());
        prop_assert_eq!(mount.menu().selected_index(), Some(0));
    }

    /// The toolbar shows exactly for non-empty text ranges.
    #[test]
    fn prop_toolbar_visibility(text in "[a-z ]{1,12}", a in 0usize..12, b in 0usize..12) {
        let len = text.len();
        let (a, b) = (a.min(len), b.min(len));
        let editor = Editor::new(
            Document { children: vec![Node::paragraph(text.as_str())] },
            Selection::new(Point::new(vec![0, 0], a), Point::new(vec![0, 0], b)),
            PluginRegistry::richtext(),
        );
        let mut toolbar = SelectionToolbar::new();
        toolbar.update(&editor);
        prop_assert_eq!(toolbar.is_visible(), a != b);
    }

    /// Toggling bold over a range flips whole-range coverage.
    #[test]
    fn prop_bold_toggle_flips_coverage(text in "[a-z]{2,12}", cut in 1usize..12) {
        let cut = cut.min(text.len() - 1);
        let mut editor = Editor::new(
            Document { children: vec![Node::paragraph(text.as_str())] },
            Selection::new(Point::new(vec![0, 0], 0), Point::new(vec![0, 0], cut)),
            PluginRegistry::richtext(),
        );
        let mut toolbar = SelectionToolbar::new();
        toolbar.update(&editor);

        for expected in [true, false, true] {
            toolbar.toggle_mark(MarkKind::Bold, &mut editor).unwrap();
            let coverage: MarkCoverage = query(&editor, "marks.covering", None).unwrap();
            prop_assert_eq!(coverage.bold, expected);
            prop_assert_eq!(toolbar.is_active(MarkKind::Bold), expected);
        }
    }
}
