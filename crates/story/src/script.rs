//! A small replay language for editing sessions.
//!
//! Plain characters are typed as keystrokes. Directives in braces drive
//! everything else: `{down}`, `{enter}`, `{select 0 5}`, `{bold}`,
//! `{url https://example.com}`, `{block Heading 2}` and so on. `{{` types a
//! literal brace.

use std::ops::Range;

use anyhow::{Context as _, bail};
use plate_core::BlockRange;
use plate_slash::{EditorMount, Key, MarkKind, MountError, NodeType};

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Key(Key),
    Click(usize),
    Select(Range<usize>),
    Mark(MarkKind),
    Link(String),
    Unlink,
    Block(NodeType),
    Undo,
    Redo,
}

pub fn parse(script: &str) -> anyhow::Result<Vec<Step>> {
    let mut steps = Vec::new();
    let mut chars = script.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            steps.push(Step::Key(Key::Char(ch)));
            continue;
        }
        if chars.next_if_eq(&'{').is_some() {
            steps.push(Step::Key(Key::Char('{')));
            continue;
        }

        let mut directive = String::new();
        loop {
            match chars.next() {
                Some('}') => break,
                Some(c) => directive.push(c),
                None => bail!("unterminated directive `{{{directive}`"),
            }
        }
        steps.push(parse_directive(directive.trim())?);
    }
    Ok(steps)
}

fn parse_directive(directive: &str) -> anyhow::Result<Step> {
    let (name, rest) = directive
        .split_once(char::is_whitespace)
        .map_or((directive, ""), |(name, rest)| (name, rest.trim()));

    let step = match name {
        "up" => Step::Key(Key::ArrowUp),
        "down" => Step::Key(Key::ArrowDown),
        "enter" => Step::Key(Key::Enter),
        "esc" => Step::Key(Key::Escape),
        "bs" => Step::Key(Key::Backspace),
        "undo" => Step::Undo,
        "redo" => Step::Redo,
        "unlink" => Step::Unlink,
        "click" => Step::Click(
            rest.parse()
                .with_context(|| format!("`{{click}}` needs a row index, got `{rest}`"))?,
        ),
        "select" => {
            let mut bounds = rest.split_whitespace().map(str::parse::<usize>);
            match (bounds.next(), bounds.next(), bounds.next()) {
                (Some(Ok(start)), Some(Ok(end)), None) if start <= end => Step::Select(start..end),
                _ => bail!("`{{select}}` needs two ordered offsets, got `{rest}`"),
            }
        }
        "url" => {
            if rest.is_empty() {
                bail!("`{{url}}` needs a link target");
            }
            Step::Link(rest.to_string())
        }
        "block" => NodeType::SELECTOR
            .into_iter()
            .find(|node_type| node_type.label().eq_ignore_ascii_case(rest))
            .map(Step::Block)
            .with_context(|| format!("unknown block type `{rest}`"))?,
        _ => match MarkKind::ALL.into_iter().find(|kind| kind.name() == name) {
            Some(kind) => Step::Mark(kind),
            None => bail!("unknown directive `{{{name}}}`"),
        },
    };
    Ok(step)
}

/// Apply one step to the mount. Failed slash commands were already handed to
/// the mount's error callback, so the replay carries on after them.
pub fn replay(mount: &mut EditorMount, step: &Step) -> anyhow::Result<()> {
    let result = match step {
        Step::Key(key) => mount.key_down(key.clone()).map(drop),
        Step::Click(index) => mount.click_candidate(*index).map(drop),
        Step::Select(range) => {
            let Some(caret) = mount.editor().caret() else {
                bail!("no caret to select around");
            };
            let target = BlockRange::new(caret.block, range.clone());
            let Some(selection) = mount.editor().selection_for(&target) else {
                bail!("cannot select {range:?} in the focused block");
            };
            mount.set_selection(selection);
            Ok(())
        }
        Step::Mark(kind) => mount.toggle_mark(*kind).map(drop),
        Step::Link(url) => mount.submit_link(url),
        Step::Unlink => mount.remove_link(),
        Step::Block(node_type) => mount.select_node_type(*node_type),
        Step::Undo => {
            mount.undo();
            Ok(())
        }
        Step::Redo => {
            mount.redo();
            Ok(())
        }
    };

    match result {
        Ok(()) | Err(MountError::Commit(_)) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plate_core::Node;
    use plate_slash::MountOptions;

    #[test]
    fn plain_text_becomes_keystrokes() {
        assert_eq!(
            parse("a/").unwrap(),
            vec![Step::Key(Key::Char('a')), Step::Key(Key::Char('/'))]
        );
        assert_eq!(parse("{{").unwrap(), vec![Step::Key(Key::Char('{'))]);
    }

    #[test]
    fn directives() {
        assert_eq!(
            parse("{down}{ enter }{click 2}{select 1 4}{italic}").unwrap(),
            vec![
                Step::Key(Key::ArrowDown),
                Step::Key(Key::Enter),
                Step::Click(2),
                Step::Select(1..4),
                Step::Mark(MarkKind::Italic),
            ]
        );
        assert_eq!(
            parse("{url https://example.com}{block heading 3}").unwrap(),
            vec![
                Step::Link("https://example.com".to_string()),
                Step::Block(NodeType::Heading(3)),
            ]
        );
    }

    #[test]
    fn malformed_directives_are_rejected() {
        assert!(parse("{down").is_err());
        assert!(parse("{jump}").is_err());
        assert!(parse("{select 4 1}").is_err());
        assert!(parse("{click x}").is_err());
        assert!(parse("{url}").is_err());
        assert!(parse("{block Heading 9}").is_err());
    }

    #[test]
    fn replaying_a_slash_command_session() {
        let mut mount = EditorMount::mount(MountOptions::new()).unwrap();
        for step in parse("/heading{down}{enter}Title{select 0 5}{bold}").unwrap() {
            replay(&mut mount, &step).unwrap();
        }

        let content = mount.content();
        let Node::Element(heading) = &content.document.children[0] else {
            panic!("expected heading");
        };
        assert_eq!(heading.kind, "heading");
        assert_eq!(heading.attrs.get("level").and_then(|v| v.as_u64()), Some(2));
        assert!(mount.toolbar().is_active(MarkKind::Bold));
    }
}
