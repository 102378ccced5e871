use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use plate_core::BlockRange;
use serde_json::{Value, json};

use crate::error::{CatalogError, CommandError};
use crate::model::DocumentModel;
use crate::node_type::NodeType;

pub type CommandAction =
    Arc<dyn Fn(&mut CommandContext<'_>) -> Result<(), CommandError> + Send + Sync>;

/// Host-provided text input, used by commands that need a value from the
/// user (an image URL). `None` means the user cancelled.
pub type Prompt<'a> = dyn FnMut(&str) -> Option<String> + 'a;

/// A slash-menu entry. Titles identify commands inside a catalog.
#[derive(Clone)]
pub struct SlashCommand {
    pub title: String,
    pub description: String,
    pub search_terms: Vec<String>,
    pub icon: Option<String>,
    pub action: CommandAction,
}

impl SlashCommand {
    pub fn new(
        title: impl Into<String>,
        action: impl Fn(&mut CommandContext<'_>) -> Result<(), CommandError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            search_terms: Vec::new(),
            icon: None,
            action: Arc::new(action),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn search_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_terms = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Case-insensitive substring match on title, description and search
    /// terms. `needle` must already be lowercase.
    fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self
                .search_terms
                .iter()
                .any(|term| term.to_lowercase().contains(needle))
    }
}

impl fmt::Debug for SlashCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlashCommand")
            .field("title", &self.title)
            .field("description", &self.description)
            .field("search_terms", &self.search_terms)
            .field("icon", &self.icon)
            .finish_non_exhaustive()
    }
}

/// What a command action gets to work with: the document and the range
/// covering the trigger character plus the typed query.
pub struct CommandContext<'a> {
    model: &'a mut dyn DocumentModel,
    range: BlockRange,
    prompt: &'a mut Prompt<'a>,
}

impl<'a> CommandContext<'a> {
    pub fn new(
        model: &'a mut dyn DocumentModel,
        range: BlockRange,
        prompt: &'a mut Prompt<'a>,
    ) -> Self {
        Self {
            model,
            range,
            prompt,
        }
    }

    pub fn range(&self) -> &BlockRange {
        &self.range
    }

    /// Remove the trigger and query text from the document.
    pub fn delete_range(&mut self) -> Result<(), CommandError> {
        self.model.delete_range(&self.range)
    }

    pub fn run(&mut self, command_id: &str, args: Option<Value>) -> Result<(), CommandError> {
        self.model.run_command(command_id, args)
    }

    pub fn prompt(&mut self, message: &str) -> Option<String> {
        (self.prompt)(message)
    }

    pub fn model(&mut self) -> &mut dyn DocumentModel {
        &mut *self.model
    }
}

/// Ordered, immutable list of slash commands.
#[derive(Debug, Clone)]
pub struct CommandCatalog {
    commands: Vec<SlashCommand>,
}

impl CommandCatalog {
    pub fn new(commands: impl IntoIterator<Item = SlashCommand>) -> Result<Self, CatalogError> {
        let commands: Vec<SlashCommand> = commands.into_iter().collect();
        if commands.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = HashSet::new();
        for command in &commands {
            if command.title.trim().is_empty() {
                return Err(CatalogError::BlankTitle);
            }
            if !seen.insert(command.title.as_str()) {
                return Err(CatalogError::DuplicateTitle(command.title.clone()));
            }
        }
        Ok(Self { commands })
    }

    pub fn builtin() -> Self {
        Self {
            commands: builtin_commands(),
        }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SlashCommand> {
        self.commands.get(index)
    }

    pub fn commands(&self) -> &[SlashCommand] {
        &self.commands
    }

    pub fn position(&self, title: &str) -> Option<usize> {
        self.commands.iter().position(|command| command.title == title)
    }

    /// Indices of the commands matching `query`, in registration order.
    pub fn filter(&self, query: &str) -> Vec<usize> {
        if query.is_empty() {
            return (0..self.commands.len()).collect();
        }
        let needle = query.to_lowercase();
        self.commands
            .iter()
            .enumerate()
            .filter(|(_, command)| command.matches(&needle))
            .map(|(ix, _)| ix)
            .collect()
    }

    pub fn execute(&self, index: usize, cx: &mut CommandContext<'_>) -> Result<(), CommandError> {
        let Some(command) = self.commands.get(index) else {
            return Err(CommandError::action(format!("no command at index {index}")));
        };
        tracing::debug!(title = %command.title, range = ?cx.range(), "executing slash command");
        (command.action)(cx)
    }
}

fn block_command(title: &str, node_type: NodeType) -> SlashCommand {
    SlashCommand::new(title, move |cx| {
        cx.delete_range()?;
        node_type.apply(cx.model())
    })
}

/// The default menu: text blocks, lists, quote, code, divider and image.
pub fn builtin_commands() -> Vec<SlashCommand> {
    vec![
        block_command("Text", NodeType::Text)
            .description("Just start typing with plain text.")
            .search_terms(["p", "paragraph"])
            .icon("text"),
        block_command("Heading 1", NodeType::Heading(1))
            .description("Big section heading.")
            .search_terms(["title", "big", "large"])
            .icon("heading-1"),
        block_command("Heading 2", NodeType::Heading(2))
            .description("Medium section heading.")
            .search_terms(["subtitle", "medium"])
            .icon("heading-2"),
        block_command("Heading 3", NodeType::Heading(3))
            .description("Small section heading.")
            .search_terms(["subtitle", "small"])
            .icon("heading-3"),
        block_command("Bullet List", NodeType::BulletList)
            .description("Create a simple bullet list.")
            .search_terms(["unordered", "point"])
            .icon("list"),
        block_command("Numbered List", NodeType::NumberedList)
            .description("Create a list with numbering.")
            .search_terms(["ordered"])
            .icon("list-ordered"),
        block_command("To-do List", NodeType::TodoList)
            .description("Track tasks with a to-do list.")
            .search_terms(["todo", "task", "list", "check", "checkbox"])
            .icon("check-square"),
        block_command("Quote", NodeType::Quote)
            .description("Capture a quote.")
            .search_terms(["blockquote"])
            .icon("text-quote"),
        block_command("Code", NodeType::Code)
            .description("Capture a code snippet.")
            .search_terms(["codeblock"])
            .icon("code"),
        SlashCommand::new("Divider", |cx| {
            cx.delete_range()?;
            cx.run("core.insert_divider", None)
        })
        .description("Visually divide content.")
        .search_terms(["hr", "separator"])
        .icon("minus"),
        SlashCommand::new("Image", |cx| {
            let Some(src) = cx.prompt("Enter image URL:") else {
                return Ok(());
            };
            let src = src.trim();
            if src.is_empty() {
                return Ok(());
            }
            cx.delete_range()?;
            cx.run("image.insert", Some(json!({ "src": src })))
        })
        .description("Insert an image from URL.")
        .search_terms(["photo", "picture", "media"])
        .icon("image"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_passes_validation() {
        let catalog = CommandCatalog::new(builtin_commands()).unwrap();
        assert_eq!(catalog.len(), CommandCatalog::builtin().len());
        assert_eq!(catalog.position("Divider"), Some(9));
    }

    #[test]
    fn matching_is_case_insensitive() {
        let command = SlashCommand::new("Heading 1", |_| Ok(()))
            .description("Big section heading.")
            .search_terms(["TITLE"]);
        assert!(command.matches("head"));
        assert!(command.matches("section"));
        assert!(command.matches("title"));
        assert!(!command.matches("list"));
    }
}
