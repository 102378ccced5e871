use plate_core::{DocumentValue, Editor, Path, PluginRegistry, Selection};
use serde_json::Value;

use crate::catalog::{CommandCatalog, SlashCommand, builtin_commands};
use crate::config::SlashConfig;
use crate::error::{CommitError, MountError};
use crate::geometry::{MonospaceGeometry, RangeGeometry};
use crate::menu::{CommandMenu, Key, KeyDisposition, KeyOutcome};
use crate::node_type::NodeType;
use crate::toolbar::{MarkKind, SelectionToolbar};

pub type ChangeCallback = Box<dyn FnMut(&DocumentValue)>;
pub type ErrorCallback = Box<dyn FnMut(&CommitError)>;
pub type PromptCallback = Box<dyn FnMut(&str) -> Option<String>>;

/// Everything a host supplies when mounting an editor.
pub struct MountOptions {
    pub initial_content: Option<Value>,
    pub commands: Vec<SlashCommand>,
    pub config: SlashConfig,
    pub geometry: Box<dyn RangeGeometry>,
    pub on_change: Option<ChangeCallback>,
    pub on_error: Option<ErrorCallback>,
    pub prompt: Option<PromptCallback>,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self {
            initial_content: None,
            commands: builtin_commands(),
            config: SlashConfig::default(),
            geometry: Box::new(MonospaceGeometry::default()),
            on_change: None,
            on_error: None,
            prompt: None,
        }
    }
}

impl MountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn content(mut self, content: Value) -> Self {
        self.initial_content = Some(content);
        self
    }

    pub fn commands(mut self, commands: Vec<SlashCommand>) -> Self {
        self.commands = commands;
        self
    }

    pub fn config(mut self, config: SlashConfig) -> Self {
        self.config = config;
        self
    }

    pub fn geometry(mut self, geometry: impl RangeGeometry + 'static) -> Self {
        self.geometry = Box::new(geometry);
        self
    }

    pub fn on_change(mut self, f: impl FnMut(&DocumentValue) + 'static) -> Self {
        self.on_change = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&CommitError) + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn prompt(mut self, f: impl FnMut(&str) -> Option<String> + 'static) -> Self {
        self.prompt = Some(Box::new(f));
        self
    }
}

/// A mounted editor: the document plus the slash menu and selection toolbar
/// wired to it. Every input method recomputes menu and toolbar state before
/// returning.
pub struct EditorMount {
    editor: Editor,
    menu: CommandMenu,
    toolbar: SelectionToolbar,
    geometry: Box<dyn RangeGeometry>,
    on_change: Option<ChangeCallback>,
    on_error: Option<ErrorCallback>,
    prompt: PromptCallback,
}

impl EditorMount {
    pub fn mount(options: MountOptions) -> Result<Self, MountError> {
        let MountOptions {
            initial_content,
            commands,
            config,
            geometry,
            on_change,
            on_error,
            prompt,
        } = options;

        config.validate()?;
        let catalog = CommandCatalog::new(commands)?;
        let editor = match initial_content {
            Some(content) => {
                let value = DocumentValue::from_json(content).map_err(MountError::Content)?;
                if value.schema != DocumentValue::default().schema {
                    return Err(MountError::Schema(value.schema));
                }
                Editor::from_document(value.into_document(), PluginRegistry::richtext())
            }
            None => Editor::with_richtext_plugins(),
        };
        tracing::debug!(
            commands = catalog.len(),
            blocks = editor.doc().children.len(),
            "editor mounted"
        );

        let mut mount = Self {
            editor,
            menu: CommandMenu::new(catalog, config),
            toolbar: SelectionToolbar::new(),
            geometry,
            on_change,
            on_error,
            prompt: prompt.unwrap_or_else(|| Box::new(no_prompt)),
        };
        mount.refresh();
        Ok(mount)
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn menu(&self) -> &CommandMenu {
        &self.menu
    }

    pub fn toolbar(&self) -> &SelectionToolbar {
        &self.toolbar
    }

    pub fn content(&self) -> DocumentValue {
        self.editor.value()
    }

    /// Type `text` one character at a time, as keystrokes.
    pub fn insert_text(&mut self, text: &str) -> Result<(), MountError> {
        for ch in text.chars() {
            self.editor.insert_text(ch.encode_utf8(&mut [0; 4]))?;
            self.after_change(true);
        }
        Ok(())
    }

    pub fn backspace(&mut self) -> Result<bool, MountError> {
        let deleted = self.editor.delete_backward()?;
        self.after_change(deleted);
        Ok(deleted)
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.editor.set_selection(selection);
        self.after_change(false);
    }

    pub fn select_node(&mut self, path: Path) -> Result<(), MountError> {
        self.editor
            .select_node(path)
            .map_err(plate_core::ApplyError::from)?;
        self.after_change(false);
        Ok(())
    }

    /// Route a key through the slash menu first. Keys it does not consume
    /// edit the document when they are text keys.
    pub fn key_down(&mut self, key: Key) -> Result<KeyDisposition, MountError> {
        let outcome = self
            .menu
            .key_down(&key, &mut self.editor, self.prompt.as_mut());
        match outcome {
            Ok(KeyOutcome::Propagate) => {}
            Ok(KeyOutcome::Consumed) => {
                self.after_change(false);
                return Ok(KeyDisposition::Consumed);
            }
            Ok(KeyOutcome::Committed { changed }) => {
                self.after_change(changed);
                return Ok(KeyDisposition::Consumed);
            }
            Err(err) => return Err(self.report(err)),
        }

        match key {
            Key::Char(ch) => self.insert_text(ch.encode_utf8(&mut [0; 4]))?,
            Key::Backspace => {
                self.backspace()?;
            }
            Key::ArrowUp | Key::ArrowDown | Key::Enter | Key::Escape => {}
        }
        Ok(KeyDisposition::Propagate)
    }

    /// Commit the candidate at `index`, as when the host's menu row is clicked.
    pub fn click_candidate(&mut self, index: usize) -> Result<bool, MountError> {
        match self
            .menu
            .click(index, &mut self.editor, self.prompt.as_mut())
        {
            Ok(outcome) => {
                self.after_change(outcome.changed());
                Ok(outcome.ran())
            }
            Err(err) => Err(self.report(err)),
        }
    }

    pub fn toggle_mark(&mut self, kind: MarkKind) -> Result<bool, MountError> {
        let changed = self.toolbar.toggle_mark(kind, &mut self.editor)?;
        self.after_change(changed);
        Ok(changed)
    }

    pub fn toggle_node_selector(&mut self) {
        self.toolbar.toggle_node_selector();
    }

    pub fn toggle_link_editor(&mut self) {
        self.toolbar.toggle_link_editor();
    }

    pub fn select_node_type(&mut self, node_type: NodeType) -> Result<(), MountError> {
        self.toolbar.select_node_type(node_type, &mut self.editor)?;
        self.after_change(true);
        Ok(())
    }

    pub fn link_value(&self) -> Option<String> {
        self.toolbar.link_value(&self.editor)
    }

    pub fn submit_link(&mut self, url: &str) -> Result<(), MountError> {
        self.toolbar.submit_link(url, &mut self.editor)?;
        self.after_change(true);
        Ok(())
    }

    pub fn remove_link(&mut self) -> Result<(), MountError> {
        self.toolbar.remove_link(&mut self.editor)?;
        self.after_change(true);
        Ok(())
    }

    pub fn undo(&mut self) -> bool {
        let undone = self.editor.undo();
        self.after_change(undone);
        undone
    }

    pub fn redo(&mut self) -> bool {
        let redone = self.editor.redo();
        self.after_change(redone);
        redone
    }

    fn refresh(&mut self) {
        self.menu.sync(&self.editor, self.geometry.as_ref());
        self.toolbar.update(&self.editor);
    }

    fn after_change(&mut self, mutated: bool) {
        self.refresh();
        if !mutated {
            return;
        }
        if let Some(on_change) = self.on_change.as_mut() {
            on_change(&self.editor.value());
        }
    }

    /// Hand a failed commit to the host. The document was already rolled
    /// back, so only menu and toolbar state need a refresh.
    fn report(&mut self, err: CommitError) -> MountError {
        self.refresh();
        match self.on_error.as_mut() {
            Some(on_error) => on_error(&err),
            None => tracing::warn!(error = %err, "unreported slash command failure"),
        }
        MountError::Commit(err)
    }
}

fn no_prompt(_message: &str) -> Option<String> {
    None
}
