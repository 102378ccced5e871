use std::ops::Range;

use plate_core::BlockRange;

use crate::catalog::{CommandCatalog, CommandContext, Prompt, SlashCommand};
use crate::config::SlashConfig;
use crate::error::CommitError;
use crate::geometry::{Bounds, Placement, RangeGeometry, Side, place_popup};
use crate::model::DocumentModel;
use crate::trigger::{CloseReason, Detection, TriggerDetector, TriggerMatch};

/// Keys the editor forwards while it has focus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    Enter,
    Escape,
    Backspace,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDisposition {
    /// The menu handled the key; the editor must not see it.
    Consumed,
    Propagate,
}

/// State of one trigger-to-commit interaction. Created when the menu opens,
/// dropped when it closes.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandSession {
    pub range: BlockRange,
    pub query: String,
    /// Screen rectangle of `range`; `None` while the host cannot lay it out.
    pub anchor: Option<Bounds>,
}

#[derive(Debug, Clone)]
struct OpenMenu {
    session: CommandSession,
    candidates: Vec<usize>,
    selected_index: usize,
    scroll_top: usize,
    placement: Option<Placement>,
}

#[derive(Debug, Clone, Default)]
enum MenuState {
    #[default]
    Closed,
    Open(OpenMenu),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChange {
    Unchanged,
    Opened,
    Updated,
    Closed(CloseReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    Propagate,
    Consumed,
    /// A command ran and the menu closed.
    Committed { changed: bool },
}

impl KeyOutcome {
    pub fn disposition(&self) -> KeyDisposition {
        match self {
            KeyOutcome::Propagate => KeyDisposition::Propagate,
            KeyOutcome::Consumed | KeyOutcome::Committed { .. } => KeyDisposition::Consumed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Nothing to run; the menu stays open.
    Skipped,
    /// The command ran without touching the document.
    Unchanged,
    Changed,
}

impl CommitOutcome {
    pub fn ran(&self) -> bool {
        !matches!(self, CommitOutcome::Skipped)
    }

    pub fn changed(&self) -> bool {
        matches!(self, CommitOutcome::Changed)
    }
}

/// One visible row of the menu.
#[derive(Debug, Clone, Copy)]
pub struct MenuItem<'a> {
    /// Position in the candidate list.
    pub index: usize,
    pub command: &'a SlashCommand,
    pub selected: bool,
}

/// The slash-command menu: owns the trigger detector, the live session and
/// the candidate selection.
pub struct CommandMenu {
    catalog: CommandCatalog,
    detector: TriggerDetector,
    config: SlashConfig,
    state: MenuState,
}

impl CommandMenu {
    pub fn new(catalog: CommandCatalog, config: SlashConfig) -> Self {
        Self {
            detector: TriggerDetector::new(&config),
            catalog,
            config,
            state: MenuState::Closed,
        }
    }

    pub fn catalog(&self) -> &CommandCatalog {
        &self.catalog
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, MenuState::Open(_))
    }

    pub fn session(&self) -> Option<&CommandSession> {
        self.open().map(|open| &open.session)
    }

    /// Candidate catalog indices. Empty while closed.
    pub fn candidates(&self) -> &[usize] {
        self.open().map_or(&[], |open| open.candidates.as_slice())
    }

    pub fn candidate_titles(&self) -> Vec<&str> {
        self.candidates()
            .iter()
            .filter_map(|&ix| self.catalog.get(ix))
            .map(|command| command.title.as_str())
            .collect()
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.open().map(|open| open.selected_index)
    }

    pub fn selected_command(&self) -> Option<&SlashCommand> {
        let open = self.open()?;
        let &ix = open.candidates.get(open.selected_index)?;
        self.catalog.get(ix)
    }

    /// Where the menu goes on screen. `None` while closed or while the anchor
    /// cannot be measured; the session stays alive either way.
    pub fn placement(&self) -> Option<Placement> {
        self.open().and_then(|open| open.placement)
    }

    /// Candidate positions currently scrolled into view.
    pub fn visible_range(&self) -> Range<usize> {
        match self.open() {
            Some(open) => {
                let end = (open.scroll_top + self.config.max_visible_items).min(open.candidates.len());
                open.scroll_top..end
            }
            None => 0..0,
        }
    }

    pub fn visible_items(&self) -> Vec<MenuItem<'_>> {
        let Some(open) = self.open() else {
            return Vec::new();
        };
        self.visible_range()
            .filter_map(|index| {
                let command = self.catalog.get(open.candidates[index])?;
                Some(MenuItem {
                    index,
                    command,
                    selected: index == open.selected_index,
                })
            })
            .collect()
    }

    /// Re-run trigger detection against the current document and caret, and
    /// bring the menu in line with the result.
    pub fn sync(&mut self, model: &dyn DocumentModel, geometry: &dyn RangeGeometry) -> MenuChange {
        let caret = model.caret();
        let text = caret
            .as_ref()
            .and_then(|caret| model.block_text(&caret.block))
            .unwrap_or_default();

        match self.detector.detect(caret.as_ref(), &text) {
            Detection::Idle => MenuChange::Unchanged,
            Detection::Opened(found) => {
                self.open_session(found, geometry);
                MenuChange::Opened
            }
            Detection::Updated(found) => {
                self.update_session(found, geometry);
                MenuChange::Updated
            }
            Detection::Closed(reason) => {
                self.close(reason);
                MenuChange::Closed(reason)
            }
        }
    }

    pub fn select_next(&mut self) {
        self.navigate(|selected, len| (selected + 1) % len);
    }

    pub fn select_previous(&mut self) {
        self.navigate(|selected, len| (selected + len - 1) % len);
    }

    /// Close without touching the document. The trigger stays dismissed until
    /// the caret moves back over it.
    pub fn cancel(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.detector.dismiss();
        self.close(CloseReason::Cancelled);
        true
    }

    pub fn key_down(
        &mut self,
        key: &Key,
        model: &mut dyn DocumentModel,
        prompt: &mut Prompt<'_>,
    ) -> Result<KeyOutcome, CommitError> {
        if !self.is_open() {
            return Ok(KeyOutcome::Propagate);
        }
        match key {
            Key::ArrowDown => self.select_next(),
            Key::ArrowUp => self.select_previous(),
            Key::Escape => {
                self.cancel();
            }
            Key::Enter => {
                let outcome = self.commit(model, prompt)?;
                return Ok(if outcome.ran() {
                    KeyOutcome::Committed {
                        changed: outcome.changed(),
                    }
                } else {
                    KeyOutcome::Consumed
                });
            }
            Key::Backspace | Key::Char(_) => return Ok(KeyOutcome::Propagate),
        }
        Ok(KeyOutcome::Consumed)
    }

    /// Run the command at candidate position `index`, as when it is clicked.
    pub fn click(
        &mut self,
        index: usize,
        model: &mut dyn DocumentModel,
        prompt: &mut Prompt<'_>,
    ) -> Result<CommitOutcome, CommitError> {
        match &mut self.state {
            MenuState::Open(open) if index < open.candidates.len() => {
                open.selected_index = index;
            }
            _ => return Ok(CommitOutcome::Skipped),
        }
        self.commit(model, prompt)
    }

    /// Execute the selected candidate and close. Skips, leaving the menu
    /// open, when there is nothing to run.
    ///
    /// A failing command is rolled back to the pre-commit document and its
    /// trigger is dismissed, so the menu does not immediately reopen. A
    /// command that succeeds but leaves the trigger text in place dismisses
    /// it the same way.
    pub fn commit(
        &mut self,
        model: &mut dyn DocumentModel,
        prompt: &mut Prompt<'_>,
    ) -> Result<CommitOutcome, CommitError> {
        let Some(open) = self.open() else {
            return Ok(CommitOutcome::Skipped);
        };
        let Some(&command_ix) = open.candidates.get(open.selected_index) else {
            tracing::trace!(query = %open.session.query, "enter with no candidates");
            return Ok(CommitOutcome::Skipped);
        };
        let range = open.session.range.clone();
        let title = self
            .catalog
            .get(command_ix)
            .map(|command| command.title.clone())
            .unwrap_or_default();
        self.state = MenuState::Closed;

        let trigger_text = model.text_in_range(&range);
        let before = model.content();
        let checkpoint = model.checkpoint();
        let result = {
            let mut cx = CommandContext::new(&mut *model, range.clone(), prompt);
            self.catalog.execute(command_ix, &mut cx)
        };

        match result {
            Ok(()) => {
                if trigger_text.is_some() && model.text_in_range(&range) == trigger_text {
                    self.detector.dismiss();
                } else {
                    self.detector.reset();
                }
                let changed = model.content() != before;
                tracing::debug!(%title, trigger = ?trigger_text, changed, "slash command committed");
                Ok(if changed {
                    CommitOutcome::Changed
                } else {
                    CommitOutcome::Unchanged
                })
            }
            Err(source) => {
                model.rollback(checkpoint);
                self.detector.dismiss();
                tracing::warn!(%title, error = %source, "slash command failed, rolled back");
                Err(CommitError { title, source })
            }
        }
    }

    fn open(&self) -> Option<&OpenMenu> {
        match &self.state {
            MenuState::Open(open) => Some(open),
            MenuState::Closed => None,
        }
    }

    fn open_session(&mut self, found: TriggerMatch, geometry: &dyn RangeGeometry) {
        let candidates = self.catalog.filter(&found.query);
        tracing::debug!(
            query = %found.query,
            candidates = candidates.len(),
            "slash menu opened"
        );
        let mut open = OpenMenu {
            session: CommandSession {
                range: found.range,
                query: found.query,
                anchor: None,
            },
            candidates,
            selected_index: 0,
            scroll_top: 0,
            placement: None,
        };
        self.position(&mut open, geometry);
        self.state = MenuState::Open(open);
    }

    fn update_session(&mut self, found: TriggerMatch, geometry: &dyn RangeGeometry) {
        let MenuState::Open(mut open) = std::mem::take(&mut self.state) else {
            self.open_session(found, geometry);
            return;
        };
        if open.session.query != found.query {
            open.candidates = self.catalog.filter(&found.query);
            open.selected_index = 0;
            open.scroll_top = 0;
            tracing::trace!(
                query = %found.query,
                candidates = open.candidates.len(),
                "slash menu filtered"
            );
        }
        open.session.range = found.range;
        open.session.query = found.query;
        self.position(&mut open, geometry);
        self.state = MenuState::Open(open);
    }

    fn position(&self, open: &mut OpenMenu, geometry: &dyn RangeGeometry) {
        open.session.anchor = geometry
            .screen_rect(&open.session.range)
            .filter(|rect| !rect.is_empty());
        open.placement = open.session.anchor.map(|anchor| {
            place_popup(
                anchor,
                self.config.menu_width,
                self.config.menu_height(open.candidates.len()),
                geometry.viewport(),
                self.config.menu_gap,
                Side::Below,
            )
        });
        if open.placement.is_none() {
            tracing::trace!(range = ?open.session.range, "slash menu anchor unavailable");
        }
    }

    fn navigate(&mut self, step: impl Fn(usize, usize) -> usize) {
        let max_visible = self.config.max_visible_items;
        let MenuState::Open(open) = &mut self.state else {
            return;
        };
        let len = open.candidates.len();
        if len == 0 {
            return;
        }
        open.selected_index = step(open.selected_index, len);
        if open.selected_index < open.scroll_top {
            open.scroll_top = open.selected_index;
        } else if open.selected_index >= open.scroll_top + max_visible {
            open.scroll_top = open.selected_index + 1 - max_visible;
        }
        tracing::trace!(selected = open.selected_index, "slash menu navigate");
    }

    fn close(&mut self, reason: CloseReason) {
        if let MenuState::Open(open) = std::mem::take(&mut self.state) {
            tracing::debug!(?reason, query = %open.session.query, "slash menu closed");
        }
    }
}
