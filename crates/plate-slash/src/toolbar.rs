use std::collections::BTreeSet;

use plate_core::{ActiveBlock, MarkCoverage};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::CommandError;
use crate::model::{DocumentModel, query};
use crate::node_type::NodeType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MarkKind {
    Bold,
    Italic,
    Underline,
    Strike,
    Code,
    Link,
}

impl MarkKind {
    pub const ALL: [MarkKind; 6] = [
        MarkKind::Bold,
        MarkKind::Italic,
        MarkKind::Underline,
        MarkKind::Strike,
        MarkKind::Code,
        MarkKind::Link,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MarkKind::Bold => "bold",
            MarkKind::Italic => "italic",
            MarkKind::Underline => "underline",
            MarkKind::Strike => "strike",
            MarkKind::Code => "code",
            MarkKind::Link => "link",
        }
    }

    fn covered(&self, coverage: &MarkCoverage) -> bool {
        match self {
            MarkKind::Bold => coverage.bold,
            MarkKind::Italic => coverage.italic,
            MarkKind::Underline => coverage.underline,
            MarkKind::Strike => coverage.strikethrough,
            MarkKind::Code => coverage.code,
            MarkKind::Link => coverage.link,
        }
    }

    fn toggle_command(&self) -> &'static str {
        match self {
            MarkKind::Bold => "marks.toggle_bold",
            MarkKind::Italic => "marks.toggle_italic",
            MarkKind::Underline => "marks.toggle_underline",
            MarkKind::Strike => "marks.toggle_strikethrough",
            MarkKind::Code => "marks.toggle_code",
            MarkKind::Link => "marks.unset_link",
        }
    }
}

/// Sub-overlays hosted by the toolbar. At most one is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Overlay {
    NodeSelector,
    LinkEditor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeTypeItem {
    pub node_type: NodeType,
    pub label: String,
    pub active: bool,
}

/// The bubble toolbar shown over a text selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionToolbar {
    visible: bool,
    active_marks: BTreeSet<MarkKind>,
    active_block: Option<ActiveBlock>,
    overlay: Option<Overlay>,
}

impl SelectionToolbar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn active_marks(&self) -> &BTreeSet<MarkKind> {
        &self.active_marks
    }

    pub fn is_active(&self, kind: MarkKind) -> bool {
        self.active_marks.contains(&kind)
    }

    pub fn overlay(&self) -> Option<Overlay> {
        self.overlay
    }

    /// Recompute visibility and mark state from the current selection.
    /// Hiding the toolbar closes any open overlay.
    pub fn update(&mut self, model: &dyn DocumentModel) {
        let info = model.selection_info();
        let visible = info.is_range() && !info.node_selected;
        if self.visible != visible {
            tracing::trace!(visible, "selection toolbar visibility");
        }
        self.visible = visible;

        if !visible {
            self.active_marks.clear();
            self.active_block = None;
            self.close_overlays();
            return;
        }

        self.active_marks = match query::<MarkCoverage>(model, "marks.covering", None) {
            Ok(coverage) => MarkKind::ALL
                .into_iter()
                .filter(|kind| kind.covered(&coverage))
                .collect(),
            Err(err) => {
                tracing::warn!(error = %err, "mark coverage query failed");
                BTreeSet::new()
            }
        };
        self.active_block = query::<ActiveBlock>(model, "block.active", None)
            .inspect_err(|err| tracing::warn!(error = %err, "active block query failed"))
            .ok();
    }

    /// Toggle `kind` over the whole selection: remove it when it covers the
    /// selection, apply it otherwise. An inactive link opens the link editor
    /// instead, since it needs a URL. Returns whether the document changed.
    pub fn toggle_mark(
        &mut self,
        kind: MarkKind,
        model: &mut dyn DocumentModel,
    ) -> Result<bool, CommandError> {
        if !self.visible {
            return Ok(false);
        }
        if kind == MarkKind::Link && !self.is_active(MarkKind::Link) {
            self.open_overlay(Overlay::LinkEditor);
            return Ok(false);
        }
        tracing::debug!(mark = kind.name(), "toolbar toggle");
        model.run_command(kind.toggle_command(), None)?;
        self.update(model);
        Ok(true)
    }

    pub fn toggle_node_selector(&mut self) {
        self.toggle_overlay(Overlay::NodeSelector);
    }

    pub fn toggle_link_editor(&mut self) {
        self.toggle_overlay(Overlay::LinkEditor);
    }

    pub fn close_overlays(&mut self) {
        self.overlay = None;
    }

    /// The node selector entries, with the ones matching the focused block
    /// marked active.
    pub fn node_types(&self) -> Vec<NodeTypeItem> {
        NodeType::SELECTOR
            .into_iter()
            .map(|node_type| NodeTypeItem {
                label: node_type.label(),
                active: self
                    .active_block
                    .as_ref()
                    .is_some_and(|block| node_type.is_active(block)),
                node_type,
            })
            .collect()
    }

    /// Label shown on the node selector button.
    pub fn active_node_label(&self) -> String {
        self.node_types()
            .into_iter()
            .find(|item| item.active)
            .map_or_else(|| "Multiple".to_string(), |item| item.label)
    }

    pub fn select_node_type(
        &mut self,
        node_type: NodeType,
        model: &mut dyn DocumentModel,
    ) -> Result<(), CommandError> {
        self.close_overlays();
        node_type.apply(model)?;
        self.update(model);
        Ok(())
    }

    /// Initial value of the link editor input.
    pub fn link_value(&self, model: &dyn DocumentModel) -> Option<String> {
        query::<Option<String>>(model, "marks.link_href", None)
            .inspect_err(|err| tracing::warn!(error = %err, "link query failed"))
            .ok()
            .flatten()
    }

    /// Set the link on the whole selection; an empty URL removes it.
    pub fn submit_link(
        &mut self,
        url: &str,
        model: &mut dyn DocumentModel,
    ) -> Result<(), CommandError> {
        let url = url.trim();
        let result = if url.is_empty() {
            model.run_command("marks.unset_link", None)
        } else {
            model.run_command("marks.set_link", Some(json!({ "url": url })))
        };
        self.close_overlays();
        result?;
        self.update(model);
        Ok(())
    }

    pub fn remove_link(&mut self, model: &mut dyn DocumentModel) -> Result<(), CommandError> {
        self.submit_link("", model)
    }

    fn toggle_overlay(&mut self, overlay: Overlay) {
        if self.overlay == Some(overlay) {
            self.overlay = None;
        } else {
            self.open_overlay(overlay);
        }
    }

    fn open_overlay(&mut self, overlay: Overlay) {
        if !self.visible {
            return;
        }
        self.overlay = Some(overlay);
    }
}
