use plate_core::{BlockPoint, BlockRange, Checkpoint, DocumentValue, Editor};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::CommandError;

/// Selection facts the toolbar needs, independent of the engine's own
/// selection representation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionInfo {
    /// Text selection in document order, if the selection is inside text.
    pub bounds: Option<(BlockPoint, BlockPoint)>,
    /// A whole node (an image, a divider) is selected.
    pub node_selected: bool,
}

impl SelectionInfo {
    /// True for an expanded text selection.
    pub fn is_range(&self) -> bool {
        self.bounds
            .as_ref()
            .is_some_and(|(start, end)| start != end)
    }
}

/// The document operations the slash menu and the selection toolbar rely on.
///
/// Mutations go through [`DocumentModel::delete_range`] and registered
/// engine commands only, so the engine keeps its own undo history and
/// normalization guarantees.
pub trait DocumentModel {
    fn caret(&self) -> Option<BlockPoint>;
    fn selection_info(&self) -> SelectionInfo;
    fn block_text(&self, block: &[usize]) -> Option<String>;
    fn text_in_range(&self, range: &BlockRange) -> Option<String>;
    fn delete_range(&mut self, range: &BlockRange) -> Result<(), CommandError>;
    fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), CommandError>;
    fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, CommandError>;
    fn checkpoint(&self) -> Checkpoint;
    fn rollback(&mut self, checkpoint: Checkpoint);
    fn content(&self) -> DocumentValue;
}

/// Run a query and decode its JSON result.
pub fn query<T: DeserializeOwned>(
    model: &dyn DocumentModel,
    id: &str,
    args: Option<Value>,
) -> Result<T, CommandError> {
    let value = model.run_query_json(id, args)?;
    Ok(serde_json::from_value(value)?)
}

impl DocumentModel for Editor {
    fn caret(&self) -> Option<BlockPoint> {
        Editor::caret(self)
    }

    fn selection_info(&self) -> SelectionInfo {
        SelectionInfo {
            bounds: self.selection_bounds(),
            node_selected: self.selected_node().is_some(),
        }
    }

    fn block_text(&self, block: &[usize]) -> Option<String> {
        Editor::block_text(self, block)
    }

    fn text_in_range(&self, range: &BlockRange) -> Option<String> {
        Editor::text_in_range(self, range)
    }

    fn delete_range(&mut self, range: &BlockRange) -> Result<(), CommandError> {
        Ok(Editor::delete_range(self, range)?)
    }

    fn run_command(&mut self, id: &str, args: Option<Value>) -> Result<(), CommandError> {
        Ok(Editor::run_command(self, id, args)?)
    }

    fn run_query_json(&self, id: &str, args: Option<Value>) -> Result<Value, CommandError> {
        Ok(Editor::run_query_json(self, id, args)?)
    }

    fn checkpoint(&self) -> Checkpoint {
        Editor::checkpoint(self)
    }

    fn rollback(&mut self, checkpoint: Checkpoint) {
        Editor::rollback(self, checkpoint)
    }

    fn content(&self) -> DocumentValue {
        self.value()
    }
}
