use plate_core::ActiveBlock;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::CommandError;
use crate::model::DocumentModel;

/// Block conversions offered by the slash menu and the toolbar's node
/// selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    Text,
    Heading(u8),
    TodoList,
    BulletList,
    NumberedList,
    Quote,
    Code,
}

impl NodeType {
    /// Node selector entries, in display order.
    pub const SELECTOR: [NodeType; 9] = [
        NodeType::Text,
        NodeType::Heading(1),
        NodeType::Heading(2),
        NodeType::Heading(3),
        NodeType::TodoList,
        NodeType::BulletList,
        NodeType::NumberedList,
        NodeType::Quote,
        NodeType::Code,
    ];

    pub fn label(&self) -> String {
        match self {
            NodeType::Text => "Text".to_string(),
            NodeType::Heading(level) => format!("Heading {level}"),
            NodeType::TodoList => "To-do List".to_string(),
            NodeType::BulletList => "Bullet List".to_string(),
            NodeType::NumberedList => "Numbered List".to_string(),
            NodeType::Quote => "Quote".to_string(),
            NodeType::Code => "Code".to_string(),
        }
    }

    pub fn is_active(&self, block: &ActiveBlock) -> bool {
        match self {
            NodeType::Text => block.kind == "paragraph" && !block.in_blockquote,
            NodeType::Heading(level) => {
                block.kind == "heading" && block.level == Some(u64::from(*level))
            }
            NodeType::TodoList => block.kind == "todo_item",
            NodeType::BulletList => is_list(block, "bulleted"),
            NodeType::NumberedList => is_list(block, "ordered"),
            NodeType::Quote => block.in_blockquote,
            NodeType::Code => block.kind == "code_block",
        }
    }

    /// Convert the selected blocks through the engine's block commands.
    pub fn apply(&self, model: &mut dyn DocumentModel) -> Result<(), CommandError> {
        match self {
            NodeType::Text => model.run_command("block.set_paragraph", None),
            NodeType::Heading(level) => {
                model.run_command("block.set_heading", Some(json!({ "level": level })))
            }
            NodeType::TodoList => model.run_command("todo.toggle", None),
            NodeType::BulletList => model.run_command("list.toggle_bulleted", None),
            NodeType::NumberedList => model.run_command("list.toggle_ordered", None),
            NodeType::Quote => {
                model.run_command("block.set_paragraph", None)?;
                model.run_command("blockquote.toggle", None)
            }
            NodeType::Code => model.run_command("code_block.toggle", None),
        }
    }
}

fn is_list(block: &ActiveBlock, list_type: &str) -> bool {
    block.kind == "list_item" && block.list_type.as_deref() == Some(list_type)
}
