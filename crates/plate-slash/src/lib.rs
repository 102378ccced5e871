//! Slash-command menu and selection toolbar for `plate-core` documents.
//!
//! [`EditorMount`] wires both to an editor: typed text runs through the
//! [`TriggerDetector`], the [`CommandMenu`] filters the [`CommandCatalog`] and
//! commits commands, and the [`SelectionToolbar`] follows the selection.

mod catalog;
mod config;
mod error;
mod geometry;
mod menu;
mod model;
mod mount;
mod node_type;
mod toolbar;
mod trigger;

pub use crate::catalog::*;
pub use crate::config::SlashConfig;
pub use crate::error::*;
pub use crate::geometry::*;
pub use crate::menu::*;
pub use crate::model::*;
pub use crate::mount::*;
pub use crate::node_type::NodeType;
pub use crate::toolbar::*;
pub use crate::trigger::*;
