mod blocks;
mod core;
mod marks;
mod ops;
mod plugin;
mod tree;
mod value;

pub use crate::blocks::ActiveBlock;
pub use crate::core::*;
pub use crate::marks::MarkCoverage;
pub use crate::ops::*;
pub use crate::plugin::*;
pub use crate::value::*;
