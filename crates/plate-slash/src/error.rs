use plate_core::{ApplyError, QueryError};

/// Rejected command catalogs. Raised while mounting, never at runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("command catalog is empty")]
    Empty,
    #[error("duplicate command title `{0}`")]
    DuplicateTitle(String),
    #[error("command title must not be blank")]
    BlankTitle,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("trigger character {0:?} must be a visible character")]
    InvalidTrigger(char),
    #[error("trigger character {0:?} cannot also be an allowed prefix")]
    TriggerIsPrefix(char),
    #[error("max_visible_items must be at least 1")]
    NoVisibleItems,
}

/// Failure while running a slash command or a toolbar action.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error(transparent)]
    Engine(#[from] plate_core::CommandError),
    #[error(transparent)]
    Apply(#[from] ApplyError),
    #[error(transparent)]
    Query(#[from] QueryError),
    #[error("failed to decode query result: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0}")]
    Action(String),
}

impl CommandError {
    pub fn action(message: impl Into<String>) -> Self {
        Self::Action(message.into())
    }
}

/// A command picked from the menu failed; the document was rolled back.
#[derive(Debug, thiserror::Error)]
#[error("command `{title}` failed: {source}")]
pub struct CommitError {
    pub title: String,
    #[source]
    pub source: CommandError,
}

#[derive(Debug, thiserror::Error)]
pub enum MountError {
    #[error("invalid slash config: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid command catalog: {0}")]
    Catalog(#[from] CatalogError),
    #[error("invalid initial content: {0}")]
    Content(#[source] serde_json::Error),
    #[error("unsupported content schema `{0}`")]
    Schema(String),
    #[error(transparent)]
    Edit(#[from] ApplyError),
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Commit(#[from] CommitError),
}
