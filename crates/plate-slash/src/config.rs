use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Host configuration for the slash-command menu.
///
/// Every field has a default, so a host can deserialize a partial object:
///
/// ```json
/// { "trigger": "/", "allow_spaces": true }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlashConfig {
    pub trigger: char,
    /// Keep the session open when the query contains whitespace.
    pub allow_spaces: bool,
    /// Characters allowed directly before the trigger. `None` allows any
    /// whitespace.
    pub allowed_prefixes: Option<Vec<char>>,
    pub start_of_block_only: bool,
    pub max_visible_items: usize,
    pub menu_width: f32,
    pub item_height: f32,
    /// Distance between the anchor and the menu.
    pub menu_gap: f32,
}

impl Default for SlashConfig {
    fn default() -> Self {
        Self {
            trigger: '/',
            allow_spaces: false,
            allowed_prefixes: None,
            start_of_block_only: false,
            max_visible_items: 7,
            menu_width: 288.0,
            item_height: 46.0,
            menu_gap: 8.0,
        }
    }
}

impl SlashConfig {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trigger.is_whitespace() || self.trigger.is_control() {
            return Err(ConfigError::InvalidTrigger(self.trigger));
        }
        if self
            .allowed_prefixes
            .as_ref()
            .is_some_and(|prefixes| prefixes.contains(&self.trigger))
        {
            return Err(ConfigError::TriggerIsPrefix(self.trigger));
        }
        if self.max_visible_items == 0 {
            return Err(ConfigError::NoVisibleItems);
        }
        Ok(())
    }

    /// Height of the menu when it shows `rows` candidates.
    pub(crate) fn menu_height(&self, rows: usize) -> f32 {
        rows.min(self.max_visible_items) as f32 * self.item_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SlashConfig::from_json_str(r#"{ "allow_spaces": true }"#).unwrap();
        assert!(config.allow_spaces);
        assert_eq!(config.trigger, '/');
        assert_eq!(config.max_visible_items, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_invisible_triggers() {
        let config = SlashConfig {
            trigger: ' ',
            ..SlashConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::InvalidTrigger(' ')));
    }

    #[test]
    fn rejects_trigger_listed_as_prefix() {
        let config = SlashConfig {
            allowed_prefixes: Some(vec![' ', '/']),
            ..SlashConfig::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::TriggerIsPrefix('/')));
    }
}
