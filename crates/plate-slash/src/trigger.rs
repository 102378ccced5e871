use plate_core::{BlockPoint, BlockRange};
use serde::{Deserialize, Serialize};

use crate::config::SlashConfig;

/// A live trigger: the range covers the trigger character and the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerMatch {
    pub range: BlockRange,
    pub query: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    /// The caret left the trigger range, the block, or stopped being a caret.
    CursorLeft,
    SpaceTyped,
    TriggerDeleted,
    /// Escape, or an explicit cancel from the host.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    Idle,
    Opened(TriggerMatch),
    Updated(TriggerMatch),
    Closed(CloseReason),
}

/// Decides, from the caret and the text of its block, whether a command
/// session is live.
#[derive(Debug, Clone)]
pub struct TriggerDetector {
    trigger: char,
    allow_spaces: bool,
    allowed_prefixes: Option<Vec<char>>,
    start_of_block_only: bool,
    /// Position of the trigger character of the live session.
    active: Option<BlockPoint>,
    /// A cancelled trigger that must not reopen while the caret stays after it.
    dismissed: Option<BlockPoint>,
}

impl TriggerDetector {
    pub fn new(config: &SlashConfig) -> Self {
        Self {
            trigger: config.trigger,
            allow_spaces: config.allow_spaces,
            allowed_prefixes: config.allowed_prefixes.clone(),
            start_of_block_only: config.start_of_block_only,
            active: None,
            dismissed: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_trigger(&self) -> Option<&BlockPoint> {
        self.active.as_ref()
    }

    /// Re-evaluate after a document or selection change. `block_text` is the
    /// inline text of the caret's block, ignored without a caret.
    pub fn detect(&mut self, caret: Option<&BlockPoint>, block_text: &str) -> Detection {
        let Some(caret) = caret else {
            return self.close(CloseReason::CursorLeft);
        };
        self.expire_dismissal(caret, block_text);
        let Some(before) = block_text.get(..caret.offset) else {
            return self.close(CloseReason::CursorLeft);
        };

        match self.active.clone() {
            Some(trigger) => self.track(trigger, caret, block_text, before),
            None => self.open(caret, before),
        }
    }

    /// Close the live session and remember its trigger so it does not reopen
    /// until the caret moves away.
    pub fn dismiss(&mut self) -> Detection {
        match self.active.take() {
            Some(trigger) => {
                self.dismissed = Some(trigger);
                Detection::Closed(CloseReason::Cancelled)
            }
            None => Detection::Idle,
        }
    }

    /// Forget the live session without dismissing it, after a commit removed
    /// the trigger text.
    pub fn reset(&mut self) {
        self.active = None;
    }

    fn track(
        &mut self,
        trigger: BlockPoint,
        caret: &BlockPoint,
        block_text: &str,
        before: &str,
    ) -> Detection {
        if trigger.block != caret.block {
            return self.close(CloseReason::CursorLeft);
        }
        let trigger_present = block_text
            .get(trigger.offset..)
            .is_some_and(|rest| rest.starts_with(self.trigger));
        if !trigger_present {
            return self.close(CloseReason::TriggerDeleted);
        }
        if caret.offset <= trigger.offset {
            return self.close(CloseReason::CursorLeft);
        }
        let Some(query) = before
            .get(trigger.offset..)
            .and_then(|rest| rest.strip_prefix(self.trigger))
        else {
            return self.close(CloseReason::TriggerDeleted);
        };

        let query_start = trigger.offset + self.trigger.len_utf8();
        let newer = query
            .match_indices(self.trigger)
            .map(|(ix, _)| query_start + ix)
            .rev()
            .find(|&offset| offset == query_start || self.prefix_allows(&before[..offset]));
        if let Some(offset) = newer {
            let trigger = BlockPoint::new(caret.block.clone(), offset);
            tracing::trace!(offset, "newer trigger replaces the live session");
            self.active = Some(trigger.clone());
            return Detection::Opened(self.matched(trigger, caret, before));
        }

        if !self.allow_spaces && query.contains(char::is_whitespace) {
            return self.close(CloseReason::SpaceTyped);
        }
        Detection::Updated(self.matched(trigger, caret, before))
    }

    fn open(&mut self, caret: &BlockPoint, before: &str) -> Detection {
        if !before.ends_with(self.trigger) {
            return Detection::Idle;
        }
        let offset = caret.offset - self.trigger.len_utf8();
        let trigger = BlockPoint::new(caret.block.clone(), offset);
        if self.dismissed.as_ref() == Some(&trigger) {
            return Detection::Idle;
        }
        if !self.prefix_allows(&before[..offset]) {
            return Detection::Idle;
        }
        self.dismissed = None;
        self.active = Some(trigger.clone());
        Detection::Opened(self.matched(trigger, caret, before))
    }

    fn matched(&self, trigger: BlockPoint, caret: &BlockPoint, before: &str) -> TriggerMatch {
        let query_start = trigger.offset + self.trigger.len_utf8();
        TriggerMatch {
            query: before.get(query_start..).unwrap_or_default().to_string(),
            range: BlockRange::new(trigger.block, trigger.offset..caret.offset),
        }
    }

    fn prefix_allows(&self, prefix: &str) -> bool {
        let Some(prev) = prefix.chars().next_back() else {
            return true;
        };
        if self.start_of_block_only {
            return false;
        }
        match &self.allowed_prefixes {
            Some(allowed) => allowed.contains(&prev),
            None => prev.is_whitespace(),
        }
    }

    fn expire_dismissal(&mut self, caret: &BlockPoint, block_text: &str) {
        let Some(dismissed) = &self.dismissed else {
            return;
        };
        let still_there = block_text
            .get(dismissed.offset..)
            .is_some_and(|rest| rest.starts_with(self.trigger));
        if dismissed.block != caret.block || caret.offset <= dismissed.offset || !still_there {
            self.dismissed = None;
        }
    }

    fn close(&mut self, reason: CloseReason) -> Detection {
        match self.active.take() {
            Some(_) => Detection::Closed(reason),
            None => Detection::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> TriggerDetector {
        TriggerDetector::new(&SlashConfig::default())
    }

    fn at(offset: usize) -> BlockPoint {
        BlockPoint::new(vec![0], offset)
    }

    fn opened(query: &str, range: std::ops::Range<usize>) -> Detection {
        Detection::Opened(TriggerMatch {
            range: BlockRange::new(vec![0], range),
            query: query.to_string(),
        })
    }

    fn updated(query: &str, range: std::ops::Range<usize>) -> Detection {
        Detection::Updated(TriggerMatch {
            range: BlockRange::new(vec![0], range),
            query: query.to_string(),
        })
    }

    #[test]
    fn opens_at_block_start_and_after_whitespace() {
        let mut d = detector();
        assert_eq!(d.detect(Some(&at(1)), "/"), opened("", 0..1));

        let mut d = detector();
        assert_eq!(d.detect(Some(&at(4)), "hi /"), opened("", 3..4));
    }

    #[test]
    fn mid_word_trigger_never_opens() {
        let mut d = detector();
        for (offset, text) in [(4, "abc/"), (5, "abc/d"), (7, "abc/def")] {
            assert_eq!(d.detect(Some(&at(offset)), text), Detection::Idle);
        }
    }

    #[test]
    fn query_tracks_typing_and_space_closes() {
        let mut d = detector();
        d.detect(Some(&at(1)), "/");
        assert_eq!(d.detect(Some(&at(2)), "/h"), updated("h", 0..2));
        assert_eq!(d.detect(Some(&at(3)), "/he"), updated("he", 0..3));
        assert_eq!(
            d.detect(Some(&at(4)), "/he "),
            Detection::Closed(CloseReason::SpaceTyped)
        );
        assert!(!d.is_active());
    }

    #[test]
    fn spaces_allowed_when_configured() {
        let mut d = TriggerDetector::new(&SlashConfig {
            allow_spaces: true,
            ..SlashConfig::default()
        });
        d.detect(Some(&at(1)), "/");
        assert_eq!(d.detect(Some(&at(4)), "/a b"), updated("a b", 0..4));
    }

    #[test]
    fn caret_before_trigger_or_deleted_trigger_closes() {
        let mut d = detector();
        d.detect(Some(&at(3)), "x /");
        assert_eq!(
            d.detect(Some(&at(2)), "x /"),
            Detection::Closed(CloseReason::CursorLeft)
        );

        let mut d = detector();
        d.detect(Some(&at(1)), "/");
        d.detect(Some(&at(2)), "/a");
        assert_eq!(
            d.detect(Some(&at(1)), "a"),
            Detection::Closed(CloseReason::TriggerDeleted)
        );

        let mut d = detector();
        d.detect(Some(&at(3)), "x /");
        assert_eq!(
            d.detect(Some(&at(4)), "x ab"),
            Detection::Closed(CloseReason::TriggerDeleted)
        );
    }

    #[test]
    fn leaving_the_block_or_expanding_closes() {
        let mut d = detector();
        d.detect(Some(&at(1)), "/");
        assert_eq!(
            d.detect(Some(&BlockPoint::new(vec![1], 1)), "/"),
            Detection::Closed(CloseReason::CursorLeft)
        );

        let mut d = detector();
        d.detect(Some(&at(1)), "/");
        assert_eq!(d.detect(None, ""), Detection::Closed(CloseReason::CursorLeft));
    }

    #[test]
    fn double_trigger_replaces_the_session() {
        let mut d = detector();
        d.detect(Some(&at(1)), "/");
        assert_eq!(d.detect(Some(&at(2)), "//"), opened("", 1..2));
        assert_eq!(d.detect(Some(&at(3)), "//h"), updated("h", 1..3));
        assert_eq!(d.active_trigger(), Some(&at(1)));
    }

    #[test]
    fn mid_word_trigger_inside_a_query_does_not_replace_it() {
        let mut d = detector();
        d.detect(Some(&at(1)), "/");
        d.detect(Some(&at(3)), "/ab");
        assert_eq!(d.detect(Some(&at(4)), "/ab/"), updated("ab/", 0..4));
        assert_eq!(d.detect(Some(&at(5)), "/ab/c"), updated("ab/c", 0..5));
        assert_eq!(d.active_trigger(), Some(&at(0)));
    }

    #[test]
    fn deleting_the_only_trigger_reports_deletion() {
        let mut d = detector();
        d.detect(Some(&at(1)), "/");
        assert_eq!(
            d.detect(Some(&at(0)), ""),
            Detection::Closed(CloseReason::TriggerDeleted)
        );

        let mut d = detector();
        d.detect(Some(&at(3)), "x /");
        assert_eq!(
            d.detect(Some(&at(1)), "x /"),
            Detection::Closed(CloseReason::CursorLeft)
        );
    }

    #[test]
    fn dismissed_trigger_stays_closed_until_the_caret_moves_back() {
        let mut d = detector();
        d.detect(Some(&at(1)), "/");
        assert_eq!(d.dismiss(), Detection::Closed(CloseReason::Cancelled));
        assert_eq!(d.detect(Some(&at(1)), "/"), Detection::Idle);

        assert_eq!(d.detect(Some(&at(0)), "/"), Detection::Idle);
        assert_eq!(d.detect(Some(&at(1)), "/"), opened("", 0..1));
    }

    #[test]
    fn start_of_block_only_and_custom_prefixes() {
        let mut d = TriggerDetector::new(&SlashConfig {
            start_of_block_only: true,
            ..SlashConfig::default()
        });
        assert_eq!(d.detect(Some(&at(3)), "a /"), Detection::Idle);
        assert_eq!(d.detect(Some(&at(1)), "/"), opened("", 0..1));

        let mut d = TriggerDetector::new(&SlashConfig {
            allowed_prefixes: Some(vec!['(']),
            ..SlashConfig::default()
        });
        assert_eq!(d.detect(Some(&at(2)), "(/"), opened("", 1..2));
        let mut d = TriggerDetector::new(&SlashConfig {
            allowed_prefixes: Some(vec!['(']),
            ..SlashConfig::default()
        });
        assert_eq!(d.detect(Some(&at(3)), "a /"), Detection::Idle);
    }

    #[test]
    fn multibyte_text_before_the_trigger() {
        let mut d = detector();
        assert_eq!(d.detect(Some(&at(4)), "é /"), opened("", 3..4));
        assert_eq!(d.detect(Some(&at(6)), "é /ü"), updated("ü", 3..6));
    }
}
