//! Typing indicator for remote peers.
//!
//! A single slot: the most recent sender replaces whoever was shown before.
//! The hide deadline is rearmed on every typing event, so at most one hide
//! is ever pending.

use std::time::{Duration, Instant};

pub const DEFAULT_HIDE_AFTER: Duration = Duration::from_millis(3000);

#[derive(Debug)]
struct Shown {
    sender: String,
    hide_at: Instant,
}

#[derive(Debug)]
pub struct TypingIndicator {
    hide_after: Duration,
    shown: Option<Shown>,
}

impl Default for TypingIndicator {
    fn default() -> Self {
        Self::new(DEFAULT_HIDE_AFTER)
    }
}

impl TypingIndicator {
    pub fn new(hide_after: Duration) -> Self {
        Self {
            hide_after,
            shown: None,
        }
    }

    /// Shows `sender` and restarts the hide timer from `now`.
    pub fn show(&mut self, sender: &str, now: Instant) {
        self.shown = Some(Shown {
            sender: sender.to_string(),
            hide_at: now + self.hide_after,
        });
    }

    /// Hides the indicator if its deadline has passed. Returns the sender
    /// that was hidden.
    pub fn expire(&mut self, now: Instant) -> Option<String> {
        match &self.shown {
            Some(shown) if now >= shown.hide_at => self.shown.take().map(|s| s.sender),
            _ => None,
        }
    }

    pub fn cancel(&mut self) {
        self.shown = None;
    }

    pub fn sender(&self) -> Option<&str> {
        self.shown.as_ref().map(|s| s.sender.as_str())
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.shown.as_ref().map(|s| s.hide_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn hides_after_timeout() {
        let start = Instant::now();
        let mut indicator = TypingIndicator::default();
        indicator.show("bob", start);
        assert_eq!(indicator.expire(start + ms(2999)), None);
        assert_eq!(indicator.sender(), Some("bob"));
        assert_eq!(indicator.expire(start + ms(3000)), Some("bob".into()));
        assert_eq!(indicator.sender(), None);
        assert_eq!(indicator.expire(start + ms(9000)), None);
    }

    #[test]
    fn rearming_extends_from_latest_event() {
        let start = Instant::now();
        let mut indicator = TypingIndicator::default();
        indicator.show("bob", start);
        indicator.show("bob", start + ms(1000));
        assert_eq!(indicator.expire(start + ms(3500)), None);
        assert_eq!(indicator.deadline(), Some(start + ms(4000)));
        assert_eq!(indicator.expire(start + ms(4000)), Some("bob".into()));
    }

    #[test]
    fn last_sender_wins() {
        let start = Instant::now();
        let mut indicator = TypingIndicator::new(ms(500));
        indicator.show("bob", start);
        indicator.show("carol", start + ms(100));
        assert_eq!(indicator.sender(), Some("carol"));
        assert_eq!(indicator.expire(start + ms(600)), Some("carol".into()));
    }

    #[test]
    fn cancel_drops_pending_hide() {
        let start = Instant::now();
        let mut indicator = TypingIndicator::default();
        indicator.show("bob", start);
        indicator.cancel();
        assert_eq!(indicator.deadline(), None);
        assert_eq!(indicator.expire(start + ms(5000)), None);
    }
}
