//! Scroll anchoring for the message list.
//!
//! The controller works on plain viewport measurements so any presentation
//! layer can drive it: feed it scroll and resize observations, apply the
//! [`ScrollCommand`]s it returns.

use tracing::debug;

/// Distance from the top that triggers loading older history.
pub const LOAD_OLDER_THRESHOLD: f64 = 50.0;
/// Distance from the bottom that still counts as "at the bottom".
pub const STICKY_THRESHOLD: f64 = 100.0;

/// One measurement of the scroll container.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl Viewport {
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    pub fn max_scroll_top(&self) -> f64 {
        (self.scroll_height - self.client_height).max(0.0)
    }

    pub fn distance_from_bottom(&self) -> f64 {
        (self.max_scroll_top() - self.scroll_top).max(0.0)
    }
}

/// Whether the history loader can take another request right now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HistoryState {
    pub has_more: bool,
    pub loading: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScrollCommand {
    ScrollTo { top: f64 },
    ToBottom { smooth: bool },
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Anchor {
    scroll_top: f64,
    scroll_height: f64,
}

#[derive(Clone, Debug, Default)]
pub struct ScrollAnchor {
    offset: f64,
    /// Whether `offset` came from a real observation or a restored position.
    observed: bool,
    stuck_to_bottom: bool,
    auto_scrolling: bool,
    show_jump_to_bottom: bool,
    last_message_id: Option<String>,
    pending_anchor: Option<Anchor>,
}

impl ScrollAnchor {
    pub fn new() -> Self {
        Self {
            stuck_to_bottom: true,
            ..Self::default()
        }
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn is_stuck_to_bottom(&self) -> bool {
        self.stuck_to_bottom
    }

    pub fn shows_jump_to_bottom(&self) -> bool {
        self.show_jump_to_bottom
    }

    pub fn is_anchoring(&self) -> bool {
        self.pending_anchor.is_some()
    }

    /// Initial placement once the first messages are on screen: a saved
    /// position is restored verbatim, otherwise the view starts at the bottom.
    pub fn restore(&mut self, saved: Option<f64>, last_message_id: Option<&str>) -> ScrollCommand {
        self.last_message_id = last_message_id.map(str::to_string);
        self.pending_anchor = None;
        self.auto_scrolling = false;
        match saved {
            Some(top) => {
                self.offset = top;
                self.observed = true;
                self.stuck_to_bottom = false;
                ScrollCommand::ScrollTo { top }
            }
            None => {
                self.stuck_to_bottom = true;
                self.show_jump_to_bottom = false;
                ScrollCommand::ToBottom { smooth: false }
            }
        }
    }

    /// Position to persist when the view is torn down. `None` until a scroll
    /// has been observed, so an unmeasured view restores at the bottom.
    pub fn persisted_position(&self) -> Option<f64> {
        self.observed.then_some(self.offset)
    }

    /// Record a scroll observation. Returns true when older history should be
    /// requested; the current geometry is captured as the anchor for
    /// [`after_prepend`](Self::after_prepend).
    pub fn on_scroll(&mut self, viewport: Viewport, history: HistoryState) -> bool {
        let moved_up = viewport.scroll_top < self.offset;
        self.offset = viewport.scroll_top;
        self.observed = true;

        let near_bottom = viewport.distance_from_bottom() <= STICKY_THRESHOLD;
        if self.auto_scrolling {
            if near_bottom {
                self.auto_scrolling = false;
            } else if moved_up {
                self.auto_scrolling = false;
                self.unstick();
            }
        } else if near_bottom {
            self.stuck_to_bottom = true;
            self.show_jump_to_bottom = false;
        } else {
            self.unstick();
        }

        if viewport.scroll_top <= LOAD_OLDER_THRESHOLD
            && history.has_more
            && !history.loading
            && self.pending_anchor.is_none()
        {
            self.pending_anchor = Some(Anchor {
                scroll_top: viewport.scroll_top,
                scroll_height: viewport.scroll_height,
            });
            debug!(scroll_top = viewport.scroll_top, "Requesting older history");
            return true;
        }
        false
    }

    fn unstick(&mut self) {
        if self.stuck_to_bottom {
            debug!("Scroll left the bottom; following disabled");
        }
        self.stuck_to_bottom = false;
        self.show_jump_to_bottom = true;
    }

    /// Re-apply the captured anchor once content prepended above the viewport
    /// has been laid out, so the visible messages do not move.
    pub fn after_prepend(&mut self, viewport: Viewport) -> Option<ScrollCommand> {
        let anchor = self.pending_anchor.take()?;
        let grown = viewport.scroll_height - anchor.scroll_height;
        if grown <= 0.0 {
            return None;
        }
        let top = anchor.scroll_top + grown;
        self.offset = top;
        Some(ScrollCommand::ScrollTo { top })
    }

    /// Drop a captured anchor after a failed or empty load.
    pub fn cancel_prepend(&mut self) {
        self.pending_anchor = None;
    }

    /// React to the store's newest message. Only a new last message scrolls;
    /// text growing inside the same message is handled by
    /// [`on_content_resized`](Self::on_content_resized).
    pub fn on_last_message(&mut self, last_message_id: Option<&str>) -> Option<ScrollCommand> {
        let Some(id) = last_message_id else {
            self.last_message_id = None;
            return None;
        };
        if self.last_message_id.as_deref() == Some(id) {
            return None;
        }
        self.last_message_id = Some(id.to_string());
        self.stuck_to_bottom = true;
        self.auto_scrolling = true;
        self.show_jump_to_bottom = false;
        Some(ScrollCommand::ToBottom { smooth: true })
    }

    /// Height changed without a new message (typing, images, prepends).
    pub fn on_content_resized(&mut self, viewport: Viewport) -> Option<ScrollCommand> {
        if !self.stuck_to_bottom || self.pending_anchor.is_some() {
            return None;
        }
        if viewport.distance_from_bottom() <= 1.0 {
            return None;
        }
        Some(ScrollCommand::ToBottom { smooth: false })
    }

    /// The user pressed the "scroll to bottom" affordance.
    pub fn jump_to_bottom(&mut self) -> ScrollCommand {
        self.stuck_to_bottom = true;
        self.auto_scrolling = true;
        self.show_jump_to_bottom = false;
        ScrollCommand::ToBottom { smooth: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IDLE: HistoryState = HistoryState {
        has_more: true,
        loading: false,
    };

    #[test]
    fn near_top_triggers_once_per_anchor() {
        let mut anchor = ScrollAnchor::new();
        assert!(anchor.on_scroll(Viewport::new(10.0, 2000.0, 500.0), IDLE));
        assert!(anchor.is_anchoring());
        assert!(!anchor.on_scroll(Viewport::new(5.0, 2000.0, 500.0), IDLE));
    }

    #[test]
    fn no_trigger_without_history_or_while_loading() {
        let mut anchor = ScrollAnchor::new();
        let vp = Viewport::new(0.0, 2000.0, 500.0);
        assert!(!anchor.on_scroll(
            vp,
            HistoryState {
                has_more: false,
                loading: false
            }
        ));
        assert!(!anchor.on_scroll(
            vp,
            HistoryState {
                has_more: true,
                loading: true
            }
        ));
        assert!(!anchor.on_scroll(Viewport::new(400.0, 2000.0, 500.0), IDLE));
    }

    #[test]
    fn prepend_preserves_visual_offset() {
        // Message tops in content coordinates; the viewport looks at "m3".
        let tops = [0.0, 120.0, 260.0, 400.0];
        let mut anchor = ScrollAnchor::new();
        let before = Viewport::new(30.0, 900.0, 500.0);
        assert!(anchor.on_scroll(before, IDLE));
        let visual_before = tops[2] - before.scroll_top;

        let prepended_height = 640.0;
        let after_layout = Viewport::new(30.0, 900.0 + prepended_height, 500.0);
        let command = anchor.after_prepend(after_layout).unwrap();
        let ScrollCommand::ScrollTo { top } = command else {
            panic!("expected explicit offset, got {command:?}");
        };
        let visual_after = (tops[2] + prepended_height) - top;

        assert_eq!(top, 670.0);
        assert_eq!(visual_before, visual_after);
        assert!(!anchor.is_anchoring());
    }

    #[test]
    fn empty_prepend_releases_anchor_without_moving() {
        let mut anchor = ScrollAnchor::new();
        assert!(anchor.on_scroll(Viewport::new(0.0, 900.0, 500.0), IDLE));
        assert_eq!(anchor.after_prepend(Viewport::new(0.0, 900.0, 500.0)), None);
        assert!(!anchor.is_anchoring());
    }

    #[test]
    fn new_last_message_sticks_to_bottom() {
        let mut anchor = ScrollAnchor::new();
        anchor.restore(None, Some("m1"));
        assert_eq!(anchor.on_last_message(Some("m1")), None);
        assert_eq!(
            anchor.on_last_message(Some("m2")),
            Some(ScrollCommand::ToBottom { smooth: true })
        );
        assert!(anchor.is_stuck_to_bottom());

        // Typing grows the content while stuck: keep snapping.
        assert_eq!(
            anchor.on_content_resized(Viewport::new(1000.0, 1600.0, 500.0)),
            Some(ScrollCommand::ToBottom { smooth: false })
        );
    }

    #[test]
    fn scrolling_away_disables_following() {
        let mut anchor = ScrollAnchor::new();
        anchor.restore(None, None);
        anchor.on_scroll(Viewport::new(1500.0, 2000.0, 500.0), IDLE);
        assert!(anchor.is_stuck_to_bottom());

        anchor.on_scroll(Viewport::new(1300.0, 2000.0, 500.0), IDLE);
        assert!(!anchor.is_stuck_to_bottom());
        assert!(anchor.shows_jump_to_bottom());
        assert_eq!(
            anchor.on_content_resized(Viewport::new(1300.0, 2400.0, 500.0)),
            None
        );

        assert_eq!(
            anchor.jump_to_bottom(),
            ScrollCommand::ToBottom { smooth: true }
        );
        assert!(!anchor.shows_jump_to_bottom());
    }

    #[test]
    fn smooth_scroll_frames_do_not_unstick() {
        let mut anchor = ScrollAnchor::new();
        anchor.restore(None, Some("m1"));
        anchor.on_scroll(Viewport::new(500.0, 1000.0, 500.0), IDLE);
        anchor.on_last_message(Some("m2"));

        // Content grew; the smooth scroll passes through intermediate offsets.
        anchor.on_scroll(Viewport::new(700.0, 1800.0, 500.0), IDLE);
        assert!(anchor.is_stuck_to_bottom());
        anchor.on_scroll(Viewport::new(1300.0, 1800.0, 500.0), IDLE);
        assert!(anchor.is_stuck_to_bottom());

        // A user scroll upward after the animation finished unsticks.
        anchor.on_scroll(Viewport::new(900.0, 1800.0, 500.0), IDLE);
        assert!(!anchor.is_stuck_to_bottom());
    }

    #[test]
    fn saved_position_is_restored_verbatim() {
        let mut anchor = ScrollAnchor::new();
        assert_eq!(
            anchor.restore(Some(321.5), Some("m9")),
            ScrollCommand::ScrollTo { top: 321.5 }
        );
        assert_eq!(anchor.persisted_position(), Some(321.5));
        assert_eq!(anchor.on_last_message(Some("m9")), None);

        let mut fresh = ScrollAnchor::new();
        assert_eq!(
            fresh.restore(None, Some("m9")),
            ScrollCommand::ToBottom { smooth: false }
        );
    }

    #[test]
    fn nothing_persisted_before_first_scroll() {
        let mut anchor = ScrollAnchor::new();
        assert_eq!(anchor.persisted_position(), None);
        anchor.restore(None, Some("m1"));
        assert_eq!(anchor.persisted_position(), None);

        anchor.on_scroll(Viewport::new(0.0, 1000.0, 500.0), IDLE);
        assert_eq!(anchor.persisted_position(), Some(0.0));
    }
}
