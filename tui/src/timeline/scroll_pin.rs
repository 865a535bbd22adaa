//! Pinned-to-bottom tracking for the timeline viewport.
//!
//! The decision itself is the pure [`evaluate`] function over a [`ScrollState`], a [`Viewport`]
//! and what was observed. [`ScrollPinTracker`] executes the resulting effects against the
//! viewport and owns the scroll debounce window.
//!
//! Structural changes (mutations and resizes) are evaluated immediately. Raw scroll input is
//! trailing-debounced: every scroll pushes the deadline out and [`ScrollPinTracker::tick`]
//! evaluates once the burst has settled.

use std::time::Duration;
use std::time::Instant;

pub const DEFAULT_SCROLL_SLOP: usize = 2;
pub const DEFAULT_SCROLL_DEBOUNCE: Duration = Duration::from_millis(25);

/// Scroll geometry of the timeline, in terminal rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub scroll_offset: usize,
    pub viewport_height: usize,
    pub content_height: usize,
}

impl Viewport {
    /// Largest valid offset, which shows the last row of content at the bottom edge.
    pub fn bottom_offset(&self) -> usize {
        self.content_height.saturating_sub(self.viewport_height)
    }

    pub fn scroll_to(&mut self, offset: usize) {
        self.scroll_offset = offset.min(self.bottom_offset());
    }

    /// Scrolls by `delta` rows, clamped to the content. Returns whether the offset moved.
    pub fn scroll_by(&mut self, delta: isize) -> bool {
        let before = self.scroll_offset;
        let target = if delta.is_negative() {
            before.saturating_sub(delta.unsigned_abs())
        } else {
            before.saturating_add(delta.unsigned_abs())
        };
        self.scroll_to(target);
        before != self.scroll_offset
    }
}

/// Saved pin state. This is what survives switching away from a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollState {
    pub pinned: bool,
    /// Top offset of the viewport when the state was last observed.
    pub last_known_offset: usize,
}

impl Default for ScrollState {
    fn default() -> Self {
        Self {
            pinned: true,
            last_known_offset: 0,
        }
    }
}

/// Structural change reported by the timeline container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// A view was inserted or removed.
    ChildList,
    /// A view's metadata changed.
    Attributes,
    /// A view's content changed height.
    Subtree,
    /// A view's text changed without changing height.
    CharacterData,
}

/// Which [`MutationKind`]s trigger a re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationFilter {
    pub child_list: bool,
    pub attributes: bool,
    pub subtree: bool,
    pub character_data: bool,
}

impl Default for MutationFilter {
    /// Observes everything that can move content height. Text-only changes are ignored so the
    /// tracker's own scroll writes never feed back into it.
    fn default() -> Self {
        Self {
            child_list: true,
            attributes: true,
            subtree: true,
            character_data: false,
        }
    }
}

impl MutationFilter {
    pub fn observes(&self, kind: MutationKind) -> bool {
        match kind {
            MutationKind::ChildList => self.child_list,
            MutationKind::Attributes => self.attributes,
            MutationKind::Subtree => self.subtree,
            MutationKind::CharacterData => self.character_data,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Mutation(MutationKind),
    Resize,
    /// The debounced end of a scroll burst.
    Scroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    ScrollToBottom,
    LoadMore,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub state: ScrollState,
    pub effects: Vec<Effect>,
}

/// Returns true when the bottom edge of `viewport` is within `slop` rows of the content bottom.
pub fn is_pinned(viewport: &Viewport, slop: usize) -> bool {
    viewport.scroll_offset + viewport.viewport_height + slop >= viewport.content_height
}

/// Decides the next state and the effects to apply for one observation.
///
/// A pinned timeline follows structural changes to the bottom and is re-evaluated at that
/// offset. A settled scroll that leaves the timeline unpinned at the very top asks for older
/// content.
pub fn evaluate(
    state: &ScrollState,
    viewport: &Viewport,
    observation: Observation,
    slop: usize,
) -> Evaluation {
    let mut effects = Vec::new();
    let mut observed = *viewport;
    if state.pinned && matches!(observation, Observation::Mutation(_) | Observation::Resize) {
        effects.push(Effect::ScrollToBottom);
        observed.scroll_offset = observed.bottom_offset();
    }
    let pinned = is_pinned(&observed, slop);
    if observation == Observation::Scroll && !pinned && observed.scroll_offset == 0 {
        effects.push(Effect::LoadMore);
    }
    Evaluation {
        state: ScrollState {
            pinned,
            last_known_offset: observed.scroll_offset,
        },
        effects,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPinConfig {
    pub slop: usize,
    pub debounce: Duration,
}

impl Default for ScrollPinConfig {
    fn default() -> Self {
        Self {
            slop: DEFAULT_SCROLL_SLOP,
            debounce: DEFAULT_SCROLL_DEBOUNCE,
        }
    }
}

#[derive(Debug)]
pub struct ScrollPinTracker {
    config: ScrollPinConfig,
    filter: MutationFilter,
    state: ScrollState,
    scroll_deadline: Option<Instant>,
}

impl ScrollPinTracker {
    pub fn new(config: ScrollPinConfig, state: ScrollState) -> Self {
        Self {
            config,
            filter: MutationFilter::default(),
            state,
            scroll_deadline: None,
        }
    }

    pub fn state(&self) -> ScrollState {
        self.state
    }

    pub fn is_pinned(&self) -> bool {
        self.state.pinned
    }

    /// Evaluates a structural change immediately and applies its effects to `viewport`.
    /// Mutations the filter does not observe are ignored.
    pub fn observe(&mut self, observation: Observation, viewport: &mut Viewport) {
        if let Observation::Mutation(kind) = observation
            && !self.filter.observes(kind)
        {
            return;
        }
        self.apply(observation, viewport);
    }

    /// Records raw scroll input. The evaluation happens in [`Self::tick`] once the burst settles.
    pub fn observe_scroll(&mut self, now: Instant) {
        self.scroll_deadline = Some(now + self.config.debounce);
    }

    /// Runs the debounced scroll evaluation if its window has elapsed. Returns true when more
    /// content should be loaded.
    pub fn tick(&mut self, now: Instant, viewport: &mut Viewport) -> bool {
        match self.scroll_deadline {
            Some(deadline) if now >= deadline => {
                self.scroll_deadline = None;
                self.apply(Observation::Scroll, viewport)
            }
            _ => false,
        }
    }

    /// When the pending scroll evaluation is due, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.scroll_deadline
    }

    /// Re-reads the pin from the current geometry without moving the viewport.
    pub fn refresh(&mut self, viewport: &Viewport) {
        let pinned = is_pinned(viewport, self.config.slop);
        self.transition(ScrollState {
            pinned,
            last_known_offset: viewport.scroll_offset,
        });
    }

    fn apply(&mut self, observation: Observation, viewport: &mut Viewport) -> bool {
        let evaluation = evaluate(&self.state, viewport, observation, self.config.slop);
        let mut load_more = false;
        for effect in &evaluation.effects {
            match effect {
                Effect::ScrollToBottom => viewport.scroll_offset = viewport.bottom_offset(),
                Effect::LoadMore => load_more = true,
            }
        }
        self.transition(evaluation.state);
        load_more
    }

    fn transition(&mut self, next: ScrollState) {
        if next.pinned != self.state.pinned {
            if next.pinned {
                tracing::info!("pinning timeline");
            } else {
                tracing::info!("unpinning timeline");
            }
        }
        self.state = next;
    }
}
