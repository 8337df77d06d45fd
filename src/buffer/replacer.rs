//! Replacement policies for the buffer pool

use log::trace;

use super::FrameId;
use super::frame::FrameDesc;

/// Decides which frame the buffer pool reclaims when a page must be loaded
/// and no frame holds it.
///
/// The buffer manager calls the notification hooks on every frame
/// transition. A policy only keeps eviction metadata indexed by frame id;
/// frame content and pin counts stay with the manager.
pub trait Replacer {
    /// A newly allocated page has been placed in `frame`
    fn on_new_page(&mut self, frame: &FrameDesc);

    /// `frame` no longer holds a page
    fn on_free_page(&mut self, frame: &FrameDesc);

    /// `frame` was pinned (its pin count was incremented)
    fn on_pin(&mut self, frame: &FrameDesc);

    /// `frame` was unpinned (its pin count was decremented)
    fn on_unpin(&mut self, frame: &FrameDesc);

    /// Select a frame to reclaim, or `None` if every frame is in use
    fn pick_victim(&mut self) -> Option<FrameId>;

    /// Short identifier used in logs and diagnostics
    fn name(&self) -> &'static str;
}

/// Per-frame state tracked by the clock policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameState {
    /// Reclaimable right away
    Available,
    /// Recently unpinned; survives one pass of the clock hand
    Referenced,
    /// In use, never reclaimed
    Pinned,
}

/// The "clock" second-chance replacement policy
pub struct Clock {
    states: Vec<FrameState>,
    /// Last inspected frame; `None` means before frame 0
    hand: Option<FrameId>,
}

impl Clock {
    pub fn new(capacity: usize) -> Self {
        Self {
            states: vec![FrameState::Available; capacity],
            hand: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, frame: FrameId) -> FrameState {
        self.states[frame]
    }

    pub fn hand(&self) -> Option<FrameId> {
        self.hand
    }
}

impl Replacer for Clock {
    fn on_new_page(&mut self, _frame: &FrameDesc) {}

    fn on_free_page(&mut self, frame: &FrameDesc) {
        self.states[frame.index()] = FrameState::Available;
    }

    fn on_pin(&mut self, frame: &FrameDesc) {
        self.states[frame.index()] = FrameState::Pinned;
    }

    fn on_unpin(&mut self, frame: &FrameDesc) {
        // Other holders still pin the page
        if frame.pin_count == 0 {
            self.states[frame.index()] = FrameState::Referenced;
        }
    }

    fn pick_victim(&mut self) -> Option<FrameId> {
        let capacity = self.states.len();

        // Two sweeps: the first may only demote referenced frames
        for _ in 0..2 * capacity {
            let next = self.hand.map_or(0, |hand| (hand + 1) % capacity);
            self.hand = Some(next);

            match self.states[next] {
                FrameState::Available => {
                    trace!("clock selected frame {}", next);
                    return Some(next);
                }
                FrameState::Referenced => {
                    trace!("clock demoted frame {}", next);
                    self.states[next] = FrameState::Available;
                }
                FrameState::Pinned => {}
            }
        }

        trace!("clock found no victim among {} frames", capacity);
        None
    }

    fn name(&self) -> &'static str {
        "clock"
    }
}
