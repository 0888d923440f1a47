//! Control surface state
//!
//! What the host page shows around the canvas, folded from the event
//! stream: the start/stop control, the `loaded/total` preload indicator
//! and a user-visible error when the materials pool could not be fetched.

use snh_common::events::{PlaybackState, SessionEvent};

#[derive(Debug, Clone, PartialEq)]
pub struct ControlsState {
    pub state: PlaybackState,
    pub start_visible: bool,
    /// `(loaded, total)` while preloading
    pub progress: Option<(usize, usize)>,
    pub error: Option<String>,
}

impl Default for ControlsState {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            start_visible: true,
            progress: None,
            error: None,
        }
    }
}

impl ControlsState {
    pub fn apply(&mut self, event: &SessionEvent) {
        match event {
            SessionEvent::PlaybackStateChanged { new_state, .. } => {
                self.state = *new_state;
                self.start_visible = *new_state == PlaybackState::Idle;
                match new_state {
                    PlaybackState::Preloading => {
                        self.error = None;
                        self.progress = Some((0, 0));
                    }
                    _ => self.progress = None,
                }
            }
            SessionEvent::PreloadProgress { loaded, total, .. } => {
                if self.state == PlaybackState::Preloading {
                    self.progress = Some((*loaded, *total));
                }
            }
            SessionEvent::MaterialsUnavailable { reason, .. } => {
                self.fail(format!("Materials unavailable: {}", reason));
            }
            SessionEvent::MaterialsLoaded { .. } => self.error = None,
            _ => {}
        }
    }

    /// Fatal start failure: clear the indicator and show the message
    pub fn fail(&mut self, message: impl Into<String>) {
        self.state = PlaybackState::Idle;
        self.start_visible = true;
        self.progress = None;
        self.error = Some(message.into());
    }

    pub fn progress_label(&self) -> Option<String> {
        self.progress
            .map(|(loaded, total)| format!("{}/{}", loaded, total))
    }
}
