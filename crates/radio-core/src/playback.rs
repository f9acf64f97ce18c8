//! Playback state machine with bounded auto-retry.
//!
//! ```text
//!   Idle ──start──▶ Loading ──playing──▶ Playing ⇄ Paused
//!                     ▲  │                  │
//!                     │  └──error──▶ Error ◀┘
//!                     │               │
//!                     └──retry due────┤ attempts < max
//!                                     └──▶ Idle (gave up)
//! ```
//!
//! The controller owns no media resource.  Every start bumps a generation;
//! the caller tags media events with the generation they were issued under,
//! and events from a torn-down source are ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    /// Transient: a retry is pending.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Reported by the media element.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Playing,
    Paused,
    /// Buffering.
    Waiting,
    Error(String),
}

/// What the caller should do after feeding a media event.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackSignal {
    /// Audio is flowing; start the listening session.
    Started,
    /// Playback halted; close the listening session.
    Halted,
    Buffering,
    /// Schedule `retry_due(generation)` after `delay`.
    RetryScheduled {
        attempt: u32,
        max_attempts: u32,
        delay: Duration,
        generation: u64,
    },
    /// Retries exhausted; the user has to press play again.
    GaveUp,
}

#[derive(Debug, Clone)]
pub struct PlaybackController {
    state: PlaybackState,
    attempts: u32,
    policy: RetryPolicy,
    generation: u64,
}

impl PlaybackController {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            state: PlaybackState::Idle,
            attempts: 0,
            policy,
            generation: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// True while a start, playback, or pending retry is in progress.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, PlaybackState::Idle)
    }

    /// Begin loading a fresh source.  The caller must tear down the previous
    /// media resource first.  A user-initiated start gets a fresh retry budget.
    /// Returns the generation to tag this source's events with.
    pub fn begin_start(&mut self, user_initiated: bool) -> u64 {
        if user_initiated {
            self.attempts = 0;
        }
        self.generation += 1;
        self.state = PlaybackState::Loading;
        self.generation
    }

    /// Explicit stop.  Invalidates the current source and any pending retry.
    /// Returns true when something was active.
    pub fn stop(&mut self) -> bool {
        let was_active = self.is_active();
        self.generation += 1;
        self.state = PlaybackState::Idle;
        was_active
    }

    /// A scheduled retry fired.  True when the caller should start again
    /// (with `begin_start(false)`).
    pub fn retry_due(&self, generation: u64) -> bool {
        generation == self.generation && self.state == PlaybackState::Error
    }

    pub fn on_media_event(&mut self, generation: u64, event: MediaEvent) -> Option<PlaybackSignal> {
        if generation != self.generation {
            return None;
        }
        match event {
            MediaEvent::Playing => {
                self.attempts = 0;
                let was_playing = self.state == PlaybackState::Playing;
                self.state = PlaybackState::Playing;
                (!was_playing).then_some(PlaybackSignal::Started)
            }
            MediaEvent::Paused => {
                if self.state != PlaybackState::Playing {
                    return None;
                }
                self.state = PlaybackState::Paused;
                Some(PlaybackSignal::Halted)
            }
            MediaEvent::Waiting => match self.state {
                PlaybackState::Loading | PlaybackState::Playing => Some(PlaybackSignal::Buffering),
                _ => None,
            },
            MediaEvent::Error(_) => {
                if matches!(self.state, PlaybackState::Idle | PlaybackState::Error) {
                    return None;
                }
                if self.attempts < self.policy.max_attempts {
                    self.attempts += 1;
                    self.state = PlaybackState::Error;
                    Some(PlaybackSignal::RetryScheduled {
                        attempt: self.attempts,
                        max_attempts: self.policy.max_attempts,
                        delay: self.policy.delay,
                        generation: self.generation,
                    })
                } else {
                    self.state = PlaybackState::Idle;
                    Some(PlaybackSignal::GaveUp)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err() -> MediaEvent {
        MediaEvent::Error("stream error".into())
    }

    #[test]
    fn test_start_then_playing() {
        let mut pc = PlaybackController::new(RetryPolicy::default());
        let gen = pc.begin_start(true);
        assert_eq!(pc.state(), PlaybackState::Loading);
        assert_eq!(
            pc.on_media_event(gen, MediaEvent::Playing),
            Some(PlaybackSignal::Started)
        );
        assert!(pc.is_playing());
        // repeated playing events don't restart the session
        assert_eq!(pc.on_media_event(gen, MediaEvent::Playing), None);
    }

    #[test]
    fn test_bounded_retry_then_give_up() {
        let mut pc = PlaybackController::new(RetryPolicy::default());
        let mut gen = pc.begin_start(true);

        for attempt in 1..=3 {
            match pc.on_media_event(gen, err()) {
                Some(PlaybackSignal::RetryScheduled {
                    attempt: a,
                    max_attempts,
                    delay,
                    generation,
                }) => {
                    assert_eq!(a, attempt);
                    assert_eq!(max_attempts, 3);
                    assert_eq!(delay, Duration::from_secs(2));
                    assert!(pc.retry_due(generation));
                }
                other => panic!("expected retry, got {:?}", other),
            }
            gen = pc.begin_start(false);
        }

        assert_eq!(pc.on_media_event(gen, err()), Some(PlaybackSignal::GaveUp));
        assert_eq!(pc.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_playing_resets_attempts() {
        let mut pc = PlaybackController::new(RetryPolicy::default());
        let gen = pc.begin_start(true);
        pc.on_media_event(gen, err());
        let gen = pc.begin_start(false);
        assert_eq!(pc.attempts(), 1);
        pc.on_media_event(gen, MediaEvent::Playing);
        assert_eq!(pc.attempts(), 0);
    }

    #[test]
    fn test_user_start_gets_fresh_budget() {
        let mut pc = PlaybackController::new(RetryPolicy {
            max_attempts: 1,
            delay: Duration::from_millis(10),
        });
        let gen = pc.begin_start(true);
        pc.on_media_event(gen, err());
        let gen = pc.begin_start(false);
        assert_eq!(pc.on_media_event(gen, err()), Some(PlaybackSignal::GaveUp));

        let gen = pc.begin_start(true);
        assert!(matches!(
            pc.on_media_event(gen, err()),
            Some(PlaybackSignal::RetryScheduled { attempt: 1, .. })
        ));
    }

    #[test]
    fn test_stale_generation_ignored() {
        let mut pc = PlaybackController::new(RetryPolicy::default());
        let old = pc.begin_start(true);
        let new = pc.begin_start(true);
        assert_eq!(pc.on_media_event(old, err()), None);
        assert_eq!(pc.state(), PlaybackState::Loading);
        assert_eq!(
            pc.on_media_event(new, MediaEvent::Playing),
            Some(PlaybackSignal::Started)
        );
    }

    #[test]
    fn test_stop_cancels_pending_retry() {
        let mut pc = PlaybackController::new(RetryPolicy::default());
        let gen = pc.begin_start(true);
        let retry_gen = match pc.on_media_event(gen, err()) {
            Some(PlaybackSignal::RetryScheduled { generation, .. }) => generation,
            other => panic!("expected retry, got {:?}", other),
        };
        assert!(pc.stop());
        assert!(!pc.retry_due(retry_gen));
        assert!(!pc.stop());
    }

    #[test]
    fn test_pause_only_while_playing() {
        let mut pc = PlaybackController::new(RetryPolicy::default());
        let gen = pc.begin_start(true);
        assert_eq!(pc.on_media_event(gen, MediaEvent::Paused), None);
        pc.on_media_event(gen, MediaEvent::Playing);
        assert_eq!(
            pc.on_media_event(gen, MediaEvent::Paused),
            Some(PlaybackSignal::Halted)
        );
        assert_eq!(pc.state(), PlaybackState::Paused);
        assert_eq!(
            pc.on_media_event(gen, MediaEvent::Playing),
            Some(PlaybackSignal::Started)
        );
    }
}
