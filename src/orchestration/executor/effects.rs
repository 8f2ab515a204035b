//! Side effects requested by state behaviors.
//!
//! Behaviors run synchronously inside the state machine executor, so they
//! never touch the bus or timers directly. They queue [`Effect`]s in the
//! module's [`Outbox`]; the task loop applies them in request order once the
//! run has completed.

use std::time::Duration;

use super::fatal::ResetReason;
use crate::messaging::{Message, TimerMsg};

/// One requested side effect
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Publish(Message),
    StartTimer { timer: TimerMsg, delay: Duration },
    StopTimer(TimerMsg),
    Reset(ResetReason),
}

/// Ordered queue of effects produced by a single dispatch
#[derive(Debug, Default)]
pub struct Outbox {
    effects: Vec<Effect>,
}

impl Outbox {
    /// Create a new empty outbox
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a publish of `message` on its channel
    pub fn publish(&mut self, message: impl Into<Message>) {
        self.effects.push(Effect::Publish(message.into()));
    }

    /// Queue a (re)start of the named timer
    pub fn start_timer(&mut self, timer: TimerMsg, delay: Duration) {
        self.effects.push(Effect::StartTimer { timer, delay });
    }

    /// Queue a stop of the named timer
    pub fn stop_timer(&mut self, timer: TimerMsg) {
        self.effects.push(Effect::StopTimer(timer));
    }

    /// Queue a system reset
    pub fn request_reset(&mut self, reason: ResetReason) {
        self.effects.push(Effect::Reset(reason));
    }

    /// Take every queued effect, leaving the outbox empty
    pub fn take(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Queued effects, oldest first
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Messages queued for publishing, oldest first
    pub fn published(&self) -> Vec<&Message> {
        self.effects
            .iter()
            .filter_map(|effect| match effect {
                Effect::Publish(message) => Some(message),
                _ => None,
            })
            .collect()
    }
}
