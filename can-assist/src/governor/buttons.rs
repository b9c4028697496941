//! Counter-synchronized cruise button injection
//!
//! The ACC ECU only accepts a stalk frame whose rolling counter is the next
//! expected value. The car's own stalk frame shares the address, so an
//! injected press is sent right after each upstream frame, carrying the
//! counter the ECU expects next. Repeated for a whole burst, at least one
//! injected frame is always the freshest the ECU sees.

use super::frames::{
    ButtonCommand, CruiseButtonFrame, OutboundFrame, VirtualButton, COUNTER_MODULO,
};
use crate::types::Bus;

/// Conditions that request a virtual press this tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonTriggers {
    pub resume: bool,
    pub cancel: bool,
}

impl ButtonTriggers {
    /// Pick one button; cancel wins over resume
    fn button(&self) -> Option<VirtualButton> {
        if self.cancel {
            Some(VirtualButton::Cancel)
        } else if self.resume {
            Some(VirtualButton::Resume)
        } else {
            None
        }
    }
}

/// State of one injection burst
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonSpamSession {
    /// Button to press, latched by a trigger
    pub target: Option<VirtualButton>,
    pub triggered: bool,
    pub sending: bool,
    pub frames_sent: u32,
    /// Last counter seen from the vehicle
    pub last_counter: Option<u8>,
}

/// Injects virtual cruise button presses
#[derive(Debug, Clone)]
pub struct ButtonInjector {
    bus: Bus,
    burst_len: u32,
    cooldown_ticks: u64,
    session: ButtonSpamSession,
    tick: u64,
    last_burst_end: Option<u64>,
}

impl ButtonInjector {
    pub fn new(bus: Bus, burst_len: u32, cooldown_ticks: u64) -> Self {
        Self {
            bus,
            burst_len,
            cooldown_ticks,
            session: ButtonSpamSession::default(),
            tick: 0,
            last_burst_end: None,
        }
    }

    pub fn session(&self) -> &ButtonSpamSession {
        &self.session
    }

    /// True while a press is latched or being sent
    pub fn is_busy(&self) -> bool {
        self.session.triggered || self.session.sending
    }

    /// True if enough ticks passed since the last burst for another resume
    pub fn cooled_down(&self, tick: u64) -> bool {
        self.last_burst_end
            .map_or(true, |end| tick.saturating_sub(end) >= self.cooldown_ticks)
    }

    /// Latch a pending press
    ///
    /// Ignored while one is already pending, except that a cancel replaces a
    /// pending or running resume burst. The replacement starts a full burst.
    pub fn latch(&mut self, triggers: ButtonTriggers) -> bool {
        if self.is_busy() {
            if triggers.cancel && self.session.target == Some(VirtualButton::Resume) {
                log::info!(
                    "Cancel preempts resume burst after {} frames",
                    self.session.frames_sent
                );
                self.session.target = Some(VirtualButton::Cancel);
                self.session.triggered = true;
                self.session.frames_sent = 0;
                return true;
            }
            return false;
        }
        match triggers.button() {
            Some(button) => {
                log::debug!("Latched virtual {:?} press", button);
                self.session.target = Some(button);
                self.session.triggered = true;
                true
            }
            None => false,
        }
    }

    /// Handle a change of the vehicle's stalk frame counter
    ///
    /// Latches `triggers` first, then emits one injected frame if a press is
    /// pending. The injected frame copies `upstream` with the counter one
    /// ahead and the target button held.
    pub fn on_upstream_counter_change(
        &mut self,
        upstream: &CruiseButtonFrame,
        triggers: ButtonTriggers,
    ) -> Vec<OutboundFrame> {
        self.session.last_counter = Some(upstream.counter);
        self.latch(triggers);

        let button = match (self.is_busy(), self.session.target) {
            (true, Some(button)) => button,
            _ => return Vec::new(),
        };

        if !self.session.sending {
            log::info!("Starting {:?} burst of {} frames", button, self.burst_len);
            self.session.sending = true;
        }

        let frame = CruiseButtonFrame {
            counter: (upstream.counter % COUNTER_MODULO + 1) % COUNTER_MODULO,
            buttons: upstream.buttons.pressed(button),
            ..*upstream
        };
        self.session.frames_sent += 1;

        if self.session.frames_sent >= self.burst_len {
            log::debug!("{:?} burst complete", button);
            self.session = ButtonSpamSession {
                last_counter: self.session.last_counter,
                ..ButtonSpamSession::default()
            };
            self.last_burst_end = Some(self.tick);
        }

        vec![OutboundFrame::Buttons(ButtonCommand {
            bus: self.bus,
            frame,
        })]
    }

    /// Drop a resume burst whose condition no longer holds
    fn abort_resume(&mut self) {
        log::info!(
            "Resume condition cleared, aborting burst after {} frames",
            self.session.frames_sent
        );
        self.session = ButtonSpamSession {
            last_counter: self.session.last_counter,
            ..ButtonSpamSession::default()
        };
        self.last_burst_end = Some(self.tick);
    }

    /// Per-tick entry point used by the governor
    ///
    /// Detects counter changes of the observed vehicle frame. A stalled
    /// counter simply delays a pending burst. A resume press is only held
    /// while `triggers.resume` stays set.
    pub fn observe(
        &mut self,
        tick: u64,
        upstream: Option<&CruiseButtonFrame>,
        triggers: ButtonTriggers,
    ) -> Vec<OutboundFrame> {
        self.tick = tick;
        if self.is_busy() && self.session.target == Some(VirtualButton::Resume) && !triggers.resume
        {
            self.abort_resume();
        }
        let triggers = ButtonTriggers {
            resume: triggers.resume && self.cooled_down(tick),
            ..triggers
        };

        let upstream = match upstream {
            Some(frame) => frame,
            None => {
                self.latch(triggers);
                return Vec::new();
            }
        };

        let changed = self
            .session
            .last_counter
            .map_or(false, |last| last != upstream.counter);
        if !changed {
            self.session.last_counter = Some(upstream.counter);
            self.latch(triggers);
            return Vec::new();
        }

        self.on_upstream_counter_change(upstream, triggers)
    }
}
