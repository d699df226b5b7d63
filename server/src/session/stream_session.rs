use crate::measurement::pipeline::{Evaluation, FrameOptions};
use crate::session::control::{ControlCommand, SessionError};
use crate::session::settings::{CaptureMode, SessionSettings};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(tag = "state", content = "mode", rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Streaming(CaptureMode),
    Closed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FramePayload {
    Pushed(Vec<u8>),
    Capture,
}

/// A frame admitted for processing, with the settings it must be processed under.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameTicket {
    pub epoch: u64,
    pub sequence: u64,
    pub payload: FramePayload,
    pub options: FrameOptions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Submit(FrameTicket),
    /// Held until the frame in flight finishes. Carries the sequence of the frame it replaced.
    Pending { replaced: Option<u64> },
    Dropped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Started(CaptureMode),
    Stopped { was_streaming: bool },
    SettingChanged,
    FrameRateChanged,
    Save(Evaluation),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Whether the result belongs to the current stream and should reach the peer.
    pub deliver: bool,
    pub next: Option<FrameTicket>,
}

/// Per-connection state. Owned by the connection's task, never shared.
pub struct StreamSession {
    id: Uuid,
    state: SessionState,
    defaults: SessionSettings,
    settings: SessionSettings,
    epoch: u64,
    next_sequence: u64,
    in_flight: bool,
    pending: Option<(u64, Vec<u8>)>,
    latest: Option<Evaluation>,
}

impl StreamSession {
    pub fn new(id: Uuid, defaults: SessionSettings) -> Self {
        Self {
            id,
            state: SessionState::Idle,
            defaults,
            settings: defaults,
            epoch: 0,
            next_sequence: 0,
            in_flight: false,
            pending: None,
            latest: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight
    }

    pub fn latest(&self) -> Option<&Evaluation> {
        self.latest.as_ref()
    }

    pub fn apply(&mut self, command: ControlCommand) -> Result<Effect, SessionError> {
        if self.state == SessionState::Closed {
            return match command {
                ControlCommand::Stop => Ok(Effect::Stopped { was_streaming: false }),
                _ => Err(SessionError::Closed),
            };
        }
        match command {
            ControlCommand::Start(mode) => self.start(mode),
            ControlCommand::Stop => Ok(Effect::Stopped {
                was_streaming: self.stop(),
            }),
            ControlCommand::Save => self.latest.clone().map(Effect::Save).ok_or(SessionError::NothingToSave),
            ControlCommand::SetConfidence(confidence) => {
                self.streaming_settings()?.confidence = confidence;
                Ok(Effect::SettingChanged)
            }
            ControlCommand::SetRotation(rotation) => {
                self.streaming_settings()?.rotation = rotation;
                Ok(Effect::SettingChanged)
            }
            ControlCommand::SetFlip(flip) => {
                self.streaming_settings()?.flip = flip;
                Ok(Effect::SettingChanged)
            }
            ControlCommand::SetFrameRate(frame_rate) => {
                self.streaming_settings()?.frame_rate = frame_rate;
                Ok(Effect::FrameRateChanged)
            }
        }
    }

    fn start(&mut self, mode: CaptureMode) -> Result<Effect, SessionError> {
        if let SessionState::Streaming(_) = self.state {
            return Err(SessionError::AlreadyStreaming);
        }
        self.epoch += 1;
        self.settings = SessionSettings { mode, ..self.defaults };
        self.state = SessionState::Streaming(mode);
        self.in_flight = false;
        self.pending = None;
        Ok(Effect::Started(mode))
    }

    /// Returns whether a stream was actually running. A second stop is a no-op.
    pub fn stop(&mut self) -> bool {
        let was_streaming = matches!(self.state, SessionState::Streaming(_));
        if was_streaming {
            self.state = SessionState::Idle;
        }
        self.in_flight = false;
        self.pending = None;
        was_streaming
    }

    pub fn close(&mut self) {
        self.stop();
        self.state = SessionState::Closed;
    }

    fn streaming_settings(&mut self) -> Result<&mut SessionSettings, SessionError> {
        match self.state {
            SessionState::Streaming(_) => Ok(&mut self.settings),
            _ => Err(SessionError::NotStreaming),
        }
    }

    fn options(&self) -> FrameOptions {
        match self.settings.mode {
            CaptureMode::Server => FrameOptions {
                confidence: self.settings.confidence,
                rotation: self.settings.rotation,
                flip: self.settings.flip,
            },
            CaptureMode::Client => FrameOptions::untransformed(self.settings.confidence),
        }
    }

    fn ticket(&mut self, payload: FramePayload, sequence: u64) -> FrameTicket {
        self.in_flight = true;
        FrameTicket {
            epoch: self.epoch,
            sequence,
            payload,
            options: self.options(),
        }
    }

    /// Peer-pushed frame. At most one frame is processed at a time and at
    /// most one waits behind it; a newer frame replaces the waiting one.
    pub fn offer_frame(&mut self, bytes: Vec<u8>) -> Admission {
        if self.state != SessionState::Streaming(CaptureMode::Client) {
            return Admission::Dropped;
        }
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        if self.in_flight {
            let replaced = self.pending.replace((sequence, bytes)).map(|(replaced, _)| replaced);
            return Admission::Pending { replaced };
        }
        Admission::Submit(self.ticket(FramePayload::Pushed(bytes), sequence))
    }

    /// Cadence tick in server-capture mode. Skipped while a frame is in flight.
    pub fn begin_tick(&mut self) -> Option<FrameTicket> {
        if self.state != SessionState::Streaming(CaptureMode::Server) || self.in_flight {
            return None;
        }
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        Some(self.ticket(FramePayload::Capture, sequence))
    }

    /// Called when a ticket's processing ends. Results from an earlier
    /// stream, or arriving after stop or close, are not delivered.
    pub fn complete(&mut self, epoch: u64, result: Option<&Evaluation>) -> Completion {
        let current = matches!(self.state, SessionState::Streaming(_)) && epoch == self.epoch;
        if !current {
            return Completion { deliver: false, next: None };
        }
        self.in_flight = false;
        if let Some(evaluation) = result {
            self.latest = Some(evaluation.clone());
        }
        let next = self
            .pending
            .take()
            .map(|(sequence, bytes)| self.ticket(FramePayload::Pushed(bytes), sequence));
        Completion { deliver: true, next }
    }
}
