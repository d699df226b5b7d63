use crate::capture::capture_device::FrameSource;
use crate::measurement::pipeline::{Evaluation, FrameOptions, FramePipeline};
use crate::server::services::Services;
use crate::session::control::{parse_control, ControlCommand, ControlParseError, SessionError};
use crate::session::message::{OutboundMessage, ResultPayload};
use crate::session::settings::{CaptureMode, SessionSettings};
use crate::session::stream_session::{Admission, Effect, FramePayload, FrameTicket, StreamSession};
use crate::utils::config::Config;
use crate::utils::error::{ErrorKind, ProcessError};
use crate::utils::logging::*;
use actix::prelude::*;
use actix_web::web::Bytes;
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::spawn_blocking;
use uuid::Uuid;

pub struct StreamWebSocket {
    session: StreamSession,
    peer: String,
    services: Services,
    config: Config,
    capture: Option<Arc<dyn FrameSource>>,
    cadence: Option<(SpawnHandle, Duration)>,
}

impl StreamWebSocket {
    pub fn new(id: Uuid, peer: String, defaults: SessionSettings, config: Config, services: Services) -> Self {
        Self {
            session: StreamSession::new(id, defaults),
            peer,
            services,
            config,
            capture: None,
            cadence: None,
        }
    }

    fn send(&self, ctx: &mut ws::WebsocketContext<Self>, message: &OutboundMessage) {
        match message.to_json() {
            Ok(json) => ctx.text(json),
            Err(err) => {
                let session_id = self.session.id();
                let reason = IOEntry::SerdeSerializeError(err).to_string();
                actix::spawn(async move {
                    logging_error!(session_id, SessionEntry::PushFailed(reason), "");
                });
            }
        }
    }

    fn send_status(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let status = OutboundMessage::Status {
            state: self.session.state(),
            settings: self.session.settings(),
        };
        self.send(ctx, &status);
    }

    fn reject(&self, err: SessionError, ctx: &mut ws::WebsocketContext<Self>) {
        let session_id = self.session.id();
        let message = err.to_string();
        self.send(ctx, &OutboundMessage::Error {
            kind: ErrorKind::InputValidation,
            message: message.clone(),
        });
        actix::spawn(async move {
            logging_notice!(session_id, SessionEntry::RejectedControl(message), "");
        });
    }

    fn handle_control(&mut self, text: &str, ctx: &mut ws::WebsocketContext<Self>) {
        let session_id = self.session.id();
        let command = match parse_control(text, self.config.max_frame_rate) {
            Ok(command) => command,
            Err(ControlParseError::Unparseable(reason)) => {
                actix::spawn(async move {
                    logging_notice!(session_id, SessionEntry::UnparseableControl(reason), "");
                });
                return;
            }
            Err(ControlParseError::Rejected(err)) => return self.reject(err, ctx),
        };
        let effect = match self.session.apply(command) {
            Ok(effect) => effect,
            Err(err) => return self.reject(err, ctx),
        };
        match effect {
            Effect::Started(mode) => {
                if mode == CaptureMode::Server && !self.acquire_capture(ctx) {
                    return;
                }
                actix::spawn(async move {
                    logging_information!(session_id, SessionEntry::Started(mode.to_string()), "");
                });
            }
            Effect::Stopped { was_streaming } => {
                self.release_capture(ctx);
                if was_streaming {
                    actix::spawn(async move {
                        logging_information!(session_id, SessionEntry::Stopped, "");
                    });
                }
            }
            Effect::SettingChanged => {
                let change = format!("{command:?}");
                actix::spawn(async move {
                    logging_information!(session_id, SessionEntry::SettingChanged(change), "");
                });
            }
            Effect::FrameRateChanged => {
                if self.capture.is_some() {
                    self.schedule_ticks(ctx);
                }
                let change = format!("{command:?}");
                actix::spawn(async move {
                    logging_information!(session_id, SessionEntry::SettingChanged(change), "");
                });
            }
            Effect::Save(evaluation) => return self.save(evaluation, ctx),
        }
        if !matches!(command, ControlCommand::Save) {
            self.send_status(ctx);
        }
    }

    fn acquire_capture(&mut self, ctx: &mut ws::WebsocketContext<Self>) -> bool {
        match (self.services.capture)(&self.config) {
            Ok(source) => {
                self.capture = Some(source);
                self.schedule_ticks(ctx);
                let session_id = self.session.id();
                actix::spawn(async move {
                    logging_information!(session_id, SessionEntry::CaptureAcquired, "");
                });
                true
            }
            Err(err) => {
                self.session.stop();
                let err = ProcessError::Capture(err);
                self.send(ctx, &OutboundMessage::Error {
                    kind: err.kind(),
                    message: err.to_string(),
                });
                self.send_status(ctx);
                let session_id = self.session.id();
                actix::spawn(async move {
                    err.log(Some(session_id)).await;
                });
                false
            }
        }
    }

    fn release_capture(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if let Some((handle, _)) = self.cadence.take() {
            ctx.cancel_future(handle);
        }
        if self.capture.take().is_some() {
            let session_id = self.session.id();
            actix::spawn(async move {
                logging_information!(session_id, SessionEntry::CaptureReleased, "");
            });
        }
    }

    fn schedule_ticks(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        if let Some((handle, _)) = self.cadence.take() {
            ctx.cancel_future(handle);
        }
        let period = self.session.settings().frame_interval();
        let handle = ctx.run_interval(period, |actor, ctx| {
            if let Some(ticket) = actor.session.begin_tick() {
                actor.dispatch(ticket, ctx);
            }
        });
        self.cadence = Some((handle, period));
    }

    fn handle_frame(&mut self, bytes: Bytes, ctx: &mut ws::WebsocketContext<Self>) {
        let session_id = self.session.id();
        match self.session.offer_frame(bytes.to_vec()) {
            Admission::Submit(ticket) => self.dispatch(ticket, ctx),
            Admission::Pending { replaced: Some(sequence) } => {
                actix::spawn(async move {
                    logging_debug!(session_id, SessionEntry::FrameCoalesced(sequence), "");
                });
            }
            Admission::Pending { replaced: None } => (),
            Admission::Dropped => {
                actix::spawn(async move {
                    logging_debug!(session_id, NetworkEntry::UnexpectedFrame, "");
                });
            }
        }
    }

    fn dispatch(&mut self, ticket: FrameTicket, ctx: &mut ws::WebsocketContext<Self>) {
        let FrameTicket { epoch, payload, options, .. } = ticket;
        let pipeline = self.services.pipeline.clone();
        let capture = self.capture.clone();
        let future = process_frame(pipeline, capture, payload, options);
        ctx.spawn(future.into_actor(self).map(move |result, actor, ctx| actor.finish(epoch, result, ctx)));
    }

    fn finish(&mut self, epoch: u64, result: Result<Evaluation, ProcessError>, ctx: &mut ws::WebsocketContext<Self>) {
        let session_id = self.session.id();
        let completion = self.session.complete(epoch, result.as_ref().ok());
        if completion.deliver {
            match result {
                Ok(evaluation) => self.send(ctx, &OutboundMessage::Result(ResultPayload::from(&evaluation))),
                Err(err) => {
                    self.send(ctx, &OutboundMessage::Error {
                        kind: err.kind(),
                        message: err.to_string(),
                    });
                    actix::spawn(async move {
                        err.log(Some(session_id)).await;
                    });
                }
            }
        } else {
            actix::spawn(async move {
                logging_debug!(session_id, SessionEntry::StaleResultDiscarded(epoch), "");
            });
        }
        if let Some(next) = completion.next {
            self.dispatch(next, ctx);
        }
    }

    fn save(&mut self, evaluation: Evaluation, ctx: &mut ws::WebsocketContext<Self>) {
        let history = self.services.history.clone();
        let session_id = self.session.id();
        let filename = format!("stream_{}.jpg", evaluation.measurement.timestamp.format("%Y%m%d_%H%M%S"));
        let future = async move { history.save(filename, evaluation.measurement, evaluation.annotated).await };
        ctx.spawn(future.into_actor(self).map(move |result, actor, ctx| match result {
            Ok(id) => actor.send(ctx, &OutboundMessage::Saved { id }),
            Err(err) => {
                let reason = err.to_string();
                actor.send(ctx, &OutboundMessage::Error {
                    kind: ErrorKind::UpstreamDependency,
                    message: HistoryEntry::SaveFailed(reason.clone()).to_string(),
                });
                actix::spawn(async move {
                    logging_error!(session_id, HistoryEntry::SaveFailed(reason), "");
                });
            }
        }));
    }

    fn shutdown(&mut self, ctx: &mut ws::WebsocketContext<Self>) {
        self.release_capture(ctx);
        self.session.close();
    }
}

async fn process_frame(pipeline: Arc<FramePipeline>, capture: Option<Arc<dyn FrameSource>>, payload: FramePayload, options: FrameOptions) -> Result<Evaluation, ProcessError> {
    let frame = match payload {
        FramePayload::Pushed(bytes) => bytes,
        FramePayload::Capture => {
            let source = capture.ok_or(ProcessError::Capture(GStreamerEntry::Released))?;
            spawn_blocking(move || source.grab())
                .await
                .map_err(|err| ProcessError::Internal(SystemEntry::TaskPanickedError(err.to_string()).into()))??
        }
    };
    pipeline.evaluate(frame, options).await
}

impl Actor for StreamWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        let session_id = self.session.id();
        actix::spawn(async move {
            logging_information!(session_id, SessionEntry::Connected(session_id), "");
        });
    }

    fn stopping(&mut self, ctx: &mut Self::Context) -> Running {
        self.shutdown(ctx);
        let session_id = self.session.id();
        actix::spawn(async move {
            logging_information!(session_id, SessionEntry::Closed(session_id), "");
        });
        Running::Stop
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for StreamWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Pong(_)) => (),
            Ok(ws::Message::Text(text)) => self.handle_control(&text, ctx),
            Ok(ws::Message::Binary(bin)) => self.handle_frame(bin, ctx),
            Ok(ws::Message::Close(reason)) => {
                let session_id = self.session.id();
                let peer = self.peer.clone();
                actix::spawn(async move {
                    logging_information!(session_id, NetworkEntry::PeerDisconnect(peer), "");
                });
                self.shutdown(ctx);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) | Ok(ws::Message::Nop) => (),
            Err(err) => {
                let session_id = self.session.id();
                let reason = err.to_string();
                actix::spawn(async move {
                    logging_warning!(session_id, NetworkEntry::ProtocolError(reason), "");
                });
                self.shutdown(ctx);
                ctx.stop();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::capture_device::tests::StillSource;
    use crate::capture::capture_device::CaptureOpener;
    use crate::detection::detector::tests::FakeDetector;
    use crate::history::history::tests::MemoryHistory;
    use crate::measurement::pipeline::tests::frame;
    use crate::session::stream_session::SessionState;
    use crate::utils::config::tests::sample;
    use actix_codec::{Decoder, Encoder};
    use actix_http::ws::Codec;
    use actix_web::error::PayloadError;
    use actix_web::web::BytesMut;
    use futures::channel::mpsc::{unbounded, UnboundedSender};
    use futures::stream::{LocalBoxStream, StreamExt};
    use serde_json::Value;
    use tokio::time::timeout;

    #[derive(Debug, Clone, PartialEq)]
    struct Snapshot {
        state: SessionState,
        cadence: Option<Duration>,
        capturing: bool,
    }

    #[derive(Message)]
    #[rtype(result = "Snapshot")]
    struct Inspect;

    impl Handler<Inspect> for StreamWebSocket {
        type Result = MessageResult<Inspect>;

        fn handle(&mut self, _msg: Inspect, _ctx: &mut Self::Context) -> Self::Result {
            MessageResult(Snapshot {
                state: self.session.state(),
                cadence: self.cadence.as_ref().map(|(_, period)| *period),
                capturing: self.capture.is_some(),
            })
        }
    }

    type Inbound = Result<Bytes, PayloadError>;

    /// Drives the actor through its context stream and decodes what it sends.
    struct Peer {
        inbound: UnboundedSender<Inbound>,
        outbound: LocalBoxStream<'static, Result<Bytes, actix_web::Error>>,
        buffer: BytesMut,
        codec: Codec,
        addr: Addr<StreamWebSocket>,
    }

    impl Peer {
        fn connect(services: Services) -> Self {
            let config = sample();
            let defaults = SessionSettings::from_config(&config);
            let actor = StreamWebSocket::new(Uuid::new_v4(), "127.0.0.1:50000".to_string(), defaults, config, services);
            let (inbound, inbound_rx) = unbounded::<Inbound>();
            let (addr, outbound) = ws::WebsocketContext::create_with_addr(actor, inbound_rx);
            Self {
                inbound,
                outbound: outbound.boxed_local(),
                buffer: BytesMut::new(),
                codec: Codec::new().client_mode(),
                addr,
            }
        }

        fn send(&mut self, message: ws::Message) {
            let mut encoded = BytesMut::new();
            self.codec.encode(message, &mut encoded).unwrap();
            self.inbound.unbounded_send(Ok(encoded.freeze())).unwrap();
        }

        fn text(&mut self, text: &str) {
            self.send(ws::Message::Text(text.into()));
        }

        fn image(&mut self) {
            self.send(ws::Message::Binary(Bytes::from(frame())));
        }

        async fn frame(&mut self) -> Option<ws::Frame> {
            loop {
                if let Some(frame) = self.codec.decode(&mut self.buffer).unwrap() {
                    return Some(frame);
                }
                let chunk = timeout(Duration::from_secs(5), self.outbound.next()).await.expect("session went quiet");
                match chunk {
                    Some(chunk) => self.buffer.extend_from_slice(&chunk.unwrap()),
                    None => return None,
                }
            }
        }

        async fn json(&mut self) -> Value {
            match self.frame().await {
                Some(ws::Frame::Text(text)) => serde_json::from_slice(&text).unwrap(),
                other => panic!("expected a text frame, got {other:?}"),
            }
        }

        async fn next_of(&mut self, kind: &str) -> Value {
            loop {
                let message = self.json().await;
                if message["type"] == kind {
                    return message;
                }
            }
        }

        /// Keeps the context polled until the actor answers.
        async fn inspect(&mut self) -> Snapshot {
            let reply = self.addr.send(Inspect);
            tokio::pin!(reply);
            loop {
                tokio::select! {
                    snapshot = &mut reply => return snapshot.unwrap(),
                    chunk = self.outbound.next() => match chunk {
                        Some(chunk) => self.buffer.extend_from_slice(&chunk.unwrap()),
                        None => panic!("session ended before answering"),
                    },
                }
            }
        }
    }

    #[actix_web::test]
    async fn garbage_control_is_silent_and_the_next_frame_resolves() {
        let mut peer = Peer::connect(Services::fake(Arc::new(MemoryHistory::default())));
        peer.text(r#"{"action":"start","value":"client"}"#);
        let status = peer.json().await;
        assert_eq!(status["type"], "status");
        assert_eq!(status["state"], "streaming");
        assert_eq!(status["mode"], "client");

        peer.text("{not json");
        peer.image();
        let result = peer.json().await;
        assert_eq!(result["type"], "result");
        assert_eq!(result["pattern"], "P100");
        assert_eq!(peer.inspect().await.state, SessionState::Streaming(CaptureMode::Client));
    }

    #[actix_web::test]
    async fn detector_failure_is_reported_without_ending_the_stream() {
        let services = Services::fake_with(Arc::new(FakeDetector::failing("model crashed")), Arc::new(MemoryHistory::default()));
        let mut peer = Peer::connect(services);
        peer.text(r#"{"action":"start"}"#);
        assert_eq!(peer.json().await["type"], "status");

        peer.image();
        let error = peer.json().await;
        assert_eq!(error["type"], "error");
        assert_eq!(error["kind"], "upstream_dependency");
        assert_eq!(peer.inspect().await.state, SessionState::Streaming(CaptureMode::Client));

        peer.image();
        assert_eq!(peer.json().await["kind"], "upstream_dependency");
    }

    #[actix_web::test]
    async fn settings_before_start_are_rejected_on_the_wire() {
        let mut peer = Peer::connect(Services::fake(Arc::new(MemoryHistory::default())));
        peer.text(r#"{"action":"set_conf","value":0.5}"#);
        let error = peer.json().await;
        assert_eq!(error["type"], "error");
        assert_eq!(error["kind"], "input_validation");
        assert_eq!(peer.inspect().await.state, SessionState::Idle);
    }

    #[actix_web::test]
    async fn frame_rate_change_reschedules_capture() {
        let mut peer = Peer::connect(Services::fake(Arc::new(MemoryHistory::default())));
        peer.text(r#"{"action":"start","value":"server"}"#);
        assert_eq!(peer.next_of("status").await["mode"], "server");
        let snapshot = peer.inspect().await;
        assert!(snapshot.capturing);
        assert_eq!(snapshot.cadence, Some(Duration::from_millis(500)));

        peer.text(r#"{"action":"set_fps","value":5}"#);
        assert_eq!(peer.next_of("status").await["settings"]["frame_rate"], 5);
        assert_eq!(peer.inspect().await.cadence, Some(Duration::from_millis(200)));
        assert_eq!(peer.next_of("result").await["pattern"], "P100");
    }

    #[actix_web::test]
    async fn stop_and_close_release_the_capture() {
        let source = Arc::new(StillSource::new(frame()));
        let shared = source.clone();
        let mut services = Services::fake(Arc::new(MemoryHistory::default()));
        let opener: CaptureOpener = Arc::new(move |_: &Config| Ok::<_, GStreamerEntry>(shared.clone() as Arc<dyn FrameSource>));
        services.capture = opener;
        let mut peer = Peer::connect(services);

        peer.text(r#"{"action":"start","value":"server"}"#);
        peer.next_of("status").await;
        assert_eq!(Arc::strong_count(&source), 3);

        peer.text(r#"{"action":"stop"}"#);
        assert_eq!(peer.next_of("status").await["state"], "idle");
        let snapshot = peer.inspect().await;
        assert_eq!(snapshot, Snapshot { state: SessionState::Idle, cadence: None, capturing: false });
        assert_eq!(Arc::strong_count(&source), 2);

        peer.text(r#"{"action":"start","value":"server"}"#);
        peer.next_of("status").await;
        assert!(peer.inspect().await.capturing);
        peer.send(ws::Message::Close(None));
        while peer.frame().await.is_some() {}
        assert_eq!(Arc::strong_count(&source), 2);
    }
}
