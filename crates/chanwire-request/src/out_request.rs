//! One outbound call attempt: sending its frames, collecting its response and
//! reporting how it finished.

use std::io::Write;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, warn};

use chanwire_frame::{
    ArgAssembler, ArgWriter, CallCont, CallRequest, Checksum, Frame, FrameBody, FrameWriter,
    Headers, Tracing, ARG_SCHEME, CALLER_NAME,
};

use crate::channel::Channel;
use crate::completion::{Completion, Outcome, Response};
use crate::error::{RequestError, Result};
use crate::options::RequestOptions;
use crate::span::{Span, CLIENT_SEND};
use crate::state::RequestState;
use crate::stats::{
    StatKind, StatTags, CALLS_SENT, CALLS_SUCCESS, PER_ATTEMPT_APP_ERRORS, PER_ATTEMPT_LATENCY,
    PER_ATTEMPT_OPERATIONAL_ERRORS, PER_ATTEMPT_SYSTEM_ERRORS,
};

/// Log type of outbound requests.
pub const OUT_REQUEST_TYPE: &str = "tchannel.outgoing-request";

/// Where an outbound request's frames go.
pub trait FrameSink {
    fn send_frames(&mut self, frames: &[Frame]) -> chanwire_frame::Result<()>;
}

impl<W: Write> FrameSink for FrameWriter<W> {
    fn send_frames(&mut self, frames: &[Frame]) -> chanwire_frame::Result<()> {
        self.write_frames(frames)?;
        self.flush()
    }
}

impl FrameSink for Vec<Frame> {
    fn send_frames(&mut self, frames: &[Frame]) -> chanwire_frame::Result<()> {
        self.extend_from_slice(frames);
        Ok(())
    }
}

/// Incoming response frames gathered so far.
#[derive(Debug, Default)]
struct ResponseProgress {
    state: RequestState,
    code: u8,
    headers: Headers,
    tracing: Tracing,
    args: ArgAssembler,
}

/// Structured fields describing a request, for log records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestLogInfo {
    pub out_request_id: u32,
    #[serde(rename = "type")]
    pub request_type: &'static str,
    pub state: RequestState,
    pub remote_addr: String,
    pub service_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
    pub arg1: String,
}

/// Sender-side state machine of a single call attempt.
pub struct OutRequest {
    id: u32,
    options: RequestOptions,
    state: RequestState,
    start: Option<u64>,
    end: Option<u64>,
    endpoint: String,
    span: Option<Span>,
    err: Option<RequestError>,
    response: ResponseProgress,
    drained: Option<String>,
    writer: ArgWriter,
    completion: Completion,
    channel: Channel,
}

impl OutRequest {
    pub fn new(id: u32, options: RequestOptions, channel: Channel) -> Self {
        let span = options.trace.then(|| {
            Span::new(
                options.tracing.unwrap_or_default(),
                options.service.clone(),
                options.remote_addr.clone(),
            )
        });
        let writer = ArgWriter::new(options.checksum_type, options.max_frame_size);
        Self {
            id,
            options,
            state: RequestState::Initial,
            start: None,
            end: None,
            endpoint: String::new(),
            span,
            err: None,
            response: ResponseProgress::default(),
            drained: None,
            writer,
            completion: Completion::new(),
            channel,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn response_state(&self) -> RequestState {
        self.response.state
    }

    pub fn options(&self) -> &RequestOptions {
        &self.options
    }

    /// Handle on the outcome. Clones observe the same completion.
    pub fn completion(&self) -> Completion {
        self.completion.clone()
    }

    pub fn start(&self) -> Option<u64> {
        self.start
    }

    pub fn end(&self) -> Option<u64> {
        self.end
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    pub fn err(&self) -> Option<&RequestError> {
        self.err.as_ref()
    }

    /// When the attempt times out, once its first frame is out.
    pub fn deadline(&self) -> Option<u64> {
        self.start
            .map(|start| start.saturating_add(self.options.timeout_ms()))
    }

    /// Refuse every further send with `reason`.
    pub fn drain(&mut self, reason: impl Into<String>) {
        self.drained = Some(reason.into());
    }

    pub fn is_drained(&self) -> bool {
        self.drained.is_some()
    }

    /// Send all three args in a single, final call.
    pub fn send(
        &mut self,
        sink: &mut dyn FrameSink,
        arg1: Bytes,
        arg2: Bytes,
        arg3: Bytes,
    ) -> Result<()> {
        self.check_drained()?;
        self.send_arg1(&arg1)?;

        if let Some(span) = self.span.as_mut() {
            let scheme = self.options.headers.get(ARG_SCHEME).unwrap_or("");
            let caller = self.options.headers.get(CALLER_NAME).unwrap_or("");
            span.annotate_binary(ARG_SCHEME, scheme);
            span.annotate_binary(CALLER_NAME, caller);
        }

        if !self.options.logical && self.options.retry_count == 0 {
            self.emit_stat(
                CALLS_SENT,
                StatKind::Counter,
                1,
                StatTags::sent(&self.options.service, self.options.caller(), &self.endpoint),
            );
        }

        self.send_call_request_frame(sink, &[arg1, arg2, arg3], true)
    }

    /// Record the endpoint named by arg1.
    pub fn send_arg1(&mut self, arg1: &[u8]) -> Result<()> {
        self.check_drained()?;
        self.endpoint = String::from_utf8_lossy(arg1).into_owned();
        if let Some(span) = self.span.as_mut() {
            span.name = self.endpoint.clone();
        }
        Ok(())
    }

    /// Stream more arg parts, picking the frame type from the current state.
    pub fn send_parts(
        &mut self,
        sink: &mut dyn FrameSink,
        args: &[Bytes],
        is_last: bool,
    ) -> Result<()> {
        self.check_drained()?;
        match self.state {
            RequestState::Initial => self.send_call_request_frame(sink, args, is_last),
            RequestState::Streaming => self.send_call_request_cont_frame(sink, args, is_last),
            RequestState::Done => self.fail(RequestError::FrameState {
                attempted: "arg parts",
                state: RequestState::Done,
            }),
            RequestState::Error => {
                warn!(
                    id = self.id,
                    service = %self.options.service,
                    "ignoring arg parts sent after request error"
                );
                Ok(())
            }
        }
    }

    /// Send the initial CallRequest frame (and any fragments of it).
    pub fn send_call_request_frame(
        &mut self,
        sink: &mut dyn FrameSink,
        args: &[Bytes],
        is_last: bool,
    ) -> Result<()> {
        self.check_drained()?;
        match self.state {
            RequestState::Initial => {}
            RequestState::Done => {
                return self.fail(RequestError::AlreadyDone {
                    attempted: "call request",
                })
            }
            state => {
                return self.fail(RequestError::FrameState {
                    attempted: "call request",
                    state,
                })
            }
        }

        let head = FrameBody::CallRequest(CallRequest {
            flags: 0,
            ttl: self.options.ttl(),
            tracing: self.tracing(),
            service: self.options.service.clone(),
            headers: self.options.headers.clone(),
            checksum: Checksum::none(),
            args: Vec::new(),
        });

        let now = self.channel.now();
        self.start = Some(now);
        if let Some(span) = self.span.as_mut() {
            span.annotate(CLIENT_SEND, now);
        }

        self.write(sink, head, args, is_last)
    }

    /// Send a CallRequestCont frame continuing a streamed request.
    pub fn send_call_request_cont_frame(
        &mut self,
        sink: &mut dyn FrameSink,
        args: &[Bytes],
        is_last: bool,
    ) -> Result<()> {
        self.check_drained()?;
        match self.state {
            RequestState::Streaming => {}
            RequestState::Done => {
                return self.fail(RequestError::AlreadyDone {
                    attempted: "call request continuation",
                })
            }
            state => {
                return self.fail(RequestError::FrameState {
                    attempted: "call request continuation",
                    state,
                })
            }
        }
        let head = FrameBody::CallRequestCont(CallCont::new(0, Checksum::none(), Vec::new()));
        self.write(sink, head, args, is_last)
    }

    /// Feed a CallResponse or CallResponseCont body. Returns the response
    /// once its terminal frame has been seen.
    pub fn on_response_frame(&mut self, body: &FrameBody) -> Result<Option<Response>> {
        if let FrameBody::CallResponse(res) = body {
            self.response.code = res.code;
            self.response.headers = res.headers.clone();
            self.response.tracing = res.tracing;
        }
        let complete = self.response.args.push(body)?;
        if !complete {
            self.response.state = RequestState::Streaming;
            return Ok(None);
        }
        self.response.state = RequestState::Done;
        let args = std::mem::take(&mut self.response.args).finish();
        Ok(Some(Response {
            id: self.id,
            code: self.response.code,
            headers: std::mem::take(&mut self.response.headers),
            tracing: self.response.tracing,
            args,
        }))
    }

    /// Decide what a deadline means for this request. Returns the timeout
    /// error when nothing of the response has arrived yet.
    pub fn on_timeout(&mut self, now: u64) -> Option<RequestError> {
        if let Some(err) = &self.err {
            warn!(
                id = self.id,
                error = %err,
                "timeout on request that already failed"
            );
        }
        if self.response.state != RequestState::Initial {
            debug!(
                id = self.id,
                response_state = %self.response.state,
                "deadline passed while response streaming"
            );
            return None;
        }
        let start = self.start.unwrap_or(now);
        Some(RequestError::Timeout {
            id: self.id,
            start_ms: start,
            elapsed_ms: now.saturating_sub(start),
            timeout_ms: self.options.timeout_ms(),
            logical: self.options.logical,
            remote_addr: self.options.remote_addr.clone(),
        })
    }

    /// Finish the attempt with an error. Returns false if it had already
    /// finished.
    pub fn emit_error(&mut self, err: RequestError) -> bool {
        if self.end.is_none() && !self.state.is_terminal() {
            self.state = RequestState::Error;
        }
        self.complete_error(err)
    }

    fn complete_error(&mut self, err: RequestError) -> bool {
        if let Some(end) = self.end {
            warn!(
                id = self.id,
                end,
                error = %err,
                info = ?self.log_info(),
                "error for request that already finished"
            );
            return false;
        }
        self.finish();

        let (service, caller, endpoint, retry) = self.tag_parts();
        let tags = match err.error_code() {
            Some(code) => StatTags::system_error(&service, &caller, &endpoint, code.name(), retry),
            None => StatTags::operational_error(&service, &caller, &endpoint, err.kind(), retry),
        };
        let name = if err.is_error_frame() {
            PER_ATTEMPT_SYSTEM_ERRORS
        } else {
            PER_ATTEMPT_OPERATIONAL_ERRORS
        };
        self.emit_stat(name, StatKind::Counter, 1, tags);

        self.err = Some(err.clone());
        self.completion.complete(Outcome::Error(err))
    }

    /// Finish the attempt with a response. Returns false if it had already
    /// finished.
    pub fn emit_response(&mut self, res: Response) -> bool {
        if let Some(end) = self.end {
            warn!(
                id = self.id,
                end,
                code = res.code,
                info = ?self.log_info(),
                "response for request that already finished"
            );
            return false;
        }
        self.finish();

        let (service, caller, endpoint, retry) = self.tag_parts();
        if !res.ok() {
            self.emit_stat(
                PER_ATTEMPT_APP_ERRORS,
                StatKind::Counter,
                1,
                StatTags::app_error(&service, &caller, &endpoint, "unknown", retry),
            );
        } else if !self.options.logical {
            self.emit_stat(
                CALLS_SUCCESS,
                StatKind::Counter,
                1,
                StatTags::success(&service, &caller, &endpoint),
            );
        }

        self.completion.complete(Outcome::Response(res))
    }

    pub fn log_info(&self) -> RequestLogInfo {
        RequestLogInfo {
            out_request_id: self.id,
            request_type: OUT_REQUEST_TYPE,
            state: self.state,
            remote_addr: self.options.remote_addr.clone(),
            service_name: self.options.service.clone(),
            err: self.err.as_ref().map(ToString::to_string),
            arg1: self.endpoint.clone(),
        }
    }

    fn tracing(&self) -> Tracing {
        self.span
            .as_ref()
            .map(|span| span.tracing)
            .or(self.options.tracing)
            .unwrap_or_default()
    }

    fn write(
        &mut self,
        sink: &mut dyn FrameSink,
        head: FrameBody,
        args: &[Bytes],
        is_last: bool,
    ) -> Result<()> {
        let sent = self
            .writer
            .frames(self.id, head, args, is_last)
            .and_then(|frames| sink.send_frames(&frames).map(|()| frames.len()));
        match sent {
            Ok(count) => {
                self.state = if is_last {
                    RequestState::Done
                } else {
                    RequestState::Streaming
                };
                debug!(id = self.id, frames = count, state = %self.state, "sent request frames");
                Ok(())
            }
            Err(err) => {
                let err = RequestError::from(err);
                if self.end.is_none() {
                    self.emit_error(err.clone());
                }
                Err(err)
            }
        }
    }

    fn check_drained(&mut self) -> Result<()> {
        match &self.drained {
            Some(reason) => {
                let err = RequestError::Drained {
                    reason: reason.clone(),
                };
                self.fail(err)
            }
            None => Ok(()),
        }
    }

    /// Report a refused send through the completion (unless already
    /// finished) and to the caller. The request state is left as it was.
    fn fail(&mut self, err: RequestError) -> Result<()> {
        if self.end.is_none() {
            self.complete_error(err.clone());
        }
        Err(err)
    }

    /// Stamp `end` and emit the per-attempt latency.
    fn finish(&mut self) {
        let now = self.channel.now();
        self.end = Some(now);
        let latency = self.start.map_or(0, |start| now.saturating_sub(start));
        let (service, caller, endpoint, retry) = self.tag_parts();
        let tags = StatTags::per_attempt_latency(
            &service,
            &caller,
            &endpoint,
            &self.options.remote_addr,
            retry,
        );
        self.emit_stat(PER_ATTEMPT_LATENCY, StatKind::Timing, latency, tags);
    }

    fn tag_parts(&self) -> (String, String, String, u32) {
        (
            self.options.service.clone(),
            self.options.caller().to_string(),
            self.endpoint.clone(),
            self.options.retry_count,
        )
    }

    fn emit_stat(&self, name: &str, kind: StatKind, value: u64, tags: StatTags) {
        self.channel.stats.emit(name, kind, value, tags);
    }
}

impl std::fmt::Debug for OutRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutRequest")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("service", &self.options.service)
            .field("endpoint", &self.endpoint)
            .field("start", &self.start)
            .field("end", &self.end)
            .finish_non_exhaustive()
    }
}
