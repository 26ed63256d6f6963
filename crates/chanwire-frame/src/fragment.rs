//! Splitting argument chunks across call and continuation frames, and putting
//! them back together on the receiving side.
//!
//! The first chunk of every frame after the first continues the last argument
//! of the frame before it. When a fragmented frame happens to end exactly on
//! an argument boundary, the next frame opens with a zero-length chunk so the
//! following argument starts fresh.

use bytes::{Bytes, BytesMut};
use chanwire_rw::RwError;
use tracing::debug;

use crate::body::{body_table, CallCont, FrameBody, MAX_ARGS};
use crate::checksum::{Checksum, ChecksumState, ChecksumType};
use crate::codec::Frame;
use crate::error::{FrameError, Result};
use crate::types::{FrameType, FLAG_FRAGMENT, HEADER_SIZE, MAX_FRAME_SIZE};

/// Size prefix of one argument chunk.
const CHUNK_PREFIX: usize = 2;

/// Largest single chunk the `arg~2` prefix can describe.
const MAX_CHUNK: usize = u16::MAX as usize;

/// Outgoing side: turns argument lists into frames for one call.
///
/// The writer keeps the running checksum and the argument boundary state
/// between calls to [`ArgWriter::frames`], so a streamed call is written by
/// one writer from the initial frame through its last continuation.
#[derive(Debug, Clone)]
pub struct ArgWriter {
    max_frame_size: usize,
    checksum: ChecksumState,
    close_first: bool,
}

impl ArgWriter {
    pub fn new(kind: ChecksumType, max_frame_size: usize) -> Self {
        Self {
            max_frame_size: max_frame_size.min(MAX_FRAME_SIZE),
            checksum: ChecksumState::new(kind),
            close_first: false,
        }
    }

    pub fn checksum_type(&self) -> ChecksumType {
        self.checksum.kind()
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Build the frames carrying `args`.
    ///
    /// `head` is the body of the first frame with its args left empty: a
    /// CallRequest or CallResponse for the initial send, or a continuation
    /// body when streaming more parts of a call. Its flags are kept apart from
    /// the fragment bit, which is set on every produced frame except the last
    /// one of a call (`is_last`). When `is_last` is false the final argument
    /// stays open and the next call's first chunk extends it.
    pub fn frames(
        &mut self,
        id: u32,
        head: FrameBody,
        args: &[Bytes],
        is_last: bool,
    ) -> Result<Vec<Frame>> {
        let head_type = head.frame_type();
        let cont_type = head_type.continuation().ok_or(FrameError::UnexpectedFrame {
            frame_type: head_type,
            reason: "body carries no args",
        })?;

        let mut frames = Vec::new();
        let mut body = head;
        let mut arg = 0;
        let mut pos = 0;
        loop {
            let (chunks, open) = self.fill(&mut body, args, &mut arg, &mut pos)?;
            let done = arg == args.len();
            for chunk in &chunks {
                self.checksum.update(chunk);
            }
            let checksum = self.checksum.checksum()?;
            if let Some(parts) = body.call_parts_mut() {
                let fragment = !done || !is_last;
                let bit = if fragment { FLAG_FRAGMENT } else { 0 };
                *parts.flags = (*parts.flags & !FLAG_FRAGMENT) | bit;
                *parts.checksum = checksum;
                *parts.args = chunks;
            }
            self.close_first = !done && !open;
            frames.push(Frame::new(id, body));
            if done {
                break;
            }
            body = continuation_body(cont_type);
        }
        debug!(
            id,
            frame_type = %head_type,
            frames = frames.len(),
            is_last,
            "split args into frames"
        );
        Ok(frames)
    }

    /// Pack as many chunks as fit into `body`. Returns the chunks and whether
    /// the last one left its argument open.
    fn fill(
        &mut self,
        body: &mut FrameBody,
        args: &[Bytes],
        arg: &mut usize,
        pos: &mut usize,
    ) -> Result<(Vec<Bytes>, bool)> {
        if let Some(parts) = body.call_parts_mut() {
            parts.args.clear();
            *parts.checksum = Checksum::new(self.checksum.kind(), 0);
        }
        let overhead = HEADER_SIZE
            + body_table()
                .lookup(body.frame_type().code(), 0)?
                .byte_length(body)?;
        // every frame must move at least one byte or close one arg
        let needed = overhead + CHUNK_PREFIX * (1 + usize::from(self.close_first)) + 1;
        if needed > self.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: needed,
                max: self.max_frame_size,
            });
        }

        let mut room = self.max_frame_size - overhead;
        let mut chunks = Vec::with_capacity(MAX_ARGS);
        let mut open = false;
        if std::mem::take(&mut self.close_first) {
            chunks.push(Bytes::new());
            room -= CHUNK_PREFIX;
        }
        while *arg < args.len() && chunks.len() < MAX_ARGS && room >= CHUNK_PREFIX {
            let current = &args[*arg];
            let take = (current.len() - *pos).min(room - CHUNK_PREFIX).min(MAX_CHUNK);
            chunks.push(current.slice(*pos..*pos + take));
            room -= CHUNK_PREFIX + take;
            *pos += take;
            if *pos < current.len() {
                open = true;
                break;
            }
            *arg += 1;
            *pos = 0;
        }
        Ok((chunks, open))
    }
}

fn continuation_body(frame_type: FrameType) -> FrameBody {
    let cont = CallCont::new(0, Checksum::none(), Vec::new());
    match frame_type {
        FrameType::CallResponseCont => FrameBody::CallResponseCont(cont),
        _ => FrameBody::CallRequestCont(cont),
    }
}

/// Incoming side: joins the chunks of a call's frames into whole arguments
/// and verifies the running checksum on every frame.
#[derive(Debug, Default)]
pub struct ArgAssembler {
    args: Vec<BytesMut>,
    checksum: Option<ChecksumState>,
    expect: Option<FrameType>,
    complete: bool,
}

impl ArgAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next frame body of the call. Returns true once the terminal
    /// frame has been seen.
    pub fn push(&mut self, body: &FrameBody) -> Result<bool> {
        let frame_type = body.frame_type();
        let unexpected = |reason| FrameError::UnexpectedFrame { frame_type, reason };
        if self.complete {
            return Err(unexpected("call already complete"));
        }
        match self.expect {
            None if matches!(frame_type, FrameType::CallRequest | FrameType::CallResponse) => {}
            None => return Err(unexpected("expected an initial call frame")),
            Some(expected) if expected == frame_type => {}
            Some(_) => return Err(unexpected("out of sequence")),
        }
        let (Some(flags), Some(carried), Some(chunks)) =
            (body.flags(), body.checksum(), body.args())
        else {
            return Err(unexpected("body carries no args"));
        };

        let state = self
            .checksum
            .get_or_insert_with(|| ChecksumState::new(carried.kind));
        for chunk in chunks {
            state.update(chunk);
        }
        state.verify(carried)?;

        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 && self.expect.is_some() {
                if let Some(last) = self.args.last_mut() {
                    last.extend_from_slice(chunk);
                    continue;
                }
            }
            if self.args.len() == MAX_ARGS {
                return Err(RwError::invalid("more than 3 args in call", 0).into());
            }
            self.args.push(BytesMut::from(chunk.as_ref()));
        }

        self.expect = frame_type.continuation();
        self.complete = flags & FLAG_FRAGMENT == 0;
        Ok(self.complete)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Arguments gathered so far.
    pub fn finish(self) -> Vec<Bytes> {
        self.args.into_iter().map(BytesMut::freeze).collect()
    }
}
