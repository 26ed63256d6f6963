//! `tokio_util::codec` adapter for async streams.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::lazy::LazyFrame;

/// Decodes lazy frames and encodes eager ones.
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    config: FrameConfig,
}

impl FrameCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for FrameCodec {
    type Item = LazyFrame<BytesMut>;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        decode_frame(src, self.config.max_frame_size)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let size = frame.wire_size()?;
        if size > self.config.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size,
                max: self.config.max_frame_size,
            });
        }
        encode_frame(&frame, dst)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures_util::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;
    use crate::body::{CallRequest, ErrorResponse, FrameBody};
    use crate::types::ErrorCode;

    #[tokio::test]
    async fn frames_over_duplex() {
        let (client, server) = tokio::io::duplex(1024);
        let mut sink = FramedWrite::new(client, FrameCodec::default());
        let mut stream = FramedRead::new(server, FrameCodec::default());

        let call = Frame::new(
            11,
            FrameBody::CallRequest(CallRequest {
                ttl: 500,
                service: "castle".into(),
                args: vec![Bytes::from_static(b"door")],
                ..CallRequest::default()
            }),
        );
        let error = Frame::new(
            11,
            FrameBody::ErrorResponse(ErrorResponse {
                code: ErrorCode::Declined,
                message: "no".into(),
                ..ErrorResponse::default()
            }),
        );
        sink.send(call.clone()).await.unwrap();
        sink.send(error.clone()).await.unwrap();
        drop(sink);

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.read_service().unwrap().1, "castle");
        assert_eq!(first.to_frame().unwrap(), call);
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.to_frame().unwrap(), error);
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn truncated_stream_at_eof() {
        let mut buf = BytesMut::new();
        encode_frame(&Frame::new(1, FrameBody::PingRequest), &mut buf).unwrap();
        buf.truncate(10);
        let err = FrameCodec::default().decode_eof(&mut buf).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn encoder_enforces_limit() {
        let mut codec = FrameCodec::new(FrameConfig {
            max_frame_size: 16,
            ..FrameConfig::default()
        });
        let mut dst = BytesMut::new();
        codec
            .encode(Frame::new(1, FrameBody::PingResponse), &mut dst)
            .unwrap();
        let big = Frame::new(
            2,
            FrameBody::CallRequest(CallRequest::default()),
        );
        let err = codec.encode(big, &mut dst).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { max: 16, .. }));
        assert_eq!(dst.len(), 16);
    }
}
