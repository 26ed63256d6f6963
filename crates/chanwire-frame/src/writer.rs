use std::io::{ErrorKind, Write};
use std::net::TcpStream;

use bytes::BytesMut;
use tracing::debug;

use crate::codec::{encode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::lazy::LazyFrame;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes complete frames to any `Write` stream.
pub struct FrameWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Encode and write a frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.buf.clear();
        encode_frame(frame, &mut self.buf)?;
        if self.buf.len() > self.config.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: self.buf.len(),
                max: self.config.max_frame_size,
            });
        }
        debug!(
            id = frame.id,
            frame_type = %frame.frame_type(),
            size = self.buf.len(),
            "write frame"
        );
        let mut buf = std::mem::take(&mut self.buf);
        let result = self.write_bytes(&buf);
        buf.clear();
        self.buf = buf;
        result
    }

    /// Write frames in order, stopping at the first failure.
    pub fn write_frames<'a>(&mut self, frames: impl IntoIterator<Item = &'a Frame>) -> Result<()> {
        frames.into_iter().try_for_each(|frame| self.write_frame(frame))
    }

    /// Forward a received frame as-is, including any in-place patches.
    pub fn write_lazy<B: AsRef<[u8]>>(&mut self, frame: &LazyFrame<B>) -> Result<()> {
        if frame.size() > self.config.max_frame_size {
            return Err(FrameError::FrameTooLarge {
                size: frame.size(),
                max: self.config.max_frame_size,
            });
        }
        self.write_bytes(frame.as_bytes())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        self.flush()
    }

    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.config.max_frame_size = max_frame_size;
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<TcpStream> {
    /// Create a frame writer for a TCP stream and apply the write timeout from config.
    pub fn with_config_tcp(inner: TcpStream, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use bytes::Bytes;

    use super::*;
    use crate::body::{CallCont, FrameBody};
    use crate::checksum::Checksum;
    use crate::codec::decode_frame;
    use crate::types::{FLAG_FRAGMENT, MAX_FRAME_SIZE};

    fn cont(id: u32, arg: &'static [u8]) -> Frame {
        Frame::new(
            id,
            FrameBody::CallRequestCont(CallCont::new(
                0,
                Checksum::none(),
                vec![Bytes::from_static(arg)],
            )),
        )
    }

    fn written(writer: FrameWriter<Cursor<Vec<u8>>>) -> BytesMut {
        BytesMut::from(writer.into_inner().into_inner().as_slice())
    }

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_frame(&cont(1, b"hello")).unwrap();

        let mut wire = written(writer);
        let frame = decode_frame(&mut wire, MAX_FRAME_SIZE).unwrap().unwrap();
        assert_eq!(frame.to_frame().unwrap(), cont(1, b"hello"));
    }

    #[test]
    fn write_multiple_frames() {
        let frames = [cont(1, b"one"), cont(2, b"two"), cont(3, b"three")];
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_frames(&frames).unwrap();

        let mut wire = written(writer);
        for expected in &frames {
            let frame = decode_frame(&mut wire, MAX_FRAME_SIZE).unwrap().unwrap();
            assert_eq!(&frame.to_frame().unwrap(), expected);
        }
        assert!(wire.is_empty());
    }

    #[test]
    fn frame_too_large_rejected() {
        let cfg = FrameConfig {
            max_frame_size: 20,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.write_frame(&cont(1, b"oversized")).unwrap_err();
        assert!(matches!(err, FrameError::FrameTooLarge { max: 20, .. }));
        assert!(written(writer).is_empty());
    }

    #[test]
    fn forwards_patched_lazy_frame() {
        let mut src = BytesMut::new();
        encode_frame(&cont(7, b"relay"), &mut src).unwrap();
        let mut lazy = decode_frame(&mut src, MAX_FRAME_SIZE).unwrap().unwrap();
        lazy.set_id(70).unwrap();

        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        writer.write_lazy(&lazy).unwrap();

        let mut wire = written(writer);
        let frame = decode_frame(&mut wire, MAX_FRAME_SIZE).unwrap().unwrap();
        assert_eq!(frame.to_frame().unwrap(), cont(70, b"relay"));
    }

    #[test]
    fn flush_propagates() {
        let sink = FlushTrackingWriter::default();
        let flag = Arc::clone(&sink.flushed);
        let mut writer = FrameWriter::new(sink);

        writer.write_frame(&cont(1, b"x")).unwrap();

        assert!(flag.load(Ordering::SeqCst));
    }

    #[test]
    fn handles_interrupted_and_would_block() {
        for stall in [ErrorKind::Interrupted, ErrorKind::WouldBlock] {
            let mut writer = FrameWriter::new(StallingWriter {
                stall,
                wrote_once: false,
                flushed_once: false,
                data: Vec::new(),
            });
            let frame = Frame::new(
                5,
                FrameBody::CallRequestCont(CallCont::new(FLAG_FRAGMENT, Checksum::none(), vec![])),
            );
            writer.write_frame(&frame).unwrap();
            assert_eq!(writer.into_inner().data.len(), 18);
        }
    }

    #[test]
    fn connection_closed_when_write_returns_zero() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.write_frame(&cont(1, b"x")).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn applies_write_timeout_for_tcp_stream() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let _server = listener.accept().unwrap();

        let cfg = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };
        let writer = FrameWriter::with_config_tcp(client, cfg).unwrap();
        // the kernel may round the timeout up to its tick
        let applied = writer.get_ref().write_timeout().unwrap();
        assert!(applied.is_some_and(|t| t >= std::time::Duration::from_millis(10)));
    }

    #[derive(Default)]
    struct FlushTrackingWriter {
        flushed: Arc<AtomicBool>,
        data: Vec<u8>,
    }

    impl Write for FlushTrackingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct StallingWriter {
        stall: ErrorKind,
        wrote_once: bool,
        flushed_once: bool,
        data: Vec<u8>,
    }

    impl Write for StallingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.wrote_once {
                self.wrote_once = true;
                return Err(std::io::Error::from(self.stall));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flushed_once {
                self.flushed_once = true;
                return Err(std::io::Error::from(self.stall));
            }
            Ok(())
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
