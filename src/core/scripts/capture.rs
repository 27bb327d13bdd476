//! Standard Streams and Output Capture
//!
//! Every byte a script prints goes through one shared [`StandardStreams`]
//! handle. By default it forwards to the process stdout/stderr. An
//! [`OutputCapture`] swaps private buffers into that handle for the lifetime
//! of a [`CaptureSession`] and puts the original writers back when the
//! session is dropped, including while a panic unwinds through it.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::error::{ScriptError, ScriptResult};

/// Writer type held by the stream handle
pub type BoxedWriter = Box<dyn Write + Send>;

/// Output channel of a script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

struct StreamPair {
    stdout: BoxedWriter,
    stderr: BoxedWriter,
}

/// Shared, swappable stdout/stderr sink
#[derive(Clone)]
pub struct StandardStreams {
    inner: Arc<Mutex<StreamPair>>,
}

impl StandardStreams {
    /// Streams backed by the real process stdout and stderr
    pub fn process() -> Self {
        Self::with_writers(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// Streams backed by arbitrary writers (tests, embedding hosts)
    pub fn with_writers(stdout: BoxedWriter, stderr: BoxedWriter) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StreamPair { stdout, stderr })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StreamPair> {
        // A panic while holding the lock leaves the writers usable
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write bytes to one channel
    pub fn write(&self, channel: Channel, bytes: &[u8]) -> io::Result<()> {
        let mut pair = self.lock();
        match channel {
            Channel::Stdout => pair.stdout.write_all(bytes),
            Channel::Stderr => pair.stderr.write_all(bytes),
        }
    }

    /// Write a string to one channel
    pub fn write_str(&self, channel: Channel, text: &str) -> io::Result<()> {
        self.write(channel, text.as_bytes())
    }

    /// Flush both channels
    pub fn flush(&self) -> io::Result<()> {
        let mut pair = self.lock();
        pair.stdout.flush()?;
        pair.stderr.flush()
    }

    /// Replace both writers, returning the previous ones
    fn swap(&self, stdout: BoxedWriter, stderr: BoxedWriter) -> (BoxedWriter, BoxedWriter) {
        let mut pair = self.lock();
        let old_out = std::mem::replace(&mut pair.stdout, stdout);
        let old_err = std::mem::replace(&mut pair.stderr, stderr);
        (old_out, old_err)
    }
}

impl Default for StandardStreams {
    fn default() -> Self {
        Self::process()
    }
}

impl std::fmt::Debug for StandardStreams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardStreams").finish_non_exhaustive()
    }
}

/// Cloneable in-memory writer
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.bytes.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current contents as (lossy) UTF-8
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }

    /// Raw bytes as written
    pub fn bytes(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// Return the contents and clear the buffer
    pub fn take(&self) -> String {
        let bytes = std::mem::take(&mut *self.lock());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Text captured during one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Owner of the capture buffers
#[derive(Debug, Default)]
pub struct OutputCapture {
    stdout: SharedBuffer,
    stderr: SharedBuffer,
    active: Arc<AtomicBool>,
}

impl OutputCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Redirect `streams` into this capturer until the session is dropped.
    ///
    /// Fails with [`ScriptError::CaptureActive`] if a session from this
    /// capturer is still alive.
    pub fn capture(&self, streams: &StandardStreams) -> ScriptResult<CaptureSession> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(ScriptError::CaptureActive);
        }

        let (stdout, stderr) = streams.swap(
            Box::new(self.stdout.clone()),
            Box::new(self.stderr.clone()),
        );

        Ok(CaptureSession {
            streams: streams.clone(),
            originals: Some((stdout, stderr)),
            active: Arc::clone(&self.active),
        })
    }

    /// Whether a session is currently redirecting output
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Buffered text of both channels; the buffers are left empty
    pub fn retrieve(&self) -> CapturedOutput {
        CapturedOutput {
            stdout: self.stdout.take(),
            stderr: self.stderr.take(),
        }
    }
}

/// Active redirection; restores the original writers on drop
pub struct CaptureSession {
    streams: StandardStreams,
    originals: Option<(BoxedWriter, BoxedWriter)>,
    active: Arc<AtomicBool>,
}

impl CaptureSession {
    /// End the session explicitly
    pub fn finish(self) {}
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some((stdout, stderr)) = self.originals.take() {
            let _ = self.streams.swap(stdout, stderr);
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_streams() -> (StandardStreams, SharedBuffer, SharedBuffer) {
        let out = SharedBuffer::new();
        let err = SharedBuffer::new();
        let streams = StandardStreams::with_writers(Box::new(out.clone()), Box::new(err.clone()));
        (streams, out, err)
    }

    #[test]
    fn test_writes_reach_live_streams_without_capture() {
        let (streams, out, err) = live_streams();
        streams.write_str(Channel::Stdout, "hello\n").unwrap();
        streams.write_str(Channel::Stderr, "oops\n").unwrap();
        assert_eq!(out.contents(), "hello\n");
        assert_eq!(err.contents(), "oops\n");
    }

    #[test]
    fn test_capture_round_trip() {
        let (streams, out, err) = live_streams();
        let capture = OutputCapture::new();

        {
            let _session = capture.capture(&streams).unwrap();
            streams.write_str(Channel::Stdout, "captured\n").unwrap();
            streams.write_str(Channel::Stderr, "warned\n").unwrap();
        }

        assert!(out.is_empty(), "live stdout must not see captured text");
        assert!(err.is_empty(), "live stderr must not see captured text");

        let captured = capture.retrieve();
        assert_eq!(captured.stdout, "captured\n");
        assert_eq!(captured.stderr, "warned\n");

        streams.write_str(Channel::Stdout, "after\n").unwrap();
        assert_eq!(out.contents(), "after\n");
    }

    #[test]
    fn test_retrieve_resets_buffers() {
        let (streams, _out, _err) = live_streams();
        let capture = OutputCapture::new();

        let session = capture.capture(&streams).unwrap();
        streams.write_str(Channel::Stdout, "first\n").unwrap();
        session.finish();
        assert_eq!(capture.retrieve().stdout, "first\n");

        let session = capture.capture(&streams).unwrap();
        streams.write_str(Channel::Stdout, "second\n").unwrap();
        session.finish();
        assert_eq!(capture.retrieve().stdout, "second\n");
        assert_eq!(capture.retrieve(), CapturedOutput::default());
    }

    #[test]
    fn test_reentrant_capture_rejected() {
        let (streams, _out, _err) = live_streams();
        let capture = OutputCapture::new();

        let session = capture.capture(&streams).unwrap();
        assert!(capture.is_active());
        assert!(matches!(
            capture.capture(&streams),
            Err(ScriptError::CaptureActive)
        ));
        drop(session);

        assert!(!capture.is_active());
        assert!(capture.capture(&streams).is_ok());
    }

    #[test]
    fn test_restored_after_panic() {
        let (streams, out, _err) = live_streams();
        let capture = OutputCapture::new();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _session = capture.capture(&streams).unwrap();
            streams.write_str(Channel::Stdout, "before panic\n").unwrap();
            panic!("script blew up");
        }));

        assert!(result.is_err());
        assert!(!capture.is_active());
        streams.write_str(Channel::Stdout, "live again\n").unwrap();
        assert_eq!(out.contents(), "live again\n");
        assert_eq!(capture.retrieve().stdout, "before panic\n");
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let buffer = SharedBuffer::new();
        let mut writer = buffer.clone();
        writer.write_all(&[0x66, 0x6f, 0xff]).unwrap();
        assert_eq!(buffer.take(), "fo\u{fffd}");
        assert!(buffer.is_empty());
    }
}
