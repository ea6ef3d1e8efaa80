//! Mock serial channel for testing.
//!
//! [`MockChannel`] is the half handed to the adapter; [`MockDevice`] is the
//! test's view of the far end of the line. Through the device a test can:
//! - deliver bytes to the adapter, immediately or after a delay
//! - inspect what the adapter transmitted
//! - throttle how many bytes the line accepts, to stall stores
//! - inject out-of-band faults
//! - observe timeout propagation, input clears and closing
//!
//! # Example
//! ```
//! use serial_stream_adapter::port::{BlockingStreamAdapter, MockChannel, StreamResource};
//!
//! let (channel, device) = MockChannel::pair("MOCK0");
//! let mut adapter = BlockingStreamAdapter::new(channel).unwrap();
//!
//! adapter.write(b"\x01\x03\x00\x00\x00\x01", 0, 6).unwrap();
//! assert_eq!(device.written(), b"\x01\x03\x00\x00\x00\x01");
//! ```

use super::error::PortError;
use super::timeout::Timeout;
use super::traits::{ChannelFault, SerialChannel};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::thread;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::mpsc;

/// Which timeout a propagated update targeted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// One timeout value the adapter pushed down to the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutUpdate {
    pub direction: Direction,
    pub timeout: Timeout,
}

/// Line state shared between the channel, its endpoints and the device.
#[derive(Debug)]
struct MockLineState {
    open: bool,
    close_calls: usize,
    incoming: Option<mpsc::UnboundedSender<Vec<u8>>>,
    faults: Option<mpsc::UnboundedSender<ChannelFault>>,
    written: Vec<u8>,
    accept_limit: Option<usize>,
    write_waker: Option<Waker>,
    read_timeout: Timeout,
    write_timeout: Timeout,
    timeout_updates: Vec<TimeoutUpdate>,
    input_clears: usize,
    native_reads: usize,
}

/// Channel half of the mock line.
pub struct MockChannel {
    name: String,
    state: Arc<Mutex<MockLineState>>,
    endpoints: Option<(MockReader, MockWriter)>,
    faults: Option<mpsc::UnboundedReceiver<ChannelFault>>,
}

/// Far end of the mock line, held by the test.
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<Mutex<MockLineState>>,
}

/// Builder for a [`MockChannel`]/[`MockDevice`] pair.
#[derive(Debug, Clone)]
pub struct MockChannelBuilder {
    name: String,
    read_timeout: Timeout,
    write_timeout: Timeout,
    accept_limit: Option<usize>,
}

impl MockChannelBuilder {
    /// Channel-level read timeout the adapter starts with.
    pub fn read_timeout(mut self, timeout: Timeout) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Channel-level write timeout the adapter starts with.
    pub fn write_timeout(mut self, timeout: Timeout) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Stall writes once this many bytes in total have been accepted.
    pub fn accept_limit(mut self, limit: usize) -> Self {
        self.accept_limit = Some(limit);
        self
    }

    pub fn build(self) -> (MockChannel, MockDevice) {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(MockLineState {
            open: true,
            close_calls: 0,
            incoming: Some(incoming_tx),
            faults: Some(fault_tx),
            written: Vec::new(),
            accept_limit: self.accept_limit,
            write_waker: None,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            timeout_updates: Vec::new(),
            input_clears: 0,
            native_reads: 0,
        }));

        let reader = MockReader {
            chunks: incoming_rx,
            pending: VecDeque::new(),
            state: Arc::clone(&state),
        };
        let writer = MockWriter {
            state: Arc::clone(&state),
        };
        let channel = MockChannel {
            name: self.name,
            state: Arc::clone(&state),
            endpoints: Some((reader, writer)),
            faults: Some(fault_rx),
        };
        (channel, MockDevice { state })
    }
}

impl MockChannel {
    /// Start building a mock line with the given channel name.
    pub fn builder(name: impl Into<String>) -> MockChannelBuilder {
        MockChannelBuilder {
            name: name.into(),
            read_timeout: Timeout::Infinite,
            write_timeout: Timeout::Infinite,
            accept_limit: None,
        }
    }

    /// A mock line with infinite timeouts and an unthrottled writer.
    pub fn pair(name: impl Into<String>) -> (MockChannel, MockDevice) {
        Self::builder(name).build()
    }
}

impl SerialChannel for MockChannel {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn take_endpoints(&mut self) -> Result<(MockReader, MockWriter), PortError> {
        self.endpoints.take().ok_or(PortError::EndpointsTaken)
    }

    fn read_timeout(&self) -> Timeout {
        self.state.lock().read_timeout
    }

    fn write_timeout(&self) -> Timeout {
        self.state.lock().write_timeout
    }

    fn set_read_timeout(&mut self, timeout: Timeout) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.read_timeout = timeout;
        state.timeout_updates.push(TimeoutUpdate {
            direction: Direction::Read,
            timeout,
        });
        Ok(())
    }

    fn set_write_timeout(&mut self, timeout: Timeout) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.write_timeout = timeout;
        state.timeout_updates.push(TimeoutUpdate {
            direction: Direction::Write,
            timeout,
        });
        Ok(())
    }

    fn clear_input(&mut self) -> Result<(), PortError> {
        self.state.lock().input_clears += 1;
        Ok(())
    }

    fn take_faults(&mut self) -> Option<mpsc::UnboundedReceiver<ChannelFault>> {
        self.faults.take()
    }

    fn close(&mut self) -> Result<(), PortError> {
        let mut state = self.state.lock();
        state.open = false;
        state.close_calls += 1;
        Ok(())
    }
}

impl std::fmt::Debug for MockChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockChannel")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}

impl MockDevice {
    /// Put bytes on the line towards the adapter.
    pub fn deliver(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        if let Some(incoming) = self.state.lock().incoming.as_ref() {
            let _ = incoming.send(data.to_vec());
        }
    }

    /// Deliver bytes from a helper thread after `delay`.
    pub fn deliver_after(&self, delay: Duration, data: &[u8]) -> thread::JoinHandle<()> {
        let device = self.clone();
        let data = data.to_vec();
        thread::spawn(move || {
            thread::sleep(delay);
            device.deliver(&data);
        })
    }

    /// End the incoming stream; the adapter sees end-of-file once drained.
    pub fn hang_up(&self) {
        self.state.lock().incoming = None;
    }

    /// Report an out-of-band fault.
    pub fn inject_fault(&self, fault: ChannelFault) {
        if let Some(faults) = self.state.lock().faults.as_ref() {
            let _ = faults.send(fault);
        }
    }

    /// Everything the adapter has transmitted so far.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }

    /// Change the total number of bytes the line accepts; `None` lifts the limit.
    pub fn set_accept_limit(&self, limit: Option<usize>) {
        let mut state = self.state.lock();
        state.accept_limit = limit;
        if let Some(waker) = state.write_waker.take() {
            waker.wake();
        }
    }

    /// Timeout values pushed down by the adapter, oldest first.
    pub fn timeout_updates(&self) -> Vec<TimeoutUpdate> {
        self.state.lock().timeout_updates.clone()
    }

    /// How many times the driver receive queue was cleared.
    pub fn input_clears(&self) -> usize {
        self.state.lock().input_clears
    }

    /// Native reads that completed against the line.
    pub fn native_reads(&self) -> usize {
        self.state.lock().native_reads
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn set_open(&self, open: bool) {
        self.state.lock().open = open;
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }
}

impl std::fmt::Debug for MockDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("MockDevice")
            .field("open", &state.open)
            .field("written", &state.written.len())
            .finish()
    }
}

/// Incoming half of the mock line.
#[derive(Debug)]
pub struct MockReader {
    chunks: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: VecDeque<u8>,
    state: Arc<Mutex<MockLineState>>,
}

impl AsyncRead for MockReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if this.pending.is_empty() {
            match this.chunks.poll_recv(cx) {
                Poll::Ready(Some(chunk)) => this.pending.extend(chunk),
                // End of stream: leave `buf` untouched.
                Poll::Ready(None) => {
                    this.state.lock().native_reads += 1;
                    return Poll::Ready(Ok(()));
                }
                Poll::Pending => return Poll::Pending,
            }
            // Whatever else already arrived sits in the same driver buffer.
            while let Ok(chunk) = this.chunks.try_recv() {
                this.pending.extend(chunk);
            }
        }

        let n = buf.remaining().min(this.pending.len());
        let bytes: Vec<u8> = this.pending.drain(..n).collect();
        buf.put_slice(&bytes);
        this.state.lock().native_reads += 1;
        Poll::Ready(Ok(()))
    }
}

/// Outgoing half of the mock line.
#[derive(Debug)]
pub struct MockWriter {
    state: Arc<Mutex<MockLineState>>,
}

impl AsyncWrite for MockWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if buf.is_empty() {
            return Poll::Ready(Ok(0));
        }
        let mut state = self.state.lock();
        let room = match state.accept_limit {
            Some(limit) => limit.saturating_sub(state.written.len()),
            None => buf.len(),
        };
        if room == 0 {
            state.write_waker = Some(cx.waker().clone());
            return Poll::Pending;
        }
        let n = room.min(buf.len());
        state.written.extend_from_slice(&buf[..n]);
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
