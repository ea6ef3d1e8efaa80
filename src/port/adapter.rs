//! Blocking stream adapter over an asynchronous serial channel.
//!
//! [`BlockingStreamAdapter`] owns a [`SerialChannel`] and its two buffered
//! endpoints and exposes them through the synchronous [`StreamResource`]
//! contract a protocol transport such as a Modbus RTU master expects.
//!
//! Each `read` or `write` moves the relevant endpoint into one task on the
//! adapter's runtime, bounds the native load/store with the configured
//! deadline inside that task, and blocks the caller until the task hands the
//! endpoint back. On expiry the native future is dropped before the hand-back,
//! so nothing keeps running after the caller sees the timeout and the buffered
//! input is in a known state for the next call.
//!
//! Calls are accepted from plain threads, `spawn_blocking` threads and
//! multi-thread runtime workers; only a current-thread runtime is refused.

use super::bridge::{self, Executor};
use super::endpoint::{InputEndpoint, InputStreamOptions, OutputEndpoint, DEFAULT_READ_CHUNK};
use super::error::PortError;
use super::timeout::Timeout;
use super::traits::{ChannelFault, SerialChannel, StreamResource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[cfg(feature = "async-serial")]
use super::tokio_channel::TokioSerialChannel;
#[cfg(feature = "async-serial")]
use super::traits::PortConfiguration;

/// Tuning knobs for the adapter's runtime and input endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    /// Worker threads of the runtime the adapter builds for itself.
    pub worker_threads: usize,
    /// Completion rule for input loads.
    pub input_mode: InputStreamOptions,
    /// Size of a single native read.
    pub read_chunk: usize,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            worker_threads: 1,
            input_mode: InputStreamOptions::Partial,
            read_chunk: DEFAULT_READ_CHUNK,
        }
    }
}

/// Synchronous, timeout-bounded view of an asynchronous serial channel.
pub struct BlockingStreamAdapter<C: SerialChannel> {
    name: String,
    channel: Option<C>,
    input: Option<InputEndpoint<C::Reader>>,
    output: Option<OutputEndpoint<C::Writer>>,
    read_timeout: Timeout,
    write_timeout: Timeout,
    executor: Executor,
    fault_watch: Option<JoinHandle<()>>,
    faults: Arc<AtomicU64>,
}

impl<C: SerialChannel> BlockingStreamAdapter<C> {
    /// Take ownership of an open channel, running its I/O on a dedicated
    /// single-worker runtime.
    ///
    /// # Example
    /// ```
    /// use serial_stream_adapter::port::{BlockingStreamAdapter, MockChannel, StreamResource};
    ///
    /// let (channel, device) = MockChannel::pair("MOCK0");
    /// let mut adapter = BlockingStreamAdapter::new(channel)?;
    ///
    /// device.deliver(b"\x01\x04\x02\x00\x2a");
    /// let mut frame = [0u8; 5];
    /// let n = adapter.read(&mut frame, 0, 5)?;
    /// assert_eq!(&frame[..n], b"\x01\x04\x02\x00\x2a");
    /// # Ok::<(), serial_stream_adapter::port::PortError>(())
    /// ```
    pub fn new(channel: C) -> Result<Self, PortError> {
        Self::with_settings(channel, AdapterSettings::default())
    }

    /// Like [`new`](Self::new) with explicit settings.
    pub fn with_settings(channel: C, settings: AdapterSettings) -> Result<Self, PortError> {
        let executor = Executor::owned(settings.worker_threads)?;
        Self::build(channel, executor, &settings)
    }

    /// Run the channel's I/O on an existing runtime instead of a private one.
    ///
    /// `worker_threads` in `settings` is ignored.
    pub fn with_handle(
        channel: C,
        handle: Handle,
        settings: AdapterSettings,
    ) -> Result<Self, PortError> {
        Self::build(channel, Executor::shared(handle), &settings)
    }

    fn build(
        mut channel: C,
        executor: Executor,
        settings: &AdapterSettings,
    ) -> Result<Self, PortError> {
        if !channel.is_open() {
            return Err(PortError::NotOpen);
        }

        let (reader, writer) = channel.take_endpoints()?;
        let name = channel.name().to_string();
        let faults = Arc::new(AtomicU64::new(0));
        let fault_watch = channel.take_faults().map(|rx| {
            executor
                .handle()
                .spawn(watch_faults(name.clone(), rx, Arc::clone(&faults)))
        });

        let adapter = Self {
            input: Some(InputEndpoint::new(
                reader,
                settings.input_mode,
                settings.read_chunk,
            )),
            output: Some(OutputEndpoint::new(writer)),
            read_timeout: channel.read_timeout(),
            write_timeout: channel.write_timeout(),
            channel: Some(channel),
            name,
            executor,
            fault_watch,
            faults,
        };

        info!(
            port = %adapter.name,
            read_timeout = %adapter.read_timeout,
            write_timeout = %adapter.write_timeout,
            input_mode = ?settings.input_mode,
            "stream adapter ready"
        );
        Ok(adapter)
    }

    /// Name of the underlying channel.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether [`dispose`](StreamResource::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.channel.is_none()
    }

    /// Bytes received but not yet returned by `read`.
    pub fn unconsumed_len(&self) -> usize {
        self.input.as_ref().map_or(0, InputEndpoint::unconsumed_len)
    }

    /// Native reads issued against the channel so far.
    pub fn native_reads(&self) -> u64 {
        self.input.as_ref().map_or(0, InputEndpoint::native_reads)
    }

    /// Out-of-band channel faults seen since construction.
    pub fn faults_observed(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    fn channel_mut(&mut self) -> Result<&mut C, PortError> {
        self.channel.as_mut().ok_or(PortError::Disposed)
    }

    /// An endpoint is missing either because the adapter was disposed or
    /// because a task carrying it died.
    fn missing_endpoint(&self) -> PortError {
        if self.channel.is_none() {
            PortError::Disposed
        } else {
            PortError::TaskLost
        }
    }

    fn take_input(&mut self) -> Result<InputEndpoint<C::Reader>, PortError> {
        match self.input.take() {
            Some(input) => Ok(input),
            None => Err(self.missing_endpoint()),
        }
    }

    fn take_output(&mut self) -> Result<OutputEndpoint<C::Writer>, PortError> {
        match self.output.take() {
            Some(output) => Ok(output),
            None => Err(self.missing_endpoint()),
        }
    }
}

#[cfg(feature = "async-serial")]
impl BlockingStreamAdapter<TokioSerialChannel> {
    /// Open a serial port and wrap it.
    ///
    /// The port is registered with the adapter's own runtime, so this can be
    /// called from plain synchronous code.
    pub fn open(
        port_name: &str,
        config: &PortConfiguration,
        settings: AdapterSettings,
    ) -> Result<Self, PortError> {
        let executor = Executor::owned(settings.worker_threads)?;
        let channel = {
            let _guard = executor.handle().enter();
            TokioSerialChannel::open(port_name, config)?
        };
        Self::build(channel, executor, &settings)
    }
}

impl<C: SerialChannel> StreamResource for BlockingStreamAdapter<C> {
    fn read_timeout(&self) -> Timeout {
        self.read_timeout
    }

    fn set_read_timeout(&mut self, timeout: Timeout) -> Result<(), PortError> {
        if timeout == self.read_timeout {
            return Ok(());
        }
        self.channel_mut()?.set_read_timeout(timeout)?;
        debug!(port = %self.name, %timeout, "read timeout changed");
        self.read_timeout = timeout;
        Ok(())
    }

    fn write_timeout(&self) -> Timeout {
        self.write_timeout
    }

    fn set_write_timeout(&mut self, timeout: Timeout) -> Result<(), PortError> {
        if timeout == self.write_timeout {
            return Ok(());
        }
        self.channel_mut()?.set_write_timeout(timeout)?;
        debug!(port = %self.name, %timeout, "write timeout changed");
        self.write_timeout = timeout;
        Ok(())
    }

    fn discard_in_buffer(&mut self) -> Result<(), PortError> {
        let dropped = match self.input.as_mut() {
            Some(input) => input.discard_all(),
            None => return Err(self.missing_endpoint()),
        };
        self.channel_mut()?.clear_input()?;
        debug!(port = %self.name, dropped, "input buffer discarded");
        Ok(())
    }

    fn read(
        &mut self,
        buffer: &mut [u8],
        offset: usize,
        count: usize,
    ) -> Result<usize, PortError> {
        let wanted = check_span(buffer.len(), offset, count)?;
        bridge::ensure_blocking_allowed()?;

        let input = self.take_input()?;
        let limit = self.read_timeout;
        let (mut input, outcome) = self.executor.hand_off(async move {
            let mut input = input;
            let outcome = limit.bound(input.load(wanted)).await;
            (input, outcome)
        })?;

        let result = match outcome {
            None => {
                debug!(port = %self.name, %limit, wanted, "read timed out");
                Err(PortError::Timeout(limit.reported()))
            }
            Some(Err(e)) => Err(e),
            Some(Ok(loaded)) => {
                let copied = copy_out(&mut input, buffer, offset, count);
                debug!(port = %self.name, loaded, copied, offset, count, "read complete");
                Ok(copied)
            }
        };
        self.input = Some(input);
        result
    }

    fn write(&mut self, buffer: &[u8], offset: usize, count: usize) -> Result<(), PortError> {
        let end = check_span(buffer.len(), offset, count)?;
        bridge::ensure_blocking_allowed()?;

        let mut output = self.take_output()?;
        output.write_bytes(&buffer[offset..end]);
        let limit = self.write_timeout;
        let (mut output, outcome) = self.executor.hand_off(async move {
            let outcome = limit.bound(output.store()).await;
            (output, outcome)
        })?;

        let result = match outcome {
            None => {
                let written = output.accepted();
                let dropped = output.discard_pending();
                warn!(port = %self.name, %limit, written, dropped, "write timed out");
                Err(PortError::WriteTimeout {
                    timeout: limit.reported(),
                    written,
                })
            }
            Some(Err(e)) => {
                output.discard_pending();
                Err(e)
            }
            Some(Ok(stored)) => {
                debug!(port = %self.name, stored, "write complete");
                Ok(())
            }
        };
        self.output = Some(output);
        result
    }

    fn dispose(&mut self) {
        let Some(mut channel) = self.channel.take() else {
            return;
        };

        if let Some(watch) = self.fault_watch.take() {
            watch.abort();
        }
        self.input = None;
        self.output = None;
        if let Err(e) = channel.close() {
            warn!(port = %self.name, error = %e, "closing channel failed");
        }
        drop(channel);
        self.executor.shutdown();
        info!(port = %self.name, "stream adapter disposed");
    }
}

impl<C: SerialChannel> Drop for BlockingStreamAdapter<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<C: SerialChannel> fmt::Debug for BlockingStreamAdapter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingStreamAdapter")
            .field("name", &self.name)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .field("unconsumed_len", &self.unconsumed_len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Validate `offset + count` against the buffer and return the end index.
fn check_span(len: usize, offset: usize, count: usize) -> Result<usize, PortError> {
    offset
        .checked_add(count)
        .filter(|end| *end <= len)
        .ok_or(PortError::InvalidBuffer { len, offset, count })
}

/// Skip `offset` buffered bytes, then copy at most `count` into
/// `buffer[offset..]`.
fn copy_out<R: tokio::io::AsyncRead + Unpin>(
    input: &mut InputEndpoint<R>,
    buffer: &mut [u8],
    offset: usize,
    count: usize,
) -> usize {
    if input.unconsumed_len() == 0 {
        return 0;
    }
    input.skip(offset);
    input.read_bytes(&mut buffer[offset..offset + count])
}

async fn watch_faults(
    port: String,
    mut faults: mpsc::UnboundedReceiver<ChannelFault>,
    seen: Arc<AtomicU64>,
) {
    while let Some(fault) = faults.recv().await {
        seen.fetch_add(1, Ordering::Relaxed);
        warn!(port = %port, %fault, "serial channel fault");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::mock::MockChannel;

    #[test]
    fn test_check_span() {
        assert_eq!(check_span(8, 0, 8).unwrap(), 8);
        assert_eq!(check_span(8, 3, 2).unwrap(), 5);
        assert_eq!(check_span(0, 0, 0).unwrap(), 0);
        assert!(matches!(
            check_span(4, 2, 3),
            Err(PortError::InvalidBuffer {
                len: 4,
                offset: 2,
                count: 3
            })
        ));
        assert!(check_span(4, usize::MAX, 2).is_err());
    }

    #[test]
    fn test_default_settings() {
        let settings = AdapterSettings::default();
        assert_eq!(settings.worker_threads, 1);
        assert_eq!(settings.input_mode, InputStreamOptions::Partial);
        assert_eq!(settings.read_chunk, DEFAULT_READ_CHUNK);
    }

    #[test]
    fn test_initial_timeouts_come_from_channel() {
        let (channel, _device) = MockChannel::builder("MOCK0")
            .read_timeout(Timeout::Millis(750))
            .build();
        let adapter = BlockingStreamAdapter::new(channel).unwrap();

        assert_eq!(adapter.read_timeout(), Timeout::Millis(750));
        assert_eq!(adapter.write_timeout(), Timeout::Infinite);
        assert_eq!(adapter.infinite_timeout(), Timeout::Infinite);
    }

    #[test]
    fn test_closed_channel_is_rejected() {
        let (channel, device) = MockChannel::pair("MOCK0");
        device.set_open(false);

        let result = BlockingStreamAdapter::new(channel);
        assert!(matches!(result, Err(PortError::NotOpen)));
    }

    #[test]
    fn test_debug_output() {
        let (channel, _device) = MockChannel::pair("MOCK7");
        let adapter = BlockingStreamAdapter::new(channel).unwrap();
        let text = format!("{:?}", adapter);
        assert!(text.contains("MOCK7"));
        assert!(text.contains("disposed: false"));
    }

    #[tokio::test]
    async fn test_read_on_current_thread_runtime_keeps_endpoint() {
        let (channel, device) = MockChannel::pair("MOCK0");
        let mut adapter =
            BlockingStreamAdapter::with_handle(channel, Handle::current(), AdapterSettings::default())
                .unwrap();

        device.deliver(b"ok");
        let mut buffer = [0u8; 2];
        let result = adapter.read(&mut buffer, 0, 2);
        assert!(matches!(result, Err(PortError::BlockingInAsyncContext)));

        // The refused call left the endpoint where it was.
        assert!(adapter.input.is_some());
        adapter.dispose();
    }
}
