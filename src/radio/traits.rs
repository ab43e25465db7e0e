//! Radio transport trait for abstraction and testability
//!
//! This trait defines what the node needs from a radio, allowing LoRa and
//! XBee modules, or a mock, to be swapped without touching the node logic.

use crate::config::radio::MAX_TEXT_LEN;
use core::future::Future;
use heapless::String;

/// Errors that can occur during radio operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Radio not initialised
    NotInitialised,
    /// Transmission failed or was only partly written
    SendFailed,
    /// Reception failed
    ReceiveFailed,
    /// Received frame failed its CRC and was dropped
    CrcError,
    /// Operation timed out
    Timeout,
    /// Radio busy timeout
    BusyTimeout,
    /// SPI communication error
    SpiError,
    /// UART communication error
    SerialError,
    /// Radio did not confirm it went to sleep
    SleepAckTimeout,
    /// Radio did not confirm it woke up
    WakeAckTimeout,
    /// GPIO read or write failed
    PinError,
    /// Received text is not valid UTF-8
    InvalidUtf8,
    /// Payload exceeds what the radio can carry in one frame
    PayloadTooLarge,
}

/// Abstract radio interface
///
/// `init`, `send`, `available` and `read` must be provided. Modules without
/// a low-power mode or signal metering can rely on the defaults: `sleep` and
/// `wake` succeed without doing anything and `rssi` reports 0.
pub trait RadioTransport {
    /// Initialise the radio hardware
    fn init(&mut self) -> impl Future<Output = Result<(), RadioError>>;

    /// Transmit one frame
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<(), RadioError>>;

    /// Number of received bytes ready to be read, 0 if none
    fn available(&mut self) -> impl Future<Output = Result<usize, RadioError>>;

    /// Read received bytes into `buf`
    ///
    /// Returns the number of bytes written.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, RadioError>>;

    /// Enter the module's low-power mode
    fn sleep(&mut self) -> impl Future<Output = Result<(), RadioError>> {
        async { Ok(()) }
    }

    /// Leave the low-power mode
    fn wake(&mut self) -> impl Future<Output = Result<(), RadioError>> {
        async { Ok(()) }
    }

    /// Signal strength of the last received frame in dBm, 0 if unsupported
    fn rssi(&self) -> i16 {
        0
    }

    /// Transmit a string as raw bytes, without a terminator
    fn send_str(&mut self, text: &str) -> impl Future<Output = Result<(), RadioError>> {
        self.send(text.as_bytes())
    }

    /// Read received bytes as text
    fn read_string(&mut self) -> impl Future<Output = Result<String<MAX_TEXT_LEN>, RadioError>> {
        async move {
            let mut buf = [0u8; MAX_TEXT_LEN];
            let len = self.read(&mut buf).await?;
            let text = core::str::from_utf8(&buf[..len]).map_err(|_| RadioError::InvalidUtf8)?;

            let mut out = String::new();
            // Cannot overflow, `text` is at most MAX_TEXT_LEN bytes
            let _ = out.push_str(text);
            Ok(out)
        }
    }
}

#[cfg(test)]
pub mod mock {
    //! Mock radio for testing

    use super::*;
    use core::cell::RefCell;
    use heapless::Vec;

    /// What the mock was asked to do, in order
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum RadioCall {
        Init,
        Send,
        Sleep,
        Wake,
    }

    /// Mock radio for unit testing
    pub struct MockRadio {
        /// Frames queued to be returned by read()
        rx_queue: RefCell<Vec<Vec<u8, 64>, 8>>,
        /// Record of transmitted frames
        tx_history: RefCell<Vec<Vec<u8, 64>, 8>>,
        /// Call log
        calls: RefCell<Vec<RadioCall, 32>>,
        /// Error to return on next send
        next_tx_error: RefCell<Option<RadioError>>,
        /// Error to return on next sleep
        next_sleep_error: RefCell<Option<RadioError>>,
        rssi: i16,
    }

    impl MockRadio {
        /// Create a new mock radio
        pub fn new() -> Self {
            Self {
                rx_queue: RefCell::new(Vec::new()),
                tx_history: RefCell::new(Vec::new()),
                calls: RefCell::new(Vec::new()),
                next_tx_error: RefCell::new(None),
                next_sleep_error: RefCell::new(None),
                rssi: 0,
            }
        }

        /// Set the value returned by rssi()
        pub fn with_rssi(mut self, rssi: i16) -> Self {
            self.rssi = rssi;
            self
        }

        /// Queue a frame to be returned by the next read() call
        pub fn queue_rx(&self, data: &[u8]) {
            let mut frame = Vec::new();
            let _ = frame.extend_from_slice(data);
            let _ = self.rx_queue.borrow_mut().push(frame);
        }

        /// Set an error to be returned by the next send() call
        pub fn set_next_tx_error(&self, error: RadioError) {
            *self.next_tx_error.borrow_mut() = Some(error);
        }

        /// Set an error to be returned by the next sleep() call
        pub fn set_next_sleep_error(&self, error: RadioError) {
            *self.next_sleep_error.borrow_mut() = Some(error);
        }

        /// Get all transmitted frames
        pub fn get_tx_history(&self) -> Vec<Vec<u8, 64>, 8> {
            self.tx_history.borrow().clone()
        }

        /// Get the call log
        pub fn calls(&self) -> Vec<RadioCall, 32> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: RadioCall) {
            let _ = self.calls.borrow_mut().push(call);
        }
    }

    impl Default for MockRadio {
        fn default() -> Self {
            Self::new()
        }
    }

    impl RadioTransport for MockRadio {
        async fn init(&mut self) -> Result<(), RadioError> {
            self.record(RadioCall::Init);
            Ok(())
        }

        async fn send(&mut self, data: &[u8]) -> Result<(), RadioError> {
            self.record(RadioCall::Send);
            if let Some(error) = self.next_tx_error.borrow_mut().take() {
                return Err(error);
            }

            let mut frame = Vec::new();
            frame
                .extend_from_slice(data)
                .map_err(|_| RadioError::PayloadTooLarge)?;
            let _ = self.tx_history.borrow_mut().push(frame);
            Ok(())
        }

        async fn available(&mut self) -> Result<usize, RadioError> {
            Ok(self.rx_queue.borrow().first().map_or(0, |f| f.len()))
        }

        async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RadioError> {
            let mut queue = self.rx_queue.borrow_mut();
            if queue.is_empty() {
                return Ok(0);
            }
            let frame = queue.remove(0);
            let len = frame.len().min(buf.len());
            buf[..len].copy_from_slice(&frame[..len]);
            Ok(len)
        }

        async fn sleep(&mut self) -> Result<(), RadioError> {
            self.record(RadioCall::Sleep);
            match self.next_sleep_error.borrow_mut().take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }

        async fn wake(&mut self) -> Result<(), RadioError> {
            self.record(RadioCall::Wake);
            Ok(())
        }

        fn rssi(&self) -> i16 {
            self.rssi
        }
    }

    /// Radio that only implements the required operations
    pub struct MinimalRadio {
        pub sent: usize,
    }

    impl RadioTransport for MinimalRadio {
        async fn init(&mut self) -> Result<(), RadioError> {
            Ok(())
        }

        async fn send(&mut self, _data: &[u8]) -> Result<(), RadioError> {
            self.sent += 1;
            Ok(())
        }

        async fn available(&mut self) -> Result<usize, RadioError> {
            Ok(0)
        }

        async fn read(&mut self, _buf: &mut [u8]) -> Result<usize, RadioError> {
            Ok(0)
        }
    }
}
