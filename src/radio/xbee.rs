//! XBee radio over a UART
//!
//! The module is transparent: bytes written to the UART go out over the air
//! and received bytes come back the same way. Pin sleep is requested with
//! SLEEP_RQ and confirmed on ON/SLEEP.

use crate::config::handshake::{ACK_TIMEOUT_MS, XBEE_POLL_MS};
use crate::config::serial::XBEE_RX_BUFFER_SIZE;
use crate::power::wait_for_level;
use crate::radio::traits::{RadioError, RadioTransport};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_io::ReadReady;
use embedded_io_async::{Read, Write};
use heapless::Deque;

/// Received text lines end here
const LINE_END: u8 = b'\n';

/// XBee module on a serial port with pin sleep
pub struct XBeeRadio<Port, SleepRq, OnSleep, Delay> {
    port: Port,
    sleep_rq: SleepRq,
    on_sleep: OnSleep,
    delay: Delay,
    rx: Deque<u8, XBEE_RX_BUFFER_SIZE>,
}

impl<Port, SleepRq, OnSleep, Delay> XBeeRadio<Port, SleepRq, OnSleep, Delay>
where
    Port: Read + Write + ReadReady,
    SleepRq: OutputPin,
    OnSleep: InputPin,
    Delay: DelayNs,
{
    pub fn new(port: Port, sleep_rq: SleepRq, on_sleep: OnSleep, delay: Delay) -> Self {
        Self {
            port,
            sleep_rq,
            on_sleep,
            delay,
            rx: Deque::new(),
        }
    }

    /// Move whatever the UART has ready into the local buffer
    async fn pull_ready(&mut self) -> Result<(), RadioError> {
        let mut chunk = [0u8; 32];
        while !self.rx.is_full() && self.port.read_ready().map_err(|_| RadioError::SerialError)? {
            let room = (XBEE_RX_BUFFER_SIZE - self.rx.len()).min(chunk.len());
            let n = self
                .port
                .read(&mut chunk[..room])
                .await
                .map_err(|_| RadioError::SerialError)?;
            if n == 0 {
                break;
            }
            for &byte in &chunk[..n] {
                // Cannot fail, `room` bounds the chunk
                let _ = self.rx.push_back(byte);
            }
        }
        Ok(())
    }

    async fn request_level(&mut self, high: bool) -> Result<bool, RadioError> {
        let result = if high {
            self.sleep_rq.set_high()
        } else {
            self.sleep_rq.set_low()
        };
        result.map_err(|_| RadioError::PinError)?;

        wait_for_level(
            &mut self.on_sleep,
            high,
            ACK_TIMEOUT_MS,
            XBEE_POLL_MS,
            &mut self.delay,
        )
        .await
        .map_err(|_| RadioError::PinError)
    }
}

impl<Port, SleepRq, OnSleep, Delay> RadioTransport for XBeeRadio<Port, SleepRq, OnSleep, Delay>
where
    Port: Read + Write + ReadReady,
    SleepRq: OutputPin,
    OnSleep: InputPin,
    Delay: DelayNs,
{
    /// Keep the module awake. The UART is configured by its owner.
    async fn init(&mut self) -> Result<(), RadioError> {
        self.sleep_rq.set_high().map_err(|_| RadioError::PinError)?;
        self.rx.clear();
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), RadioError> {
        self.port.flush().await.map_err(|_| RadioError::SerialError)?;
        self.port
            .write_all(data)
            .await
            .map_err(|_| RadioError::SendFailed)
    }

    async fn available(&mut self) -> Result<usize, RadioError> {
        self.pull_ready().await?;
        Ok(self.rx.len())
    }

    /// Read one line, without its `\n`.
    ///
    /// Stops early when `buf` is full or no more bytes are ready.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RadioError> {
        let mut len = 0;
        while len < buf.len() {
            if self.rx.is_empty() {
                self.pull_ready().await?;
            }
            match self.rx.pop_front() {
                Some(LINE_END) | None => break,
                Some(byte) => {
                    buf[len] = byte;
                    len += 1;
                }
            }
        }
        Ok(len)
    }

    async fn sleep(&mut self) -> Result<(), RadioError> {
        if self.request_level(false).await? {
            Ok(())
        } else {
            log::warn!("xbee: no sleep acknowledgement");
            Err(RadioError::SleepAckTimeout)
        }
    }

    async fn wake(&mut self) -> Result<(), RadioError> {
        if self.request_level(true).await? {
            Ok(())
        } else {
            log::warn!("xbee: no wake acknowledgement");
            Err(RadioError::WakeAckTimeout)
        }
    }
}
