//! SX1262 LoRa radio
//!
//! Drives the SX1262 over an async SPI bus with manual NSS control. The radio
//! sits in continuous receive between transmissions; `available` latches a
//! completed packet the way Arduino LoRa's `parsePacket` does.

use crate::config::radio::MAX_LORA_PAYLOAD;
use crate::config::{lora_defaults, tcxo};
use crate::radio::traits::{RadioError, RadioTransport};
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::spi::SpiBus;
use heapless::Vec;

/// SX1262 command opcodes
mod cmd {
    pub const SET_SLEEP: u8 = 0x84;
    pub const SET_STANDBY: u8 = 0x80;
    pub const SET_TX: u8 = 0x83;
    pub const SET_RX: u8 = 0x82;
    pub const SET_RF_FREQUENCY: u8 = 0x86;
    pub const SET_PACKET_TYPE: u8 = 0x8A;
    pub const SET_MODULATION_PARAMS: u8 = 0x8B;
    pub const SET_PACKET_PARAMS: u8 = 0x8C;
    pub const SET_BUFFER_BASE_ADDRESS: u8 = 0x8F;
    pub const SET_PA_CONFIG: u8 = 0x95;
    pub const SET_DIO3_AS_TCXO_CTRL: u8 = 0x97;
    pub const SET_DIO2_AS_RF_SWITCH_CTRL: u8 = 0x9D;
    pub const SET_TX_PARAMS: u8 = 0x8E;
    pub const WRITE_BUFFER: u8 = 0x0E;
    pub const READ_BUFFER: u8 = 0x1E;
    pub const WRITE_REGISTER: u8 = 0x0D;
    pub const GET_RX_BUFFER_STATUS: u8 = 0x13;
    pub const GET_PACKET_STATUS: u8 = 0x14;
    pub const GET_IRQ_STATUS: u8 = 0x12;
    pub const CLEAR_IRQ_STATUS: u8 = 0x02;
    pub const SET_DIO_IRQ_PARAMS: u8 = 0x08;
}

/// SX1262 register addresses
mod reg {
    pub const LORA_SYNC_WORD: u16 = 0x0740;
    /// Over-current protection
    pub const OCP_CONFIGURATION: u16 = 0x08E7;
}

mod irq {
    pub const TX_DONE: u16 = 0x0001;
    pub const RX_DONE: u16 = 0x0002;
    pub const CRC_ERR: u16 = 0x0040;
    pub const TIMEOUT: u16 = 0x0200;
    pub const ALL: u16 = 0xFFFF;
}

/// SetSleep config: warm start, register contents retained
const SLEEP_WARM_START: u8 = 0x04;
const STDBY_RC: u8 = 0x00;
const PACKET_TYPE_LORA: u8 = 0x01;
const TX_TIMEOUT_MS: u32 = 10_000;

/// LoRa modulation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoraConfig {
    /// Centre frequency in Hz
    pub frequency_hz: u32,
    /// Transmit power in dBm (-9 to +22)
    pub tx_power_dbm: i8,
    /// Spreading factor (5-12)
    pub spreading_factor: u8,
    /// Bandwidth in kHz (7.8, 10.4, 15.6, 20.8, 31.25, 41.7, 62.5, 125, 250, 500)
    pub bandwidth_khz: u32,
    /// Coding rate denominator (5-8 for 4/5 to 4/8)
    pub coding_rate: u8,
    /// One-byte LoRa sync word, 0x12 private, 0x34 public
    pub sync_word: u8,
}

impl Default for LoraConfig {
    fn default() -> Self {
        Self {
            frequency_hz: lora_defaults::FREQUENCY_HZ,
            tx_power_dbm: lora_defaults::TX_POWER_DBM,
            spreading_factor: lora_defaults::SPREADING_FACTOR,
            bandwidth_khz: lora_defaults::BANDWIDTH_KHZ,
            coding_rate: lora_defaults::CODING_RATE,
            sync_word: lora_defaults::SYNC_WORD,
        }
    }
}

/// Map a one-byte sync word onto the SX1262's two sync word registers.
///
/// Each nibble goes in the high half of its register with 0x4 in the low
/// half, so 0x12 becomes [0x14, 0x24] and 0x34 becomes [0x34, 0x44].
pub fn sync_word_registers(sync_word: u8) -> [u8; 2] {
    [(sync_word & 0xF0) | 0x04, ((sync_word & 0x0F) << 4) | 0x04]
}

/// Control pins for SX1262
pub struct Sx1262Pins<Nss, Dio1, Nrst, Busy> {
    pub nss: Nss,
    pub dio1: Dio1,
    pub nrst: Nrst,
    pub busy: Busy,
}

/// SX1262 LoRa radio
pub struct LoraRadio<Spi, Nss, Dio1, Nrst, Busy, Delay> {
    spi: Spi,
    nss: Nss,
    dio1: Dio1,
    nrst: Nrst,
    busy: Busy,
    delay: Delay,
    config: LoraConfig,
    initialised: bool,
    asleep: bool,
    rx: Vec<u8, MAX_LORA_PAYLOAD>,
    rx_pos: usize,
    last_rssi: i16,
}

impl<Spi, Nss, Dio1, Nrst, Busy, Delay> LoraRadio<Spi, Nss, Dio1, Nrst, Busy, Delay>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Dio1: InputPin,
    Nrst: OutputPin,
    Busy: InputPin,
    Delay: DelayNs,
{
    pub fn new(
        spi: Spi,
        pins: Sx1262Pins<Nss, Dio1, Nrst, Busy>,
        delay: Delay,
        config: LoraConfig,
    ) -> Self {
        Self {
            spi,
            nss: pins.nss,
            dio1: pins.dio1,
            nrst: pins.nrst,
            busy: pins.busy,
            delay,
            config,
            initialised: false,
            asleep: false,
            rx: Vec::new(),
            rx_pos: 0,
            last_rssi: 0,
        }
    }

    /// Active modulation settings
    pub fn config(&self) -> &LoraConfig {
        &self.config
    }

    /// Apply new modulation settings.
    ///
    /// Before `init` the settings are only stored. Afterwards the radio is
    /// reprogrammed and put back into receive.
    pub async fn configure(&mut self, config: LoraConfig) -> Result<(), RadioError> {
        self.config = config;
        if !self.initialised {
            return Ok(());
        }
        if self.asleep {
            self.wake_from_sleep().await?;
        }
        self.apply_config().await?;
        self.start_receive_mode().await
    }

    async fn reset(&mut self) -> Result<(), RadioError> {
        self.nrst.set_low().map_err(|_| RadioError::PinError)?;
        self.delay.delay_ms(10).await;
        self.nrst.set_high().map_err(|_| RadioError::PinError)?;
        self.delay.delay_ms(20).await;
        Ok(())
    }

    async fn wait_not_busy(&mut self) -> Result<(), RadioError> {
        for _ in 0..1000 {
            if self.busy.is_low().map_err(|_| RadioError::PinError)? {
                return Ok(());
            }
            self.delay.delay_us(100).await;
        }
        Err(RadioError::BusyTimeout)
    }

    async fn write_command(&mut self, cmd: u8, data: &[u8]) -> Result<(), RadioError> {
        self.wait_not_busy().await?;

        let mut buf = [0u8; 16];
        buf[0] = cmd;
        let len = 1 + data.len().min(15);
        buf[1..len].copy_from_slice(&data[..len - 1]);

        self.nss.set_low().map_err(|_| RadioError::PinError)?;
        let result = self.spi.write(&buf[..len]).await;
        self.nss.set_high().map_err(|_| RadioError::PinError)?;
        result.map_err(|_| RadioError::SpiError)
    }

    async fn read_command(&mut self, cmd: u8, len: usize) -> Result<[u8; 16], RadioError> {
        self.wait_not_busy().await?;

        // Opcode and NOP, response follows the status byte
        let mut tx_buf = [0u8; 18];
        let mut rx_buf = [0u8; 18];
        tx_buf[0] = cmd;
        let total_len = 2 + len.min(16);

        self.nss.set_low().map_err(|_| RadioError::PinError)?;
        let result = self
            .spi
            .transfer(&mut rx_buf[..total_len], &tx_buf[..total_len])
            .await;
        self.nss.set_high().map_err(|_| RadioError::PinError)?;
        result.map_err(|_| RadioError::SpiError)?;

        let mut out = [0u8; 16];
        out[..total_len - 2].copy_from_slice(&rx_buf[2..total_len]);
        Ok(out)
    }

    async fn write_registers(&mut self, addr: u16, values: &[u8]) -> Result<(), RadioError> {
        let mut data = [0u8; 15];
        let [hi, lo] = addr.to_be_bytes();
        data[0] = hi;
        data[1] = lo;
        let len = 2 + values.len().min(13);
        data[2..len].copy_from_slice(&values[..len - 2]);
        self.write_command(cmd::WRITE_REGISTER, &data[..len]).await
    }

    async fn configure_tcxo(&mut self) -> Result<(), RadioError> {
        // ~5 ms startup, in 15.625 us steps
        let timeout: u32 = 0x000140;
        let [_, t2, t1, t0] = timeout.to_be_bytes();
        self.write_command(cmd::SET_DIO3_AS_TCXO_CTRL, &[tcxo::VOLTAGE_CODE, t2, t1, t0])
            .await
    }

    async fn set_current_limit(&mut self, current_ma: u16) -> Result<(), RadioError> {
        // 2.5 mA per step
        let ocp = ((u32::from(current_ma) * 10) / 25).min(63) as u8;
        self.write_registers(reg::OCP_CONFIGURATION, &[ocp]).await
    }

    async fn set_standby(&mut self) -> Result<(), RadioError> {
        self.write_command(cmd::SET_STANDBY, &[STDBY_RC]).await
    }

    async fn set_frequency(&mut self, freq_hz: u32) -> Result<(), RadioError> {
        // freq_reg = freq_hz * 2^25 / 32 MHz
        let freq_reg = ((u64::from(freq_hz) << 25) / 32_000_000) as u32;
        self.write_command(cmd::SET_RF_FREQUENCY, &freq_reg.to_be_bytes())
            .await
    }

    async fn set_modulation_params(&mut self) -> Result<(), RadioError> {
        let config = self.config;
        let bw = match config.bandwidth_khz {
            7 | 8 => 0x00,
            10 => 0x08,
            15 | 16 => 0x01,
            20 | 21 => 0x09,
            31 => 0x02,
            41 | 42 => 0x0A,
            62 | 63 => 0x03,
            125 => 0x04,
            250 => 0x05,
            500 => 0x06,
            _ => 0x04,
        };

        let cr = match config.coding_rate {
            6 => 0x02,
            7 => 0x03,
            8 => 0x04,
            _ => 0x01,
        };

        // Low data rate optimisation, required for SF11/SF12 at 125 kHz and below
        let ldro = u8::from(config.spreading_factor >= 11 && config.bandwidth_khz <= 125);

        self.write_command(
            cmd::SET_MODULATION_PARAMS,
            &[config.spreading_factor, bw, cr, ldro],
        )
        .await
    }

    async fn set_packet_params(&mut self, payload_len: u8) -> Result<(), RadioError> {
        let data = [
            0x00, 0x08, // 8 symbol preamble
            0x00, // explicit header
            payload_len,
            0x01, // CRC on
            0x00, // standard IQ
        ];
        self.write_command(cmd::SET_PACKET_PARAMS, &data).await
    }

    async fn set_tx_power(&mut self, power_dbm: i8) -> Result<(), RadioError> {
        // High power PA: paDutyCycle 0x04, hpMax 0x07, SX1262, paLut 0x01
        self.write_command(cmd::SET_PA_CONFIG, &[0x04, 0x07, 0x00, 0x01])
            .await?;
        // Two's complement power, 200 us ramp
        let power = power_dbm.clamp(-9, 22) as u8;
        self.write_command(cmd::SET_TX_PARAMS, &[power, 0x04]).await
    }

    async fn apply_config(&mut self) -> Result<(), RadioError> {
        self.set_standby().await?;
        self.set_frequency(self.config.frequency_hz).await?;
        self.set_modulation_params().await?;
        self.set_tx_power(self.config.tx_power_dbm).await?;
        let sync = sync_word_registers(self.config.sync_word);
        self.write_registers(reg::LORA_SYNC_WORD, &sync).await
    }

    async fn configure_irq(&mut self, mask: u16) -> Result<(), RadioError> {
        let [hi, lo] = mask.to_be_bytes();
        // IRQ mask, DIO1 mask, DIO2 and DIO3 unused
        let data = [hi, lo, hi, lo, 0x00, 0x00, 0x00, 0x00];
        self.write_command(cmd::SET_DIO_IRQ_PARAMS, &data).await
    }

    async fn clear_irq(&mut self, mask: u16) -> Result<(), RadioError> {
        self.write_command(cmd::CLEAR_IRQ_STATUS, &mask.to_be_bytes())
            .await
    }

    async fn get_irq_status(&mut self) -> Result<u16, RadioError> {
        let r = self.read_command(cmd::GET_IRQ_STATUS, 2).await?;
        Ok(u16::from_be_bytes([r[0], r[1]]))
    }

    async fn write_buffer(&mut self, offset: u8, data: &[u8]) -> Result<(), RadioError> {
        self.wait_not_busy().await?;

        let mut buf = [0u8; 2 + MAX_LORA_PAYLOAD];
        buf[0] = cmd::WRITE_BUFFER;
        buf[1] = offset;
        let len = data.len().min(MAX_LORA_PAYLOAD);
        buf[2..2 + len].copy_from_slice(&data[..len]);

        self.nss.set_low().map_err(|_| RadioError::PinError)?;
        let result = self.spi.write(&buf[..2 + len]).await;
        self.nss.set_high().map_err(|_| RadioError::PinError)?;
        result.map_err(|_| RadioError::SpiError)
    }

    async fn read_buffer(
        &mut self,
        offset: u8,
        len: usize,
    ) -> Result<Vec<u8, MAX_LORA_PAYLOAD>, RadioError> {
        self.wait_not_busy().await?;

        // Opcode, offset, NOP, then data
        let mut tx_buf = [0u8; 3 + MAX_LORA_PAYLOAD];
        let mut rx_buf = [0u8; 3 + MAX_LORA_PAYLOAD];
        tx_buf[0] = cmd::READ_BUFFER;
        tx_buf[1] = offset;
        let len = len.min(MAX_LORA_PAYLOAD);
        let total_len = 3 + len;

        self.nss.set_low().map_err(|_| RadioError::PinError)?;
        let result = self
            .spi
            .transfer(&mut rx_buf[..total_len], &tx_buf[..total_len])
            .await;
        self.nss.set_high().map_err(|_| RadioError::PinError)?;
        result.map_err(|_| RadioError::SpiError)?;

        Vec::from_slice(&rx_buf[3..total_len]).map_err(|_| RadioError::ReceiveFailed)
    }

    /// (payload length, buffer offset)
    async fn get_rx_buffer_status(&mut self) -> Result<(u8, u8), RadioError> {
        let r = self.read_command(cmd::GET_RX_BUFFER_STATUS, 2).await?;
        Ok((r[0], r[1]))
    }

    async fn get_packet_rssi(&mut self) -> Result<i16, RadioError> {
        let r = self.read_command(cmd::GET_PACKET_STATUS, 3).await?;
        Ok(-i16::from(r[0]) / 2)
    }

    async fn wait_for_irq(&mut self, timeout_ms: u32) -> Result<u16, RadioError> {
        // 100 us polls
        for _ in 0..timeout_ms.saturating_mul(10) {
            if self.dio1.is_high().map_err(|_| RadioError::PinError)? {
                return self.get_irq_status().await;
            }
            self.delay.delay_us(100).await;
        }
        Err(RadioError::Timeout)
    }

    /// Continuous receive, no timeout
    async fn start_receive_mode(&mut self) -> Result<(), RadioError> {
        self.set_standby().await?;
        self.set_packet_params(MAX_LORA_PAYLOAD as u8).await?;
        self.configure_irq(irq::RX_DONE | irq::TIMEOUT | irq::CRC_ERR)
            .await?;
        self.clear_irq(irq::ALL).await?;
        self.write_command(cmd::SET_RX, &[0xFF, 0xFF, 0xFF]).await
    }

    /// Any NSS falling edge wakes the chip, BUSY drops once it is ready
    async fn wake_from_sleep(&mut self) -> Result<(), RadioError> {
        self.nss.set_low().map_err(|_| RadioError::PinError)?;
        self.delay.delay_us(100).await;
        self.nss.set_high().map_err(|_| RadioError::PinError)?;
        self.wait_not_busy().await?;
        self.asleep = false;
        Ok(())
    }

    fn ensure_initialised(&self) -> Result<(), RadioError> {
        if self.initialised {
            Ok(())
        } else {
            Err(RadioError::NotInitialised)
        }
    }
}

impl<Spi, Nss, Dio1, Nrst, Busy, Delay> RadioTransport
    for LoraRadio<Spi, Nss, Dio1, Nrst, Busy, Delay>
where
    Spi: SpiBus,
    Nss: OutputPin,
    Dio1: InputPin,
    Nrst: OutputPin,
    Busy: InputPin,
    Delay: DelayNs,
{
    async fn init(&mut self) -> Result<(), RadioError> {
        self.initialised = false;
        self.asleep = false;

        self.reset().await?;
        self.wait_not_busy().await?;
        self.set_standby().await?;

        self.configure_tcxo().await?;
        self.delay.delay_ms(10).await;
        self.write_command(cmd::SET_DIO2_AS_RF_SWITCH_CTRL, &[0x01])
            .await?;
        self.set_current_limit(140).await?;
        self.write_command(cmd::SET_PACKET_TYPE, &[PACKET_TYPE_LORA])
            .await?;
        self.write_command(cmd::SET_BUFFER_BASE_ADDRESS, &[0x00, 0x80])
            .await?;

        self.apply_config().await?;
        self.start_receive_mode().await?;

        self.initialised = true;
        log::info!(
            "lora: ready at {} Hz, SF{}, {} dBm",
            self.config.frequency_hz,
            self.config.spreading_factor,
            self.config.tx_power_dbm
        );
        Ok(())
    }

    async fn send(&mut self, data: &[u8]) -> Result<(), RadioError> {
        self.ensure_initialised()?;
        if data.is_empty() {
            return Err(RadioError::SendFailed);
        }
        if data.len() > MAX_LORA_PAYLOAD {
            return Err(RadioError::PayloadTooLarge);
        }
        if self.asleep {
            self.wake_from_sleep().await?;
        }

        self.set_standby().await?;
        self.set_packet_params(data.len() as u8).await?;
        self.write_buffer(0x00, data).await?;
        self.configure_irq(irq::TX_DONE).await?;
        self.clear_irq(irq::ALL).await?;
        self.write_command(cmd::SET_TX, &[0x00, 0x00, 0x00]).await?;

        let status = self.wait_for_irq(TX_TIMEOUT_MS).await;

        self.clear_irq(irq::ALL).await?;
        self.start_receive_mode().await?;

        if status? & irq::TX_DONE != 0 {
            Ok(())
        } else {
            Err(RadioError::SendFailed)
        }
    }

    async fn available(&mut self) -> Result<usize, RadioError> {
        self.ensure_initialised()?;

        if !self.asleep && self.dio1.is_high().map_err(|_| RadioError::PinError)? {
            let status = self.get_irq_status().await?;
            self.clear_irq(irq::ALL).await?;

            if status & irq::CRC_ERR != 0 {
                log::warn!("lora: dropped packet with CRC error");
                return Err(RadioError::CrcError);
            }
            if status & irq::RX_DONE != 0 {
                let (len, offset) = self.get_rx_buffer_status().await?;
                self.rx = self.read_buffer(offset, usize::from(len)).await?;
                self.rx_pos = 0;
                self.last_rssi = self.get_packet_rssi().await?;
            }
        }

        Ok(self.rx.len() - self.rx_pos)
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RadioError> {
        let pending = &self.rx[self.rx_pos..];
        let len = pending.len().min(buf.len());
        buf[..len].copy_from_slice(&pending[..len]);
        self.rx_pos += len;
        Ok(len)
    }

    async fn sleep(&mut self) -> Result<(), RadioError> {
        self.ensure_initialised()?;
        if self.asleep {
            return Ok(());
        }
        self.write_command(cmd::SET_SLEEP, &[SLEEP_WARM_START]).await?;
        self.asleep = true;
        Ok(())
    }

    async fn wake(&mut self) -> Result<(), RadioError> {
        self.ensure_initialised()?;
        if self.asleep {
            self.wake_from_sleep().await?;
        }
        self.start_receive_mode().await
    }

    fn rssi(&self) -> i16 {
        self.last_rssi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power::handshake::mock::{MockDelay, MockInputPin, MockLine, MockOutputPin};
    use core::cell::RefCell;
    use core::convert::Infallible;
    use std::collections::HashMap;
    use std::rc::Rc;
    use std::vec::Vec as StdVec;

    /// SPI bus that records writes and answers reads from a table
    #[derive(Clone, Default)]
    struct MockSpi {
        writes: Rc<RefCell<StdVec<StdVec<u8>>>>,
        responses: Rc<RefCell<HashMap<u8, StdVec<u8>>>>,
    }

    impl MockSpi {
        fn respond(&self, opcode: u8, data: &[u8]) {
            self.responses.borrow_mut().insert(opcode, data.to_vec());
        }

        fn writes(&self) -> StdVec<StdVec<u8>> {
            self.writes.borrow().clone()
        }

        fn clear(&self) {
            self.writes.borrow_mut().clear();
        }
    }

    impl embedded_hal::spi::ErrorType for MockSpi {
        type Error = Infallible;
    }

    impl SpiBus for MockSpi {
        async fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
            words.fill(0);
            Ok(())
        }

        async fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
            self.writes.borrow_mut().push(words.to_vec());
            Ok(())
        }

        async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
            self.writes.borrow_mut().push(write.to_vec());
            read.fill(0);
            let start = if write[0] == cmd::READ_BUFFER { 3 } else { 2 };
            if let Some(data) = self.responses.borrow().get(&write[0]) {
                let len = data.len().min(read.len().saturating_sub(start));
                read[start..start + len].copy_from_slice(&data[..len]);
            }
            Ok(())
        }

        async fn transfer_in_place(&mut self, _words: &mut [u8]) -> Result<(), Infallible> {
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    type TestRadio =
        LoraRadio<MockSpi, MockOutputPin, MockInputPin, MockOutputPin, MockInputPin, MockDelay>;

    struct Rig {
        spi: MockSpi,
        dio1: MockLine,
        radio: TestRadio,
    }

    fn rig() -> Rig {
        let spi = MockSpi::default();
        let dio1 = MockLine::new(false);
        let pins = Sx1262Pins {
            nss: MockLine::new(true).output(),
            dio1: dio1.input(),
            nrst: MockLine::new(true).output(),
            busy: MockLine::new(false).input(),
        };
        let radio = LoraRadio::new(spi.clone(), pins, MockDelay::new(), LoraConfig::default());
        Rig { spi, dio1, radio }
    }

    fn initialised() -> Rig {
        let mut rig = rig();
        futures::executor::block_on(rig.radio.init()).unwrap();
        rig.spi.clear();
        rig
    }

    #[test]
    fn test_sync_word_registers() {
        assert_eq!(sync_word_registers(0x12), [0x14, 0x24]);
        assert_eq!(sync_word_registers(0x34), [0x34, 0x44]);
    }

    #[test]
    fn test_init_programs_radio_and_enters_rx() {
        let mut rig = rig();

        futures::executor::block_on(async {
            rig.radio.init().await.unwrap();
        });

        let writes = rig.spi.writes();
        assert_eq!(writes[0], [cmd::SET_STANDBY, STDBY_RC]);
        assert!(writes.contains(&vec![cmd::SET_PACKET_TYPE, PACKET_TYPE_LORA]));
        // 868 MHz
        assert!(writes.contains(&vec![cmd::SET_RF_FREQUENCY, 0x36, 0x40, 0x00, 0x00]));
        assert!(writes.contains(&vec![cmd::SET_MODULATION_PARAMS, 7, 0x04, 0x01, 0x00]));
        assert!(writes.contains(&vec![cmd::SET_TX_PARAMS, 14, 0x04]));
        assert!(writes.contains(&vec![cmd::WRITE_REGISTER, 0x07, 0x40, 0x14, 0x24]));
        assert_eq!(writes.last().unwrap(), &vec![cmd::SET_RX, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_operations_require_init() {
        let mut rig = rig();

        futures::executor::block_on(async {
            assert_eq!(rig.radio.send(b"x").await, Err(RadioError::NotInitialised));
            assert_eq!(rig.radio.available().await, Err(RadioError::NotInitialised));
            assert_eq!(rig.radio.sleep().await, Err(RadioError::NotInitialised));
        });
        assert!(rig.spi.writes().is_empty());
    }

    #[test]
    fn test_send_rejects_bad_lengths() {
        let mut rig = initialised();

        futures::executor::block_on(async {
            assert_eq!(rig.radio.send(&[]).await, Err(RadioError::SendFailed));
            let big = [0u8; MAX_LORA_PAYLOAD + 1];
            assert_eq!(rig.radio.send(&big).await, Err(RadioError::PayloadTooLarge));
        });
    }

    #[test]
    fn test_send_transmits_and_returns_to_rx() {
        let mut rig = initialised();
        rig.spi.respond(cmd::GET_IRQ_STATUS, &[0x00, 0x01]);
        rig.dio1.output().set_high().unwrap();

        futures::executor::block_on(async {
            rig.radio.send(&[0xCD, 0xAB, 0x01]).await.unwrap();
        });

        let writes = rig.spi.writes();
        assert!(writes.contains(&vec![cmd::WRITE_BUFFER, 0x00, 0xCD, 0xAB, 0x01]));
        assert!(writes.contains(&vec![cmd::SET_TX, 0x00, 0x00, 0x00]));
        assert_eq!(writes.last().unwrap(), &vec![cmd::SET_RX, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_send_times_out_without_irq() {
        let mut rig = initialised();

        futures::executor::block_on(async {
            assert_eq!(rig.radio.send(b"hi").await, Err(RadioError::Timeout));
        });

        // Back in receive even after the failure
        let writes = rig.spi.writes();
        assert_eq!(writes.last().unwrap(), &vec![cmd::SET_RX, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_available_latches_packet_and_rssi() {
        let mut rig = initialised();
        rig.spi.respond(cmd::GET_IRQ_STATUS, &[0x00, 0x02]);
        rig.spi.respond(cmd::GET_RX_BUFFER_STATUS, &[5, 0x80]);
        rig.spi.respond(cmd::READ_BUFFER, b"hello");
        rig.spi.respond(cmd::GET_PACKET_STATUS, &[80, 0, 0]);

        futures::executor::block_on(async {
            assert_eq!(rig.radio.available().await, Ok(0));

            rig.dio1.output().set_high().unwrap();
            assert_eq!(rig.radio.available().await, Ok(5));
            rig.dio1.output().set_low().unwrap();

            assert_eq!(rig.radio.rssi(), -40);
            let mut buf = [0u8; 2];
            assert_eq!(rig.radio.read(&mut buf).await, Ok(2));
            assert_eq!(&buf, b"he");
            assert_eq!(rig.radio.available().await, Ok(3));
            assert_eq!(rig.radio.read_string().await.unwrap().as_str(), "llo");
            assert_eq!(rig.radio.available().await, Ok(0));
        });
    }

    #[test]
    fn test_crc_error_reported_and_packet_dropped() {
        let mut rig = initialised();
        rig.spi.respond(cmd::GET_IRQ_STATUS, &[0x00, 0x42]);
        rig.dio1.output().set_high().unwrap();

        futures::executor::block_on(async {
            assert_eq!(rig.radio.available().await, Err(RadioError::CrcError));
            rig.dio1.output().set_low().unwrap();
            assert_eq!(rig.radio.available().await, Ok(0));
        });
        assert!(!rig
            .spi
            .writes()
            .iter()
            .any(|w| w[0] == cmd::READ_BUFFER));
    }

    #[test]
    fn test_sleep_and_wake() {
        let mut rig = initialised();

        futures::executor::block_on(async {
            rig.radio.sleep().await.unwrap();
            // Second sleep does not touch the bus
            rig.radio.sleep().await.unwrap();
            assert_eq!(rig.spi.writes(), [vec![cmd::SET_SLEEP, SLEEP_WARM_START]]);

            rig.radio.wake().await.unwrap();
        });

        let writes = rig.spi.writes();
        assert_eq!(writes[1], [cmd::SET_STANDBY, STDBY_RC]);
        assert_eq!(writes.last().unwrap(), &vec![cmd::SET_RX, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_configure_after_init_reprograms() {
        let mut rig = initialised();
        let config = LoraConfig {
            spreading_factor: 12,
            sync_word: 0x34,
            ..LoraConfig::default()
        };

        futures::executor::block_on(async {
            rig.radio.configure(config).await.unwrap();
        });

        let writes = rig.spi.writes();
        // LDRO on for SF12 at 125 kHz
        assert!(writes.contains(&vec![cmd::SET_MODULATION_PARAMS, 12, 0x04, 0x01, 0x01]));
        assert!(writes.contains(&vec![cmd::WRITE_REGISTER, 0x07, 0x40, 0x34, 0x44]));
        assert_eq!(rig.radio.config().spreading_factor, 12);
    }
}
