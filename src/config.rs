//! Hardware configuration constants for the ESP32-S3 sensor node

/// SPI pins for the LoRa module
pub mod spi {
    pub const SCLK: u8 = 7;
    pub const MISO: u8 = 8;
    pub const MOSI: u8 = 9;
}

/// LoRa control pins
pub mod lora_pins {
    pub const NSS: u8 = 41;
    pub const DIO1: u8 = 39;
    pub const NRST: u8 = 42;
    pub const BUSY: u8 = 40;
}

/// Power sequencing pins
pub mod power_pins {
    /// Node -> XBee SLEEP_RQ (level shifted to 3.3V)
    pub const SLEEP_RQ: u8 = 4;
    /// XBee ON/SLEEP -> node
    pub const ON_SLEEP: u8 = 5;
    /// Sensor rail load switch
    pub const SENSOR_POWER: u8 = 6;
}

/// Analog inputs
pub mod adc_pins {
    /// Battery divider tap
    pub const VBAT: u8 = 1;
    /// Line voltage sensor output
    pub const LINE_VOLTAGE: u8 = 2;
    /// Line current sensor output
    pub const LINE_CURRENT: u8 = 3;
}

/// TCXO configuration
pub mod tcxo {
    /// TCXO voltage code for SX1262 register
    /// 0x02 = 1.8V
    pub const VOLTAGE_CODE: u8 = 0x02;
}

/// Default LoRa configuration
pub mod lora_defaults {
    /// EU ISM band frequency
    pub const FREQUENCY_HZ: u32 = 868_000_000;
    pub const SPREADING_FACTOR: u8 = 7;
    pub const BANDWIDTH_KHZ: u32 = 125;
    /// Coding rate 4/5
    pub const CODING_RATE: u8 = 5;
    pub const TX_POWER_DBM: i8 = 14;
    /// Private network sync word
    pub const SYNC_WORD: u8 = 0x12;
}

/// Battery measurement front end
pub mod battery {
    /// ADC reference voltage (5.0 for AVcc, 1.1 for an internal reference)
    pub const ADC_REFERENCE_V: f32 = 5.0;
    /// Full-scale ADC code (1023 for 10-bit, 4095 for 12-bit)
    pub const ADC_FULL_SCALE: f32 = 1023.0;
    /// Divider resistor between battery and ADC tap, kOhm
    pub const DIVIDER_UPPER_KOHM: f32 = 100.0;
    /// Divider resistor between ADC tap and ground, kOhm
    pub const DIVIDER_LOWER_KOHM: f32 = 33.0;
    pub const AVERAGING_SAMPLES: u8 = 8;
    /// Settling delay between consecutive samples
    pub const SETTLE_US: u32 = 250;
}

/// ESP32-S3 ADC1 at 11 dB attenuation
pub mod board_adc {
    pub const REFERENCE_V: f32 = 3.1;
    pub const FULL_SCALE: f32 = 4095.0;
}

/// Line sensor scaling, from volts at the ADC pin
pub mod line {
    /// Voltage transformer ratio
    pub const VOLTS_PER_PIN_V: f32 = 100.0;
    /// Current transformer burden, mA per pin volt
    pub const MA_PER_PIN_V: f32 = 1_000.0;
}

/// Energy level thresholds, volts
pub mod thresholds {
    pub const HIGH_V: f32 = 3.90;
    pub const MID_V: f32 = 3.60;
    /// Fraction of each threshold used as the hysteresis band
    pub const HYSTERESIS: f32 = 0.03;
    /// Below this no transmission is attempted
    pub const CUTOFF_V: f32 = 3.40;
}

/// Reporting period per energy level, milliseconds
pub mod periods {
    pub const HIGH_MS: u32 = 5_000;
    pub const MID_MS: u32 = 15_000;
    pub const LOW_MS: u32 = 120_000;
}

/// Radio sleep/wake handshake
pub mod handshake {
    /// Upper bound for the ON/SLEEP acknowledgement
    pub const ACK_TIMEOUT_MS: u32 = 200;
    /// Poll step used by the XBee driver while waiting for ON/SLEEP
    pub const XBEE_POLL_MS: u32 = 1;
}

/// Serial configuration
pub mod serial {
    /// Bytes kept between `available()` and `read()` on the XBee UART
    pub const XBEE_RX_BUFFER_SIZE: usize = 256;
}

/// Radio payload limits
pub mod radio {
    /// Maximum payload size for LoRa
    pub const MAX_LORA_PAYLOAD: usize = 255;
    /// Maximum length returned by `read_string()`
    pub const MAX_TEXT_LEN: usize = 255;
}

/// Node behaviour
pub mod node {
    /// Node identifier written into every packet
    pub const NODE_ID: u16 = 1;
    /// Longest the control loop sleeps before polling again
    pub const MAX_IDLE_MS: u32 = 8_000;
    /// Time the sensor rail needs before readings are valid
    pub const SENSOR_WARMUP_MS: u32 = 20;
}
