#![no_std]
#![no_main]

// Required for ESP-IDF bootloader compatibility
// Use explicit parameters to ensure correct efuse block revision values
esp_bootloader_esp_idf::esp_app_desc!(
    env!("CARGO_PKG_VERSION"),  // version
    env!("CARGO_PKG_NAME"),     // project_name
    "00:00:00",                 // build_time
    "2025-01-01",               // build_date
    "0.0.0",                    // idf_ver (not using IDF)
    0x10000,                    // mmu_page_size (64KB)
    0,                          // min_efuse_blk_rev_full (accept all)
    u16::MAX                    // max_efuse_blk_rev_full (accept all)
);

use core::cell::RefCell;

use embassy_time::{Delay as EmbassyDelay, Duration, Instant, Timer};
use esp_backtrace as _;
use esp_hal::analog::adc::{Adc, AdcConfig as HalAdcConfig, AdcPin, Attenuation};
use esp_hal::delay::Delay;
use esp_hal::gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull};
use esp_hal::peripherals::{ADC1, GPIO1, GPIO2, GPIO3};
use esp_hal::spi::master::{Config as SpiConfig, Spi};
use esp_hal::spi::Mode as SpiMode;
use esp_hal::time::Rate;
use esp_hal::timer::timg::TimerGroup;
use esp_hal::{Async, Blocking};
use static_cell::StaticCell;

use wsn_node::adaptive::{AdaptiveConfig, AdaptiveTx, AdcConfig, AdcSource, Clock};
use wsn_node::config::{battery, board_adc, line, node};
use wsn_node::node::{CycleOutcome, Measurement, ReportCycle};
use wsn_node::power::{DeepSleep, EnergyManager, PowerConfig, PowerPins, SleepStep};
use wsn_node::radio::{LoraConfig, LoraRadio, RadioTransport, Sx1262Pins};

/// Delay before retrying a failed radio init
const RADIO_RETRY_MS: u64 = 5_000;

type Radio = LoraRadio<
    Spi<'static, Async>,
    Output<'static>,
    Input<'static>,
    Output<'static>,
    Input<'static>,
    EmbassyDelay,
>;

type Power = EnergyManager<Output<'static>, Input<'static>, Output<'static>, TimerSleep>;

/// Static executor for embassy
static EXECUTOR: StaticCell<esp_rtos::embassy::Executor> = StaticCell::new();

/// Millisecond tick from the embassy time driver, truncated to 32 bits
struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u32 {
        Instant::now().as_millis() as u32
    }
}

/// Parks the task on a timer so the executor can idle the core
struct TimerSleep;

impl DeepSleep for TimerSleep {
    async fn power_down(&mut self, step: SleepStep) {
        Timer::after(Duration::from_millis(step.as_ms().into())).await;
    }
}

/// ADC1 with the battery tap and both line sensors
struct Sensors {
    adc: Adc<'static, ADC1<'static>, Blocking>,
    vbat: AdcPin<GPIO1<'static>, ADC1<'static>>,
    line_voltage: AdcPin<GPIO2<'static>, ADC1<'static>>,
    line_current: AdcPin<GPIO3<'static>, ADC1<'static>>,
}

impl Sensors {
    fn pin_volts(raw: u16) -> f32 {
        f32::from(raw) / board_adc::FULL_SCALE * board_adc::REFERENCE_V
    }

    fn measure(&mut self, timestamp: u32) -> Measurement {
        let voltage = nb::block!(self.adc.read_oneshot(&mut self.line_voltage)).unwrap_or(0);
        let current = nb::block!(self.adc.read_oneshot(&mut self.line_current)).unwrap_or(0);

        Measurement {
            line_voltage_v: Self::pin_volts(voltage) * line::VOLTS_PER_PIN_V,
            line_current_ma: (Self::pin_volts(current) * line::MA_PER_PIN_V) as i16,
            timestamp,
        }
    }
}

/// Battery channel handed to the controller
struct BatteryChannel<'a>(&'a RefCell<Sensors>);

impl AdcSource for BatteryChannel<'_> {
    fn read_raw(&mut self) -> u16 {
        let mut sensors = self.0.borrow_mut();
        let sensors = &mut *sensors;
        nb::block!(sensors.adc.read_oneshot(&mut sensors.vbat)).unwrap_or(0)
    }

    fn settle(&mut self) {
        Delay::new().delay_micros(battery::SETTLE_US);
    }
}

#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger(log::LevelFilter::Info);

    let peripherals = esp_hal::init(esp_hal::Config::default());

    // Initialise the RTOS scheduler with timer - MUST be done before any async operations
    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    // Configure SPI for LoRa
    let spi = Spi::new(
        peripherals.SPI2,
        SpiConfig::default()
            .with_frequency(Rate::from_mhz(1))
            .with_mode(SpiMode::_0),
    )
    .expect("SPI2 config rejected")
    .with_sck(peripherals.GPIO7)
    .with_miso(peripherals.GPIO8)
    .with_mosi(peripherals.GPIO9)
    .into_async();

    // Configure LoRa control pins
    let lora_pins = Sx1262Pins {
        nss: Output::new(peripherals.GPIO41, Level::High, OutputConfig::default()),
        dio1: Input::new(peripherals.GPIO39, InputConfig::default().with_pull(Pull::Down)),
        nrst: Output::new(peripherals.GPIO42, Level::High, OutputConfig::default()),
        busy: Input::new(peripherals.GPIO40, InputConfig::default().with_pull(Pull::Down)),
    };
    let radio = LoraRadio::new(spi, lora_pins, EmbassyDelay, LoraConfig::default());

    // SLEEP_RQ/ON_SLEEP go to the auxiliary radio header, the load switch feeds the line sensors
    let power_pins = PowerPins {
        sleep_rq: Output::new(peripherals.GPIO4, Level::High, OutputConfig::default()),
        on_sleep: Input::new(peripherals.GPIO5, InputConfig::default().with_pull(Pull::Down)),
        sensor_power: Output::new(peripherals.GPIO6, Level::Low, OutputConfig::default()),
    };
    let power = EnergyManager::new(power_pins, PowerConfig::default(), TimerSleep);

    let mut adc_config = HalAdcConfig::new();
    let vbat = adc_config.enable_pin(peripherals.GPIO1, Attenuation::_11dB);
    let line_voltage = adc_config.enable_pin(peripherals.GPIO2, Attenuation::_11dB);
    let line_current = adc_config.enable_pin(peripherals.GPIO3, Attenuation::_11dB);
    let sensors = Sensors {
        adc: Adc::new(peripherals.ADC1, adc_config),
        vbat,
        line_voltage,
        line_current,
    };

    // Create and run the embassy executor
    let executor = EXECUTOR.init(esp_rtos::embassy::Executor::new());
    executor.run(|spawner| {
        spawner.must_spawn(telemetry_task(radio, power, sensors));
    })
}

/// Power the line sensors, let them settle and take one reading
async fn read_line(power: &mut Power, sensors: &RefCell<Sensors>) -> Measurement {
    if let Err(e) = power.power_sensors(true) {
        log::warn!("sensor rail: {:?}", e);
    }
    Timer::after(Duration::from_millis(node::SENSOR_WARMUP_MS.into())).await;
    let reading = sensors.borrow_mut().measure(Instant::now().as_secs() as u32);
    if let Err(e) = power.power_sensors(false) {
        log::warn!("sensor rail: {:?}", e);
    }
    reading
}

/// Task that runs the reporting loop forever
///
/// Each pass polls the controller and sleeps until the next deadline, capped
/// at MAX_IDLE_MS. The line sensors are powered only for a granted report.
/// `begin` parks the auxiliary radio header through its SLEEP_RQ/ON_SLEEP
/// handshake and switches the sensor rail off.
#[embassy_executor::task]
async fn telemetry_task(mut radio: Radio, mut power: Power, sensors: Sensors) {
    let sensors = RefCell::new(sensors);

    if let Err(e) = power.begin().await {
        log::warn!("power init: {:?}", e);
    }

    while let Err(e) = radio.init().await {
        log::error!("lora init failed: {:?}, retrying", e);
        Timer::after(Duration::from_millis(RADIO_RETRY_MS)).await;
    }
    if let Err(e) = radio.sleep().await {
        log::warn!("lora sleep failed: {:?}", e);
    }

    let config = AdaptiveConfig::default().with_adc(AdcConfig {
        reference_v: board_adc::REFERENCE_V,
        full_scale: board_adc::FULL_SCALE,
        ..AdcConfig::default()
    });
    let tx = AdaptiveTx::new(config, EmbassyClock, Some(BatteryChannel(&sensors)));
    let mut cycle = ReportCycle::new(radio, tx, node::NODE_ID);

    loop {
        let idle_ms = match cycle.run_once(read_line(&mut power, &sensors)).await {
            Ok(CycleOutcome::Cutoff) => node::MAX_IDLE_MS,
            Ok(_) => cycle.ms_until_next().min(node::MAX_IDLE_MS),
            Err(e) => {
                log::warn!("report failed: {:?}", e);
                cycle.ms_until_next().min(node::MAX_IDLE_MS)
            }
        };

        power
            .sleep_for_ms(idle_ms.max(SleepStep::SHORTEST.as_ms()))
            .await;
    }
}
