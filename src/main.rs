//! Bike computer firmware for the RP2350
//!
//! Wires the peripherals to the tasks: the pulse task on a high-priority interrupt
//! executor, everything else on the thread executor.

#![no_std]
#![no_main]

use bike_computer::{config::DISPLAY_BAUD_RATE, environment::SensorSuite};
use defmt::{Debug2Format, error, info};
use defmt_rtt as _;
use embassy_embedded_hal::shared_bus::asynch::i2c::I2cDevice;
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_rp::{
    bind_interrupts,
    block::ImageDef,
    config::Config,
    gpio::{Input, Level, Output, Pull},
    i2c::{Async, Config as I2cConfig, I2c, InterruptHandler},
    interrupt,
    interrupt::{InterruptExt, Priority},
    peripherals::I2C0,
    spi::{Config as SpiConfig, Spi},
    uart::{Config as UartConfig, UartTx},
};
use embassy_sync::{blocking_mutex::raw::NoopRawMutex, mutex::Mutex};
use panic_probe as _;
use static_cell::StaticCell;

use crate::{
    periodic::SelectorPins,
    bluenrg::BlueNrg,
    sensor::{Hts221, Lps22hb, Lsm303agrAcc, Lsm303agrMag, Lsm6dsl},
};

mod bluenrg;
mod display;
mod event;
mod orchestrate;
mod periodic;
mod pulse;
mod radio;
mod sensor;
mod watchdog;

// Firmware image type for bootloader
#[unsafe(link_section = ".start_block")]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

bind_interrupts!(struct Irqs {
        I2C0_IRQ => InterruptHandler<I2C0>;
    }
);

/// Executor for the wheel pulse, preempts the thread executor
static EXECUTOR_HIGH: InterruptExecutor = InterruptExecutor::new();

/// Software interrupt driving [`EXECUTOR_HIGH`]
#[interrupt]
unsafe fn SWI_IRQ_1() {
    // SAFETY: only called by the interrupt controller for the executor started on it
    unsafe { EXECUTOR_HIGH.on_interrupt() }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Config::default());

    // Pulse handling first, so no wheel rotation is missed while the rest starts
    let hall = Input::new(p.PIN_15, Pull::Up);
    let status_led = Output::new(p.PIN_25, Level::Low);
    interrupt::SWI_IRQ_1.set_priority(Priority::P2);
    let high_spawner = EXECUTOR_HIGH.start(interrupt::SWI_IRQ_1);
    if let Err(e) = high_spawner.spawn(pulse::pulse_task(hall, status_led)) {
        error!("Failed to spawn pulse task: {}", Debug2Format(&e));
    }

    // I2C setup
    let sda = p.PIN_16;
    let scl = p.PIN_17;
    let i2c0 = p.I2C0;
    let i2c = I2c::new_async(i2c0, scl, sda, Irqs, I2cConfig::default());
    static I2C_BUS: StaticCell<Mutex<NoopRawMutex, I2c<'static, I2C0, Async>>> = StaticCell::new();
    let i2c_bus = I2C_BUS.init(Mutex::new(i2c));

    // Initialize the I2C devices
    let sensors = SensorSuite::new(
        Hts221::new(I2cDevice::new(i2c_bus)),
        Lps22hb::new(I2cDevice::new(i2c_bus)),
        Lsm303agrMag::new(I2cDevice::new(i2c_bus)),
        Lsm303agrAcc::new(I2cDevice::new(i2c_bus)),
        Lsm6dsl::new(I2cDevice::new(i2c_bus)),
    );

    // Display on UART0 TX
    let mut uart_config = UartConfig::default();
    uart_config.baudrate = DISPLAY_BAUD_RATE;
    let uart = UartTx::new(p.UART0, p.PIN_0, p.DMA_CH0, uart_config);

    // Screen selectors and music controls
    let selectors = SelectorPins {
        boot: Input::new(p.PIN_2, Pull::Down),
        ride: Input::new(p.PIN_3, Pull::Down),
        bump: Input::new(p.PIN_4, Pull::Down),
        music: Input::new(p.PIN_5, Pull::Down),
        self_check: Input::new(p.PIN_6, Pull::Down),
        music_play_pause: Input::new(p.PIN_7, Pull::Down),
        music_left: Input::new(p.PIN_8, Pull::Down),
        music_right: Input::new(p.PIN_9, Pull::Down),
    };

    // BlueNRG-MS shield on SPI1
    let mut spi_config = SpiConfig::default();
    spi_config.frequency = 1_000_000;
    let spi = Spi::new(p.SPI1, p.PIN_10, p.PIN_11, p.PIN_12, p.DMA_CH1, p.DMA_CH2, spi_config);
    let shield = BlueNrg::new(
        spi,
        Output::new(p.PIN_13, Level::High),
        Input::new(p.PIN_20, Pull::Down),
        Output::new(p.PIN_21, Level::Low),
    );

    // Output switched over the air
    let actuated = Output::new(p.PIN_14, Level::High);

    if let Err(e) = spawner.spawn(orchestrate::orchestrate_task(actuated)) {
        error!("Failed to spawn orchestrator task: {}", Debug2Format(&e));
    }
    if let Err(e) = spawner.spawn(display::display_task(uart)) {
        error!("Failed to spawn display task: {}", Debug2Format(&e));
    }
    if let Err(e) = spawner.spawn(radio::wireless_task(shield)) {
        error!("Failed to spawn wireless task: {}", Debug2Format(&e));
    }
    if let Err(e) = spawner.spawn(periodic::cycle_task(sensors, selectors)) {
        error!("Failed to spawn cycle task: {}", Debug2Format(&e));
    }
    if let Err(e) = spawner.spawn(watchdog::watchdog_task(p.WATCHDOG)) {
        error!("Failed to spawn watchdog task: {}", Debug2Format(&e));
    }

    info!("All tasks spawned");
}
