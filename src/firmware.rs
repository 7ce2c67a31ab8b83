// FallGuard - Watch firmware
//
// Boot sequence:
//   1. Bring up logging, the I2C bus and the MPU6050.
//   2. Spawn the alert task (haptic SOS on every confirmed fall).
//   3. Spawn the detection task with the built-in tuning.
//   4. Spawn the sensor task polling the IMU at 50 Hz.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use esp_idf_hal::gpio::{AnyOutputPin, Output, OutputPin, PinDriver};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::prelude::*;

use fallguard::clock::Clock;
use fallguard::config::*;
use fallguard::events::AlertEvent;
use fallguard::tasks;

use crate::drivers::haptic::HapticDriver;
use crate::drivers::imu::{Mpu6050, Mpu6050Source, SharedBus};

/// Milliseconds since boot.
#[derive(Debug, Clone, Copy, Default)]
pub struct EspClock;

impl Clock for EspClock {
    fn now_ms(&self) -> u64 {
        let us = unsafe { esp_idf_sys::esp_timer_get_time() };
        (us / 1000) as u64
    }
}

pub fn run() -> anyhow::Result<()> {
    // Link esp-idf-sys runtime patches and initialise logging.
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();
    log::info!("FallGuard firmware starting");

    let config = FallConfig::default();
    // ---- Peripherals ------------------------------------------------------
    let peripherals = Peripherals::take()?;
    log::info!(
        "I2C on SDA=GPIO{} SCL=GPIO{}, haptic on GPIO{}",
        PIN_I2C_SDA,
        PIN_I2C_SCL,
        PIN_HAPTIC
    );

    let i2c_config = I2cConfig::new().baudrate(400u32.kHz().into());
    let i2c: I2cDriver<'static> = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio6, // SDA
        peripherals.pins.gpio7, // SCL
        &i2c_config,
    )?;
    // The bus lives for the whole programme; firmware never exits.
    let i2c_bus: SharedBus = Box::leak(Box::new(Mutex::new(i2c)));

    let imu = Mpu6050::new(i2c_bus);
    if !imu.is_connected() {
        log::error!("MPU6050 not responding at 0x{:02X}", I2C_ADDR_MPU6050);
    }
    imu.init()?;

    let haptic_pin: PinDriver<'static, AnyOutputPin, Output> =
        PinDriver::output(peripherals.pins.gpio4.downgrade_output())?;
    let mut haptic = HapticDriver::new(haptic_pin);

    // ---- Spawn tasks (map to FreeRTOS tasks via std::thread) ---------------

    let (sink, _alert_thread) = tasks::alert::spawn_alert_task(move |event: AlertEvent| {
        log::warn!(
            "Fall alert: {} (accel={:.1} m/s², gyro={:.1} rad/s)",
            event.trigger,
            event.acceleration_magnitude,
            event.gyro_magnitude
        );
        haptic.play(&ALERT_VIBRATION_PATTERN)
    })?;

    let detector = tasks::detect::spawn_detector(config, sink, EspClock)?;

    let source = Mpu6050Source::new(imu, EspClock);
    tasks::sensor::spawn_sensor_task(
        source,
        detector.sender(),
        Duration::from_millis(SENSOR_SAMPLE_INTERVAL_MS),
    )?;

    log::info!("Boot complete - monitoring for falls");

    // Main thread has nothing left to do - park it forever.
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}
