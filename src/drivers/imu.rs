// FallGuard - MPU6050 IMU Driver
//
// Register-level driver over the shared I2C bus. Readings are converted to
// SI units on the way out: accelerometer in m/s², gyroscope in rad/s.

use std::sync::{Mutex, MutexGuard};

use anyhow::anyhow;
use esp_idf_hal::i2c::I2cDriver;

use fallguard::clock::Clock;
use fallguard::config::*;
use fallguard::events::Sample;
use fallguard::tasks::sensor::SensorSource;

/// Thread-safe handle to a shared I2C bus.
pub type SharedBus = &'static Mutex<I2cDriver<'static>>;

// MPU6050 register addresses
const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_CONFIG: u8 = 0x1A;
const REG_GYRO_CONFIG: u8 = 0x1B;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_ACCEL_XOUT_H: u8 = 0x3B; // Start of 14-byte sensor burst
const REG_WHO_AM_I: u8 = 0x75;
const WHO_AM_I_EXPECTED: u8 = 0x68;

/// One burst read in SI units.
#[derive(Debug, Clone, Copy)]
pub struct ImuReading {
    pub accel: [f64; 3],
    pub gyro: [f64; 3],
}

pub struct Mpu6050 {
    bus: SharedBus,
}

impl Mpu6050 {
    pub fn new(bus: SharedBus) -> Self {
        Self { bus }
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'static, I2cDriver<'static>>> {
        self.bus.lock().map_err(|_| anyhow!("I2C bus mutex poisoned"))
    }

    /// Verify the device is reachable on the I2C bus.
    pub fn is_connected(&self) -> bool {
        let Ok(mut bus) = self.lock() else {
            return false;
        };
        let mut buf = [0u8; 1];
        match bus.write_read(I2C_ADDR_MPU6050, &[REG_WHO_AM_I], &mut buf, I2C_TIMEOUT_TICKS) {
            Ok(()) => buf[0] == WHO_AM_I_EXPECTED,
            Err(_) => false,
        }
    }

    /// Wake the sensor and configure accel (±8 g), gyro (±500 °/s), DLPF 21 Hz.
    pub fn init(&self) -> anyhow::Result<()> {
        let mut bus = self.lock()?;

        // Wake up (clear SLEEP bit)
        bus.write(I2C_ADDR_MPU6050, &[REG_PWR_MGMT_1, 0x00], I2C_TIMEOUT_TICKS)?;
        bus.write(I2C_ADDR_MPU6050, &[REG_CONFIG, 0x04], I2C_TIMEOUT_TICKS)?;
        bus.write(I2C_ADDR_MPU6050, &[REG_GYRO_CONFIG, 0x08], I2C_TIMEOUT_TICKS)?;
        bus.write(I2C_ADDR_MPU6050, &[REG_ACCEL_CONFIG, 0x10], I2C_TIMEOUT_TICKS)?;

        log::info!("MPU6050 initialised (±8g, ±500°/s, DLPF 21Hz)");
        Ok(())
    }

    /// Burst-read all 6 axes and convert to SI units.
    pub fn read(&self) -> anyhow::Result<ImuReading> {
        let mut raw = [0u8; 14];
        self.lock()?.write_read(
            I2C_ADDR_MPU6050,
            &[REG_ACCEL_XOUT_H],
            &mut raw,
            I2C_TIMEOUT_TICKS,
        )?;

        let axis = |i: usize, scale: f32| i16::from_be_bytes([raw[i], raw[i + 1]]) as f32 / scale;
        let g = |i: usize| f64::from(axis(i, ACCEL_SCALE_8G)) * STANDARD_GRAVITY;
        let rad = |i: usize| f64::from(axis(i, GYRO_SCALE_500)).to_radians();

        Ok(ImuReading {
            accel: [g(0), g(2), g(4)],
            // raw[6..8] = temperature, skipped
            gyro: [rad(8), rad(10), rad(12)],
        })
    }
}

/// Live sensor source: one accelerometer and one gyroscope sample per poll,
/// stamped with the same clock the detector uses.
pub struct Mpu6050Source<C> {
    imu: Mpu6050,
    clock: C,
}

impl<C: Clock> Mpu6050Source<C> {
    pub fn new(imu: Mpu6050, clock: C) -> Self {
        Self { imu, clock }
    }
}

impl<C: Clock> SensorSource for Mpu6050Source<C> {
    fn read(&mut self) -> anyhow::Result<Option<Vec<Sample>>> {
        let reading = self.imu.read()?;
        let now = self.clock.now_ms();
        // Gyro first so the accelerometer sample sees this tick's rotation.
        Ok(Some(vec![
            Sample::gyro(reading.gyro, now),
            Sample::accel(reading.accel, now),
        ]))
    }
}
