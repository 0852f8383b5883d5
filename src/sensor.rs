//! Drivers for the sensors of the motion/environment expansion board
//!
//! HTS221, LPS22HB and LSM6DSL are thin register-level wrappers; the LSM303AGR goes
//! through its driver crate. Each exposes enable, identity check and the reads the
//! cycle needs, scaled to the units of the library traits.

use bike_computer::environment::{
    Accelerometer, Gyroscope, HumidityTemperature, Magnetometer, PressureTemperature, Sensor,
};
use defmt::Format;
use embassy_time::Delay;
use embedded_hal_async::i2c::I2c;
use lsm303agr::{
    AccelMode, AccelOutputDataRate, Lsm303agr, MagMode, MagOutputDataRate,
    interface::I2cInterface,
    mode::{MagContinuous, MagOneShot},
};

/// Driver error
#[derive(Debug, Format)]
pub enum Error<E> {
    /// I2C transfer or chip driver failed
    Bus(E),
    /// Sensor used before `enable` completed
    NotEnabled,
    /// Calibration data would divide by zero
    BadCalibration,
}

/// Set on a register address to auto-increment over multi-byte reads
const AUTO_INCREMENT: u8 = 0x80;

/// One device on the shared bus
struct Registers<I> {
    /// Bus handle
    i2c: I,
    /// 7-bit device address
    address: u8,
}

impl<I: I2c> Registers<I> {
    /// Reads one register
    async fn read(&mut self, register: u8) -> Result<u8, Error<I::Error>> {
        let mut value = [0];
        self.i2c
            .write_read(self.address, &[register], &mut value)
            .await
            .map_err(Error::Bus)?;
        Ok(value[0])
    }

    /// Reads consecutive registers starting at `register`
    async fn read_many(&mut self, register: u8, buffer: &mut [u8]) -> Result<(), Error<I::Error>> {
        self.i2c
            .write_read(self.address, &[register], buffer)
            .await
            .map_err(Error::Bus)
    }

    /// Writes one register
    async fn write(&mut self, register: u8, value: u8) -> Result<(), Error<I::Error>> {
        self.i2c.write(self.address, &[register, value]).await.map_err(Error::Bus)
    }

    /// Whether the identity register holds `expected`
    async fn check_id(&mut self, who_am_i: u8, expected: u8) -> bool {
        matches!(self.read(who_am_i).await, Ok(id) if id == expected)
    }

    /// Three little-endian 16-bit axes starting at `register`
    async fn axes(&mut self, register: u8) -> Result<[i16; 3], Error<I::Error>> {
        let mut raw = [0u8; 6];
        self.read_many(register, &mut raw).await?;
        Ok([
            i16::from_le_bytes([raw[0], raw[1]]),
            i16::from_le_bytes([raw[2], raw[3]]),
            i16::from_le_bytes([raw[4], raw[5]]),
        ])
    }
}

/// HTS221 factory calibration
#[derive(Clone, Copy)]
struct Hts221Calibration {
    /// Humidity at the first calibration point, %rH
    h0_rh: f32,
    /// Humidity at the second calibration point, %rH
    h1_rh: f32,
    /// Raw output at `h0_rh`
    h0_out: f32,
    /// Raw output at `h1_rh`
    h1_out: f32,
    /// Temperature at the first calibration point, °C
    t0_deg: f32,
    /// Temperature at the second calibration point, °C
    t1_deg: f32,
    /// Raw output at `t0_deg`
    t0_out: f32,
    /// Raw output at `t1_deg`
    t1_out: f32,
}

impl Hts221Calibration {
    /// Decodes the 16 calibration registers starting at 0x30
    fn from_registers(c: &[u8; 16]) -> Self {
        let t0_x8 = u16::from(c[2]) | (u16::from(c[5] & 0x03) << 8);
        let t1_x8 = u16::from(c[3]) | (u16::from(c[5] & 0x0C) << 6);
        Self {
            h0_rh: f32::from(c[0]) / 2.0,
            h1_rh: f32::from(c[1]) / 2.0,
            h0_out: f32::from(i16::from_le_bytes([c[6], c[7]])),
            h1_out: f32::from(i16::from_le_bytes([c[10], c[11]])),
            t0_deg: f32::from(t0_x8) / 8.0,
            t1_deg: f32::from(t1_x8) / 8.0,
            t0_out: f32::from(i16::from_le_bytes([c[12], c[13]])),
            t1_out: f32::from(i16::from_le_bytes([c[14], c[15]])),
        }
    }
}

/// Linear interpolation between two calibration points
fn interpolate<E>(raw: i16, out0: f32, out1: f32, value0: f32, value1: f32) -> Result<f32, Error<E>> {
    let span = out1 - out0;
    if span == 0.0 {
        return Err(Error::BadCalibration);
    }
    Ok((value1 - value0) * (f32::from(raw) - out0) / span + value0)
}

/// HTS221 humidity and temperature sensor
pub struct Hts221<I> {
    /// Device registers
    regs: Registers<I>,
    /// Loaded by `enable`
    calibration: Option<Hts221Calibration>,
}

impl<I: I2c> Hts221<I> {
    /// I2C address
    const ADDRESS: u8 = 0x5F;
    /// Identity register
    const WHO_AM_I: u8 = 0x0F;
    /// Expected identity
    const ID: u8 = 0xBC;
    /// Power down, block data update and output rate
    const CTRL_REG1: u8 = 0x20;
    /// Humidity output, two bytes
    const HUMIDITY_OUT: u8 = 0x28;
    /// Temperature output, two bytes
    const TEMP_OUT: u8 = 0x2A;
    /// First calibration register
    const CALIBRATION: u8 = 0x30;

    /// Wraps the bus device
    pub const fn new(i2c: I) -> Self {
        Self {
            regs: Registers {
                i2c,
                address: Self::ADDRESS,
            },
            calibration: None,
        }
    }

    /// Calibration or an error if the sensor was never enabled
    fn calibration(&self) -> Result<Hts221Calibration, Error<I::Error>> {
        self.calibration.ok_or(Error::NotEnabled)
    }

    /// Raw 16-bit output at `register`
    async fn raw(&mut self, register: u8) -> Result<i16, Error<I::Error>> {
        let mut raw = [0u8; 2];
        self.regs.read_many(register | AUTO_INCREMENT, &mut raw).await?;
        Ok(i16::from_le_bytes(raw))
    }
}

impl<I: I2c> Sensor for Hts221<I> {
    type Error = Error<I::Error>;

    async fn enable(&mut self) -> Result<(), Self::Error> {
        // Powered, block data update, 1 Hz
        self.regs.write(Self::CTRL_REG1, 0x85).await?;
        let mut registers = [0u8; 16];
        self.regs
            .read_many(Self::CALIBRATION | AUTO_INCREMENT, &mut registers)
            .await?;
        self.calibration = Some(Hts221Calibration::from_registers(&registers));
        Ok(())
    }

    async fn read_id(&mut self) -> bool {
        self.regs.check_id(Self::WHO_AM_I, Self::ID).await
    }
}

impl<I: I2c> HumidityTemperature for Hts221<I> {
    async fn humidity(&mut self) -> Result<f32, Self::Error> {
        let cal = self.calibration()?;
        let raw = self.raw(Self::HUMIDITY_OUT).await?;
        let humidity = interpolate(raw, cal.h0_out, cal.h1_out, cal.h0_rh, cal.h1_rh)?;
        Ok(humidity.clamp(0.0, 100.0))
    }

    async fn temperature(&mut self) -> Result<f32, Self::Error> {
        let cal = self.calibration()?;
        let raw = self.raw(Self::TEMP_OUT).await?;
        interpolate(raw, cal.t0_out, cal.t1_out, cal.t0_deg, cal.t1_deg)
    }
}

/// LPS22HB barometer
pub struct Lps22hb<I> {
    /// Device registers
    regs: Registers<I>,
}

impl<I: I2c> Lps22hb<I> {
    /// I2C address
    const ADDRESS: u8 = 0x5D;
    /// Identity register
    const WHO_AM_I: u8 = 0x0F;
    /// Expected identity
    const ID: u8 = 0xB1;
    /// Output rate and block data update
    const CTRL_REG1: u8 = 0x10;
    /// Pressure output, three bytes
    const PRESS_OUT_XL: u8 = 0x28;
    /// Temperature output, two bytes
    const TEMP_OUT_L: u8 = 0x2B;

    /// Wraps the bus device
    pub const fn new(i2c: I) -> Self {
        Self {
            regs: Registers {
                i2c,
                address: Self::ADDRESS,
            },
        }
    }
}

impl<I: I2c> Sensor for Lps22hb<I> {
    type Error = Error<I::Error>;

    async fn enable(&mut self) -> Result<(), Self::Error> {
        // 1 Hz, block data update
        self.regs.write(Self::CTRL_REG1, 0x12).await
    }

    async fn read_id(&mut self) -> bool {
        self.regs.check_id(Self::WHO_AM_I, Self::ID).await
    }
}

impl<I: I2c> PressureTemperature for Lps22hb<I> {
    async fn pressure(&mut self) -> Result<f32, Self::Error> {
        let mut raw = [0u8; 3];
        self.regs.read_many(Self::PRESS_OUT_XL, &mut raw).await?;
        // 24-bit two's complement, sign-extended through the top byte
        let counts = i32::from_le_bytes([raw[0], raw[1], raw[2], 0]) << 8 >> 8;
        #[allow(clippy::cast_precision_loss)]
        let hpa = counts as f32 / 4096.0;
        Ok(hpa)
    }

    async fn temperature(&mut self) -> Result<f32, Self::Error> {
        let mut raw = [0u8; 2];
        self.regs.read_many(Self::TEMP_OUT_L, &mut raw).await?;
        Ok(f32::from(i16::from_le_bytes(raw)) / 100.0)
    }
}

/// The LSM303AGR driver over a bus device
type Lsm303agrDriver<I, MODE> = Lsm303agr<I2cInterface<I>, MODE>;

/// LSM303AGR accelerometer part
pub struct Lsm303agrAcc<I> {
    /// Driver, its magnetometer side is left alone
    sensor: Lsm303agrDriver<I, MagOneShot>,
}

impl<I: I2c> Lsm303agrAcc<I> {
    /// Wraps the bus device
    pub fn new(i2c: I) -> Self {
        Self {
            sensor: Lsm303agr::new_with_i2c(i2c),
        }
    }
}

impl<I: I2c> Sensor for Lsm303agrAcc<I> {
    type Error = Error<lsm303agr::Error<I::Error>>;

    async fn enable(&mut self) -> Result<(), Self::Error> {
        self.sensor.init().await.map_err(Error::Bus)?;
        self.sensor
            .set_accel_mode_and_odr(&mut Delay, AccelMode::Normal, AccelOutputDataRate::Hz100)
            .await
            .map_err(Error::Bus)
    }

    async fn read_id(&mut self) -> bool {
        matches!(self.sensor.accelerometer_id().await, Ok(id) if id.is_correct())
    }
}

impl<I: I2c> Accelerometer for Lsm303agrAcc<I> {
    async fn acceleration_axes(&mut self) -> Result<[i32; 3], Self::Error> {
        let (x, y, z) = self.sensor.acceleration().await.map_err(Error::Bus)?.xyz_mg();
        Ok([x, y, z])
    }
}

/// Magnetometer driver state, switched to continuous mode by `enable`
enum MagState<I> {
    /// Power-up mode, no readings yet
    OneShot(Lsm303agrDriver<I, MagOneShot>),
    /// Measuring continuously
    Continuous(Lsm303agrDriver<I, MagContinuous>),
}

/// LSM303AGR magnetometer part
pub struct Lsm303agrMag<I> {
    /// Driver; only `None` if an `enable` was dropped mid-switch
    state: Option<MagState<I>>,
}

impl<I: I2c> Lsm303agrMag<I> {
    /// Wraps the bus device
    pub fn new(i2c: I) -> Self {
        Self {
            state: Some(MagState::OneShot(Lsm303agr::new_with_i2c(i2c))),
        }
    }
}

impl<I: I2c> Sensor for Lsm303agrMag<I> {
    type Error = Error<lsm303agr::Error<I::Error>>;

    async fn enable(&mut self) -> Result<(), Self::Error> {
        let mut sensor = match self.state.take() {
            Some(MagState::OneShot(sensor)) => sensor,
            Some(continuous @ MagState::Continuous(_)) => {
                self.state = Some(continuous);
                return Ok(());
            }
            None => return Err(Error::NotEnabled),
        };

        let configured = match sensor.init().await {
            Ok(()) => {
                sensor
                    .set_mag_mode_and_odr(&mut Delay, MagMode::HighResolution, MagOutputDataRate::Hz10)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = configured {
            self.state = Some(MagState::OneShot(sensor));
            return Err(Error::Bus(e));
        }

        match sensor.into_mag_continuous().await {
            Ok(sensor) => {
                self.state = Some(MagState::Continuous(sensor));
                Ok(())
            }
            Err(e) => {
                self.state = Some(MagState::OneShot(e.dev));
                Err(Error::Bus(e.error))
            }
        }
    }

    async fn read_id(&mut self) -> bool {
        let id = match self.state.as_mut() {
            Some(MagState::OneShot(sensor)) => sensor.magnetometer_id().await,
            Some(MagState::Continuous(sensor)) => sensor.magnetometer_id().await,
            None => return false,
        };
        matches!(id, Ok(id) if id.is_correct())
    }
}

impl<I: I2c> Magnetometer for Lsm303agrMag<I> {
    async fn magnetic_axes(&mut self) -> Result<[i32; 3], Self::Error> {
        let Some(MagState::Continuous(sensor)) = self.state.as_mut() else {
            return Err(Error::NotEnabled);
        };
        let (x, y, z) = sensor.magnetic_field().await.map_err(Error::Bus)?.xyz_nt();
        // 1 mgauss = 100 nT
        Ok([x / 100, y / 100, z / 100])
    }
}

/// LSM6DSL accelerometer and gyroscope
pub struct Lsm6dsl<I> {
    /// Device registers
    regs: Registers<I>,
}

impl<I: I2c> Lsm6dsl<I> {
    /// I2C address
    const ADDRESS: u8 = 0x6B;
    /// Identity register
    const WHO_AM_I: u8 = 0x0F;
    /// Expected identity
    const ID: u8 = 0x6A;
    /// Accelerometer rate and scale
    const CTRL1_XL: u8 = 0x10;
    /// Gyroscope rate and scale
    const CTRL2_G: u8 = 0x11;
    /// Block data update and address auto-increment
    const CTRL3_C: u8 = 0x12;
    /// First gyroscope output register
    const OUTX_L_G: u8 = 0x22;
    /// First accelerometer output register
    const OUTX_L_XL: u8 = 0x28;

    /// Wraps the bus device
    pub const fn new(i2c: I) -> Self {
        Self {
            regs: Registers {
                i2c,
                address: Self::ADDRESS,
            },
        }
    }
}

impl<I: I2c> Sensor for Lsm6dsl<I> {
    type Error = Error<I::Error>;

    async fn enable(&mut self) -> Result<(), Self::Error> {
        self.regs.write(Self::CTRL3_C, 0x44).await?;
        // 104 Hz, ±2 g
        self.regs.write(Self::CTRL1_XL, 0x40).await?;
        // 104 Hz, 250 dps
        self.regs.write(Self::CTRL2_G, 0x40).await
    }

    async fn read_id(&mut self) -> bool {
        self.regs.check_id(Self::WHO_AM_I, Self::ID).await
    }
}

impl<I: I2c> Accelerometer for Lsm6dsl<I> {
    async fn acceleration_axes(&mut self) -> Result<[i32; 3], Self::Error> {
        let raw = self.regs.axes(Self::OUTX_L_XL).await?;
        // 0.061 mg per digit
        Ok(raw.map(|axis| i32::from(axis) * 61 / 1000))
    }
}

impl<I: I2c> Gyroscope for Lsm6dsl<I> {
    async fn angular_rate_axes(&mut self) -> Result<[i32; 3], Self::Error> {
        let raw = self.regs.axes(Self::OUTX_L_G).await?;
        // 8.75 mdps per digit
        Ok(raw.map(|axis| i32::from(axis) * 875 / 100))
    }
}
