//! Scripted sensors for host tests

use crate::environment::{
    Accelerometer, Gyroscope, HumidityTemperature, Magnetometer, PressureTemperature, Sensor, SensorSuite,
};

/// Scripted sensor: fixed values, optional failure
#[derive(Default)]
pub struct Fake {
    /// Humidity or pressure
    pub value: f32,
    /// Temperature
    pub second: f32,
    /// Axis triple
    pub axes: [i32; 3],
    /// Every read and `enable` fails
    pub fail: bool,
    /// Identity check answers
    pub id_ok: bool,
}

impl Fake {
    /// Value or error depending on `fail`
    fn read<T>(&self, v: T) -> Result<T, ()> {
        if self.fail { Err(()) } else { Ok(v) }
    }
}

impl Sensor for Fake {
    type Error = ();

    async fn enable(&mut self) -> Result<(), ()> {
        self.read(())
    }

    async fn read_id(&mut self) -> bool {
        self.id_ok
    }
}

impl HumidityTemperature for Fake {
    async fn humidity(&mut self) -> Result<f32, ()> {
        self.read(self.value)
    }

    async fn temperature(&mut self) -> Result<f32, ()> {
        self.read(self.second)
    }
}

impl PressureTemperature for Fake {
    async fn pressure(&mut self) -> Result<f32, ()> {
        self.read(self.value)
    }

    async fn temperature(&mut self) -> Result<f32, ()> {
        self.read(self.second)
    }
}

impl Magnetometer for Fake {
    async fn magnetic_axes(&mut self) -> Result<[i32; 3], ()> {
        self.read(self.axes)
    }
}

impl Accelerometer for Fake {
    async fn acceleration_axes(&mut self) -> Result<[i32; 3], ()> {
        self.read(self.axes)
    }
}

impl Gyroscope for Fake {
    async fn angular_rate_axes(&mut self) -> Result<[i32; 3], ()> {
        self.read([self.axes[2], self.axes[1], self.axes[0]])
    }
}

/// Full suite of fakes
pub type FakeSuite = SensorSuite<Fake, Fake, Fake, Fake, Fake>;

/// Suite with plausible readings: 55 %, 22 °C, 1000 hPa, 21 °C
pub fn suite() -> FakeSuite {
    SensorSuite::new(
        Fake { value: 55.0, second: 22.0, id_ok: true, ..Fake::default() },
        Fake { value: 1000.0, second: 21.0, id_ok: true, ..Fake::default() },
        Fake { axes: [10, 20, 30], id_ok: true, ..Fake::default() },
        Fake { axes: [1, 2, 3], id_ok: true, ..Fake::default() },
        Fake { axes: [4, 5, 6], id_ok: true, ..Fake::default() },
    )
}
