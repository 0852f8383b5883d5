//! BlueNRG-MS BLE coprocessor on SPI
//!
//! Implements the wireless link's [`Radio`] on the expansion shield: GATT server with
//! the LED service and its actuator characteristic, device information service and
//! advertising. Packet contents come from [`bike_computer::hci`].

use bike_computer::{
    config::{
        ACTUATOR_CHARACTERISTIC_UUID, DEVICE_INFORMATION_SERVICE_UUID, DEVICE_NAME, LED_SERVICE_UUID,
        MANUFACTURER_NAME, MANUFACTURER_NAME_UUID,
    },
    hci::{
        self, Command, HciError, HciEvent, MAX_PACKET_LEN, PROPERTY_READ, PROPERTY_WRITE,
        PROPERTY_WRITE_WITHOUT_RESPONSE, Packet, ReturnParams, SPI_READ_HEADER, SPI_WRITE_HEADER, SpiStatus,
    },
    wireless::{Advertisement, Radio, RadioEvent},
};
use defmt::{Debug2Format, debug, warn};
use embassy_rp::gpio::{Input, Output};
use embassy_time::{Duration, Timer, with_timeout};
use embedded_hal_async::spi::SpiBus;

/// How often a write is retried while the coprocessor has no room
const WRITE_RETRIES: u8 = 10;
/// Time the coprocessor gets to answer a command
const COMMAND_TIMEOUT: Duration = Duration::from_millis(500);
/// Time the coprocessor gets to boot after a reset
const BOOT_TIMEOUT: Duration = Duration::from_millis(1000);
/// Attribute records reserved per service
const SERVICE_RECORDS: u8 = 4;

/// Coprocessor error
#[derive(Debug)]
pub enum Error<E> {
    /// SPI transfer failed
    Spi(E),
    /// Coprocessor did not signal ready
    NotReady,
    /// No answer in time
    Timeout,
    /// Command refused
    Command {
        /// Refused command
        opcode: u16,
        /// HCI status code
        status: u8,
    },
    /// Command could not be encoded
    Encode(HciError),
    /// Answer too short for what it should hold
    Malformed,
}

/// BlueNRG-MS on an SPI bus with its chip select, interrupt and reset lines
pub struct BlueNrg<B> {
    /// SPI bus, owned exclusively
    spi: B,
    /// Chip select, active low
    cs: Output<'static>,
    /// High while the coprocessor has data for us
    irq: Input<'static>,
    /// Reset, active low
    reset: Output<'static>,
    /// Value handle of the actuator characteristic once the GATT server is set up
    actuator_handle: Option<u16>,
}

impl<B: SpiBus> BlueNrg<B> {
    /// Takes over the bus and lines; the coprocessor stays untouched until `init`
    pub const fn new(spi: B, cs: Output<'static>, irq: Input<'static>, reset: Output<'static>) -> Self {
        Self {
            spi,
            cs,
            irq,
            reset,
            actuator_handle: None,
        }
    }

    /// Pulses the reset line
    async fn hardware_reset(&mut self) {
        self.reset.set_low();
        Timer::after_millis(5).await;
        self.reset.set_high();
        Timer::after_millis(5).await;
    }

    /// Exchanges a header with chip select already asserted
    async fn header(&mut self, request: [u8; 5]) -> Result<SpiStatus, Error<B::Error>> {
        let mut header = request;
        self.spi.transfer_in_place(&mut header).await.map_err(Error::Spi)?;
        Ok(SpiStatus::parse(&header))
    }

    /// Writes one packet, waiting for write space
    async fn write_packet(&mut self, packet: &[u8]) -> Result<(), Error<B::Error>> {
        for _ in 0..WRITE_RETRIES {
            self.cs.set_low();
            let result = match self.header(SPI_WRITE_HEADER).await {
                Ok(status) if status.ready && usize::from(status.write_space) >= packet.len() => {
                    let written = self.spi.write(packet).await;
                    let flushed = self.spi.flush().await;
                    Some(written.and(flushed).map_err(Error::Spi))
                }
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            };
            self.cs.set_high();
            if let Some(result) = result {
                return result;
            }
            Timer::after_millis(1).await;
        }
        Err(Error::NotReady)
    }

    /// Reads the pending packet
    async fn read_packet(&mut self) -> Result<Packet, Error<B::Error>> {
        self.cs.set_low();
        let result = self.read_selected().await;
        self.cs.set_high();
        result
    }

    /// Reads the pending packet with chip select asserted
    async fn read_selected(&mut self) -> Result<Packet, Error<B::Error>> {
        let status = self.header(SPI_READ_HEADER).await?;
        if !status.ready || status.read_len == 0 {
            return Err(Error::NotReady);
        }
        let len = usize::from(status.read_len).min(MAX_PACKET_LEN);
        let mut buffer = [0xFF; MAX_PACKET_LEN];
        self.spi
            .transfer_in_place(&mut buffer[..len])
            .await
            .map_err(Error::Spi)?;
        Packet::from_slice(&buffer[..len]).map_err(|_| Error::Malformed)
    }

    /// Waits for the interrupt line and returns the next parseable event
    async fn next_hci_event(&mut self) -> Result<HciEvent, Error<B::Error>> {
        loop {
            self.irq.wait_for_high().await;
            match self.read_packet().await {
                Ok(packet) => {
                    if let Some(event) = hci::parse_event(&packet) {
                        return Ok(event);
                    }
                }
                Err(Error::NotReady) => Timer::after_micros(100).await,
                Err(e) => return Err(e),
            }
        }
    }

    /// Waits until the stack reports it is up
    async fn wait_for_boot(&mut self) -> Result<(), Error<B::Error>> {
        loop {
            if self.next_hci_event().await? == HciEvent::Initialized {
                return Ok(());
            }
        }
    }

    /// Waits for the completion of `opcode`
    async fn wait_for_completion(&mut self, opcode: u16) -> Result<ReturnParams, Error<B::Error>> {
        loop {
            match self.next_hci_event().await? {
                HciEvent::CommandComplete {
                    opcode: completed,
                    status,
                    params,
                } if completed == opcode => {
                    return if status == 0 {
                        Ok(params)
                    } else {
                        Err(Error::Command { opcode, status })
                    };
                }
                HciEvent::CommandStatus {
                    opcode: refused,
                    status,
                } if refused == opcode && status != 0 => {
                    return Err(Error::Command { opcode, status });
                }
                other => debug!("Ignoring event while waiting for {=u16:#x}: {}", opcode, Debug2Format(&other)),
            }
        }
    }

    /// Sends a command and returns its return parameters
    async fn command(&mut self, command: Result<Command, HciError>) -> Result<ReturnParams, Error<B::Error>> {
        let command = command.map_err(Error::Encode)?;
        self.write_packet(&command.packet).await?;
        with_timeout(COMMAND_TIMEOUT, self.wait_for_completion(command.opcode))
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Sends a command whose return parameters start with a handle
    async fn command_handle(&mut self, command: Result<Command, HciError>) -> Result<u16, Error<B::Error>> {
        let params = self.command(command).await?;
        hci::handle_at(&params, 0).ok_or(Error::Malformed)
    }

    /// GAP and GATT setup with the device name
    async fn init_gap(&mut self) -> Result<(), Error<B::Error>> {
        self.command(hci::gatt_init()).await?;
        let name = DEVICE_NAME.as_bytes();
        let gap = self.command(hci::gap_init_peripheral(name)).await?;
        let service = hci::handle_at(&gap, 0).ok_or(Error::Malformed)?;
        let name_characteristic = hci::handle_at(&gap, 2).ok_or(Error::Malformed)?;
        self.command(hci::update_characteristic_value(service, name_characteristic, name))
            .await?;
        Ok(())
    }

    /// LED service with the byte-wide actuator characteristic, initially on
    async fn add_led_service(&mut self) -> Result<(), Error<B::Error>> {
        let service = self
            .command_handle(hci::add_service(LED_SERVICE_UUID, SERVICE_RECORDS))
            .await?;
        let characteristic = self
            .command_handle(hci::add_characteristic(
                service,
                ACTUATOR_CHARACTERISTIC_UUID,
                1,
                PROPERTY_READ | PROPERTY_WRITE | PROPERTY_WRITE_WITHOUT_RESPONSE,
                true,
            ))
            .await?;
        self.command(hci::update_characteristic_value(service, characteristic, &[1]))
            .await?;
        // Writes are reported against the value attribute right after the declaration
        self.actuator_handle = Some(characteristic.wrapping_add(1));
        Ok(())
    }

    /// Device information service with the manufacturer name
    async fn add_device_information(&mut self) -> Result<(), Error<B::Error>> {
        let service = self
            .command_handle(hci::add_service(DEVICE_INFORMATION_SERVICE_UUID, SERVICE_RECORDS))
            .await?;
        let name = MANUFACTURER_NAME.as_bytes();
        let len = u8::try_from(name.len()).map_err(|_| Error::Encode(HciError::TooLong))?;
        let characteristic = self
            .command_handle(hci::add_characteristic(
                service,
                MANUFACTURER_NAME_UUID,
                len,
                PROPERTY_READ,
                false,
            ))
            .await?;
        self.command(hci::update_characteristic_value(service, characteristic, name))
            .await?;
        Ok(())
    }
}

impl<B: SpiBus> Radio for BlueNrg<B> {
    type Error = Error<B::Error>;

    async fn init(&mut self) -> Result<(), Self::Error> {
        self.hardware_reset().await;
        with_timeout(BOOT_TIMEOUT, self.wait_for_boot())
            .await
            .map_err(|_| Error::Timeout)??;
        self.init_gap().await?;
        self.add_led_service().await?;
        self.add_device_information().await
    }

    async fn start_advertising(&mut self, advertisement: &Advertisement) -> Result<(), Self::Error> {
        self.command(hci::set_discoverable(
            advertisement.interval_ms,
            advertisement.connectable,
        ))
        .await?;
        self.command(hci::update_advertising_data(&advertisement.payload))
            .await?;
        Ok(())
    }

    async fn next_event(&mut self) -> RadioEvent {
        loop {
            match self.next_hci_event().await {
                Ok(event) => {
                    if let Some(event) = hci::radio_event(event, self.actuator_handle) {
                        return event;
                    }
                }
                Err(e) => {
                    warn!("BlueNRG read failed: {}", Debug2Format(&e));
                    Timer::after_millis(10).await;
                }
            }
        }
    }
}
