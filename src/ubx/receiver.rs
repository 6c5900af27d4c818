//! Typed views over the configuration transport.
//!
//! Thin wrappers that turn the raw set/poll key protocol into the handful
//! of operations a base station or rover actually performs: reading and
//! setting the time-mode block, pinning a fixed position, and switching
//! protocol output on or off per interface. Survey-in sequencing and other
//! mode orchestration live above this crate.

use crate::error::{MuxError, Result};
use crate::framing::Protocol;
use crate::ubx::keys::{self, CfgKey};
use crate::ubx::transport::{CfgTransport, KeyValue, MemoryLayer, PollLayer};
use crate::ubx::value::{merge_degrees, merge_meters, split_degrees, split_meters, CfgValue};
use std::collections::HashMap;
use std::time::Duration;

/// Receiver time mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeMode {
    Disabled,
    SurveyIn,
    Fixed,
}

impl TimeMode {
    fn code(&self) -> u8 {
        match self {
            TimeMode::Disabled => 0,
            TimeMode::SurveyIn => 1,
            TimeMode::Fixed => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(TimeMode::Disabled),
            1 => Some(TimeMode::SurveyIn),
            2 => Some(TimeMode::Fixed),
            _ => None,
        }
    }
}

/// Coordinate system of a fixed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionType {
    Ecef,
    Llh,
}

/// Fixed position in ECEF coordinates, meters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EcefPosition {
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
}

/// Fixed position in geodetic coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LlhPosition {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub height_m: f64,
}

/// Decoded CFG-TMODE block. Only the coordinate set matching `pos_type`
/// is populated, mirroring how the receiver interprets the block.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeModeSettings {
    pub mode: TimeMode,
    pub pos_type: PositionType,
    pub ecef: Option<EcefPosition>,
    pub llh: Option<LlhPosition>,
    /// Fixed-position accuracy estimate, millimeters
    pub fixed_pos_acc_mm: f64,
    /// Survey-in minimum duration, seconds
    pub svin_min_dur_s: u32,
    /// Survey-in accuracy limit, millimeters
    pub svin_acc_limit_mm: f64,
}

/// Serial interfaces with per-protocol output toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interface {
    I2c,
    Uart1,
    Uart2,
    Usb,
    Spi,
}

impl Interface {
    fn outprot_key(&self, protocol: Protocol) -> &'static CfgKey {
        match (self, protocol) {
            (Interface::I2c, Protocol::Ubx) => &keys::I2COUTPROT_UBX,
            (Interface::I2c, Protocol::Nmea) => &keys::I2COUTPROT_NMEA,
            (Interface::I2c, Protocol::Rtcm3) => &keys::I2COUTPROT_RTCM3X,
            (Interface::Uart1, Protocol::Ubx) => &keys::UART1OUTPROT_UBX,
            (Interface::Uart1, Protocol::Nmea) => &keys::UART1OUTPROT_NMEA,
            (Interface::Uart1, Protocol::Rtcm3) => &keys::UART1OUTPROT_RTCM3X,
            (Interface::Uart2, Protocol::Ubx) => &keys::UART2OUTPROT_UBX,
            (Interface::Uart2, Protocol::Nmea) => &keys::UART2OUTPROT_NMEA,
            (Interface::Uart2, Protocol::Rtcm3) => &keys::UART2OUTPROT_RTCM3X,
            (Interface::Usb, Protocol::Ubx) => &keys::USBOUTPROT_UBX,
            (Interface::Usb, Protocol::Nmea) => &keys::USBOUTPROT_NMEA,
            (Interface::Usb, Protocol::Rtcm3) => &keys::USBOUTPROT_RTCM3X,
            (Interface::Spi, Protocol::Ubx) => &keys::SPIOUTPROT_UBX,
            (Interface::Spi, Protocol::Nmea) => &keys::SPIOUTPROT_NMEA,
            (Interface::Spi, Protocol::Rtcm3) => &keys::SPIOUTPROT_RTCM3X,
        }
    }
}

const TMODE_POLL_KEYS: &[&CfgKey] = &[
    &keys::TMODE_MODE,
    &keys::TMODE_POS_TYPE,
    &keys::TMODE_ECEF_X,
    &keys::TMODE_ECEF_Y,
    &keys::TMODE_ECEF_Z,
    &keys::TMODE_ECEF_X_HP,
    &keys::TMODE_ECEF_Y_HP,
    &keys::TMODE_ECEF_Z_HP,
    &keys::TMODE_LAT,
    &keys::TMODE_LON,
    &keys::TMODE_HEIGHT,
    &keys::TMODE_LAT_HP,
    &keys::TMODE_LON_HP,
    &keys::TMODE_HEIGHT_HP,
    &keys::TMODE_FIXED_POS_ACC,
    &keys::TMODE_SVIN_MIN_DUR,
    &keys::TMODE_SVIN_ACC_LIMIT,
];

/// Typed receiver operations over a [`CfgTransport`].
#[derive(Clone)]
pub struct ReceiverControl {
    transport: CfgTransport,
}

impl ReceiverControl {
    pub fn new(transport: CfgTransport) -> Self {
        Self { transport }
    }

    /// Reads and decodes the whole time-mode block from `layer`.
    pub async fn time_mode_settings(
        &self,
        layer: PollLayer,
        timeout: Duration,
    ) -> Result<TimeModeSettings> {
        let values = self
            .transport
            .poll_keys(layer, 0, TMODE_POLL_KEYS, timeout)
            .await?;
        decode_time_mode(&values)
    }

    /// Sets the receiver time mode (disabled / survey-in / fixed).
    pub async fn set_time_mode(
        &self,
        mode: TimeMode,
        layer: MemoryLayer,
        timeout: Duration,
    ) -> Result<()> {
        self.transport
            .set_keys(
                layer,
                0,
                &[(&keys::TMODE_MODE, CfgValue::U1(mode.code()))],
                timeout,
            )
            .await
    }

    /// Pins a fixed geodetic position (switches the block to LLH).
    ///
    /// Coordinates go through the two-part split encoding; values finer
    /// than its grid are rejected before anything is written.
    pub async fn set_fixed_position_llh(
        &self,
        position: LlhPosition,
        accuracy_mm: f64,
        layer: MemoryLayer,
        timeout: Duration,
    ) -> Result<()> {
        let lat = split_degrees(position.lat_deg)?;
        let lon = split_degrees(position.lon_deg)?;
        let height = split_meters(position.height_m)?;
        let acc = (accuracy_mm * 10.0).round() as u32; // 0.1 mm units

        self.transport
            .set_keys(
                layer,
                0,
                &[
                    (&keys::TMODE_MODE, CfgValue::U1(TimeMode::Fixed.code())),
                    (&keys::TMODE_POS_TYPE, CfgValue::U1(1)),
                    (&keys::TMODE_LAT, CfgValue::I4(lat.coarse)),
                    (&keys::TMODE_LAT_HP, CfgValue::I1(lat.hp)),
                    (&keys::TMODE_LON, CfgValue::I4(lon.coarse)),
                    (&keys::TMODE_LON_HP, CfgValue::I1(lon.hp)),
                    (&keys::TMODE_HEIGHT, CfgValue::I4(height.coarse)),
                    (&keys::TMODE_HEIGHT_HP, CfgValue::I1(height.hp)),
                    (&keys::TMODE_FIXED_POS_ACC, CfgValue::U4(acc)),
                ],
                timeout,
            )
            .await
    }

    /// Pins a fixed ECEF position (switches the block to ECEF).
    pub async fn set_fixed_position_ecef(
        &self,
        position: EcefPosition,
        accuracy_mm: f64,
        layer: MemoryLayer,
        timeout: Duration,
    ) -> Result<()> {
        let x = split_meters(position.x_m)?;
        let y = split_meters(position.y_m)?;
        let z = split_meters(position.z_m)?;
        let acc = (accuracy_mm * 10.0).round() as u32;

        self.transport
            .set_keys(
                layer,
                0,
                &[
                    (&keys::TMODE_MODE, CfgValue::U1(TimeMode::Fixed.code())),
                    (&keys::TMODE_POS_TYPE, CfgValue::U1(0)),
                    (&keys::TMODE_ECEF_X, CfgValue::I4(x.coarse)),
                    (&keys::TMODE_ECEF_X_HP, CfgValue::I1(x.hp)),
                    (&keys::TMODE_ECEF_Y, CfgValue::I4(y.coarse)),
                    (&keys::TMODE_ECEF_Y_HP, CfgValue::I1(y.hp)),
                    (&keys::TMODE_ECEF_Z, CfgValue::I4(z.coarse)),
                    (&keys::TMODE_ECEF_Z_HP, CfgValue::I1(z.hp)),
                    (&keys::TMODE_FIXED_POS_ACC, CfgValue::U4(acc)),
                ],
                timeout,
            )
            .await
    }

    /// Enables or disables one protocol's output on one interface.
    pub async fn set_protocol_output(
        &self,
        interface: Interface,
        protocol: Protocol,
        enabled: bool,
        layer: MemoryLayer,
        timeout: Duration,
    ) -> Result<()> {
        self.transport
            .set_keys(
                layer,
                0,
                &[(interface.outprot_key(protocol), CfgValue::Bool(enabled))],
                timeout,
            )
            .await
    }

    /// Sets an output message rate key (messages per navigation solution);
    /// rate 0 disables the message.
    pub async fn set_message_rate(
        &self,
        key: &'static CfgKey,
        rate: u8,
        layer: MemoryLayer,
        timeout: Duration,
    ) -> Result<()> {
        self.transport
            .set_keys(layer, 0, &[(key, CfgValue::U1(rate))], timeout)
            .await
    }

    /// Sets a single key resolved by its documented name
    /// (e.g. `"CFG-UART1OUTPROT-RTCM3X"`).
    pub async fn set_key_by_name(
        &self,
        name: &str,
        value: CfgValue,
        layer: MemoryLayer,
        timeout: Duration,
    ) -> Result<()> {
        let key = keys::lookup(name).ok_or_else(|| MuxError::unknown_key(name))?;
        self.transport
            .set_keys(layer, 0, &[(key, value)], timeout)
            .await
    }
}

fn decode_time_mode(values: &[KeyValue]) -> Result<TimeModeSettings> {
    let map: HashMap<u32, CfgValue> = values.iter().map(|kv| (kv.id, kv.value)).collect();

    let missing =
        |key: &CfgKey| MuxError::config(format!("time-mode poll missing {}", key.name));
    let u1 = |key: &'static CfgKey| match map.get(&key.id) {
        Some(CfgValue::U1(v)) => Ok(*v),
        _ => Err(missing(key)),
    };
    let u4 = |key: &'static CfgKey| match map.get(&key.id) {
        Some(CfgValue::U4(v)) => Ok(*v),
        _ => Err(missing(key)),
    };
    let i4 = |key: &'static CfgKey| match map.get(&key.id) {
        Some(CfgValue::I4(v)) => Ok(*v),
        _ => Err(missing(key)),
    };
    let i1 = |key: &'static CfgKey| match map.get(&key.id) {
        Some(CfgValue::I1(v)) => Ok(*v),
        _ => Err(missing(key)),
    };

    let mode_code = u1(&keys::TMODE_MODE)?;
    let mode = TimeMode::from_code(mode_code)
        .ok_or_else(|| MuxError::config(format!("unknown time mode {}", mode_code)))?;
    let pos_type = if u1(&keys::TMODE_POS_TYPE)? == 0 {
        PositionType::Ecef
    } else {
        PositionType::Llh
    };

    let (ecef, llh) = match pos_type {
        PositionType::Ecef => (
            Some(EcefPosition {
                x_m: merge_meters(i4(&keys::TMODE_ECEF_X)?, i1(&keys::TMODE_ECEF_X_HP)?),
                y_m: merge_meters(i4(&keys::TMODE_ECEF_Y)?, i1(&keys::TMODE_ECEF_Y_HP)?),
                z_m: merge_meters(i4(&keys::TMODE_ECEF_Z)?, i1(&keys::TMODE_ECEF_Z_HP)?),
            }),
            None,
        ),
        PositionType::Llh => (
            None,
            Some(LlhPosition {
                lat_deg: merge_degrees(i4(&keys::TMODE_LAT)?, i1(&keys::TMODE_LAT_HP)?),
                lon_deg: merge_degrees(i4(&keys::TMODE_LON)?, i1(&keys::TMODE_LON_HP)?),
                height_m: merge_meters(i4(&keys::TMODE_HEIGHT)?, i1(&keys::TMODE_HEIGHT_HP)?),
            }),
        ),
    };

    Ok(TimeModeSettings {
        mode,
        pos_type,
        ecef,
        llh,
        fixed_pos_acc_mm: u4(&keys::TMODE_FIXED_POS_ACC)? as f64 / 10.0,
        svin_min_dur_s: u4(&keys::TMODE_SVIN_MIN_DUR)?,
        svin_acc_limit_mm: u4(&keys::TMODE_SVIN_ACC_LIMIT)? as f64 / 10.0,
    })
}
