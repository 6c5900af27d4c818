//! Configuration key database.
//!
//! Named keys with their numeric IDs and value kinds, covering the groups
//! this crate programs: time mode (CFG-TMODE-*), per-interface protocol
//! output toggles (CFG-*OUTPROT-*) and RTCM output message rates
//! (CFG-MSGOUT-RTCM_3X_*). The storage size of a key is also encoded in
//! bits 28..30 of its ID, which is what the VALGET decoder falls back to
//! for keys not present here.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Wire representation of a configuration value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// L: single-bit logical, stored in one byte
    Bool,
    U1,
    I1,
    U2,
    I2,
    U4,
    I4,
    U8,
}

impl ValueKind {
    pub fn wire_size(&self) -> usize {
        match self {
            ValueKind::Bool | ValueKind::U1 | ValueKind::I1 => 1,
            ValueKind::U2 | ValueKind::I2 => 2,
            ValueKind::U4 | ValueKind::I4 => 4,
            ValueKind::U8 => 8,
        }
    }
}

/// One entry of the key database.
#[derive(Debug, PartialEq, Eq)]
pub struct CfgKey {
    pub name: &'static str,
    pub id: u32,
    pub kind: ValueKind,
}

/// Storage size in bytes derived from the key ID alone (bits 28..30).
pub fn storage_size_from_id(id: u32) -> usize {
    match (id >> 28) & 0x7 {
        0x1 | 0x2 => 1,
        0x3 => 2,
        0x4 => 4,
        0x5 => 8,
        _ => 0,
    }
}

macro_rules! cfg_keys {
    ($( $const_name:ident = ($name:literal, $id:literal, $kind:ident); )*) => {
        $(
            pub const $const_name: CfgKey = CfgKey {
                name: $name,
                id: $id,
                kind: ValueKind::$kind,
            };
        )*

        /// Every key this database knows about.
        pub const ALL_KEYS: &[&CfgKey] = &[ $( &$const_name, )* ];
    };
}

cfg_keys! {
    // Time mode (receiver position / survey-in block)
    TMODE_MODE           = ("CFG-TMODE-MODE",           0x2003_0001, U1);
    TMODE_POS_TYPE       = ("CFG-TMODE-POS_TYPE",       0x2003_0002, U1);
    TMODE_ECEF_X         = ("CFG-TMODE-ECEF_X",         0x4003_0003, I4);
    TMODE_ECEF_Y         = ("CFG-TMODE-ECEF_Y",         0x4003_0004, I4);
    TMODE_ECEF_Z         = ("CFG-TMODE-ECEF_Z",         0x4003_0005, I4);
    TMODE_ECEF_X_HP      = ("CFG-TMODE-ECEF_X_HP",      0x2003_0006, I1);
    TMODE_ECEF_Y_HP      = ("CFG-TMODE-ECEF_Y_HP",      0x2003_0007, I1);
    TMODE_ECEF_Z_HP      = ("CFG-TMODE-ECEF_Z_HP",      0x2003_0008, I1);
    TMODE_LAT            = ("CFG-TMODE-LAT",            0x4003_0009, I4);
    TMODE_LON            = ("CFG-TMODE-LON",            0x4003_000A, I4);
    TMODE_HEIGHT         = ("CFG-TMODE-HEIGHT",         0x4003_000B, I4);
    TMODE_LAT_HP         = ("CFG-TMODE-LAT_HP",         0x2003_000C, I1);
    TMODE_LON_HP         = ("CFG-TMODE-LON_HP",         0x2003_000D, I1);
    TMODE_HEIGHT_HP      = ("CFG-TMODE-HEIGHT_HP",      0x2003_000E, I1);
    TMODE_FIXED_POS_ACC  = ("CFG-TMODE-FIXED_POS_ACC",  0x4003_000F, U4);
    TMODE_SVIN_MIN_DUR   = ("CFG-TMODE-SVIN_MIN_DUR",   0x4003_0010, U4);
    TMODE_SVIN_ACC_LIMIT = ("CFG-TMODE-SVIN_ACC_LIMIT", 0x4003_0011, U4);

    // Protocol output toggles per interface
    I2COUTPROT_UBX       = ("CFG-I2COUTPROT-UBX",       0x1072_0001, Bool);
    I2COUTPROT_NMEA      = ("CFG-I2COUTPROT-NMEA",      0x1072_0002, Bool);
    I2COUTPROT_RTCM3X    = ("CFG-I2COUTPROT-RTCM3X",    0x1072_0004, Bool);
    UART1OUTPROT_UBX     = ("CFG-UART1OUTPROT-UBX",     0x1074_0001, Bool);
    UART1OUTPROT_NMEA    = ("CFG-UART1OUTPROT-NMEA",    0x1074_0002, Bool);
    UART1OUTPROT_RTCM3X  = ("CFG-UART1OUTPROT-RTCM3X",  0x1074_0004, Bool);
    UART2OUTPROT_UBX     = ("CFG-UART2OUTPROT-UBX",     0x1076_0001, Bool);
    UART2OUTPROT_NMEA    = ("CFG-UART2OUTPROT-NMEA",    0x1076_0002, Bool);
    UART2OUTPROT_RTCM3X  = ("CFG-UART2OUTPROT-RTCM3X",  0x1076_0004, Bool);
    USBOUTPROT_UBX       = ("CFG-USBOUTPROT-UBX",       0x1078_0001, Bool);
    USBOUTPROT_NMEA      = ("CFG-USBOUTPROT-NMEA",      0x1078_0002, Bool);
    USBOUTPROT_RTCM3X    = ("CFG-USBOUTPROT-RTCM3X",    0x1078_0004, Bool);
    SPIOUTPROT_UBX       = ("CFG-SPIOUTPROT-UBX",       0x107A_0001, Bool);
    SPIOUTPROT_NMEA      = ("CFG-SPIOUTPROT-NMEA",      0x107A_0002, Bool);
    SPIOUTPROT_RTCM3X    = ("CFG-SPIOUTPROT-RTCM3X",    0x107A_0004, Bool);

    // RTCM output message rates (base-station correction stream)
    MSGOUT_RTCM_1005_UART1 = ("CFG-MSGOUT-RTCM_3X_TYPE1005_UART1", 0x2091_02BE, U1);
    MSGOUT_RTCM_1005_USB   = ("CFG-MSGOUT-RTCM_3X_TYPE1005_USB",   0x2091_02C0, U1);
    MSGOUT_RTCM_1074_UART1 = ("CFG-MSGOUT-RTCM_3X_TYPE1074_UART1", 0x2091_035F, U1);
    MSGOUT_RTCM_1074_USB   = ("CFG-MSGOUT-RTCM_3X_TYPE1074_USB",   0x2091_0361, U1);
    MSGOUT_RTCM_1084_UART1 = ("CFG-MSGOUT-RTCM_3X_TYPE1084_UART1", 0x2091_0364, U1);
    MSGOUT_RTCM_1084_USB   = ("CFG-MSGOUT-RTCM_3X_TYPE1084_USB",   0x2091_0366, U1);
    MSGOUT_RTCM_1094_UART1 = ("CFG-MSGOUT-RTCM_3X_TYPE1094_UART1", 0x2091_0369, U1);
    MSGOUT_RTCM_1094_USB   = ("CFG-MSGOUT-RTCM_3X_TYPE1094_USB",   0x2091_036B, U1);
    MSGOUT_RTCM_1124_UART1 = ("CFG-MSGOUT-RTCM_3X_TYPE1124_UART1", 0x2091_036E, U1);
    MSGOUT_RTCM_1124_USB   = ("CFG-MSGOUT-RTCM_3X_TYPE1124_USB",   0x2091_0370, U1);
    MSGOUT_RTCM_1230_UART1 = ("CFG-MSGOUT-RTCM_3X_TYPE1230_UART1", 0x2091_0304, U1);
    MSGOUT_RTCM_1230_USB   = ("CFG-MSGOUT-RTCM_3X_TYPE1230_USB",   0x2091_0306, U1);
}

fn by_name() -> &'static HashMap<&'static str, &'static CfgKey> {
    static MAP: OnceLock<HashMap<&'static str, &'static CfgKey>> = OnceLock::new();
    MAP.get_or_init(|| ALL_KEYS.iter().map(|k| (k.name, *k)).collect())
}

fn by_id() -> &'static HashMap<u32, &'static CfgKey> {
    static MAP: OnceLock<HashMap<u32, &'static CfgKey>> = OnceLock::new();
    MAP.get_or_init(|| ALL_KEYS.iter().map(|k| (k.id, *k)).collect())
}

/// Resolve a key by its documented name.
pub fn lookup(name: &str) -> Option<&'static CfgKey> {
    by_name().get(name).copied()
}

/// Resolve a key by its numeric ID (used when decoding VALGET responses).
pub fn lookup_id(id: u32) -> Option<&'static CfgKey> {
    by_id().get(&id).copied()
}
