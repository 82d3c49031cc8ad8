//! Standard Bluetooth SIG service and characteristic UUIDs used by the
//! publish surface.

use uuid::Uuid;

/// Fitness Machine Service UUID (0x1826)
pub const FTMS_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1826_0000_1000_8000_0080_5f9b_34fb);

/// Rower Data Characteristic UUID (0x2AD1)
pub const ROWER_DATA_UUID: Uuid = Uuid::from_u128(0x0000_2ad1_0000_1000_8000_0080_5f9b_34fb);

/// Fitness Machine Feature UUID (0x2ACC)
pub const FTMS_FEATURE_UUID: Uuid = Uuid::from_u128(0x0000_2acc_0000_1000_8000_0080_5f9b_34fb);

/// Fitness Machine Control Point UUID (0x2AD9)
pub const FTMS_CONTROL_POINT_UUID: Uuid =
    Uuid::from_u128(0x0000_2ad9_0000_1000_8000_0080_5f9b_34fb);

/// Heart Rate Service UUID (0x180D)
pub const HEART_RATE_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_180d_0000_1000_8000_0080_5f9b_34fb);

/// Heart Rate Measurement UUID (0x2A37)
pub const HEART_RATE_MEASUREMENT_UUID: Uuid =
    Uuid::from_u128(0x0000_2a37_0000_1000_8000_0080_5f9b_34fb);

/// Device Information Service UUID (0x180A)
pub const DEVICE_INFORMATION_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_180a_0000_1000_8000_0080_5f9b_34fb);

/// Manufacturer Name String UUID (0x2A29)
pub const MANUFACTURER_NAME_UUID: Uuid =
    Uuid::from_u128(0x0000_2a29_0000_1000_8000_0080_5f9b_34fb);

/// Model Number String UUID (0x2A24)
pub const MODEL_NUMBER_UUID: Uuid = Uuid::from_u128(0x0000_2a24_0000_1000_8000_0080_5f9b_34fb);

/// Serial Number String UUID (0x2A25)
pub const SERIAL_NUMBER_UUID: Uuid = Uuid::from_u128(0x0000_2a25_0000_1000_8000_0080_5f9b_34fb);

/// Hardware Revision String UUID (0x2A27)
pub const HARDWARE_REVISION_UUID: Uuid =
    Uuid::from_u128(0x0000_2a27_0000_1000_8000_0080_5f9b_34fb);

/// Firmware Revision String UUID (0x2A26)
pub const FIRMWARE_REVISION_UUID: Uuid =
    Uuid::from_u128(0x0000_2a26_0000_1000_8000_0080_5f9b_34fb);

/// Software Revision String UUID (0x2A28)
pub const SOFTWARE_REVISION_UUID: Uuid =
    Uuid::from_u128(0x0000_2a28_0000_1000_8000_0080_5f9b_34fb);
