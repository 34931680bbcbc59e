//! Beacon telemetry frame codec.
//!
//! The sensor answers every poll with a fixed 18-byte block:
//!
//! | Offset | Size | Field | Type |
//! |---|---|---|---|
//! | 0  | 2 | id       | `u16` LE |
//! | 2  | 2 | status   | `u16` LE |
//! | 4  | 2 | pos_y    | `i16` LE, cm |
//! | 6  | 2 | pos_x    | `i16` LE, cm |
//! | 8  | 2 | pos_z    | `i16` LE, cm |
//! | 10 | 2 | vel_y    | `i16` LE, cm/s |
//! | 12 | 2 | vel_x    | `i16` LE, cm/s |
//! | 14 | 1 | snr      | `u8` |
//! | 15 | 1 | cl       | `u8` |
//! | 16 | 1 | sl       | `u8` |
//! | 17 | 1 | checksum | `u8`, sum of bytes 0..=16 mod 256 |
//!
//! # Example
//!
//! ```rust
//! use beacon_hal::frame::{decode_frame, RawFields, RawFrame};
//!
//! let frame = RawFrame::from_fields(&RawFields {
//!     id: 1,
//!     status: 7,
//!     pos_x: 100,
//!     ..RawFields::default()
//! });
//!
//! let report = decode_frame(&frame, 2.0, 1.0, chrono::Utc::now()).unwrap();
//! assert_eq!(report.id, 1);
//! assert!((report.pos_x - 2.0).abs() < 1e-6);
//! ```

use beacon_types::{BeaconError, BeaconReport};
use chrono::{DateTime, Utc};

/// Length of one beacon frame in bytes, checksum included.
pub const FRAME_LEN: usize = 18;

/// Offset of the checksum byte.
const CHECKSUM_OFFSET: usize = FRAME_LEN - 1;

/// Raw sensor units per metre (the sensor reports centimetres).
const RAW_UNITS_PER_METRE: f32 = 100.0;

/// One undecoded frame, exactly as read from the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawFrame(pub [u8; FRAME_LEN]);

/// Integer fields of a frame before unit conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawFields {
    pub id: u16,
    pub status: u16,
    pub pos_x: i16,
    pub pos_y: i16,
    pub pos_z: i16,
    pub vel_x: i16,
    pub vel_y: i16,
    pub snr: u8,
    pub cl: u8,
    pub sl: u8,
}

impl RawFrame {
    /// Encode `fields` into a frame with a matching checksum byte.
    pub fn from_fields(fields: &RawFields) -> Self {
        let mut bytes = [0u8; FRAME_LEN];
        bytes[0..2].copy_from_slice(&fields.id.to_le_bytes());
        bytes[2..4].copy_from_slice(&fields.status.to_le_bytes());
        bytes[4..6].copy_from_slice(&fields.pos_y.to_le_bytes());
        bytes[6..8].copy_from_slice(&fields.pos_x.to_le_bytes());
        bytes[8..10].copy_from_slice(&fields.pos_z.to_le_bytes());
        bytes[10..12].copy_from_slice(&fields.vel_y.to_le_bytes());
        bytes[12..14].copy_from_slice(&fields.vel_x.to_le_bytes());
        bytes[14] = fields.snr;
        bytes[15] = fields.cl;
        bytes[16] = fields.sl;
        bytes[CHECKSUM_OFFSET] = checksum(&bytes[..CHECKSUM_OFFSET]);
        Self(bytes)
    }

    /// Parse the integer fields.  Does not look at the checksum.
    pub fn fields(&self) -> RawFields {
        let b = &self.0;
        RawFields {
            id: u16::from_le_bytes([b[0], b[1]]),
            status: u16::from_le_bytes([b[2], b[3]]),
            pos_y: i16::from_le_bytes([b[4], b[5]]),
            pos_x: i16::from_le_bytes([b[6], b[7]]),
            pos_z: i16::from_le_bytes([b[8], b[9]]),
            vel_y: i16::from_le_bytes([b[10], b[11]]),
            vel_x: i16::from_le_bytes([b[12], b[13]]),
            snr: b[14],
            cl: b[15],
            sl: b[16],
        }
    }

    /// The checksum byte carried by the frame.
    pub fn checksum(&self) -> u8 {
        self.0[CHECKSUM_OFFSET]
    }

    /// The checksum computed over the payload bytes.
    pub fn computed_checksum(&self) -> u8 {
        checksum(&self.0[..CHECKSUM_OFFSET])
    }
}

impl From<[u8; FRAME_LEN]> for RawFrame {
    fn from(bytes: [u8; FRAME_LEN]) -> Self {
        Self(bytes)
    }
}

/// 8-bit additive checksum.
pub fn checksum(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Validate `frame` and convert it into a [`BeaconReport`].
///
/// Positions and velocities are converted from centimetres to metres; the x
/// and y axes are then multiplied by `scale_x` / `scale_y`.  The z axis is
/// never scaled.  No range checks are applied.
///
/// # Errors
///
/// Returns [`BeaconError::ChecksumMismatch`] when the checksum byte does not
/// match the payload.  Nothing from the frame is returned in that case.
pub fn decode_frame(
    frame: &RawFrame,
    scale_x: f32,
    scale_y: f32,
    timestamp: DateTime<Utc>,
) -> Result<BeaconReport, BeaconError> {
    let expected = frame.checksum();
    let computed = frame.computed_checksum();
    if expected != computed {
        return Err(BeaconError::ChecksumMismatch { expected, computed });
    }

    let raw = frame.fields();
    Ok(BeaconReport {
        timestamp,
        id: raw.id,
        status: raw.status,
        pos_x: to_metres(raw.pos_x) * scale_x,
        pos_y: to_metres(raw.pos_y) * scale_y,
        pos_z: to_metres(raw.pos_z),
        vel_x: to_metres(raw.vel_x) * scale_x,
        vel_y: to_metres(raw.vel_y) * scale_y,
        snr: raw.snr,
        cl: raw.cl,
        sl: raw.sl,
    })
}

fn to_metres(raw: i16) -> f32 {
    f32::from(raw) / RAW_UNITS_PER_METRE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    fn sample_fields() -> RawFields {
        RawFields {
            id: 0x1234,
            status: 7,
            pos_x: -250,
            pos_y: 1234,
            pos_z: 800,
            vel_x: 15,
            vel_y: -40,
            snr: 42,
            cl: 200,
            sl: 17,
        }
    }

    #[test]
    fn scenario_frame_decodes_with_scale() {
        let mut bytes = [
            0x01, 0x00, 0x07, 0x00, 0x00, 0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
        ];
        bytes[17] = checksum(&bytes[..17]);
        assert_eq!(bytes[17], 0x6C);

        let report = decode_frame(&RawFrame(bytes), 2.0, 1.0, now()).unwrap();
        assert_eq!(report.id, 1);
        assert_eq!(report.status, 7);
        assert!((report.pos_x - 2.0).abs() < 1e-6);
        assert_eq!(report.pos_y, 0.0);
        assert_eq!(report.pos_z, 0.0);
    }

    #[test]
    fn little_endian_offsets() {
        let frame = RawFrame::from_fields(&sample_fields());
        let b = frame.0;
        assert_eq!(&b[0..2], &[0x34, 0x12]);
        // pos_y precedes pos_x on the wire.
        assert_eq!(i16::from_le_bytes([b[4], b[5]]), 1234);
        assert_eq!(i16::from_le_bytes([b[6], b[7]]), -250);
        assert_eq!(i16::from_le_bytes([b[10], b[11]]), -40);
        assert_eq!(i16::from_le_bytes([b[12], b[13]]), 15);
        assert_eq!(&b[14..17], &[42, 200, 17]);
    }

    #[test]
    fn well_formed_frames_decode_and_checksum_reconstructs() {
        let cases = [
            RawFields::default(),
            sample_fields(),
            RawFields {
                id: u16::MAX,
                status: u16::MAX,
                pos_x: i16::MIN,
                pos_y: i16::MAX,
                pos_z: i16::MIN,
                vel_x: i16::MAX,
                vel_y: i16::MIN,
                snr: u8::MAX,
                cl: u8::MAX,
                sl: u8::MAX,
            },
        ];
        for fields in cases {
            let frame = RawFrame::from_fields(&fields);
            assert!(decode_frame(&frame, 1.0, 1.0, now()).is_ok());

            let rebuilt = RawFrame::from_fields(&frame.fields());
            assert_eq!(rebuilt.checksum(), frame.checksum());
            assert_eq!(frame.fields(), fields);
        }
    }

    #[test]
    fn any_single_corrupted_byte_is_rejected() {
        let good = RawFrame::from_fields(&sample_fields());
        for i in 0..FRAME_LEN {
            let mut bytes = good.0;
            bytes[i] = bytes[i].wrapping_add(1);
            let result = decode_frame(&RawFrame(bytes), 1.0, 1.0, now());
            assert!(
                matches!(result, Err(BeaconError::ChecksumMismatch { .. })),
                "byte {i} corruption was accepted"
            );
        }
    }

    #[test]
    fn checksum_wraps_modulo_256() {
        assert_eq!(checksum(&[0xFF, 0x02]), 0x01);
        assert_eq!(checksum(&[0x80; 17]), 0x80);
        assert_eq!(checksum(&[]), 0);
    }

    #[test]
    fn unit_conversion_and_axis_scaling() {
        let frame = RawFrame::from_fields(&sample_fields());

        let unscaled = decode_frame(&frame, 1.0, 1.0, now()).unwrap();
        assert!((unscaled.pos_x - (-2.5)).abs() < 1e-6);
        assert!((unscaled.pos_y - 12.34).abs() < 1e-5);
        assert!((unscaled.pos_z - 8.0).abs() < 1e-6);
        assert!((unscaled.vel_x - 0.15).abs() < 1e-6);
        assert!((unscaled.vel_y - (-0.4)).abs() < 1e-6);

        let scaled = decode_frame(&frame, 2.0, -0.5, now()).unwrap();
        assert!((scaled.pos_x - (-5.0)).abs() < 1e-6);
        assert!((scaled.pos_y - (-6.17)).abs() < 1e-5);
        assert!((scaled.vel_x - 0.3).abs() < 1e-6);
        assert!((scaled.vel_y - 0.2).abs() < 1e-6);
        // z is never scaled.
        assert_eq!(scaled.pos_z, unscaled.pos_z);
    }

    #[test]
    fn quality_fields_copied_verbatim() {
        let frame = RawFrame::from_fields(&sample_fields());
        let report = decode_frame(&frame, 3.0, 3.0, now()).unwrap();
        assert_eq!(report.id, 0x1234);
        assert_eq!(report.status, 7);
        assert_eq!((report.snr, report.cl, report.sl), (42, 200, 17));
    }

    #[test]
    fn decode_is_idempotent() {
        let frame = RawFrame::from_fields(&sample_fields());
        let ts = now();
        let a = decode_frame(&frame, 1.7, 0.3, ts).unwrap();
        let b = decode_frame(&frame, 1.7, 0.3, ts).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.pos_x.to_bits(), b.pos_x.to_bits());
        assert_eq!(a.vel_y.to_bits(), b.vel_y.to_bits());
    }
}
