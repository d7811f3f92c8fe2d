//! Tidal volume → compression travel angle.
//!
//! Piecewise-linear interpolation over the calibration table in
//! [`VentConfig::volume_table`](crate::config::VentConfig).  Outside the
//! table the first (or last) two points are extended linearly.

use crate::config::VolumePoint;
use crate::error::ParamError;

/// Reject tables with fewer than two points or non-ascending volumes.
pub fn validate_table(table: &[VolumePoint]) -> Result<(), ParamError> {
    if table.len() < 2 {
        return Err(ParamError::InvalidVolumeTable);
    }
    let ascending = table.windows(2).all(|w| {
        w[0].volume_ml < w[1].volume_ml && w[0].angle_deg <= w[1].angle_deg
    });
    if ascending {
        Ok(())
    } else {
        Err(ParamError::InvalidVolumeTable)
    }
}

/// Travel angle (degrees) that delivers `volume_ml`.
pub fn interpolate_angle(table: &[VolumePoint], volume_ml: u16) -> Result<f32, ParamError> {
    validate_table(table)?;

    let last = table.len() - 1;
    // Segment whose upper point is the first at or above the volume,
    // clamped so extrapolation reuses the edge segments.
    let upper = table
        .iter()
        .position(|p| p.volume_ml >= volume_ml)
        .unwrap_or(last)
        .max(1);
    let (a, b) = (table[upper - 1], table[upper]);

    let span = f32::from(b.volume_ml - a.volume_ml);
    let offset = f32::from(volume_ml) - f32::from(a.volume_ml);
    Ok(a.angle_deg + (b.angle_deg - a.angle_deg) * offset / span)
}
