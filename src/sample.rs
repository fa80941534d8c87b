//! Gaze record decoding and screen-coordinate mapping.
//!
//! Tracker records are short ASCII fragments carrying `NAME="VALUE"` pairs,
//! e.g. `<REC FPOGX="0.5000" FPOGY="0.7500" TIME="12.34" />`. This module
//! decodes them into named numeric fields and maps the normalized point of
//! gaze onto a pixel grid. Everything here is pure: no I/O, no state, safe to
//! call from any number of tasks without synchronization.

use crate::error::{AppResult, GazeError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

/// Matches `NAME="NUMBER"` with an optionally signed decimal value.
static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::unwrap_used)] // pattern is a compile-time constant
    Regex::new(r#"(\w+)="([-+]?\d*\.?\d+)""#).unwrap()
});

/// Normalized point-of-gaze field names used by pixel mapping.
pub const FIELD_FPOGX: &str = "FPOGX";
/// See [`FIELD_FPOGX`].
pub const FIELD_FPOGY: &str = "FPOGY";
/// Device timestamp field name.
pub const FIELD_TIME: &str = "TIME";

/// Extract every `NAME="NUMBER"` pair from a record.
///
/// A record carrying only some of the expected fields yields a partial map;
/// callers decide whether that is sufficient. A record with no recognizable
/// fields at all fails with [`GazeError::MalformedRecord`].
pub fn extract_fields(record: &str) -> AppResult<HashMap<String, f64>> {
    let mut fields = HashMap::new();
    for caps in FIELD_RE.captures_iter(record) {
        if let Ok(value) = caps[2].parse::<f64>() {
            fields.insert(caps[1].to_string(), value);
        }
    }
    if fields.is_empty() {
        return Err(GazeError::MalformedRecord);
    }
    Ok(fields)
}

/// A decoded tracker record: the raw framed text plus its numeric fields.
#[derive(Debug, Clone, PartialEq)]
pub struct GazeSample {
    /// The record exactly as framed off the wire.
    pub raw: String,
    /// Every `NAME="VALUE"` pair found in the record.
    pub fields: HashMap<String, f64>,
}

impl GazeSample {
    /// Decode a framed record. Fails if the record contains no fields.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let fields = extract_fields(raw)?;
        Ok(Self {
            raw: raw.to_string(),
            fields,
        })
    }

    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.fields.get(name).copied()
    }

    /// Normalized x point of gaze, if present.
    pub fn fpogx(&self) -> Option<f64> {
        self.get(FIELD_FPOGX)
    }

    /// Normalized y point of gaze, if present.
    pub fn fpogy(&self) -> Option<f64> {
        self.get(FIELD_FPOGY)
    }

    /// Device timestamp, if present.
    pub fn time(&self) -> Option<f64> {
        self.get(FIELD_TIME)
    }

    /// Map this sample's point of gaze onto a screen.
    ///
    /// Requires `FPOGX` and `FPOGY`; validates both before scaling.
    pub fn point_of_gaze(&self, screen: &ScreenMap) -> AppResult<(u32, u32)> {
        let x = self.fpogx().ok_or(GazeError::MissingField(FIELD_FPOGX))?;
        let y = self.fpogy().ok_or(GazeError::MissingField(FIELD_FPOGY))?;
        screen.to_pixels(x, y)
    }
}

/// Maps normalized `[0, 1]` gaze coordinates onto a pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenMap {
    width: u32,
    height: u32,
}

impl ScreenMap {
    /// Create a screen map. Dimensions must be positive.
    pub fn new(width: u32, height: u32) -> AppResult<Self> {
        if width == 0 || height == 0 {
            return Err(GazeError::Configuration(format!(
                "screen dimensions must be positive, got {}x{}",
                width, height
            )));
        }
        Ok(Self { width, height })
    }

    /// Screen width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Screen height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reject coordinates outside `[0, 1]` inclusive.
    ///
    /// Out-of-range values are surfaced as [`GazeError::Range`], never
    /// clamped.
    pub fn validate_range(x: f64, y: f64) -> AppResult<()> {
        if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
            return Err(GazeError::Range { x, y });
        }
        Ok(())
    }

    /// Convert normalized coordinates to pixel coordinates.
    ///
    /// `px = floor(x * width)`, `py = floor(y * height)`. Note that `x = 1.0`
    /// maps to `width`, one past the last column; callers drawing markers
    /// handle the boundary themselves, as the original capture scripts did.
    pub fn to_pixels(&self, x: f64, y: f64) -> AppResult<(u32, u32)> {
        Self::validate_range(x, y)?;
        let px = (x * f64::from(self.width)).floor() as u32;
        let py = (y * f64::from(self.height)).floor() as u32;
        Ok((px, py))
    }
}
