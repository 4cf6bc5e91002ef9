//! Length units and the coordinate number codec.
//!
//! Grounded in the teacher's `Format`/`internalize_coordinate_from_span`
//! (`gerber_file.rs`) for the general shape of string-based coordinate
//! decoding, generalised to the full parameterised contract.

use crate::error::{ExcellonError, GerberError, SourcePosition};

pub const MILLIMETERS_PER_INCH: f64 = 25.4;

/// One of the two length unit singletons used throughout the object model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LengthUnit {
    Inch,
    Millimeter,
}

impl LengthUnit {
    /// This unit's value of one unit expressed in millimeters.
    pub fn factor_to_mm(self) -> f64 {
        match self {
            LengthUnit::Inch => MILLIMETERS_PER_INCH,
            LengthUnit::Millimeter => 1.0,
        }
    }

    pub fn shorthand(self) -> &'static str {
        match self {
            LengthUnit::Inch => "in",
            LengthUnit::Millimeter => "mm",
        }
    }

    /// Convert `value`, expressed in `self`, into `to`. A missing unit on
    /// either side is a no-op (spec §3.2: "missing unit ⇒ no-op
    /// conversions").
    pub fn convert(self, value: f64, to: LengthUnit) -> f64 {
        if self == to {
            return value;
        }
        value * self.factor_to_mm() / to.factor_to_mm()
    }
}

/// Coordinate notation: whether successive coordinates are absolute
/// positions or deltas from the current point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notation {
    Absolute,
    Incremental,
}

/// Zero-suppression convention for fixed-point coordinate strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZeroSuppression {
    Leading,
    Trailing,
    None,
}

/// `(integer_digits, fractional_digits)`, either of which may be unknown
/// until discovered from an `FS`/dialect comment/sidecar file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NumberFormat {
    pub integer_digits: Option<u32>,
    pub fractional_digits: Option<u32>,
}

impl NumberFormat {
    pub fn new(integer_digits: u32, fractional_digits: u32) -> Self {
        Self {
            integer_digits: Some(integer_digits),
            fractional_digits: Some(fractional_digits),
        }
    }

    pub fn is_known(&self) -> bool {
        self.integer_digits.is_some() && self.fractional_digits.is_some()
    }
}

/// File-wide coordinate interpretation settings (spec §3.1).
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSettings {
    pub unit: Option<LengthUnit>,
    pub notation: Option<Notation>,
    pub zero_suppression: Option<ZeroSuppression>,
    pub number_format: NumberFormat,
}

impl FileSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a coordinate string per spec §4.1's five-step contract.
    pub fn parse_coordinate(&self, s: &str, position: SourcePosition) -> Result<f64, GerberError> {
        parse_coordinate_value(
            s,
            self.number_format,
            self.zero_suppression.unwrap_or(ZeroSuppression::None),
            position,
        )
        .map_err(|reason| GerberError::Syntax {
            position,
            text: s.to_string(),
            reason,
        })
    }

    pub fn parse_coordinate_excellon(&self, s: &str, position: SourcePosition) -> Result<f64, ExcellonError> {
        parse_coordinate_value(
            s,
            self.number_format,
            self.zero_suppression.unwrap_or(ZeroSuppression::None),
            position,
        )
        .map_err(|reason| ExcellonError::Syntax {
            position,
            text: s.to_string(),
            reason,
        })
    }

    /// Emit a coordinate value per spec §4.1's emit contract.
    pub fn emit_coordinate(&self, value: f64, zero_suppression: ZeroSuppression) -> String {
        let integer_digits = self.number_format.integer_digits.unwrap_or(3);
        let fractional_digits = self.number_format.fractional_digits.unwrap_or(4);
        emit_coordinate_value(value, integer_digits, fractional_digits, zero_suppression)
    }
}

/// Parse step shared by both Gerber and Excellon coordinate decoding.
/// Returns a plain `String` reason on failure so each caller can wrap it
/// in its own error type.
fn parse_coordinate_value(
    s: &str,
    format: NumberFormat,
    zero_suppression: ZeroSuppression,
    _position: SourcePosition,
) -> Result<f64, String> {
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => match s.strip_prefix('+') {
            Some(rest) => (false, rest),
            None => (false, s),
        },
    };

    let magnitude = if let Some(dot) = rest.find('.') {
        // Explicit decimal point: pad/truncate each side per format,
        // ignoring zero-suppression entirely (step 2).
        let (int_part, frac_part) = rest.split_at(dot);
        let frac_part = &frac_part[1..];

        let int_digits = format.integer_digits.unwrap_or(int_part.len() as u32) as usize;
        let frac_digits = format.fractional_digits.unwrap_or(frac_part.len() as u32) as usize;

        let int_part = left_pad_or_truncate(int_part, int_digits);
        let frac_part = right_pad_or_truncate(frac_part, frac_digits);

        let combined = format!("{int_part}{frac_part}");
        let integer: i64 = combined.parse().map_err(|_| format!("malformed coordinate \"{s}\""))?;
        integer as f64 / 10f64.powi(frac_digits as i32)
    } else {
        // No decimal point: must know the format to zero-pad correctly
        // (step 5).
        let (int_digits, frac_digits) = match (format.integer_digits, format.fractional_digits) {
            (Some(i), Some(f)) => (i, f),
            _ => return Err("number format unknown for coordinate without decimal point".to_string()),
        };
        let total = (int_digits + frac_digits) as usize;

        let padded = match zero_suppression {
            ZeroSuppression::Leading => left_pad_zeros(rest, total),
            ZeroSuppression::Trailing => right_pad_zeros(rest, total),
            ZeroSuppression::None => {
                if rest.len() != total {
                    return Err(format!(
                        "expected exactly {total} digits with no zero suppression, got \"{rest}\""
                    ));
                }
                rest.to_string()
            }
        };

        let integer: i64 = padded.parse().map_err(|_| format!("malformed coordinate \"{s}\""))?;
        integer as f64 / 10f64.powi(frac_digits as i32)
    };

    Ok(if negative { -magnitude } else { magnitude })
}

fn left_pad_zeros(s: &str, total: usize) -> String {
    if s.len() >= total {
        s.to_string()
    } else {
        format!("{}{}", "0".repeat(total - s.len()), s)
    }
}

fn right_pad_zeros(s: &str, total: usize) -> String {
    if s.len() >= total {
        s.to_string()
    } else {
        format!("{}{}", s, "0".repeat(total - s.len()))
    }
}

fn left_pad_or_truncate(s: &str, width: usize) -> String {
    if s.len() > width {
        s[s.len() - width..].to_string()
    } else {
        left_pad_zeros(s, width)
    }
}

fn right_pad_or_truncate(s: &str, width: usize) -> String {
    if s.len() > width {
        s[..width].to_string()
    } else {
        right_pad_zeros(s, width)
    }
}

/// Emit a fixed-width coordinate string per spec §4.1's emit contract.
pub fn emit_coordinate_value(
    value: f64,
    integer_digits: u32,
    fractional_digits: u32,
    zero_suppression: ZeroSuppression,
) -> String {
    let negative = value < 0.0;
    let scaled = (value.abs() * 10f64.powi(fractional_digits as i32)).round() as i64;
    let total = (integer_digits + fractional_digits) as usize;
    let digits = format!("{:0width$}", scaled, width = total);

    let body = match zero_suppression {
        ZeroSuppression::None => digits,
        ZeroSuppression::Leading => {
            let trimmed = digits.trim_start_matches('0');
            if trimmed.is_empty() {
                "0".to_string()
            } else {
                trimmed.to_string()
            }
        }
        ZeroSuppression::Trailing => {
            let trimmed = digits.trim_end_matches('0');
            if trimmed.is_empty() {
                "0".to_string()
            } else {
                trimmed.to_string()
            }
        }
    };

    if negative {
        format!("-{body}")
    } else {
        body
    }
}

/// Emit a coordinate as an XNC-style explicit-decimal-point number
/// (spec §6: "Excellon output ... explicit decimal-point numbers").
/// `integer_digits` is not used to pad (XNC never zero-pads the integer
/// part) but is kept in the signature for symmetry with the Gerber emitter
/// and to document the field width the format nominally allows.
pub fn emit_xnc_coordinate(value: f64, _integer_digits: u32, fractional_digits: u32) -> String {
    format!("{value:.*}", fractional_digits as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> SourcePosition {
        SourcePosition { line: 1, column: 1 }
    }

    #[test]
    fn parses_explicit_decimal() {
        let settings = FileSettings {
            number_format: NumberFormat::new(2, 3),
            ..Default::default()
        };
        assert_eq!(settings.parse_coordinate("1.000", pos()).unwrap(), 1.0);
        assert_eq!(settings.parse_coordinate("-0.5", pos()).unwrap(), -0.5);
    }

    #[test]
    fn parses_leading_suppressed() {
        let settings = FileSettings {
            number_format: NumberFormat::new(2, 3),
            zero_suppression: Some(ZeroSuppression::Leading),
            ..Default::default()
        };
        // 1.000 with int=2 frac=3 => "1000" zero padded to width 5 => "01000"
        assert_eq!(settings.parse_coordinate("1000", pos()).unwrap(), 1.0);
    }

    #[test]
    fn parses_trailing_suppressed() {
        let settings = FileSettings {
            number_format: NumberFormat::new(2, 3),
            zero_suppression: Some(ZeroSuppression::Trailing),
            ..Default::default()
        };
        // X1000D02 style: trailing suppression pads zeros on the right
        assert_eq!(settings.parse_coordinate("1", pos()).unwrap(), 10.0);
    }

    #[test]
    fn unknown_format_without_decimal_fails() {
        let settings = FileSettings::default();
        assert!(settings.parse_coordinate("1000", pos()).is_err());
    }

    #[test]
    fn round_trips_through_emit() {
        let value = 1.2345;
        let emitted = emit_coordinate_value(value, 2, 4, ZeroSuppression::Leading);
        let settings = FileSettings {
            number_format: NumberFormat::new(2, 4),
            zero_suppression: Some(ZeroSuppression::Leading),
            ..Default::default()
        };
        let parsed = settings.parse_coordinate(&emitted, pos()).unwrap();
        assert!((parsed - value).abs() < 1e-6);
    }

    #[test]
    fn inch_to_mm() {
        assert!((LengthUnit::Inch.convert(1.0, LengthUnit::Millimeter) - 25.4).abs() < 1e-9);
        assert!((LengthUnit::Millimeter.convert(25.4, LengthUnit::Inch) - 1.0).abs() < 1e-9);
    }
}
