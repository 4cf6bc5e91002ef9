//! Allegro `nc_param.txt` / `ncdrill.log` sidecar sniffing (spec §4.6).
//!
//! Allegro Excellon exports omit the number format entirely; gerbonara's
//! `parse_allegro_ncparam` (`gerbonara/gerber/excellon.py`) recovers it
//! from a sidecar file dropped next to the drill file. This is a direct
//! line-oriented port of that function's three regex matches, expressed
//! against the crate's own `FileSettings`/`ExcellonError` types.

use crate::error::ExcellonError;
use crate::units::{FileSettings, LengthUnit, Notation, NumberFormat, ZeroSuppression};

/// Parse the contents of `nc_param.txt` or `ncdrill.log` into a
/// `FileSettings`. Both leading and trailing suppression present is a
/// hard error (spec: `FormatMismatch`/`AmbiguousFormat`).
pub fn parse_allegro_ncparam(data: &str) -> Result<FileSettings, ExcellonError> {
    let mut settings = FileSettings::new();
    let mut leading_suppressed = false;
    let mut trailing_suppressed = false;

    for raw_line in data.lines() {
        let line = collapse_whitespace(raw_line.trim());

        if let Some(rest) = line.strip_prefix("FORMAT ") {
            if let Some((int_digits, frac_digits)) = rest.split_once('.') {
                if let (Ok(i), Ok(f)) = (int_digits.parse(), frac_digits.parse()) {
                    settings.number_format = NumberFormat::new(i, f);
                }
            }
        } else if let Some(rest) = line.strip_prefix("COORDINATES ") {
            settings.notation = Some(if rest.eq_ignore_ascii_case("ABSOLUTE") {
                Notation::Absolute
            } else {
                Notation::Incremental
            });
        } else if let Some(rest) = line.strip_prefix("OUTPUT-UNITS ") {
            settings.unit = Some(if rest.eq_ignore_ascii_case("METRIC") {
                LengthUnit::Millimeter
            } else {
                // "ENGLISH" or "INCHES" both mean inch (gerbonara comment:
                // the difference is which Allegro export path produced
                // the file, not the unit itself).
                LengthUnit::Inch
            });
        } else if let Some(rest) = line.strip_prefix("SUPPRESS-LEAD-ZEROES ") {
            leading_suppressed = rest.eq_ignore_ascii_case("YES");
        } else if let Some(rest) = line.strip_prefix("SUPPRESS-TRAIL-ZEROES ") {
            trailing_suppressed = rest.eq_ignore_ascii_case("YES");
        }
    }

    if leading_suppressed && trailing_suppressed {
        return Err(ExcellonError::AmbiguousFormat);
    }

    settings.zero_suppression = Some(if leading_suppressed {
        ZeroSuppression::Leading
    } else {
        ZeroSuppression::Trailing
    });

    Ok(settings)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_s4_sidecar() {
        let sidecar = "FORMAT 2.4\nCOORDINATES ABSOLUTE\nOUTPUT-UNITS METRIC\n\
                       SUPPRESS-LEAD-ZEROES NO\nSUPPRESS-TRAIL-ZEROES YES";
        let settings = parse_allegro_ncparam(sidecar).unwrap();
        assert_eq!(settings.number_format, NumberFormat::new(2, 4));
        assert_eq!(settings.notation, Some(Notation::Absolute));
        assert_eq!(settings.unit, Some(LengthUnit::Millimeter));
        assert_eq!(settings.zero_suppression, Some(ZeroSuppression::Trailing));
    }

    #[test]
    fn both_suppressions_is_ambiguous() {
        let sidecar = "SUPPRESS-LEAD-ZEROES YES\nSUPPRESS-TRAIL-ZEROES YES";
        assert!(matches!(
            parse_allegro_ncparam(sidecar),
            Err(ExcellonError::AmbiguousFormat)
        ));
    }
}
