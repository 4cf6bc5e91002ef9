//! Gerber graphics state (spec §4.4).
//!
//! Grounded directly in `gerbonara/gerber/rs274x.py`'s `GraphicsState`
//! class (the transform-matrix rebuild formulas, the polarity rule, and
//! the multi-quadrant arc disambiguation algorithm are not fully
//! specified in prose by the distilled spec and are reproduced here from
//! that source, re-expressed in the teacher's `PlottingContext`-style
//! explicit-struct idiom rather than Python's dynamic `__setattr__`
//! interception).

use crate::aperture::ApertureHandle;
use crate::error::{Diagnostics, GerberError, SourcePosition};
use crate::object::{Arc, Flash, Line, ObjectRef};
use crate::units::{LengthUnit, Notation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolationMode {
    Linear,
    ClockwiseCircular,
    CounterClockwiseCircular,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRotation {
    R0,
    R90,
    R180,
    R270,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mirror {
    pub x: bool,
    pub y: bool,
}

#[derive(Debug, Clone)]
pub struct GraphicsState {
    pub point: Option<(f64, f64)>,
    pub aperture: Option<ApertureHandle>,
    pub interpolation_mode: InterpolationMode,
    pub polarity_dark: bool,
    pub multi_quadrant: bool,
    pub aperture_mirror: Mirror,
    pub aperture_rotation: f64,
    pub aperture_scale: f64,
    pub notation: Notation,
    pub unit: Option<LengthUnit>,

    // Deprecated image transforms (spec §4.4).
    image_polarity_negative: bool,
    image_rotation: ImageRotation,
    image_mirror: Mirror,
    image_scale: (f64, f64),
    image_offset: (f64, f64),

    matrix: Option<(f64, f64, f64, f64, f64, f64)>, // (a, b, c, d, off_x, off_y)
    unit_warning_emitted: bool,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            point: None,
            aperture: None,
            interpolation_mode: InterpolationMode::Linear,
            polarity_dark: true,
            multi_quadrant: false,
            aperture_mirror: Mirror::default(),
            aperture_rotation: 0.0,
            aperture_scale: 1.0,
            notation: Notation::Absolute,
            unit: None,
            image_polarity_negative: false,
            image_rotation: ImageRotation::R0,
            image_mirror: Mirror::default(),
            image_scale: (1.0, 1.0),
            image_offset: (0.0, 0.0),
            matrix: None,
            unit_warning_emitted: false,
        }
    }
}

impl GraphicsState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the deprecated image polarity (`IP`). If it was previously
    /// negative, `polarity_dark` is corrected back to its true value at
    /// this instant — the one-time half of the polarity rule (spec §4.4).
    pub fn set_image_polarity_negative(&mut self, negative: bool) {
        if self.image_polarity_negative {
            self.polarity_dark = false;
        }
        self.image_polarity_negative = negative;
    }

    /// Set a local `LPD`/`LPC`. If the deprecated image polarity is
    /// currently negative, the incoming value is inverted before storage
    /// — the other half of the polarity rule.
    pub fn set_polarity_dark(&mut self, dark: bool) {
        self.polarity_dark = if self.image_polarity_negative { !dark } else { dark };
    }

    pub fn set_image_rotation(&mut self, rotation: ImageRotation) {
        self.image_rotation = rotation;
        self.matrix = None;
    }

    pub fn set_image_mirror(&mut self, mirror: Mirror) {
        self.image_mirror = mirror;
        self.matrix = None;
    }

    pub fn set_image_scale(&mut self, scale: (f64, f64)) {
        self.image_scale = scale;
        self.matrix = None;
    }

    pub fn set_image_offset(&mut self, offset: (f64, f64)) {
        self.image_offset = offset;
        self.matrix = None;
    }

    fn rebuild_matrix(&mut self) {
        let (sx, sy) = self.image_scale;
        let mut a = if self.image_mirror.x { -sx } else { sx };
        let mut d = if self.image_mirror.y { -sy } else { sy };
        let mut b = 0.0;
        let mut c = 0.0;
        let (mut ox, mut oy) = self.image_offset;

        match self.image_rotation {
            ImageRotation::R0 => {}
            ImageRotation::R90 => {
                (a, b, c, d) = (0.0, -d, a, 0.0);
                (ox, oy) = (oy, -ox);
            }
            ImageRotation::R180 => {
                (a, b, c, d) = (-a, 0.0, 0.0, -d);
                (ox, oy) = (-ox, -oy);
            }
            ImageRotation::R270 => {
                (a, b, c, d) = (0.0, d, -a, 0.0);
                (ox, oy) = (-oy, ox);
            }
        }

        self.matrix = Some((a, b, c, d, ox, oy));
    }

    /// Apply the deprecated-transform matrix, then (unless `relative`)
    /// the offset. `relative = true` is used for I/J arc center offsets,
    /// which must not receive the translation.
    pub fn map_coord(&mut self, x: f64, y: f64, relative: bool) -> (f64, f64) {
        if self.matrix.is_none() {
            self.rebuild_matrix();
        }
        let (a, b, c, d, ox, oy) = self.matrix.unwrap();
        if relative {
            (a * x + b * y, c * x + d * y)
        } else {
            (a * x + b * y + ox, c * x + d * y + oy)
        }
    }

    /// Absolute/incremental-aware point update (spec §4.4). Returns the
    /// *previous* point. Missing x or y inherits from the current point
    /// in absolute notation, or is treated as 0 in incremental notation.
    /// If both are missing on the very first coordinate statement in the
    /// file, warns and assumes (0,0) — the "likely a Siemens file" case.
    pub fn update_point(
        &mut self,
        x: Option<f64>,
        y: Option<f64>,
        diagnostics: &mut Diagnostics,
        position: SourcePosition,
    ) -> (f64, f64) {
        let old_point = self.point;

        if x.is_none() && y.is_none() && self.point.is_none() {
            diagnostics.warn(
                position,
                "coordinate omitted from first coordinate statement in the file; assuming (0,0)",
            );
            self.point = Some((0.0, 0.0));
            return old_point.unwrap_or((0.0, 0.0));
        }

        let (base_x, base_y) = match self.notation {
            Notation::Absolute => self.point.unwrap_or((0.0, 0.0)),
            Notation::Incremental => (0.0, 0.0),
        };
        let new_x = match (x, self.notation) {
            (Some(v), Notation::Incremental) => self.point.unwrap_or((0.0, 0.0)).0 + v,
            (Some(v), Notation::Absolute) => v,
            (None, _) => base_x,
        };
        let new_y = match (y, self.notation) {
            (Some(v), Notation::Incremental) => self.point.unwrap_or((0.0, 0.0)).1 + v,
            (Some(v), Notation::Absolute) => v,
            (None, _) => base_y,
        };

        self.point = Some((new_x, new_y));
        old_point.unwrap_or((0.0, 0.0))
    }

    pub fn flash(
        &mut self,
        x: Option<f64>,
        y: Option<f64>,
        unit: LengthUnit,
        diagnostics: &mut Diagnostics,
        position: SourcePosition,
    ) -> Result<Flash, GerberError> {
        self.warn_if_unit_unknown(diagnostics, position);
        self.update_point(x, y, diagnostics, position);
        let (px, py) = self.point.unwrap();
        let (mx, my) = self.map_coord(px, py, false);
        let aperture = self
            .aperture
            .ok_or(GerberError::UndefinedAperture { position, code: -1 })?;
        Ok(Flash {
            x: mx,
            y: my,
            aperture: ObjectRef::Aperture(aperture),
            polarity_dark: self.polarity_dark,
            unit,
            attributes: Default::default(),
        })
    }

    fn warn_if_unit_unknown(&mut self, diagnostics: &mut Diagnostics, position: SourcePosition) {
        if self.unit.is_none() && !self.unit_warning_emitted {
            diagnostics.warn(position, "coordinate used before unit mode (MO) was announced");
            self.unit_warning_emitted = true;
        }
    }

    /// `interpolate` (spec §4.4). `i`/`j` are in the *current* graphics
    /// state's coordinate convention: signed in multi-quadrant mode,
    /// unsigned magnitudes in single-quadrant mode (quadrant inferred).
    pub fn interpolate(
        &mut self,
        x: Option<f64>,
        y: Option<f64>,
        i: Option<f64>,
        j: Option<f64>,
        unit: LengthUnit,
        diagnostics: &mut Diagnostics,
        position: SourcePosition,
    ) -> Result<Option<InterpolationResult>, GerberError> {
        self.warn_if_unit_unknown(diagnostics, position);

        if self.point.is_none() {
            diagnostics.warn(position, "D01 interpolation without preceding D02 move");
            self.point = Some((0.0, 0.0));
        }

        let old_point_raw = self.update_point(x, y, diagnostics, position);
        let old_point = self.map_coord(old_point_raw.0, old_point_raw.1, false);
        let (npx, npy) = self.point.unwrap();
        let new_point = self.map_coord(npx, npy, false);

        let aperture = self.aperture;

        match self.interpolation_mode {
            InterpolationMode::Linear => {
                if i.is_some() || j.is_some() {
                    return Err(GerberError::Syntax {
                        position,
                        text: String::new(),
                        reason: "i/j coordinates given for linear D01 operation".to_string(),
                    });
                }
                Ok(Some(InterpolationResult::Line(self.make_line(old_point, new_point, aperture, unit))))
            }
            mode @ (InterpolationMode::ClockwiseCircular | InterpolationMode::CounterClockwiseCircular) => {
                let clockwise = mode == InterpolationMode::ClockwiseCircular;

                if i.is_none() && j.is_none() {
                    diagnostics.warn(
                        position,
                        "linear segment implied during arc interpolation mode through D01 without I, J values",
                    );
                    return Ok(Some(InterpolationResult::Line(self.make_line(old_point, new_point, aperture, unit))));
                }
                let i = i.unwrap_or_else(|| {
                    diagnostics.warn(position, "arc is missing I value");
                    0.0
                });
                let j = j.unwrap_or_else(|| {
                    diagnostics.warn(position, "arc is missing J value");
                    0.0
                });

                if !self.multi_quadrant {
                    let (cx, cy) = self.map_coord(i, j, true);
                    Ok(Some(InterpolationResult::Arc(self.make_arc(old_point, new_point, (cx, cy), clockwise, aperture, unit))))
                } else if points_nearly_equal(old_point, new_point) {
                    Ok(None)
                } else {
                    let (cx, cy) = self.map_coord(i, j, true);
                    let center = pick_single_quadrant_center(old_point, new_point, cx, cy, clockwise);
                    Ok(Some(InterpolationResult::Arc(self.make_arc(old_point, new_point, center, clockwise, aperture, unit))))
                }
            }
        }
    }

    fn make_line(
        &self,
        old_point: (f64, f64),
        new_point: (f64, f64),
        aperture: Option<ApertureHandle>,
        unit: LengthUnit,
    ) -> Line {
        Line {
            x1: old_point.0,
            y1: old_point.1,
            x2: new_point.0,
            y2: new_point.1,
            aperture: ObjectRef::Aperture(aperture.unwrap_or(ApertureHandle(usize::MAX))),
            polarity_dark: self.polarity_dark,
            unit,
            attributes: Default::default(),
        }
    }

    fn make_arc(
        &self,
        old_point: (f64, f64),
        new_point: (f64, f64),
        center_offset: (f64, f64),
        clockwise: bool,
        aperture: Option<ApertureHandle>,
        unit: LengthUnit,
    ) -> Arc {
        Arc {
            x1: old_point.0,
            y1: old_point.1,
            x2: new_point.0,
            y2: new_point.1,
            cx: center_offset.0,
            cy: center_offset.1,
            clockwise,
            aperture: ObjectRef::Aperture(aperture.unwrap_or(ApertureHandle(usize::MAX))),
            polarity_dark: self.polarity_dark,
            unit,
            attributes: Default::default(),
        }
    }
}

pub enum InterpolationResult {
    Line(Line),
    Arc(Arc),
}

fn points_nearly_equal(a: (f64, f64), b: (f64, f64)) -> bool {
    (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
}

/// Single-quadrant arc center disambiguation (spec §4.4): build all four
/// quadrant-reflection candidates for the center offset, pick the one with
/// the lowest `numeric_error` whose rotation direction (cross-product
/// sign) matches `clockwise`.
fn pick_single_quadrant_center(
    old_point: (f64, f64),
    new_point: (f64, f64),
    i: f64,
    j: f64,
    clockwise: bool,
) -> (f64, f64) {
    let candidates = [(i, j), (-i, j), (i, -j), (-i, -j)];

    let mut scored: Vec<((f64, f64), f64)> = candidates
        .iter()
        .map(|&(ci, cj)| {
            let center = (old_point.0 + ci, old_point.1 + cj);
            let r1 = distance(center, old_point);
            let r2 = distance(center, new_point);
            (center, (r1 - r2).abs())
        })
        .collect();
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap());

    for (center, _error) in &scored {
        let cross = cross_product(old_point, *center, new_point);
        let is_clockwise = cross < 0.0;
        if is_clockwise == clockwise {
            return (center.0 - old_point.0, center.1 - old_point.1);
        }
    }

    // No candidate matched direction exactly (numeric edge case): fall
    // back to the lowest-error candidate rather than failing the parse.
    let (center, _) = scored[0];
    (center.0 - old_point.0, center.1 - old_point.1)
}

fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Sign of `(b-a) x (c-a)`, used to determine rotation direction around
/// `a` (the arc center) from start `b` to end `c`.
fn cross_product(center: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    let ab = (b.0 - center.0, b.1 - center.1);
    let ac = (c.0 - center.0, c.1 - center.1);
    ab.0 * ac.1 - ab.1 * ac.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> SourcePosition {
        SourcePosition { line: 1, column: 1 }
    }

    #[test]
    fn polarity_rule_inverts_subsequent_lpd() {
        let mut state = GraphicsState::new();
        state.set_image_polarity_negative(true);
        state.set_polarity_dark(true);
        assert!(!state.polarity_dark, "LPD under negative image polarity becomes clear");
        state.set_polarity_dark(false);
        assert!(state.polarity_dark, "LPC under negative image polarity becomes dark");
    }

    #[test]
    fn map_coord_relative_ignores_offset() {
        let mut state = GraphicsState::new();
        state.set_image_offset((5.0, 5.0));
        let (x, y) = state.map_coord(1.0, 2.0, true);
        assert_eq!((x, y), (1.0, 2.0));
        let (x, y) = state.map_coord(1.0, 2.0, false);
        assert_eq!((x, y), (6.0, 7.0));
    }

    #[test]
    fn rotation_90_matches_known_formula() {
        let mut state = GraphicsState::new();
        state.set_image_rotation(ImageRotation::R90);
        let (x, y) = state.map_coord(1.0, 0.0, true);
        assert!((x - 0.0).abs() < 1e-9);
        assert!((y - 1.0).abs() < 1e-9);
    }

    #[test]
    fn multi_quadrant_full_circle_start_equals_end_yields_no_object() {
        let mut state = GraphicsState::new();
        state.multi_quadrant = true;
        state.interpolation_mode = InterpolationMode::CounterClockwiseCircular;
        state.unit = Some(LengthUnit::Millimeter);
        state.notation = Notation::Absolute;
        state.point = Some((0.0, 0.0));
        let mut diagnostics = Diagnostics::new();
        let result = state
            .interpolate(Some(0.0), Some(0.0), Some(1.0), Some(0.0), LengthUnit::Millimeter, &mut diagnostics, pos())
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn scenario_s3_multi_quadrant_arc() {
        let mut state = GraphicsState::new();
        state.multi_quadrant = true;
        state.interpolation_mode = InterpolationMode::CounterClockwiseCircular;
        state.unit = Some(LengthUnit::Millimeter);
        state.point = Some((0.0, 0.0));
        let mut diagnostics = Diagnostics::new();
        let result = state
            .interpolate(Some(1.0), Some(0.0), Some(0.5), Some(0.0), LengthUnit::Millimeter, &mut diagnostics, pos())
            .unwrap();
        match result {
            Some(InterpolationResult::Arc(arc)) => {
                assert!((arc.cx - 0.5).abs() < 1e-9);
                assert!((arc.cy - 0.0).abs() < 1e-9);
                assert!(!arc.clockwise);
            }
            _ => panic!("expected arc"),
        }
    }
}
