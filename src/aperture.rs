//! Apertures and aperture macros (spec §3.3, §3.4, §4.2).
//!
//! The macro expression AST and its evaluator are generalised from the
//! teacher's `parsing/gerber.rs` `MacroExpression`/`MacroTerm`/`MacroFactor`
//! recursive-descent design, carried over almost unchanged since that part
//! of the teacher already matched the domain precisely. The macro
//! *primitives* (`MacroContent`) are new: the teacher only implements
//! `Circle` and `VectorLine` when lowering a macro instance to geometry and
//! bails on `CenterLine`/`Outline`/`Polygon`/`Thermal` — this module
//! defines all seven plus variable definitions, and lowering to geometry
//! happens in `gerber::graphics_state`.

use std::collections::HashMap;
use std::fmt;

use crate::units::LengthUnit;

/// A handle into a `GerberFile`'s aperture table (spec §9: "prefer integer
/// indices into the file's aperture vector over direct pointers").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ApertureHandle(pub usize);

/// A handle into a `GerberFile`'s aperture macro table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacroHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mirroring {
    pub x: bool,
    pub y: bool,
}

/// A standard shape or macro instantiation, plus the transform parameters
/// every aperture carries regardless of its template (spec §3.3).
#[derive(Debug, Clone, PartialEq)]
pub struct Aperture {
    pub template: ApertureTemplate,
    pub unit: LengthUnit,
    pub rotation: f64,
    pub mirror: Mirroring,
    pub scale: f64,
    pub attributes: HashMap<String, Vec<String>>,
}

impl Aperture {
    pub fn new(template: ApertureTemplate, unit: LengthUnit) -> Self {
        Self {
            template,
            unit,
            rotation: 0.0,
            mirror: Mirroring::default(),
            scale: 1.0,
            attributes: HashMap::new(),
        }
    }

    /// Width of a stroked line drawn with this aperture (spec §4.2).
    pub fn equivalent_width(&self) -> f64 {
        let base = match &self.template {
            ApertureTemplate::Circle { diameter, .. } => *diameter,
            ApertureTemplate::Rectangle { width, height, .. }
            | ApertureTemplate::Obround { width, height, .. } => (width * width + height * height).sqrt(),
            ApertureTemplate::Polygon { outer_diameter, .. } => *outer_diameter,
            ApertureTemplate::MacroInstance { bounding_extent, .. } => {
                bounding_extent.unwrap_or((0.0, 0.0)).0.max(bounding_extent.unwrap_or((0.0, 0.0)).1)
            }
        };
        base * self.scale
    }

    /// True when rotation/mirror/scale is the identity transform and the
    /// template can be emitted as a plain standard aperture (spec §4.2).
    pub fn has_trivial_transform(&self) -> bool {
        self.scale == 1.0
            && !self.mirror.x
            && !self.mirror.y
            && is_multiple_of_right_angle(self.rotation)
    }
}

fn is_multiple_of_right_angle(radians: f64) -> bool {
    let quarter_turns = radians / std::f64::consts::FRAC_PI_2;
    (quarter_turns - quarter_turns.round()).abs() < 1e-9
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApertureTemplate {
    Circle {
        diameter: f64,
        hole_diameter: Option<f64>,
    },
    Rectangle {
        width: f64,
        height: f64,
        hole_diameter: Option<f64>,
    },
    Obround {
        width: f64,
        height: f64,
        hole_diameter: Option<f64>,
    },
    Polygon {
        outer_diameter: f64,
        vertices: u32,
        rotation: f64,
        hole_diameter: Option<f64>,
    },
    MacroInstance {
        macro_ref: MacroHandle,
        parameters: Vec<f64>,
        /// Cached (width, height) bounding extent, filled in once the
        /// macro has been evaluated with `parameters`.
        bounding_extent: Option<(f64, f64)>,
    },
}

/// A named aperture macro template (spec §3.4). Content-addressable: two
/// macros are the same macro iff their canonical text is identical — see
/// [`ApertureMacro::canonical_text`].
#[derive(Debug, Clone, PartialEq)]
pub struct ApertureMacro {
    pub name: String,
    pub content: Vec<MacroContent>,
}

impl ApertureMacro {
    /// Deterministic text used for content-addressing during `merge`
    /// (spec §4.8): two macros with identical canonical text are the same
    /// macro regardless of name.
    pub fn canonical_text(&self) -> String {
        self.content.iter().map(|c| format!("{c:?}")).collect::<Vec<_>>().join(";")
    }
}

/// One primitive statement inside an aperture macro body.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroContent {
    Comment,
    Circle {
        exposure: MacroExpression,
        diameter: MacroExpression,
        center: (MacroExpression, MacroExpression),
        rotation: MacroExpression,
    },
    VectorLine {
        exposure: MacroExpression,
        width: MacroExpression,
        start: (MacroExpression, MacroExpression),
        end: (MacroExpression, MacroExpression),
        rotation: MacroExpression,
    },
    CenterLine {
        exposure: MacroExpression,
        size: (MacroExpression, MacroExpression),
        center: (MacroExpression, MacroExpression),
        rotation: MacroExpression,
    },
    Outline {
        exposure: MacroExpression,
        points: Vec<(MacroExpression, MacroExpression)>,
        rotation: MacroExpression,
    },
    Polygon {
        exposure: MacroExpression,
        vertices: MacroExpression,
        center: (MacroExpression, MacroExpression),
        diameter: MacroExpression,
        rotation: MacroExpression,
    },
    Thermal {
        center: (MacroExpression, MacroExpression),
        outer_diameter: MacroExpression,
        inner_diameter: MacroExpression,
        gap_thickness: MacroExpression,
        rotation: MacroExpression,
    },
    VariableDefinition {
        variable: u32,
        expression: MacroExpression,
    },
}

/// The macro arithmetic sublanguage's expression AST, generalised from the
/// teacher's `parsing/gerber.rs` recursive-descent design.
#[derive(Debug, Clone, PartialEq)]
pub enum MacroExpression {
    Constant(f64),
    Variable(u32),
    Negate(Box<MacroExpression>),
    Add(Box<MacroExpression>, Box<MacroExpression>),
    Subtract(Box<MacroExpression>, Box<MacroExpression>),
    Multiply(Box<MacroExpression>, Box<MacroExpression>),
    Divide(Box<MacroExpression>, Box<MacroExpression>),
}

/// Evaluate `macro_def` with `parameters` bound to `$1, $2, ...` and return
/// the `(width, height)` axis-aligned bounding box of its primitives (spec
/// §4.2). Each primitive contributes the bounding box of its own extent
/// (diameter/width/height around its center, or the bare point for
/// `Outline` vertices); primitive-local rotation is not folded in, so this
/// is a conservative union rather than an exact hull.
pub fn macro_bounding_extent(macro_def: &ApertureMacro, parameters: &[f64]) -> (f64, f64) {
    let mut variables: HashMap<u32, f64> = HashMap::new();
    for (position, value) in parameters.iter().enumerate() {
        variables.insert(position as u32 + 1, *value);
    }

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut expand = |cx: f64, cy: f64, half_w: f64, half_h: f64| {
        min_x = min_x.min(cx - half_w);
        min_y = min_y.min(cy - half_h);
        max_x = max_x.max(cx + half_w);
        max_y = max_y.max(cy + half_h);
    };

    for primitive in &macro_def.content {
        match primitive {
            MacroContent::Comment => {}
            MacroContent::VariableDefinition { variable, expression } => {
                variables.insert(*variable, expression.evaluate(&variables).unwrap_or(0.0));
            }
            MacroContent::Circle { diameter, center, .. } => {
                let d = diameter.evaluate(&variables).unwrap_or(0.0);
                expand(
                    center.0.evaluate(&variables).unwrap_or(0.0),
                    center.1.evaluate(&variables).unwrap_or(0.0),
                    d / 2.0,
                    d / 2.0,
                );
            }
            MacroContent::VectorLine { width, start, end, .. } => {
                let w = width.evaluate(&variables).unwrap_or(0.0);
                expand(
                    start.0.evaluate(&variables).unwrap_or(0.0),
                    start.1.evaluate(&variables).unwrap_or(0.0),
                    w / 2.0,
                    w / 2.0,
                );
                expand(
                    end.0.evaluate(&variables).unwrap_or(0.0),
                    end.1.evaluate(&variables).unwrap_or(0.0),
                    w / 2.0,
                    w / 2.0,
                );
            }
            MacroContent::CenterLine { size, center, .. } => {
                let w = size.0.evaluate(&variables).unwrap_or(0.0);
                let h = size.1.evaluate(&variables).unwrap_or(0.0);
                expand(
                    center.0.evaluate(&variables).unwrap_or(0.0),
                    center.1.evaluate(&variables).unwrap_or(0.0),
                    w / 2.0,
                    h / 2.0,
                );
            }
            MacroContent::Outline { points, .. } => {
                for (x, y) in points {
                    expand(x.evaluate(&variables).unwrap_or(0.0), y.evaluate(&variables).unwrap_or(0.0), 0.0, 0.0);
                }
            }
            MacroContent::Polygon { center, diameter, .. } => {
                let d = diameter.evaluate(&variables).unwrap_or(0.0);
                expand(
                    center.0.evaluate(&variables).unwrap_or(0.0),
                    center.1.evaluate(&variables).unwrap_or(0.0),
                    d / 2.0,
                    d / 2.0,
                );
            }
            MacroContent::Thermal { center, outer_diameter, .. } => {
                let d = outer_diameter.evaluate(&variables).unwrap_or(0.0);
                expand(
                    center.0.evaluate(&variables).unwrap_or(0.0),
                    center.1.evaluate(&variables).unwrap_or(0.0),
                    d / 2.0,
                    d / 2.0,
                );
            }
        }
    }

    if min_x.is_finite() {
        (max_x - min_x, max_y - min_y)
    } else {
        (0.0, 0.0)
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MacroEvaluationError {
    #[error("undefined macro variable ${0}")]
    UndefinedVariable(u32),
}

impl MacroExpression {
    pub fn evaluate(&self, variables: &HashMap<u32, f64>) -> Result<f64, MacroEvaluationError> {
        match self {
            MacroExpression::Constant(value) => Ok(*value),
            MacroExpression::Variable(index) => variables
                .get(index)
                .copied()
                .ok_or(MacroEvaluationError::UndefinedVariable(*index)),
            MacroExpression::Negate(inner) => Ok(-inner.evaluate(variables)?),
            MacroExpression::Add(lhs, rhs) => Ok(lhs.evaluate(variables)? + rhs.evaluate(variables)?),
            MacroExpression::Subtract(lhs, rhs) => Ok(lhs.evaluate(variables)? - rhs.evaluate(variables)?),
            MacroExpression::Multiply(lhs, rhs) => Ok(lhs.evaluate(variables)? * rhs.evaluate(variables)?),
            MacroExpression::Divide(lhs, rhs) => Ok(lhs.evaluate(variables)? / rhs.evaluate(variables)?),
        }
    }
}

impl fmt::Display for MacroExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroExpression::Constant(value) => write!(f, "{value}"),
            MacroExpression::Variable(index) => write!(f, "${index}"),
            MacroExpression::Negate(inner) => write!(f, "-({inner})"),
            MacroExpression::Add(lhs, rhs) => write!(f, "({lhs}+{rhs})"),
            MacroExpression::Subtract(lhs, rhs) => write!(f, "({lhs}-{rhs})"),
            MacroExpression::Multiply(lhs, rhs) => write!(f, "({lhs}X{rhs})"),
            MacroExpression::Divide(lhs, rhs) => write!(f, "({lhs}/{rhs})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evaluates_arithmetic() {
        let expr = MacroExpression::Add(
            Box::new(MacroExpression::Constant(1.0)),
            Box::new(MacroExpression::Multiply(
                Box::new(MacroExpression::Variable(1)),
                Box::new(MacroExpression::Constant(2.0)),
            )),
        );
        let mut vars = HashMap::new();
        vars.insert(1, 3.0);
        assert_eq!(expr.evaluate(&vars).unwrap(), 7.0);
    }

    #[test]
    fn undefined_variable_errors() {
        let expr = MacroExpression::Variable(9);
        assert_eq!(
            expr.evaluate(&HashMap::new()),
            Err(MacroEvaluationError::UndefinedVariable(9))
        );
    }

    #[test]
    fn equivalent_width_rectangle_is_diagonal() {
        let aperture = Aperture::new(
            ApertureTemplate::Rectangle {
                width: 3.0,
                height: 4.0,
                hole_diameter: None,
            },
            LengthUnit::Millimeter,
        );
        assert!((aperture.equivalent_width() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn macro_bounding_extent_unions_primitive_circles() {
        let macro_def = ApertureMacro {
            name: "TWOCIRCLES".into(),
            content: vec![
                MacroContent::Circle {
                    exposure: MacroExpression::Constant(1.0),
                    diameter: MacroExpression::Constant(2.0),
                    center: (MacroExpression::Constant(0.0), MacroExpression::Constant(0.0)),
                    rotation: MacroExpression::Constant(0.0),
                },
                MacroContent::Circle {
                    exposure: MacroExpression::Constant(1.0),
                    diameter: MacroExpression::Variable(1),
                    center: (MacroExpression::Constant(3.0), MacroExpression::Constant(0.0)),
                    rotation: MacroExpression::Constant(0.0),
                },
            ],
        };
        // first circle spans x in [-1, 1]; second has diameter $1=2 centered
        // at x=3, spanning [2, 4] -> union width is 4 - (-1) = 5.
        let (width, height) = macro_bounding_extent(&macro_def, &[2.0]);
        assert!((width - 5.0).abs() < 1e-9);
        assert!((height - 2.0).abs() < 1e-9);
    }

    #[test]
    fn equivalent_width_of_macro_instance_uses_bounding_extent() {
        let aperture = Aperture::new(
            ApertureTemplate::MacroInstance {
                macro_ref: MacroHandle(0),
                parameters: Vec::new(),
                bounding_extent: Some((3.0, 4.0)),
            },
            LengthUnit::Millimeter,
        );
        assert!((aperture.equivalent_width() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn macro_canonical_text_is_order_sensitive_content_address() {
        let a = ApertureMacro {
            name: "A".into(),
            content: vec![MacroContent::Comment],
        };
        let b = ApertureMacro {
            name: "B".into(),
            content: vec![MacroContent::Comment],
        };
        assert_eq!(a.canonical_text(), b.canonical_text());
    }
}
