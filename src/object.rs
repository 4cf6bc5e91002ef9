//! Geometric object model shared by Gerber and Excellon (spec §3.6).
//!
//! The source uses a class hierarchy here; per spec §9 this crate uses a
//! tagged variant instead, generalising the teacher's `Shape`/`Segment`
//! pair (`geometry.rs`) into the object shapes the spec actually names.

use std::collections::HashMap;

use crate::aperture::ApertureHandle;
use crate::units::LengthUnit;

/// Attributes attached to a single object (spec §3.6: "optional
/// per-object attributes").
pub type Attributes = HashMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectRef {
    Aperture(ApertureHandle),
    Tool(crate::excellon::tool::ToolHandle),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Flash {
    pub x: f64,
    pub y: f64,
    pub aperture: ObjectRef,
    pub polarity_dark: bool,
    pub unit: LengthUnit,
    pub attributes: Attributes,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub aperture: ObjectRef,
    pub polarity_dark: bool,
    pub unit: LengthUnit,
    pub attributes: Attributes,
}

/// Stroke an arc from (x1,y1) to (x2,y2), center expressed as offset
/// (cx,cy) from p1. Invariant: `|p1-center| - |p2-center| ≈ 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct Arc {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub cx: f64,
    pub cy: f64,
    pub clockwise: bool,
    pub aperture: ObjectRef,
    pub polarity_dark: bool,
    pub unit: LengthUnit,
    pub attributes: Attributes,
}

impl Arc {
    /// Absolute center point, `p1 + (cx, cy)`.
    pub fn center(&self) -> (f64, f64) {
        (self.x1 + self.cx, self.y1 + self.cy)
    }

    /// Numeric violation of the arc invariant, in native unit.
    pub fn radius_error(&self) -> f64 {
        let (cx, cy) = self.center();
        let r1 = ((self.x1 - cx).powi(2) + (self.y1 - cy).powi(2)).sqrt();
        let r2 = ((self.x2 - cx).powi(2) + (self.y2 - cy).powi(2)).sqrt();
        (r1 - r2).abs()
    }
}

/// Arc datum attached to an outline point: `None` for a straight segment
/// from the previous point, `Some((clockwise, center))` for an arc.
pub type RegionArcDatum = Option<(bool, (f64, f64))>;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Region {
    pub outline: Vec<(f64, f64)>,
    pub arcs: Vec<RegionArcDatum>,
    pub polarity_dark: bool,
    pub unit: LengthUnit,
    pub attributes: Attributes,
}

impl Region {
    pub fn new(unit: LengthUnit, polarity_dark: bool) -> Self {
        Self {
            outline: Vec::new(),
            arcs: Vec::new(),
            polarity_dark,
            unit,
            attributes: Attributes::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.outline.len() < 3
    }
}

/// A drilled hole, the projected view of an `ExcellonObject::Flash` (spec
/// §3.7). Never constructed directly by the parser — see
/// [`project_excellon_geometry`].
#[derive(Debug, Clone, PartialEq)]
pub struct Drill {
    pub x: f64,
    pub y: f64,
    pub diameter: f64,
    pub tool: crate::excellon::tool::ToolHandle,
    pub plated: Option<bool>,
    pub unit: LengthUnit,
    pub attributes: Attributes,
}

/// A routed slot, the projected view of an `ExcellonObject::Line`/`Arc`
/// (spec §3.7). `arc` carries the `(clockwise, absolute_center)` datum for
/// a routed arc, `None` for a straight route.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub width: f64,
    pub tool: crate::excellon::tool::ToolHandle,
    pub plated: Option<bool>,
    pub unit: LengthUnit,
    pub attributes: Attributes,
    pub arc: Option<(bool, (f64, f64))>,
}

/// A top-level object in a `GerberFile`'s object list.
#[derive(Debug, Clone, PartialEq)]
pub enum GerberObject {
    Flash(Flash),
    Line(Line),
    Arc(Arc),
    Region(Region),
}

impl GerberObject {
    pub fn polarity_dark(&self) -> bool {
        match self {
            GerberObject::Flash(o) => o.polarity_dark,
            GerberObject::Line(o) => o.polarity_dark,
            GerberObject::Arc(o) => o.polarity_dark,
            GerberObject::Region(o) => o.polarity_dark,
        }
    }

    /// Axis-aligned bounding box `(min_x, min_y, max_x, max_y)`, or `None`
    /// for an empty region. Used by `GerberFile::bounds` (spec §4.8) —
    /// deliberately reads from `self`, never a fixed index, fixing the
    /// known `objects[0]` bug described in spec §9.
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        match self {
            GerberObject::Flash(o) => Some((o.x, o.y, o.x, o.y)),
            GerberObject::Line(o) => Some(bbox_of_points(&[(o.x1, o.y1), (o.x2, o.y2)])),
            GerberObject::Arc(o) => {
                let (cx, cy) = o.center();
                let r1 = ((o.x1 - cx).powi(2) + (o.y1 - cy).powi(2)).sqrt();
                Some((cx - r1, cy - r1, cx + r1, cy + r1))
            }
            GerberObject::Region(o) => {
                if o.outline.is_empty() {
                    None
                } else {
                    Some(bbox_of_points(&o.outline))
                }
            }
        }
    }
}

fn bbox_of_points(points: &[(f64, f64)]) -> (f64, f64, f64, f64) {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for &(x, y) in points {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    (min_x, min_y, max_x, max_y)
}

/// A top-level object in an `ExcellonFile`'s object list (spec §3.6/§3.7):
/// the same `Flash`/`Line`/`Arc` primitives Gerber uses, tagged with
/// `ObjectRef::Tool` instead of `ObjectRef::Aperture`. `Drill`/`Slot` are
/// not constructed here — they are a secondary geometry projection derived
/// from these plus the tool table, via [`project_excellon_geometry`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExcellonObject {
    Flash(Flash),
    Line(Line),
    Arc(Arc),
}

impl ExcellonObject {
    /// The tool this object was drilled/routed with. Panics if `aperture`
    /// somehow holds a Gerber `ObjectRef::Aperture`, which the Excellon
    /// parser never constructs.
    pub fn tool(&self) -> crate::excellon::tool::ToolHandle {
        match self.aperture_ref() {
            ObjectRef::Tool(handle) => handle,
            ObjectRef::Aperture(_) => unreachable!("Excellon objects always carry ObjectRef::Tool"),
        }
    }

    fn aperture_ref(&self) -> ObjectRef {
        match self {
            ExcellonObject::Flash(o) => o.aperture,
            ExcellonObject::Line(o) => o.aperture,
            ExcellonObject::Arc(o) => o.aperture,
        }
    }

    pub fn unit(&self) -> LengthUnit {
        match self {
            ExcellonObject::Flash(o) => o.unit,
            ExcellonObject::Line(o) => o.unit,
            ExcellonObject::Arc(o) => o.unit,
        }
    }

    pub fn attributes(&self) -> &Attributes {
        match self {
            ExcellonObject::Flash(o) => &o.attributes,
            ExcellonObject::Line(o) => &o.attributes,
            ExcellonObject::Arc(o) => &o.attributes,
        }
    }

    /// Axis-aligned bounding box, widened by the tool's `width` (the
    /// primitives themselves carry no diameter — spec §3.7 keeps that on
    /// the tool, not duplicated per object).
    pub fn bounds(&self, width: f64) -> (f64, f64, f64, f64) {
        let half = width / 2.0;
        let (mut min_x, mut min_y, mut max_x, mut max_y) = match self {
            ExcellonObject::Flash(o) => (o.x, o.y, o.x, o.y),
            ExcellonObject::Line(o) => bbox_of_points(&[(o.x1, o.y1), (o.x2, o.y2)]),
            ExcellonObject::Arc(o) => bbox_of_points(&[(o.x1, o.y1), (o.x2, o.y2)]),
        };
        min_x -= half;
        min_y -= half;
        max_x += half;
        max_y += half;
        (min_x, min_y, max_x, max_y)
    }
}

/// Either a drilled hole or a routed slot: the derived view spec §3.7 calls
/// a "secondary Excellon→geometry projection" over the canonical
/// `ExcellonObject` list.
#[derive(Debug, Clone, PartialEq)]
pub enum ExcellonGeometry {
    Drill(Drill),
    Slot(Slot),
}

impl ExcellonGeometry {
    pub fn plated(&self) -> Option<bool> {
        match self {
            ExcellonGeometry::Drill(d) => d.plated,
            ExcellonGeometry::Slot(s) => s.plated,
        }
    }

    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        match self {
            ExcellonGeometry::Drill(d) => (
                d.x - d.diameter / 2.0,
                d.y - d.diameter / 2.0,
                d.x + d.diameter / 2.0,
                d.y + d.diameter / 2.0,
            ),
            ExcellonGeometry::Slot(s) => {
                let (mut min_x, mut min_y, mut max_x, mut max_y) = bbox_of_points(&[(s.x1, s.y1), (s.x2, s.y2)]);
                min_x -= s.width / 2.0;
                min_y -= s.width / 2.0;
                max_x += s.width / 2.0;
                max_y += s.width / 2.0;
                (min_x, min_y, max_x, max_y)
            }
        }
    }
}

/// Derive the `Drill`/`Slot` projection from the canonical object list
/// (spec §3.7). Each object's width/diameter and plating come from its
/// `Tool` entry, looked up by the handle its `ObjectRef::Tool` carries.
pub fn project_excellon_geometry(
    objects: &[ExcellonObject],
    tools: &crate::excellon::tool::ToolTable,
) -> Vec<ExcellonGeometry> {
    objects.iter().map(|o| project_one(o, tools)).collect()
}

fn project_one(obj: &ExcellonObject, tools: &crate::excellon::tool::ToolTable) -> ExcellonGeometry {
    let handle = obj.tool();
    let tool = tools.get_by_handle(handle);
    let diameter = tool.map(|t| t.unit.convert(t.diameter, obj.unit())).unwrap_or(0.0);
    let plated = tool.and_then(|t| t.plating.as_bool());

    match obj {
        ExcellonObject::Flash(f) => ExcellonGeometry::Drill(Drill {
            x: f.x,
            y: f.y,
            diameter,
            tool: handle,
            plated,
            unit: f.unit,
            attributes: f.attributes.clone(),
        }),
        ExcellonObject::Line(l) => ExcellonGeometry::Slot(Slot {
            x1: l.x1,
            y1: l.y1,
            x2: l.x2,
            y2: l.y2,
            width: diameter,
            tool: handle,
            plated,
            unit: l.unit,
            attributes: l.attributes.clone(),
            arc: None,
        }),
        ExcellonObject::Arc(a) => ExcellonGeometry::Slot(Slot {
            x1: a.x1,
            y1: a.y1,
            x2: a.x2,
            y2: a.y2,
            width: diameter,
            tool: handle,
            plated,
            unit: a.unit,
            attributes: a.attributes.clone(),
            arc: Some((a.clockwise, a.center())),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excellon::tool::ToolHandle;

    #[test]
    fn arc_radius_error_near_zero_for_consistent_arc() {
        let arc = Arc {
            x1: 1.0,
            y1: 0.0,
            x2: 0.0,
            y2: 1.0,
            cx: -1.0,
            cy: 0.0,
            clockwise: false,
            aperture: ObjectRef::Aperture(ApertureHandle(0)),
            polarity_dark: true,
            unit: LengthUnit::Millimeter,
            attributes: Attributes::new(),
        };
        assert!(arc.radius_error() < 1e-9);
    }

    #[test]
    fn bounds_reads_each_object_not_a_fixed_index() {
        let a = GerberObject::Flash(Flash {
            x: 1.0,
            y: 1.0,
            aperture: ObjectRef::Aperture(ApertureHandle(0)),
            polarity_dark: true,
            unit: LengthUnit::Millimeter,
            attributes: Attributes::new(),
        });
        let b = GerberObject::Flash(Flash {
            x: 5.0,
            y: 5.0,
            aperture: ObjectRef::Aperture(ApertureHandle(0)),
            polarity_dark: true,
            unit: LengthUnit::Millimeter,
            attributes: Attributes::new(),
        });
        assert_eq!(a.bounds(), Some((1.0, 1.0, 1.0, 1.0)));
        assert_eq!(b.bounds(), Some((5.0, 5.0, 5.0, 5.0)));
        let _ = ToolHandle(0);
    }

    #[test]
    fn projection_resolves_diameter_and_plating_from_tool_table() {
        use crate::excellon::tool::{Plating, Tool, ToolTable};

        let mut tools = ToolTable::new();
        tools.define(
            1,
            Tool {
                diameter: 0.8,
                depth_offset: None,
                plating: Plating::Plated,
                unit: LengthUnit::Millimeter,
            },
        );
        let handle = tools.handle(1).unwrap();

        let objects = vec![ExcellonObject::Flash(Flash {
            x: 2.0,
            y: 3.0,
            aperture: ObjectRef::Tool(handle),
            polarity_dark: true,
            unit: LengthUnit::Millimeter,
            attributes: Attributes::new(),
        })];

        let projected = project_excellon_geometry(&objects, &tools);
        assert_eq!(projected.len(), 1);
        match &projected[0] {
            ExcellonGeometry::Drill(d) => {
                assert!((d.diameter - 0.8).abs() < 1e-9);
                assert_eq!(d.plated, Some(true));
            }
            other => panic!("expected a drill, got {other:?}"),
        }
    }
}
