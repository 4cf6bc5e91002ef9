//! Canonical Gerber emitter (spec §4.7).
//!
//! Order: generator comment, file attributes, `MO`, `FS`, `IP POS`, `G75`,
//! `LPD`, the four canonical macros, user macros, `ADD` from D10, object
//! statements, `M02`. An output-side graphics state suppresses redundant
//! polarity/aperture/point changes, mirroring the teacher's `write!`-based
//! emitter (`gerber_file.rs::GerberFile::write`) generalised to cover
//! regions and macro apertures it didn't previously emit.

use std::fmt::Write as _;

use crate::aperture::ApertureTemplate;
use crate::gerber::file::GerberFile;
use crate::object::GerberObject;
use crate::units::{emit_coordinate_value, LengthUnit, NumberFormat, ZeroSuppression};

const CANONICAL_CIRCLE: &str = "CIRCLE";
const CANONICAL_RECT: &str = "RECT";
const CANONICAL_OBROUND: &str = "OBROUND";
const CANONICAL_POLYGON: &str = "POLYGON";

struct EmitContext {
    aperture: Option<usize>,
    polarity_dark: Option<bool>,
    point: Option<(f64, f64)>,
    interpolation: Option<char>,
}

pub fn emit(file: &GerberFile) -> String {
    let mut out = String::new();
    let unit = file.unit.unwrap_or(LengthUnit::Millimeter);
    let format = if file.number_format.is_known() {
        file.number_format
    } else {
        NumberFormat::new(3, 4)
    };
    let int_digits = format.integer_digits.unwrap();
    let frac_digits = format.fractional_digits.unwrap();

    writeln!(out, "G04 Gerber file generated by gerberforge*").unwrap();
    for (name, values) in &file.file_attributes {
        writeln!(out, "%TF{name}{}*%", join_attr_values(values)).unwrap();
    }
    writeln!(out, "%MO{}*%", if unit == LengthUnit::Inch { "IN" } else { "MM" }).unwrap();
    writeln!(out, "%FSLAX{int_digits}{frac_digits}Y{int_digits}{frac_digits}*%").unwrap();
    writeln!(out, "%IPPOS*%").unwrap();
    writeln!(out, "G75*").unwrap();
    writeln!(out, "%LPD*%").unwrap();

    emit_canonical_macros(&mut out);

    let mut macro_names: Vec<String> = Vec::with_capacity(file.macros.len());
    let mut seen_canonical: std::collections::HashMap<String, String> = std::collections::HashMap::new();
    for (idx, macro_def) in file.macros.iter().enumerate() {
        let canonical = macro_def.canonical_text();
        let name = seen_canonical.entry(canonical).or_insert_with(|| format!("USERMACRO{idx}")).clone();
        writeln!(out, "%AM{name}*").unwrap();
        for primitive in &macro_def.content {
            writeln!(out, "{}*", describe_macro_primitive(primitive)).unwrap();
        }
        writeln!(out, "%").unwrap();
        macro_names.push(name);
    }

    let mut d_code_by_index = Vec::with_capacity(file.apertures.len());
    let mut next_code = 10u32;
    for aperture in &file.apertures {
        let code = next_code;
        next_code += 1;
        d_code_by_index.push(code);

        if aperture.has_trivial_transform() {
            match &aperture.template {
                ApertureTemplate::Circle { diameter, hole_diameter } => {
                    writeln!(out, "%ADD{code}C,{}{}*%", fmt_num(*diameter), opt_hole(*hole_diameter)).unwrap();
                }
                ApertureTemplate::Rectangle { width, height, hole_diameter } => {
                    writeln!(out, "%ADD{code}R,{}X{}{}*%", fmt_num(*width), fmt_num(*height), opt_hole(*hole_diameter)).unwrap();
                }
                ApertureTemplate::Obround { width, height, hole_diameter } => {
                    writeln!(out, "%ADD{code}O,{}X{}{}*%", fmt_num(*width), fmt_num(*height), opt_hole(*hole_diameter)).unwrap();
                }
                ApertureTemplate::Polygon { outer_diameter, vertices, rotation, hole_diameter } => {
                    writeln!(
                        out,
                        "%ADD{code}P,{}X{}X{}{}*%",
                        fmt_num(*outer_diameter),
                        vertices,
                        fmt_num(*rotation),
                        opt_hole(*hole_diameter)
                    )
                    .unwrap();
                }
                ApertureTemplate::MacroInstance { macro_ref, parameters, .. } => {
                    let name = macro_names.get(macro_ref.0).cloned().unwrap_or_else(|| "USERMACRO".to_string());
                    writeln!(out, "%ADD{code}{name}{}*%", join_params(parameters)).unwrap();
                }
            }
        } else {
            // Non-trivial rotation/mirror/scale: lower onto one of the four
            // canonical macros rather than a standard shape (spec §4.2).
            let (name, params) = lower_to_canonical_macro(aperture);
            writeln!(out, "%ADD{code}{name}{}*%", join_params(&params)).unwrap();
        }
    }

    let mut ctx = EmitContext {
        aperture: None,
        polarity_dark: None,
        point: None,
        interpolation: None,
    };

    for (idx, object) in file.objects.iter().enumerate() {
        emit_object(&mut out, object, idx, &d_code_by_index, &mut ctx, int_digits, frac_digits);
    }

    writeln!(out, "M02*").unwrap();
    out
}

fn fmt_num(value: f64) -> String {
    let mut s = format!("{value}");
    if !s.contains('.') {
        s.push_str(".0");
    }
    s
}

fn opt_hole(hole: Option<f64>) -> String {
    hole.map(|h| format!("X{}", fmt_num(h))).unwrap_or_default()
}

fn join_params(params: &[f64]) -> String {
    if params.is_empty() {
        String::new()
    } else {
        format!(",{}", params.iter().map(|v| fmt_num(*v)).collect::<Vec<_>>().join("X"))
    }
}

fn join_attr_values(values: &[String]) -> String {
    if values.is_empty() {
        String::new()
    } else {
        format!(",{}", values.join(","))
    }
}

fn lower_to_canonical_macro(aperture: &crate::aperture::Aperture) -> (&'static str, Vec<f64>) {
    let rotation_degrees = aperture.rotation.to_degrees();
    match &aperture.template {
        ApertureTemplate::Circle { diameter, .. } => (CANONICAL_CIRCLE, vec![*diameter * aperture.scale, rotation_degrees]),
        ApertureTemplate::Rectangle { width, height, .. } => {
            (CANONICAL_RECT, vec![*width * aperture.scale, *height * aperture.scale, rotation_degrees])
        }
        ApertureTemplate::Obround { width, height, .. } => {
            (CANONICAL_OBROUND, vec![*width * aperture.scale, *height * aperture.scale, rotation_degrees])
        }
        ApertureTemplate::Polygon { outer_diameter, vertices, .. } => {
            (CANONICAL_POLYGON, vec![*outer_diameter * aperture.scale, *vertices as f64, rotation_degrees])
        }
        ApertureTemplate::MacroInstance { .. } => (CANONICAL_CIRCLE, vec![aperture.equivalent_width(), rotation_degrees]),
    }
}

fn emit_canonical_macros(out: &mut String) {
    writeln!(out, "%AM{CANONICAL_CIRCLE}*").unwrap();
    writeln!(out, "1,1,$1,0,0,$2*").unwrap();
    writeln!(out, "%").unwrap();

    writeln!(out, "%AM{CANONICAL_RECT}*").unwrap();
    writeln!(out, "21,1,$1,$2,0,0,$3*").unwrap();
    writeln!(out, "%").unwrap();

    writeln!(out, "%AM{CANONICAL_OBROUND}*").unwrap();
    writeln!(out, "21,1,$1,$2,0,0,$3*").unwrap();
    writeln!(out, "%").unwrap();

    writeln!(out, "%AM{CANONICAL_POLYGON}*").unwrap();
    writeln!(out, "5,1,$2,0,0,$1,$3*").unwrap();
    writeln!(out, "%").unwrap();
}

fn describe_macro_primitive(primitive: &crate::aperture::MacroContent) -> String {
    use crate::aperture::MacroContent;
    match primitive {
        MacroContent::Comment => "0 comment".to_string(),
        MacroContent::Circle { exposure, diameter, center, rotation } => {
            format!("1,{exposure},{diameter},{},{},{rotation}", center.0, center.1)
        }
        MacroContent::VectorLine { exposure, width, start, end, rotation } => {
            format!("20,{exposure},{width},{},{},{},{},{rotation}", start.0, start.1, end.0, end.1)
        }
        MacroContent::CenterLine { exposure, size, center, rotation } => {
            format!("21,{exposure},{},{},{},{},{rotation}", size.0, size.1, center.0, center.1)
        }
        MacroContent::Outline { exposure, points, rotation } => {
            let coords = points.iter().map(|(x, y)| format!("{x},{y}")).collect::<Vec<_>>().join(",");
            format!("4,{exposure},{},{coords},{rotation}", points.len().saturating_sub(1))
        }
        MacroContent::Polygon { exposure, vertices, center, diameter, rotation } => {
            format!("5,{exposure},{vertices},{},{},{diameter},{rotation}", center.0, center.1)
        }
        MacroContent::Thermal { center, outer_diameter, inner_diameter, gap_thickness, rotation } => {
            format!("6,{},{},{outer_diameter},{inner_diameter},{gap_thickness},{rotation}", center.0, center.1)
        }
        MacroContent::VariableDefinition { variable, expression } => format!("${variable}={expression}"),
    }
}

fn emit_object(
    out: &mut String,
    object: &GerberObject,
    index: usize,
    d_code_by_index: &[u32],
    ctx: &mut EmitContext,
    int_digits: u32,
    frac_digits: u32,
) {
    let emit_coord = |v: f64| emit_coordinate_value(v, int_digits, frac_digits, ZeroSuppression::None);

    if ctx.polarity_dark != Some(object.polarity_dark()) {
        writeln!(out, "%LP{}*%", if object.polarity_dark() { 'D' } else { 'C' }).unwrap();
        ctx.polarity_dark = Some(object.polarity_dark());
    }

    match object {
        GerberObject::Flash(flash) => {
            set_aperture(out, aperture_index_of(&flash.aperture), d_code_by_index, ctx);
            writeln!(out, "X{}Y{}D03*", emit_coord(flash.x), emit_coord(flash.y)).unwrap();
            ctx.point = Some((flash.x, flash.y));
        }
        GerberObject::Line(line) => {
            set_aperture(out, aperture_index_of(&line.aperture), d_code_by_index, ctx);
            if ctx.point != Some((line.x1, line.y1)) {
                writeln!(out, "X{}Y{}D02*", emit_coord(line.x1), emit_coord(line.y1)).unwrap();
            }
            set_interpolation(out, ctx, 'L');
            writeln!(out, "X{}Y{}D01*", emit_coord(line.x2), emit_coord(line.y2)).unwrap();
            ctx.point = Some((line.x2, line.y2));
        }
        GerberObject::Arc(arc) => {
            set_aperture(out, aperture_index_of(&arc.aperture), d_code_by_index, ctx);
            if ctx.point != Some((arc.x1, arc.y1)) {
                writeln!(out, "X{}Y{}D02*", emit_coord(arc.x1), emit_coord(arc.y1)).unwrap();
            }
            set_interpolation(out, ctx, if arc.clockwise { 'C' } else { 'W' });
            writeln!(
                out,
                "X{}Y{}I{}J{}D01*",
                emit_coord(arc.x2),
                emit_coord(arc.y2),
                emit_coord(arc.cx),
                emit_coord(arc.cy)
            )
            .unwrap();
            ctx.point = Some((arc.x2, arc.y2));
        }
        GerberObject::Region(region) => {
            let _ = index;
            writeln!(out, "G36*").unwrap();
            if let Some((x0, y0)) = region.outline.first() {
                writeln!(out, "X{}Y{}D02*", emit_coord(*x0), emit_coord(*y0)).unwrap();
            }
            for (point, arc_datum) in region.outline.iter().skip(1).zip(region.arcs.iter()) {
                match arc_datum {
                    None => {
                        writeln!(out, "X{}Y{}D01*", emit_coord(point.0), emit_coord(point.1)).unwrap();
                    }
                    Some((clockwise, center)) => {
                        writeln!(out, "G75*").unwrap();
                        set_interpolation(out, ctx, if *clockwise { 'C' } else { 'W' });
                        writeln!(
                            out,
                            "X{}Y{}I{}J{}D01*",
                            emit_coord(point.0),
                            emit_coord(point.1),
                            emit_coord(center.0),
                            emit_coord(center.1)
                        )
                        .unwrap();
                    }
                }
            }
            writeln!(out, "G37*").unwrap();
            ctx.point = region.outline.last().copied();
        }
    }
}

fn aperture_index_of(aperture_ref: &crate::object::ObjectRef) -> usize {
    match aperture_ref {
        crate::object::ObjectRef::Aperture(handle) => handle.0,
        crate::object::ObjectRef::Tool(_) => unreachable!("Gerber objects never reference a tool handle"),
    }
}

fn set_aperture(out: &mut String, index: usize, d_code_by_index: &[u32], ctx: &mut EmitContext) {
    if ctx.aperture != Some(index) {
        if let Some(&code) = d_code_by_index.get(index) {
            writeln!(out, "D{code}*").unwrap();
        }
        ctx.aperture = Some(index);
    }
}

fn set_interpolation(out: &mut String, ctx: &mut EmitContext, mode: char) {
    if ctx.interpolation != Some(mode) {
        let code = match mode {
            'L' => "G01",
            'C' => "G02",
            _ => "G03",
        };
        writeln!(out, "{code}*").unwrap();
        ctx.interpolation = Some(mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aperture::{Aperture, ApertureHandle};
    use crate::object::{Flash, ObjectRef, Region};

    #[test]
    fn emits_m02_terminator_and_canonical_macros() {
        let mut file = GerberFile::default();
        file.unit = Some(LengthUnit::Millimeter);
        file.number_format = NumberFormat::new(3, 4);
        file.apertures.push(Aperture::new(
            ApertureTemplate::Circle { diameter: 0.5, hole_diameter: None },
            LengthUnit::Millimeter,
        ));
        file.objects.push(GerberObject::Flash(Flash {
            x: 1.0,
            y: 2.0,
            aperture: ObjectRef::Aperture(ApertureHandle(0)),
            polarity_dark: true,
            unit: LengthUnit::Millimeter,
            attributes: Default::default(),
        }));

        let text = emit(&file);
        assert!(text.contains(CANONICAL_CIRCLE));
        assert!(text.contains("ADD10C,0.5"));
        assert!(text.contains("D10*"));
        assert!(text.trim_end().ends_with("M02*"));
    }

    #[test]
    fn region_clockwise_arc_emits_g02_not_silently_linear() {
        let mut file = GerberFile::default();
        file.unit = Some(LengthUnit::Millimeter);
        file.number_format = NumberFormat::new(3, 4);
        file.objects.push(GerberObject::Region(Region {
            outline: vec![(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)],
            arcs: vec![None, Some((true, (0.0, 0.0))), None],
            polarity_dark: true,
            unit: LengthUnit::Millimeter,
            attributes: Default::default(),
        }));

        let text = emit(&file);
        let g36 = text.find("G36*").unwrap();
        let g37 = text.find("G37*").unwrap();
        let body = &text[g36..g37];
        assert!(body.contains("G02*"), "clockwise region arc must set interpolation, got:\n{body}");
        assert!(!body.contains("G03*"));
    }
}
