//! Excellon/XNC parser (spec §4.6).
//!
//! Line-oriented, dialect-tolerant, grounded in the teacher's
//! `parsing/drill.rs` + `drill_file.rs` pair but restructured as a single
//! state machine over raw lines instead of two passes over a nom command
//! enum — Excellon dialects disagree enough on tokens (see the Allegro and
//! EasyEDA tool-definition comment forms) that a line-level dispatch table
//! (spec §9: "regex dispatch table") reads more plainly than a single
//! unified grammar. Two bugs present in the teacher's `parsing/drill.rs`
//! are fixed here rather than reproduced: `G90`/`G91` (absolute/
//! incremental) were both parsed as `G90`, and `G02`/`G03` (cw/ccw) were
//! both parsed as `G02`.

use crate::error::{Diagnostics, ExcellonError, SourcePosition};
use crate::excellon::tool::{Plating, Tool, ToolTable};
use crate::object::{Arc, ExcellonObject, Flash, Line, ObjectRef};
use crate::units::{FileSettings, LengthUnit, Notation, NumberFormat, ZeroSuppression};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    None,
    Header,
    Drilling,
    Routing,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteMode {
    Linear,
    ClockwiseArc,
    CounterClockwiseArc,
}

pub struct ExcellonParseResult {
    pub objects: Vec<ExcellonObject>,
    pub comments: Vec<String>,
    pub tools: ToolTable,
    pub settings: FileSettings,
    pub generator_hints: Vec<String>,
    pub diagnostics: Diagnostics,
}

struct Parser {
    state: ProgramState,
    settings: FileSettings,
    tools: ToolTable,
    current_tool: Option<u32>,
    position: (f64, f64),
    have_position: bool,
    route_mode: RouteMode,
    drill_down: bool,
    objects: Vec<ExcellonObject>,
    comments: Vec<String>,
    generator_hints: Vec<String>,
    diagnostics: Diagnostics,
    line_number: u32,
}

/// Parse an Excellon/XNC file. `sidecar_settings`, if present, seeds the
/// format discovered from an Allegro `nc_param.txt`/`ncdrill.log` sidecar
/// (spec §4.6 "sidecar sniffing"); in-file dialect comments still layer on
/// top of it.
pub fn parse(data: &str, sidecar_settings: Option<FileSettings>) -> Result<ExcellonParseResult, ExcellonError> {
    let mut parser = Parser {
        state: ProgramState::None,
        settings: sidecar_settings.unwrap_or_default(),
        tools: ToolTable::new(),
        current_tool: None,
        position: (0.0, 0.0),
        have_position: false,
        route_mode: RouteMode::Linear,
        drill_down: false,
        objects: Vec::new(),
        comments: Vec::new(),
        generator_hints: Vec::new(),
        diagnostics: Diagnostics::new(),
        line_number: 0,
    };

    for raw_line in data.lines() {
        parser.line_number += 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        parser.process_line(line)?;
        if parser.state == ProgramState::Finished {
            break;
        }
    }

    Ok(ExcellonParseResult {
        objects: parser.objects,
        comments: parser.comments,
        tools: parser.tools,
        settings: parser.settings,
        generator_hints: parser.generator_hints,
        diagnostics: parser.diagnostics,
    })
}

impl Parser {
    fn pos(&self) -> SourcePosition {
        SourcePosition {
            line: self.line_number,
            column: 1,
        }
    }

    fn process_line(&mut self, line: &str) -> Result<(), ExcellonError> {
        if let Some(comment) = line.strip_prefix(';') {
            return self.process_comment(comment.trim());
        }

        match line {
            "M48" => {
                self.state = ProgramState::Header;
                return Ok(());
            }
            "%" => {
                self.state = match self.state {
                    ProgramState::Header | ProgramState::None => ProgramState::Drilling,
                    other => other,
                };
                return Ok(());
            }
            "M95" => {
                self.state = ProgramState::Drilling;
                return Ok(());
            }
            "M30" => {
                self.state = ProgramState::Finished;
                return Ok(());
            }
            "G05" => {
                self.state = ProgramState::Drilling;
                return Ok(());
            }
            "G90" => {
                self.settings.notation = Some(Notation::Absolute);
                return Ok(());
            }
            "G91" => {
                self.settings.notation = Some(Notation::Incremental);
                return Ok(());
            }
            "G01" => {
                self.route_mode = RouteMode::Linear;
                return Ok(());
            }
            "G02" => {
                self.route_mode = RouteMode::ClockwiseArc;
                return Ok(());
            }
            "G03" => {
                self.route_mode = RouteMode::CounterClockwiseArc;
                return Ok(());
            }
            "M15" => {
                self.drill_down = true;
                return Ok(());
            }
            "M16" | "M17" => {
                self.drill_down = false;
                return Ok(());
            }
            "METRIC" => {
                self.settings.unit = Some(LengthUnit::Millimeter);
                return Ok(());
            }
            "INCH" => {
                self.settings.unit = Some(LengthUnit::Inch);
                return Ok(());
            }
            "M71" => {
                self.settings.unit = Some(LengthUnit::Millimeter);
                return Ok(());
            }
            "M72" => {
                self.settings.unit = Some(LengthUnit::Inch);
                return Ok(());
            }
            "M00" => {
                self.diagnostics.warn(
                    self.pos(),
                    "M00 (next tool) semantics are ambiguous in this dialect; tool selection left unchanged",
                );
                return Ok(());
            }
            "ICI,ON" => {
                self.settings.notation = Some(Notation::Incremental);
                return Ok(());
            }
            "ICI,OFF" => {
                self.settings.notation = Some(Notation::Absolute);
                return Ok(());
            }
            "FMAT,2" => return Ok(()),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix("METRIC,").or_else(|| line.strip_prefix("INCH,")) {
            let unit = if line.starts_with("METRIC") {
                LengthUnit::Millimeter
            } else {
                LengthUnit::Inch
            };
            self.settings.unit = Some(unit);
            self.parse_unit_modifiers(rest);
            return Ok(());
        }

        if line.starts_with("G00") {
            self.state = ProgramState::Routing;
            if let Some(coord) = line.strip_prefix("G00") {
                if !coord.is_empty() {
                    self.handle_coordinate_in_routing(coord, RouteMode::Linear)?;
                }
            }
            return Ok(());
        }

        for (prefix, mode) in [
            ("G01", RouteMode::Linear),
            ("G02", RouteMode::ClockwiseArc),
            ("G03", RouteMode::CounterClockwiseArc),
        ] {
            if let Some(coord) = line.strip_prefix(prefix) {
                if !coord.is_empty() {
                    self.state = ProgramState::Routing;
                    return self.handle_coordinate_in_routing(coord, mode);
                }
            }
        }

        if let Some(rest) = line.strip_prefix('T') {
            return self.process_tool_statement(rest);
        }

        if let Some(rest) = line.strip_prefix('R') {
            return self.process_repeat(rest);
        }

        if line.contains("G85") {
            return self.process_slot(line);
        }

        if line.starts_with('X') || line.starts_with('Y') {
            return self.process_coordinate(line);
        }

        self.diagnostics.unknown_statement(self.pos(), format!("unrecognised Excellon statement \"{line}\""));
        Ok(())
    }

    fn parse_unit_modifiers(&mut self, rest: &str) {
        for token in rest.split(',') {
            match token {
                "LZ" => self.settings.zero_suppression = Some(ZeroSuppression::Leading),
                "TZ" => self.settings.zero_suppression = Some(ZeroSuppression::Trailing),
                _ => {
                    if let Some((int_part, frac_part)) = token.split_once('.') {
                        let int_digits = int_part.chars().filter(|c| c.is_ascii_digit()).count() as u32;
                        let frac_digits = frac_part.chars().filter(|c| c.is_ascii_digit()).count() as u32;
                        if int_digits > 0 || frac_digits > 0 {
                            self.settings.number_format = NumberFormat::new(int_digits, frac_digits);
                        }
                    }
                }
            }
        }
    }

    fn process_comment(&mut self, text: &str) -> Result<(), ExcellonError> {
        // Dialect generator hints + number-format discovery (spec §4.6).
        if text.starts_with("FILE_FORMAT=") {
            if let Some(spec) = text.strip_prefix("FILE_FORMAT=") {
                self.apply_colon_format(spec);
            }
            self.note_hint("altium");
        } else if text.starts_with("FORMAT={") {
            // KiCad `;FORMAT={L:F / absolute / inch / decimal}`-ish comment.
            if let Some(inner) = text.strip_prefix("FORMAT={").and_then(|s| s.split(' ').next()) {
                self.apply_colon_format(inner);
            }
            self.note_hint("kicad");
        } else if let Some(rest) = text.strip_prefix("Format") {
            // Siemens `; Format : 2.4 / Absolute / MM / Leading` (note:
            // Siemens inverts the suppression word, spec scenario S6).
            self.note_hint("siemens");
            self.apply_siemens_format(rest);
        } else if text.starts_with("Holesize") {
            self.note_hint("easyeda");
            self.process_easyeda_tooldef(text)?;
        } else if text.starts_with('T') && text.contains("Holesize") {
            self.note_hint("allegro");
            self.process_allegro_tooldef(text)?;
        } else if text.to_ascii_lowercase().contains("allegro") {
            self.note_hint("allegro");
        } else if text.to_ascii_lowercase().contains("eagle") {
            self.note_hint("eagle");
        } else if text.to_ascii_lowercase().contains("kicad") {
            self.note_hint("kicad");
        }

        self.comments.push(text.to_string());
        Ok(())
    }

    fn note_hint(&mut self, hint: &str) {
        if !self.generator_hints.iter().any(|h| h == hint) {
            self.generator_hints.push(hint.to_string());
        }
    }

    /// Parse a `"X:Y"` or `"X.Y"` digit-count format descriptor shared by
    /// the Altium/KiCad dialect comments.
    fn apply_colon_format(&mut self, spec: &str) {
        let spec = spec.trim_end_matches('}');
        let sep = if spec.contains(':') { ':' } else { '.' };
        if let Some((int_part, frac_part)) = spec.split_once(sep) {
            if let (Ok(i), Ok(f)) = (int_part.trim().parse(), frac_part.trim().parse()) {
                self.settings.number_format = NumberFormat::new(i, f);
            }
        }
    }

    fn apply_siemens_format(&mut self, rest: &str) {
        let fields: Vec<&str> = rest.split('/').map(str::trim).collect();
        let fields: Vec<&str> = if fields.len() == 1 {
            rest.trim_start_matches(':').split('/').map(str::trim).collect()
        } else {
            fields
        };
        for field in &fields {
            let field = field.trim_start_matches(':').trim();
            if let Some((i, f)) = field.split_once('.') {
                if let (Ok(i), Ok(f)) = (i.trim().parse(), f.trim().parse()) {
                    self.settings.number_format = NumberFormat::new(i, f);
                }
            } else if field.eq_ignore_ascii_case("absolute") {
                self.settings.notation = Some(Notation::Absolute);
            } else if field.eq_ignore_ascii_case("incremental") {
                self.settings.notation = Some(Notation::Incremental);
            } else if field.eq_ignore_ascii_case("mm") {
                self.settings.unit = Some(LengthUnit::Millimeter);
            } else if field.eq_ignore_ascii_case("inch") {
                self.settings.unit = Some(LengthUnit::Inch);
            } else if field.eq_ignore_ascii_case("leading") {
                // Siemens inverts the suppression word (spec scenario S6).
                self.settings.zero_suppression = Some(ZeroSuppression::Trailing);
            } else if field.eq_ignore_ascii_case("trailing") {
                self.settings.zero_suppression = Some(ZeroSuppression::Leading);
            }
        }
    }

    fn process_easyeda_tooldef(&mut self, text: &str) -> Result<(), ExcellonError> {
        // ";Holesize <i> = <d> (INCH|MM)"
        let rest = text.trim_start_matches("Holesize").trim();
        let (index_str, rest) = rest.split_once('=').ok_or_else(|| self.syntax_error(text, "malformed EasyEDA tool definition"))?;
        let rest = rest.trim();
        let mut parts = rest.split_whitespace();
        let diameter_str = parts.next().ok_or_else(|| self.syntax_error(text, "missing diameter"))?;
        let unit_str = parts.next().unwrap_or("MM");

        let index: u32 = index_str.trim().parse().map_err(|_| self.syntax_error(text, "bad tool index"))?;
        let diameter: f64 = diameter_str.parse().map_err(|_| self.syntax_error(text, "bad diameter"))?;
        let unit = if unit_str.eq_ignore_ascii_case("INCH") {
            LengthUnit::Inch
        } else {
            LengthUnit::Millimeter
        };

        let redefined = self.tools.define(
            index,
            Tool {
                diameter,
                depth_offset: None,
                plating: Plating::Unknown,
                unit,
            },
        );
        if redefined {
            self.diagnostics.warn(self.pos(), format!("tool T{index:02} redefined"));
        }
        Ok(())
    }

    fn process_allegro_tooldef(&mut self, text: &str) -> Result<(), ExcellonError> {
        // "T<i> Holesize ... = <d> ... (PLATED|NON_PLATED|OPTIONAL) (MILS|MM)"
        let rest = text.trim_start_matches('T');
        let (index_str, rest) = rest.split_once(' ').ok_or_else(|| self.syntax_error(text, "malformed Allegro tool definition"))?;
        let index: u32 = index_str.trim().parse().map_err(|_| self.syntax_error(text, "bad tool index"))?;

        let (_, rest) = rest.split_once('=').ok_or_else(|| self.syntax_error(text, "missing '=' in Allegro tool definition"))?;
        let mut fields = rest.split_whitespace();
        let diameter: f64 = fields
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.syntax_error(text, "bad diameter"))?;

        let upper = rest.to_ascii_uppercase();
        let plating = if upper.contains("NON_PLATED") {
            Plating::NonPlated
        } else if upper.contains("PLATED") || upper.contains("OPTIONAL") {
            Plating::Plated
        } else {
            Plating::Unknown
        };
        let unit = if upper.contains("MILS") {
            LengthUnit::Inch
        } else {
            LengthUnit::Millimeter
        };
        let diameter = if upper.contains("MILS") { diameter / 1000.0 } else { diameter };

        let redefined = self.tools.define(
            index,
            Tool {
                diameter,
                depth_offset: None,
                plating,
                unit,
            },
        );
        if redefined {
            self.diagnostics.warn(self.pos(), format!("tool T{index:02} redefined"));
        }
        Ok(())
    }

    /// Handle a `T<nn>[C<d>][Z<d>]...` statement: definition (header, has
    /// trailing letters) or selection (body, bare index, or `T00`
    /// end-of-program marker).
    fn process_tool_statement(&mut self, rest: &str) -> Result<(), ExcellonError> {
        let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (index_str, params) = rest.split_at(digits_end);
        let index: u32 = index_str.parse().map_err(|_| self.syntax_error(rest, "bad tool index"))?;

        if params.is_empty() {
            if index == 0 {
                // T0 is an end-of-program marker, distinct from T00 tool
                // selection in dialects that zero-pad; treat a literal
                // bare "0" the same as M00 would be ambiguous to
                // disambiguate here, so just select (warn is emitted by
                // callers that actually hit the "no tool defined" case).
                self.current_tool = Some(0);
                return Ok(());
            }
            if self.tools.get(index).is_none() {
                self.diagnostics.warn(self.pos(), format!("T{index:02} selected before it was defined"));
            }
            self.current_tool = Some(index);
            return Ok(());
        }

        let mut diameter = None;
        let mut depth_offset = None;
        let mut chars = params.char_indices().peekable();
        while let Some((i, letter)) = chars.next() {
            if !letter.is_ascii_alphabetic() {
                continue;
            }
            let start = i + 1;
            let end = params[start..]
                .find(|c: char| c.is_ascii_alphabetic())
                .map(|rel| start + rel)
                .unwrap_or(params.len());
            let value_str = &params[start..end];
            let value: f64 = value_str.parse().unwrap_or(0.0);
            match letter {
                'C' => diameter = Some(value),
                'Z' => depth_offset = Some(value),
                _ => {}
            }
            while let Some(&(j, _)) = chars.peek() {
                if j < end {
                    chars.next();
                } else {
                    break;
                }
            }
        }

        let diameter = diameter.ok_or_else(|| self.syntax_error(rest, "tool definition missing C<diameter>"))?;
        let redefined = self.tools.define(
            index,
            Tool {
                diameter,
                depth_offset,
                plating: Plating::Unknown,
                unit: self.settings.unit.unwrap_or(LengthUnit::Millimeter),
            },
        );
        if redefined {
            self.diagnostics.warn(self.pos(), format!("tool T{index:02} redefined"));
        }
        Ok(())
    }

    fn process_repeat(&mut self, rest: &str) -> Result<(), ExcellonError> {
        if self.state == ProgramState::Header {
            return Ok(());
        }
        let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (count_str, rest) = rest.split_at(digits_end);
        let count: u32 = count_str.parse().unwrap_or(0);
        let (dx, dy) = self.parse_xy(rest)?;

        if count == 0 {
            return Ok(());
        }
        let tool_index = self.current_tool.unwrap_or(0);
        let tool_handle = self
            .tools
            .handle(tool_index)
            .ok_or_else(|| ExcellonError::UndefinedTool { position: self.pos(), index: tool_index })?;
        let tool = *self.tools.get(tool_index).expect("handle implies entry");

        for _ in 0..count {
            self.position.0 += dx.unwrap_or(0.0);
            self.position.1 += dy.unwrap_or(0.0);
            self.objects.push(ExcellonObject::Flash(Flash {
                x: self.position.0,
                y: self.position.1,
                aperture: ObjectRef::Tool(tool_handle),
                polarity_dark: true,
                unit: tool.unit,
                attributes: Default::default(),
            }));
        }
        Ok(())
    }

    fn process_slot(&mut self, line: &str) -> Result<(), ExcellonError> {
        let (first, second) = line
            .split_once("G85")
            .ok_or_else(|| self.syntax_error(line, "malformed G85 slot statement"))?;
        let (x1, y1) = self.parse_xy(first)?;
        let (x2, y2) = self.parse_xy(second)?;
        let x1 = x1.unwrap_or(self.position.0);
        let y1 = y1.unwrap_or(self.position.1);
        let x2 = x2.unwrap_or(x1);
        let y2 = y2.unwrap_or(y1);

        let tool_index = self.current_tool.unwrap_or(0);
        let tool_handle = self
            .tools
            .handle(tool_index)
            .ok_or_else(|| ExcellonError::UndefinedTool { position: self.pos(), index: tool_index })?;
        let tool = *self.tools.get(tool_index).expect("handle implies entry");

        self.position = (x2, y2);
        self.objects.push(ExcellonObject::Line(Line {
            x1,
            y1,
            x2,
            y2,
            aperture: ObjectRef::Tool(tool_handle),
            polarity_dark: true,
            unit: tool.unit,
            attributes: Default::default(),
        }));
        Ok(())
    }

    fn process_coordinate(&mut self, line: &str) -> Result<(), ExcellonError> {
        let (x, y) = self.parse_xy(line)?;
        let new_x = match (x, self.settings.notation) {
            (Some(v), Some(Notation::Incremental)) => self.position.0 + v,
            (Some(v), _) => v,
            (None, _) => self.position.0,
        };
        let new_y = match (y, self.settings.notation) {
            (Some(v), Some(Notation::Incremental)) => self.position.1 + v,
            (Some(v), _) => v,
            (None, _) => self.position.1,
        };

        match self.state {
            ProgramState::Routing => {
                let radius = self.parse_radius(line)?;
                self.handle_coordinate_in_routing_point(new_x, new_y, radius)?
            }
            _ => {
                self.position = (new_x, new_y);
                self.have_position = true;
                let tool_index = self.current_tool.unwrap_or(0);
                let tool_handle = self
                    .tools
                    .handle(tool_index)
                    .ok_or_else(|| ExcellonError::UndefinedTool { position: self.pos(), index: tool_index })?;
                let tool = *self.tools.get(tool_index).expect("handle implies entry");
                self.objects.push(ExcellonObject::Flash(Flash {
                    x: new_x,
                    y: new_y,
                    aperture: ObjectRef::Tool(tool_handle),
                    polarity_dark: true,
                    unit: tool.unit,
                    attributes: Default::default(),
                }));
            }
        }
        Ok(())
    }

    fn handle_coordinate_in_routing(&mut self, coord: &str, mode: RouteMode) -> Result<(), ExcellonError> {
        self.route_mode = mode;
        let (x, y) = self.parse_xy(coord)?;
        let radius = self.parse_radius(coord)?;
        let new_x = x.unwrap_or(self.position.0);
        let new_y = y.unwrap_or(self.position.1);
        self.handle_coordinate_in_routing_point(new_x, new_y, radius)
    }

    fn handle_coordinate_in_routing_point(&mut self, new_x: f64, new_y: f64, radius: Option<f64>) -> Result<(), ExcellonError> {
        if !self.drill_down {
            self.position = (new_x, new_y);
            return Ok(());
        }
        let tool_index = self.current_tool.unwrap_or(0);
        let tool_handle = self
            .tools
            .handle(tool_index)
            .ok_or_else(|| ExcellonError::UndefinedTool { position: self.pos(), index: tool_index })?;
        let tool = *self.tools.get(tool_index).expect("handle implies entry");
        let (x1, y1) = self.position;

        match self.route_mode {
            RouteMode::Linear => {
                self.objects.push(ExcellonObject::Line(Line {
                    x1,
                    y1,
                    x2: new_x,
                    y2: new_y,
                    aperture: ObjectRef::Tool(tool_handle),
                    polarity_dark: true,
                    unit: tool.unit,
                    attributes: Default::default(),
                }));
            }
            RouteMode::ClockwiseArc | RouteMode::CounterClockwiseArc => {
                let clockwise = self.route_mode == RouteMode::ClockwiseArc;
                // Endpoint-radius routing is expressed via a following
                // `A<radius>` word in some dialects; without one, or if the
                // radius is too short to reach the known endpoints, fall
                // back to a straight move between them.
                let center = radius.and_then(|r| arc_center_from_radius((x1, y1), (new_x, new_y), r, clockwise));
                match center {
                    Some((cx, cy)) => {
                        self.objects.push(ExcellonObject::Arc(Arc {
                            x1,
                            y1,
                            x2: new_x,
                            y2: new_y,
                            cx: cx - x1,
                            cy: cy - y1,
                            clockwise,
                            aperture: ObjectRef::Tool(tool_handle),
                            polarity_dark: true,
                            unit: tool.unit,
                            attributes: Default::default(),
                        }));
                    }
                    None => {
                        self.objects.push(ExcellonObject::Line(Line {
                            x1,
                            y1,
                            x2: new_x,
                            y2: new_y,
                            aperture: ObjectRef::Tool(tool_handle),
                            polarity_dark: true,
                            unit: tool.unit,
                            attributes: Default::default(),
                        }));
                    }
                }
            }
        }
        self.position = (new_x, new_y);
        Ok(())
    }

    fn parse_xy(&mut self, s: &str) -> Result<(Option<f64>, Option<f64>), ExcellonError> {
        let s = s.trim();
        let x_start = s.find('X');
        let y_start = s.find('Y');

        let x = match x_start {
            Some(start) => {
                let end = y_start.filter(|&y| y > start).unwrap_or(s.len());
                Some(self.settings.parse_coordinate_excellon(&s[start + 1..end], self.pos())?)
            }
            None => None,
        };
        let y = match y_start {
            Some(start) => {
                let end = s[start..]
                    .find(|c: char| c.is_ascii_alphabetic() && c != 'Y')
                    .map(|rel| start + rel)
                    .unwrap_or(s.len());
                Some(self.settings.parse_coordinate_excellon(&s[start + 1..end], self.pos())?)
            }
            None => None,
        };
        Ok((x, y))
    }

    /// Extract a trailing `A<radius>` field from a routing coordinate line
    /// (spec §4.6), the endpoint-radius notation real XNC routers emit
    /// alongside `G02`/`G03`.
    fn parse_radius(&mut self, s: &str) -> Result<Option<f64>, ExcellonError> {
        let s = s.trim();
        match s.find('A') {
            Some(start) => {
                let end = s[start..]
                    .find(|c: char| c.is_ascii_alphabetic() && c != 'A')
                    .map(|rel| start + rel)
                    .unwrap_or(s.len());
                Ok(Some(self.settings.parse_coordinate_excellon(&s[start + 1..end], self.pos())?))
            }
            None => Ok(None),
        }
    }

    fn syntax_error(&self, text: &str, reason: &str) -> ExcellonError {
        ExcellonError::Syntax {
            position: self.pos(),
            text: text.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Arc endpoint-radius to center conversion (spec §4.6), correcting the
/// teacher's `drill_file.rs` transcription bug (`center_offset_y` computed
/// from `chord_center.x`).
pub fn arc_center_from_radius(p1: (f64, f64), p2: (f64, f64), radius: f64, clockwise: bool) -> Option<(f64, f64)> {
    let (dx, dy) = (p2.0 - p1.0, p2.1 - p1.1);
    let chord_length = (dx * dx + dy * dy).sqrt();
    if chord_length < 1e-12 {
        return None;
    }
    let chord_half = chord_length / 2.0;
    let h_squared = radius * radius - chord_half * chord_half;
    if h_squared < 0.0 {
        return None;
    }
    let h = h_squared.sqrt();

    let mid = ((p1.0 + p2.0) / 2.0, (p1.1 + p2.1) / 2.0);
    let (ux, uy) = (dx / chord_length, dy / chord_length);
    let perp = (-uy, ux);

    Some(if clockwise {
        (mid.0 - h * perp.0, mid.1 - h * perp.1)
    } else {
        (mid.0 + h * perp.0, mid.1 + h * perp.1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s4_allegro_sidecar_drill() {
        let sidecar = "FORMAT 2.4\nCOORDINATES ABSOLUTE\nOUTPUT-UNITS METRIC\n\
                       SUPPRESS-LEAD-ZEROES NO\nSUPPRESS-TRAIL-ZEROES YES";
        let settings = crate::excellon::sidecar::parse_allegro_ncparam(sidecar).unwrap();

        let data = "T01\nT1\nX100000Y200000\n";
        let result = parse(data, Some(settings)).unwrap();

        assert_eq!(result.objects.len(), 1);
        match &result.objects[0] {
            ExcellonObject::Flash(f) => {
                assert!((f.x - 10.0).abs() < 1e-6);
                assert!((f.y - 20.0).abs() < 1e-6);
            }
            _ => panic!("expected a flash"),
        }
    }

    #[test]
    fn m00_warns_and_leaves_tool_selection_unchanged() {
        let mut settings = FileSettings::new();
        settings.unit = Some(LengthUnit::Millimeter);
        settings.number_format = NumberFormat::new(2, 4);
        settings.zero_suppression = Some(ZeroSuppression::Trailing);
        let data = "T01C0.3\nT1\nM00\nX10Y10\n";
        let result = parse(data, Some(settings)).unwrap();
        assert!(result.diagnostics.iter().any(|d| d.message.contains("M00")));
        assert_eq!(result.objects.len(), 1);
    }

    #[test]
    fn arc_center_matches_known_quarter_circle() {
        let p1 = (1.0, 0.0);
        let p2 = (0.0, 1.0);
        let center = arc_center_from_radius(p1, p2, 1.0, false).unwrap();
        assert!((center.0 - 0.0).abs() < 1e-6);
        assert!((center.1 - 0.0).abs() < 1e-6);
    }

    #[test]
    fn combined_form_g01_with_coordinates_is_a_linear_route() {
        let mut settings = FileSettings::new();
        settings.unit = Some(LengthUnit::Millimeter);
        settings.number_format = NumberFormat::new(2, 4);
        let data = "T01C0.3\nT1\nG00X0.0Y0.0\nM15\nG01X1.0Y0.0\nM17\n";
        let result = parse(data, Some(settings)).unwrap();
        assert_eq!(result.objects.len(), 1);
        match &result.objects[0] {
            ExcellonObject::Line(l) => {
                assert!((l.x1 - 0.0).abs() < 1e-6);
                assert!((l.x2 - 1.0).abs() < 1e-6);
            }
            other => panic!("expected a linear route, got {other:?}"),
        }
    }

    #[test]
    fn routed_arc_with_endpoint_radius_resolves_a_center() {
        let mut settings = FileSettings::new();
        settings.unit = Some(LengthUnit::Millimeter);
        settings.number_format = NumberFormat::new(2, 4);
        let data = "T01C0.3\nT1\nG00X1.0Y0.0\nM15\nG03X0.0Y1.0A1.0\nM17\n";
        let result = parse(data, Some(settings)).unwrap();
        assert_eq!(result.objects.len(), 1);
        match &result.objects[0] {
            ExcellonObject::Arc(a) => {
                assert!(!a.clockwise);
                assert!((a.x1 + a.cx - 0.0).abs() < 1e-6);
                assert!((a.y1 + a.cy - 0.0).abs() < 1e-6);
            }
            other => panic!("expected a routed arc, got {other:?}"),
        }
    }

    #[test]
    fn repeat_zero_produces_no_objects() {
        let mut settings = FileSettings::new();
        settings.unit = Some(LengthUnit::Millimeter);
        settings.number_format = NumberFormat::new(2, 4);
        settings.zero_suppression = Some(ZeroSuppression::Trailing);
        let data = "T01C0.3\nT1\nR0X1Y1\n";
        let result = parse(data, Some(settings)).unwrap();
        assert!(result.objects.is_empty());
    }
}
