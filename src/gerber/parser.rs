//! Gerber statement parser (spec §4.5).
//!
//! Consumes `tokenizer::Token`s and drives `graphics_state::GraphicsState`
//! to build the object model. Dispatch is a first-match-wins table over
//! each token's leading command code, generalising the teacher's nom
//! command-enum (`parsing/gerber.rs::GerberCommand`) into the line-level
//! dispatch spec §9 calls for, since real dialects disagree enough on
//! which codes appear together in one word command that a single top-level
//! grammar doesn't stay readable.

use std::collections::HashMap;

use crate::aperture::{Aperture, ApertureHandle, ApertureMacro, ApertureTemplate, MacroHandle, Mirroring};
use crate::error::{Diagnostics, GerberError, SourcePosition};
use crate::gerber::graphics_state::{GraphicsState, ImageRotation, InterpolationResult, Mirror};
use crate::gerber::macro_parser;
use crate::gerber::tokenizer::{self, Token};
use crate::object::{Attributes, GerberObject, Region};
use crate::units::{LengthUnit, Notation, NumberFormat, ZeroSuppression};

pub struct GerberParseResult {
    pub objects: Vec<GerberObject>,
    pub apertures: Vec<Aperture>,
    pub aperture_index: HashMap<u32, ApertureHandle>,
    pub macros: Vec<ApertureMacro>,
    pub macro_index: HashMap<String, MacroHandle>,
    pub file_attributes: Attributes,
    pub comments: Vec<String>,
    pub generator_hints: Vec<String>,
    pub unit: Option<LengthUnit>,
    pub number_format: NumberFormat,
    pub diagnostics: Diagnostics,
}

struct RegionBuilder {
    polarity_dark: bool,
    unit: LengthUnit,
    outline: Vec<(f64, f64)>,
    arcs: Vec<crate::object::RegionArcDatum>,
}

struct Parser {
    graphics: GraphicsState,
    apertures: Vec<Aperture>,
    aperture_index: HashMap<u32, ApertureHandle>,
    macros: Vec<ApertureMacro>,
    macro_index: HashMap<String, MacroHandle>,
    objects: Vec<GerberObject>,
    comments: Vec<String>,
    generator_hints: Vec<String>,
    diagnostics: Diagnostics,
    zero_suppression: ZeroSuppression,
    number_format: NumberFormat,
    file_attrs: Attributes,
    aperture_attrs: Attributes,
    object_attrs: Attributes,
    region_open: bool,
    region: Option<RegionBuilder>,
    finished: bool,
    current_position: SourcePosition,
}

pub fn parse(input: &str) -> Result<GerberParseResult, GerberError> {
    let tokens = tokenizer::tokenize(input);
    let mut parser = Parser {
        graphics: GraphicsState::new(),
        apertures: Vec::new(),
        aperture_index: HashMap::new(),
        macros: Vec::new(),
        macro_index: HashMap::new(),
        objects: Vec::new(),
        comments: Vec::new(),
        generator_hints: Vec::new(),
        diagnostics: Diagnostics::new(),
        zero_suppression: ZeroSuppression::None,
        number_format: NumberFormat::default(),
        file_attrs: Attributes::new(),
        aperture_attrs: Attributes::new(),
        object_attrs: Attributes::new(),
        region_open: false,
        region: None,
        finished: false,
        current_position: SourcePosition::default(),
    };

    for token in &tokens {
        if parser.finished {
            break;
        }
        parser.current_position = SourcePosition { line: token.line, column: 1 };
        parser.dispatch(token)?;
    }

    Ok(GerberParseResult {
        objects: parser.objects,
        apertures: parser.apertures,
        aperture_index: parser.aperture_index,
        macros: parser.macros,
        macro_index: parser.macro_index,
        file_attributes: parser.file_attrs,
        comments: parser.comments,
        generator_hints: parser.generator_hints,
        unit: parser.graphics.unit,
        number_format: parser.graphics_number_format(),
        diagnostics: parser.diagnostics,
    })
}

#[derive(Debug, Default)]
struct CoordWord {
    g_codes: Vec<u32>,
    x: Option<String>,
    y: Option<String>,
    i: Option<String>,
    j: Option<String>,
    d: Option<u32>,
}

fn parse_coord_word(text: &str) -> Option<CoordWord> {
    let mut word = CoordWord::default();
    let bytes = text.as_bytes();
    let mut idx = 0;
    let mut saw_any = false;
    while idx < bytes.len() {
        let letter = bytes[idx] as char;
        if !matches!(letter, 'G' | 'X' | 'Y' | 'I' | 'J' | 'D') {
            return None;
        }
        let start = idx + 1;
        let mut end = start;
        while end < bytes.len() && !matches!(bytes[end] as char, 'G' | 'X' | 'Y' | 'I' | 'J' | 'D') {
            end += 1;
        }
        let value = &text[start..end];
        saw_any = true;
        match letter {
            'G' => {
                if let Ok(v) = value.parse() {
                    word.g_codes.push(v);
                }
            }
            'X' => word.x = Some(value.to_string()),
            'Y' => word.y = Some(value.to_string()),
            'I' => word.i = Some(value.to_string()),
            'J' => word.j = Some(value.to_string()),
            'D' => word.d = value.parse().ok(),
            _ => unreachable!(),
        }
        idx = end;
    }
    saw_any.then_some(word)
}

impl Parser {
    fn graphics_number_format(&self) -> NumberFormat {
        self.number_format
    }

    fn syntax_error(&self, text: &str, reason: impl Into<String>) -> GerberError {
        GerberError::Syntax {
            position: self.current_position,
            text: text.to_string(),
            reason: reason.into(),
        }
    }

    fn parse_len(&self, s: &str) -> Result<f64, GerberError> {
        self.settings().parse_coordinate(s, self.current_position)
    }

    fn settings(&self) -> crate::units::FileSettings {
        crate::units::FileSettings {
            unit: self.graphics.unit,
            notation: Some(self.graphics.notation),
            zero_suppression: Some(self.zero_suppression),
            number_format: self.number_format,
        }
    }

    fn dispatch(&mut self, token: &Token) -> Result<(), GerberError> {
        let text = token.text.trim();
        if token.extended {
            return self.dispatch_extended(text);
        }

        if let Some(rest) = text.strip_prefix("G04") {
            self.process_comment(rest.trim_start());
            return Ok(());
        }
        if text == "M02" || text == "M00" || text == "M01" {
            self.finished = true;
            return Ok(());
        }

        if let Some(word) = parse_coord_word(text) {
            return self.dispatch_coord_word(text, word);
        }

        self.diagnostics.unknown_statement(self.current_position, format!("unrecognised Gerber statement \"{text}\""));
        self.comments.push(text.to_string());
        Ok(())
    }

    fn process_comment(&mut self, text: &str) {
        let lower = text.to_ascii_lowercase();
        for (needle, hint) in [
            ("kicad", "kicad"),
            ("eagle", "eagle"),
            ("altium", "altium"),
            ("easyeda", "easyeda"),
            ("diptrace", "diptrace"),
            ("fritzing", "fritzing"),
            ("target3001", "target3001"),
            ("geda", "geda"),
        ] {
            if lower.contains(needle) && !self.generator_hints.iter().any(|h| h == hint) {
                self.generator_hints.push(hint.to_string());
            }
        }
        self.comments.push(text.to_string());
    }

    fn dispatch_coord_word(&mut self, text: &str, word: CoordWord) -> Result<(), GerberError> {
        for g in &word.g_codes {
            match g {
                1 => self.graphics.interpolation_mode = crate::gerber::graphics_state::InterpolationMode::Linear,
                2 => self.graphics.interpolation_mode = crate::gerber::graphics_state::InterpolationMode::ClockwiseCircular,
                3 => self.graphics.interpolation_mode = crate::gerber::graphics_state::InterpolationMode::CounterClockwiseCircular,
                74 => self.graphics.multi_quadrant = false,
                75 => self.graphics.multi_quadrant = true,
                36 => self.open_region()?,
                37 => self.close_region()?,
                70 => self.graphics.unit = Some(LengthUnit::Inch),
                71 => self.graphics.unit = Some(LengthUnit::Millimeter),
                90 => self.graphics.notation = Notation::Absolute,
                91 => self.graphics.notation = Notation::Incremental,
                _ => {}
            }
        }

        if let Some(d) = word.d {
            match d {
                1 => return self.handle_interpolate(text, &word),
                2 => return self.handle_move(&word),
                3 => return self.handle_flash(&word),
                code => {
                    let handle = self.aperture_index.get(&(code as u32)).copied().ok_or(GerberError::UndefinedAperture {
                        position: self.current_position,
                        code: code as i32,
                    })?;
                    self.graphics.aperture = Some(handle);
                }
            }
        }
        Ok(())
    }

    fn parse_xy(&self, word: &CoordWord) -> Result<(Option<f64>, Option<f64>), GerberError> {
        let x = word.x.as_deref().map(|s| self.parse_len(s)).transpose()?;
        let y = word.y.as_deref().map(|s| self.parse_len(s)).transpose()?;
        Ok((x, y))
    }

    fn parse_ij(&self, word: &CoordWord) -> Result<(Option<f64>, Option<f64>), GerberError> {
        let i = word.i.as_deref().map(|s| self.parse_len(s)).transpose()?;
        let j = word.j.as_deref().map(|s| self.parse_len(s)).transpose()?;
        Ok((i, j))
    }

    fn handle_move(&mut self, word: &CoordWord) -> Result<(), GerberError> {
        let (x, y) = self.parse_xy(word)?;
        if self.region_open {
            if let Some(region) = self.region.take() {
                self.seal_outline(region);
            }
            self.graphics.update_point(x, y, &mut self.diagnostics, self.current_position);
            let (px, py) = self.graphics.point.unwrap();
            let (mx, my) = self.graphics.map_coord(px, py, false);
            self.region = Some(RegionBuilder {
                polarity_dark: self.graphics.polarity_dark,
                unit: self.graphics.unit.unwrap_or(LengthUnit::Millimeter),
                outline: vec![(mx, my)],
                arcs: Vec::new(),
            });
        } else {
            self.graphics.update_point(x, y, &mut self.diagnostics, self.current_position);
        }
        Ok(())
    }

    fn handle_flash(&mut self, word: &CoordWord) -> Result<(), GerberError> {
        if self.region_open {
            return Err(GerberError::RegionMisuse {
                position: self.current_position,
                reason: "D03 (flash) is not permitted inside an open region".to_string(),
            });
        }
        let (x, y) = self.parse_xy(word)?;
        let unit = self.graphics.unit.unwrap_or(LengthUnit::Millimeter);
        let base_selection = self.graphics.aperture;
        let aperture = self.effective_aperture_handle()?;
        self.graphics.aperture = Some(aperture);
        let flash_result = self.graphics.flash(x, y, unit, &mut self.diagnostics, self.current_position);
        self.graphics.aperture = base_selection;
        let mut flash = flash_result?;
        flash.attributes = std::mem::take(&mut self.object_attrs);
        self.objects.push(GerberObject::Flash(flash));
        Ok(())
    }

    fn handle_interpolate(&mut self, text: &str, word: &CoordWord) -> Result<(), GerberError> {
        let (x, y) = self.parse_xy(word)?;
        let (i, j) = self.parse_ij(word)?;
        let unit = self.graphics.unit.unwrap_or(LengthUnit::Millimeter);

        if self.region_open {
            let result = self.graphics.interpolate(x, y, i, j, unit, &mut self.diagnostics, self.current_position)?;
            let Some(region) = self.region.as_mut() else {
                return Err(self.syntax_error(text, "D01 inside region before an initial D02"));
            };
            match result {
                Some(InterpolationResult::Line(line)) => {
                    region.outline.push((line.x2, line.y2));
                    region.arcs.push(None);
                }
                Some(InterpolationResult::Arc(arc)) => {
                    region.outline.push((arc.x2, arc.y2));
                    region.arcs.push(Some((arc.clockwise, arc.center())));
                }
                None => {}
            }
            return Ok(());
        }

        let base_selection = self.graphics.aperture;
        let aperture = self.effective_aperture_handle()?;
        self.graphics.aperture = Some(aperture);
        let result = self.graphics.interpolate(x, y, i, j, unit, &mut self.diagnostics, self.current_position);
        self.graphics.aperture = base_selection;
        let result = result?;
        let attrs = std::mem::take(&mut self.object_attrs);
        match result {
            Some(InterpolationResult::Line(mut line)) => {
                line.attributes = attrs;
                self.objects.push(GerberObject::Line(line));
            }
            Some(InterpolationResult::Arc(mut arc)) => {
                arc.attributes = attrs;
                self.objects.push(GerberObject::Arc(arc));
            }
            None => {}
        }
        Ok(())
    }

    fn open_region(&mut self) -> Result<(), GerberError> {
        if self.region_open {
            return Err(GerberError::RegionMisuse {
                position: self.current_position,
                reason: "G36 issued while a region is already open".to_string(),
            });
        }
        self.region_open = true;
        self.region = None;
        Ok(())
    }

    fn close_region(&mut self) -> Result<(), GerberError> {
        if !self.region_open {
            return Err(GerberError::RegionMisuse {
                position: self.current_position,
                reason: "G37 issued without a matching G36".to_string(),
            });
        }
        if let Some(region) = self.region.take() {
            self.seal_outline(region);
        }
        self.region_open = false;
        Ok(())
    }

    fn seal_outline(&mut self, region: RegionBuilder) {
        if region.outline.len() < 3 {
            return;
        }
        let attrs = self.object_attrs.clone();
        self.objects.push(GerberObject::Region(Region {
            outline: region.outline,
            arcs: region.arcs,
            polarity_dark: region.polarity_dark,
            unit: region.unit,
            attributes: attrs,
        }));
    }

    /// Resolve the currently selected aperture, applying any pending
    /// `LM`/`LR`/`LS` transform by content-addressing a derived aperture
    /// (spec §4.2: rotation/mirror/scale lowered onto the aperture itself).
    fn effective_aperture_handle(&mut self) -> Result<ApertureHandle, GerberError> {
        let base = self.graphics.aperture.ok_or(GerberError::UndefinedAperture {
            position: self.current_position,
            code: -1,
        })?;

        let extra_mirror = self.graphics.aperture_mirror;
        let extra_rotation = self.graphics.aperture_rotation;
        let extra_scale = self.graphics.aperture_scale;
        if !extra_mirror.x && !extra_mirror.y && extra_rotation == 0.0 && extra_scale == 1.0 {
            return Ok(base);
        }

        let base_aperture = self.apertures[base.0].clone();
        let combined = Aperture {
            template: base_aperture.template.clone(),
            unit: base_aperture.unit,
            rotation: base_aperture.rotation + extra_rotation,
            mirror: Mirroring {
                x: base_aperture.mirror.x ^ extra_mirror.x,
                y: base_aperture.mirror.y ^ extra_mirror.y,
            },
            scale: base_aperture.scale * extra_scale,
            attributes: base_aperture.attributes.clone(),
        };

        if let Some(pos) = self.apertures.iter().position(|a| *a == combined) {
            return Ok(ApertureHandle(pos));
        }
        let handle = ApertureHandle(self.apertures.len());
        self.apertures.push(combined);
        Ok(handle)
    }

    fn dispatch_extended(&mut self, text: &str) -> Result<(), GerberError> {
        if let Some(rest) = text.strip_prefix("FS") {
            return self.handle_format_spec(rest);
        }
        if let Some(rest) = text.strip_prefix("MO") {
            self.graphics.unit = Some(if rest.starts_with("IN") { LengthUnit::Inch } else { LengthUnit::Millimeter });
            return Ok(());
        }
        if let Some(rest) = text.strip_prefix("AD") {
            return self.handle_aperture_define(rest);
        }
        if let Some(rest) = text.strip_prefix("AM") {
            return self.handle_aperture_macro(rest);
        }
        if let Some(rest) = text.strip_prefix("LP") {
            self.graphics.set_polarity_dark(rest.trim() != "C");
            return Ok(());
        }
        if let Some(rest) = text.strip_prefix("LM") {
            self.graphics.aperture_mirror = match rest.trim() {
                "X" => Mirror { x: true, y: false },
                "Y" => Mirror { x: false, y: true },
                "XY" => Mirror { x: true, y: true },
                _ => Mirror::default(),
            };
            return Ok(());
        }
        if let Some(rest) = text.strip_prefix("LR") {
            self.graphics.aperture_rotation = rest.trim().parse::<f64>().unwrap_or(0.0).to_radians();
            return Ok(());
        }
        if let Some(rest) = text.strip_prefix("LS") {
            self.graphics.aperture_scale = rest.trim().parse().unwrap_or(1.0);
            return Ok(());
        }
        if let Some(rest) = text.strip_prefix("TF") {
            self.handle_attribute(rest, AttributeScope::File);
            return Ok(());
        }
        if let Some(rest) = text.strip_prefix("TA") {
            self.handle_attribute(rest, AttributeScope::Aperture);
            return Ok(());
        }
        if let Some(rest) = text.strip_prefix("TO") {
            self.handle_attribute(rest, AttributeScope::Object);
            return Ok(());
        }
        if let Some(rest) = text.strip_prefix("TD") {
            return self.handle_delete_attribute(rest);
        }
        if let Some(rest) = text.strip_prefix("IP") {
            self.graphics.set_image_polarity_negative(rest.trim() == "NEG");
            return Ok(());
        }
        if let Some(rest) = text.strip_prefix("IR") {
            let degrees: i32 = rest.trim().parse().unwrap_or(0);
            self.graphics.set_image_rotation(match degrees.rem_euclid(360) {
                90 => ImageRotation::R90,
                180 => ImageRotation::R180,
                270 => ImageRotation::R270,
                _ => ImageRotation::R0,
            });
            return Ok(());
        }
        if let Some(rest) = text.strip_prefix("MI") {
            let mirror = Mirror {
                x: rest.contains("A1"),
                y: rest.contains("B1"),
            };
            self.graphics.set_image_mirror(mirror);
            return Ok(());
        }
        if let Some(rest) = text.strip_prefix("SF") {
            let a = rest.split('B').next().and_then(|s| s.strip_prefix('A')).and_then(|s| s.parse().ok()).unwrap_or(1.0);
            let b = rest.rsplit('B').next().and_then(|s| s.parse().ok()).unwrap_or(1.0);
            self.graphics.set_image_scale((a, b));
            return Ok(());
        }
        if let Some(rest) = text.strip_prefix("OF") {
            let a = rest.split('B').next().and_then(|s| s.strip_prefix('A')).and_then(|s| s.parse().ok()).unwrap_or(0.0);
            let b = rest.rsplit('B').next().and_then(|s| s.parse().ok()).unwrap_or(0.0);
            self.graphics.set_image_offset((a, b));
            return Ok(());
        }
        if text.starts_with("IN") || text.starts_with("LN") || text.starts_with("AS") {
            self.comments.push(text.to_string());
            return Ok(());
        }
        if text == "M02" {
            self.finished = true;
            return Ok(());
        }

        self.diagnostics.unknown_statement(self.current_position, format!("unrecognised extended Gerber statement \"{text}\""));
        Ok(())
    }

    fn handle_format_spec(&mut self, rest: &str) -> Result<(), GerberError> {
        let rest = rest.trim();
        let zero_suppression_char = rest.chars().next();
        self.zero_suppression = match zero_suppression_char {
            Some('L') => ZeroSuppression::Leading,
            Some('T') => ZeroSuppression::Trailing,
            _ => ZeroSuppression::None,
        };
        let notation_char = rest.chars().nth(1);
        self.graphics.notation = match notation_char {
            Some('I') => Notation::Incremental,
            _ => Notation::Absolute,
        };

        let x_pos = rest.find('X').ok_or_else(|| self.syntax_error(rest, "format spec missing X field"))?;
        let y_pos = rest.find('Y').ok_or_else(|| self.syntax_error(rest, "format spec missing Y field"))?;
        let x_digits = &rest[x_pos + 1..x_pos + 3];
        let y_digits = &rest[y_pos + 1..y_pos + 3];
        let x = (
            x_digits[0..1].parse().map_err(|_| self.syntax_error(rest, "bad X integer digit count"))?,
            x_digits[1..2].parse().map_err(|_| self.syntax_error(rest, "bad X fractional digit count"))?,
        );
        let y = (
            y_digits[0..1].parse().map_err(|_| self.syntax_error(rest, "bad Y integer digit count"))?,
            y_digits[1..2].parse().map_err(|_| self.syntax_error(rest, "bad Y fractional digit count"))?,
        );
        if x != y {
            return Err(GerberError::FormatMismatch {
                position: self.current_position,
                x_digits: x,
                y_digits: y,
            });
        }
        self.number_format = NumberFormat::new(x.0, x.1);
        Ok(())
    }

    fn handle_aperture_define(&mut self, rest: &str) -> Result<(), GerberError> {
        let rest = rest.strip_prefix('D').ok_or_else(|| self.syntax_error(rest, "AD statement missing D code"))?;
        let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        let (code_str, rest) = rest.split_at(digits_end);
        let code: u32 = code_str.parse().map_err(|_| self.syntax_error(rest, "bad D code in AD statement"))?;

        let (shape, params) = rest.split_once(',').unwrap_or((rest, ""));
        let values: Vec<f64> = params
            .split('X')
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<f64>().unwrap_or(0.0))
            .collect();

        let unit = self.graphics.unit.unwrap_or(LengthUnit::Millimeter);
        let template = match shape {
            "C" => ApertureTemplate::Circle {
                diameter: *values.first().unwrap_or(&0.0),
                hole_diameter: values.get(1).copied(),
            },
            "R" => ApertureTemplate::Rectangle {
                width: *values.first().unwrap_or(&0.0),
                height: *values.get(1).unwrap_or(&0.0),
                hole_diameter: values.get(2).copied(),
            },
            "O" => ApertureTemplate::Obround {
                width: *values.first().unwrap_or(&0.0),
                height: *values.get(1).unwrap_or(&0.0),
                hole_diameter: values.get(2).copied(),
            },
            "P" => ApertureTemplate::Polygon {
                outer_diameter: *values.first().unwrap_or(&0.0),
                vertices: *values.get(1).unwrap_or(&3.0) as u32,
                rotation: values.get(2).copied().unwrap_or(0.0),
                hole_diameter: values.get(3).copied(),
            },
            macro_name => {
                let macro_ref = self
                    .macro_index
                    .get(macro_name)
                    .copied()
                    .ok_or_else(|| self.syntax_error(rest, format!("aperture references undefined macro \"{macro_name}\"")))?;
                let parameters = macro_parser::parse_instance_parameters(params).map_err(|reason| self.syntax_error(params, reason))?;
                let bounding_extent = Some(crate::aperture::macro_bounding_extent(&self.macros[macro_ref.0], &parameters));
                ApertureTemplate::MacroInstance {
                    macro_ref,
                    parameters,
                    bounding_extent,
                }
            }
        };

        let mut aperture = Aperture::new(template, unit);
        aperture.attributes = std::mem::take(&mut self.aperture_attrs);
        self.apertures.push(aperture);
        self.aperture_index.insert(code, ApertureHandle(self.apertures.len() - 1));
        Ok(())
    }

    fn handle_aperture_macro(&mut self, rest: &str) -> Result<(), GerberError> {
        let mut parts = rest.splitn(2, '*');
        let name = parts.next().unwrap_or("").trim().to_string();
        let body = parts.next().unwrap_or("");
        let primitives: Vec<&str> = body.split('*').map(str::trim).filter(|s| !s.is_empty()).collect();
        let macro_def = macro_parser::parse_macro_body(&name, &primitives).map_err(|reason| self.syntax_error(rest, reason))?;
        let handle = MacroHandle(self.macros.len());
        self.macro_index.insert(name.clone(), handle);
        self.macros.push(macro_def);
        Ok(())
    }

    fn handle_attribute(&mut self, rest: &str, scope: AttributeScope) {
        let mut fields = rest.split(',');
        let Some(name) = fields.next() else { return };
        let values: Vec<String> = fields.map(str::to_string).collect();
        let target = match scope {
            AttributeScope::File => &mut self.file_attrs,
            AttributeScope::Aperture => &mut self.aperture_attrs,
            AttributeScope::Object => &mut self.object_attrs,
        };
        target.insert(name.to_string(), values);
    }

    fn handle_delete_attribute(&mut self, rest: &str) -> Result<(), GerberError> {
        let name = rest.trim();
        if name.is_empty() {
            self.aperture_attrs.clear();
            self.object_attrs.clear();
            return Ok(());
        }
        if self.file_attrs.remove(name).is_some() {
            return Err(GerberError::FileAttributeDelete {
                position: self.current_position,
                name: name.to_string(),
            });
        }
        self.aperture_attrs.remove(name);
        self.object_attrs.remove(name);
        Ok(())
    }
}

enum AttributeScope {
    File,
    Aperture,
    Object,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s1_basic_flash() {
        let input = "%FSLAX23Y23*%\n%MOMM*%\n%ADD10C,0.500*%\nD10*\nX1000Y2000D03*\nM02*";
        let result = parse(input).unwrap();
        assert_eq!(result.objects.len(), 1);
        match &result.objects[0] {
            GerberObject::Flash(flash) => {
                assert!((flash.x - 1.0).abs() < 1e-6);
                assert!((flash.y - 2.0).abs() < 1e-6);
            }
            other => panic!("expected flash, got {other:?}"),
        }
    }

    #[test]
    fn region_with_fewer_than_three_points_is_discarded() {
        let input = "%FSLAX23Y23*%\n%MOMM*%\nG36*\nX0Y0D02*\nX1000Y1000D01*\nG37*\nM02*";
        let result = parse(input).unwrap();
        assert!(result.objects.is_empty());
    }

    #[test]
    fn region_with_three_points_is_kept() {
        let input = "%FSLAX23Y23*%\n%MOMM*%\nG36*\nX0Y0D02*\nX1000Y0D01*\nX0Y1000D01*\nG37*\nM02*";
        let result = parse(input).unwrap();
        assert_eq!(result.objects.len(), 1);
        assert!(matches!(result.objects[0], GerberObject::Region(_)));
    }

    #[test]
    fn region_is_emitted_in_input_order_not_appended_at_end() {
        let input = "%FSLAX23Y23*%\n%MOMM*%\n%ADD10C,0.500*%\nD10*\nX0Y0D03*\nG36*\nX0Y0D02*\nX1000Y0D01*\nX0Y1000D01*\nG37*\nX5000Y5000D03*\nM02*";
        let result = parse(input).unwrap();
        assert_eq!(result.objects.len(), 3);
        assert!(matches!(result.objects[0], GerberObject::Flash(_)));
        assert!(matches!(result.objects[1], GerberObject::Region(_)));
        assert!(matches!(result.objects[2], GerberObject::Flash(_)));
    }

    #[test]
    fn undefined_aperture_is_an_error() {
        let input = "%FSLAX23Y23*%\n%MOMM*%\nD99*\nX0Y0D03*\nM02*";
        assert!(parse(input).is_err());
    }

    #[test]
    fn format_mismatch_is_rejected() {
        let input = "%FSLAX23Y34*%\nM02*";
        assert!(matches!(parse(input), Err(GerberError::FormatMismatch { .. })));
    }

    #[test]
    fn negative_image_polarity_inverts_subsequent_lpd() {
        let input = "%FSLAX23Y23*%\n%MOMM*%\n%IPNEG*%\n%ADD10C,0.500*%\nD10*\n%LPD*%\nX0Y0D03*\nM02*";
        let result = parse(input).unwrap();
        match &result.objects[0] {
            GerberObject::Flash(flash) => assert!(!flash.polarity_dark),
            other => panic!("expected flash, got {other:?}"),
        }
    }
}
