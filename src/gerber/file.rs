//! `GerberFile`, the owning container for a parsed vector artwork file
//! (spec §3.7), plus file-level operations (spec §4.8).

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::aperture::{Aperture, ApertureHandle, ApertureMacro, ApertureTemplate, MacroHandle};
use crate::config::ParseOptions;
use crate::error::{Diagnostics, GerberError};
use crate::gerber::emitter;
use crate::gerber::parser;
use crate::object::{Attributes, GerberObject};
use crate::units::{LengthUnit, NumberFormat};

#[derive(Debug, Clone, Default)]
pub struct GerberFile {
    pub objects: Vec<GerberObject>,
    pub apertures: Vec<Aperture>,
    pub macros: Vec<ApertureMacro>,
    pub file_attributes: Attributes,
    pub comments: Vec<String>,
    pub generator_hints: Vec<String>,
    pub unit: Option<LengthUnit>,
    pub number_format: NumberFormat,
}

impl GerberFile {
    /// Load a Gerber file from `path`, expanding `%IF<name>*%` includes
    /// first when `options.allow_includes` is set (spec §4.5, §9).
    pub fn open(path: impl AsRef<Path>, options: &ParseOptions) -> Result<(Self, Diagnostics)> {
        let path = path.as_ref();
        log::info!("Reading Gerber file: {:?}", path);
        let data = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        let root = options
            .include_root
            .clone()
            .or_else(|| path.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        let expanded = expand_includes(&data, &root, options).context("failed to expand Gerber include statements")?;
        let (file, diagnostics) = Self::from_str(&expanded).context("failed to parse Gerber file")?;
        for warning in diagnostics.iter() {
            log::warn!("{warning}");
        }
        Ok((file, diagnostics))
    }

    pub fn from_str(data: &str) -> Result<(Self, Diagnostics), GerberError> {
        let result = parser::parse(data)?;
        Ok((
            GerberFile {
                objects: result.objects,
                apertures: result.apertures,
                macros: result.macros,
                file_attributes: result.file_attributes,
                comments: result.comments,
                generator_hints: result.generator_hints,
                unit: result.unit,
                number_format: result.number_format,
            },
            result.diagnostics,
        ))
    }

    pub fn to_gerber_string(&self) -> String {
        emitter::emit(self)
    }

    /// Merge `other`'s objects into `self`, content-addressing apertures
    /// and macros by their canonical text (spec §4.8) so a repeated shape
    /// does not duplicate its `AD`/`AM` definitions.
    pub fn merge(&mut self, other: &GerberFile) {
        let macro_remap: HashMap<usize, MacroHandle> = other
            .macros
            .iter()
            .enumerate()
            .map(|(idx, macro_def)| {
                let canonical = macro_def.canonical_text();
                let existing = self.macros.iter().position(|m| m.canonical_text() == canonical);
                let handle = match existing {
                    Some(pos) => MacroHandle(pos),
                    None => {
                        self.macros.push(macro_def.clone());
                        MacroHandle(self.macros.len() - 1)
                    }
                };
                (idx, handle)
            })
            .collect();

        let aperture_remap: HashMap<usize, ApertureHandle> = other
            .apertures
            .iter()
            .enumerate()
            .map(|(idx, aperture)| {
                let remapped = remap_aperture_macro_ref(aperture, &macro_remap);
                let existing = self.apertures.iter().position(|a| *a == remapped);
                let handle = match existing {
                    Some(pos) => ApertureHandle(pos),
                    None => {
                        self.apertures.push(remapped);
                        ApertureHandle(self.apertures.len() - 1)
                    }
                };
                (idx, handle)
            })
            .collect();

        for object in &other.objects {
            let mut object = object.clone();
            remap_object_aperture(&mut object, &aperture_remap);
            self.objects.push(object);
        }
        self.comments.extend(other.comments.iter().cloned());
        self.generator_hints.clear();
    }

    pub fn offset(&mut self, dx: f64, dy: f64, unit: LengthUnit) {
        for object in &mut self.objects {
            offset_object(object, dx, dy, unit);
        }
    }

    /// Rotate every object about `(cx, cy)`. Apertures used by flashes pick
    /// up the rotation directly when it's a multiple of a right angle;
    /// otherwise it's folded into a macro-instance lowering at emission
    /// time via `Aperture::has_trivial_transform` (spec §4.2).
    pub fn rotate(&mut self, angle_radians: f64, cx: f64, cy: f64, unit: LengthUnit) {
        if is_full_turn(angle_radians) {
            return;
        }
        let mut rotated_apertures: HashMap<usize, usize> = HashMap::new();
        for object in &mut self.objects {
            rotate_object(object, angle_radians, cx, cy, unit, &mut self.apertures, &mut rotated_apertures);
        }
    }

    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.objects
            .iter()
            .filter_map(|o| o.bounds())
            .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)))
    }
}

fn remap_aperture_macro_ref(aperture: &Aperture, macro_remap: &HashMap<usize, MacroHandle>) -> Aperture {
    let mut aperture = aperture.clone();
    if let ApertureTemplate::MacroInstance { macro_ref, .. } = &mut aperture.template {
        if let Some(new_handle) = macro_remap.get(&macro_ref.0) {
            *macro_ref = *new_handle;
        }
    }
    aperture
}

fn remap_object_aperture(object: &mut GerberObject, aperture_remap: &HashMap<usize, ApertureHandle>) {
    use crate::object::ObjectRef;
    let remap = |r: &mut ObjectRef| {
        if let ObjectRef::Aperture(handle) = r {
            if let Some(new_handle) = aperture_remap.get(&handle.0) {
                *handle = *new_handle;
            }
        }
    };
    match object {
        GerberObject::Flash(f) => remap(&mut f.aperture),
        GerberObject::Line(l) => remap(&mut l.aperture),
        GerberObject::Arc(a) => remap(&mut a.aperture),
        GerberObject::Region(_) => {}
    }
}

fn offset_object(object: &mut GerberObject, dx: f64, dy: f64, unit: LengthUnit) {
    match object {
        GerberObject::Flash(f) => {
            let (ox, oy) = (unit.convert(dx, f.unit), unit.convert(dy, f.unit));
            f.x += ox;
            f.y += oy;
        }
        GerberObject::Line(l) => {
            let (ox, oy) = (unit.convert(dx, l.unit), unit.convert(dy, l.unit));
            l.x1 += ox;
            l.y1 += oy;
            l.x2 += ox;
            l.y2 += oy;
        }
        GerberObject::Arc(a) => {
            let (ox, oy) = (unit.convert(dx, a.unit), unit.convert(dy, a.unit));
            a.x1 += ox;
            a.y1 += oy;
            a.x2 += ox;
            a.y2 += oy;
        }
        GerberObject::Region(r) => {
            let (ox, oy) = (unit.convert(dx, r.unit), unit.convert(dy, r.unit));
            for point in &mut r.outline {
                point.0 += ox;
                point.1 += oy;
            }
            for arc in r.arcs.iter_mut().flatten() {
                arc.1 .0 += ox;
                arc.1 .1 += oy;
            }
        }
    }
}

fn rotate_object(
    object: &mut GerberObject,
    angle: f64,
    cx: f64,
    cy: f64,
    unit: LengthUnit,
    apertures: &mut Vec<Aperture>,
    rotated_apertures: &mut HashMap<usize, usize>,
) {
    use crate::object::ObjectRef;

    let rotate_aperture = |apertures: &mut Vec<Aperture>, rotated: &mut HashMap<usize, usize>, aperture_ref: &mut ObjectRef| {
        if let ObjectRef::Aperture(handle) = aperture_ref {
            let new_index = *rotated.entry(handle.0).or_insert_with(|| {
                let mut clone = apertures[handle.0].clone();
                clone.rotation += angle;
                apertures.push(clone);
                apertures.len() - 1
            });
            *handle = ApertureHandle(new_index);
        }
    };

    match object {
        GerberObject::Flash(f) => {
            let (cx, cy) = (unit.convert(cx, f.unit), unit.convert(cy, f.unit));
            (f.x, f.y) = rotate_point((f.x, f.y), angle, (cx, cy));
            rotate_aperture(apertures, rotated_apertures, &mut f.aperture);
        }
        GerberObject::Line(l) => {
            let (cx, cy) = (unit.convert(cx, l.unit), unit.convert(cy, l.unit));
            (l.x1, l.y1) = rotate_point((l.x1, l.y1), angle, (cx, cy));
            (l.x2, l.y2) = rotate_point((l.x2, l.y2), angle, (cx, cy));
            rotate_aperture(apertures, rotated_apertures, &mut l.aperture);
        }
        GerberObject::Arc(a) => {
            let (cx, cy) = (unit.convert(cx, a.unit), unit.convert(cy, a.unit));
            let center = a.center();
            let new_center = rotate_point(center, angle, (cx, cy));
            (a.x1, a.y1) = rotate_point((a.x1, a.y1), angle, (cx, cy));
            (a.x2, a.y2) = rotate_point((a.x2, a.y2), angle, (cx, cy));
            a.cx = new_center.0 - a.x1;
            a.cy = new_center.1 - a.y1;
            rotate_aperture(apertures, rotated_apertures, &mut a.aperture);
        }
        GerberObject::Region(r) => {
            let (ccx, ccy) = (unit.convert(cx, r.unit), unit.convert(cy, r.unit));
            for point in &mut r.outline {
                *point = rotate_point(*point, angle, (ccx, ccy));
            }
            for arc in r.arcs.iter_mut().flatten() {
                arc.1 = rotate_point(arc.1, angle, (ccx, ccy));
            }
        }
    }
}

fn is_full_turn(angle_radians: f64) -> bool {
    let turns = angle_radians / std::f64::consts::TAU;
    (turns - turns.round()).abs() < 1e-9
}

fn rotate_point(point: (f64, f64), angle: f64, center: (f64, f64)) -> (f64, f64) {
    let (sin_a, cos_a) = angle.sin_cos();
    (
        cos_a * (point.0 - center.0) - sin_a * (point.1 - center.1) + center.0,
        sin_a * (point.0 - center.0) + cos_a * (point.1 - center.1) + center.1,
    )
}

/// Textually inline `%IF<name>*%` statements before tokenizing, since the
/// statement-level parser has no filesystem access (spec §9's resolution
/// of the include-handling Open Question: expand once, up front, rather
/// than threading I/O through the parser).
fn expand_includes(data: &str, root: &Path, options: &ParseOptions) -> Result<String> {
    if !data.contains("%IF") {
        return Ok(data.to_string());
    }
    if !options.allow_includes {
        return Ok(data.to_string());
    }

    let mut out = String::with_capacity(data.len());
    let mut rest = data;
    let mut line = 1u32;
    while let Some(start) = rest.find("%IF") {
        line += rest[..start].matches('\n').count() as u32;
        out.push_str(&rest[..start]);
        let after = &rest[start + 3..];
        let end = after.find("*%").ok_or_else(|| {
            anyhow::Error::from(GerberError::IncludeError {
                position: crate::error::SourcePosition { line, column: start },
                reason: "unterminated %IF include statement".to_string(),
            })
        })?;
        let name = after[..end].trim();
        log::info!("Expanding Gerber include: {}", name);
        let included = crate::config::resolve_include(name, root, options).map_err(|err| {
            anyhow::Error::from(GerberError::IncludeError {
                position: crate::error::SourcePosition { line, column: start },
                reason: err.to_string(),
            })
        })?;
        let included = expand_includes(&included, root, options)?;
        out.push_str(&included);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aperture::ApertureTemplate;

    #[test]
    fn bounds_reads_each_object() {
        let data = "%FSLAX23Y23*%\n%MOMM*%\n%ADD10C,0.500*%\nD10*\nX1000Y2000D03*\nX3000Y4000D03*\nM02*";
        let (file, _) = GerberFile::from_str(data).unwrap();
        assert_eq!(file.bounds(), Some((1.0, 2.0, 3.0, 4.0)));
    }

    #[test]
    fn merge_dedupes_identical_apertures() {
        let data = "%FSLAX23Y23*%\n%MOMM*%\n%ADD10C,0.500*%\nD10*\nX1000Y2000D03*\nM02*";
        let (mut a, _) = GerberFile::from_str(data).unwrap();
        let (b, _) = GerberFile::from_str(data).unwrap();
        a.merge(&b);
        assert_eq!(a.apertures.len(), 1);
        assert_eq!(a.objects.len(), 2);
    }

    #[test]
    fn rotate_by_full_turn_is_a_no_op() {
        let data = "%FSLAX23Y23*%\n%MOMM*%\n%ADD10C,0.500*%\nD10*\nX1000Y2000D03*\nM02*";
        let (mut file, _) = GerberFile::from_str(data).unwrap();
        let before = file.bounds();
        file.rotate(std::f64::consts::TAU, 0.0, 0.0, LengthUnit::Millimeter);
        assert_eq!(file.bounds(), before);
    }

    #[test]
    fn includes_disabled_by_default_leave_statement_untouched() {
        let data = "%IFpanel.gbr*%\nM02*";
        let options = ParseOptions::default();
        let expanded = expand_includes(data, Path::new("/tmp"), &options).unwrap();
        assert_eq!(expanded, data);
    }

    #[test]
    fn _macro_instance_variant_reachable() {
        let _ = ApertureTemplate::MacroInstance {
            macro_ref: MacroHandle(0),
            parameters: vec![],
            bounding_extent: None,
        };
    }
}
