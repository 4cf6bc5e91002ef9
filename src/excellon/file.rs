//! `ExcellonFile`, the owning container for a parsed drill/route file
//! (spec §3.7), plus file-level operations (spec §4.8).

use std::path::Path;

use anyhow::{Context, Result};

use crate::error::{Diagnostics, ExcellonError};
use crate::excellon::parser;
use crate::excellon::sidecar;
use crate::excellon::tool::ToolTable;
use crate::object::{ExcellonGeometry, ExcellonObject};
use crate::units::{FileSettings, LengthUnit};

#[derive(Debug, Clone, Default)]
pub struct ExcellonFile {
    pub objects: Vec<ExcellonObject>,
    pub comments: Vec<String>,
    pub tools: ToolTable,
    pub import_settings: FileSettings,
    pub generator_hints: Vec<String>,
}

impl ExcellonFile {
    /// Load a drill file from `path`, sniffing an Allegro
    /// `nc_param.txt`/`ncdrill.log` sidecar next to it if present (spec
    /// §4.6). Mirrors the teacher's `drill_file::load(path) -> Result<_>`
    /// entry point.
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Diagnostics)> {
        let path = path.as_ref();
        log::info!("Reading Excellon file: {:?}", path);
        let data = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;

        let sidecar_settings = path
            .parent()
            .and_then(|dir| {
                ["nc_param.txt", "ncdrill.log"]
                    .iter()
                    .find_map(|name| {
                        let candidate = dir.join(name);
                        std::fs::read_to_string(&candidate).ok().map(|text| {
                            log::info!("Found Allegro sidecar: {:?}", candidate);
                            text
                        })
                    })
            })
            .map(|text| sidecar::parse_allegro_ncparam(&text))
            .transpose()
            .map_err(|err| anyhow::anyhow!(err))
            .context("failed to parse Allegro sidecar")?;

        let (file, diagnostics) = Self::from_str(&data, sidecar_settings).context("failed to parse Excellon file")?;
        for warning in diagnostics.iter() {
            log::warn!("{warning}");
        }
        Ok((file, diagnostics))
    }

    pub fn from_str(data: &str, sidecar_settings: Option<FileSettings>) -> Result<(Self, Diagnostics), ExcellonError> {
        let result = parser::parse(data, sidecar_settings)?;
        Ok((
            ExcellonFile {
                objects: result.objects,
                comments: result.comments,
                tools: result.tools,
                import_settings: result.settings,
                generator_hints: result.generator_hints,
            },
            result.diagnostics,
        ))
    }

    /// Secondary drill/slot view over the canonical object list (spec
    /// §3.7), resolving each object's tool to a diameter and plating flag.
    pub fn projection(&self) -> Vec<ExcellonGeometry> {
        crate::object::project_excellon_geometry(&self.objects, &self.tools)
    }

    pub fn is_plated(&self) -> bool {
        !self.objects.is_empty() && self.projection().iter().all(|o| o.plated() == Some(true))
    }

    pub fn is_nonplated(&self) -> bool {
        !self.objects.is_empty() && self.projection().iter().all(|o| o.plated() == Some(false))
    }

    pub fn is_mixed_plating(&self) -> bool {
        let distinct: std::collections::HashSet<_> = self.projection().iter().map(|o| o.plated()).collect();
        distinct.len() > 1
    }

    /// Concatenate objects/comments from `other` (spec §4.8). The tool
    /// table is not deduplicated here by canonical form the way Gerber
    /// apertures are — Excellon tools carry no content-addressable text,
    /// only numeric indices — so merging two files with colliding indices
    /// is the caller's responsibility to avoid (documented in DESIGN.md).
    pub fn merge(&mut self, other: &ExcellonFile) {
        self.objects.extend(other.objects.iter().cloned());
        self.comments.extend(other.comments.iter().cloned());
        self.generator_hints.clear();
    }

    pub fn offset(&mut self, dx: f64, dy: f64, unit: LengthUnit) {
        for obj in &mut self.objects {
            match obj {
                ExcellonObject::Flash(f) => {
                    let (ox, oy) = (unit.convert(dx, f.unit), unit.convert(dy, f.unit));
                    f.x += ox;
                    f.y += oy;
                }
                ExcellonObject::Line(l) => {
                    let (ox, oy) = (unit.convert(dx, l.unit), unit.convert(dy, l.unit));
                    l.x1 += ox;
                    l.y1 += oy;
                    l.x2 += ox;
                    l.y2 += oy;
                }
                ExcellonObject::Arc(a) => {
                    let (ox, oy) = (unit.convert(dx, a.unit), unit.convert(dy, a.unit));
                    a.x1 += ox;
                    a.y1 += oy;
                    a.x2 += ox;
                    a.y2 += oy;
                }
            }
        }
    }

    pub fn rotate(&mut self, angle_radians: f64, cx: f64, cy: f64, unit: LengthUnit) {
        if is_full_turn(angle_radians) {
            return;
        }
        for obj in &mut self.objects {
            match obj {
                ExcellonObject::Flash(f) => {
                    let (cx, cy) = (unit.convert(cx, f.unit), unit.convert(cy, f.unit));
                    (f.x, f.y) = rotate_point((f.x, f.y), angle_radians, (cx, cy));
                }
                ExcellonObject::Line(l) => {
                    let (cx, cy) = (unit.convert(cx, l.unit), unit.convert(cy, l.unit));
                    (l.x1, l.y1) = rotate_point((l.x1, l.y1), angle_radians, (cx, cy));
                    (l.x2, l.y2) = rotate_point((l.x2, l.y2), angle_radians, (cx, cy));
                }
                ExcellonObject::Arc(a) => {
                    let (cx, cy) = (unit.convert(cx, a.unit), unit.convert(cy, a.unit));
                    let new_center = rotate_point(a.center(), angle_radians, (cx, cy));
                    (a.x1, a.y1) = rotate_point((a.x1, a.y1), angle_radians, (cx, cy));
                    (a.x2, a.y2) = rotate_point((a.x2, a.y2), angle_radians, (cx, cy));
                    a.cx = new_center.0 - a.x1;
                    a.cy = new_center.1 - a.y1;
                }
            }
        }
    }

    /// Split into `(non_plated, plated)` children preserving comments and
    /// import settings (spec §4.8). Objects with unknown plating land in
    /// the non-plated child, matching the original's `is_nonplated`
    /// treating `None` as falsy rather than "plated".
    pub fn split_by_plating(&self) -> (ExcellonFile, ExcellonFile) {
        let mut non_plated = ExcellonFile {
            comments: self.comments.clone(),
            import_settings: self.import_settings,
            generator_hints: self.generator_hints.clone(),
            tools: self.tools.clone(),
            objects: Vec::new(),
        };
        let mut plated = ExcellonFile {
            comments: self.comments.clone(),
            import_settings: self.import_settings,
            generator_hints: self.generator_hints.clone(),
            tools: self.tools.clone(),
            objects: Vec::new(),
        };
        for (obj, geometry) in self.objects.iter().zip(self.projection()) {
            if geometry.plated() == Some(true) {
                plated.objects.push(obj.clone());
            } else {
                non_plated.objects.push(obj.clone());
            }
        }
        (non_plated, plated)
    }

    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.projection()
            .iter()
            .map(|o| o.bounds())
            .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)))
    }

    pub fn hit_count(&self) -> usize {
        self.objects.iter().filter(|o| matches!(o, ExcellonObject::Flash(_))).count()
    }

    pub fn drill_sizes(&self) -> Vec<f64> {
        let mut sizes: Vec<f64> = self
            .projection()
            .iter()
            .filter_map(|o| match o {
                ExcellonGeometry::Drill(d) => Some(d.diameter),
                _ => None,
            })
            .collect();
        sizes.sort_by(|a, b| a.partial_cmp(b).unwrap());
        sizes.dedup_by(|a, b| (*a - *b).abs() < 1e-9);
        sizes
    }

    /// Total path length of routed slots, excluding drill hits (travel
    /// moves, spec §4.8: "path length excludes travel moves").
    pub fn path_lengths(&self, unit: LengthUnit) -> f64 {
        self.objects
            .iter()
            .filter_map(|o| match o {
                ExcellonObject::Line(l) => {
                    let dx = l.unit.convert(l.x2 - l.x1, unit);
                    let dy = l.unit.convert(l.y2 - l.y1, unit);
                    Some((dx * dx + dy * dy).sqrt())
                }
                ExcellonObject::Arc(a) => {
                    let dx = a.unit.convert(a.x2 - a.x1, unit);
                    let dy = a.unit.convert(a.y2 - a.y1, unit);
                    Some((dx * dx + dy * dy).sqrt())
                }
                ExcellonObject::Flash(_) => None,
            })
            .sum()
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{Notation, NumberFormat, ZeroSuppression};

    fn settings() -> FileSettings {
        FileSettings {
            unit: Some(LengthUnit::Millimeter),
            notation: Some(Notation::Absolute),
            zero_suppression: Some(ZeroSuppression::Trailing),
            number_format: NumberFormat::new(2, 4),
        }
    }

    #[test]
    fn split_by_plating_preserves_object_union() {
        let data = "T01C0.3\nT1\nX10Y10\n";
        let (file, _) = ExcellonFile::from_str(data, Some(settings())).unwrap();
        let (non_plated, plated) = file.split_by_plating();
        assert_eq!(non_plated.objects.len() + plated.objects.len(), file.objects.len());
    }

    #[test]
    fn hit_count_and_drill_sizes() {
        let data = "T01C0.3\nT02C0.5\nT1\nX10Y10\nT2\nX20Y20\n";
        let (file, _) = ExcellonFile::from_str(data, Some(settings())).unwrap();
        assert_eq!(file.hit_count(), 2);
        assert_eq!(file.drill_sizes().len(), 2);
    }
}
