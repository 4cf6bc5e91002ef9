//! Excellon tool table (spec §3.5).

use std::collections::BTreeMap;

use crate::units::LengthUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Plating {
    Plated,
    NonPlated,
    Unknown,
}

impl Plating {
    /// Collapse to the tri-state `Option<bool>` the object model's
    /// `plated()` projection uses: `None` for `Unknown`.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Plating::Plated => Some(true),
            Plating::NonPlated => Some(false),
            Plating::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tool {
    pub diameter: f64,
    pub depth_offset: Option<f64>,
    pub plating: Plating,
    pub unit: LengthUnit,
}

/// Write-once-per-index tool table. Matches the teacher's
/// `HashMap<usize, f64>` precedent (`drill_file.rs::DrillingContext`)
/// generalised to a full `Tool` and to emit a warning (rather than
/// silently overwrite) on redefinition, per spec §3.5/§4.6.
#[derive(Debug, Clone, Default)]
pub struct ToolTable {
    tools: BTreeMap<u32, Tool>,
    handles: BTreeMap<u32, ToolHandle>,
}

impl ToolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define or redefine tool `index`. Returns `true` if this redefined
    /// an existing entry (caller should warn).
    pub fn define(&mut self, index: u32, tool: Tool) -> bool {
        let redefined = self.tools.contains_key(&index);
        let handle = ToolHandle(self.handles.len());
        self.tools.insert(index, tool);
        self.handles.entry(index).or_insert(handle);
        redefined
    }

    pub fn get(&self, index: u32) -> Option<&Tool> {
        self.tools.get(&index)
    }

    pub fn handle(&self, index: u32) -> Option<ToolHandle> {
        self.handles.get(&index).copied()
    }

    /// Reverse lookup from a `ToolHandle` back to its `Tool` entry. Used by
    /// the drill/slot projection (spec §3.7), which only has the handle an
    /// `ObjectRef::Tool` carries, not the original file index.
    pub fn get_by_handle(&self, handle: ToolHandle) -> Option<&Tool> {
        let index = self.handles.iter().find(|&(_, h)| *h == handle).map(|(&index, _)| index)?;
        self.tools.get(&index)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Tool)> {
        self.tools.iter().map(|(&index, tool)| (index, tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redefinition_is_reported() {
        let mut table = ToolTable::new();
        let tool = Tool {
            diameter: 0.3,
            depth_offset: None,
            plating: Plating::Unknown,
            unit: LengthUnit::Millimeter,
        };
        assert!(!table.define(1, tool));
        assert!(table.define(1, tool));
    }
}
