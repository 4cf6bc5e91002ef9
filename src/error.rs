//! Error types and the diagnostic sink shared by the Gerber and Excellon parsers.
//!
//! Fatal conditions are typed (`thiserror`) and abort the current parse.
//! Everything recoverable is pushed onto a [`Diagnostics`] sink instead of
//! being returned as an `Err` — the object model never contains a
//! partially-constructed primitive, and a handler either appends a
//! complete object or records a warning, never both.

use std::fmt;

/// Line/column of the token or statement a diagnostic or error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourcePosition {
    pub line: u32,
    pub column: usize,
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Fatal errors raised while parsing a Gerber file.
#[derive(thiserror::Error, Debug)]
pub enum GerberError {
    #[error("{position} \"{text}\": {reason}")]
    Syntax {
        position: SourcePosition,
        text: String,
        reason: String,
    },

    #[error("{position}: format spec has unequal X/Y digit counts ({x_digits:?} vs {y_digits:?})")]
    FormatMismatch {
        position: SourcePosition,
        x_digits: (u32, u32),
        y_digits: (u32, u32),
    },

    #[error("{position}: coordinate has no decimal point and no number format has been announced")]
    NumberFormatUnknown { position: SourcePosition },

    #[error("{position}: aperture D{code} used before it was defined")]
    UndefinedAperture { position: SourcePosition, code: i32 },

    #[error("{position}: {reason}")]
    RegionMisuse {
        position: SourcePosition,
        reason: String,
    },

    #[error("{position}: include file error: {reason}")]
    IncludeError {
        position: SourcePosition,
        reason: String,
    },

    #[error("{position}: attempted to delete file-scope attribute \"{name}\"")]
    FileAttributeDelete {
        position: SourcePosition,
        name: String,
    },
}

/// Fatal errors raised while parsing an Excellon/XNC file.
#[derive(thiserror::Error, Debug)]
pub enum ExcellonError {
    #[error("{position} \"{text}\": {reason}")]
    Syntax {
        position: SourcePosition,
        text: String,
        reason: String,
    },

    #[error("{position}: coordinate has no decimal point and no number format has been announced")]
    NumberFormatUnknown { position: SourcePosition },

    #[error("Allegro sidecar specifies both leading and trailing zero suppression")]
    AmbiguousFormat,

    #[error("{position}: tool T{index:02} selected before it was defined")]
    UndefinedTool { position: SourcePosition, index: u32 },
}

/// Recoverable condition kind. Distinct from [`log`] output: these are
/// data about the parsed file, attached to the positions that produced
/// them, not operational tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    Syntax,
    Deprecation,
    UnknownStatement,
    Resource,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: WarningKind,
    pub position: SourcePosition,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:?}: {}", self.position, self.kind, self.message)
    }
}

/// Ordered collection of [`Diagnostic`]s produced during a single parse.
///
/// Diagnostics are appended in-order with the input lines that produced
/// them and never cause the parse to abort.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: WarningKind, position: SourcePosition, message: impl Into<String>) {
        self.records.push(Diagnostic {
            kind,
            position,
            message: message.into(),
        });
    }

    pub fn warn(&mut self, position: SourcePosition, message: impl Into<String>) {
        self.push(WarningKind::Syntax, position, message);
    }

    pub fn deprecated(&mut self, position: SourcePosition, message: impl Into<String>) {
        self.push(WarningKind::Deprecation, position, message);
    }

    pub fn unknown_statement(&mut self, position: SourcePosition, message: impl Into<String>) {
        self.push(WarningKind::UnknownStatement, position, message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

impl IntoIterator for Diagnostics {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}
