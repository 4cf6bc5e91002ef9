//! `gerberforge`: parsers and emitters for Gerber (RS-274X) vector artwork
//! and Excellon/XNC drill and route files.
//!
//! The object model (`object`, `aperture`) is shared between both formats;
//! each format gets its own tokenizer/parser/emitter trio under its own
//! module, and its own owning file type (`GerberFile`, `ExcellonFile`).

pub mod aperture;
pub mod config;
pub mod error;
pub mod excellon;
pub mod gerber;
pub mod object;
pub mod units;

pub use config::ParseOptions;
pub use error::{Diagnostic, Diagnostics, ExcellonError, GerberError, SourcePosition, WarningKind};
pub use excellon::ExcellonFile;
pub use gerber::GerberFile;
