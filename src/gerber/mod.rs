pub mod emitter;
pub mod file;
pub mod graphics_state;
pub mod macro_parser;
pub mod parser;
pub mod tokenizer;

pub use file::GerberFile;
