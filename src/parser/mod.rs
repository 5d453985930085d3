pub mod api;
pub mod ast;

pub use api::{ParsedModule, ParserError, SourceParser};
