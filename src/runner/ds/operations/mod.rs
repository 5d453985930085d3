pub mod lex_env;
pub mod object;
pub mod promise;
pub mod type_conversion;
