pub mod env_record;
pub mod error;
pub mod execution_context;
pub mod finalization_registry;
pub mod function_object;
pub mod heap;
pub mod iterator_object;
pub mod lex_env;
pub mod object;
pub mod object_property;
pub mod operations;
pub mod promise;
pub mod realm;
pub mod symbol;
pub mod value;
