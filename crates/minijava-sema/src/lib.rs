pub mod builder;
pub mod records;
pub mod scope;
pub mod typecheck;

// Re-export commonly used types
pub use builder::{build_symbol_table, SemanticPassResult};
pub use records::{ClassRecord, MethodRecord, VariableRecord};
pub use scope::{RecordKey, Scope, ScopeId, SymbolTable};
pub use typecheck::{check_types, TypeInfo};
