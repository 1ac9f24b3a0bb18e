//! Symbol-table records for variables, methods, and classes.
//!
//! Scopes own every record; a class's methods live in the maps of its child
//! scopes and are reached through [`crate::scope::SymbolTable`] lookups, so
//! no record ever aliases another.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use minijava_syntax::ast::Type;

/// A declared variable: field, parameter, local, or IR temporary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRecord {
    pub name: String,
    pub ty: Type,
}

impl VariableRecord {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        VariableRecord {
            name: name.into(),
            ty,
        }
    }
}

/// A declared method: signature plus its parameters in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRecord {
    pub name: String,
    pub return_type: Type,
    pub params: Vec<VariableRecord>,
}

impl MethodRecord {
    pub fn new(name: impl Into<String>, return_type: Type) -> Self {
        MethodRecord {
            name: name.into(),
            return_type,
            params: Vec::new(),
        }
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Parameter names in declaration order, used for the callee prelude.
    pub fn param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }
}

/// A declared class: its name doubles as its type. Fields are kept in
/// declaration order, with the implicit `this` first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    pub fields: IndexMap<String, Type>,
}

impl ClassRecord {
    pub fn new(name: impl Into<String>) -> Self {
        ClassRecord {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    /// The class's type, equal to its name.
    pub fn ty(&self) -> Type {
        Type::Class(self.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_type_equals_name() {
        let class = ClassRecord::new("Foo");
        assert_eq!(class.ty(), Type::Class("Foo".into()));
    }

    #[test]
    fn method_param_order_is_preserved() {
        let mut method = MethodRecord::new("f", Type::Int);
        method.params.push(VariableRecord::new("b", Type::Int));
        method.params.push(VariableRecord::new("a", Type::Boolean));
        assert_eq!(method.param_names(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(method.param_count(), 2);
    }

    #[test]
    fn records_serde_round_trip() {
        let record = MethodRecord {
            name: "run".into(),
            return_type: Type::IntArray,
            params: vec![VariableRecord::new("n", Type::Int)],
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: MethodRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
