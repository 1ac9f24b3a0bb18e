//! The two-level scoped environment: program → class → method.
//!
//! Scopes form a tree stored in an arena indexed by [`ScopeId`]; children are
//! named so that later passes can re-enter the exact scope the builder
//! created (`"Class: Foo"`, `"Method: bar"`). Name lookup walks parent links;
//! the `_in_scope` variants do not.
//!
//! All maps are [`IndexMap`]s: the bytecode emitter enumerates a method
//! scope's variables and a class scope's fields in insertion order.

use std::fmt;
use std::fmt::Write;

use indexmap::IndexMap;

use minijava_syntax::ast::Type;

use crate::records::{ClassRecord, MethodRecord, VariableRecord};

/// Index of a scope in the symbol table's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub usize);

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The record owning a scope: the class of a class scope, the method of a
/// method scope. The program root has none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKey {
    Class(String),
    Method(String),
}

#[derive(Debug)]
pub struct Scope {
    name: String,
    owner: Option<RecordKey>,
    parent: Option<ScopeId>,
    children: IndexMap<String, ScopeId>,
    variables: IndexMap<String, VariableRecord>,
    methods: IndexMap<String, MethodRecord>,
    classes: IndexMap<String, ClassRecord>,
}

impl Scope {
    fn new(name: String, owner: Option<RecordKey>, parent: Option<ScopeId>) -> Self {
        Scope {
            name,
            owner,
            parent,
            children: IndexMap::new(),
            variables: IndexMap::new(),
            methods: IndexMap::new(),
            classes: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<&RecordKey> {
        self.owner.as_ref()
    }

    /// Variable names in declaration order.
    pub fn variable_names(&self) -> Vec<String> {
        self.variables.keys().cloned().collect()
    }
}

/// The scope tree plus a cursor for the pass currently walking it.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::new("Program".into(), None, None)],
            current: ScopeId(0),
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn current(&self) -> ScopeId {
        self.current
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0]
    }

    fn current_scope(&self) -> &Scope {
        &self.scopes[self.current.0]
    }

    fn current_scope_mut(&mut self) -> &mut Scope {
        &mut self.scopes[self.current.0]
    }

    pub fn current_scope_name(&self) -> &str {
        self.current_scope().name()
    }

    pub fn current_owner(&self) -> Option<&RecordKey> {
        self.current_scope().owner()
    }

    /// Enter the named child of the current scope, creating it on first use.
    pub fn enter_scope(&mut self, name: &str, owner: Option<RecordKey>) -> ScopeId {
        if let Some(&child) = self.scopes[self.current.0].children.get(name) {
            self.current = child;
            return child;
        }
        let child = ScopeId(self.scopes.len());
        self.scopes
            .push(Scope::new(name.to_string(), owner, Some(self.current)));
        self.scopes[self.current.0]
            .children
            .insert(name.to_string(), child);
        self.current = child;
        child
    }

    pub fn enter_class_scope(&mut self, class_name: &str) -> ScopeId {
        self.enter_scope(
            &format!("Class: {class_name}"),
            Some(RecordKey::Class(class_name.to_string())),
        )
    }

    pub fn enter_method_scope(&mut self, method_name: &str) -> ScopeId {
        self.enter_scope(
            &format!("Method: {method_name}"),
            Some(RecordKey::Method(method_name.to_string())),
        )
    }

    /// Move the cursor to the parent scope; no-op at the root.
    pub fn exit_scope(&mut self) {
        if let Some(parent) = self.current_scope().parent {
            self.current = parent;
        }
    }

    /// Return the cursor to the program root.
    pub fn reset(&mut self) {
        self.current = self.root();
    }

    pub fn add_variable(&mut self, ty: Type, name: &str) {
        let record = VariableRecord::new(name, ty);
        self.current_scope_mut()
            .variables
            .insert(name.to_string(), record);
    }

    pub fn add_method(&mut self, return_type: Type, name: &str) {
        let record = MethodRecord::new(name, return_type);
        self.current_scope_mut()
            .methods
            .insert(name.to_string(), record);
    }

    pub fn add_class(&mut self, name: &str) {
        let record = ClassRecord::new(name);
        self.current_scope_mut()
            .classes
            .insert(name.to_string(), record);
    }

    pub fn lookup_variable(&self, name: &str) -> Option<&VariableRecord> {
        self.walk(|scope| scope.variables.get(name))
    }

    /// Lookup restricted to the current scope, used by duplicate checks.
    pub fn lookup_variable_in_scope(&self, name: &str) -> Option<&VariableRecord> {
        self.current_scope().variables.get(name)
    }

    pub fn lookup_method(&self, name: &str) -> Option<&MethodRecord> {
        self.walk(|scope| scope.methods.get(name))
    }

    pub fn lookup_method_in_scope(&self, name: &str) -> Option<&MethodRecord> {
        self.current_scope().methods.get(name)
    }

    pub fn lookup_class(&self, name: &str) -> Option<&ClassRecord> {
        self.walk(|scope| scope.classes.get(name))
    }

    pub fn lookup_method_mut(&mut self, name: &str) -> Option<&mut MethodRecord> {
        let id = self.walk_id(|scope| scope.methods.contains_key(name))?;
        self.scopes[id.0].methods.get_mut(name)
    }

    pub fn lookup_class_mut(&mut self, name: &str) -> Option<&mut ClassRecord> {
        let id = self.walk_id(|scope| scope.classes.contains_key(name))?;
        self.scopes[id.0].classes.get_mut(name)
    }

    /// A method's record as seen from its class, without moving the cursor.
    pub fn method_in_class(&self, class_name: &str, method_name: &str) -> Option<&MethodRecord> {
        let class_scope = self.child_of(self.root(), &format!("Class: {class_name}"))?;
        self.scope(class_scope).methods.get(method_name)
    }

    /// The method scope for `ClassName.methodName`, used by the emitter.
    pub fn resolve_scope(&self, class_name: &str, method_name: &str) -> Option<ScopeId> {
        let class_scope = self.child_of(self.root(), &format!("Class: {class_name}"))?;
        self.child_of(class_scope, &format!("Method: {method_name}"))
    }

    fn child_of(&self, id: ScopeId, name: &str) -> Option<ScopeId> {
        self.scope(id).children.get(name).copied()
    }

    fn walk<'s, T: ?Sized>(&'s self, select: impl Fn(&'s Scope) -> Option<&'s T>) -> Option<&'s T> {
        let mut id = Some(self.current);
        while let Some(scope_id) = id {
            let scope = self.scope(scope_id);
            if let Some(found) = select(scope) {
                return Some(found);
            }
            id = scope.parent;
        }
        None
    }

    fn walk_id(&self, matches: impl Fn(&Scope) -> bool) -> Option<ScopeId> {
        let mut id = Some(self.current);
        while let Some(scope_id) = id {
            let scope = self.scope(scope_id);
            if matches(scope) {
                return Some(scope_id);
            }
            id = scope.parent;
        }
        None
    }

    /// Renders the scope tree as a `digraph` for `output/st.dot`.
    pub fn to_graphviz(&self) -> String {
        let mut out = String::from("digraph {\nnode [shape=box]\n");
        for (index, scope) in self.scopes.iter().enumerate() {
            let mut label = match scope.owner() {
                Some(RecordKey::Class(name)) => format!("Symbol table: (class {name})"),
                Some(RecordKey::Method(name)) => format!("Symbol table: (method {name})"),
                None => format!("Symbol table: ({})", scope.name()),
            };
            for variable in scope.variables.values() {
                let _ = write!(label, "\\n{}: {}", variable.name, variable.ty);
            }
            for method in scope.methods.values() {
                let _ = write!(label, "\\n{}(): {}", method.name, method.return_type);
            }
            for class in scope.classes.values() {
                let _ = write!(label, "\\nclass {}", class.name);
            }
            let _ = writeln!(out, "n{index} [label=\"{label}\"];");
            if let Some(parent) = scope.parent {
                let _ = writeln!(out, "n{} -> n{index};", parent.0);
            }
        }
        out.push_str("}\n");
        out
    }
}
