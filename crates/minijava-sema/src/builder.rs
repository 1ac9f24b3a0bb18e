//! Symbol-table construction pass.
//!
//! Walks the AST and populates the scope tree: one class scope per class
//! (with an implicit `this` variable), one method scope per method. The main
//! class additionally gets a synthetic `void main` method whose only variable
//! is the `String[]` argument.
//!
//! Each declaration is checked against the current scope only; duplicates are
//! reported through the sink and skipped.

use minijava_syntax::ast::{ClassDecl, MainClass, MethodDecl, Program, Type, VarDecl};
use minijava_syntax::diagnostics::{Diagnostic, DiagnosticSink, SourceSpan};

use crate::records::VariableRecord;
use crate::scope::SymbolTable;

/// Outcome of a semantic pass: how many errors went to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SemanticPassResult {
    pub error_count: usize,
}

impl SemanticPassResult {
    pub fn ok(&self) -> bool {
        self.error_count == 0
    }
}

pub fn build_symbol_table(
    program: &Program,
    table: &mut SymbolTable,
    sink: &mut dyn DiagnosticSink,
) -> SemanticPassResult {
    table.reset();
    let mut builder = Builder {
        table,
        sink,
        errors: 0,
    };
    builder.main_class(&program.main);
    for class in &program.classes {
        builder.class(class);
    }
    SemanticPassResult {
        error_count: builder.errors,
    }
}

struct Builder<'t, 'd> {
    table: &'t mut SymbolTable,
    sink: &'d mut dyn DiagnosticSink,
    errors: usize,
}

impl Builder<'_, '_> {
    fn main_class(&mut self, main: &MainClass) {
        if self.table.lookup_class(&main.name).is_some() {
            self.error(main.line, format!("Class '{}' already declared.", main.name));
            return;
        }

        self.table.add_class(&main.name);
        self.table.enter_class_scope(&main.name);
        self.declare_this(&main.name);

        self.table.add_method(Type::Void, "main");
        self.table.enter_method_scope("main");
        self.table.add_variable(Type::StringArray, &main.arg_name);
        self.table.exit_scope();

        self.table.exit_scope();
    }

    fn class(&mut self, class: &ClassDecl) {
        if self.table.lookup_class(&class.name).is_some() {
            self.error(
                class.line,
                format!("Class '{}' already declared.", class.name),
            );
            return;
        }

        self.table.add_class(&class.name);
        self.table.enter_class_scope(&class.name);
        self.declare_this(&class.name);

        for field in &class.fields {
            self.field(&class.name, field);
        }
        for method in &class.methods {
            self.method(method);
        }

        self.table.exit_scope();
    }

    /// Every class scope carries `this`, typed as the class itself. It is
    /// registered as the first field so activations can resolve it.
    fn declare_this(&mut self, class_name: &str) {
        self.table
            .add_variable(Type::Class(class_name.to_string()), "this");
        if let Some(class) = self.table.lookup_class_mut(class_name) {
            let ty = class.ty();
            class.fields.insert("this".to_string(), ty);
        }
    }

    fn field(&mut self, class_name: &str, decl: &VarDecl) {
        if self.table.lookup_variable_in_scope(&decl.name).is_some() {
            self.error(
                decl.line,
                format!("Variable '{}' already declared.", decl.name),
            );
            return;
        }

        self.table.add_variable(decl.ty.clone(), &decl.name);
        if let Some(class) = self.table.lookup_class_mut(class_name) {
            class.fields.insert(decl.name.clone(), decl.ty.clone());
        }
    }

    fn method(&mut self, method: &MethodDecl) {
        if self.table.lookup_method_in_scope(&method.name).is_some() {
            self.error(
                method.line,
                format!("Method '{}' already declared.", method.name),
            );
            return;
        }

        self.table
            .add_method(method.return_type.clone(), &method.name);
        self.table.enter_method_scope(&method.name);

        for param in &method.params {
            self.parameter(&method.name, param);
        }
        for local in &method.locals {
            self.local(local);
        }

        self.table.exit_scope();
    }

    fn parameter(&mut self, method_name: &str, decl: &VarDecl) {
        if self.table.lookup_variable_in_scope(&decl.name).is_some() {
            self.error(
                decl.line,
                format!("Parameter '{}' already declared.", decl.name),
            );
            return;
        }

        self.table.add_variable(decl.ty.clone(), &decl.name);
        if let Some(record) = self.table.lookup_method_mut(method_name) {
            record
                .params
                .push(VariableRecord::new(&decl.name, decl.ty.clone()));
        }
    }

    fn local(&mut self, decl: &VarDecl) {
        if self.table.lookup_variable_in_scope(&decl.name).is_some() {
            self.error(
                decl.line,
                format!("Variable '{}' already declared.", decl.name),
            );
            return;
        }

        self.table.add_variable(decl.ty.clone(), &decl.name);
    }

    fn error(&mut self, line: u32, detail: String) {
        self.errors += 1;
        self.sink.emit(Diagnostic::error(
            format!("Error: (line {line}) {detail}"),
            SourceSpan::for_line(line),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijava_syntax::diagnostics::CollectingSink;
    use minijava_syntax::lexer::Lexer;
    use minijava_syntax::parser::Parser;

    fn build(source: &str) -> (SymbolTable, CollectingSink, SemanticPassResult) {
        let mut sink = CollectingSink::new();
        let program = {
            let lexer = Lexer::new(source, &mut sink);
            Parser::new(lexer).parse_goal().expect("test source parses")
        };
        let mut table = SymbolTable::new();
        let result = build_symbol_table(&program, &mut table, &mut sink);
        (table, sink, result)
    }

    const PROGRAM: &str = r#"
        public class Main { public static void main(String[] args) { } }
        class Foo {
            int count;
            boolean ready;
            public int bump(int by, int times) {
                int next;
                next = count + by;
                return next;
            }
        }
    "#;

    #[test]
    fn builds_class_and_method_scopes() {
        let (table, _, result) = build(PROGRAM);
        assert!(result.ok());

        let method_scope = table.resolve_scope("Foo", "bump").unwrap();
        assert_eq!(
            table.scope(method_scope).variable_names(),
            vec!["by", "times", "next"]
        );

        let class = table.lookup_class("Foo").unwrap();
        assert_eq!(
            class.fields.keys().collect::<Vec<_>>(),
            vec!["this", "count", "ready"]
        );
    }

    #[test]
    fn main_class_gets_synthetic_main_method() {
        let (table, _, result) = build(PROGRAM);
        assert!(result.ok());

        let record = table.method_in_class("Main", "main").unwrap();
        assert_eq!(record.return_type, minijava_syntax::ast::Type::Void);
        assert!(record.params.is_empty());

        let main_scope = table.resolve_scope("Main", "main").unwrap();
        assert_eq!(table.scope(main_scope).variable_names(), vec!["args"]);
    }

    #[test]
    fn parameters_are_ordered_in_the_record() {
        let (table, _, _) = build(PROGRAM);
        let record = table.method_in_class("Foo", "bump").unwrap();
        assert_eq!(record.param_names(), vec!["by", "times"]);
    }

    #[test]
    fn duplicate_class_is_reported() {
        let source = r#"
            public class Main { public static void main(String[] args) { } }
            class Foo { }
            class Foo { }
        "#;
        let (_, sink, result) = build(source);
        assert_eq!(result.error_count, 1);
        assert!(sink.diagnostics()[0]
            .message
            .contains("Class 'Foo' already declared."));
    }

    #[test]
    fn duplicate_variable_and_parameter_are_reported() {
        let source = r#"
            public class Main { public static void main(String[] args) { } }
            class Foo {
                int x;
                int x;
                public int f(int a, int a) { return 0; }
            }
        "#;
        let (_, sink, result) = build(source);
        assert_eq!(result.error_count, 2);
        let messages: Vec<_> = sink.diagnostics().iter().map(|d| d.message.as_str()).collect();
        assert!(messages.iter().any(|m| m.contains("Variable 'x' already declared.")));
        assert!(messages.iter().any(|m| m.contains("Parameter 'a' already declared.")));
    }

    #[test]
    fn scope_uniqueness_invariant() {
        let (table, _, _) = build(PROGRAM);
        // Keys of an IndexMap are unique by construction; spot-check that a
        // redeclaration attempt did not smuggle in a duplicate record.
        let scope = table.scope(table.resolve_scope("Foo", "bump").unwrap());
        let names = scope.variable_names();
        let mut deduped = names.clone();
        deduped.dedup();
        assert_eq!(names, deduped);
    }
}
