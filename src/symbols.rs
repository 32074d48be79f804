//! Symbol table and Pass A — symbol discovery (spec.md §4.3).
//!
//! The symbol table is keyed by `(owning_function, name)`: no scope-nested
//! shadowing within a single function is representable, matching the
//! invariant in spec.md §3 ("no two symbols share (name, owning_function)").
//! `scope_level` is retained on each `Symbol` purely for diagnostics.

use std::collections::HashMap;

use crate::ast::{
    BlockStatement, ClassMember, Declaration, Expression, ForEachStatement, ForStatement,
    FunctionDeclaration, LetDeclaration, NodeId, Program, RoutineDeclaration, SourceLocation,
    Statement, StaticDeclaration,
};
use crate::diagnostics::DiagnosticBag;
use crate::types::VarType;

/// Sentinel owner for every file-scope entity.
pub const GLOBAL_SCOPE: &str = "Global";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    LocalVar,
    Parameter,
    GlobalVar,
    StaticVar,
    Manifest,
    Function,
    Routine,
    MemberVar,
    Label,
    RuntimeFunction,
    RuntimeRoutine,
    RuntimeFloatFunction,
    RuntimeFloatRoutine,
    RuntimeListFunction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub var_type: VarType,
    pub scope_level: usize,
    pub owning_function: String,
    pub parameters: Option<Vec<String>>,
    pub absolute_value: Option<i64>,
}

impl Symbol {
    fn new(name: &str, kind: SymbolKind, var_type: VarType, scope_level: usize, owning_function: &str) -> Self {
        Symbol {
            name: name.to_string(),
            kind,
            var_type,
            scope_level,
            owning_function: owning_function.to_string(),
            parameters: None,
            absolute_value: None,
        }
    }

    /// A symbol for a runtime-imported function/routine (spec.md §6).
    /// Runtime descriptors carry an `arg_count` but no parameter names, so
    /// `parameters` is filled with placeholders purely to record the count.
    pub fn runtime(name: &str, kind: SymbolKind, var_type: VarType, arg_count: usize) -> Self {
        Symbol {
            parameters: Some((0..arg_count).map(|i| format!("_arg{i}")).collect()),
            ..Symbol::new(name, kind, var_type, 0, GLOBAL_SCOPE)
        }
    }
}

/// The resolution key: `(owning_function, name)`.
type SymbolKey = (String, String);

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: HashMap<SymbolKey, Symbol>,
    insertion_order: Vec<SymbolKey>,
    manifest_origin: HashMap<SymbolKey, (NodeId, SourceLocation)>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Inserts a symbol. Returns the rejected symbol if `(name, owner)` is
    /// already occupied — the caller decides how to report the duplicate;
    /// per spec.md §4.3 the later declaration is always rejected.
    pub fn insert(&mut self, symbol: Symbol) -> Result<(), Symbol> {
        let key = (symbol.owning_function.clone(), symbol.name.clone());
        if self.symbols.contains_key(&key) {
            return Err(symbol);
        }
        self.insertion_order.push(key.clone());
        self.symbols.insert(key, symbol);
        Ok(())
    }

    pub fn record_manifest_origin(&mut self, owner: &str, name: &str, id: NodeId, location: SourceLocation) {
        self.manifest_origin
            .insert((owner.to_string(), name.to_string()), (id, location));
    }

    pub fn manifest_origin(&self, owner: &str, name: &str) -> Option<(NodeId, SourceLocation)> {
        self.manifest_origin.get(&(owner.to_string(), name.to_string())).copied()
    }

    pub fn resolve(&self, owning_function: &str, name: &str) -> Option<&Symbol> {
        self.symbols.get(&(owning_function.to_string(), name.to_string()))
    }

    pub fn resolve_mut(&mut self, owning_function: &str, name: &str) -> Option<&mut Symbol> {
        self.symbols.get_mut(&(owning_function.to_string(), name.to_string()))
    }

    pub fn resolve_global(&self, name: &str) -> Option<&Symbol> {
        self.resolve(GLOBAL_SCOPE, name)
    }

    /// Resolution with fallback: a name not found in `owner`'s scope is
    /// looked up in the `"Global"` scope (functions/routines/globals/
    /// manifests are always visible from any function body).
    pub fn resolve_visible(&self, owning_function: &str, name: &str) -> Option<&Symbol> {
        self.resolve(owning_function, name)
            .or_else(|| self.resolve_global(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.insertion_order.iter().map(move |k| &self.symbols[k])
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Pass A: walks the AST in source order, building the symbol table.
pub struct SymbolDiscovery {
    table: SymbolTable,
    diagnostics: DiagnosticBag,
}

impl SymbolDiscovery {
    pub fn run(program: &Program) -> (SymbolTable, DiagnosticBag) {
        let mut pass = SymbolDiscovery {
            table: SymbolTable::new(),
            diagnostics: DiagnosticBag::new(),
        };
        for decl in &program.declarations {
            pass.discover_top_level(decl);
        }
        (pass.table, pass.diagnostics)
    }

    fn declare(&mut self, symbol: Symbol, location: SourceLocation) {
        let name = symbol.name.clone();
        let owner = symbol.owning_function.clone();
        if let Err(rejected) = self.table.insert(symbol) {
            self.diagnostics.push(crate::diagnostics::Diagnostic::warning(
                format!(
                    "'{}' is already declared in '{}'; later declaration ignored",
                    rejected.name, owner
                ),
                location.line,
                location.column,
            ));
            let _ = name;
        }
    }

    fn discover_top_level(&mut self, decl: &Declaration) {
        match decl {
            Declaration::Let(l) => self.discover_let(l, GLOBAL_SCOPE, 0, SymbolKind::GlobalVar),
            Declaration::Function(f) => self.discover_function(f),
            Declaration::Routine(r) => self.discover_routine(r),
            Declaration::Class(c) => {
                // Member layout and method resolution belong to Pass B
                // (classes.rs); Pass A only descends into method bodies so
                // their locals/labels are discovered like any other function.
                for member in &c.members {
                    if let ClassMember::Method(m) = member {
                        if let Some(f) = &m.function {
                            let owner = format!("{}::{}", c.name, f.name);
                            for p in &f.params {
                                self.declare(
                                    Symbol::new(p, SymbolKind::Parameter, VarType::Unknown, 1, &owner),
                                    f.location,
                                );
                            }
                            self.walk_expr(&f.body, &owner, 1);
                        }
                        if let Some(r) = &m.routine {
                            let owner = format!("{}::{}", c.name, r.name);
                            for p in &r.params {
                                self.declare(
                                    Symbol::new(p, SymbolKind::Parameter, VarType::Unknown, 1, &owner),
                                    r.location,
                                );
                            }
                            self.walk_statement(&r.body, &owner, 1);
                        }
                    }
                }
            }
            Declaration::Manifest(m) => self.discover_manifest(m, GLOBAL_SCOPE, 0),
            Declaration::Static(s) => self.discover_static(s, GLOBAL_SCOPE, 0),
            Declaration::Global(g) => {
                self.declare(
                    Symbol {
                        absolute_value: g.slot,
                        ..Symbol::new(&g.name, SymbolKind::GlobalVar, VarType::Unknown, 0, GLOBAL_SCOPE)
                    },
                    g.location,
                );
            }
            Declaration::GlobalVariable(gv) => {
                let var_type = if gv.is_float { VarType::Float } else { VarType::Unknown };
                self.declare(
                    Symbol {
                        absolute_value: gv.slot,
                        ..Symbol::new(&gv.name, SymbolKind::GlobalVar, var_type, 0, GLOBAL_SCOPE)
                    },
                    gv.location,
                );
            }
            Declaration::Label(l) => {
                self.declare(
                    Symbol::new(&l.name, SymbolKind::Label, VarType::Unknown, 0, GLOBAL_SCOPE),
                    l.location,
                );
            }
        }
    }

    fn discover_manifest(&mut self, m: &crate::ast::ManifestDeclaration, owner: &str, scope_level: usize) {
        if let Some((_, origin)) = self.table.manifest_origin(owner, &m.name) {
            self.diagnostics.push(crate::diagnostics::Diagnostic::warning(
                format!(
                    "MANIFEST '{}' redefined (originally declared at L{} C{})",
                    m.name,
                    origin.line + 1,
                    origin.column + 1
                ),
                m.location.line,
                m.location.column,
            ));
            return;
        }
        self.table.record_manifest_origin(owner, &m.name, m.id, m.location);
        self.declare(
            Symbol {
                absolute_value: Some(m.value),
                ..Symbol::new(&m.name, SymbolKind::Manifest, VarType::Integer, scope_level, owner)
            },
            m.location,
        );
    }

    fn discover_static(&mut self, s: &StaticDeclaration, owner: &str, scope_level: usize) {
        let var_type = if s.is_float { VarType::Float } else { VarType::Integer };
        for name in &s.names {
            self.declare(
                Symbol::new(name, SymbolKind::StaticVar, var_type, scope_level, owner),
                s.location,
            );
        }
    }

    /// Handles both file-scope `LET` (kind `GlobalVar`) and block-scope
    /// `LET` (kind `LocalVar`), plus the "parameterless function via
    /// `LET name = VALOF ...`" recognition rule (spec.md §4.3).
    fn discover_let(&mut self, l: &LetDeclaration, owner: &str, scope_level: usize, default_kind: SymbolKind) {
        if l.names.len() == 1 && l.initializers.len() == 1 {
            let is_float_valof = matches!(l.initializers[0], Expression::FloatValofExpression { .. });
            let is_valof = is_float_valof || matches!(l.initializers[0], Expression::ValofExpression { .. });
            if is_valof {
                let var_type = if is_float_valof { VarType::Float } else { VarType::Integer };
                self.declare(
                    Symbol {
                        parameters: Some(Vec::new()),
                        ..Symbol::new(&l.names[0], SymbolKind::Function, var_type, scope_level, owner)
                    },
                    l.location,
                );
                return;
            }
        }

        let var_type = l
            .explicit_type
            .unwrap_or_else(|| {
                if l.is_float {
                    VarType::Float
                } else if l.initializers.iter().any(is_float_literal) {
                    VarType::Float
                } else {
                    VarType::Integer
                }
            });
        for name in &l.names {
            self.declare(
                Symbol::new(name, default_kind, var_type, scope_level, owner),
                l.location,
            );
        }
    }

    fn discover_function(&mut self, f: &FunctionDeclaration) {
        let owner = f.name.clone();
        self.declare(
            Symbol {
                parameters: Some(f.params.clone()),
                ..Symbol::new(&f.name, SymbolKind::Function, if f.is_float { VarType::Float } else { VarType::Unknown }, 0, GLOBAL_SCOPE)
            },
            f.location,
        );
        for p in &f.params {
            self.declare(
                Symbol::new(p, SymbolKind::Parameter, VarType::Unknown, 1, &owner),
                f.location,
            );
        }
        self.walk_expr(&f.body, &owner, 1);
    }

    fn discover_routine(&mut self, r: &RoutineDeclaration) {
        let owner = r.name.clone();
        self.declare(
            Symbol {
                parameters: Some(r.params.clone()),
                ..Symbol::new(&r.name, SymbolKind::Routine, VarType::Unknown, 0, GLOBAL_SCOPE)
            },
            r.location,
        );
        for p in &r.params {
            self.declare(
                Symbol::new(p, SymbolKind::Parameter, VarType::Unknown, 1, &owner),
                r.location,
            );
        }
        self.walk_statement(&r.body, &owner, 1);
    }

    fn discover_block_declaration(&mut self, decl: &Declaration, owner: &str, scope_level: usize) {
        match decl {
            Declaration::Let(l) => self.discover_let(l, owner, scope_level, SymbolKind::LocalVar),
            Declaration::Static(s) => self.discover_static(s, owner, scope_level),
            Declaration::Manifest(m) => self.discover_manifest(m, owner, scope_level),
            Declaration::Global(g) => {
                self.declare(
                    Symbol {
                        absolute_value: g.slot,
                        ..Symbol::new(&g.name, SymbolKind::GlobalVar, VarType::Unknown, 0, GLOBAL_SCOPE)
                    },
                    g.location,
                );
            }
            Declaration::GlobalVariable(gv) => {
                let var_type = if gv.is_float { VarType::Float } else { VarType::Unknown };
                self.declare(
                    Symbol {
                        absolute_value: gv.slot,
                        ..Symbol::new(&gv.name, SymbolKind::GlobalVar, var_type, 0, GLOBAL_SCOPE)
                    },
                    gv.location,
                );
            }
            Declaration::Label(l) => {
                self.declare(
                    Symbol::new(&l.name, SymbolKind::Label, VarType::Unknown, scope_level, owner),
                    l.location,
                );
            }
            Declaration::Function(_) | Declaration::Routine(_) | Declaration::Class(_) => {
                // Nested function/routine/class declarations are not part of
                // this grammar's block scoping; unreachable in well-formed ASTs.
            }
        }
    }

    fn discover_block(&mut self, b: &BlockStatement, owner: &str, scope_level: usize) {
        for decl in &b.declarations {
            self.discover_block_declaration(decl, owner, scope_level + 1);
        }
        for stmt in &b.statements {
            self.walk_statement(stmt, owner, scope_level + 1);
        }
    }

    fn walk_statement(&mut self, stmt: &Statement, owner: &str, scope_level: usize) {
        match stmt {
            Statement::Assignment(a) => {
                for e in a.lhs.iter().chain(a.rhs.iter()) {
                    self.walk_expr(e, owner, scope_level);
                }
            }
            Statement::RoutineCall(e) | Statement::Goto(e) | Statement::Resultis(e) | Statement::Free(e) => {
                self.walk_expr(e, owner, scope_level);
            }
            Statement::If(s) => {
                self.walk_expr(&s.condition, owner, scope_level);
                self.walk_statement(&s.then_branch, owner, scope_level);
            }
            Statement::Unless(s) => {
                self.walk_expr(&s.condition, owner, scope_level);
                self.walk_statement(&s.then_branch, owner, scope_level);
            }
            Statement::Test(s) => {
                self.walk_expr(&s.condition, owner, scope_level);
                self.walk_statement(&s.then_branch, owner, scope_level);
                self.walk_statement(&s.else_branch, owner, scope_level);
            }
            Statement::While(s) => {
                self.walk_expr(&s.condition, owner, scope_level);
                self.walk_statement(&s.body, owner, scope_level);
            }
            Statement::Until(s) => {
                self.walk_expr(&s.condition, owner, scope_level);
                self.walk_statement(&s.body, owner, scope_level);
            }
            Statement::Repeat(s) => {
                self.walk_statement(&s.body, owner, scope_level);
                if let Some(c) = &s.condition {
                    self.walk_expr(c, owner, scope_level);
                }
            }
            Statement::For(s) => self.walk_for(s, owner, scope_level),
            Statement::ForEach(s) => self.walk_foreach(s, owner, scope_level),
            Statement::Switchon(s) => {
                self.walk_expr(&s.selector, owner, scope_level);
                for case in &s.cases {
                    self.walk_statement(&case.body, owner, scope_level);
                }
                if let Some(d) = &s.default {
                    self.walk_statement(d, owner, scope_level);
                }
            }
            Statement::Defer(inner) => self.walk_statement(inner, owner, scope_level),
            Statement::Block(b) => self.discover_block(b, owner, scope_level),
            Statement::Compound(c) => {
                for s in &c.statements {
                    self.walk_statement(s, owner, scope_level);
                }
            }
            Statement::LabelTarget(name) => {
                self.declare(
                    Symbol::new(name, SymbolKind::Label, VarType::Unknown, scope_level, owner),
                    SourceLocation::new(0, 0),
                );
            }
            Statement::Return
            | Statement::Finish
            | Statement::Break
            | Statement::Brk
            | Statement::Loop
            | Statement::Endcase
            | Statement::Retain(_)
            | Statement::Remanage(_) => {}
            // CFG-internal only; never produced by the parser.
            Statement::Evaluate(_) => {}
        }
    }

    fn walk_for(&mut self, s: &ForStatement, owner: &str, scope_level: usize) {
        self.walk_expr(&s.from, owner, scope_level);
        self.walk_expr(&s.to, owner, scope_level);
        if let Some(by) = &s.by {
            self.walk_expr(by, owner, scope_level);
        }
        self.declare(
            Symbol::new(&s.var_name, SymbolKind::LocalVar, VarType::Integer, scope_level + 1, owner),
            SourceLocation::new(0, 0),
        );
        self.walk_statement(&s.body, owner, scope_level + 1);
    }

    fn walk_foreach(&mut self, s: &ForEachStatement, owner: &str, scope_level: usize) {
        self.walk_expr(&s.collection, owner, scope_level);
        if let Some(tag) = &s.tag_var {
            self.declare(
                Symbol::new(tag, SymbolKind::LocalVar, VarType::Integer, scope_level + 1, owner),
                SourceLocation::new(0, 0),
            );
        }
        if let Some((a, b)) = &s.destructure_vars {
            self.declare(
                Symbol::new(a, SymbolKind::LocalVar, VarType::Unknown, scope_level + 1, owner),
                SourceLocation::new(0, 0),
            );
            self.declare(
                Symbol::new(b, SymbolKind::LocalVar, VarType::Unknown, scope_level + 1, owner),
                SourceLocation::new(0, 0),
            );
        } else {
            self.declare(
                Symbol::new(&s.value_var, SymbolKind::LocalVar, VarType::Unknown, scope_level + 1, owner),
                SourceLocation::new(0, 0),
            );
        }
        self.walk_statement(&s.body, owner, scope_level + 1);
    }

    fn walk_expr(&mut self, expr: &Expression, owner: &str, scope_level: usize) {
        match expr {
            Expression::IntLiteral { .. }
            | Expression::FloatLiteral { .. }
            | Expression::StringLiteral { .. }
            | Expression::CharLiteral { .. }
            | Expression::BoolLiteral { .. }
            | Expression::NullLiteral { .. }
            | Expression::VariableAccess { .. } => {}
            Expression::BinaryOp { lhs, rhs, .. } => {
                self.walk_expr(lhs, owner, scope_level);
                self.walk_expr(rhs, owner, scope_level);
            }
            Expression::UnaryOp { operand, .. } => self.walk_expr(operand, owner, scope_level),
            Expression::VectorAccess { base, index, .. } | Expression::CharIndirection { base, index, .. } => {
                self.walk_expr(base, owner, scope_level);
                if let Some(i) = index {
                    self.walk_expr(i, owner, scope_level);
                }
            }
            Expression::Bitfield { base, offset, width, .. } => {
                self.walk_expr(base, owner, scope_level);
                self.walk_expr(offset, owner, scope_level);
                self.walk_expr(width, owner, scope_level);
            }
            Expression::FunctionCall { callee, args, .. } => {
                self.walk_expr(callee, owner, scope_level);
                for a in args {
                    self.walk_expr(a, owner, scope_level);
                }
            }
            Expression::ConditionalExpression { condition, then_value, else_value, .. } => {
                self.walk_expr(condition, owner, scope_level);
                self.walk_expr(then_value, owner, scope_level);
                self.walk_expr(else_value, owner, scope_level);
            }
            Expression::ValofExpression { body, .. } | Expression::FloatValofExpression { body, .. } => {
                self.walk_statement(body, owner, scope_level);
            }
            Expression::VecAllocation { size, .. } => self.walk_expr(size, owner, scope_level),
            Expression::TableExpression { entries, .. } | Expression::ListExpression { entries, .. } => {
                for e in entries {
                    self.walk_expr(e, owner, scope_level);
                }
            }
            Expression::MemberAccessExpression { object, .. } => self.walk_expr(object, owner, scope_level),
            Expression::SuperMethodAccessExpression { args, .. } | Expression::NewExpression { args, .. } => {
                for a in args {
                    self.walk_expr(a, owner, scope_level);
                }
            }
        }
    }
}

fn is_float_literal(expr: &Expression) -> bool {
    matches!(expr, Expression::FloatLiteral { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn discover(src: &str) -> (SymbolTable, DiagnosticBag) {
        let (program, parse_diag) = Parser::new(src).parse();
        assert!(parse_diag.is_empty(), "{:?}", parse_diag.into_vec());
        SymbolDiscovery::run(&program)
    }

    #[test]
    fn global_let_is_global_var() {
        let (table, _) = discover("LET x = 1");
        let sym = table.resolve_global("x").expect("x should resolve");
        assert_eq!(sym.kind, SymbolKind::GlobalVar);
        assert_eq!(sym.var_type, VarType::Integer);
    }

    #[test]
    fn function_params_are_scoped_to_function() {
        let (table, _) = discover("LET add(a, b) = a + b");
        assert!(table.resolve_global("add").is_some());
        assert_eq!(table.resolve("add", "a").unwrap().kind, SymbolKind::Parameter);
        assert_eq!(table.resolve("add", "b").unwrap().kind, SymbolKind::Parameter);
    }

    #[test]
    fn valof_let_is_recognised_as_function() {
        let (table, _) = discover("LET f = VALOF $( RESULTIS 1 $)");
        let sym = table.resolve_global("f").unwrap();
        assert_eq!(sym.kind, SymbolKind::Function);
        assert_eq!(sym.var_type, VarType::Integer);
    }

    #[test]
    fn duplicate_manifest_is_a_warning() {
        let (_, diagnostics) = discover("MANIFEST { X = 1 } MANIFEST { X = 2 }");
        assert!(!diagnostics.is_empty());
        assert!(!diagnostics.is_fatal());
    }

    #[test]
    fn globals_block_entries_are_owned_by_global() {
        let (table, _) = discover("GLOBALS { g1: 1; g2: 2 }");
        assert!(table.resolve_global("g1").is_some());
        assert!(table.resolve_global("g2").is_some());
    }

    #[test]
    fn nested_block_let_is_local_to_owning_function() {
        let src = "LET go() BE $( LET x = 1 RETURN $)";
        let (table, _) = discover(src);
        let sym = table.resolve("go", "x").expect("x should resolve in go");
        assert_eq!(sym.kind, SymbolKind::LocalVar);
    }
}
