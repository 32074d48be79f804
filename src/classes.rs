//! Class table and Pass B — inheritance resolution (spec.md §4.3).
//!
//! A child's member-variable layout is the parent's layout prefix followed
//! by the child's own members; a child's vtable is the parent's vtable with
//! overridden slots substituted and new methods appended. Cycle detection
//! uses an explicit path set per `sym_ClassDiscovery.cpp` rather than a
//! visited-global set, so a diamond-free single-inheritance cycle is caught
//! without over-reporting shared ancestors as cycles.

use std::collections::HashMap;

use crate::ast::{ClassDeclaration, ClassMember, Program};
use crate::diagnostics::DiagnosticBag;
use crate::types::{VarType, Visibility};

#[derive(Debug, Clone, PartialEq)]
pub struct MemberVariableInfo {
    pub name: String,
    pub offset: usize,
    pub var_type: VarType,
    pub visibility: Visibility,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassMethodInfo {
    pub qualified_name: String,
    pub simple_name: String,
    pub visibility: Visibility,
    pub is_virtual: bool,
    pub is_final: bool,
    pub is_routine: bool,
    /// `_this` is always slot 0; populated at construction time
    /// (spec.md §4.3) and refined with inferred types by the
    /// class-table-update pass that follows Pass D.
    pub parameter_types: Vec<VarType>,
    pub return_type: VarType,
    /// The class that originally declared this method, before any override.
    pub declaring_class: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassTableEntry {
    pub name: String,
    pub parent_name: Option<String>,
    pub member_variables: Vec<MemberVariableInfo>,
    /// Keyed by qualified name (`Class::method`).
    pub member_methods: HashMap<String, ClassMethodInfo>,
    /// Simple method name -> qualified name, for unqualified lookup.
    pub simple_name_to_method: HashMap<String, String>,
    /// Ordered method slots; index is the stable vtable slot.
    pub vtable: Vec<String>,
    pub instance_size: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ClassTable {
    classes: HashMap<String, ClassTableEntry>,
    order: Vec<String>,
}

impl ClassTable {
    pub fn get(&self, name: &str) -> Option<&ClassTableEntry> {
        self.classes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ClassTableEntry> {
        self.classes.get_mut(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassTableEntry> {
        self.order.iter().map(move |n| &self.classes[n])
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Pass B driver.
pub struct ClassPass<'a> {
    declarations: HashMap<String, &'a ClassDeclaration>,
    table: ClassTable,
    resolved: std::collections::HashSet<String>,
    /// Classes whose resolution hit a cycle, directly or through an
    /// ancestor; `build_entry` is never run for these.
    cycle_failed: std::collections::HashSet<String>,
    diagnostics: DiagnosticBag,
}

impl<'a> ClassPass<'a> {
    pub fn run(program: &'a Program) -> (ClassTable, DiagnosticBag) {
        let mut declarations = HashMap::new();
        for decl in &program.declarations {
            if let crate::ast::Declaration::Class(c) = decl {
                declarations.insert(c.name.clone(), c);
            }
        }
        let names: Vec<String> = declarations.keys().cloned().collect();
        let mut pass = ClassPass {
            declarations,
            table: ClassTable::default(),
            resolved: std::collections::HashSet::new(),
            cycle_failed: std::collections::HashSet::new(),
            diagnostics: DiagnosticBag::new(),
        };
        for name in names {
            pass.resolve(&name, &mut Vec::new());
        }
        (pass.table, pass.diagnostics)
    }

    /// Resolves `name`, resolving its parent first if necessary. `path`
    /// is the set of classes currently being resolved on this call stack;
    /// re-encountering a name in `path` is a cycle. Returns whether `name`
    /// is part of (or downstream of) a cycle, so that callers skip
    /// `build_entry` for every class a cycle touches, not just the one
    /// that detected it.
    fn resolve(&mut self, name: &str, path: &mut Vec<String>) -> bool {
        if self.resolved.contains(name) {
            return false;
        }
        if self.cycle_failed.contains(name) {
            return true;
        }
        let Some(&decl) = self.declarations.get(name) else {
            return false; // EXTENDS of an undeclared class: reported elsewhere (semantic pass).
        };

        if path.contains(&name.to_string()) {
            self.diagnostics.push(crate::diagnostics::Diagnostic::semantic(
                format!(
                    "circular inheritance involving class '{}' (cycle: {} -> {})",
                    name,
                    path.join(" -> "),
                    name
                ),
                decl.location.line,
                decl.location.column,
            ));
            self.cycle_failed.insert(name.to_string());
            return true;
        }

        path.push(name.to_string());
        let mut parent_cycle = false;
        if let Some(parent) = &decl.parent_name {
            if self.declarations.contains_key(parent) {
                parent_cycle = self.resolve(parent, path);
            }
        }
        path.pop();

        if parent_cycle {
            self.cycle_failed.insert(name.to_string());
            return true;
        }

        self.build_entry(decl);
        self.resolved.insert(name.to_string());
        false
    }

    fn build_entry(&mut self, decl: &ClassDeclaration) {
        let parent_entry = decl
            .parent_name
            .as_ref()
            .and_then(|p| self.table.get(p))
            .cloned();

        let mut member_variables = parent_entry
            .as_ref()
            .map(|p| p.member_variables.clone())
            .unwrap_or_default();
        let mut member_methods = parent_entry
            .as_ref()
            .map(|p| p.member_methods.clone())
            .unwrap_or_default();
        let mut simple_name_to_method = parent_entry
            .as_ref()
            .map(|p| p.simple_name_to_method.clone())
            .unwrap_or_default();
        let mut vtable = parent_entry.as_ref().map(|p| p.vtable.clone()).unwrap_or_default();

        // Carry parent methods forward under a rewritten qualified name
        // unless the child overrides them (spec.md §4.3).
        if let Some(parent) = &parent_entry {
            for (simple, qualified) in &parent.simple_name_to_method {
                let is_overridden = decl.members.iter().any(|m| {
                    matches!(m, ClassMember::Method(cm) if cm.name() == simple.as_str())
                });
                if is_overridden {
                    continue;
                }
                let info = parent.member_methods.get(qualified).cloned();
                if let Some(mut info) = info {
                    let new_qualified = format!("{}::{}", decl.name, simple);
                    info.qualified_name = new_qualified.clone();
                    member_methods.insert(new_qualified.clone(), info);
                    simple_name_to_method.insert(simple.clone(), new_qualified);
                }
            }
        }

        let mut offset = member_variables.len();
        for member in &decl.members {
            match member {
                ClassMember::Variable(v) => {
                    let var_type = v.explicit_type.unwrap_or(if v.is_float {
                        VarType::Float
                    } else {
                        VarType::Integer
                    });
                    member_variables.push(MemberVariableInfo {
                        name: v.name.clone(),
                        offset,
                        var_type,
                        visibility: v.visibility,
                    });
                    offset += 1;
                }
                ClassMember::Method(m) => {
                    let simple = m.name().to_string();
                    let qualified = format!("{}::{}", decl.name, simple);
                    // `_this` is always parameter slot 0 (spec.md §4.3).
                    let mut parameter_types = vec![VarType::PointerToObject];
                    parameter_types.extend(std::iter::repeat(VarType::Unknown).take(m.param_count()));
                    let return_type = match &m.function {
                        Some(f) if f.is_float => VarType::Float,
                        Some(_) => VarType::Unknown,
                        None => VarType::Unknown,
                    };
                    let inherited_slot = simple_name_to_method.get(&simple).cloned();
                    member_methods.insert(
                        qualified.clone(),
                        ClassMethodInfo {
                            qualified_name: qualified.clone(),
                            simple_name: simple.clone(),
                            visibility: m.visibility,
                            is_virtual: m.is_virtual,
                            is_final: m.is_final,
                            is_routine: m.routine.is_some(),
                            parameter_types,
                            return_type,
                            declaring_class: decl.name.clone(),
                        },
                    );
                    match inherited_slot.and_then(|prev| vtable.iter_mut().find(|s| **s == prev)) {
                        Some(slot) => *slot = qualified.clone(),
                        None => vtable.push(qualified.clone()),
                    }
                    simple_name_to_method.insert(simple, qualified);
                }
            }
        }

        self.table.order.push(decl.name.clone());
        self.table.classes.insert(
            decl.name.clone(),
            ClassTableEntry {
                name: decl.name.clone(),
                parent_name: decl.parent_name.clone(),
                member_variables,
                member_methods,
                simple_name_to_method,
                vtable,
                instance_size: offset,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn build(src: &str) -> (ClassTable, DiagnosticBag) {
        let (program, parse_diag) = Parser::new(src).parse();
        assert!(parse_diag.is_empty(), "{:?}", parse_diag.into_vec());
        ClassPass::run(&program)
    }

    #[test]
    fn single_class_has_its_own_members() {
        let (table, _) = build("CLASS A { LET x = 0 }");
        let a = table.get("A").unwrap();
        assert_eq!(a.member_variables.len(), 1);
        assert_eq!(a.member_variables[0].offset, 0);
    }

    #[test]
    fn child_layout_extends_parent() {
        let src = "CLASS A { LET x = 0 } CLASS B EXTENDS A { LET y = 0 }";
        let (table, _) = build(src);
        let b = table.get("B").unwrap();
        assert_eq!(b.member_variables.len(), 2);
        assert_eq!(b.member_variables[0].name, "x");
        assert_eq!(b.member_variables[1].name, "y");
        assert_eq!(b.member_variables[1].offset, 1);
    }

    #[test]
    fn override_replaces_vtable_slot_not_appends() {
        let src = "CLASS A { VIRTUAL LET speak() BE RETURN } \
                   CLASS B EXTENDS A { VIRTUAL LET speak() BE RETURN }";
        let (table, _) = build(src);
        let b = table.get("B").unwrap();
        assert_eq!(b.vtable.len(), 1);
        assert_eq!(b.vtable[0], "B::speak");
    }

    #[test]
    fn unoverridden_parent_method_is_inherited() {
        let src = "CLASS A { LET greet() BE RETURN } CLASS B EXTENDS A { LET y = 0 }";
        let (table, _) = build(src);
        let b = table.get("B").unwrap();
        assert_eq!(b.vtable, vec!["B::greet".to_string()]);
        assert!(b.member_methods.contains_key("B::greet"));
    }

    #[test]
    fn cycle_is_detected_and_does_not_loop() {
        let src = "CLASS A EXTENDS B { LET x = 0 } CLASS B EXTENDS A { LET y = 0 }";
        let (_, diagnostics) = build(src);
        assert!(!diagnostics.is_empty());
        assert!(diagnostics.is_fatal());
    }

    #[test]
    fn cycle_leaves_neither_class_expanded() {
        let src = "CLASS A EXTENDS B { LET x = 0 } CLASS B EXTENDS A { LET y = 0 }";
        let (table, _) = build(src);
        assert!(table.get("A").is_none());
        assert!(table.get("B").is_none());
    }

    #[test]
    fn method_gets_implicit_this_as_slot_zero() {
        let (table, _) = build("CLASS A { LET f(n) = n }");
        let info = table.get("A").unwrap().member_methods.get("A::f").unwrap();
        assert_eq!(info.parameter_types[0], VarType::PointerToObject);
        assert_eq!(info.parameter_types.len(), 2);
    }
}
