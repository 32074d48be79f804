//! Pass C — signature analysis (spec.md §4.3).
//!
//! Computes the `(num_parameters, parameter_types, parameter_indices)`
//! function-metric triple for every function and routine. Parameter type
//! inference here is deliberately shallow — `_this` is always
//! `POINTER_TO_OBJECT`, otherwise the symbol table is consulted, else
//! `INTEGER` — full inference is Pass D's job. A `signature_complete` flag
//! prevents Pass D from resetting these metrics once set.

use std::collections::HashMap;

use crate::ast::{ClassMember, Declaration, Program};
use crate::symbols::{SymbolKind, SymbolTable};
use crate::types::VarType;

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionMetrics {
    pub num_parameters: usize,
    pub parameter_types: HashMap<String, VarType>,
    pub parameter_indices: HashMap<String, usize>,
    pub variable_types: HashMap<String, VarType>,
    pub has_float_vars: bool,
    pub calls_runtime_functions: bool,
    pub is_routine: bool,
    signature_complete: bool,
}

impl FunctionMetrics {
    fn new(params: &[String], is_routine: bool) -> Self {
        let mut parameter_types = HashMap::new();
        let mut parameter_indices = HashMap::new();
        for (i, p) in params.iter().enumerate() {
            parameter_types.insert(p.clone(), VarType::Integer);
            parameter_indices.insert(p.clone(), i);
        }
        FunctionMetrics {
            num_parameters: params.len(),
            parameter_types,
            parameter_indices,
            variable_types: HashMap::new(),
            has_float_vars: false,
            calls_runtime_functions: false,
            is_routine,
            signature_complete: false,
        }
    }

    pub fn is_signature_complete(&self) -> bool {
        self.signature_complete
    }

    /// Pass D refines a parameter's type; ignored once the signature has
    /// been marked complete by `mark_complete` (spec.md §4.3: "a completion
    /// flag prevents later passes from resetting these metrics").
    pub fn set_parameter_type(&mut self, name: &str, var_type: VarType) {
        if self.signature_complete {
            return;
        }
        self.parameter_types.insert(name.to_string(), var_type);
    }

    pub fn mark_complete(&mut self) {
        self.signature_complete = true;
    }
}

#[derive(Debug, Clone, Default)]
pub struct FunctionMetricsTable {
    by_function: HashMap<String, FunctionMetrics>,
}

impl FunctionMetricsTable {
    pub fn get(&self, function_name: &str) -> Option<&FunctionMetrics> {
        self.by_function.get(function_name)
    }

    pub fn get_mut(&mut self, function_name: &str) -> Option<&mut FunctionMetrics> {
        self.by_function.get_mut(function_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FunctionMetrics)> {
        self.by_function.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&String, &mut FunctionMetrics)> {
        self.by_function.iter_mut()
    }
}

pub struct SignatureAnalysis;

impl SignatureAnalysis {
    pub fn run(program: &Program, symbols: &SymbolTable) -> FunctionMetricsTable {
        let mut table = FunctionMetricsTable::default();
        for decl in &program.declarations {
            match decl {
                Declaration::Function(f) => {
                    Self::compute(&mut table, &f.name, &f.params, false, symbols);
                }
                Declaration::Routine(r) => {
                    Self::compute(&mut table, &r.name, &r.params, true, symbols);
                }
                Declaration::Class(c) => {
                    for member in &c.members {
                        let ClassMember::Method(m) = member else { continue };
                        let qualified = format!("{}::{}", c.name, m.name());
                        // `_this` occupies parameter slot 0 for every method
                        // (spec.md §4.3), ahead of the method's own params.
                        let mut params = vec!["_this".to_string()];
                        if let Some(f) = &m.function {
                            params.extend(f.params.iter().cloned());
                            Self::compute(&mut table, &qualified, &params, false, symbols);
                        } else if let Some(r) = &m.routine {
                            params.extend(r.params.iter().cloned());
                            Self::compute(&mut table, &qualified, &params, true, symbols);
                        }
                    }
                }
                _ => {}
            }
        }
        table
    }

    fn compute(
        table: &mut FunctionMetricsTable,
        owner: &str,
        params: &[String],
        is_routine: bool,
        symbols: &SymbolTable,
    ) {
        let mut metrics = FunctionMetrics::new(params, is_routine);
        for p in params {
            let inferred = if p == "_this" {
                VarType::PointerToObject
            } else {
                symbols
                    .resolve(owner, p)
                    .map(|s| s.var_type)
                    .filter(|t| *t != VarType::Unknown)
                    .unwrap_or(VarType::Integer)
            };
            metrics.parameter_types.insert(p.clone(), inferred);
            if inferred.is_float_family() {
                metrics.has_float_vars = true;
            }
        }
        for sym in symbols.iter() {
            if sym.owning_function == owner
                && matches!(sym.kind, SymbolKind::LocalVar | SymbolKind::StaticVar)
            {
                metrics.variable_types.insert(sym.name.clone(), sym.var_type);
                if sym.var_type.is_float_family() {
                    metrics.has_float_vars = true;
                }
            }
        }
        table.by_function.insert(owner.to_string(), metrics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::symbols::SymbolDiscovery;

    fn analyse(src: &str) -> FunctionMetricsTable {
        let (program, parse_diag) = Parser::new(src).parse();
        assert!(parse_diag.is_empty(), "{:?}", parse_diag.into_vec());
        let (symbols, _) = SymbolDiscovery::run(&program);
        SignatureAnalysis::run(&program, &symbols)
    }

    #[test]
    fn function_parameters_default_to_integer() {
        let table = analyse("LET add(a, b) = a + b");
        let m = table.get("add").unwrap();
        assert_eq!(m.num_parameters, 2);
        assert_eq!(m.parameter_types["a"], VarType::Integer);
        assert_eq!(m.parameter_indices["b"], 1);
    }

    #[test]
    fn method_gets_this_as_first_parameter() {
        let table = analyse("CLASS A { LET f(n) = n }");
        let m = table.get("A::f").unwrap();
        assert_eq!(m.num_parameters, 2);
        assert_eq!(m.parameter_types["_this"], VarType::PointerToObject);
        assert_eq!(m.parameter_indices["_this"], 0);
        assert_eq!(m.parameter_indices["n"], 1);
    }

    #[test]
    fn completion_flag_blocks_further_updates() {
        let table = analyse("LET add(a, b) = a + b");
        let mut table = table;
        let m = table.get_mut("add").unwrap();
        m.mark_complete();
        m.set_parameter_type("a", VarType::Float);
        assert_eq!(table.get("add").unwrap().parameter_types["a"], VarType::Integer);
    }
}
