//! Runtime import interface (spec.md §6), modeled on the teacher's `ffi.rs`:
//! a `serde` + `toml`-backed manifest type, not a hand-rolled parser.
//!
//! The core never implements runtime functions; it only imports their
//! descriptors into the `"Global"` symbol scope so later passes (and, out
//! of scope here, code generation) can resolve calls to them.

use serde::Deserialize;

use crate::symbols::{Symbol, SymbolKind, SymbolTable};
use crate::types::VarType;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionType {
    Standard,
    Float,
    Routine,
    FloatRoutine,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeReturnType {
    Integer,
    Float,
    StringList,
    IntVector,
    FloatVector,
    String,
    Void,
}

impl RuntimeReturnType {
    fn as_var_type(self) -> VarType {
        match self {
            RuntimeReturnType::Integer => VarType::Integer,
            RuntimeReturnType::Float => VarType::Float,
            RuntimeReturnType::StringList => VarType::PointerToStringList,
            RuntimeReturnType::IntVector => VarType::PointerToIntVec,
            RuntimeReturnType::FloatVector => VarType::PointerToFloatVec,
            RuntimeReturnType::String => VarType::String,
            RuntimeReturnType::Void => VarType::Unknown,
        }
    }
}

/// One `[[function]]` table in a runtime manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeFunctionDescriptor {
    pub veneer_name: String,
    pub linker_symbol: String,
    pub function_pointer: String,
    pub arg_count: usize,
    pub function_type: FunctionType,
    pub return_type: RuntimeReturnType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RuntimeManifest {
    #[serde(rename = "function", default)]
    pub functions: Vec<RuntimeFunctionDescriptor>,
}

impl RuntimeManifest {
    /// Parses a TOML document of `[[function]]` tables and runs the
    /// integrity checks spec.md §6 requires before any entry is trusted.
    pub fn parse(content: &str) -> Result<Self, String> {
        let manifest: Self =
            toml::from_str(content).map_err(|e| format!("failed to parse runtime manifest: {e}"))?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<(), String> {
        if self.functions.is_empty() {
            return Err("runtime manifest must declare at least one function".to_string());
        }
        for f in &self.functions {
            if f.veneer_name.trim().is_empty() {
                return Err("runtime function descriptor has an empty veneer_name".to_string());
            }
            if f.linker_symbol.trim().is_empty() {
                return Err(format!(
                    "runtime function '{}' has an empty linker_symbol",
                    f.veneer_name
                ));
            }
            if f.function_pointer.trim().is_empty() {
                return Err(format!(
                    "runtime function '{}' has an empty function_pointer",
                    f.veneer_name
                ));
            }
        }
        let mut seen = std::collections::HashSet::new();
        for f in &self.functions {
            if !seen.insert(f.veneer_name.clone()) {
                return Err(format!(
                    "runtime manifest declares '{}' more than once",
                    f.veneer_name
                ));
            }
        }
        Ok(())
    }

    /// Derives the symbol kind for one descriptor from `(function_type,
    /// return_type)` (spec.md §6: "a runtime that returns a list →
    /// `RUNTIME_LIST_FUNCTION`; a float routine → `RUNTIME_FLOAT_ROUTINE`,
    /// etc.").
    fn symbol_kind(descriptor: &RuntimeFunctionDescriptor) -> SymbolKind {
        use FunctionType::*;
        use RuntimeReturnType::*;
        match (descriptor.function_type, descriptor.return_type) {
            (Routine, _) => SymbolKind::RuntimeRoutine,
            (FloatRoutine, _) => SymbolKind::RuntimeFloatRoutine,
            (_, StringList | IntVector | FloatVector) => SymbolKind::RuntimeListFunction,
            (Float, _) => SymbolKind::RuntimeFloatFunction,
            (Standard, _) => SymbolKind::RuntimeFunction,
        }
    }
}

/// Imports a validated manifest's descriptors into `"Global"`, rejecting
/// the whole import if any entry would collide with an existing symbol
/// (spec.md §6: "The core rejects a manifest if ... insertion produces a
/// duplicate").
pub fn import_runtime_manifest(
    symbols: &mut SymbolTable,
    manifest: &RuntimeManifest,
) -> Result<(), String> {
    for descriptor in &manifest.functions {
        let kind = RuntimeManifest::symbol_kind(descriptor);
        let var_type = descriptor.return_type.as_var_type();
        let symbol = Symbol::runtime(&descriptor.veneer_name, kind, var_type, descriptor.arg_count);
        symbols
            .insert(symbol)
            .map_err(|existing| {
                format!(
                    "runtime import rejected: '{}' collides with an existing symbol owned by '{}'",
                    descriptor.veneer_name, existing.owning_function
                )
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
        [[function]]
        veneer_name = "rt_print"
        linker_symbol = "nbcpl_rt_print"
        function_pointer = "0x0"
        arg_count = 1
        function_type = "STANDARD"
        return_type = "INTEGER"
        description = "prints an integer"
        category = "io"
    "#;

    #[test]
    fn parses_a_valid_manifest() {
        let manifest = RuntimeManifest::parse(VALID).unwrap();
        assert_eq!(manifest.functions.len(), 1);
        assert_eq!(manifest.functions[0].veneer_name, "rt_print");
    }

    #[test]
    fn rejects_empty_manifest() {
        assert!(RuntimeManifest::parse("").is_err());
    }

    #[test]
    fn rejects_duplicate_veneer_names() {
        let doubled = format!("{VALID}\n{VALID}");
        assert!(RuntimeManifest::parse(&doubled).is_err());
    }

    #[test]
    fn import_inserts_global_symbol_with_derived_kind() {
        let manifest = RuntimeManifest::parse(VALID).unwrap();
        let mut symbols = SymbolTable::new();
        import_runtime_manifest(&mut symbols, &manifest).unwrap();
        let sym = symbols.resolve_global("rt_print").unwrap();
        assert_eq!(sym.kind, SymbolKind::RuntimeFunction);
        assert_eq!(sym.var_type, VarType::Integer);
    }

    #[test]
    fn import_rejects_collision_with_existing_symbol() {
        let manifest = RuntimeManifest::parse(VALID).unwrap();
        let mut symbols = SymbolTable::new();
        import_runtime_manifest(&mut symbols, &manifest).unwrap();
        assert!(import_runtime_manifest(&mut symbols, &manifest).is_err());
    }

    #[test]
    fn float_routine_maps_to_runtime_float_routine_kind() {
        let src = r#"
            [[function]]
            veneer_name = "rt_sleep"
            linker_symbol = "nbcpl_rt_sleep"
            function_pointer = "0x0"
            arg_count = 1
            function_type = "FLOAT_ROUTINE"
            return_type = "VOID"
        "#;
        let manifest = RuntimeManifest::parse(src).unwrap();
        let mut symbols = SymbolTable::new();
        import_runtime_manifest(&mut symbols, &manifest).unwrap();
        let sym = symbols.resolve_global("rt_sleep").unwrap();
        assert_eq!(sym.kind, SymbolKind::RuntimeFloatRoutine);
    }
}
