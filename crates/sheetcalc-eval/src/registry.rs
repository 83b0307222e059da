//! Process-wide function registry. Populated once, at or before the
//! first evaluation pass (spec §5: "the function registry is
//! process-wide, populated once at startup before any pass begins").

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::builtins::register_builtins;
use crate::function::FunctionDefinition;

static REGISTRY: Lazy<DashMap<String, Arc<FunctionDefinition>>> = Lazy::new(|| {
    let map = DashMap::new();
    register_builtins(&|def| {
        map.insert(def.name.to_string(), Arc::new(def));
    });
    map
});

/// Register (or replace) a function definition. Exposed as the stable
/// `registerFunction` extension point (spec §6); names are matched
/// case-insensitively by uppercasing at registration time, mirroring
/// lookup.
pub fn register_function(def: FunctionDefinition) {
    REGISTRY.insert(def.name.to_uppercase(), Arc::new(def));
}

/// Look up a function by name, case-insensitively (spec §4.C: "Function
/// names are uppercased before lookup").
pub fn get_function(name: &str) -> Option<Arc<FunctionDefinition>> {
    REGISTRY.get(&name.to_uppercase()).map(|e| Arc::clone(e.value()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered_and_case_insensitive() {
        assert!(get_function("SUM").is_some());
        assert!(get_function("sum").is_some());
        assert!(get_function("NotAFunction").is_none());
    }
}
