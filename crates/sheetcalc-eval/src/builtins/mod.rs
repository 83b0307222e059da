//! Built-in function catalogue (spec §4.F), split by category. Each
//! submodule owns its own `register_builtins` and is wired together
//! here; [`crate::registry`] calls [`register_builtins`] exactly once
//! to populate the process-wide registry.

pub mod aggregate;
pub mod lookup;
pub mod logical;
pub mod text;

pub fn register_builtins(register: &dyn Fn(crate::function::FunctionDefinition)) {
    aggregate::register_builtins(register);
    lookup::register_builtins(register);
    logical::register_builtins(register);
    text::register_builtins(register);
}
