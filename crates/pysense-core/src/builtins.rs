//! The `builtins` module, introspected from an embedded stub

use crate::builder::LiveModule;

pub const BUILTINS_MODNAME: &str = "builtins";

const BUILTINS_STUB: &str = include_str!("stubs/builtins.py");

/// Loader view of `builtins`: no file, stub source
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinsModule;

impl LiveModule for BuiltinsModule {
    fn name(&self) -> &str {
        BUILTINS_MODNAME
    }

    fn source(&self) -> Option<String> {
        Some(BUILTINS_STUB.to_string())
    }
}
