//! Extension boundary.
//!
//! An [`Extension`] bundles registry entries; merging one into a running
//! interpreter is how embedders and `@bake` directives add builtins,
//! operators, macros, and literal typechecks. Where the entries come
//! from is the embedder's business: an [`ExtensionLoader`] maps the
//! names scripts pass to `bake(..)` onto extension instances.

use super::interp::{Builtin, Operator, Registry, TypeCheckFn};

/// A bundle of registry entries. All accessors default to empty, so an
/// extension implements only the kinds it provides.
pub trait Extension {
    fn builtins(&self) -> Vec<(String, Builtin)> {
        Vec::new()
    }

    fn operators(&self) -> Vec<(String, Operator)> {
        Vec::new()
    }

    fn macros(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn typechecks(&self) -> Vec<TypeCheckFn> {
        Vec::new()
    }
}

/// Resolves extension names from `bake(..)` / `@bake [..]` to extension
/// instances. The default interpreter has no loader installed; baking
/// then fails with a clear message.
pub trait ExtensionLoader {
    fn load(&mut self, name: &str) -> Result<Box<dyn Extension>, String>;
}

impl Registry {
    /// Merge an extension's entries into this registry. Builtins and
    /// macros overwrite same-named entries; operator definitions and
    /// typechecks accumulate.
    pub fn merge(&mut self, ext: &dyn Extension) {
        for (name, builtin) in ext.builtins() {
            self.builtins.insert(name, builtin);
        }
        for (name, op) in ext.operators() {
            self.operators.entry(name).or_default().push(op);
        }
        for (name, replacement) in ext.macros() {
            self.macros.insert(name, replacement);
        }
        for check in ext.typechecks() {
            self.typechecks.push(check);
        }
    }
}
