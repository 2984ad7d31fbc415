//! Hierarchical key builder
//!
//! Produces `/{base}/{identifier}/{module}/{leaf}` keys, e.g.
//! `/users/42/profile/avatar.jpg`. One builder is meant per resource family
//! ("users", "groups", ...). The sub-module set by [`KeyBuilder::module`] is
//! consumed by the next [`KeyBuilder::build`] call only; `module` + `build`
//! on a shared builder must happen under one lock.

use crate::key::object_key::unique_leaf;
use crate::key::{sanitize, ObjectKey};
use crate::utils::extension;
use std::fmt;

#[derive(Debug, Clone)]
pub struct KeyBuilder {
    base_module: String,
    pending_module: Option<String>,
}

impl KeyBuilder {
    pub fn new(base_module: &str) -> Self {
        Self {
            base_module: sanitize(base_module),
            pending_module: None,
        }
    }

    pub fn base_module(&self) -> &str {
        &self.base_module
    }

    /// Set the sub-module for the next `build` call
    pub fn module(&mut self, name: &str) -> &mut Self {
        self.pending_module = Some(sanitize(name));
        self
    }

    /// Assemble a key and clear any pending sub-module.
    ///
    /// * `identifier` - owner of the object (user id, group id, ...)
    /// * `filename` - original file name; only its extension survives
    /// * `fixed_name` - deterministic leaf name (`avatar`, `cover`); a random
    ///   unique name is generated when absent
    pub fn build(
        &mut self,
        identifier: Option<&dyn fmt::Display>,
        filename: &str,
        fixed_name: Option<&str>,
    ) -> ObjectKey {
        let module = self.pending_module.take();

        let identifier = identifier.map(|id| sanitize(&id.to_string()));
        let filename = sanitize(filename);
        let ext = extension(&filename);

        // every dot goes, so the leaf carries no extension but `ext`
        let fixed_name = fixed_name
            .map(|name| sanitize(name).replace('.', ""))
            .filter(|name| !name.is_empty());

        let leaf = match fixed_name {
            Some(name) => format!("{}{}", name, ext),
            None => unique_leaf(ext),
        };

        let mut segments = Vec::with_capacity(4);
        segments.push(self.base_module.clone());
        if let Some(id) = identifier {
            segments.push(id);
        }
        if let Some(module) = module {
            segments.push(module);
        }
        segments.push(leaf);

        ObjectKey::from_segments(segments)
    }
}
