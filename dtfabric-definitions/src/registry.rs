// dtFabric
// SPDX-License-Identifier: MPL-2.0

use std::collections::HashMap;

use log::trace;

use crate::common::DefinitionId;
use crate::definition::Definition;
use crate::error::DefinitionError;

/// The mapping from name (and alias) to [`Definition`], keyed by
/// [`DefinitionId`] (§3.5, §4.1).
///
/// Registration does not validate references — forward references within a
/// single input stream are allowed; `dtfabric-reader` performs a second
/// resolution pass once every document has been ingested.
#[derive(Debug, Default)]
pub struct Registry {
    arena: Vec<Definition>,
    names: HashMap<String, DefinitionId>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `def` under its name and every alias.
    ///
    /// Fails with [`DefinitionError::DuplicateName`] if any of those keys is
    /// already registered, regardless of insertion order (the check happens
    /// before anything is mutated, so a partial collision never leaves the
    /// registry half-updated).
    pub fn register(&mut self, def: Definition) -> Result<DefinitionId, DefinitionError> {
        let common = def.common();
        let mut keys = Vec::with_capacity(1 + common.aliases.len());
        keys.push(common.name.clone());
        keys.extend(common.aliases.iter().cloned());

        for key in &keys {
            if self.names.contains_key(key) {
                return Err(DefinitionError::DuplicateName(key.clone()));
            }
        }

        let id = DefinitionId(self.arena.len() as u32);
        trace!("registering '{}' ({}) as {id}", common.name, def.kind_name());
        for key in keys {
            self.names.insert(key, id);
        }
        self.arena.push(def);
        Ok(id)
    }

    /// Looks up a name or alias, returning `None` if absent.
    pub fn lookup(&self, name: &str) -> Option<DefinitionId> {
        self.names.get(name).copied()
    }

    /// Looks up a name or alias, failing with
    /// [`DefinitionError::UnresolvedReference`] if absent.
    pub fn resolve(&self, name: &str) -> Result<DefinitionId, DefinitionError> {
        self.lookup(name)
            .ok_or_else(|| DefinitionError::UnresolvedReference(name.to_owned()))
    }

    /// Borrows the definition at `id`.
    pub fn get(&self, id: DefinitionId) -> &Definition {
        &self.arena[id.index()]
    }

    /// Mutably borrows the definition at `id`, used during resolution to
    /// replace name references with resolved handles in place.
    pub fn get_mut(&mut self, id: DefinitionId) -> &mut Definition {
        &mut self.arena[id.index()]
    }

    /// The number of registered definitions (not counting alias duplicates).
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Iterates over every `(id, definition)` pair in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (DefinitionId, &Definition)> {
        self.arena
            .iter()
            .enumerate()
            .map(|(i, d)| (DefinitionId(i as u32), d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::ConstantAttributes;
    use crate::common::CommonInfo;

    fn constant(name: &str, aliases: &[&str]) -> Definition {
        Definition::Constant(
            CommonInfo {
                name: name.to_owned(),
                aliases: aliases.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            ConstantAttributes { value: 1 },
        )
    }

    #[test]
    fn register_and_lookup() {
        let mut reg = Registry::new();
        let id = reg.register(constant("a", &[])).unwrap();
        assert_eq!(reg.lookup("a"), Some(id));
        assert_eq!(reg.get(id).name(), "a");
    }

    #[test]
    fn duplicate_name_is_an_error_regardless_of_order() {
        let mut reg = Registry::new();
        reg.register(constant("a", &["b"])).unwrap();
        assert_eq!(
            reg.register(constant("a", &[])).unwrap_err(),
            DefinitionError::DuplicateName("a".to_owned())
        );
        assert_eq!(
            reg.register(constant("c", &["b"])).unwrap_err(),
            DefinitionError::DuplicateName("b".to_owned())
        );
    }

    #[test]
    fn unresolved_reference_is_an_error() {
        let reg = Registry::new();
        assert!(matches!(
            reg.resolve("missing"),
            Err(DefinitionError::UnresolvedReference(_))
        ));
    }
}
