//! Named, lazily instantiated node extensions.
//!
//! A node holds one factory per extension name. The first access runs the
//! factory with the declared parameter set and caches the result.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use simtree_foundation::{Error, Istr, NodeId, Result, ident, intern};

use crate::forest::Forest;

/// Parameters attached to an extension, by name.
pub type ParameterSet = BTreeMap<String, String>;

/// An object attached to a node under a name.
pub trait Extension: Any {
    /// Checks the parameters during tree finalization.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the parameters are not acceptable.
    fn validate(&self, params: &ParameterSet) -> std::result::Result<(), String> {
        let _ = params;
        Ok(())
    }
}

/// Builds an extension object from its parameters.
pub type ExtensionFactory = Rc<dyn Fn(&ParameterSet) -> Box<dyn Extension>>;

/// Declared extension and its lazily built instance.
pub(crate) struct ExtensionSlot {
    factory: ExtensionFactory,
    params: ParameterSet,
    instance: OnceCell<Box<dyn Extension>>,
}

impl ExtensionSlot {
    pub(crate) fn new(factory: ExtensionFactory, params: ParameterSet) -> Self {
        Self {
            factory,
            params,
            instance: OnceCell::new(),
        }
    }

    pub(crate) fn is_instantiated(&self) -> bool {
        self.instance.get().is_some()
    }

    pub(crate) fn params(&self) -> &ParameterSet {
        &self.params
    }

    pub(crate) fn get(&self) -> &dyn Extension {
        &**self.instance.get_or_init(|| (self.factory)(&self.params))
    }
}

impl fmt::Debug for ExtensionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionSlot")
            .field("params", &self.params)
            .field("instantiated", &self.is_instantiated())
            .finish_non_exhaustive()
    }
}

impl Forest {
    /// Declares an extension on a node.
    ///
    /// # Errors
    ///
    /// Returns `BadIdentifier` for an invalid name, `Collision` if the name is
    /// already declared, or `PhaseError` once the tree is finalized.
    pub fn declare_extension(
        &mut self,
        node: NodeId,
        name: &str,
        factory: ExtensionFactory,
        params: ParameterSet,
    ) -> Result<()> {
        ident::validate_alias(name)?;
        let location = self.location(node)?;
        let data = self.nodes.get_mut(node)?;
        if data.phase.is_finalized() {
            return Err(Error::phase("declare extension", data.phase.as_str()).at(location));
        }
        if data.extensions.iter().any(|(n, _)| n.as_str() == name) {
            return Err(Error::collision(location, name));
        }
        data.extensions
            .push((intern(name), ExtensionSlot::new(factory, params)));
        Ok(())
    }

    /// Returns an extension, building it on first access.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no extension of that name is declared.
    pub fn extension(&self, node: NodeId, name: &str) -> Result<&dyn Extension> {
        let data = self.nodes.get(node)?;
        data.extensions
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, slot)| slot.get())
            .ok_or_else(|| self.missing_extension(node, name))
    }

    /// Returns an extension downcast to its concrete type.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the extension is missing or has another type.
    pub fn extension_as<E: Extension>(&self, node: NodeId, name: &str) -> Result<&E> {
        let ext: &dyn Any = self.extension(node, name)?;
        ext.downcast_ref::<E>()
            .ok_or_else(|| self.missing_extension(node, name))
    }

    /// Parameters declared with an extension.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no extension of that name is declared.
    pub fn extension_parameters(&self, node: NodeId, name: &str) -> Result<&ParameterSet> {
        let data = self.nodes.get(node)?;
        data.extensions
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, slot)| slot.params())
            .ok_or_else(|| self.missing_extension(node, name))
    }

    /// Names of every declared extension. Instantiates all of them.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn extension_names(&self, node: NodeId) -> Result<Vec<Istr>> {
        let data = self.nodes.get(node)?;
        Ok(data
            .extensions
            .iter()
            .map(|(name, slot)| {
                slot.get();
                *name
            })
            .collect())
    }

    /// Validates every extension of a node against its parameters.
    pub(crate) fn validate_extensions(&self, node: NodeId) -> Result<()> {
        let data = self.nodes.get(node)?;
        for (name, slot) in &data.extensions {
            if let Err(reason) = slot.get().validate(slot.params()) {
                return Err(Error::finalization(
                    self.location(node)?,
                    format!("extension {name}: {reason}"),
                ));
            }
        }
        Ok(())
    }

    fn missing_extension(&self, node: NodeId, name: &str) -> Error {
        Error::not_found(
            format!("extension {name}"),
            self.location(node).unwrap_or_default(),
        )
    }
}
