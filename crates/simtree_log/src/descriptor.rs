//! Tap descriptors: taps described before the tree exists.
//!
//! A descriptor names a location pattern, a category and a destination. Once
//! the tree is built, [`TapDescriptor::materialize`] creates one tap per
//! matching node. Descriptor sets are stored with `MessagePack`.

use serde::{Deserialize, Serialize};
use simtree_foundation::{Error, GlobPattern, NodeId, Result};
use simtree_node::{Forest, GLOBAL_LOCATION, ObservationPoint, PATH_SEPARATOR};

use crate::destination::DestinationSpec;
use crate::tap::Tap;

/// A tap to create later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapDescriptor {
    /// Glob-like location pattern, starting with the root's name, or
    /// [`GLOBAL_LOCATION`].
    pub location: String,
    /// Category list for the tap.
    pub category: String,
    /// Destination argument, parsed with [`DestinationSpec::parse`].
    pub destination: String,
    /// Number of taps created from this descriptor.
    pub usage_count: u32,
    /// Set when the location pattern could not be used.
    pub bad_pattern: bool,
}

fn pattern_is_well_formed(pattern: &str) -> bool {
    pattern.split(PATH_SEPARATOR).all(|component| {
        !component.is_empty()
            && component
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '*' | '?' | '+'))
    })
}

impl TapDescriptor {
    /// Creates an unused descriptor.
    #[must_use]
    pub fn new(location: impl Into<String>, category: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            category: category.into(),
            destination: destination.into(),
            usage_count: 0,
            bad_pattern: false,
        }
    }

    /// Returns true if at least one tap was created.
    #[must_use]
    pub fn is_used(&self) -> bool {
        self.usage_count > 0
    }

    /// Creates a tap on every node of the tree rooted at `root` whose
    /// location matches.
    ///
    /// A malformed pattern sets [`TapDescriptor::bad_pattern`] and creates
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns destination or registration errors.
    pub fn materialize(&mut self, forest: &mut Forest, root: NodeId) -> Result<Vec<Tap>> {
        let points = if self.location == GLOBAL_LOCATION {
            vec![ObservationPoint::Global]
        } else {
            match self.matching_nodes(forest, root) {
                Ok(nodes) => nodes.into_iter().map(ObservationPoint::Node).collect(),
                Err(e) if e.is_expired() => return Err(e),
                Err(e) => {
                    tracing::warn!(pattern = %self.location, error = %e, "unusable tap location pattern");
                    self.bad_pattern = true;
                    return Ok(Vec::new());
                }
            }
        };
        let spec = DestinationSpec::parse(&self.destination);
        let mut taps = Vec::with_capacity(points.len());
        for point in points {
            taps.push(Tap::new(forest, point, &self.category, &spec)?);
            self.usage_count += 1;
        }
        Ok(taps)
    }

    fn matching_nodes(&self, forest: &Forest, root: NodeId) -> Result<Vec<NodeId>> {
        if !pattern_is_well_formed(&self.location) {
            return Err(Error::invalid_structure(format!(
                "malformed location pattern {:?}",
                self.location
            )));
        }
        let (first, rest) = match self.location.split_once(PATH_SEPARATOR) {
            Some((first, rest)) => (first, Some(rest)),
            None => (self.location.as_str(), None),
        };
        let head = GlobPattern::new(first)?;
        let node = forest.node(root)?;
        let root_matches = head.matches(&node.display_name())
            || node.aliases().iter().any(|a| head.matches(a.as_str()));
        if !root_matches {
            return Ok(Vec::new());
        }
        match rest {
            None => Ok(vec![root]),
            Some(rest) => Ok(forest
                .find_children(root, rest)?
                .into_iter()
                .map(|m| m.node)
                .collect()),
        }
    }
}

/// Descriptors that have not produced any tap.
#[must_use]
pub fn unused_descriptors(descriptors: &[TapDescriptor]) -> Vec<&TapDescriptor> {
    descriptors.iter().filter(|d| !d.is_used()).collect()
}

/// Encodes descriptors as `MessagePack`.
///
/// # Errors
///
/// Returns a serialization error if encoding fails.
pub fn encode_descriptors(descriptors: &[TapDescriptor]) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(descriptors).map_err(|e| Error::serialization(e.to_string()))
}

/// Decodes descriptors written by [`encode_descriptors`].
///
/// # Errors
///
/// Returns a serialization error if the bytes are not a descriptor list.
pub fn decode_descriptors(bytes: &[u8]) -> Result<Vec<TapDescriptor>> {
    rmp_serde::from_slice(bytes).map_err(|e| Error::serialization(e.to_string()))
}
