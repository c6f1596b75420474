//! Navigation, lookup and location strings.
//!
//! Paths are `.`-separated. An empty component ascends to the parent, so the
//! empty path names the parent itself. Public lookups only cross edges whose
//! ends share a privacy level; the `_privileged` variants cross any edge.

use std::fmt::Write as _;

use simtree_foundation::intern::lookup;
use simtree_foundation::{Error, GlobPattern, NodeId, Result};

use crate::bus::Origin;
use crate::forest::Forest;
use crate::global::GLOBAL_LOCATION;
use crate::node::ParentRef;

/// Path separator.
pub const PATH_SEPARATOR: char = '.';

/// A node matched by [`Forest::find_children`], with the text captured by
/// each wildcard along the way.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChildMatch {
    /// The matched node.
    pub node: NodeId,
    /// Wildcard captures, in pattern order.
    pub captures: Vec<String>,
}

impl Forest {
    // =========================================================================
    // Parents and children
    // =========================================================================

    /// Attached parent of a node.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn parent(&self, id: NodeId) -> Result<Option<NodeId>> {
        Ok(self.nodes.get(id)?.attached_parent())
    }

    /// Outermost attached ancestor of a node, or the node itself.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn root_of(&self, id: NodeId) -> Result<NodeId> {
        let mut cur = id;
        while let Some(p) = self.nodes.get(cur)?.attached_parent() {
            cur = p;
        }
        Ok(cur)
    }

    /// Children sharing the node's privacy level, in attachment order.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.visible_children(id, false)
    }

    /// All children in attachment order.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn children_privileged(&self, id: NodeId) -> Result<Vec<NodeId>> {
        self.visible_children(id, true)
    }

    fn visible_children(&self, id: NodeId, privileged: bool) -> Result<Vec<NodeId>> {
        let data = self.nodes.get(id)?;
        if privileged {
            return Ok(data.children.clone());
        }
        let mut out = Vec::with_capacity(data.children.len());
        for &c in &data.children {
            if self.nodes.get(c)?.privacy_level == data.privacy_level {
                out.push(c);
            }
        }
        Ok(out)
    }

    fn visible_parent(&self, id: NodeId, privileged: bool) -> Result<Option<NodeId>> {
        let data = self.nodes.get(id)?;
        let Some(p) = data.attached_parent() else {
            return Ok(None);
        };
        if privileged || self.nodes.get(p)?.privacy_level == data.privacy_level {
            Ok(Some(p))
        } else {
            Ok(None)
        }
    }

    /// Returns true if `ancestor` is `node` or one of its attached ancestors.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn is_descendant_of(&self, node: NodeId, ancestor: NodeId) -> Result<bool> {
        let mut cur = Some(node);
        while let Some(id) = cur {
            if id == ancestor {
                return Ok(true);
            }
            cur = self.nodes.get(id)?.attached_parent();
        }
        Ok(false)
    }

    /// Nearest node at or above `id` flagged as a scope root, or the
    /// outermost root if none is flagged.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn scope_root(&self, id: NodeId) -> Result<NodeId> {
        let mut cur = id;
        loop {
            let data = self.nodes.get(cur)?;
            if data.scope_root {
                return Ok(cur);
            }
            match data.attached_parent() {
                Some(p) => cur = p,
                None => return Ok(cur),
            }
        }
    }

    // =========================================================================
    // Path lookup
    // =========================================================================

    /// Resolves an exact path below `id`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if any component does not resolve, or crosses a
    /// privacy boundary.
    pub fn get_child(&self, id: NodeId, path: &str) -> Result<NodeId> {
        self.resolve_path(id, path, false)?
            .ok_or_else(|| Error::not_found(path, self.location(id).unwrap_or_default()))
    }

    /// Resolves an exact path below `id`, returning `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn get_child_if_exists(&self, id: NodeId, path: &str) -> Result<Option<NodeId>> {
        self.resolve_path(id, path, false)
    }

    /// Resolves an exact path below `id`, ignoring privacy levels.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if any component does not resolve.
    pub fn get_child_privileged(&self, id: NodeId, path: &str) -> Result<NodeId> {
        self.resolve_path(id, path, true)?
            .ok_or_else(|| Error::not_found(path, self.location(id).unwrap_or_default()))
    }

    fn resolve_path(&self, id: NodeId, path: &str, privileged: bool) -> Result<Option<NodeId>> {
        self.nodes.validate(id)?;
        let mut cur = id;
        for component in path.split(PATH_SEPARATOR) {
            if component.is_empty() {
                match self.visible_parent(cur, privileged)? {
                    Some(p) => cur = p,
                    None => return Ok(None),
                }
                continue;
            }
            let Some(key) = lookup(component) else {
                return Ok(None);
            };
            let data = self.nodes.get(cur)?;
            let Some(&Some(child)) = data.identifiers.get(&key) else {
                return Ok(None);
            };
            if !privileged && self.nodes.get(child)?.privacy_level != data.privacy_level {
                return Ok(None);
            }
            cur = child;
        }
        Ok(Some(cur))
    }

    /// Finds every node matching a glob-like path below `id`.
    ///
    /// Each component may match several children; a child matches when any of
    /// its identifiers (name, aliases, `group+index`, in that order) fully
    /// matches, and contributes the first identifier's captures. Ascending
    /// past a parentless node warns and yields nothing on that branch.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn find_children(&self, id: NodeId, pattern: &str) -> Result<Vec<ChildMatch>> {
        self.find_matching(id, pattern, false)
    }

    /// Like [`Forest::find_children`] but ignoring privacy levels.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn find_children_privileged(&self, id: NodeId, pattern: &str) -> Result<Vec<ChildMatch>> {
        self.find_matching(id, pattern, true)
    }

    fn find_matching(&self, id: NodeId, pattern: &str, privileged: bool) -> Result<Vec<ChildMatch>> {
        self.nodes.validate(id)?;
        let mut current = vec![ChildMatch {
            node: id,
            captures: Vec::new(),
        }];
        for component in pattern.split(PATH_SEPARATOR) {
            let mut next = Vec::new();
            if component.is_empty() {
                for m in current {
                    if self.nodes.get(m.node)?.attached_parent().is_none() {
                        self.warn(
                            m.node,
                            &format!("pattern {pattern:?} ascends above a node without a parent"),
                        );
                        continue;
                    }
                    if let Some(p) = self.visible_parent(m.node, privileged)? {
                        next.push(ChildMatch {
                            node: p,
                            captures: m.captures,
                        });
                    }
                }
            } else {
                let glob = GlobPattern::new(component)?;
                for m in &current {
                    for child in self.visible_children(m.node, privileged)? {
                        let data = self.nodes.get(child)?;
                        let caps = data
                            .identifiers_at_parent()
                            .into_iter()
                            .find_map(|ident| glob.captures(ident.as_str()));
                        if let Some(caps) = caps {
                            let mut captures = m.captures.clone();
                            captures.extend(caps);
                            next.push(ChildMatch {
                                node: child,
                                captures,
                            });
                        }
                    }
                }
            }
            current = next;
        }
        Ok(current)
    }

    /// Nodes carrying `tag` that sit below `id` within `max_depth` ancestor
    /// hops. `id` itself is never included.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn find_children_by_tag(&self, id: NodeId, tag: &str, max_depth: usize) -> Result<Vec<NodeId>> {
        self.nodes.validate(id)?;
        let Some(set) = lookup(tag).and_then(|t| self.tags.get(&t)) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for &candidate in set {
            if candidate == id {
                continue;
            }
            let mut cur = candidate;
            for _ in 0..max_depth {
                let Some(p) = self.nodes.get(cur)?.attached_parent() else {
                    break;
                };
                if p == id {
                    out.push(candidate);
                    break;
                }
                cur = p;
            }
        }
        Ok(out)
    }

    // =========================================================================
    // Locations and rendering
    // =========================================================================

    /// Full dotted location of a node.
    ///
    /// A node constructed for a parent it is not attached to yet uses `,` for
    /// that last edge. A parentless non-root starts with `~`. A node that
    /// outlived its parent uses the parent's remembered location.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn location(&self, id: NodeId) -> Result<String> {
        self.location_impl(id, false)
    }

    /// Like [`Forest::location`], but writes a not-yet-committed parent edge
    /// as `.`, anticipating the attachment.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn location_anticipated(&self, id: NodeId) -> Result<String> {
        self.location_impl(id, true)
    }

    fn location_impl(&self, id: NodeId, anticipate: bool) -> Result<String> {
        let data = self.nodes.get(id)?;
        if let Some(own) = &data.own_location {
            return Ok(own.to_string());
        }
        let name = data.display_name();
        Ok(match &data.parent {
            ParentRef::Attached(p) => format!("{}.{name}", self.location_impl(*p, anticipate)?),
            ParentRef::Expected(p) => match self.location_impl(*p, anticipate) {
                Ok(parent) => {
                    let sep = if anticipate { '.' } else { ',' };
                    format!("{parent}{sep}{name}")
                }
                Err(_) => format!("~{name}"),
            },
            ParentRef::Remembered(parent) => format!("{parent}.{name}"),
            ParentRef::Unset if data.is_root => name,
            ParentRef::Unset => format!("~{name}"),
        })
    }

    /// Location of a notification origin; `_global_` for the global node.
    #[must_use]
    pub fn origin_location(&self, origin: Origin) -> String {
        match origin {
            Origin::Global => GLOBAL_LOCATION.to_owned(),
            Origin::Node(id) => self
                .location(id)
                .unwrap_or_else(|_| format!("<expired {id}>")),
        }
    }

    /// Name if set, otherwise `group[index]`.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn display_name(&self, id: NodeId) -> Result<String> {
        Ok(self.nodes.get(id)?.display_name())
    }

    /// Renders an indented outline of a subtree.
    ///
    /// Hidden and builtin nodes are skipped unless `show_builtins` is set.
    ///
    /// # Errors
    ///
    /// Returns `Expired` for a stale handle.
    pub fn render_subtree(&self, id: NodeId, max_depth: usize, show_builtins: bool) -> Result<String> {
        let mut out = String::new();
        let mut stack = vec![(id, 0usize)];
        while let Some((cur, depth)) = stack.pop() {
            let data = self.nodes.get(cur)?;
            if depth > 0 && data.hidden && !show_builtins {
                continue;
            }
            let _ = write!(out, "{:indent$}{}", "", data.display_name(), indent = depth * 2);
            if !data.aliases.is_empty() {
                let aliases: Vec<_> = data.aliases.iter().map(|a| a.as_str()).collect();
                let _ = write!(out, " (aliases: {})", aliases.join(", "));
            }
            if !data.tags.is_empty() {
                let tags: Vec<_> = data.tags.iter().map(|t| t.as_str()).collect();
                let _ = write!(out, " [tags: {}]", tags.join(", "));
            }
            if data.privacy_increment > 0 {
                out.push_str(" <private>");
            }
            out.push('\n');
            if depth < max_depth {
                stack.extend(data.children.iter().rev().map(|&c| (c, depth + 1)));
            }
        }
        Ok(out)
    }
}
