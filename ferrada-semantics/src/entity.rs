//! Entities and rebinding chains
//!
//! An [`Entity`] is a declaration node seen through a context: the generic
//! instantiations it was reached through (its rebinding chain) and advisory
//! [`Metadata`] attached at lookup time. Identity ignores the metadata.

use crate::env::EnvId;
use crate::error::{Result, SemanticError};
use ferrada_syntax::NodeId;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Facts attached to an entity at lookup time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Metadata {
    /// Reached through dot notation (`Obj.Prim`), so the first formal is the prefix
    pub dottable: bool,
    /// Reached through an implicit dereference of an access value
    pub implicit_deref: bool,
    /// Type this subprogram is viewed as a primitive of
    pub primitive: Option<NodeId>,
}

impl Metadata {
    pub fn dottable() -> Self {
        Self {
            dottable: true,
            ..Self::default()
        }
    }

    pub fn primitive_of(ty: NodeId) -> Self {
        Self {
            primitive: Some(ty),
            ..Self::default()
        }
    }

    /// Merge two metadata values; facts set on either side are kept and
    /// `self` wins on the primitive type
    pub fn combine(self, other: Metadata) -> Metadata {
        Metadata {
            dottable: self.dottable || other.dottable,
            implicit_deref: self.implicit_deref || other.implicit_deref,
            primitive: self.primitive.or(other.primitive),
        }
    }
}

/// Index of a node in the [`RebindingArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RebindingId(u32);

/// One link of a rebinding chain: lookups reaching `old_env` (a generic's
/// formal part) see `new_env` (the instantiation environment) instead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RebindingNode {
    pub old_env: EnvId,
    pub new_env: EnvId,
    pub parent: Option<RebindingId>,
}

/// Hash-consed storage for rebinding chains, so that structurally equal
/// chains share one id
#[derive(Debug, Default)]
pub struct RebindingArena {
    nodes: Vec<RebindingNode>,
    index: HashMap<RebindingNode, RebindingId>,
}

impl RebindingArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend `(old_env, new_env)` to `parent`
    pub fn append(&mut self, parent: Option<RebindingId>, old_env: EnvId, new_env: EnvId) -> RebindingId {
        let node = RebindingNode {
            old_env,
            new_env,
            parent,
        };
        if let Some(id) = self.index.get(&node) {
            return *id;
        }
        let id = RebindingId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.index.insert(node, id);
        id
    }

    pub fn get(&self, id: RebindingId) -> RebindingNode {
        self.nodes[id.0 as usize]
    }

    pub fn parent(&self, id: Option<RebindingId>) -> Option<RebindingId> {
        id.and_then(|id| self.get(id).parent)
    }

    /// Links of a chain, innermost instantiation first
    pub fn chain(&self, id: Option<RebindingId>) -> Vec<RebindingNode> {
        let mut out = Vec::new();
        let mut current = id;
        while let Some(link) = current {
            let node = self.get(link);
            out.push(node);
            current = node.parent;
        }
        out
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Contextual part of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EntityInfo {
    pub md: Metadata,
    pub rebindings: Option<RebindingId>,
    pub from_rebound: bool,
}

/// A declaration (or type) node viewed through an [`EntityInfo`]
#[derive(Debug, Clone, Copy)]
pub struct Entity {
    pub node: NodeId,
    pub info: EntityInfo,
}

impl Entity {
    /// Entity without rebindings or metadata
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            info: EntityInfo::default(),
        }
    }

    pub fn with_info(node: NodeId, info: EntityInfo) -> Self {
        Self { node, info }
    }

    /// Same declaration and rebindings, new metadata
    pub fn with_metadata(&self, md: Metadata) -> Self {
        Self {
            node: self.node,
            info: EntityInfo { md, ..self.info },
        }
    }

    /// Another node seen through this entity's rebindings, without metadata
    pub fn sibling(&self, node: NodeId) -> Self {
        Self {
            node,
            info: EntityInfo {
                md: Metadata::default(),
                rebindings: self.info.rebindings,
                from_rebound: self.info.from_rebound,
            },
        }
    }

    pub fn rebindings(&self) -> Option<RebindingId> {
        self.info.rebindings
    }

    pub fn md(&self) -> Metadata {
        self.info.md
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.info.rebindings == other.info.rebindings
    }
}

impl Eq for Entity {}

impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.node.hash(state);
        self.info.rebindings.hash(state);
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.info.rebindings {
            Some(RebindingId(r)) => write!(f, "<{} rebound r{}>", self.node, r),
            None => write!(f, "<{}>", self.node),
        }
    }
}

/// Graft `rebindings` onto `entity`.
///
/// Legal when the entity carries no rebindings yet, when the chain is the
/// entity's own, or when the chain extends the entity's chain by one link.
pub fn rebind(arena: &RebindingArena, entity: &Entity, rebindings: Option<RebindingId>) -> Result<Entity> {
    let Some(new) = rebindings else {
        return Ok(*entity);
    };
    match entity.info.rebindings {
        None => Ok(Entity {
            node: entity.node,
            info: EntityInfo {
                rebindings: Some(new),
                from_rebound: true,
                ..entity.info
            },
        }),
        Some(current) if current == new => Ok(*entity),
        Some(current) if arena.get(new).parent == Some(current) => Ok(Entity {
            node: entity.node,
            info: EntityInfo {
                rebindings: Some(new),
                from_rebound: true,
                ..entity.info
            },
        }),
        Some(_) => Err(SemanticError::IncorrectRebindings { node: entity.node }),
    }
}
