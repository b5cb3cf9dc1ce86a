// id.rs — Stable arena identifiers for controller graph nodes
//
// Node identity is the arena index, never the name: two states called "Idle"
// are distinct unless they share an id. All generator side tables (names,
// owning factories, emitted-motion set) are keyed by these indices.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a layer in `Controller::layers`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(pub u32);

/// Index of a state machine in `Controller::machines`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MachineId(pub u32);

/// Index of a state in `Controller::states`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub u32);

/// Index of a clip or blend tree in `Controller::motions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MotionId(pub u32);

/// Index of an avatar mask in `Controller::masks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskId(pub u32);

macro_rules! impl_index {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                pub fn index(self) -> usize {
                    self.0 as usize
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "#{}", self.0)
                }
            }
        )*
    };
}

impl_index!(LayerId, MachineId, StateId, MotionId, MaskId);

/// Any nameable node. Clips and blend trees share the motion arena but live
/// in separate identifier namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRef {
    Layer(LayerId),
    Machine(MachineId),
    State(StateId),
    Clip(MotionId),
    Tree(MotionId),
    Mask(MaskId),
}

impl NodeRef {
    /// Identifier prefix for this node kind.
    pub fn type_tag(self) -> &'static str {
        match self {
            NodeRef::Layer(_) => "Layer",
            NodeRef::Machine(_) => "StateMachine",
            NodeRef::State(_) => "State",
            NodeRef::Clip(_) => "Clip",
            NodeRef::Tree(_) => "Tree",
            NodeRef::Mask(_) => "Mask",
        }
    }

    /// C# type used when downcasting an object cache entry.
    pub fn target_type(self) -> &'static str {
        match self {
            NodeRef::Layer(_) => "AnimatorControllerLayer",
            NodeRef::Machine(_) => "AnimatorStateMachine",
            NodeRef::State(_) => "AnimatorState",
            NodeRef::Clip(_) => "AnimationClip",
            NodeRef::Tree(_) => "BlendTree",
            NodeRef::Mask(_) => "AvatarMask",
        }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Layer(id) => write!(f, "layer #{}", id.0),
            NodeRef::Machine(id) => write!(f, "state machine #{}", id.0),
            NodeRef::State(id) => write!(f, "state #{}", id.0),
            NodeRef::Clip(id) => write!(f, "clip #{}", id.0),
            NodeRef::Tree(id) => write!(f, "blend tree #{}", id.0),
            NodeRef::Mask(id) => write!(f, "mask #{}", id.0),
        }
    }
}

/// The generated routine whose body constructs a node as a local variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FactoryId {
    /// The controller entry routine.
    Entry,
    Layer(LayerId),
    Machine(MachineId),
    /// The global cross-machine transition routine.
    MachineTransitions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_and_tree_use_distinct_tags() {
        let id = MotionId(3);
        assert_eq!(NodeRef::Clip(id).type_tag(), "Clip");
        assert_eq!(NodeRef::Tree(id).type_tag(), "Tree");
        assert_ne!(NodeRef::Clip(id), NodeRef::Tree(id));
    }

    #[test]
    fn ids_deserialize_from_bare_integers() {
        let id: StateId = serde_json::from_str("7").unwrap();
        assert_eq!(id, StateId(7));
        assert_eq!(id.index(), 7);
    }
}
