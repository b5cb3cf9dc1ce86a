// naming.rs — Identifier allocation for generated code
//
// Every node that becomes a C# local gets one identifier for the whole run,
// together with the factory whose body declares that local. Reference sites
// compare their own factory against the owner to decide between the bare
// identifier and an object cache lookup.
//
// Preconditions: table sized from the controller being generated.
// Postconditions: identifiers are pairwise distinct and stable across runs.
// Failure modes: `GenError::Unallocated` when looking up a node with no name.
// Side effects: none.

use std::collections::HashSet;

use serde::Serialize;

use crate::error::GenError;
use crate::id::*;
use crate::model::Controller;

/// Identifier used when a node has an empty name.
pub const EMPTY_NAME_PLACEHOLDER: &str = "Obj";

/// Identifiers that would turn `Generate{ident}` into the global transition
/// routine or a runtime helper. Never handed out without a suffix.
pub const RESERVED_IDENTS: &[&str] = &["StateMachineTransitions", "StateMachineTransition"];

/// C# reserved keywords; contextual keywords are legal identifiers.
const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

/// Name and owning factory of one allocated node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub ident: String,
    pub owner: FactoryId,
}

/// One row of the `--emit names` dump.
#[derive(Debug, Clone, Serialize)]
pub struct NameRecord {
    pub kind: &'static str,
    pub index: u32,
    pub ident: String,
}

/// Arena-indexed side table of identifiers.
#[derive(Debug, Default)]
pub struct NameTable {
    layers: Vec<Option<Allocation>>,
    machines: Vec<Option<Allocation>>,
    states: Vec<Option<Allocation>>,
    motions: Vec<Option<Allocation>>,
    masks: Vec<Option<Allocation>>,
    taken: HashSet<String>,
    /// Allocation order, for deterministic dumps.
    order: Vec<NodeRef>,
}

impl NameTable {
    pub fn new(controller: &Controller) -> Self {
        NameTable {
            layers: vec![None; controller.layers.len()],
            machines: vec![None; controller.machines.len()],
            states: vec![None; controller.states.len()],
            motions: vec![None; controller.motions.len()],
            masks: vec![None; controller.masks.len()],
            taken: RESERVED_IDENTS.iter().map(|s| s.to_string()).collect(),
            order: Vec::new(),
        }
    }

    fn slot(&self, node: NodeRef) -> Option<&Option<Allocation>> {
        match node {
            NodeRef::Layer(id) => self.layers.get(id.index()),
            NodeRef::Machine(id) => self.machines.get(id.index()),
            NodeRef::State(id) => self.states.get(id.index()),
            NodeRef::Clip(id) | NodeRef::Tree(id) => self.motions.get(id.index()),
            NodeRef::Mask(id) => self.masks.get(id.index()),
        }
    }

    fn slot_mut(&mut self, node: NodeRef) -> Option<&mut Option<Allocation>> {
        match node {
            NodeRef::Layer(id) => self.layers.get_mut(id.index()),
            NodeRef::Machine(id) => self.machines.get_mut(id.index()),
            NodeRef::State(id) => self.states.get_mut(id.index()),
            NodeRef::Clip(id) | NodeRef::Tree(id) => self.motions.get_mut(id.index()),
            NodeRef::Mask(id) => self.masks.get_mut(id.index()),
        }
    }

    pub fn get(&self, node: NodeRef) -> Option<&Allocation> {
        self.slot(node).and_then(Option::as_ref)
    }

    /// Like `get`, but a missing name is an invariant violation.
    pub fn require(&self, node: NodeRef) -> Result<&Allocation, GenError> {
        self.get(node).ok_or(GenError::Unallocated { node })
    }

    pub fn ident(&self, node: NodeRef) -> Result<&str, GenError> {
        self.require(node).map(|a| a.ident.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Assign `node` an identifier derived from `base`, or return the one it
    /// already has. `owner` is recorded only on first allocation.
    pub fn allocate(
        &mut self,
        node: NodeRef,
        base: &str,
        owner: FactoryId,
    ) -> Result<String, GenError> {
        if let Some(existing) = self.get(node) {
            return Ok(existing.ident.clone());
        }

        let candidate = candidate_ident(node.type_tag(), base);
        let ident = if self.taken.contains(&candidate) {
            let mut n = 0u32;
            while self.taken.contains(&format!("{candidate}{n}")) {
                n += 1;
            }
            format!("{candidate}{n}")
        } else {
            candidate
        };

        let slot = self
            .slot_mut(node)
            .ok_or(GenError::Unallocated { node })?;
        *slot = Some(Allocation {
            ident: ident.clone(),
            owner,
        });
        self.taken.insert(ident.clone());
        self.order.push(node);
        Ok(ident)
    }

    /// Allocate a layer. Layers have no identity of their own beyond their
    /// name and root machine: a layer matching an earlier one on both shares
    /// its identifier.
    pub fn allocate_layer(
        &mut self,
        controller: &Controller,
        id: LayerId,
        owner: FactoryId,
    ) -> Result<String, GenError> {
        let node = NodeRef::Layer(id);
        let layer = controller
            .layer(id)
            .ok_or(GenError::Unallocated { node })?;
        if let Some(existing) = self.equivalent_layer(controller, id) {
            let alloc = self.require(NodeRef::Layer(existing))?.clone();
            let ident = alloc.ident.clone();
            if let Some(slot) = self.slot_mut(node) {
                *slot = Some(alloc);
            }
            return Ok(ident);
        }
        self.allocate(node, &layer.name, owner)
    }

    /// The earliest allocated layer with the same name and root machine.
    pub fn equivalent_layer(&self, controller: &Controller, id: LayerId) -> Option<LayerId> {
        let layer = controller.layer(id)?;
        controller
            .layers
            .iter()
            .enumerate()
            .map(|(i, other)| (LayerId(i as u32), other))
            .find(|(other_id, other)| {
                *other_id != id
                    && other.name == layer.name
                    && other.machine == layer.machine
                    && self.get(NodeRef::Layer(*other_id)).is_some()
            })
            .map(|(other_id, _)| other_id)
    }

    /// Allocated names in allocation order.
    pub fn records(&self) -> Vec<NameRecord> {
        self.order
            .iter()
            .filter_map(|&node| {
                let alloc = self.get(node)?;
                let index = match node {
                    NodeRef::Layer(id) => id.0,
                    NodeRef::Machine(id) => id.0,
                    NodeRef::State(id) => id.0,
                    NodeRef::Clip(id) | NodeRef::Tree(id) => id.0,
                    NodeRef::Mask(id) => id.0,
                };
                Some(NameRecord {
                    kind: node.type_tag(),
                    index,
                    ident: alloc.ident.clone(),
                })
            })
            .collect()
    }
}

/// Tag + base name, reduced to letters and digits, never starting with a digit.
pub fn candidate_ident(tag: &str, base: &str) -> String {
    let base = if base.is_empty() {
        EMPTY_NAME_PLACEHOLDER
    } else {
        base
    };
    let mut ident: String = tag
        .chars()
        .chain(base.chars())
        .filter(|c| c.is_alphabetic() || c.is_ascii_digit())
        .collect();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, 'v');
    }
    ident
}

/// `@`-escape an identifier that is a C# keyword.
pub fn escape_keyword(ident: String) -> String {
    if CSHARP_KEYWORDS.contains(&ident.as_str()) {
        format!("@{ident}")
    } else {
        ident
    }
}
