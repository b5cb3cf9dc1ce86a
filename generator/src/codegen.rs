// codegen.rs — C# reconstruction program generation for animator controllers
//
// Turns a validated controller graph into one C# file whose entry routine
// rebuilds the controller. Each layer and each state machine gets its own
// factory; references that cross factory boundaries go through the generated
// program's `objectCache` dictionary.
//
// Preconditions: none (the controller is validated here).
// Postconditions: returns `GeneratedCode` with the complete C# source.
// Failure modes: `GenError` on invalid input or a reference to a node that
//                was never named; no partial output is produced.
// Side effects: none.

use std::collections::HashSet;

use tracing::debug;

use crate::emit::{
    array, call, enum_lit, float_lit, push_indent, string_lit, Args, CodeWriter, Literal,
};
use crate::error::GenError;
use crate::id::*;
use crate::model::*;
use crate::naming::{candidate_ident, escape_keyword, NameRecord, NameTable};
use crate::pipeline::{compute_provenance, Provenance};

// ── Public types ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct GeneratedCode {
    pub source: String,
    /// Suggested file name, `<ControllerName>.cs`.
    pub file_name: String,
    /// Every allocated identifier, in allocation order.
    pub names: Vec<NameRecord>,
    /// Machine pairs wired by the global transition routine, in emission order.
    pub machine_pairs: Vec<PairWiring>,
    /// Transition lists and default states moved into the global routine.
    pub deferred: usize,
    pub provenance: Provenance,
}

/// One `SetStateMachineTransitions(owner, source)` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairWiring {
    pub owner: MachineId,
    pub source: MachineId,
    pub transitions: usize,
}

#[derive(Debug, Clone)]
pub struct GenOptions {
    /// Overrides `Controller::name` for the class, file, and asset name.
    pub controller_name: Option<String>,
    /// C# namespace; defaults to the sanitized controller name.
    pub namespace: Option<String>,
    /// Asset folder handed to `GenerateController`.
    pub controller_path: String,
    /// Clips whose name starts with this prefix are emitted without curves.
    pub proxy_prefix: String,
}

impl GenOptions {
    pub fn controller_name<'c>(&'c self, controller: &'c Controller) -> &'c str {
        self.controller_name.as_deref().unwrap_or(&controller.name)
    }

    /// Explicit namespace, else the controller name reduced to an identifier
    /// (`@`-escaped if it is a keyword).
    pub fn namespace(&self, controller: &Controller) -> String {
        match &self.namespace {
            Some(ns) => ns.clone(),
            None => escape_keyword(candidate_ident("", self.controller_name(controller))),
        }
    }
}

impl Default for GenOptions {
    fn default() -> Self {
        GenOptions {
            controller_name: None,
            namespace: None,
            controller_path: "Assets".to_string(),
            proxy_prefix: "proxy_".to_string(),
        }
    }
}

/// Name of the global cross-machine routine in generated code.
pub const MACHINE_TRANSITIONS_FN: &str = "GenerateStateMachineTransitions";

// ── Public entry point ──────────────────────────────────────────────────────

pub fn codegen(controller: &Controller, options: &GenOptions) -> Result<GeneratedCode, GenError> {
    controller.validate()?;
    let provenance = compute_provenance(controller)?;
    let mut ctx = CodegenCtx::new(controller, options);
    ctx.prepass()?;
    ctx.emit_all(&provenance)?;
    Ok(ctx.build_result(provenance))
}

// ── Internal context ────────────────────────────────────────────────────────

/// Tab depth of factory headers and bodies inside namespace + class.
const HEADER: usize = 2;
const BODY: usize = 3;
const ITEM: usize = 4;
const NESTED: usize = 5;

/// Which transition constructor a list uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransitionKind {
    /// State-level and any-state: `GenerateTransition` with timing fields.
    State,
    /// Entry and machine-level: `GenerateStateMachineTransition`.
    Machine,
}

struct CodegenCtx<'a> {
    controller: &'a Controller,
    options: &'a GenOptions,
    names: NameTable,
    /// DFS pre-order rank of each reachable machine; matches the order the
    /// generated factories run in.
    rank: Vec<Option<u32>>,
    /// Highest rank inside each machine's subtree.
    subtree_end: Vec<u32>,
    next_rank: u32,
    emitted_motions: Vec<bool>,
    emitted_masks: Vec<bool>,
    emitted_machines: Vec<bool>,
    emitted_layers: HashSet<String>,
    /// Machines in factory emission order; consumed by the global pass.
    machines: Vec<MachineId>,
    deferred: CodeWriter,
    deferred_count: usize,
    machine_pairs: Vec<PairWiring>,
    out: CodeWriter,
}

impl<'a> CodegenCtx<'a> {
    fn new(controller: &'a Controller, options: &'a GenOptions) -> Self {
        let machine_count = controller.machines.len();
        CodegenCtx {
            controller,
            options,
            names: NameTable::new(controller),
            rank: vec![None; machine_count],
            subtree_end: vec![0; machine_count],
            next_rank: 0,
            emitted_motions: vec![false; controller.motions.len()],
            emitted_masks: vec![false; controller.masks.len()],
            emitted_machines: vec![false; machine_count],
            emitted_layers: HashSet::new(),
            machines: Vec::new(),
            deferred: CodeWriter::default(),
            deferred_count: 0,
            machine_pairs: Vec::new(),
            out: CodeWriter::new(),
        }
    }

    fn controller_name(&self) -> &str {
        self.options.controller_name(self.controller)
    }

    fn build_result(self, provenance: Provenance) -> GeneratedCode {
        let file_name = format!("{}.cs", candidate_ident("", self.controller_name()));
        GeneratedCode {
            source: self.out.finish(),
            file_name,
            names: self.names.records(),
            machine_pairs: self.machine_pairs,
            deferred: self.deferred_count,
            provenance,
        }
    }

    // ── Reference resolution ────────────────────────────────────────────

    /// Bare identifier when `node` is a local of `site`, cache lookup otherwise.
    fn resolve(&self, node: NodeRef, site: FactoryId) -> Result<String, GenError> {
        let alloc = self.names.require(node)?;
        if alloc.owner == site {
            Ok(alloc.ident.clone())
        } else {
            Ok(cache_lookup(node, &alloc.ident))
        }
    }

    fn motion_ref(&self, id: MotionId) -> Result<NodeRef, GenError> {
        self.controller
            .motion_ref(id)
            .ok_or(GenError::Unallocated {
                node: NodeRef::Clip(id),
            })
    }

    fn cache_write(&mut self, ident: &str) {
        self.out
            .line(BODY, format!("objectCache[{}] = {ident};", string_lit(ident)));
    }

    /// Whether `dest` has been written to the object cache once every factory
    /// up to pre-order rank `horizon` has finished constructing.
    fn constructed_by(&self, dest: Destination, horizon: u32) -> Result<bool, GenError> {
        let machine = match dest {
            Destination::State(id) => match self.names.require(NodeRef::State(id))?.owner {
                FactoryId::Machine(m) => m,
                _ => return Ok(true),
            },
            Destination::Machine(id) => {
                self.names.require(NodeRef::Machine(id))?;
                id
            }
        };
        Ok(self
            .rank
            .get(machine.index())
            .copied()
            .flatten()
            .is_some_and(|r| r <= horizon))
    }

    fn rank_of(&self, id: MachineId) -> Result<u32, GenError> {
        self.rank
            .get(id.index())
            .copied()
            .flatten()
            .ok_or(GenError::Unallocated {
                node: NodeRef::Machine(id),
            })
    }

    // ── Pre-pass ────────────────────────────────────────────────────────

    /// Name every layer, machine, and state before any text is produced, so
    /// states can be referenced before the statement constructing them.
    fn prepass(&mut self) -> Result<(), GenError> {
        let controller = self.controller;
        for (i, layer) in controller.layers.iter().enumerate() {
            let id = LayerId(i as u32);
            self.names.allocate_layer(controller, id, FactoryId::Entry)?;
            let site = self.layer_site(id);
            self.visit_machine(layer.machine, site)?;
        }
        debug!(
            names = self.names.len(),
            machines = self.next_rank,
            "pre-pass complete"
        );
        Ok(())
    }

    fn visit_machine(&mut self, id: MachineId, owner: FactoryId) -> Result<(), GenError> {
        let node = NodeRef::Machine(id);
        if self.names.get(node).is_some() {
            return Ok(());
        }
        let controller = self.controller;
        let machine = controller
            .machine(id)
            .ok_or(GenError::Unallocated { node })?;
        self.names.allocate(node, &machine.name, owner)?;
        self.rank[id.index()] = Some(self.next_rank);
        self.next_rank += 1;

        let site = FactoryId::Machine(id);
        for child in &machine.states {
            let state = controller.state(child.state).ok_or(GenError::Unallocated {
                node: NodeRef::State(child.state),
            })?;
            self.names
                .allocate(NodeRef::State(child.state), &state.name, site)?;
        }
        for child in &machine.machines {
            self.visit_machine(child.machine, site)?;
        }
        self.subtree_end[id.index()] = self.next_rank - 1;
        Ok(())
    }

    /// Factory that builds layer `id`: equivalent layers share the first one's.
    fn layer_site(&self, id: LayerId) -> FactoryId {
        FactoryId::Layer(self.names.equivalent_layer(self.controller, id).unwrap_or(id))
    }

    // ── Top-level emit ──────────────────────────────────────────────────

    fn emit_all(&mut self, provenance: &Provenance) -> Result<(), GenError> {
        self.emit_preamble(provenance);
        self.emit_entry()?;
        self.emit_layer_factories()?;
        self.emit_machine_factories()?;
        self.emit_machine_transitions()?;
        self.emit_postamble();
        Ok(())
    }

    fn emit_preamble(&mut self, provenance: &Provenance) {
        let ident = candidate_ident("", self.controller_name());
        let namespace = self.options.namespace(self.controller);

        self.out.line(
            0,
            format!("// Generated by ctrlgen {}", provenance.generator_version),
        );
        self.out
            .line(0, format!("// source: sha256:{}", provenance.source_hash_hex()));
        for using in [
            "System.Collections.Generic",
            "System.Linq",
            "UnityEditor",
            "UnityEditor.Animations",
            "UnityEngine",
            "VRC.SDK3.Avatars.Components",
            "VRC.SDKBase",
        ] {
            self.out.line(0, format!("using {using};"));
        }
        self.out
            .line(0, format!("using static {namespace}.ControllerGenerationMethods;"));
        self.out.blank();
        self.out.line(0, format!("namespace {namespace}"));
        self.out.line(0, "{");
        self.out
            .line(1, format!("public static class {ident}Generator"));
        self.out.line(1, "{");
        self.out.line(
            HEADER,
            "private static readonly Dictionary<string, object> objectCache = new Dictionary<string, object>();",
        );
        self.out.blank();
    }

    fn emit_postamble(&mut self) {
        self.out.line(1, "}");
        self.out.line(0, "}");
    }

    // ── Entry routine ───────────────────────────────────────────────────

    fn emit_entry(&mut self) -> Result<(), GenError> {
        self.out
            .line(HEADER, "public static AnimatorController Generate(){");
        self.out.line(BODY, "objectCache.Clear();");

        let parameters: Vec<String> = self
            .controller
            .parameters
            .iter()
            .map(parameter_call)
            .collect();
        self.out
            .declare_array(BODY, "AnimatorControllerParameter", "parameters", &parameters);

        let mut layers = Vec::with_capacity(self.controller.layers.len());
        for i in 0..self.controller.layers.len() {
            let ident = self.names.ident(NodeRef::Layer(LayerId(i as u32)))?;
            layers.push(format!("Generate{ident}()"));
        }
        self.out
            .declare_array(BODY, "AnimatorControllerLayer", "layers", &layers);

        self.out.line(
            BODY,
            format!("List<AnimatorTransition> stateMachineTransitions = {MACHINE_TRANSITIONS_FN}();"),
        );
        let args = Args::new()
            .arg(string_lit(self.controller_name()))
            .arg(string_lit(&self.options.controller_path))
            .arg("parameters")
            .arg("layers");
        self.out
            .line(BODY, format!("return {};", call("GenerateController", args)));
        self.out.line(HEADER, "}");
        self.out.blank();
        Ok(())
    }

    // ── Layer factories ─────────────────────────────────────────────────

    fn emit_layer_factories(&mut self) -> Result<(), GenError> {
        let controller = self.controller;
        for (i, layer) in controller.layers.iter().enumerate() {
            let id = LayerId(i as u32);
            let ident = self.names.ident(NodeRef::Layer(id))?.to_string();
            if !self.emitted_layers.insert(ident.clone()) {
                continue;
            }
            self.emit_layer(id, layer, &ident)?;
        }
        debug!(layers = self.emitted_layers.len(), "layer factories emitted");
        Ok(())
    }

    fn emit_layer(&mut self, id: LayerId, layer: &Layer, ident: &str) -> Result<(), GenError> {
        let site = FactoryId::Layer(id);
        let machine = self.names.ident(NodeRef::Machine(layer.machine))?.to_string();

        self.out.line(
            HEADER,
            format!("public static AnimatorControllerLayer Generate{ident}(){{"),
        );
        self.out.declare(
            BODY,
            "AnimatorStateMachine",
            &machine,
            &format!("Generate{machine}()"),
        );

        let mask = match layer.mask {
            Some(mask) => Some(self.emit_mask(mask, site)?),
            None => None,
        };

        let args = Args::new()
            .arg(string_lit(&layer.name))
            .arg(machine.as_str())
            .named_opt("mask", mask)
            .named_with("blendingMode", &layer.blending_mode, &BlendingMode::Override, |m| {
                enum_lit("AnimatorLayerBlendingMode", m.as_str())
            })
            .named_lit("defaultWeight", &layer.default_weight, &1.0)
            .named_lit(
                "syncedLayerAffectsTiming",
                &layer.synced_layer_affects_timing,
                &false,
            )
            .named_lit("syncedLayerIndex", &layer.synced_layer_index, &-1);
        self.out.declare(
            BODY,
            "AnimatorControllerLayer",
            ident,
            &call("GenerateLayer", args),
        );
        self.out.line(BODY, format!("return {ident};"));
        self.out.line(HEADER, "}");
        self.out.blank();
        Ok(())
    }

    /// Construct `id` in the current factory unless an earlier one already did.
    fn emit_mask(&mut self, id: MaskId, site: FactoryId) -> Result<String, GenError> {
        let node = NodeRef::Mask(id);
        if self.emitted_masks.get(id.index()).copied().unwrap_or(false) {
            return self.resolve(node, site);
        }
        let controller = self.controller;
        let mask = controller
            .mask(id)
            .ok_or(GenError::Unallocated { node })?;
        let ident = self.names.allocate(node, &mask.name, site)?;
        self.emitted_masks[id.index()] = true;

        let paths: Vec<String> = mask.transforms.iter().map(|t| string_lit(&t.path)).collect();
        let active: Vec<String> = mask.transforms.iter().map(|t| t.active.literal()).collect();
        let parts: Vec<String> = mask
            .body_parts
            .iter()
            .map(|p| enum_lit("AvatarMaskBodyPart", p.as_str()))
            .collect();
        let args = Args::new()
            .arg(string_lit(&mask.name))
            .arg(array("string", &paths, BODY))
            .arg(array("bool", &active, BODY))
            .arg(array("AvatarMaskBodyPart", &parts, BODY));
        self.out
            .declare(BODY, "AvatarMask", &ident, &call("GenerateMask", args));
        self.cache_write(&ident);
        Ok(ident)
    }

    // ── Machine factories ───────────────────────────────────────────────

    fn emit_machine_factories(&mut self) -> Result<(), GenError> {
        for layer in &self.controller.layers {
            self.emit_machine(layer.machine)?;
        }
        debug!(
            machines = self.machines.len(),
            deferred = self.deferred_count,
            "state machine factories emitted"
        );
        Ok(())
    }

    fn emit_machine(&mut self, id: MachineId) -> Result<(), GenError> {
        if self.emitted_machines.get(id.index()).copied().unwrap_or(true) {
            return Ok(());
        }
        self.emitted_machines[id.index()] = true;
        self.machines.push(id);

        let controller = self.controller;
        let node = NodeRef::Machine(id);
        let machine = controller
            .machine(id)
            .ok_or(GenError::Unallocated { node })?;
        let site = FactoryId::Machine(id);
        let ident = self.names.ident(node)?.to_string();
        let rank = self.rank_of(id)?;

        self.out.line(
            HEADER,
            format!("public static AnimatorStateMachine Generate{ident}(){{"),
        );

        for child in &machine.states {
            self.emit_state(child.state, site)?;
        }
        self.out.blank();

        let mut child_states = Vec::with_capacity(machine.states.len());
        for child in &machine.states {
            let state = self.names.ident(NodeRef::State(child.state))?.to_string();
            self.cache_write(&state);
            child_states.push(call(
                "GenerateChildState",
                Args::new().arg(child.position.literal()).arg(state),
            ));
        }
        self.out.blank();
        self.out
            .declare_array(BODY, "ChildAnimatorState", "states", &child_states);
        self.out.blank();

        let default_state = match machine.default_state {
            Some(state) if self.constructed_by(Destination::State(state), rank)? => {
                Some(self.resolve(NodeRef::State(state), site)?)
            }
            Some(state) => {
                let target = cache_lookup(node, &ident);
                let value = self.resolve(NodeRef::State(state), FactoryId::MachineTransitions)?;
                self.deferred
                    .line(BODY, format!("({target}).defaultState = {value};"));
                self.deferred.blank();
                self.deferred_count += 1;
                None
            }
            None => None,
        };

        let args = Args::new()
            .arg(string_lit(&machine.name))
            .arg(machine.any_state_position.literal())
            .arg(machine.entry_position.literal())
            .arg(machine.exit_position.literal())
            .named("states", "states")
            .named_opt("defaultState", default_state)
            .named_lit(
                "parentStateMachinePosition",
                &machine.parent_state_machine_position,
                &DEFAULT_PARENT_MACHINE_POSITION,
            );
        self.out.declare(
            BODY,
            "AnimatorStateMachine",
            &ident,
            &call("GenerateStateMachine", args),
        );
        self.cache_write(&ident);
        self.out.blank();

        if !machine.machines.is_empty() {
            let mut children = Vec::with_capacity(machine.machines.len());
            for child in &machine.machines {
                let sub = self.names.ident(NodeRef::Machine(child.machine))?.to_string();
                self.out.declare(
                    BODY,
                    "AnimatorStateMachine",
                    &sub,
                    &format!("Generate{sub}()"),
                );
                children.push(call(
                    "GenerateChildStateMachine",
                    Args::new().arg(child.position.literal()).arg(sub),
                ));
            }
            self.out.assign_array(
                BODY,
                &format!("{ident}.stateMachines"),
                "ChildAnimatorStateMachine",
                &children,
            );
            self.out.blank();
        }

        for child in &machine.states {
            let state = controller.state(child.state).ok_or(GenError::Unallocated {
                node: NodeRef::State(child.state),
            })?;
            self.emit_transition_list(
                id,
                NodeRef::State(child.state),
                "transitions",
                "AnimatorStateTransition",
                &state.transitions,
                TransitionKind::State,
            )?;
        }
        self.emit_transition_list(
            id,
            node,
            "entryTransitions",
            "AnimatorTransition",
            &machine.entry_transitions,
            TransitionKind::Machine,
        )?;
        self.emit_transition_list(
            id,
            node,
            "anyStateTransitions",
            "AnimatorStateTransition",
            &machine.any_state_transitions,
            TransitionKind::State,
        )?;

        self.out.line(BODY, format!("return {ident};"));
        self.out.line(HEADER, "}");
        self.out.blank();

        for child in &machine.machines {
            self.emit_machine(child.machine)?;
        }
        Ok(())
    }

    /// Assign `target.field = new Type[] { ... }` at the end of machine
    /// `machine`'s factory. If any destination is built by a factory that runs
    /// later, the whole assignment moves to the global routine instead.
    fn emit_transition_list(
        &mut self,
        machine: MachineId,
        target: NodeRef,
        field: &str,
        type_name: &str,
        transitions: &[Transition],
        kind: TransitionKind,
    ) -> Result<(), GenError> {
        if transitions.is_empty() {
            return Ok(());
        }
        let horizon = self.subtree_end[machine.index()];
        let mut ready = true;
        for transition in transitions {
            if let Some(dest) = transition.destination {
                ready &= self.constructed_by(dest, horizon)?;
            }
        }

        let site = if ready {
            FactoryId::Machine(machine)
        } else {
            FactoryId::MachineTransitions
        };
        let mut items = Vec::with_capacity(transitions.len());
        for transition in transitions {
            items.push(self.transition_call(transition, kind, site)?);
        }

        if ready {
            // Always a local here: a state of this machine or the machine itself.
            let target = self.names.ident(target)?.to_string();
            self.out
                .assign_array(BODY, &format!("{target}.{field}"), type_name, &items);
            self.out.blank();
        } else {
            let target = self.resolve(target, site)?;
            debug!(list = %target, field, "deferring transition list to global routine");
            self.deferred
                .assign_array(BODY, &format!("({target}).{field}"), type_name, &items);
            self.deferred.blank();
            self.deferred_count += 1;
        }
        Ok(())
    }

    fn transition_call(
        &self,
        t: &Transition,
        kind: TransitionKind,
        site: FactoryId,
    ) -> Result<String, GenError> {
        let (dest_state, dest_machine) = match t.destination {
            Some(Destination::State(id)) => (Some(self.resolve(NodeRef::State(id), site)?), None),
            Some(Destination::Machine(id)) => {
                (None, Some(self.resolve(NodeRef::Machine(id), site)?))
            }
            None => (None, None),
        };
        let conditions = if t.conditions.is_empty() {
            None
        } else {
            let items: Vec<String> = t.conditions.iter().map(condition_call).collect();
            Some(array("AnimatorCondition", &items, NESTED))
        };

        let mut args = Args::new().arg(string_lit(&t.name));
        if kind == TransitionKind::State {
            args = args.named_lit("canTransitionToSelf", &t.can_transition_to_self, &false);
        }
        args = args
            .named_opt("conditions", conditions)
            .named_opt("destinationState", dest_state)
            .named_opt("destinationStateMachine", dest_machine);

        let function = match kind {
            TransitionKind::State => {
                args = args
                    .named_lit("duration", &t.duration, &0.0)
                    .named_lit("hasFixedDuration", &t.has_fixed_duration, &false)
                    .named_lit("exitTime", &t.exit_time, &0.0)
                    .named_lit("hasExitTime", &t.has_exit_time, &false)
                    .named_lit("solo", &t.solo, &false)
                    .named_lit("mute", &t.mute, &false)
                    .named_lit("isExit", &t.is_exit, &false)
                    .named_lit("offset", &t.offset, &0.0)
                    .named_lit("orderedInterruption", &t.ordered_interruption, &true)
                    .named_with(
                        "interruptionSource",
                        &t.interruption_source,
                        &InterruptionSource::None,
                        |s| enum_lit("TransitionInterruptionSource", s.as_str()),
                    );
                "GenerateTransition"
            }
            TransitionKind::Machine => {
                args = args
                    .named_lit("solo", &t.solo, &false)
                    .named_lit("mute", &t.mute, &false)
                    .named_lit("isExit", &t.is_exit, &false);
                "GenerateStateMachineTransition"
            }
        };
        Ok(call(function, args))
    }

    // ── States ──────────────────────────────────────────────────────────

    fn emit_state(&mut self, id: StateId, site: FactoryId) -> Result<(), GenError> {
        let node = NodeRef::State(id);
        let controller = self.controller;
        let state = controller
            .state(id)
            .ok_or(GenError::Unallocated { node })?;

        let motion = match state.motion {
            Some(motion) => {
                self.emit_motion(motion, site)?;
                Some(self.resolve(self.motion_ref(motion)?, site)?)
            }
            None => None,
        };

        let ident = self.names.ident(node)?.to_string();
        let args = Args::new()
            .arg(string_lit(&state.name))
            .named_lit("writeDefaultValues", &state.write_default_values, &false)
            .named_lit("tag", &state.tag, &String::new())
            .named_opt("motion", motion)
            .named_lit("cycleOffset", &state.cycle_offset, &0.0)
            .named_lit("cycleOffsetParameter", &state.cycle_offset_parameter, &String::new())
            .named_lit(
                "cycleOffsetParameterActive",
                &state.cycle_offset_parameter_active,
                &false,
            )
            .named_lit("mirror", &state.mirror, &false)
            .named_lit("mirrorParameter", &state.mirror_parameter, &String::new())
            .named_lit("mirrorParameterActive", &state.mirror_parameter_active, &false)
            .named_lit("timeParameter", &state.time_parameter, &String::new())
            .named_lit("timeParameterActive", &state.time_parameter_active, &false)
            .named_lit("speed", &state.speed, &1.0)
            .named_lit("speedParameter", &state.speed_parameter, &String::new())
            .named_lit("speedParameterActive", &state.speed_parameter_active, &false);
        self.out
            .declare(BODY, "AnimatorState", &ident, &call("GenerateState", args));

        let mut behaviours = Vec::with_capacity(state.behaviours.len());
        for behaviour in &state.behaviours {
            match behaviour_call(behaviour) {
                Some(expr) => behaviours.push(expr),
                None => debug!(state = %state.name, "skipping unrecognized behaviour"),
            }
        }
        if !behaviours.is_empty() {
            self.out.blank();
            self.out.assign_array(
                BODY,
                &format!("{ident}.behaviours"),
                "StateMachineBehaviour",
                &behaviours,
            );
        }
        Ok(())
    }

    // ── Motions ─────────────────────────────────────────────────────────

    /// Construct motion `id` in `site` unless it was built earlier in the run.
    fn emit_motion(&mut self, id: MotionId, site: FactoryId) -> Result<(), GenError> {
        if self.emitted_motions.get(id.index()).copied().unwrap_or(false) {
            return Ok(());
        }
        let controller = self.controller;
        match controller.motion(id) {
            Some(Motion::Clip(clip)) => self.emit_clip(id, clip, site),
            Some(Motion::BlendTree(tree)) => self.emit_tree(id, tree, site),
            None => Err(GenError::Unallocated {
                node: NodeRef::Clip(id),
            }),
        }
    }

    fn emit_clip(&mut self, id: MotionId, clip: &Clip, site: FactoryId) -> Result<(), GenError> {
        let ident = self.names.allocate(NodeRef::Clip(id), &clip.name, site)?;
        self.emitted_motions[id.index()] = true;

        let args = Args::new()
            .arg(string_lit(&clip.name))
            .named_with("wrapMode", &clip.wrap_mode, &WrapMode::Default, |m| {
                enum_lit("WrapMode", m.as_str())
            })
            .named_lit("localBounds", &clip.local_bounds, &Bounds::default())
            .named_lit("frameRate", &clip.frame_rate, &DEFAULT_FRAME_RATE)
            .named_lit("legacy", &clip.legacy, &false);
        self.out
            .declare(BODY, "AnimationClip", &ident, &call("GenerateClip", args));
        self.cache_write(&ident);

        if clip.name.starts_with(&self.options.proxy_prefix) {
            return Ok(());
        }

        for curve in &clip.curves {
            let keys: Vec<String> = curve.keys.iter().map(keyframe_call).collect();
            let mut curve_args = Args::new()
                .named_with("preWrapMode", &curve.pre_wrap_mode, &WrapMode::ClampForever, |m| {
                    enum_lit("WrapMode", m.as_str())
                })
                .named_with("postWrapMode", &curve.post_wrap_mode, &WrapMode::ClampForever, |m| {
                    enum_lit("WrapMode", m.as_str())
                });
            if !keys.is_empty() {
                curve_args = curve_args.named("keys", array("Keyframe", &keys, NESTED));
            }
            let mut generate_curve = String::from("\n");
            push_indent(&mut generate_curve, ITEM);
            generate_curve.push_str(&call("GenerateCurve", curve_args));

            let args = binding_args(&ident, &curve.binding).arg(generate_curve);
            self.out.line(BODY, format!("{};", call("AddCurve", args)));
        }

        for curve in &clip.object_curves {
            let keys: Vec<String> = curve
                .keys
                .iter()
                .map(|k| {
                    format!(
                        "GenerateObjectReferenceKeyFrame({}, {})",
                        float_lit(k.time),
                        asset_lookup(&k.asset)
                    )
                })
                .collect();
            let args = binding_args(&ident, &curve.binding)
                .arg(array("ObjectReferenceKeyframe", &keys, NESTED));
            self.out
                .line(BODY, format!("{};", call("AddObjectCurve", args)));
        }

        if !clip.curves.is_empty() || !clip.object_curves.is_empty() {
            self.out.blank();
        }
        Ok(())
    }

    fn emit_tree(&mut self, id: MotionId, tree: &BlendTree, site: FactoryId) -> Result<(), GenError> {
        let ident = self.names.allocate(NodeRef::Tree(id), &tree.name, site)?;
        self.emitted_motions[id.index()] = true;

        let args = Args::new()
            .arg(string_lit(&tree.name))
            .arg(enum_lit("BlendTreeType", tree.blend_type.as_str()))
            .named_lit("blendParameter", &tree.blend_parameter, &String::new())
            .named_lit("blendParameterY", &tree.blend_parameter_y, &String::new())
            .named_lit("maxThreshold", &tree.max_threshold, &0.0)
            .named_lit("minThreshold", &tree.min_threshold, &0.0)
            .named_lit("useAutomaticThresholds", &tree.use_automatic_thresholds, &true);
        self.out
            .declare(BODY, "BlendTree", &ident, &call("GenerateBlendTree", args));
        self.cache_write(&ident);
        self.out.blank();

        for child in &tree.children {
            if let Some(motion) = child.motion {
                self.emit_motion(motion, site)?;
            }
        }

        let mut children = Vec::with_capacity(tree.children.len());
        for child in &tree.children {
            let motion = match child.motion {
                Some(motion) => self.resolve(self.motion_ref(motion)?, site)?,
                None => "null".to_string(),
            };
            let args = Args::new()
                .arg(motion)
                .arg(child.position.literal())
                .named_lit("threshold", &child.threshold, &0.0)
                .named_lit("timeScale", &child.time_scale, &1.0)
                .named_lit(
                    "directBlendParameter",
                    &child.direct_blend_parameter,
                    &String::new(),
                )
                .named_lit("cycleOffset", &child.cycle_offset, &0.0)
                .named_lit("mirror", &child.mirror, &false);
            children.push(call("GenerateChildMotion", args));
        }
        self.out.assign_array(
            BODY,
            &format!("{ident}.children"),
            "ChildMotion",
            &children,
        );
        self.out.blank();
        Ok(())
    }

    // ── Global cross-machine routine ────────────────────────────────────

    /// Runs after every layer is built: applies deferred wiring, then sets the
    /// machine-level transitions for every ordered (owner, source) pair.
    fn emit_machine_transitions(&mut self) -> Result<(), GenError> {
        let controller = self.controller;
        let site = FactoryId::MachineTransitions;

        self.out.line(
            HEADER,
            format!("public static List<AnimatorTransition> {MACHINE_TRANSITIONS_FN}(){{"),
        );
        self.out.line(
            BODY,
            "List<AnimatorTransition> transitions = new List<AnimatorTransition>();",
        );
        self.out.blank();
        let deferred = std::mem::take(&mut self.deferred);
        self.out.push_raw(deferred.as_str());

        let machines = self.machines.clone();
        for &owner in &machines {
            let owner_machine = controller.machine(owner).ok_or(GenError::Unallocated {
                node: NodeRef::Machine(owner),
            })?;
            for set in &owner_machine.machine_transitions {
                self.names.require(NodeRef::Machine(set.source))?;
            }
            for &source in &machines {
                let transitions = owner_machine.machine_transitions(source);
                if transitions.is_empty() {
                    continue;
                }
                let owner_expr = self.resolve(NodeRef::Machine(owner), site)?;
                let source_expr = self.resolve(NodeRef::Machine(source), site)?;
                let mut items = Vec::with_capacity(transitions.len());
                for transition in transitions {
                    items.push(self.transition_call(transition, TransitionKind::Machine, site)?);
                }
                self.out.line(
                    BODY,
                    format!(
                        "({owner_expr}).SetStateMachineTransitions({source_expr}, new AnimatorTransition[] {{"
                    ),
                );
                self.out.items(ITEM, &items);
                self.out.line(BODY, "});");
                self.out.line(
                    BODY,
                    format!(
                        "transitions = transitions.Concat(({owner_expr}).GetStateMachineTransitions({source_expr})).ToList();"
                    ),
                );
                self.out.blank();
                self.machine_pairs.push(PairWiring {
                    owner,
                    source,
                    transitions: transitions.len(),
                });
            }
        }
        debug!(pairs = self.machine_pairs.len(), "cross-machine transitions emitted");

        self.out.line(BODY, "return transitions;");
        self.out.line(HEADER, "}");
        Ok(())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────────

/// `(Type) objectCache["Ident"]`.
fn cache_lookup(node: NodeRef, ident: &str) -> String {
    format!("({}) objectCache[{}]", node.target_type(), string_lit(ident))
}

fn parameter_call(param: &Parameter) -> String {
    let name = string_lit(&param.name);
    match &param.kind {
        ParameterKind::Bool { default } => call(
            "GenerateBoolParameter",
            Args::new().arg(name).named_lit("defaultBool", default, &false),
        ),
        ParameterKind::Int { default } => call(
            "GenerateIntParameter",
            Args::new().arg(name).named_lit("defaultInt", default, &0),
        ),
        ParameterKind::Float { default } => call(
            "GenerateFloatParameter",
            Args::new().arg(name).named_lit("defaultFloat", default, &0.0),
        ),
        ParameterKind::Trigger => call("GenerateTriggerParameter", Args::new().arg(name)),
    }
}

fn condition_call(condition: &Condition) -> String {
    call(
        "GenerateCondition",
        Args::new()
            .arg(enum_lit("AnimatorConditionMode", condition.mode.as_str()))
            .arg(string_lit(&condition.parameter))
            .arg(float_lit(condition.threshold)),
    )
}

fn keyframe_call(key: &Keyframe) -> String {
    call(
        "GenerateKeyFrame",
        Args::new()
            .named_lit("time", &key.time, &0.0)
            .named_lit("value", &key.value, &0.0)
            .named_lit("inTangent", &key.in_tangent, &0.0)
            .named_lit("outTangent", &key.out_tangent, &0.0)
            .named_lit("inWeight", &key.in_weight, &0.0)
            .named_lit("outWeight", &key.out_weight, &0.0),
    )
}

/// Leading `clip, "path", typeof(Type), "property"` of a curve call.
fn binding_args(clip: &str, binding: &CurveBinding) -> Args {
    Args::new()
        .arg(clip)
        .arg(string_lit(&binding.path))
        .arg(format!("typeof({})", binding.type_name))
        .arg(string_lit(&binding.property))
}

/// Load an asset through its GUID instead of embedding it.
fn asset_lookup(asset: &AssetRef) -> String {
    format!(
        "AssetDatabase.LoadAssetAtPath<{}>(AssetDatabase.GUIDToAssetPath({}))",
        asset.type_name,
        string_lit(&asset.guid)
    )
}

// ── Behaviours ──────────────────────────────────────────────────────────────

/// Constructor call for a recognized behaviour; `None` for anything else.
fn behaviour_call(behaviour: &Behaviour) -> Option<String> {
    let expr = match behaviour {
        Behaviour::ParameterDriver(driver) => {
            let params: Vec<String> = driver.parameters.iter().map(driver_parameter_call).collect();
            call(
                "GenerateParameterDriver",
                Args::new()
                    .arg(array("VRC_AvatarParameterDriver.Parameter", &params, NESTED))
                    .named_lit("isEnabled", &driver.is_enabled, &false)
                    .named_lit("localOnly", &driver.local_only, &false)
                    .named_lit("debugString", &driver.debug_string, &String::new()),
            )
        }
        Behaviour::AnimatorLayerControl(control) => call(
            "GenerateAnimatorLayerControl",
            Args::new()
                .arg(enum_lit(
                    "VRC_AnimatorLayerControl.BlendableLayer",
                    control.playable.as_str(),
                ))
                .named_lit("layer", &control.layer, &0)
                .named_lit("blendDuration", &control.blend_duration, &0.0)
                .named_lit("goalWeight", &control.goal_weight, &0.0)
                .named_lit("debugString", &control.debug_string, &String::new()),
        ),
        Behaviour::LocomotionControl(control) => call(
            "GenerateLocomotionControl",
            Args::new()
                .arg(control.disable_locomotion.literal())
                .named_lit("debugString", &control.debug_string, &String::new()),
        ),
        Behaviour::TrackingControl(control) => {
            let tracking = |v: &TrackingType| {
                enum_lit("VRC_AnimatorTrackingControl.TrackingType", v.as_str())
            };
            let none = TrackingType::NoChange;
            call(
                "GenerateTrackingControl",
                Args::new()
                    .named_with("trackingHead", &control.tracking_head, &none, tracking)
                    .named_with("trackingLeftHand", &control.tracking_left_hand, &none, tracking)
                    .named_with("trackingRightHand", &control.tracking_right_hand, &none, tracking)
                    .named_with("trackingHip", &control.tracking_hip, &none, tracking)
                    .named_with("trackingLeftFoot", &control.tracking_left_foot, &none, tracking)
                    .named_with("trackingRightFoot", &control.tracking_right_foot, &none, tracking)
                    .named_with(
                        "trackingLeftFingers",
                        &control.tracking_left_fingers,
                        &none,
                        tracking,
                    )
                    .named_with(
                        "trackingRightFingers",
                        &control.tracking_right_fingers,
                        &none,
                        tracking,
                    )
                    .named_with("trackingEyes", &control.tracking_eyes, &none, tracking)
                    .named_with("trackingMouth", &control.tracking_mouth, &none, tracking)
                    .named_lit("debugString", &control.debug_string, &String::new()),
            )
        }
        Behaviour::PlayableLayerControl(control) => call(
            "GeneratePlayableLayerControl",
            Args::new()
                .arg(enum_lit(
                    "VRC_PlayableLayerControl.BlendableLayer",
                    control.layer.as_str(),
                ))
                .named_lit("blendDuration", &control.blend_duration, &0.0)
                .named_lit("goalWeight", &control.goal_weight, &0.0)
                .named_lit("debugString", &control.debug_string, &String::new()),
        ),
        Behaviour::TemporaryPoseSpace(pose) => call(
            "GenerateTemporaryPoseSpace",
            Args::new()
                .named_lit("delayTime", &pose.delay_time, &0.0)
                .named_lit("fixedDelay", &pose.fixed_delay, &false)
                .named_lit("enterPoseSpace", &pose.enter_pose_space, &false)
                .named_lit("debugString", &pose.debug_string, &String::new()),
        ),
        Behaviour::Unrecognized => return None,
    };
    Some(expr)
}

fn driver_parameter_call(param: &DriverParameter) -> String {
    call(
        "GenerateParameter",
        Args::new()
            .arg(enum_lit(
                "VRC_AvatarParameterDriver.ChangeType",
                param.change_type.as_str(),
            ))
            .named_lit("source", &param.source, &String::new())
            .named_lit("name", &param.name, &String::new())
            .named_lit("value", &param.value, &0.0)
            .named_lit("chance", &param.chance, &0.0)
            .named_lit("convertRange", &param.convert_range, &false)
            .named_lit("destMax", &param.dest_max, &0.0)
            .named_lit("destMin", &param.dest_min, &0.0)
            .named_lit("sourceMin", &param.source_min, &0.0)
            .named_lit("sourceMax", &param.source_max, &0.0)
            .named_lit("valueMin", &param.value_min, &0.0)
            .named_lit("valueMax", &param.value_max, &0.0),
    )
}
