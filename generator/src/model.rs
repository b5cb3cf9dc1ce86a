// model.rs — Input controller graph (arena form)
//
// The controller arrives fully materialized from an external loader, usually
// as JSON. Every node lives in a per-kind arena on `Controller` and refers to
// other nodes by index, so identity never depends on names.
//
// Preconditions: none.
// Postconditions: `Controller::validate` succeeding guarantees every id is in
//                 range, states and machines have a single owner, and machine
//                 nesting is acyclic.
// Failure modes: `ModelError` from `validate`.
// Side effects: none.

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::id::*;

// ── Value types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2(pub f32, pub f32);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3(pub f32, pub f32, pub f32);

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Bounds {
    pub center: Vec3,
    pub size: Vec3,
}

/// Declares a target-side enum whose variant names are spelled exactly as the
/// engine spells them.
macro_rules! target_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident),+ $(,)? } default $default:ident) => {
        $(#[$meta])*
        #[allow(clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::$default
            }
        }
    };
}

target_enum!(BlendingMode { Override, Additive } default Override);

target_enum!(ConditionMode { If, IfNot, Greater, Less, Equals, NotEqual } default If);

target_enum!(
    InterruptionSource {
        None,
        Source,
        Destination,
        SourceThenDestination,
        DestinationThenSource,
    } default None
);

target_enum!(
    /// Unity `WrapMode`. `Default` is the clip default, `ClampForever` the curve default.
    WrapMode { Default, Once, Clamp, Loop, PingPong, ClampForever } default Default
);

target_enum!(
    BlendTreeType {
        Simple1D,
        SimpleDirectional2D,
        FreeformDirectional2D,
        FreeformCartesian2D,
        Direct,
    } default Simple1D
);

target_enum!(
    BodyPart {
        Root,
        Body,
        Head,
        LeftLeg,
        RightLeg,
        LeftArm,
        RightArm,
        LeftFingers,
        RightFingers,
        LeftFootIK,
        RightFootIK,
        LeftHandIK,
        RightHandIK,
    } default Root
);

target_enum!(TrackingType { NoChange, Tracking, Animation } default NoChange);

target_enum!(ChangeType { Set, Add, Random, Copy } default Set);

target_enum!(BlendableLayer { Action, FX, Gesture, Additive } default Action);

// ── Controller ──────────────────────────────────────────────────────────────

/// A complete animator controller: parameters, layers, and the node arenas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Controller {
    pub name: String,
    pub parameters: Vec<Parameter>,
    pub layers: Vec<Layer>,
    pub machines: Vec<StateMachine>,
    pub states: Vec<State>,
    pub motions: Vec<Motion>,
    pub masks: Vec<Mask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(flatten)]
    pub kind: ParameterKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ParameterKind {
    Bool {
        #[serde(default)]
        default: bool,
    },
    Int {
        #[serde(default)]
        default: i32,
    },
    Float {
        #[serde(default)]
        default: f32,
    },
    Trigger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layer {
    pub name: String,
    pub machine: MachineId,
    pub mask: Option<MaskId>,
    pub blending_mode: BlendingMode,
    pub default_weight: f32,
    pub synced_layer_affects_timing: bool,
    pub synced_layer_index: i32,
}

impl Default for Layer {
    fn default() -> Self {
        Layer {
            name: String::new(),
            machine: MachineId(0),
            mask: None,
            blending_mode: BlendingMode::Override,
            default_weight: 1.0,
            synced_layer_affects_timing: false,
            synced_layer_index: -1,
        }
    }
}

// ── State machines ──────────────────────────────────────────────────────────

pub const DEFAULT_PARENT_MACHINE_POSITION: Vec3 = Vec3(800.0, 20.0, 0.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMachine {
    pub name: String,
    pub any_state_position: Vec3,
    pub entry_position: Vec3,
    pub exit_position: Vec3,
    pub parent_state_machine_position: Vec3,
    pub states: Vec<ChildState>,
    pub machines: Vec<ChildMachine>,
    pub default_state: Option<StateId>,
    pub any_state_transitions: Vec<Transition>,
    pub entry_transitions: Vec<Transition>,
    /// Transitions leaving the exit node of `source`, as stored on this machine.
    pub machine_transitions: Vec<MachineTransitions>,
}

impl Default for StateMachine {
    fn default() -> Self {
        StateMachine {
            name: String::new(),
            any_state_position: Vec3::default(),
            entry_position: Vec3::default(),
            exit_position: Vec3::default(),
            parent_state_machine_position: DEFAULT_PARENT_MACHINE_POSITION,
            states: Vec::new(),
            machines: Vec::new(),
            default_state: None,
            any_state_transitions: Vec::new(),
            entry_transitions: Vec::new(),
            machine_transitions: Vec::new(),
        }
    }
}

impl StateMachine {
    pub fn named(name: impl Into<String>) -> Self {
        StateMachine {
            name: name.into(),
            ..StateMachine::default()
        }
    }

    /// Transitions out of `source` stored on this machine; empty if none.
    /// `Controller::validate` rejects a source listed twice.
    pub fn machine_transitions(&self, source: MachineId) -> &[Transition] {
        self.machine_transitions
            .iter()
            .find(|set| set.source == source)
            .map(|set| set.transitions.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildState {
    pub state: StateId,
    #[serde(default)]
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildMachine {
    pub machine: MachineId,
    #[serde(default)]
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineTransitions {
    pub source: MachineId,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

// ── States and transitions ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct State {
    pub name: String,
    pub motion: Option<MotionId>,
    pub write_default_values: bool,
    pub tag: String,
    pub cycle_offset: f32,
    pub cycle_offset_parameter: String,
    pub cycle_offset_parameter_active: bool,
    pub mirror: bool,
    pub mirror_parameter: String,
    pub mirror_parameter_active: bool,
    pub time_parameter: String,
    pub time_parameter_active: bool,
    pub speed: f32,
    pub speed_parameter: String,
    pub speed_parameter_active: bool,
    pub transitions: Vec<Transition>,
    pub behaviours: Vec<Behaviour>,
}

impl Default for State {
    fn default() -> Self {
        State {
            name: String::new(),
            motion: None,
            write_default_values: false,
            tag: String::new(),
            cycle_offset: 0.0,
            cycle_offset_parameter: String::new(),
            cycle_offset_parameter_active: false,
            mirror: false,
            mirror_parameter: String::new(),
            mirror_parameter_active: false,
            time_parameter: String::new(),
            time_parameter_active: false,
            speed: 1.0,
            speed_parameter: String::new(),
            speed_parameter_active: false,
            transitions: Vec::new(),
            behaviours: Vec::new(),
        }
    }
}

impl State {
    pub fn named(name: impl Into<String>) -> Self {
        State {
            name: name.into(),
            ..State::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    State(StateId),
    Machine(MachineId),
}

/// One transition. Entry and machine-level transitions only use the name,
/// conditions, destination, and the `solo`/`mute`/`is_exit` flags; the timing
/// fields apply to state-level and any-state transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transition {
    pub name: String,
    pub conditions: Vec<Condition>,
    pub destination: Option<Destination>,
    pub solo: bool,
    pub mute: bool,
    pub is_exit: bool,
    pub can_transition_to_self: bool,
    pub duration: f32,
    pub has_fixed_duration: bool,
    pub exit_time: f32,
    pub has_exit_time: bool,
    pub offset: f32,
    pub ordered_interruption: bool,
    pub interruption_source: InterruptionSource,
}

impl Default for Transition {
    fn default() -> Self {
        Transition {
            name: String::new(),
            conditions: Vec::new(),
            destination: None,
            solo: false,
            mute: false,
            is_exit: false,
            can_transition_to_self: false,
            duration: 0.0,
            has_fixed_duration: false,
            exit_time: 0.0,
            has_exit_time: false,
            offset: 0.0,
            ordered_interruption: true,
            interruption_source: InterruptionSource::None,
        }
    }
}

impl Transition {
    pub fn to_state(state: StateId) -> Self {
        Transition {
            destination: Some(Destination::State(state)),
            ..Transition::default()
        }
    }

    pub fn to_machine(machine: MachineId) -> Self {
        Transition {
            destination: Some(Destination::Machine(machine)),
            ..Transition::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub mode: ConditionMode,
    pub parameter: String,
    #[serde(default)]
    pub threshold: f32,
}

// ── Behaviours ──────────────────────────────────────────────────────────────

/// State behaviours the generator knows how to reconstruct. Anything else
/// deserializes as `Unrecognized` and is left out of the output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Behaviour {
    ParameterDriver(ParameterDriver),
    AnimatorLayerControl(AnimatorLayerControl),
    LocomotionControl(LocomotionControl),
    TrackingControl(TrackingControl),
    PlayableLayerControl(PlayableLayerControl),
    TemporaryPoseSpace(TemporaryPoseSpace),
    #[serde(other)]
    Unrecognized,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterDriver {
    pub parameters: Vec<DriverParameter>,
    pub is_enabled: bool,
    pub local_only: bool,
    pub debug_string: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverParameter {
    pub change_type: ChangeType,
    pub source: String,
    pub name: String,
    pub value: f32,
    pub chance: f32,
    pub convert_range: bool,
    pub dest_max: f32,
    pub dest_min: f32,
    pub source_min: f32,
    pub source_max: f32,
    pub value_min: f32,
    pub value_max: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimatorLayerControl {
    pub playable: BlendableLayer,
    pub layer: i32,
    pub blend_duration: f32,
    pub goal_weight: f32,
    pub debug_string: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocomotionControl {
    pub disable_locomotion: bool,
    pub debug_string: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingControl {
    pub tracking_head: TrackingType,
    pub tracking_left_hand: TrackingType,
    pub tracking_right_hand: TrackingType,
    pub tracking_hip: TrackingType,
    pub tracking_left_foot: TrackingType,
    pub tracking_right_foot: TrackingType,
    pub tracking_left_fingers: TrackingType,
    pub tracking_right_fingers: TrackingType,
    pub tracking_eyes: TrackingType,
    pub tracking_mouth: TrackingType,
    pub debug_string: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayableLayerControl {
    pub layer: BlendableLayer,
    pub blend_duration: f32,
    pub goal_weight: f32,
    pub debug_string: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporaryPoseSpace {
    pub delay_time: f32,
    pub fixed_delay: bool,
    pub enter_pose_space: bool,
    pub debug_string: String,
}

// ── Motions ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Motion {
    Clip(Clip),
    BlendTree(BlendTree),
}

impl Motion {
    pub fn name(&self) -> &str {
        match self {
            Motion::Clip(clip) => &clip.name,
            Motion::BlendTree(tree) => &tree.name,
        }
    }
}

pub const DEFAULT_FRAME_RATE: f32 = 60.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Clip {
    pub name: String,
    pub wrap_mode: WrapMode,
    pub local_bounds: Bounds,
    pub frame_rate: f32,
    pub legacy: bool,
    pub curves: Vec<FloatCurve>,
    pub object_curves: Vec<ObjectCurve>,
}

impl Default for Clip {
    fn default() -> Self {
        Clip {
            name: String::new(),
            wrap_mode: WrapMode::Default,
            local_bounds: Bounds::default(),
            frame_rate: DEFAULT_FRAME_RATE,
            legacy: false,
            curves: Vec::new(),
            object_curves: Vec::new(),
        }
    }
}

impl Clip {
    pub fn named(name: impl Into<String>) -> Self {
        Clip {
            name: name.into(),
            ..Clip::default()
        }
    }
}

/// Where a curve is bound: transform path, component type, property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurveBinding {
    pub path: String,
    /// Fully qualified component type, e.g. `UnityEngine.Transform`.
    pub type_name: String,
    pub property: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FloatCurve {
    pub binding: CurveBinding,
    pub pre_wrap_mode: WrapMode,
    pub post_wrap_mode: WrapMode,
    pub keys: Vec<Keyframe>,
}

impl Default for FloatCurve {
    fn default() -> Self {
        FloatCurve {
            binding: CurveBinding::default(),
            pre_wrap_mode: WrapMode::ClampForever,
            post_wrap_mode: WrapMode::ClampForever,
            keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keyframe {
    pub time: f32,
    pub value: f32,
    pub in_tangent: f32,
    pub out_tangent: f32,
    pub in_weight: f32,
    pub out_weight: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectCurve {
    pub binding: CurveBinding,
    pub keys: Vec<ObjectKeyframe>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectKeyframe {
    pub time: f32,
    pub asset: AssetRef,
}

/// A project asset named by content address rather than embedded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetRef {
    pub type_name: String,
    pub guid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlendTree {
    pub name: String,
    pub blend_type: BlendTreeType,
    pub blend_parameter: String,
    pub blend_parameter_y: String,
    pub min_threshold: f32,
    pub max_threshold: f32,
    pub use_automatic_thresholds: bool,
    pub children: Vec<ChildMotion>,
}

impl Default for BlendTree {
    fn default() -> Self {
        BlendTree {
            name: String::new(),
            blend_type: BlendTreeType::Simple1D,
            blend_parameter: String::new(),
            blend_parameter_y: String::new(),
            min_threshold: 0.0,
            max_threshold: 0.0,
            use_automatic_thresholds: true,
            children: Vec::new(),
        }
    }
}

impl BlendTree {
    pub fn named(name: impl Into<String>) -> Self {
        BlendTree {
            name: name.into(),
            ..BlendTree::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChildMotion {
    pub motion: Option<MotionId>,
    pub position: Vec2,
    pub threshold: f32,
    pub time_scale: f32,
    pub direct_blend_parameter: String,
    pub cycle_offset: f32,
    pub mirror: bool,
}

impl Default for ChildMotion {
    fn default() -> Self {
        ChildMotion {
            motion: None,
            position: Vec2::default(),
            threshold: 0.0,
            time_scale: 1.0,
            direct_blend_parameter: String::new(),
            cycle_offset: 0.0,
            mirror: false,
        }
    }
}

impl ChildMotion {
    pub fn of(motion: MotionId) -> Self {
        ChildMotion {
            motion: Some(motion),
            ..ChildMotion::default()
        }
    }
}

// ── Masks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mask {
    pub name: String,
    pub transforms: Vec<MaskTransform>,
    pub body_parts: Vec<BodyPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskTransform {
    pub path: String,
    #[serde(default)]
    pub active: bool,
}

// ── Arena construction and lookup ───────────────────────────────────────────

impl Controller {
    pub fn named(name: impl Into<String>) -> Self {
        Controller {
            name: name.into(),
            ..Controller::default()
        }
    }

    pub fn add_layer(&mut self, layer: Layer) -> LayerId {
        self.layers.push(layer);
        LayerId(self.layers.len() as u32 - 1)
    }

    pub fn add_machine(&mut self, machine: StateMachine) -> MachineId {
        self.machines.push(machine);
        MachineId(self.machines.len() as u32 - 1)
    }

    pub fn add_state(&mut self, state: State) -> StateId {
        self.states.push(state);
        StateId(self.states.len() as u32 - 1)
    }

    pub fn add_motion(&mut self, motion: Motion) -> MotionId {
        self.motions.push(motion);
        MotionId(self.motions.len() as u32 - 1)
    }

    pub fn add_mask(&mut self, mask: Mask) -> MaskId {
        self.masks.push(mask);
        MaskId(self.masks.len() as u32 - 1)
    }

    /// Add a state and list it as a child of `machine`.
    pub fn add_state_to(&mut self, machine: MachineId, state: State, position: Vec3) -> StateId {
        let id = self.add_state(state);
        self.machines[machine.index()]
            .states
            .push(ChildState { state: id, position });
        id
    }

    /// Add a machine and nest it under `parent`.
    pub fn add_machine_to(
        &mut self,
        parent: MachineId,
        machine: StateMachine,
        position: Vec3,
    ) -> MachineId {
        let id = self.add_machine(machine);
        self.machines[parent.index()]
            .machines
            .push(ChildMachine { machine: id, position });
        id
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id.index())
    }

    pub fn machine(&self, id: MachineId) -> Option<&StateMachine> {
        self.machines.get(id.index())
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id.index())
    }

    pub fn motion(&self, id: MotionId) -> Option<&Motion> {
        self.motions.get(id.index())
    }

    pub fn mask(&self, id: MaskId) -> Option<&Mask> {
        self.masks.get(id.index())
    }

    /// Name-table key for a motion: clips and trees use different tags.
    pub fn motion_ref(&self, id: MotionId) -> Option<NodeRef> {
        self.motion(id).map(|motion| match motion {
            Motion::Clip(_) => NodeRef::Clip(id),
            Motion::BlendTree(_) => NodeRef::Tree(id),
        })
    }

    // ── Validation ──────────────────────────────────────────────────────

    /// Check referential integrity and ownership rules.
    pub fn validate(&self) -> Result<(), ModelError> {
        for (i, layer) in self.layers.iter().enumerate() {
            let ctx = || format!("layer #{i} ({:?})", layer.name);
            self.check_machine(layer.machine, ctx)?;
            if let Some(mask) = layer.mask {
                if self.mask(mask).is_none() {
                    return Err(ModelError::dangling(NodeRef::Mask(mask), ctx()));
                }
            }
        }

        let mut state_owner: Vec<Option<MachineId>> = vec![None; self.states.len()];
        let mut machine_parent: Vec<Option<MachineId>> = vec![None; self.machines.len()];

        for (i, machine) in self.machines.iter().enumerate() {
            let this = MachineId(i as u32);
            let ctx = || format!("state machine #{i} ({:?})", machine.name);

            for child in &machine.states {
                self.check_state(child.state, ctx)?;
                let slot = &mut state_owner[child.state.index()];
                if let Some(first) = *slot {
                    return Err(ModelError::SharedState {
                        state: child.state,
                        first,
                        second: this,
                    });
                }
                *slot = Some(this);
            }
            for child in &machine.machines {
                self.check_machine(child.machine, ctx)?;
                let slot = &mut machine_parent[child.machine.index()];
                if let Some(first) = *slot {
                    return Err(ModelError::SharedMachine {
                        machine: child.machine,
                        first,
                        second: this,
                    });
                }
                *slot = Some(this);
            }
            if let Some(state) = machine.default_state {
                self.check_state(state, ctx)?;
            }
            for transition in machine
                .any_state_transitions
                .iter()
                .chain(&machine.entry_transitions)
            {
                self.check_destination(transition, ctx)?;
            }
            for (j, set) in machine.machine_transitions.iter().enumerate() {
                self.check_machine(set.source, ctx)?;
                if machine.machine_transitions[..j]
                    .iter()
                    .any(|earlier| earlier.source == set.source)
                {
                    return Err(ModelError::DuplicateMachineTransitions {
                        owner: this,
                        from: set.source,
                    });
                }
                for transition in &set.transitions {
                    self.check_destination(transition, ctx)?;
                }
            }
        }

        for (i, state) in self.states.iter().enumerate() {
            let ctx = || format!("state #{i} ({:?})", state.name);
            if let Some(motion) = state.motion {
                self.check_motion(motion, ctx)?;
            }
            for transition in &state.transitions {
                self.check_destination(transition, ctx)?;
            }
        }

        for (i, motion) in self.motions.iter().enumerate() {
            if let Motion::BlendTree(tree) = motion {
                let ctx = || format!("blend tree #{i} ({:?})", tree.name);
                for child in &tree.children {
                    if let Some(id) = child.motion {
                        self.check_motion(id, ctx)?;
                    }
                }
            }
        }

        self.check_nesting_acyclic(&machine_parent)
    }

    fn check_machine(&self, id: MachineId, ctx: impl Fn() -> String) -> Result<(), ModelError> {
        match self.machine(id) {
            Some(_) => Ok(()),
            None => Err(ModelError::dangling(NodeRef::Machine(id), ctx())),
        }
    }

    fn check_state(&self, id: StateId, ctx: impl Fn() -> String) -> Result<(), ModelError> {
        match self.state(id) {
            Some(_) => Ok(()),
            None => Err(ModelError::dangling(NodeRef::State(id), ctx())),
        }
    }

    fn check_motion(&self, id: MotionId, ctx: impl Fn() -> String) -> Result<(), ModelError> {
        match self.motion(id) {
            Some(_) => Ok(()),
            None => Err(ModelError::dangling(NodeRef::Clip(id), ctx())),
        }
    }

    fn check_destination(
        &self,
        transition: &Transition,
        ctx: impl Fn() -> String,
    ) -> Result<(), ModelError> {
        match transition.destination {
            Some(Destination::State(id)) => self.check_state(id, ctx),
            Some(Destination::Machine(id)) => self.check_machine(id, ctx),
            None => Ok(()),
        }
    }

    /// Each machine has at most one parent, so a cycle shows up as a parent
    /// chain that returns to its start.
    fn check_nesting_acyclic(&self, parent: &[Option<MachineId>]) -> Result<(), ModelError> {
        for start in 0..parent.len() {
            let mut current = parent[start];
            let mut steps = 0;
            while let Some(p) = current {
                if p.index() == start {
                    return Err(ModelError::NestingCycle {
                        machine: MachineId(start as u32),
                    });
                }
                steps += 1;
                if steps > parent.len() {
                    // A cycle not passing through `start`; reported from its own members.
                    break;
                }
                current = parent[p.index()];
            }
        }
        Ok(())
    }
}
