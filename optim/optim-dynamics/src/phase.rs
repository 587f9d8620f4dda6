//! Per-phase problem descriptors and the typestate builder that fills them.
//!
//! A phase goes through three states:
//!
//! ```text
//! PhaseBuilder<Empty> ──append_q_qdot──► PhaseBuilder<BlocksAppended>
//!                                          │  append_tau / append_muscles
//!                                          │  build_dynamics_function (repeatable)
//!                                          ▼
//!                                        PhaseBuilder<DynamicsBound> ──finish──► Phase
//!                                          │  bind_contacts
//! ```
//!
//! Blocks are appended in a fixed order: positions, velocities, torques,
//! muscles. The builder checks the order at every append, so the offsets
//! recorded in the ledgers are stable once the dynamics are bound.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;

use indexmap::IndexMap;
use nalgebra::DMatrix;
use optim_symbolic::{Function, SymVector};
use optim_types::{BidirectionalMapping, Bounds, IndexMapping};
use tracing::debug;

use crate::config::PhaseDefinition;
use crate::contact::ContactNameRegistry;
use crate::dynamics_type::{ContactFn, Dynamics, DynamicsFn, MuscleDrive};
use crate::error::{OcpError, Result};
use crate::ledger::BlockLedger;
use crate::model::BiomechanicalModel;
use crate::parameters::Parameters;
use crate::plot::{CustomPlot, PlotExtractor, PlotType};

/// Ledger key of the position block.
pub const Q: &str = "q";
/// Ledger key of the velocity block.
pub const Q_DOT: &str = "q_dot";
/// Ledger key of the generalized force block.
pub const TAU: &str = "tau";
/// Ledger key of the muscle blocks.
pub const MUSCLES: &str = "muscles";

const RESERVED: [&str; 4] = [Q, Q_DOT, TAU, MUSCLES];

/// Name of the compiled forward-dynamics function.
pub const FORWARD_DYN: &str = "ForwardDyn";
/// Name of the compiled contact-force function.
pub const CONTACT_FORCES_FUNC: &str = "contact_forces_func";

/// Phase with no block yet.
#[derive(Debug, Clone, Copy)]
pub struct Empty;

/// Phase with its blocks appended; the dynamics can be (re)built.
#[derive(Debug, Clone, Copy)]
pub struct BlocksAppended;

/// Phase bound to its dynamics; the layout is frozen.
#[derive(Debug, Clone, Copy)]
pub struct DynamicsBound;

/// Problem-level state shared by every phase during configuration.
pub struct ProblemContext<'a> {
    /// Optimization parameters, concatenated into each phase's `p`.
    pub parameters: &'a Parameters,
    /// Merged contact names across phases.
    pub contacts: &'a mut ContactNameRegistry,
}

/// A configured (or in-configuration) phase.
#[derive(Clone)]
pub struct Phase {
    index: usize,
    model: Arc<dyn BiomechanicalModel>,
    dynamics: Dynamics,
    n_shooting: usize,
    final_time: f64,

    q_mapping: BidirectionalMapping,
    q_dot_mapping: BidirectionalMapping,
    tau_mapping: BidirectionalMapping,
    contact_plot_mapping: Option<IndexMapping>,
    x_bounds: Option<Bounds>,
    u_bounds: Option<Bounds>,

    x: SymVector,
    u: SymVector,
    p: SymVector,
    var_states: BlockLedger,
    var_controls: BlockLedger,
    parameter_names: BlockLedger,

    nb_q: usize,
    nb_qdot: usize,
    nb_tau: usize,
    nb_muscles: usize,
    nb_actuators: usize,
    nx: usize,
    nu: usize,
    np: usize,
    muscle_names: Vec<String>,

    plots: IndexMap<String, CustomPlot>,
    dynamics_func: Option<Function>,
    contact_forces_func: Option<Function>,
    contact_mapping: Option<IndexMapping>,
}

impl Phase {
    fn from_definition(index: usize, def: PhaseDefinition) -> Result<Self> {
        def.validate()?;
        let model = def.model;
        let q_mapping = def
            .q_mapping
            .unwrap_or_else(|| BidirectionalMapping::identity(model.nb_q()));
        let q_dot_mapping = def
            .q_dot_mapping
            .unwrap_or_else(|| BidirectionalMapping::identity(model.nb_qdot()));
        let tau_mapping = def
            .tau_mapping
            .unwrap_or_else(|| BidirectionalMapping::identity(model.nb_generalized_torque()));

        Ok(Self {
            index,
            model,
            dynamics: def.dynamics,
            n_shooting: def.n_shooting,
            final_time: def.final_time,
            q_mapping,
            q_dot_mapping,
            tau_mapping,
            contact_plot_mapping: def.contact_plot_mapping,
            x_bounds: def.x_bounds,
            u_bounds: def.u_bounds,
            x: SymVector::new(),
            u: SymVector::new(),
            p: SymVector::new(),
            var_states: BlockLedger::new("states"),
            var_controls: BlockLedger::new("controls"),
            parameter_names: BlockLedger::new("parameters"),
            nb_q: 0,
            nb_qdot: 0,
            nb_tau: 0,
            nb_muscles: 0,
            nb_actuators: 0,
            nx: 0,
            nu: 0,
            np: 0,
            muscle_names: Vec::new(),
            plots: IndexMap::new(),
            dynamics_func: None,
            contact_forces_func: None,
            contact_mapping: None,
        })
    }

    /// Phase index within the program.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The physics model.
    #[must_use]
    pub fn model(&self) -> &dyn BiomechanicalModel {
        self.model.as_ref()
    }

    /// Shared handle on the physics model.
    #[must_use]
    pub fn model_arc(&self) -> Arc<dyn BiomechanicalModel> {
        Arc::clone(&self.model)
    }

    /// The dynamics this phase was configured with.
    #[must_use]
    pub fn dynamics(&self) -> &Dynamics {
        &self.dynamics
    }

    /// Number of shooting intervals.
    #[must_use]
    pub fn n_shooting(&self) -> usize {
        self.n_shooting
    }

    /// Phase duration.
    #[must_use]
    pub fn final_time(&self) -> f64 {
        self.final_time
    }

    /// Position mapping.
    #[must_use]
    pub fn q_mapping(&self) -> &BidirectionalMapping {
        &self.q_mapping
    }

    /// Velocity mapping.
    #[must_use]
    pub fn q_dot_mapping(&self) -> &BidirectionalMapping {
        &self.q_dot_mapping
    }

    /// Generalized force mapping.
    #[must_use]
    pub fn tau_mapping(&self) -> &BidirectionalMapping {
        &self.tau_mapping
    }

    /// State bounds, if given.
    #[must_use]
    pub fn x_bounds(&self) -> Option<&Bounds> {
        self.x_bounds.as_ref()
    }

    /// Control bounds, if given.
    #[must_use]
    pub fn u_bounds(&self) -> Option<&Bounds> {
        self.u_bounds.as_ref()
    }

    /// Symbolic state vector.
    #[must_use]
    pub fn x(&self) -> &SymVector {
        &self.x
    }

    /// Symbolic control vector.
    #[must_use]
    pub fn u(&self) -> &SymVector {
        &self.u
    }

    /// Symbolic parameter vector.
    #[must_use]
    pub fn p(&self) -> &SymVector {
        &self.p
    }

    /// State blocks.
    #[must_use]
    pub fn var_states(&self) -> &BlockLedger {
        &self.var_states
    }

    /// Control blocks.
    #[must_use]
    pub fn var_controls(&self) -> &BlockLedger {
        &self.var_controls
    }

    /// Parameter blocks.
    #[must_use]
    pub fn parameter_names(&self) -> &BlockLedger {
        &self.parameter_names
    }

    /// Number of optimized positions.
    #[must_use]
    pub fn nb_q(&self) -> usize {
        self.nb_q
    }

    /// Number of optimized velocities.
    #[must_use]
    pub fn nb_qdot(&self) -> usize {
        self.nb_qdot
    }

    /// Number of optimized generalized forces.
    #[must_use]
    pub fn nb_tau(&self) -> usize {
        self.nb_tau
    }

    /// Number of muscles.
    #[must_use]
    pub fn nb_muscles(&self) -> usize {
        self.nb_muscles
    }

    /// Number of torque actuators (torque-activation variants only).
    #[must_use]
    pub fn nb_actuators(&self) -> usize {
        self.nb_actuators
    }

    /// State dimension.
    #[must_use]
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Control dimension.
    #[must_use]
    pub fn nu(&self) -> usize {
        self.nu
    }

    /// Parameter dimension.
    #[must_use]
    pub fn np(&self) -> usize {
        self.np
    }

    /// Muscle names, in model order.
    #[must_use]
    pub fn muscle_names(&self) -> &[String] {
        &self.muscle_names
    }

    /// Plot descriptors keyed by plot name.
    #[must_use]
    pub fn plots(&self) -> &IndexMap<String, CustomPlot> {
        &self.plots
    }

    /// Compiled `ForwardDyn: (x, u, p) -> xdot`.
    #[must_use]
    pub fn dynamics_func(&self) -> Option<&Function> {
        self.dynamics_func.as_ref()
    }

    /// Compiled `contact_forces_func: (x, u, p) -> contact_forces`.
    #[must_use]
    pub fn contact_forces_func(&self) -> Option<&Function> {
        self.contact_forces_func.as_ref()
    }

    /// Columns of the merged contact list this phase's contacts occupy,
    /// in merged-list order.
    #[must_use]
    pub fn contact_mapping(&self) -> Option<&IndexMapping> {
        self.contact_mapping.as_ref()
    }

    /// Split a state trajectory (`nx x n_nodes`) into its named blocks.
    pub fn split_states(&self, states: &DMatrix<f64>) -> Result<IndexMap<String, DMatrix<f64>>> {
        split(&self.var_states, states)
    }

    /// Split a control trajectory (`nu x n_nodes`) into its named blocks.
    pub fn split_controls(
        &self,
        controls: &DMatrix<f64>,
    ) -> Result<IndexMap<String, DMatrix<f64>>> {
        split(&self.var_controls, controls)
    }

    fn sync_sizes(&mut self) {
        self.nx = self.x.len();
        self.nu = self.u.len();
    }

    fn slice_bounds(bounds: Option<&Bounds>, range: Range<usize>) -> Result<Option<Bounds>> {
        bounds.map(|b| b.slice(range)).transpose().map_err(OcpError::from)
    }

    /// Reduced-space DOF names picked by `mapping`.
    fn dof_names(&self, mapping: &BidirectionalMapping) -> Result<Vec<String>> {
        let names = self.model.dof_names();
        mapping
            .reduce
            .source_indices()
            .map(|i| {
                names.get(i).cloned().ok_or_else(|| {
                    OcpError::invalid_config(format!(
                        "model declares {} dof names, mapping refers to {i}",
                        names.len()
                    ))
                })
            })
            .collect()
    }
}

fn split(ledger: &BlockLedger, matrix: &DMatrix<f64>) -> Result<IndexMap<String, DMatrix<f64>>> {
    if matrix.nrows() != ledger.total() {
        return Err(OcpError::ShapeMismatch {
            function: format!("{} trajectory", ledger.label()),
            expected: ledger.total(),
            actual: matrix.nrows(),
        });
    }
    Ok(ledger
        .ranges()
        .map(|(key, range)| {
            (
                key.to_string(),
                matrix.rows(range.start, range.len()).into_owned(),
            )
        })
        .collect())
}

impl fmt::Debug for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Phase")
            .field("index", &self.index)
            .field("dynamics", &self.dynamics)
            .field("var_states", &self.var_states)
            .field("var_controls", &self.var_controls)
            .field("nx", &self.nx)
            .field("nu", &self.nu)
            .field("np", &self.np)
            .field("dynamics_func", &self.dynamics_func)
            .field("contact_forces_func", &self.contact_forces_func)
            .finish_non_exhaustive()
    }
}

/// Typestate builder for a [`Phase`].
pub struct PhaseBuilder<S> {
    phase: Phase,
    _state: PhantomData<S>,
}

impl<S> PhaseBuilder<S> {
    fn transition<T>(self) -> PhaseBuilder<T> {
        PhaseBuilder {
            phase: self.phase,
            _state: PhantomData,
        }
    }

    /// The phase being built.
    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }
}

impl<S> fmt::Debug for PhaseBuilder<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseBuilder")
            .field("phase", &self.phase)
            .field("state", &std::any::type_name::<S>())
            .finish()
    }
}

impl PhaseBuilder<Empty> {
    /// Start building phase `index` from its definition.
    ///
    /// Missing mappings default to the identity over the model's native
    /// counts.
    pub fn new(index: usize, definition: PhaseDefinition) -> Result<Self> {
        Ok(Self {
            phase: Phase::from_definition(index, definition)?,
            _state: PhantomData,
        })
    }

    /// Append the position and velocity state blocks.
    pub fn append_q_qdot(mut self) -> Result<PhaseBuilder<BlocksAppended>> {
        let p = &mut self.phase;
        let q_names = p.dof_names(&p.q_mapping)?;
        let q_dot_names = p.dof_names(&p.q_dot_mapping)?;
        let nb_q = p.q_mapping.reduced_len();
        let nb_qdot = p.q_dot_mapping.reduced_len();

        let q_bounds = Phase::slice_bounds(p.x_bounds.as_ref(), 0..nb_q)?;
        let q_dot_bounds = Phase::slice_bounds(p.x_bounds.as_ref(), nb_q..nb_q + nb_qdot)?;

        p.var_states.insert(Q, nb_q)?;
        p.var_states.insert(Q_DOT, nb_qdot)?;
        p.nb_q = nb_q;
        p.nb_qdot = nb_qdot;

        let q = SymVector::named(q_names.iter().map(|n| format!("Q_{n}")));
        let q_dot = SymVector::named(q_dot_names.iter().map(|n| format!("Qdot_{n}")));
        p.x.extend(&q);
        p.x.extend(&q_dot);
        p.sync_sizes();

        p.plots.insert(
            Q.to_string(),
            CustomPlot::new(PlotExtractor::States(0..nb_q), PlotType::Integrated)
                .with_legend(q_names.iter().map(|n| format!("q_{n}")).collect())
                .with_bounds(q_bounds),
        );
        p.plots.insert(
            Q_DOT.to_string(),
            CustomPlot::new(
                PlotExtractor::States(nb_q..nb_q + nb_qdot),
                PlotType::Integrated,
            )
            .with_legend(q_dot_names.iter().map(|n| format!("qdot_{n}")).collect())
            .with_bounds(q_dot_bounds),
        );

        debug!(phase = p.index, nb_q, nb_qdot, nx = p.nx, "appended q and q_dot states");
        Ok(self.transition())
    }
}

impl PhaseBuilder<BlocksAppended> {
    /// Append the generalized force control block.
    ///
    /// Must come before any other control block.
    pub fn append_tau(mut self) -> Result<Self> {
        let p = &mut self.phase;
        if p.var_controls.contains(TAU) {
            return Err(OcpError::DuplicateBlock {
                block: TAU.into(),
                ledger: "controls",
            });
        }
        if !p.var_controls.is_empty() {
            return Err(OcpError::block_order(
                TAU,
                "generalized forces must be the first control block",
            ));
        }

        let names = p.dof_names(&p.tau_mapping)?;
        let nb_tau = p.tau_mapping.reduced_len();
        let bounds = Phase::slice_bounds(p.u_bounds.as_ref(), 0..nb_tau)?;

        p.var_controls.insert(TAU, nb_tau)?;
        p.nb_tau = nb_tau;
        p.u.extend(&SymVector::named(names.iter().map(|n| format!("Tau_{n}"))));
        p.sync_sizes();

        p.plots.insert(
            TAU.to_string(),
            CustomPlot::new(PlotExtractor::Controls(0..nb_tau), PlotType::Step)
                .with_legend(names.iter().map(|n| format!("tau_{n}")).collect())
                .with_bounds(bounds),
        );

        debug!(phase = p.index, nb_tau, nu = p.nu, "appended tau controls");
        Ok(self)
    }

    /// Append the generalized force block as torque actuator activations.
    pub fn append_torque_activations(self) -> Result<Self> {
        let mut builder = self.append_tau()?;
        builder.phase.nb_actuators = builder.phase.nb_tau;
        Ok(builder)
    }

    /// Append the muscle blocks.
    ///
    /// Muscle controls go right after the generalized forces (offset
    /// `nb_tau`). With [`MuscleDrive::Excitation`], activations are also
    /// appended as states right after the velocities (offset
    /// `nb_q + nb_qdot`).
    pub fn append_muscles(mut self, drive: MuscleDrive) -> Result<Self> {
        let p = &mut self.phase;
        let nb_muscles = p.model.nb_muscles();
        if nb_muscles == 0 {
            return Err(OcpError::NoMuscles {
                dynamics: p.dynamics.kind(),
            });
        }
        if p.var_controls.contains(MUSCLES) {
            return Err(OcpError::DuplicateBlock {
                block: MUSCLES.into(),
                ledger: "controls",
            });
        }
        if p.u.len() != p.nb_tau {
            return Err(OcpError::block_order(
                MUSCLES,
                "muscle controls must directly follow the generalized forces",
            ));
        }
        let nx_q = p.nb_q + p.nb_qdot;
        if drive == MuscleDrive::Excitation && p.x.len() != nx_q {
            return Err(OcpError::block_order(
                MUSCLES,
                "muscle states must directly follow the velocities",
            ));
        }

        let names = p.model.muscle_names().to_vec();
        if names.len() != nb_muscles {
            return Err(OcpError::invalid_config(format!(
                "model declares {nb_muscles} muscles but {} muscle names",
                names.len()
            )));
        }

        let mut combine = None;
        if drive == MuscleDrive::Excitation {
            let range = nx_q..nx_q + nb_muscles;
            let bounds = Phase::slice_bounds(p.x_bounds.as_ref(), range.clone())?;
            p.var_states.insert(MUSCLES, nb_muscles)?;
            p.x.extend(&SymVector::named(
                names.iter().map(|n| format!("Muscle_{n}_activation")),
            ));
            p.plots.insert(
                "muscles_states".to_string(),
                CustomPlot::new(PlotExtractor::States(range), PlotType::Integrated)
                    .with_legend(names.clone())
                    .with_ylim(0.0, 1.0)
                    .with_bounds(bounds),
            );
            combine = Some("muscles_states");
        }

        let range = p.nb_tau..p.nb_tau + nb_muscles;
        let bounds = Phase::slice_bounds(p.u_bounds.as_ref(), range.clone())?;
        p.var_controls.insert(MUSCLES, nb_muscles)?;
        p.u.extend(&SymVector::named(
            names.iter().map(|n| format!("Muscle_{n}_excitation")),
        ));
        let mut plot = CustomPlot::new(PlotExtractor::Controls(range), PlotType::Step)
            .with_legend(names.clone())
            .with_ylim(0.0, 1.0)
            .with_bounds(bounds);
        if let Some(key) = combine {
            plot = plot.with_combine_to(key);
        }
        p.plots.insert("muscles_control".to_string(), plot);

        p.nb_muscles = nb_muscles;
        p.muscle_names = names;
        p.sync_sizes();

        debug!(
            phase = p.index,
            nb_muscles,
            ?drive,
            nx = p.nx,
            nu = p.nu,
            "appended muscle blocks"
        );
        Ok(self)
    }

    fn check_custom_key(key: &str) -> Result<()> {
        if RESERVED.contains(&key) {
            return Err(OcpError::block_order(
                key,
                "reserved block key, use the dedicated append method",
            ));
        }
        Ok(())
    }

    /// Append a caller-defined state block after the built-in ones.
    pub fn append_custom_states(mut self, key: &str, block: &SymVector) -> Result<Self> {
        Self::check_custom_key(key)?;
        let p = &mut self.phase;
        p.var_states.insert(key, block.len())?;
        p.x.extend(block);
        p.sync_sizes();
        debug!(phase = p.index, key, size = block.len(), "appended custom states");
        Ok(self)
    }

    /// Append a caller-defined control block after the built-in ones.
    pub fn append_custom_controls(mut self, key: &str, block: &SymVector) -> Result<Self> {
        Self::check_custom_key(key)?;
        let p = &mut self.phase;
        p.var_controls.insert(key, block.len())?;
        p.u.extend(block);
        p.sync_sizes();
        debug!(phase = p.index, key, size = block.len(), "appended custom controls");
        Ok(self)
    }

    /// Compile `ForwardDyn: (x, u, p) -> xdot` from `recipe`.
    ///
    /// Can be called again while the blocks are unchanged; every call
    /// produces a function with the same shapes. On error the phase keeps
    /// its previous parameters and function.
    pub fn build_dynamics_function(
        &mut self,
        recipe: &DynamicsFn,
        parameters: &Parameters,
    ) -> Result<()> {
        let p = &mut self.phase;
        p.sync_sizes();

        let mut parameter_names = BlockLedger::new("parameters");
        for param in parameters.iter() {
            parameter_names.insert(param.name(), param.size())?;
        }
        let p_sym = parameters.symbolic();
        let np = p_sym.len();

        let x = SymVector::sym("x", p.nx);
        let u = SymVector::sym("u", p.nu);
        let params = SymVector::sym("p", np);

        // The recipe sees the new parameter count; the phase is only updated
        // once the function compiles.
        let staged = Phase {
            p: p_sym.clone(),
            np,
            parameter_names: parameter_names.clone(),
            ..p.clone()
        };
        let xdot = recipe(&x, &u, &params, &staged)?.into_vector();
        if xdot.len() != p.nx {
            return Err(OcpError::ShapeMismatch {
                function: FORWARD_DYN.into(),
                expected: p.nx,
                actual: xdot.len(),
            });
        }

        let func = Function::new(
            FORWARD_DYN,
            [("x", x), ("u", u), ("p", params)],
            [("xdot", xdot)],
        )?
        .expand();
        debug!(phase = p.index, function = %func, "compiled forward dynamics");
        p.p = p_sym;
        p.np = np;
        p.parameter_names = parameter_names;
        p.dynamics_func = Some(func);
        Ok(())
    }

    /// Compile the dynamics and freeze the layout.
    pub fn bind_dynamics(
        mut self,
        recipe: &DynamicsFn,
        parameters: &Parameters,
    ) -> Result<PhaseBuilder<DynamicsBound>> {
        self.build_dynamics_function(recipe, parameters)?;
        Ok(self.transition())
    }
}

impl PhaseBuilder<DynamicsBound> {
    /// Compile `contact_forces_func: (x, u, p) -> contact_forces` and route
    /// each contact to its column of the merged contact list.
    pub fn bind_contacts(
        mut self,
        recipe: &ContactFn,
        contacts: &mut ContactNameRegistry,
    ) -> Result<Self> {
        let p = &mut self.phase;
        let nb_contacts = p.model.nb_contacts();

        let x = SymVector::sym("x", p.nx);
        let u = SymVector::sym("u", p.nu);
        let params = SymVector::sym("p", p.np);
        let forces = recipe(&x, &u, &params, p)?;
        if forces.len() != nb_contacts {
            return Err(OcpError::ShapeMismatch {
                function: CONTACT_FORCES_FUNC.into(),
                expected: nb_contacts,
                actual: forces.len(),
            });
        }

        let func = Function::new(
            CONTACT_FORCES_FUNC,
            [("x", x), ("u", u), ("p", params)],
            [("contact_forces", forces)],
        )?
        .expand();

        let mapping = match &p.contact_plot_mapping {
            Some(explicit) => {
                if explicit.len() != nb_contacts {
                    return Err(OcpError::contact_names(
                        p.index,
                        format!(
                            "explicit mapping has {} entries for {nb_contacts} contacts",
                            explicit.len()
                        ),
                    ));
                }
                contacts.register(p.index, p.model.contact_names())?;
                explicit.validate(contacts.len())?;
                explicit.clone()
            }
            None => contacts.column_mapping(p.index, p.model.contact_names())?,
        };

        p.plots.insert(
            "contact_forces".to_string(),
            CustomPlot::new(PlotExtractor::Function(func.clone()), PlotType::Plot)
                .with_legend(contacts.names().to_vec())
                .with_axes_idx(mapping.clone()),
        );
        debug!(phase = p.index, function = %func, nb_contacts, "compiled contact forces");
        p.contact_forces_func = Some(func);
        p.contact_mapping = Some(mapping);
        Ok(self)
    }

    /// The configured phase.
    #[must_use]
    pub fn finish(self) -> Phase {
        self.phase
    }
}
