//! Tick stages and the pipeline that runs them in order.

use crate::config::ModelConfig;
use crate::hillslope::{self, HillslopeReport, DAY};
use crate::hydrology::{apply_runoff, edge_outflow, evaporate, refresh_wet_mask, route, update_depth};
use crate::io::RainfallSeries;
use crate::sediment::{erode, update_bank_curvature, ErosionReport};

use super::{EngineError, SimulationState};

/// Iterations between wetted-area rescans.
pub const SCAN_EVERY: u64 = 5;
/// Bank curvature is refreshed every this many erosion multipliers' worth of iterations.
pub const LATERAL_EVERY: u64 = 50;

/// Unique identifier for tick stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    /// Rainfall and runoff input.
    Runoff,
    /// Edge discharge update.
    Routing,
    /// Water depth and suspended-load update.
    Depth,
    /// Wetted-area rescan.
    Scan,
    /// Entrainment, transport and deposition.
    Erosion,
    /// Bank-curvature refresh for lateral erosion.
    Lateral,
    /// Creep, soil erosion, landslides and soil production.
    Hillslope,
    /// Evaporation, the global landslide sweep and grass growth.
    Daily,
    /// Water leaving over the domain edges.
    Outflow,
}

impl StageId {
    /// Returns the name of the stage.
    pub fn name(&self) -> &'static str {
        match self {
            StageId::Runoff => "runoff",
            StageId::Routing => "routing",
            StageId::Depth => "depth",
            StageId::Scan => "scan",
            StageId::Erosion => "erosion",
            StageId::Lateral => "lateral",
            StageId::Hillslope => "hillslope",
            StageId::Daily => "daily",
            StageId::Outflow => "outflow",
        }
    }
}

/// Everything a tick produces besides the state itself.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub counter: u64,
    /// Model time at the end of the tick (minutes).
    pub time_minutes: f64,
    /// Hydraulic step used (s).
    pub flow_dt: f64,
    /// CFL bound the step was checked against (s).
    pub cfl_dt: f64,
    /// Rainfall added (m^3/s).
    pub water_input: f64,
    /// Water leaving the domain (m^3/s).
    pub water_out: f64,
    pub max_depth: f64,
    pub erosion: Option<ErosionReport>,
    pub lateral_updated: bool,
    pub hillslope: HillslopeReport,
    /// Raster snapshots written this tick.
    pub saved_rasters: bool,
}

/// Read-only inputs shared by every stage of a tick.
pub struct TickContext<'a> {
    pub config: &'a ModelConfig,
    pub rainfall: &'a RainfallSeries,
}

/// One step of a tick.
///
/// Stages read and write the shared state in place and record what they did
/// in the tick report.
pub trait TickStage: Send + Sync {
    /// Returns the unique identifier for this stage.
    fn id(&self) -> StageId;

    /// Returns the stage IDs that must be executed before this stage.
    fn dependencies(&self) -> &[StageId] {
        &[]
    }

    /// Executes the stage, modifying the state in place.
    fn execute(
        &self,
        state: &mut SimulationState,
        ctx: &TickContext<'_>,
        report: &mut TickReport,
    ) -> Result<(), EngineError>;
}

/// Orchestrates the stages of a tick.
pub struct TickPipeline {
    stages: Vec<Box<dyn TickStage>>,
}

impl Default for TickPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl TickPipeline {
    /// Creates a new empty pipeline.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// The full tick in model order.
    pub fn standard() -> Self {
        let mut pipeline = Self::new();
        pipeline
            .add_stage(RunoffStage)
            .add_stage(RoutingStage)
            .add_stage(DepthStage)
            .add_stage(ScanStage)
            .add_stage(ErosionStage)
            .add_stage(LateralStage)
            .add_stage(HillslopeStage)
            .add_stage(DailyStage)
            .add_stage(OutflowStage);
        pipeline
    }

    /// Adds a stage to the pipeline.
    pub fn add_stage<S: TickStage + 'static>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Returns the number of stages in the pipeline.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Checks that every stage comes after the stages it depends on.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut completed: Vec<StageId> = Vec::new();
        for stage in &self.stages {
            for dep in stage.dependencies() {
                if !completed.contains(dep) {
                    return Err(EngineError::MissingDependency(
                        stage.id().name().to_string(),
                        dep.name().to_string(),
                    ));
                }
            }
            completed.push(stage.id());
        }
        Ok(())
    }

    /// Executes all stages in order.
    pub fn run(
        &self,
        state: &mut SimulationState,
        ctx: &TickContext<'_>,
        report: &mut TickReport,
    ) -> Result<(), EngineError> {
        for stage in &self.stages {
            stage.execute(state, ctx, report)?;
        }
        Ok(())
    }
}

/// Adds rainfall runoff at the input points.
pub struct RunoffStage;

impl TickStage for RunoffStage {
    fn id(&self) -> StageId {
        StageId::Runoff
    }

    fn execute(&self, state: &mut SimulationState, ctx: &TickContext<'_>, report: &mut TickReport) -> Result<(), EngineError> {
        let dt = state.budget.flow_dt;
        let input = apply_runoff(state, ctx.config, ctx.rainfall, dt);
        state.budget.water_input = input;
        report.water_input = input;
        Ok(())
    }
}

/// Updates edge discharge from the water surface.
pub struct RoutingStage;

impl TickStage for RoutingStage {
    fn id(&self) -> StageId {
        StageId::Routing
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Runoff]
    }

    fn execute(&self, state: &mut SimulationState, ctx: &TickContext<'_>, _report: &mut TickReport) -> Result<(), EngineError> {
        let suspended = ctx.config.sediment.suspended_class().is_some();
        let dt = state.budget.flow_dt;
        route(state, &ctx.config.hydrology, suspended, dt);
        Ok(())
    }
}

/// Applies the discharge divergence to the water depth.
pub struct DepthStage;

impl TickStage for DepthStage {
    fn id(&self) -> StageId {
        StageId::Depth
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Routing]
    }

    fn execute(&self, state: &mut SimulationState, ctx: &TickContext<'_>, report: &mut TickReport) -> Result<(), EngineError> {
        let suspended = ctx.config.sediment.suspended_class().is_some();
        let dt = state.budget.flow_dt;
        update_depth(state, suspended, dt)?;
        report.max_depth = state.budget.max_depth;
        Ok(())
    }
}

/// Rescans the wetted area every few iterations.
pub struct ScanStage;

impl TickStage for ScanStage {
    fn id(&self) -> StageId {
        StageId::Scan
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Depth]
    }

    fn execute(&self, state: &mut SimulationState, _ctx: &TickContext<'_>, _report: &mut TickReport) -> Result<(), EngineError> {
        if state.clock.counter % SCAN_EVERY == 0 {
            refresh_wet_mask(state);
        }
        Ok(())
    }
}

/// Runs an erosion pass once its iteration trigger comes due.
pub struct ErosionStage;

impl TickStage for ErosionStage {
    fn id(&self) -> StageId {
        StageId::Erosion
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Depth]
    }

    fn execute(&self, state: &mut SimulationState, ctx: &TickContext<'_>, report: &mut TickReport) -> Result<(), EngineError> {
        if ctx.config.hydro_model_only || state.clock.counter < state.schedule.erode_call {
            return Ok(());
        }
        report.erosion = Some(erode(state, ctx.config)?);
        Ok(())
    }
}

/// Refreshes bank curvature on its own, slower schedule.
pub struct LateralStage;

impl TickStage for LateralStage {
    fn id(&self) -> StageId {
        StageId::Lateral
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Erosion]
    }

    fn execute(&self, state: &mut SimulationState, ctx: &TickContext<'_>, report: &mut TickReport) -> Result<(), EngineError> {
        let config = ctx.config;
        if config.hydro_model_only || !config.sediment.lateral.enabled {
            return Ok(());
        }
        let counter = state.clock.counter;
        if counter >= state.schedule.lateral_counter {
            update_bank_curvature(state, config);
            state.schedule.lateral_counter = counter + LATERAL_EVERY * u64::from(state.schedule.erode_mult);
            report.lateral_updated = true;
        }
        Ok(())
    }
}

/// Creep, soil erosion, local landslides and soil production.
pub struct HillslopeStage;

impl TickStage for HillslopeStage {
    fn id(&self) -> StageId {
        StageId::Hillslope
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Erosion]
    }

    fn execute(&self, state: &mut SimulationState, ctx: &TickContext<'_>, report: &mut TickReport) -> Result<(), EngineError> {
        if ctx.config.hydro_model_only {
            return Ok(());
        }
        report.hillslope = hillslope::relax(state, ctx.config);
        Ok(())
    }
}

/// Once-a-day evaporation, global landsliding and grass growth.
pub struct DailyStage;

impl TickStage for DailyStage {
    fn id(&self) -> StageId {
        StageId::Daily
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Depth]
    }

    fn execute(&self, state: &mut SimulationState, ctx: &TickContext<'_>, report: &mut TickReport) -> Result<(), EngineError> {
        if state.clock.cycle <= state.schedule.daily_time {
            return Ok(());
        }
        state.schedule.daily_time += DAY;
        let config = ctx.config;
        if config.hydrology.evaporation_rate > 0.0 {
            evaporate(state, config.hydrology.evaporation_rate, DAY, config.sediment.erosion_limit);
        }
        if !config.hydro_model_only {
            hillslope::daily(state, config, &mut report.hillslope);
        }
        Ok(())
    }
}

/// Drains water above the threshold from the domain edges.
pub struct OutflowStage;

impl TickStage for OutflowStage {
    fn id(&self) -> StageId {
        StageId::Outflow
    }

    fn dependencies(&self) -> &[StageId] {
        &[StageId::Depth]
    }

    fn execute(&self, state: &mut SimulationState, ctx: &TickContext<'_>, report: &mut TickReport) -> Result<(), EngineError> {
        let dt = state.budget.flow_dt;
        let out = edge_outflow(state, &ctx.config.hydrology, dt);
        state.budget.water_out = out;
        report.water_out = out;
        Ok(())
    }
}
