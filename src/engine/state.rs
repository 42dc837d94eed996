//! The simulation state aggregate.

use log::info;

use crate::config::ModelConfig;
use crate::drainage::drainage_area;
use crate::grid::{is_no_data, Grid, NO_DATA};
use crate::hydrology::{find_input_points, EdgeFlux, RunoffModel, WetMask};
use crate::io::{ModelInputs, RasterHeader};
use crate::sediment::{GrainStore, Vegetation};
use crate::timestep::TimestepController;

use super::EngineError;

/// Model clock. Times are in minutes of model time.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    pub cycle: f64,
    /// `cycle` at the start of the current tick.
    pub previous: f64,
    /// Ticks completed.
    pub counter: u64,
    /// Run ends once `cycle` reaches this.
    pub end: f64,
}

/// Water balance of the latest tick.
#[derive(Debug, Clone, Default)]
pub struct WaterBudget {
    /// Rainfall added (m^3/s).
    pub water_input: f64,
    /// Water leaving the domain edges (m^3/s).
    pub water_out: f64,
    /// Deepest wetted cell after the last depth update (m).
    pub max_depth: f64,
    /// Hydraulic step applied in the latest tick (s).
    pub flow_dt: f64,
}

/// Sediment that has left the domain since the start of the run (m^3).
#[derive(Debug, Clone, Default)]
pub struct SedimentYield {
    pub total: f64,
    pub per_class: Vec<f64>,
}

/// Iteration and model-time triggers of the periodic processes.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub erode_call: u64,
    pub erode_mult: u32,
    pub lateral_counter: u64,
    pub creep_time: f64,
    pub soil_erosion_time: f64,
    pub soil_development_time: f64,
    pub daily_time: f64,
    pub save_time: f64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            erode_call: 0,
            erode_mult: 1,
            lateral_counter: 0,
            creep_time: 0.0,
            soil_erosion_time: 0.0,
            soil_development_time: 0.0,
            daily_time: 0.0,
            save_time: 0.0,
        }
    }
}

/// Every field the components of a tick read and write.
#[derive(Debug, Clone)]
pub struct SimulationState {
    pub header: RasterHeader,
    /// Cell width (m).
    pub dx: f64,
    /// Number of interior data cells.
    pub data_cells: usize,

    pub elev: Grid<f64>,
    pub bedrock: Grid<f64>,
    pub init_elev: Grid<f64>,
    pub water_depth: Grid<f64>,
    /// Suspended sediment volume per unit area (m).
    pub vsusp: Grid<f64>,
    pub flux: Grid<EdgeFlux>,
    /// Flow velocity used for shear stress (m/s).
    pub vel: Grid<f64>,
    /// Bed shear stress (Pa).
    pub tau: Grid<f64>,
    /// Contributing area (cells).
    pub area: Grid<f64>,
    /// Bank-curvature value used by lateral erosion.
    pub edge: Grid<f64>,
    pub veg: Grid<Vegetation>,
    /// 0-based rain zone of every cell.
    pub rain_zone: Grid<usize>,
    pub input_point: Grid<bool>,

    pub grains: GrainStore,
    pub wet: WetMask,

    pub clock: Clock,
    pub timestep: TimestepController,
    pub runoff: RunoffModel,
    pub budget: WaterBudget,
    pub sediment_out: SedimentYield,
    pub schedule: Schedule,
}

impl SimulationState {
    /// Allocates every grid, seeds drainage area, input points and the wetted mask.
    pub fn new(config: &ModelConfig, inputs: &ModelInputs) -> Result<Self, EngineError> {
        let elev = inputs.elevation.clone();
        let rows = elev.rows();
        let cols = elev.cols();
        let dx = inputs.header.cellsize;
        if dx <= 0.0 {
            return Err(EngineError::Config(format!("cell size must be positive, got {}", dx)));
        }

        let data_cells = elev.cells().filter(|&(r, c)| !is_no_data(elev.get(r, c))).count();
        if data_cells == 0 {
            return Err(EngineError::Config("DEM holds no data cells".to_string()));
        }
        let has_outlet = elev
            .cells()
            .any(|(r, c)| elev.is_domain_edge(r, c) && !is_no_data(elev.get(r, c)));
        if !has_outlet {
            return Err(EngineError::NoOutlet);
        }

        let bedrock = match &inputs.bedrock {
            Some(b) if b.same_shape(&elev) => b.clone(),
            Some(_) => {
                return Err(EngineError::Config(
                    "bedrock raster does not match the DEM extent".to_string(),
                ))
            }
            None => Grid::new(rows, cols, NO_DATA),
        };

        let zones = config.hydrology.zone_count();
        let mut rain_zone = Grid::new(rows, cols, 0usize);
        if let Some(z) = &inputs.rain_zones {
            if !z.same_shape(&elev) {
                return Err(EngineError::Config(
                    "hydro-index raster does not match the DEM extent".to_string(),
                ));
            }
            for (r, c) in elev.cells() {
                let v = z.get(r, c);
                if is_no_data(v) || v < 1.0 {
                    continue;
                }
                let zone = (v as usize - 1).min(zones - 1);
                rain_zone.set(r, c, zone);
            }
        }

        let mut runoff = RunoffModel::new(zones, &config.hydrology);
        for (r, c) in elev.cells() {
            if !is_no_data(elev.get(r, c)) {
                runoff.zones[rain_zone.get(r, c)].cells += 1;
            }
        }

        let area = drainage_area(&elev);
        let mut input_point = Grid::new(rows, cols, false);
        find_input_points(&area, &elev, &rain_zone, &mut runoff, &mut input_point, dx, &config.hydrology);

        let water_depth = Grid::new(rows, cols, 0.0);
        let wet = WetMask::scan(&water_depth, &elev);
        let timestep = TimestepController::new(&config.time, config.hydrology.rain_data_time_step);

        let mut schedule = Schedule::default();
        schedule.save_time = config.io.raster_output_interval;

        info!(
            "state initialised: {} x {} grid, {} data cells, {} rain zone(s)",
            rows, cols, data_cells, zones
        );

        Ok(Self {
            header: inputs.header,
            dx,
            data_cells,
            init_elev: elev.clone(),
            bedrock,
            water_depth,
            vsusp: Grid::new(rows, cols, 0.0),
            flux: Grid::new(rows, cols, EdgeFlux::default()),
            vel: Grid::new(rows, cols, 0.0),
            tau: Grid::new(rows, cols, 0.0),
            area,
            edge: Grid::new(rows, cols, 0.0),
            veg: Grid::new(rows, cols, Vegetation::default()),
            rain_zone,
            input_point,
            grains: GrainStore::new(rows, cols, &config.sediment),
            wet,
            clock: Clock {
                end: config.time.max_run_duration * 60.0,
                ..Default::default()
            },
            timestep,
            runoff,
            budget: WaterBudget::default(),
            sediment_out: SedimentYield {
                total: 0.0,
                per_class: vec![0.0; config.sediment.class_count()],
            },
            schedule,
            elev,
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.elev.rows()
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.elev.cols()
    }

    /// True for interior cells holding data.
    #[inline]
    pub fn is_data(&self, row: usize, col: usize) -> bool {
        !is_no_data(self.elev.get(row, col))
    }

    /// Depth of water stored on the grid (m^3).
    pub fn water_volume(&self) -> f64 {
        self.water_depth.sum() * self.dx * self.dx
    }

    /// Recomputes drainage area and the rainfall input points from the current surface.
    pub fn refresh_drainage(&mut self, config: &ModelConfig) {
        self.area = drainage_area(&self.elev);
        find_input_points(
            &self.area,
            &self.elev,
            &self.rain_zone,
            &mut self.runoff,
            &mut self.input_point,
            self.dx,
            &config.hydrology,
        );
    }

    /// Elevation lowered since the start of the run.
    pub fn elevation_change(&self) -> Grid<f64> {
        let mut diff = Grid::new(self.rows(), self.cols(), NO_DATA);
        for (r, c) in self.elev.cells() {
            if self.is_data(r, c) {
                diff.set(r, c, self.init_elev.get(r, c) - self.elev.get(r, c));
            }
        }
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::RainfallSeries;

    fn inputs(elev: Grid<f64>) -> ModelInputs {
        let header = RasterHeader::new(elev.rows(), elev.cols(), 10.0);
        ModelInputs::from_dem(header, elev, RainfallSeries::uniform(1, 0.0))
    }

    fn slope(rows: usize, cols: usize) -> Grid<f64> {
        let mut g = Grid::new(rows, cols, NO_DATA);
        for (r, c) in g.cells().collect::<Vec<_>>() {
            g.set(r, c, 50.0 - r as f64);
        }
        g
    }

    #[test]
    fn test_new_state_counts_cells_and_zones() {
        let state = SimulationState::new(&ModelConfig::default(), &inputs(slope(5, 4))).unwrap();
        assert_eq!(state.data_cells, 20);
        assert_eq!(state.runoff.zones[0].cells, 20);
        assert_eq!(state.dx, 10.0);
        assert_eq!(state.bedrock.get(2, 2), NO_DATA);
        assert!(state.area.get(5, 1) > state.area.get(1, 1));
    }

    #[test]
    fn test_dem_without_edge_data_is_rejected() {
        let mut elev = Grid::new(4, 4, NO_DATA);
        elev.set(2, 2, 5.0);
        elev.set(3, 3, 4.0);
        let err = SimulationState::new(&ModelConfig::default(), &inputs(elev)).unwrap_err();
        assert!(matches!(err, EngineError::NoOutlet));
    }

    #[test]
    fn test_elevation_change_starts_at_zero() {
        let state = SimulationState::new(&ModelConfig::default(), &inputs(slope(3, 3))).unwrap();
        let diff = state.elevation_change();
        assert_eq!(diff.sum(), 0.0);
    }
}
