//! Multi-fraction sediment transport: grain records, transport closures,
//! the erosion pass, bank-curvature detection and vegetation cover.

pub mod config;
pub mod erosion;
pub mod grain;
pub mod lateral;
pub mod transport;
pub mod vegetation;

pub use config::{GrainClass, LateralConfig, SedimentConfig, TransportLaw, VegetationConfig, MAX_CLASSES};
pub use erosion::{erode, CellTransfer, ErosionReport, MAX_EROSION_RETRIES, MAX_ERODE_MULT};
pub use grain::{median_diameter, GrainRecord, GrainStore, STRATA};
pub use lateral::update_bank_curvature;
pub use transport::{BedSurface, WATER_DENSITY};
pub use vegetation::{grow_grass, Vegetation};
