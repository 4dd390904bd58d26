pub mod cooling_systems;
pub mod heating_systems;
pub mod material_properties;
pub mod psychrometrics;
pub(crate) mod solvers;
pub mod space_heat_demand;
pub mod units;
