pub mod building;
pub mod building_element;
pub mod internal_gains;
pub mod ventilation;
