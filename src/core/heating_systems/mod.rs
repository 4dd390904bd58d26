pub mod space_heater;
