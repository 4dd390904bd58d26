use crate::errors::BemError;
use std::fmt::{Display, Formatter};

/// This module contains data on the physical properties of construction
/// materials, and of the air filling the conditioned space.

/// Specific heat capacity of dry air at constant pressure, in J / (kg.K)
pub const CP_AIR: f64 = 1004.0;
/// Latent heat of vaporisation of water, in J / kg
pub const LATENT_HEAT_VAPORISATION: f64 = 2.26e6;
/// Reference density of air used for fan volumetric flow sizing, in kg / m3
pub const AIR_DENSITY_REF: f64 = 1.2;

/// Thermal properties of a single construction layer material.
///
/// Immutable once constructed: elements hold their own copies, so a material
/// can be reused across several layers and elements.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    conductivity: f64,             // W / (m.K)
    volumetric_heat_capacity: f64, // J / (m3.K)
    name: String,
}

impl Material {
    /// Construct a Material
    ///
    /// Arguments:
    /// * `conductivity` - thermal conductivity, in W / (m.K)
    /// * `volumetric_heat_capacity` - specific heat capacity times density, in J / (m3.K)
    /// * `name` - material name
    pub fn new(
        conductivity: f64,
        volumetric_heat_capacity: f64,
        name: impl Into<String>,
    ) -> Result<Self, BemError> {
        let name = name.into();
        for (label, value) in [
            ("conductivity", conductivity),
            ("volumetric heat capacity", volumetric_heat_capacity),
        ] {
            if !(value.is_finite() && value > 0.) {
                return Err(BemError::InvalidMaterial {
                    name,
                    reason: format!("{label} must be positive and finite, got {value}"),
                });
            }
        }

        Ok(Self {
            conductivity,
            volumetric_heat_capacity,
            name,
        })
    }

    pub fn conductivity(&self) -> f64 {
        self.conductivity
    }

    pub fn volumetric_heat_capacity(&self) -> f64 {
        self.volumetric_heat_capacity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Thermal diffusivity, in m2 / s
    pub fn diffusivity(&self) -> f64 {
        self.conductivity / self.volumetric_heat_capacity
    }
}

impl Display for Material {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Material({}, k={} W/m.K, Cv={} J/m3.K)",
            self.name, self.conductivity, self.volumetric_heat_capacity
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    pub fn concrete() -> Material {
        Material::new(1.311, 836.8 * 2240., "Concrete").unwrap()
    }

    #[rstest]
    pub fn should_have_correct_conductivity(concrete: Material) {
        assert_eq!(concrete.conductivity(), 1.311, "incorrect conductivity returned");
    }

    #[rstest]
    pub fn should_have_correct_volumetric_heat_capacity(concrete: Material) {
        assert_relative_eq!(concrete.volumetric_heat_capacity(), 1_874_432.);
        assert_eq!(concrete.name(), "Concrete");
    }

    #[rstest]
    pub fn should_calculate_diffusivity(concrete: Material) {
        assert_relative_eq!(concrete.diffusivity(), 6.994116e-7, max_relative = 1e-6);
    }

    #[rstest]
    #[case(0., 1000.)]
    #[case(1., -5.)]
    #[case(f64::NAN, 1000.)]
    pub fn should_reject_non_physical_properties(#[case] k: f64, #[case] cv: f64) {
        assert!(matches!(
            Material::new(k, cv, "Bad"),
            Err(BemError::InvalidMaterial { .. })
        ));
    }
}
