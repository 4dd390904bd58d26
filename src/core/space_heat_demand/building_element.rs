use crate::core::material_properties::Material;
use crate::core::solvers::solve_tridiagonal;
use crate::core::units::STEFAN_BOLTZMANN;
use crate::errors::BemError;
use itertools::Itertools;
use nalgebra::DVector;
use std::fmt::{Display, Formatter};

// Crank-Nicolson weighting of new and previous node temperatures
const F_IMPLICIT: f64 = 0.5;
const F_EXPLICIT: f64 = 1. - F_IMPLICIT;

/// Largest Fourier number (diffusivity * timestep / thickness^2) accepted for
/// any layer before a conduction step is refused
pub const DEFAULT_MAX_FOURIER_NUMBER: f64 = 20.;

// Exposed surface convection correlation, h = A + B * wind speed, in W / (m2.K)
const H_CE_STILL_AIR: f64 = 5.8;
const H_CE_WIND_FACTOR: f64 = 3.7;

/// Albedo of vegetation covering horizontal elements
pub const VEG_ALBEDO: f64 = 0.25;
/// Fraction of absorbed solar radiation on vegetation released as latent heat
pub const GRASS_F_LAT: f64 = 0.4;

/// A single homogeneous layer of an element
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    thickness: f64, // m
    material: Material,
}

impl Layer {
    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Conductance across the layer, in W / (m2.K)
    fn conductance(&self) -> f64 {
        self.material.conductivity() / self.thickness
    }

    /// Areal heat capacity of the layer, in J / (m2.K)
    fn areal_heat_capacity(&self) -> f64 {
        self.material.volumetric_heat_capacity() * self.thickness
    }

    /// Timestep, in seconds, at which the layer reaches the given Fourier number
    fn timestep_for_fourier_number(&self, fourier_number: f64) -> f64 {
        fourier_number * self.thickness.powi(2) / self.material.diffusivity()
    }
}

/// Thermal boundary condition applied to one face of an element
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Boundary {
    /// Prescribed net heat flux into the face, in W / m2
    Flux(f64),
    /// Prescribed face temperature, in K
    Temperature(f64),
    /// Film coefficient (W / (m2.K)) to an air temperature (K), plus an
    /// additional flux absorbed at the face (W / m2)
    Convective { air_temp: f64, coeff: f64, gain: f64 },
}

/// A layered envelope assembly (wall, roof or floor).
///
/// Layers are ordered from the outside face to the inside face. Temperatures
/// are held at the layer interfaces, so there is one more node than layers:
/// node 0 is the outside surface and the last node the inside surface.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    albedo: f64,
    emissivity: f64,
    layers: Vec<Layer>,
    veg_coverage: f64,
    node_temps: Vec<f64>,
    horizontal: bool,
    name: String,
}

impl Element {
    /// Construct an Element
    ///
    /// Arguments:
    /// * `albedo` - solar reflectance of the outside surface
    /// * `emissivity` - long-wave emissivity of the outside surface
    /// * `thicknesses` - thickness of each layer, outside to inside, in m
    /// * `materials` - material of each layer, same order as `thicknesses`
    /// * `veg_coverage` - fraction of the outside surface covered by vegetation
    /// * `temp_init` - initial temperature of every node, in K
    /// * `horizontal` - true for roofs and floors
    /// * `name` - element name
    pub fn new(
        albedo: f64,
        emissivity: f64,
        thicknesses: Vec<f64>,
        materials: Vec<Material>,
        veg_coverage: f64,
        temp_init: f64,
        horizontal: bool,
        name: impl Into<String>,
    ) -> Result<Self, BemError> {
        let node_count = thicknesses.len() + 1;
        Self::with_node_temps(
            albedo,
            emissivity,
            thicknesses,
            materials,
            veg_coverage,
            vec![temp_init; node_count],
            horizontal,
            name,
        )
    }

    /// Construct an Element with an explicit temperature for every node, e.g.
    /// when restoring a persisted element mid-simulation
    pub fn with_node_temps(
        albedo: f64,
        emissivity: f64,
        thicknesses: Vec<f64>,
        materials: Vec<Material>,
        veg_coverage: f64,
        node_temps: Vec<f64>,
        horizontal: bool,
        name: impl Into<String>,
    ) -> Result<Self, BemError> {
        let name = name.into();
        let invalid = |reason: String| BemError::InvalidElement {
            name: name.clone(),
            reason,
        };

        if thicknesses.len() != materials.len() {
            return Err(invalid(format!(
                "thickness list has {} entries but material list has {}",
                thicknesses.len(),
                materials.len()
            )));
        }
        if thicknesses.is_empty() {
            return Err(invalid("at least one layer is required".to_string()));
        }
        if let Some((idx, thickness)) = thicknesses
            .iter()
            .find_position(|d| !(d.is_finite() && **d > 0.))
        {
            return Err(invalid(format!(
                "layer {idx} has non-positive thickness {thickness}"
            )));
        }
        if node_temps.len() != thicknesses.len() + 1 {
            return Err(invalid(format!(
                "{} node temperatures given for {} layers",
                node_temps.len(),
                thicknesses.len()
            )));
        }
        if node_temps.iter().any(|t| !(t.is_finite() && *t > 0.)) {
            return Err(invalid("node temperatures must be positive (K)".to_string()));
        }
        if !(0. ..=1.).contains(&albedo) {
            return Err(invalid(format!("albedo {albedo} outside [0, 1]")));
        }
        if !(emissivity > 0. && emissivity <= 1.) {
            return Err(invalid(format!("emissivity {emissivity} outside (0, 1]")));
        }
        if !(0. ..=1.).contains(&veg_coverage) {
            return Err(invalid(format!(
                "vegetation coverage {veg_coverage} outside [0, 1]"
            )));
        }

        let layers = thicknesses
            .into_iter()
            .zip(materials)
            .map(|(thickness, material)| Layer {
                thickness,
                material,
            })
            .collect();

        Ok(Self {
            albedo,
            emissivity,
            layers,
            veg_coverage,
            node_temps,
            horizontal,
            name,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn albedo(&self) -> f64 {
        self.albedo
    }

    pub fn emissivity(&self) -> f64 {
        self.emissivity
    }

    pub fn veg_coverage(&self) -> f64 {
        self.veg_coverage
    }

    pub fn horizontal(&self) -> bool {
        self.horizontal
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn node_temps(&self) -> &[f64] {
        &self.node_temps
    }

    pub fn layer_thickness(&self) -> Vec<f64> {
        self.layers.iter().map(Layer::thickness).collect()
    }

    pub fn layer_thermal_cond(&self) -> Vec<f64> {
        self.layers
            .iter()
            .map(|layer| layer.material.conductivity())
            .collect()
    }

    pub fn layer_vol_heat(&self) -> Vec<f64> {
        self.layers
            .iter()
            .map(|layer| layer.material.volumetric_heat_capacity())
            .collect()
    }

    pub fn outer_surface_temp(&self) -> f64 {
        self.node_temps[0]
    }

    pub fn inner_surface_temp(&self) -> f64 {
        self.node_temps[self.node_temps.len() - 1]
    }

    /// Surface-to-surface thermal conductance of the assembly, in W / (m2.K)
    pub fn u_value(&self) -> f64 {
        1. / self
            .layers
            .iter()
            .map(|layer| 1. / layer.conductance())
            .sum::<f64>()
    }

    /// Total areal heat capacity of the assembly, in J / (m2.K)
    pub fn areal_heat_capacity(&self) -> f64 {
        self.layers.iter().map(Layer::areal_heat_capacity).sum()
    }

    /// Heat stored in the assembly relative to a uniform reference temperature, in J / m2
    pub fn stored_heat(&self, temp_ref: f64) -> f64 {
        self.node_capacities()
            .iter()
            .zip(&self.node_temps)
            .map(|(cap, temp)| cap * (temp - temp_ref))
            .sum()
    }

    /// Largest timestep, in seconds, for which no layer exceeds the given Fourier number
    pub fn max_stable_timestep(&self, max_fourier_number: f64) -> f64 {
        self.layers
            .iter()
            .map(|layer| layer.timestep_for_fourier_number(max_fourier_number))
            .fold(f64::INFINITY, f64::min)
    }

    /// Check that a timestep keeps every layer within the Fourier number limit
    pub fn check_timestep(&self, dt: f64, max_fourier_number: f64) -> Result<(), BemError> {
        if !(dt.is_finite() && dt > 0.) {
            return Err(BemError::UnstableTimestep {
                name: self.name.clone(),
                layer: 0,
                dt,
                limit: self.max_stable_timestep(max_fourier_number),
            });
        }
        for (idx, layer) in self.layers.iter().enumerate() {
            let limit = layer.timestep_for_fourier_number(max_fourier_number);
            if dt > limit {
                return Err(BemError::UnstableTimestep {
                    name: self.name.clone(),
                    layer: idx,
                    dt,
                    limit,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn set_albedo(&mut self, albedo: f64) -> Result<(), BemError> {
        if !(0. ..=1.).contains(&albedo) {
            return Err(BemError::InvalidElement {
                name: self.name.clone(),
                reason: format!("albedo {albedo} outside [0, 1]"),
            });
        }
        self.albedo = albedo;
        Ok(())
    }

    pub(crate) fn set_veg_coverage(&mut self, veg_coverage: f64) -> Result<(), BemError> {
        if !(0. ..=1.).contains(&veg_coverage) {
            return Err(BemError::InvalidElement {
                name: self.name.clone(),
                reason: format!("vegetation coverage {veg_coverage} outside [0, 1]"),
            });
        }
        self.veg_coverage = veg_coverage;
        Ok(())
    }

    /// Heat capacity lumped at each node: half of each adjacent layer, in J / (m2.K)
    fn node_capacities(&self) -> Vec<f64> {
        let mut capacities = vec![0.; self.node_temps.len()];
        for (idx, layer) in self.layers.iter().enumerate() {
            let half = 0.5 * layer.areal_heat_capacity();
            capacities[idx] += half;
            capacities[idx + 1] += half;
        }
        capacities
    }

    /// Build the outside boundary condition of an element exposed to outdoor air
    ///
    /// Arguments:
    /// * `air_temp` - temperature of the adjacent outdoor air, in K
    /// * `wind_speed` - wind speed near the surface, in m / s
    /// * `solar` - solar radiation incident on the surface, in W / m2
    /// * `longwave_in` - incoming long-wave radiation at the surface, in W / m2
    /// * `vegetation_active` - whether vegetation on horizontal surfaces is in leaf
    pub fn surface_flux(
        &self,
        air_temp: f64,
        wind_speed: f64,
        solar: f64,
        longwave_in: f64,
        vegetation_active: bool,
    ) -> Boundary {
        let coeff = H_CE_STILL_AIR + H_CE_WIND_FACTOR * wind_speed.max(0.);

        let (solar_absorbed, vegetation_latent) = if self.horizontal && vegetation_active {
            let veg_absorbed = self.veg_coverage * (1. - VEG_ALBEDO) * solar;
            (
                (1. - self.veg_coverage) * (1. - self.albedo) * solar + veg_absorbed,
                GRASS_F_LAT * veg_absorbed,
            )
        } else {
            ((1. - self.albedo) * solar, 0.)
        };

        let longwave_net =
            self.emissivity * (longwave_in - STEFAN_BOLTZMANN * self.outer_surface_temp().powi(4));

        Boundary::Convective {
            air_temp,
            coeff,
            gain: solar_absorbed + longwave_net - vegetation_latent,
        }
    }

    /// Advance the node temperatures by one timestep of 1-D transient conduction
    ///
    /// Returns the mean heat flux into the element over the timestep through
    /// the outside and inside faces respectively, in W / m2.
    ///
    /// Arguments:
    /// * `outside` - boundary condition at the outside face (node 0)
    /// * `inside` - boundary condition at the inside face (last node)
    /// * `dt` - timestep, in seconds
    pub fn compute_flux(
        &mut self,
        outside: Boundary,
        inside: Boundary,
        dt: f64,
    ) -> Result<(f64, f64), BemError> {
        self.compute_flux_with_limit(outside, inside, dt, DEFAULT_MAX_FOURIER_NUMBER)
    }

    /// As `compute_flux`, with an explicit limit on the layer Fourier number
    pub fn compute_flux_with_limit(
        &mut self,
        outside: Boundary,
        inside: Boundary,
        dt: f64,
        max_fourier_number: f64,
    ) -> Result<(f64, f64), BemError> {
        self.check_timestep(dt, max_fourier_number)?;

        let n = self.node_temps.len();
        let last = n - 1;
        let temp_prev = &self.node_temps;
        let capacities = self.node_capacities();
        let conductances = self
            .layers
            .iter()
            .map(Layer::conductance)
            .collect::<Vec<_>>();

        let mut lower = DVector::<f64>::zeros(n);
        let mut diag = DVector::<f64>::zeros(n);
        let mut upper = DVector::<f64>::zeros(n);
        let mut rhs = DVector::<f64>::zeros(n);

        // Node heat balances: storage plus conduction to neighbouring nodes,
        // with conduction terms split between new and previous temperatures
        for idx in 0..n {
            diag[idx] = capacities[idx] / dt;
            rhs[idx] = capacities[idx] / dt * temp_prev[idx];
            if idx > 0 {
                let g = conductances[idx - 1];
                lower[idx] = -F_IMPLICIT * g;
                diag[idx] += F_IMPLICIT * g;
                rhs[idx] += F_EXPLICIT * g * (temp_prev[idx - 1] - temp_prev[idx]);
            }
            if idx < last {
                let g = conductances[idx];
                upper[idx] = -F_IMPLICIT * g;
                diag[idx] += F_IMPLICIT * g;
                rhs[idx] += F_EXPLICIT * g * (temp_prev[idx + 1] - temp_prev[idx]);
            }
        }

        for (idx, boundary) in [(0, outside), (last, inside)] {
            match boundary {
                Boundary::Flux(flux) => rhs[idx] += flux,
                Boundary::Convective {
                    air_temp,
                    coeff,
                    gain,
                } => {
                    diag[idx] += F_IMPLICIT * coeff;
                    rhs[idx] += coeff * (air_temp - F_EXPLICIT * temp_prev[idx]) + gain;
                }
                Boundary::Temperature(temp) => {
                    lower[idx] = 0.;
                    upper[idx] = 0.;
                    diag[idx] = 1.;
                    rhs[idx] = temp;
                }
            }
        }

        let temps = solve_tridiagonal(&lower, &diag, &upper, &rhs)
            .ok_or_else(|| BemError::SingularSystem(self.name.clone()))?;

        // Face fluxes follow from the heat balance of the surface nodes, so
        // that the change in stored heat equals the sum of both face fluxes
        let face_flux = |idx: usize, neighbour: usize, g: f64| {
            capacities[idx] / dt * (temps[idx] - temp_prev[idx])
                - F_IMPLICIT * g * (temps[neighbour] - temps[idx])
                - F_EXPLICIT * g * (temp_prev[neighbour] - temp_prev[idx])
        };
        let flux_outside = face_flux(0, 1, conductances[0]);
        let flux_inside = face_flux(last, last - 1, conductances[last - 1]);

        self.node_temps = temps.iter().copied().collect();

        Ok((flux_outside, flux_inside))
    }
}

impl Display for Element {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Element({}, albedo={}, emissivity={}, layers={}, veg_coverage={}, horizontal={})",
            self.name,
            self.albedo,
            self.emissivity,
            self.layers.len(),
            self.veg_coverage,
            self.horizontal
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
    fn concrete() -> Material {
        Material::new(1.311, 836.8 * 2240., "Concrete").unwrap()
    }

    #[fixture]
    fn gypsum() -> Material {
        Material::new(0.16, 830.0 * 784.9, "Gypsum").unwrap()
    }

    #[fixture]
    fn stucco() -> Material {
        Material::new(0.6918, 837.0 * 1858.0, "Stucco").unwrap()
    }

    #[fixture]
    fn mass_wall(concrete: Material, gypsum: Material, stucco: Material) -> Element {
        Element::new(
            0.08,
            0.92,
            vec![0.0254, 0.0508, 0.0508, 0.0508, 0.0508, 0.0127],
            vec![
                stucco,
                concrete.clone(),
                concrete.clone(),
                concrete.clone(),
                concrete,
                gypsum,
            ],
            0.,
            293.,
            false,
            "MassWall",
        )
        .unwrap()
    }

    #[rstest]
    fn should_have_one_more_node_than_layers(mass_wall: Element) {
        assert_eq!(mass_wall.layers().len(), 6);
        assert_eq!(mass_wall.node_temps().len(), 7);
        assert_eq!(mass_wall.layer_thermal_cond()[1], 1.311);
        assert_eq!(mass_wall.layer_thickness()[5], 0.0127);
    }

    #[rstest]
    fn should_reject_mismatched_layer_lists(concrete: Material) {
        let result = Element::new(
            0.2,
            0.9,
            vec![0.1, 0.1],
            vec![concrete],
            0.,
            293.,
            true,
            "Broken",
        );
        assert!(matches!(result, Err(BemError::InvalidElement { .. })));
    }

    #[rstest]
    fn should_reject_empty_and_non_positive_layers(concrete: Material) {
        assert!(Element::new(0.2, 0.9, vec![], vec![], 0., 293., true, "Empty").is_err());
        assert!(
            Element::new(0.2, 0.9, vec![0.], vec![concrete], 0., 293., true, "Zero").is_err()
        );
    }

    #[rstest]
    fn should_stay_at_equilibrium_with_matching_boundaries(mut mass_wall: Element) {
        let (q_out, q_in) = mass_wall
            .compute_flux(Boundary::Temperature(293.), Boundary::Temperature(293.), 300.)
            .unwrap();
        assert_relative_eq!(q_out, 0., epsilon = 1e-9);
        assert_relative_eq!(q_in, 0., epsilon = 1e-9);
        for temp in mass_wall.node_temps() {
            assert_relative_eq!(*temp, 293., epsilon = 1e-12);
        }
    }

    #[rstest]
    fn should_conserve_energy_over_a_step(mut mass_wall: Element) {
        let dt = 300.;
        let stored_before = mass_wall.stored_heat(293.);
        let (q_out, q_in) = mass_wall
            .compute_flux(
                Boundary::Convective {
                    air_temp: 305.,
                    coeff: 20.,
                    gain: 150.,
                },
                Boundary::Temperature(297.),
                dt,
            )
            .unwrap();
        let stored_after = mass_wall.stored_heat(293.);

        assert_relative_eq!(
            stored_after - stored_before,
            (q_out + q_in) * dt,
            max_relative = 1e-9
        );
        assert!(q_out > 0., "hot sunny outside should heat the wall");
        assert_eq!(mass_wall.inner_surface_temp(), 297.);
    }

    #[rstest]
    fn should_pass_prescribed_flux_through_unchanged(mut mass_wall: Element) {
        let (q_out, q_in) = mass_wall
            .compute_flux(Boundary::Flux(40.), Boundary::Flux(-10.), 300.)
            .unwrap();
        assert_relative_eq!(q_out, 40., max_relative = 1e-9);
        assert_relative_eq!(q_in, -10., max_relative = 1e-9);
        assert!(mass_wall.outer_surface_temp() > 293.);
    }

    #[rstest]
    fn should_approach_steady_state_conduction(concrete: Material) {
        let mut slab = Element::new(
            0.2,
            0.9,
            vec![0.054, 0.054],
            vec![concrete.clone(), concrete],
            0.,
            293.,
            true,
            "MassFloor",
        )
        .unwrap();
        let mut fluxes = (0., 0.);
        for _ in 0..2000 {
            fluxes = slab
                .compute_flux(Boundary::Temperature(303.), Boundary::Temperature(293.), 300.)
                .unwrap();
        }
        let expected = slab.u_value() * 10.;
        assert_relative_eq!(fluxes.0, expected, max_relative = 1e-6);
        assert_relative_eq!(fluxes.1, -expected, max_relative = 1e-6);
        assert_relative_eq!(slab.node_temps()[1], 298., max_relative = 1e-9);
    }

    #[rstest]
    fn should_refuse_timestep_beyond_stability_limit(mut mass_wall: Element) {
        let limit = mass_wall.max_stable_timestep(DEFAULT_MAX_FOURIER_NUMBER);
        let before = mass_wall.node_temps().to_vec();
        let result = mass_wall.compute_flux(
            Boundary::Temperature(310.),
            Boundary::Temperature(293.),
            limit * 1.01,
        );
        assert!(matches!(
            result,
            Err(BemError::UnstableTimestep { layer: 5, .. })
        ));
        assert_eq!(mass_wall.node_temps(), before.as_slice());
        assert!(mass_wall
            .compute_flux(Boundary::Flux(0.), Boundary::Flux(0.), 0.)
            .is_err());
    }

    #[rstest]
    fn should_build_surface_flux_with_vegetation(concrete: Material) {
        let roof = Element::new(
            0.2,
            0.93,
            vec![0.058],
            vec![concrete],
            0.5,
            293.,
            true,
            "Roof",
        )
        .unwrap();
        let Boundary::Convective {
            air_temp,
            coeff,
            gain,
        } = roof.surface_flux(290., 2., 500., 0., true)
        else {
            panic!("exposed boundary should be convective");
        };
        assert_eq!(air_temp, 290.);
        assert_relative_eq!(coeff, 5.8 + 3.7 * 2.);
        let absorbed = 0.5 * 0.8 * 500. + 0.5 * 0.75 * 500.;
        let latent = 0.4 * 0.5 * 0.75 * 500.;
        let emitted = 0.93 * STEFAN_BOLTZMANN * 293_f64.powi(4);
        assert_relative_eq!(gain, absorbed - latent - emitted, max_relative = 1e-12);
    }
}
