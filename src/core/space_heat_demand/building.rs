use crate::core::cooling_systems::air_conditioning::{cop_adjusted, AirConditioning, CondenserType};
use crate::core::heating_systems::space_heater::{HeatingSource, SpaceHeater};
use crate::core::material_properties::{AIR_DENSITY_REF, CP_AIR, LATENT_HEAT_VAPORISATION};
use crate::core::psychrometrics::{moist_air_density, relative_humidity, saturation_humidity_ratio};
use crate::core::space_heat_demand::building_element::Element;
use crate::core::space_heat_demand::internal_gains::InternalGains;
use crate::core::space_heat_demand::ventilation::AirExchange;
use crate::errors::BemError;
use crate::external_conditions::{BemForcing, DesignConditions, UrbanGeometry};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use strum_macros::Display as StrumDisplay;
use tracing::{debug, error, info, warn};

// Inside film coefficients, in W / (m2.K)
pub const H_IN_WALL: f64 = 3.076;
pub const H_IN_MASS: f64 = 3.076;
// Ceiling: heat flowing downwards from a warm ceiling is poorly convected
const H_IN_CEILING_DOWNWARD: f64 = 0.948;
const H_IN_CEILING_UPWARD: f64 = 4.040;

// Outside film used for steady-state design loads, in W / (m2.K)
const H_OUT_DESIGN_STILL_AIR: f64 = 5.8;
const H_OUT_DESIGN_WIND_FACTOR: f64 = 3.7;

pub const HEATING_SIZING_FACTOR: f64 = 1.2;
pub const COOLING_SIZING_FACTOR: f64 = 1.2;

// Indoor relative humidity held at the cooling design condition
const DESIGN_INDOOR_RHUM: f64 = 0.5;

// Supply air temperature of the air distribution system, in K (14 deg C)
const SUPPLY_AIR_TEMP: f64 = 287.15;

/// Humidity ratio of indoor air before the first step, in kg / kg
pub const INITIAL_INDOOR_HUM: f64 = 0.012;

// Physical bounds of indoor conditions; leaving them ends the simulation
const INDOOR_TEMP_MIN: f64 = 250.;
const INDOOR_TEMP_MAX: f64 = 350.;
const INDOOR_HUM_MIN: f64 = 0.;
const INDOOR_HUM_MAX: f64 = 0.1;

/// Inside film coefficient of the top floor ceiling, in W / (m2.K)
pub fn h_in_ceiling(ceiling_temp: f64, indoor_temp: f64) -> f64 {
    if ceiling_temp > indoor_temp {
        H_IN_CEILING_DOWNWARD
    } else {
        H_IN_CEILING_UPWARD
    }
}

/// Lifecycle of a building within a simulation
#[derive(Clone, Copy, Debug, PartialEq, Eq, StrumDisplay)]
pub enum BuildingPhase {
    /// Static parameters set, HVAC plant not sized yet
    Uninitialized,
    /// HVAC plant sized, ready to be stepped
    Sized,
    /// At least one timestep has been calculated
    Stepping,
    /// Indoor conditions left their physical bounds; no further steps possible
    Faulted,
}

/// Inner surface temperatures of the envelope seen by the indoor air, in K
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceTemps {
    pub wall: f64,
    pub roof: f64,
    pub mass: f64,
}

/// Mean heat flux into each envelope element over a timestep, in W per m2 of
/// element, through its outside and inside faces
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ElementFluxes {
    pub wall_outside: f64,
    pub wall_inside: f64,
    pub roof_outside: f64,
    pub roof_inside: f64,
    /// Flux into the internal mass through its exposed face
    pub mass_inside: f64,
}

/// Replacement static parameters for a custom archetype, applied before sizing
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct BuildingOverrides {
    pub floor_height: Option<f64>,
    pub canyon_fraction: Option<f64>,
    pub glazing_ratio: Option<f64>,
    pub shgc: Option<f64>,
    pub infil: Option<f64>,
    pub cool_cap: Option<f64>,
    pub heating_source: Option<HeatingSource>,
}

/// Dynamic state of a building after its latest timestep.
///
/// Demands, consumptions and fluxes are per m2 of floor area; waste heat is
/// per m2 of building footprint, as it is released to the canyon.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BuildingState {
    /// Indoor air temperature, in K
    pub indoor_temp: f64,
    /// Indoor humidity ratio, in kg / kg
    pub indoor_hum: f64,
    /// Indoor relative humidity, in %
    pub indoor_rhum: f64,
    /// Scheduled internal gain, in W / m2 of floor area
    pub int_heat: f64,
    pub n_floor: f64,
    pub sens_cool_demand: f64,
    pub sens_heat_demand: f64,
    pub cop_adj: f64,
    /// Latent load removed by the cooling coil
    pub dehum_demand: f64,
    pub cool_consump: f64,
    pub heat_consump: f64,
    pub sens_waste: f64,
    pub lat_waste: f64,
    pub sens_waste_canyon: f64,
    pub flux_mass: f64,
    pub flux_wall: f64,
    pub flux_roof: f64,
    pub flux_solar: f64,
    pub flux_window: f64,
    pub flux_interior: f64,
    pub flux_infil: f64,
    pub flux_vent: f64,
    /// Conduction into the wall through its outer face, in W / m2 of wall
    pub wall_flux_outside: f64,
    /// Conduction into the wall through its inner face, in W / m2 of wall
    pub wall_flux_inside: f64,
    pub roof_flux_outside: f64,
    pub roof_flux_inside: f64,
    /// Heat taken up by the internal mass, in W / m2 of mass surface
    pub mass_flux_inside: f64,
    /// Sum of the itemized fluxes at the thermostat target; positive is a
    /// cooling load
    pub net_sensible_load: f64,
    pub unmet_cool_load: f64,
    pub unmet_heat_load: f64,
    pub elec_total: f64,
    pub gas_total: f64,
    /// Cooling delivered (sensible plus dehumidification)
    pub q_hvac: f64,
    /// Heating delivered
    pub q_heat: f64,
}

impl BuildingState {
    fn initial(indoor_temp: f64) -> Self {
        Self {
            indoor_temp,
            indoor_hum: INITIAL_INDOOR_HUM,
            indoor_rhum: f64::NAN,
            n_floor: 1.,
            ..Default::default()
        }
    }
}

/// Sensible heat flows into the indoor air, in W per m2 of footprint, for an
/// indoor air temperature
#[derive(Clone, Copy, Debug)]
struct SensibleFluxes {
    wall: f64,
    mass: f64,
    roof: f64,
    window: f64,
    solar: f64,
    interior: f64,
    infil: f64,
    vent: f64,
}

impl SensibleFluxes {
    fn total(&self) -> f64 {
        self.wall
            + self.mass
            + self.roof
            + self.window
            + self.solar
            + self.interior
            + self.infil
            + self.vent
    }
}

/// Areas per m2 of building footprint
#[derive(Clone, Copy, Debug)]
struct EnvelopeAreas {
    n_floor: f64,
    wall: f64,
    window: f64,
    mass: f64,
    ceiling: f64,
}

impl EnvelopeAreas {
    fn new(floor_height: f64, glazing_ratio: f64, geometry: &UrbanGeometry) -> Self {
        let n_floor = (geometry.bld_height / floor_height).max(1.);
        let facade = geometry.facade_area_per_footprint();
        Self {
            n_floor,
            wall: facade * (1. - glazing_ratio),
            window: facade * glazing_ratio,
            mass: 2. * n_floor - 1.,
            ceiling: 1.,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Building {
    floor_height: f64,
    int_heat_night: f64,
    int_heat_day: f64,
    int_heat_f_rad: f64,
    int_heat_f_lat: f64,
    infil: f64,
    vent: f64,
    glazing_ratio: f64,
    u_value: f64,
    shgc: f64,
    cond_type: CondenserType,
    cop: f64,
    cool_setpoint_day: f64,
    cool_setpoint_night: f64,
    heat_setpoint_day: f64,
    heat_setpoint_night: f64,
    cool_cap: f64,
    heat_eff: f64,
    initial_temp: f64,
    canyon_fraction: f64,
    heating_source: HeatingSource,
    heat_cap: f64,
    m_sys: f64,
    fan_max: f64,
    state: BuildingState,
    phase: BuildingPhase,
    steps: usize,
}

impl Building {
    /// Construct a Building
    ///
    /// Arguments:
    /// * `floor_height` - floor to floor height, in m
    /// * `int_heat_night` - internal gain at night, in W / m2 of floor area
    /// * `int_heat_day` - internal gain during the day, in W / m2 of floor area
    /// * `int_heat_f_rad` - radiant fraction of the sensible internal gain
    /// * `int_heat_f_lat` - latent fraction of the internal gain
    /// * `infil` - infiltration rate, in air changes per hour
    /// * `vent` - ventilation rate, in m3 / s per m2 of floor area
    /// * `glazing_ratio` - window to facade area ratio
    /// * `u_value` - window U-value, in W / (m2.K)
    /// * `shgc` - window solar heat gain coefficient
    /// * `cond_type` - condenser type of the cooling plant
    /// * `cop` - rated COP of the cooling plant
    /// * `cool_setpoint_day`, `cool_setpoint_night` - cooling setpoints, in K
    /// * `heat_setpoint_day`, `heat_setpoint_night` - heating setpoints, in K
    /// * `cool_cap` - rated cooling capacity, in W / m2 of floor area
    /// * `heat_eff` - heating plant efficiency
    /// * `initial_temp` - indoor air temperature before the first step, in K
    pub fn new(
        floor_height: f64,
        int_heat_night: f64,
        int_heat_day: f64,
        int_heat_f_rad: f64,
        int_heat_f_lat: f64,
        infil: f64,
        vent: f64,
        glazing_ratio: f64,
        u_value: f64,
        shgc: f64,
        cond_type: CondenserType,
        cop: f64,
        cool_setpoint_day: f64,
        cool_setpoint_night: f64,
        heat_setpoint_day: f64,
        heat_setpoint_night: f64,
        cool_cap: f64,
        heat_eff: f64,
        initial_temp: f64,
    ) -> Result<Self, BemError> {
        let building = Self {
            floor_height,
            int_heat_night,
            int_heat_day,
            int_heat_f_rad,
            int_heat_f_lat,
            infil,
            vent,
            glazing_ratio,
            u_value,
            shgc,
            cond_type,
            cop,
            cool_setpoint_day,
            cool_setpoint_night,
            heat_setpoint_day,
            heat_setpoint_night,
            cool_cap,
            heat_eff,
            initial_temp,
            canyon_fraction: 1.,
            heating_source: HeatingSource::Fuel,
            heat_cap: 0.,
            m_sys: 0.,
            fan_max: 0.,
            state: BuildingState::initial(initial_temp),
            phase: BuildingPhase::Uninitialized,
            steps: 0,
        };
        building.validate()?;
        Ok(building)
    }

    fn validate(&self) -> Result<(), BemError> {
        let positive = [
            ("floor_height", self.floor_height),
            ("cop", self.cop),
            ("heat_eff", self.heat_eff),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.) {
                return Err(BemError::InvalidBuilding(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        let non_negative = [
            ("int_heat_night", self.int_heat_night),
            ("int_heat_day", self.int_heat_day),
            ("infil", self.infil),
            ("vent", self.vent),
            ("u_value", self.u_value),
            ("cool_cap", self.cool_cap),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.) {
                return Err(BemError::InvalidBuilding(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }

        let fractions = [
            ("int_heat_f_rad", self.int_heat_f_rad),
            ("int_heat_f_lat", self.int_heat_f_lat),
            ("glazing_ratio", self.glazing_ratio),
            ("shgc", self.shgc),
            ("canyon_fraction", self.canyon_fraction),
        ];
        for (name, value) in fractions {
            if !(0. ..=1.).contains(&value) {
                return Err(BemError::InvalidBuilding(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }

        if self.heat_setpoint_day > self.cool_setpoint_day
            || self.heat_setpoint_night > self.cool_setpoint_night
        {
            return Err(BemError::InvalidBuilding(
                "heating setpoints must not exceed cooling setpoints".to_string(),
            ));
        }
        if !(INDOOR_TEMP_MIN..=INDOOR_TEMP_MAX).contains(&self.initial_temp) {
            return Err(BemError::InvalidBuilding(format!(
                "initial temperature {}K is outside the habitable range",
                self.initial_temp
            )));
        }
        Ok(())
    }

    pub fn floor_height(&self) -> f64 {
        self.floor_height
    }

    pub fn int_heat_night(&self) -> f64 {
        self.int_heat_night
    }

    pub fn int_heat_day(&self) -> f64 {
        self.int_heat_day
    }

    pub fn int_heat_f_rad(&self) -> f64 {
        self.int_heat_f_rad
    }

    pub fn int_heat_f_lat(&self) -> f64 {
        self.int_heat_f_lat
    }

    pub fn infil(&self) -> f64 {
        self.infil
    }

    pub fn vent(&self) -> f64 {
        self.vent
    }

    pub fn glazing_ratio(&self) -> f64 {
        self.glazing_ratio
    }

    pub fn u_value(&self) -> f64 {
        self.u_value
    }

    pub fn shgc(&self) -> f64 {
        self.shgc
    }

    pub fn cond_type(&self) -> CondenserType {
        self.cond_type
    }

    pub fn cop(&self) -> f64 {
        self.cop
    }

    pub fn cool_setpoint_day(&self) -> f64 {
        self.cool_setpoint_day
    }

    pub fn cool_setpoint_night(&self) -> f64 {
        self.cool_setpoint_night
    }

    pub fn heat_setpoint_day(&self) -> f64 {
        self.heat_setpoint_day
    }

    pub fn heat_setpoint_night(&self) -> f64 {
        self.heat_setpoint_night
    }

    pub fn cool_cap(&self) -> f64 {
        self.cool_cap
    }

    pub fn heat_eff(&self) -> f64 {
        self.heat_eff
    }

    pub fn initial_temp(&self) -> f64 {
        self.initial_temp
    }

    pub fn canyon_fraction(&self) -> f64 {
        self.canyon_fraction
    }

    pub fn heating_source(&self) -> HeatingSource {
        self.heating_source
    }

    pub fn heat_cap(&self) -> f64 {
        self.heat_cap
    }

    pub fn m_sys(&self) -> f64 {
        self.m_sys
    }

    pub fn fan_max(&self) -> f64 {
        self.fan_max
    }

    pub fn state(&self) -> &BuildingState {
        &self.state
    }

    pub fn phase(&self) -> BuildingPhase {
        self.phase
    }

    /// Number of timesteps calculated so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    fn internal_gains(&self) -> InternalGains {
        InternalGains::new(
            self.int_heat_day,
            self.int_heat_night,
            self.int_heat_f_rad,
            self.int_heat_f_lat,
        )
    }

    fn areas(&self, geometry: &UrbanGeometry) -> EnvelopeAreas {
        EnvelopeAreas::new(self.floor_height, self.glazing_ratio, geometry)
    }

    fn setpoints(&self, is_night: bool) -> (f64, f64) {
        if is_night {
            (self.cool_setpoint_night, self.heat_setpoint_night)
        } else {
            (self.cool_setpoint_day, self.heat_setpoint_day)
        }
    }

    /// Replace static parameters of a custom archetype
    ///
    /// Only possible before the HVAC plant is sized, so sizing always sees
    /// the final parameters.
    pub fn apply_overrides(&mut self, overrides: &BuildingOverrides) -> Result<(), BemError> {
        if self.phase != BuildingPhase::Uninitialized {
            return Err(BemError::AlreadySized);
        }
        let mut updated = self.clone();
        if let Some(floor_height) = overrides.floor_height {
            updated.floor_height = floor_height;
        }
        if let Some(canyon_fraction) = overrides.canyon_fraction {
            updated.canyon_fraction = canyon_fraction;
        }
        if let Some(glazing_ratio) = overrides.glazing_ratio {
            updated.glazing_ratio = glazing_ratio;
        }
        if let Some(shgc) = overrides.shgc {
            updated.shgc = shgc;
        }
        if let Some(infil) = overrides.infil {
            updated.infil = infil;
        }
        if let Some(cool_cap) = overrides.cool_cap {
            updated.cool_cap = cool_cap;
        }
        if let Some(heating_source) = overrides.heating_source {
            updated.heating_source = heating_source;
        }
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Restore sized values and indoor conditions of a persisted building.
    /// The building stays Uninitialized until it is sized again.
    pub(crate) fn restore(
        &mut self,
        heat_cap: f64,
        m_sys: f64,
        fan_max: f64,
        indoor_temp: f64,
        indoor_hum: f64,
    ) -> Result<(), BemError> {
        if !(INDOOR_TEMP_MIN..=INDOOR_TEMP_MAX).contains(&indoor_temp)
            || !(INDOOR_HUM_MIN..=INDOOR_HUM_MAX).contains(&indoor_hum)
        {
            return Err(BemError::InvalidBuilding(format!(
                "restored indoor conditions out of bounds (temperature {indoor_temp}K, \
                 humidity ratio {indoor_hum}kg/kg)"
            )));
        }
        for (name, value) in [("heat_cap", heat_cap), ("m_sys", m_sys), ("fan_max", fan_max)] {
            if !(value.is_finite() && value >= 0.) {
                return Err(BemError::InvalidBuilding(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        self.heat_cap = heat_cap;
        self.m_sys = m_sys;
        self.fan_max = fan_max;
        self.state.indoor_temp = indoor_temp;
        self.state.indoor_hum = indoor_hum;
        Ok(())
    }

    /// Size the HVAC plant from steady-state design loads
    ///
    /// Arguments:
    /// * `design` - design-day outdoor conditions
    /// * `geometry` - urban form, setting the envelope areas
    /// * `wall` - wall construction
    /// * `roof` - roof construction
    pub fn autosize(
        &mut self,
        design: &DesignConditions,
        geometry: &UrbanGeometry,
        wall: &Element,
        roof: &Element,
    ) -> Result<(), BemError> {
        if !matches!(
            self.phase,
            BuildingPhase::Uninitialized | BuildingPhase::Sized
        ) {
            return Err(BemError::AlreadySized);
        }
        geometry.validate()?;

        let areas = self.areas(geometry);
        let h_out = H_OUT_DESIGN_STILL_AIR + H_OUT_DESIGN_WIND_FACTOR * design.wind_speed.max(0.);
        let overall_u = |element: &Element, h_in: f64| {
            1. / (1. / h_out + 1. / element.u_value() + 1. / h_in)
        };
        let ua_wall = overall_u(wall, H_IN_WALL) * areas.wall;
        let ua_roof = overall_u(roof, H_IN_CEILING_UPWARD) * areas.ceiling;
        let ua_window = self.u_value * areas.window;
        let air_exchange = AirExchange::new(
            self.infil,
            self.vent,
            areas.n_floor * self.floor_height,
            areas.n_floor,
        );

        let cool_indoor = self.cool_setpoint_day.min(self.cool_setpoint_night);
        let cool_density = moist_air_density(design.pressure, design.cooling_temp, design.humidity);
        let (h_infil, h_vent) = air_exchange.sensible_coefficients(cool_density);
        let indoor_design_hum = DESIGN_INDOOR_RHUM
            * saturation_humidity_ratio(cool_indoor, design.pressure)?;
        let (latent_infil, latent_vent) = air_exchange
            .latent_gains(cool_density, (design.humidity - indoor_design_hum).max(0.));
        let sol_air_wall = design.cooling_temp + (1. - wall.albedo()) * design.solar_wall / h_out;
        let sol_air_roof = design.cooling_temp + (1. - roof.albedo()) * design.solar_roof / h_out;
        let peak_cooling = ua_wall * (sol_air_wall - cool_indoor)
            + ua_roof * (sol_air_roof - cool_indoor)
            + (ua_window + h_infil + h_vent) * (design.cooling_temp - cool_indoor)
            + design.solar_wall * self.shgc * areas.window
            + self.int_heat_day * areas.n_floor
            + latent_infil
            + latent_vent;

        let heat_indoor = self.heat_setpoint_day.max(self.heat_setpoint_night);
        let heat_density = moist_air_density(design.pressure, design.heating_temp, design.humidity);
        let (h_infil, h_vent) = air_exchange.sensible_coefficients(heat_density);
        let peak_heating = (ua_wall + ua_roof + ua_window + h_infil + h_vent)
            * (heat_indoor - design.heating_temp);

        self.heat_cap = peak_heating.max(0.) / areas.n_floor * HEATING_SIZING_FACTOR;
        if design.autosize_cooling {
            self.cool_cap = peak_cooling.max(0.) / areas.n_floor * COOLING_SIZING_FACTOR;
        }
        self.m_sys = self.cool_cap / (CP_AIR * (cool_indoor - SUPPLY_AIR_TEMP).max(1.));
        self.fan_max = self.m_sys / AIR_DENSITY_REF;
        self.phase = BuildingPhase::Sized;

        info!(
            heat_cap = self.heat_cap,
            cool_cap = self.cool_cap,
            m_sys = self.m_sys,
            "HVAC plant sized"
        );
        Ok(())
    }

    /// Radiant share of the internal gain absorbed by the internal mass, in
    /// W per m2 of mass surface
    pub fn mass_radiant_gain(&self, is_night: bool, geometry: &UrbanGeometry) -> f64 {
        let gains = self.internal_gains();
        let areas = self.areas(geometry);
        gains.radiant(gains.total_per_floor_area(is_night)) * areas.n_floor / areas.mass
    }

    fn sensible_fluxes(
        &self,
        indoor_temp: f64,
        forcing: &BemForcing,
        areas: &EnvelopeAreas,
        surfaces: &SurfaceTemps,
        h_ceiling: f64,
        h_infil: f64,
        h_vent: f64,
        convective_gain: f64,
    ) -> SensibleFluxes {
        SensibleFluxes {
            wall: H_IN_WALL * areas.wall * (surfaces.wall - indoor_temp),
            mass: H_IN_MASS * areas.mass * (surfaces.mass - indoor_temp),
            roof: h_ceiling * areas.ceiling * (surfaces.roof - indoor_temp),
            window: self.u_value * areas.window * (forcing.canyon_temp - indoor_temp),
            solar: forcing.solar_wall * self.shgc * areas.window,
            interior: convective_gain * areas.n_floor,
            infil: h_infil * (forcing.canyon_temp - indoor_temp),
            vent: h_vent * (forcing.canyon_temp - indoor_temp),
        }
    }

    /// Calculate the indoor energy balance and HVAC response for one timestep
    ///
    /// Arguments:
    /// * `forcing` - outdoor and canyon conditions for the timestep
    /// * `geometry` - urban form, setting the envelope areas
    /// * `surfaces` - inner surface temperatures of the envelope after
    ///                this timestep's conduction
    /// * `element_fluxes` - face fluxes of that conduction, recorded in the state
    /// * `dt` - timestep, in seconds
    pub fn bemcalc(
        &mut self,
        forcing: &BemForcing,
        geometry: &UrbanGeometry,
        surfaces: &SurfaceTemps,
        element_fluxes: &ElementFluxes,
        dt: f64,
    ) -> Result<&BuildingState, BemError> {
        match self.phase {
            BuildingPhase::Uninitialized => return Err(BemError::NotSized),
            BuildingPhase::Faulted => return Err(BemError::Faulted),
            BuildingPhase::Sized | BuildingPhase::Stepping => {}
        }
        geometry.validate()?;
        self.steps += 1;

        let areas = self.areas(geometry);
        let n_floor = areas.n_floor;
        let volume_height = n_floor * self.floor_height;
        let prev_temp = self.state.indoor_temp;
        let prev_hum = self.state.indoor_hum;

        let gains = self.internal_gains();
        let int_heat = gains.total_per_floor_area(forcing.is_night);
        let (cool_setpoint, heat_setpoint) = self.setpoints(forcing.is_night);

        let density = moist_air_density(forcing.pressure, prev_temp, prev_hum);
        let air_exchange = AirExchange::new(self.infil, self.vent, volume_height, n_floor);
        let (h_infil, h_vent) = air_exchange.sensible_coefficients(density);
        let h_ceiling = h_in_ceiling(surfaces.roof, prev_temp);
        let convective_gain = gains.convective(int_heat);

        // Indoor air balance: H1 + G = H2 * T
        let h2 = H_IN_WALL * areas.wall
            + H_IN_MASS * areas.mass
            + h_ceiling * areas.ceiling
            + self.u_value * areas.window
            + h_infil
            + h_vent;
        let h1 = H_IN_WALL * areas.wall * surfaces.wall
            + H_IN_MASS * areas.mass * surfaces.mass
            + h_ceiling * areas.ceiling * surfaces.roof
            + (self.u_value * areas.window + h_infil + h_vent) * forcing.canyon_temp;
        let g = forcing.solar_wall * self.shgc * areas.window + convective_gain * n_floor;
        let free_temp = (h1 + g) / h2;

        let cooling_mode = free_temp > cool_setpoint;
        let heating_mode = free_temp < heat_setpoint;
        let target_temp = if cooling_mode {
            cool_setpoint
        } else if heating_mode {
            heat_setpoint
        } else {
            free_temp
        };

        let fluxes = self.sensible_fluxes(
            target_temp,
            forcing,
            &areas,
            surfaces,
            h_ceiling,
            h_infil,
            h_vent,
            convective_gain,
        );
        let net_load = fluxes.total();

        let (cool_demand, heat_demand) = if cooling_mode {
            (net_load.max(0.), 0.)
        } else if heating_mode {
            (0., (-net_load).max(0.))
        } else {
            (0., 0.)
        };

        let cop_adj = cop_adjusted(self.cop, self.cond_type, forcing.canyon_temp);
        let cooling = AirConditioning::new(self.cool_cap * n_floor, cop_adj, self.cond_type)
            .demand_energy(cool_demand, target_temp, prev_hum, density);
        let heating = SpaceHeater::new(self.heat_cap * n_floor, self.heat_eff, self.heating_source)
            .demand_energy(heat_demand);

        let indoor_temp = if cooling.unmet > 0. {
            (h1 + g - cooling.sensible_delivered) / h2
        } else if heating.unmet > 0. {
            (h1 + g + heating.delivered) / h2
        } else {
            target_temp
        };

        // Explicit moisture balance of the indoor air
        let latent_internal = gains.latent(int_heat) * n_floor;
        let (latent_infil, latent_vent) =
            air_exchange.latent_gains(density, forcing.canyon_hum - prev_hum);
        let indoor_hum = prev_hum
            + dt / (density * LATENT_HEAT_VAPORISATION * volume_height)
                * (latent_internal + latent_infil + latent_vent - cooling.dehum_delivered);

        let exhaust = h_vent * (indoor_temp - forcing.canyon_temp);
        let sens_waste = cooling.sensible_waste + heating.sensible_waste + exhaust;

        let (elec_heat, gas_heat) = match self.heating_source {
            HeatingSource::Electric => (heating.consumption, 0.),
            HeatingSource::Fuel => (0., heating.consumption),
        };

        let per_floor = |value: f64| value / n_floor;
        self.state = BuildingState {
            indoor_temp,
            indoor_hum,
            indoor_rhum: f64::NAN,
            int_heat,
            n_floor,
            sens_cool_demand: per_floor(cool_demand),
            sens_heat_demand: per_floor(heat_demand),
            cop_adj,
            dehum_demand: per_floor(cooling.dehum_delivered),
            cool_consump: per_floor(cooling.consumption),
            heat_consump: per_floor(heating.consumption),
            sens_waste,
            lat_waste: cooling.latent_waste,
            sens_waste_canyon: self.canyon_fraction * sens_waste,
            flux_mass: per_floor(fluxes.mass),
            flux_wall: per_floor(fluxes.wall),
            flux_roof: per_floor(fluxes.roof),
            flux_solar: per_floor(fluxes.solar),
            flux_window: per_floor(fluxes.window),
            flux_interior: per_floor(fluxes.interior),
            flux_infil: per_floor(fluxes.infil),
            flux_vent: per_floor(fluxes.vent),
            wall_flux_outside: element_fluxes.wall_outside,
            wall_flux_inside: element_fluxes.wall_inside,
            roof_flux_outside: element_fluxes.roof_outside,
            roof_flux_inside: element_fluxes.roof_inside,
            mass_flux_inside: element_fluxes.mass_inside,
            net_sensible_load: per_floor(net_load),
            unmet_cool_load: per_floor(cooling.unmet),
            unmet_heat_load: per_floor(heating.unmet),
            elec_total: per_floor(cooling.consumption + elec_heat) + forcing.elec + forcing.light,
            gas_total: per_floor(gas_heat) + forcing.gas,
            q_hvac: per_floor(cooling.total_delivered()),
            q_heat: per_floor(heating.delivered),
        };

        if !(INDOOR_TEMP_MIN..=INDOOR_TEMP_MAX).contains(&indoor_temp)
            || !(INDOOR_HUM_MIN..=INDOOR_HUM_MAX).contains(&indoor_hum)
        {
            self.phase = BuildingPhase::Faulted;
            error!(
                step = self.steps,
                indoor_temp, indoor_hum, "indoor conditions out of bounds"
            );
            return Err(BemError::Fatal {
                step: self.steps,
                indoor_temp,
                indoor_hum,
            });
        }

        self.state.indoor_rhum = relative_humidity(indoor_temp, indoor_hum, forcing.pressure)?;
        self.phase = BuildingPhase::Stepping;

        if self.state.unmet_cool_load > 0. || self.state.unmet_heat_load > 0. {
            warn!(
                step = self.steps,
                unmet_cool_load = self.state.unmet_cool_load,
                unmet_heat_load = self.state.unmet_heat_load,
                "HVAC capacity exceeded"
            );
        }
        debug!(
            step = self.steps,
            indoor_temp,
            indoor_hum,
            net_sensible_load = self.state.net_sensible_load,
            "building energy balance calculated"
        );

        Ok(&self.state)
    }
}

impl Display for Building {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Building,\n floor_height: {}\n int_heat_night: {}\n int_heat_day: {}\n \
             int_heat_f_rad: {}\n int_heat_f_lat: {}\n infil: {}\n vent: {}\n \
             glazing_ratio: {}\n u_value: {}\n shgc: {}\n cond_type: {}\n cop: {}\n \
             cool_setpoint_day: {}\n cool_setpoint_night: {}\n heat_setpoint_day: {}\n \
             heat_setpoint_night: {}\n cool_cap: {}\n heat_eff: {}\n initial_temp: {}",
            self.floor_height,
            self.int_heat_night,
            self.int_heat_day,
            self.int_heat_f_rad,
            self.int_heat_f_lat,
            self.infil,
            self.vent,
            self.glazing_ratio,
            self.u_value,
            self.shgc,
            self.cond_type,
            self.cop,
            self.cool_setpoint_day,
            self.cool_setpoint_night,
            self.heat_setpoint_day,
            self.heat_setpoint_night,
            self.cool_cap,
            self.heat_eff,
            self.initial_temp,
        )
    }
}
