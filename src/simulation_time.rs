use crate::core::space_heat_demand::building_element::DEFAULT_MAX_FOURIER_NUMBER;
use crate::core::units::SECONDS_PER_HOUR;
use serde::{Deserialize, Serialize};

pub const HOURS_IN_DAY: u32 = 24;

// # Define hours that start each month (and end next month). Note there are 13
// # values so that end of final month is handled correctly.
// # E.g. Jan is hours 0-743
const MONTH_START_END_HOURS: [u32; 13] = [
    0, 744, 1416, 2160, 2880, 3624, 4344, 5088, 5832, 6552, 7296, 8016, 8760,
];

// Months (zero-based, northern hemisphere) in which vegetation is in leaf
const VEGETATION_START_MONTH: u32 = 3;
const VEGETATION_END_MONTH: u32 = 9;

/// Numerical and scheduling settings shared by all archetypes of a run
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[cfg_attr(feature = "schemars", derive(schemars::JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct SolverSettings {
    /// Timestep, in seconds
    #[serde(default = "default_dt")]
    pub dt: f64,
    /// Largest layer Fourier number accepted by the conduction solver
    #[serde(default = "default_max_fourier_number")]
    pub max_fourier_number: f64,
    /// First hour of the day using night setpoints and gains
    #[serde(default = "default_night_start_hour")]
    pub night_start_hour: u32,
    /// First hour of the day using day setpoints and gains again
    #[serde(default = "default_night_end_hour")]
    pub night_end_hour: u32,
}

fn default_dt() -> f64 {
    300.
}

fn default_max_fourier_number() -> f64 {
    DEFAULT_MAX_FOURIER_NUMBER
}

fn default_night_start_hour() -> u32 {
    19
}

fn default_night_end_hour() -> u32 {
    5
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            dt: default_dt(),
            max_fourier_number: default_max_fourier_number(),
            night_start_hour: default_night_start_hour(),
            night_end_hour: default_night_end_hour(),
        }
    }
}

impl SolverSettings {
    /// Whether an hour of the day (0-23) falls in the night schedule
    pub fn is_night(&self, hour_of_day: u32) -> bool {
        if self.night_start_hour <= self.night_end_hour {
            (self.night_start_hour..self.night_end_hour).contains(&hour_of_day)
        } else {
            hour_of_day >= self.night_start_hour || hour_of_day < self.night_end_hour
        }
    }
}

/// Span of a simulation, in hours from the start of the year, stepped in
/// seconds
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct SimulationTime {
    #[serde(rename(deserialize = "start"))]
    start_time: f64,
    #[serde(rename(deserialize = "end"))]
    end_time: f64,
    step: f64,
}

impl SimulationTime {
    /// Arguments:
    /// * `start_time` - in hours from the start of the year
    /// * `end_time` - in hours from the start of the year
    /// * `step` - timestep, in seconds
    pub fn new(start_time: f64, end_time: f64, step: f64) -> Self {
        Self {
            start_time,
            end_time,
            step,
        }
    }

    /// Timestep, in seconds
    pub fn step(&self) -> f64 {
        self.step
    }

    fn step_in_hours(&self) -> f64 {
        self.step / SECONDS_PER_HOUR as f64
    }

    pub fn total_steps(&self) -> usize {
        ((self.end_time - self.start_time) / self.step_in_hours()).ceil() as usize
    }

    pub fn iter(&self) -> SimulationTimeIterator {
        SimulationTimeIterator::from(*self)
    }
}

#[derive(Clone)]
pub struct SimulationTimeIterator {
    current_index: usize,
    simulation_time: SimulationTime,
}

impl SimulationTimeIterator {
    fn from(simulation_time: SimulationTime) -> Self {
        SimulationTimeIterator {
            current_index: 0,
            simulation_time,
        }
    }
}

#[derive(Debug)]
pub struct SimulationTimeIteration {
    pub index: usize,
    /// in hours from the start of the year
    pub time: f64,
    /// in seconds
    pub timestep: f64,
}

impl SimulationTimeIteration {
    pub fn current_hour(&self) -> u32 {
        self.time.floor() as u32
    }

    pub fn hour_of_day(&self) -> u32 {
        self.current_hour() % HOURS_IN_DAY
    }

    pub fn current_day(&self) -> u32 {
        self.time as u32 / HOURS_IN_DAY
    }

    pub fn current_month(&self) -> Option<u32> {
        let current_hour = self.current_hour();
        MONTH_START_END_HOURS
            .iter()
            .position(|end_hour| current_hour < *end_hour)
            .map(|i| (i - 1) as u32)
    }

    pub fn is_night(&self, settings: &SolverSettings) -> bool {
        settings.is_night(self.hour_of_day())
    }

    /// Whether vegetation on roofs is in leaf (April to October)
    pub fn vegetation_active(&self) -> bool {
        self.current_month()
            .is_some_and(|month| (VEGETATION_START_MONTH..=VEGETATION_END_MONTH).contains(&month))
    }
}

impl Iterator for SimulationTimeIterator {
    type Item = SimulationTimeIteration;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index >= self.simulation_time.total_steps() {
            return None;
        }
        let item = SimulationTimeIteration {
            index: self.current_index,
            time: self.simulation_time.start_time
                + self.current_index as f64 * self.simulation_time.step_in_hours(),
            timestep: self.simulation_time.step,
        };
        self.current_index += 1;
        Some(item)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    pub fn timestep() -> f64 {
        1800.
    }

    #[fixture]
    pub fn simtime(timestep: f64) -> SimulationTime {
        SimulationTime::new(742.0, 746.0, timestep)
    }

    #[rstest]
    fn should_have_correct_total_steps(simtime: SimulationTime, timestep: f64) {
        assert_eq!(simtime.total_steps(), 8);
        assert_eq!(simtime.step(), timestep);
    }

    #[rstest]
    fn should_iterate_correctly(simtime: SimulationTime, timestep: f64) {
        let hours = [742, 742, 743, 743, 744, 744, 745, 745];
        let hours_of_day = [22, 22, 23, 23, 0, 0, 1, 1];
        let current_days = [30, 30, 30, 30, 31, 31, 31, 31];
        let current_months = [0, 0, 0, 0, 1, 1, 1, 1];
        let mut count = 0;
        for (i, item) in simtime.iter().enumerate() {
            assert_eq!(item.index, i);
            assert_eq!(item.time, i as f64 * 0.5 + 742.0);
            assert_eq!(item.timestep, timestep);
            assert_eq!(item.current_hour(), hours[i]);
            assert_eq!(item.hour_of_day(), hours_of_day[i]);
            assert_eq!(item.current_day(), current_days[i]);
            assert_eq!(item.current_month().unwrap(), current_months[i]);
            count += 1;
        }
        assert_eq!(count, 8);
    }

    #[rstest]
    #[case(18, false)]
    #[case(19, true)]
    #[case(23, true)]
    #[case(0, true)]
    #[case(4, true)]
    #[case(5, false)]
    #[case(12, false)]
    fn should_apply_night_schedule(#[case] hour: u32, #[case] expected: bool) {
        assert_eq!(SolverSettings::default().is_night(hour), expected);
    }

    #[rstest]
    fn should_activate_vegetation_in_growing_season() {
        let iteration = |time: f64| SimulationTimeIteration {
            index: 0,
            time,
            timestep: 300.,
        };
        assert!(!iteration(100.).vegetation_active());
        assert!(iteration(2200.).vegetation_active());
        assert!(iteration(7000.).vegetation_active());
        assert!(!iteration(7400.).vegetation_active());
    }

    #[rstest]
    fn should_fill_settings_defaults() {
        let settings: SolverSettings = serde_json::from_str(r#"{"dt": 60}"#).unwrap();
        assert_eq!(settings.dt, 60.);
        assert_eq!(settings.max_fourier_number, 20.);
        assert_eq!(settings.night_start_hour, 19);
    }
}
