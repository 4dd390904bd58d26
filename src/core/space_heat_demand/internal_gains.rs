/// Internal heat gains from occupants, lighting and equipment, following a
/// simple day/night schedule.
///
/// Arguments:
/// * `day` - total internal gain during the day, in W / m2 of floor area
/// * `night` - total internal gain during the night, in W / m2 of floor area
/// * `frac_radiant` - fraction of the sensible gain released as radiation
/// * `frac_latent` - fraction of the total gain released as latent heat
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InternalGains {
    day: f64,
    night: f64,
    frac_radiant: f64,
    frac_latent: f64,
}

impl InternalGains {
    pub fn new(day: f64, night: f64, frac_radiant: f64, frac_latent: f64) -> Self {
        Self {
            day,
            night,
            frac_radiant,
            frac_latent,
        }
    }

    /// Return the scheduled total internal gain, in W / m2 of floor area
    pub fn total_per_floor_area(&self, is_night: bool) -> f64 {
        if is_night {
            self.night
        } else {
            self.day
        }
    }

    /// Sensible gain released by convection to the indoor air
    pub fn convective(&self, total: f64) -> f64 {
        total * (1. - self.frac_latent) * (1. - self.frac_radiant)
    }

    /// Sensible gain released by radiation to the internal mass
    pub fn radiant(&self, total: f64) -> f64 {
        total * (1. - self.frac_latent) * self.frac_radiant
    }

    /// Latent gain released as moisture to the indoor air
    pub fn latent(&self, total: f64) -> f64 {
        total * self.frac_latent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn gains() -> InternalGains {
        InternalGains::new(12., 4., 0.3, 0.2)
    }

    #[rstest]
    fn should_select_scheduled_gain(gains: InternalGains) {
        assert_eq!(gains.total_per_floor_area(false), 12.);
        assert_eq!(gains.total_per_floor_area(true), 4.);
    }

    #[rstest]
    fn should_partition_gain_without_loss(gains: InternalGains) {
        let total = 10.;
        assert_relative_eq!(gains.convective(total), 5.6);
        assert_relative_eq!(gains.radiant(total), 2.4);
        assert_relative_eq!(gains.latent(total), 2.);
        assert_relative_eq!(
            gains.convective(total) + gains.radiant(total) + gains.latent(total),
            total
        );
    }
}
