//! Flight-time estimation for one order item.
//!
//! ```text
//! energy_wh = capacity_mah * voltage / 1000 * (remaining / 100) * efficiency
//! power_w   = power_multiplier * (drone_weight + cargo_weight)^1.5 * wind * rain
//! minutes   = round_half_even(energy_wh * 60 / power_w)     (0 when power_w <= 0)
//! ```
//!
//! Missing parameters count as zero. The estimator never fails and never
//! rejects negative inputs; validation happens when parameters are set.

use super::order::{DroneParameters, OrderItem};

/// Usable battery energy in watt-hours.
pub fn energy_wh(params: &DroneParameters) -> f64 {
    let battery_level = params.battery_remaining.unwrap_or(0.0) / 100.0;
    params.battery_capacity.unwrap_or(0.0) * params.battery_voltage.unwrap_or(0.0) / 1000.0
        * battery_level
        * params.efficiency.unwrap_or(0.0)
}

/// Power draw in watts for a flight mode under the item's weather conditions.
pub fn power_w(params: &DroneParameters, power_multiplier: f64, wind: f64, rain: f64) -> f64 {
    let total_mass = params.drone_weight.unwrap_or(0.0) + params.cargo_weight.unwrap_or(0.0);
    power_multiplier * total_mass.powf(1.5) * wind * rain
}

/// Estimated runtime in whole minutes.
pub fn estimate_minutes(params: &DroneParameters, power_multiplier: f64, wind: f64, rain: f64) -> i32 {
    let power = power_w(params, power_multiplier, wind, rain);
    if !(power > 0.0) || !power.is_finite() {
        return 0;
    }

    let minutes = energy_wh(params) * 60.0 / power;
    if !minutes.is_finite() {
        return 0;
    }

    // `as` saturates at the i32 bounds
    minutes.round_ties_even() as i32
}

/// Runtime of an item under the order's drone parameters.
pub fn estimate(params: &DroneParameters, item: &OrderItem) -> i32 {
    estimate_minutes(params, item.power_multiplier, item.wind_multiplier, item.rain_multiplier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_params() -> DroneParameters {
        DroneParameters {
            drone_weight: Some(2.0),
            cargo_weight: Some(1.0),
            battery_capacity: Some(5000.0),
            battery_voltage: Some(11.1),
            efficiency: Some(0.8),
            battery_remaining: Some(85.0),
        }
    }

    /// 1 Wh of energy and 1 kg of mass, so minutes = 60 / power_multiplier.
    fn unit_params() -> DroneParameters {
        DroneParameters {
            drone_weight: Some(1.0),
            cargo_weight: Some(0.0),
            battery_capacity: Some(1000.0),
            battery_voltage: Some(1.0),
            efficiency: Some(1.0),
            battery_remaining: Some(100.0),
        }
    }

    #[test]
    fn test_reference_scenario() {
        let params = reference_params();

        assert!((energy_wh(&params) - 37.74).abs() < 1e-9);
        assert!((power_w(&params, 1.0, 1.0, 1.0) - 5.196_152).abs() < 1e-6);
        assert_eq!(estimate_minutes(&params, 1.0, 1.0, 1.0), 436);
    }

    #[test]
    fn test_weather_multipliers_scale_power() {
        let params = reference_params();
        // 435.78 / 1.2 = 363.15
        assert_eq!(estimate_minutes(&params, 1.0, 1.2, 1.0), 363);
        // 435.78 / (0.6 * 1.5) = 484.2
        assert_eq!(estimate_minutes(&params, 0.6, 1.5, 1.0), 484);
    }

    #[test]
    fn test_ties_round_to_even() {
        let params = unit_params();
        // 60 / 24 = 2.5
        assert_eq!(estimate_minutes(&params, 24.0, 1.0, 1.0), 2);
        // 60 / 40 = 1.5
        assert_eq!(estimate_minutes(&params, 40.0, 1.0, 1.0), 2);
        // 60 / 16 = 3.75
        assert_eq!(estimate_minutes(&params, 16.0, 1.0, 1.0), 4);
    }

    #[test]
    fn test_zero_power_yields_zero() {
        let params = reference_params();
        assert_eq!(estimate_minutes(&params, 0.0, 1.0, 1.0), 0);
        assert_eq!(estimate_minutes(&params, 1.0, 0.0, 1.0), 0);
        assert_eq!(estimate_minutes(&params, 1.0, 1.0, 0.0), 0);

        let weightless = DroneParameters {
            drone_weight: Some(0.0),
            cargo_weight: Some(0.0),
            ..params
        };
        assert_eq!(estimate_minutes(&weightless, 1.0, 1.0, 1.0), 0);
    }

    #[test]
    fn test_missing_parameters_yield_zero() {
        assert_eq!(estimate_minutes(&DroneParameters::default(), 1.0, 1.0, 1.0), 0);

        let no_battery = DroneParameters {
            battery_capacity: None,
            ..reference_params()
        };
        assert_eq!(estimate_minutes(&no_battery, 1.0, 1.0, 1.0), 0);
    }

    #[test]
    fn test_negative_power_yields_zero() {
        assert_eq!(estimate_minutes(&reference_params(), -1.0, 1.0, 1.0), 0);
    }
}
