//! Fixtures for tests

use crate::power_system::{Generator, GeneratorMap, PowerSystem, UnitState};
use crate::timeline::Timeline;
use crate::units::{Hours, Money, MoneyPerEnergy, MoneyPerHour, Power};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use indexmap::indexmap;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// An instant on the hour
pub fn time(year: i32, month: u32, day: u32, hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
}

/// A timeline of `n` hourly instants, starting at midnight on 1 January 2024
pub fn hourly_timeline(n: usize) -> Timeline {
    let start = time(2024, 1, 1, 0);
    let times = (0..n)
        .map(|i| start + TimeDelta::hours(i as i64))
        .collect();
    Timeline::with_interval(times, TimeDelta::hours(1)).unwrap()
}

#[fixture]
pub fn generator() -> Generator {
    Generator {
        id: "gen1".into(),
        min_power: Power(20.0),
        max_power: Power(100.0),
        marginal_cost: MoneyPerEnergy(20.0),
        no_load_cost: MoneyPerHour(100.0),
        startup_cost: Money(500.0),
        ramp_rate: None,
        min_up_hours: Hours(0.0),
        min_down_hours: Hours(0.0),
        must_run: false,
        initial: UnitState {
            status: true,
            hours_in_status: Hours(10.0),
            power: Power(50.0),
        },
    }
}

/// A system with a cheap unit which is on and an expensive one which is off
#[fixture]
pub fn power_system() -> PowerSystem {
    let cheap = Generator {
        id: "cheap".into(),
        min_power: Power(20.0),
        max_power: Power(100.0),
        marginal_cost: MoneyPerEnergy(10.0),
        no_load_cost: MoneyPerHour(0.0),
        startup_cost: Money(0.0),
        ramp_rate: None,
        min_up_hours: Hours(0.0),
        min_down_hours: Hours(0.0),
        must_run: false,
        initial: UnitState {
            status: true,
            hours_in_status: Hours(5.0),
            power: Power(80.0),
        },
    };
    let peaker = Generator {
        id: "peaker".into(),
        min_power: Power(0.0),
        max_power: Power(50.0),
        marginal_cost: MoneyPerEnergy(50.0),
        no_load_cost: MoneyPerHour(0.0),
        startup_cost: Money(100.0),
        initial: UnitState {
            status: false,
            hours_in_status: Hours(2.0),
            power: Power(0.0),
        },
        ..cheap.clone()
    };
    let generators: GeneratorMap = indexmap! {
        cheap.id.clone() => cheap,
        peaker.id.clone() => peaker,
    };

    PowerSystem::new(generators, vec![Power(80.0); 4], MoneyPerEnergy(1000.0))
}
