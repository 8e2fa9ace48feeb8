//! Today's dosing schedule.
//!
//! Each active regimen contributes the doses that fall on today's calendar
//! date. The cycle is anchored at the regimen's start time and walked
//! backward within the same day to find the first dose, then forward until
//! midnight. It is not traced back to the regimen's true start date, so a
//! course whose cycle does not divide 24 hours restarts from the same anchor
//! every day.

use crate::{DoseInstance, Regimen, TimeOfDay};
use chrono::{Days, Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Generate today's dose instances for every active regimen
///
/// `now` is the local wall-clock time; only its date is used. The result is
/// sorted by dose time; doses at the same instant keep regimen order.
pub fn generate_today_schedule(regimens: &[Regimen], now: NaiveDateTime) -> Vec<DoseInstance> {
    schedule_for_day(regimens, now.date())
}

/// Dose instances of every regimen active on `day`, sorted by time
pub fn schedule_for_day(regimens: &[Regimen], day: NaiveDate) -> Vec<DoseInstance> {
    let mut schedule = Vec::new();

    for regimen in regimens {
        if regimen.freq_hours == 0 {
            tracing::warn!("Skipping regimen {} with zero dosing frequency", regimen.id);
            continue;
        }

        if !is_active_on(regimen, day) {
            continue;
        }

        for time in dose_times_on(regimen, day) {
            let time_string = TimeOfDay::of(&time).to_string();
            let instance_id = instance_id(&regimen.id, &time);
            let is_taken = regimen.has_taken(&instance_id);

            schedule.push(DoseInstance {
                instance_id,
                regimen_id: regimen.id.clone(),
                name: regimen.name.clone(),
                dose: regimen.dose.clone(),
                time,
                time_string,
                is_taken,
            });
        }
    }

    schedule.sort_by_key(|dose| dose.time);
    schedule
}

/// Whether `day` falls within `[start day, start day + durationDays]`
pub fn is_active_on(regimen: &Regimen, day: NaiveDate) -> bool {
    let start_day = regimen.start_date.naive_local().date();
    let end_day = start_day
        .checked_add_days(Days::new(regimen.duration_days as u64))
        .unwrap_or(NaiveDate::MAX);
    start_day <= day && day <= end_day
}

/// Dose instants on `day` for one regimen
fn dose_times_on(regimen: &Regimen, day: NaiveDate) -> Vec<NaiveDateTime> {
    let freq = regimen.freq_hours;
    let anchor = regimen.start_time;

    // Backward walk: step back by the frequency while the hour stays >= 0
    let mut hour = anchor.hour();
    while hour >= freq {
        hour -= freq;
    }

    let first = NaiveTime::from_hms_opt(hour, anchor.minute(), 0).unwrap_or(NaiveTime::MIN);
    let mut current = day.and_time(first);
    let step = Duration::hours(freq as i64);

    let mut times = Vec::new();
    while current.date() == day {
        times.push(current);
        current += step;
    }
    times
}

/// Deterministic id of a dose: `{regimenId}-{Www Mmm DD YYYY}-{HH:MM}`
pub fn instance_id(regimen_id: &str, time: &NaiveDateTime) -> String {
    format!(
        "{}-{}-{}",
        regimen_id,
        time.format("%a %b %d %Y"),
        TimeOfDay::of(time)
    )
}
