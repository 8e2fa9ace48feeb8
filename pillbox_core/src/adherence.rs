//! Adherence over recent days.
//!
//! Built from each regimen's `takenLog` and the same per-day schedule the
//! timeline shows, so a report always agrees with what the user saw. Each
//! scheduled dose is one of:
//! - **Taken**: present in the ledger
//! - **Missed**: not taken and its due minute has passed
//! - **Upcoming**: not taken and not yet past its due minute

use crate::schedule::schedule_for_day;
use crate::{DoseInstance, Regimen, Result};
use chrono::{Days, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::path::Path;

/// Status of one scheduled dose
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DoseStatus {
    Taken,
    Missed,
    Upcoming,
}

impl DoseStatus {
    /// Status of `dose` as seen at `now`
    ///
    /// A dose still in its due minute counts as upcoming.
    pub fn of(dose: &DoseInstance, now: NaiveDateTime) -> Self {
        if dose.is_taken {
            DoseStatus::Taken
        } else if dose.time + Duration::minutes(1) <= now {
            DoseStatus::Missed
        } else {
            DoseStatus::Upcoming
        }
    }
}

impl fmt::Display for DoseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DoseStatus::Taken => "taken",
            DoseStatus::Missed => "missed",
            DoseStatus::Upcoming => "upcoming",
        };
        f.write_str(s)
    }
}

/// Dose counts for a day, a regimen or a whole report
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct AdherenceStats {
    pub scheduled: u32,
    pub taken: u32,
    pub missed: u32,
    pub upcoming: u32,
    /// Taken share of the doses already due (0.0 to 1.0); 1.0 when none were due
    pub adherence_rate: f64,
}

impl AdherenceStats {
    fn count(&mut self, status: DoseStatus) {
        self.scheduled += 1;
        match status {
            DoseStatus::Taken => self.taken += 1,
            DoseStatus::Missed => self.missed += 1,
            DoseStatus::Upcoming => self.upcoming += 1,
        }
        self.adherence_rate = self.rate();
    }

    fn add(&mut self, other: &AdherenceStats) {
        self.scheduled += other.scheduled;
        self.taken += other.taken;
        self.missed += other.missed;
        self.upcoming += other.upcoming;
        self.adherence_rate = self.rate();
    }

    fn rate(&self) -> f64 {
        let due = self.taken + self.missed;
        if due == 0 {
            1.0
        } else {
            self.taken as f64 / due as f64
        }
    }
}

/// One scheduled dose in a report
#[derive(Clone, Debug, Serialize)]
pub struct DoseRecord {
    pub instance_id: String,
    pub time_string: String,
    pub status: DoseStatus,
}

/// One regimen's doses on one day
#[derive(Clone, Debug, Serialize)]
pub struct DayAdherence {
    pub date: NaiveDate,
    pub stats: AdherenceStats,
    pub doses: Vec<DoseRecord>,
}

impl DayAdherence {
    pub fn missed_times(&self) -> Vec<&str> {
        self.doses
            .iter()
            .filter(|d| d.status == DoseStatus::Missed)
            .map(|d| d.time_string.as_str())
            .collect()
    }
}

/// Per-regimen breakdown, oldest day first
#[derive(Clone, Debug, Serialize)]
pub struct RegimenAdherence {
    pub regimen_id: String,
    pub name: String,
    pub dose: String,
    pub stats: AdherenceStats,
    pub days: Vec<DayAdherence>,
}

/// Adherence over `[from, to]`
#[derive(Clone, Debug, Serialize)]
pub struct AdherenceReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub stats: AdherenceStats,
    pub by_regimen: Vec<RegimenAdherence>,
}

/// Build a report for the last `days` calendar days, today included
///
/// Regimens with no dose in the window are left out.
pub fn adherence_report(regimens: &[Regimen], days: u32, now: NaiveDateTime) -> AdherenceReport {
    let to = now.date();
    let from = to
        .checked_sub_days(Days::new(days.max(1) as u64 - 1))
        .unwrap_or(NaiveDate::MIN);

    let mut report = AdherenceReport {
        from,
        to,
        stats: AdherenceStats::default(),
        by_regimen: Vec::new(),
    };

    for regimen in regimens {
        let mut entry = RegimenAdherence {
            regimen_id: regimen.id.clone(),
            name: regimen.name.clone(),
            dose: regimen.dose.clone(),
            stats: AdherenceStats::default(),
            days: Vec::new(),
        };

        for date in from.iter_days().take_while(|d| *d <= to) {
            let schedule = schedule_for_day(std::slice::from_ref(regimen), date);
            if schedule.is_empty() {
                continue;
            }

            let mut day = DayAdherence {
                date,
                stats: AdherenceStats::default(),
                doses: Vec::with_capacity(schedule.len()),
            };
            for dose in schedule {
                let status = DoseStatus::of(&dose, now);
                day.stats.count(status);
                day.doses.push(DoseRecord {
                    instance_id: dose.instance_id,
                    time_string: dose.time_string,
                    status,
                });
            }

            entry.stats.add(&day.stats);
            entry.days.push(day);
        }

        if !entry.days.is_empty() {
            report.stats.add(&entry.stats);
            report.by_regimen.push(entry);
        }
    }

    tracing::debug!(
        "Adherence {} to {}: {}/{} due doses taken",
        from,
        to,
        report.stats.taken,
        report.stats.taken + report.stats.missed
    );

    report
}

#[derive(Serialize)]
struct CsvRow<'a> {
    date: NaiveDate,
    time: &'a str,
    regimen_id: &'a str,
    name: &'a str,
    dose: &'a str,
    status: DoseStatus,
}

/// Write one CSV row per scheduled dose; returns the number of rows
pub fn write_csv<W: Write>(report: &AdherenceReport, writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut rows = 0;

    for regimen in &report.by_regimen {
        for day in &regimen.days {
            for dose in &day.doses {
                csv_writer.serialize(CsvRow {
                    date: day.date,
                    time: &dose.time_string,
                    regimen_id: &regimen.regimen_id,
                    name: &regimen.name,
                    dose: &regimen.dose,
                    status: dose.status,
                })?;
                rows += 1;
            }
        }
    }

    csv_writer.flush()?;
    Ok(rows)
}

/// Export a report as CSV to `path`, replacing any existing file
pub fn export_csv(report: &AdherenceReport, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let rows = write_csv(report, std::io::BufWriter::new(file))?;
    tracing::info!("Exported {} dose rows to {:?}", rows, path);
    Ok(rows)
}
