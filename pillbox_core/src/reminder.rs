//! The reminder controller.
//!
//! `Reminder` is the single owner of the regimen store, the alert scheduler,
//! the active alert and the host collaborators. Front ends hold one instance
//! on their main thread and forward user actions and timer ticks to it.
//! Ticks and redraws reload the store first, so regimens and doses recorded
//! by another front end show up without a restart.

use crate::alerts::{AlertScheduler, AlertState};
use crate::collaborators::{
    notification_body, AlertSurface, Chime, Headless, NoNotifications, Notifier, Permission,
    Silent,
};
use crate::config::Config;
use crate::ledger::{self, TakeOutcome};
use crate::{generate_today_schedule, DoseInstance, Regimen, RegimenDraft, RegimenStore, Result};
use chrono::{DateTime, Local};

pub struct Reminder {
    store: RegimenStore,
    alerts: AlertScheduler,
    notifier: Box<dyn Notifier>,
    chime: Box<dyn Chime>,
    surface: Box<dyn AlertSurface>,
    permission: Permission,
    active_alert: Option<DoseInstance>,
    notification_title: String,
    notifications_enabled: bool,
    chime_enabled: bool,
}

impl Reminder {
    /// Create a reminder with headless, silent collaborators
    pub fn new(store: RegimenStore, config: &Config) -> Self {
        Self {
            store,
            alerts: AlertScheduler::new(config.alerts.cooldown()),
            notifier: Box::new(NoNotifications),
            chime: Box::new(Silent),
            surface: Box::new(Headless),
            permission: Permission::Unsupported,
            active_alert: None,
            notification_title: config.notifications.title.clone(),
            notifications_enabled: config.notifications.enabled,
            chime_enabled: config.chime.enabled,
        }
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    pub fn with_chime(mut self, chime: impl Chime + 'static) -> Self {
        self.chime = Box::new(chime);
        self
    }

    pub fn with_surface(mut self, surface: impl AlertSurface + 'static) -> Self {
        self.surface = Box::new(surface);
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn regimens(&self) -> &[Regimen] {
        self.store.regimens()
    }

    pub fn permission(&self) -> Permission {
        self.permission
    }

    pub fn active_alert(&self) -> Option<&DoseInstance> {
        self.active_alert.as_ref()
    }

    pub fn today_schedule(&self, now: DateTime<Local>) -> Vec<DoseInstance> {
        generate_today_schedule(self.store.regimens(), now.naive_local())
    }

    pub fn alert_state(&self, dose: &DoseInstance, now: DateTime<Local>) -> AlertState {
        let active = self.active_alert.as_ref().map(|d| d.instance_id.as_str());
        self.alerts.state_of(dose, active, now.naive_local())
    }

    // ── Actions ──────────────────────────────────────────────────────

    /// Ask for notification permission and draw the initial timeline
    pub fn start(&mut self, now: DateTime<Local>) {
        self.permission = if self.notifications_enabled {
            self.notifier.request_permission()
        } else {
            Permission::Denied
        };
        tracing::info!("Notification permission: {:?}", self.permission);
        self.refresh(now);
    }

    /// Validate a registration form and append the regimen
    ///
    /// Validation errors are returned to the caller; persistence failures are
    /// only logged.
    pub fn add_regimen(&mut self, draft: &RegimenDraft, now: DateTime<Local>) -> Result<Regimen> {
        let regimen = Regimen::from_draft(draft, now)?;
        tracing::info!(
            "Scheduled {} ({}) every {}h from {} for {} days",
            regimen.name,
            regimen.dose,
            regimen.freq_hours,
            regimen.start_time,
            regimen.duration_days
        );
        let added = self.store.push(regimen);
        self.draw(now);
        Ok(added)
    }

    /// Record a dose as taken
    ///
    /// Idempotent; unknown regimens are ignored. Clears the active alert when
    /// it refers to this dose and the dose is now in the ledger.
    pub fn mark_taken(
        &mut self,
        regimen_id: &str,
        instance_id: &str,
        now: DateTime<Local>,
    ) -> TakeOutcome {
        let outcome = ledger::mark_taken(&mut self.store, regimen_id, instance_id);

        if outcome.changed() {
            self.draw(now);
        }

        let alerting = self
            .active_alert
            .as_ref()
            .map(|d| d.instance_id == instance_id)
            .unwrap_or(false);
        if alerting && outcome != TakeOutcome::UnknownRegimen {
            self.dismiss_alert();
        }

        outcome
    }

    /// One alert-check pass; returns the doses that alerted
    pub fn tick(&mut self, now: DateTime<Local>) -> Vec<DoseInstance> {
        self.store.reload();
        let schedule = self.today_schedule(now);
        let due = self.alerts.check(&schedule, now.naive_local());

        for dose in &due {
            self.raise(dose);
        }

        due
    }

    /// The alert surface's take button
    pub fn take_active(&mut self, now: DateTime<Local>) -> Option<TakeOutcome> {
        let dose = self.active_alert.clone()?;
        Some(self.mark_taken(&dose.regimen_id, &dose.instance_id, now))
    }

    /// The alert surface's snooze button: dismiss only
    pub fn snooze(&mut self) {
        if let Some(dose) = &self.active_alert {
            tracing::info!("Snoozed alert for {}", dose.instance_id);
        }
        self.dismiss_alert();
    }

    fn raise(&mut self, dose: &DoseInstance) {
        tracing::info!("Dose due: {} {} at {}", dose.name, dose.dose, dose.time_string);

        self.active_alert = Some(dose.clone());
        self.surface.render_alert(dose);

        if self.chime_enabled {
            if let Err(e) = self.chime.play() {
                tracing::warn!("Chime failed: {}", e);
            }
        }

        if self.permission == Permission::Granted {
            let body = notification_body(dose);
            if let Err(e) = self.notifier.notify(&self.notification_title, &body) {
                tracing::warn!("Notification failed: {}", e);
            }
        }
    }

    fn dismiss_alert(&mut self) {
        self.active_alert = None;
        self.surface.clear_alert();
    }

    /// Reload the store and redraw today's timeline
    ///
    /// Used at start, after the date rolls over and when a front end wants
    /// to show changes made elsewhere.
    pub fn refresh(&mut self, now: DateTime<Local>) {
        self.store.reload();
        self.draw(now);
    }

    fn draw(&mut self, now: DateTime<Local>) {
        let schedule = self.today_schedule(now);
        self.surface.render_timeline(&schedule);
    }
}
