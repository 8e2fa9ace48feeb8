//! Host-platform collaborators used by the reminder.
//!
//! Each front end (terminal, desktop tray) supplies its own implementations.
//! All of them are best-effort: the reminder logs their failures and carries
//! on with whichever collaborators succeeded.

use crate::{DoseInstance, Result};

/// Outcome of asking the host for notification permission
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Unsupported,
}

/// System notification collaborator
pub trait Notifier {
    /// Called once at startup
    fn request_permission(&mut self) -> Permission;

    /// Only called when permission was granted
    fn notify(&mut self, title: &str, body: &str) -> Result<()>;
}

/// Audio cue collaborator
pub trait Chime {
    /// Play the short descending two-tone cue
    fn play(&mut self) -> Result<()>;
}

/// Presentation collaborator
pub trait AlertSurface {
    fn render_timeline(&mut self, schedule: &[DoseInstance]);

    fn render_alert(&mut self, dose: &DoseInstance);

    fn clear_alert(&mut self);
}

/// Notifier for hosts without a notification service
pub struct NoNotifications;

impl Notifier for NoNotifications {
    fn request_permission(&mut self) -> Permission {
        Permission::Unsupported
    }

    fn notify(&mut self, _title: &str, _body: &str) -> Result<()> {
        Ok(())
    }
}

/// Chime that makes no sound
pub struct Silent;

impl Chime for Silent {
    fn play(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Surface that renders nothing
pub struct Headless;

impl AlertSurface for Headless {
    fn render_timeline(&mut self, _schedule: &[DoseInstance]) {}

    fn render_alert(&mut self, _dose: &DoseInstance) {}

    fn clear_alert(&mut self) {}
}

/// Body text of a due-dose notification
pub fn notification_body(dose: &DoseInstance) -> String {
    format!("Take now: {} ({})", dose.name, dose.dose)
}
