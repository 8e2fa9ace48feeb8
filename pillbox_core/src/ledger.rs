//! Dose ledger: which dose instances have been taken.
//!
//! The ledger lives inside each regimen's `takenLog`; this module owns the
//! only mutation path.

use crate::{Regimen, RegimenStore};

/// Result of a take action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TakeOutcome {
    /// Newly recorded and persisted
    Recorded,
    /// Already present in the ledger, nothing changed
    AlreadyTaken,
    /// No regimen with that id
    UnknownRegimen,
}

impl TakeOutcome {
    pub fn changed(&self) -> bool {
        matches!(self, TakeOutcome::Recorded)
    }
}

/// Record `instance_id` as taken for `regimen_id` and persist the store
///
/// The stored list is reloaded first, so doses recorded by another front end
/// are seen. Idempotent. An unknown regimen is logged and ignored.
pub fn mark_taken(store: &mut RegimenStore, regimen_id: &str, instance_id: &str) -> TakeOutcome {
    let mut outcome = TakeOutcome::UnknownRegimen;
    store.modify(|regimens| {
        outcome = record(regimens, regimen_id, instance_id);
        outcome.changed()
    });

    match outcome {
        TakeOutcome::Recorded => tracing::info!("Recorded dose {}", instance_id),
        TakeOutcome::AlreadyTaken => tracing::debug!("Dose {} already recorded", instance_id),
        TakeOutcome::UnknownRegimen => tracing::warn!(
            "Ignoring take for unknown regimen {} (instance {})",
            regimen_id,
            instance_id
        ),
    }
    outcome
}

fn record(regimens: &mut [Regimen], regimen_id: &str, instance_id: &str) -> TakeOutcome {
    let Some(regimen) = regimens.iter_mut().find(|r| r.id == regimen_id) else {
        return TakeOutcome::UnknownRegimen;
    };

    if regimen.has_taken(instance_id) {
        return TakeOutcome::AlreadyTaken;
    }

    regimen.taken_log.push(instance_id.to_string());
    TakeOutcome::Recorded
}
