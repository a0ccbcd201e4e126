pub mod deadline;
pub mod gradelog;
pub mod lab;
pub mod requirements;
#[cfg(test)]
mod testing;

use std::sync::Mutex;

pub use lab::{Grader, LabSummary, RepoOutcome};
use lab_grader_core::{
    models::Notification,
    service::{ErrorReporter, TracingReporter},
};

/// Logs notifications and keeps them for the end-of-run report.
#[derive(Default)]
pub struct Notifications {
    items: Mutex<Vec<Notification>>,
}

impl Notifications {
    pub fn take(&self) -> Vec<Notification> {
        self.items.lock().map(|mut items| std::mem::take(&mut *items)).unwrap_or_default()
    }
}

impl ErrorReporter for Notifications {
    fn report(&self, notification: Notification) {
        TracingReporter.report(notification.clone());
        if let Ok(mut items) = self.items.lock() {
            items.push(notification);
        }
    }
}
