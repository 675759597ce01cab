//! Side effects requested by the scheduler and the alert transitions, and the
//! code that carries them out. Decisions never perform I/O themselves.

use std::{
    io::{IsTerminal, Write},
    sync::Mutex,
};

use anyhow::Result;

use crate::{audio::AudioEngineHandle, models::Medication, settings::AlarmStyle};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

pub const VIBRATION_PATTERN: &[u64] = &[500, 200, 500, 200, 500];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertNotification {
    pub medication_id: String,
    pub title: String,
    pub body: String,
    /// Same tag per medication, so a repeat replaces the previous notification.
    pub tag: String,
}

impl AlertNotification {
    pub fn for_medication(med: &Medication) -> Self {
        let mut body = format!("Dose: {}.", med.dose);
        if let Some(notes) = med.notes.as_deref().filter(|n| !n.is_empty()) {
            body.push_str(&format!("\nNote: {notes}"));
        }
        body.push_str("\n\nCLICK TO MARK AS TAKEN");

        Self {
            medication_id: med.id.clone(),
            title: format!("ALARM: Take {}", med.name),
            body,
            tag: format!("med-alarm-{}", med.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertEffect {
    Notify(AlertNotification),
    Vibrate(&'static [u64]),
    StartAlarm(AlarmStyle),
    StopAlarm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationPermission {
    Default,
    Granted,
    Denied,
}

/// The notification and haptics surface of the host.
pub trait EffectSink: Send + Sync {
    fn permission(&self) -> NotificationPermission;

    /// Ask the user once; returns the resulting permission.
    fn request_permission(&self) -> NotificationPermission;

    /// The notification's primary action must resolve the dose as taken.
    fn notify(&self, notification: &AlertNotification) -> Result<()>;

    fn vibrate(&self, pattern: &[u64]) -> Result<()>;
}

/// Run requested effects in order. Failures are logged and never stop the
/// remaining effects.
pub fn execute_effects(
    effects: &[AlertEffect],
    sink: &dyn EffectSink,
    audio: &AudioEngineHandle,
) {
    for effect in effects {
        match effect {
            AlertEffect::Notify(notification) => {
                if sink.permission() != NotificationPermission::Granted {
                    log_debug!(
                        "notification permission not granted; skipping {}",
                        notification.tag
                    );
                    continue;
                }
                if let Err(err) = sink.notify(notification) {
                    log_error!("failed to raise notification {}: {err:#}", notification.tag);
                }
            }
            AlertEffect::Vibrate(pattern) => {
                if let Err(err) = sink.vibrate(pattern) {
                    log_error!("vibration failed: {err:#}");
                }
            }
            AlertEffect::StartAlarm(style) => {
                if let Err(err) = audio.start_alarm(*style) {
                    log_error!("failed to start alarm tone: {err}");
                }
            }
            AlertEffect::StopAlarm => {
                if let Err(err) = audio.stop_alarm() {
                    log_error!("failed to stop alarm tone: {err}");
                }
            }
        }
    }
}

/// Notifications written to the controlling terminal. Permission is granted
/// when stdout is a terminal someone can see.
pub struct TerminalEffects {
    permission: Mutex<NotificationPermission>,
}

impl TerminalEffects {
    pub fn new() -> Self {
        Self {
            permission: Mutex::new(NotificationPermission::Default),
        }
    }

    fn set_permission(&self, permission: NotificationPermission) {
        let mut guard = match self.permission.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = permission;
    }
}

impl Default for TerminalEffects {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectSink for TerminalEffects {
    fn permission(&self) -> NotificationPermission {
        match self.permission.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn request_permission(&self) -> NotificationPermission {
        let permission = if std::io::stdout().is_terminal() {
            NotificationPermission::Granted
        } else {
            NotificationPermission::Denied
        };
        log_info!("notification permission: {:?}", permission);
        self.set_permission(permission);
        permission
    }

    fn notify(&self, notification: &AlertNotification) -> Result<()> {
        let mut out = std::io::stdout().lock();
        // BEL so the terminal flashes or beeps even while audio is locked.
        writeln!(out, "\x07\n*** {} ***", notification.title)?;
        for line in notification.body.lines().filter(|line| !line.is_empty()) {
            writeln!(out, "    {line}")?;
        }
        writeln!(out, "    (reply `take {}`)", notification.medication_id)?;
        out.flush()?;
        Ok(())
    }

    fn vibrate(&self, pattern: &[u64]) -> Result<()> {
        log_debug!("no vibration motor on a terminal; pattern {:?} dropped", pattern);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records every effect it is asked to perform.
    pub struct RecordingSink {
        pub permission: Mutex<NotificationPermission>,
        pub notifications: Mutex<Vec<AlertNotification>>,
        pub vibrations: Mutex<Vec<Vec<u64>>>,
    }

    impl RecordingSink {
        pub fn granted() -> Self {
            Self {
                permission: Mutex::new(NotificationPermission::Granted),
                notifications: Mutex::new(Vec::new()),
                vibrations: Mutex::new(Vec::new()),
            }
        }

        pub fn denied() -> Self {
            let sink = Self::granted();
            *sink.permission.lock().unwrap() = NotificationPermission::Denied;
            sink
        }

        pub fn notified(&self) -> Vec<AlertNotification> {
            self.notifications.lock().unwrap().clone()
        }
    }

    impl EffectSink for RecordingSink {
        fn permission(&self) -> NotificationPermission {
            *self.permission.lock().unwrap()
        }

        fn request_permission(&self) -> NotificationPermission {
            self.permission()
        }

        fn notify(&self, notification: &AlertNotification) -> Result<()> {
            self.notifications.lock().unwrap().push(notification.clone());
            Ok(())
        }

        fn vibrate(&self, pattern: &[u64]) -> Result<()> {
            self.vibrations.lock().unwrap().push(pattern.to_vec());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;
    use crate::models::{DoseTime, Frequency};
    use chrono::Utc;

    fn med(notes: Option<&str>) -> Medication {
        Medication {
            id: "m1".into(),
            name: "Lisinopril".into(),
            dose: "10mg".into(),
            time: DoseTime::new(8, 0).unwrap(),
            frequency: Frequency::Daily,
            duration_days: 30,
            remaining_doses: 30,
            refill_threshold: 5,
            expiry_date: None,
            notes: notes.map(str::to_string),
            ai_insight: None,
            start_date: Utc::now(),
        }
    }

    #[test]
    fn notification_text() {
        let plain = AlertNotification::for_medication(&med(None));
        assert_eq!(plain.title, "ALARM: Take Lisinopril");
        assert_eq!(plain.body, "Dose: 10mg.\n\nCLICK TO MARK AS TAKEN");
        assert_eq!(plain.tag, "med-alarm-m1");

        let noted = AlertNotification::for_medication(&med(Some("with food")));
        assert_eq!(noted.body, "Dose: 10mg.\nNote: with food\n\nCLICK TO MARK AS TAKEN");
    }

    #[test]
    fn notify_requires_permission() {
        let audio = AudioEngineHandle::new();
        let effects = vec![
            AlertEffect::Notify(AlertNotification::for_medication(&med(None))),
            AlertEffect::Vibrate(VIBRATION_PATTERN),
        ];

        let denied = RecordingSink::denied();
        execute_effects(&effects, &denied, &audio);
        assert!(denied.notified().is_empty());
        assert_eq!(denied.vibrations.lock().unwrap().len(), 1);

        let granted = RecordingSink::granted();
        execute_effects(&effects, &granted, &audio);
        assert_eq!(granted.notified().len(), 1);
    }
}
