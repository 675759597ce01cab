pub mod tone;

pub use tone::AlarmTone;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, Receiver, Sender},
    Mutex,
};
use std::thread;

use crate::settings::AlarmStyle;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info};

enum AudioCommand {
    StartAlarm(AlarmStyle),
    Stop,
}

/// Alarm playback. The output device lives on a dedicated thread; this
/// handle only sends it commands. Nothing plays until `unlock` has been
/// called from a user gesture.
pub struct AudioEngineHandle {
    tx: Mutex<Option<Sender<AudioCommand>>>,
    unlocked: AtomicBool,
    sounding: AtomicBool,
}

impl AudioEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
            unlocked: AtomicBool::new(false),
            sounding: AtomicBool::new(false),
        }
    }

    /// Record that the user has interacted; playback is allowed from now on.
    pub fn unlock(&self) {
        if !self.unlocked.swap(true, Ordering::SeqCst) {
            log_info!("audio unlocked");
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.unlocked.load(Ordering::SeqCst)
    }

    pub fn is_sounding(&self) -> bool {
        self.sounding.load(Ordering::SeqCst)
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
        let mut guard = self.tx.lock().map_err(|e| e.to_string())?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();
        thread::Builder::new()
            .name("audio-engine".to_string())
            .spawn(move || run_engine(rx))
            .map_err(|e| e.to_string())?;

        *guard = Some(tx.clone());
        Ok(tx)
    }

    /// Start the repeating tone. Does nothing while locked or when a tone is
    /// already sounding.
    pub fn start_alarm(&self, style: AlarmStyle) -> Result<(), String> {
        if !self.is_unlocked() {
            log_debug!("audio still locked; alarm stays silent");
            return Ok(());
        }
        if self.sounding.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let tx = match self.ensure_thread() {
            Ok(tx) => tx,
            Err(err) => {
                self.sounding.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };
        tx.send(AudioCommand::StartAlarm(style)).map_err(|e| {
            self.sounding.store(false, Ordering::SeqCst);
            e.to_string()
        })
    }

    /// Stop any tone. Safe to call at any time.
    pub fn stop_alarm(&self) -> Result<(), String> {
        self.sounding.store(false, Ordering::SeqCst);
        if let Ok(Some(tx)) = self.tx.lock().map(|g| g.clone()) {
            let _ = tx.send(AudioCommand::Stop);
        }
        Ok(())
    }
}

impl Default for AudioEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for AudioEngineHandle {
    fn drop(&mut self) {
        if let Err(err) = self.stop_alarm() {
            log_error!("failed to stop alarm on teardown: {err}");
        }
    }
}

#[cfg(feature = "audio")]
fn run_engine(rx: Receiver<AudioCommand>) {
    use rodio::{OutputStream, Sink};

    let mut _stream: Option<OutputStream> = None;
    let mut sink: Option<Sink> = None;

    fn ensure_sink(
        stream: &mut Option<OutputStream>,
        sink: &mut Option<Sink>,
    ) -> Result<(), String> {
        if sink.is_none() {
            let (s, handle) = OutputStream::try_default()
                .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
            let new_sink =
                Sink::try_new(&handle).map_err(|e| format!("Failed to create audio sink: {}", e))?;
            *stream = Some(s);
            *sink = Some(new_sink);
        }
        Ok(())
    }

    while let Ok(cmd) = rx.recv() {
        match cmd {
            AudioCommand::StartAlarm(style) => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
                _stream = None;
                if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                    log_error!("{err}");
                    continue;
                }
                if let Some(ref s) = sink {
                    s.append(AlarmTone::new(style));
                }
            }
            AudioCommand::Stop => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
                _stream = None;
            }
        }
    }
}

/// Builds without an output device only report what would have played.
#[cfg(not(feature = "audio"))]
fn run_engine(rx: Receiver<AudioCommand>) {
    while let Ok(cmd) = rx.recv() {
        match cmd {
            AudioCommand::StartAlarm(style) => {
                log_info!("alarm tone {:?} requested (built without audio output)", style)
            }
            AudioCommand::Stop => log_debug!("alarm tone stopped"),
        }
    }
}
