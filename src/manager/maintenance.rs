use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, error};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background thread running a task every `interval` until stopped.
///
/// Task errors and panics are logged and the timer keeps running.
pub struct MaintenanceTimer {
    stop: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl MaintenanceTimer {
    pub fn start<F>(name: &str, interval: Duration, task: F) -> std::io::Result<Self>
    where
        F: Fn() -> anyhow::Result<()> + Send + 'static,
    {
        let (stop, stopped) = bounded::<()>(1);
        let thread_name = name.to_string();
        let handle = thread::Builder::new().name(thread_name.clone()).spawn(move || {
            loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => run_guarded(&thread_name, &task),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("{} stopped", thread_name);
        })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signals the thread and waits for the current run to finish.
    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.stop.try_send(());
        if handle.join().is_err() {
            error!("Maintenance thread terminated abnormally");
        }
    }
}

impl Drop for MaintenanceTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_guarded<F>(name: &str, task: &F)
where
    F: Fn() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("{} task failed: {:#}", name, e),
        Err(_) => error!("{} task panicked", name),
    }
}
