//! The main loop: timed refreshes interleaved with trigger and click events

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bar::StatusBar;
use crate::click::ClickLauncher;
use crate::error::Result;
use crate::signals::{Event, EventSource};
use crate::sink::OutputSink;

/// Drives a [`StatusBar`] until termination
pub struct Scheduler {
    bar: StatusBar,
    sink: Box<dyn OutputSink>,
    launcher: Box<dyn ClickLauncher>,
    running: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(
        bar: StatusBar,
        sink: Box<dyn OutputSink>,
        launcher: Box<dyn ClickLauncher>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            bar,
            sink,
            launcher,
            running,
        }
    }

    pub fn bar(&self) -> &StatusBar {
        &self.bar
    }

    /// Run until a termination event, or until `events` runs dry when no
    /// block has a timer
    ///
    /// Sink failures end the loop with an error.
    pub fn run<E: EventSource>(&mut self, events: &mut E) -> Result<()> {
        let tick = self.bar.registry().base_tick();
        match tick {
            Some(secs) => log::info!("base tick is {}s", secs),
            None => log::info!("no timed blocks, waiting for triggers only"),
        }

        let mut elapsed: u64 = 0;
        while self.running.load(Ordering::SeqCst) {
            self.bar.refresh_due(elapsed);
            self.bar.publish(self.sink.as_mut())?;

            // events do not restart the tick, the wait resumes until the
            // same deadline
            let deadline = tick.map(|secs| Instant::now() + Duration::from_secs(secs));
            while let Some(event) = events.next_event(deadline)? {
                if !self.handle(event)? {
                    return Ok(());
                }
            }

            let Some(secs) = tick else {
                log::debug!("event source closed");
                return Ok(());
            };
            elapsed = elapsed.wrapping_add(secs);
        }

        Ok(())
    }

    /// Returns false once the loop should stop
    fn handle(&mut self, event: Event) -> Result<bool> {
        log::debug!("event {:?}", event);
        match event {
            Event::Terminate => {
                self.running.store(false, Ordering::SeqCst);
                return Ok(false);
            }
            Event::Trigger(signal) => match self.bar.trigger(signal) {
                Ok(_) => {
                    self.bar.publish(self.sink.as_mut())?;
                }
                Err(e) => log::warn!("{}", e),
            },
            Event::Click { signal, button } => {
                let block = self
                    .bar
                    .registry()
                    .find_by_signal(signal)
                    .and_then(|index| self.bar.registry().get(index));
                match block {
                    Some(block) => {
                        if let Err(e) = self.launcher.launch(block, button) {
                            log::warn!("click on `{}` failed: {}", block.command, e);
                        }
                    }
                    None => log::error!("invalid update signal: {}", signal),
                }
            }
        }
        Ok(self.running.load(Ordering::SeqCst))
    }
}
