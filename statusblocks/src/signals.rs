//! Signal delivery for triggers, clicks and termination
//!
//! Handlers never touch block state. Each one writes a fixed-size record to
//! a non-blocking datagram socket and returns; the main loop waits on the
//! other end of the pair with a timeout, so the wait doubles as the timer.

use std::io;
use std::os::unix::net::UnixDatagram;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::blocks::BlockRegistry;
use crate::error::{Error, Result};

/// Offset of the first real-time signal in the numbering the `kill` commands
/// of existing block scripts were written against (glibc `SIGRTMIN`)
pub const REFERENCE_COMPLETION_OFFSET: i32 = 34;

const EVENT_LEN: usize = 8;

/// Something that happened outside the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Refresh the block bound to this trigger id
    Trigger(u32),
    /// A bar button was pressed on the block bound to `signal`
    Click { signal: u32, button: u32 },
    /// SIGTERM or SIGINT
    Terminate,
}

impl Event {
    const KIND_TRIGGER: u32 = 1;
    const KIND_CLICK: u32 = 2;
    const KIND_TERMINATE: u32 = 3;

    /// Split a click payload: button in the low byte, trigger id above it
    pub fn from_click_payload(payload: u32) -> Self {
        Event::Click {
            signal: payload >> 8,
            button: payload & 0xff,
        }
    }

    fn encode(self) -> [u8; EVENT_LEN] {
        let (kind, value) = match self {
            Event::Trigger(signal) => (Self::KIND_TRIGGER, signal),
            Event::Click { signal, button } => (Self::KIND_CLICK, (signal << 8) | (button & 0xff)),
            Event::Terminate => (Self::KIND_TERMINATE, 0),
        };
        let mut buf = [0u8; EVENT_LEN];
        buf[..4].copy_from_slice(&kind.to_ne_bytes());
        buf[4..].copy_from_slice(&value.to_ne_bytes());
        buf
    }

    fn decode(buf: &[u8; EVENT_LEN]) -> Option<Self> {
        let kind = u32::from_ne_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let value = u32::from_ne_bytes([buf[4], buf[5], buf[6], buf[7]]);
        match kind {
            Self::KIND_TRIGGER => Some(Event::Trigger(value)),
            Self::KIND_CLICK => Some(Self::from_click_payload(value)),
            Self::KIND_TERMINATE => Some(Event::Terminate),
            _ => None,
        }
    }
}

/// Source of events for the scheduler loop
pub trait EventSource {
    /// Wait for the next event until `deadline`
    ///
    /// Returns `Ok(None)` once the deadline has passed. With no deadline the
    /// call blocks until an event arrives.
    fn next_event(&mut self, deadline: Option<Instant>) -> io::Result<Option<Event>>;
}

/// Self-pipe connecting signal handlers to the main loop
pub struct SignalQueue {
    rx: UnixDatagram,
    tx: Arc<UnixDatagram>,
}

impl SignalQueue {
    pub fn new() -> io::Result<Self> {
        let (tx, rx) = UnixDatagram::pair()?;
        tx.set_nonblocking(true)?;
        Ok(Self {
            rx,
            tx: Arc::new(tx),
        })
    }

    pub fn notifier(&self) -> Notifier {
        Notifier(self.tx.clone())
    }
}

impl EventSource for SignalQueue {
    fn next_event(&mut self, deadline: Option<Instant>) -> io::Result<Option<Event>> {
        loop {
            let timeout = match deadline {
                None => None,
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline <= now {
                        return Ok(None);
                    }
                    Some(deadline - now)
                }
            };
            self.rx.set_read_timeout(timeout)?;

            let mut buf = [0u8; EVENT_LEN];
            match self.rx.recv(&mut buf) {
                Ok(EVENT_LEN) => match Event::decode(&buf) {
                    Some(event) => return Ok(Some(event)),
                    None => log::debug!("dropping malformed event {:?}", buf),
                },
                Ok(n) => log::debug!("dropping short event ({} bytes)", n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                // the timeout may fire a little early, the loop re-checks
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                    ) =>
                {
                    if deadline.is_none() {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Write end of the queue, safe to use from a signal handler
#[derive(Clone)]
pub struct Notifier(Arc<UnixDatagram>);

impl Notifier {
    /// Queue `event`; dropped silently if the queue is full
    pub fn notify(&self, event: Event) {
        let _ = self.0.send(&event.encode());
    }
}

/// Number of the real-time signal carrying trigger 0
#[cfg(target_os = "linux")]
pub fn default_signal_base() -> i32 {
    libc::SIGRTMIN()
}

#[cfg(not(target_os = "linux"))]
pub fn default_signal_base() -> i32 {
    REFERENCE_COMPLETION_OFFSET
}

/// Highest trigger id that still maps onto a real-time signal
#[cfg(target_os = "linux")]
pub fn max_signal(base: i32) -> u32 {
    (libc::SIGRTMAX() - base).max(0) as u32
}

#[cfg(not(target_os = "linux"))]
pub fn max_signal(_base: i32) -> u32 {
    31
}

/// Reject a base outside the real-time signal range
///
/// Trigger ids are added to the base, so a base below `SIGRTMIN` would bind
/// ordinary signals such as SIGTERM or SIGKILL.
#[cfg(target_os = "linux")]
pub fn check_signal_base(base: i32) -> Result<()> {
    let (min, max) = (libc::SIGRTMIN(), libc::SIGRTMAX());
    if (min..=max).contains(&base) {
        Ok(())
    } else {
        Err(Error::SignalBaseOutOfRange { base, min, max })
    }
}

#[cfg(not(target_os = "linux"))]
pub fn check_signal_base(_base: i32) -> Result<()> {
    Ok(())
}

/// Install every handler the status line needs
///
/// Termination clears `running` and wakes the loop. Children are reaped by
/// the kernel. Triggers and clicks are registered where supported.
pub fn install(
    registry: &BlockRegistry,
    base: i32,
    notifier: &Notifier,
    running: &Arc<AtomicBool>,
) -> Result<()> {
    check_signal_base(base)?;

    for signal in [libc::SIGTERM, libc::SIGINT] {
        let notifier = notifier.clone();
        let running = running.clone();
        unsafe {
            signal_hook::low_level::register(signal, move || {
                running.store(false, Ordering::SeqCst);
                notifier.notify(Event::Terminate);
            })
        }
        .map_err(|source| Error::Signal { signal, source })?;
    }

    reap_children()?;
    install_triggers(registry, base, notifier)
}

fn reap_children() -> Result<()> {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    let action = SigAction::new(SigHandler::SigDfl, SaFlags::SA_NOCLDWAIT, SigSet::empty());
    unsafe { sigaction(Signal::SIGCHLD, &action) }.map_err(|errno| Error::Signal {
        signal: libc::SIGCHLD,
        source: errno.into(),
    })?;
    Ok(())
}

#[cfg(target_os = "linux")]
fn install_triggers(registry: &BlockRegistry, base: i32, notifier: &Notifier) -> Result<()> {
    // an unhandled real-time signal would terminate the process
    for signal in libc::SIGRTMIN()..=libc::SIGRTMAX() {
        unsafe {
            libc::signal(signal, libc::SIG_IGN);
        }
    }

    for id in registry.signals() {
        let signal = base + id as i32;
        let notifier = notifier.clone();
        unsafe {
            signal_hook::low_level::register(signal, move || notifier.notify(Event::Trigger(id)))
        }
        .map_err(|source| Error::Signal { signal, source })?;
        log::debug!("trigger {} bound to signal {}", id, signal);
    }

    let notifier = notifier.clone();
    unsafe {
        signal_hook_registry::register_sigaction(libc::SIGUSR1, move |info: &libc::siginfo_t| {
            notifier.notify(Event::from_click_payload(click_payload(info)));
        })
    }
    .map_err(|source| Error::Signal {
        signal: libc::SIGUSR1,
        source,
    })?;

    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn install_triggers(registry: &BlockRegistry, _base: i32, _notifier: &Notifier) -> Result<()> {
    if registry.signals().next().is_some() {
        log::warn!("signal triggers are not supported on this platform, running timer-only");
    }
    Ok(())
}

/// Integer carried by `sigqueue`
#[cfg(target_os = "linux")]
fn click_payload(info: &libc::siginfo_t) -> u32 {
    sival_int(unsafe { info.si_value().sival_ptr } as usize)
}

/// Read `sival_int` out of the pointer-sized `sigval` union
///
/// The int shares the union's first bytes, which are the high half of the
/// pointer on 64-bit big-endian targets.
#[cfg(target_os = "linux")]
fn sival_int(raw: usize) -> u32 {
    #[cfg(all(target_endian = "big", target_pointer_width = "64"))]
    let raw = raw >> 32;
    raw as u32
}
