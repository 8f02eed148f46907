//! Destinations for the composed status line

use std::ffi::CString;
use std::io::Write;

use crate::error::{Error, Result};

/// Something that displays the status line
///
/// The line is handed over as raw bytes; command output is never re-encoded.
pub trait OutputSink {
    fn publish(&mut self, status: &[u8]) -> Result<()>;
}

/// Writes one line per update and flushes immediately
pub struct StdoutSink<W: Write = std::io::Stdout> {
    out: W,
}

impl StdoutSink {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> StdoutSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> OutputSink for StdoutSink<W> {
    fn publish(&mut self, status: &[u8]) -> Result<()> {
        self.out.write_all(status)?;
        self.out.write_all(b"\n")?;
        self.out.flush()?;
        Ok(())
    }
}

/// Sets the name of the X root window, which dwm shows as its status text
///
/// A display connection is opened and closed for every update. Failing to
/// open it is an error the caller treats as fatal.
#[derive(Debug, Default)]
pub struct RootWindowSink {
    display: Option<String>,
}

impl RootWindowSink {
    /// Uses the display named by `$DISPLAY`
    pub fn new() -> Self {
        Self { display: None }
    }

    /// Uses an explicit display name such as `:1`
    pub fn with_display(display: impl Into<String>) -> Self {
        Self {
            display: Some(display.into()),
        }
    }

    fn display_label(&self) -> String {
        match &self.display {
            Some(name) => name.clone(),
            None => std::env::var("DISPLAY").unwrap_or_else(|_| "DISPLAY not set".to_string()),
        }
    }
}

impl OutputSink for RootWindowSink {
    fn publish(&mut self, status: &[u8]) -> Result<()> {
        use std::os::raw::c_char;
        use x11::xlib;

        let name = without_nul(status);
        let display_name = match &self.display {
            Some(display) => Some(
                CString::new(display.as_str())
                    .map_err(|_| Error::DisplayUnavailable(self.display_label()))?,
            ),
            None => None,
        };

        unsafe {
            let display = xlib::XOpenDisplay(
                display_name
                    .as_ref()
                    .map_or(std::ptr::null(), |name| name.as_ptr()),
            );
            if display.is_null() {
                return Err(Error::DisplayUnavailable(self.display_label()));
            }
            let screen = xlib::XDefaultScreen(display);
            let root = xlib::XRootWindow(display, screen);
            xlib::XStoreName(display, root, name.as_ptr() as *mut c_char);
            xlib::XCloseDisplay(display);
        }

        Ok(())
    }
}

fn without_nul(status: &[u8]) -> CString {
    let bytes: Vec<u8> = status.iter().copied().filter(|&b| b != 0).collect();
    // no interior NUL is left, so this cannot fail
    CString::new(bytes).unwrap_or_default()
}

/// Collects published lines in memory
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    lines: std::rc::Rc<std::cell::RefCell<Vec<Vec<u8>>>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .borrow()
            .iter()
            .map(|line| String::from_utf8_lossy(line).into_owned())
            .collect()
    }

    pub fn raw_lines(&self) -> Vec<Vec<u8>> {
        self.lines.borrow().clone()
    }
}

#[cfg(test)]
impl OutputSink for RecordingSink {
    fn publish(&mut self, status: &[u8]) -> Result<()> {
        self.lines.borrow_mut().push(status.to_vec());
        Ok(())
    }
}
