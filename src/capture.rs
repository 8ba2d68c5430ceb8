//! Scoped redirection of script stdout.
//!
//! Everything a snippet prints goes through [`write_stdout`]. While a
//! [`StdoutCapture`] guard is alive, that text lands in the guard's private
//! buffer instead of the process stdout. Guards nest: the innermost one wins.

use std::{
    cell::RefCell,
    io::{self, Write},
};

thread_local! {
    static CAPTURES: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Writes script output to the active capture buffer, or to the real stdout
/// when nothing is capturing.
pub fn write_stdout(text: &str) {
    let captured = CAPTURES.with(|stack| match stack.borrow_mut().last_mut() {
        Some(buffer) => {
            buffer.push_str(text);
            true
        }
        None => false,
    });
    if !captured {
        let mut stdout = io::stdout().lock();
        // Output is best-effort once it leaves the capture layer.
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

/// Number of captures currently active on this thread.
pub fn depth() -> usize {
    CAPTURES.with(|stack| stack.borrow().len())
}

/// RAII guard for one capture scope. Released exactly once: by
/// [`StdoutCapture::finish`] on the normal path, or by `Drop` while unwinding.
#[must_use = "dropping the guard immediately ends the capture"]
pub struct StdoutCapture {
    level: usize,
    released: bool,
}

impl StdoutCapture {
    pub fn begin() -> Self {
        let level = CAPTURES.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(String::new());
            stack.len()
        });
        log::trace!("stdout capture acquired at depth {level}");
        Self {
            level,
            released: false,
        }
    }

    /// Ends the capture and returns everything written during it.
    pub fn finish(mut self) -> String {
        self.release()
    }

    fn release(&mut self) -> String {
        self.released = true;
        let text = CAPTURES.with(|stack| {
            let mut stack = stack.borrow_mut();
            // Inner guards leaked past their scope are discarded with this one.
            stack.truncate(self.level);
            stack.pop().unwrap_or_default()
        });
        log::trace!("stdout capture released at depth {}", self.level);
        text
    }
}

impl Drop for StdoutCapture {
    fn drop(&mut self) {
        if !self.released {
            self.release();
        }
    }
}
