//! Progress reporting for hosts.

/// One-way sink for human-readable progress messages.
///
/// Called synchronously from the thread running the transform; hosts with a
/// UI thread must marshal messages themselves.
pub trait StatusSink {
    /// Deliver a single progress message.
    fn status(&self, message: &str);
}

impl<F> StatusSink for F
where
    F: Fn(&str),
{
    fn status(&self, message: &str) {
        self(message)
    }
}

/// Sink that forwards every message to the `log` facade at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn status(&self, message: &str) {
        log::info!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_closure_sink() {
        let seen = RefCell::new(Vec::new());
        let sink = |msg: &str| seen.borrow_mut().push(msg.to_string());
        sink.status("one");
        sink.status("two");
        assert_eq!(*seen.borrow(), vec!["one", "two"]);
    }
}
