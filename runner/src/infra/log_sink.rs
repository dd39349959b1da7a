//! Infrastructure implementation of the `LogSink` port.

use crate::application::ports::LogSink;

/// Prints remote log lines verbatim on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutLogSink;

impl LogSink for StdoutLogSink {
    fn line(&self, line: &str) {
        println!("{line}");
    }
}
