use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Abstraction over how progress and diagnostic messages are emitted.
///
/// Implementations can render to a terminal or suppress output entirely.
/// An `Output` is an optional collaborator: nothing in the engine depends on
/// messages actually reaching anyone, so every method is infallible and
/// write failures are swallowed.
pub trait Output: Send + Sync {
    /// Print an informational message.
    fn message(&self, msg: &str);
    /// Print a success message.
    fn success(&self, msg: &str);
    /// Print a warning message.
    fn warn(&self, msg: &str);
    /// Print an error/failure message.
    fn fail(&self, msg: &str);
}

/// Output implementation that suppresses all messages. Useful for embedding
/// the engine in a UI that has its own reporting, and for tests.
pub struct Quiet;

impl Output for Quiet {
    fn message(&self, _msg: &str) {}

    fn success(&self, _msg: &str) {}

    fn warn(&self, _msg: &str) {}

    fn fail(&self, _msg: &str) {}
}

/// Color-capable terminal renderer for messages.
pub struct Terminal {
    /// Whether and how to colorize output.
    color_choice: ColorChoice,
}

impl Terminal {
    /// Create a new terminal output.
    ///
    /// - `color`: when `true`, always render colored output; when `false`,
    ///   disable ANSI colors.
    pub fn new(color: bool) -> Self {
        let color_choice = if color {
            ColorChoice::Always
        } else {
            ColorChoice::Never
        };
        Self { color_choice }
    }

    /// Write a line to stderr in the given color, ignoring write failures.
    fn write_colored(&self, msg: &str, color: Color) {
        let mut stderr = StandardStream::stderr(self.color_choice);
        #[allow(clippy::let_underscore_must_use)]
        {
            let _ = stderr.set_color(ColorSpec::new().set_fg(Some(color)));
            let _ = writeln!(stderr, "{msg}");
            let _ = stderr.reset();
            let _ = stderr.flush();
        }
    }
}

impl Output for Terminal {
    fn message(&self, msg: &str) {
        self.write_colored(msg, Color::Cyan);
    }

    fn success(&self, msg: &str) {
        self.write_colored(msg, Color::Green);
    }

    fn warn(&self, msg: &str) {
        self.write_colored(msg, Color::Rgb(255, 165, 0)); // Orange
    }

    fn fail(&self, msg: &str) {
        self.write_colored(msg, Color::Red);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_swallows_everything() {
        let quiet = Quiet;
        quiet.message("hello");
        quiet.warn("careful");
        quiet.fail("broken");
    }

    #[test]
    fn test_terminal_never_panics_without_tty() {
        let terminal = Terminal::new(false);
        terminal.message("plain");
        terminal.success("done");
    }
}
