//! Terminal rendering for the one-shot subcommands: the stats table, the
//! verify report, and spinners around bulk load/extract.
//!
//! Styling is opt-in: with `--theme plain`, `--quiet`, or a non-terminal
//! stdout every method falls back to undecorated text, which is also what
//! the end-to-end tests capture.

use std::io::IsTerminal;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use nu_ansi_term::{Color, Style};

use crate::{StatsReport, VerifyReport};

/// Color scheme selection for decorated output.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Theme {
    /// Decorate only when stdout is a terminal.
    Auto,
    /// Colors tuned for light backgrounds.
    Light,
    /// Colors tuned for dark backgrounds.
    Dark,
    /// No colors, no spinners.
    Plain,
}

/// Renders the index reports for the binary. `styles` is `None` whenever
/// output must stay plain.
pub struct Ui {
    styles: Option<Styles>,
    quiet: bool,
}

impl Ui {
    /// Resolves the theme against `--quiet` and the terminal.
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let styles = if quiet {
            None
        } else {
            match theme {
                Theme::Plain => None,
                Theme::Light => Some(Styles::light()),
                Theme::Dark => Some(Styles::dark()),
                Theme::Auto if std::io::stdout().is_terminal() => Some(Styles::dark()),
                Theme::Auto => None,
            }
        };

        #[cfg(windows)]
        if styles.is_some() {
            let _ = nu_ansi_term::enable_ansi_support();
        }

        Self { styles, quiet }
    }

    /// Reports a completed action on stdout.
    pub fn success(&self, message: &str) {
        match &self.styles {
            Some(styles) => println!("{} {message}", styles.good.paint("ok")),
            None => println!("{message}"),
        }
    }

    /// Reports a problem on stderr without aborting the command.
    pub fn warn(&self, message: &str) {
        match &self.styles {
            Some(styles) => eprintln!("{} {message}", styles.bad.paint("!!")),
            None => eprintln!("{message}"),
        }
    }

    /// Prints the stats report as the same label/value table the shell
    /// shows, split into the file/tree group and the cache counters.
    pub fn stats(&self, report: &StatsReport) {
        self.heading("index");
        self.row("path", &report.path);
        self.row("file size", &format!("{} bytes", report.file_size_bytes));
        self.row("blocks", &report.tree.block_count.to_string());
        self.row("root block", &report.tree.root_block.to_string());
        self.row("height", &report.tree.height.to_string());
        self.row("entries", &report.tree.entries.to_string());

        let cache = &report.tree.cache;
        self.heading("cache");
        self.row("hits", &cache.hits.to_string());
        self.row("misses", &cache.misses.to_string());
        self.row("evictions", &cache.evictions.to_string());
        self.row("writes", &cache.writes.to_string());
    }

    /// Prints the verify outcome: a PASS line, or one line per finding
    /// followed by a summary on stderr.
    pub fn verify(&self, report: &VerifyReport) {
        if report.success {
            self.success("verify: PASS");
            return;
        }
        for finding in &report.findings {
            match &self.styles {
                Some(styles) => println!("{} {finding}", styles.bad.paint("verify:")),
                None => println!("verify: {finding}"),
            }
        }
        self.warn(&format!(
            "verify failed with {} finding(s)",
            report.findings.len()
        ));
    }

    /// Starts a spinner for a bulk operation; inert when quiet. Call
    /// [`Progress::done`] for the elapsed time, or let a drop clear it.
    pub fn progress(&self, message: impl Into<String>) -> Progress {
        let bar = if self.quiet {
            None
        } else {
            let style =
                ProgressStyle::with_template("{spinner} {msg}").expect("static spinner template");
            let bar = ProgressBar::new_spinner().with_style(style);
            bar.set_message(message.into());
            bar.enable_steady_tick(Duration::from_millis(80));
            Some(bar)
        };
        Progress {
            bar,
            started: Instant::now(),
        }
    }

    fn heading(&self, title: &str) {
        match &self.styles {
            Some(styles) => println!("{}", styles.heading.paint(title)),
            None => println!("{title}"),
        }
    }

    fn row(&self, label: &str, value: &str) {
        match &self.styles {
            Some(styles) => {
                println!("  {} {value}", styles.label.paint(format!("{label:<10}")))
            }
            None => println!("  {label:<10} {value}"),
        }
    }
}

/// Spinner handle for load/extract.
pub struct Progress {
    bar: Option<ProgressBar>,
    started: Instant,
}

impl Progress {
    /// Clears the spinner and returns how long the step ran.
    pub fn done(mut self) -> Duration {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
        self.started.elapsed()
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}

/// Formats an elapsed time for the load/extract summaries.
pub fn human_duration(duration: Duration) -> String {
    let millis = duration.as_millis();
    if millis < 1_000 {
        format!("{millis}ms")
    } else {
        format!("{:.2}s", duration.as_secs_f64())
    }
}

struct Styles {
    heading: Style,
    label: Style,
    good: Style,
    bad: Style,
}

impl Styles {
    fn dark() -> Self {
        Self {
            heading: Style::new().fg(Color::Green).bold(),
            label: Style::new().dimmed(),
            good: Style::new().fg(Color::Green),
            bad: Style::new().fg(Color::Red).bold(),
        }
    }

    fn light() -> Self {
        Self {
            heading: Style::new().fg(Color::Blue).bold(),
            label: Style::new().fg(Color::DarkGray),
            good: Style::new().fg(Color::Green),
            bad: Style::new().fg(Color::Red).bold(),
        }
    }
}
