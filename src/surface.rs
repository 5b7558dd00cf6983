use crate::relay::RelayEvent;
use console::{style, Emoji, StyledObject, Term};
use indicatif::{HumanDuration, MultiProgress, ProgressBar, ProgressStyle};
use log::warn;
use std::io::Write;
use std::time::Instant;

/// The interactive side of a conversion. Only the session calls into it, and
/// only from the thread that owns it.
pub trait Surface {
    fn render(&mut self, event: &RelayEvent);

    /// Enable or disable the start control.
    fn set_start_enabled(&mut self, enabled: bool);
}

static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "");
static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "");

/// Console log plus a determinate progress bar, with dialogs printed inline.
pub struct TerminalSurface {
    multi: MultiProgress,
    bar: Option<ProgressBar>,
    started: Option<Instant>,
    prompt: bool,
}

impl TerminalSurface {
    /// `prompt` makes error/success dialogs wait for Enter.
    pub fn new(multi: MultiProgress, prompt: bool) -> Self {
        Self {
            multi,
            bar: None,
            started: None,
            prompt,
        }
    }

    fn println(&self, line: &str) {
        if self.multi.is_hidden() {
            eprintln!("{line}");
        } else {
            let _ = self.multi.println(line);
        }
    }

    fn dialog(&self, title: StyledObject<&str>, message: &str) {
        self.multi.suspend(|| {
            eprintln!();
            eprintln!("{title}");
            for line in message.lines() {
                eprintln!("  {line}");
            }
            eprintln!();
        });

        let term = Term::stderr();
        if self.prompt && term.is_term() {
            let _ = term.write_str("Press Enter to continue...");
            let _ = term.read_line();
        }
    }
}

impl Surface for TerminalSurface {
    fn render(&mut self, event: &RelayEvent) {
        match event {
            RelayEvent::Log(line) => self.println(line),
            RelayEvent::Progress(percent) => {
                if let Some(bar) = &self.bar {
                    bar.set_position(u64::from(*percent));
                }
            }
            RelayEvent::Error(message) => self.dialog(style("Error").red().bold(), message),
            RelayEvent::Success(message) => self.dialog(style("Success").green().bold(), message),
            RelayEvent::Done => {}
        }
    }

    fn set_start_enabled(&mut self, enabled: bool) {
        if enabled {
            if let Some(bar) = self.bar.take() {
                bar.finish();
            }
            if let Some(started) = self.started.take() {
                self.println(&format!("{SPARKLE}Done in {}", HumanDuration(started.elapsed())));
            }
            return;
        }

        let bar_style = ProgressStyle::with_template("{prefix:.bold.dim} [{wide_bar}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        let bar = self.multi.add(ProgressBar::new(100));
        bar.set_style(bar_style);
        bar.set_prefix("convert");

        self.println(&format!(
            "{} {PACKAGE}Converting folder to a single executable...",
            style("[1/1]").bold().dim()
        ));
        self.bar = Some(bar);
        self.started = Some(Instant::now());
    }
}

/// Writes every event as one JSON object per line on stdout.
pub struct JsonSurface<W: Write> {
    out: W,
}

impl JsonSurface<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> JsonSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> Surface for JsonSurface<W> {
    fn render(&mut self, event: &RelayEvent) {
        let written = serde_json::to_writer(&mut self.out, event)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(self.out))
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            warn!("Failed to write event: {e}");
        }
    }

    fn set_start_enabled(&mut self, _enabled: bool) {}
}
