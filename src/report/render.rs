use std::io;

use colored::Colorize;

use super::{Findings, Report};
use crate::{
    event::Event,
    ledger::{History, Ledger},
    util::format::{format_size, ADDRESS_WIDTH},
};

/// Columns between the two `|` borders
const INNER: usize = 60;

/// Total width of every line of the report table
pub const REPORT_WIDTH: usize = INNER + 2;

#[derive(Clone, Copy)]
enum Style {
    Title,
    Error,
    Warning,
    Info,
    Muted,
    Plain,
}

fn short_event(event: &Event) -> String {
    format!(
        "{} {:<7} {:<6} at {}",
        event.block(),
        event.kind(),
        format_size(event.requested_size() as u64),
        event.site()
    )
}

fn zero_sized_event(event: &Event) -> String {
    match event.new_address() {
        Some(_) => short_event(event),
        None => format!("{} -> nil", short_event(event)),
    }
}

fn unresolved_event(event: &Event) -> String {
    format!(
        "{:<7} {:#x} at {}",
        event.kind(),
        event.previous_address().unwrap_or(0),
        event.site()
    )
}

fn history_event(event: &Event) -> String {
    format!(
        " -> {:<7} {:<6} at {}",
        event.kind(),
        format_size(event.requested_size() as u64),
        event.site()
    )
}

pub(super) struct Renderer<'w, W>
where
    W: io::Write + ?Sized,
{
    out: &'w mut W,
    color: bool,
}

impl<'w, W> Renderer<'w, W>
where
    W: io::Write + ?Sized,
{
    pub(super) fn new(out: &'w mut W, color: bool) -> Self {
        Self { out, color }
    }

    fn paint(&self, text: String, style: Style) -> String {
        if !self.color {
            return text;
        }
        match style {
            Style::Title => text.bold().to_string(),
            Style::Error => text.red().to_string(),
            Style::Warning => text.yellow().to_string(),
            Style::Info => text.cyan().to_string(),
            Style::Muted => text.dimmed().to_string(),
            Style::Plain => text,
        }
    }

    fn banner(&mut self, title: &str) -> io::Result<()> {
        let line = format!("+{:=^width$}+", title, width = INNER);
        writeln!(self.out, "{}", self.paint(line, Style::Title))
    }

    fn section(&mut self, title: &str) -> io::Result<()> {
        let line = format!("+--{:-<width$}+", title, width = INNER - 2);
        writeln!(self.out, "{}", self.paint(line, Style::Title))
    }

    fn row(&mut self, text: &str, style: Style) -> io::Result<()> {
        let padded = format!("{:<width$}", text, width = INNER);
        writeln!(self.out, "|{}|", self.paint(padded, style))
    }

    fn none_found(&mut self) -> io::Result<()> {
        self.row("  none found", Style::Muted)
    }

    fn note(&mut self, lines: &[&str]) -> io::Result<()> {
        for (i, line) in lines.iter().enumerate() {
            let prefix = if i == 0 { "Note: " } else { "      " };
            self.row(&format!("{prefix}{line}"), Style::Muted)?;
        }
        Ok(())
    }

    fn events(
        &mut self,
        label: &str,
        events: &[&Event],
        style: Style,
        line: fn(&Event) -> String,
    ) -> io::Result<()> {
        if events.is_empty() {
            return Ok(());
        }
        self.row(&format!("{label} ({}):", events.len()), Style::Plain)?;
        for event in events {
            self.row(&line(event), style)?;
        }
        Ok(())
    }

    pub(super) fn report(&mut self, report: &Report<'_>, show_history: bool) -> io::Result<()> {
        writeln!(self.out)?;
        self.banner(" allocheck report ")?;
        self.statistics(report)?;
        self.missing_frees(report, show_history)?;
        self.zero_sized(&report.zero_sized)?;
        self.failed(&report.failed)?;
        self.null_arguments(&report.null_arguments)?;
        self.unresolved(&report.unresolved)?;
        self.repeated_releases(&report.repeated_releases)?;
        self.banner("")
    }

    fn statistics(&mut self, report: &Report<'_>) -> io::Result<()> {
        let counts = report.counts;
        self.section("Statistics")?;
        self.row(
            &format!(
                "Total allocs/reallocs/frees: {:05}/{:05}/{:05}",
                counts.allocations, counts.resizes, counts.releases
            ),
            Style::Plain,
        )?;
        let lost = if report.leaks.is_empty() {
            Style::Plain
        } else {
            Style::Error
        };
        self.row(&format!("Blocks lost: {:05}", report.leaks.len()), lost)?;
        self.row(
            &format!("Total memory lost: ~{}", format_size(report.leaks.bytes)),
            lost,
        )?;
        self.row(
            &format!(
                "Total zero-sized allocs/reallocs: {:05}/{:05}",
                report.zero_sized.allocations.len(),
                report.zero_sized.resizes.len()
            ),
            Style::Plain,
        )?;
        self.row(
            &format!(
                "Total failed allocs/reallocs: {:05}/{:05}",
                report.failed.allocations.len(),
                report.failed.resizes.len()
            ),
            Style::Plain,
        )?;
        self.row(
            &format!(
                "Total null-argument reallocs/frees: {:05}/{:05}",
                report.null_arguments.resizes.len(),
                report.null_arguments.releases.len()
            ),
            Style::Plain,
        )?;
        self.row(
            &format!(
                "Total unresolved reallocs/frees: {:05}/{:05}",
                report.unresolved.resizes.len(),
                report.unresolved.releases.len()
            ),
            Style::Plain,
        )?;
        self.row(
            &format!(
                "Total blocks freed more than once: {:05}",
                report.repeated_releases.len()
            ),
            Style::Plain,
        )
    }

    fn missing_frees(&mut self, report: &Report<'_>, show_history: bool) -> io::Result<()> {
        self.section("Missing frees")?;
        if report.leaks.is_empty() {
            return self.none_found();
        }
        for history in &report.leaks.blocks {
            self.lost_block(history, show_history)?;
        }
        Ok(())
    }

    fn lost_block(&mut self, history: &History<'_>, show_history: bool) -> io::Result<()> {
        let size = format_size(history.current_size().unwrap_or(0) as u64);
        let heading = match history.origin() {
            Some(origin) => format!("Block {}: {:<6} at {}", history.block(), size, origin.site()),
            None => format!("Block {}: {:<6}", history.block(), size),
        };
        self.row(&heading, Style::Error)?;
        if show_history {
            for event in history.iter() {
                self.row(&history_event(event), Style::Plain)?;
            }
        }
        Ok(())
    }

    fn zero_sized(&mut self, findings: &Findings<'_>) -> io::Result<()> {
        self.section("Zero-sized operations")?;
        if findings.is_empty() {
            return self.none_found();
        }
        let style = Style::Warning;
        self.events("Zero-sized allocs", &findings.allocations, style, zero_sized_event)?;
        self.events("Zero-sized reallocs", &findings.resizes, style, zero_sized_event)?;
        self.note(&[
            "A zero-sized request may return null or a unique",
            "address. A unique address must still be freed.",
        ])
    }

    fn failed(&mut self, findings: &Findings<'_>) -> io::Result<()> {
        self.section("Failed (re)allocations")?;
        if findings.is_empty() {
            return self.none_found();
        }
        self.events("Failed allocs", &findings.allocations, Style::Error, short_event)?;
        self.events("Failed reallocs", &findings.resizes, Style::Error, short_event)?;
        self.note(&[
            "Failed (re)allocs may not be your fault. If",
            "unchecked, they will cause trouble. A failed realloc",
            "leaves its block where it was.",
        ])
    }

    fn null_arguments(&mut self, findings: &Findings<'_>) -> io::Result<()> {
        self.section("Null-argument calls")?;
        if findings.is_empty() {
            return self.none_found();
        }
        self.events("realloc(NULL, n)", &findings.resizes, Style::Info, short_event)?;
        self.events("free(NULL)", &findings.releases, Style::Info, short_event)?;
        self.note(&["Both are legal. Listed in case they were unintended."])
    }

    fn unresolved(&mut self, findings: &Findings<'_>) -> io::Result<()> {
        self.section("Unresolved addresses")?;
        if findings.is_empty() {
            return self.none_found();
        }
        let style = Style::Warning;
        self.events("Unresolved reallocs", &findings.resizes, style, unresolved_event)?;
        self.events("Unresolved frees", &findings.releases, style, unresolved_event)?;
        self.note(&["These addresses never came from a tracked call."])
    }

    fn repeated_releases(&mut self, repeats: &[History<'_>]) -> io::Result<()> {
        self.section("Repeated frees")?;
        if repeats.is_empty() {
            return self.none_found();
        }
        for history in repeats {
            let line = match history.origin() {
                Some(origin) => format!(
                    "Block {} freed {}x, from {}",
                    history.block(),
                    history.release_count(),
                    origin.site()
                ),
                None => format!("Block {} freed {}x", history.block(), history.release_count()),
            };
            self.row(&line, Style::Warning)?;
        }
        self.note(&[
            "Possibly a double free, or the allocator reused the",
            "address for memory this tracker never saw.",
        ])
    }
}

/// Dump every event the ledger holds, oldest first
pub fn write_event_list<W>(out: &mut W, ledger: &Ledger) -> io::Result<()>
where
    W: io::Write + ?Sized,
{
    writeln!(out, "allocheck event list: {} event(s)", ledger.events().len())?;
    writeln!(
        out,
        "{:>6} {:<7} {:<6} {:>width$} -> {:>width$} {:>6} site",
        "seq",
        "kind",
        "block",
        "previous",
        "new",
        "size",
        width = ADDRESS_WIDTH
    )?;
    for event in ledger.events() {
        writeln!(out, "{event}")?;
    }
    Ok(())
}
