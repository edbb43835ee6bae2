// src/cli/display.rs

use crate::cli::error::CliResult;
use crate::domain::bookmark::Bookmark;
use crossterm::style::{Stylize, StyledContent};
use itertools::Itertools;
use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Write};

/// Colors only when stderr is a terminal and the user did not opt out.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    color: bool,
}

impl Palette {
    pub fn new(no_color: bool) -> Self {
        Self {
            color: !no_color && io::stderr().is_terminal(),
        }
    }

    fn paint<'a>(&self, text: &'a str, style: fn(&'a str) -> StyledContent<&'a str>) -> String {
        if self.color {
            style(text).to_string()
        } else {
            text.to_string()
        }
    }
}

fn tag_line(bookmark: &Bookmark) -> String {
    bookmark.tags.iter().map(|t| t.value()).join(" ")
}

/// Human readable listing on stderr, stdout stays pipeable.
pub fn show_bookmarks(bookmarks: &[Bookmark], palette: Palette) -> CliResult<()> {
    if bookmarks.is_empty() {
        eprintln!("No bookmarks to display");
        return Ok(());
    }

    let mut stderr = io::stderr().lock();
    let width = bookmarks
        .iter()
        .filter_map(|b| b.id)
        .max()
        .unwrap_or(0)
        .to_string()
        .len();

    for bm in bookmarks {
        let id = bm.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        let star = if bm.favorite { " *" } else { "" };
        let title = if bm.title.is_empty() { bm.url.as_str() } else { bm.title.as_str() };
        writeln!(
            stderr,
            "{:>width$}. {}{}",
            id,
            palette.paint(title, |s| s.green()),
            palette.paint(star, |s| s.yellow())
        )?;
        writeln!(stderr, "{:width$}  {}", "", palette.paint(&bm.url, |s| s.yellow()))?;
        if !bm.description.is_empty() {
            writeln!(stderr, "{:width$}  {}", "", bm.description)?;
        }
        let tags = tag_line(bm);
        if !tags.is_empty() {
            writeln!(stderr, "{:width$}  {}", "", palette.paint(&tags, |s| s.blue()))?;
        }
        writeln!(
            stderr,
            "{:width$}  {}",
            "",
            palette.paint(
                &format!(
                    "visits: {} | last visit: {}",
                    bm.visit_count,
                    bm.last_visit.format("%Y-%m-%d %H:%M")
                ),
                |s| s.dark_grey()
            )
        )?;
        writeln!(stderr)?;
    }
    Ok(())
}

/// Bookmarks as a JSON array on stdout.
pub fn write_bookmarks_as_json(bookmarks: &[Bookmark]) -> CliResult<()> {
    let json = serde_json::to_string_pretty(bookmarks)
        .map_err(|e| crate::cli::error::CliError::Other(format!("serializing bookmarks: {}", e)))?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json)?;
    Ok(())
}

/// `name (count)` per line, most used first.
pub fn show_tags(counter: &BTreeMap<String, usize>, palette: Palette) -> CliResult<()> {
    if counter.is_empty() {
        eprintln!("No tags");
        return Ok(());
    }
    let mut stdout = io::stdout().lock();
    for (name, n) in counter.iter().sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0))) {
        writeln!(stdout, "{} ({})", palette.paint(name, |s| s.blue()), n)?;
    }
    Ok(())
}
