use std::io::{self, Write};
use std::path::Path;

use anyhow::Result;

use crate::api::RuntimeSnapshot;
use crate::quart::resolver::Resolution;

/// Prints the `--status` report for one resolution of the committed schedule.
pub fn run_status_report(snapshot: &RuntimeSnapshot, schedule_path: &Path) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_status_report(&mut out, snapshot, schedule_path)?;
    out.flush()?;
    Ok(())
}

pub fn write_status_report<W: Write>(
    out: &mut W,
    snapshot: &RuntimeSnapshot,
    schedule_path: &Path,
) -> io::Result<()> {
    writeln!(out, "QuartClock status")?;
    writeln!(out, "Clock source: {}", snapshot.clock_label)?;
    writeln!(
        out,
        "Schedule: {} ({} quarts)",
        schedule_path.display(),
        snapshot.schedule.len()
    )?;
    writeln!(out, "Now: {}", snapshot.now)?;

    match snapshot.resolution {
        Resolution::Active { .. } | Resolution::Degenerate { .. } => {
            if let Some(active) = &snapshot.active {
                writeln!(out, "Active quart: {} ({})", active.name, active.display_time)?;
                if !active.description.is_empty() {
                    writeln!(out, "Description: {}", active.description)?;
                }
                let text = if active.use_black_text { "black" } else { "white" };
                writeln!(out, "Color: {} with {text} text", active.hex)?;
            }
        }
        Resolution::Gap { .. } => {
            writeln!(out, "No active quart")?;
            if let Some(shown) = &snapshot.active {
                writeln!(out, "Showing last known: {} ({})", shown.name, shown.display_time)?;
            }
        }
    }

    match snapshot.resolution {
        Resolution::Active {
            progress_percent, ..
        } => writeln!(out, "Progress: {progress_percent:.2}%")?,
        Resolution::Degenerate { .. } => writeln!(out, "Progress: undefined (zero-length quart)")?,
        Resolution::Gap { .. } => {}
    }

    if !snapshot.window.is_empty() {
        writeln!(out, "Neighbors:")?;
        for slot in &snapshot.window {
            let marker = if slot.current { '>' } else { ' ' };
            writeln!(
                out,
                "{marker} {:+} {:<20} {:<17} opacity {:.2}",
                slot.offset, slot.name, slot.display_time, slot.opacity
            )?;
        }
    }
    Ok(())
}
