//! CLI output formatting for batch progress.
//!
//! # Output Format
//!
//! ```text
//! Converting DATA -> PNG
//!     From: /game/Content/Graphics/Atlases
//!     To: /tmp/atlases
//! 3 files to convert
//! [001/003] Gameplay/dirt.data
//! [002/003] Gameplay/grass.data
//! [001/003] Gameplay/dirt.data → 64x64 RGB
//! [003/003] broken.data
//! [003/003] broken.data failed: truncated header: expected 12 bytes
//! [002/003] Gameplay/grass.data → 32x32 RGBA (truncated: 700/1024 pixels)
//! ```
//!
//! Workers finish in any order, so every file line carries its task index.
//!
//! # Architecture
//!
//! [`format_convert_event`] is pure (returns `Vec<String>`) for testability;
//! the binary's printer thread is the only caller that writes to stdout.

use crate::codec::DecodeStatus;
use crate::convert::ConvertEvent;
use std::path::Path;

/// Format a 1-based task position against its total, zero-padded to 3 digits.
fn format_position(index: usize, total: usize) -> String {
    format!("[{:0>3}/{:0>3}]", index, total)
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Format a single progress event as display lines.
pub fn format_convert_event(event: &ConvertEvent) -> Vec<String> {
    match event {
        ConvertEvent::BatchStarted {
            label,
            from,
            to,
            file_count,
        } => vec![
            format!("Converting {label}"),
            format!("    From: {}", display(from)),
            format!("    To: {}", display(to)),
            format!("{file_count} files to convert"),
        ],
        ConvertEvent::FileStarted {
            index,
            total,
            rel_path,
        } => vec![format!(
            "{} {}",
            format_position(*index, *total),
            display(rel_path)
        )],
        ConvertEvent::FileConverted {
            index,
            total,
            rel_path,
            outcome,
        } => {
            let mut line = format!(
                "{} {} \u{2192} {}x{} {}",
                format_position(*index, *total),
                display(rel_path),
                outcome.width,
                outcome.height,
                outcome.format_label()
            );
            if let DecodeStatus::Truncated { painted, total } = outcome.status {
                line.push_str(&format!(" (truncated: {painted}/{total} pixels)"));
            }
            vec![line]
        }
        ConvertEvent::FileFailed {
            index,
            total,
            rel_path,
            message,
        } => vec![format!(
            "{} {} failed: {message}",
            format_position(*index, *total),
            display(rel_path)
        )],
    }
}

/// Print a progress event to stdout.
pub fn print_convert_event(event: &ConvertEvent) {
    for line in format_convert_event(event) {
        println!("{}", line);
    }
}
