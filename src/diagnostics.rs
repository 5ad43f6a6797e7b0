//! Rendering pipeline errors against the source that produced them.
//!
//! Syntax and generator errors get a `name:row:col` header and a framed
//! slice of the source with the offending span labeled; runtime errors have
//! no source span to point at, so they get a register snapshot and a window
//! of the surrounding opcodes with the fatal one highlighted.

use codesnake::{Block, CodeWidth, Label, LineIndex};
use yansi::Paint;

use crate::lexer::Location;
use crate::runtime::RuntimeError;
use crate::Error;

/// 1-based `(row, col)` for a byte offset, found by scanning the source
/// for line endings.
pub fn position(src: &str, offset: usize) -> (usize, usize) {
    let mut row = 1;
    let mut col = 1;
    for (index, c) in src.char_indices() {
        if index >= offset {
            break;
        }
        if c == '\n' {
            row += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (row, col)
}

pub fn report(err: &Error, name: &str, src: &str) -> String {
    match err {
        Error::Syntax(e) => source_report(&e.to_string(), e.location(), name, src),
        Error::Generator(e) => source_report(&e.to_string(), e.location(), name, src),
        Error::Runtime(e) => runtime_report(e),
    }
}

fn source_report(message: &str, loc: &Location, name: &str, src: &str) -> String {
    let (row, col) = position(src, loc.offset);
    let mut out = format!(
        "{}: {}\n",
        format!("{name}:{row}:{col}").bold(),
        message.red()
    );

    // errors at end of input have nothing left to span
    if loc.offset < src.len() {
        let idx = LineIndex::new(src);
        let label = Label::new(loc.offset..loc.offset + 1)
            .with_text(message.to_string())
            .with_style(|s| s.red().to_string());
        if let Some(block) =
            Block::new(&idx, [label]).map(|blk| blk.map_code(|c| CodeWidth::new(c, c.len())))
        {
            out.push_str(&format!("{}[{name}]\n", block.prologue()));
            out.push_str(&block.to_string());
            out.push_str(&format!("{}\n", block.epilogue()));
        }
    }

    out
}

fn runtime_report(err: &RuntimeError) -> String {
    let mut out = format!("{}: {}\n", "runtime error".bold(), err.message.red());
    out.push_str(&format!("  {}\n", err.registers));

    let pc = err.registers.pc;
    let lo = pc.saturating_sub(4);
    let hi = (pc + 5).min(err.codes.len());
    for index in lo..hi {
        let line = format!("{index:04} {}", err.codes[index]);
        if index == pc {
            out.push_str(&format!("{}\n", format!("-> {line}").red()));
        } else {
            out.push_str(&format!("   {line}\n"));
        }
    }

    out
}
