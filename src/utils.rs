// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Misc utility functions.

use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};

use crate::selector::GeneratorStream;

pub const INV_ROOT2: f64 = 0.7071067811865475;

/// Write `count` words from `stream` to `file_path` as little-endian u32s,
/// the layout `file_input_raw` reads back.
pub fn write_raw_words(
    stream: &mut GeneratorStream,
    file_path: &Path,
    count: usize,
) -> std::io::Result<()> {
    let file = File::create(file_path)?;
    let mut writer = BufWriter::new(file);
    for _ in 0..count {
        let sample = stream.next_word().to_le_bytes();
        writer.write_all(&sample)?;
    }
    writer.flush()
}

/// Print `line` and append it to `result_file`, if one is given.
pub fn write_and_print(line: &str, result_file: Option<&Path>) -> std::io::Result<()> {
    println!("{}", line);
    if let Some(path) = result_file {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", line)?;
    }
    Ok(())
}

/// Format a number of bytes into a pretty String.
/// e.g. 1048576 is 1 MiB
pub fn format_byte_count(num_bytes: usize) -> String {
    // 2**30 = 1073741824
    if num_bytes >= 1073741824 {
        format!("{:.2} GiB", (num_bytes as f64 / 1073741824.0))
    // 2**20 = 1048576
    } else if num_bytes >= 1048576 {
        format!("{:.2} MiB", (num_bytes as f64 / 1048576.0))
    // 2**10 = 1024
    } else if num_bytes >= 1024 {
        format!("{:.2} KiB", (num_bytes as f64 / 1024.0))
    } else {
        format!("{} B", num_bytes)
    }
}
