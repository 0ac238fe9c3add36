//! `AmiraMesh 3D ASCII` spreadsheets.
//!
//! Columns are declared in the preamble, one per line, each with its own data
//! marker:
//! ```text
//! ID { int ID } @1
//! Name { byte Name } @2
//! ```
//! The body stores the columns one after another, each introduced by its marker
//! line. Scalar cells take one line each; `byte` cells are sequences of decimal
//! character codes, one per line, terminated by `0`.

use std::io::BufRead;
use std::sync::OnceLock;

use log::{debug, trace};
use regex::Regex;

use crate::amira::types::error::{AmiraError, Result};
use crate::amira::types::models::ColumnSpec;
use crate::amira::utils;

static COLUMN_PATTERN: OnceLock<Regex> = OnceLock::new();

fn column_regex() -> &'static Regex {
    COLUMN_PATTERN.get_or_init(|| {
        Regex::new(r"(?m)^([^{\n]*?)[ \t]*\{[ \t]*([^\s{}]+)[^}\n]*\}[ \t]*@([0-9]+)")
            .expect("Invalid column declaration pattern")
    })
}

/// Extracts the column declarations from the preamble text.
///
/// The number after the last data marker gives the column count `N`; the columns
/// are the last `N` declarations, in declaration order.
pub fn parse_columns(text: &str) -> Result<Vec<ColumnSpec>> {
    // Pass 1: every declaration with its marker number
    let declarations: Vec<(ColumnSpec, usize)> = column_regex()
        .captures_iter(text)
        .map(|caps| {
            let marker = caps[3].parse::<usize>().map_err(|e| {
                AmiraError::InvalidFormat(format!("Invalid data marker @{}: {}", &caps[3], e))
            })?;
            let spec = ColumnSpec {
                name: caps[1].trim().to_string(),
                format: caps[2].to_string(),
            };
            Ok((spec, marker))
        })
        .collect::<Result<_>>()?;

    // Pass 2: keep the trailing run of declarations named by the last marker
    let num_columns = declarations
        .last()
        .map(|(_, marker)| *marker)
        .ok_or_else(|| AmiraError::InvalidFormat("No column declarations found".to_string()))?;
    if num_columns == 0 || num_columns > declarations.len() {
        return Err(AmiraError::InvalidFormat(format!(
            "Last data marker @{} does not match the {} column declarations",
            num_columns,
            declarations.len()
        )));
    }

    let columns: Vec<ColumnSpec> = declarations[declarations.len() - num_columns..]
        .iter()
        .map(|(spec, _)| spec.clone())
        .collect();
    debug!("Parsed {} table columns: {:?}", columns.len(), columns);
    Ok(columns)
}

/// Reads the table body and returns one tab-joined string per row.
///
/// The reader must be positioned just after the first column's marker line.
pub fn read_rows<R: BufRead>(reader: &mut R, columns: &[ColumnSpec], num_rows: usize) -> Result<Vec<String>> {
    let mut rows = vec![String::new(); num_rows];

    for (index, column) in columns.iter().enumerate() {
        trace!("Reading column {} ({}, {})", index + 1, column.name, column.format);
        for (row_index, row) in rows.iter_mut().enumerate() {
            let value = if column.is_byte_string() {
                read_byte_string(reader, column)?
            } else {
                next_line(reader)?
            };
            let value = value.ok_or_else(|| AmiraError::TruncatedStream {
                context: format!("table column {}", column.name),
                expected: num_rows as u64,
                found: row_index as u64,
            })?;
            if index > 0 {
                row.push('\t');
            }
            row.push_str(&value);
        }
        if index + 1 < columns.len() {
            skip_to_marker(reader, &columns[index + 1])?;
        }
    }

    Ok(rows)
}

fn next_line<R: BufRead>(reader: &mut R) -> Result<Option<String>> {
    Ok(utils::read_line(reader)?.map(|(line, _)| line))
}

/// Reads character codes until a `0`; `None` if the body ends first.
fn read_byte_string<R: BufRead>(reader: &mut R, column: &ColumnSpec) -> Result<Option<String>> {
    let mut value = String::new();
    loop {
        let Some((line, _)) = utils::read_line(reader)? else {
            return Ok(None);
        };
        let code: u32 = line.trim().parse().map_err(|_| {
            AmiraError::InvalidFormat(format!(
                "Invalid character code {:?} in column {}",
                line, column.name
            ))
        })?;
        if code == 0 {
            return Ok(Some(value));
        }
        let ch = char::from_u32(code).ok_or_else(|| {
            AmiraError::InvalidFormat(format!("Invalid character code {} in column {}", code, column.name))
        })?;
        value.push(ch);
    }
}

fn skip_to_marker<R: BufRead>(reader: &mut R, next: &ColumnSpec) -> Result<()> {
    loop {
        match utils::read_line(reader)? {
            Some((line, _)) if line.starts_with('@') => return Ok(()),
            Some(_) => continue,
            None => {
                return Err(AmiraError::InvalidFormat(format!(
                    "Missing data marker for column {}",
                    next.name
                )))
            }
        }
    }
}
