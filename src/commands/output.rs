//! Shared table and JSON output helpers.

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Print a value as pretty JSON
pub fn print_json<T: Serialize>(value: &T, what: &str) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing {} to JSON: {}", what, e),
    }
}

/// Print rows as a table followed by a row count
pub fn display_table_with_count<T: Tabled>(rows: &[T], noun: &str) {
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{}", table);
    println!("Total: {} {}", rows.len(), noun);
}

/// Print a table, or a message when there are no rows
pub fn display_table_or<T: Tabled>(rows: &[T], noun: &str, empty_message: &str) {
    if rows.is_empty() {
        println!("{}", empty_message);
    } else {
        display_table_with_count(rows, noun);
    }
}
