//! Table, tree, and JSON output formatting for CLI commands.

use serde::Serialize;
use tabled::{Table, Tabled};

use netdrive_entity::folder::Folder;

/// Output format selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table or tree
    #[default]
    Table,
    /// JSON output
    Json,
}

/// Print a list of items in the selected format
pub fn print_list<T: Serialize + Tabled>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("No results found.");
            } else {
                println!("{}", Table::new(items));
            }
        }
        OutputFormat::Json => print_json(items),
    }
}

/// Print assembled folder trees, indented by depth
pub fn print_tree(forest: &[Folder], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            for root in forest {
                print_folder(root, 0);
            }
        }
        OutputFormat::Json => print_json(forest),
    }
}

fn print_folder(folder: &Folder, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{indent}{}/  ({})", folder.name, folder.id);
    for file in &folder.files {
        println!("{indent}  {}  [{} bytes]", file.name, file.size);
    }
    for child in &folder.folders {
        print_folder(child, depth + 1);
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string());
    println!("{json}");
}

/// Print a success message
pub fn print_success(msg: &str) {
    println!("✓ {msg}");
}

/// Print an error message
pub fn print_error(msg: &str) {
    eprintln!("✗ {msg}");
}

/// Print a key-value pair
pub fn print_kv(key: &str, value: &str) {
    println!("  {:<24} {}", format!("{key}:"), value);
}
