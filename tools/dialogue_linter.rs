/// Dialogue Linter — checks dialogue databases for broken graphs.
///
/// Usage: dialogue_linter <file_or_dir> [<file_or_dir> ...]
///
/// Reports dangling links, conversations without a START entry,
/// unreachable entries, empty groups and undefined actors. Exits with
/// status 1 when any error is found.

use dialogue_engine::core::database::DialogueDatabase;
use std::path::Path;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: dialogue_linter <file_or_dir> [<file_or_dir> ...]");
        process::exit(0);
    }

    let mut database = DialogueDatabase::new();
    let mut files = 0;
    for arg in &args[1..] {
        let path = Path::new(arg);
        if path.is_file() {
            load_file(path, &mut database);
            files += 1;
        } else if path.is_dir() {
            files += load_dir_recursive(path, &mut database);
        } else {
            eprintln!("ERROR: Path '{}' does not exist", arg);
            process::exit(1);
        }
    }

    let conversations = database.conversations();
    let entries: usize = conversations.iter().map(|c| c.entries().len()).sum();
    println!(
        "Loaded {} files: {} actors, {} conversations, {} entries",
        files,
        database.actors().len(),
        conversations.len(),
        entries
    );

    let report = database.lint();

    println!("\n=== Dialogue Lint Report ===\n");

    if report.is_clean() {
        println!("All checks passed!");
    }

    for warning in &report.warnings {
        println!("WARNING: {}", warning);
    }

    for error in &report.errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        report.errors.len(),
        report.warnings.len()
    );

    if !report.errors.is_empty() {
        process::exit(1);
    }
}

fn load_file(path: &Path, database: &mut DialogueDatabase) {
    match DialogueDatabase::load_from_ron(path) {
        Ok(loaded) => database.merge(loaded),
        Err(e) => {
            eprintln!("ERROR: Failed to load {}: {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn load_dir_recursive(dir: &Path, database: &mut DialogueDatabase) -> usize {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("ERROR: Cannot read directory {}: {}", dir.display(), e);
            process::exit(1);
        }
    };

    let mut paths: Vec<_> = entries.flatten().map(|entry| entry.path()).collect();
    paths.sort();

    let mut count = 0;
    for path in paths {
        if path.is_dir() {
            count += load_dir_recursive(&path, database);
        } else if path.extension().and_then(|e| e.to_str()) == Some("ron") {
            load_file(&path, database);
            count += 1;
        }
    }
    count
}
