use std::io::Write;

use lumbung::{
    art::welcome_message,
    config::StorageConfig,
    storage::storage_manager::StorageManager,
    types::{NO_PAGE, PageNumber, error::Result as DbResult},
};
use rustyline::{DefaultEditor, Result, error::ReadlineError};

const HISTORY_FILE: &str = ".lumbung_history";

fn read_multiline_command(rl: &mut DefaultEditor) -> Result<String> {
    let mut input = String::new();
    let mut prompt = "lumbung> ".to_string();

    loop {
        let line = rl.readline(&prompt)?;
        let trimmed_line = line.trim_end();

        // A trailing backslash continues the command on the next line
        if let Some(head) = trimmed_line.strip_suffix('\\') {
            input.push_str(head);
            input.push(' ');
            prompt = "      -> ".to_string();
        } else {
            input.push_str(trimmed_line);
            break;
        }
    }

    Ok(input)
}

fn page_label(page_number: PageNumber) -> String {
    if page_number == NO_PAGE {
        "-".to_string()
    } else {
        page_number.to_string()
    }
}

fn print_tables(storage: &mut StorageManager) -> DbResult<()> {
    for name in storage.table_names()? {
        println!("{}", name);
    }
    Ok(())
}

fn print_schema(storage: &mut StorageManager, table_name: &str) -> DbResult<()> {
    let schema = storage.table_schema(table_name)?;
    println!("{}", schema.table_name);
    for column in &schema.columns {
        let constraint = column.constraint.name().unwrap_or("");
        println!("  {:<20} {:<10} {}", column.name, column.data_type, constraint);
    }
    Ok(())
}

fn print_tree(storage: &mut StorageManager, table_name: &str) -> DbResult<()> {
    let tree = storage.table(table_name)?.tree();
    println!(
        "{} ({} pages, root {})",
        tree.path().display(),
        tree.page_count(),
        tree.root_page()
    );
    for page_number in 0..tree.page_count() {
        let page = tree.read_page(page_number as PageNumber)?;
        println!(
            "  page {:>4}  {:<14} cells {:>3}  free {:>5}  parent {:>5}  sibling {:>5}",
            page.page_number,
            format!("{:?}", page.page_type),
            page.cells.len(),
            page.available_space(),
            page_label(page.parent_page),
            page_label(page.sibling_page)
        );
    }
    Ok(())
}

fn print_rows(storage: &mut StorageManager, table_name: &str) -> DbResult<()> {
    let schema = storage.table_schema(table_name)?;
    let rows = storage.select(table_name, &[], |_| true)?;
    println!("rowid | {}", schema.column_names().join(" | "));
    for row in &rows {
        let values: Vec<String> = row.values.iter().map(ToString::to_string).collect();
        let row_id = row.row_id.map(|id| id.to_string()).unwrap_or_default();
        println!("{} | {}", row_id, values.join(" | "));
    }
    println!("({} rows)", rows.len());
    Ok(())
}

fn print_stats(storage: &mut StorageManager, table_name: &str) -> DbResult<()> {
    let stats = storage.table(table_name)?.stats();
    println!(
        "records {}  avg_length {}  root_page {}",
        stats.record_count, stats.avg_length, stats.root_page
    );
    Ok(())
}

fn process_command(storage: &mut StorageManager, command: &str) -> bool {
    let cmd = command.trim();
    let mut parts = cmd.split_whitespace();
    let head = parts.next().unwrap_or("").to_lowercase();
    let arg = parts.next();

    let outcome = match (head.as_str(), arg) {
        ("exit" | "quit" | "q", _) => {
            println!("Goodbye!");
            return false;
        }
        ("help" | "h", _) => {
            println!(
                r#"
Available commands:
  .tables          - List every table in the catalog
  .indexes         - List secondary indexes
  .schema <table>  - Show a table's columns
  .dump <table>    - Print every live row
  .tree <table>    - Print the page layout of a table file
  .stats <table>   - Show record count, average length and root page
  help, h          - Show this help message
  clear, ctrl + l  - Clear the screen
  exit, quit, q    - Exit

Use '\' at the end of a line for multiline input.
Use Up/Down arrows to navigate command history.
"#
            );
            Ok(())
        }
        ("clear", _) => {
            print!("\x1B[2J\x1B[1;1H");
            let _ = std::io::stdout().flush();
            Ok(())
        }
        ("", _) => Ok(()),
        (".tables", _) => print_tables(storage),
        (".indexes", _) => {
            for name in storage.index_names() {
                println!("{}", name);
            }
            Ok(())
        }
        (".schema", Some(table)) => print_schema(storage, table),
        (".dump", Some(table)) => print_rows(storage, table),
        (".tree", Some(table)) => print_tree(storage, table),
        (".stats", Some(table)) => print_stats(storage, table),
        (".schema" | ".dump" | ".tree" | ".stats", None) => {
            println!("Usage: {} <table>", head);
            Ok(())
        }
        _ => {
            println!("Unknown command: {}. SQL statements are handled by the dispatcher.", cmd);
            Ok(())
        }
    };

    if let Err(e) = outcome {
        println!("Error: {}", e);
    }
    true
}

fn main() -> Result<()> {
    env_logger::init();
    println!("{}", welcome_message("LUMBUNG DB"));

    let config = StorageConfig::from_env();
    let mut storage = match StorageManager::open(config) {
        Ok(storage) => storage,
        Err(e) => {
            eprintln!("Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };

    let mut rl = DefaultEditor::new()?;
    if rl.load_history(HISTORY_FILE).is_err() {
        log::debug!("No history file yet");
    }

    loop {
        match read_multiline_command(&mut rl) {
            Ok(input) => {
                let command = input.trim().to_string();
                if !command.is_empty() {
                    rl.add_history_entry(&command)?;
                }
                if !process_command(&mut storage, &command) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("Interrupted");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("EOF");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    rl.save_history(HISTORY_FILE)?;
    Ok(())
}
