const BORDER: char = '=';

/// Banner printed when the inspection shell starts.
pub fn welcome_message(name: &str) -> String {
    let title = format!("  {} v{}  ", name, env!("CARGO_PKG_VERSION"));
    let line: String = std::iter::repeat_n(BORDER, title.len()).collect();
    format!(
        "{line}\n{title}\n{line}\nPaged B+Tree storage engine. Type 'help' for commands.\n"
    )
}
