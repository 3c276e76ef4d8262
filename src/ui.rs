use colored::Colorize;

/// Print an info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print a success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print a warning message
pub fn warn(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Print a header/title
pub fn header(title: &str) {
    println!();
    println!("{}", title.bold());
    println!("{}", "─".repeat(title.len()).dimmed());
}

/// Print a section header
pub fn section(title: &str) {
    println!();
    println!("{}", title.cyan().bold());
}

/// Print a key-value pair
pub fn kv(key: &str, value: &str) {
    println!("  {}: {}", key.dimmed(), value);
}

/// Print a count line, e.g. "  to create: 3"
pub fn count(label: &str, n: usize) {
    println!("  {:<12} {}", format!("{label}:").dimmed(), n.to_string().bold());
}

/// Print an indented list of names, wrapped to the terminal width
pub fn names<'a>(names: impl IntoIterator<Item = &'a String>) {
    let width = console::Term::stdout().size().1 as usize;
    for line in wrap(names, width.saturating_sub(4).max(20)) {
        println!("    {}", line.dimmed());
    }
}

fn wrap<'a>(names: impl IntoIterator<Item = &'a String>, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for name in names {
        if !line.is_empty() && line.len() + 1 + name.len() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(name);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
