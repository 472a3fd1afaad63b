use std::io::IsTerminal;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub format: OutputFormat,
    pub pretty: bool,
    pub use_color: bool,
    pub verbose: bool,
}

/// Combine the config color setting with the --no-color flag and the
/// environment. The flag always wins; "auto" means "color iff stdout is a
/// tty and NO_COLOR is unset".
pub fn resolve_color(setting: &str, no_color_flag: bool) -> bool {
    if no_color_flag {
        return false;
    }
    match setting {
        "always" => true,
        "never" => false,
        _ => detect_color(),
    }
}

fn detect_color() -> bool {
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    std::io::stdout().is_terminal()
}
