use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Parse a level name such as `"info"` or `"DEBUG"`.
pub fn parse_level(level: &str) -> Option<Level> {
    Level::from_str(level.trim()).ok()
}

/// Install the global fmt subscriber. Unknown level names fall back to INFO.
///
/// Returns false if a global subscriber was already installed.
pub fn init(level: &str) -> bool {
    let level = parse_level(level).unwrap_or(Level::INFO);
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("debug"), Some(Level::DEBUG));
        assert_eq!(parse_level(" WARN "), Some(Level::WARN));
        assert_eq!(parse_level("loud"), None);
    }
}
