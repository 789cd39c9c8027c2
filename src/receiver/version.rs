pub const APPLICATION_NAME: &str = env!("CARGO_PKG_NAME");
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `gitlab-slack-multiplexer 0.1.0`
pub fn describe() -> String {
    format!("{} {}", APPLICATION_NAME, VERSION)
}
