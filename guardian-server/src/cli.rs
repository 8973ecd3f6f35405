use clap::Parser;

#[derive(Debug, Parser)]
#[command(
    name = "guardian-server",
    about = "Speech Guardian - resilient real-time audio relay",
    version = env!("CARGO_PKG_VERSION"),
    author
)]
pub struct Cli {
    /// Bind address (overrides GUARDIAN_HOST from the config layer)
    #[arg(long, env = "GUARDIAN_HOST")]
    pub host: Option<String>,

    #[arg(short, long, env = "GUARDIAN_PORT")]
    pub port: Option<u16>,

    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::parse_from(["guardian-server", "--port", "9000", "--log-level", "debug"]);
        assert_eq!(cli.port, Some(9000));
        assert_eq!(cli.log_level, "debug");
    }
}
