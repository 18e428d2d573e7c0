use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

const MAX_SESSION_HOURS: u64 = 24 * 365;

/// Server-rendered gradebook
#[derive(Debug, Clone, Parser)]
#[command(name = "gradebook", version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "GRADEBOOK_BIND", default_value = "127.0.0.1:3000")]
    pub bind: String,

    /// SQLite database file; its directory is created if missing
    #[arg(long, env = "GRADEBOOK_DATABASE", default_value = "instance/grades.db")]
    pub database: PathBuf,

    /// Lifetime of a login session in hours, at most one year
    #[arg(
        long,
        env = "GRADEBOOK_SESSION_HOURS",
        default_value_t = 24,
        value_parser = clap::value_parser!(u64).range(1..=MAX_SESSION_HOURS)
    )]
    pub session_hours: u64,

    /// Directory served under /static
    #[arg(long, env = "GRADEBOOK_STATIC_DIR", default_value = "static")]
    pub static_dir: PathBuf,
}

impl Config {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_hours * 60 * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["gradebook"]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:3000");
        assert_eq!(config.database, PathBuf::from("instance/grades.db"));
        assert_eq!(config.session_ttl(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "gradebook",
            "--bind",
            "0.0.0.0:8080",
            "--session-hours",
            "2",
        ])
        .unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080");
        assert_eq!(config.session_ttl(), Duration::from_secs(7200));
    }

    #[test]
    fn session_hours_are_bounded() {
        for hours in ["0", "8761", "18446744073709551615"] {
            let parsed = Config::try_parse_from(["gradebook", "--session-hours", hours]);
            assert!(parsed.is_err(), "{} hours accepted", hours);
        }
        let year = Config::try_parse_from(["gradebook", "--session-hours", "8760"]).unwrap();
        assert_eq!(year.session_ttl(), Duration::from_secs(8760 * 3600));
    }
}
