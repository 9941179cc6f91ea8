//! Command line interface

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "l3-recorder")]
#[command(about = "Record Binance trades and depth deltas to a CSV event log")]
#[command(version)]
pub struct Cli {
    /// Capture duration in seconds [default: DURATION_SECS or 60]
    pub duration_secs: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_is_optional_positional() {
        let cli = Cli::try_parse_from(["l3-recorder"]).unwrap();
        assert_eq!(cli.duration_secs, None);

        let cli = Cli::try_parse_from(["l3-recorder", "120"]).unwrap();
        assert_eq!(cli.duration_secs, Some(120));
    }

    #[test]
    fn test_rejects_invalid_duration() {
        assert!(Cli::try_parse_from(["l3-recorder", "-5"]).is_err());
        assert!(Cli::try_parse_from(["l3-recorder", "soon"]).is_err());
        assert!(Cli::try_parse_from(["l3-recorder", "1", "2"]).is_err());
    }
}
