use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use zip::CompressionMethod;

#[derive(Parser)]
#[command(name = "create-backup")]
#[command(version = "0.1.0")]
#[command(about = "Creates a timestamped zip backup of a directory and removes old backups.", long_about = None)]
pub struct Cli {
    /// Source directory
    #[arg(short, long, value_name = "SOURCE DIR")]
    pub src: PathBuf,

    /// Destination directory
    #[arg(short, long, value_name = "DESTINATION DIR")]
    pub dst: PathBuf,

    /// Delete backups older than x days. Set to -1 to prevent deleting
    #[arg(
        long = "del_days_old",
        default_value = "30",
        allow_negative_numbers = true,
        value_name = "DAYS"
    )]
    pub del_days_old: i64,

    /// Compression method for archive entries
    #[arg(short, long, value_enum, default_value_t = Compression::Deflated)]
    pub compression: Compression,

    /// Log every archived and inspected file
    #[arg(short, long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print the backup and removal confirmations
    #[arg(short, long)]
    pub quiet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Compression {
    Deflated,
    Stored,
    Zstd,
}

impl Compression {
    pub fn method(self) -> CompressionMethod {
        match self {
            Compression::Deflated => CompressionMethod::Deflated,
            Compression::Stored => CompressionMethod::Stored,
            Compression::Zstd => CompressionMethod::Zstd,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["create-backup", "-s", "in", "-d", "out"]).unwrap();
        assert_eq!(cli.src, PathBuf::from("in"));
        assert_eq!(cli.dst, PathBuf::from("out"));
        assert_eq!(cli.del_days_old, 30);
        assert_eq!(cli.compression, Compression::Deflated);
        assert!(!cli.verbose && !cli.quiet);
    }

    #[test]
    fn negative_retention_is_accepted() {
        let cli = Cli::try_parse_from([
            "create-backup",
            "--src",
            "in",
            "--dst",
            "out",
            "--del_days_old",
            "-1",
        ])
        .unwrap();
        assert_eq!(cli.del_days_old, -1);
    }

    #[test]
    fn source_and_destination_are_required() {
        assert!(Cli::try_parse_from(["create-backup", "--src", "in"]).is_err());
        assert!(Cli::try_parse_from(["create-backup", "--dst", "out"]).is_err());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let parsed = Cli::try_parse_from(["create-backup", "-s", "in", "-d", "out", "-v", "-q"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn compression_choices_map_to_zip_methods() {
        let cli =
            Cli::try_parse_from(["create-backup", "-s", "in", "-d", "out", "-c", "zstd"]).unwrap();
        assert_eq!(cli.compression.method(), CompressionMethod::Zstd);
        assert_eq!(Compression::Stored.method(), CompressionMethod::Stored);
    }
}
