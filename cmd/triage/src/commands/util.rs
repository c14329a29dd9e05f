//! Utility functions for CLI commands.

use anyhow::Context as _;
use chrono::{NaiveDateTime, NaiveTime, Weekday};
use facetriage_cli::{load_config, AppConfig, Output, Stores};
use facetriage_store::Identity;

use crate::Cli;

const APP_NAME: &str = "triage";

/// Gets the global configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    Ok(load_config(APP_NAME, cli.config.as_deref())?)
}

/// Loads the configuration and opens the stores it names.
pub fn open_stores(cli: &Cli) -> anyhow::Result<(AppConfig, Stores)> {
    let cfg = get_config(cli)?;
    print_verbose(cli, &format!("Data directory: {}", cfg.data_dir().display()));
    let stores = Stores::open(&cfg)?;
    Ok((cfg, stores))
}

/// Output destination from the global flags.
pub fn output(cli: &Cli) -> Output {
    Output::from_flags(cli.json, cli.output.as_deref())
}

/// Outputs a value as YAML or JSON.
pub fn output_result<T: serde::Serialize>(cli: &Cli, value: &T) -> anyhow::Result<()> {
    output(cli).write(value)
}

/// Prints a console table, or the structured value when JSON or a file was
/// requested.
pub fn output_table<T: serde::Serialize>(cli: &Cli, value: &T, table: String) -> anyhow::Result<()> {
    let out = output(cli);
    if out.is_console() {
        print!("{}", table);
        Ok(())
    } else {
        out.write(value)
    }
}

/// Prints verbose output if enabled.
pub fn print_verbose(cli: &Cli, msg: &str) {
    facetriage_cli::print_verbose(cli.verbose, msg);
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Prints info message.
pub fn print_info(msg: &str) {
    eprintln!("\x1b[34mℹ\x1b[0m {}", msg);
}

/// Prints warning message.
pub fn print_warning(msg: &str) {
    eprintln!("\x1b[33m⚠\x1b[0m {}", msg);
}

pub fn parse_identity(s: &str) -> anyhow::Result<Identity> {
    Ok(Identity::new(s)?)
}

/// Parses `YYYY-MM-DD HH:MM` (a `T` separator and seconds are accepted).
pub fn parse_datetime(s: &str) -> anyhow::Result<NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .with_context(|| format!("invalid date/time {s:?}, expected YYYY-MM-DD HH:MM"))
}

/// Parses `HH:MM`.
pub fn parse_time(s: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .with_context(|| format!("invalid time {s:?}, expected HH:MM"))
}

/// Parses a comma-separated day list such as `Mon,Wed,Fri`.
pub fn parse_days(s: &str) -> anyhow::Result<Vec<Weekday>> {
    split_list(s)
        .iter()
        .map(|d| {
            d.parse::<Weekday>()
                .map_err(|_| anyhow::anyhow!("invalid weekday {d:?}"))
        })
        .collect()
}

/// Splits a comma-separated list, dropping empty entries.
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|x| !x.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_times() {
        let at = parse_datetime("2026-10-19 10:30").unwrap();
        assert_eq!(at.to_string(), "2026-10-19 10:30:00");
        assert_eq!(parse_datetime("2026-10-19T10:30:15").unwrap().to_string(), "2026-10-19 10:30:15");
        assert!(parse_datetime("19/10/2026").is_err());
        assert_eq!(parse_time("09:05").unwrap(), NaiveTime::from_hms_opt(9, 5, 0).unwrap());
        assert!(parse_time("25:00").is_err());
    }

    #[test]
    fn parses_days() {
        assert_eq!(
            parse_days("Mon, wed,Friday").unwrap(),
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );
        assert!(parse_days("Mon,Funday").is_err());
        assert_eq!(split_list(" a, ,b "), vec!["a", "b"]);
    }
}
