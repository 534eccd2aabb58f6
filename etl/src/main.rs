use anyhow::Context;
use catalog_etl::{PostgresStager, StorageManager, logging, run_extract_step, run_load_step, run_pipeline};
use chrono::{NaiveDate, Utc};
use clap::{Arg, ArgMatches, Command};
use common::config::{EnvProvider, Settings};
use std::process;
use std::sync::Arc;

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("FILE")
        .help("Config file; without it the API_URL, STORAGE_URL, STORAGE_KEY, BUCKET and DB_URL environment variables are used")
}

fn date_arg() -> Arg {
    Arg::new("date")
        .short('d')
        .long("date")
        .value_name("YYYY-MM-DD")
        .value_parser(parse_date)
        .help("Logical date of the batch, defaults to today (UTC)")
}

fn cli() -> Command {
    Command::new("catalog-etl")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Extracts the product catalog to object storage and loads it into staging")
        .subcommand_required(true)
        .subcommand(
            Command::new("extract")
                .about("Fetch the catalog and store the raw payload; prints the storage URI")
                .arg(config_arg())
                .arg(date_arg()),
        )
        .subcommand(
            Command::new("load")
                .about("Transform a raw file (local path or storage URI) and upsert it into staging")
                .arg(config_arg())
                .arg(
                    Arg::new("reference")
                        .value_name("REFERENCE")
                        .required(true)
                        .help("Storage URI returned by `extract`, or a local path"),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Run extract then load for one logical date")
                .arg(config_arg())
                .arg(date_arg()),
        )
}

fn load_settings(matches: &ArgMatches) -> anyhow::Result<Settings> {
    match matches.get_one::<String>("config") {
        Some(path) => Settings::new(path).with_context(|| format!("loading config file {}", path)),
        None => Settings::from_provider(&EnvProvider).context("reading settings from environment"),
    }
}

fn logical_date(matches: &ArgMatches) -> NaiveDate {
    matches
        .get_one::<NaiveDate>("date")
        .copied()
        .unwrap_or_else(|| Utc::now().date_naive())
}

async fn execute(name: &str, matches: &ArgMatches) -> anyhow::Result<()> {
    let settings = load_settings(matches)?;
    logging::init(&settings.logging);
    let storage = StorageManager::new(&settings.storage).context("configuring object storage")?;

    match name {
        "extract" => {
            let uri = run_extract_step(&settings, &storage, logical_date(matches)).await?;
            println!("{}", uri);
        }
        "load" => {
            let reference = matches
                .get_one::<String>("reference")
                .context("missing REFERENCE argument")?;
            let report = run_load_step(&settings, &storage, reference).await?;
            println!("Loaded {} records from {}", report.staged, report.source);
        }
        "run" => {
            let stager = PostgresStager::new(&settings.database)?;
            let (uri, report) =
                run_pipeline(&settings, &storage, Arc::new(stager), logical_date(matches)).await?;
            println!("Loaded {} records from {}", report.staged, uri);
        }
        other => anyhow::bail!("unknown subcommand '{}'", other),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();
    let Some((name, sub_matches)) = matches.subcommand() else {
        eprintln!("Please specify a valid subcommand");
        process::exit(1);
    };

    if let Err(e) = execute(name, sub_matches).await {
        eprintln!("catalog-etl {} failed: {:#}", name, e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn test_load_requires_reference() {
        assert!(cli().try_get_matches_from(["catalog-etl", "load"]).is_err());
    }

    #[test]
    fn test_date_is_parsed() {
        let matches = cli()
            .try_get_matches_from(["catalog-etl", "extract", "--date", "2026-01-15"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();

        assert_eq!(logical_date(sub), NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        assert!(
            cli()
                .try_get_matches_from(["catalog-etl", "extract", "--date", "15/01/2026"])
                .is_err()
        );
    }
}
