use super::log_cmd::summary_lines;
use super::run_cmd::apply_run_overrides;
use super::*;
use std::collections::BTreeMap;

#[test]
fn run_parses_overrides() {
    let cli = Cli::try_parse_from([
        "probe-cli",
        "run",
        "--log",
        "trials.csv",
        "--batch-size",
        "3",
    ])
    .unwrap();
    match cli.command {
        Commands::Run(args) => {
            let mut config = ProbeConfig::default();
            apply_run_overrides(&mut config, &args);
            assert_eq!(config.log_path, PathBuf::from("trials.csv"));
            assert_eq!(config.batch_size, 3);
            assert_eq!(config.token_path, PathBuf::from("token.json"));
        }
        _ => panic!("expected run command"),
    }
}

#[test]
fn config_flag_is_global() {
    let cli = Cli::try_parse_from(["probe-cli", "summary", "--config", "probe.json"]).unwrap();
    assert_eq!(cli.config, Some(PathBuf::from("probe.json")));
    assert_eq!(command_label(&cli.command), "summary");
}

#[test]
fn token_refresh_parses() {
    let cli = Cli::try_parse_from(["probe-cli", "token", "refresh", "--token", "t.json"]).unwrap();
    match cli.command {
        Commands::Token(TokenArgs {
            command: TokenCommands::Refresh(args),
        }) => assert_eq!(args.token, Some(PathBuf::from("t.json"))),
        _ => panic!("expected token refresh"),
    }
}

#[test]
fn last_trial_reads_explicit_config_file() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config_path = tmp.path().join("probe.json");
    std::fs::write(&config_path, r#"{"log_path": "other.csv"}"#).unwrap();
    let config = app::load_config(Some(config_path)).unwrap();
    assert_eq!(config.log_path, PathBuf::from("other.csv"));
}

#[test]
fn summary_reports_success_rate() {
    let mut counts = BTreeMap::new();
    counts.insert(200, 3);
    counts.insert(429, 1);
    let lines = summary_lines(&counts);
    assert_eq!(lines[0], "status 200: 3");
    assert_eq!(lines[1], "status 429: 1");
    assert_eq!(lines[2], "total: 4, success rate: 75.0%");
    assert_eq!(summary_lines(&BTreeMap::new()), vec!["no trials logged"]);
}
