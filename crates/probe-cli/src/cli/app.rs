use super::*;

pub(super) fn run() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    info!(command = command_label(&cli.command), "Running command");

    let config = load_config(cli.config)?;
    match cli.command {
        Commands::Run(args) => handle_run(args, config),
        Commands::LastTrial(args) => handle_last_trial(args, &config),
        Commands::Summary(args) => handle_summary(args, &config),
        Commands::Token(args) => handle_token(args, &config),
    }
}

pub(super) fn load_config(path: Option<PathBuf>) -> anyhow::Result<ProbeConfig> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };
    ProbeConfig::load(&path)
}
