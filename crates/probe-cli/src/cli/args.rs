use super::*;

#[derive(Parser)]
#[command(author, version, about = "Probe a mail API's send limits with synthetic messages")]
pub(super) struct Cli {
    #[arg(long, global = true, help = "Path to a JSON config file")]
    pub(super) config: Option<PathBuf>,
    #[command(subcommand)]
    pub(super) command: Commands,
}

#[derive(clap::Subcommand)]
pub(super) enum Commands {
    #[command(about = "Send trials until interrupted")]
    Run(RunArgs),
    #[command(about = "Print the last trial number in the log")]
    LastTrial(LogArgs),
    #[command(about = "Count logged trials by status")]
    Summary(LogArgs),
    #[command(about = "Manage the OAuth token file")]
    Token(TokenArgs),
}

#[derive(Parser)]
pub(super) struct RunArgs {
    #[arg(long, help = "Trial log (CSV)")]
    pub(super) log: Option<PathBuf>,
    #[arg(long, help = "OAuth token file")]
    pub(super) token: Option<PathBuf>,
    #[arg(long, help = "Trials per batch in normal mode")]
    pub(super) batch_size: Option<usize>,
}

#[derive(Parser)]
pub(super) struct LogArgs {
    #[arg(long, help = "Trial log (CSV)")]
    pub(super) log: Option<PathBuf>,
}

#[derive(Parser)]
pub(super) struct TokenArgs {
    #[command(subcommand)]
    pub(super) command: TokenCommands,
}

#[derive(clap::Subcommand)]
pub(super) enum TokenCommands {
    #[command(about = "Refresh the access token now and store it")]
    Refresh(TokenFileArgs),
}

#[derive(Parser)]
pub(super) struct TokenFileArgs {
    #[arg(long, help = "OAuth token file")]
    pub(super) token: Option<PathBuf>,
}

pub(super) fn command_label(command: &Commands) -> &'static str {
    match command {
        Commands::Run(_) => "run",
        Commands::LastTrial(_) => "last-trial",
        Commands::Summary(_) => "summary",
        Commands::Token(_) => "token",
    }
}
