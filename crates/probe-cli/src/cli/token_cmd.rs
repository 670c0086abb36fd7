use super::*;

pub(super) fn handle_token(args: TokenArgs, config: &ProbeConfig) -> anyhow::Result<()> {
    match args.command {
        TokenCommands::Refresh(args) => {
            let path = args.token.unwrap_or_else(|| config.token_path.clone());
            let credentials = GmailCredentials::load(&path, config.send_endpoint.clone())?;
            let expiry = credentials.force_refresh()?;
            println!(
                "token refreshed; expires {}",
                expiry.as_deref().unwrap_or("never")
            );
            Ok(())
        }
    }
}
