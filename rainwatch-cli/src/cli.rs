use anyhow::bail;
use clap::{Parser, Subcommand, ValueEnum};
use inquire::{Password, PasswordDisplayMode, Text};
use rainwatch_core::{
    Config, ForecastWindow, Mode, Notifier, ProviderId, RunOutcome, StdoutNotifier,
    TelegramNotifier, pipeline, provider,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "rainwatch", version, about = "Rain forecast notifications")]
pub struct Cli {
    /// Which check to run.
    #[arg(long, value_enum, default_value_t = ModeArg::Daily)]
    pub mode: ModeArg,

    /// Print the message to stdout instead of sending it.
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Today and tomorrow summary.
    Daily,
    /// Rain expected within the next 30 minutes.
    Alert,
}

impl From<ModeArg> for Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Daily => Mode::Daily,
            ModeArg::Alert => Mode::Alert,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store an API key for a provider in the config file.
    Configure {
        /// Provider short name: "met", "weatherapi" or "openweather".
        provider: String,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Some(Command::Configure { provider }) => configure(&provider),
            None => check(self.mode.into(), self.dry_run).await,
        }
    }
}

async fn check(mode: Mode, dry_run: bool) -> anyhow::Result<()> {
    let config = Config::load()?;
    pipeline::ensure_ready(mode, &config)?;

    let http = provider::http_client(config.request_timeout())?;
    let strategy = pipeline::strategy_for(mode, &config, &http)?;
    let window = ForecastWindow::for_mode(mode, config.clock()?.now());

    let notifier: Box<dyn Notifier> = if dry_run {
        Box::new(StdoutNotifier)
    } else {
        Box::new(TelegramNotifier::new(
            config.telegram.bot_token.clone(),
            config.telegram.chat_id.clone(),
            http,
        ))
    };

    // Delivery problems are logged by the pipeline and do not change the exit code.
    match pipeline::run(&strategy, &window, notifier.as_ref()).await {
        RunOutcome::Sent { degraded } => tracing::info!(%mode, degraded, "notification sent"),
        RunOutcome::NothingToSend => tracing::info!(%mode, "nothing to send"),
        RunOutcome::DeliveryFailed(_) => tracing::info!(%mode, "notification was not delivered"),
    }

    Ok(())
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load_file()?;

    let prompt = format!("{} API key:", id.display_name());
    let api_key = Password::new(&prompt)
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()?;

    let api_key = api_key.trim();
    if api_key.is_empty() {
        bail!("API key must not be empty");
    }
    config.upsert_provider_api_key(id, api_key.to_string());

    if id == ProviderId::MetMalaysia && config.location.place_name.is_none() {
        let place = Text::new("Place name for MET forecasts (e.g. Sepang):").prompt()?;
        let place = place.trim();
        if !place.is_empty() {
            config.location.place_name = Some(place.to_string());
        }
    }

    config.save()?;
    println!("Saved {} credentials to {}", id.display_name(), Config::config_file_path()?.display());

    Ok(())
}
