use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use owo_colors::OwoColorize;
use std::io::IsTerminal;
use std::path::Path;
use voxbridge::cli::{Cli, Commands, ConfigAction, RunOverrides, log_filter, redact};
use voxbridge::config::Config;
use voxbridge::{Pipeline, RequestState, providers};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.quiet, cli.verbose)),
    )
    .format_timestamp_millis()
    .init();

    match cli.command {
        None => run(cli.config.as_deref(), &RunOverrides::default()).await?,
        Some(Commands::Run { overrides }) => run(cli.config.as_deref(), &overrides).await?,
        Some(Commands::Process { file, overrides }) => {
            let config = overrides.apply(load_config(cli.config.as_deref())?);
            // Blocking HTTP clients must live off the async runtime.
            let status = tokio::task::spawn_blocking(move || -> Result<_> {
                let providers = providers::from_config(&config)?;
                Ok(Pipeline::new(config, providers).process_file(&file)?)
            })
            .await
            .context("processing task failed")??;
            println!("{}", serde_json::to_string_pretty(&status)?);
            let completed = status.status == RequestState::Completed;
            if std::io::stderr().is_terminal() {
                if completed {
                    eprintln!("{} {}", "✓".green(), status.message);
                } else {
                    eprintln!("{} {}", "✗".red(), status.message);
                }
            }
            if !completed {
                std::process::exit(1);
            }
        }
        Some(Commands::Config { action }) => handle_config_command(action, cli.config.as_deref())?,
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "voxbridge",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/voxbridge/config.toml)
/// 3. Built-in defaults
///
/// Environment variable overrides are applied on top.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

/// Runs the watcher and workers until Ctrl-C or SIGTERM.
async fn run(custom_path: Option<&Path>, overrides: &RunOverrides) -> Result<()> {
    let config = overrides.apply(load_config(custom_path)?);
    let handle = tokio::task::spawn_blocking(move || -> Result<_> {
        let providers = providers::from_config(&config)?;
        log::debug!("providers: {providers:?}");
        Ok(Pipeline::new(config, providers).start()?)
    })
    .await
    .context("startup task failed")??;
    log::info!(
        "voxbridge {} watching {}",
        voxbridge::version_string(),
        handle.watch_dir().display()
    );

    wait_for_shutdown().await;
    log::info!("Shutting down...");

    let detached = tokio::task::spawn_blocking(move || handle.stop())
        .await
        .context("shutdown task failed")?;
    if detached > 0 {
        log::warn!("{detached} thread(s) did not stop in time");
    }
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(e) => {
            log::warn!("SIGTERM handler unavailable: {e}");
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Ctrl-C handler failed: {e}");
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Ctrl-C handler failed: {e}");
    }
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let config = redact(load_config(custom_path)?);
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            let path = custom_path
                .map(Path::to_path_buf)
                .unwrap_or_else(Config::default_path);
            println!("{}", path.display());
        }
        ConfigAction::Dump => {
            print!("{}", toml::to_string_pretty(&Config::default())?);
        }
    }
    Ok(())
}
