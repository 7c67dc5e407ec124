//! # forkline
//!
//! Operator CLI: build authorize URLs, inspect fork landings and print the
//! effective settings. Runs the library against an in-memory environment.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;

use forkline_core::apps::{App, ForkType};
use forkline_core::env::MemoryEnvironment;
use forkline_session::{request_fork, ConsumeForkParameters, ForkStateStore};
use forkline_settings::{
    get_settings, init_settings, load_settings_from_path, settings_path, ForkSettings,
};
use forkline_telemetry::{init_telemetry, TelemetryConfig};

#[derive(Parser, Debug)]
#[command(name = "forkline", about = "Cross-application session forking")]
struct Cli {
    /// Settings file (defaults to `~/.forkline/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the account-app URL that requests a fork back to `--app`.
    AuthorizeUrl {
        #[arg(long)]
        app: App,
        #[arg(long)]
        local_id: Option<u32>,
        #[arg(long)]
        fork_type: Option<ForkType>,
        /// Page the fork returns to (defaults to the app's root).
        #[arg(long)]
        from_url: Option<String>,
    },
    /// Parse a fork landing URL and print its non-secret fields.
    Inspect { url: String },
    /// Print the effective settings as JSON.
    Settings,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli.settings.clone().unwrap_or_else(settings_path);
    let settings = install_settings(&path)?;

    start_telemetry(settings);
    tracing::debug!(path = %path.display(), "settings loaded");

    let output = run(&cli.command, settings)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn start_telemetry(settings: &ForkSettings) -> bool {
    let installed = init_telemetry(
        &TelemetryConfig::default()
            .with_level_name(&settings.logging.level)
            .with_json(settings.logging.json),
    );
    if !installed {
        tracing::debug!("tracing subscriber already installed, keeping it");
    }
    installed
}

/// Load `path` into the process-wide settings.
fn install_settings(path: &Path) -> Result<&'static ForkSettings> {
    let loaded = load_settings_from_path(path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    init_settings(loaded).map_err(|_| anyhow!("settings were already initialized"))?;
    Ok(get_settings())
}

fn run(command: &Command, settings: &ForkSettings) -> Result<serde_json::Value> {
    match command {
        Command::AuthorizeUrl {
            app,
            local_id,
            fork_type,
            from_url,
        } => {
            let urls = settings.app_urls();
            let origin = from_url.clone().unwrap_or_else(|| urls.href("/", *app));
            let env = MemoryEnvironment::new(origin);
            let state = request_fork(&env, &urls, *app, *local_id, *fork_type);
            let returns_to = ForkStateStore::new(&env)
                .get(&state)
                .map(|s| s.origin_url)
                .context("fork state was not recorded")?;
            let authorize_url = env.last_navigation().context("no navigation recorded")?;
            Ok(json!({
                "authorizeUrl": authorize_url,
                "state": state,
                "returnsTo": returns_to,
            }))
        }
        Command::Inspect { url } => {
            let params = ConsumeForkParameters::from_url(url, settings.fork.state_max_length)?;
            Ok(json!({
                "selector": params.selector.as_str(),
                "state": params.state,
                "hasKey": params.key.is_some(),
                "persistent": params.persistent,
                "trusted": params.trusted,
                "forkType": params.fork_type.map(|t| t.as_str()),
            }))
        }
        Command::Settings => Ok(serde_json::to_value(settings)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_authorize_url() {
        let cli = Cli::parse_from([
            "forkline",
            "authorize-url",
            "--app",
            "vpn-settings",
            "--local-id",
            "4",
            "--fork-type",
            "switch",
        ]);
        match cli.command {
            Command::AuthorizeUrl {
                app,
                local_id,
                fork_type,
                from_url,
            } => {
                assert_eq!(app, App::VpnSettings);
                assert_eq!(local_id, Some(4));
                assert_eq!(fork_type, Some(ForkType::Switch));
                assert!(from_url.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_rejects_unknown_app() {
        assert!(Cli::try_parse_from(["forkline", "authorize-url", "--app", "webmail"]).is_err());
    }

    #[test]
    fn authorize_url_output() {
        let command = Command::AuthorizeUrl {
            app: App::Mail,
            local_id: Some(1),
            fork_type: None,
            from_url: Some("https://mail.example.com/inbox".into()),
        };
        let out = run(&command, &ForkSettings::default()).unwrap();
        let url = out["authorizeUrl"].as_str().unwrap();
        assert!(url.starts_with("https://account.example.com/authorize?app=mail&state="));
        assert!(url.ends_with("&u=1"));
        assert_eq!(out["returnsTo"], "https://mail.example.com/inbox");
        assert_eq!(out["state"].as_str().unwrap().len(), 43);
    }

    #[test]
    fn inspect_hides_key() {
        let command = Command::Inspect {
            url: "https://mail.example.com/login#selector=sel1&state=st&sk=AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA&p=1".into(),
        };
        let out = run(&command, &ForkSettings::default()).unwrap();
        assert_eq!(out["selector"], "sel1");
        assert_eq!(out["hasKey"], true);
        assert_eq!(out["persistent"], true);
        assert_eq!(out["trusted"], false);
        assert!(!out.to_string().contains("AAAAAAAA"));
    }

    #[test]
    fn second_telemetry_start_keeps_first_subscriber() {
        let settings = ForkSettings::default();
        let _ = start_telemetry(&settings);

        let (logs, _guard) = forkline_telemetry::capture_logs();
        assert!(!start_telemetry(&settings));
        assert!(logs.has_event(tracing::Level::DEBUG, "already installed"));
    }

    #[test]
    fn installed_settings_become_global() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"apps": {"baseDomain": "corp.test"}}"#).unwrap();

        let settings = install_settings(&path).unwrap();
        assert_eq!(settings.apps.base_domain, "corp.test");
        assert_eq!(get_settings().apps.base_domain, "corp.test");
        assert!(install_settings(&path).is_err());
    }

    #[test]
    fn settings_output_is_camel_case() {
        let out = run(&Command::Settings, &ForkSettings::default()).unwrap();
        assert_eq!(out["fork"]["stateMaxLength"], 100);
    }
}
