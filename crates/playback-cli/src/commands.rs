//! CLI command implementations

use crate::output::{self, EntryRow, FieldRow, OutputFormat, StepRow};
use anyhow::{bail, Context};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use playback_core::{
    BatchResolution, EnginePlayerPlugin, HeadlessEngineFactory, HeadlessHost, HostKind, LifecycleEvent,
    LocalServiceHost, PlaybackConfig, PlaybackSdk, PlaybackSession, PlayerMount, SdkConfig, TracingNotifications,
    VideoPlayerConfig, VideoPlayerPlugin,
};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Time allowed for engine events to reach the session after a command
const SETTLE: Duration = Duration::from_millis(50);

/// A navigation or transport command applied to a headless session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavCommand {
    Next,
    Previous,
    First,
    Last,
    Play,
    Pause,
    Background,
    Foreground,
    Seek(String),
}

impl FromStr for NavCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(entry) = s.strip_prefix("seek:") {
            if entry.is_empty() {
                return Err("seek needs an entry id, e.g. seek:0_abc".to_string());
            }
            return Ok(NavCommand::Seek(entry.to_string()));
        }
        match s.to_lowercase().as_str() {
            "next" => Ok(NavCommand::Next),
            "prev" | "previous" => Ok(NavCommand::Previous),
            "first" => Ok(NavCommand::First),
            "last" => Ok(NavCommand::Last),
            "play" => Ok(NavCommand::Play),
            "pause" => Ok(NavCommand::Pause),
            "background" | "bg" => Ok(NavCommand::Background),
            "foreground" | "fg" => Ok(NavCommand::Foreground),
            other => Err(format!("unknown command '{other}'")),
        }
    }
}

impl fmt::Display for NavCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavCommand::Next => write!(f, "next"),
            NavCommand::Previous => write!(f, "prev"),
            NavCommand::First => write!(f, "first"),
            NavCommand::Last => write!(f, "last"),
            NavCommand::Play => write!(f, "play"),
            NavCommand::Pause => write!(f, "pause"),
            NavCommand::Background => write!(f, "background"),
            NavCommand::Foreground => write!(f, "foreground"),
            NavCommand::Seek(entry) => write!(f, "seek:{entry}"),
        }
    }
}

/// Arguments of the `playlist` command
pub struct PlaylistArgs {
    pub entries: Vec<String>,
    pub play: Option<String>,
    pub token: Option<String>,
    pub nav: Vec<NavCommand>,
    pub autoplay: bool,
    pub background: bool,
}

fn spinner(message: impl Into<String>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let spinner_style = ProgressStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(spinner_style);
    pb.set_message(message.into());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

async fn initialize(config: SdkConfig) -> anyhow::Result<PlaybackSdk> {
    let pb = spinner("Fetching player license");
    let sdk = PlaybackSdk::initialize(config).await;
    pb.finish_and_clear();
    sdk.context("SDK initialization failed (check --api-key or PLAYBACK_API_KEY)")
}

fn mask(key: &str) -> String {
    let visible: String = key.chars().take(4).collect();
    format!("{visible}****")
}

#[derive(Serialize)]
struct InfoReport {
    sdk_version: &'static str,
    base_url: String,
    license: String,
    analytics_enabled: bool,
    player_name: Option<String>,
}

/// Initialize the SDK and show the license it received
pub async fn info(config: SdkConfig, format: &str) -> anyhow::Result<()> {
    let sdk = initialize(config).await?;
    let license = sdk.license();

    let report = InfoReport {
        sdk_version: PlaybackSdk::version(),
        base_url: sdk.config().base_url.clone(),
        license: mask(&license.license_key),
        analytics_enabled: license.analytics_key.is_some(),
        player_name: license.player_name.clone(),
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::to_json(&report)),
        OutputFormat::Table => {
            let rows = [
                FieldRow::new("SDK version", report.sdk_version),
                FieldRow::new("Base URL", report.base_url.clone()),
                FieldRow::new("License", report.license.clone()),
                FieldRow::new("Analytics", report.analytics_enabled.to_string()),
                FieldRow::new("Player", report.player_name.clone().unwrap_or_else(|| "-".into())),
            ];
            println!("{}", output::table(rows));
        }
        OutputFormat::Text => {
            println!("{} Player license ready", style("✓").green());
            println!("  SDK version: {}", report.sdk_version);
            println!("  Base URL:    {}", report.base_url);
            println!("  License:     {}", report.license);
            println!("  Analytics:   {}", if report.analytics_enabled { "enabled" } else { "disabled" });
            if let Some(player) = &report.player_name {
                println!("  Player:      {player}");
            }
        }
    }

    Ok(())
}

/// Rows for every requested entry, in request order
fn entry_rows(entries: &[String], batch: &BatchResolution) -> Vec<EntryRow> {
    entries
        .iter()
        .map(|id| {
            if let Some(details) = batch.successes.iter().find(|d| &d.id == id) {
                EntryRow {
                    entry_id: id.clone(),
                    status: if details.is_playable() { "ok" } else { "no stream" }.to_string(),
                    title: details.title.clone().unwrap_or_default(),
                    detail: details.url.clone().unwrap_or_default(),
                }
            } else {
                let error = batch
                    .failures
                    .iter()
                    .find(|f| &f.entry_id == id)
                    .map(|f| f.error.to_string())
                    .unwrap_or_default();
                EntryRow {
                    entry_id: id.clone(),
                    status: "failed".to_string(),
                    title: String::new(),
                    detail: error,
                }
            }
        })
        .collect()
}

fn print_entries(rows: &[EntryRow]) {
    for row in rows {
        let status = match row.status.as_str() {
            "ok" => style(row.status.as_str()).green(),
            "failed" => style(row.status.as_str()).red(),
            _ => style(row.status.as_str()).yellow(),
        };
        println!("{:<9} {}", status, style(&row.entry_id).bold());
        if !row.title.is_empty() {
            println!("          {}", row.title);
        }
        if !row.detail.is_empty() {
            println!("          {}", style(&row.detail).dim());
        }
    }
}

/// Resolve entries and print their playback details
pub async fn resolve(config: SdkConfig, entries: &[String], token: Option<&str>, format: &str) -> anyhow::Result<()> {
    let sdk = initialize(config).await?;

    let pb = spinner(format!("Resolving {} entries", entries.len()));
    let batch = sdk.load_all_hls_streams(entries, token).await;
    pb.finish_and_clear();

    let rows = entry_rows(entries, &batch);
    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::to_json(&rows)),
        OutputFormat::Table => println!("{}", output::table(rows.iter().cloned())),
        OutputFormat::Text => print_entries(&rows),
    }

    if batch.successes.is_empty() {
        bail!("none of the {} entries resolved", entries.len());
    }
    Ok(())
}

#[derive(Serialize)]
struct PlaylistReport {
    session_id: String,
    skipped: Vec<EntryRow>,
    steps: Vec<StepRow>,
}

async fn snapshot(session: &PlaybackSession, step: usize, command: String, outcome: String) -> StepRow {
    StepRow {
        step,
        command,
        outcome,
        active: session.active_entry_id().await.unwrap_or_else(|| "-".to_string()),
        state: session.state().to_string(),
        service: format!("{:?}", session.service_link()).to_lowercase(),
    }
}

async fn apply(plugin: &EnginePlayerPlugin, mount: &PlayerMount, command: &NavCommand) -> String {
    let session = mount.session();
    let result = match command {
        NavCommand::Next => session.play_next().await,
        NavCommand::Previous => session.play_previous().await,
        NavCommand::First => session.play_first().await,
        NavCommand::Last => session.play_last().await,
        NavCommand::Play => session.play().await,
        NavCommand::Pause => session.pause().await,
        NavCommand::Background => mount.on_lifecycle(LifecycleEvent::Stop).await,
        NavCommand::Foreground => mount.on_lifecycle(LifecycleEvent::Start).await,
        NavCommand::Seek(entry) => {
            return if plugin.seek(entry).await { "ok" } else { "failed" }.to_string();
        }
    };
    match result {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {e}"),
    }
}

/// Resolve a playlist, mount it in a headless session and apply commands
pub async fn playlist(config: SdkConfig, args: PlaylistArgs, format: &str) -> anyhow::Result<()> {
    let sdk = initialize(config).await?;

    let services = Arc::new(LocalServiceHost::new(Arc::new(TracingNotifications)));
    let session = sdk.session(Arc::new(HeadlessEngineFactory::new()), services);

    let plugin = Arc::new(EnginePlayerPlugin::new(session.clone()));
    plugin
        .setup(VideoPlayerConfig::new(PlaybackConfig {
            autoplay_enabled: args.autoplay,
            background_playback_enabled: args.background,
            ..Default::default()
        }))
        .await;
    sdk.registry().register_plugin(plugin.clone());

    let surface = sdk.surface(Arc::new(HeadlessHost::new(HostKind::Composable)));

    let pb = spinner(format!("Loading {} entries", args.entries.len()));
    let load = surface
        .load_playlist(&args.entries, args.play.as_deref(), args.token.as_deref(), None)
        .await;
    pb.finish_and_clear();
    let load = load.context("playlist load failed")?;

    let skipped: Vec<EntryRow> = load
        .failures
        .iter()
        .map(|f| EntryRow {
            entry_id: f.entry_id.clone(),
            status: "skipped".to_string(),
            title: String::new(),
            detail: f.error.to_string(),
        })
        .collect();

    let Some(mount) = load.mount else {
        print_entries(&skipped);
        bail!("none of the {} entries resolved", args.entries.len());
    };

    let mut states = session.subscribe_state();
    tokio::time::timeout(READY_TIMEOUT, states.wait_for(|s| s.is_ready()))
        .await
        .context("timed out waiting for the player")?
        .context("session closed before the player was ready")?;
    tokio::time::sleep(SETTLE).await;

    let mut steps = vec![snapshot(&session, 0, "load".to_string(), format!("{} playable", mount.playable())).await];
    for (i, command) in args.nav.iter().enumerate() {
        let outcome = apply(&plugin, &mount, command).await;
        tokio::time::sleep(SETTLE).await;
        steps.push(snapshot(&session, i + 1, command.to_string(), outcome).await);
    }

    mount.dispose().await.context("failed to dispose the player")?;
    session.destroy().await;

    let report = PlaylistReport {
        session_id: session.id().to_string(),
        skipped,
        steps,
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::to_json(&report)),
        OutputFormat::Table => {
            if !report.skipped.is_empty() {
                println!("{}", output::table(report.skipped.iter().cloned()));
            }
            println!("{}", output::table(report.steps.iter().cloned()));
        }
        OutputFormat::Text => {
            print_entries(&report.skipped);
            println!("Session {}", style(&report.session_id).bold());
            for step in &report.steps {
                let outcome = if step.outcome.starts_with("error") || step.outcome == "failed" {
                    style(step.outcome.as_str()).red()
                } else {
                    style(step.outcome.as_str()).green()
                };
                println!(
                    "  {:>2}. {:<14} {:<24} active={} state={} service={}",
                    step.step, step.command, outcome, step.active, step.state, step.service
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use playback_core::{EntryFailure, Error, VideoDetails};

    #[test]
    fn test_nav_command_parsing() {
        assert_eq!("next".parse::<NavCommand>(), Ok(NavCommand::Next));
        assert_eq!(" PREV ".parse::<NavCommand>(), Ok(NavCommand::Previous));
        assert_eq!("bg".parse::<NavCommand>(), Ok(NavCommand::Background));
        assert_eq!("seek:0_abc".parse::<NavCommand>(), Ok(NavCommand::Seek("0_abc".into())));
        assert!("seek:".parse::<NavCommand>().is_err());
        assert!("rewind".parse::<NavCommand>().is_err());
    }

    #[test]
    fn test_nav_command_display_parses_back() {
        for command in [NavCommand::Previous, NavCommand::Seek("e2".into()), NavCommand::Foreground] {
            assert_eq!(command.to_string().parse::<NavCommand>(), Ok(command));
        }
    }

    #[test]
    fn test_mask() {
        assert_eq!(mask("abcdefgh"), "abcd****");
        assert_eq!(mask("ab"), "ab****");
    }

    #[test]
    fn test_entry_rows_keep_request_order() {
        let batch = BatchResolution {
            successes: vec![VideoDetails::new("b", "https://cdn.example.com/b.m3u8").with_title("B")],
            failures: vec![EntryFailure {
                entry_id: "a".into(),
                error: Error::api(404, "Failed to get video details", "NO_ENTITY_EXIST"),
            }],
        };

        let rows = entry_rows(&["a".to_string(), "b".to_string()], &batch);

        assert_eq!(rows[0].entry_id, "a");
        assert_eq!(rows[0].status, "failed");
        assert_eq!(rows[1].status, "ok");
        assert_eq!(rows[1].title, "B");
    }
}
