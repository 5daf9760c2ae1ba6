// quaver - headless audio player
// Scans libraries, converts playlists and plays files with commands read from stdin

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quaver::audio::{playlist_file, FileTagReader, LibraryScanner, MetadataProbe, ScanProgress};
use quaver::settings::{self, JsonSettings, SettingsStore};
use quaver::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "quaver")]
#[command(about = "Audio player engine: library scanning, playlists and playback")]
struct Args {
    /// Enable developer logging (stderr + debug output)
    #[arg(long)]
    dev: bool,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Scan a directory (or the configured music directories) and list the tracks found
    Scan {
        dir: Option<PathBuf>,
        /// Only list tracks fuzzy-matching this query
        #[arg(long)]
        query: Option<String>,
    },
    /// Play audio files or a playlist, reading commands from stdin
    Play {
        inputs: Vec<PathBuf>,
    },
    /// Convert between .m3u and .pls
    Convert {
        input: PathBuf,
        output: PathBuf,
    },
}

fn init_logging(dev: bool, log_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("creating log directory {}", log_dir.display()))?;

    // Daily rotating file appender
    let file_appender = tracing_appender::rolling::daily(log_dir, "quaver.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Base filter: info level for general logs, debug for quaver
    let base_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,quaver=debug"));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);

    // Dev mode mirrors everything to stderr as well
    let stderr_layer = dev.then(|| fmt::layer().with_writer(std::io::stderr).with_target(true));

    tracing_subscriber::registry()
        .with(base_filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    if dev {
        eprintln!("🔧 Dev mode: debug output enabled to stderr + file");
    }

    // Keep the writer alive for the whole process
    std::mem::forget(_guard);

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;

    init_logging(args.dev, &config.log_dir)?;
    info!("quaver starting up");

    match args.command {
        Action::Scan { dir, query } => run_scan(&config, dir, query).await,
        Action::Play { inputs } => play::run(&config, inputs).await,
        Action::Convert { input, output } => convert(&input, &output),
    }
}

fn scanner_for(config: &Config) -> LibraryScanner {
    let probe = MetadataProbe::new(Arc::new(FileTagReader), config.scan.probe_wait());
    LibraryScanner::from_config(&config.scan, probe)
}

async fn run_scan(config: &Config, dir: Option<PathBuf>, query: Option<String>) -> Result<()> {
    let mut store = JsonSettings::open(&config.settings_path)?;
    let roots = match dir {
        Some(dir) => vec![dir],
        None => config.music_directories.clone(),
    };
    let scanner = scanner_for(config);

    for root in roots {
        println!("📁 Scanning {}", root.display());
        store.set_string(settings::LAST_DIRECTORY, &root.to_string_lossy());

        let handle = scanner.spawn(root);
        let (mut progress, cancel, task) = handle.into_parts();

        loop {
            tokio::select! {
                event = progress.recv() => match event {
                    Some(ScanProgress::Started { total, .. }) => println!("🔍 {} audio files", total),
                    Some(ScanProgress::TrackFound { processed, total, .. }) => {
                        if processed % 50 == 0 || processed == total {
                            println!("   📀 {}/{} ({:.0}%)", processed, total,
                                100.0 * quaver::audio::scanner::progress_fraction(processed, total));
                        }
                    }
                    Some(ScanProgress::Error { path, error }) => {
                        eprintln!("   ⚠️  {}: {}", path.display(), error);
                    }
                    Some(ScanProgress::Finished(_)) | None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    println!("⏹  Cancelling scan...");
                    cancel.cancel();
                }
            }
        }

        let outcome = task.await.context("scan task failed")?;
        if outcome.is_cancelled() {
            println!("Scan cancelled, keeping {} tracks", outcome.index().len());
        }

        let index = outcome.into_index();
        let view = match query.as_deref() {
            Some(query) => index.fuzzy_search(query),
            None => index.view(),
        };
        for (row, track) in view.iter() {
            println!(
                "{:>5}  {} - {} ({}) {}",
                row,
                track.display_artist(),
                track.display_title(),
                track.display_album(),
                quaver::audio::format_time(track.duration_ms())
            );
        }
        println!("🎵 {} of {} tracks", view.len(), index.len());
    }

    store.flush()?;
    Ok(())
}

fn convert(input: &Path, output: &Path) -> Result<()> {
    let entries = playlist_file::load(input)?;
    playlist_file::save(output, &entries)?;
    debug!("Converted {} -> {}", input.display(), output.display());
    println!("✅ Wrote {} entries to {}", entries.len(), output.display());
    Ok(())
}

#[cfg(feature = "audio")]
mod play {
    use anyhow::Result;
    use quaver::audio::rodio_engine::RodioEngine;
    use quaver::audio::{AudioConfig, EventKind, PlaylistFormat};
    use quaver::player::{Command, Notice, Player, PlayerOptions};
    use quaver::settings::JsonSettings;
    use quaver::Config;
    use std::path::PathBuf;
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::sync::mpsc;
    use tracing::warn;

    const HELP: &str = "commands: p(lay/pause) s(top) n(ext) b(ack) seek <m:ss> vol <0-100> mute \
shuffle repeat goto <i> open <file> rm <i..> new <name> load <file> save <file> scan <dir> \
cancel search <q> adopt <row> enqueue <q> edit <title|artist|album> eq <band> <gain> \
preset <name> savepreset <name> sleep <off|n minutes> ls status q(uit)";

    pub async fn run(config: &Config, inputs: Vec<PathBuf>) -> Result<()> {
        let (engine_tx, engine_rx) = mpsc::unbounded_channel();
        let mut engine = RodioEngine::new(AudioConfig::from(config))?;
        engine.set_event_sender(engine_tx);

        let settings = JsonSettings::open(&config.settings_path)?;
        let mut player = Player::new(
            engine,
            engine_rx,
            settings,
            super::scanner_for(config),
            PlayerOptions::from(config),
        );

        for kind in [
            EventKind::TrackChanged,
            EventKind::StateChanged,
            EventKind::Volume,
            EventKind::Metadata,
            EventKind::LoadFailed,
            EventKind::EngineError,
        ] {
            player
                .session_mut()
                .subscribe(kind, |event| println!("♪ {}", event.transcript()));
        }
        player.on_notice(|notice| match notice {
            Notice::RequestFile => println!("Nothing queued. Use `open <file>` or `load <playlist>`."),
            Notice::ScanStarted { root, total } => {
                println!("🔍 Scanning {} ({} files)", root.display(), total)
            }
            Notice::ScanProgress { .. } | Notice::PlaylistChanged { .. } => {}
            Notice::ScanFinished { tracks, cancelled } => {
                let how = if *cancelled { "cancelled" } else { "complete" };
                println!("🎵 Scan {}: {} tracks (use `search` and `adopt`)", how, tracks)
            }
            Notice::SleepExpired => println!("💤 Sleep timer expired, playback stopped"),
            Notice::Message(line) => println!("{}", line),
            Notice::Error(message) => eprintln!("⚠️  {}", message),
        });

        let (command_tx, command_rx) = mpsc::channel(32);
        for command in initial_commands(inputs) {
            command_tx.send(command).await?;
        }

        // stdin and Ctrl-C feed the same queue the player drains in order
        let stdin_tx = command_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }
                if line.trim() == "help" {
                    println!("{}", HELP);
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(command) => {
                        if stdin_tx.send(command).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => println!("{} (type `help`)", e),
                }
            }
            let _ = stdin_tx.send(Command::Quit).await;
        });
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = command_tx.send(Command::Quit).await;
            }
        });

        println!("{}", HELP);
        // RodioEngine holds the output stream, which must stay on this thread
        if let Err(e) = player.run(command_rx).await {
            warn!("Player shut down with an error: {}", e);
            return Err(e.into());
        }
        Ok(())
    }

    fn initial_commands(inputs: Vec<PathBuf>) -> Vec<Command> {
        let (playlists, files): (Vec<PathBuf>, Vec<PathBuf>) = inputs
            .into_iter()
            .partition(|path| PlaylistFormat::from_path(path).is_ok());

        let mut commands: Vec<Command> = playlists.into_iter().map(Command::LoadPlaylist).collect();
        let loaded_playlist = !commands.is_empty();
        if !files.is_empty() {
            commands.push(Command::Open(files));
        } else if loaded_playlist {
            commands.push(Command::PlayPause);
        }
        commands
    }
}

#[cfg(not(feature = "audio"))]
mod play {
    use anyhow::Result;
    use quaver::Config;
    use std::path::PathBuf;

    pub async fn run(_config: &Config, _inputs: Vec<PathBuf>) -> Result<()> {
        anyhow::bail!("quaver was built without the `audio` feature; playback is unavailable")
    }
}
