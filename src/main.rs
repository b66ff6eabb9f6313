mod cli;

use overlayforge::config::{self, Config};
use overlayforge::gateway::{self, RelaySummary};
use overlayforge::{
    ChannelGateway, Collaborators, Coordinator, DirectoryGateway, Fetcher, JobQueue, JobRequest,
    Source, SourceFetcher,
};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use of_av::tools::{FFMPEG, FFPROBE};
use of_av::{FfmpegTranscoder, FfprobeProber, JobWorkspace, Prober, ToolRegistry};
use of_compose::{Planner, TranscodePaths};
use of_core::events::EventBus;
use of_core::OverlaySpeed;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Lifecycle events replayed at debug level after a compose run.
const JOB_HISTORY_EVENTS: usize = 50;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "overlayforge=trace,of_av=trace,of_compose=trace,of_core=debug".to_string()
        } else {
            "overlayforge=info,of_av=info,of_compose=info,of_core=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Compose {
            sources,
            speed,
            out_dir,
            dry_run,
        } => {
            let mut config = config::load_config_or_default(cli.config.as_deref())?;
            if let Some(dir) = out_dir {
                config.output.dir = dir;
            }
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(compose(config, &sources, speed, dry_run))
        }
        Commands::Probe { file, json } => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(probe_file(&config, &file, json))
        }
        Commands::CheckTools => {
            let config = config::load_config_or_default(cli.config.as_deref())?;
            check_tools(&config)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("overlayforge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn build_prober(config: &Config, registry: &ToolRegistry) -> Result<FfprobeProber> {
    let ffprobe = registry.require(FFPROBE)?;
    Ok(FfprobeProber::new(ffprobe.to_path_buf())
        .with_timeout(config.tools.probe_timeout())
        .with_fallback_dimension(config.policy.fallback_dimension_px))
}

async fn compose(config: Config, raw_sources: &[String], speed: Option<f64>, dry_run: bool) -> Result<()> {
    let speed = match speed {
        Some(s) => OverlaySpeed::new(s)?,
        None => config.overlay.default_speed,
    };
    let sources = raw_sources
        .iter()
        .map(|s| s.parse::<Source>())
        .collect::<of_core::Result<Vec<_>>>()?;

    let registry = ToolRegistry::discover(&config.tools);
    let prober = Arc::new(build_prober(&config, &registry)?);
    let fetcher = Arc::new(SourceFetcher::new(&config.fetch));

    if dry_run {
        return dry_run_sources(&config, &sources, speed, fetcher.as_ref(), prober.as_ref()).await;
    }

    if !config.overlay.path.exists() {
        anyhow::bail!("Overlay animation does not exist: {:?}", config.overlay.path);
    }

    let ffmpeg = registry.require(FFMPEG)?;
    let transcoder = Arc::new(FfmpegTranscoder::new(
        ffmpeg.to_path_buf(),
        config.tools.transcode_timeout(),
    ));

    let (channel, mut outcomes) = ChannelGateway::new();
    let events = Arc::new(EventBus::default());
    let queue = Arc::new(JobQueue::new(events.clone()));
    let coordinator = Coordinator::new(
        queue.clone(),
        Collaborators {
            fetcher,
            prober,
            transcoder,
            gateway: Arc::new(channel),
        },
        &config,
    );

    let cancel = CancellationToken::new();
    let worker = {
        let cancel = cancel.clone();
        tokio::spawn(async move { coordinator.run(cancel).await })
    };

    let total = sources.len();
    for source in sources {
        let handle = queue.enqueue(JobRequest {
            reply_to: source.to_string(),
            source,
            speed,
        })?;
        tracing::debug!(job_id = %handle.id, position = handle.position, "Enqueued");
    }

    let delivery = DirectoryGateway::new(output_dir(&config));
    let mut summary = RelaySummary::new(total);
    let interrupt = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };
    gateway::relay(&mut outcomes, &delivery, &mut summary, interrupt).await?;

    // Stops between jobs; the running one still delivers.
    cancel.cancel();
    worker.await?;
    gateway::drain(&mut outcomes, &delivery, &mut summary).await?;

    for event in events.recent_events(JOB_HISTORY_EVENTS).iter().rev() {
        tracing::debug!(at = %event.timestamp, event = ?event.payload, "Job history");
    }

    if summary.missing() > 0 {
        anyhow::bail!(
            "interrupted: {} of {total} jobs were not processed",
            summary.missing()
        );
    }
    if summary.failed > 0 {
        anyhow::bail!("{} of {total} jobs failed", summary.failed);
    }
    Ok(())
}

async fn dry_run_sources(
    config: &Config,
    sources: &[Source],
    speed: OverlaySpeed,
    fetcher: &dyn Fetcher,
    prober: &dyn Prober,
) -> Result<()> {
    let planner = Planner::new(config.policy.clone());

    for source in sources {
        let workspace = JobWorkspace::create()?;
        fetcher.fetch(source, &workspace.input()).await?;
        let metadata = prober.probe(&workspace.input()).await?;
        let plan = planner.plan(&metadata, speed)?;
        let spec = of_compose::build(
            &plan,
            &TranscodePaths {
                primary: workspace.input(),
                overlay: config.overlay.path.clone(),
                output: workspace.output(),
            },
        )?;

        println!("{source}");
        println!(
            "  {} {}x{}, overlay {}px at ({}, {}), {:?}, {} fps",
            plan.kind,
            plan.input_width_px,
            plan.input_height_px,
            plan.scale_factor_px,
            plan.overlay_anchor.x,
            plan.overlay_anchor.y,
            plan.loop_strategy,
            plan.output_fps
        );
        println!("  [DRY RUN] ffmpeg {}", spec.to_ffmpeg_args().join(" "));

        workspace.close()?;
    }

    Ok(())
}

async fn probe_file(config: &Config, file: &Path, json: bool) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let registry = ToolRegistry::discover(&config.tools);
    let prober = build_prober(config, &registry)?;
    let metadata = prober.probe(file).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&metadata)?);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Kind: {}", metadata.kind());
    println!("Dimensions: {}x{}", metadata.width_px, metadata.height_px);
    if !metadata.has_visual_stream {
        println!("  (no visual stream, fallback dimensions)");
    }
    match metadata.duration() {
        Some(secs) => println!("Duration: {:.3}s", secs),
        None => println!("Duration: unknown"),
    }
    println!("Frames: {}", metadata.frame_count);
    if let Some(fps) = metadata.fps {
        println!("Frame rate: {:.3} fps", fps);
    }
    if let Some(ref codec) = metadata.codec {
        println!("Codec: {}", codec);
    }

    Ok(())
}

fn check_tools(config: &Config) -> Result<()> {
    println!("Checking external tools...\n");

    let registry = ToolRegistry::discover(&config.tools);
    let mut all_ok = true;

    for tool in registry.check_all() {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version);
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
        Ok(())
    } else {
        anyhow::bail!("ffmpeg and ffprobe are both required")
    }
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            config
        }
        None => {
            println!("No config file specified, using defaults");
            Config::default()
        }
    };

    println!("  Overlay: {} ({})", config.overlay.path.display(), config.overlay.default_speed);
    println!(
        "  Policy: {}s default loop, {}-{} fps, {} byte cap",
        config.policy.default_loop_secs,
        config.policy.min_fps,
        config.policy.fps_cap,
        config.policy.size_cap_bytes
    );
    println!(
        "  Timeouts: probe {}s, transcode {}s",
        config.tools.probe_timeout_secs, config.tools.transcode_timeout_secs
    );
    println!("  Output dir: {}", output_dir(&config).display());

    for warning in config.validate() {
        println!("  ! {}", warning);
    }

    Ok(())
}

fn output_dir(config: &Config) -> PathBuf {
    shellexpand::tilde(&config.output.dir.to_string_lossy())
        .into_owned()
        .into()
}
