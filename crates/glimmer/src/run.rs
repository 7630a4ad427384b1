use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use carousel::headless::{HeadlessRenderer, TweenEngine};
use carousel::{Size, Slider};
use slideconfig::SliderConfig;
use tracing_subscriber::EnvFilter;

use crate::bindings::{slider_props, AssetRoots};
use crate::cli::RunArgs;
use crate::paths::AppPaths;
use crate::session::{self, SessionPlan, SessionReport};

/// Used when neither `--config` nor the user config file exists.
const DEMO_CONFIG: &str = r#"
version = 1

[viewport]
width = 1280
height = 720

[[slides]]
image = "mem://1920x1080/dunes"
title = "Dunes"
subtitle = "Erg Chebbi at dusk"

[[slides]]
image = "mem://1600x1200/harbour"
title = "Harbour"
subtitle = "Early ferries"

[[slides]]
image = "mem://1080x1350/glacier"
title = "Glacier"
subtitle = "Blue ice, late spring"

[navigation]
autoplay = "5s"

[effects]
displacement_map = "mem://512x512/clouds"
cursor_map = "mem://256x256/ripple"
cursor_scale = 18.0
rgb_split = 2.0
"#;

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let (config, base) = load_config(args.config.as_deref(), &paths)?;
    tracing::debug!(
        config = %paths.config_dir().display(),
        data = %paths.data_dir().display(),
        slides = config.slides.len(),
        "resolved glimmer paths"
    );

    let roots = AssetRoots {
        base,
        fallbacks: paths.image_roots(),
    };
    let mut props = slider_props(&config, &roots);
    if let Some((width, height)) = args.size {
        props.viewport = Size::new(width, height);
    }
    let viewport = props.viewport;

    let mut slider = Slider::new(
        Box::new(HeadlessRenderer::default()),
        Box::new(TweenEngine::new()),
        props,
    )
    .context("failed to construct slider")?;
    tracing::info!(
        instance = slider.instance(),
        script = ?args.script,
        frames = args.frames,
        fps = args.fps,
        seed = args.seed,
        "starting scripted session"
    );

    let start = Instant::now();
    slider
        .initialize(viewport, start)
        .context("failed to initialise slider")?;
    let plan = SessionPlan {
        script: args.script,
        frames: args.frames,
        fps: args.fps,
        seed: args.seed,
    };
    let report = session::drive(&mut slider, plan, viewport, start);

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("failed to encode session report")?;
        println!("{json}");
    } else {
        print_report(&report);
    }
    Ok(())
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>, paths: &AppPaths) -> Result<(SliderConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        let config = SliderConfig::load(path)
            .with_context(|| format!("failed to load slider config {}", path.display()))?;
        return Ok((config, path.parent().map(Path::to_path_buf)));
    }

    let default_file = paths.config_file();
    if default_file.exists() {
        let config = SliderConfig::load(&default_file)
            .with_context(|| format!("failed to load slider config {}", default_file.display()))?;
        return Ok((config, Some(paths.config_dir().to_path_buf())));
    }

    tracing::info!(
        expected = %default_file.display(),
        "no slider config found; using the built-in demo"
    );
    let config = SliderConfig::from_toml_str(DEMO_CONFIG).context("built-in demo config is invalid")?;
    Ok((config, None))
}

fn print_report(report: &SessionReport) {
    let status = &report.status;
    println!(
        "Session: {:?} (seed {}), {} frames over {}ms",
        report.script, report.seed, report.frames, report.simulated_ms
    );
    println!(
        "  slides:     final index {}, {} changes, {} transitions completed",
        report.final_index, report.slide_changes, status.counters.transitions
    );
    println!(
        "  updates:    executed {}, coalesced {}, failed {}",
        report.updates.executed, report.updates.coalesced, report.updates.failed
    );
    println!(
        "  effects:    pointer {}, idle {}, swipes {}, tilt resets {}, resizes {}",
        status.counters.pointer_responses,
        status.counters.idle_expirations,
        status.counters.swipes,
        status.counters.tilt_resets,
        status.counters.resizes
    );
    let changes = if report.quality_changes.is_empty() {
        "none".to_string()
    } else {
        report
            .quality_changes
            .iter()
            .map(|level| level.as_str())
            .collect::<Vec<_>>()
            .join(" -> ")
    };
    println!("  quality:    {} (changes: {changes})", status.quality);
    println!(
        "  disposal:   {} display objects, {} filters, {} textures, {} errors",
        report.disposal.display_objects_destroyed,
        report.disposal.filters_destroyed,
        report.disposal.textures_destroyed,
        report.disposal.errors
    );
    if report.leaked.is_empty() {
        println!("  leaked:     none");
    } else {
        println!("  leaked:     {:?}", report.leaked);
    }
}
