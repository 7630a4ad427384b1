mod bindings;
mod cli;
mod paths;
mod run;
mod session;

use std::path::Path;

use anyhow::{Context, Result};
use cli::Command;
use paths::AppPaths;
use slideconfig::SliderConfig;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Check(args)) => run_check(&args.file),
        Some(Command::Where) => run_where(),
        None => run::run(cli.run),
    }
}

fn run_check(path: &Path) -> Result<()> {
    let config = SliderConfig::load(path)
        .with_context(|| format!("configuration {} is not valid", path.display()))?;
    println!("{}: ok", path.display());
    println!("  slides:     {}", config.slides.len());
    println!(
        "  viewport:   {}x{}",
        config.viewport.width, config.viewport.height
    );
    println!(
        "  captions:   {}",
        if config.has_captions() { "yes" } else { "no" }
    );
    match config.navigation.autoplay {
        Some(period) => println!("  autoplay:   every {}ms", period.as_millis()),
        None => println!("  autoplay:   off"),
    }
    println!(
        "  effects:    displacement={} cursor={} rgb-split={}",
        config.effects.displacement_map.is_some(),
        config.effects.cursor_scale.is_some(),
        config.effects.rgb_split.is_some()
    );
    Ok(())
}

fn run_where() -> Result<()> {
    let paths = AppPaths::discover()?;
    println!("Configuration directories:");
    println!("  config:     {}", paths.config_dir().display());
    println!("  data:       {}", paths.data_dir().display());
    println!("  config file: {}", paths.config_file().display());
    println!("Image search roots:");
    for root in paths.image_roots() {
        println!("  {}", root.display());
    }
    Ok(())
}
