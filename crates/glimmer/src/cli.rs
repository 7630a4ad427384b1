use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::session::Script;

#[derive(Parser, Debug)]
#[command(
    name = "glimmer",
    author,
    version,
    about = "Glimmer image carousel host",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Slider configuration TOML. Defaults to `glimmer.toml` in the config directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of frames to simulate.
    #[arg(long, value_name = "N", default_value_t = 600)]
    pub frames: u32,

    /// Simulated frame rate.
    #[arg(long, value_name = "FPS", value_parser = parse_fps, default_value = "60")]
    pub fps: f32,

    /// Seed for the scripted pointer; can also be supplied via `GLIMMER_SEED`.
    #[arg(long, env = "GLIMMER_SEED", default_value_t = 7)]
    pub seed: u64,

    /// Input script driving the session.
    #[arg(long, value_enum, default_value_t = Script::Wander)]
    pub script: Script,

    /// Override the configured viewport (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(f32, f32)>,

    /// Print the session report as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a slider configuration and summarise it.
    Check(CheckArgs),
    /// Print resolved configuration and data directories.
    Where,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(f32, f32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("invalid width '{}'", width.trim()))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("invalid height '{}'", height.trim()))?;
    if width == 0 || height == 0 {
        return Err("viewport dimensions must be greater than zero".to_string());
    }
    Ok((width as f32, height as f32))
}

pub fn parse_fps(value: &str) -> Result<f32, String> {
    let fps: f32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid frame rate '{}'", value.trim()))?;
    if !(fps.is_finite() && fps > 0.0 && fps <= 1000.0) {
        return Err(format!("frame rate must be within (0, 1000], got {fps}"));
    }
    Ok(fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_parse_in_either_case() {
        assert_eq!(parse_size("1280x720"), Ok((1280.0, 720.0)));
        assert_eq!(parse_size(" 800X600 "), Ok((800.0, 600.0)));
        assert!(parse_size("800").is_err());
        assert!(parse_size("0x600").is_err());
        assert!(parse_size("wide x 600").is_err());
    }

    #[test]
    fn fps_must_be_positive() {
        assert_eq!(parse_fps("30"), Ok(30.0));
        assert!(parse_fps("0").is_err());
        assert!(parse_fps("-5").is_err());
        assert!(parse_fps("fast").is_err());
    }

    #[test]
    fn defaults_describe_a_wander_session() {
        let cli = Cli::parse_from(["glimmer"]);
        assert_eq!(cli.run.frames, 600);
        assert_eq!(cli.run.script, Script::Wander);
        assert!(!cli.run.json);
        assert!(cli.command.is_none());
    }

    #[test]
    fn check_takes_a_file() {
        let cli = Cli::parse_from(["glimmer", "check", "slides.toml"]);
        match cli.command {
            Some(Command::Check(args)) => assert_eq!(args.file, PathBuf::from("slides.toml")),
            other => panic!("unexpected command {other:?}"),
        }
    }
}
