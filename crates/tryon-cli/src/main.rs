use std::io::{self, BufRead, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use tryon_contracts::assets::ImageAsset;
use tryon_contracts::chat::{parse_intent, SESSION_HELP_COMMANDS};
use tryon_contracts::models::ModelRegistry;
use tryon_contracts::pose::Pose;
use tryon_contracts::workflow::{ProcessingStage, WorkflowState};
use tryon_engine::{
    CaptureBridge, EngineConfig, FrameFileSurface, SessionOptions, TryOnController,
};

const DRYRUN_TEXT_MODEL: &str = "dryrun-text-1";
const DRYRUN_IMAGE_MODEL: &str = "dryrun-image-1";

#[derive(Debug, Parser)]
#[command(name = "tryon-rs", version, about = "Virtual try-on from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one try-on cycle and exit.
    Run(RunArgs),
    /// Interactive try-on session.
    Session(SessionArgs),
    /// List the known models with their profile and thinking limits.
    Models,
}

#[derive(Debug, Args)]
struct SessionArgs {
    #[arg(long)]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    text_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
    /// Use the offline backend instead of Gemini.
    #[arg(long)]
    dryrun: bool,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    session: SessionArgs,
    #[arg(long)]
    person: PathBuf,
    #[arg(long, required_unless_present = "garment_snapshot")]
    garment: Option<PathBuf>,
    /// Frame file holding a rendered 3D garment as a data URL.
    #[arg(long, conflicts_with = "garment")]
    garment_snapshot: Option<PathBuf>,
    #[arg(long, default_value = "")]
    instructions: String,
    #[arg(long, default_value = "original")]
    pose: String,
    /// After a successful cycle, apply this recommendation (1-based) and run again.
    #[arg(long)]
    apply: Option<usize>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("tryon-rs error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run_once(args),
        Command::Session(args) => {
            run_session(args)?;
            Ok(0)
        }
        Command::Models => {
            list_models(&mut io::stdout())?;
            Ok(0)
        }
    }
}

fn open_controller(args: &SessionArgs) -> Result<TryOnController> {
    let events_path = args
        .events
        .clone()
        .unwrap_or_else(|| args.out.join("events.jsonl"));
    let (text_model, image_model) = if args.dryrun {
        (
            Some(
                args.text_model
                    .clone()
                    .unwrap_or_else(|| DRYRUN_TEXT_MODEL.to_string()),
            ),
            Some(
                args.image_model
                    .clone()
                    .unwrap_or_else(|| DRYRUN_IMAGE_MODEL.to_string()),
            ),
        )
    } else {
        (args.text_model.clone(), args.image_model.clone())
    };
    let mut controller = TryOnController::open(
        &args.out,
        &events_path,
        SessionOptions {
            text_model,
            image_model,
            config: EngineConfig::from_env(),
        },
    )?;
    controller.set_observer(|state| {
        if let Some(line) = progress_line(state) {
            println!("{line}");
        }
    });
    Ok(controller)
}

fn run_once(args: RunArgs) -> Result<i32> {
    let mut controller = open_controller(&args.session)?;
    let outcome = drive_once(&mut controller, &args, &mut io::stdout());
    let finished = controller.finish();
    outcome?;
    finished?;
    Ok(exit_code(controller.state()))
}

fn drive_once(
    controller: &mut TryOnController,
    args: &RunArgs,
    out: &mut impl Write,
) -> Result<()> {
    let pose = Pose::parse(&args.pose).map_err(anyhow::Error::msg)?;
    controller.set_person(ImageAsset::from_path(&args.person)?)?;
    let garment = match (&args.garment, &args.garment_snapshot) {
        (_, Some(snapshot)) => capture_snapshot(snapshot)?,
        (Some(path), None) => ImageAsset::from_path(path)?,
        (None, None) => bail!("--garment or --garment-snapshot is required"),
    };
    controller.set_garment(garment)?;
    controller.set_instructions(args.instructions.clone())?;
    controller.set_pose(pose)?;

    controller.generate()?;
    write_state(out, controller.state())?;
    if let Some(position) = args.apply {
        if controller.result().is_some() {
            controller.apply_recommendation(recommendation_index(position)?)?;
            write_state(out, controller.state())?;
            if controller.state().notice().is_none() {
                controller.generate()?;
                write_state(out, controller.state())?;
            }
        }
    }
    Ok(())
}

/// Exit status of a one-shot run: 2 when it ended in an error or a failed
/// visualization.
fn exit_code(state: &WorkflowState) -> i32 {
    match state {
        WorkflowState::Error { .. } | WorkflowState::Idle { notice: Some(_) } => 2,
        _ => 0,
    }
}

fn run_session(args: SessionArgs) -> Result<()> {
    let mut controller = open_controller(&args)?;
    println!("Try-on session started. Type /help for commands.");
    let stdin = io::stdin();
    let result = session_loop(&mut controller, stdin.lock(), &mut io::stdout());
    controller.finish()?;
    result
}

fn session_loop(
    controller: &mut TryOnController,
    mut input: impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    let mut line = String::new();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        line.clear();
        let read = match input.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let intent = parse_intent(line.trim_end_matches(['\n', '\r']));
        match intent.action.as_str() {
            "noop" => {}
            "quit" => break,
            "help" => {
                writeln!(out, "Commands: {}", SESSION_HELP_COMMANDS.join(" "))?;
                writeln!(out, "Any other text sets the styling instructions.")?;
            }
            "set_person" | "set_garment" | "capture_garment" => {
                let Some(path) = intent.arg("path") else {
                    writeln!(out, "/{} requires a path", command_name(&intent.action))?;
                    continue;
                };
                let loaded = if intent.action == "capture_garment" {
                    capture_snapshot(Path::new(path))
                } else {
                    ImageAsset::from_path(Path::new(path))
                };
                let asset = match loaded {
                    Ok(asset) => asset,
                    Err(err) => {
                        writeln!(out, "Could not load {path}: {err:#}")?;
                        continue;
                    }
                };
                let label = asset.source().label();
                let updated = if intent.action == "set_person" {
                    controller.set_person(asset)
                } else {
                    controller.set_garment(asset)
                };
                match updated {
                    Ok(()) => writeln!(out, "{} set to {label}", role_name(&intent.action))?,
                    Err(err) => writeln!(out, "{err}")?,
                }
            }
            "set_pose" => match Pose::parse(intent.arg("pose").unwrap_or_default()) {
                Ok(pose) => {
                    controller.set_pose(pose)?;
                    writeln!(out, "Pose: {pose}")?;
                }
                Err(err) => writeln!(out, "{err}")?,
            },
            "set_instructions" => {
                let text = intent.arg("text").unwrap_or_default().to_string();
                controller.set_instructions(text)?;
                if controller.instructions().is_empty() {
                    writeln!(out, "Instructions cleared")?;
                } else {
                    writeln!(out, "Instructions: {}", controller.instructions())?;
                }
            }
            "set_text_model" | "set_image_model" => {
                let Some(requested) = intent.arg("model") else {
                    writeln!(out, "/{} requires a model name", command_name(&intent.action))?;
                    continue;
                };
                let selected = if intent.action == "set_text_model" {
                    controller.set_text_model(requested)
                } else {
                    controller.set_image_model(requested)
                };
                match selected {
                    Ok(name) => writeln!(out, "Model set to {name}")?,
                    Err(err) => writeln!(out, "Model change failed: {err:#}")?,
                }
            }
            "generate" => match controller.generate() {
                Ok(state) => write_state(out, state)?,
                Err(err) => writeln!(out, "Cannot generate yet: {err}")?,
            },
            "apply_recommendation" => {
                let index = intent
                    .arg("index")
                    .and_then(|raw| raw.parse::<usize>().ok())
                    .ok_or_else(|| anyhow::anyhow!("/apply requires a recommendation number"))
                    .and_then(recommendation_index);
                let index = match index {
                    Ok(index) => index,
                    Err(err) => {
                        writeln!(out, "{err}")?;
                        continue;
                    }
                };
                match controller.apply_recommendation(index) {
                    Ok(state) => write_state(out, state)?,
                    Err(err) => writeln!(out, "{err}")?,
                }
            }
            "reset" | "clear" => {
                let outcome = if intent.action == "reset" {
                    controller.reset()
                } else {
                    controller.clear()
                };
                match outcome {
                    Ok(()) => writeln!(out, "Ready.")?,
                    Err(err) => writeln!(out, "{err}")?,
                }
            }
            "status" => write_status(out, controller)?,
            _ => {
                writeln!(
                    out,
                    "Unknown command /{}. Type /help for commands.",
                    intent.arg("command").unwrap_or_default()
                )?;
            }
        }
    }
    Ok(())
}

fn capture_snapshot(path: &Path) -> Result<ImageAsset> {
    let mut surface = FrameFileSurface::new();
    CaptureBridge::load_and_capture(&mut surface, &path.to_string_lossy())
}

fn recommendation_index(position: usize) -> Result<usize> {
    if position == 0 {
        bail!("recommendations are numbered from 1");
    }
    Ok(position - 1)
}

fn command_name(action: &str) -> &'static str {
    match action {
        "set_person" => "person",
        "set_garment" => "garment",
        "capture_garment" => "snapshot",
        "set_text_model" => "text_model",
        "set_image_model" => "image_model",
        _ => "command",
    }
}

fn role_name(action: &str) -> &'static str {
    if action == "set_person" {
        "Person"
    } else {
        "Garment"
    }
}

fn progress_line(state: &WorkflowState) -> Option<&'static str> {
    match state {
        WorkflowState::Processing { stage } => Some(match stage {
            ProcessingStage::SafetyCheck => "Checking the garment...",
            ProcessingStage::Generating => "Generating your try-on...",
            ProcessingStage::Visualizing => "Visualizing the recommended item...",
        }),
        _ => None,
    }
}

fn write_state(out: &mut impl Write, state: &WorkflowState) -> Result<()> {
    match state {
        WorkflowState::Idle { notice } => match notice {
            Some(notice) => writeln!(out, "{notice}")?,
            None => writeln!(out, "Ready. Use /generate to try it on.")?,
        },
        WorkflowState::Processing { .. } => {}
        WorkflowState::Error { message } => writeln!(out, "Error: {message}")?,
        WorkflowState::Success { result } => {
            match result.artifact_path.as_ref() {
                Some(path) => writeln!(out, "Try-on saved to {}", path.display())?,
                None => writeln!(out, "Try-on ready (not saved to disk)")?,
            }
            if let Some(feedback) = result.feedback.as_deref() {
                writeln!(out, "Stylist: {feedback}")?;
            }
            if !result.recommendations.is_empty() {
                writeln!(out, "Recommendations:")?;
                for (position, rec) in result.recommendations.iter().enumerate() {
                    writeln!(
                        out,
                        "  {}. {} ({}, {}) {}",
                        position + 1,
                        rec.item_name,
                        rec.category,
                        rec.color,
                        rec.reason
                    )?;
                }
                writeln!(out, "Use /apply N to try one on.")?;
            }
        }
    }
    Ok(())
}

fn write_status(out: &mut impl Write, controller: &TryOnController) -> Result<()> {
    let label = |asset: Option<&ImageAsset>| {
        asset
            .map(|asset| asset.source().label())
            .unwrap_or_else(|| "(none)".to_string())
    };
    let status = json!({
        "state": controller.state().name(),
        "person": label(controller.person()),
        "garment": label(controller.garment()),
        "pose": controller.pose().to_string(),
        "instructions": controller.instructions(),
        "text_model": controller.stylist().text_model().name,
        "image_model": controller.stylist().image_model().name,
        "can_generate": controller.can_generate(),
    });
    writeln!(out, "{}", serde_json::to_string_pretty(&status)?)?;
    Ok(())
}

fn list_models(out: &mut impl Write) -> Result<()> {
    for model in ModelRegistry::default().list() {
        writeln!(
            out,
            "{:<28} {:<6} {:<8} {}",
            model.name,
            model.profile.to_string(),
            model.backend,
            model.thinking
        )?;
    }
    Ok(())
}
