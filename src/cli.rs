use std::path::PathBuf;

use anyhow::{anyhow, Context};
use tracing::info;

use crate::catalog::{list_styles, search_styles, styles_for_gender, Gender, HairstyleOption};
use crate::config::Config;
use crate::llm::GeminiClient;
use crate::presentation::{
    download_file_name, error_help, loading_tips, TIP_ROTATION_INTERVAL,
};
use crate::workflow::{Session, WorkflowState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Styles {
        search: Option<String>,
        gender: Option<Gender>,
    },
    Generate(GenerateArgs),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateArgs {
    pub image: PathBuf,
    pub style_id: String,
    pub out: Option<PathBuf>,
}

pub fn usage() -> &'static str {
    "Usage:\n  barber-ai styles [--search <query>] [--gender <male|female|unisex>]\n  barber-ai generate --image <path> --style <id> [--out <path>]"
}

fn next_value<'a>(args: &'a [String], index: &mut usize, flag: &str) -> anyhow::Result<&'a str> {
    *index += 1;
    args.get(*index)
        .map(|value| value.as_str())
        .ok_or_else(|| anyhow!("Missing value for {flag}"))
}

/// Parses `argv` (program name included).
pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    match args.get(1).map(|value| value.as_str()) {
        Some("styles") => parse_styles_args(args),
        Some("generate") => parse_generate_args(args),
        Some("--help" | "-h") | None => Err(anyhow!(usage())),
        Some(other) => Err(anyhow!("Unknown command: {other}\n{}", usage())),
    }
}

fn parse_styles_args(args: &[String]) -> anyhow::Result<Command> {
    let mut search = None;
    let mut gender = None;

    let mut index = 2;
    while index < args.len() {
        match args[index].as_str() {
            "--search" => {
                search = Some(next_value(args, &mut index, "--search")?.to_string());
            }
            "--gender" => {
                let value = next_value(args, &mut index, "--gender")?;
                gender = Some(value.parse::<Gender>().map_err(|err| anyhow!(err))?);
            }
            "--help" | "-h" => return Err(anyhow!(usage())),
            other => {
                return Err(anyhow!("Unknown styles argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }

    Ok(Command::Styles { search, gender })
}

fn parse_generate_args(args: &[String]) -> anyhow::Result<Command> {
    let mut image = None;
    let mut style_id = None;
    let mut out = None;

    let mut index = 2;
    while index < args.len() {
        match args[index].as_str() {
            "--image" => {
                image = Some(PathBuf::from(next_value(args, &mut index, "--image")?));
            }
            "--style" => {
                style_id = Some(next_value(args, &mut index, "--style")?.to_string());
            }
            "--out" => {
                out = Some(PathBuf::from(next_value(args, &mut index, "--out")?));
            }
            "--help" | "-h" => return Err(anyhow!(usage())),
            other => {
                return Err(anyhow!("Unknown generate argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }

    let image = image.ok_or_else(|| anyhow!("--image is required"))?;
    let style_id = style_id.ok_or_else(|| anyhow!("--style is required"))?;

    Ok(Command::Generate(GenerateArgs {
        image,
        style_id,
        out,
    }))
}

pub fn select_styles(search: Option<&str>, gender: Option<Gender>) -> Vec<&'static HairstyleOption> {
    match (search, gender) {
        (Some(query), Some(gender)) => {
            let mut styles = search_styles(query);
            styles.retain(|style| style.gender == gender);
            styles
        }
        (Some(query), None) => search_styles(query),
        (None, Some(gender)) => styles_for_gender(gender),
        (None, None) => list_styles().iter().collect(),
    }
}

pub async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    match command {
        Command::Styles { search, gender } => {
            let styles = select_styles(search.as_deref(), gender);
            if styles.is_empty() {
                println!("No hairstyles match.");
            }
            for style in styles {
                println!(
                    "{:<16} {:<18} {:<7} {}",
                    style.id,
                    style.name,
                    style.gender.as_str(),
                    style.description
                );
            }
            Ok(())
        }
        Command::Generate(args) => run_generate(args, config).await,
    }
}

async fn run_generate(args: GenerateArgs, config: Config) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(&args.image)
        .await
        .with_context(|| format!("Failed to read {}", args.image.display()))?;

    let session = Session::new(GeminiClient::new(config));
    session.select_image(bytes)?;
    session.select_style(&args.style_id)?;

    let style_name = session
        .snapshot()
        .selected_style()
        .map(|style| style.name)
        .ok_or_else(|| anyhow!("No style selected"))?;
    let mut handle = session
        .apply_generation()
        .ok_or_else(|| anyhow!("Generation could not be started"))?;

    let tips = loading_tips(style_name);
    let mut ticker = tokio::time::interval(TIP_ROTATION_INTERVAL);
    let mut tip_index = 0;
    loop {
        tokio::select! {
            joined = &mut handle => {
                joined.context("Generation task failed")?;
                break;
            }
            _ = ticker.tick() => {
                eprintln!("{}", tips[tip_index % tips.len()]);
                tip_index += 1;
            }
        }
    }

    match session.snapshot() {
        WorkflowState::Result { result, .. } => {
            let out = args
                .out
                .unwrap_or_else(|| PathBuf::from(download_file_name(&result.style_applied)));
            tokio::fs::write(&out, result.result.bytes())
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Saved {} to {}", result.style_applied, out.display());
            println!("{}", out.display());
            Ok(())
        }
        state => {
            let failure = state
                .failure()
                .ok_or_else(|| anyhow!("Generation ended without a result"))?;
            eprintln!("Error: {}", failure.message);
            if let Some(steps) = error_help(failure.kind) {
                for step in steps {
                    eprintln!("  - {step}");
                }
            }
            Err(anyhow!(failure.message.clone()))
        }
    }
}
