//! Rubric evaluation CLI

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rubric_eval::{
    config::{Config, Credentials},
    evaluator::{EvalError, RubricGenerator, SAMPLE_PROMPT, SAMPLE_RESPONSE},
    prompt::PromptTemplate,
    reporting::{print_report, ReportFormat},
    rubric::Rubric,
    tracking::{RunLogger, RunPayload},
};

#[derive(Parser)]
#[command(name = "rubric-eval")]
#[command(about = "Generate a custom evaluation rubric for an LLM response")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and print a rubric (default)
    Run(RunArgs),

    /// Print the system instruction template and its version
    ShowPrompt,

    /// Generate sample configuration
    InitConfig {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config/rubric-eval.toml")]
        output: PathBuf,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Task prompt given to the evaluated model
    #[arg(long, conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read the task prompt from a file
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Response being evaluated
    #[arg(long, conflicts_with = "response_file")]
    response: Option<String>,

    /// Read the response from a file
    #[arg(long)]
    response_file: Option<PathBuf>,

    /// Evaluator model id
    #[arg(long)]
    model: Option<String>,

    /// Chat-completion endpoint base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Report layout
    #[arg(long, value_enum, default_value = "text")]
    format: ReportFormat,

    /// Disable run tracking
    #[arg(long)]
    no_track: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging; RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("rubric_eval=debug,info")
        } else {
            EnvFilter::new("rubric_eval=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or_else(|| Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            run_evaluation(cli.config.as_deref(), args).await?;
        }

        Commands::ShowPrompt => {
            show_prompt(cli.config.as_deref())?;
        }

        Commands::InitConfig { output } => {
            init_config(output)?;
        }
    }

    Ok(())
}

async fn run_evaluation(config_path: Option<&Path>, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = Config::load(config_path)?;
    if let Some(model) = args.model {
        config.provider.model = model;
    }
    if let Some(base_url) = args.base_url {
        config.provider.base_url = base_url;
    }
    if args.no_track {
        config.tracking.enabled = false;
    }

    let task_prompt = read_input(args.prompt, args.prompt_file.as_deref(), SAMPLE_PROMPT)?;
    let response = read_input(args.response, args.response_file.as_deref(), SAMPLE_RESPONSE)?;

    let credentials = Credentials::from_env(&config);

    if config.tracking.enabled && credentials.tracking_api_key.is_none() {
        println!("{} not found. Skipping tracking.", config.tracking.api_key_env);
    }
    let mut logger = RunLogger::from_config(&config.tracking, credentials.tracking_api_key.clone()).await;

    let rubric = match generate(&config, &credentials, &task_prompt, &response).await {
        Ok(rubric) => rubric,
        Err(e) => {
            logger.finish(1).await;
            return Err(e.into());
        }
    };

    if let Err(e) = print_report(&rubric, args.format) {
        logger.finish(1).await;
        return Err(e.into());
    }

    logger.log(&RunPayload::new()).await;
    logger.finish(0).await;
    Ok(())
}

async fn generate(
    config: &Config,
    credentials: &Credentials,
    task_prompt: &str,
    response: &str,
) -> Result<Rubric, EvalError> {
    let generator = RubricGenerator::from_config(config, credentials)?;
    Ok(generator.generate(task_prompt, response).await?)
}

/// Inline text, else file contents, else the built-in sample
fn read_input(text: Option<String>, file: Option<&Path>, sample: &str) -> Result<String, EvalError> {
    if let Some(text) = text {
        return Ok(text);
    }
    match file {
        Some(path) => std::fs::read_to_string(path)
            .map(|s| s.trim_end().to_string())
            .map_err(|source| EvalError::Input {
                path: path.to_path_buf(),
                source,
            }),
        None => Ok(sample.to_string()),
    }
}

fn show_prompt(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(config_path)?;
    let template = PromptTemplate::load(config.prompt.template_path.as_deref())?;

    println!("=== Instruction Template ({}) ===", template.version());
    println!();
    println!("{}", template.text());
    Ok(())
}

fn init_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    // Ensure parent directory exists
    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    config.save_toml(&output)?;
    println!("Configuration written to: {}", output.display());
    Ok(())
}
