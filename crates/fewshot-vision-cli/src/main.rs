//! fewshot-vision entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use fewshot_vision::{builtin_templates, find_template, Session};
use fewshot_vision_cli::args::CategoryArg;
use fewshot_vision_cli::config::load_config;
use fewshot_vision_cli::oneshot::run_classify;

#[derive(Parser)]
#[command(
    name = "fewshot-vision",
    about = "Teach an image classifier from a few examples, then correct it as you go",
    version
)]
struct Cli {
    /// Path to a JSON session config.
    #[arg(short, long)]
    config: Option<String>,

    /// Path to CLIP ONNX model.
    #[arg(long)]
    model: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch interactive REPL mode (default).
    Repl {
        /// Start from a built-in template (see `templates`).
        #[arg(short, long)]
        template: Option<String>,
    },

    /// Train from example directories and classify images in one go.
    ///
    /// Prints one JSON object per image on stdout.
    ///
    /// Example:
    ///   fewshot-vision classify -C cat:🐱=photos/cats -C dog:🐶=photos/dogs new1.jpg new2.jpg
    Classify {
        /// Category and its example directory: id[:emblem]=DIR. Repeatable.
        #[arg(short = 'C', long = "category", required = true)]
        categories: Vec<CategoryArg>,

        /// Hide the training progress bar.
        #[arg(short, long)]
        quiet: bool,

        /// Images to classify.
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// List built-in category templates.
    Templates,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   fewshot-vision completions bash > ~/.local/share/bash-completion/completions/fewshot-vision
    ///   fewshot-vision completions zsh > ~/.zfunc/_fewshot-vision
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Repl { template: None }) {
        Commands::Repl { template } => {
            let config = load_config(cli.config.as_deref(), cli.model.as_deref())?;
            let mut session = Session::open(config)?;
            if let Some(name) = template {
                let template = find_template(&name)
                    .ok_or_else(|| anyhow::anyhow!("Unknown template: {name}"))?;
                session.reset_with_template(template)?;
            }
            fewshot_vision_cli::repl::run(session)?;
        }

        Commands::Classify {
            categories,
            quiet,
            images,
        } => {
            let config = load_config(cli.config.as_deref(), cli.model.as_deref())?;
            let mut session = Session::open(config)?;
            let outcomes = run_classify(&mut session, &categories, &images, !quiet)?;
            for outcome in &outcomes {
                println!("{}", serde_json::to_string(outcome)?);
            }
        }

        Commands::Templates => {
            for t in builtin_templates() {
                let categories: Vec<String> = t
                    .categories
                    .iter()
                    .map(|(id, _, emblem)| format!("{emblem} {id}"))
                    .collect();
                println!("{:<22} {}", t.name, t.description);
                println!("{:<22} {}", "", categories.join(", "));
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "fewshot-vision", &mut std::io::stdout());
        }
    }

    Ok(())
}
