use crate::config::Configuration;
use crate::error::{ExitCode, PipelineError};
use crate::pipeline::{Pipeline, PipelineOptions, PipelineOutcome};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Command-line interface for apigen
#[derive(Parser, Debug)]
#[command(name = "apigen", version)]
#[command(about = "Generate cloud API projects from tracked entities", long_about = None)]
pub struct Cli {
    /// TOML configuration file; APIGEN_* environment variables override it
    #[arg(long, global = true, env = "APIGEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory that relative discovery search paths resolve against
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Discover entities, fetch templates and generate the project
    Generate {
        /// Version stamped into tokens, the deployment tag and metadata
        #[arg(long, default_value = "1.0.0")]
        version: String,

        /// Output directory (recreated on every run)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Local template directory to use instead of fetching
        #[arg(long)]
        template_dir: Option<PathBuf>,
    },
    /// Print discovered entities as JSON
    Discover,
    /// Fetch the template repository and list its valid templates
    Templates,
}

/// Failure of one CLI invocation.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CliError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Pipeline(e) => e.exit_code(),
            CliError::Output(_) | CliError::Encode(_) => ExitCode::General,
        }
    }
}

/// Run `cli`, writing command output to `out`.
pub fn run(cli: &Cli, out: &mut dyn Write) -> Result<(), CliError> {
    let config = Configuration::load(cli.config.as_deref()).map_err(PipelineError::from)?;
    let mut pipeline = Pipeline::new(Arc::new(config))?;
    if let Some(base_dir) = &cli.base_dir {
        pipeline = pipeline.with_base_dir(base_dir);
    }

    match &cli.command {
        Commands::Generate {
            version,
            output,
            template_dir,
        } => {
            let options = PipelineOptions {
                version: version.clone(),
                template_dir: template_dir.clone(),
                output_dir: output.clone(),
            };
            match pipeline.run(&options)? {
                PipelineOutcome::Analyzed(entities) => {
                    writeln!(out, "NOOP mode: {} entities discovered", entities.len())?;
                    serde_json::to_writer_pretty(&mut *out, &entities)?;
                    writeln!(out)?;
                }
                PipelineOutcome::Generated(project) => {
                    writeln!(
                        out,
                        "Generated {} files ({} bytes) for {} entities into {}",
                        project.generated_files.len(),
                        project.total_size_bytes(),
                        project.entities.len(),
                        project.output_path.display()
                    )?;
                }
            }
        }
        Commands::Discover => {
            let entities = pipeline.discover()?;
            serde_json::to_writer_pretty(&mut *out, &entities)?;
            writeln!(out)?;
        }
        Commands::Templates => {
            let templates = pipeline.templates();
            let local = templates.fetch_templates().map_err(PipelineError::from)?;
            for name in templates
                .get_available_templates(&local)
                .map_err(PipelineError::from)?
            {
                writeln!(out, "{name}")?;
            }
        }
    }
    Ok(())
}
