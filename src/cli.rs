use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::client::{ClientConfig, DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL, ZuoraClient};
use crate::config::{Environment, default_config_path, load_environment};
use crate::describe::{ensure_known_resource, render_description};
use crate::input::QuerySource;
use crate::job::JobOptions;

#[derive(Debug, Parser)]
#[command(name = "zacc")]
#[command(about = "Run ZOQL export queries against the Zuora AQuA API")]
#[command(version)]
pub struct Cli {
    /// Config file containing Zuora OAuth credentials [default: ~/.zacc.ini]
    #[arg(short = 'c', long, global = true, env = "ZACC_CONFIG")]
    pub config_filename: Option<PathBuf>,

    /// Zuora environment (config section) to execute on
    #[arg(short, long, global = true, env = "ZACC_ENVIRONMENT")]
    pub environment: Option<String>,

    /// Project name attached to the job
    #[arg(long, global = true)]
    pub project: Option<String>,

    /// Project prefix, a timestamp is appended to it
    #[arg(long, global = true)]
    pub project_prefix: Option<String>,

    /// Partner name attached to the job
    #[arg(long, global = true)]
    pub partner: Option<String>,

    /// Maximum poll attempts before giving up, 0 polls until the job finishes
    #[arg(short, long, global = true)]
    pub max_retries: Option<u32>,

    /// Seconds to wait between status polls
    #[arg(long, global = true)]
    pub poll_interval: Option<f64>,

    /// Do not show a spinner while waiting for the job
    #[arg(long, global = true)]
    pub no_progress: bool,

    /// Log HTTP activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print the bearer token, then exit
    Bearer,
    /// List available fields of a Zuora resource
    Describe {
        /// Zuora object name, e.g. Account
        resource: String,
    },
    /// Run a ZOQL query
    ///
    /// ZOQL is either an inline query or a path to a file holding one or more
    /// queries separated by an empty line.
    Query {
        /// File name or inline query string
        zoql: String,
        /// Where to write the output to, default is STDOUT
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

impl Cli {
    fn client_config(&self, env: &Environment) -> Result<ClientConfig> {
        let max_retries = match self.max_retries.or(env.max_retries) {
            Some(0) => None,
            Some(n) => Some(n),
            None => Some(DEFAULT_MAX_RETRIES),
        };

        let poll_interval = match self.poll_interval {
            Some(secs) => Duration::try_from_secs_f64(secs)
                .map_err(|e| anyhow::anyhow!("invalid --poll-interval {}: {}", secs, e))?,
            None => env.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
        };

        let job = JobOptions {
            partner: self.partner.clone().or_else(|| env.partner.clone()),
            project: self.project.clone().or_else(|| env.project.clone()),
            project_prefix: self
                .project_prefix
                .clone()
                .or_else(|| env.project_prefix.clone()),
        };

        Ok(ClientConfig::new(env.credentials.clone(), env.endpoints())
            .with_job_options(job)
            .with_max_retries(max_retries)
            .with_poll_interval(poll_interval)
            .with_progress(!self.no_progress))
    }
}

/// Executes one command, writing its output to `out`.
pub fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    // Arguments are checked before any network traffic.
    let queries = match &cli.command {
        Commands::Describe { resource } => {
            ensure_known_resource(resource)?;
            Vec::new()
        }
        Commands::Query { zoql, .. } => {
            let cwd = std::env::current_dir().context("failed to read working directory")?;
            let queries = QuerySource::resolve(zoql, &cwd)?.queries()?;
            if queries.is_empty() {
                anyhow::bail!("no queries to run in '{}'", zoql);
            }
            queries
        }
        Commands::Bearer => Vec::new(),
    };

    let config_path = cli
        .config_filename
        .clone()
        .unwrap_or_else(default_config_path);
    let env = load_environment(&config_path, cli.environment.as_deref())?;
    tracing::debug!(environment = %env.name, production = env.production, "environment resolved");

    let client = ZuoraClient::connect(cli.client_config(&env)?)?;

    match cli.command {
        Commands::Bearer => {
            writeln!(out, "{}", client.authorization())?;
        }
        Commands::Describe { resource } => {
            let xml = client.get_resource(&resource)?;
            write!(out, "{}", render_description(&xml)?)?;
        }
        Commands::Query { output, .. } => {
            let content = client.query(&queries)?;
            let joined = content.join("\n");
            match output {
                Some(path) => std::fs::write(&path, joined)
                    .with_context(|| format!("failed to write {}", path.display()))?,
                None => writeln!(out, "{}", joined)?,
            }
        }
    }

    Ok(())
}
