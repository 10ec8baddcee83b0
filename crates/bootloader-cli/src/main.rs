mod commands;

use bootloader_core::{install_signal_handler, Config, CoreError, CreateLbsOptions, Engine};
use bootloader_runtime::{check_prereqs, format_missing, ProcessRunner};
use bootloader_schema::{Iaas, LbType};
use bootloader_store::{StateLayout, StateStore};
use clap::{Args, Parser, Subcommand};
use commands::{exit_code, EXIT_FAILURE};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(
    name = "bootloader",
    version,
    about = "Resumable provisioning of cloud environments, jump hosts and directors"
)]
struct Cli {
    /// Directory holding the environment descriptor and generated files.
    #[arg(long, default_value = ".", global = true)]
    state_dir: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    /// Run the IaC tool with its own debug logging enabled.
    #[arg(long, default_value_t = false, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Provider selection and credentials for `up` and `plan`. Flags override
/// `bootloader.toml` and `BOOTLOADER_*` variables.
#[derive(Debug, Args)]
struct ProviderArgs {
    /// Cloud provider: aws or gcp. Required for a new environment.
    #[arg(long)]
    iaas: Option<Iaas>,
    /// Stop after the jumpbox; never install a director.
    #[arg(long, default_value_t = false)]
    no_director: bool,
    /// Extra operations file applied to the director manifest.
    #[arg(long)]
    ops_file: Option<PathBuf>,
    #[arg(long)]
    aws_access_key_id: Option<String>,
    #[arg(long)]
    aws_secret_access_key: Option<String>,
    #[arg(long)]
    aws_region: Option<String>,
    /// Service account key JSON, or a path to it.
    #[arg(long)]
    gcp_service_account_key: Option<String>,
    #[arg(long)]
    gcp_project_id: Option<String>,
    #[arg(long)]
    gcp_zone: Option<String>,
    #[arg(long)]
    gcp_region: Option<String>,
}

impl ProviderArgs {
    fn apply(&self, config: &mut Config) {
        if self.iaas.is_some() {
            config.iaas = self.iaas;
        }
        let overrides = [
            (&self.aws_access_key_id, &mut config.aws.access_key_id),
            (&self.aws_secret_access_key, &mut config.aws.secret_access_key),
            (&self.aws_region, &mut config.aws.region),
            (&self.gcp_service_account_key, &mut config.gcp.service_account_key),
            (&self.gcp_project_id, &mut config.gcp.project_id),
            (&self.gcp_zone, &mut config.gcp.zone),
            (&self.gcp_region, &mut config.gcp.region),
        ];
        for (flag, slot) in overrides {
            if flag.is_some() {
                slot.clone_from(flag);
            }
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create or update the environment: networking, jumpbox and director.
    Up(ProviderArgs),
    /// Stage every template and script `up` would use without running them.
    Plan(ProviderArgs),
    /// Attach a load balancer, or replace the certificate of the attached one.
    CreateLbs {
        /// Load balancer type: cf or concourse.
        #[arg(long = "type")]
        lb_type: LbType,
        /// Path to the PEM certificate.
        #[arg(long)]
        cert: PathBuf,
        /// Path to the PEM private key.
        #[arg(long)]
        key: PathBuf,
        /// Path to the PEM certificate chain.
        #[arg(long)]
        chain: Option<PathBuf>,
        /// System domain; keeps the current one when omitted.
        #[arg(long)]
        domain: Option<String>,
    },
    /// Detach the load balancer.
    DeleteLbs,
    /// Tear down the director, the jumpbox and all networking.
    Destroy {
        /// Do not ask for confirmation.
        #[arg(long, default_value_t = false)]
        no_confirm: bool,
    },
    /// Print the environment id.
    EnvId,
    /// Show the attached load balancer and its outputs.
    Lbs,
    /// Show bootloader and external tool versions.
    Version,
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("BOOTLOADER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(exit_code(&e))
        }
    }
}

fn run(cli: Cli) -> Result<u8, CoreError> {
    let store = StateStore::new(StateLayout::new(&cli.state_dir));
    let mut config = Config::load(&cli.state_dir, |key| std::env::var(key).ok())?;
    if cli.debug {
        config.debug = true;
    }
    if let Commands::Up(args) | Commands::Plan(args) = &cli.command {
        args.apply(&mut config);
    }
    debug!(
        "state dir {}, terraform {}, bosh {}",
        cli.state_dir.display(),
        config.terraform_path().display(),
        config.bosh_path().display()
    );

    let needs_tools = matches!(
        cli.command,
        Commands::Up(_)
            | Commands::Plan(_)
            | Commands::CreateLbs { .. }
            | Commands::DeleteLbs
            | Commands::Destroy { .. }
    );
    if needs_tools && std::env::var("BOOTLOADER_SKIP_PREREQS").as_deref() != Ok("1") {
        let missing = check_prereqs(&config.terraform_path(), &config.bosh_path());
        if !missing.is_empty() {
            eprintln!("error: {}", format_missing(&missing));
            return Ok(EXIT_FAILURE);
        }
    }

    let engine = Engine::with_tools(store.clone(), Arc::new(ProcessRunner::new()), &config);
    let json = cli.json;

    match cli.command {
        Commands::Up(args) => {
            let opts = commands::up_options(&config, args.no_director, args.ops_file.as_deref())?;
            commands::up::run(&engine, &store, &config, &opts, json)
        }
        Commands::Plan(args) => {
            let opts = commands::up_options(&config, args.no_director, args.ops_file.as_deref())?;
            commands::plan::run(&engine, &store, &config, &opts, json)
        }
        Commands::CreateLbs {
            lb_type,
            cert,
            key,
            chain,
            domain,
        } => commands::create_lbs::run(
            &engine,
            &store,
            &CreateLbsOptions {
                lb_type,
                cert_path: cert,
                key_path: key,
                chain_path: chain,
                domain,
            },
            json,
        ),
        Commands::DeleteLbs => commands::delete_lbs::run(&engine, &store, json),
        Commands::Destroy { no_confirm } => commands::destroy::run(&engine, &store, no_confirm, json),
        Commands::EnvId => commands::env_id::run(&store, json),
        Commands::Lbs => commands::lbs::run(&engine, &store, json),
        Commands::Version => commands::version::run(&engine, json),
    }
}
