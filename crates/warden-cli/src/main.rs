mod bridge_client;
mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "warden",
    about = "Local automation agent: memory-aware model scheduling with human approval of actions",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from warden.yaml or .git/)
    #[arg(long, global = true, env = "WARDEN_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Bridge URL for approver commands (default: from warden.yaml)
    #[arg(long, global = true, env = "WARDEN_BRIDGE_URL")]
    bridge: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default warden.yaml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Show the configured model tiers and their fallback chains
    Tiers,

    /// Show free RAM and which tiers currently fit
    Ram,

    /// Generate text once through the scheduler
    Generate {
        /// Tier to start from
        #[arg(long, default_value = "router")]
        tier: String,

        /// Minimum acceptable output length in characters
        #[arg(long, default_value_t = 0)]
        min_length: usize,

        /// System preamble
        #[arg(long)]
        system: Option<String>,

        prompt: String,
    },

    /// Run the permission bridge
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,
    },

    /// Execute a task plan (file path or name under plans/)
    Run {
        plan: String,

        /// Do not start the in-process bridge
        #[arg(long)]
        no_bridge: bool,
    },

    /// List pending permission requests on the bridge
    Pending,

    /// Record a decision: allow | allow_all | skip | stop | edit
    Decide {
        id: String,
        decision: String,

        /// Edit payload as JSON, e.g. '{"kind":"click","x":10,"y":20}'
        #[arg(long)]
        payload: Option<String>,
    },

    /// Auto-approve every action for N minutes (0 revokes)
    AllowAll {
        #[arg(long)]
        minutes: u64,
    },

    /// Show the override window
    AllowAllStatus,

    /// Auto-skip an action type (or stop skipping it with --off)
    Skip {
        action_type: String,

        #[arg(long)]
        off: bool,
    },

    /// Submit an action to the bridge and wait for its decision
    Request {
        #[arg(long)]
        action_type: String,

        #[arg(long, default_value = "")]
        description: String,

        #[arg(long, default_value_t = 1.0)]
        confidence: f64,

        #[arg(long)]
        x: Option<i32>,

        #[arg(long)]
        y: Option<i32>,

        /// Seconds to wait before resolving to stop (default: gate.timeout_secs)
        #[arg(long)]
        timeout: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } | Commands::Run { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let bridge = cli.bridge.as_deref();
    let json = cli.json;

    let result = match cli.command {
        Commands::Init { force } => cmd::init::run(&root, force, json),
        Commands::Tiers => cmd::tiers::run(&root, json),
        Commands::Ram => cmd::ram::run(&root, json),
        Commands::Generate {
            tier,
            min_length,
            system,
            prompt,
        } => cmd::generate::run(&root, &tier, &prompt, min_length, system, json),
        Commands::Serve { host, port } => cmd::serve::run(&root, host, port),
        Commands::Run { plan, no_bridge } => cmd::run::run(&root, &plan, no_bridge, json),
        Commands::Pending => cmd::approve::pending(&root, bridge, json),
        Commands::Decide {
            id,
            decision,
            payload,
        } => cmd::approve::decide(&root, bridge, &id, &decision, payload.as_deref(), json),
        Commands::AllowAll { minutes } => cmd::approve::allow_all(&root, bridge, minutes, json),
        Commands::AllowAllStatus => cmd::approve::allow_all_status(&root, bridge, json),
        Commands::Skip { action_type, off } => {
            cmd::approve::skip(&root, bridge, &action_type, off, json)
        }
        Commands::Request {
            action_type,
            description,
            confidence,
            x,
            y,
            timeout,
        } => cmd::request::run(
            &root,
            bridge,
            cmd::request::RequestArgs {
                action_type,
                description,
                confidence,
                x,
                y,
                timeout_secs: timeout,
            },
            json,
        ),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
