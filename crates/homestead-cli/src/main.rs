//! Homestead CLI - build, sign, store and export packages

use clap::{Args, Parser, Subcommand};
use homestead_core::{ChannelIdent, PackageIdent, PackageTarget};
use homestead_export::ExportFormat;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod error;
mod exit_codes;
mod session;
mod ui;
mod util;

use error::Result;
use session::Session;

#[derive(Parser)]
#[command(name = "homestead")]
#[command(author = "Homestead Contributors")]
#[command(version)]
#[command(about = "Build, sign, store and export packages", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Artifact store directory
    #[arg(long, global = true, env = "HOMESTEAD_STORE")]
    pub store: Option<PathBuf>,

    /// Directory holding origin keys
    #[arg(long, global = true, env = "HOMESTEAD_CACHE_KEY_PATH")]
    pub cache_key_path: Option<PathBuf>,

    /// Configuration file (default: ~/.config/homestead/config.yaml)
    #[arg(long, global = true, env = "HOMESTEAD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Never prompt; fail instead
    #[arg(
        long,
        global = true,
        env = "HOMESTEAD_NONINTERACTIVE",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub non_interactive: bool,

    /// Enable debug output
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Auth token for an origin
#[derive(Args)]
struct AuthArg {
    /// Origin auth token
    #[arg(short = 'z', long = "auth", env = "HOMESTEAD_AUTH_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

#[derive(Args)]
struct OriginArg {
    /// Origin name (default: HOMESTEAD_ORIGIN or config default_origin)
    #[arg(short, long, env = "HOMESTEAD_ORIGIN")]
    origin: Option<String>,
}

#[derive(Args)]
struct TargetArg {
    /// Package target (default: the host target)
    #[arg(long)]
    target: Option<PackageTarget>,
}

impl TargetArg {
    fn resolve(&self) -> PackageTarget {
        self.target.unwrap_or_else(PackageTarget::active)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Manage origins, their keys and secrets
    #[command(subcommand)]
    Origin(OriginCommands),

    /// Build, upload, inspect and export packages
    #[command(subcommand)]
    Pkg(PkgCommands),
}

#[derive(Subcommand)]
enum OriginCommands {
    /// Register an origin in the store and print its auth token
    Create {
        /// Origin name
        origin: String,
    },

    /// Manage origin key pairs
    #[command(subcommand)]
    Key(KeyCommands),

    /// Manage origin secrets
    #[command(subcommand)]
    Secret(SecretCommands),
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Generate signing and encryption keys for an origin
    Generate {
        /// Origin name
        origin: String,

        /// Do not password-protect the signing key
        #[arg(long)]
        no_password: bool,

        /// Overwrite existing keys
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum SecretCommands {
    /// Encrypt and store a secret for build jobs
    Upload {
        /// Secret name, exposed to builds as an environment variable
        key: String,

        /// Secret value
        value: String,

        #[command(flatten)]
        origin: OriginArg,

        #[command(flatten)]
        auth: AuthArg,
    },

    /// List secret names
    List {
        #[command(flatten)]
        origin: OriginArg,

        #[command(flatten)]
        auth: AuthArg,
    },

    /// Delete a secret
    Delete {
        /// Secret name
        key: String,

        #[command(flatten)]
        origin: OriginArg,

        #[command(flatten)]
        auth: AuthArg,
    },
}

#[derive(Subcommand)]
enum PkgCommands {
    /// Run a plan and produce a signed artifact
    Build {
        /// Directory containing plan.yaml
        #[arg(default_value = ".")]
        plan_dir: PathBuf,

        #[command(flatten)]
        auth: AuthArg,

        /// Resolve dependencies from this channel only
        #[arg(short, long)]
        channel: Option<ChannelIdent>,

        /// Output directory (default: <PLAN_DIR>/results)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        target: TargetArg,
    },

    /// Verify and import an artifact into the store
    Upload {
        /// Artifact file
        artifact: PathBuf,

        #[command(flatten)]
        auth: AuthArg,
    },

    /// Check an artifact's signature and file checksums
    Verify {
        /// Artifact file
        artifact: PathBuf,
    },

    /// Show an artifact's manifest
    Info {
        /// Artifact file
        artifact: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve a partial identifier to the latest release
    Resolve {
        /// Package identifier (origin/name[/version[/release]])
        ident: PackageIdent,

        /// Only consider packages in this channel
        #[arg(short, long)]
        channel: Option<ChannelIdent>,

        #[command(flatten)]
        target: TargetArg,
    },

    /// Search packages by origin or name
    Search {
        /// Search term
        query: String,
    },

    /// List the channels a package is in
    Channels {
        /// Fully qualified package identifier
        ident: PackageIdent,

        #[command(flatten)]
        target: TargetArg,
    },

    /// Add a package to a channel
    Promote {
        /// Fully qualified package identifier
        ident: PackageIdent,

        /// Channel name
        channel: ChannelIdent,

        #[command(flatten)]
        auth: AuthArg,

        #[command(flatten)]
        target: TargetArg,
    },

    /// Remove a package from a channel
    Demote {
        /// Fully qualified package identifier
        ident: PackageIdent,

        /// Channel name
        channel: ChannelIdent,

        #[command(flatten)]
        auth: AuthArg,

        #[command(flatten)]
        target: TargetArg,
    },

    /// Export a package with its runtime closure
    Export {
        /// Package identifier (partial identifiers resolve to the latest)
        ident: PackageIdent,

        /// Formats to produce (tar, oci, kubernetes)
        #[arg(short, long = "format", required = true, num_args = 1..)]
        formats: Vec<ExportFormat>,

        /// Output directory
        #[arg(short = 'o', long, default_value = ".")]
        output: PathBuf,

        /// Resolve from this channel only
        #[arg(short, long)]
        channel: Option<ChannelIdent>,

        #[command(flatten)]
        target: TargetArg,
    },
}

fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() {
    miette::set_panic_hook();

    let cli = Cli::parse();
    init_tracing(cli.global.debug);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start async runtime: {}", e);
            std::process::exit(exit_codes::ERROR);
        }
    };

    if let Err(err) = runtime.block_on(run(cli)) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let session = Session::new(&cli.global)?;

    match cli.command {
        Commands::Origin(command) => match command {
            OriginCommands::Create { origin } => commands::origin::create(&session, &origin),
            OriginCommands::Key(KeyCommands::Generate {
                origin,
                no_password,
                force,
            }) => commands::origin::generate_keys(&session, &origin, no_password, force),
            OriginCommands::Secret(command) => match command {
                SecretCommands::Upload {
                    key,
                    value,
                    origin,
                    auth,
                } => {
                    let origin = session.origin(origin.origin)?;
                    commands::secret::upload(&session, &origin, auth.token, &key, &value).await
                }
                SecretCommands::List { origin, auth } => {
                    let origin = session.origin(origin.origin)?;
                    commands::secret::list(&session, &origin, auth.token).await
                }
                SecretCommands::Delete { key, origin, auth } => {
                    let origin = session.origin(origin.origin)?;
                    commands::secret::delete(&session, &origin, auth.token, &key).await
                }
            },
        },

        Commands::Pkg(command) => match command {
            PkgCommands::Build {
                plan_dir,
                auth,
                channel,
                output,
                target,
            } => {
                let channel = session.channel(channel);
                commands::build::run(
                    &session,
                    &plan_dir,
                    auth.token,
                    channel,
                    output,
                    target.resolve(),
                )
                .await
            }
            PkgCommands::Upload { artifact, auth } => {
                commands::upload::run(&session, &artifact, auth.token)
            }
            PkgCommands::Verify { artifact } => commands::verify::run(&session, &artifact),
            PkgCommands::Info { artifact, json } => commands::info::run(&artifact, json),
            PkgCommands::Resolve {
                ident,
                channel,
                target,
            } => {
                let channel = session.channel(channel);
                commands::resolve::run(&session, &ident, channel.as_ref(), target.resolve())
            }
            PkgCommands::Search { query } => commands::search::run(&session, &query),
            PkgCommands::Channels { ident, target } => {
                commands::channel::list(&session, &ident, target.resolve())
            }
            PkgCommands::Promote {
                ident,
                channel,
                auth,
                target,
            } => commands::channel::promote(&session, &ident, &channel, auth.token, target.resolve()),
            PkgCommands::Demote {
                ident,
                channel,
                auth,
                target,
            } => commands::channel::demote(&session, &ident, &channel, auth.token, target.resolve()),
            PkgCommands::Export {
                ident,
                formats,
                output,
                channel,
                target,
            } => {
                let channel = session.channel(channel);
                commands::export::run(
                    &session,
                    &ident,
                    &formats,
                    &output,
                    channel.as_ref(),
                    target.resolve(),
                )
            }
        },
    }
}
