//! icv: verify certified canister responses

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use icv_cli::input::{parse_label, parse_path, read_blob};
use icv_cli::{inspect_certificate, lookup, verify, witness_root_hash, CliConfig, ResponseCheck, VerifyRequest};
use icv_core::CertifiedResponse;
use icv_types::Principal;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "icv")]
#[command(about = "Verify certified canister responses", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify a certificate and witness for a canister
    Verify {
        /// Certificate file (CBOR or hex)
        #[arg(long, required_unless_present = "response", conflicts_with = "response")]
        certificate: Option<PathBuf>,

        /// Witness file (CBOR or hex)
        #[arg(long, required_unless_present = "response", conflicts_with = "response")]
        witness: Option<PathBuf>,

        /// Certified response as JSON: {"response", "certificate", "witness"}
        #[arg(long)]
        response: Option<PathBuf>,

        /// Canister id in text form
        #[arg(long)]
        canister_id: Option<Principal>,

        /// Root public key in hex
        #[arg(long)]
        root_key: Option<String>,

        /// Maximum allowed certificate time offset in milliseconds
        #[arg(long)]
        max_offset_ms: Option<u64>,

        /// Verify as of this time (milliseconds since the UNIX epoch)
        #[arg(long)]
        now_ms: Option<u64>,

        /// Witness key the payload is certified under
        #[arg(long)]
        key: Option<String>,

        /// Expected payload (defaults to the `response` field with --response)
        #[arg(long, requires = "key")]
        expect_payload: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Look up a path in a witness
    Lookup {
        /// Witness file (CBOR or hex)
        witness: PathBuf,

        /// Path such as `canister/principal:aaaaa-aa/certified_data`
        path: String,
    },

    /// Print the root hash of a witness
    RootHash {
        /// Witness file (CBOR or hex)
        witness: PathBuf,
    },

    /// Show the contents of a certificate without verifying it
    Inspect {
        /// Certificate file (CBOR or hex)
        certificate: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default configuration file
    InitConfig {
        /// Output file
        #[arg(default_value = "icv.toml")]
        output: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Verify {
            certificate,
            witness,
            response,
            canister_id,
            root_key,
            max_offset_ms,
            now_ms,
            key,
            expect_payload,
            json,
        } => {
            let config = CliConfig::load(cli.config.as_deref())?;

            let (certificate, witness, response_payload) = match response {
                Some(path) => {
                    let contents = std::fs::read_to_string(&path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    let response: CertifiedResponse<String> = serde_json::from_str(&contents)?;
                    (response.certificate, response.witness, Some(response.response))
                }
                None => {
                    let certificate = certificate.context("--certificate is required")?;
                    let witness = witness.context("--witness is required")?;
                    (read_blob(&certificate)?, read_blob(&witness)?, None)
                }
            };

            let response = match key {
                Some(key) => {
                    let payload = expect_payload
                        .or(response_payload)
                        .context("--key needs --expect-payload or --response")?;
                    Some(ResponseCheck {
                        key: parse_label(&key)?,
                        payload: payload.into_bytes(),
                    })
                }
                None => None,
            };

            let root_key = root_key
                .map(|key| hex::decode(key.trim()))
                .transpose()
                .context("--root-key is not valid hex")?;

            let request = VerifyRequest {
                certificate,
                witness,
                canister_id,
                root_key,
                max_certificate_time_offset_ms: max_offset_ms,
                now_ms,
                response,
            };

            let report = verify(&request, &config)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report);
            }
        }

        Commands::Lookup { witness, path } => {
            let witness = read_blob(&witness)?;
            let path = parse_path(&path)?;
            println!("{}", lookup(&witness, &path)?);
        }

        Commands::RootHash { witness } => {
            let witness = read_blob(&witness)?;
            println!("{}", witness_root_hash(&witness)?);
        }

        Commands::Inspect { certificate, json } => {
            let summary = inspect_certificate(&read_blob(&certificate)?)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary);
            }
        }

        Commands::InitConfig { output } => {
            if output.exists() {
                anyhow::bail!("{} already exists", output.display());
            }
            CliConfig::default().to_file(&output)?;
            println!("Default configuration saved to {}", output.display());
        }
    }

    Ok(())
}
