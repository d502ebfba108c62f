//! docseal - Command Line Interface
//! Author: kartik4091
//! Created: 2026-03-08
//!
//! Seal PDFs with a signed verification QR code and check submitted copies
//! against the stored records.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use clap::{value_parser, Arg, ArgAction, ArgGroup, ArgMatches, Command, ValueEnum};
use docseal::{
    logging::init_logging, Error, JsonFileStore, KeyPair, KeySourceConfig, KeyStore, Result,
    SealConfig, SealPipeline, VerificationOutcome,
};
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Exit code for a completed verification that is not `valid`
const EXIT_NOT_VALID: i32 = 2;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Info, warning, and error messages (default)
    Info,
    /// Debug and all messages
    Debug,
    /// Trace and all messages (most verbose)
    Trace,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let log_level = matches
        .get_one::<LogLevel>("verbose")
        .copied()
        .unwrap_or(LogLevel::Info);
    init_logging(log_level.as_filter());

    let config = match matches.get_one::<PathBuf>("config") {
        Some(path) => match SealConfig::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                error!("❌ Failed to load config file: {}", e);
                process::exit(1);
            }
        },
        None => SealConfig::default(),
    };

    let result = match matches.subcommand() {
        Some(("keygen", sub)) => keygen(&config, sub),
        Some(("key-info", _)) => key_info(&config),
        Some(("rotate", sub)) => rotate(&config, sub),
        Some(("sign", sub)) => sign(&config, sub).await,
        Some(("verify", sub)) => verify(&config, sub).await,
        _ => unreachable!("subcommand is required"),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("❌ {}", e);
            eprintln!("{}", e.user_message());
            process::exit(1);
        }
    }
}

fn build_cli() -> Command {
    Command::new("docseal")
        .version(env!("CARGO_PKG_VERSION"))
        .author("kartik4091")
        .about("Seal PDFs with a signed QR code and verify submitted copies")
        .subcommand_required(true)
        .arg_required_else_help(true)

        // Configuration
        .arg(Arg::new("config")
            .short('c')
            .long("config")
            .value_name("FILE")
            .value_parser(value_parser!(PathBuf))
            .global(true)
            .help("Configuration file (JSON/YAML)"))

        // Logging
        .arg(Arg::new("verbose")
            .short('v')
            .long("verbose")
            .value_parser(value_parser!(LogLevel))
            .default_value("info")
            .global(true)
            .help("Set logging verbosity"))

        .subcommand(Command::new("keygen")
            .about("Generate and store a new RSA key pair")
            .arg(Arg::new("bits")
                .long("bits")
                .value_name("BITS")
                .value_parser(value_parser!(u32))
                .help("Key size in bits (default from config, minimum 2048)"))
            .arg(Arg::new("out-dir")
                .long("out-dir")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .help("Write private.pem and public.pem here instead of the configured paths"))
            .arg(Arg::new("force")
                .long("force")
                .action(ArgAction::SetTrue)
                .help("Overwrite existing key files")))

        .subcommand(Command::new("key-info")
            .about("Show the active key pair"))

        .subcommand(Command::new("rotate")
            .about("Replace the key pair in the files it was loaded from; keys from environment variables are refused")
            .arg(Arg::new("bits")
                .long("bits")
                .value_name("BITS")
                .value_parser(value_parser!(u32))
                .help("Key size of the new pair")))

        .subcommand(Command::new("sign")
            .about("Sign a PDF and embed its verification QR code")
            .arg(Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .required(true)
                .help("Input PDF file path"))
            .arg(Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .required(true)
                .help("Sealed PDF output path"))
            .arg(Arg::new("force")
                .long("force")
                .action(ArgAction::SetTrue)
                .help("Force overwrite existing output files")))

        .subcommand(Command::new("verify")
            .about("Check a PDF against its stored record")
            .arg(Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .value_parser(value_parser!(PathBuf))
                .required(true)
                .help("PDF to check"))
            .arg(Arg::new("id")
                .long("id")
                .value_name("UUID")
                .value_parser(value_parser!(Uuid))
                .help("Document id to check against"))
            .arg(Arg::new("payload")
                .long("payload")
                .value_name("BASE64")
                .help("Scanned QR payload, base64 encoded"))
            .group(ArgGroup::new("source")
                .args(["id", "payload"])
                .multiple(false)))
}

fn load_keys(config: &SealConfig) -> Result<KeyStore> {
    let sources = KeySourceConfig::from_env(&config.keys);
    KeyStore::load_or_generate(&sources, &config.keys)
}

fn keygen(config: &SealConfig, args: &ArgMatches) -> Result<i32> {
    let bits = args.get_one::<u32>("bits").copied().unwrap_or(config.keys.key_size);
    let (private_path, public_path) = match args.get_one::<PathBuf>("out-dir") {
        Some(dir) => (dir.join("private.pem"), dir.join("public.pem")),
        None => (config.keys.private_key_path.clone(), config.keys.public_key_path.clone()),
    };

    if private_path.exists() && !args.get_flag("force") {
        return Err(Error::Config(format!(
            "{} already exists; use --force to replace it",
            private_path.display()
        )));
    }

    info!("🔑 Generating {}-bit RSA key pair...", bits);
    let pair = KeyPair::generate(bits)?;
    pair.validate()?;
    pair.persist(&private_path, &public_path)?;

    print_json(&json!({
        "keyId": pair.key_id(),
        "keySize": pair.key_size(),
        "privateKey": private_path,
        "publicKey": public_path,
    }));
    Ok(0)
}

fn key_info(config: &SealConfig) -> Result<i32> {
    let keys = load_keys(config)?;
    let pair = keys.current();
    print_json(&json!({
        "keyId": pair.key_id(),
        "keySize": pair.key_size(),
        "publicKey": pair.public_pem()?,
    }));
    Ok(0)
}

fn rotate(config: &SealConfig, args: &ArgMatches) -> Result<i32> {
    let bits = args.get_one::<u32>("bits").copied().unwrap_or(config.keys.key_size);
    let keys = load_keys(config)?;

    let previous = keys.rotate_persisted(bits)?;
    let current = keys.current();
    warn!("⚠️  Documents sealed under {} no longer verify with the active key", previous.key_id());

    print_json(&json!({
        "previousKeyId": previous.key_id(),
        "keyId": current.key_id(),
        "keySize": current.key_size(),
    }));
    Ok(0)
}

fn pipeline(config: &SealConfig) -> Result<SealPipeline> {
    let keys = Arc::new(load_keys(config)?);
    let store = Arc::new(JsonFileStore::new(&config.store.path));
    Ok(SealPipeline::new(config.clone(), keys, store))
}

async fn sign(config: &SealConfig, args: &ArgMatches) -> Result<i32> {
    let input = required_path(args, "input")?;
    let output = required_path(args, "output")?;

    if output.exists() && !args.get_flag("force") {
        return Err(Error::Config(format!(
            "output file {} already exists; use --force to overwrite",
            output.display()
        )));
    }

    let pipeline = pipeline(config)?;
    let bytes = tokio::fs::read(input).await?;
    let filename = input.file_name().and_then(|n| n.to_str());

    let signed = pipeline.sign_document(&bytes, filename).await?;
    tokio::fs::write(output, &signed.stamped_pdf).await?;
    info!("✅ Sealed {} → {}", input.display(), output.display());

    print_json(&json!({
        "record": signed.record,
        "payload": signed.payload.to_base64()?,
    }));
    Ok(0)
}

async fn verify(config: &SealConfig, args: &ArgMatches) -> Result<i32> {
    let input = required_path(args, "input")?;
    let pipeline = pipeline(config)?;
    let bytes = tokio::fs::read(input).await?;

    let outcome = if let Some(id) = args.get_one::<Uuid>("id") {
        pipeline.verify_document(*id, &bytes).await?
    } else if let Some(text) = args.get_one::<String>("payload") {
        match BASE64.decode(text.trim()) {
            Ok(encoded) => pipeline.verify_with_payload(&encoded, &bytes).await?,
            Err(e) => {
                warn!("Payload argument is not base64: {}", e);
                VerificationOutcome::unreadable_payload()
            }
        }
    } else {
        pipeline.verify_stamped(&bytes).await?
    };

    print_json(&outcome);
    Ok(if outcome.is_valid() { 0 } else { EXIT_NOT_VALID })
}

fn required_path<'a>(args: &'a ArgMatches, name: &str) -> Result<&'a Path> {
    args.get_one::<PathBuf>(name)
        .map(PathBuf::as_path)
        .ok_or_else(|| Error::Config(format!("missing --{}", name)))
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => error!("❌ Failed to serialize output: {}", e),
    }
}
