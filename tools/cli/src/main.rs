//! PQBridge CLI - Command line interface over the cryptographic bridge.
//!
//! This tool generates keys, encrypts, seals, signs and hashes files, and
//! can record every operation to a signed JSON-lines audit trail.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use pqbridge_app::{AuditedCrypto, SecurityServices};
use pqbridge_audit::{AuditResult, JsonLinesSink, LogContext, LogSink, LoggerConfig};
use pqbridge_crypto::{
    sha256_hex, EncryptedEnvelope, Pbkdf2Params, RsaParams, SealedMessage, Signature, SymmetricKey,
};

#[derive(Parser)]
#[command(name = "pqbridge")]
#[command(about = "PQBridge - Forward-compatible encryption, signing and audit")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Append a signed audit trail of each command to this JSON-lines file.
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,

    /// Audit logger configuration (JSON).
    #[arg(long, global = true)]
    audit_config: Option<PathBuf>,

    /// RSA modulus size for generated keys.
    #[arg(long, global = true, default_value_t = 2048)]
    rsa_bits: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Purpose {
    Encryption,
    Signing,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum Strength {
    /// Interactive logins.
    #[default]
    Interactive,
    /// Long-lived keys protecting stored data.
    Sensitive,
}

impl Strength {
    fn params(self, iterations: Option<u32>) -> Result<Pbkdf2Params> {
        match iterations {
            Some(n) => Ok(Pbkdf2Params::checked(n)?),
            None => Ok(match self {
                Strength::Interactive => Pbkdf2Params::interactive(),
                Strength::Sensitive => Pbkdf2Params::sensitive(),
            }),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an asymmetric key pair.
    Keygen {
        /// What the key pair is for.
        #[arg(short, long, value_enum)]
        purpose: Purpose,

        /// Output prefix; writes <prefix>.pub.der and <prefix>.key.der.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Generate a random 32-byte symmetric key.
    GenKey {
        /// Output key file.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Encrypt a file with a symmetric key.
    Encrypt {
        /// 32-byte key file.
        #[arg(short, long)]
        key_file: PathBuf,

        /// Plaintext file.
        #[arg(short, long = "in")]
        input: PathBuf,

        /// Envelope output (JSON).
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Decrypt an envelope produced by `encrypt`.
    Decrypt {
        /// 32-byte key file.
        #[arg(short, long)]
        key_file: PathBuf,

        /// Envelope file (JSON).
        #[arg(short, long = "in")]
        input: PathBuf,

        /// Plaintext output.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Encrypt a file of any size to a public key.
    Seal {
        /// Recipient public key (SPKI DER).
        #[arg(short, long)]
        public_key: PathBuf,

        /// Plaintext file.
        #[arg(short, long = "in")]
        input: PathBuf,

        /// Sealed message output (JSON).
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Open a message produced by `seal`.
    Open {
        /// Private key (PKCS#8 DER).
        #[arg(short = 'k', long)]
        private_key: PathBuf,

        /// Sealed message file (JSON).
        #[arg(short, long = "in")]
        input: PathBuf,

        /// Plaintext output.
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Sign a file and print the base64 signature.
    Sign {
        /// Private key (PKCS#8 DER).
        #[arg(short = 'k', long)]
        private_key: PathBuf,

        /// File to sign.
        #[arg(short, long = "in")]
        input: PathBuf,
    },

    /// Verify a base64 signature over a file.
    Verify {
        /// Public key (SPKI DER).
        #[arg(short, long)]
        public_key: PathBuf,

        /// Signed file.
        #[arg(short, long = "in")]
        input: PathBuf,

        /// Base64 signature.
        #[arg(short, long)]
        signature: String,
    },

    /// Print the hex SHA-256 of a file.
    Hash {
        /// File to hash.
        #[arg(short, long = "in")]
        input: PathBuf,
    },

    /// Derive a key from a password with PBKDF2.
    DeriveKey {
        /// Salt as hex.
        #[arg(short, long)]
        salt_hex: String,

        /// PBKDF2 preset.
        #[arg(long, value_enum, default_value_t = Strength::Interactive)]
        strength: Strength,

        /// Explicit PBKDF2 iteration count, overriding the preset.
        #[arg(short = 'n', long)]
        iterations: Option<u32>,

        /// Write the raw key here instead of printing it as hex.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Show the algorithm suite.
    Info,
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Keygen { .. } => "keygen",
            Commands::GenKey { .. } => "gen-key",
            Commands::Encrypt { .. } => "encrypt",
            Commands::Decrypt { .. } => "decrypt",
            Commands::Seal { .. } => "seal",
            Commands::Open { .. } => "open",
            Commands::Sign { .. } => "sign",
            Commands::Verify { .. } => "verify",
            Commands::Hash { .. } => "hash",
            Commands::DeriveKey { .. } => "derive-key",
            Commands::Info => "info",
        }
    }
}

/// Services for one CLI run.
struct Session {
    services: SecurityServices,
    /// Present only when an audit trail was requested.
    audited: Option<AuditedCrypto>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match &cli.audit_config {
        Some(path) => LoggerConfig::from_json_file(path)
            .with_context(|| format!("Failed to load audit config {}", path.display()))?,
        None => LoggerConfig {
            mirror_to_tracing: cli.verbose,
            ..LoggerConfig::default()
        },
    };

    let sink = cli
        .audit_log
        .as_ref()
        .map(|path| Arc::new(JsonLinesSink::new(path)) as Arc<dyn LogSink>);

    let (services, maintenance) = SecurityServices::start(
        RsaParams {
            modulus_bits: cli.rsa_bits,
        },
        config,
        sink,
    )
    .context("Failed to start security services")?;

    let session = Session {
        audited: cli.audit_log.as_ref().map(|_| services.audited()),
        services,
    };

    let name = cli.command.name();
    let outcome = run(&session, cli.command).await;

    let (result, error) = match &outcome {
        Ok(true) => (AuditResult::Success, None),
        Ok(false) => (AuditResult::Blocked, None),
        Err(e) => (AuditResult::Failure, Some(format!("{:#}", e))),
    };
    session.services.audit.log_security_event(
        &format!("cli {}", name),
        result,
        &LogContext::new("cli", name),
        error.map(|e| serde_json::json!({ "error": e })),
    );

    maintenance
        .shutdown()
        .await
        .context("Failed to flush audit trail")?;

    match outcome? {
        true => Ok(ExitCode::SUCCESS),
        false => Ok(ExitCode::FAILURE),
    }
}

/// Run one command. `Ok(false)` means it completed but rejected its input.
async fn run(session: &Session, command: Commands) -> Result<bool> {
    match command {
        Commands::Keygen { purpose, out } => cmd_keygen(session, purpose, &out).await,
        Commands::GenKey { out } => cmd_gen_key(session, &out).await,
        Commands::Encrypt {
            key_file,
            input,
            out,
        } => cmd_encrypt(session, &key_file, &input, &out).await,
        Commands::Decrypt {
            key_file,
            input,
            out,
        } => cmd_decrypt(session, &key_file, &input, &out).await,
        Commands::Seal {
            public_key,
            input,
            out,
        } => cmd_seal(session, &public_key, &input, &out).await,
        Commands::Open {
            private_key,
            input,
            out,
        } => cmd_open(session, &private_key, &input, &out).await,
        Commands::Sign { private_key, input } => cmd_sign(session, &private_key, &input).await,
        Commands::Verify {
            public_key,
            input,
            signature,
        } => cmd_verify(session, &public_key, &input, &signature).await,
        Commands::Hash { input } => cmd_hash(&input).await,
        Commands::DeriveKey {
            salt_hex,
            strength,
            iterations,
            out,
        } => cmd_derive_key(session, &salt_hex, strength.params(iterations)?, out.as_deref()).await,
        Commands::Info => cmd_info(session),
    }
}

/// Prompt for password securely.
fn prompt_password(prompt: &str) -> Result<Vec<u8>> {
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok(password.into_bytes())
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

async fn read_key(path: &Path) -> Result<SymmetricKey> {
    let bytes = zeroize::Zeroizing::new(read_file(path).await?);
    SymmetricKey::from_slice(&bytes).context("Key file must hold exactly 32 bytes")
}

fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Generate an asymmetric key pair.
async fn cmd_keygen(session: &Session, purpose: Purpose, out: &Path) -> Result<bool> {
    let crypto = &session.services.crypto;
    info!("Generating key pair");

    let (public_key, private_key) = match purpose {
        Purpose::Encryption => {
            let pair = crypto
                .generate_encryption_key_pair()
                .await
                .context("Failed to generate key pair")?;
            (pair.public_key().to_vec(), zeroize::Zeroizing::new(pair.private_key().to_vec()))
        }
        Purpose::Signing => {
            let pair = crypto
                .generate_signing_key_pair()
                .await
                .context("Failed to generate key pair")?;
            (pair.public_key().to_vec(), zeroize::Zeroizing::new(pair.private_key().to_vec()))
        }
    };

    let public_path = with_suffix(out, ".pub.der");
    let private_path = with_suffix(out, ".key.der");
    write_file(&public_path, &public_key).await?;
    write_file(&private_path, &private_key).await?;

    println!("Key pair generated!");
    println!("  Public key: {}", public_path.display());
    println!("  Private key: {}", private_path.display());

    Ok(true)
}

/// Generate a random symmetric key.
async fn cmd_gen_key(session: &Session, out: &Path) -> Result<bool> {
    let key = session.services.crypto.generate_symmetric_key();
    write_file(out, key.as_bytes()).await?;

    println!("Symmetric key written to {}", out.display());
    Ok(true)
}

/// Encrypt a file into a JSON envelope.
async fn cmd_encrypt(session: &Session, key_file: &Path, input: &Path, out: &Path) -> Result<bool> {
    let key = read_key(key_file).await?;
    let plaintext = zeroize::Zeroizing::new(read_file(input).await?);

    let envelope = match &session.audited {
        Some(audited) => audited.encrypt_message(&plaintext, &key).await,
        None => session.services.crypto.encrypt_symmetric(&plaintext, &key).await,
    }
    .context("Encryption failed")?;

    write_file(out, envelope.to_json()?.as_bytes()).await?;
    println!("Encrypted {} bytes to {}", plaintext.len(), out.display());
    Ok(true)
}

/// Decrypt a JSON envelope.
async fn cmd_decrypt(session: &Session, key_file: &Path, input: &Path, out: &Path) -> Result<bool> {
    let key = read_key(key_file).await?;
    let json = read_file(input).await?;
    let envelope = EncryptedEnvelope::from_json(&String::from_utf8_lossy(&json))
        .context("Invalid envelope")?;

    let plaintext = match &session.audited {
        Some(audited) => audited.decrypt_message(&envelope, &key).await,
        None => {
            session
                .services
                .crypto
                .decrypt_symmetric(&envelope.ciphertext, &key, &envelope.iv, &envelope.tag)
                .await
        }
    }
    .context("Decryption failed")?;
    let plaintext = zeroize::Zeroizing::new(plaintext);

    write_file(out, &plaintext).await?;
    println!("Decrypted {} bytes to {}", plaintext.len(), out.display());
    Ok(true)
}

/// Seal a file to a public key.
async fn cmd_seal(session: &Session, public_key: &Path, input: &Path, out: &Path) -> Result<bool> {
    let public_key = read_file(public_key).await?;
    let plaintext = zeroize::Zeroizing::new(read_file(input).await?);

    let sealed = session
        .services
        .crypto
        .seal(&plaintext, &public_key)
        .await
        .context("Sealing failed")?;

    let json = serde_json::to_string_pretty(&sealed)?;
    write_file(out, json.as_bytes()).await?;
    println!("Sealed {} bytes to {}", plaintext.len(), out.display());
    Ok(true)
}

/// Open a sealed message.
async fn cmd_open(session: &Session, private_key: &Path, input: &Path, out: &Path) -> Result<bool> {
    let private_key = zeroize::Zeroizing::new(read_file(private_key).await?);
    let json = read_file(input).await?;
    let sealed: SealedMessage = serde_json::from_slice(&json).context("Invalid sealed message")?;

    let plaintext = session
        .services
        .crypto
        .open(&sealed, &private_key)
        .await
        .context("Opening failed")?;
    let plaintext = zeroize::Zeroizing::new(plaintext);

    write_file(out, &plaintext).await?;
    println!("Opened {} bytes to {}", plaintext.len(), out.display());
    Ok(true)
}

/// Sign a file.
async fn cmd_sign(session: &Session, private_key: &Path, input: &Path) -> Result<bool> {
    let private_key = zeroize::Zeroizing::new(read_file(private_key).await?);
    let data = read_file(input).await?;

    let signature = match &session.audited {
        Some(audited) => {
            let pair = session
                .services
                .crypto
                .import_signing_key_pair(&private_key)
                .context("Invalid private key")?;
            audited.sign_message(&data, &pair).await
        }
        None => session.services.crypto.sign(&data, &private_key).await,
    }
    .context("Signing failed")?;

    println!("{}", signature.to_base64());
    Ok(true)
}

/// Verify a signature. Prints `valid` or `invalid`.
async fn cmd_verify(session: &Session, public_key: &Path, input: &Path, signature: &str) -> Result<bool> {
    let public_key = read_file(public_key).await?;
    let data = read_file(input).await?;
    // Undecodable signatures are just invalid.
    let signature = Signature::from_base64(signature.trim())
        .map(|s| s.as_bytes().to_vec())
        .unwrap_or_default();

    let valid = match &session.audited {
        Some(audited) => audited.verify_message(&signature, &data, &public_key).await,
        None => session.services.crypto.verify(&signature, &data, &public_key).await,
    };

    println!("{}", if valid { "valid" } else { "invalid" });
    Ok(valid)
}

/// Hash a file.
async fn cmd_hash(input: &Path) -> Result<bool> {
    let data = read_file(input).await?;
    println!("{}", sha256_hex(&data));
    Ok(true)
}

/// Derive a key from a prompted password.
async fn cmd_derive_key(session: &Session, salt_hex: &str, params: Pbkdf2Params, out: Option<&Path>) -> Result<bool> {
    let salt = hex::decode(salt_hex.trim()).context("Salt must be hex")?;

    let password = zeroize::Zeroizing::new(prompt_password("Enter password: ")?);
    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }

    info!("Deriving key with {} iterations", params.iterations);
    let key = session
        .services
        .crypto
        .derive_key_from_password_with(&password, &salt, params)
        .await
        .context("Key derivation failed")?;

    match out {
        Some(path) => {
            write_file(path, key.as_bytes()).await?;
            println!("Derived key written to {}", path.display());
        }
        None => println!("{}", hex::encode(key.as_bytes())),
    }
    Ok(true)
}

/// Show the algorithm suite.
fn cmd_info(session: &Session) -> Result<bool> {
    let crypto = &session.services.crypto;
    let suite = crypto.info();
    let caps = crypto.capabilities();

    println!("PQBridge {}", crypto.version());
    println!("  Key encapsulation: {}", suite.key_encapsulation);
    println!("  Signature: {}", suite.signature);
    println!("  AEAD: {}", suite.aead);
    println!("  KDF: {}", suite.kdf);
    println!("  Hash: {}", suite.hash);
    println!("  Interim (classical stand-ins): {}", suite.interim);
    println!("  Key agreement: {:?}", crypto.key_agreement_mode());
    println!(
        "  Capabilities: encryption={} signatures={} key_agreement={}",
        caps.asymmetric_encryption, caps.signatures, caps.key_agreement
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_presets() {
        assert_eq!(
            Strength::Interactive.params(None).unwrap(),
            Pbkdf2Params::interactive()
        );
        assert_eq!(Strength::Sensitive.params(None).unwrap(), Pbkdf2Params::sensitive());
        assert_eq!(Strength::Sensitive.params(Some(20_000)).unwrap().iterations, 20_000);
        assert!(Strength::Interactive.params(Some(10)).is_err());
    }

    #[test]
    fn test_derive_key_args() {
        let cli = Cli::try_parse_from(["pqbridge", "derive-key", "--salt-hex", "00ff", "--strength", "sensitive"])
            .unwrap();
        match cli.command {
            Commands::DeriveKey {
                strength, iterations, ..
            } => {
                assert!(matches!(strength, Strength::Sensitive));
                assert!(iterations.is_none());
            }
            _ => panic!("expected derive-key"),
        }
    }
}
