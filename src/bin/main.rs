//! S/MIME signer CLI
//!
//! Speaks enough of GnuPG's command line and `--status-fd` protocol for
//! version-control tools to sign and verify with X.509 certificates.

use clap::{ArgGroup, Parser};
use smime_signer::{
    adapters::{
        cert_store::DirectoryStore,
        cms_engine::OpensslCmsEngine,
        output::{ChannelTarget, OutputChannels, INFO_PREFIX},
        timestamp_http_client::TimestampHttpClient,
    },
    domain::{include_policy::CertificateIncludePolicy, types::IdentityToken},
    infra::{
        config::{resolve_store_dir, resolve_timestamp_authority, ConfigManager},
        error::{SignerError, SignerResult},
        input::InputSource,
    },
    pipelines::{ListKeysWorkflow, SignRequest, SignWorkflow, VerifyWorkflow},
    TimestampUrl,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "smime-signer")]
#[command(about = "GnuPG-compatible S/MIME signing for version control")]
#[command(long_about = "
S/MIME signer - X.509/CMS signatures behind a GnuPG command line

EXAMPLES:
    # Point git at the signer
    git config --global gpg.x509.program smime-signer
    git config --global gpg.format x509

    # Detached, armored signature (what git runs)
    smime-signer --status-fd=2 -bsau alice@example.com < commit.txt

    # Verify a detached signature against its content
    smime-signer --status-fd=1 --verify commit.sig -

    # Show the certificates in the store
    smime-signer --list-keys

ENVIRONMENT VARIABLES:
    SMIME_SIGNER_STORE   Certificate store directory
    RUST_LOG             Logging level (debug, info, warn, error)
")]
#[command(version)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["list_keys", "sign", "verify"])
))]
struct Cli {
    /// List the certificates in the store
    #[arg(long)]
    list_keys: bool,

    /// Make a signature
    #[arg(short = 's', long)]
    sign: bool,

    /// Verify a signature
    #[arg(long)]
    verify: bool,

    /// Signing identity: e-mail address or certificate fingerprint
    #[arg(short = 'u', long, value_name = "USER-ID")]
    local_user: Option<String>,

    /// Make a detached signature
    #[arg(short = 'b', long)]
    detached_sign: bool,

    /// Create ASCII armored output
    #[arg(short = 'a', long)]
    armor: bool,

    /// Write status lines to descriptor 1, 2 or a file path
    #[arg(long, value_name = "FD")]
    status_fd: Option<String>,

    /// RFC 3161 timestamp authority; an empty value disables timestamping
    #[arg(short = 't', long, value_name = "URL")]
    timestamp_authority: Option<String>,

    /// Certificates to include: -2 all but root, -1 all, 0 none, 1 signer only, N up to N
    #[arg(long, default_value_t = -2, allow_negative_numbers = true, value_name = "N")]
    include_certs: i32,

    /// Accepted for GnuPG compatibility; has no effect
    #[arg(long, value_name = "FORMAT")]
    keyid_format: Option<String>,

    /// Certificate store directory
    #[arg(long, value_name = "DIR")]
    cert_store: Option<PathBuf>,

    /// Input files; `-` or none reads standard input
    files: Vec<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let target = ChannelTarget::from_descriptor(cli.status_fd.as_deref());
    let mut channels = match OutputChannels::open(&target) {
        Ok(channels) => channels,
        Err(e) => {
            eprintln!("{INFO_PREFIX}error: {}", e.single_line());
            return ExitCode::FAILURE;
        }
    };

    match run(&cli, &mut channels).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::debug!("{e:?}");
            let message = format!("error: {}", e.single_line());
            if channels.emit_info(&message).is_err() {
                eprintln!("{INFO_PREFIX}{message}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, channels: &mut OutputChannels) -> SignerResult<()> {
    if let Some(format) = &cli.keyid_format {
        log::debug!("ignoring --keyid-format {format}");
    }
    let engine = OpensslCmsEngine::new();

    if cli.list_keys {
        let store = DirectoryStore::new(resolve_store_dir(cli.cert_store.as_deref())?);
        let stdout = std::io::stdout();
        return ListKeysWorkflow::new(&store).run(&mut stdout.lock());
    }

    if cli.verify {
        let files: Vec<InputSource> = cli
            .files
            .iter()
            .map(|f| InputSource::from_arg(Some(f)))
            .collect();
        return VerifyWorkflow::new(&engine).run(channels, &files);
    }

    let identity = IdentityToken::parse(cli.local_user.as_deref().unwrap_or_default())?;
    let include = CertificateIncludePolicy::try_from(cli.include_certs)?;
    let content = match cli.files.as_slice() {
        [] => InputSource::Stdin.read_all()?,
        [file] => InputSource::from_arg(Some(file)).read_all()?,
        more => {
            return Err(SignerError::InvalidArgument(format!(
                "sign takes at most 1 file, got {}",
                more.len()
            )))
        }
    };
    let request = SignRequest {
        identity,
        content,
        timestamp_authority: timestamp_authority(cli.timestamp_authority.as_deref())?,
        detached: cli.detached_sign,
        armor: cli.armor,
        include,
    };

    let store = DirectoryStore::new(resolve_store_dir(cli.cert_store.as_deref())?);
    let workflow = SignWorkflow::new(&store, &engine, TimestampHttpClient::new()?);
    let signature = workflow.run(channels, request).await?;

    let mut stdout = std::io::stdout().lock();
    stdout
        .write_all(&signature)
        .and_then(|()| stdout.flush())
        .map_err(|e| SignerError::OutputError(e.to_string()))
}

fn timestamp_authority(cli_value: Option<&str>) -> SignerResult<Option<TimestampUrl>> {
    match ConfigManager::new() {
        Ok(config) => resolve_timestamp_authority(cli_value, &config),
        Err(e) => {
            log::warn!("configuration file unavailable: {e}");
            resolve_timestamp_authority(cli_value, &ConfigManager::with_path(PathBuf::new()))
        }
    }
}
