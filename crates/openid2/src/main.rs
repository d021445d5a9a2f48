#![forbid(unsafe_code)]

//! openid2 CLI: diagnostics for the provider engine (realm matching,
//! Key-Value encoding, associate exchanges).

use clap::{Parser, Subcommand};
use openid2_assoc::{MemoryStore, Store};
use openid2_core::{ns, AssocType, Error, SessionType};
use openid2_crypto::encoding::base64_decode;
use openid2_crypto::{DhParams, OsRandom, PrivateKey, PublicKey};
use openid2_message::Message;
use openid2_provider::{Provider, ProviderConfig, Realm};
use std::io::Write;
use std::process;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "openid2",
    about = "OpenID 2.0 provider protocol tools",
    version
)]
struct Cli {
    /// Log protocol decisions to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a realm covers a return URL
    Realm {
        /// Realm, e.g. http://*.example.com/
        realm: String,

        /// Candidate return_to URL
        return_to: String,
    },

    /// Print the Key-Value Form of an OpenID query string
    Kv {
        /// URL-encoded parameters (openid.ns=...&openid.mode=...)
        query: String,
    },

    /// Run an associate exchange against an in-memory provider
    Associate {
        /// Session type (no-encryption, DH-SHA1, DH-SHA256)
        #[arg(long = "session-type", default_value = "DH-SHA256")]
        session_type: String,

        /// Association type (HMAC-SHA1, HMAC-SHA256)
        #[arg(long = "assoc-type", default_value = "HMAC-SHA256")]
        assoc_type: String,

        /// Provider endpoint URL
        #[arg(long, default_value = "https://op.example.com/openid")]
        endpoint: String,
    },

    /// List supported association and session types
    Info,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Realm { realm, return_to } => cmd_realm(&realm, &return_to),
        Commands::Kv { query } => cmd_kv(&query),
        Commands::Associate {
            session_type,
            assoc_type,
            endpoint,
        } => cmd_associate(&session_type, &assoc_type, endpoint),
        Commands::Info => cmd_info(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn cmd_realm(realm: &str, return_to: &str) -> Result<(), Error> {
    let realm = Realm::parse(realm)?;
    if realm.validate(return_to) {
        println!("OK");
        Ok(())
    } else {
        println!("MISMATCH");
        process::exit(1);
    }
}

fn cmd_kv(query: &str) -> Result<(), Error> {
    let msg = Message::from_query_string(query)?;
    write_stdout(&msg.to_key_value_all()?)
}

fn cmd_associate(session_type: &str, assoc_type: &str, endpoint: String) -> Result<(), Error> {
    let store = Arc::new(MemoryStore::new());
    let provider = Provider::new(ProviderConfig::new(endpoint), store.clone())?;

    let mut params = vec![
        (format!("openid.{}", ns::field::NS), ns::OPENID20.to_owned()),
        (format!("openid.{}", ns::field::MODE), ns::mode::ASSOCIATE.to_owned()),
        (format!("openid.{}", ns::field::ASSOC_TYPE), assoc_type.to_owned()),
        (format!("openid.{}", ns::field::SESSION_TYPE), session_type.to_owned()),
    ];

    // Play the relying party's half of the key exchange.
    let dh_params = DhParams::default();
    let consumer = match SessionType::from_name(session_type) {
        Ok(s) if s.is_diffie_hellman() => {
            let key = PrivateKey::generate(&dh_params, &OsRandom)?;
            params.push((
                format!("openid.{}", ns::field::DH_CONSUMER_PUBLIC),
                key.public_key(&dh_params).to_base64(),
            ));
            Some((s, key))
        }
        _ => None,
    };

    let msg = Message::from_query(params)?;
    let response = provider.establish_session(msg)?.response()?;
    write_stdout(&response.body()?)?;

    let reply = response.message();
    let Some(handle) = reply.openid_arg(ns::field::ASSOC_HANDLE) else {
        // Negotiation failed; the body already says why.
        return Ok(());
    };
    let stored = store.get_association(handle.as_str(), false)?;

    let recovered = match (&consumer, reply.openid_arg(ns::field::DH_MAC_KEY)) {
        (Some((session, key)), Some(enc_mac_key)) => {
            let server_public = reply
                .openid_arg(ns::field::DH_SERVER_PUBLIC)
                .ok_or_else(|| Error::Other("response lacks dh_server_public".into()))
                .and_then(|y| PublicKey::from_base64(y.as_str()))?;
            let hash = session
                .hash()
                .ok_or_else(|| Error::Other(format!("{} has no hash", session.name())))?;
            let shared = key.shared_secret(&server_public, &dh_params)?;
            shared.xor_secret(hash, &base64_decode(enc_mac_key.as_str())?)?
        }
        _ => match reply.openid_arg(ns::field::MAC_KEY) {
            Some(mac_key) => base64_decode(mac_key.as_str())?,
            None => return Err(Error::Other("response carries no MAC key".into())),
        },
    };

    debug!("Association {} stored as {}", stored.handle(), stored.assoc_type());
    println!();
    if recovered.as_slice() == stored.secret() {
        println!("MAC key recovered: yes");
        Ok(())
    } else {
        println!("MAC key recovered: no");
        process::exit(1);
    }
}

fn cmd_info() -> Result<(), Error> {
    println!("openid2 - OpenID 2.0 provider protocol engine");
    println!();
    println!("Protocol versions:");
    println!("  {} (1.0, 1.1 accepted)", ns::OPENID20);
    println!();
    println!("Association types:");
    for assoc in [AssocType::HmacSha1, AssocType::HmacSha256] {
        println!("  {} ({}-byte secret)", assoc.name(), assoc.secret_size());
    }
    println!();
    println!("Session types:");
    for session in [
        SessionType::NoEncryption,
        SessionType::DhSha1,
        SessionType::DhSha256,
    ] {
        let carries: Vec<&str> = [AssocType::HmacSha1, AssocType::HmacSha256]
            .into_iter()
            .filter(|a| session.supports(*a))
            .map(|a| a.name())
            .collect();
        println!("  {} ({})", session.name(), carries.join(", "));
    }
    println!();
    println!("Discovery service types:");
    println!("  {}", ns::OPENID20_SERVER);
    println!("  {}", ns::OPENID20_SIGNON);
    Ok(())
}

// ── Utility functions ────────────────────────────────────────────────

fn write_stdout(data: &[u8]) -> Result<(), Error> {
    std::io::stdout()
        .write_all(data)
        .map_err(|e| Error::Other(format!("stdout: {e}")))
}
