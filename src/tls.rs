use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;

use crate::config::Args;

// Build the rustls config from the --ssl-* flags. Returns None when TLS is
// not requested; the caller then serves plain TCP.
pub fn rustls_config(args: &Args) -> anyhow::Result<Option<RustlsConfig>> {
    let (keyfile, certfile) = match (&args.ssl_keyfile, &args.ssl_certfile) {
        (None, None) => return Ok(None),
        (Some(key), Some(cert)) => (key, cert),
        _ => anyhow::bail!("--ssl-keyfile and --ssl-certfile must be given together"),
    };

    let certs = read_certs(certfile)?;
    let key = read_key(keyfile)?;

    let builder = rustls::ServerConfig::builder();
    let config = match &args.ssl_ca_certs {
        Some(ca_path) => {
            let mut roots = RootCertStore::empty();
            for cert in read_certs(ca_path)? {
                roots.add(cert)?;
            }
            let verifier = WebPkiClientVerifier::builder(Arc::new(roots));
            let verifier = if args.require_client_cert {
                verifier.build()?
            } else {
                verifier.allow_unauthenticated().build()?
            };
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    }
    .with_single_cert(certs, key)?;

    Ok(Some(RustlsConfig::from_config(Arc::new(config))))
}

fn read_certs(path: &Path) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("reading certificates from {}", path.display()))
}

fn read_key(path: &Path) -> anyhow::Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .with_context(|| format!("reading private key from {}", path.display()))?
        .ok_or_else(|| anyhow::anyhow!("no private key found in {}", path.display()))
}
