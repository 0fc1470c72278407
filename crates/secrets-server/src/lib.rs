//! Protocol server for the wasmCloud secrets backend API.
//!
//! A backend subscribes to a queue group on the lattice NATS connection and
//! answers two operations: `server_xkey`, which returns the server's public
//! curve key so callers can seal requests to it, and `get`, which decrypts a
//! sealed [`SecretRequest`], authenticates the caller through its signed
//! JWTs, resolves the secret through a [`SecretsHandler`], and replies with
//! a [`SecretResponse`] sealed to the caller under a fresh ephemeral key.
//!
//! Error replies are plaintext JSON; the presence of the
//! [`RESPONSE_XKEY`] header is the sole marker that a reply is ciphertext.

mod errors;
mod server;
mod subject;
mod types;

pub use crate::errors::*;
pub use crate::server::*;
pub use crate::subject::*;
pub use crate::types::*;

/// Default subject prefix all secrets backends live under.
pub const DEFAULT_SECRETS_BUS_PREFIX: &str = "wasmcloud.secrets";

/// Version of the secrets protocol implemented by this crate.
pub const DEFAULT_SECRETS_PROTOCOL_VERSION: &str = "v1alpha1";

/// The key of a NATS header containing the host's public xkey used to encrypt
/// a secret request. It is also the key the response is encrypted to, so that
/// only the requestor can decrypt it.
pub const WASMCLOUD_HOST_XKEY: &str = "WasmCloud-Host-Xkey";

/// The key of a NATS header carrying the ephemeral public xkey a successful
/// response was sealed with.
pub const RESPONSE_XKEY: &str = "Server-Response-Xkey";
