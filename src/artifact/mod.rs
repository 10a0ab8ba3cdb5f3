mod aligned;
mod fetch;
mod verify;

use serde::Serialize;

pub use aligned::AlignedBuffer;
pub use fetch::{ArtifactFetcher, ByteStream, HttpTransport, Transport};
pub use verify::{sha256_hex, verify_digest};

/// A file to download and the digest its decompressed bytes must have.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RemoteArtifact {
    pub name: String,
    pub url: String,
    pub expected_hash: String,
}
