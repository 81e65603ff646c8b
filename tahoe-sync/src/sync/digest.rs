use std::path::Path;

use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use tahoe_core::{Capability, TahoeClient, TahoeError};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::engine::SyncError;

pub type Sha256Digest = [u8; 32];

pub async fn local_sha256(path: &Path, block_size: usize) -> Result<Sha256Digest, SyncError> {
    let io_err = |source: std::io::Error| SyncError::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).await.map_err(io_err)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; block_size.max(1)];
    loop {
        let read = file.read(&mut buf).await.map_err(io_err)?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(hasher.finalize().into())
}

/// Digest of a remote file, streamed from the gateway without buffering it whole.
pub async fn remote_sha256(
    client: &TahoeClient,
    cap: &Capability,
) -> Result<Sha256Digest, SyncError> {
    let mut stream = client.read_file(cap).await?.bytes_stream();
    let mut hasher = Sha256::new();
    while let Some(chunk) = stream.next().await {
        hasher.update(chunk.map_err(TahoeError::from)?);
    }
    Ok(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn local_and_remote_digests_agree_on_same_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/uri/URI:CHK:a"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world".to_vec()))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("a.txt");
        std::fs::write(&source, b"hello world").unwrap();

        let client = TahoeClient::new(&server.uri()).unwrap();
        let remote = remote_sha256(&client, &Capability::from("URI:CHK:a"))
            .await
            .unwrap();
        let local = local_sha256(&source, 4).await.unwrap();

        assert_eq!(local, remote);
    }

    #[tokio::test]
    async fn different_bytes_give_different_digests() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("first");
        let second = dir.path().join("second");
        std::fs::write(&first, b"abc").unwrap();
        std::fs::write(&second, b"abd").unwrap();

        assert_ne!(
            local_sha256(&first, 2).await.unwrap(),
            local_sha256(&second, 2).await.unwrap()
        );
    }
}
