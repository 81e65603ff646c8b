use std::io;
use std::path::Path;
use std::sync::Arc;

use futures_util::Stream;
use futures_util::stream::try_unfold;
use reqwest::Body;
use tahoe_core::{Capability, TahoeClient};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

use super::engine::SyncError;
use crate::progress::{ProgressSink, ProgressUnit};

/// Streams `local_path` to `<parent>/<name>` as an immutable upload.
///
/// The file is read one block at a time as the HTTP body is pulled, so at
/// most one block is held in memory. The handle lives inside the body and is
/// closed when the request finishes or fails.
pub async fn upload_file(
    client: &TahoeClient,
    local_path: &Path,
    name: &str,
    parent: &Capability,
    block_size: usize,
    unit: ProgressUnit,
    progress: Arc<dyn ProgressSink>,
) -> Result<Capability, SyncError> {
    let file = File::open(local_path).await.map_err(|source| SyncError::Io {
        path: local_path.to_path_buf(),
        source,
    })?;
    let body = Body::wrap_stream(block_stream(file, block_size, unit, progress));
    Ok(client.put_file(parent, name, body).await?)
}

/// Yields full `block_size` blocks until the final, possibly shorter, one.
pub fn block_stream(
    file: File,
    block_size: usize,
    unit: ProgressUnit,
    progress: Arc<dyn ProgressSink>,
) -> impl Stream<Item = io::Result<Vec<u8>>> + Send + 'static {
    let block_size = block_size.max(1);
    try_unfold(file, move |mut file| {
        let progress = Arc::clone(&progress);
        async move {
            let mut block = Vec::with_capacity(block_size);
            (&mut file)
                .take(block_size as u64)
                .read_to_end(&mut block)
                .await?;
            if block.is_empty() {
                return Ok(None);
            }
            progress.advance(block.len() as u64 * unit.multiplier());
            Ok::<_, io::Error>(Some((block, file)))
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;
    use std::sync::Mutex;
    use tempfile::tempdir;
    use wiremock::matchers::{body_bytes, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct Recorded(Mutex<Vec<u64>>);

    impl ProgressSink for Recorded {
        fn advance(&self, amount: u64) {
            self.0.lock().unwrap().push(amount);
        }
    }

    async fn blocks_of(
        content: &[u8],
        block_size: usize,
        unit: ProgressUnit,
    ) -> (Vec<usize>, Vec<u64>) {
        let dir = tempdir().unwrap();
        let source = dir.path().join("in.bin");
        std::fs::write(&source, content).unwrap();
        let progress = Arc::new(Recorded::default());

        let file = File::open(&source).await.unwrap();
        let blocks: Vec<Vec<u8>> = block_stream(file, block_size, unit, progress.clone())
            .try_collect()
            .await
            .unwrap();
        let joined: Vec<u8> = blocks.concat();
        assert_eq!(joined, content);

        let sizes = blocks.iter().map(Vec::len).collect();
        let reported = progress.0.lock().unwrap().clone();
        (sizes, reported)
    }

    #[tokio::test]
    async fn splits_into_fixed_blocks() {
        let (sizes, reported) = blocks_of(&[7u8; 10], 4, ProgressUnit::Bytes).await;
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(reported, vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn reports_bits_when_configured() {
        let (sizes, reported) = blocks_of(b"0123456789", 512 * 1024, ProgressUnit::Bits).await;
        assert_eq!(sizes, vec![10]);
        assert_eq!(reported, vec![80]);
    }

    #[tokio::test]
    async fn empty_file_yields_no_blocks() {
        let (sizes, reported) = blocks_of(b"", 4, ProgressUnit::Bytes).await;
        assert!(sizes.is_empty());
        assert!(reported.is_empty());
    }

    #[tokio::test]
    async fn uploads_file_contents() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/uri/URI:DIR2:root/in.bin"))
            .and(query_param("format", "CHK"))
            .and(body_bytes(b"payload".to_vec()))
            .respond_with(ResponseTemplate::new(201).set_body_string("URI:CHK:in"))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("in.bin");
        std::fs::write(&source, b"payload").unwrap();
        let progress = Arc::new(Recorded::default());

        let client = TahoeClient::new(&server.uri()).unwrap();
        let cap = upload_file(
            &client,
            &source,
            "in.bin",
            &Capability::from("URI:DIR2:root"),
            3,
            ProgressUnit::Bytes,
            progress.clone(),
        )
        .await
        .unwrap();

        assert_eq!(cap.as_str(), "URI:CHK:in");
        assert_eq!(*progress.0.lock().unwrap(), vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn rejected_upload_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let source = dir.path().join("in.bin");
        std::fs::write(&source, b"payload").unwrap();

        let client = TahoeClient::new(&server.uri()).unwrap();
        let err = upload_file(
            &client,
            &source,
            "in.bin",
            &Capability::from("URI:DIR2:root"),
            4,
            ProgressUnit::Bytes,
            Arc::new(crate::progress::NoProgress),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn missing_local_file_is_an_io_error() {
        let client = TahoeClient::new("http://127.0.0.1:9").unwrap();
        let err = upload_file(
            &client,
            Path::new("/definitely/not/here.bin"),
            "here.bin",
            &Capability::from("URI:DIR2:root"),
            4,
            ProgressUnit::Bytes,
            Arc::new(crate::progress::NoProgress),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SyncError::Io { .. }));
    }
}
