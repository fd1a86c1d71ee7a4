//! Atomic artifact writes
//!
//! Bytes go to a temporary file next to the destination and are renamed into
//! place only after the stream completed. The temporary file is deleted when
//! dropped, so an error or an aborted task leaves the destination as it was.

use super::errors::ClientError;
use futures::{Stream, StreamExt};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Write every chunk of `stream` to `destination`, all or nothing.
///
/// The finished file replaces whatever `destination` held, normally the
/// placeholder of a [`Reservation`](crate::naming::Reservation).
pub async fn write_atomically<S, B, E>(stream: S, destination: &Path) -> Result<u64, ClientError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ClientError>,
{
    let dir = match destination.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let temp = tempfile::Builder::new()
        .prefix(".hotfolders-")
        .suffix(".part")
        .tempfile_in(dir)?;
    let mut file = tokio::fs::File::from_std(temp.reopen()?);

    let mut stream = std::pin::pin!(stream);
    let mut written: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return Err(e.into()),
        };
        let bytes = chunk.as_ref();
        file.write_all(bytes).await?;
        written += bytes.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    temp.persist(destination).map_err(|e| ClientError::Io(e.error))?;
    debug!("Wrote {} bytes to {}", written, destination.display());

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;
    use std::time::Duration;
    use tempfile::TempDir;

    fn leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_complete_stream_lands_at_destination() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("report.pdf");
        let chunks = stream::iter(vec![
            Ok::<_, io::Error>(b"%PDF".to_vec()),
            Ok(b"-1.7".to_vec()),
        ]);

        let written = write_atomically(chunks, &destination).await.unwrap();

        assert_eq!(written, 8);
        assert_eq!(std::fs::read(&destination).unwrap(), b"%PDF-1.7");
        assert_eq!(leftovers(dir.path()), vec!["report.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_stream_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("report.pdf");
        let chunks = stream::iter(vec![
            Ok(b"%PDF".to_vec()),
            Err(io::Error::other("connection reset")),
        ]);

        let err = write_atomically(chunks, &destination).await.unwrap_err();

        assert!(matches!(err, ClientError::Io(_)));
        assert!(!destination.exists());
        assert!(leftovers(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_reserved_placeholder_is_replaced() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("report.pdf");
        std::fs::write(&destination, b"").unwrap();

        let chunks = stream::iter(vec![Ok::<_, io::Error>(b"%PDF".to_vec())]);
        write_atomically(chunks, &destination).await.unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"%PDF");
        assert_eq!(leftovers(dir.path()), vec!["report.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_stream_keeps_placeholder_untouched() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("report.pdf");
        std::fs::write(&destination, b"").unwrap();

        let chunks = stream::iter(vec![Err::<Vec<u8>, _>(io::Error::other("reset"))]);
        assert!(write_atomically(chunks, &destination).await.is_err());

        assert_eq!(std::fs::read(&destination).unwrap(), b"");
        assert_eq!(leftovers(dir.path()), vec!["report.pdf".to_string()]);
    }

    #[tokio::test]
    async fn test_abandoned_write_leaves_nothing() {
        let dir = TempDir::new().unwrap();
        let destination = dir.path().join("report.pdf");
        let chunks =
            stream::iter(vec![Ok::<_, io::Error>(b"%PDF".to_vec())]).chain(stream::pending());

        let write = write_atomically(chunks, &destination);
        let timed_out = tokio::time::timeout(Duration::from_millis(50), write).await;

        assert!(timed_out.is_err());
        assert!(!destination.exists());
        assert!(leftovers(dir.path()).is_empty());
    }
}
