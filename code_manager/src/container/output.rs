// container/output.rs
use tokio::io::{AsyncRead, AsyncReadExt};

/// Text captured from one of the guest's output streams.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub text: String,
    pub truncated: bool,
}

/// Reads at most `limit` bytes from `reader`, then keeps draining (and discarding)
/// the rest so the writer never blocks on a full pipe.
pub async fn read_bounded<R>(mut reader: R, limit: usize) -> std::io::Result<CapturedOutput>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(limit.min(8 * 1024));
    (&mut reader).take(limit as u64).read_to_end(&mut buf).await?;
    let discarded = tokio::io::copy(&mut reader, &mut tokio::io::sink()).await?;

    Ok(CapturedOutput {
        text: String::from_utf8_lossy(&buf).into_owned(),
        truncated: discarded > 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_output_is_untouched() {
        let out = read_bounded(&b"hello\n"[..], 1024).await.unwrap();
        assert_eq!(out.text, "hello\n");
        assert!(!out.truncated);
    }

    #[tokio::test]
    async fn long_output_is_truncated_not_failed() {
        let data = vec![b'x'; 10_000];
        let out = read_bounded(&data[..], 100).await.unwrap();
        assert_eq!(out.text.len(), 100);
        assert!(out.truncated);
    }

    #[tokio::test]
    async fn exact_limit_is_not_truncated() {
        let out = read_bounded(&b"abcd"[..], 4).await.unwrap();
        assert_eq!(out.text, "abcd");
        assert!(!out.truncated);
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let out = read_bounded(&[0xff, b'a'][..], 16).await.unwrap();
        assert_eq!(out.text, "\u{fffd}a");
    }
}
