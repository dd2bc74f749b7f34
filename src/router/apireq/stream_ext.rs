use futures_util::StreamExt;

use crate::router::ByteStream;

pub(crate) trait ResponseStreamExt {
    /// Turns the response body into a stream of raw chunks whose errors are
    /// already classified as router errors.
    fn byte_stream(self) -> ByteStream;
}

impl ResponseStreamExt for reqwest::Response {
    fn byte_stream(self) -> ByteStream {
        Box::pin(self.bytes_stream().map(|chunk| chunk.map_err(Into::into)))
    }
}
