//! Server-sent event decoding for streamed HTTP responses.

use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::{Stream, StreamExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

const MAX_LINE_LENGTH: usize = 1024 * 1024;
const DONE: &str = "[DONE]";

/// `data:` payloads of an SSE body, ending at the body's end or at `[DONE]`.
pub fn data_payloads<S>(body: S) -> BoxStream<'static, Result<String, std::io::Error>>
where
    S: Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static,
{
    let lines = FramedRead::new(
        StreamReader::new(body),
        LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
    );

    lines
        .map(|line| line.map_err(line_error))
        .filter_map(|line| async move {
            match line {
                Ok(line) => {
                    let data = line.strip_prefix("data:")?.trim_start();
                    Some(Ok(data.to_string()))
                }
                Err(e) => Some(Err(e)),
            }
        })
        .take_while(|payload| {
            let done = matches!(payload, Ok(data) if data == DONE);
            async move { !done }
        })
        .boxed()
}

/// Byte stream of a `reqwest` response, with errors mapped to `io::Error`.
pub fn response_payloads(
    response: reqwest::Response,
) -> BoxStream<'static, Result<String, std::io::Error>> {
    data_payloads(
        response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other)),
    )
}

fn line_error(e: LinesCodecError) -> std::io::Error {
    match e {
        LinesCodecError::Io(io) => io,
        LinesCodecError::MaxLineLengthExceeded => std::io::Error::other("Max line length exceeded"),
    }
}
