use std::io::Read;
use std::num::NonZeroUsize;
use std::time::Duration;

use bytes::Bytes;
use futures::{StreamExt, stream};
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Client, RequestBuilder, Response};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::chunk::{DEFAULT_CHUNK_SIZE, chunk_reader};
use crate::error::{Error, Result};
use crate::headers::{self, UPLOAD_OFFSET};
use crate::summary::{PartOutcome, TransferResult, UploadReport, UploadSummary};

/// Per-upload settings, applied to each request instead of to the shared
/// HTTP client.
#[derive(Clone, Debug)]
pub struct UploadOptions {
    pub chunk_size: NonZeroUsize,
    /// Maximum number of chunks in flight. `None` uploads every chunk at once.
    pub concurrency: Option<NonZeroUsize>,
    /// Deadline for creation, concatenation and termination requests.
    pub request_timeout: Option<Duration>,
    /// Deadline for writing a chunk. Large chunks can legitimately take a
    /// long time, so there is none by default.
    pub transfer_timeout: Option<Duration>,
    pub bearer_token: Option<String>,
    /// Receives the size of every chunk once it has been written. Unbounded,
    /// so no size is lost when many chunks finish at once.
    pub progress: Option<mpsc::UnboundedSender<u64>>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            concurrency: None,
            request_timeout: None,
            transfer_timeout: None,
            bearer_token: None,
            progress: None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct TusClient {
    client: Client,
    options: UploadOptions,
}

impl TusClient {
    pub fn new(options: UploadOptions) -> Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self::with_client(client, options))
    }

    pub fn with_client(client: Client, options: UploadOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    fn prepare(&self, request: RequestBuilder, timeout: Option<Duration>) -> RequestBuilder {
        let request = match &self.options.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        match timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    /// Issues a creation request against `target` and returns the location
    /// of the created resource.
    async fn get_location(&self, target: &Url, headers: HeaderMap) -> Result<Url> {
        let response = self
            .prepare(self.client.post(target.clone()), self.options.request_timeout)
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::LocationRetrieve {
                status,
                body: response_text(response).await,
            });
        }

        // Relative locations are resolved against the collection URL. Either
        // way the location is kept in normalized `Url` form from here on.
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| target.join(value).ok());

        match location {
            Some(location) => Ok(location),
            None => {
                let body = response_text(response).await;
                Err(Error::LocationRetrieve {
                    status,
                    body: if body.is_empty() {
                        "response has no usable Location header".to_string()
                    } else {
                        body
                    },
                })
            }
        }
    }

    /// Creates a partial upload for `chunk` and writes the chunk into it.
    #[tracing::instrument(
        name = "tus.upload_chunk",
        skip_all,
        fields(tus.target = %target, tus.bytes = chunk.len()),
        err
    )]
    pub async fn upload_chunk(&self, chunk: Bytes, target: &Url) -> Result<(Url, TransferResult)> {
        let length = chunk.len() as u64;

        let location = self
            .get_location(target, headers::creation_headers(length))
            .await?;
        debug!(%location, "Created partial upload");

        let response = self
            .prepare(
                self.client.patch(location.clone()),
                self.options.transfer_timeout,
            )
            .headers(headers::patch_headers(length))
            .body(chunk)
            .send()
            .await;
        let response = match response {
            Ok(response) => response,
            Err(source) => return Err(Error::Transfer { location, source }),
        };

        let status = response.status();
        let offset = response
            .headers()
            .get(&UPLOAD_OFFSET)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok());
        let body = response_text(response).await;

        if !status.is_success() {
            return Err(Error::Upload {
                location,
                status,
                body,
            });
        }

        if let Some(progress) = &self.options.progress {
            let _ = progress.send(length);
        }

        Ok((
            location,
            TransferResult {
                status,
                offset,
                bytes: length,
                body,
            },
        ))
    }

    /// Uploads every chunk of `reader` as a partial upload.
    ///
    /// All chunks are attempted even when some fail; nothing is cleaned up on
    /// the server. The report lists the outcome of each chunk in file order.
    #[tracing::instrument(name = "tus.upload_parts", skip_all, fields(tus.target = %target))]
    pub async fn upload_parts<R: Read>(&self, reader: R, target: &Url) -> UploadReport {
        let concurrency = self
            .options
            .concurrency
            .map_or(usize::MAX, NonZeroUsize::get);
        let chunks = chunk_reader(reader, self.options.chunk_size).enumerate();

        let parts = stream::iter(chunks)
            .map(|(index, chunk)| async move {
                let result = match chunk {
                    Ok(chunk) => self.upload_chunk(chunk, target).await,
                    Err(e) => Err(Error::Io(e)),
                };
                if let Err(e) = &result {
                    warn!(index, error = %e, "Chunk upload failed");
                }
                PartOutcome { index, result }
            })
            .buffer_unordered(concurrency)
            .collect::<Vec<_>>()
            .await;

        let report = UploadReport::new(parts);
        info!(
            chunks = report.len(),
            failed = report.failures().count(),
            "Finished uploading chunks"
        );
        report
    }

    /// Uploads every chunk of `reader`, failing with the error of the
    /// earliest failed chunk.
    pub async fn upload_chunks<R: Read>(&self, reader: R, target: &Url) -> Result<UploadSummary> {
        self.upload_parts(reader, target).await.into_summary()
    }

    /// Asks the server to assemble `locations`, in the given order, into a
    /// single upload and returns its location.
    #[tracing::instrument(name = "tus.concatenate", skip_all, fields(tus.target = %target), err)]
    pub async fn concatenate<'a, I>(&self, target: &Url, locations: I) -> Result<Url>
    where
        I: IntoIterator<Item = &'a Url>,
    {
        let headers = headers::final_concat_headers(locations)?;
        let location = self.get_location(target, headers).await?;
        info!(%location, "Concatenated partial uploads");
        Ok(location)
    }

    /// Uploads `reader` in parallel chunks and concatenates them into the
    /// final upload, whose location is returned.
    pub async fn upload<R: Read>(&self, reader: R, target: &Url) -> Result<Url> {
        let summary = self.upload_chunks(reader, target).await?;
        if summary.is_empty() {
            return Err(Error::EmptyUpload);
        }
        self.concatenate(target, summary.locations()).await
    }

    /// Deletes an upload through the termination extension.
    #[tracing::instrument(name = "tus.terminate", skip_all, fields(tus.location = %location), err)]
    pub async fn terminate(&self, location: &Url) -> Result<()> {
        let response = self
            .prepare(
                self.client.delete(location.clone()),
                self.options.request_timeout,
            )
            .headers(headers::termination_headers())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Terminate {
                location: location.clone(),
                status,
                body: response_text(response).await,
            });
        }
        Ok(())
    }

    /// Terminates every location, attempting all of them.
    pub async fn cleanup(&self, locations: &[Url]) -> Vec<(Url, Result<()>)> {
        let concurrency = self
            .options
            .concurrency
            .map_or(usize::MAX, NonZeroUsize::get);

        stream::iter(locations)
            .map(|location| async move { (location.clone(), self.terminate(location).await) })
            .buffer_unordered(concurrency)
            .collect()
            .await
    }
}

async fn response_text(response: Response) -> String {
    response.text().await.unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = UploadOptions::default();
        assert_eq!(options.chunk_size.get(), 4 * 1024 * 1024);
        assert!(options.concurrency.is_none());
        assert!(options.transfer_timeout.is_none());
        assert!(options.progress.is_none());
    }

    #[tokio::test]
    async fn test_empty_source_is_rejected() {
        let client = TusClient::new(UploadOptions::default()).unwrap();
        let target = Url::parse("http://127.0.0.1:9/files").unwrap();

        let result = client.upload(std::io::empty(), &target).await;
        assert!(matches!(result, Err(Error::EmptyUpload)));
    }
}
