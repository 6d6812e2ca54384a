use reqwest::StatusCode;
use reqwest::header::InvalidHeaderValue;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum Error {
    /// A creation request (partial or final) failed or came back without a
    /// usable `Location` header.
    #[error("Failed to retrieve upload location: {status} - {body}")]
    LocationRetrieve { status: StatusCode, body: String },

    /// Writing a chunk into its partial upload failed.
    #[error("Failed to upload chunk to {location}: {status} - {body}")]
    Upload {
        location: Url,
        status: StatusCode,
        body: String,
    },

    /// The chunk never reached its partial upload.
    #[error("Failed to send chunk to {location}: {source}")]
    Transfer {
        location: Url,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to terminate upload {location}: {status} - {body}")]
    Terminate {
        location: Url,
        status: StatusCode,
        body: String,
    },

    #[error("Server returned location {0} for more than one chunk")]
    DuplicateLocation(Url),

    #[error("Nothing to upload: the source is empty")]
    EmptyUpload,

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] InvalidHeaderValue),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
