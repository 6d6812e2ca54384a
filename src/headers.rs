//! Header sets for the tus concatenation extension.
//!
//! Every set starts from [`protocol_headers`], so the protocol version and
//! concatenation markers are always present.

use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::Result;

pub const TUS_VERSION: &str = "1.0.0";
pub const PARTIAL: &str = "partial";
pub const FINAL_PREFIX: &str = "final;";
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

pub const TUS_RESUMABLE: HeaderName = HeaderName::from_static("tus-resumable");
pub const UPLOAD_CONCAT: HeaderName = HeaderName::from_static("upload-concat");
pub const UPLOAD_LENGTH: HeaderName = HeaderName::from_static("upload-length");
pub const UPLOAD_OFFSET: HeaderName = HeaderName::from_static("upload-offset");

pub fn protocol_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(TUS_RESUMABLE, HeaderValue::from_static(TUS_VERSION));
    headers.insert(UPLOAD_CONCAT, HeaderValue::from_static(PARTIAL));
    headers
}

/// Headers for creating a partial upload of `upload_length` bytes.
pub fn creation_headers(upload_length: u64) -> HeaderMap {
    let mut headers = protocol_headers();
    headers.insert(UPLOAD_LENGTH, HeaderValue::from(upload_length));
    headers
}

/// Headers for writing a whole chunk into a partial upload. Partial uploads
/// are always written in a single request, so the offset is fixed at zero.
pub fn patch_headers(content_length: u64) -> HeaderMap {
    let mut headers = protocol_headers();
    headers.insert(UPLOAD_OFFSET, HeaderValue::from(0u64));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(OFFSET_OCTET_STREAM));
    headers
}

/// Headers asking the server to concatenate `locations`, in order.
pub fn final_concat_headers<'a, I>(locations: I) -> Result<HeaderMap>
where
    I: IntoIterator<Item = &'a Url>,
{
    let mut headers = protocol_headers();
    let value = format_locations(locations);
    headers.insert(UPLOAD_CONCAT, HeaderValue::try_from(value)?);
    Ok(headers)
}

pub fn termination_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(TUS_RESUMABLE, HeaderValue::from_static(TUS_VERSION));
    headers
}

/// Builds the `final;` manifest. Locations are written in their normalized
/// `Url` form, which may differ from the raw `Location` header (host case,
/// default port, dot segments) while naming the same resource.
pub fn format_locations<'a, I>(locations: I) -> String
where
    I: IntoIterator<Item = &'a Url>,
{
    let joined = locations
        .into_iter()
        .map(Url::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    format!("{FINAL_PREFIX}{joined}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
        headers.get(name).unwrap().to_str().unwrap()
    }

    #[test]
    fn test_creation_headers() {
        let headers = creation_headers(6);
        assert_eq!(headers.len(), 3);
        assert_eq!(header(&headers, "Tus-Resumable"), "1.0.0");
        assert_eq!(header(&headers, "Upload-Concat"), "partial");
        assert_eq!(header(&headers, "Upload-Length"), "6");
    }

    #[test]
    fn test_patch_headers() {
        let headers = patch_headers(4 * 1024 * 1024);
        assert_eq!(headers.len(), 5);
        assert_eq!(header(&headers, "Upload-Offset"), "0");
        assert_eq!(header(&headers, "Content-Length"), "4194304");
        assert_eq!(
            header(&headers, "Content-Type"),
            "application/offset+octet-stream"
        );
        assert_eq!(header(&headers, "Tus-Resumable"), "1.0.0");
        assert_eq!(header(&headers, "Upload-Concat"), "partial");
    }

    #[test]
    fn test_final_concat_headers_keep_order() {
        let locations: Vec<Url> = ["http://localhost/files/b", "http://localhost/files/a"]
            .iter()
            .map(|s| Url::parse(s).unwrap())
            .collect();

        let headers = final_concat_headers(&locations).unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(header(&headers, "Tus-Resumable"), "1.0.0");
        assert_eq!(
            header(&headers, "Upload-Concat"),
            "final;http://localhost/files/b http://localhost/files/a"
        );
        assert_eq!(headers.get_all("Upload-Concat").iter().count(), 1);
    }

    #[test]
    fn test_format_locations_are_normalized() {
        let location = Url::parse("HTTP://Tus.Example.COM:80/files/tmp/../7f3a").unwrap();
        assert_eq!(
            format_locations([&location]),
            "final;http://tus.example.com/files/7f3a"
        );
    }

    #[test]
    fn test_format_locations_empty() {
        assert_eq!(format_locations(&Vec::<Url>::new()), "final;");
    }

    #[test]
    fn test_termination_headers() {
        let headers = termination_headers();
        assert_eq!(headers.len(), 1);
        assert_eq!(header(&headers, "Tus-Resumable"), "1.0.0");
    }
}
