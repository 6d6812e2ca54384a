use std::collections::HashSet;

use reqwest::StatusCode;
use serde::Serialize;
use url::Url;

use crate::error::{Error, Result};
use crate::serde_utils;

/// Outcome of writing one chunk into its partial upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    #[serde(serialize_with = "serde_utils::serialize_status_code")]
    pub status: StatusCode,
    /// `Upload-Offset` reported by the server after the write, if any.
    pub offset: Option<u64>,
    pub bytes: u64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartialUpload {
    pub location: Url,
    #[serde(flatten)]
    pub result: TransferResult,
}

/// Every partial upload of a finished transfer, keyed by location.
///
/// Entries are kept in source chunk order, which is the order the server
/// must concatenate them in.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct UploadSummary {
    parts: Vec<PartialUpload>,
}

impl UploadSummary {
    /// Builds a summary from `(location, result)` pairs given in chunk order.
    pub fn from_parts<I>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Url, TransferResult)>,
    {
        let mut seen = HashSet::new();
        let mut summary = Vec::new();
        for (location, result) in parts {
            if !seen.insert(location.clone()) {
                return Err(Error::DuplicateLocation(location));
            }
            summary.push(PartialUpload { location, result });
        }
        Ok(Self { parts: summary })
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn get(&self, location: &Url) -> Option<&TransferResult> {
        self.parts
            .iter()
            .find(|part| &part.location == location)
            .map(|part| &part.result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Url, &TransferResult)> {
        self.parts.iter().map(|part| (&part.location, &part.result))
    }

    pub fn locations(&self) -> impl Iterator<Item = &Url> {
        self.parts.iter().map(|part| &part.location)
    }

    pub fn total_bytes(&self) -> u64 {
        self.parts.iter().map(|part| part.result.bytes).sum()
    }

}

/// What happened to a single chunk.
#[derive(Debug)]
pub struct PartOutcome {
    pub index: usize,
    pub result: Result<(Url, TransferResult)>,
}

impl PartOutcome {
    /// The partial upload created on the server for this chunk, even when
    /// writing into it failed afterwards.
    pub fn location(&self) -> Option<&Url> {
        match &self.result {
            Ok((location, _)) => Some(location),
            Err(Error::Upload { location, .. } | Error::Transfer { location, .. }) => {
                Some(location)
            }
            Err(_) => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-chunk outcomes of an upload attempt, in chunk order.
///
/// Unlike [`UploadSummary`] this is available when some chunks failed, so the
/// caller can find and remove partial uploads left behind on the server.
#[derive(Debug, Default)]
pub struct UploadReport {
    parts: Vec<PartOutcome>,
}

impl UploadReport {
    pub fn new(mut parts: Vec<PartOutcome>) -> Self {
        parts.sort_by_key(|part| part.index);
        Self { parts }
    }

    pub fn parts(&self) -> &[PartOutcome] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn is_success(&self) -> bool {
        self.parts.iter().all(PartOutcome::is_success)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PartOutcome> {
        self.parts.iter().filter(|part| !part.is_success())
    }

    /// Every partial upload that exists on the server, in chunk order. A
    /// location the server handed out twice is listed once.
    pub fn created_locations(&self) -> Vec<Url> {
        let mut seen = HashSet::new();
        self.parts
            .iter()
            .filter_map(PartOutcome::location)
            .filter(|location| seen.insert(*location))
            .cloned()
            .collect()
    }

    /// Fails with the error of the earliest failed chunk, if any.
    pub fn into_summary(self) -> Result<UploadSummary> {
        let parts = self
            .parts
            .into_iter()
            .map(|part| part.result)
            .collect::<Result<Vec<_>>>()?;
        UploadSummary::from_parts(parts)
    }
}
