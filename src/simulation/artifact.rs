//! In-memory artifacts and their persistence.
//!
//! An [`Artifact`] mirrors a multi-extension detector file: a list of HDUs,
//! each with an ordered keyword header and opaque pixel data. Pixel encoding
//! belongs to the simulation engine; this crate only ever touches headers.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::HeaderError;

/// A header keyword value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Renders the value for tabular output.
    pub fn render(&self) -> String {
        match self {
            HeaderValue::Bool(true) => "T".to_string(),
            HeaderValue::Bool(false) => "F".to_string(),
            HeaderValue::Int(i) => i.to_string(),
            HeaderValue::Float(f) => f.to_string(),
            HeaderValue::Text(text) => text.clone(),
        }
    }
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Text(value)
    }
}

impl From<f64> for HeaderValue {
    fn from(value: f64) -> Self {
        HeaderValue::Float(value)
    }
}

impl From<i64> for HeaderValue {
    fn from(value: i64) -> Self {
        HeaderValue::Int(value)
    }
}

/// One header card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub key: String,
    pub value: HeaderValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Ordered keyword header.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&HeaderValue> {
        self.cards.iter().find(|c| c.key == key).map(|c| &c.value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(HeaderValue::as_str)
    }

    /// Sets a keyword, keeping its position if it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<HeaderValue>) {
        let key = key.into();
        let value = value.into();
        match self.cards.iter_mut().find(|c| c.key == key) {
            Some(card) => card.value = value,
            None => self.cards.push(Card {
                key,
                value,
                comment: None,
            }),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<HeaderValue> {
        let pos = self.cards.iter().position(|c| c.key == key)?;
        Some(self.cards.remove(pos).value)
    }

    pub fn retain<F: FnMut(&Card) -> bool>(&mut self, keep: F) {
        self.cards.retain(keep);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.cards.iter().map(|c| c.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl FromIterator<(String, HeaderValue)> for Header {
    fn from_iter<I: IntoIterator<Item = (String, HeaderValue)>>(iter: I) -> Self {
        let mut header = Header::new();
        for (key, value) in iter {
            header.set(key, value);
        }
        header
    }
}

/// One header/data unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hdu {
    pub header: Header,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,
}

impl Hdu {
    pub fn with_header(header: Header) -> Self {
        Self {
            header,
            data: serde_json::Value::Null,
        }
    }
}

/// A produced detector artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub hdus: Vec<Hdu>,
}

impl Artifact {
    pub fn new(hdus: Vec<Hdu>) -> Self {
        Self { hdus }
    }

    pub fn primary(&self) -> Option<&Header> {
        self.hdus.first().map(|hdu| &hdu.header)
    }

    pub fn primary_mut(&mut self) -> Option<&mut Header> {
        self.hdus.first_mut().map(|hdu| &mut hdu.header)
    }
}

/// Reads and writes artifacts by path.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn read(&self, path: &Path) -> Result<Artifact, HeaderError>;

    async fn write(&self, path: &Path, artifact: &Artifact) -> Result<(), HeaderError>;
}

/// Stores artifacts as JSON documents at their artifact path.
#[derive(Debug, Clone, Default)]
pub struct JsonArtifactStore;

#[async_trait]
impl ArtifactStore for JsonArtifactStore {
    async fn read(&self, path: &Path) -> Result<Artifact, HeaderError> {
        let bytes = tokio::fs::read(path).await?;
        serde_json::from_slice(&bytes).map_err(|e| HeaderError::ReadFailed {
            path: PathBuf::from(path),
            message: e.to_string(),
        })
    }

    async fn write(&self, path: &Path, artifact: &Artifact) -> Result<(), HeaderError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(artifact)?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_set_keeps_position() {
        let mut header = Header::new();
        header.set("A", "1");
        header.set("B", 2.0);
        header.set("A", "3");
        assert_eq!(header.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(header.get_str("A"), Some("3"));
        assert_eq!(header.remove("B"), Some(HeaderValue::Float(2.0)));
        assert_eq!(header.len(), 1);
    }

    #[test]
    fn test_header_value_untagged_json() {
        let header: Header = serde_json::from_str(
            r#"[{"key":"NAXIS","value":2},{"key":"EXPTIME","value":1.5},{"key":"SIMPLE","value":true},{"key":"OBJECT","value":"sky"}]"#,
        )
        .expect("failed to parse header");
        assert_eq!(header.get("NAXIS"), Some(&HeaderValue::Int(2)));
        assert_eq!(header.get("EXPTIME"), Some(&HeaderValue::Float(1.5)));
        assert_eq!(header.get("SIMPLE"), Some(&HeaderValue::Bool(true)));
        assert_eq!(header.get_str("OBJECT"), Some("sky"));
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("nested").join("METIS.X.fits");

        let mut header = Header::new();
        header.set("HIERARCH ESO DPR TECH", "IMAGE,LM");
        let artifact = Artifact::new(vec![Hdu::with_header(header)]);

        let store = JsonArtifactStore;
        store.write(&path, &artifact).await.expect("failed to write");
        let back = store.read(&path).await.expect("failed to read");
        assert_eq!(back, artifact);
    }

    #[tokio::test]
    async fn test_json_store_rejects_garbage() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = dir.path().join("bad.fits");
        tokio::fs::write(&path, b"SIMPLE  =  T").await.expect("failed to write");
        let err = JsonArtifactStore.read(&path).await.expect_err("must fail");
        assert!(matches!(err, HeaderError::ReadFailed { .. }));
    }
}
