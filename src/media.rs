//! Media objects: a MIME type paired with a payload that is produced on demand.
//!
//! Repeated calls to [`MediaObject::get_data`] behave per construction form:
//!
//! | form                        | retrieval                                  |
//! |-----------------------------|--------------------------------------------|
//! | [`MediaObject::new`]        | clones the held payload                    |
//! | [`MediaObject::from_producer`] | runs the producer again                 |
//! | [`MediaObject::from_ffmpeg_input`] | clones the JSON encoded at construction |
//! | [`MediaObject::from_reference`] | asks the referenced device again       |

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::capability::{CapabilityRegistry, MediaReference};
use crate::engine::FFmpegInput;
use crate::error::{BrokerError, Result};
use crate::mime::{self, MimeType};

/// A payload in one of its two interchangeable representations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaData {
    Buffer(Vec<u8>),
    Text(String),
}

/// The representation a converter wants its input in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Representation {
    #[default]
    Any,
    Buffer,
    Text,
}

impl MediaData {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            MediaData::Buffer(bytes) => bytes,
            MediaData::Text(text) => text.as_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            MediaData::Buffer(bytes) => bytes,
            MediaData::Text(text) => text.into_bytes(),
        }
    }

    /// Text view of the payload. Bytes that are not UTF-8 are replaced.
    pub fn into_text(self) -> String {
        match self {
            MediaData::Text(text) => text,
            MediaData::Buffer(bytes) => String::from_utf8(bytes).unwrap_or_else(|e| {
                warn!("Payload is not valid UTF-8, replacing invalid sequences");
                String::from_utf8_lossy(e.as_bytes()).into_owned()
            }),
        }
    }

    pub fn coerce(self, representation: Representation) -> Self {
        match (representation, self) {
            (Representation::Buffer, MediaData::Text(text)) => MediaData::Buffer(text.into_bytes()),
            (Representation::Text, data @ MediaData::Buffer(_)) => MediaData::Text(data.into_text()),
            (_, data) => data,
        }
    }
}

impl From<Vec<u8>> for MediaData {
    fn from(bytes: Vec<u8>) -> Self {
        MediaData::Buffer(bytes)
    }
}

impl From<&[u8]> for MediaData {
    fn from(bytes: &[u8]) -> Self {
        MediaData::Buffer(bytes.to_vec())
    }
}

impl From<String> for MediaData {
    fn from(text: String) -> Self {
        MediaData::Text(text)
    }
}

impl From<&str> for MediaData {
    fn from(text: &str) -> Self {
        MediaData::Text(text.to_string())
    }
}

pub type DataProducer = Arc<dyn Fn() -> BoxFuture<'static, Result<MediaData>> + Send + Sync>;

#[derive(Clone)]
enum MediaSource {
    Data(MediaData),
    Producer(DataProducer),
    Reference {
        reference: MediaReference,
        registry: Arc<dyn CapabilityRegistry>,
    },
}

#[derive(Clone)]
pub struct MediaObject {
    mime_type: MimeType,
    source: MediaSource,
    properties: HashMap<String, Value>,
}

impl MediaObject {
    pub fn new<D: Into<MediaData>>(data: D, mime_type: MimeType) -> Self {
        Self::with_source(mime_type, MediaSource::Data(data.into()))
    }

    pub fn from_producer<F, Fut>(mime_type: MimeType, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<MediaData>> + Send + 'static,
    {
        let producer: DataProducer = Arc::new(move || f().boxed());
        Self::with_source(mime_type, MediaSource::Producer(producer))
    }

    /// An engine recipe rather than media bytes.
    pub fn from_ffmpeg_input(input: &FFmpegInput) -> Result<Self> {
        let json = serde_json::to_vec(input)?;
        Ok(Self::new(json, MimeType::from_static(mime::FFMPEG_INPUT)))
    }

    /// A media object standing for a device capability named by `locator`.
    ///
    /// Fails right away when the locator is malformed or names a capability
    /// this broker does not know; the device itself is only contacted when
    /// the data is retrieved.
    pub fn from_reference(locator: &str, registry: Arc<dyn CapabilityRegistry>) -> Result<Self> {
        let reference = MediaReference::parse(locator)?
            .ok_or_else(|| BrokerError::UnrecognizedMediaReference(locator.to_string()))?;
        let mime_type = reference.capability().produced_type();

        Ok(Self::with_source(
            mime_type,
            MediaSource::Reference {
                reference,
                registry,
            },
        ))
    }

    fn with_source(mime_type: MimeType, source: MediaSource) -> Self {
        Self {
            mime_type,
            source,
            properties: HashMap::new(),
        }
    }

    pub fn mime_type(&self) -> &MimeType {
        &self.mime_type
    }

    pub fn get_data(&self) -> BoxFuture<'_, Result<MediaData>> {
        async move {
            match &self.source {
                MediaSource::Data(data) => Ok(data.clone()),
                MediaSource::Producer(producer) => producer().await,
                MediaSource::Reference {
                    reference,
                    registry,
                } => {
                    debug!("Dispatching media reference {}", reference);
                    let media = reference.fetch(registry.as_ref()).await?;
                    // The declared type was fixed at construction.
                    if !mime::accepts(&self.mime_type, media.mime_type()) {
                        warn!(
                            "Device returned {} for {}, expected {}",
                            media.mime_type(),
                            reference,
                            self.mime_type
                        );
                        return Err(BrokerError::MediaTypeMismatch {
                            origin: reference.to_string(),
                            expected: self.mime_type.clone(),
                            actual: media.mime_type().clone(),
                        });
                    }
                    media.get_data().await
                }
            }
        }
        .boxed()
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set_property<K: Into<String>, V: Into<Value>>(&mut self, key: K, value: V) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn properties(&self) -> &HashMap<String, Value> {
        &self.properties
    }
}

impl fmt::Debug for MediaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            MediaSource::Data(data) => format!("{} bytes", data.len()),
            MediaSource::Producer(_) => "producer".to_string(),
            MediaSource::Reference { reference, .. } => reference.to_string(),
        };
        f.debug_struct("MediaObject")
            .field("mime_type", &self.mime_type.to_string())
            .field("source", &source)
            .field("properties", &self.properties)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_coercion_between_representations() {
        let text = MediaData::from("héllo");
        let bytes = text.clone().coerce(Representation::Buffer);
        assert_eq!(bytes, MediaData::Buffer("héllo".as_bytes().to_vec()));
        assert_eq!(bytes.coerce(Representation::Text), text);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let data = MediaData::Buffer(vec![0x66, 0xFF, 0x6F]);
        assert_eq!(data.into_text(), "f\u{FFFD}o");
    }

    #[tokio::test]
    async fn test_literal_payload() {
        let media = MediaObject::new("hello", MimeType::parse("text/plain").unwrap());
        assert_eq!(media.get_data().await.unwrap(), MediaData::Text("hello".into()));
        assert_eq!(media.mime_type().to_string(), "text/plain");
    }

    #[tokio::test]
    async fn test_producer_runs_per_retrieval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let media = MediaObject::from_producer(MimeType::parse("image/jpeg").unwrap(), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(MediaData::Buffer(vec![n as u8])) }
        });

        assert_eq!(media.get_data().await.unwrap(), MediaData::Buffer(vec![0]));
        assert_eq!(media.get_data().await.unwrap(), MediaData::Buffer(vec![1]));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ffmpeg_input_object() {
        let media = MediaObject::from_ffmpeg_input(&FFmpegInput::from_url("rtsp://cam")).unwrap();
        assert_eq!(media.mime_type().to_string(), mime::FFMPEG_INPUT);

        let data = media.get_data().await.unwrap();
        let parsed: FFmpegInput = serde_json::from_slice(data.as_bytes()).unwrap();
        assert_eq!(parsed.input_arguments, vec!["-i", "rtsp://cam"]);
    }

    #[test]
    fn test_properties() {
        let mut media = MediaObject::new(vec![1u8], MimeType::parse("image/png").unwrap());
        media.set_property("width", 640);
        media.set_property("source", "front door");
        assert_eq!(media.property("width"), Some(&Value::from(640)));
        assert!(media.property("height").is_none());
        assert_eq!(media.properties().len(), 2);

        let copy = media.clone();
        assert_eq!(copy.properties(), media.properties());
    }
}
