use std::sync::Arc;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use crate::capability::{CapabilityRegistry, MediaReference};
use crate::config::Config;
use crate::converter::{builtin_converters, Converter, ConverterId, ConverterRegistry};
use crate::engine::FFmpegInput;
use crate::error::Result;
use crate::executor::ConversionExecutor;
use crate::media::{MediaData, MediaObject};
use crate::mime::{self, MimeType};
use crate::resolver::{ConversionChain, PathResolver};

/// Entry point of the broker: owns the converter set and runs conversions.
pub struct MediaManager {
    config: Config,
    registry: ConverterRegistry,
    resolver: PathResolver,
    executor: ConversionExecutor,
    capabilities: Arc<dyn CapabilityRegistry>,
}

impl MediaManager {
    /// A broker with the builtin converters installed.
    ///
    /// The engine binary path is resolved here, once, when not configured.
    pub fn new(config: Config, capabilities: Arc<dyn CapabilityRegistry>) -> Result<Self> {
        let manager = Self::without_builtins(config, capabilities)?;
        for converter in builtin_converters(&manager.config.engine) {
            manager.registry.add_builtin(converter);
        }
        Ok(manager)
    }

    /// A broker whose converters are only the ones registered later.
    pub fn without_builtins(
        mut config: Config,
        capabilities: Arc<dyn CapabilityRegistry>,
    ) -> Result<Self> {
        config.validate()?;
        config.engine.resolve();

        Ok(Self {
            resolver: PathResolver::new(config.resolver.max_depth),
            executor: ConversionExecutor::new(),
            registry: ConverterRegistry::new(),
            config,
            capabilities,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine_path(&self) -> &str {
        &self.config.engine.binary_path
    }

    pub fn register_converter(&self, converter: Arc<dyn Converter>) -> ConverterId {
        self.registry.register(converter)
    }

    pub fn unregister_converter(&self, id: ConverterId) -> bool {
        self.registry.unregister(id)
    }

    /// The active converters in resolution order
    pub fn converters(&self) -> Vec<Arc<dyn Converter>> {
        self.registry.snapshot()
    }

    /// Resolve without executing, against the current converter set.
    pub fn plan(&self, from: &MimeType, to: &MimeType) -> Result<ConversionChain> {
        self.resolver.resolve(&self.registry.snapshot(), from, to)
    }

    pub async fn convert(&self, media: &MediaObject, to: &MimeType) -> Result<MediaObject> {
        let span = info_span!(
            "convert",
            request = %Uuid::new_v4(),
            from = %media.mime_type(),
            to = %to
        );

        self.run_conversion(media, to).instrument(span).await
    }

    async fn run_conversion(&self, media: &MediaObject, to: &MimeType) -> Result<MediaObject> {
        let converters = self.registry.snapshot();
        let chain = self.resolver.resolve(&converters, media.mime_type(), to)?;
        if chain.is_empty() {
            return Ok(media.clone());
        }

        let data = media.get_data().await?;
        let (data, mime_type) = self
            .executor
            .execute(&chain, data, media.mime_type().clone())
            .await?;

        info!("Converted via {} step(s) into {}", chain.len(), mime_type);
        Ok(MediaObject::new(data, mime_type))
    }

    pub async fn convert_data<D: Into<MediaData>>(
        &self,
        data: D,
        from: MimeType,
        to: &MimeType,
    ) -> Result<MediaObject> {
        self.convert(&MediaObject::new(data, from), to).await
    }

    pub async fn convert_to_buffer(&self, media: &MediaObject, to: &MimeType) -> Result<Vec<u8>> {
        let converted = self.convert(media, to).await?;
        Ok(converted.get_data().await?.into_bytes())
    }

    /// Convert to `to`, then turn the result into a URL
    pub async fn convert_to_url(&self, media: &MediaObject, to: &MimeType) -> Result<String> {
        self.convert_to_locator(media, to, mime::URL).await
    }

    pub async fn convert_to_local_url(&self, media: &MediaObject, to: &MimeType) -> Result<String> {
        self.convert_to_locator(media, to, mime::LOCAL_URL).await
    }

    pub async fn convert_to_insecure_local_url(
        &self,
        media: &MediaObject,
        to: &MimeType,
    ) -> Result<String> {
        self.convert_to_locator(media, to, mime::INSECURE_LOCAL_URL)
            .await
    }

    async fn convert_to_locator(
        &self,
        media: &MediaObject,
        to: &MimeType,
        locator_type: &'static str,
    ) -> Result<String> {
        let intermediate = self.convert(media, to).await?;
        let url = self
            .convert(&intermediate, &MimeType::from_static(locator_type))
            .await?;
        Ok(url.get_data().await?.into_text())
    }

    pub fn create_media_object<D: Into<MediaData>>(&self, data: D, mime_type: MimeType) -> MediaObject {
        MediaObject::new(data, mime_type)
    }

    pub fn create_ffmpeg_media_object(&self, input: &FFmpegInput) -> Result<MediaObject> {
        MediaObject::from_ffmpeg_input(input)
    }

    /// A media reference locator becomes a device-backed object; anything
    /// else is kept as a URL value of `mime_type` (default: the Url type).
    pub fn create_media_object_from_url(
        &self,
        url: &str,
        mime_type: Option<MimeType>,
    ) -> Result<MediaObject> {
        if MediaReference::parse(url)?.is_some() {
            return MediaObject::from_reference(url, self.capabilities.clone());
        }
        let mime_type = mime_type.unwrap_or_else(|| MimeType::from_static(mime::URL));
        Ok(MediaObject::new(url, mime_type))
    }

    /// Wrap a path or URL string, guessing its type from the extension.
    pub fn ensure_media_object(&self, path_or_url: &str) -> MediaObject {
        MediaObject::new(path_or_url, self.guess_mime_type(path_or_url))
    }

    /// Type implied by the extension of `path_or_url`, `application/octet-stream`
    /// when there is none.
    pub fn guess_mime_type(&self, path_or_url: &str) -> MimeType {
        let guessed = mime_guess::from_path(path_or_url).first_or_octet_stream();
        let mime_type = MimeType::parse(guessed.essence_str())
            .unwrap_or_else(|_| MimeType::from_static("application/octet-stream"));
        debug!("Guessed {} for {}", mime_type, path_or_url);
        mime_type
    }
}
