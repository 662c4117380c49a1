//! Devices that can hand out media on request, and the self-describing
//! references pointing at them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::error::{BrokerError, Result};
use crate::media::MediaObject;
use crate::mime::{self, MimeType};

/// Scheme of locators that name a device capability instead of a resource.
pub const MEDIA_SCHEME: &str = "scrypted-media://";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Live video stream, handed out as an engine input descriptor
    VideoCamera,
    /// Still picture
    Camera,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::VideoCamera => "VideoCamera",
            Capability::Camera => "Camera",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "VideoCamera" => Some(Capability::VideoCamera),
            "Camera" => Some(Capability::Camera),
            _ => None,
        }
    }

    /// The type of media a device hands out for this capability.
    pub fn produced_type(&self) -> MimeType {
        match self {
            Capability::VideoCamera => MimeType::from_static(mime::FFMPEG_INPUT),
            Capability::Camera => MimeType::from_static("image/jpeg"),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaDevice: Send + Sync {
    /// Capabilities this device advertises
    fn capabilities(&self) -> Vec<Capability>;

    async fn fetch(&self, capability: Capability) -> Result<MediaObject>;
}

#[cfg_attr(test, mockall::automock)]
pub trait CapabilityRegistry: Send + Sync {
    fn device(&self, id: &str) -> Option<Arc<dyn MediaDevice>>;
}

/// In-memory device table
#[derive(Default)]
pub struct DeviceTable {
    devices: RwLock<HashMap<String, Arc<dyn MediaDevice>>>,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert<S: Into<String>>(&self, id: S, device: Arc<dyn MediaDevice>) {
        self.devices
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id.into(), device);
    }

    pub fn remove(&self, id: &str) -> bool {
        self.devices
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(id)
            .is_some()
    }
}

impl CapabilityRegistry for DeviceTable {
    fn device(&self, id: &str) -> Option<Arc<dyn MediaDevice>> {
        self.devices
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned()
    }
}

/// A parsed `scrypted-media://<device>/<Capability>` locator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaReference {
    device_id: String,
    capability: Capability,
}

impl MediaReference {
    /// Returns `Ok(None)` when `locator` does not use the media scheme.
    pub fn parse(locator: &str) -> Result<Option<Self>> {
        let Some(rest) = locator.strip_prefix(MEDIA_SCHEME) else {
            return Ok(None);
        };
        let unrecognized = || BrokerError::UnrecognizedMediaReference(locator.to_string());

        let (device_id, path) = rest.split_once('/').ok_or_else(unrecognized)?;
        if device_id.is_empty() {
            return Err(unrecognized());
        }
        let name = path.split('/').next().unwrap_or_default();
        let capability = Capability::from_name(name).ok_or_else(unrecognized)?;

        Ok(Some(Self {
            device_id: device_id.to_string(),
            capability,
        }))
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub async fn fetch(&self, registry: &dyn CapabilityRegistry) -> Result<MediaObject> {
        let device = registry
            .device(&self.device_id)
            .ok_or_else(|| BrokerError::DeviceNotFound(self.device_id.clone()))?;

        if !device.capabilities().contains(&self.capability) {
            return Err(BrokerError::CapabilityUnsupported {
                device: self.device_id.clone(),
                capability: self.capability.to_string(),
            });
        }

        device.fetch(self.capability).await
    }
}

impl fmt::Display for MediaReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", MEDIA_SCHEME, self.device_id, self.capability)
    }
}
