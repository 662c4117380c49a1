use tracing::{debug, warn};

use crate::error::{BrokerError, Result};
use crate::media::MediaData;
use crate::mime::{accepts, MimeType};
use crate::resolver::{ChainStep, ConversionChain};

/// Runs resolved chains against live payloads
#[derive(Debug, Clone, Default)]
pub struct ConversionExecutor;

impl ConversionExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Feed `data` through every step of `chain`.
    ///
    /// Each step receives the previous step's payload and type. The type the
    /// converter reports becomes the current type; a converter that only
    /// echoes a wildcard pattern gets the step's resolved type instead, and
    /// one that leaves no concrete type at all fails the step. The first
    /// failing step aborts the chain and is reported with its position.
    pub async fn execute(
        &self,
        chain: &ConversionChain,
        data: MediaData,
        mime_type: MimeType,
    ) -> Result<(MediaData, MimeType)> {
        let mut data = data;
        let mut current = mime_type;

        for (position, step) in chain.steps().iter().enumerate() {
            let converter = step.converter.as_ref();
            let input = data.coerce(converter.input_representation());

            debug!(
                "Step {}: {} ({} -> {}), {} bytes in",
                position,
                converter.name(),
                current,
                step.to,
                input.len()
            );

            let result = converter
                .convert(input, &current)
                .await
                .and_then(|(output, produced)| {
                    concrete_output(step, produced).map(|mime_type| (output, mime_type))
                });

            (data, current) = match result {
                Ok(output) => output,
                Err(e) => {
                    warn!("Step {} ({}) failed: {}", position, converter.name(), e);
                    return Err(BrokerError::ConversionStepFailed {
                        index: position,
                        from: step.from.clone(),
                        to: step.to.clone(),
                        source: Box::new(e),
                    });
                }
            };
        }

        Ok((data, current))
    }
}

fn concrete_output(step: &ChainStep, produced: MimeType) -> Result<MimeType> {
    if !produced.is_wildcard() {
        if !accepts(&step.to, &produced) {
            warn!(
                "{} produced {}, planned {}",
                step.converter.name(),
                produced,
                step.to
            );
        }
        return Ok(produced);
    }
    if !step.to.is_wildcard() {
        return Ok(step.to.clone());
    }
    Err(BrokerError::Converter(format!(
        "{} did not report a concrete output type for {}",
        step.converter.name(),
        step.to
    )))
}
