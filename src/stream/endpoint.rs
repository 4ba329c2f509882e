//! Ordered fallback list of stream URIs

use std::sync::Arc;
use url::Url;

use crate::error::ConfigError;
use crate::platform::EndpointOrder;

/// Candidate sources for the same live stream, highest preference first.
///
/// Never empty and never mutated once built. Clones share the same list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEndpoint {
    uris: Arc<[Url]>,
}

impl StreamEndpoint {
    /// Build from already-parsed URIs
    pub fn new(uris: Vec<Url>) -> Result<Self, ConfigError> {
        if uris.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }
        Ok(Self { uris: uris.into() })
    }

    /// Parse and validate a list of URI strings
    pub fn parse<I, S>(uris: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = uris
            .into_iter()
            .map(|raw| {
                let raw = raw.as_ref();
                let url = Url::parse(raw).map_err(|e| ConfigError::InvalidEndpoint {
                    uri: raw.to_string(),
                    reason: e.to_string(),
                })?;
                match url.scheme() {
                    "http" | "https" => Ok(url),
                    other => Err(ConfigError::InvalidEndpoint {
                        uri: raw.to_string(),
                        reason: format!("unsupported scheme '{}'", other),
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(parsed)
    }

    /// Apply a platform ordering preference, producing a new list
    pub fn ordered(&self, order: EndpointOrder) -> Self {
        match order {
            EndpointOrder::AsListed => self.clone(),
            EndpointOrder::MirrorsFirst => {
                let mut uris = self.uris.to_vec();
                uris.rotate_left(1);
                Self { uris: uris.into() }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    /// Always false; kept for API symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Url> {
        self.uris.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Url> {
        self.uris.iter()
    }

    /// Whether `index` is the last entry
    pub fn is_last(&self, index: usize) -> bool {
        index + 1 >= self.uris.len()
    }
}
