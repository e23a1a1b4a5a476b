//! Channel identity: station, component, network and location codes.
//!
//! Identities travel through the crate as structured values. Only file
//! headers and legacy string keys need a delimited string form, and each
//! format has its own: SEED and SAC join with `$`, Seisan joins with `_`.

use std::fmt;

use crate::filetype::FileType;

/// Identifies one waveform stream within a file.
///
/// All four codes are optional. Blank codes are stored as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelIdentity {
    pub station: Option<String>,
    pub component: Option<String>,
    pub network: Option<String>,
    pub location: Option<String>,
}

impl ChannelIdentity {
    /// Create an identity from station, component, network and location codes.
    pub fn new(station: &str, component: &str, network: &str, location: &str) -> Self {
        ChannelIdentityBuilder::new()
            .station(station)
            .component(component)
            .network(network)
            .location(location)
            .build()
    }

    /// An identity holding only a name, used for formats without channel codes.
    pub fn named(name: &str) -> Self {
        ChannelIdentityBuilder::new().station(name).build()
    }

    pub fn builder() -> ChannelIdentityBuilder {
        ChannelIdentityBuilder::new()
    }

    pub fn station(&self) -> &str {
        self.station.as_deref().unwrap_or("")
    }

    pub fn component(&self) -> &str {
        self.component.as_deref().unwrap_or("")
    }

    pub fn network(&self) -> &str {
        self.network.as_deref().unwrap_or("")
    }

    pub fn location(&self) -> &str {
        self.location.as_deref().unwrap_or("")
    }

    /// Join as `station<d>component<d>network[<d>location]`.
    pub fn join(&self, delimiter: char) -> String {
        let mut key = format!(
            "{}{delimiter}{}{delimiter}{}",
            self.station(),
            self.component(),
            self.network()
        );
        if let Some(loc) = &self.location {
            key.push(delimiter);
            key.push_str(loc);
        }
        key
    }

    /// The string key a given file format uses for this channel.
    pub fn key_for(&self, file_type: FileType) -> String {
        match file_type {
            FileType::Seisan => self.join('_'),
            FileType::Text => self.station().to_string(),
            FileType::Sac | FileType::Seed | FileType::Unknown => self.join('$'),
        }
    }

    /// Decompose a legacy string key.
    ///
    /// Delimiters are tried in the order `$`, `_`, space. The first one that
    /// yields at least station, component and network wins; otherwise the
    /// space split is used as-is.
    pub fn from_key(key: &str) -> Self {
        let mut parts: Vec<&str> = Vec::new();
        for delimiter in ['$', '_', ' '] {
            parts = key.split(delimiter).collect();
            if parts.len() >= 3 {
                break;
            }
        }
        let part = |i: usize| parts.get(i).copied().unwrap_or("");
        Self::new(part(0), part(1), part(2), part(3))
    }
}

impl fmt::Display for ChannelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join('$'))
    }
}

/// Accumulates channel codes while a header is parsed.
///
/// Each header gets its own builder, so codes found in one channel header
/// never leak into the next.
#[derive(Debug, Default)]
pub struct ChannelIdentityBuilder {
    station: Option<String>,
    component: Option<String>,
    network: Option<String>,
    location: Option<String>,
}

fn normalize(code: &str) -> Option<String> {
    let trimmed = code.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl ChannelIdentityBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn station(mut self, code: &str) -> Self {
        self.station = normalize(code);
        self
    }

    pub fn component(mut self, code: &str) -> Self {
        self.component = normalize(code);
        self
    }

    pub fn network(mut self, code: &str) -> Self {
        self.network = normalize(code);
        self
    }

    pub fn location(mut self, code: &str) -> Self {
        self.location = normalize(code);
        self
    }

    pub fn build(self) -> ChannelIdentity {
        ChannelIdentity {
            station: self.station,
            component: self.component,
            network: self.network,
            location: self.location,
        }
    }
}
