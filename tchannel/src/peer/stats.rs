//
// Copyright 2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Connection counters.

use std::collections::BTreeMap;

/// Stat key for established inbound connections.
pub const CONNECTIONS_IN: &str = "connections.in";

/// Stat key for established outbound connections.
pub const CONNECTIONS_OUT: &str = "connections.out";

/// Established connections per direction, summed over every peer.
///
/// # Example
///
/// ```rust
/// use tchannel::peer::ConnectionStats;
///
/// let stats = ConnectionStats { connections_in: 1, connections_out: 0 };
/// assert_eq!(stats.get("connections.in"), Some(1));
/// assert_eq!(stats.get("connections.out"), Some(0));
/// assert_eq!(stats.get("connections.total"), None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionStats {
    /// Established connections accepted by our listener.
    #[cfg_attr(feature = "serde", serde(rename = "connections.in"))]
    pub connections_in: usize,
    /// Established connections we opened.
    #[cfg_attr(feature = "serde", serde(rename = "connections.out"))]
    pub connections_out: usize,
}

impl ConnectionStats {
    /// Looks a counter up by its stat key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<usize> {
        match key {
            CONNECTIONS_IN => Some(self.connections_in),
            CONNECTIONS_OUT => Some(self.connections_out),
            _ => None,
        }
    }

    /// The counters keyed by stat name.
    #[must_use]
    pub fn as_map(&self) -> BTreeMap<&'static str, usize> {
        BTreeMap::from([
            (CONNECTIONS_IN, self.connections_in),
            (CONNECTIONS_OUT, self.connections_out),
        ])
    }

    /// Returns `true` when no connection is established.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.connections_in == 0 && self.connections_out == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_keys() {
        let stats = ConnectionStats {
            connections_in: 2,
            connections_out: 3,
        };
        let map = stats.as_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["connections.in"], 2);
        assert_eq!(map["connections.out"], 3);
        assert!(!stats.is_zero());
        assert!(ConnectionStats::default().is_zero());
    }
}
