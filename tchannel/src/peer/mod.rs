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

//! Peers and the connections held to them.
//!
//! A [`Peer`] is one remote process keyed by its listening address. The
//! [`PeerManager`] creates peers on demand, routes calls onto their
//! connections and reports [`ConnectionStats`].

mod manager;
mod peer;
mod stats;

pub use self::manager::PeerManager;
pub use self::peer::Peer;
pub use self::stats::{ConnectionStats, CONNECTIONS_IN, CONNECTIONS_OUT};
