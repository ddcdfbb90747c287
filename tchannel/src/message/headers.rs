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

//! Transport headers carried alongside a call's arguments.

use std::collections::BTreeMap;

/// Small string map sent in the call metadata, separate from the
/// application header argument.
pub type TransportHeaders = BTreeMap<String, String>;

/// Name of the calling service.
pub const CALLER_NAME: &str = "cn";

/// Argument scheme, e.g. `raw` or `json`.
pub const ARG_SCHEME: &str = "as";

/// Argument scheme used when a request does not name one.
pub const RAW_SCHEME: &str = "raw";

/// Maximum length of a transport header key or value in bytes.
pub const MAX_HEADER_LEN: usize = u8::MAX as usize;

/// Maximum number of transport headers on one call.
pub const MAX_HEADERS: usize = u8::MAX as usize;
