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

//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use msgbridge::{Bridge, BridgeConfig, FixedInterval, MemoryNetwork};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Probe interval used by every test bridge.
pub const PROBE_INTERVAL: Duration = Duration::from_millis(10);

/// Installs a test-writer subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration with short deadlines suitable for tests.
pub fn test_config(identity: &str) -> BridgeConfig {
    BridgeConfig::new()
        .with_identity(identity)
        .with_request_timeout(Duration::from_secs(2))
        .with_connect_timeout(Duration::from_secs(2))
        .with_probe_strategy(Arc::new(FixedInterval::new(PROBE_INTERVAL)))
}

/// Joins a top-level context and starts its bridge.
pub fn host(network: &MemoryNetwork, name: &str) -> Bridge {
    let (transport, inbound) = network.join(name);
    let bridge = Bridge::new(test_config(name), transport);
    bridge.start(inbound);
    bridge
}

/// Joins an embedded child of `parent` and starts its bridge.
pub fn child(network: &MemoryNetwork, name: &str, parent: &str) -> Bridge {
    let (transport, inbound) = network.join_child(name, parent);
    let bridge = Bridge::new(test_config(name), transport);
    bridge.start(inbound);
    bridge
}

/// A host with the named children attached.
pub struct Family {
    pub network: MemoryNetwork,
    pub host: Bridge,
    pub children: Vec<Bridge>,
}

impl Family {
    pub fn new(children: &[&str]) -> Self {
        init_tracing();
        let network = MemoryNetwork::new();
        let host = host(&network, "host");
        let children = children
            .iter()
            .map(|name| child(&network, name, "host"))
            .collect();
        Self {
            network,
            host,
            children,
        }
    }

    pub fn child(&self, name: &str) -> &Bridge {
        self.children
            .iter()
            .find(|bridge| bridge.identity() == name)
            .expect("no such child")
    }
}
