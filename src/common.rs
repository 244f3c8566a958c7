//! Constants shared with the rest of the controller.

/// Environment variable carrying this controller node's IP address.
pub const NODE_IP_KEY: &str = "NODE_IP";

/// Organization every deployment starts with.
pub const DEFAULT_ORG_ID: i32 = 1;

/// `domain.type` value for Kubernetes domains.
pub const DOMAIN_TYPE_KUBERNETES: i32 = 11;

/// `controller.state` value for a controller in exception state.
pub const CONTROLLER_STATE_EXCEPTION: i32 = 4;

/// IP of this controller node; empty when `NODE_IP` is unset.
pub fn node_ip() -> String {
    std::env::var(NODE_IP_KEY).unwrap_or_default()
}
