use std::net::IpAddr;

use uuid::Uuid;

/// Per-request identity passed explicitly into every service call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: Uuid,
    pub client_ip: Option<IpAddr>,
}

impl RequestContext {
    pub fn new(client_ip: Option<IpAddr>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            client_ip,
        }
    }

    /// Context for work that did not arrive over HTTP (CLI, startup tasks).
    pub fn detached() -> Self {
        Self::new(None)
    }
}
