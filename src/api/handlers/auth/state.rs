//! Shared state handed to handlers via `Extension`.

use crate::config::AuthConfig;
use crate::flow::{FlowController, SessionGuard};

pub struct GatewayState {
    flow: FlowController,
    guard: SessionGuard,
}

impl GatewayState {
    #[must_use]
    pub fn new(flow: FlowController, guard: SessionGuard) -> Self {
        Self { flow, guard }
    }

    #[must_use]
    pub fn flow(&self) -> &FlowController {
        &self.flow
    }

    #[must_use]
    pub fn guard(&self) -> &SessionGuard {
        &self.guard
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        self.flow.config()
    }
}
