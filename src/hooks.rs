/// The external collaborator notified of server-side client registry transitions.
pub trait ServerHooks: Send + Sync {
    /// Called after a client is inserted into the registry (fresh join or re-join).
    fn on_register(&self, client_id: u32);

    /// Called after a client is removed from the registry (timeout, explicit unregister, or
    /// `LeaveRequest`).
    fn on_unregister(&self, client_id: u32);
}

/// A [`ServerHooks`] that only emits `tracing` events; the default when no application-level
/// hook is configured.
#[derive(Default)]
pub struct TracingServerHooks;

impl ServerHooks for TracingServerHooks {
    fn on_register(&self, client_id: u32) {
        tracing::info!(client_id, "client registered");
    }

    fn on_unregister(&self, client_id: u32) {
        tracing::info!(client_id, "client unregistered");
    }
}
