//! Callback contract for registered sources.

use crate::core::error::AppResult;

/// Work attached to an event source.
///
/// The handler value is the source's context: the dispatcher holds a shared
/// reference to it and never inspects it. `exec` runs synchronously on a
/// dispatch thread once per readiness event, after the notification has been
/// drained and an execution ticket acquired.
///
/// # Example
///
/// ```rust,ignore
/// use prometheus_dispatch::core::EventHandler;
///
/// struct Flush {
///     pending: parking_lot::Mutex<Vec<Vec<u8>>>,
/// }
///
/// impl EventHandler for Flush {
///     fn exec(&self) {
///         for record in self.pending.lock().drain(..) {
///             write_out(record);
///         }
///     }
///
///     fn accepts_payloads(&self) -> bool {
///         true
///     }
///
///     fn enqueue(&self, payload: Vec<u8>) -> AppResult<()> {
///         self.pending.lock().push(payload);
///         Ok(())
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync + 'static {
    /// Run the source's work. Failures are the handler's own business.
    fn exec(&self);

    /// Whether `enqueue` is implemented. Only counter sources use payloads.
    fn accepts_payloads(&self) -> bool {
        false
    }

    /// Store a payload for a later `exec` to consume.
    ///
    /// # Errors
    ///
    /// Whatever the handler reports; the dispatcher returns it unchanged.
    fn enqueue(&self, payload: Vec<u8>) -> AppResult<()> {
        let _ = payload;
        Err(anyhow::anyhow!("handler does not accept payloads"))
    }
}

impl<F> EventHandler for F
where
    F: Fn() + Send + Sync + 'static,
{
    fn exec(&self) {
        self();
    }
}
