//! # Status Display Module
//!
//! Fire-and-forget presentation sink for the short operator-facing status
//! lines the pipeline emits at phase boundaries ("reading inbox",
//! "delivered +62811…", "waiting"). The physical display is an external
//! collaborator; this module only guarantees the contract the pipeline
//! needs: `show` never fails and never propagates anything back.
//!
//! The default sink mirrors status lines into the log. Deployments with a
//! panel wire their own [`StatusSink`] implementation in.

use log::info;

/// Anything that can present a one-line status to an operator.
///
/// Implementations must swallow their own failures — a dead display must
/// never stall message delivery.
pub trait StatusSink {
    fn show(&mut self, text: &str);
}

/// Default sink: status lines go to the log at info level.
#[derive(Debug, Default)]
pub struct LogDisplay;

impl StatusSink for LogDisplay {
    fn show(&mut self, text: &str) {
        info!("[status] {}", text);
    }
}

/// Sink that discards everything. Used when the display is disabled.
#[derive(Debug, Default)]
pub struct NullDisplay;

impl StatusSink for NullDisplay {
    fn show(&mut self, _text: &str) {}
}
