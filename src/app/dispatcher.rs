//! Command dispatcher: activation in, on/off command out.
//!
//! Fire-and-forget.  A failed command is reported and dropped; the
//! stack behind the target does its own retries.

use log::{debug, warn};

use super::commands::{LogicalActivation, OnOffCommand};
use super::events::AppEvent;
use super::ports::{EventSink, OnOffTarget};

/// What the dispatcher did with one activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Sent(OnOffCommand),
    Failed(OnOffCommand),
    /// The function is reserved; nothing was sent.
    Unsupported,
}

/// Maps activations onto an [`OnOffTarget`].
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    sent: u32,
    failed: u32,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(
        &mut self,
        activation: LogicalActivation,
        target: &mut impl OnOffTarget,
        sink: &mut impl EventSink,
    ) -> Dispatch {
        let function = activation.function;
        let Some(command) = function.on_off_command() else {
            debug!("Dispatcher: {function:?} is reserved");
            sink.emit(&AppEvent::CommandUnsupported(function));
            return Dispatch::Unsupported;
        };

        match target.apply(command) {
            Ok(()) => {
                self.sent = self.sent.wrapping_add(1);
                sink.emit(&AppEvent::CommandSent { function, command });
                Dispatch::Sent(command)
            }
            Err(error) => {
                self.failed = self.failed.wrapping_add(1);
                warn!("Dispatcher: {command:?} failed: {error}");
                sink.emit(&AppEvent::CommandFailed { command, error });
                Dispatch::Failed(command)
            }
        }
    }

    /// Commands accepted by their target since boot.
    pub fn sent(&self) -> u32 {
        self.sent
    }

    /// Commands rejected by their target since boot.
    pub fn failed(&self) -> u32 {
        self.failed
    }
}
