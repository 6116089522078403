//! Commands flowing from input lines to their targets.
//!
//! A clean press/release cycle on a line becomes one [`LogicalActivation`];
//! the [`CommandDispatcher`](super::dispatcher::CommandDispatcher) turns
//! that into an [`OnOffCommand`] for the bound peers or the local light.

use crate::events::SwitchFunction;

/// One debounced press/release cycle on a monitored line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalActivation {
    pub function: SwitchFunction,
}

/// On/Off cluster commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnOffCommand {
    On,
    Off,
    Toggle,
}

impl OnOffCommand {
    /// Apply this command to a boolean light state.
    pub fn resolve(self, current: bool) -> bool {
        match self {
            Self::On => true,
            Self::Off => false,
            Self::Toggle => !current,
        }
    }
}

impl SwitchFunction {
    /// The On/Off cluster command for this function, if it has one.
    /// Level and colour functions are reserved and map to `None`.
    pub fn on_off_command(self) -> Option<OnOffCommand> {
        match self {
            Self::On => Some(OnOffCommand::On),
            Self::Off => Some(OnOffCommand::Off),
            Self::Toggle => Some(OnOffCommand::Toggle),
            Self::LevelUp | Self::LevelDown | Self::LevelCycle | Self::Color => None,
        }
    }
}
