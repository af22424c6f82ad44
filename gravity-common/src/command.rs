use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A user command injected into the run loop between ticks.
///
/// These replace raw key codes: whatever front end is driving the loop
/// (scripted schedule, terminal, window) translates its input into one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Command {
    ZoomIn,
    ZoomOut,
    /// Show or hide orbit traces (frames are not cleared while shown).
    ToggleTrails,
    Pause,
    Quit,
    /// Export the trail grid as a PNG.
    Save,
    /// Reinitialize the whole simulation from its configuration.
    Reset,
    /// Double the timestep.
    SpeedUp,
    /// Halve the timestep.
    SpeedDown,
}

impl Command {
    pub const ALL: [Command; 9] = [
        Command::ZoomIn,
        Command::ZoomOut,
        Command::ToggleTrails,
        Command::Pause,
        Command::Quit,
        Command::Save,
        Command::Reset,
        Command::SpeedUp,
        Command::SpeedDown,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::ZoomIn => "zoom-in",
            Command::ZoomOut => "zoom-out",
            Command::ToggleTrails => "toggle-trails",
            Command::Pause => "pause",
            Command::Quit => "quit",
            Command::Save => "save",
            Command::Reset => "reset",
            Command::SpeedUp => "speed-up",
            Command::SpeedDown => "speed-down",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .iter()
            .copied()
            .find(|c| c.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("Unknown command '{}'", s))
    }
}

/// A command scheduled to fire at a given loop frame.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct ScheduledCommand {
    pub frame: u64,
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_command_name() {
        for command in Command::ALL {
            assert_eq!(command.name().parse::<Command>().unwrap(), command);
        }
        assert_eq!("Speed-Up".parse::<Command>().unwrap(), Command::SpeedUp);
        assert!("warp".parse::<Command>().is_err());
    }
}
