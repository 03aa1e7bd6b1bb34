pub mod sound;

pub use sound::{FilePlayer, MutedPlayer, SoundPlayer, TerminalBell};
