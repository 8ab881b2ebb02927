//! Script-driven multiplayer scoreboard overlay.
//!
//! A [`board::Scoreboard`] is created once per game session by parsing a
//! scoreboard script ([`board::Scoreboard::load`]), then driven every
//! frame: `refresh` recomputes content, usability, player ranking and
//! layout, and `render` walks the board handing resolved coordinates to
//! the host renderer. Everything the board needs from the outside world
//! arrives through traits:
//!
//! - [`scan::ScriptScanner`] — the script tokenizer
//! - [`game::GameModel`] — the read-only player/team/match model
//! - [`config::ConfigVars`] — named configuration variables
//! - [`assets::AssetSource`] — font metrics and texture handles
//! - [`draw::DrawTarget`] — the string/color/texture draw primitives
//!
//! Parsing is strict: any malformed declaration aborts the whole load
//! with a line-numbered [`scan::ParseError`] and leaves no partial board
//! state behind. Runtime problems (a column that does not apply to the
//! current game mode, a texture that is not loaded yet) never error;
//! the content simply stays hidden until conditions change.

pub mod assets;
pub mod board;
pub mod columns;
pub mod config;
pub mod draw;
pub mod game;
pub mod margin;
pub mod scan;
pub mod value;

pub use board::{BoardFlags, Scoreboard, build_limit_strings, left_to_limit};
pub use scan::{ParseError, ScriptScanner};
