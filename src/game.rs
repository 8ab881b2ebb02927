//! Read-only view of the game the board draws for.
//!
//! The player/team data model is owned by the host; the board consumes it
//! through this trait every frame. Defaults are neutral so embedders (and
//! tests) only override what their mode actually exposes.

use crate::draw::{Rgba, rgba_hex};
use bitflags::bitflags;
use std::str::FromStr;

pub const MAX_PLAYERS: usize = 64;
pub const MAX_TEAMS: usize = 4;

/// Team slot used when a margin draws for no particular team.
pub const NO_TEAM: usize = usize::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GameMode {
    Cooperative,
    Survival,
    Deathmatch,
    TeamDeathmatch,
    Duel,
    LastManStanding,
    TeamLms,
    Possession,
    CaptureTheFlag,
    Domination,
}

impl GameMode {
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Cooperative => "cooperative",
            Self::Survival => "survival",
            Self::Deathmatch => "deathmatch",
            Self::TeamDeathmatch => "teamdeathmatch",
            Self::Duel => "duel",
            Self::LastManStanding => "lastmanstanding",
            Self::TeamLms => "teamlms",
            Self::Possession => "possession",
            Self::CaptureTheFlag => "capturetheflag",
            Self::Domination => "domination",
        }
    }
}

impl FromStr for GameMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cooperative" | "coop" => Ok(Self::Cooperative),
            "survival" => Ok(Self::Survival),
            "deathmatch" | "dm" => Ok(Self::Deathmatch),
            "teamdeathmatch" | "tdm" => Ok(Self::TeamDeathmatch),
            "duel" => Ok(Self::Duel),
            "lastmanstanding" | "lms" => Ok(Self::LastManStanding),
            "teamlms" => Ok(Self::TeamLms),
            "possession" => Ok(Self::Possession),
            "capturetheflag" | "ctf" => Ok(Self::CaptureTheFlag),
            "domination" => Ok(Self::Domination),
            _ => Err(()),
        }
    }
}

bitflags! {
    /// How the current mode awards score. Columns and margin commands can
    /// restrict themselves to modes that earn a particular stat.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct EarnFlags: u32 {
        const FRAGS  = 1 << 0;
        const POINTS = 1 << 1;
        const WINS   = 1 << 2;
        const KILLS  = 1 << 3;
    }
}

impl EarnFlags {
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "frags" => Some(Self::FRAGS),
            "points" => Some(Self::POINTS),
            "wins" => Some(Self::WINS),
            "kills" => Some(Self::KILLS),
            _ => None,
        }
    }
}

/// Everything the board reads from the running match. One implementor per
/// host engine; the board never mutates any of it.
pub trait GameModel {
    fn game_mode(&self) -> GameMode;

    fn mode_is_team_based(&self) -> bool {
        false
    }

    fn mode_earn_flags(&self) -> EarnFlags {
        EarnFlags::FRAGS
    }

    fn mode_uses_lives(&self) -> bool {
        false
    }

    fn is_online(&self) -> bool {
        false
    }

    fn in_intermission(&self) -> bool {
        false
    }

    fn in_demo(&self) -> bool {
        false
    }

    fn server_name(&self) -> &str {
        ""
    }

    fn map_name(&self) -> &str {
        ""
    }

    fn frag_limit(&self) -> Option<i32> {
        None
    }

    fn point_limit(&self) -> Option<i32> {
        None
    }

    fn win_limit(&self) -> Option<i32> {
        None
    }

    fn time_left_seconds(&self) -> Option<i32> {
        None
    }

    fn num_teams(&self) -> usize {
        0
    }

    fn team_name(&self, _team: usize) -> &str {
        ""
    }

    fn team_color(&self, _team: usize) -> Rgba {
        rgba_hex("#9F9F9F")
    }

    fn team_score(&self, _team: usize) -> i32 {
        0
    }

    fn team_player_count(&self, _team: usize) -> usize {
        0
    }

    fn player_in_game(&self, _player: usize) -> bool {
        false
    }

    fn player_name(&self, _player: usize) -> &str {
        ""
    }

    fn player_team(&self, _player: usize) -> Option<usize> {
        None
    }

    fn player_is_spectator(&self, _player: usize) -> bool {
        false
    }

    fn player_is_dead(&self, _player: usize) -> bool {
        false
    }

    fn player_is_bot(&self, _player: usize) -> bool {
        false
    }

    /// Index into the 16x16 country flag atlas.
    fn player_country_index(&self, _player: usize) -> u16 {
        0
    }

    fn player_country_name(&self, _player: usize) -> &str {
        ""
    }

    /// Two-letter code, e.g. "US".
    fn player_country_code(&self, _player: usize) -> &str {
        ""
    }

    fn player_frags(&self, _player: usize) -> i32 {
        0
    }

    fn player_points(&self, _player: usize) -> i32 {
        0
    }

    fn player_wins(&self, _player: usize) -> i32 {
        0
    }

    fn player_kills(&self, _player: usize) -> i32 {
        0
    }

    fn player_deaths(&self, _player: usize) -> i32 {
        0
    }

    fn player_ping(&self, _player: usize) -> i32 {
        0
    }

    fn player_time_minutes(&self, _player: usize) -> i32 {
        0
    }

    fn player_lives(&self, _player: usize) -> i32 {
        0
    }

    fn player_handicap(&self, _player: usize) -> i32 {
        0
    }

    /// `Some(true)` voted yes, `Some(false)` voted no, `None` no vote cast.
    fn player_vote(&self, _player: usize) -> Option<bool> {
        None
    }

    fn true_spectator_count(&self) -> usize {
        (0..MAX_PLAYERS)
            .filter(|&p| self.player_in_game(p) && self.player_is_spectator(p))
            .count()
    }

    fn active_player_count(&self) -> usize {
        (0..MAX_PLAYERS)
            .filter(|&p| self.player_in_game(p) && !self.player_is_spectator(p))
            .count()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    #[derive(Clone, Debug, Default)]
    pub struct TestPlayer {
        pub name: String,
        pub team: Option<usize>,
        pub spectator: bool,
        pub dead: bool,
        pub bot: bool,
        pub country_index: u16,
        pub frags: i32,
        pub points: i32,
        pub wins: i32,
        pub kills: i32,
        pub deaths: i32,
        pub ping: i32,
        pub time_minutes: i32,
        pub lives: i32,
    }

    /// Scriptable match snapshot for tests.
    pub struct TestGame {
        pub mode: GameMode,
        pub team_based: bool,
        pub earn: EarnFlags,
        pub uses_lives: bool,
        pub online: bool,
        pub intermission: bool,
        pub server: String,
        pub map: String,
        pub frag_limit: Option<i32>,
        pub point_limit: Option<i32>,
        pub time_left: Option<i32>,
        pub teams: Vec<(String, Rgba)>,
        pub players: Vec<Option<TestPlayer>>,
    }

    impl TestGame {
        pub fn deathmatch() -> Self {
            Self {
                mode: GameMode::Deathmatch,
                team_based: false,
                earn: EarnFlags::FRAGS,
                uses_lives: false,
                online: true,
                intermission: false,
                server: "test server".into(),
                map: "map01".into(),
                frag_limit: None,
                point_limit: None,
                time_left: None,
                teams: Vec::new(),
                players: vec![None; MAX_PLAYERS],
            }
        }

        pub fn add_player(&mut self, slot: usize, player: TestPlayer) {
            self.players[slot] = Some(player);
        }

        fn player(&self, slot: usize) -> Option<&TestPlayer> {
            self.players.get(slot).and_then(|p| p.as_ref())
        }
    }

    impl GameModel for TestGame {
        fn game_mode(&self) -> GameMode {
            self.mode
        }

        fn mode_is_team_based(&self) -> bool {
            self.team_based
        }

        fn mode_earn_flags(&self) -> EarnFlags {
            self.earn
        }

        fn mode_uses_lives(&self) -> bool {
            self.uses_lives
        }

        fn is_online(&self) -> bool {
            self.online
        }

        fn in_intermission(&self) -> bool {
            self.intermission
        }

        fn server_name(&self) -> &str {
            &self.server
        }

        fn map_name(&self) -> &str {
            &self.map
        }

        fn frag_limit(&self) -> Option<i32> {
            self.frag_limit
        }

        fn point_limit(&self) -> Option<i32> {
            self.point_limit
        }

        fn time_left_seconds(&self) -> Option<i32> {
            self.time_left
        }

        fn num_teams(&self) -> usize {
            self.teams.len()
        }

        fn team_name(&self, team: usize) -> &str {
            self.teams.get(team).map_or("", |t| t.0.as_str())
        }

        fn team_color(&self, team: usize) -> Rgba {
            self.teams
                .get(team)
                .map_or(rgba_hex("#9F9F9F"), |t| t.1)
        }

        fn team_player_count(&self, team: usize) -> usize {
            self.players
                .iter()
                .flatten()
                .filter(|p| p.team == Some(team) && !p.spectator)
                .count()
        }

        fn player_in_game(&self, player: usize) -> bool {
            self.player(player).is_some()
        }

        fn player_name(&self, player: usize) -> &str {
            self.player(player).map_or("", |p| p.name.as_str())
        }

        fn player_team(&self, player: usize) -> Option<usize> {
            self.player(player).and_then(|p| p.team)
        }

        fn player_is_spectator(&self, player: usize) -> bool {
            self.player(player).is_some_and(|p| p.spectator)
        }

        fn player_is_dead(&self, player: usize) -> bool {
            self.player(player).is_some_and(|p| p.dead)
        }

        fn player_is_bot(&self, player: usize) -> bool {
            self.player(player).is_some_and(|p| p.bot)
        }

        fn player_country_index(&self, player: usize) -> u16 {
            self.player(player).map_or(0, |p| p.country_index)
        }

        fn player_frags(&self, player: usize) -> i32 {
            self.player(player).map_or(0, |p| p.frags)
        }

        fn player_points(&self, player: usize) -> i32 {
            self.player(player).map_or(0, |p| p.points)
        }

        fn player_wins(&self, player: usize) -> i32 {
            self.player(player).map_or(0, |p| p.wins)
        }

        fn player_kills(&self, player: usize) -> i32 {
            self.player(player).map_or(0, |p| p.kills)
        }

        fn player_deaths(&self, player: usize) -> i32 {
            self.player(player).map_or(0, |p| p.deaths)
        }

        fn player_ping(&self, player: usize) -> i32 {
            self.player(player).map_or(0, |p| p.ping)
        }

        fn player_time_minutes(&self, player: usize) -> i32 {
            self.player(player).map_or(0, |p| p.time_minutes)
        }

        fn player_lives(&self, player: usize) -> i32 {
            self.player(player).map_or(0, |p| p.lives)
        }
    }
}
