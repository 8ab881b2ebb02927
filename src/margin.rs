//! Margin command blocks.
//!
//! Headers, footers and team/spectator headers are driven by a tiny
//! tree-walking interpreter: a block is `{ command* }`, a command is a
//! draw leaf, a flow-control conditional, or a multi-line row element.
//! The tree is parsed once at load time into an arena of nodes with
//! parent links kept as indices, refreshed once per frame to re-resolve
//! dynamic content and negotiate height, and walked on every draw.

use crate::assets::{AssetSource, FontHandle, TextureHandle};
use crate::board::build_limit_strings;
use crate::config::ConfigVars;
use crate::draw::{
    DrawTarget, HorizAlign, Rect, Rgba, VertAlign, align_offset, center_align, parse_color,
    with_alpha,
};
use crate::game::{EarnFlags, GameMode, GameModel, NO_TEAM};
use crate::scan::{ParseError, ScannerExt, ScriptScanner};
use smallvec::SmallVec;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarginKind {
    HeaderOrFooter,
    Team,
    Spectator,
}

type CommandId = usize;

#[derive(Default)]
struct CommandArena {
    nodes: Vec<CommandNode>,
}

struct CommandNode {
    parent: Option<CommandId>,
    kind: CommandKind,
}

impl CommandArena {
    fn alloc(&mut self, parent: Option<CommandId>) -> CommandId {
        self.nodes.push(CommandNode {
            parent,
            kind: CommandKind::Placeholder,
        });
        self.nodes.len() - 1
    }

    /// True when any ancestor of `id` is a flow-control command. Commands
    /// inside conditional branches never honor the X-offset bonus.
    fn inside_flow_control(&self, id: CommandId) -> bool {
        let mut cursor = self.nodes[id].parent;
        while let Some(p) = cursor {
            if self.nodes[p].kind.is_flow_control() {
                return true;
            }
            cursor = self.nodes[p].parent;
        }
        false
    }
}

/// An ordered run of commands between braces. Nodes live in the arena;
/// the block only holds their indices.
#[derive(Default)]
struct Block {
    commands: Vec<CommandId>,
}

enum CommandKind {
    /// Slot reserved while the node's own children parse; never survives
    /// a successful load.
    Placeholder,
    DrawString(DrawStringCmd),
    DrawColor(DrawColorCmd),
    DrawTexture(DrawTextureCmd),
    If(IfCmd),
    MultiLine(MultiLineCmd),
}

impl CommandKind {
    fn is_block_element(&self) -> bool {
        matches!(self, Self::MultiLine(_))
    }

    fn is_flow_control(&self) -> bool {
        matches!(self, Self::If(_))
    }
}

/// Where a string command's text comes from. Dynamic sources re-resolve
/// at refresh; team sources resolve at draw when the team is known.
#[derive(Clone, Debug, PartialEq, Eq)]
enum TextSource {
    Literal(String),
    Cvar(String),
    ServerName,
    MapName,
    PlayerCount,
    SpectatorCount,
    LimitStrings,
    TeamName,
    TeamScore,
    TeamPlayerCount,
}

impl TextSource {
    fn from_token(token: &str) -> Self {
        if let Some(var) = token.strip_prefix("cvar:") {
            return Self::Cvar(var.to_owned());
        }
        match token.to_ascii_lowercase().as_str() {
            "servername" => Self::ServerName,
            "mapname" => Self::MapName,
            "playercount" => Self::PlayerCount,
            "spectatorcount" => Self::SpectatorCount,
            "limitstrings" => Self::LimitStrings,
            "teamname" => Self::TeamName,
            "teamscore" => Self::TeamScore,
            "teamplayercount" => Self::TeamPlayerCount,
            _ => Self::Literal(token.to_owned()),
        }
    }

    fn is_team_source(&self) -> bool {
        matches!(self, Self::TeamName | Self::TeamScore | Self::TeamPlayerCount)
    }

    fn resolve(&self, game: &dyn GameModel, cfg: &dyn ConfigVars, team: usize) -> String {
        match self {
            Self::Literal(s) => s.clone(),
            Self::Cvar(var) => cfg.get_string(var).unwrap_or_default(),
            Self::ServerName => game.server_name().to_owned(),
            Self::MapName => game.map_name().to_owned(),
            Self::PlayerCount => game.active_player_count().to_string(),
            Self::SpectatorCount => game.true_spectator_count().to_string(),
            Self::LimitStrings => build_limit_strings(game).join("\n"),
            Self::TeamName => {
                if team == NO_TEAM {
                    String::new()
                } else {
                    game.team_name(team).to_owned()
                }
            }
            Self::TeamScore => {
                if team == NO_TEAM {
                    String::new()
                } else {
                    game.team_score(team).to_string()
                }
            }
            Self::TeamPlayerCount => {
                if team == NO_TEAM {
                    String::new()
                } else {
                    game.team_player_count(team).to_string()
                }
            }
        }
    }
}

struct DrawStringCmd {
    source: TextSource,
    halign: HorizAlign,
    valign: VertAlign,
    x_off: i32,
    y_off: i32,
    font_name: String,
    color: Rgba,
    use_x_bonus: bool,
    font: Option<FontHandle>,
    cached_lines: Vec<String>,
}

impl DrawStringCmd {
    fn content_height(&self) -> u32 {
        let Some(font) = &self.font else { return 0 };
        self.cached_lines.len().max(1) as u32 * font.line_height()
    }
}

struct DrawColorCmd {
    color: Rgba,
    /// 0 means "the full margin width".
    width: u32,
    height: u32,
    x_off: i32,
    y_off: i32,
}

struct DrawTextureCmd {
    name: String,
    halign: HorizAlign,
    valign: VertAlign,
    x_off: i32,
    y_off: i32,
    scale: f32,
    use_x_bonus: bool,
    texture: Option<TextureHandle>,
}

struct IfCmd {
    predicate: Predicate,
    negated: bool,
    then_block: Block,
    else_block: Option<Block>,
    /// Branch chosen at the last refresh; height negotiation uses it.
    /// Draw re-evaluates the predicate fresh every walk.
    taken: bool,
}

struct MultiLineCmd {
    block: Block,
    /// Content height of the row, computed at refresh.
    height: u32,
    /// Offset of the row below the margin's base content, assigned at
    /// refresh when rows stack up.
    row_y: u32,
}

#[derive(Debug)]
enum Predicate {
    GameMode(SmallVec<[GameMode; 4]>),
    TeamGame,
    EarnType(EarnFlags),
    Intermission,
    SpectatorViewer,
    OnlineGame,
    PlayersOnTeams,
    CvarTrue(String),
}

impl Predicate {
    fn eval(&self, display_player: usize, game: &dyn GameModel, cfg: &dyn ConfigVars) -> bool {
        match self {
            Self::GameMode(modes) => modes.contains(&game.game_mode()),
            Self::TeamGame => game.mode_is_team_based(),
            Self::EarnType(earn) => !(game.mode_earn_flags() & *earn).is_empty(),
            Self::Intermission => game.in_intermission(),
            Self::SpectatorViewer => game.player_is_spectator(display_player),
            Self::OnlineGame => game.is_online(),
            Self::PlayersOnTeams => {
                (0..game.num_teams()).filter(|&t| game.team_player_count(t) > 0).count() >= 2
            }
            Self::CvarTrue(var) => {
                cfg.get_bool(var)
                    .or_else(|| cfg.get_int(var).map(|v| v != 0))
                    .unwrap_or(false)
            }
        }
    }
}

/// Geometry of the region a block draws into.
#[derive(Clone, Copy)]
struct Region {
    x: i32,
    width: u32,
    height: u32,
}

pub struct Margin {
    kind: MarginKind,
    name: &'static str,
    arena: CommandArena,
    root: Block,
    width: u32,
    height: u32,
    rel_x: i32,
}

impl Margin {
    pub fn new(kind: MarginKind, name: &'static str) -> Self {
        Self {
            kind,
            name,
            arena: CommandArena::default(),
            root: Block::default(),
            width: 0,
            height: 0,
            rel_x: 0,
        }
    }

    pub fn kind(&self) -> MarginKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rel_x(&self) -> i32 {
        self.rel_x
    }

    pub fn has_commands(&self) -> bool {
        !self.root.commands.is_empty()
    }

    pub fn clear(&mut self) {
        self.arena = CommandArena::default();
        self.root = Block::default();
        self.height = 0;
    }

    // --- Parsing ---

    /// Parse this margin's `{ command* }` body, replacing any commands
    /// from a previous load. Any malformed command fails the whole load.
    pub fn parse(&mut self, sc: &mut dyn ScriptScanner) -> Result<(), ParseError> {
        let mut arena = CommandArena::default();
        let root = parse_block(sc, &mut arena, None, "margin block")?;
        self.arena = arena;
        self.root = root;
        Ok(())
    }

    // --- Per-frame passes ---

    /// Re-resolve dynamic content and recompute this margin's height for
    /// the frame. Never re-parses.
    pub fn refresh(
        &mut self,
        display_player: usize,
        game: &dyn GameModel,
        cfg: &dyn ConfigVars,
        assets: &dyn AssetSource,
        new_width: u32,
        new_rel_x: i32,
    ) {
        self.width = new_width;
        self.rel_x = new_rel_x;

        let base = refresh_block(
            &mut self.arena,
            &self.root,
            display_player,
            game,
            cfg,
            assets,
        );

        // Block elements stack their own rows under the base content.
        let mut total = base;
        for &id in &self.root.commands {
            if !self.arena.nodes[id].kind.is_block_element() {
                continue;
            }
            if let CommandKind::MultiLine(ml) = &mut self.arena.nodes[id].kind {
                ml.row_y = total;
                total += ml.height;
            }
        }
        self.height = total;
    }

    /// Draw the margin at `*y` and advance the cursor past it. Flow
    /// control picks its branch fresh on every walk.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        display_player: usize,
        team: usize,
        y: &mut i32,
        alpha: f32,
        x_bonus: i32,
        game: &dyn GameModel,
        cfg: &dyn ConfigVars,
        target: &mut dyn DrawTarget,
    ) {
        if !self.has_commands() || self.height == 0 {
            return;
        }
        let region = Region {
            x: self.rel_x,
            width: self.width,
            height: self.height,
        };
        draw_block(
            &self.arena,
            &self.root,
            region,
            *y,
            display_player,
            team,
            alpha,
            x_bonus,
            game,
            cfg,
            target,
        );
        *y += self.height as i32;
    }
}

// --- Block parsing ---

fn parse_block(
    sc: &mut dyn ScriptScanner,
    arena: &mut CommandArena,
    parent: Option<CommandId>,
    what: &'static str,
) -> Result<Block, ParseError> {
    let open_line = sc.line();
    sc.expect_sym("{")?;
    let mut block = Block::default();
    loop {
        if !sc.advance() {
            return Err(ParseError::Unterminated {
                line: open_line,
                what,
            });
        }
        if sc.token() == "}" {
            return Ok(block);
        }
        let keyword = sc.token().to_ascii_lowercase();
        let id = parse_command(sc, arena, parent, &keyword)?;
        block.commands.push(id);
    }
}

fn parse_command(
    sc: &mut dyn ScriptScanner,
    arena: &mut CommandArena,
    parent: Option<CommandId>,
    keyword: &str,
) -> Result<CommandId, ParseError> {
    let id = arena.alloc(parent);
    let kind = match keyword {
        "drawstring" => {
            sc.expect_sym("(")?;
            let source = TextSource::from_token(&sc.expect("a text source")?);
            sc.expect_sym(",")?;
            let halign = parse_halign(sc)?;
            sc.expect_sym(",")?;
            let valign = parse_valign(sc)?;
            sc.expect_sym(",")?;
            let x_off = sc.expect_int()? as i32;
            sc.expect_sym(",")?;
            let y_off = sc.expect_int()? as i32;
            sc.expect_sym(",")?;
            let font_name = sc.expect("a font name")?;
            sc.expect_sym(",")?;
            let color = parse_color_arg(sc)?;
            let use_x_bonus = parse_x_bonus_flag(sc)?;
            sc.expect_sym(")")?;
            CommandKind::DrawString(DrawStringCmd {
                source,
                halign,
                valign,
                x_off,
                y_off,
                font_name,
                color,
                use_x_bonus,
                font: None,
                cached_lines: Vec::new(),
            })
        }
        "drawcolor" => {
            sc.expect_sym("(")?;
            let color = parse_color_arg(sc)?;
            sc.expect_sym(",")?;
            let width = sc.expect_int()?.max(0) as u32;
            sc.expect_sym(",")?;
            let height = sc.expect_int()?.max(0) as u32;
            sc.expect_sym(",")?;
            let x_off = sc.expect_int()? as i32;
            sc.expect_sym(",")?;
            let y_off = sc.expect_int()? as i32;
            sc.expect_sym(")")?;
            CommandKind::DrawColor(DrawColorCmd {
                color,
                width,
                height,
                x_off,
                y_off,
            })
        }
        "drawtexture" => {
            sc.expect_sym("(")?;
            let name = sc.expect("a texture name")?;
            sc.expect_sym(",")?;
            let halign = parse_halign(sc)?;
            sc.expect_sym(",")?;
            let valign = parse_valign(sc)?;
            sc.expect_sym(",")?;
            let x_off = sc.expect_int()? as i32;
            sc.expect_sym(",")?;
            let y_off = sc.expect_int()? as i32;
            sc.expect_sym(",")?;
            let scale = sc.expect_float()?;
            let use_x_bonus = parse_x_bonus_flag(sc)?;
            sc.expect_sym(")")?;
            CommandKind::DrawTexture(DrawTextureCmd {
                name,
                halign,
                valign,
                x_off,
                y_off,
                scale,
                use_x_bonus,
                texture: None,
            })
        }
        "multilineblock" => {
            if parent.is_some() {
                return Err(ParseError::invalid(
                    sc.line(),
                    "multilineblock is only allowed at the top level of a margin",
                ));
            }
            let block = parse_block(sc, arena, Some(id), "multilineblock")?;
            CommandKind::MultiLine(MultiLineCmd {
                block,
                height: 0,
                row_y: 0,
            })
        }
        "if" => {
            let negated = sc.accept("not");
            let predicate = parse_predicate(sc)?;
            let then_block = parse_block(sc, arena, Some(id), "if block")?;
            let else_block = if sc.accept("else") {
                Some(parse_block(sc, arena, Some(id), "else block")?)
            } else {
                None
            };
            CommandKind::If(IfCmd {
                predicate,
                negated,
                then_block,
                else_block,
                taken: false,
            })
        }
        _ => {
            return Err(ParseError::Unknown {
                line: sc.line(),
                what: "margin command",
                name: keyword.to_owned(),
            });
        }
    };
    arena.nodes[id].kind = kind;
    Ok(id)
}

fn parse_halign(sc: &mut dyn ScriptScanner) -> Result<HorizAlign, ParseError> {
    let token = sc.expect("an alignment")?;
    HorizAlign::from_str(&token).map_err(|()| ParseError::Unknown {
        line: sc.line(),
        what: "alignment",
        name: token,
    })
}

fn parse_valign(sc: &mut dyn ScriptScanner) -> Result<VertAlign, ParseError> {
    let token = sc.expect("a vertical alignment")?;
    VertAlign::from_str(&token).map_err(|()| ParseError::Unknown {
        line: sc.line(),
        what: "vertical alignment",
        name: token,
    })
}

fn parse_color_arg(sc: &mut dyn ScriptScanner) -> Result<Rgba, ParseError> {
    let token = sc.expect("a color")?;
    parse_color(&token).ok_or(ParseError::BadArgument {
        line: sc.line(),
        expected: "color",
        token,
    })
}

/// Optional trailing `, usexoffset` flag on draw commands.
fn parse_x_bonus_flag(sc: &mut dyn ScriptScanner) -> Result<bool, ParseError> {
    if !sc.accept(",") {
        return Ok(false);
    }
    let token = sc.expect("\"usexoffset\"")?;
    if token.eq_ignore_ascii_case("usexoffset") {
        Ok(true)
    } else {
        Err(ParseError::Expected {
            line: sc.line(),
            expected: "\"usexoffset\"",
            got: token,
        })
    }
}

fn parse_predicate(sc: &mut dyn ScriptScanner) -> Result<Predicate, ParseError> {
    let token = sc.expect("a condition")?;
    match token.to_ascii_lowercase().as_str() {
        "gamemode" => {
            sc.expect_sym("(")?;
            let mut modes: SmallVec<[GameMode; 4]> = SmallVec::new();
            loop {
                let mode_token = sc.expect("a game mode")?;
                let mode = GameMode::from_str(&mode_token).map_err(|()| ParseError::Unknown {
                    line: sc.line(),
                    what: "game mode",
                    name: mode_token,
                })?;
                modes.push(mode);
                if !sc.accept(",") {
                    break;
                }
            }
            sc.expect_sym(")")?;
            Ok(Predicate::GameMode(modes))
        }
        "earntype" => {
            sc.expect_sym("(")?;
            let mut earn = EarnFlags::empty();
            loop {
                let earn_token = sc.expect("an earn type")?;
                let flag = EarnFlags::from_keyword(&earn_token).ok_or_else(|| {
                    ParseError::Unknown {
                        line: sc.line(),
                        what: "earn type",
                        name: earn_token,
                    }
                })?;
                earn |= flag;
                if !sc.accept(",") {
                    break;
                }
            }
            sc.expect_sym(")")?;
            Ok(Predicate::EarnType(earn))
        }
        "cvar" => {
            sc.expect_sym("(")?;
            let var = sc.expect("a variable name")?;
            sc.expect_sym(")")?;
            Ok(Predicate::CvarTrue(var))
        }
        "teamgame" => Ok(Predicate::TeamGame),
        "intermission" => Ok(Predicate::Intermission),
        "spectator" => Ok(Predicate::SpectatorViewer),
        "onlinegame" => Ok(Predicate::OnlineGame),
        "playersonteams" => Ok(Predicate::PlayersOnTeams),
        _ => Err(ParseError::Unknown {
            line: sc.line(),
            what: "condition",
            name: token,
        }),
    }
}

// --- Refresh walk ---

/// Refresh every command in `block` and return the block's base content
/// height (the tallest leaf extent; block elements report 0 here and
/// stack separately).
fn refresh_block(
    arena: &mut CommandArena,
    block: &Block,
    display_player: usize,
    game: &dyn GameModel,
    cfg: &dyn ConfigVars,
    assets: &dyn AssetSource,
) -> u32 {
    let mut base = 0;
    for &id in &block.commands {
        let mut kind = std::mem::replace(&mut arena.nodes[id].kind, CommandKind::Placeholder);
        match &mut kind {
            CommandKind::DrawString(cmd) => {
                cmd.font = assets.font(&cmd.font_name);
                cmd.cached_lines = if cmd.source.is_team_source() {
                    Vec::new()
                } else {
                    cmd.source
                        .resolve(game, cfg, NO_TEAM)
                        .split('\n')
                        .map(str::to_owned)
                        .collect()
                };
                base = base.max(cmd.y_off.max(0) as u32 + cmd.content_height());
            }
            CommandKind::DrawColor(cmd) => {
                base = base.max(cmd.y_off.max(0) as u32 + cmd.height);
            }
            CommandKind::DrawTexture(cmd) => {
                cmd.texture = assets.texture(&cmd.name);
                let h = cmd
                    .texture
                    .as_ref()
                    .map_or(0, |t| (t.height as f32 * cmd.scale) as u32);
                base = base.max(cmd.y_off.max(0) as u32 + h);
            }
            CommandKind::If(cmd) => {
                cmd.taken = cmd.predicate.eval(display_player, game, cfg) != cmd.negated;
                let then_h =
                    refresh_block(arena, &cmd.then_block, display_player, game, cfg, assets);
                let else_h = cmd.else_block.as_ref().map_or(0, |b| {
                    refresh_block(arena, b, display_player, game, cfg, assets)
                });
                base = base.max(if cmd.taken { then_h } else { else_h });
            }
            CommandKind::MultiLine(cmd) => {
                cmd.height = refresh_block(arena, &cmd.block, display_player, game, cfg, assets);
            }
            CommandKind::Placeholder => unreachable!("placeholder survived parsing"),
        }
        arena.nodes[id].kind = kind;
    }
    base
}

// --- Draw walk ---

#[allow(clippy::too_many_arguments)]
fn draw_block(
    arena: &CommandArena,
    block: &Block,
    region: Region,
    y_base: i32,
    display_player: usize,
    team: usize,
    alpha: f32,
    x_bonus: i32,
    game: &dyn GameModel,
    cfg: &dyn ConfigVars,
    target: &mut dyn DrawTarget,
) {
    for &id in &block.commands {
        match &arena.nodes[id].kind {
            CommandKind::DrawString(cmd) => {
                let Some(font) = &cmd.font else { continue };
                let bonus = command_x_bonus(arena, id, cmd.use_x_bonus, x_bonus);
                let team_line;
                let lines: &[String] = if cmd.source.is_team_source() {
                    team_line = [cmd.source.resolve(game, cfg, team)];
                    &team_line
                } else {
                    &cmd.cached_lines
                };
                let total_h = lines.len().max(1) as u32 * font.line_height();
                let mut y = y_base
                    + valign_offset(cmd.valign, region.height, total_h, cmd.y_off);
                for line in lines {
                    let w = font.string_width(line);
                    let x = region.x
                        + align_offset(cmd.halign, region.width, w.min(region.width))
                        + cmd.x_off
                        + bonus;
                    target.draw_string(font, with_alpha(cmd.color, alpha), x, y, line, None);
                    y += font.line_height() as i32;
                }
            }
            CommandKind::DrawColor(cmd) => {
                let w = if cmd.width == 0 { region.width } else { cmd.width };
                let rect = Rect::new(
                    region.x + cmd.x_off,
                    y_base + cmd.y_off,
                    w as i32,
                    cmd.height as i32,
                );
                target.draw_color(cmd.color, cmd.color[3] * alpha, rect);
            }
            CommandKind::DrawTexture(cmd) => {
                let Some(texture) = &cmd.texture else { continue };
                let bonus = command_x_bonus(arena, id, cmd.use_x_bonus, x_bonus);
                let w = (texture.width as f32 * cmd.scale) as u32;
                let h = (texture.height as f32 * cmd.scale) as u32;
                let x = region.x
                    + align_offset(cmd.halign, region.width, w.min(region.width))
                    + cmd.x_off
                    + bonus;
                let y = y_base + valign_offset(cmd.valign, region.height, h, cmd.y_off);
                target.draw_texture(texture, x, y, cmd.scale, None, None);
            }
            CommandKind::If(cmd) => {
                // At most one branch runs per walk, chosen fresh: match
                // state can change between frames.
                let taken = cmd.predicate.eval(display_player, game, cfg) != cmd.negated;
                let branch = if taken {
                    Some(&cmd.then_block)
                } else {
                    cmd.else_block.as_ref()
                };
                if let Some(branch) = branch {
                    draw_block(
                        arena,
                        branch,
                        region,
                        y_base,
                        display_player,
                        team,
                        alpha,
                        0,
                        game,
                        cfg,
                        target,
                    );
                }
            }
            CommandKind::MultiLine(cmd) => {
                let row_region = Region {
                    x: region.x,
                    width: region.width,
                    height: cmd.height,
                };
                draw_block(
                    arena,
                    &cmd.block,
                    row_region,
                    y_base + cmd.row_y as i32,
                    display_player,
                    team,
                    alpha,
                    x_bonus,
                    game,
                    cfg,
                    target,
                );
            }
            CommandKind::Placeholder => unreachable!("placeholder survived parsing"),
        }
    }
}

fn command_x_bonus(arena: &CommandArena, id: CommandId, wants: bool, bonus: i32) -> i32 {
    if wants && !arena.inside_flow_control(id) {
        bonus
    } else {
        0
    }
}

fn valign_offset(valign: VertAlign, region_height: u32, content_height: u32, y_off: i32) -> i32 {
    match valign {
        VertAlign::Top => y_off,
        VertAlign::Center => center_align(region_height as i32, content_height as i32) + y_off,
        VertAlign::Bottom => region_height as i32 - content_height as i32 - y_off,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::testing::TestAssets;
    use crate::config::NoConfig;
    use crate::config::testing::TestConfig;
    use crate::draw::testing::{DrawOp, RecordingTarget};
    use crate::game::testing::{TestGame, TestPlayer};
    use crate::scan::testing::ScriptLexer;

    fn parse_margin(src: &str) -> Margin {
        let mut margin = Margin::new(MarginKind::HeaderOrFooter, "mainheader");
        let mut sc = ScriptLexer::new(src);
        margin.parse(&mut sc).expect("margin parses");
        margin
    }

    fn game_with_players() -> TestGame {
        let mut game = TestGame::deathmatch();
        game.add_player(
            0,
            TestPlayer {
                name: "alpha".into(),
                ..TestPlayer::default()
            },
        );
        game
    }

    #[test]
    fn unterminated_block_fails_the_load() {
        let mut margin = Margin::new(MarginKind::HeaderOrFooter, "mainheader");
        let mut sc = ScriptLexer::new(
            r#"{ drawstring( servername, center, top, 0, 0, bigfont, white )"#,
        );
        let err = margin.parse(&mut sc).expect_err("missing brace");
        assert!(matches!(err, ParseError::Unterminated { .. }));
        assert!(!margin.has_commands(), "failed parse leaves no commands");
    }

    #[test]
    fn unknown_command_fails_the_load() {
        let mut margin = Margin::new(MarginKind::HeaderOrFooter, "footer");
        let mut sc = ScriptLexer::new("{ sparkle( 1 ) }");
        let err = margin.parse(&mut sc).expect_err("no such command");
        assert!(matches!(err, ParseError::Unknown { what: "margin command", .. }));
    }

    #[test]
    fn wrong_arity_fails_the_load() {
        let mut margin = Margin::new(MarginKind::HeaderOrFooter, "footer");
        let mut sc = ScriptLexer::new("{ drawcolor( white, 64 ) }");
        assert!(margin.parse(&mut sc).is_err());
    }

    #[test]
    fn refresh_resolves_dynamic_text_and_height() {
        let mut margin =
            parse_margin("{ drawstring( servername, center, top, 0, 0, bigfont, white ) }");
        let assets = TestAssets::new();
        let game = game_with_players();
        margin.refresh(0, &game, &NoConfig, &assets, 200, 0);
        assert_eq!(margin.height(), 16, "one line of bigfont");

        let mut target = RecordingTarget::default();
        let mut y = 10;
        margin.render(0, NO_TEAM, &mut y, 1.0, 0, &game, &NoConfig, &mut target);
        assert_eq!(target.strings(), ["test server"]);
        assert_eq!(y, 26, "cursor advanced by the margin height");
    }

    #[test]
    fn refresh_tracks_state_changes_without_reparsing() {
        let mut margin =
            parse_margin("{ drawstring( mapname, left, top, 0, 0, smallfont, white ) }");
        let assets = TestAssets::new();
        let mut game = game_with_players();
        margin.refresh(0, &game, &NoConfig, &assets, 100, 0);

        game.map = "map07".into();
        margin.refresh(0, &game, &NoConfig, &assets, 100, 0);
        let mut target = RecordingTarget::default();
        let mut y = 0;
        margin.render(0, NO_TEAM, &mut y, 1.0, 0, &game, &NoConfig, &mut target);
        assert_eq!(target.strings(), ["map07"]);
    }

    #[test]
    fn flow_control_takes_one_branch_per_walk() {
        let src = r#"
        {
            if teamgame
            {
                drawstring( "teams", left, top, 0, 0, smallfont, white )
            }
            else
            {
                drawstring( "everyone", left, top, 0, 0, smallfont, white )
            }
        }
        "#;
        let mut margin = parse_margin(src);
        let assets = TestAssets::new();
        let mut game = game_with_players();
        margin.refresh(0, &game, &NoConfig, &assets, 100, 0);

        let mut target = RecordingTarget::default();
        let mut y = 0;
        margin.render(0, NO_TEAM, &mut y, 1.0, 0, &game, &NoConfig, &mut target);
        assert_eq!(target.strings(), ["everyone"]);

        // Predicates are evaluated fresh on every draw walk, so a state
        // flip shows up without a refresh in between.
        game.team_based = true;
        let mut target = RecordingTarget::default();
        let mut y = 0;
        margin.render(0, NO_TEAM, &mut y, 1.0, 0, &game, &NoConfig, &mut target);
        assert_eq!(target.strings(), ["teams"]);
    }

    #[test]
    fn negated_conditions_flip_the_branch() {
        let mut margin = parse_margin(
            r#"{ if not onlinegame { drawstring( "offline", left, top, 0, 0, smallfont, white ) } }"#,
        );
        let assets = TestAssets::new();
        let mut game = game_with_players();
        game.online = false;
        margin.refresh(0, &game, &NoConfig, &assets, 100, 0);
        let mut target = RecordingTarget::default();
        let mut y = 0;
        margin.render(0, NO_TEAM, &mut y, 1.0, 0, &game, &NoConfig, &mut target);
        assert_eq!(target.strings(), ["offline"]);
    }

    #[test]
    fn taken_branch_height_drives_the_margin() {
        let src = r#"
        {
            if intermission
            {
                drawstring( "a", left, top, 0, 20, smallfont, white )
            }
            else
            {
                drawstring( "b", left, top, 0, 0, smallfont, white )
            }
        }
        "#;
        let mut margin = parse_margin(src);
        let assets = TestAssets::new();
        let mut game = game_with_players();

        margin.refresh(0, &game, &NoConfig, &assets, 100, 0);
        assert_eq!(margin.height(), 10, "else branch: one smallfont line");

        game.intermission = true;
        margin.refresh(0, &game, &NoConfig, &assets, 100, 0);
        assert_eq!(margin.height(), 30, "then branch: 20px offset + line");
    }

    #[test]
    fn multiline_blocks_reserve_extra_rows() {
        let src = r#"
        {
            drawstring( "base", left, top, 0, 0, smallfont, white )
            multilineblock
            {
                drawcolor( darkgrey, 0, 8, 0, 0 )
            }
            multilineblock
            {
                drawstring( "row2", left, top, 0, 0, smallfont, white )
            }
        }
        "#;
        let mut margin = parse_margin(src);
        let assets = TestAssets::new();
        let game = game_with_players();
        margin.refresh(0, &game, &NoConfig, &assets, 120, 0);
        // 10 base + 8 color row + 10 text row.
        assert_eq!(margin.height(), 28);

        let mut target = RecordingTarget::default();
        let mut y = 0;
        margin.render(0, NO_TEAM, &mut y, 1.0, 0, &game, &NoConfig, &mut target);
        let row2_y = target
            .ops
            .iter()
            .find_map(|op| match op {
                DrawOp::String { text, y, .. } if text == "row2" => Some(*y),
                _ => None,
            })
            .expect("row2 drawn");
        assert_eq!(row2_y, 18, "second row sits under base + first row");
    }

    #[test]
    fn nested_multiline_is_a_parse_error() {
        let mut margin = Margin::new(MarginKind::HeaderOrFooter, "footer");
        let mut sc = ScriptLexer::new(
            "{ if teamgame { multilineblock { drawcolor( white, 0, 4, 0, 0 ) } } }",
        );
        assert!(margin.parse(&mut sc).is_err());
    }

    #[test]
    fn x_bonus_only_applies_outside_flow_control() {
        let src = r#"
        {
            drawstring( "top", left, top, 0, 0, smallfont, white, usexoffset )
            if onlinegame
            {
                drawstring( "nested", left, top, 0, 0, smallfont, white, usexoffset )
            }
        }
        "#;
        let mut margin = parse_margin(src);
        let assets = TestAssets::new();
        let game = game_with_players();
        margin.refresh(0, &game, &NoConfig, &assets, 100, 0);

        let mut target = RecordingTarget::default();
        let mut y = 0;
        margin.render(0, NO_TEAM, &mut y, 1.0, 25, &game, &NoConfig, &mut target);
        let xs: Vec<(String, i32)> = target
            .ops
            .iter()
            .map(|op| match op {
                DrawOp::String { text, x, .. } => (text.clone(), *x),
                _ => panic!("strings only"),
            })
            .collect();
        assert_eq!(xs[0], ("top".into(), 25), "top-level command gets the bonus");
        assert_eq!(xs[1], ("nested".into(), 0), "flow-control branch does not");
    }

    #[test]
    fn team_sources_resolve_at_draw_time() {
        let mut margin = Margin::new(MarginKind::Team, "teamheader");
        let mut sc = ScriptLexer::new(
            "{ drawstring( teamname, left, top, 0, 0, bigfont, white ) }",
        );
        margin.parse(&mut sc).unwrap();

        let assets = TestAssets::new();
        let mut game = game_with_players();
        game.teams = vec![
            ("Red".into(), crate::draw::rgba_hex("#FF0000")),
            ("Blue".into(), crate::draw::rgba_hex("#0000FF")),
        ];
        margin.refresh(0, &game, &NoConfig, &assets, 100, 0);

        for (team, expected) in [(0, "Red"), (1, "Blue")] {
            let mut target = RecordingTarget::default();
            let mut y = 0;
            margin.render(0, team, &mut y, 1.0, 0, &game, &NoConfig, &mut target);
            assert_eq!(target.strings(), [expected]);
        }
    }

    #[test]
    fn cvar_predicate_reads_the_store() {
        let mut margin = parse_margin(
            r#"{ if cvar( sb_showmotd ) { drawstring( cvar:sb_motd, left, top, 0, 0, smallfont, white ) } }"#,
        );
        let assets = TestAssets::new();
        let game = game_with_players();
        let mut cfg = TestConfig::default();
        cfg.bools.insert("sb_showmotd".into(), true);
        cfg.strings.insert("sb_motd".into(), "welcome".into());
        margin.refresh(0, &game, &cfg, &assets, 100, 0);

        let mut target = RecordingTarget::default();
        let mut y = 0;
        margin.render(0, NO_TEAM, &mut y, 1.0, 0, &game, &cfg, &mut target);
        assert_eq!(target.strings(), ["welcome"]);
    }
}
