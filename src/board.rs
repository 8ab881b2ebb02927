//! The scoreboard itself.
//!
//! One `Scoreboard` exists per game session. It owns the column order,
//! the rank order used to sort players, the four margins, and every
//! customizable board property. Each frame runs a fixed sequence:
//! usability pass, rank-order pruning, content refresh, player sort,
//! width/height layout, then the draw walk. Nothing here is reentrant;
//! `refresh` must complete before `render` reads the derived geometry.

use crate::assets::AssetSource;
use crate::columns::{Column, ColumnRegistry, LayoutStyle};
use crate::config::{ConfigVars, Customizable, CustomizableFont, CustomizeFlags};
use crate::draw::{DrawTarget, Rect, Rgba, rgba_hex};
use crate::game::{EarnFlags, GameModel, MAX_PLAYERS, MAX_TEAMS, NO_TEAM};
use crate::margin::{Margin, MarginKind};
use crate::scan::{ParseError, ScannerExt, ScriptScanner};
use bitflags::bitflags;
use log::{info, warn};
use smallvec::SmallVec;
use std::cmp::Ordering;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct BoardFlags: u32 {
        const DONT_DRAW_BORDERS         = 1 << 0;
        const DONT_DRAW_BACKGROUND      = 1 << 1;
        const DONT_DRAW_ROW_BACKGROUNDS = 1 << 2;
        const DONT_SEPARATE_TEAMS       = 1 << 3;
    }
}

impl BoardFlags {
    fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dontdrawborders" => Some(Self::DONT_DRAW_BORDERS),
            "dontdrawbackground" => Some(Self::DONT_DRAW_BACKGROUND),
            "dontdrawrowbackgrounds" => Some(Self::DONT_DRAW_ROW_BACKGROUNDS),
            "dontseparateteams" => Some(Self::DONT_SEPARATE_TEAMS),
            _ => None,
        }
    }
}

const LOCAL_INGAME: usize = 0;
const LOCAL_INDEMO: usize = 1;

const BORDER_LIGHT: usize = 0;
const BORDER_DARK: usize = 1;

const ROWBG_LIGHT: usize = 0;
const ROWBG_DARK: usize = 1;
const ROWBG_LOCAL: usize = 2;

fn scale_rgb(c: Rgba, f: f32) -> Rgba {
    [
        (c[0] * f).min(1.0),
        (c[1] * f).min(1.0),
        (c[2] * f).min(1.0),
        c[3],
    ]
}

pub struct Scoreboard {
    // Geometry for the current frame.
    rel_x: i32,
    rel_y: i32,
    width: u32,
    height: u32,

    flags: BoardFlags,

    // Customizable appearance.
    header_font: CustomizableFont,
    row_font: CustomizableFont,
    header_color: Customizable<Rgba>,
    row_color: Customizable<Rgba>,
    local_row_colors: [Customizable<Rgba>; 2],
    border_colors: [Customizable<Rgba>; 2],
    background_color: Customizable<Rgba>,
    row_background_colors: [Customizable<Rgba>; 3],
    background_amount: Customizable<f32>,
    row_background_amount: Customizable<f32>,
    dead_row_background_amount: Customizable<f32>,

    // Plain script-declared appearance.
    border_texture_name: Option<String>,
    content_alpha: f32,
    dead_text_alpha: f32,
    background_border_size: u32,
    gap_between_header_and_rows: u32,
    gap_between_columns: u32,
    gap_between_rows: u32,
    column_padding: u32,
    header_height: u32,
    row_height: u32,

    // Derived once per frame.
    header_height_to_use: u32,
    row_height_to_use: u32,
    total_scroll_height: u32,
    visible_scroll_height: u32,
    min_clip_y: i32,
    max_clip_y: i32,
    current_scroll_offset: i32,
    interpolate_scroll_offset: i32,
    team_row_colors: [[Rgba; 3]; MAX_TEAMS],
    frame_customize: CustomizeFlags,

    templates: ColumnRegistry,
    columns: Vec<Column>,
    rank_order: SmallVec<[usize; 8]>,
    player_list: [usize; MAX_PLAYERS],

    main_header: Margin,
    team_header: Margin,
    spectator_header: Margin,
    footer: Margin,
}

impl core::fmt::Debug for Scoreboard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Scoreboard").finish_non_exhaustive()
    }
}

impl Scoreboard {
    fn empty() -> Self {
        let neutral = [[rgba_hex("#000000"); 3]; MAX_TEAMS];
        Self {
            rel_x: 0,
            rel_y: 0,
            width: 0,
            height: 0,
            flags: BoardFlags::empty(),
            header_font: CustomizableFont::new("sb_headerfont", CustomizeFlags::TEXT, "bigfont"),
            row_font: CustomizableFont::new("sb_rowfont", CustomizeFlags::TEXT, "smallfont"),
            header_color: Customizable::new(
                "sb_headertextcolor",
                CustomizeFlags::TEXT,
                rgba_hex("#FFBE00"),
            ),
            row_color: Customizable::new(
                "sb_rowtextcolor",
                CustomizeFlags::TEXT,
                rgba_hex("#E0E0E0"),
            ),
            local_row_colors: [
                Customizable::new(
                    "sb_localrowtextcolor",
                    CustomizeFlags::TEXT,
                    rgba_hex("#66C955"),
                ),
                Customizable::new(
                    "sb_localrowdemotextcolor",
                    CustomizeFlags::TEXT,
                    rgba_hex("#FFBE00"),
                ),
            ],
            border_colors: [
                Customizable::new(
                    "sb_lightbordercolor",
                    CustomizeFlags::BORDERS,
                    rgba_hex("#8A8A8A"),
                ),
                Customizable::new(
                    "sb_darkbordercolor",
                    CustomizeFlags::BORDERS,
                    rgba_hex("#353535"),
                ),
            ],
            background_color: Customizable::new(
                "sb_backgroundcolor",
                CustomizeFlags::BACKGROUND,
                rgba_hex("#000000"),
            ),
            row_background_colors: [
                Customizable::new(
                    "sb_lightrowbackgroundcolor",
                    CustomizeFlags::ROW_BACKGROUNDS,
                    rgba_hex("#404040"),
                ),
                Customizable::new(
                    "sb_darkrowbackgroundcolor",
                    CustomizeFlags::ROW_BACKGROUNDS,
                    rgba_hex("#202020"),
                ),
                Customizable::new(
                    "sb_localrowbackgroundcolor",
                    CustomizeFlags::ROW_BACKGROUNDS,
                    rgba_hex("#50503A"),
                ),
            ],
            background_amount: Customizable::new(
                "sb_backgroundalpha",
                CustomizeFlags::BACKGROUND,
                0.7,
            ),
            row_background_amount: Customizable::new(
                "sb_rowbackgroundalpha",
                CustomizeFlags::ROW_BACKGROUNDS,
                0.65,
            ),
            dead_row_background_amount: Customizable::new(
                "sb_deadrowbackgroundalpha",
                CustomizeFlags::ROW_BACKGROUNDS,
                0.35,
            ),
            border_texture_name: None,
            content_alpha: 1.0,
            dead_text_alpha: 0.35,
            background_border_size: 4,
            gap_between_header_and_rows: 4,
            gap_between_columns: 4,
            gap_between_rows: 1,
            column_padding: 1,
            header_height: 0,
            row_height: 0,
            header_height_to_use: 0,
            row_height_to_use: 0,
            total_scroll_height: 0,
            visible_scroll_height: 0,
            min_clip_y: 0,
            max_clip_y: 0,
            current_scroll_offset: 0,
            interpolate_scroll_offset: 0,
            team_row_colors: neutral,
            frame_customize: CustomizeFlags::empty(),
            templates: ColumnRegistry::new(),
            columns: Vec::new(),
            rank_order: SmallVec::new(),
            player_list: std::array::from_fn(|i| i),
            main_header: Margin::new(MarginKind::HeaderOrFooter, "mainheader"),
            team_header: Margin::new(MarginKind::Team, "teamheader"),
            spectator_header: Margin::new(MarginKind::Spectator, "spectatorheader"),
            footer: Margin::new(MarginKind::HeaderOrFooter, "footer"),
        }
    }

    // --- Loading ---

    /// Parse a whole scoreboard script into a fresh board. Any error
    /// aborts the load and leaves the caller's existing board untouched;
    /// no partially-attached columns or margins can escape.
    pub fn load(sc: &mut dyn ScriptScanner) -> Result<Self, ParseError> {
        let mut board = Self::empty();
        let mut column_order_names: Vec<String> = Vec::new();
        let mut rank_order_names: Vec<String> = Vec::new();

        while sc.advance() {
            let keyword = sc.token().to_ascii_lowercase();
            match keyword.as_str() {
                "column" | "customcolumn" | "compositecolumn" => {
                    board.templates.parse_declaration(sc, &keyword)?;
                }
                "mainheader" => board.main_header.parse(sc)?,
                "teamheader" => board.team_header.parse(sc)?,
                "spectatorheader" => board.spectator_header.parse(sc)?,
                "footer" => board.footer.parse(sc)?,
                "scoreboard" => {
                    board.parse_board_block(sc, &mut column_order_names, &mut rank_order_names)?;
                }
                _ => {
                    return Err(ParseError::Unknown {
                        line: sc.line(),
                        what: "declaration",
                        name: keyword,
                    });
                }
            }
        }

        // Orders resolve after the whole script so columns may be
        // declared in any position relative to the scoreboard block.
        for name in &column_order_names {
            let column = board.templates.instantiate(name).ok_or_else(|| {
                ParseError::Unknown {
                    line: sc.line(),
                    what: "column in columnorder",
                    name: name.clone(),
                }
            })?;
            board.columns.push(column);
        }
        for name in &rank_order_names {
            let index = board
                .columns
                .iter()
                .position(|c| c.internal_name().eq_ignore_ascii_case(name))
                .ok_or_else(|| ParseError::Unknown {
                    line: sc.line(),
                    what: "column in rankorder",
                    name: name.clone(),
                })?;
            if board.columns[index].sort_dir().is_none() {
                return Err(ParseError::invalid(
                    sc.line(),
                    format!("column \"{name}\" has no sort direction and cannot rank players"),
                ));
            }
            board.rank_order.push(index);
        }

        info!(
            "scoreboard loaded: {} columns ({} ranked), {} templates",
            board.columns.len(),
            board.rank_order.len(),
            board.templates.len()
        );
        Ok(board)
    }

    fn parse_board_block(
        &mut self,
        sc: &mut dyn ScriptScanner,
        column_order: &mut Vec<String>,
        rank_order: &mut Vec<String>,
    ) -> Result<(), ParseError> {
        let open_line = sc.line();
        sc.expect_sym("{")?;
        loop {
            if !sc.advance() {
                return Err(ParseError::Unterminated {
                    line: open_line,
                    what: "scoreboard block",
                });
            }
            if sc.token() == "}" {
                return Ok(());
            }
            let keyword = sc.token().to_ascii_lowercase();
            match keyword.as_str() {
                "columnorder" | "rankorder" => {
                    sc.expect_sym("=")?;
                    let list = if keyword == "columnorder" {
                        &mut *column_order
                    } else {
                        &mut *rank_order
                    };
                    list.clear();
                    loop {
                        list.push(sc.expect("a column name")?.to_ascii_lowercase());
                        if !sc.accept(",") {
                            break;
                        }
                    }
                }
                "flags" => {
                    sc.expect_sym("=")?;
                    loop {
                        let token = sc.expect("a scoreboard flag")?;
                        let flag =
                            BoardFlags::from_keyword(&token).ok_or_else(|| ParseError::Unknown {
                                line: sc.line(),
                                what: "scoreboard flag",
                                name: token,
                            })?;
                        self.flags |= flag;
                        if !sc.accept(",") {
                            break;
                        }
                    }
                }
                "headerfont" => {
                    sc.expect_sym("=")?;
                    self.header_font.set_default(sc.expect("a font name")?);
                }
                "rowfont" => {
                    sc.expect_sym("=")?;
                    self.row_font.set_default(sc.expect("a font name")?);
                }
                "headercolor" => self.header_color.set_default(parse_color_prop(sc)?),
                "rowcolor" => self.row_color.set_default(parse_color_prop(sc)?),
                "localrowcolor" => {
                    self.local_row_colors[LOCAL_INGAME].set_default(parse_color_prop(sc)?);
                }
                "localrowdemocolor" => {
                    self.local_row_colors[LOCAL_INDEMO].set_default(parse_color_prop(sc)?);
                }
                "lightbordercolor" => {
                    self.border_colors[BORDER_LIGHT].set_default(parse_color_prop(sc)?);
                }
                "darkbordercolor" => {
                    self.border_colors[BORDER_DARK].set_default(parse_color_prop(sc)?);
                }
                "backgroundcolor" => self.background_color.set_default(parse_color_prop(sc)?),
                "lightrowbackgroundcolor" => {
                    self.row_background_colors[ROWBG_LIGHT].set_default(parse_color_prop(sc)?);
                }
                "darkrowbackgroundcolor" => {
                    self.row_background_colors[ROWBG_DARK].set_default(parse_color_prop(sc)?);
                }
                "localrowbackgroundcolor" => {
                    self.row_background_colors[ROWBG_LOCAL].set_default(parse_color_prop(sc)?);
                }
                "backgroundalpha" => {
                    sc.expect_sym("=")?;
                    self.background_amount.set_default(sc.expect_float()?);
                }
                "rowbackgroundalpha" => {
                    sc.expect_sym("=")?;
                    self.row_background_amount.set_default(sc.expect_float()?);
                }
                "deadrowbackgroundalpha" => {
                    sc.expect_sym("=")?;
                    self.dead_row_background_amount
                        .set_default(sc.expect_float()?);
                }
                "contentalpha" => {
                    sc.expect_sym("=")?;
                    self.content_alpha = sc.expect_float()?;
                }
                "deadtextalpha" => {
                    sc.expect_sym("=")?;
                    self.dead_text_alpha = sc.expect_float()?;
                }
                "bordertexture" => {
                    sc.expect_sym("=")?;
                    self.border_texture_name = Some(sc.expect("a texture name")?);
                }
                "backgroundbordersize" => {
                    sc.expect_sym("=")?;
                    self.background_border_size = sc.expect_int()?.max(0) as u32;
                }
                "gapbetweenheaderandrows" => {
                    sc.expect_sym("=")?;
                    self.gap_between_header_and_rows = sc.expect_int()?.max(0) as u32;
                }
                "gapbetweencolumns" => {
                    sc.expect_sym("=")?;
                    self.gap_between_columns = sc.expect_int()?.max(0) as u32;
                }
                "gapbetweenrows" => {
                    sc.expect_sym("=")?;
                    self.gap_between_rows = sc.expect_int()?.max(0) as u32;
                }
                "columnpadding" => {
                    sc.expect_sym("=")?;
                    self.column_padding = sc.expect_int()?.max(0) as u32;
                }
                "headerheight" => {
                    sc.expect_sym("=")?;
                    self.header_height = sc.expect_int()?.max(0) as u32;
                }
                "rowheight" => {
                    sc.expect_sym("=")?;
                    self.row_height = sc.expect_int()?.max(0) as u32;
                }
                _ => {
                    return Err(ParseError::Unknown {
                        line: sc.line(),
                        what: "scoreboard property",
                        name: keyword,
                    });
                }
            }
        }
    }

    // --- Session lifecycle ---

    /// Forget per-match derived state (ranks, scroll). Called between
    /// levels; configuration and columns survive.
    pub fn reset(&mut self) {
        self.player_list = std::array::from_fn(|i| i);
        self.current_scroll_offset = 0;
        self.interpolate_scroll_offset = 0;
    }

    // --- Queries ---

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rel_x(&self) -> i32 {
        self.rel_x
    }

    pub fn rel_y(&self) -> i32 {
        self.rel_y
    }

    /// Player slots in current rank order. Derived state, rebuilt by
    /// every refresh.
    pub fn player_rank_list(&self) -> &[usize; MAX_PLAYERS] {
        &self.player_list
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Look up an attached column by internal name, e.g. for game logic
    /// writing into a custom column's player store.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.internal_name().eq_ignore_ascii_case(name))
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.internal_name().eq_ignore_ascii_case(name))
    }

    /// Whether there is anything worth drawing this frame.
    pub fn should_draw(&self) -> bool {
        self.width > 0 && self.columns.iter().any(Column::is_usable)
    }

    /// Team headers are interleaved between team blocks when the mode is
    /// team-based and neither the script nor the user's customize
    /// override asked for a flat list.
    pub fn should_separate_teams(&self, game: &dyn GameModel, cfg: &dyn ConfigVars) -> bool {
        game.mode_is_team_based()
            && !self.check_flag(
                BoardFlags::DONT_SEPARATE_TEAMS,
                CustomizeFlags::TEXT,
                "sb_noteamseparation",
                cfg,
            )
    }

    /// Script flag, unless the matching customize bit hands the decision
    /// to a host variable.
    fn check_flag(
        &self,
        flag: BoardFlags,
        customize: CustomizeFlags,
        var: &str,
        cfg: &dyn ConfigVars,
    ) -> bool {
        if self.frame_customize.contains(customize) {
            cfg.get_bool(var).unwrap_or(self.flags.contains(flag))
        } else {
            self.flags.contains(flag)
        }
    }

    /// Still easing toward the target scroll offset during intermission.
    pub fn should_interpolate_on_intermission(&self, game: &dyn GameModel) -> bool {
        game.in_intermission() && self.interpolate_scroll_offset != self.current_scroll_offset
    }

    // --- Frame pipeline ---

    /// Content pass for this frame. Must complete before `render`.
    pub fn refresh(
        &mut self,
        display_player: usize,
        min_y: i32,
        screen_width: u32,
        screen_height: u32,
        game: &dyn GameModel,
        cfg: &dyn ConfigVars,
        assets: &dyn AssetSource,
    ) {
        self.frame_customize = CustomizeFlags::current(cfg);

        for column in &mut self.columns {
            column.check_if_usable(game, cfg);
        }
        self.remove_invalid_columns_in_rank_order();

        for column in &mut self.columns {
            column.refresh(game, assets);
        }
        self.update_team_row_background_colors(game);
        self.sort_players(game);

        self.update_width(screen_width, game, cfg, assets);

        let inner_width = self.width.saturating_sub(self.background_border_size * 2);
        let margin_x = self.rel_x + self.background_border_size as i32;
        self.main_header
            .refresh(display_player, game, cfg, assets, inner_width, margin_x);
        self.team_header
            .refresh(display_player, game, cfg, assets, inner_width, margin_x);
        self.spectator_header
            .refresh(display_player, game, cfg, assets, inner_width, margin_x);
        self.footer
            .refresh(display_player, game, cfg, assets, inner_width, margin_x);

        self.update_height(display_player, min_y, screen_height, game, cfg, assets);
    }

    /// Drop rank-order entries whose column is disabled or unusable in
    /// the current game. The column stays in the column order; it just
    /// stops contributing to ranking until the next reload.
    fn remove_invalid_columns_in_rank_order(&mut self) {
        let columns = &self.columns;
        self.rank_order.retain(|&mut index| {
            let column = &columns[index];
            let keep = column.is_usable() && !column.is_disabled();
            if !keep {
                warn!(
                    "column \"{}\" dropped from the rank order",
                    column.internal_name()
                );
            }
            keep
        });
    }

    /// Strict weak ordering over player slots: active players before
    /// spectators before empty slots, then each rank-order column in
    /// declared precedence, then original slot order.
    fn compare_players(&self, a: usize, b: usize, game: &dyn GameModel) -> Ordering {
        let tier = |p: usize| -> u8 {
            if !game.player_in_game(p) {
                2
            } else if game.player_is_spectator(p) {
                1
            } else {
                0
            }
        };
        let ord = tier(a).cmp(&tier(b));
        if ord != Ordering::Equal {
            return ord;
        }

        for &index in &self.rank_order {
            let column = &self.columns[index];
            let Some(dir) = column.sort_dir() else { continue };
            let ka = column.rank_key(a, game);
            let kb = column.rank_key(b, game);
            let ord = match dir {
                crate::columns::SortDir::HigherWins => kb.total_cmp(&ka),
                crate::columns::SortDir::LowerWins => ka.total_cmp(&kb),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.cmp(&b)
    }

    fn sort_players(&mut self, game: &dyn GameModel) {
        let mut list: [usize; MAX_PLAYERS] = std::array::from_fn(|i| i);
        list.sort_unstable_by(|&a, &b| self.compare_players(a, b, game));
        self.player_list = list;
    }

    fn layout_style(&self, cfg: &dyn ConfigVars, assets: &dyn AssetSource) -> Option<LayoutStyle> {
        let header_font = self.header_font.resolve(self.frame_customize, cfg, assets)?;
        let row_font = self.row_font.resolve(self.frame_customize, cfg, assets)?;
        Some(LayoutStyle {
            header_font,
            row_font,
            padding: self.column_padding,
        })
    }

    /// Lay columns out left to right and center the board horizontally.
    fn update_width(
        &mut self,
        screen_width: u32,
        game: &dyn GameModel,
        cfg: &dyn ConfigVars,
        assets: &dyn AssetSource,
    ) {
        let Some(style) = self.layout_style(cfg, assets) else {
            // Fonts are not loaded yet; nothing can be measured or drawn.
            self.width = 0;
            return;
        };

        let gap = self.gap_between_columns;
        let mut x = 0u32;
        let mut any = false;
        for column in &mut self.columns {
            if !column.is_usable() {
                continue;
            }
            column.update(game, &style);
            if any {
                x += gap;
            }
            column.set_rel_x(x as i32);
            x += column.width();
            any = true;
        }

        if !any {
            self.width = 0;
            return;
        }
        self.width = x + self.background_border_size * 2;
        self.rel_x = (screen_width.saturating_sub(self.width) / 2) as i32;
    }

    /// Compute row/header heights, the scroll window, and the board's
    /// vertical placement.
    fn update_height(
        &mut self,
        display_player: usize,
        min_y: i32,
        screen_height: u32,
        game: &dyn GameModel,
        cfg: &dyn ConfigVars,
        assets: &dyn AssetSource,
    ) {
        let Some(style) = self.layout_style(cfg, assets) else {
            self.height = 0;
            return;
        };

        self.header_height_to_use = if self.header_height > 0 {
            self.header_height
        } else {
            style.header_font.line_height() + 2
        };
        let tallest_cell = self
            .columns
            .iter()
            .filter(|c| c.is_usable())
            .map(Column::shortest_height)
            .max()
            .unwrap_or(0);
        self.row_height_to_use = if self.row_height > 0 {
            self.row_height
        } else {
            tallest_cell.max(style.row_font.line_height()) + 1
        };

        let separate = self.should_separate_teams(game, cfg);
        let row_stride = self.row_height_to_use + self.gap_between_rows;
        let mut rows_height = 0u32;
        let mut drawn_players = 0u32;
        let mut spectators = 0u32;
        for p in 0..MAX_PLAYERS {
            if !game.player_in_game(p) {
                continue;
            }
            if game.player_is_spectator(p) {
                spectators += 1;
            } else {
                drawn_players += 1;
            }
        }
        rows_height += drawn_players * row_stride;
        if separate {
            for team in 0..game.num_teams() {
                if game.team_player_count(team) > 0 {
                    rows_height += self.team_header.height();
                }
            }
        }
        if spectators > 0 {
            rows_height += self.spectator_header.height() + spectators * row_stride;
        }
        self.total_scroll_height = rows_height;

        let border = self.background_border_size;
        let fixed = border * 2
            + self.main_header.height()
            + self.gap_between_header_and_rows
            + 2 // light+dark border line above the headers
            + self.header_height_to_use
            + self.gap_between_header_and_rows
            + 2 // and below
            + self.footer.height();

        let available = (screen_height as i32 - min_y).max(0) as u32;
        let wanted = fixed + rows_height;
        self.height = wanted.min(available);
        self.visible_scroll_height = self.height.saturating_sub(fixed);
        self.rel_y = min_y + ((available - self.height) / 2) as i32;

        // Keep the display player's row inside the visible window when
        // the list overflows, easing toward it for a smooth scroll.
        if self.total_scroll_height <= self.visible_scroll_height {
            self.current_scroll_offset = 0;
            self.interpolate_scroll_offset = 0;
        } else {
            let rank = self
                .player_list
                .iter()
                .position(|&p| p == display_player)
                .unwrap_or(0) as u32;
            let row_top = rank * row_stride;
            let half = self.visible_scroll_height / 2;
            let max_offset = self.total_scroll_height - self.visible_scroll_height;
            self.current_scroll_offset =
                (row_top.saturating_sub(half)).min(max_offset) as i32;
            let step = (self.current_scroll_offset - self.interpolate_scroll_offset) / 4;
            if step == 0 {
                self.interpolate_scroll_offset = self.current_scroll_offset;
            } else {
                self.interpolate_scroll_offset += step;
            }
        }

        self.min_clip_y = self.rel_y
            + (border
                + self.main_header.height()
                + self.gap_between_header_and_rows
                + 2
                + self.header_height_to_use
                + self.gap_between_header_and_rows
                + 2) as i32;
        self.max_clip_y = self.min_clip_y + self.visible_scroll_height as i32;
    }

    fn update_team_row_background_colors(&mut self, game: &dyn GameModel) {
        for team in 0..MAX_TEAMS.min(game.num_teams()) {
            let c = game.team_color(team);
            self.team_row_colors[team] = [scale_rgb(c, 0.45), scale_rgb(c, 0.25), scale_rgb(c, 0.7)];
        }
    }

    // --- Rendering ---

    /// Draw the whole board for this frame. `refresh` must have run
    /// already; this only reads derived state.
    pub fn render(
        &self,
        display_player: usize,
        alpha: f32,
        game: &dyn GameModel,
        cfg: &dyn ConfigVars,
        assets: &dyn AssetSource,
        target: &mut dyn DrawTarget,
    ) {
        if !self.should_draw() {
            return;
        }
        let Some(style) = self.layout_style(cfg, assets) else {
            return;
        };
        let customize = self.frame_customize;

        if !self.check_flag(
            BoardFlags::DONT_DRAW_BACKGROUND,
            CustomizeFlags::BACKGROUND,
            "sb_nobackground",
            cfg,
        ) {
            target.draw_color(
                self.background_color.get(customize, cfg),
                self.background_amount.get(customize, cfg) * alpha,
                Rect::new(self.rel_x, self.rel_y, self.width as i32, self.height as i32),
            );
        }

        let draw_borders = !self.check_flag(
            BoardFlags::DONT_DRAW_BORDERS,
            CustomizeFlags::BORDERS,
            "sb_noborders",
            cfg,
        );
        let mut y = self.rel_y + self.background_border_size as i32;

        self.main_header.render(
            display_player,
            NO_TEAM,
            &mut y,
            alpha,
            0,
            game,
            cfg,
            target,
        );
        y += self.gap_between_header_and_rows as i32;
        self.draw_border(&mut y, alpha, false, draw_borders, cfg, assets, target);

        let header_color = self.header_color.get(customize, cfg);
        let columns_x = self.rel_x + self.background_border_size as i32;
        for column in &self.columns {
            if !column.is_usable() {
                continue;
            }
            column.draw_header(
                columns_x + column.rel_x(),
                y,
                self.header_height_to_use,
                alpha * self.content_alpha,
                header_color,
                &style,
                target,
            );
        }
        y += self.header_height_to_use as i32 + self.gap_between_header_and_rows as i32;
        self.draw_border(&mut y, alpha, true, draw_borders, cfg, assets, target);

        self.draw_rows(display_player, alpha, &style, game, cfg, target);

        let mut footer_y = self.max_clip_y;
        self.footer.render(
            display_player,
            NO_TEAM,
            &mut footer_y,
            alpha,
            0,
            game,
            cfg,
            target,
        );
    }

    /// One light and one dark 1px line, or a tiled border texture when
    /// the script named one. `reverse` flips the light/dark order for
    /// the lower edge.
    fn draw_border(
        &self,
        y: &mut i32,
        alpha: f32,
        reverse: bool,
        enabled: bool,
        cfg: &dyn ConfigVars,
        assets: &dyn AssetSource,
        target: &mut dyn DrawTarget,
    ) {
        if !enabled {
            *y += 2;
            return;
        }
        if let Some(texture) = self
            .border_texture_name
            .as_deref()
            .and_then(|name| assets.texture(name))
        {
            let inner = self.width.saturating_sub(self.background_border_size * 2);
            let mut x = self.rel_x + self.background_border_size as i32;
            let end = x + inner as i32;
            while x < end {
                target.draw_texture(&texture, x, *y, 1.0, None, None);
                x += texture.width.max(1) as i32;
            }
            *y += texture.height as i32;
            return;
        }

        let customize = self.frame_customize;
        let light = self.border_colors[BORDER_LIGHT].get(customize, cfg);
        let dark = self.border_colors[BORDER_DARK].get(customize, cfg);
        let (first, second) = if reverse { (dark, light) } else { (light, dark) };
        let inner = self.width.saturating_sub(self.background_border_size * 2) as i32;
        let x = self.rel_x + self.background_border_size as i32;
        target.draw_color(first, alpha, Rect::new(x, *y, inner, 1));
        target.draw_color(second, alpha, Rect::new(x, *y + 1, inner, 1));
        *y += 2;
    }

    fn draw_rows(
        &self,
        display_player: usize,
        alpha: f32,
        style: &LayoutStyle,
        game: &dyn GameModel,
        cfg: &dyn ConfigVars,
        target: &mut dyn DrawTarget,
    ) {
        let mut y = self.min_clip_y - self.interpolate_scroll_offset;
        let mut light_row = true;

        if self.should_separate_teams(game, cfg) {
            for team in 0..game.num_teams() {
                if game.team_player_count(team) == 0 {
                    continue;
                }
                if self.row_visible(y, self.team_header.height()) {
                    let mut header_y = y;
                    self.team_header.render(
                        display_player,
                        team,
                        &mut header_y,
                        alpha,
                        0,
                        game,
                        cfg,
                        target,
                    );
                }
                y += self.team_header.height() as i32;
                for &player in self.player_list.iter() {
                    if !game.player_in_game(player)
                        || game.player_is_spectator(player)
                        || game.player_team(player) != Some(team)
                    {
                        continue;
                    }
                    self.draw_row(
                        player,
                        display_player,
                        Some(team),
                        &mut y,
                        &mut light_row,
                        alpha,
                        style,
                        game,
                        cfg,
                        target,
                    );
                }
            }
        } else {
            for &player in self.player_list.iter() {
                if !game.player_in_game(player) || game.player_is_spectator(player) {
                    continue;
                }
                self.draw_row(
                    player,
                    display_player,
                    None,
                    &mut y,
                    &mut light_row,
                    alpha,
                    style,
                    game,
                    cfg,
                    target,
                );
            }
        }

        let any_spectators =
            (0..MAX_PLAYERS).any(|p| game.player_in_game(p) && game.player_is_spectator(p));
        if any_spectators {
            if self.row_visible(y, self.spectator_header.height()) {
                let mut header_y = y;
                self.spectator_header.render(
                    display_player,
                    NO_TEAM,
                    &mut header_y,
                    alpha,
                    0,
                    game,
                    cfg,
                    target,
                );
            }
            y += self.spectator_header.height() as i32;
            for &player in self.player_list.iter() {
                if !game.player_in_game(player) || !game.player_is_spectator(player) {
                    continue;
                }
                self.draw_row(
                    player,
                    display_player,
                    None,
                    &mut y,
                    &mut light_row,
                    alpha,
                    style,
                    game,
                    cfg,
                    target,
                );
            }
        }
    }

    fn row_visible(&self, y: i32, height: u32) -> bool {
        y + height as i32 > self.min_clip_y && y < self.max_clip_y
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_row(
        &self,
        player: usize,
        display_player: usize,
        team: Option<usize>,
        y: &mut i32,
        light_row: &mut bool,
        alpha: f32,
        style: &LayoutStyle,
        game: &dyn GameModel,
        cfg: &dyn ConfigVars,
        target: &mut dyn DrawTarget,
    ) {
        let row_h = self.row_height_to_use;
        let visible = self.row_visible(*y, row_h);
        let use_light = *light_row;
        *light_row = !use_light;
        if !visible {
            *y += (row_h + self.gap_between_rows) as i32;
            return;
        }

        let customize = self.frame_customize;
        let is_local = player == display_player;
        let is_dead = game.player_is_dead(player) && !game.player_is_spectator(player);

        if !self.check_flag(
            BoardFlags::DONT_DRAW_ROW_BACKGROUNDS,
            CustomizeFlags::ROW_BACKGROUNDS,
            "sb_norowbackgrounds",
            cfg,
        ) {
            let slot = if is_local {
                ROWBG_LOCAL
            } else if use_light {
                ROWBG_LIGHT
            } else {
                ROWBG_DARK
            };
            let color = match team {
                Some(t) if t < MAX_TEAMS => self.team_row_colors[t][slot],
                _ => self.row_background_colors[slot].get(customize, cfg),
            };
            let amount = if is_dead {
                self.dead_row_background_amount.get(customize, cfg)
            } else {
                self.row_background_amount.get(customize, cfg)
            };
            let x = self.rel_x + self.background_border_size as i32;
            let w = self.width.saturating_sub(self.background_border_size * 2);
            target.draw_color(color, amount * alpha, Rect::new(x, *y, w as i32, row_h as i32));
        }

        let text_color = if is_local {
            let slot = if game.in_demo() { LOCAL_INDEMO } else { LOCAL_INGAME };
            self.local_row_colors[slot].get(customize, cfg)
        } else {
            self.row_color.get(customize, cfg)
        };
        let cell_alpha = alpha
            * self.content_alpha
            * if is_dead { self.dead_text_alpha } else { 1.0 };

        let columns_x = self.rel_x + self.background_border_size as i32;
        for column in &self.columns {
            if !column.is_usable() {
                continue;
            }
            column.draw_value(
                player,
                columns_x + column.rel_x(),
                *y,
                row_h,
                cell_alpha,
                text_color,
                style,
                game,
                target,
            );
        }
        *y += (row_h + self.gap_between_rows) as i32;
    }
}

fn parse_color_prop(sc: &mut dyn ScriptScanner) -> Result<Rgba, ParseError> {
    sc.expect_sym("=")?;
    let token = sc.expect("a color")?;
    crate::draw::parse_color(&token).ok_or(ParseError::BadArgument {
        line: sc.line(),
        expected: "color",
        token,
    })
}

// --- Limit queries ---

/// Lines describing how close the match is to ending, for margins and
/// auxiliary HUD text: remaining frags/points/wins and time left.
pub fn build_limit_strings(game: &dyn GameModel) -> Vec<String> {
    let mut lines = Vec::new();
    let earn = game.mode_earn_flags();
    if let Some(left) = left_to_limit(game) {
        let noun = if earn.contains(EarnFlags::POINTS) {
            "points"
        } else if earn.contains(EarnFlags::WINS) {
            "wins"
        } else {
            "frags"
        };
        lines.push(format!("{left} {noun} left"));
    }
    if let Some(seconds) = game.time_left_seconds() {
        lines.push(format!("time left: {}:{:02}", seconds / 60, seconds % 60));
    }
    lines
}

/// Distance between the leader and the active score limit, if the mode
/// has one. Hosts use this for "N frags left" HUD text.
pub fn left_to_limit(game: &dyn GameModel) -> Option<i32> {
    let earn = game.mode_earn_flags();
    let (limit, best) = if earn.contains(EarnFlags::POINTS) {
        (game.point_limit()?, best_stat(game, |p| game.player_points(p)))
    } else if earn.contains(EarnFlags::WINS) {
        (game.win_limit()?, best_stat(game, |p| game.player_wins(p)))
    } else if earn.contains(EarnFlags::FRAGS) {
        (game.frag_limit()?, best_stat(game, |p| game.player_frags(p)))
    } else {
        return None;
    };
    Some((limit - best).max(0))
}

fn best_stat(game: &dyn GameModel, stat: impl Fn(usize) -> i32) -> i32 {
    (0..MAX_PLAYERS)
        .filter(|&p| game.player_in_game(p) && !game.player_is_spectator(p))
        .map(stat)
        .max()
        .unwrap_or(0)
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

    const BASIC_SCRIPT: &str = r#"
    column "Name"
    {
        type = name
        displayname = "Name"
        alignment = left
    }
    column "Frags"
    {
        type = frags
        displayname = "Frags"
        alignment = right
    }
    column "Deaths"
    {
        type = deaths
        displayname = "Deaths"
        alignment = right
    }
    mainheader
    {
        drawstring( servername, center, top, 0, 0, bigfont, white )
    }
    footer
    {
        drawstring( limitstrings, left, top, 0, 0, smallfont, grey )
    }
    scoreboard
    {
        columnorder = name, frags, deaths
        rankorder = frags, deaths
        backgroundbordersize = 4
        gapbetweencolumns = 4
    }
    "#;

    fn load_board(src: &str) -> Scoreboard {
        let mut sc = ScriptLexer::new(src);
        Scoreboard::load(&mut sc).expect("script loads")
    }

    fn tiebreak_game() -> TestGame {
        let mut game = TestGame::deathmatch();
        for (slot, frags, deaths) in [(0, 10, 2), (1, 10, 1), (2, 5, 0)] {
            game.add_player(
                slot,
                TestPlayer {
                    name: format!("p{slot}"),
                    frags,
                    deaths,
                    ..TestPlayer::default()
                },
            );
        }
        game
    }

    fn run_refresh(board: &mut Scoreboard, game: &TestGame) {
        let assets = TestAssets::new();
        board.refresh(0, 0, 640, 480, game, &NoConfig, &assets);
    }

    #[test]
    fn load_resolves_column_and_rank_orders() {
        let board = load_board(BASIC_SCRIPT);
        assert_eq!(board.columns().len(), 3);
        assert_eq!(board.rank_order.as_slice(), &[1, 2]);
        assert!(board.column("FRAGS").is_some(), "lookup is case-insensitive");
    }

    #[test]
    fn unknown_column_in_order_fails_the_load() {
        let src = r#"
        column "Frags" { type = frags }
        scoreboard { columnorder = frags, ghost }
        "#;
        let mut sc = ScriptLexer::new(src);
        let err = Scoreboard::load(&mut sc).expect_err("\"ghost\" is not declared");
        assert!(matches!(err, ParseError::Unknown { what: "column in columnorder", .. }));
    }

    #[test]
    fn unterminated_scoreboard_block_fails_the_load() {
        let mut sc = ScriptLexer::new("scoreboard { columnorder = frags");
        assert!(matches!(
            Scoreboard::load(&mut sc),
            Err(ParseError::Unterminated { .. })
        ));
    }

    #[test]
    fn unrankable_column_in_rank_order_fails_the_load() {
        let src = r#"
        column "Name" { type = name }
        scoreboard { columnorder = name rankorder = name }
        "#;
        let mut sc = ScriptLexer::new(src);
        assert!(Scoreboard::load(&mut sc).is_err(), "name has no sort direction");
    }

    #[test]
    fn ranking_follows_declared_directions_with_tiebreak() {
        let mut board = load_board(BASIC_SCRIPT);
        let game = tiebreak_game();
        run_refresh(&mut board, &game);

        // Frags descend, deaths ascend on ties: (10,1) then (10,2) then (5,0).
        assert_eq!(&board.player_rank_list()[..3], &[1, 0, 2]);
    }

    #[test]
    fn ranking_is_deterministic_and_antisymmetric() {
        let mut board = load_board(BASIC_SCRIPT);
        let game = tiebreak_game();
        run_refresh(&mut board, &game);
        let first = *board.player_rank_list();
        run_refresh(&mut board, &game);
        assert_eq!(
            first,
            *board.player_rank_list(),
            "same inputs sort the same twice"
        );

        for &a in &first[..3] {
            for &b in &first[..3] {
                let ab = board.compare_players(a, b, &game);
                let ba = board.compare_players(b, a, &game);
                assert_eq!(ab, ba.reverse(), "{a} vs {b} must be antisymmetric");
                if a == b {
                    assert_eq!(ab, Ordering::Equal);
                }
            }
        }
    }

    #[test]
    fn equal_stats_fall_back_to_slot_order() {
        let mut board = load_board(BASIC_SCRIPT);
        let mut game = TestGame::deathmatch();
        for slot in [4, 2, 7] {
            game.add_player(
                slot,
                TestPlayer {
                    name: format!("p{slot}"),
                    frags: 3,
                    deaths: 3,
                    ..TestPlayer::default()
                },
            );
        }
        run_refresh(&mut board, &game);
        assert_eq!(&board.player_rank_list()[..3], &[2, 4, 7]);
    }

    #[test]
    fn spectators_sort_below_active_players() {
        let mut board = load_board(BASIC_SCRIPT);
        let mut game = TestGame::deathmatch();
        game.add_player(
            0,
            TestPlayer {
                name: "spec".into(),
                spectator: true,
                frags: 99,
                ..TestPlayer::default()
            },
        );
        game.add_player(
            1,
            TestPlayer {
                name: "active".into(),
                frags: 1,
                ..TestPlayer::default()
            },
        );
        run_refresh(&mut board, &game);
        assert_eq!(&board.player_rank_list()[..2], &[1, 0]);
    }

    #[test]
    fn unusable_rank_columns_are_dropped_but_stay_in_column_order() {
        let src = r#"
        column "Name" { type = name }
        column "Wins" { type = wins }
        scoreboard { columnorder = name, wins rankorder = wins }
        "#;
        let mut board = load_board(src);
        assert_eq!(board.rank_order.len(), 1);

        let game = tiebreak_game(); // deathmatch: wins are not earned
        run_refresh(&mut board, &game);
        assert!(board.rank_order.is_empty(), "wins cannot rank in deathmatch");
        assert_eq!(board.columns().len(), 2, "column order is untouched");
    }

    #[test]
    fn layout_places_columns_left_to_right_with_gaps() {
        let mut board = load_board(BASIC_SCRIPT);
        let game = tiebreak_game();
        run_refresh(&mut board, &game);

        let cols = board.columns();
        assert_eq!(cols[0].rel_x(), 0);
        let expected_1 = cols[0].width() as i32 + 4;
        assert_eq!(cols[1].rel_x(), expected_1);
        let expected_2 = expected_1 + cols[1].width() as i32 + 4;
        assert_eq!(cols[2].rel_x(), expected_2);

        let inner = (expected_2 + cols[2].width() as i32) as u32;
        assert_eq!(board.width(), inner + 8, "inner width plus both borders");
        assert!(board.should_draw());
    }

    #[test]
    fn refresh_without_fonts_disables_drawing() {
        let mut board = load_board(BASIC_SCRIPT);
        let game = tiebreak_game();
        let empty_assets = TestAssets::default();
        board.refresh(0, 0, 640, 480, &game, &NoConfig, &empty_assets);
        assert!(!board.should_draw());

        let mut target = RecordingTarget::default();
        board.render(0, 1.0, &game, &NoConfig, &empty_assets, &mut target);
        assert!(target.ops.is_empty());
    }

    #[test]
    fn render_emits_background_headers_rows_and_footer() {
        let mut board = load_board(BASIC_SCRIPT);
        let mut game = tiebreak_game();
        game.frag_limit = Some(20);
        let assets = TestAssets::new();
        board.refresh(0, 0, 640, 480, &game, &NoConfig, &assets);

        let mut target = RecordingTarget::default();
        board.render(0, 1.0, &game, &NoConfig, &assets, &mut target);

        let strings = target.strings();
        assert!(strings.contains(&"test server"), "main header drew");
        assert!(strings.contains(&"Name") && strings.contains(&"Frags"), "column headers drew");
        for name in ["p0", "p1", "p2"] {
            assert!(strings.contains(&name), "row for {name} drew");
        }
        assert!(
            strings.contains(&"10 frags left"),
            "footer resolved the limit string, got {strings:?}"
        );

        // Background rect comes first and spans the whole board.
        match &target.ops[0] {
            DrawOp::Color { rect, .. } => {
                assert_eq!(rect.w as u32, board.width());
                assert_eq!(rect.h as u32, board.height());
            }
            other => panic!("expected the background first, got {other:?}"),
        }
    }

    #[test]
    fn local_player_row_uses_the_local_colors() {
        let mut board = load_board(BASIC_SCRIPT);
        let game = tiebreak_game();
        let assets = TestAssets::new();
        board.refresh(2, 0, 640, 480, &game, &NoConfig, &assets);

        let mut target = RecordingTarget::default();
        board.render(2, 1.0, &game, &NoConfig, &assets, &mut target);
        let local_color = board.local_row_colors[LOCAL_INGAME]
            .get(CustomizeFlags::empty(), &NoConfig);
        let p2_name_color = target
            .ops
            .iter()
            .find_map(|op| match op {
                DrawOp::String { text, color, .. } if text == "p2" => Some(*color),
                _ => None,
            })
            .expect("p2 row drew");
        assert_eq!(p2_name_color[..3], local_color[..3]);
    }

    #[test]
    fn dead_players_draw_dimmed() {
        let mut board = load_board(BASIC_SCRIPT);
        let mut game = tiebreak_game();
        game.players[0].as_mut().unwrap().dead = true;
        let assets = TestAssets::new();
        board.refresh(1, 0, 640, 480, &game, &NoConfig, &assets);

        let mut target = RecordingTarget::default();
        board.render(1, 1.0, &game, &NoConfig, &assets, &mut target);
        let alpha_of = |name: &str| {
            target
                .ops
                .iter()
                .find_map(|op| match op {
                    DrawOp::String { text, color, .. } if text == name => Some(color[3]),
                    _ => None,
                })
                .expect("row drew")
        };
        assert!(alpha_of("p0") < alpha_of("p2"), "dead rows dim their text");
    }

    #[test]
    fn teams_separate_only_in_team_modes() {
        let mut board = load_board(BASIC_SCRIPT);
        let mut game = tiebreak_game();
        assert!(!board.should_separate_teams(&game, &NoConfig));

        game.team_based = true;
        assert!(board.should_separate_teams(&game, &NoConfig));

        // Customize override: the BORDERS bit must not arm it, TEXT must.
        let mut cfg = TestConfig::default();
        cfg.bools.insert("sb_noteamseparation".into(), true);
        cfg.ints.insert(
            crate::config::CUSTOMIZE_FLAGS_VAR.into(),
            CustomizeFlags::TEXT.bits() as i64,
        );
        let assets = TestAssets::new();
        board.refresh(0, 0, 640, 480, &game, &cfg, &assets);
        assert!(!board.should_separate_teams(&game, &cfg));
    }

    #[test]
    fn team_blocks_render_their_headers() {
        let src = r#"
        column "Name" { type = name }
        column "Frags" { type = frags }
        teamheader
        {
            drawstring( teamname, left, top, 0, 0, bigfont, white )
        }
        scoreboard { columnorder = name, frags rankorder = frags }
        "#;
        let mut board = load_board(src);
        let mut game = TestGame::deathmatch();
        game.team_based = true;
        game.teams = vec![
            ("Red".into(), rgba_hex("#FF0000")),
            ("Blue".into(), rgba_hex("#0000FF")),
        ];
        game.add_player(
            0,
            TestPlayer {
                name: "a".into(),
                team: Some(0),
                ..TestPlayer::default()
            },
        );
        game.add_player(
            1,
            TestPlayer {
                name: "b".into(),
                team: Some(1),
                ..TestPlayer::default()
            },
        );
        let assets = TestAssets::new();
        board.refresh(0, 0, 640, 480, &game, &NoConfig, &assets);

        let mut target = RecordingTarget::default();
        board.render(0, 1.0, &game, &NoConfig, &assets, &mut target);
        let strings = target.strings();
        let red = strings.iter().position(|s| *s == "Red").expect("red header");
        let a = strings.iter().position(|s| *s == "a").unwrap();
        let blue = strings.iter().position(|s| *s == "Blue").expect("blue header");
        let b = strings.iter().position(|s| *s == "b").unwrap();
        assert!(red < a && a < blue && blue < b, "headers interleave team blocks");
    }

    #[test]
    fn spectator_header_precedes_spectator_rows() {
        let src = r#"
        column "Name" { type = name }
        spectatorheader
        {
            drawstring( "spectators", left, top, 0, 0, bigfont, grey )
        }
        scoreboard { columnorder = name }
        "#;
        let mut board = load_board(src);
        let mut game = TestGame::deathmatch();
        game.add_player(0, TestPlayer { name: "active".into(), ..TestPlayer::default() });
        game.add_player(
            1,
            TestPlayer {
                name: "watcher".into(),
                spectator: true,
                ..TestPlayer::default()
            },
        );
        let assets = TestAssets::new();
        board.refresh(0, 0, 640, 480, &game, &NoConfig, &assets);

        let mut target = RecordingTarget::default();
        board.render(0, 1.0, &game, &NoConfig, &assets, &mut target);
        let strings = target.strings();
        let header = strings.iter().position(|s| *s == "spectators").unwrap();
        let active = strings.iter().position(|s| *s == "active").unwrap();
        let watcher = strings.iter().position(|s| *s == "watcher").unwrap();
        assert!(active < header && header < watcher);
    }

    #[test]
    fn overflowing_rows_scroll_toward_the_display_player() {
        let mut board = load_board(BASIC_SCRIPT);
        let mut game = TestGame::deathmatch();
        for slot in 0..32 {
            game.add_player(
                slot,
                TestPlayer {
                    name: format!("p{slot}"),
                    frags: slot as i32,
                    ..TestPlayer::default()
                },
            );
        }
        let assets = TestAssets::new();
        // A short viewport that cannot fit 32 rows.
        board.refresh(0, 0, 640, 200, &game, &NoConfig, &assets);
        assert!(board.total_scroll_height > board.visible_scroll_height);
        // p0 has the fewest frags, so it ranks last; the window must
        // scroll well past the top.
        assert!(board.current_scroll_offset > 0);
        let max = (board.total_scroll_height - board.visible_scroll_height) as i32;
        assert!(board.current_scroll_offset <= max);

        // The eased offset approaches the target over repeated refreshes.
        let mut last_gap =
            (board.current_scroll_offset - board.interpolate_scroll_offset).abs();
        for _ in 0..32 {
            board.refresh(0, 0, 640, 200, &game, &NoConfig, &assets);
            let gap = (board.current_scroll_offset - board.interpolate_scroll_offset).abs();
            assert!(gap <= last_gap);
            last_gap = gap;
        }
        assert_eq!(last_gap, 0, "interpolation converges");
    }

    #[test]
    fn reset_clears_scroll_and_rank_state() {
        let mut board = load_board(BASIC_SCRIPT);
        let mut game = TestGame::deathmatch();
        for slot in 0..32 {
            game.add_player(
                slot,
                TestPlayer {
                    name: format!("p{slot}"),
                    frags: slot as i32,
                    ..TestPlayer::default()
                },
            );
        }
        let assets = TestAssets::new();
        board.refresh(0, 0, 640, 200, &game, &NoConfig, &assets);
        assert_ne!(board.current_scroll_offset, 0);

        board.reset();
        assert_eq!(board.current_scroll_offset, 0);
        assert_eq!(board.player_rank_list()[0], 0);
    }

    #[test]
    fn limit_strings_and_left_to_limit_agree() {
        let mut game = tiebreak_game();
        assert_eq!(left_to_limit(&game), None, "no limit set");

        game.frag_limit = Some(15);
        assert_eq!(left_to_limit(&game), Some(5), "leader has 10 frags");
        assert_eq!(build_limit_strings(&game), vec!["5 frags left".to_string()]);

        game.time_left = Some(93);
        assert_eq!(
            build_limit_strings(&game),
            vec!["5 frags left".to_string(), "time left: 1:33".to_string()]
        );
    }

    #[test]
    fn custom_column_values_reach_the_board() {
        let src = r#"
        column "Name" { type = name }
        customcolumn "Medals" { datatype = int defaultvalue = "0" }
        scoreboard { columnorder = name, medals }
        "#;
        let mut board = load_board(src);
        let mut game = TestGame::deathmatch();
        game.add_player(0, TestPlayer { name: "a".into(), ..TestPlayer::default() });

        board
            .column_mut("medals")
            .unwrap()
            .player_data_mut()
            .unwrap()
            .set_value(0, crate::value::PlayerValue::Int(7));

        let assets = TestAssets::new();
        board.refresh(0, 0, 640, 480, &game, &NoConfig, &assets);
        let mut target = RecordingTarget::default();
        board.render(0, 1.0, &game, &NoConfig, &assets, &mut target);
        assert!(target.strings().contains(&"7"));
    }
}
