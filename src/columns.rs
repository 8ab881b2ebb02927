//! Column hierarchy.
//!
//! Everything that can appear in the board's column order is a [`Column`]:
//! shared identity/geometry/usability state plus one of three kinds. Data
//! columns produce one value per player (native stats or a custom player
//! store), country-flag columns map a stored country index onto a 16x16
//! icon atlas, and composite columns group data sub-columns under a single
//! header.

use crate::assets::{AssetSource, TextureHandle};
use crate::config::ConfigVars;
use crate::draw::{DrawTarget, HorizAlign, Rect, Rgba, align_offset, center_align, with_alpha};
use crate::game::{EarnFlags, GameMode, GameModel, MAX_PLAYERS};
use crate::scan::{ParseError, ScannerExt, ScriptScanner};
use crate::value::{PlayerData, PlayerValue, ValueKind};
use bitflags::bitflags;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::str::FromStr;
use std::sync::Arc;

/// The "ctryflag" style atlas is a 16x16 grid of flag icons.
pub const FLAGS_PER_SIDE: u32 = 16;

/// Native per-player stats a data column can display without a custom
/// player store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnType {
    Name,
    Index,
    Time,
    Ping,
    Frags,
    Points,
    Wins,
    Kills,
    Deaths,
    Lives,
    Handicap,
    Vote,
    CountryName,
    CountryCode,
    CountryFlag,
    Custom,
}

/// Declared tie-break direction of a ranked column. Which direction each
/// native type sorts is fixed here, not globally.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortDir {
    HigherWins,
    LowerWins,
}

impl ColumnType {
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Some(Self::Name),
            "index" => Some(Self::Index),
            "time" => Some(Self::Time),
            "ping" => Some(Self::Ping),
            "frags" => Some(Self::Frags),
            "points" => Some(Self::Points),
            "wins" => Some(Self::Wins),
            "kills" => Some(Self::Kills),
            "deaths" => Some(Self::Deaths),
            "lives" => Some(Self::Lives),
            "handicap" => Some(Self::Handicap),
            "vote" => Some(Self::Vote),
            "countryname" => Some(Self::CountryName),
            "countrycode" => Some(Self::CountryCode),
            "countryflag" => Some(Self::CountryFlag),
            _ => None,
        }
    }

    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Index => "index",
            Self::Time => "time",
            Self::Ping => "ping",
            Self::Frags => "frags",
            Self::Points => "points",
            Self::Wins => "wins",
            Self::Kills => "kills",
            Self::Deaths => "deaths",
            Self::Lives => "lives",
            Self::Handicap => "handicap",
            Self::Vote => "vote",
            Self::CountryName => "countryname",
            Self::CountryCode => "countrycode",
            Self::CountryFlag => "countryflag",
            Self::Custom => "custom",
        }
    }

    pub const fn sort_dir(self) -> Option<SortDir> {
        match self {
            Self::Frags | Self::Points | Self::Wins | Self::Kills | Self::Lives => {
                Some(SortDir::HigherWins)
            }
            Self::Deaths | Self::Ping => Some(SortDir::LowerWins),
            _ => None,
        }
    }

    /// The earn flag the current mode must award for this stat to mean
    /// anything. `None` means the stat is always meaningful.
    pub const fn required_earn(self) -> Option<EarnFlags> {
        match self {
            Self::Frags => Some(EarnFlags::FRAGS),
            Self::Points => Some(EarnFlags::POINTS),
            Self::Wins => Some(EarnFlags::WINS),
            Self::Kills => Some(EarnFlags::KILLS),
            _ => None,
        }
    }

    const fn is_graphic(self) -> bool {
        matches!(self, Self::CountryFlag)
    }
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct ColumnFlags: u32 {
        const DONT_SHOW_HEADER  = 1 << 0;
        const NO_SPECTATORS     = 1 << 1;
        const REQUIRES_TEAMS    = 1 << 2;
        const FORBIDS_TEAMS     = 1 << 3;
        const REQUIRES_LIVES    = 1 << 4;
        const FORBIDS_LIVES     = 1 << 5;
        const ONLINE_ONLY       = 1 << 6;
        const OFFLINE_ONLY      = 1 << 7;
        const INTERMISSION_ONLY = 1 << 8;
        const NO_INTERMISSION   = 1 << 9;
    }
}

impl ColumnFlags {
    fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "dontshowheader" => Some(Self::DONT_SHOW_HEADER),
            "nospectators" => Some(Self::NO_SPECTATORS),
            "requiresteams" => Some(Self::REQUIRES_TEAMS),
            "forbidsteams" => Some(Self::FORBIDS_TEAMS),
            "requireslives" => Some(Self::REQUIRES_LIVES),
            "forbidslives" => Some(Self::FORBIDS_LIVES),
            "onlineonly" => Some(Self::ONLINE_ONLY),
            "offlineonly" => Some(Self::OFFLINE_ONLY),
            "intermissiononly" => Some(Self::INTERMISSION_ONLY),
            "nointermission" => Some(Self::NO_INTERMISSION),
            _ => None,
        }
    }
}

/// How a column earns its width. Inside a composite, `Fixed` acts as a
/// minimum instead of an absolute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizePolicy {
    Fixed(u32),
    FitContents,
    FitHeader,
}

/// A column can be tied to a host config variable; it is disabled unless
/// the variable's integer value lies in `[min, max]`.
#[derive(Clone, Debug)]
pub struct CvarGate {
    pub var: String,
    pub min: i64,
    pub max: i64,
}

/// Fonts and spacing the board resolved for this frame's layout pass.
pub struct LayoutStyle {
    pub header_font: crate::assets::FontHandle,
    pub row_font: crate::assets::FontHandle,
    pub padding: u32,
}

#[derive(Clone)]
pub struct Column {
    internal_name: String,
    display_name: Option<String>,
    short_name: Option<String>,
    alignment: HorizAlign,
    sizing: SizePolicy,
    flags: ColumnFlags,
    cvar_gate: Option<CvarGate>,
    game_modes: SmallVec<[GameMode; 4]>,
    priority_modes: SmallVec<[GameMode; 4]>,
    forbidden_modes: SmallVec<[GameMode; 4]>,
    earn_flags: EarnFlags,
    shortest_width: u32,
    shortest_height: u32,
    width: u32,
    rel_x: i32,
    usable: bool,
    disabled: bool,
    use_short_name: bool,
    attached: bool,
    kind: ColumnKind,
}

#[derive(Clone)]
pub enum ColumnKind {
    Data(DataColumn),
    CountryFlag(CountryFlagColumn),
    Composite(CompositeColumn),
}

#[derive(Clone)]
pub struct DataColumn {
    native: ColumnType,
    prefix: String,
    suffix: String,
    true_text: String,
    false_text: String,
    max_length: usize,
    clip_width: i32,
    clip_height: i32,
    texture_scale: f32,
    data: Option<PlayerData>,
}

impl DataColumn {
    fn new(native: ColumnType) -> Self {
        Self {
            native,
            prefix: String::new(),
            suffix: String::new(),
            true_text: String::new(),
            false_text: String::new(),
            max_length: 0,
            clip_width: 0,
            clip_height: 0,
            texture_scale: 1.0,
            data: None,
        }
    }
}

#[derive(Clone)]
pub struct CountryFlagColumn {
    data: DataColumn,
    atlas_name: String,
    atlas: Option<TextureHandle>,
}

#[derive(Clone)]
pub struct CompositeColumn {
    sub_columns: Vec<Column>,
    gap: u32,
}

impl Column {
    fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            internal_name: name.to_ascii_lowercase(),
            display_name: None,
            short_name: None,
            alignment: HorizAlign::Left,
            sizing: SizePolicy::FitContents,
            flags: ColumnFlags::empty(),
            cvar_gate: None,
            game_modes: SmallVec::new(),
            priority_modes: SmallVec::new(),
            forbidden_modes: SmallVec::new(),
            earn_flags: EarnFlags::empty(),
            shortest_width: 0,
            shortest_height: 0,
            width: 0,
            rel_x: 0,
            usable: false,
            disabled: false,
            use_short_name: false,
            attached: false,
            kind,
        }
    }

    pub fn internal_name(&self) -> &str {
        &self.internal_name
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn short_name(&self) -> Option<&str> {
        self.short_name.as_deref()
    }

    pub fn alignment(&self) -> HorizAlign {
        self.alignment
    }

    pub fn kind(&self) -> &ColumnKind {
        &self.kind
    }

    pub fn kind_mut(&mut self) -> &mut ColumnKind {
        &mut self.kind
    }

    /// Valid only after the current frame's layout pass.
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn shortest_width(&self) -> u32 {
        self.shortest_width
    }

    pub fn shortest_height(&self) -> u32 {
        self.shortest_height
    }

    pub fn rel_x(&self) -> i32 {
        self.rel_x
    }

    pub fn set_rel_x(&mut self, x: i32) {
        self.rel_x = x;
    }

    pub fn is_usable(&self) -> bool {
        self.usable
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn attach(&mut self) {
        self.attached = true;
    }

    pub fn hides_header(&self) -> bool {
        self.flags.contains(ColumnFlags::DONT_SHOW_HEADER)
    }

    /// Tie-break direction when this column appears in the rank order.
    pub fn sort_dir(&self) -> Option<SortDir> {
        match &self.kind {
            ColumnKind::Data(d) | ColumnKind::CountryFlag(CountryFlagColumn { data: d, .. }) => {
                if d.native == ColumnType::Custom {
                    match d.data.as_ref().map(PlayerData::kind) {
                        Some(ValueKind::Int | ValueKind::Float | ValueKind::Bool) => {
                            Some(SortDir::HigherWins)
                        }
                        _ => None,
                    }
                } else {
                    d.native.sort_dir()
                }
            }
            ColumnKind::Composite(_) => None,
        }
    }

    /// Numeric key for the rank comparator. Only meaningful for columns
    /// with a sort direction.
    pub fn rank_key(&self, player: usize, game: &dyn GameModel) -> f64 {
        match self.player_value(player, game) {
            PlayerValue::Int(v) => v as f64,
            PlayerValue::Float(v) => v as f64,
            PlayerValue::Bool(v) => v as u8 as f64,
            _ => 0.0,
        }
    }

    /// Custom columns expose their backing store to game logic.
    pub fn player_data(&self) -> Option<&PlayerData> {
        match &self.kind {
            ColumnKind::Data(d) | ColumnKind::CountryFlag(CountryFlagColumn { data: d, .. }) => {
                d.data.as_ref()
            }
            ColumnKind::Composite(_) => None,
        }
    }

    pub fn player_data_mut(&mut self) -> Option<&mut PlayerData> {
        match &mut self.kind {
            ColumnKind::Data(d) | ColumnKind::CountryFlag(CountryFlagColumn { data: d, .. }) => {
                d.data.as_mut()
            }
            ColumnKind::Composite(_) => None,
        }
    }

    pub fn sub_columns(&self) -> &[Column] {
        match &self.kind {
            ColumnKind::Composite(c) => &c.sub_columns,
            _ => &[],
        }
    }

    // --- Usability ---

    /// Recompute whether the column applies to the current game. Pure
    /// recomputation from current state; calling it twice without a state
    /// change yields the same answer.
    pub fn check_if_usable(&mut self, game: &dyn GameModel, cfg: &dyn ConfigVars) {
        if let ColumnKind::Composite(c) = &mut self.kind {
            for sub in &mut c.sub_columns {
                sub.check_if_usable(game, cfg);
            }
        }
        self.usable = self.compute_usable(game, cfg);
    }

    fn compute_usable(&self, game: &dyn GameModel, cfg: &dyn ConfigVars) -> bool {
        if self.disabled {
            return false;
        }
        if let Some(gate) = &self.cvar_gate {
            let value = cfg.get_int(&gate.var).unwrap_or(0);
            if value < gate.min || value > gate.max {
                return false;
            }
        }

        let mode = game.game_mode();
        if self.forbidden_modes.contains(&mode) {
            return false;
        }
        let prioritized = self.priority_modes.contains(&mode);
        if !self.game_modes.is_empty() || !self.priority_modes.is_empty() {
            if !self.game_modes.contains(&mode) && !prioritized {
                return false;
            }
        }

        let f = self.flags;
        let teams = game.mode_is_team_based();
        let lives = game.mode_uses_lives();
        if f.contains(ColumnFlags::REQUIRES_TEAMS) && !teams {
            return false;
        }
        if f.contains(ColumnFlags::FORBIDS_TEAMS) && teams {
            return false;
        }
        if f.contains(ColumnFlags::REQUIRES_LIVES) && !lives {
            return false;
        }
        if f.contains(ColumnFlags::FORBIDS_LIVES) && lives {
            return false;
        }
        if f.contains(ColumnFlags::ONLINE_ONLY) && !game.is_online() {
            return false;
        }
        if f.contains(ColumnFlags::OFFLINE_ONLY) && game.is_online() {
            return false;
        }
        if f.contains(ColumnFlags::INTERMISSION_ONLY) && !game.in_intermission() {
            return false;
        }
        if f.contains(ColumnFlags::NO_INTERMISSION) && game.in_intermission() {
            return false;
        }

        // Priority modes keep a stat column visible even when the mode
        // does not award that stat.
        if !prioritized {
            let mut required = EarnFlags::empty();
            if let ColumnKind::Data(d) | ColumnKind::CountryFlag(CountryFlagColumn { data: d, .. }) =
                &self.kind
            {
                if let Some(earn) = d.native.required_earn() {
                    required |= earn;
                }
            }
            required |= self.earn_flags;
            if !required.is_empty() && (required & game.mode_earn_flags()).is_empty() {
                return false;
            }
        }

        // A composite with no usable sub-column has nothing to show.
        if let ColumnKind::Composite(c) = &self.kind {
            if !c.sub_columns.iter().any(|sub| sub.usable) {
                return false;
            }
        }

        true
    }

    fn can_draw_for_player(&self, player: usize, game: &dyn GameModel) -> bool {
        if !game.player_in_game(player) {
            return false;
        }
        if self.flags.contains(ColumnFlags::NO_SPECTATORS) && game.player_is_spectator(player) {
            return false;
        }
        true
    }

    // --- Content pass ---

    /// Recompute match-state-dependent content; geometry is `update`'s job.
    pub fn refresh(&mut self, game: &dyn GameModel, assets: &dyn AssetSource) {
        match &mut self.kind {
            ColumnKind::CountryFlag(c) => {
                if c.atlas.is_none() {
                    c.atlas = assets.texture(&c.atlas_name);
                }
            }
            ColumnKind::Composite(c) => {
                for sub in &mut c.sub_columns {
                    sub.refresh(game, assets);
                }
            }
            ColumnKind::Data(_) => {}
        }
    }

    /// One player's value for this column.
    pub fn player_value(&self, player: usize, game: &dyn GameModel) -> PlayerValue {
        let d = match &self.kind {
            ColumnKind::Data(d) => d,
            ColumnKind::CountryFlag(c) => &c.data,
            ColumnKind::Composite(_) => return PlayerValue::None,
        };
        match d.native {
            ColumnType::Name => PlayerValue::Text(Arc::from(game.player_name(player))),
            ColumnType::Index => PlayerValue::Int(player as i32),
            ColumnType::Time => PlayerValue::Int(game.player_time_minutes(player)),
            ColumnType::Ping => PlayerValue::Int(game.player_ping(player)),
            ColumnType::Frags => PlayerValue::Int(game.player_frags(player)),
            ColumnType::Points => PlayerValue::Int(game.player_points(player)),
            ColumnType::Wins => PlayerValue::Int(game.player_wins(player)),
            ColumnType::Kills => PlayerValue::Int(game.player_kills(player)),
            ColumnType::Deaths => PlayerValue::Int(game.player_deaths(player)),
            ColumnType::Lives => PlayerValue::Int(game.player_lives(player)),
            ColumnType::Handicap => PlayerValue::Int(game.player_handicap(player)),
            ColumnType::Vote => match game.player_vote(player) {
                Some(true) => PlayerValue::Text(Arc::from("yes")),
                Some(false) => PlayerValue::Text(Arc::from("no")),
                None => PlayerValue::None,
            },
            ColumnType::CountryName => {
                PlayerValue::Text(Arc::from(game.player_country_name(player)))
            }
            ColumnType::CountryCode => {
                PlayerValue::Text(Arc::from(game.player_country_code(player)))
            }
            ColumnType::CountryFlag => PlayerValue::Int(game.player_country_index(player) as i32),
            ColumnType::Custom => d
                .data
                .as_ref()
                .map(|data| data.value(player))
                .unwrap_or_default(),
        }
    }

    /// Cell text with prefix/suffix and true/false substitution applied.
    pub fn value_string(&self, value: &PlayerValue) -> String {
        let d = match &self.kind {
            ColumnKind::Data(d) => d,
            ColumnKind::CountryFlag(c) => &c.data,
            ColumnKind::Composite(_) => return String::new(),
        };
        let body = match value {
            PlayerValue::None | PlayerValue::Texture(_) => return String::new(),
            PlayerValue::Bool(b) => {
                let subst = if *b { &d.true_text } else { &d.false_text };
                if subst.is_empty() {
                    value.serialize()
                } else {
                    subst.clone()
                }
            }
            other => other.serialize(),
        };
        let mut s = format!("{}{}{}", d.prefix, body, d.suffix);
        if d.max_length > 0 {
            if let Some((cut, _)) = s.char_indices().nth(d.max_length) {
                s.truncate(cut);
            }
        }
        s
    }

    fn value_extent(&self, value: &PlayerValue, style: &LayoutStyle, get_height: bool) -> u32 {
        match &self.kind {
            ColumnKind::CountryFlag(c) => {
                // Fixed cell size from the atlas grid, value-independent.
                let Some(atlas) = &c.atlas else { return 0 };
                if get_height {
                    atlas.height / FLAGS_PER_SIDE
                } else {
                    atlas.width / FLAGS_PER_SIDE
                }
            }
            ColumnKind::Data(d) => {
                if d.native.is_graphic() || matches!(value, PlayerValue::Texture(_)) {
                    let Some(tex) = (match value {
                        PlayerValue::Texture(t) => Some(t.clone()),
                        _ => None,
                    }) else {
                        return 0;
                    };
                    let raw = if get_height { tex.height } else { tex.width };
                    (raw as f32 * d.texture_scale) as u32
                } else if get_height {
                    style.row_font.line_height()
                } else {
                    style.row_font.string_width(&self.value_string(value))
                }
            }
            ColumnKind::Composite(_) => 0,
        }
    }

    fn header_text(&self) -> Option<&str> {
        if self.hides_header() {
            return None;
        }
        if self.use_short_name {
            self.short_name.as_deref().or(self.display_name.as_deref())
        } else {
            self.display_name.as_deref()
        }
    }

    // --- Layout pass ---

    /// Recompute shortest/actual width from current content, honoring the
    /// sizing policy.
    pub fn update(&mut self, game: &dyn GameModel, style: &LayoutStyle) {
        if let ColumnKind::Composite(c) = &mut self.kind {
            for sub in &mut c.sub_columns {
                sub.update(game, style);
            }
            let gap = c.gap;
            let mut total = 0;
            let mut height = 0;
            let mut visible = 0;
            for sub in &mut c.sub_columns {
                if !sub.usable || sub.disabled {
                    continue;
                }
                // Sub-columns pack on bare content width; a fixed size
                // acts as a minimum, and board padding does not apply
                // inside the group.
                let w = match sub.sizing {
                    SizePolicy::Fixed(min) => sub.shortest_width.max(min),
                    _ => sub.shortest_width,
                };
                sub.width = w;
                total += w + if visible > 0 { gap } else { 0 };
                height = height.max(sub.shortest_height);
                visible += 1;
            }
            self.shortest_width = total;
            self.shortest_height = height;
            self.width = total;
            self.use_short_name = false;
            return;
        }

        let mut content = 0;
        let mut height = 0;
        for player in 0..MAX_PLAYERS {
            if !self.can_draw_for_player(player, game) {
                continue;
            }
            let value = self.player_value(player, game);
            if value.is_none() {
                continue;
            }
            content = content.max(self.value_extent(&value, style, false));
            height = height.max(self.value_extent(&value, style, true));
        }
        self.shortest_width = content;
        self.shortest_height = height.max(style.row_font.line_height());

        let pad = style.padding * 2;
        let header_width = |name: Option<&str>| {
            name.map_or(0, |n| style.header_font.string_width(n))
        };
        self.width = match self.sizing {
            SizePolicy::Fixed(w) => w,
            SizePolicy::FitContents => content + pad,
            SizePolicy::FitHeader => header_width(self.display_name.as_deref()) + pad,
        };

        // Fall back to the short name when the full header does not fit.
        self.use_short_name = !self.hides_header()
            && self.short_name.is_some()
            && header_width(self.display_name.as_deref()) + pad > self.width;
    }

    // --- Draw pass ---

    /// Draw this column's header at `left`, the column's absolute left
    /// edge for this frame.
    pub fn draw_header(
        &self,
        left: i32,
        y: i32,
        height: u32,
        alpha: f32,
        color: Rgba,
        style: &LayoutStyle,
        target: &mut dyn DrawTarget,
    ) {
        let Some(text) = self.header_text() else {
            return;
        };
        let clip = Rect::new(left, y, self.width as i32, height as i32);
        let text_w = style.header_font.string_width(text);
        let x = left + align_offset(self.alignment, self.width, text_w.min(self.width));
        let ty = y + center_align(height as i32, style.header_font.line_height() as i32);
        target.draw_string(
            &style.header_font,
            with_alpha(color, alpha),
            x,
            ty,
            text,
            Some(clip),
        );
    }

    /// Draw one player's cell. Clips to the column's resolved box and
    /// skips players the column does not apply to.
    pub fn draw_value(
        &self,
        player: usize,
        left: i32,
        y: i32,
        height: u32,
        alpha: f32,
        color: Rgba,
        style: &LayoutStyle,
        game: &dyn GameModel,
        target: &mut dyn DrawTarget,
    ) {
        if !self.usable || !self.can_draw_for_player(player, game) {
            return;
        }

        match &self.kind {
            ColumnKind::Composite(c) => {
                let mut x = left;
                for sub in &c.sub_columns {
                    if !sub.usable || sub.disabled {
                        continue;
                    }
                    sub.draw_value(player, x, y, height, alpha, color, style, game, target);
                    x += sub.width as i32 + c.gap as i32;
                }
            }
            ColumnKind::CountryFlag(c) => {
                let Some(atlas) = &c.atlas else { return };
                let value = self.player_value(player, game);
                if value.is_none() {
                    return;
                }
                let cell_w = atlas.width / FLAGS_PER_SIDE;
                let cell_h = atlas.height / FLAGS_PER_SIDE;
                let index = value.int().clamp(0, (FLAGS_PER_SIDE * FLAGS_PER_SIDE - 1) as i32)
                    as u32;
                let src = Rect::new(
                    ((index % FLAGS_PER_SIDE) * cell_w) as i32,
                    ((index / FLAGS_PER_SIDE) * cell_h) as i32,
                    cell_w as i32,
                    cell_h as i32,
                );
                let x = left + align_offset(self.alignment, self.width, cell_w.min(self.width));
                let ty = y + center_align(height as i32, cell_h as i32);
                let clip = self.cell_clip(left, y, height, &c.data);
                target.draw_texture(atlas, x, ty, 1.0, Some(src), Some(clip));
            }
            ColumnKind::Data(d) => {
                let value = self.player_value(player, game);
                if value.is_none() {
                    return;
                }
                let clip = self.cell_clip(left, y, height, d);
                if let PlayerValue::Texture(tex) = &value {
                    let w = (tex.width as f32 * d.texture_scale) as u32;
                    let h = (tex.height as f32 * d.texture_scale) as i32;
                    let x = left + align_offset(self.alignment, self.width, w.min(self.width));
                    let ty = y + center_align(height as i32, h);
                    target.draw_texture(tex, x, ty, d.texture_scale, None, Some(clip));
                } else {
                    let text = self.value_string(&value);
                    if text.is_empty() {
                        return;
                    }
                    let text_w = style.row_font.string_width(&text);
                    let x =
                        left + align_offset(self.alignment, self.width, text_w.min(self.width));
                    let ty =
                        y + center_align(height as i32, style.row_font.line_height() as i32);
                    target.draw_string(
                        &style.row_font,
                        with_alpha(color, alpha),
                        x,
                        ty,
                        &text,
                        Some(clip),
                    );
                }
            }
        }
    }

    /// Cell clip rect: the column box, shrunk further by any explicit
    /// clip-size overrides from the script.
    fn cell_clip(&self, left: i32, y: i32, height: u32, d: &DataColumn) -> Rect {
        let mut w = self.width as i32;
        let mut h = height as i32;
        if d.clip_width > 0 {
            w = w.min(d.clip_width);
        }
        if d.clip_height > 0 {
            h = h.min(d.clip_height);
        }
        Rect::new(left, y, w, h)
    }

    // --- Parsing ---

    /// Parse one `column`/`customcolumn` declaration body: the name was
    /// already consumed, the opening brace has not been.
    pub(crate) fn parse_data(
        sc: &mut dyn ScriptScanner,
        name: &str,
        custom: bool,
        data_index: u8,
    ) -> Result<Self, ParseError> {
        let open_line = sc.line();
        sc.expect_sym("{")?;

        let kind = if custom {
            ColumnKind::Data(DataColumn::new(ColumnType::Custom))
        } else {
            // The native type keyword leads the block so the right variant
            // exists before any other property is applied.
            let keyword = sc.expect("\"type\"")?;
            if !keyword.eq_ignore_ascii_case("type") {
                return Err(ParseError::Expected {
                    line: sc.line(),
                    expected: "\"type\" as the first column property",
                    got: keyword,
                });
            }
            sc.expect_sym("=")?;
            let type_token = sc.expect("a column type")?;
            let native =
                ColumnType::from_keyword(&type_token).ok_or_else(|| ParseError::Unknown {
                    line: sc.line(),
                    what: "column type",
                    name: type_token.clone(),
                })?;
            if native == ColumnType::CountryFlag {
                ColumnKind::CountryFlag(CountryFlagColumn {
                    data: DataColumn::new(native),
                    atlas_name: "ctryflag".into(),
                    atlas: None,
                })
            } else {
                ColumnKind::Data(DataColumn::new(native))
            }
        };

        let mut column = Self::new(name, kind);
        let mut custom_kind = ValueKind::Int;
        let mut custom_default = String::new();

        loop {
            if !sc.advance() {
                return Err(ParseError::Unterminated {
                    line: open_line,
                    what: "column block",
                });
            }
            if sc.token() == "}" {
                break;
            }
            let keyword = sc.token().to_ascii_lowercase();
            if column.parse_shared_property(sc, &keyword)? {
                continue;
            }
            let d = match &mut column.kind {
                ColumnKind::Data(d) => d,
                ColumnKind::CountryFlag(c) => {
                    if keyword == "flagtexture" {
                        sc.expect_sym("=")?;
                        c.atlas_name = sc.expect("a texture name")?;
                        continue;
                    }
                    &mut c.data
                }
                ColumnKind::Composite(_) => unreachable!("parse_data never builds composites"),
            };
            match keyword.as_str() {
                "prefix" => {
                    sc.expect_sym("=")?;
                    d.prefix = sc.expect("a prefix string")?;
                }
                "suffix" => {
                    sc.expect_sym("=")?;
                    d.suffix = sc.expect("a suffix string")?;
                }
                "truetext" => {
                    sc.expect_sym("=")?;
                    d.true_text = sc.expect("a string")?;
                }
                "falsetext" => {
                    sc.expect_sym("=")?;
                    d.false_text = sc.expect("a string")?;
                }
                "maxlength" => {
                    sc.expect_sym("=")?;
                    d.max_length = sc.expect_int()?.max(0) as usize;
                }
                "clipwidth" => {
                    sc.expect_sym("=")?;
                    d.clip_width = sc.expect_int()? as i32;
                }
                "clipheight" => {
                    sc.expect_sym("=")?;
                    d.clip_height = sc.expect_int()? as i32;
                }
                "texturescale" => {
                    sc.expect_sym("=")?;
                    d.texture_scale = sc.expect_float()?;
                }
                "datatype" if custom => {
                    sc.expect_sym("=")?;
                    let token = sc.expect("a data type")?;
                    custom_kind = token.parse().map_err(|()| ParseError::Unknown {
                        line: sc.line(),
                        what: "data type",
                        name: token,
                    })?;
                }
                "defaultvalue" if custom => {
                    sc.expect_sym("=")?;
                    custom_default = sc.expect("a default value")?;
                }
                _ => {
                    return Err(ParseError::Unknown {
                        line: sc.line(),
                        what: "column property",
                        name: keyword,
                    });
                }
            }
        }

        if custom {
            let d = match &mut column.kind {
                ColumnKind::Data(d) => d,
                _ => unreachable!(),
            };
            d.data = Some(PlayerData::new(custom_kind, custom_default, data_index));
        }
        Ok(column)
    }

    /// Parse one `compositecolumn` declaration body.
    pub(crate) fn parse_composite(
        sc: &mut dyn ScriptScanner,
        name: &str,
        next_data_index: &mut u8,
    ) -> Result<Self, ParseError> {
        let open_line = sc.line();
        sc.expect_sym("{")?;
        let mut column = Self::new(
            name,
            ColumnKind::Composite(CompositeColumn {
                sub_columns: Vec::new(),
                gap: 2,
            }),
        );

        loop {
            if !sc.advance() {
                return Err(ParseError::Unterminated {
                    line: open_line,
                    what: "composite column block",
                });
            }
            if sc.token() == "}" {
                break;
            }
            let keyword = sc.token().to_ascii_lowercase();
            if column.parse_shared_property(sc, &keyword)? {
                continue;
            }
            let c = match &mut column.kind {
                ColumnKind::Composite(c) => c,
                _ => unreachable!(),
            };
            match keyword.as_str() {
                "gap" => {
                    sc.expect_sym("=")?;
                    c.gap = sc.expect_int()?.max(0) as u32;
                }
                "column" | "customcolumn" => {
                    let custom = keyword == "customcolumn";
                    let sub_name = sc.expect("a column name")?;
                    if c.sub_columns
                        .iter()
                        .any(|s| s.internal_name.eq_ignore_ascii_case(&sub_name))
                    {
                        return Err(ParseError::Duplicate {
                            line: sc.line(),
                            what: "sub-column",
                            name: sub_name,
                        });
                    }
                    let index = *next_data_index;
                    let mut sub = Self::parse_data(sc, &sub_name, custom, index)?;
                    if custom {
                        *next_data_index += 1;
                    }
                    // Sub-column headers are never shown; the composite
                    // draws one header for the whole group.
                    sub.flags |= ColumnFlags::DONT_SHOW_HEADER;
                    c.sub_columns.push(sub);
                }
                _ => {
                    return Err(ParseError::Unknown {
                        line: sc.line(),
                        what: "composite column property",
                        name: keyword,
                    });
                }
            }
        }

        if column.sub_columns().is_empty() {
            return Err(ParseError::invalid(
                open_line,
                format!("composite column \"{name}\" declares no sub-columns"),
            ));
        }
        Ok(column)
    }

    /// Properties shared by every column kind. Returns `true` when the
    /// keyword was recognized and consumed.
    fn parse_shared_property(
        &mut self,
        sc: &mut dyn ScriptScanner,
        keyword: &str,
    ) -> Result<bool, ParseError> {
        match keyword {
            "displayname" => {
                sc.expect_sym("=")?;
                self.display_name = Some(sc.expect("a display name")?);
            }
            "shortname" => {
                sc.expect_sym("=")?;
                self.short_name = Some(sc.expect("a short name")?);
            }
            "alignment" => {
                sc.expect_sym("=")?;
                let token = sc.expect("an alignment")?;
                self.alignment = token.parse().map_err(|()| ParseError::Unknown {
                    line: sc.line(),
                    what: "alignment",
                    name: token,
                })?;
            }
            "size" => {
                sc.expect_sym("=")?;
                let token = sc.expect("a size policy")?;
                self.sizing = match token.to_ascii_lowercase().as_str() {
                    "contents" => SizePolicy::FitContents,
                    "header" => SizePolicy::FitHeader,
                    _ => {
                        let w = token.parse().map_err(|_| ParseError::BadArgument {
                            line: sc.line(),
                            expected: "column width, \"contents\" or \"header\"",
                            token,
                        })?;
                        SizePolicy::Fixed(w)
                    }
                };
            }
            "flags" => {
                sc.expect_sym("=")?;
                loop {
                    let token = sc.expect("a column flag")?;
                    let flag =
                        ColumnFlags::from_keyword(&token).ok_or_else(|| ParseError::Unknown {
                            line: sc.line(),
                            what: "column flag",
                            name: token,
                        })?;
                    self.flags |= flag;
                    if !sc.accept(",") {
                        break;
                    }
                }
            }
            "gamemodes" | "prioritygamemodes" | "forbiddengamemodes" => {
                sc.expect_sym("=")?;
                let mut modes: SmallVec<[GameMode; 4]> = SmallVec::new();
                loop {
                    let token = sc.expect("a game mode")?;
                    let mode = GameMode::from_str(&token).map_err(|()| ParseError::Unknown {
                        line: sc.line(),
                        what: "game mode",
                        name: token,
                    })?;
                    modes.push(mode);
                    if !sc.accept(",") {
                        break;
                    }
                }
                match keyword {
                    "gamemodes" => self.game_modes = modes,
                    "prioritygamemodes" => self.priority_modes = modes,
                    _ => self.forbidden_modes = modes,
                }
            }
            "earntypes" => {
                sc.expect_sym("=")?;
                loop {
                    let token = sc.expect("an earn type")?;
                    let earn =
                        EarnFlags::from_keyword(&token).ok_or_else(|| ParseError::Unknown {
                            line: sc.line(),
                            what: "earn type",
                            name: token,
                        })?;
                    self.earn_flags |= earn;
                    if !sc.accept(",") {
                        break;
                    }
                }
            }
            "cvar" => {
                sc.expect_sym("=")?;
                self.cvar_gate = Some(CvarGate {
                    var: sc.expect("a variable name")?,
                    min: 1,
                    max: i64::MAX,
                });
            }
            "cvarmin" | "cvarmax" => {
                sc.expect_sym("=")?;
                let bound = sc.expect_int()?;
                let Some(gate) = self.cvar_gate.as_mut() else {
                    return Err(ParseError::invalid(
                        sc.line(),
                        format!("\"{keyword}\" given before \"cvar\""),
                    ));
                };
                if keyword == "cvarmin" {
                    gate.min = bound;
                } else {
                    gate.max = bound;
                }
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

/// Template columns declared by the script. Boards clone a template into
/// an owned instance when it joins their column order; the registry keeps
/// the unattached original.
#[derive(Default)]
pub struct ColumnRegistry {
    columns: FxHashMap<String, Column>,
    next_data_index: u8,
}

impl ColumnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.get(&name.to_ascii_lowercase())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.get_mut(&name.to_ascii_lowercase())
    }

    /// Clone a template into an instance owned by a board.
    pub fn instantiate(&self, name: &str) -> Option<Column> {
        let mut column = self.get(name)?.clone();
        column.attach();
        Some(column)
    }

    /// Parse a top-level `column`/`customcolumn`/`compositecolumn`
    /// declaration, whose keyword was already consumed.
    pub fn parse_declaration(
        &mut self,
        sc: &mut dyn ScriptScanner,
        keyword: &str,
    ) -> Result<(), ParseError> {
        let name = sc.expect("a column name")?;
        if self.columns.contains_key(&name.to_ascii_lowercase()) {
            return Err(ParseError::Duplicate {
                line: sc.line(),
                what: "column",
                name,
            });
        }
        let column = match keyword {
            "column" => Column::parse_data(sc, &name, false, 0)?,
            "customcolumn" => {
                let index = self.next_data_index;
                let column = Column::parse_data(sc, &name, true, index)?;
                self.next_data_index += 1;
                column
            }
            "compositecolumn" => Column::parse_composite(sc, &name, &mut self.next_data_index)?,
            _ => unreachable!("caller only dispatches column keywords"),
        };
        self.columns.insert(column.internal_name.clone(), column);
        Ok(())
    }
}
