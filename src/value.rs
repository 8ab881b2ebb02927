//! Per-player values for data columns.
//!
//! A [`PlayerValue`] holds exactly one of the supported kinds. Payloads are
//! value-semantic: text is a shared `Arc<str>`, textures are shared asset
//! handles, so assignment never deep-clones and destruction is automatic.
//! Reading a value as the wrong kind is a contract violation, not a
//! recoverable condition; the accessors fail loudly instead of coercing.

use crate::assets::{AssetSource, TextureHandle};
use crate::game::MAX_PLAYERS;
use log::warn;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    None,
    Int,
    Bool,
    Float,
    Text,
    Texture,
}

impl FromStr for ValueKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "int" => Ok(Self::Int),
            "bool" => Ok(Self::Bool),
            "float" => Ok(Self::Float),
            "string" | "text" => Ok(Self::Text),
            "texture" | "graphic" => Ok(Self::Texture),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub enum PlayerValue {
    #[default]
    None,
    Int(i32),
    Bool(bool),
    Float(f32),
    Text(Arc<str>),
    Texture(TextureHandle),
}

impl PlayerValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::None => ValueKind::None,
            Self::Int(_) => ValueKind::Int,
            Self::Bool(_) => ValueKind::Bool,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
            Self::Texture(_) => ValueKind::Texture,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Unset slots read as zero; any other kind is a programming error.
    pub fn int(&self) -> i32 {
        match self {
            Self::Int(v) => *v,
            Self::None => 0,
            other => panic!("player value read as int but holds {:?}", other.kind()),
        }
    }

    pub fn boolean(&self) -> bool {
        match self {
            Self::Bool(v) => *v,
            Self::None => false,
            other => panic!("player value read as bool but holds {:?}", other.kind()),
        }
    }

    pub fn float(&self) -> f32 {
        match self {
            Self::Float(v) => *v,
            Self::None => 0.0,
            other => panic!("player value read as float but holds {:?}", other.kind()),
        }
    }

    pub fn text(&self) -> Arc<str> {
        match self {
            Self::Text(v) => v.clone(),
            Self::None => Arc::from(""),
            other => panic!("player value read as text but holds {:?}", other.kind()),
        }
    }

    pub fn texture(&self) -> Option<TextureHandle> {
        match self {
            Self::Texture(v) => Some(v.clone()),
            Self::None => None,
            other => panic!("player value read as texture but holds {:?}", other.kind()),
        }
    }

    /// Serialized form. Textures serialize by asset name; the round trip
    /// back goes through [`PlayerValue::parse`] with an asset source.
    pub fn serialize(&self) -> String {
        match self {
            Self::None => String::new(),
            Self::Int(v) => v.to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(v) => v.to_string(),
            Self::Texture(v) => v.name.to_string(),
        }
    }

    /// Parse `s` as `kind`. Numeric parses are forgiving (bad input reads
    /// as zero, like the C `atoi` family); a texture name that does not
    /// resolve yields `None` and the column simply shows nothing for that
    /// slot until the asset exists.
    pub fn parse(s: &str, kind: ValueKind, assets: &dyn AssetSource) -> Self {
        let s = s.trim();
        match kind {
            ValueKind::None => Self::None,
            ValueKind::Int => Self::Int(s.parse().unwrap_or_default()),
            ValueKind::Bool => Self::Bool(matches!(s.to_ascii_lowercase().as_str(), "true" | "1")),
            ValueKind::Float => Self::Float(s.parse().unwrap_or_default()),
            ValueKind::Text => Self::Text(Arc::from(s)),
            ValueKind::Texture => match assets.texture(s) {
                Some(tex) => Self::Texture(tex),
                None => {
                    if !s.is_empty() {
                        warn!("texture \"{s}\" not found, value left unset");
                    }
                    Self::None
                }
            },
        }
    }
}

impl PartialEq for PlayerValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            // Textures compare by the asset they were resolved from.
            (Self::Texture(a), Self::Texture(b)) => a.name == b.name,
            _ => false,
        }
    }
}

/// External observer of custom-column value changes, e.g. a server that
/// forwards the update to remote clients.
pub trait ValueObserver {
    fn value_changed(&mut self, column_index: u8, player: usize, value: &PlayerValue);
}

/// Backing store of one custom column: one value per player slot plus the
/// column-wide default. The default is kept as a string because scripts
/// are parsed before graphics are loaded, so a texture default cannot be
/// resolved until first use.
pub struct PlayerData {
    kind: ValueKind,
    values: [PlayerValue; MAX_PLAYERS],
    index: u8,
    default_string: String,
}

impl PlayerData {
    pub fn new(kind: ValueKind, default_string: impl Into<String>, index: u8) -> Self {
        Self {
            kind,
            values: std::array::from_fn(|_| PlayerValue::None),
            index,
            default_string: default_string.into(),
        }
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn value(&self, player: usize) -> PlayerValue {
        self.values[player].clone()
    }

    pub fn default_value(&self, assets: &dyn AssetSource) -> PlayerValue {
        PlayerValue::parse(&self.default_string, self.kind, assets)
    }

    /// Store a value for one player. The value's kind must match the
    /// column's declared kind (unset is always allowed).
    pub fn set_value(&mut self, player: usize, value: PlayerValue) {
        debug_assert!(
            value.is_none() || value.kind() == self.kind,
            "column {} stores {:?}, refusing {:?}",
            self.index,
            self.kind,
            value.kind()
        );
        self.values[player] = value;
    }

    /// Re-parse the stored default into the player's slot, optionally
    /// telling an observer about the change.
    pub fn reset_to_default(
        &mut self,
        player: usize,
        assets: &dyn AssetSource,
        observer: Option<&mut dyn ValueObserver>,
    ) {
        self.values[player] = self.default_value(assets);
        if let Some(observer) = observer {
            observer.value_changed(self.index, player, &self.values[player]);
        }
    }
}

impl Clone for PlayerData {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            values: self.values.clone(),
            index: self.index,
            default_string: self.default_string.clone(),
        }
    }
}
