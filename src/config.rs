//! Configuration-variable interface and customizable board properties.
//!
//! The variable store lives in the host (console variables, an options
//! menu, whatever). The board reads named values through [`ConfigVars`]
//! and never caches them: a customizable property computes its effective
//! value on every read, so there is no staleness to manage.

use crate::assets::{AssetSource, FontHandle};
use crate::draw::Rgba;
use bitflags::bitflags;

/// Integer variable holding the user's customize bitmask.
pub const CUSTOMIZE_FLAGS_VAR: &str = "sb_customizeflags";

bitflags! {
    /// Which parts of the board the user wants to override with their own
    /// configuration variables instead of the script's values.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct CustomizeFlags: u32 {
        const TEXT            = 1 << 0;
        const BORDERS         = 1 << 1;
        const BACKGROUND      = 1 << 2;
        const ROW_BACKGROUNDS = 1 << 3;
    }
}

impl CustomizeFlags {
    /// Current mask as set by the host's config store.
    pub fn current(cfg: &dyn ConfigVars) -> Self {
        Self::from_bits_truncate(cfg.get_int(CUSTOMIZE_FLAGS_VAR).unwrap_or(0) as u32)
    }
}

/// Named variable reads. Every getter returns `None` when the variable is
/// missing or has the wrong type; callers fall back to script defaults.
pub trait ConfigVars {
    fn get_int(&self, _name: &str) -> Option<i64> {
        None
    }

    fn get_float(&self, _name: &str) -> Option<f32> {
        None
    }

    fn get_bool(&self, _name: &str) -> Option<bool> {
        None
    }

    fn get_string(&self, _name: &str) -> Option<String> {
        None
    }

    fn get_color(&self, _name: &str) -> Option<Rgba> {
        None
    }
}

/// A store with no variables set; every property reads as its default.
pub struct NoConfig;

impl ConfigVars for NoConfig {}

/// A script-declared default paired with the variable that may override it
/// and the customize bit that arms the override. The effective value is
/// computed on read, never cached.
#[derive(Clone, Debug)]
pub struct Customizable<T> {
    default: T,
    var: &'static str,
    flag: CustomizeFlags,
}

impl<T: Clone> Customizable<T> {
    pub const fn new(var: &'static str, flag: CustomizeFlags, default: T) -> Self {
        Self { default, var, flag }
    }

    /// Script parse replaces the declared default.
    pub fn set_default(&mut self, value: T) {
        self.default = value;
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }
}

impl Customizable<Rgba> {
    pub fn get(&self, flags: CustomizeFlags, cfg: &dyn ConfigVars) -> Rgba {
        if flags.contains(self.flag) {
            cfg.get_color(self.var).unwrap_or(self.default)
        } else {
            self.default
        }
    }
}

impl Customizable<f32> {
    pub fn get(&self, flags: CustomizeFlags, cfg: &dyn ConfigVars) -> f32 {
        if flags.contains(self.flag) {
            cfg.get_float(self.var).unwrap_or(self.default)
        } else {
            self.default
        }
    }
}

/// Font properties resolve through the asset source at read time. An
/// override naming a font that does not exist falls back to the script's
/// font rather than leaving the board blank.
#[derive(Clone, Debug)]
pub struct CustomizableFont {
    name: Customizable<String>,
}

impl CustomizableFont {
    pub fn new(var: &'static str, flag: CustomizeFlags, default: impl Into<String>) -> Self {
        Self {
            name: Customizable::new(var, flag, default.into()),
        }
    }

    pub fn set_default(&mut self, name: impl Into<String>) {
        self.name.set_default(name.into());
    }

    pub fn resolve(
        &self,
        flags: CustomizeFlags,
        cfg: &dyn ConfigVars,
        assets: &dyn AssetSource,
    ) -> Option<FontHandle> {
        if flags.contains(self.name.flag) {
            if let Some(custom) = cfg.get_string(self.name.var).and_then(|n| assets.font(&n)) {
                return Some(custom);
            }
        }
        assets.font(&self.name.default)
    }
}
