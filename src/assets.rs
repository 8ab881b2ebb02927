//! Font and texture asset interfaces.
//!
//! Asset loading belongs to the host engine. The board only measures and
//! draws, so all it needs is a cheap shared handle carrying a name plus
//! enough metrics to lay content out. Handles are reference counted;
//! copying a column or a player value never clones pixel data.

use std::sync::Arc;

/// Metrics side of a loaded font. The board measures headers and cell text
/// through this; glyph rendering stays in the host.
pub trait FontFace {
    fn name(&self) -> &str;

    /// Width in virtual pixels of `text` rendered on one line.
    fn string_width(&self, text: &str) -> u32;

    /// Height in virtual pixels of one line of text.
    fn line_height(&self) -> u32;
}

pub type FontHandle = Arc<dyn FontFace>;

/// A loaded texture, identified by the asset name it was resolved from.
/// Values that hold textures serialize by this name.
#[derive(Debug, Clone)]
pub struct TextureInfo {
    pub name: Arc<str>,
    pub width: u32,
    pub height: u32,
}

pub type TextureHandle = Arc<TextureInfo>;

/// Resolves asset names from the script into handles. Lookups happen at
/// refresh time, never during the draw walk; a missing asset disables the
/// piece of content that wanted it rather than failing the load.
pub trait AssetSource {
    fn font(&self, name: &str) -> Option<FontHandle>;
    fn texture(&self, name: &str) -> Option<TextureHandle>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use rustc_hash::FxHashMap;

    /// Fixed-advance font: every glyph is `advance` wide. Keeps layout
    /// tests exact.
    pub struct FixedFont {
        pub name: String,
        pub advance: u32,
        pub height: u32,
    }

    impl FontFace for FixedFont {
        fn name(&self) -> &str {
            &self.name
        }

        fn string_width(&self, text: &str) -> u32 {
            text.chars().count() as u32 * self.advance
        }

        fn line_height(&self) -> u32 {
            self.height
        }
    }

    #[derive(Default)]
    pub struct TestAssets {
        fonts: FxHashMap<String, FontHandle>,
        textures: FxHashMap<String, TextureHandle>,
    }

    impl TestAssets {
        pub fn new() -> Self {
            let mut assets = Self::default();
            assets.add_font("smallfont", 8, 10);
            assets.add_font("bigfont", 12, 16);
            assets
        }

        pub fn add_font(&mut self, name: &str, advance: u32, height: u32) {
            let font: FontHandle = Arc::new(FixedFont {
                name: name.to_owned(),
                advance,
                height,
            });
            self.fonts.insert(name.to_ascii_lowercase(), font);
        }

        pub fn add_texture(&mut self, name: &str, width: u32, height: u32) {
            let tex = Arc::new(TextureInfo {
                name: Arc::from(name),
                width,
                height,
            });
            self.textures.insert(name.to_ascii_lowercase(), tex);
        }
    }

    impl AssetSource for TestAssets {
        fn font(&self, name: &str) -> Option<FontHandle> {
            self.fonts.get(&name.to_ascii_lowercase()).cloned()
        }

        fn texture(&self, name: &str) -> Option<TextureHandle> {
            self.textures.get(&name.to_ascii_lowercase()).cloned()
        }
    }
}
