/// Identifies one texture in a [`crate::TexturePack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureId {
    Background,
    BackgroundLight,
    BackgroundLightDead,
    Brick,
    Hero,
    HeroGround,
    Spark,
}

impl TextureId {
    pub const ALL: [TextureId; 7] = [
        TextureId::Background,
        TextureId::BackgroundLight,
        TextureId::BackgroundLightDead,
        TextureId::Brick,
        TextureId::Hero,
        TextureId::HeroGround,
        TextureId::Spark,
    ];

    pub(crate) const fn index(self) -> usize {
        match self {
            TextureId::Background => 0,
            TextureId::BackgroundLight => 1,
            TextureId::BackgroundLightDead => 2,
            TextureId::Brick => 3,
            TextureId::Hero => 4,
            TextureId::HeroGround => 5,
            TextureId::Spark => 6,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            TextureId::Background => "bg.png",
            TextureId::BackgroundLight => "bgLight.png",
            TextureId::BackgroundLightDead => "bgLightDead.png",
            TextureId::Brick => "brick.png",
            TextureId::Hero => "fuzzy.png",
            TextureId::HeroGround => "fuzzyFlat.png",
            TextureId::Spark => "spark.png",
        }
    }

    /// Tile textures must be exactly one cell in size.
    pub fn is_tile(self) -> bool {
        matches!(
            self,
            TextureId::Background
                | TextureId::BackgroundLight
                | TextureId::BackgroundLightDead
                | TextureId::Brick
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Tile {
    #[default]
    Background,
    LightOn,
    LightOff,
    Brick,
}

impl Tile {
    pub fn texture(self) -> TextureId {
        match self {
            Tile::Background => TextureId::Background,
            Tile::LightOn => TextureId::BackgroundLight,
            Tile::LightOff => TextureId::BackgroundLightDead,
            Tile::Brick => TextureId::Brick,
        }
    }

    pub fn is_solid(self) -> bool {
        matches!(self, Tile::Brick)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_indices_are_dense_and_unique() {
        for (expected, id) in TextureId::ALL.iter().enumerate() {
            assert_eq!(id.index(), expected);
        }
    }

    #[test]
    fn only_bricks_are_solid() {
        assert!(Tile::Brick.is_solid());
        assert!(!Tile::Background.is_solid());
        assert!(!Tile::LightOn.is_solid());
        assert!(!Tile::LightOff.is_solid());
    }
}
