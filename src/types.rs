//! API-neutral GPU type vocabulary shared by the graph and binding layers.

/// Texture formats understood by the frame-graph compiler.
///
/// This is deliberately a small subset: it covers the formats a render-group
/// document can name. Backends translate these into their native equivalents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    /// No format declared (e.g. buffers, samplers, or an unrecognized name).
    #[default]
    None,
    /// 8-bit BGRA, unsigned normalized, sRGB encoded.
    Bgra8UnormSrgb,
    /// 8-bit BGRA, unsigned normalized.
    Bgra8Unorm,
    /// 16-bit RGBA, float.
    Rgba16Float,
    /// 16-bit depth, unsigned normalized.
    Depth16Unorm,
}

impl TextureFormat {
    /// Translate a format name from a render-group document.
    ///
    /// Unknown names map to [`TextureFormat::None`] rather than failing the
    /// parse; an attachment without a usable format surfaces later when the
    /// backend tries to allocate it.
    pub fn parse(name: &str) -> Self {
        match name {
            "FORMAT_B8G8R8A8_SRGB" => Self::Bgra8UnormSrgb,
            "FORMAT_B8G8R8A8_UNORM" => Self::Bgra8Unorm,
            "FORMAT_R16G16B16A16_SFLOAT" => Self::Rgba16Float,
            "FORMAT_D16_UNORM" => Self::Depth16Unorm,
            _ => Self::None,
        }
    }

    /// Whether this is a depth format.
    pub fn is_depth(&self) -> bool {
        matches!(self, TextureFormat::Depth16Unorm)
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::None => 0,
            TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Depth16Unorm => 4,
            TextureFormat::Rgba16Float => 8,
        }
    }
}

/// A 2D extent in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent2d {
    pub width: u32,
    pub height: u32,
}

impl Extent2d {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}
