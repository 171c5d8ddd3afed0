//! The operation parameter record.
//!
//! `Ops` is a flat value with an explicit neutral default for every field:
//! `Ops::default()` renders the base image unchanged. Each pipeline stage
//! reads only its own fields.

use serde::{Deserialize, Serialize};

/// Pixel-space crop rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CropRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A normalized corner position, both axes in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corner {
    pub x: f64,
    pub y: f64,
}

impl Corner {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Destination corners of a free transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Corners {
    pub tl: Corner,
    pub tr: Corner,
    pub bl: Corner,
    pub br: Corner,
}

impl Corners {
    /// The corners of the untransformed image.
    pub fn identity() -> Self {
        Self {
            tl: Corner::new(0.0, 0.0),
            tr: Corner::new(1.0, 0.0),
            bl: Corner::new(0.0, 1.0),
            br: Corner::new(1.0, 1.0),
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

impl Default for Corners {
    fn default() -> Self {
        Self::identity()
    }
}

/// Sampling used by the free transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
    /// Unweighted mean of the four neighbours.
    Average,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneCurvePoint {
    pub x: f64,
    pub y: f64,
}

impl ToneCurvePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The five-point diagonal the curve editor starts from.
pub fn identity_tone_curve() -> Vec<ToneCurvePoint> {
    [0.0, 0.25, 0.5, 0.75, 1.0]
        .into_iter()
        .map(|v| ToneCurvePoint::new(v, v))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosterizeParams {
    pub levels: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelsParams {
    pub input_black: u8,
    pub input_white: u8,
    pub output_black: u8,
    pub output_white: u8,
    pub gamma: f64,
}

impl Default for LevelsParams {
    fn default() -> Self {
        Self {
            input_black: 0,
            input_white: 255,
            output_black: 0,
            output_white: 255,
            gamma: 1.0,
        }
    }
}

/// Cyan/magenta/yellow slider triple, each in `[-100, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ColorBalanceZone {
    pub cyan: f64,
    pub magenta: f64,
    pub yellow: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ColorBalanceParams {
    pub shadows: ColorBalanceZone,
    pub midtones: ColorBalanceZone,
    pub highlights: ColorBalanceZone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdParams {
    pub threshold: u8,
}

/// Unsharp mask settings. `amount` is a percentage (100 = 1x).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SharpenParams {
    pub amount: f64,
    pub radius: f64,
}

/// Sobel sketch. `intensity` is 0-100; `invert` gives light lines on black.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SketchParams {
    pub intensity: f64,
    pub invert: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChromaticAberrationParams {
    pub offset_x: i32,
    pub offset_y: i32,
}

/// Shared shape of skew and perspective sliders, each in `[-1, 1]` nominally.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DistortParams {
    pub horizontal: f64,
    pub vertical: f64,
}

impl DistortParams {
    pub fn new(horizontal: f64, vertical: f64) -> Self {
        Self {
            horizontal,
            vertical,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.horizontal == 0.0 && self.vertical == 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WatermarkType {
    #[default]
    None,
    Text,
    Image,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPosition {
    TopLeft,
    TopRight,
    BottomLeft,
    #[default]
    BottomRight,
    Center,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WatermarkMode {
    #[default]
    Single,
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatermarkParams {
    #[serde(rename = "type")]
    pub kind: WatermarkType,
    pub text: String,
    pub font_size: f64,
    /// `#rrggbb`
    pub color: String,
    /// 0-1
    pub opacity: f64,
    pub position: WatermarkPosition,
    pub offset_x: f64,
    pub offset_y: f64,
    /// Source identity of the image mark (a path, URL or data URL).
    #[serde(rename = "imageDataURL")]
    pub image_source: String,
    pub scale: f64,
    pub mode: WatermarkMode,
    /// Degrees.
    pub rotation: f64,
    pub spacing_x: f64,
    pub spacing_y: f64,
    pub anchor_x: Option<f64>,
    pub anchor_y: Option<f64>,
}

impl Default for WatermarkParams {
    fn default() -> Self {
        Self {
            kind: WatermarkType::None,
            text: "Sample Watermark".to_string(),
            font_size: 32.0,
            color: "#ffffff".to_string(),
            opacity: 0.5,
            position: WatermarkPosition::BottomRight,
            offset_x: 24.0,
            offset_y: 24.0,
            image_source: String::new(),
            scale: 0.3,
            mode: WatermarkMode::Single,
            rotation: 0.0,
            spacing_x: 100.0,
            spacing_y: 100.0,
            anchor_x: None,
            anchor_y: None,
        }
    }
}

impl WatermarkParams {
    /// True when drawing this watermark cannot change any pixel.
    pub fn is_noop(&self) -> bool {
        match self.kind {
            WatermarkType::None => true,
            WatermarkType::Text => self.opacity <= 0.0 || self.text.is_empty(),
            WatermarkType::Image => self.opacity <= 0.0 || self.image_source.is_empty(),
        }
    }
}

/// The full operation parameter record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ops {
    /// Degrees, clockwise.
    pub rotation: f64,
    pub flip_h: bool,
    pub flip_v: bool,
    pub resize_width: Option<u32>,
    pub resize_height: Option<u32>,
    pub crop: Option<CropRect>,
    /// 0-200, 100 = identity.
    pub brightness: f64,
    /// 0-200, 100 = identity.
    pub contrast: f64,
    /// 0-200, 100 = identity.
    pub saturation: f64,
    /// Gaussian blur radius in pixels.
    pub blur: f64,
    /// Degrees, -180..180.
    pub hue: f64,
    /// 0.1-10, 1 = identity.
    pub gamma: f64,
    pub tone_curve_points: Vec<ToneCurvePoint>,
    pub grayscale: bool,
    pub sepia: bool,
    pub posterize: Option<PosterizeParams>,
    pub levels: Option<LevelsParams>,
    pub color_balance: Option<ColorBalanceParams>,
    pub threshold: Option<ThresholdParams>,
    pub sharpen: Option<SharpenParams>,
    pub sketch: Option<SketchParams>,
    pub chromatic_aberration: Option<ChromaticAberrationParams>,
    pub skew: Option<DistortParams>,
    pub perspective: Option<DistortParams>,
    pub free_transform: Option<Corners>,
    pub interpolation: Interpolation,
    pub watermark: WatermarkParams,
}

impl Default for Ops {
    fn default() -> Self {
        Self {
            rotation: 0.0,
            flip_h: false,
            flip_v: false,
            resize_width: None,
            resize_height: None,
            crop: None,
            brightness: 100.0,
            contrast: 100.0,
            saturation: 100.0,
            blur: 0.0,
            hue: 0.0,
            gamma: 1.0,
            tone_curve_points: identity_tone_curve(),
            grayscale: false,
            sepia: false,
            posterize: None,
            levels: None,
            color_balance: None,
            threshold: None,
            sharpen: None,
            sketch: None,
            chromatic_aberration: None,
            skew: None,
            perspective: None,
            free_transform: None,
            interpolation: Interpolation::Bilinear,
            watermark: WatermarkParams::default(),
        }
    }
}

impl Ops {
    /// This record with a free transform layered on top.
    pub fn with_free_transform(self, corners: Corners, interpolation: Interpolation) -> Self {
        Self {
            free_transform: Some(corners),
            interpolation,
            ..self
        }
    }

    /// True when none of the geometric fields (rotate, flip, skew,
    /// perspective, free transform) would change the image.
    pub fn has_identity_geometry(&self) -> bool {
        self.rotation.rem_euclid(360.0) == 0.0
            && !self.flip_h
            && !self.flip_v
            && self.skew.is_none_or(|s| s.is_identity())
            && self.perspective.is_none_or(|p| p.is_identity())
            && self.free_transform.is_none_or(|c| c.is_identity())
    }
}
