//! The fixed-order operation pipeline.
//!
//! Each stage reads only its own slice of [`Ops`]. Stages whose parameters
//! are neutral are skipped, so an all-default record returns the base image
//! untouched.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::buffer::PixelBuffer;
use crate::color;
use crate::compositor::{self, MarkCache, MarkSource};
use crate::config::EngineConfig;
use crate::error::{CoreError, Result};
use crate::filters;
use crate::geometry;
use crate::ops::Ops;

// =============================================================================
// Stage trait and context
// =============================================================================

/// Per-render state handed to every stage.
pub struct StageContext<'a> {
    pub max_dimension: u32,
    pub marks: Option<&'a dyn MarkSource>,
    pub cache: &'a mut MarkCache,
}

/// One step of the pipeline. Stages take ownership of the buffer so in-place
/// stages avoid allocating.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// True when `ops` leaves this stage's output equal to its input.
    fn is_identity(&self, ops: &Ops) -> bool {
        let _ = ops;
        false
    }

    fn process(&self, input: PixelBuffer, ops: &Ops, ctx: &mut StageContext<'_>) -> Result<PixelBuffer>;
}

// =============================================================================
// Built-in stages
// =============================================================================

pub struct CropStage;

impl Stage for CropStage {
    fn name(&self) -> &'static str {
        "crop"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.crop.is_none()
    }

    fn process(&self, input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        match &ops.crop {
            Some(rect) => geometry::crop(&input, rect),
            None => Ok(input),
        }
    }
}

pub struct RotateFlipStage;

impl Stage for RotateFlipStage {
    fn name(&self) -> &'static str {
        "rotate_flip"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.rotation.rem_euclid(360.0) == 0.0 && !ops.flip_h && !ops.flip_v
    }

    fn process(&self, input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        Ok(geometry::rotate_flip(&input, ops.rotation, ops.flip_h, ops.flip_v))
    }
}

/// Each of width/height falls back to the current size when unset or zero.
pub struct ResizeStage;

fn resize_target(input: &PixelBuffer, ops: &Ops) -> (u32, u32) {
    let pick = |target: Option<u32>, current: u32| target.filter(|&v| v > 0).unwrap_or(current);
    (
        pick(ops.resize_width, input.width),
        pick(ops.resize_height, input.height),
    )
}

impl Stage for ResizeStage {
    fn name(&self) -> &'static str {
        "resize"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.resize_width.is_none_or(|w| w == 0) && ops.resize_height.is_none_or(|h| h == 0)
    }

    fn process(&self, input: PixelBuffer, ops: &Ops, ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        let (w, h) = resize_target(&input, ops);
        if (w, h) == (input.width, input.height) {
            return Ok(input);
        }
        geometry::check_target(w, h, ctx.max_dimension)?;
        geometry::resize(&input, w, h)
    }
}

/// Brightness, contrast, saturation, hue, blur, grayscale and sepia in that
/// order.
pub struct SimpleColorStage;

impl Stage for SimpleColorStage {
    fn name(&self) -> &'static str {
        "simple_color"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.brightness == 100.0
            && ops.contrast == 100.0
            && ops.saturation == 100.0
            && ops.hue == 0.0
            && ops.blur <= 0.0
            && !ops.grayscale
            && !ops.sepia
    }

    fn process(&self, mut input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        let lut = color::brightness_lut(ops.brightness).then(&color::contrast_lut(ops.contrast));
        if !lut.is_identity() {
            lut.apply(&mut input);
        }
        if ops.saturation != 100.0 {
            color::adjust_saturation(&mut input, ops.saturation);
        }
        if ops.hue != 0.0 {
            color::adjust_hue(&mut input, ops.hue);
        }
        filters::blur_in_place(&mut input, ops.blur);
        if ops.grayscale {
            color::grayscale(&mut input);
        }
        if ops.sepia {
            color::sepia(&mut input);
        }
        Ok(input)
    }
}

pub struct GammaStage;

impl Stage for GammaStage {
    fn name(&self) -> &'static str {
        "gamma"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.gamma == 1.0
    }

    fn process(&self, mut input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        color::adjust_gamma(&mut input, ops.gamma);
        Ok(input)
    }
}

pub struct ToneCurveStage;

impl Stage for ToneCurveStage {
    fn name(&self) -> &'static str {
        "tone_curve"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        color::tone_curve_lut(&ops.tone_curve_points).is_none_or(|lut| lut.is_identity())
    }

    fn process(&self, mut input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        color::apply_tone_curve(&mut input, &ops.tone_curve_points);
        Ok(input)
    }
}

pub struct LevelsStage;

impl Stage for LevelsStage {
    fn name(&self) -> &'static str {
        "levels"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.levels.is_none_or(|l| l == Default::default())
    }

    fn process(&self, mut input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        if let Some(levels) = &ops.levels {
            color::apply_levels(&mut input, levels);
        }
        Ok(input)
    }
}

pub struct ColorBalanceStage;

impl Stage for ColorBalanceStage {
    fn name(&self) -> &'static str {
        "color_balance"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.color_balance.is_none_or(|cb| cb == Default::default())
    }

    fn process(&self, mut input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        if let Some(balance) = &ops.color_balance {
            color::apply_color_balance(&mut input, balance);
        }
        Ok(input)
    }
}

pub struct PosterizeStage;

impl Stage for PosterizeStage {
    fn name(&self) -> &'static str {
        "posterize"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.posterize.is_none_or(|p| p.levels < 2)
    }

    fn process(&self, mut input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        if let Some(p) = ops.posterize {
            color::posterize(&mut input, p.levels);
        }
        Ok(input)
    }
}

pub struct ThresholdStage;

impl Stage for ThresholdStage {
    fn name(&self) -> &'static str {
        "threshold"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.threshold.is_none()
    }

    fn process(&self, mut input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        if let Some(t) = ops.threshold {
            color::threshold(&mut input, t.threshold);
        }
        Ok(input)
    }
}

pub struct SharpenStage;

impl Stage for SharpenStage {
    fn name(&self) -> &'static str {
        "sharpen"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.sharpen.is_none_or(|s| s.amount <= 0.0)
    }

    fn process(&self, input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        match &ops.sharpen {
            Some(params) => Ok(filters::sharpen(&input, params)),
            None => Ok(input),
        }
    }
}

pub struct SketchStage;

impl Stage for SketchStage {
    fn name(&self) -> &'static str {
        "sketch"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.sketch.is_none()
    }

    fn process(&self, input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        match &ops.sketch {
            Some(params) => Ok(filters::sketch(&input, params)),
            None => Ok(input),
        }
    }
}

pub struct ChromaticAberrationStage;

impl Stage for ChromaticAberrationStage {
    fn name(&self) -> &'static str {
        "chromatic_aberration"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.chromatic_aberration
            .is_none_or(|ca| ca.offset_x == 0 && ca.offset_y == 0)
    }

    fn process(&self, input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        match &ops.chromatic_aberration {
            Some(params) => Ok(filters::chromatic_aberration(&input, params)),
            None => Ok(input),
        }
    }
}

pub struct SkewStage;

impl Stage for SkewStage {
    fn name(&self) -> &'static str {
        "skew"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.skew.is_none_or(|s| s.is_identity())
    }

    fn process(&self, input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        match &ops.skew {
            Some(params) => Ok(geometry::skew(&input, params)),
            None => Ok(input),
        }
    }
}

pub struct PerspectiveStage;

impl Stage for PerspectiveStage {
    fn name(&self) -> &'static str {
        "perspective"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.perspective.is_none_or(|p| p.is_identity())
    }

    fn process(&self, input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        match &ops.perspective {
            Some(params) => Ok(geometry::perspective(&input, params)),
            None => Ok(input),
        }
    }
}

pub struct FreeTransformStage;

impl Stage for FreeTransformStage {
    fn name(&self) -> &'static str {
        "free_transform"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.free_transform.is_none_or(|c| c.is_identity())
    }

    fn process(&self, input: PixelBuffer, ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        match &ops.free_transform {
            Some(corners) => Ok(geometry::free_transform(&input, corners, ops.interpolation)),
            None => Ok(input),
        }
    }
}

/// Asset failures are logged and the stage is skipped.
pub struct WatermarkStage;

impl Stage for WatermarkStage {
    fn name(&self) -> &'static str {
        "watermark"
    }

    fn is_identity(&self, ops: &Ops) -> bool {
        ops.watermark.is_noop()
    }

    fn process(&self, mut input: PixelBuffer, ops: &Ops, ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        match compositor::apply_watermark(&mut input, &ops.watermark, ctx.marks, ctx.cache) {
            Ok(()) => {}
            Err(CoreError::AssetLoadFailed(reason)) => {
                warn!(target: "imgcrate::pipeline", %reason, "watermark asset unavailable, skipping stage");
            }
            Err(err) => return Err(err),
        }
        Ok(input)
    }
}

pub struct TrimStage;

impl Stage for TrimStage {
    fn name(&self) -> &'static str {
        "trim"
    }

    fn process(&self, input: PixelBuffer, _ops: &Ops, _ctx: &mut StageContext<'_>) -> Result<PixelBuffer> {
        Ok(input.trim_transparent())
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// The ordered stage list plus the collaborators stages need.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    marks: Option<Arc<dyn MarkSource>>,
    cache: MarkCache,
    max_dimension: u32,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::from_config(&EngineConfig::default())
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            stages: builtin_stages(),
            marks: None,
            cache: MarkCache::new(config.cache_watermark_assets),
            max_dimension: config.max_dimension,
        }
    }

    pub fn with_mark_source(mut self, marks: Arc<dyn MarkSource>) -> Self {
        self.marks = Some(marks);
        self
    }

    pub fn set_mark_source(&mut self, marks: Option<Arc<dyn MarkSource>>) {
        self.marks = marks;
        self.cache.clear();
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn mark_cache(&self) -> &MarkCache {
        &self.cache
    }

    /// Run every non-identity stage over a copy of `base`.
    pub fn render(&mut self, base: Option<&PixelBuffer>, ops: &Ops) -> Result<PixelBuffer> {
        let base = base.ok_or(CoreError::NotLoaded)?;
        let mut ctx = StageContext {
            max_dimension: self.max_dimension,
            marks: self.marks.as_deref(),
            cache: &mut self.cache,
        };

        let mut buf = base.clone();
        for stage in &self.stages {
            if stage.is_identity(ops) {
                trace!(target: "imgcrate::pipeline", stage = stage.name(), "skipped");
                continue;
            }
            let (in_w, in_h) = (buf.width, buf.height);
            buf = stage.process(buf, ops, &mut ctx)?;
            debug!(
                target: "imgcrate::pipeline",
                stage = stage.name(),
                in_w,
                in_h,
                out_w = buf.width,
                out_h = buf.height,
                "stage complete"
            );
        }
        Ok(buf)
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_stages() -> Vec<Box<dyn Stage>> {
    vec![
        Box::new(CropStage),
        Box::new(RotateFlipStage),
        Box::new(ResizeStage),
        Box::new(SimpleColorStage),
        Box::new(GammaStage),
        Box::new(ToneCurveStage),
        Box::new(LevelsStage),
        Box::new(ColorBalanceStage),
        Box::new(PosterizeStage),
        Box::new(ThresholdStage),
        Box::new(SharpenStage),
        Box::new(SketchStage),
        Box::new(ChromaticAberrationStage),
        Box::new(SkewStage),
        Box::new(PerspectiveStage),
        Box::new(FreeTransformStage),
        Box::new(WatermarkStage),
        Box::new(TrimStage),
    ]
}

/// Render `ops` over `base` with a default pipeline and no watermark source.
pub fn render(base: Option<&PixelBuffer>, ops: &Ops) -> Result<PixelBuffer> {
    Pipeline::new().render(base, ops)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::{CropRect, PosterizeParams};

    #[test]
    fn test_stage_order() {
        let names = Pipeline::new().stage_names();
        assert_eq!(names.first(), Some(&"crop"));
        assert_eq!(names.last(), Some(&"trim"));
        let pos = |n: &str| names.iter().position(|s| *s == n).unwrap();
        assert!(pos("resize") < pos("simple_color"));
        assert!(pos("threshold") < pos("sharpen"));
        assert!(pos("chromatic_aberration") < pos("skew"));
        assert!(pos("free_transform") < pos("watermark"));
    }

    #[test]
    fn test_render_without_base() {
        assert!(matches!(render(None, &Ops::default()), Err(CoreError::NotLoaded)));
    }

    #[test]
    fn test_default_ops_skip_every_content_stage() {
        let ops = Ops::default();
        let pipeline = Pipeline::new();
        let active: Vec<_> = pipeline
            .stages
            .iter()
            .filter(|s| !s.is_identity(&ops))
            .map(|s| s.name())
            .collect();
        assert_eq!(active, vec!["trim"]);
    }

    #[test]
    fn test_resize_target_falls_back_per_axis() {
        let buf = PixelBuffer::new(30, 20);
        let ops = Ops {
            resize_width: Some(60),
            resize_height: Some(0),
            ..Ops::default()
        };
        assert_eq!(resize_target(&buf, &ops), (60, 20));
    }

    #[test]
    fn test_resize_beyond_max_dimension_fails() {
        let base = PixelBuffer::filled(4, 4, [0, 0, 0, 255]);
        let config = EngineConfig {
            max_dimension: 100,
            ..EngineConfig::default()
        };
        let ops = Ops {
            resize_width: Some(500),
            ..Ops::default()
        };
        let err = Pipeline::from_config(&config).render(Some(&base), &ops).unwrap_err();
        assert!(matches!(err, CoreError::InvalidGeometry { .. }));
    }

    #[test]
    fn test_crop_then_posterize() {
        let mut base = PixelBuffer::filled(10, 10, [100, 200, 30, 255]);
        base.pixel_mut(0, 0).copy_from_slice(&[1, 1, 1, 255]);
        let ops = Ops {
            crop: Some(CropRect::new(2, 2, 5, 4)),
            posterize: Some(PosterizeParams { levels: 2 }),
            ..Ops::default()
        };
        let out = render(Some(&base), &ops).unwrap();
        assert_eq!((out.width, out.height), (5, 4));
        assert!(out.data.chunks(4).all(|p| p == [0, 255, 0, 255]));
    }
}
