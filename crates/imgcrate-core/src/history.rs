//! Operation history: the applied-operation log, its cursor, and the fold
//! that turns a prefix of the log into an effective [`Ops`] record.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::buffer::PixelBuffer;
use crate::error::{CoreError, Result};
use crate::ops::{
    ChromaticAberrationParams, ColorBalanceParams, Corners, CropRect, DistortParams, Interpolation, LevelsParams,
    Ops, PosterizeParams, SharpenParams, SketchParams, ThresholdParams, ToneCurvePoint, WatermarkParams,
};

/// Color and filter fields committed together. Unset fields keep whatever
/// earlier entries established.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hue: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tone_curve_points: Option<Vec<ToneCurvePoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posterize: Option<PosterizeParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<LevelsParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_balance: Option<ColorBalanceParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<ThresholdParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sharpen: Option<SharpenParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sketch: Option<SketchParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chromatic_aberration: Option<ChromaticAberrationParams>,
}

impl FilterParams {
    /// Overwrite the fields of `ops` that are set here.
    pub fn apply_to(&self, ops: &mut Ops) {
        fn set<T: Clone>(dst: &mut T, src: &Option<T>) {
            if let Some(v) = src {
                *dst = v.clone();
            }
        }
        fn set_opt<T: Clone>(dst: &mut Option<T>, src: &Option<T>) {
            if src.is_some() {
                *dst = src.clone();
            }
        }
        set(&mut ops.brightness, &self.brightness);
        set(&mut ops.contrast, &self.contrast);
        set(&mut ops.saturation, &self.saturation);
        set(&mut ops.blur, &self.blur);
        set(&mut ops.hue, &self.hue);
        set(&mut ops.gamma, &self.gamma);
        set(&mut ops.tone_curve_points, &self.tone_curve_points);
        set_opt(&mut ops.posterize, &self.posterize);
        set_opt(&mut ops.levels, &self.levels);
        set_opt(&mut ops.color_balance, &self.color_balance);
        set_opt(&mut ops.threshold, &self.threshold);
        set_opt(&mut ops.sharpen, &self.sharpen);
        set_opt(&mut ops.sketch, &self.sketch);
        set_opt(&mut ops.chromatic_aberration, &self.chromatic_aberration);
    }
}

/// What an applied operation does, with only the fields it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum OperationKind {
    Resize {
        width: Option<u32>,
        height: Option<u32>,
    },
    Crop {
        crop: Option<CropRect>,
    },
    #[serde(rename_all = "camelCase")]
    Transform {
        rotation: f64,
        flip_h: bool,
        flip_v: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        skew: Option<DistortParams>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        perspective: Option<DistortParams>,
    },
    Filters(FilterParams),
    Watermark {
        watermark: WatermarkParams,
    },
    Grayscale,
    Sepia,
    /// Baked into the base image when applied; never replayed.
    #[serde(rename_all = "camelCase")]
    FreeTransform {
        free_transform: Corners,
        #[serde(default)]
        interpolation: Interpolation,
    },
}

impl OperationKind {
    pub fn description(&self) -> &'static str {
        match self {
            OperationKind::Resize { .. } => "Resize",
            OperationKind::Crop { .. } => "Crop",
            OperationKind::Transform { .. } => "Transform",
            OperationKind::Filters(_) => "Filters",
            OperationKind::Watermark { .. } => "Watermark",
            OperationKind::Grayscale => "Grayscale",
            OperationKind::Sepia => "Sepia",
            OperationKind::FreeTransform { .. } => "Free transform",
        }
    }

    pub fn is_bake(&self) -> bool {
        matches!(self, OperationKind::FreeTransform { .. })
    }
}

/// Fold one entry's fields into `ops`.
pub fn fold(mut ops: Ops, kind: &OperationKind) -> Ops {
    match kind {
        OperationKind::Resize { width, height } => {
            ops.resize_width = *width;
            ops.resize_height = *height;
        }
        OperationKind::Crop { crop } => ops.crop = *crop,
        OperationKind::Transform {
            rotation,
            flip_h,
            flip_v,
            skew,
            perspective,
        } => {
            ops.rotation = *rotation;
            ops.flip_h = *flip_h;
            ops.flip_v = *flip_v;
            ops.skew = *skew;
            ops.perspective = *perspective;
        }
        OperationKind::Filters(filters) => filters.apply_to(&mut ops),
        OperationKind::Watermark { watermark } => ops.watermark = watermark.clone(),
        OperationKind::Grayscale => {
            ops.grayscale = true;
            ops.sepia = false;
        }
        OperationKind::Sepia => {
            ops.sepia = true;
            ops.grayscale = false;
        }
        // already part of the base image
        OperationKind::FreeTransform { .. } => {}
    }
    ops
}

/// A history entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedOperation {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: OperationKind,
    /// Base image just before a free transform was baked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_before_transform: Option<PixelBuffer>,
}

impl AppliedOperation {
    pub fn new(kind: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            snapshot_before_transform: None,
        }
    }

    pub fn description(&self) -> &'static str {
        self.kind.description()
    }
}

impl From<OperationKind> for AppliedOperation {
    fn from(kind: OperationKind) -> Self {
        Self::new(kind)
    }
}

/// Entry log plus cursor. `cursor == -1` means nothing is applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    entries: Vec<AppliedOperation>,
    cursor: isize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: -1,
        }
    }

    pub fn entries(&self) -> &[AppliedOperation] {
        &self.entries
    }

    pub fn cursor(&self) -> isize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<&AppliedOperation> {
        self.entries.get(index)
    }

    /// The entry at the cursor, if any.
    pub fn current(&self) -> Option<&AppliedOperation> {
        usize::try_from(self.cursor).ok().and_then(|i| self.entries.get(i))
    }

    /// Drop everything after the cursor, append `op`, and move the cursor
    /// onto it.
    pub fn push(&mut self, op: AppliedOperation) -> &mut AppliedOperation {
        self.entries.truncate((self.cursor + 1) as usize);
        self.entries.push(op);
        self.cursor = self.entries.len() as isize - 1;
        let last = self.entries.len() - 1;
        &mut self.entries[last]
    }

    pub fn can_undo(&self) -> bool {
        self.cursor >= 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len() as isize - 1
    }

    /// Move the cursor back one entry. Returns the entry that was undone.
    pub fn undo_step(&mut self) -> Result<&AppliedOperation> {
        if !self.can_undo() {
            return Err(CoreError::NothingToUndo);
        }
        let undone = self.cursor as usize;
        self.cursor -= 1;
        Ok(&self.entries[undone])
    }

    /// Move the cursor forward one entry. Returns the entry now current.
    pub fn redo_step(&mut self) -> Result<&AppliedOperation> {
        if !self.can_redo() {
            return Err(CoreError::NothingToRedo);
        }
        self.cursor += 1;
        Ok(&self.entries[self.cursor as usize])
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.current().map(|op| op.description())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.entries
            .get((self.cursor + 1) as usize)
            .map(|op| op.description())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = -1;
    }

    /// Index of the last baking entry at or before `index`.
    pub fn last_bake_at_or_before(&self, index: isize) -> Option<usize> {
        if index < 0 {
            return None;
        }
        let end = (index as usize + 1).min(self.entries.len());
        self.entries[..end].iter().rposition(|op| op.kind.is_bake())
    }

    /// Effective record for the state after entry `index`, starting from
    /// `neutral`. Entries at or before the last bake are skipped: their
    /// effect already lives in the base image.
    pub fn build_ops_from(&self, neutral: Ops, index: isize) -> Ops {
        if index < 0 {
            return neutral;
        }
        let start = self.last_bake_at_or_before(index).map_or(0, |i| i + 1);
        let end = (index as usize + 1).min(self.entries.len());
        if start >= end {
            return neutral;
        }
        self.entries[start..end]
            .iter()
            .fold(neutral, |ops, op| fold(ops, &op.kind))
    }

    pub fn build_ops(&self, index: isize) -> Ops {
        self.build_ops_from(Ops::default(), index)
    }

    /// Effective record at the cursor.
    pub fn effective_ops(&self) -> Ops {
        self.build_ops(self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::Corner;

    fn brightness(v: f64) -> AppliedOperation {
        OperationKind::Filters(FilterParams {
            brightness: Some(v),
            ..FilterParams::default()
        })
        .into()
    }

    fn warp() -> AppliedOperation {
        OperationKind::FreeTransform {
            free_transform: Corners {
                tr: Corner::new(0.9, 0.1),
                ..Corners::identity()
            },
            interpolation: Interpolation::Bilinear,
        }
        .into()
    }

    #[test]
    fn test_new_history_is_empty() {
        let history = History::new();
        assert_eq!(history.cursor(), -1);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
        assert_eq!(history.effective_ops(), Ops::default());
    }

    #[test]
    fn test_push_truncates_redo_tail() {
        let mut history = History::new();
        history.push(brightness(110.0));
        history.push(brightness(120.0));
        history.push(brightness(130.0));
        history.undo_step().unwrap();
        assert!(history.can_redo());

        history.push(brightness(90.0));
        assert_eq!(history.len(), 3);
        assert_eq!(history.cursor(), 2);
        assert!(!history.can_redo());
        assert_eq!(history.effective_ops().brightness, 90.0);
    }

    #[test]
    fn test_undo_redo_bounds() {
        let mut history = History::new();
        assert!(matches!(history.undo_step(), Err(CoreError::NothingToUndo)));
        history.push(brightness(110.0));
        assert!(matches!(history.redo_step(), Err(CoreError::NothingToRedo)));
        assert_eq!(history.undo_step().unwrap().description(), "Filters");
        assert_eq!(history.cursor(), -1);
        history.redo_step().unwrap();
        assert_eq!(history.cursor(), 0);
    }

    #[test]
    fn test_filters_fold_keeps_unset_fields() {
        let mut history = History::new();
        history.push(brightness(140.0));
        history.push(
            OperationKind::Filters(FilterParams {
                contrast: Some(80.0),
                ..FilterParams::default()
            })
            .into(),
        );
        let ops = history.effective_ops();
        assert_eq!(ops.brightness, 140.0);
        assert_eq!(ops.contrast, 80.0);
    }

    #[test]
    fn test_grayscale_and_sepia_are_exclusive() {
        let ops = fold(Ops::default(), &OperationKind::Grayscale);
        let ops = fold(ops, &OperationKind::Sepia);
        assert!(ops.sepia);
        assert!(!ops.grayscale);
    }

    #[test]
    fn test_build_ops_skips_through_last_bake() {
        let mut history = History::new();
        history.push(brightness(150.0));
        history.push(
            OperationKind::Transform {
                rotation: 90.0,
                flip_h: true,
                flip_v: false,
                skew: None,
                perspective: None,
            }
            .into(),
        );
        history.push(warp());
        history.push(
            OperationKind::Filters(FilterParams {
                gamma: Some(2.0),
                ..FilterParams::default()
            })
            .into(),
        );

        assert_eq!(history.last_bake_at_or_before(3), Some(2));
        let ops = history.build_ops(3);
        assert_eq!(ops.gamma, 2.0);
        assert_eq!(ops.brightness, 100.0);
        assert_eq!(ops.rotation, 0.0);
        assert!(ops.free_transform.is_none());

        let before_bake = history.build_ops(1);
        assert_eq!(before_bake.rotation, 90.0);
        assert_eq!(before_bake.brightness, 150.0);
    }

    #[test]
    fn test_applied_operation_json_shape() {
        let op = AppliedOperation::new(OperationKind::Resize {
            width: Some(640),
            height: Some(480),
        });
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["type"], "resize");
        assert_eq!(json["params"]["width"], 640);
        assert!(json.get("snapshotBeforeTransform").is_none());

        let back: AppliedOperation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }

    #[test]
    fn test_free_transform_json_uses_camel_case() {
        let json = serde_json::to_value(warp()).unwrap();
        assert_eq!(json["type"], "freeTransform");
        assert_eq!(json["params"]["freeTransform"]["tr"]["x"], 0.9);
        assert_eq!(json["params"]["interpolation"], "bilinear");
    }
}
