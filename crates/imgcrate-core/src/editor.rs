//! Editing session: the loaded image, the base image operations replay
//! against, the history, and the live parameter record.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::buffer::PixelBuffer;
use crate::compositor::MarkSource;
use crate::config::EngineConfig;
use crate::error::{CoreError, Result};
use crate::history::{fold, AppliedOperation, FilterParams, History, OperationKind};
use crate::ops::{Corners, CropRect, DistortParams, Interpolation, Ops, WatermarkParams, WatermarkType};
use crate::pipeline::Pipeline;
use crate::scheduler::{RenderScheduler, RenderTicket};

/// Dimensions of a rendered or loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
}

impl ImageInfo {
    pub fn of(buf: &PixelBuffer) -> Self {
        let aspect_ratio = if buf.height == 0 {
            0.0
        } else {
            buf.width as f64 / buf.height as f64
        };
        Self {
            width: buf.width,
            height: buf.height,
            aspect_ratio,
        }
    }
}

/// Uncommitted slider state laid over the committed record for previews.
/// Only the fields that are set replace committed values; a watermark
/// with type `none` leaves the committed watermark alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LiveEdit {
    #[serde(flatten)]
    pub filters: FilterParams,
    pub grayscale: Option<bool>,
    pub sepia: Option<bool>,
    pub rotation: Option<f64>,
    pub flip_h: Option<bool>,
    pub flip_v: Option<bool>,
    pub crop: Option<CropRect>,
    pub resize_width: Option<u32>,
    pub resize_height: Option<u32>,
    pub skew: Option<DistortParams>,
    pub perspective: Option<DistortParams>,
    pub free_transform: Option<Corners>,
    pub interpolation: Option<Interpolation>,
    pub watermark: Option<WatermarkParams>,
}

impl LiveEdit {
    pub fn overlay(&self, mut ops: Ops) -> Ops {
        self.filters.apply_to(&mut ops);
        if let Some(v) = self.grayscale {
            ops.grayscale = v;
        }
        if let Some(v) = self.sepia {
            ops.sepia = v;
        }
        if let Some(v) = self.rotation {
            ops.rotation = v;
        }
        if let Some(v) = self.flip_h {
            ops.flip_h = v;
        }
        if let Some(v) = self.flip_v {
            ops.flip_v = v;
        }
        if self.crop.is_some() {
            ops.crop = self.crop;
        }
        if self.resize_width.is_some() {
            ops.resize_width = self.resize_width;
        }
        if self.resize_height.is_some() {
            ops.resize_height = self.resize_height;
        }
        if self.skew.is_some() {
            ops.skew = self.skew;
        }
        if self.perspective.is_some() {
            ops.perspective = self.perspective;
        }
        if self.free_transform.is_some() {
            ops.free_transform = self.free_transform;
        }
        if let Some(interp) = self.interpolation {
            ops.interpolation = interp;
        }
        if let Some(wm) = &self.watermark {
            if wm.kind != WatermarkType::None {
                ops.watermark = wm.clone();
            }
        }
        ops
    }
}

pub struct Editor {
    config: EngineConfig,
    pipeline: Pipeline,
    initial: Option<PixelBuffer>,
    base: Option<PixelBuffer>,
    history: History,
    ops: Ops,
    rendered: Option<PixelBuffer>,
    scheduler: RenderScheduler,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Editor {
    pub fn new(config: EngineConfig) -> Self {
        let ops = neutral_ops(&config);
        Self {
            pipeline: Pipeline::from_config(&config),
            scheduler: RenderScheduler::from_millis(config.debounce_ms),
            initial: None,
            base: None,
            history: History::new(),
            ops,
            rendered: None,
            config,
        }
    }

    pub fn with_mark_source(mut self, marks: Arc<dyn MarkSource>) -> Self {
        self.pipeline.set_mark_source(Some(marks));
        self
    }

    pub fn set_mark_source(&mut self, marks: Option<Arc<dyn MarkSource>>) {
        self.pipeline.set_mark_source(marks);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start a new session on `image`. Previous history is discarded.
    pub fn load(&mut self, image: PixelBuffer) -> Result<()> {
        if image.is_empty() {
            return Err(CoreError::invalid_geometry(
                image.width,
                image.height,
                "cannot edit an empty image",
            ));
        }
        debug!(target: "imgcrate::editor", width = image.width, height = image.height, "image loaded");
        self.scheduler.cancel();
        self.history.clear();
        self.ops = neutral_ops(&self.config);
        self.rendered = Some(image.clone());
        self.base = Some(image.clone());
        self.initial = Some(image);
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.base.is_some()
    }

    /// The image operations are replayed against.
    pub fn base(&self) -> Option<&PixelBuffer> {
        self.base.as_ref()
    }

    /// The image as first loaded.
    pub fn initial(&self) -> Option<&PixelBuffer> {
        self.initial.as_ref()
    }

    /// The most recently committed render.
    pub fn rendered(&self) -> Option<&PixelBuffer> {
        self.rendered.as_ref()
    }

    pub fn ops(&self) -> &Ops {
        &self.ops
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn image_info(&self) -> Option<ImageInfo> {
        self.rendered.as_ref().map(ImageInfo::of)
    }

    pub fn original_info(&self) -> Option<ImageInfo> {
        self.initial.as_ref().map(ImageInfo::of)
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Record `op` and re-render. A free transform is baked into the base
    /// image immediately together with every committed edit before it, and
    /// the live record goes back to neutral. Nothing is committed if the
    /// render fails.
    pub fn apply_operation(&mut self, op: impl Into<AppliedOperation>) -> Result<()> {
        let mut op = op.into();
        if self.base.is_none() {
            return Err(CoreError::NotLoaded);
        }

        if let OperationKind::FreeTransform {
            free_transform,
            interpolation,
        } = op.kind
        {
            let baked = self.bake(self.history.cursor(), free_transform, interpolation)?;
            let ops = neutral_ops(&self.config);
            let out = self.pipeline.render(Some(&baked), &ops)?;
            op.snapshot_before_transform = self.base.replace(baked);
            self.history.push(op);
            info!(
                target: "imgcrate::editor",
                cursor = self.history.cursor(),
                "free transform baked into base image"
            );
            self.commit_render(ops, out);
        } else {
            let ops = fold(self.committed_ops(), &op.kind);
            let out = self.pipeline.render(self.base.as_ref(), &ops)?;
            self.history.push(op);
            self.commit_render(ops, out);
        }
        Ok(())
    }

    /// Step back one entry, restoring the pre-transform base if that entry
    /// was a free transform.
    pub fn undo(&mut self) -> Result<()> {
        if self.base.is_none() {
            return Err(CoreError::NotLoaded);
        }
        let undone = self.history.undo_step()?;
        if undone.kind.is_bake() {
            match &undone.snapshot_before_transform {
                Some(snapshot) => {
                    self.base = Some(snapshot.clone());
                    info!(target: "imgcrate::editor", "base image restored from snapshot");
                }
                None => {
                    warn!(target: "imgcrate::editor", id = %undone.id, "free transform has no snapshot");
                }
            }
        }
        self.scheduler.cancel();
        self.refresh()
    }

    /// Step forward one entry. A free transform is re-baked from the
    /// current base.
    pub fn redo(&mut self) -> Result<()> {
        if self.base.is_none() {
            return Err(CoreError::NotLoaded);
        }
        let redone = self.history.redo_step()?.kind.clone();
        if let OperationKind::FreeTransform {
            free_transform,
            interpolation,
        } = redone
        {
            let baked = self.bake(self.history.cursor() - 1, free_transform, interpolation)?;
            self.base = Some(baked);
            info!(target: "imgcrate::editor", cursor = self.history.cursor(), "free transform re-baked");
        }
        self.scheduler.cancel();
        self.refresh()
    }

    /// Drop all history and go back to the image as first loaded.
    pub fn reset_operations(&mut self) -> Result<()> {
        let initial = self.initial.clone().ok_or(CoreError::NotLoaded)?;
        self.scheduler.cancel();
        self.history.clear();
        self.ops = neutral_ops(&self.config);
        self.base = Some(initial.clone());
        self.rendered = Some(initial);
        info!(target: "imgcrate::editor", "reset to original image");
        Ok(())
    }

    /// Render `edit` over the committed record right away.
    pub fn preview(&mut self, edit: &LiveEdit) -> Result<&PixelBuffer> {
        self.ops = edit.overlay(self.committed_ops());
        self.render_current()
    }

    /// Queue a debounced preview of `edit`.
    pub fn request_preview(&mut self, edit: &LiveEdit, now: Instant) -> RenderTicket {
        self.ops = edit.overlay(self.committed_ops());
        self.scheduler.request(self.ops.clone(), now)
    }

    /// Run the queued preview if its debounce window has passed. Returns
    /// true when a new render was committed. Only the most recent request
    /// is ever handed out, so the job taken here is always current.
    pub fn poll_preview(&mut self, now: Instant) -> Result<bool> {
        let Some(job) = self.scheduler.take_due(now) else {
            return Ok(false);
        };
        let out = self.pipeline.render(self.base.as_ref(), &job.ops)?;
        debug!(target: "imgcrate::editor", generation = job.ticket.generation(), "preview rendered");
        self.rendered = Some(out);
        Ok(true)
    }

    /// Render the live record over the base image.
    pub fn render_current(&mut self) -> Result<&PixelBuffer> {
        let out = self.pipeline.render(self.base.as_ref(), &self.ops)?;
        Ok(&*self.rendered.insert(out))
    }

    fn committed_ops(&self) -> Ops {
        self.history
            .build_ops_from(neutral_ops(&self.config), self.history.cursor())
    }

    fn commit_render(&mut self, ops: Ops, out: PixelBuffer) {
        self.scheduler.cancel();
        self.ops = ops;
        self.rendered = Some(out);
    }

    fn refresh(&mut self) -> Result<()> {
        self.ops = self.committed_ops();
        self.render_current()?;
        Ok(())
    }

    /// Render the record committed up to `upto` plus the free transform
    /// over the base, so everything up to the transform ends up in pixels.
    fn bake(&mut self, upto: isize, corners: Corners, interpolation: Interpolation) -> Result<PixelBuffer> {
        let ops = self
            .history
            .build_ops_from(neutral_ops(&self.config), upto)
            .with_free_transform(corners, interpolation);
        self.pipeline.render(self.base.as_ref(), &ops)
    }
}

fn neutral_ops(config: &EngineConfig) -> Ops {
    Ops {
        interpolation: config.default_interpolation,
        ..Ops::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(w: u32, h: u32) -> PixelBuffer {
        PixelBuffer::filled(w, h, [100, 100, 100, 255])
    }

    #[test]
    fn test_operations_need_an_image() {
        let mut editor = Editor::default();
        assert!(matches!(
            editor.apply_operation(OperationKind::Grayscale),
            Err(CoreError::NotLoaded)
        ));
        assert!(matches!(editor.undo(), Err(CoreError::NotLoaded)));
        assert!(matches!(editor.reset_operations(), Err(CoreError::NotLoaded)));
        assert!(matches!(editor.render_current(), Err(CoreError::NotLoaded)));
    }

    #[test]
    fn test_load_rejects_empty() {
        let mut editor = Editor::default();
        assert!(matches!(
            editor.load(PixelBuffer::new(0, 0)),
            Err(CoreError::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_image_info_tracks_render() {
        let mut editor = Editor::default();
        editor.load(gray(40, 20)).unwrap();
        editor
            .apply_operation(OperationKind::Resize {
                width: Some(10),
                height: Some(10),
            })
            .unwrap();
        let info = editor.image_info().unwrap();
        assert_eq!((info.width, info.height), (10, 10));
        assert_eq!(info.aspect_ratio, 1.0);
        assert_eq!(editor.original_info().unwrap().aspect_ratio, 2.0);
    }

    #[test]
    fn test_live_edit_watermark_none_keeps_committed() {
        let committed = Ops {
            watermark: WatermarkParams {
                kind: WatermarkType::Text,
                text: "kept".into(),
                ..WatermarkParams::default()
            },
            ..Ops::default()
        };
        let edit = LiveEdit {
            watermark: Some(WatermarkParams::default()),
            ..LiveEdit::default()
        };
        assert_eq!(edit.overlay(committed).watermark.text, "kept");
    }

    #[test]
    fn test_preview_does_not_touch_history() {
        let mut editor = Editor::default();
        editor.load(gray(4, 4)).unwrap();
        let edit = LiveEdit {
            filters: FilterParams {
                brightness: Some(200.0),
                ..FilterParams::default()
            },
            ..LiveEdit::default()
        };
        let out = editor.preview(&edit).unwrap();
        assert_eq!(out.pixel(0, 0)[0], 200);
        assert!(editor.history().is_empty());
        assert_eq!(editor.ops().brightness, 200.0);
    }
}
