use std::time::{Duration, Instant};

use imgcrate_core::config::EngineConfig;
use imgcrate_core::editor::{Editor, LiveEdit};
use imgcrate_core::error::CoreError;
use imgcrate_core::history::{FilterParams, OperationKind};
use imgcrate_core::ops::{Corner, Corners, CropRect, Interpolation, Ops};
use imgcrate_test_harness::assertions::*;
use imgcrate_test_harness::builders::BufferBuilder;
use imgcrate_test_harness::fixtures::{RED, gradient};

fn half_width() -> OperationKind {
    OperationKind::FreeTransform {
        free_transform: Corners {
            tl: Corner::new(0.0, 0.0),
            tr: Corner::new(0.5, 0.0),
            br: Corner::new(0.5, 1.0),
            bl: Corner::new(0.0, 1.0),
        },
        interpolation: Interpolation::Bilinear,
    }
}

fn brightness(value: f64) -> OperationKind {
    OperationKind::Filters(FilterParams {
        brightness: Some(value),
        ..FilterParams::default()
    })
}

fn loaded(width: u32, height: u32) -> Editor {
    let mut editor = Editor::default();
    editor.load(gradient(width, height)).unwrap();
    editor
}

#[test]
fn test_free_transform_is_baked_into_base() {
    let mut editor = loaded(21, 11);
    editor.apply_operation(half_width()).unwrap();

    assert_dimensions(editor.base().unwrap(), 11, 11);
    assert_dimensions(editor.rendered().unwrap(), 11, 11);
    assert_eq!(editor.ops(), &Ops::default());
    assert!(editor.ops().free_transform.is_none());

    let entry = editor.history().current().unwrap();
    assert_eq!(entry.snapshot_before_transform.as_ref(), editor.initial());
}

#[test]
fn test_undo_restores_snapshot_and_redo_rebakes() {
    let mut editor = loaded(21, 11);
    editor.apply_operation(half_width()).unwrap();
    let baked = editor.base().unwrap().clone();
    editor.apply_operation(brightness(50.0)).unwrap();

    let dimmed = editor.rendered().unwrap().pixel(10, 5)[0];
    assert!((127..=128).contains(&dimmed));

    editor.undo().unwrap();
    assert_eq!(editor.rendered().unwrap(), &baked);

    editor.undo().unwrap();
    assert!(!editor.can_undo());
    assert!(editor.can_redo());
    assert_eq!(editor.base(), editor.initial());
    assert_dimensions(editor.rendered().unwrap(), 21, 11);

    editor.redo().unwrap();
    assert_eq!(editor.base().unwrap(), &baked);
    editor.redo().unwrap();
    assert_eq!(editor.rendered().unwrap().pixel(10, 5)[0], dimmed);
    assert!(!editor.can_redo());
}

#[test]
fn test_edits_before_transform_survive_the_bake() {
    let mut editor = Editor::default();
    editor
        .load(BufferBuilder::new(21, 11).solid(RED).build())
        .unwrap();
    editor.apply_operation(OperationKind::Grayscale).unwrap();
    editor.apply_operation(half_width()).unwrap();

    assert!(!editor.ops().grayscale);
    assert_uniform(editor.base().unwrap(), [54, 54, 54, 255]);
    assert_eq!(editor.rendered(), editor.base());
}

#[test]
fn test_apply_after_undo_drops_redo() {
    let mut editor = loaded(8, 8);
    editor.apply_operation(brightness(120.0)).unwrap();
    editor.apply_operation(OperationKind::Sepia).unwrap();
    editor.undo().unwrap();
    editor.apply_operation(OperationKind::Grayscale).unwrap();

    assert_eq!(editor.history().len(), 2);
    assert_eq!(editor.history().cursor(), 1);
    assert!(!editor.can_redo());
    assert!(editor.ops().grayscale);
    assert!(!editor.ops().sepia);
    assert!(matches!(editor.redo(), Err(CoreError::NothingToRedo)));
}

#[test]
fn test_rejected_operation_is_not_recorded() {
    let mut editor = loaded(10, 10);
    editor.apply_operation(brightness(120.0)).unwrap();
    editor.apply_operation(OperationKind::Grayscale).unwrap();
    editor.undo().unwrap();
    let before = editor.rendered().unwrap().clone();

    let err = editor
        .apply_operation(OperationKind::Crop {
            crop: Some(CropRect::new(5, 5, 20, 20)),
        })
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidGeometry { .. }));
    assert_eq!(editor.history().len(), 2);
    assert_eq!(editor.history().cursor(), 0);
    assert!(editor.can_redo());
    assert_eq!(editor.rendered().unwrap(), &before);
    assert_eq!(editor.ops().brightness, 120.0);

    editor.apply_operation(OperationKind::Sepia).unwrap();
    assert_eq!(editor.history().len(), 2);
    assert!(editor.ops().sepia);
    assert_dimensions(editor.rendered().unwrap(), 10, 10);
}

#[test]
fn test_undo_with_empty_history() {
    let mut editor = loaded(4, 4);
    assert!(matches!(editor.undo(), Err(CoreError::NothingToUndo)));
}

#[test]
fn test_reset_returns_to_first_image() {
    let mut editor = loaded(21, 11);
    editor.apply_operation(brightness(40.0)).unwrap();
    editor.apply_operation(half_width()).unwrap();
    editor.apply_operation(OperationKind::Sepia).unwrap();

    editor.reset_operations().unwrap();
    assert!(editor.history().is_empty());
    assert_eq!(editor.history().cursor(), -1);
    assert_eq!(editor.base(), editor.initial());
    assert_eq!(editor.rendered(), editor.initial());
    assert_eq!(editor.ops(), &Ops::default());
}

#[test]
fn test_default_interpolation_comes_from_config() {
    let config = EngineConfig {
        default_interpolation: Interpolation::Nearest,
        ..EngineConfig::default()
    };
    let mut editor = Editor::new(config);
    editor.load(gradient(4, 4)).unwrap();
    assert_eq!(editor.ops().interpolation, Interpolation::Nearest);
    editor.apply_operation(OperationKind::Grayscale).unwrap();
    assert_eq!(editor.ops().interpolation, Interpolation::Nearest);
}

#[test]
fn test_debounced_preview_commits_latest_request() {
    let mut editor = loaded(8, 2);
    let t0 = Instant::now();
    let dim = LiveEdit {
        filters: FilterParams {
            brightness: Some(50.0),
            ..FilterParams::default()
        },
        ..LiveEdit::default()
    };
    let dark = LiveEdit {
        filters: FilterParams {
            brightness: Some(0.0),
            ..FilterParams::default()
        },
        ..LiveEdit::default()
    };

    let first = editor.request_preview(&dim, t0);
    let second = editor.request_preview(&dark, t0 + Duration::from_millis(2));
    assert!(!first.is_current());
    assert!(second.is_current());

    assert!(!editor.poll_preview(t0 + Duration::from_millis(10)).unwrap());
    assert_eq!(editor.rendered(), editor.base());

    assert!(editor.poll_preview(t0 + Duration::from_millis(18)).unwrap());
    assert_uniform(editor.rendered().unwrap(), [0, 0, 0, 255]);
    assert!(editor.history().is_empty());
    assert!(!editor.poll_preview(t0 + Duration::from_millis(50)).unwrap());
}

#[test]
fn test_commit_supersedes_queued_preview() {
    let mut editor = loaded(8, 2);
    let t0 = Instant::now();
    let dark = LiveEdit {
        filters: FilterParams {
            brightness: Some(0.0),
            ..FilterParams::default()
        },
        ..LiveEdit::default()
    };

    let queued = editor.request_preview(&dark, t0);
    editor.apply_operation(OperationKind::Grayscale).unwrap();
    assert!(!queued.is_current());

    let committed = editor.rendered().unwrap().clone();
    assert!(!editor.poll_preview(t0 + Duration::from_millis(100)).unwrap());
    assert_eq!(editor.rendered().unwrap(), &committed);
}
