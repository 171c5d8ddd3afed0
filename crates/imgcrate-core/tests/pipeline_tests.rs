use std::sync::Arc;

use imgcrate_core::error::CoreError;
use imgcrate_core::ops::{Ops, ToneCurvePoint, WatermarkParams, WatermarkType};
use imgcrate_core::pipeline::{Pipeline, render};
use imgcrate_test_harness::assertions::*;
use imgcrate_test_harness::builders::{BufferBuilder, OpsBuilder};
use imgcrate_test_harness::fixtures::{MockMarkSource, gradient, red_square};

#[test]
fn test_neutral_record_is_identity() {
    let base = BufferBuilder::new(9, 7)
        .checkerboard(2, [10, 20, 30, 255], [200, 150, 100, 255])
        .build();
    let out = render(Some(&base), &Ops::default()).unwrap();
    assert_eq!(out, base);
}

#[test]
fn test_missing_base_is_not_loaded() {
    let err = Pipeline::new().render(None, &Ops::default()).unwrap_err();
    assert!(matches!(err, CoreError::NotLoaded));
}

#[test]
fn test_gamma_brightens_and_darkens_monotonically() {
    let base = gradient(64, 2);
    let bright = render(Some(&base), &OpsBuilder::new().gamma(2.2).build()).unwrap();
    let dark = render(Some(&base), &OpsBuilder::new().gamma(0.5).build()).unwrap();
    for ((b, o), d) in base.data.iter().zip(&bright.data).zip(&dark.data) {
        assert!(o >= b);
        assert!(d <= b);
    }
}

#[test]
fn test_linear_tone_curve_is_identity() {
    let base = gradient(256, 1);
    let ops = Ops {
        tone_curve_points: vec![
            ToneCurvePoint::new(0.0, 0.0),
            ToneCurvePoint::new(0.5, 0.5),
            ToneCurvePoint::new(1.0, 1.0),
        ],
        ..Ops::default()
    };
    let out = render(Some(&base), &ops).unwrap();
    assert_buffers_close(&out, &base, 1);
}

#[test]
fn test_posterize_is_idempotent() {
    let base = gradient(100, 3);
    let ops = OpsBuilder::new().posterize(4).build();
    let once = render(Some(&base), &ops).unwrap();
    let twice = render(Some(&once), &ops).unwrap();
    assert_eq!(once, twice);
    assert_rgb_values_in(&once, &[0, 85, 170, 255]);
}

#[test]
fn test_crop_then_resize_back_restores_size() {
    let base = gradient(40, 30);
    let ops = OpsBuilder::new().crop(5, 5, 20, 10).resize(40, 30).build();
    let out = render(Some(&base), &ops).unwrap();
    assert_dimensions(&out, 40, 30);
}

#[test]
fn test_crop_outside_image_is_invalid_geometry() {
    let base = gradient(10, 10);
    let ops = OpsBuilder::new().crop(8, 8, 5, 5).build();
    let err = render(Some(&base), &ops).unwrap_err();
    assert!(matches!(err, CoreError::InvalidGeometry { .. }));
}

#[test]
fn test_quarter_turn_swaps_dimensions() {
    let base = gradient(8, 4);
    let out = render(Some(&base), &OpsBuilder::new().rotation(90.0).build()).unwrap();
    assert_dimensions(&out, 4, 8);
}

#[test]
fn test_rotation_padding_is_trimmed() {
    // corners of the rotated bounding box are transparent but the opaque
    // content still touches every edge, so nothing is trimmed away
    let base = red_square(20);
    let out = render(Some(&base), &OpsBuilder::new().rotation(45.0).build()).unwrap();
    assert!(out.width >= 28 && out.width <= 30);
    assert_eq!(out.pixel(0, 0)[3], 0);
    assert_eq!(out.pixel(out.width / 2, out.height / 2), &[255, 0, 0, 255]);
}

#[test]
fn test_red_square_posterize_then_threshold() {
    let base = red_square(100);

    let posterized = render(Some(&base), &OpsBuilder::new().posterize(2).build()).unwrap();
    assert_rgb_values_in(&posterized, &[0, 255]);
    assert_uniform(&posterized, [255, 0, 0, 255]);

    // luma of pure red is about 54, below the cutoff
    let ops = OpsBuilder::new().posterize(2).threshold(128).build();
    let out = render(Some(&base), &ops).unwrap();
    assert_dimensions(&out, 100, 100);
    assert_uniform(&out, [0, 0, 0, 255]);
}

#[test]
fn test_missing_watermark_asset_skips_stage() {
    let marks = Arc::new(MockMarkSource::new(4, [0, 0, 255, 255]));
    let mut pipeline = Pipeline::new().with_mark_source(marks.clone());
    let base = red_square(16);
    let ops = Ops {
        watermark: WatermarkParams {
            kind: WatermarkType::Image,
            image_source: "missing.png".into(),
            opacity: 1.0,
            ..WatermarkParams::default()
        },
        ..Ops::default()
    };
    let out = pipeline.render(Some(&base), &ops).unwrap();
    assert_eq!(out, base);
    assert_eq!(marks.decode_count(), 1);
}

#[test]
fn test_watermark_image_is_decoded_once() {
    let marks = Arc::new(MockMarkSource::new(40, [0, 0, 255, 255]));
    let mut pipeline = Pipeline::new().with_mark_source(marks.clone());
    let base = red_square(64);
    let ops = Ops {
        watermark: WatermarkParams {
            kind: WatermarkType::Image,
            image_source: "logo.png".into(),
            opacity: 1.0,
            scale: 0.5,
            ..WatermarkParams::default()
        },
        ..Ops::default()
    };
    let first = pipeline.render(Some(&base), &ops).unwrap();
    let second = pipeline.render(Some(&base), &ops).unwrap();
    assert_eq!(first, second);
    assert_ne!(first, base);
    assert_eq!(marks.decode_count(), 1);
    assert_eq!(pipeline.mark_cache().cached_source(), Some("logo.png"));
}
