use imgcrate_core::buffer::PixelBuffer;

/// Assert a buffer has the given dimensions.
pub fn assert_dimensions(buf: &PixelBuffer, width: u32, height: u32) {
    assert_eq!(
        (buf.width, buf.height),
        (width, height),
        "buffer is {}x{}, expected {width}x{height}",
        buf.width,
        buf.height
    );
}

/// Assert two buffers match in size and differ by at most `tolerance` on
/// every channel.
pub fn assert_buffers_close(actual: &PixelBuffer, expected: &PixelBuffer, tolerance: u8) {
    assert_dimensions(actual, expected.width, expected.height);
    for y in 0..actual.height {
        for x in 0..actual.width {
            let a = actual.pixel(x, y);
            let e = expected.pixel(x, y);
            for c in 0..4 {
                assert!(
                    a[c].abs_diff(e[c]) <= tolerance,
                    "pixel ({x}, {y}) channel {c}: got {:?}, expected {:?} (tolerance {tolerance})",
                    a,
                    e
                );
            }
        }
    }
}

/// Assert every pixel equals `rgba`.
pub fn assert_uniform(buf: &PixelBuffer, rgba: [u8; 4]) {
    for (i, px) in buf.data.chunks_exact(4).enumerate() {
        assert_eq!(
            px,
            &rgba,
            "pixel ({}, {}) is {:?}, expected {:?}",
            i as u32 % buf.width,
            i as u32 / buf.width,
            px,
            rgba
        );
    }
}

/// Assert a single pixel value.
pub fn assert_pixel(buf: &PixelBuffer, x: u32, y: u32, rgba: [u8; 4]) {
    assert_eq!(buf.pixel(x, y), &rgba, "pixel ({x}, {y})");
}

/// Assert every RGB channel value is one of `allowed`.
pub fn assert_rgb_values_in(buf: &PixelBuffer, allowed: &[u8]) {
    for px in buf.data.chunks_exact(4) {
        for &v in &px[..3] {
            assert!(allowed.contains(&v), "channel value {v} not in {allowed:?}");
        }
    }
}

/// Assert every pixel is fully transparent.
pub fn assert_fully_transparent(buf: &PixelBuffer) {
    assert!(
        buf.data.chunks_exact(4).all(|px| px[3] == 0),
        "expected a fully transparent buffer"
    );
}
