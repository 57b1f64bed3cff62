//! Output frame composition.
//!
//! Two ways to fill the vertical canvas: crop-and-resize for tracked
//! scenes, and a blurred-background letterbox for general scenes where the
//! whole landscape frame stays visible.

use opencv::core::{self, Mat, Rect, Size};
use opencv::imgproc;
use opencv::prelude::*;

use crate::camera::CropRect;
use crate::error::ReframeResult;

/// Blur kernel for the background plate. Must stay odd.
const BLUR_KERNEL: i32 = 51;

/// Crop the frame to `crop` and scale to the output size.
///
/// A degenerate crop falls back to squeezing the full frame, so a frame is
/// always produced.
pub fn crop_and_resize(
    frame: &Mat,
    crop: CropRect,
    out_width: i32,
    out_height: i32,
) -> ReframeResult<Mat> {
    let out_size = Size::new(out_width, out_height);
    let mut out = Mat::default();

    if crop.is_empty() {
        imgproc::resize(frame, &mut out, out_size, 0.0, 0.0, imgproc::INTER_LINEAR)?;
        return Ok(out);
    }

    let roi = Mat::roi(
        frame,
        Rect::new(crop.x1, crop.y1, crop.width(), crop.height()),
    )?;
    imgproc::resize(&roi, &mut out, out_size, 0.0, 0.0, imgproc::INTER_LINEAR)?;
    Ok(out)
}

/// Compose a general (non-tracked) output frame.
///
/// The source fills the canvas as a blurred, center-cropped background,
/// with the full frame scaled to the output width and overlaid in the
/// vertical middle.
pub fn general_frame(frame: &Mat, out_width: i32, out_height: i32) -> ReframeResult<Mat> {
    let orig_w = frame.cols();
    let orig_h = frame.rows();

    // Background: scale to output height, center-crop to output width.
    let bg_scale = f64::from(out_height) / f64::from(orig_h);
    let bg_w = (f64::from(orig_w) * bg_scale) as i32;
    let mut bg_resized = Mat::default();
    imgproc::resize(
        frame,
        &mut bg_resized,
        Size::new(bg_w, out_height),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let start_x = ((bg_w - out_width) / 2).max(0);
    let crop_w = out_width.min(bg_w - start_x);
    let mut background = Mat::roi(&bg_resized, Rect::new(start_x, 0, crop_w, out_height))?
        .try_clone()?;
    if background.cols() != out_width {
        let mut stretched = Mat::default();
        imgproc::resize(
            &background,
            &mut stretched,
            Size::new(out_width, out_height),
            0.0,
            0.0,
            imgproc::INTER_LINEAR,
        )?;
        background = stretched;
    }

    let mut blurred = Mat::default();
    imgproc::gaussian_blur(
        &background,
        &mut blurred,
        Size::new(BLUR_KERNEL, BLUR_KERNEL),
        0.0,
        0.0,
        core::BORDER_DEFAULT,
    )?;

    // Foreground: full frame scaled to output width at its natural
    // height, vertically centered. A foreground taller than the canvas
    // keeps its aspect and has the overflowing rows truncated.
    let fg_scale = f64::from(out_width) / f64::from(orig_w);
    let fg_h = (f64::from(orig_h) * fg_scale) as i32;
    if fg_h <= 0 {
        return Ok(blurred);
    }
    let mut foreground = Mat::default();
    imgproc::resize(
        frame,
        &mut foreground,
        Size::new(out_width, fg_h),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let y_offset = ((out_height - fg_h) / 2).max(0);
    let visible = fg_h.min(out_height - y_offset);
    let fg_view = Mat::roi(&foreground, Rect::new(0, 0, out_width, visible))?;
    let mut target = blurred.roi_mut(Rect::new(0, y_offset, out_width, visible))?;
    fg_view.copy_to(&mut target)?;
    drop(target);

    Ok(blurred)
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, Vec3b, CV_8UC3};

    fn bgr_frame(width: i32, height: i32) -> Mat {
        Mat::new_rows_cols_with_default(height, width, CV_8UC3, Scalar::new(40.0, 80.0, 120.0, 0.0))
            .unwrap()
    }

    #[test]
    fn test_crop_and_resize_dimensions() {
        let frame = bgr_frame(1920, 1080);
        let crop = CropRect {
            x1: 656,
            y1: 0,
            x2: 1263,
            y2: 1080,
        };
        let out = crop_and_resize(&frame, crop, 1080, 1920).unwrap();
        assert_eq!(out.cols(), 1080);
        assert_eq!(out.rows(), 1920);
    }

    #[test]
    fn test_empty_crop_resizes_full_frame() {
        let frame = bgr_frame(1920, 1080);
        let crop = CropRect {
            x1: 100,
            y1: 0,
            x2: 100,
            y2: 1080,
        };
        let out = crop_and_resize(&frame, crop, 1080, 1920).unwrap();
        assert_eq!(out.cols(), 1080);
        assert_eq!(out.rows(), 1920);
    }

    #[test]
    fn test_general_frame_dimensions() {
        let frame = bgr_frame(1920, 1080);
        let out = general_frame(&frame, 1080, 1920).unwrap();
        assert_eq!(out.cols(), 1080);
        assert_eq!(out.rows(), 1920);
    }

    #[test]
    fn test_general_frame_centers_foreground() {
        let frame = bgr_frame(1920, 1080);
        let out = general_frame(&frame, 1080, 1920).unwrap();

        // 1080-wide foreground from a 16:9 source is 607 rows tall,
        // centered at row 960: the middle keeps the source color while the
        // top edge is the blurred plate.
        let mid = *out.at_2d::<Vec3b>(960, 540).unwrap();
        assert_eq!(mid, Vec3b::from([40, 80, 120]));
    }

    #[test]
    fn test_general_frame_from_vertical_source() {
        // Source narrower than the output: foreground fills the height.
        let frame = bgr_frame(500, 1500);
        let out = general_frame(&frame, 1080, 1920).unwrap();
        assert_eq!(out.cols(), 1080);
        assert_eq!(out.rows(), 1920);
    }

    #[test]
    fn test_overflowing_foreground_keeps_aspect() {
        // 500x1000 source, top half green and bottom half red. Scaled to
        // 1080 wide the foreground is 2160 rows tall, so the color
        // transition sits at output row 1080; a squeezed-to-fit
        // foreground would put it at 960.
        let mut frame = bgr_frame(500, 1000);
        frame
            .roi_mut(Rect::new(0, 0, 500, 500))
            .unwrap()
            .set_scalar(Scalar::new(0.0, 255.0, 0.0, 0.0))
            .unwrap();
        frame
            .roi_mut(Rect::new(0, 500, 500, 500))
            .unwrap()
            .set_scalar(Scalar::new(0.0, 0.0, 255.0, 0.0))
            .unwrap();

        let out = general_frame(&frame, 1080, 1920).unwrap();
        let above = *out.at_2d::<Vec3b>(1020, 540).unwrap();
        let below = *out.at_2d::<Vec3b>(1140, 540).unwrap();
        assert_eq!(above, Vec3b::from([0, 255, 0]));
        assert_eq!(below, Vec3b::from([0, 0, 255]));
    }
}
