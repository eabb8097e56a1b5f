//! End-to-end stitching over synthetic scrolling captures.

use image::{imageops, Rgb, Rgba, RgbaImage};
use scroll_stitch::capture::{synthetic_page, DirectorySource, FrameSource, MockScrollSource, ScrollConfig};
use scroll_stitch::{
    stitch, CompositorConfig, EstimatorConfig, Frame, PipelineConfig, PixelLayout, RawFrame,
    StitchError, Stitcher, Technique,
};

fn cut(page: &RgbaImage, top: u32, height: u32, seq: u64) -> Frame {
    Frame::new(imageops::crop_imm(page, 0, top, page.width(), height).to_image(), seq)
}

fn solid(w: u32, h: u32, rgb: [u8; 3], seq: u64) -> Frame {
    Frame::new(RgbaImage::from_pixel(w, h, Rgba([rgb[0], rgb[1], rgb[2], 255])), seq)
}

#[test]
fn test_three_frames_rebuild_page() {
    let page = synthetic_page(200, 800, 21);
    let frames = vec![cut(&page, 0, 300, 1), cut(&page, 240, 300, 2), cut(&page, 500, 300, 3)];

    let (canvas, report) = Stitcher::default().stitch_with_report(&frames).unwrap();

    assert_eq!(canvas.dimensions(), (200, 800));
    let overlaps: Vec<u32> = report.seams.iter().map(|s| s.overlap).collect();
    assert_eq!(overlaps, vec![60, 40]);
    assert!(report.seams.iter().all(|s| s.estimate.confident));
    assert_eq!(canvas, Frame::new(page, 0).to_rgb());
}

#[test]
fn test_mock_source_round_trip() {
    let mut source = MockScrollSource::new(ScrollConfig::default()).unwrap();
    let frames = source.collect_frames();
    assert_eq!(frames.len(), 5);

    let canvas = stitch(&frames).unwrap();
    assert_eq!(canvas, Frame::new(source.page().clone(), 0).to_rgb());
}

#[test]
fn test_clamped_last_frame() {
    // Step 200 over a 700-row page: the final capture overlaps by 140 rows.
    let config = ScrollConfig {
        width: 240,
        viewport_height: 240,
        page_height: 700,
        scroll_step: 200,
        seed: 5,
    };
    let mut source = MockScrollSource::new(config).unwrap();
    let frames = source.collect_frames();

    let canvas = stitch(&frames).unwrap();
    assert_eq!(canvas.height(), 700);
    assert_eq!(canvas, Frame::new(source.page().clone(), 0).to_rgb());
}

#[test]
fn test_stitch_is_idempotent() {
    let page = synthetic_page(160, 500, 4);
    let once = stitch(&[cut(&page, 0, 300, 1), cut(&page, 220, 280, 2)]).unwrap();
    let twice = stitch(&[Frame::from_rgb(&once, 1)]).unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_empty_sequence() {
    assert!(matches!(stitch(&[]), Err(StitchError::InputEmpty)));
}

#[test]
fn test_disjoint_blocks_use_conservative_overlap() {
    let frames = vec![solid(200, 300, [220, 30, 30], 1), solid(200, 300, [30, 30, 220], 2)];
    let (canvas, report) = Stitcher::default().stitch_with_report(&frames).unwrap();

    let seam = report.seams[0];
    assert_eq!(seam.estimate.technique, Technique::Fallback);
    assert!(!seam.estimate.confident);
    assert_eq!(canvas.height(), 580);
    // Placed, not blended.
    assert_eq!(*canvas.get_pixel(10, 279), Rgb([220, 30, 30]));
    assert_eq!(*canvas.get_pixel(10, 280), Rgb([30, 30, 220]));
}

#[test]
fn test_stopped_scroll_is_deduplicated() {
    let page = synthetic_page(200, 600, 8);
    let frames = vec![
        cut(&page, 0, 300, 1),
        cut(&page, 250, 300, 2),
        cut(&page, 250, 300, 3),
        cut(&page, 300, 300, 4),
    ];
    let pipeline = PipelineConfig {
        drop_duplicate_frames: true,
        ..Default::default()
    };
    let stitcher = Stitcher::new(EstimatorConfig::default(), CompositorConfig::default(), pipeline);
    let (canvas, report) = stitcher.stitch_with_report(&frames).unwrap();

    assert_eq!(report.frames_duplicate, 1);
    assert_eq!(report.seams.len(), 2);
    assert_eq!(canvas, Frame::new(page, 0).to_rgb());
}

#[test]
fn test_raw_bgra_frames() {
    let page = synthetic_page(120, 400, 13);
    let bgra: Vec<Vec<u8>> = [0u32, 180]
        .iter()
        .map(|&top| {
            imageops::crop_imm(&page, 0, top, 120, 220)
                .to_image()
                .pixels()
                .flat_map(|p| [p[2], p[1], p[0], p[3]])
                .collect()
        })
        .collect();
    let raw: Vec<RawFrame<'_>> = bgra
        .iter()
        .map(|data| RawFrame {
            width: 120,
            height: 220,
            layout: PixelLayout::Bgra8,
            data,
        })
        .collect();

    let (canvas, report) = Stitcher::default().stitch_raw(&raw).unwrap();
    assert_eq!(report.frames_rejected, 0);
    assert_eq!(canvas, Frame::new(page, 0).to_rgb());
}

#[test]
fn test_directory_source_in_name_order() {
    let dir = std::env::temp_dir().join(format!("scroll-stitch-it-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let page = synthetic_page(160, 500, 17);
    // Written out of order; loading sorts by name.
    cut(&page, 200, 300, 0).to_rgb().save(dir.join("frame-02.png")).unwrap();
    cut(&page, 0, 300, 0).to_rgb().save(dir.join("frame-01.png")).unwrap();

    let mut source = DirectorySource::from_dir(&dir).unwrap();
    let frames = source.collect_frames();
    std::fs::remove_dir_all(&dir).unwrap();

    assert_eq!(frames.len(), 2);
    let canvas = stitch(&frames).unwrap();
    assert_eq!(canvas, Frame::new(page, 0).to_rgb());
}
