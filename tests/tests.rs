use std::borrow::Cow;
use std::path::PathBuf;

use futures_util::StreamExt;
use image::Rgba;
use imgseq::*;
use imgseq_gif::GifDecoder;
use imgseq_image_rs::ImageRsDecoder;
use imgseq_png::PngDecoder;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

fn init() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn registry() -> DecoderRegistry {
    let mut registry = DecoderRegistry::new();
    registry
        .register(GifDecoder)
        .register(PngDecoder)
        .register(ImageRsDecoder);
    registry
}

fn load(data: Vec<u8>) -> Image {
    init();
    Loader::for_bytes(data, registry()).load()
}

fn gif_frame(
    (left, top): (u16, u16),
    (width, height): (u16, u16),
    buffer: Vec<u8>,
    transparent: Option<u8>,
    dispose: gif::DisposalMethod,
    delay: u16,
) -> gif::Frame<'static> {
    gif::Frame {
        left,
        top,
        width,
        height,
        buffer: Cow::Owned(buffer),
        transparent,
        dispose,
        delay,
        ..Default::default()
    }
}

/// 4x4 animation with a shared palette of black, red and white
fn animated_gif() -> Vec<u8> {
    let frames = [
        gif_frame(
            (0, 0),
            (4, 4),
            vec![1; 16],
            None,
            gif::DisposalMethod::Keep,
            10,
        ),
        gif_frame(
            (1, 1),
            (2, 2),
            vec![2, 0, 0, 2],
            Some(0),
            gif::DisposalMethod::Background,
            0,
        ),
        gif_frame(
            (3, 3),
            (1, 1),
            vec![2],
            None,
            gif::DisposalMethod::Keep,
            5,
        ),
    ];

    let mut data = Vec::new();
    {
        let palette = [0, 0, 0, 255, 0, 0, 255, 255, 255];
        let mut encoder = gif::Encoder::new(&mut data, 4, 4, &palette).unwrap();
        encoder.set_repeat(gif::Repeat::Infinite).unwrap();
        for frame in &frames {
            encoder.write_frame(frame).unwrap();
        }
    }
    data
}

/// 2x2 APNG with a hidden default image
fn animated_png() -> Vec<u8> {
    let mut data = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut data, 2, 2);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_animated(2, 3).unwrap();
        encoder.set_sep_def_img(true).unwrap();
        let mut writer = encoder.write_header().unwrap();

        writer.write_image_data(&[0, 0, 255, 255].repeat(4)).unwrap();

        writer.set_frame_delay(1, 0).unwrap();
        writer.set_dispose_op(png::DisposeOp::Previous).unwrap();
        writer.write_image_data(&RED.0.repeat(4)).unwrap();

        writer.set_frame_dimension(1, 1).unwrap();
        writer.set_frame_position(1, 1).unwrap();
        writer.set_blend_op(png::BlendOp::Over).unwrap();
        writer.set_dispose_op(png::DisposeOp::None).unwrap();
        writer.set_frame_delay(3, 1000).unwrap();
        writer.write_image_data(&[0, 255, 0, 128]).unwrap();

        writer.finish().unwrap();
    }
    data
}

fn colors(raster: &Raster) -> Vec<Rgba<u8>> {
    let (width, height) = raster.dimensions();
    (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| raster.color_at(x, y).unwrap())
        .collect()
}

fn temp_file(name: &str, data: &[u8]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("imgseq-tests-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

#[test]
fn gif_animation() {
    let image = load(animated_gif());

    async_global_executor::block_on(async {
        assert_eq!(image.finished().await, Status::Loaded);
    });

    let cache = image.cache();
    let info = cache.info().unwrap();
    assert_eq!((info.width, info.height), (4, 4));
    assert_eq!(info.frame_count, 3);
    assert!(info.animated);
    assert_eq!(info.loop_count, LoopCount::Infinite);
    assert_eq!(info.format_name, "GIF");

    let frames = cache.frames();
    let delays: Vec<_> = frames.iter().map(|frame| frame.delay_ms()).collect();
    assert_eq!(delays, vec![100, 1, 50]);

    for frame in &frames {
        assert_eq!(frame.raster().encoding(), PixelEncoding::Indexed8);
    }

    assert_eq!(colors(frames[0].raster()), vec![RED; 16]);

    #[rustfmt::skip]
    let expected = vec![
        RED, RED,   RED,   RED,
        RED, WHITE, RED,   RED,
        RED, RED,   WHITE, RED,
        RED, RED,   RED,   RED,
    ];
    assert_eq!(colors(frames[1].raster()), expected);

    #[rustfmt::skip]
    let expected = vec![
        RED, RED,   RED,   RED,
        RED, BLACK, BLACK, RED,
        RED, BLACK, BLACK, RED,
        RED, RED,   RED,   WHITE,
    ];
    assert_eq!(colors(frames[2].raster()), expected);
}

#[test]
fn apng_animation() {
    let image = load(animated_png());

    async_global_executor::block_on(async {
        assert_eq!(image.finished().await, Status::Loaded);
    });

    let cache = image.cache();
    let info = cache.info().unwrap();
    assert_eq!(info.frame_count, 2);
    assert_eq!(info.loop_count, LoopCount::Repeat(2));
    assert_eq!(info.format_name, "APNG");

    let frames = cache.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].delay_ms(), 10);
    assert_eq!(frames[1].delay_ms(), 3);

    assert_eq!(colors(frames[0].raster()), vec![RED; 4]);
    assert_eq!(
        colors(frames[1].raster()),
        vec![TRANSPARENT, TRANSPARENT, TRANSPARENT, Rgba([0, 255, 0, 128])]
    );
}

#[test]
fn events_arrive_in_order() {
    let image = load(animated_gif());

    let events: Vec<_> =
        async_global_executor::block_on(image.cache().subscribe().collect::<Vec<_>>());
    assert_eq!(
        events,
        vec![
            CacheEvent::InfoLoaded,
            CacheEvent::FrameLoaded(0),
            CacheEvent::FrameLoaded(1),
            CacheEvent::FrameLoaded(2),
            CacheEvent::Loaded,
        ]
    );
}

#[test]
fn truncated_gif_keeps_decoded_frames() {
    let mut data = animated_gif();
    data.truncate(data.len().saturating_sub(12));
    let image = load(data);

    let status = async_global_executor::block_on(image.finished());
    assert_eq!(status, Status::Invalid);
    assert!(image.cache().frames_ready() >= 1);
    assert!(!image.cache().diagnostics().is_empty());
}

#[test]
fn gif_with_indices_beyond_palette() {
    let mut data = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut data, 4, 1, &[0, 0, 0, 255, 0, 0]).unwrap();
        encoder
            .write_frame(&gif::Frame {
                width: 4,
                height: 1,
                buffer: Cow::Owned(vec![0, 1, 2, 3]),
                ..Default::default()
            })
            .unwrap();
    }
    let image = load(data);

    assert_eq!(
        async_global_executor::block_on(image.finished()),
        Status::Loaded
    );
    let frames = image.cache().frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(
        colors(frames[0].raster()),
        vec![BLACK, RED, TRANSPARENT, TRANSPARENT]
    );
}

#[test]
fn explicit_config() {
    init();
    let mut loader = Loader::for_bytes(animated_gif(), registry());
    loader.config(Config {
        delay: DelayPolicy {
            minimum_ms: 20,
            unspecified_ms: 100,
        },
    });
    let image = loader.load();

    async_global_executor::block_on(async {
        assert_eq!(image.finished().await, Status::Loaded);
    });
    let delays: Vec<_> = image
        .cache()
        .frames()
        .iter()
        .map(|frame| frame.delay_ms())
        .collect();
    assert_eq!(delays, vec![100, 20, 50]);
}

#[test]
fn still_image_from_file() {
    init();
    let mut data = std::io::Cursor::new(Vec::new());
    image::RgbImage::from_pixel(3, 3, image::Rgb([1, 2, 3]))
        .write_to(&mut data, image::ImageFormat::Bmp)
        .unwrap();
    let path = temp_file("still.bmp", data.get_ref());

    let image = Loader::new(path, registry()).load();
    let frame = async_global_executor::block_on(image.frame(0)).unwrap();

    assert_eq!(frame.delay(), None);
    assert_eq!(frame.raster().color_at(2, 2), Some(Rgba([1, 2, 3, 255])));
    assert_eq!(
        async_global_executor::block_on(image.finished()),
        Status::Loaded
    );
    assert_eq!(image.cache().info().unwrap().format_name, "BMP");
}

#[test]
fn unknown_format_is_reported() {
    init();
    let path = temp_file("image.unknown", b"not an image");
    let image = Loader::new(path, registry()).load();

    assert_eq!(
        async_global_executor::block_on(image.finished()),
        Status::Invalid
    );
    assert_eq!(image.cache().frames_ready(), 0);
    assert!(image.cache().diagnostics()[0].contains("unknown"));
}

#[test]
fn slot_supersedes_previous_load() {
    init();
    let mut slot = ImageSlot::new();
    let first = slot
        .load(Loader::for_bytes(animated_gif(), registry()))
        .cancellable();
    let image = slot.load(Loader::for_bytes(animated_png(), registry()));

    assert!(first.is_canceled());
    assert_eq!(
        async_global_executor::block_on(image.finished()),
        Status::Loaded
    );
    assert_eq!(image.cache().info().unwrap().format_name, "APNG");
}

#[test]
fn canceled_before_start() {
    init();
    let cancellable = Cancellable::new();
    cancellable.cancel();

    let mut loader = Loader::for_bytes(animated_gif(), registry());
    loader.cancellable(cancellable);
    let image = loader.load();

    assert_eq!(
        async_global_executor::block_on(image.finished()),
        Status::Empty
    );
    assert_eq!(image.cache().frames_ready(), 0);
}

#[test]
fn supported_extensions() {
    let extensions = registry().supported_extensions();
    for ext in ["gif", "png", "apng", "jpg", "webp"] {
        assert!(extensions.iter().any(|x| x == ext), "{ext}");
    }
}
