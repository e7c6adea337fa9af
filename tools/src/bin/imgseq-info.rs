use imgseq::{DecoderRegistry, Loader, PixelEncoding, Status};
use imgseq_gif::GifDecoder;
use imgseq_image_rs::ImageRsDecoder;
use imgseq_png::PngDecoder;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let status = async_global_executor::block_on(run());
    if status != Status::Loaded {
        std::process::exit(1);
    }
}

async fn run() -> Status {
    let mut args = std::env::args();
    let bin = args.next().unwrap_or_else(|| String::from("imgseq-info"));
    let Some(path) = args.next() else {
        eprintln!("Usage: {bin} <IMAGE PATH> [NUMBER FRAMES]");
        std::process::exit(2);
    };
    let n_frames: usize = args.next().and_then(|x| x.parse().ok()).unwrap_or(usize::MAX);

    let mut registry = DecoderRegistry::new();
    registry
        .register(GifDecoder)
        .register(PngDecoder)
        .register(ImageRsDecoder);

    let image = Loader::new(path, registry).load();

    if let Some(info) = image.info().await {
        println!("[info]");
        println!("dimensions = {} x {}", info.width, info.height);
        println!("format_name = {}", info.format_name);
        println!("animated = {}", info.animated);
        println!("loop_count = {}", info.loop_count.as_legacy());
    }

    let mut index = 0;
    while index < n_frames {
        let Some(frame) = image.frame(index).await else {
            break;
        };

        let raster = frame.raster();
        println!("[[frame]]");
        println!("dimensions = {} x {}", raster.width(), raster.height());
        println!(
            "encoding = {}",
            match raster.encoding() {
                PixelEncoding::Indexed8 => "indexed",
                PixelEncoding::Rgba32 => "rgba",
            }
        );
        println!(
            "delay = {}",
            frame
                .delay()
                .map(|x| format!("{:#?}", x))
                .unwrap_or("-".into())
        );

        index = index.saturating_add(1);
    }

    let status = image.finished().await;
    let cache = image.cache();
    println!("[status]");
    println!("status = {status:?}");
    println!("frames = {}", cache.frames_ready());
    println!("memory_estimate = {}", cache.memory_estimate());
    for diagnostic in cache.diagnostics() {
        println!("diagnostic = {diagnostic:?}");
    }

    status
}
