use airmirror_video::config::{RendererConfig, app_name, app_version};
use airmirror_video::engine::gst::GstEngine;
use airmirror_video::logger::LogFacade;
use airmirror_video::renderer::{HostLoop, VideoRenderer};
use airmirror_video::stream::{frame_duration, split_access_units};
use airmirror_video::utils::SignalOfStop;
use anyhow::Context;
use bytes::Bytes;
use clap::{Arg, ArgMatches, Command, value_parser};
use std::sync::Arc;
use std::time::Duration;

/// Quits the glib loop and stops the feeder.
struct HostSignal {
    main_loop: glib::MainLoop,
    stop: SignalOfStop,
}

impl HostLoop for HostSignal {
    fn quit(&self) {
        self.stop.cancel();
        self.main_loop.quit();
    }
}

fn command() -> Command {
    Command::new(app_name())
        .version(app_version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("input")
                .value_name("FILE")
                .help("H.264 Annex-B elementary stream to render.")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("JSON")
                .help("Renderer configuration file; flags override its values."),
        )
        .arg(
            Arg::new("name")
                .short('n')
                .long("name")
                .value_name("NAME")
                .help("Server name, used as display window title."),
        )
        .arg(
            Arg::new("flip")
                .short('f')
                .long("flip")
                .value_name("H|V|I")
                .help("Flip the video horizontally (H), vertically (V) or both (I)."),
        )
        .arg(
            Arg::new("rotate")
                .short('r')
                .long("rotate")
                .value_name("L|R")
                .help("Rotate the video 90 degrees left (L) or right (R)."),
        )
        .arg(Arg::new("parser").long("parser").help("Parser stage."))
        .arg(Arg::new("decoder").long("decoder").help("Decoder stage."))
        .arg(Arg::new("converter").long("converter").help("Converter stage."))
        .arg(Arg::new("sink").long("sink").help("Display sink stage."))
        .arg(
            Arg::new("fps")
                .long("fps")
                .value_name("FPS")
                .help("Frame rate used to pace and timestamp the stream.")
                .value_parser(value_parser!(u32).range(1..=240))
                .default_value("30"),
        )
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<RendererConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => RendererConfig::from_json_file(path)?,
        None => RendererConfig::default(),
    };

    if let Some(name) = matches.get_one::<String>("name") {
        config.server_name = name.clone();
    }
    if let Some(flip) = matches.get_one::<String>("flip") {
        config.flip = flip.parse()?;
    }
    if let Some(rotation) = matches.get_one::<String>("rotate") {
        config.rotation = rotation.parse()?;
    }
    for (flag, stage) in [
        ("parser", &mut config.parser),
        ("decoder", &mut config.decoder),
        ("converter", &mut config.converter),
        ("sink", &mut config.sink),
    ] {
        if let Some(value) = matches.get_one::<String>(flag) {
            *stage = value.clone();
        }
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = command().get_matches();
    let config = load_config(&matches)?;
    let fps = matches.get_one::<u32>("fps").copied().unwrap_or(30);

    let input = matches
        .get_one::<String>("input")
        .context("missing input file")?;
    let data = tokio::fs::read(input)
        .await
        .with_context(|| format!("reading {}", input))?;
    let units = split_access_units(Bytes::from(data));
    let keyframes = units.iter().filter(|unit| unit.keyframe).count();
    log::info!(
        "{}: {} access units ({} keyframes) at {} fps",
        input,
        units.len(),
        keyframes,
        fps
    );
    if keyframes == 0 {
        log::warn!("{}: no IDR frame, the decoder may never output a picture", input);
    }

    let engine = GstEngine::new()?;
    let mut renderer = VideoRenderer::new(Arc::new(engine), Arc::new(LogFacade));
    renderer.init(&config)?;
    renderer.start()?;

    let stop = SignalOfStop::new();
    let main_loop = glib::MainLoop::new(None, false);
    let host = Arc::new(HostSignal {
        main_loop: main_loop.clone(),
        stop: stop.clone(),
    });
    let watch = renderer.register_bus_watch(host.clone())?;

    // gracefully close on Ctrl-C
    let signal = host.clone();
    ctrlc::set_handler(move || signal.quit()).context("Error setting Ctrl-C handler")?;

    let host_loop = tokio::task::spawn_blocking(move || main_loop.run());

    let mut ticker = tokio::time::interval(Duration::from_nanos(frame_duration(fps)));
    for (index, unit) in units.into_iter().enumerate() {
        if stop.cancelled() {
            break;
        }
        ticker.tick().await;
        renderer.submit_access_unit(&unit.into_access_unit(index as u64, fps));
    }

    if let Some(stats) = renderer.stats() {
        log::info!("{}", stats);
    }

    renderer.stop();
    watch.remove();
    renderer.destroy();

    host.quit();
    host_loop.await?;

    Ok(())
}
