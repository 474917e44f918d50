use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use std::{panic, process};

use anyhow::Context;
use clap::{Arg, ArgAction, Command, value_parser};
use log::{debug, info, warn};
use tokio::sync::Notify;

use mixcast::assets::DEFAULT_FILE_NAME;
use mixcast::config::{RecorderOptions, app_name, version};
use mixcast::media::synthetic::{TestPatternSource, ToneSource};
use mixcast::media::{MediaStream, MediaTrack, TrackSettings};
use mixcast::recorder::RecordingController;
use mixcast::workers::FileExportSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new(app_name())
        .version(version())
        .author(env!("CARGO_PKG_AUTHORS"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration")
                .value_name("SECONDS")
                .help("How long to record.")
                .value_parser(value_parser!(u64))
                .default_value("5"),
        )
        .arg(
            Arg::new("time-slice")
                .short('t')
                .long("time-slice")
                .value_name("MS")
                .help("Chunk length in milliseconds, overrides the config file.")
                .value_parser(value_parser!(u64)),
        )
        .arg(
            Arg::new("width")
                .long("width")
                .value_parser(value_parser!(u32))
                .default_value("640"),
        )
        .arg(
            Arg::new("height")
                .long("height")
                .value_parser(value_parser!(u32))
                .default_value("360"),
        )
        .arg(
            Arg::new("tone")
                .long("tone")
                .value_name("HZ")
                .help("Frequency of the test tone, 0 records without audio.")
                .value_parser(value_parser!(f64))
                .default_value("440"),
        )
        .arg(
            Arg::new("no-video")
                .long("no-video")
                .help("Record without a video source (a placeholder is used).")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("DIR")
                .value_parser(value_parser!(PathBuf))
                .default_value("."),
        )
        .arg(
            Arg::new("name")
                .short('n')
                .long("name")
                .value_name("FILE")
                .default_value(DEFAULT_FILE_NAME),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("JSON file with recorder options.")
                .value_parser(value_parser!(PathBuf)),
        )
        .get_matches();

    // kill the main thread as soon as a secondary thread panics
    let orig_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        orig_hook(panic_info);
        process::exit(105);
    }));

    // first Ctrl-C ends the recording early, the next one exits
    let interrupted = Arc::new(Notify::new());
    let notify = Arc::clone(&interrupted);
    let mut hits = 0u8;
    ctrlc::set_handler(move || {
        hits += 1;
        if hits > 1 {
            process::exit(130);
        }
        notify.notify_one();
    })
    .context("Error setting Ctrl-C handler")?;

    let mut options = match matches.get_one::<PathBuf>("config") {
        Some(path) => RecorderOptions::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => RecorderOptions::default(),
    };
    if let Some(time_slice) = matches.get_one::<u64>("time-slice") {
        options.time_slice = *time_slice;
    }
    let options = options.with_on_data_available(|chunk| {
        debug!("chunk #{} ({} bytes) at {}", chunk.seq, chunk.size(), chunk.timecode);
    });

    let width = *matches.get_one::<u32>("width").unwrap_or(&640);
    let height = *matches.get_one::<u32>("height").unwrap_or(&360);
    let tone = *matches.get_one::<f64>("tone").unwrap_or(&440.0);

    let mut stream = MediaStream::new();
    if !matches.get_flag("no-video") {
        stream.add_track(MediaTrack::video(
            "test-pattern",
            TrackSettings::video(width, height, 30),
            Arc::new(TestPatternSource::new(width, height)),
        ));
    }
    if tone > 0.0 {
        stream.add_track(MediaTrack::audio(
            "tone",
            TrackSettings::audio(options.sample_rate, options.channels),
            Arc::new(ToneSource::new(tone, 0.2, options.sample_rate, options.channels)),
        ));
    }

    let output = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."));
    let duration = Duration::from_secs(*matches.get_one::<u64>("duration").unwrap_or(&5));

    info!("{} {}: recording for {:?}", app_name(), version(), duration);
    let controller = RecordingController::builder(options)
        .export_sink(FileExportSink::new(output))
        .build();
    controller.start(Some(stream)).await?;

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = interrupted.notified() => warn!("Interrupted, stopping early"),
    }

    controller.stop();
    controller.wait_idle().await;

    let name = matches
        .get_one::<String>("name")
        .map(String::as_str)
        .unwrap_or(DEFAULT_FILE_NAME);
    let path = controller.download(Some(name))?;
    info!("Recording saved to {}", path.display());
    info!("{}", controller.health().summary());

    Ok(())
}
