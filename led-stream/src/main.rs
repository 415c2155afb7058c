//! led-stream: drive LED strips over OPC and SPI
//!
//! Renders the test pattern (or relays frames received by the OPC server) at
//! a fixed frame rate through the configured sinks. Configuration comes from
//! `LED_*` environment variables, see `config.rs`.

mod config;
mod level;
mod pattern;

use anyhow::Context;
use config::StreamConfig;
use crossbeam::channel::Receiver;
use led_opc::{OpcClientSink, OpcMessage, SET_PIXEL_COLORS};
use led_pipeline::{
    DevNullSink, FrameBuffer, FrameClock, FramePool, Pipeline, PipelineBuilder, PipelineConfig,
    ScreenSink, SharedState, Stage, Tick,
};
use led_spi::{SpiConfig, SpiSink};
use level::{Controls, LevelStage};
use pattern::TestPattern;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let config = StreamConfig::from_env().context("invalid configuration")?;
    log::info!(
        "streaming {} pixels at {} fps (pool of {})",
        config.pixels,
        config.fps,
        config.pool_size
    );

    let inbound = match &config.server_addr {
        Some(addr) => Some(start_server(addr)?),
        None => None,
    };

    let mut pipeline = build_pipeline(&config)?;
    let result = stream(&config, &mut pipeline, inbound.as_ref());

    let reports = pipeline.shutdown().context("pipeline failed")?;
    for report in reports {
        log::debug!("stage report: {:?}", report);
    }
    result
}

fn build_pipeline(config: &StreamConfig) -> anyhow::Result<Pipeline<Controls>> {
    let pool = Arc::new(FramePool::new(config.pixels, config.pool_size));
    let state = SharedState::new(Controls { level: config.level });

    let mut sinks: Vec<Box<dyn Stage<Controls>>> = Vec::new();
    if config.screen {
        sinks.push(Box::new(ScreenSink::stdout()));
    }
    if let Some(addr) = &config.opc_addr {
        sinks.push(Box::new(OpcClientSink::tcp(addr.clone())));
    }
    if let Some(path) = &config.spi_device {
        sinks.push(Box::new(SpiSink::open(path, SpiConfig::default())?));
    }
    if sinks.is_empty() {
        log::warn!("no sinks configured, frames go nowhere");
        sinks.push(Box::new(DevNullSink::new()));
    }

    let builder = PipelineBuilder::new(pool, state)
        .config(PipelineConfig {
            queue_depth: config.queue_depth,
        })
        .stage(LevelStage);
    let builder = sinks.into_iter().fold(builder, PipelineBuilder::boxed_stage);

    Ok(builder.build()?)
}

/// Bind the OPC server; a later accept failure ends the process
fn start_server(addr: &str) -> anyhow::Result<Receiver<OpcMessage>> {
    let (inbound, handle) = led_opc::launch(addr)?;

    thread::Builder::new()
        .name("led-opc-supervisor".to_string())
        .spawn(move || match handle.join() {
            Ok(Ok(())) => log::warn!("OPC server stopped"),
            Ok(Err(e)) => {
                log::error!("OPC server failed: {}", e);
                std::process::exit(1);
            }
            Err(_) => {
                log::error!("OPC server panicked");
                std::process::exit(1);
            }
        })
        .context("could not start OPC server supervisor")?;

    Ok(inbound)
}

/// Source loop: fill recycled frames and push them down the pipeline
fn stream(
    config: &StreamConfig,
    pipeline: &mut Pipeline<Controls>,
    inbound: Option<&Receiver<OpcMessage>>,
) -> anyhow::Result<()> {
    let pattern = TestPattern::new();
    let mut clock = FrameClock::new(config.fps);
    let mut relayed: Option<Vec<u8>> = None;
    let start = Instant::now();
    let mut produced = 0u64;

    while config.frames.map_or(true, |limit| produced < limit) {
        if let Tick::Late(behind) = clock.tick() {
            log::debug!("frame {} started {:?} late", produced, behind);
        }

        let mut frame = pipeline.acquire()?;

        if let Some(rx) = inbound {
            for msg in rx.try_iter() {
                if msg.command == SET_PIXEL_COLORS {
                    relayed = Some(msg.payload);
                } else {
                    log::debug!("ignoring OPC command {} on channel {}", msg.command, msg.channel);
                }
            }
        }

        match &relayed {
            Some(payload) => relay(&mut frame, payload),
            None => pattern.render(&mut frame, start.elapsed()),
        }

        pipeline.submit(frame)?;
        produced += 1;
    }

    log::info!("produced {} frames, {} late", produced, clock.overruns());
    Ok(())
}

/// Copy an inbound payload into the frame, blacking out pixels it does not cover
fn relay(frame: &mut FrameBuffer, payload: &[u8]) {
    let copied = frame.copy_from(payload);
    frame.as_bytes_mut()[copied..].fill(0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relay_pads_short_payload_with_black() {
        let mut frame = FrameBuffer::new(3);
        frame.fill([9, 9, 9]);
        relay(&mut frame, &[1, 2, 3]);
        assert_eq!(frame.as_bytes(), &[1, 2, 3, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_relay_truncates_long_payload() {
        let mut frame = FrameBuffer::new(1);
        relay(&mut frame, &[1, 2, 3, 4, 5, 6]);
        assert_eq!(frame.as_bytes(), &[1, 2, 3]);
    }

    #[test]
    fn test_pipeline_without_sinks_falls_back_to_dev_null() {
        let config = StreamConfig {
            pixels: 8,
            fps: 0,
            frames: Some(5),
            ..StreamConfig::default()
        };
        let mut pipeline = build_pipeline(&config).unwrap();
        stream(&config, &mut pipeline, None).unwrap();

        assert_eq!(pipeline.stats().submitted, 5);
        assert_eq!(pipeline.stats().stages, 2);
        let reports = pipeline.shutdown().unwrap();
        assert!(reports.iter().all(|r| r.frames == 5));
    }

    #[test]
    fn test_shallow_queues_still_drain() {
        let config = StreamConfig {
            pixels: 4,
            fps: 0,
            pool_size: 3,
            queue_depth: Some(1),
            frames: Some(20),
            ..StreamConfig::default()
        };
        let mut pipeline = build_pipeline(&config).unwrap();
        stream(&config, &mut pipeline, None).unwrap();

        let reports = pipeline.shutdown().unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.frames == 20));
    }
}
