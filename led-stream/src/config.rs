//! Runtime configuration from environment variables

use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var}={value:?} is not valid: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// Pixels on the strip
    pub pixels: usize,
    /// Frames per second produced by the source
    pub fps: u32,
    /// Frames circulating through the pipeline
    pub pool_size: usize,
    /// Depth of each inter-stage queue; `None` sizes queues to the pool
    pub queue_depth: Option<usize>,
    /// Stop after this many frames; `None` runs until a stage fails
    pub frames: Option<u64>,
    /// Master level applied to every channel
    pub level: u8,
    /// `host:port` of an OPC server to stream to
    pub opc_addr: Option<String>,
    /// SPI device node driving an LPD8806 strip
    pub spi_device: Option<PathBuf>,
    /// Address to accept OPC producers on
    pub server_addr: Option<String>,
    /// Print frames to stdout
    pub screen: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            pixels: 160,
            fps: 60,
            pool_size: 4,
            queue_depth: None,
            frames: None,
            level: 255,
            opc_addr: None,
            spi_device: None,
            server_addr: None,
            screen: false,
        }
    }
}

impl StreamConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset or empty variables keep defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(v) = get("LED_PIXELS") {
            config.pixels = parse("LED_PIXELS", &v)?;
        }
        if let Some(v) = get("LED_FPS") {
            config.fps = parse("LED_FPS", &v)?;
        }
        if let Some(v) = get("LED_POOL") {
            config.pool_size = parse("LED_POOL", &v)?;
        }
        if let Some(v) = get("LED_QUEUE") {
            config.queue_depth = Some(parse("LED_QUEUE", &v)?);
        }
        if let Some(v) = get("LED_FRAMES") {
            config.frames = Some(parse("LED_FRAMES", &v)?);
        }
        if let Some(v) = get("LED_LEVEL") {
            config.level = parse("LED_LEVEL", &v)?;
        }
        if let Some(v) = get("LED_SCREEN") {
            config.screen = parse_flag("LED_SCREEN", &v)?;
        }
        config.opc_addr = get("LED_OPC_ADDR");
        config.spi_device = get("LED_SPI_DEVICE").map(PathBuf::from);
        config.server_addr = get("LED_SERVER_ADDR");
        if let Some(v) = get("LED_SERVER") {
            if parse_flag("LED_SERVER", &v)? && config.server_addr.is_none() {
                config.server_addr = Some(led_opc::default_listen_addr());
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.pixels == 0 {
            return Err(invalid("LED_PIXELS", "0", "strip needs at least one pixel"));
        }
        // One OPC message must carry a whole frame
        let too_long = self.pixels.checked_mul(3).map_or(true, |n| n > u16::MAX as usize);
        if too_long {
            return Err(invalid(
                "LED_PIXELS",
                &self.pixels.to_string(),
                "frame exceeds the 65535-byte OPC payload limit",
            ));
        }
        if self.pool_size == 0 {
            return Err(invalid("LED_POOL", "0", "pool needs at least one frame"));
        }
        if self.queue_depth == Some(0) {
            return Err(invalid("LED_QUEUE", "0", "queues need room for one frame"));
        }
        Ok(())
    }
}

fn invalid(var: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| invalid(var, value, &e.to_string()))
}

fn parse_flag(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, value, "expected a boolean")),
    }
}
