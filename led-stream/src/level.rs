//! Master level transform

use led_pipeline::{FrameBuffer, Stage, StageContext, StageError};

/// Live controls shared with every stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    /// 255 leaves frames untouched, 0 blacks them out
    pub level: u8,
}

impl Default for Controls {
    fn default() -> Self {
        Self { level: 255 }
    }
}

/// Scales every channel by the current master level
#[derive(Debug, Default)]
pub struct LevelStage;

impl Stage<Controls> for LevelStage {
    fn name(&self) -> &str {
        "level"
    }

    fn process(
        &mut self,
        frame: &mut FrameBuffer,
        ctx: &StageContext<'_, Controls>,
    ) -> Result<(), StageError> {
        let level = ctx.state.level as u16;
        if level == 255 {
            return Ok(());
        }
        for b in frame.as_bytes_mut() {
            *b = ((*b as u16 * level + 127) / 255) as u8;
        }
        Ok(())
    }
}
