//! Debug sinks

use crate::error::StageError;
use crate::frame::{FrameBuffer, BYTES_PER_PIXEL};
use crate::stage::{Stage, StageContext};
use std::io::{self, Write};

/// Bytes printed per line by [`ScreenSink`]
const SCREEN_BYTES: usize = 19;

/// Passes frames through untouched
#[derive(Debug, Default)]
pub struct DevNullSink;

impl DevNullSink {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Stage<S> for DevNullSink {
    fn name(&self) -> &str {
        "devnull"
    }

    fn process(
        &mut self,
        _frame: &mut FrameBuffer,
        _ctx: &StageContext<'_, S>,
    ) -> Result<(), StageError> {
        Ok(())
    }
}

/// Prints the first few pixels of every frame
pub struct ScreenSink<W> {
    out: W,
    line: String,
}

impl ScreenSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ScreenSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            line: String::with_capacity(128),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn format_frame(&mut self, frame: &FrameBuffer) {
        use std::fmt::Write as _;

        self.line.clear();
        self.line.push('[');
        let bytes = frame.as_bytes();
        let shown = &bytes[..bytes.len().min(SCREEN_BYTES)];
        for (i, pixel) in shown.chunks(BYTES_PER_PIXEL).enumerate() {
            if i > 0 {
                self.line.push_str(" |");
            }
            for channel in pixel {
                let _ = write!(self.line, " {:3}", channel);
            }
        }
        let _ = write!(self.line, " ...] {} px", frame.pixel_count());
    }
}

impl<S, W: Write + Send> Stage<S> for ScreenSink<W> {
    fn name(&self) -> &str {
        "screen"
    }

    fn process(
        &mut self,
        frame: &mut FrameBuffer,
        _ctx: &StageContext<'_, S>,
    ) -> Result<(), StageError> {
        self.format_frame(frame);
        if let Err(e) = writeln!(self.out, "{}", self.line) {
            log::warn!("[screen] write failed: {}", e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::run_stage;
    use crate::state::SharedState;
    use crossbeam::channel;

    fn screen_line(frame: &mut FrameBuffer) -> String {
        let mut sink = ScreenSink::new(Vec::new());
        let ctx = StageContext {
            state: &(),
            frame_index: 0,
        };
        sink.process(frame, &ctx).unwrap();
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn test_screen_sink_prints_first_19_bytes() {
        let mut frame = FrameBuffer::new(8);
        frame.pixels_mut()[0] = [255, 0, 0];
        frame.pixels_mut()[1] = [0, 12, 3];
        frame.pixels_mut()[6] = [9, 8, 7];

        let expected = String::from("[ 255   0   0 |   0  12   3")
            + &" |   0   0   0".repeat(4)
            + " |   9 ...] 8 px\n";
        assert_eq!(screen_line(&mut frame), expected);
    }

    #[test]
    fn test_screen_sink_short_frame() {
        let mut frame = FrameBuffer::from_bytes(vec![1, 2, 3]).unwrap();
        assert_eq!(screen_line(&mut frame), "[   1   2   3 ...] 1 px\n");
    }

    #[test]
    fn test_dev_null_forwards_unchanged() {
        let (in_tx, in_rx) = channel::bounded(1);
        let (out_tx, out_rx) = channel::bounded(1);

        let frame = FrameBuffer::from_bytes(vec![1, 2, 3]).unwrap();
        let checksum = frame.checksum();
        in_tx.send(frame).unwrap();
        drop(in_tx);

        run_stage(&mut DevNullSink::new(), in_rx, out_tx, SharedState::new(())).unwrap();
        assert_eq!(out_rx.recv().unwrap().checksum(), checksum);
    }
}
