//! Command-frame encoder for hardware panels.
//!
//! Hardware revisions are all driven through the same companion firmware,
//! which speaks a small framed command protocol over the byte channel. The
//! revision is reported once during `initialize`; the firmware maps it onto
//! the vendor command set. Frame format:
//!
//! - START (1 byte): `0xAA` synchronization byte
//! - LENGTH (2 bytes, LE): payload length
//! - OPCODE (1 byte): command identifier
//! - PAYLOAD: command-specific data
//! - CHECKSUM (1 byte): XOR of LENGTH, OPCODE, and all payload bytes

use std::io::Write;
use std::path::Path;

use crate::config::DisplayRevision;
use crate::error::{PanelError, Result};
use crate::geometry::Rgb;
use crate::layout::{Align, TextRun};

use super::{DisplaySink, Orientation};

const FRAME_START: u8 = 0xAA;

const OP_RESET: u8 = 0x01;
const OP_INIT: u8 = 0x02;
const OP_BRIGHTNESS: u8 = 0x03;
const OP_BACKPLATE: u8 = 0x04;
const OP_ORIENTATION: u8 = 0x05;
const OP_BITMAP: u8 = 0x10;
const OP_TEXT: u8 = 0x11;
const OP_CLOSE: u8 = 0x1F;

/// Display sink writing command frames to an exclusively owned byte channel.
pub struct FramedSink {
    channel: Box<dyn Write + Send>,
    revision: DisplayRevision,
    width: u16,
    height: u16,
    closed: bool,
}

impl FramedSink {
    pub fn new(
        channel: Box<dyn Write + Send>,
        revision: DisplayRevision,
        width: u16,
        height: u16,
    ) -> Self {
        Self {
            channel,
            revision,
            width,
            height,
            closed: false,
        }
    }

    fn send(&mut self, opcode: u8, payload: &[u8]) -> Result<()> {
        if self.closed {
            return Err(PanelError::Display("channel already closed".to_string()));
        }
        let frame = encode_frame(opcode, payload);
        self.channel
            .write_all(&frame)
            .map_err(|err| PanelError::Display(format!("write failed: {err}")))?;
        self.channel
            .flush()
            .map_err(|err| PanelError::Display(format!("flush failed: {err}")))?;
        Ok(())
    }
}

impl DisplaySink for FramedSink {
    fn initialize(&mut self) -> Result<()> {
        let mut payload = vec![self.revision.wire_code()];
        payload.extend_from_slice(&self.width.to_le_bytes());
        payload.extend_from_slice(&self.height.to_le_bytes());
        self.send(OP_INIT, &payload)
    }

    fn reset(&mut self) -> Result<()> {
        self.send(OP_RESET, &[])
    }

    fn set_brightness(&mut self, percent: u8) -> Result<()> {
        self.send(OP_BRIGHTNESS, &[percent.min(100)])
    }

    fn set_backplate(&mut self, color: Rgb) -> Result<()> {
        self.send(OP_BACKPLATE, &color.as_bytes())
    }

    fn set_orientation(&mut self, orientation: Orientation) -> Result<()> {
        self.send(OP_ORIENTATION, &[orientation.wire_code()])
    }

    fn display_bitmap(&mut self, path: &Path) -> Result<()> {
        let payload = encode_path(path);
        self.send(OP_BITMAP, &payload)
    }

    fn display_text(&mut self, run: &TextRun) -> Result<()> {
        let payload = encode_text_run(run);
        self.send(OP_TEXT, &payload)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.send(OP_CLOSE, &[])?;
        self.closed = true;
        Ok(())
    }
}

fn encode_frame(opcode: u8, payload: &[u8]) -> Vec<u8> {
    let length = payload.len() as u16;
    let mut frame = Vec::with_capacity(payload.len() + 5);
    frame.push(FRAME_START);
    frame.extend_from_slice(&length.to_le_bytes());
    frame.push(opcode);
    frame.extend_from_slice(payload);
    frame.push(checksum(length, opcode, payload));
    frame
}

fn checksum(length: u16, opcode: u8, payload: &[u8]) -> u8 {
    let [lo, hi] = length.to_le_bytes();
    let mut acc = lo ^ hi ^ opcode;
    for &byte in payload {
        acc ^= byte;
    }
    acc
}

fn encode_path(path: &Path) -> Vec<u8> {
    let bytes = path.to_string_lossy().into_owned().into_bytes();
    let mut payload = Vec::with_capacity(bytes.len() + 2);
    payload.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    payload.extend_from_slice(&bytes);
    payload
}

fn encode_text_run(run: &TextRun) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&run.rect.x.to_le_bytes());
    payload.extend_from_slice(&run.rect.y.to_le_bytes());
    payload.extend_from_slice(&run.rect.width.to_le_bytes());
    payload.extend_from_slice(&run.rect.height.to_le_bytes());
    payload.push(align_code(run.align));
    payload.extend_from_slice(&run.color.as_bytes());
    payload.extend_from_slice(&run.font_size.to_le_bytes());
    payload.extend_from_slice(&encode_path(&run.font));
    match &run.background {
        Some(background) => {
            payload.push(1);
            payload.extend_from_slice(&encode_path(background));
        }
        None => payload.push(0),
    }
    let text = run.content.as_bytes();
    payload.extend_from_slice(&(text.len() as u16).to_le_bytes());
    payload.extend_from_slice(text);
    payload
}

fn align_code(align: Align) -> u8 {
    match align {
        Align::Left => 0,
        Align::Center => 1,
        Align::Right => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rgb;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CaptureChannel {
        bytes: Arc<Mutex<Vec<u8>>>,
    }

    impl Write for CaptureChannel {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.bytes.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sink_with_capture() -> (FramedSink, CaptureChannel) {
        let channel = CaptureChannel::default();
        let sink = FramedSink::new(
            Box::new(channel.clone()),
            DisplayRevision::RevB,
            320,
            480,
        );
        (sink, channel)
    }

    #[test]
    fn brightness_frame_layout() {
        let (mut sink, channel) = sink_with_capture();
        sink.set_brightness(10).unwrap();

        let bytes = channel.bytes.lock().unwrap().clone();
        assert_eq!(bytes[0], FRAME_START);
        assert_eq!(&bytes[1..3], &1u16.to_le_bytes());
        assert_eq!(bytes[3], OP_BRIGHTNESS);
        assert_eq!(bytes[4], 10);
        assert_eq!(bytes[5], checksum(1, OP_BRIGHTNESS, &[10]));
        assert_eq!(bytes.len(), 6);
    }

    #[test]
    fn brightness_is_clamped_to_percent() {
        let (mut sink, channel) = sink_with_capture();
        sink.set_brightness(255).unwrap();
        let bytes = channel.bytes.lock().unwrap().clone();
        assert_eq!(bytes[4], 100);
    }

    #[test]
    fn init_frame_carries_revision_and_dimensions() {
        let (mut sink, channel) = sink_with_capture();
        sink.initialize().unwrap();

        let bytes = channel.bytes.lock().unwrap().clone();
        assert_eq!(bytes[3], OP_INIT);
        assert_eq!(bytes[4], DisplayRevision::RevB.wire_code());
        assert_eq!(&bytes[5..7], &320u16.to_le_bytes());
        assert_eq!(&bytes[7..9], &480u16.to_le_bytes());
    }

    #[test]
    fn text_payload_round_trips_coordinates_and_content() {
        let run = TextRun {
            content: "web1".to_string(),
            rect: crate::geometry::Rect::new(60, 30, 300, 30),
            align: Align::Left,
            color: Rgb::GREEN,
            font: PathBuf::from("f.ttf"),
            font_size: 24,
            background: Some(PathBuf::from("bg.png")),
        };
        let payload = encode_text_run(&run);
        assert_eq!(&payload[0..2], &60u16.to_le_bytes());
        assert_eq!(&payload[2..4], &30u16.to_le_bytes());
        assert_eq!(&payload[4..6], &300u16.to_le_bytes());
        assert_eq!(payload[8], 0); // left aligned
        assert_eq!(&payload[9..12], &[0, 255, 0]);
        let text_len = payload.len();
        assert_eq!(&payload[text_len - 4..], b"web1");
    }

    #[test]
    fn writes_after_close_are_rejected() {
        let (mut sink, _channel) = sink_with_capture();
        sink.close().unwrap();
        assert!(sink.reset().is_err());
        // A second close is a no-op rather than an error.
        sink.close().unwrap();
    }
}
