//! Command Frames
//!
//! Builds the ASCII request frames written to the device.
//!
//! Frame format: `<` keyword payload `>>`. Only SETDATETIME carries a payload,
//! six raw bytes (year offset, month, day, hour, minute, second) inlined
//! between the keyword and the closing `>>`.

use super::{Command, DeviceTime};

const FRAME_OPEN: u8 = b'<';
const FRAME_CLOSE: &[u8] = b">>";

/// Build the frame for a command without payload
pub fn build_frame(cmd: Command) -> Vec<u8> {
    build_frame_with_payload(cmd, &[])
}

/// Build a frame with raw payload bytes between keyword and terminator
pub fn build_frame_with_payload(cmd: Command, payload: &[u8]) -> Vec<u8> {
    let keyword = cmd.keyword().as_bytes();
    let mut frame = Vec::with_capacity(1 + keyword.len() + payload.len() + FRAME_CLOSE.len());
    frame.push(FRAME_OPEN);
    frame.extend_from_slice(keyword);
    frame.extend_from_slice(payload);
    frame.extend_from_slice(FRAME_CLOSE);
    frame
}

/// Build the SETDATETIME frame for a device time
pub fn build_set_datetime_frame(time: &DeviceTime) -> Vec<u8> {
    build_frame_with_payload(Command::SetDateTime, &time.to_bytes())
}
