//! [`LineCamera`] – frames from a line-oriented stream.
//!
//! Lets an external pose-estimation process drive the arm: each input line
//! is one frame whose payload is the line's bytes (typically a JSON landmark
//! document).  Blank lines count as empty reads; end of input closes the
//! camera.

use std::io::BufRead;

use handarm_types::ArmError;

use crate::camera::{Camera, CameraFrame};

pub struct LineCamera<R> {
    id: String,
    reader: R,
    next_sequence: u64,
    closed: bool,
}

impl<R: BufRead + Send> LineCamera<R> {
    pub fn new(id: impl Into<String>, reader: R) -> Self {
        Self {
            id: id.into(),
            reader,
            next_sequence: 0,
            closed: false,
        }
    }
}

impl<R: BufRead + Send> Camera for LineCamera<R> {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<Option<CameraFrame>, ArmError> {
        if self.closed {
            return Err(ArmError::Capture(format!("stream '{}' is closed", self.id)));
        }
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .map_err(|e| ArmError::Capture(format!("stream '{}' read failed: {e}", self.id)))?;
        if read == 0 {
            self.closed = true;
            return Err(ArmError::Capture(format!("stream '{}' reached end of input", self.id)));
        }

        let payload = line.trim();
        if payload.is_empty() {
            return Ok(None);
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Ok(Some(CameraFrame {
            sequence,
            width: 0,
            height: 0,
            data: payload.as_bytes().to_vec(),
        }))
    }

    fn release(&mut self) {
        self.closed = true;
    }
}
