//! Bounded, auto-flushing per-conversation writer

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use reap_client::{Message, MessageBody};

use crate::config::{HarvestConfig, Markers};

/// Sentinel for "nothing rendered yet"; no real sender id collides with it,
/// so the first rendered message always gets the sender-change marker.
const NO_SENDER: i64 = i64::MIN;

/// Accumulates a conversation's messages and renders them to its output file
/// in capacity-bounded batches.
///
/// Pages arrive newest-to-oldest, so each batch is reversed at flush time
/// (unless reverse mode is off) to come out chronological. The sender-change
/// marker needs look-behind across message boundaries, which is why rendering
/// happens on whole batches instead of message by message.
pub struct ChatWriter {
    conversation_id: i64,
    capacity: usize,
    reverse: bool,
    markers: Markers,
    self_id: i64,
    last_sender: i64,
    buffer: Vec<Message>,
    out: BufWriter<File>,
    path: PathBuf,
}

impl ChatWriter {
    /// Open (truncating) the output file for `conversation_id` and return a
    /// writer over it. Truncation here is what makes reruns safe: a stale
    /// artifact from an earlier run never survives construction.
    pub fn create(
        config: &HarvestConfig,
        conversation_id: i64,
        self_id: i64,
    ) -> io::Result<Self> {
        let path = config.output_dir.join(conversation_id.to_string());
        let file = File::create(&path)?;
        Ok(Self {
            conversation_id,
            capacity: config.per_chat_buffer_size,
            reverse: config.reverse_chat_order,
            markers: config.markers.clone(),
            self_id,
            last_sender: NO_SENDER,
            buffer: Vec::new(),
            out: BufWriter::new(file),
            path,
        })
    }

    /// Buffer one message, flushing the current batch first if the buffer is
    /// at capacity.
    pub fn put(&mut self, message: Message) -> io::Result<()> {
        if self.buffer.len() == self.capacity {
            self.flush()?;
        }
        self.buffer.push(message);
        Ok(())
    }

    /// Render and clear the buffered batch. Idempotent: flushing an empty
    /// buffer writes nothing.
    pub fn flush(&mut self) -> io::Result<()> {
        let mut batch = std::mem::take(&mut self.buffer);
        if self.reverse {
            batch.reverse();
        }

        for message in batch {
            let sender = message.sender_id;
            if sender != self.last_sender {
                self.out.write_all(self.markers.change_sender.as_bytes())?;
            }
            self.out.write_all(self.markers.message_begin.as_bytes())?;
            if sender == self.self_id {
                self.out.write_all(self.markers.author.as_bytes())?;
            }
            match &message.body {
                MessageBody::Text { text } => self.out.write_all(text.as_bytes())?,
                MessageBody::Media => self.out.write_all(self.markers.media.as_bytes())?,
            }
            self.out.write_all(self.markers.message_end.as_bytes())?;
            self.last_sender = sender;
        }

        self.out.flush()
    }

    /// Final flush; consumes the writer so the file handle is released
    /// before the next conversation's writer opens.
    pub fn finish(mut self) -> io::Result<()> {
        self.flush()
    }

    /// Id of the conversation this writer serializes
    pub fn conversation_id(&self) -> i64 {
        self.conversation_id
    }

    /// Path of the output file
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl Drop for ChatWriter {
    fn drop(&mut self) {
        // teardown must not lose a partial batch, even on early exits
        if let Err(e) = self.flush() {
            tracing::warn!(
                conversation = self.conversation_id,
                error = %e,
                "failed to flush conversation writer during teardown"
            );
        }
    }
}
