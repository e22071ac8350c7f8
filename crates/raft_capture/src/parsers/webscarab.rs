//! WebScarab saved sessions. The input is the session directory (or its
//! `conversationlog` file). The log lists conversations as blocks of
//! `KEY: value` lines:
//!
//! ```text
//! ### Conversation : 3
//! WHEN: 1190000000000
//! METHOD: GET
//! STATUS: 200 OK
//! URL: http://www.example.com/
//! ORIGIN: Proxy
//! ```
//!
//! Message bytes live in `conversations/<id>-request` and
//! `conversations/<id>-response`; the response file may be missing.

use std::{
    io,
    path::{Path, PathBuf},
};

use super::{numbered, RawRecordStream};
use crate::reader::LogLines;
use crate::{FormatId, IngestLimits, NativeRecord, ParserStreamError, WebScarabConversation};

const LOG_FILE: &str = "conversationlog";
const CONVERSATION_DIR: &str = "conversations";
const BLOCK_PREFIX: &str = "### Conversation";

pub fn parse(path: &Path, limits: &IngestLimits) -> Result<RawRecordStream, ParserStreamError> {
    let (log_path, session_dir) = if path.is_dir() {
        (path.join(LOG_FILE), path.to_path_buf())
    } else {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        (path.to_path_buf(), parent.to_path_buf())
    };
    let lines = LogLines::open(&log_path, limits)?;
    Ok(numbered(Conversations {
        lines,
        session_dir,
        pending: None,
        done: false,
    }))
}

struct Conversations {
    lines: LogLines,
    session_dir: PathBuf,
    /// Conversation whose header fields are being collected.
    pending: Option<WebScarabConversation>,
    done: bool,
}

impl Conversations {
    fn malformed(&self, line_number: usize, message: impl Into<String>) -> ParserStreamError {
        ParserStreamError::Malformed {
            format: FormatId::Webscarab,
            path: self.lines.path().to_path_buf(),
            location: format!("line {line_number}"),
            message: message.into(),
        }
    }

    fn message_path(&self, id: &str, kind: &str) -> PathBuf {
        self.session_dir
            .join(CONVERSATION_DIR)
            .join(format!("{id}-{kind}"))
    }

    fn finish(&self, mut conversation: WebScarabConversation) -> Result<NativeRecord, ParserStreamError> {
        let request_path = self.message_path(&conversation.id, "request");
        conversation.request = std::fs::read(&request_path).map_err(|source| {
            ParserStreamError::Open {
                path: request_path,
                source,
            }
        })?;
        let response_path = self.message_path(&conversation.id, "response");
        conversation.response = match std::fs::read(&response_path) {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(ParserStreamError::Open {
                    path: response_path,
                    source,
                })
            }
        };
        Ok(NativeRecord::WebScarabConversation(conversation))
    }

    fn next_conversation(&mut self) -> Result<Option<NativeRecord>, ParserStreamError> {
        loop {
            let Some(line) = self.lines.next() else {
                self.done = true;
                return match self.pending.take() {
                    Some(conversation) => self.finish(conversation).map(Some),
                    None => Ok(None),
                };
            };
            let line = line?;
            let text = line.text();
            let text = text.trim();

            if let Some(rest) = text.strip_prefix(BLOCK_PREFIX) {
                let id = rest.trim_start().trim_start_matches(':').trim();
                if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(self.malformed(line.number, format!("invalid conversation id `{id}`")));
                }
                let next = WebScarabConversation {
                    id: id.to_string(),
                    ..WebScarabConversation::default()
                };
                if let Some(finished) = self.pending.replace(next) {
                    return self.finish(finished).map(Some);
                }
                continue;
            }

            if text.is_empty() {
                continue;
            }
            if self.pending.is_none() {
                return Err(self.malformed(line.number, "field outside a conversation block"));
            }
            let (Some((key, value)), Some(conversation)) =
                (text.split_once(':'), self.pending.as_mut())
            else {
                continue;
            };
            let value = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            match key.trim() {
                "WHEN" => conversation.when = value,
                "METHOD" => conversation.method = value,
                "STATUS" => conversation.status = value,
                "URL" => conversation.url = value,
                "ORIGIN" => conversation.origin = value,
                _ => {}
            }
        }
    }
}

impl Iterator for Conversations {
    type Item = Result<NativeRecord, ParserStreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let outcome = self.next_conversation();
        if outcome.is_err() {
            self.done = true;
        }
        outcome.transpose()
    }
}
