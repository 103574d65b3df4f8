//! Record handles: build a new record or edit a loaded one, then submit.

use std::fmt;

use recordlink_proto::record::assign_field;
use recordlink_proto::{
    FieldValue, LineData, Operation, RecordData, RecordKey, RecordType, ResponsePayload, Value,
};
use tracing::debug;

use crate::connection::unexpected_payload;
use crate::error::{Misuse, Outcome};
use crate::session::Session;

/// How a handle was obtained; fixed for the life of the handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Created locally; `submit` inserts.
    New,
    /// Loaded from the server; `submit` updates.
    Loaded {
        /// Key the record was loaded with.
        key: RecordKey,
    },
}

/// A local working copy of one record.
///
/// Field setters and getters never touch the network; only
/// [`RecordHandle::submit`] does.
pub struct RecordHandle<'s> {
    session: &'s Session,
    record_type: RecordType,
    mode: Mode,
    key: Option<RecordKey>,
    data: RecordData,
}

impl<'s> RecordHandle<'s> {
    pub(crate) fn new(session: &'s Session, record_type: RecordType) -> Self {
        Self {
            session,
            record_type,
            mode: Mode::New,
            key: None,
            data: RecordData::default(),
        }
    }

    pub(crate) fn loaded(
        session: &'s Session,
        record_type: RecordType,
        key: RecordKey,
        data: RecordData,
    ) -> Self {
        Self {
            session,
            record_type,
            mode: Mode::Loaded { key: key.clone() },
            key: Some(key),
            data,
        }
    }

    /// Record type of this handle.
    pub fn record_type(&self) -> RecordType {
        self.record_type
    }

    /// Whether the handle was created or loaded.
    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    /// The record's key as last reported by the server, if it has one yet.
    pub fn key(&self) -> Option<&RecordKey> {
        self.key.as_ref()
    }

    /// Assign a header field. Reassigning a field replaces its value.
    pub fn set_field(&mut self, name: &str, value: impl Into<Value>) -> &mut Self {
        self.data.set(name, value);
        self
    }

    /// Read a header field.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.field(name)
    }

    /// Header fields in assignment order.
    pub fn fields(&self) -> &[FieldValue] {
        &self.data.fields
    }

    /// Append an empty child row and return its position.
    pub fn append_line(&mut self) -> Outcome<usize> {
        if !self.record_type.supports_lines() {
            return Err(Misuse::LinesUnsupported(self.record_type).into());
        }
        self.data.lines.push(LineData::default());
        Ok(self.data.lines.len() - 1)
    }

    /// Assign a field of the child row at `position`.
    pub fn set_line_field(
        &mut self,
        position: usize,
        name: &str,
        value: impl Into<Value>,
    ) -> Outcome<()> {
        let lines = self.data.lines.len();
        let line = self
            .data
            .lines
            .get_mut(position)
            .ok_or(Misuse::LineOutOfRange { position, lines })?;
        assign_field(&mut line.fields, name, value.into());
        Ok(())
    }

    /// Read a field of the child row at `position`.
    pub fn line_field(&self, position: usize, name: &str) -> Outcome<Option<&Value>> {
        let line = self.data.lines.get(position).ok_or(Misuse::LineOutOfRange {
            position,
            lines: self.data.lines.len(),
        })?;
        Ok(line.field(name))
    }

    /// Number of child rows.
    pub fn line_count(&self) -> usize {
        self.data.lines.len()
    }

    /// Child rows in position order.
    pub fn lines(&self) -> &[LineData] {
        &self.data.lines
    }

    /// Full local state: header fields and child rows.
    pub fn data(&self) -> &RecordData {
        &self.data
    }

    /// Send the record to the server.
    ///
    /// A new record is inserted together with all of its child rows, or not
    /// at all. A loaded record is updated with its full current state. The
    /// returned key is the one the record is stored under afterwards; for a
    /// catalogue mapping whose substitute changed, that differs from the key
    /// it was loaded with.
    pub fn submit(&mut self) -> Outcome<RecordKey> {
        let record_type = self.record_type.code();
        let data = self.data.clone();
        let key = match (&self.mode, &self.key) {
            (Mode::New, _) => match self.session.call(Operation::Add { record_type, data })? {
                ResponsePayload::Added { key } => key,
                other => return Err(unexpected_payload("add", &other)),
            },
            (Mode::Loaded { key: loaded }, current) => {
                let key = current.clone().unwrap_or_else(|| loaded.clone());
                match self.session.call(Operation::Update { record_type, key, data })? {
                    ResponsePayload::Updated { key } => key,
                    other => return Err(unexpected_payload("update", &other)),
                }
            }
        };

        debug!(record_type = %self.record_type, key = %key, "record submitted");
        self.key = Some(key.clone());
        Ok(key)
    }
}

impl fmt::Debug for RecordHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordHandle")
            .field("record_type", &self.record_type)
            .field("mode", &self.mode)
            .field("key", &self.key)
            .field("fields", &self.data.fields.len())
            .field("lines", &self.data.lines.len())
            .finish()
    }
}
