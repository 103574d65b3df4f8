//! Forward-only cursors over query results.

use std::fmt;

use recordlink_proto::{Operation, ResponsePayload, Value};
use tracing::{debug, warn};

use crate::connection::unexpected_payload;
use crate::error::{Misuse, Outcome};
use crate::session::Session;

/// A server-side result set, read one row at a time.
///
/// Column names and the row count are known as soon as the query returns.
/// The cursor starts before the first row; [`Cursor::move_first`] positions
/// it. The server-side result is released by [`Cursor::release`] or, failing
/// that, when the cursor is dropped.
pub struct Cursor<'s> {
    session: &'s Session,
    id: u64,
    text: String,
    columns: Vec<String>,
    row_count: u64,
    position: Option<u64>,
    row: Option<Vec<Value>>,
    released: bool,
}

impl<'s> Cursor<'s> {
    pub(crate) fn new(
        session: &'s Session,
        id: u64,
        text: &str,
        columns: Vec<String>,
        row_count: u64,
    ) -> Self {
        Self {
            session,
            id,
            text: text.to_string(),
            columns,
            row_count,
            position: None,
            row: None,
            released: false,
        }
    }

    /// Query text this cursor was opened with.
    pub fn query_text(&self) -> &str {
        &self.text
    }

    /// Number of rows in the result.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    /// Number of selected columns.
    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    /// Column names in select-list order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Name of the column at `index`.
    pub fn field_name(&self, index: usize) -> Outcome<&str> {
        self.columns
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| self.out_of_range(index).into())
    }

    /// Value of column `index` in the current row.
    pub fn field_value(&self, index: usize) -> Outcome<&Value> {
        if index >= self.columns.len() {
            return Err(self.out_of_range(index).into());
        }
        let row = self.row.as_ref().ok_or(Misuse::NoCurrentRow)?;
        row.get(index).ok_or_else(|| self.out_of_range(index).into())
    }

    /// The current row, if the cursor is on one.
    pub fn current_row(&self) -> Option<&[Value]> {
        self.row.as_deref()
    }

    /// Zero-based position of the current row, `None` before `move_first`.
    pub fn position(&self) -> Option<u64> {
        self.position
    }

    /// Whether the cursor has moved past the last row.
    ///
    /// Before positioning this reports whether the result is empty.
    pub fn is_at_end(&self) -> bool {
        match self.position {
            None => self.row_count == 0,
            Some(_) => self.row.is_none(),
        }
    }

    /// Position the cursor on the first row.
    pub fn move_first(&mut self) -> Outcome<()> {
        self.fetch(0)
    }

    /// Advance to the next row. At the end this does nothing.
    pub fn move_next(&mut self) -> Outcome<()> {
        let position = self.position.ok_or(Misuse::NotPositioned)?;
        if self.row.is_none() {
            return Ok(());
        }
        self.fetch(position + 1)
    }

    /// Iterate over the remaining rows, starting from the first.
    pub fn rows(&mut self) -> Rows<'_, 's> {
        Rows {
            cursor: self,
            started: false,
            done: false,
        }
    }

    /// Release the server-side result.
    pub fn release(mut self) -> Outcome<()> {
        self.released = true;
        self.close()
    }

    fn fetch(&mut self, position: u64) -> Outcome<()> {
        let payload = self.session.call(Operation::Fetch {
            cursor: self.id,
            position,
        })?;
        match payload {
            ResponsePayload::Row { values } => {
                self.position = Some(position);
                self.row = values;
                Ok(())
            }
            other => Err(unexpected_payload("fetch", &other)),
        }
    }

    fn close(&self) -> Outcome<()> {
        match self.session.call(Operation::CloseCursor { cursor: self.id })? {
            ResponsePayload::CursorClosed => {
                debug!(cursor = self.id, "cursor released");
                Ok(())
            }
            other => Err(unexpected_payload("close_cursor", &other)),
        }
    }

    fn out_of_range(&self, index: usize) -> Misuse {
        Misuse::FieldIndexOutOfRange {
            index,
            fields: self.columns.len(),
        }
    }
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.close() {
            warn!(cursor = self.id, error = %e, "failed to release cursor");
        }
    }
}

impl fmt::Debug for Cursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("query", &self.text)
            .field("columns", &self.columns)
            .field("row_count", &self.row_count)
            .field("position", &self.position)
            .finish()
    }
}

/// Iterator over cursor rows, produced by [`Cursor::rows`].
pub struct Rows<'c, 's> {
    cursor: &'c mut Cursor<'s>,
    started: bool,
    done: bool,
}

impl Iterator for Rows<'_, '_> {
    type Item = Outcome<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let step = if self.started {
            self.cursor.move_next()
        } else {
            self.started = true;
            self.cursor.move_first()
        };
        if let Err(e) = step {
            self.done = true;
            return Some(Err(e));
        }
        match self.cursor.current_row() {
            Some(row) => Some(Ok(row.to_vec())),
            None => {
                self.done = true;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConnectionConfig;
    use crate::error::Error;
    use recordlink_proto::Exchange;

    fn offline() -> Session {
        let connector = |_: &ConnectionConfig| -> Result<Box<dyn Exchange>, Error> {
            Err(Error::Configuration("offline".into()))
        };
        Session::with_connector(ConnectionConfig::default(), connector)
    }

    fn columns() -> Vec<String> {
        vec!["CardCode".to_string(), "CardName".to_string()]
    }

    #[test]
    fn test_metadata_before_positioning() {
        let session = offline();
        let mut cursor = Cursor::new(&session, 1, "SELECT CardCode, CardName FROM OCRD", columns(), 3);
        cursor.released = true;

        assert_eq!(cursor.row_count(), 3);
        assert_eq!(cursor.field_count(), 2);
        assert_eq!(cursor.field_name(1).unwrap(), "CardName");
        assert!(!cursor.is_at_end());
        assert_eq!(cursor.position(), None);

        assert!(matches!(
            cursor.field_value(0),
            Err(Error::Misuse(Misuse::NoCurrentRow))
        ));
        assert!(matches!(
            cursor.field_value(2),
            Err(Error::Misuse(Misuse::FieldIndexOutOfRange { index: 2, fields: 2 }))
        ));
        assert!(matches!(
            cursor.field_name(5),
            Err(Error::Misuse(Misuse::FieldIndexOutOfRange { index: 5, .. }))
        ));
        assert!(matches!(
            cursor.move_next(),
            Err(Error::Misuse(Misuse::NotPositioned))
        ));
    }

    #[test]
    fn test_empty_result_is_at_end() {
        let session = offline();
        let mut cursor = Cursor::new(&session, 1, "SELECT CardCode FROM OCRD", columns(), 0);
        cursor.released = true;
        assert!(cursor.is_at_end());
    }

    #[test]
    fn test_fetch_requires_connection() {
        let session = offline();
        let mut cursor = Cursor::new(&session, 1, "SELECT CardCode FROM OCRD", columns(), 1);
        assert!(matches!(
            cursor.move_first(),
            Err(Error::Misuse(Misuse::NotConnected))
        ));
        // Dropping an unreleased cursor on a dead session only logs.
        drop(cursor);
    }
}
