//! Connect, run one use case, report, disconnect.

use tracing::error;

use crate::error::{Error, Outcome};
use crate::session::Session;

/// Run `operation` inside a connected session.
///
/// A failed connect is reported and returned without attempting a
/// disconnect. Otherwise the operation runs, any failure it returns is
/// reported before cleanup, and the session is disconnected whatever the
/// operation's outcome.
pub fn run<T>(session: &mut Session, operation: impl FnOnce(&Session) -> Outcome<T>) -> Outcome<T> {
    run_with_report(session, report, operation)
}

/// [`run`] with a caller-supplied report in place of the log line. `report`
/// is called at most once.
pub fn run_with_report<T>(
    session: &mut Session,
    report: impl FnOnce(&Error),
    operation: impl FnOnce(&Session) -> Outcome<T>,
) -> Outcome<T> {
    if let Err(e) = session.connect() {
        report(&e);
        return Err(e);
    }

    let result = operation(session);
    if let Err(e) = &result {
        report(e);
    }
    session.disconnect();
    result
}

/// Log a failure's code and message.
pub fn report(error: &Error) {
    let failure = error.failure();
    error!(
        code = failure.code,
        message = %failure.message,
        caller_fault = error.is_caller_fault(),
        "operation failed"
    );
}
