use fail::fail_point;

use crate::bail;
use crate::error::{CdcResult, ErrorKind};

/// Fires after the probe of a polling cycle, before any change stream is opened.
pub const POLL_CYCLE__AFTER_PROBE: &str = "poll_cycle.after_probe";

/// Evaluates the fail point `name`, returning an error when it is configured to fire.
///
/// The optional fail point argument picks the error kind: `source_io`, `sink` or anything else
/// for [`ErrorKind::InvalidState`].
pub fn cdc_fail_point(name: &str) -> CdcResult<()> {
    fail_point!(name, |parameter| {
        let error_kind = match parameter.as_deref() {
            Some("source_io") => ErrorKind::SourceIoError,
            Some("sink") => ErrorKind::SinkError,
            _ => ErrorKind::InvalidState,
        };

        bail!(
            error_kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
