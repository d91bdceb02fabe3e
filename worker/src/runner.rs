// Runs one configured source: open, run its batch, close

use common::config::SourceConfig;
use common::errors::TransferError;
use common::models::TransferDirection;
use common::transfer::{self, Connection};
use common::transport::{self, Transport};
use tracing::{info, instrument, warn};

/// Per-source outcome of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceReport {
    pub succeeded: usize,
    pub failed: usize,
}

/// Run `source` with the transport its protocol calls for
pub fn run_source(source: &SourceConfig) -> Result<SourceReport, TransferError> {
    let transport =
        transport::for_protocol(source.protocol, source.connection.passive_mode);
    run_source_with(source, transport)
}

#[instrument(skip(source, transport), fields(source = %source.name, direction = source.direction.as_str()))]
pub fn run_source_with(
    source: &SourceConfig,
    transport: Box<dyn Transport>,
) -> Result<SourceReport, TransferError> {
    let config = source.connection.clone();

    match source.direction {
        TransferDirection::Get => Connection::open_scoped(config, transport, |connection| {
            let result = connection.get_files(|local_path, attributes, error| match error {
                None => info!(
                    local_path = ?local_path,
                    mtime = ?attributes.mtime(),
                    "Collected file"
                ),
                Some(e) => warn!(kind = %e.kind, error = %e, "File not collected"),
            })?;
            Ok(SourceReport {
                succeeded: result.collected,
                failed: result.failed,
            })
        }),
        TransferDirection::Put => Connection::open_scoped(config, transport, |connection| {
            let mut report = SourceReport::default();
            connection.put_files(|local_path, error| match error {
                None => {
                    report.succeeded += 1;
                    info!(local_path = ?local_path, "Put file");
                }
                Some(e) => {
                    report.failed += 1;
                    warn!(kind = %e.kind, error = %e, "File not put");
                }
            })?;
            Ok(report)
        }),
        TransferDirection::Test => match transfer::test_connection(config, transport) {
            None => Ok(SourceReport {
                succeeded: 1,
                failed: 0,
            }),
            Some(error) => Err(error),
        },
    }
}
