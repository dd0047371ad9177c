//! Error types and exit codes for pulsectl

use pulsereader_core::PulseError;
use pulsereader_service::ServiceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Process exit code for a failed command.
///
/// 2 = line not found, 3 = channel capacity, 4 = invalid input or
/// configuration, 1 = anything else.
pub fn exit_code(error: &anyhow::Error) -> u8 {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<PulseError>() {
            return engine_exit_code(e);
        }
        if let Some(e) = cause.downcast_ref::<ServiceError>() {
            if let Some(engine) = e.as_engine() {
                return engine_exit_code(engine);
            }
            if e.is_invalid_input() {
                return 4;
            }
        }
        if let Some(CliError::InvalidArgument(_) | CliError::Json(_)) =
            cause.downcast_ref::<CliError>()
        {
            return 4;
        }
    }
    1
}

fn engine_exit_code(error: &PulseError) -> u8 {
    match error {
        PulseError::NotFound(_) => 2,
        PulseError::CapacityExceeded { .. } => 3,
        PulseError::HardwareRead { .. } | PulseError::InvalidConfig(_) => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn engine_errors_map_to_exit_codes() {
        assert_eq!(exit_code(&PulseError::not_found(3).into()), 2);
        assert_eq!(exit_code(&PulseError::capacity_exceeded(10).into()), 3);
        assert_eq!(
            exit_code(&ServiceError::from(PulseError::capacity_exceeded(10)).into()),
            3
        );
    }

    #[test]
    fn invalid_input_maps_to_four() {
        let err: anyhow::Error = ServiceError::config("bad").into();
        assert_eq!(exit_code(&err), 4);
        assert_eq!(
            exit_code(&CliError::InvalidArgument("--seconds".into()).into()),
            4
        );
    }

    #[test]
    fn context_is_looked_through() {
        let result: Result<(), ServiceError> = Err(ServiceError::OutOfOrder {
            line_no: 3,
            t_ns: 1,
            previous_ns: 2,
        });
        let err = result.context("replaying edges.jsonl");
        assert!(matches!(err, Err(ref e) if exit_code(e) == 4));
    }

    #[test]
    fn other_errors_map_to_one() {
        let io = std::io::Error::other("disk gone");
        assert_eq!(exit_code(&CliError::Io(io).into()), 1);
    }
}
