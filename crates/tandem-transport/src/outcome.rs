//! Classification of raw socket results.
//!
//! Raw transport primitives never touch a connection's liveness directly.
//! They report an [`IoOutcome`] and the [`Connection`](crate::Connection)
//! decides what that means for its state.

use std::io;

/// The result of one raw send or receive.
#[derive(Debug)]
pub enum IoOutcome {
    /// The operation completed and moved this many bytes.
    Done(usize),
    /// The OS asked us to try again later. The connection survives.
    Transient(io::Error),
    /// The OS reported a failure the connection cannot recover from.
    Terminal(io::Error),
}

impl IoOutcome {
    /// Turns an `io::Result` into an outcome, classifying any error.
    pub fn from_result(result: io::Result<usize>) -> Self {
        match result {
            Ok(n) => Self::Done(n),
            Err(e) if is_transient(&e) => Self::Transient(e),
            Err(e) => Self::Terminal(e),
        }
    }
}

/// Returns `true` for error kinds that leave a socket usable.
///
/// `WouldBlock` covers both EAGAIN and EWOULDBLOCK.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock
            | io::ErrorKind::OutOfMemory
            | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_result_ok_is_done() {
        assert!(matches!(IoOutcome::from_result(Ok(4)), IoOutcome::Done(4)));
    }

    #[test]
    fn test_from_result_would_block_is_transient() {
        let outcome = IoOutcome::from_result(Err(io::ErrorKind::WouldBlock.into()));
        assert!(matches!(outcome, IoOutcome::Transient(_)));
    }

    #[test]
    fn test_from_result_out_of_memory_is_transient() {
        let outcome = IoOutcome::from_result(Err(io::ErrorKind::OutOfMemory.into()));
        assert!(matches!(outcome, IoOutcome::Transient(_)));
    }

    #[test]
    fn test_from_result_reset_and_eof_are_terminal() {
        for kind in [
            io::ErrorKind::ConnectionReset,
            io::ErrorKind::BrokenPipe,
            io::ErrorKind::UnexpectedEof,
            io::ErrorKind::ConnectionRefused,
        ] {
            let outcome = IoOutcome::from_result(Err(kind.into()));
            assert!(
                matches!(outcome, IoOutcome::Terminal(_)),
                "{kind:?} should be terminal"
            );
        }
    }
}
