use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// SharedError is a cloneable handle to an error returned by a unit of work.
///
/// Every caller of one in-flight call receives a clone of the same handle,
/// so two handles compare equal only when they point at the same error,
/// not when their messages happen to match.
#[derive(Clone)]
pub struct SharedError(Arc<anyhow::Error>);

impl SharedError {
    pub fn new(err: impl Into<anyhow::Error>) -> SharedError {
        SharedError(Arc::new(err.into()))
    }

    /// msg creates an error from a printable message.
    pub fn msg<M>(message: M) -> SharedError
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        SharedError(Arc::new(anyhow::Error::msg(message)))
    }
}

impl PartialEq for SharedError {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for SharedError {}

impl Deref for SharedError {
    type Target = anyhow::Error;

    fn deref(&self) -> &anyhow::Error {
        &self.0
    }
}

impl fmt::Display for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.0, f)
    }
}

impl fmt::Debug for SharedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl<E> From<E> for SharedError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        SharedError::new(err)
    }
}

#[cfg(test)]
mod tests {
    use super::SharedError;
    use std::io::{Error as IOErr, ErrorKind};

    #[test]
    fn test_clone_is_identical() {
        let err = SharedError::msg("some error");
        let other = err.clone();
        assert_eq!(err, other);
        assert_eq!(other.to_string(), "some error");
    }

    #[test]
    fn test_equal_message_is_not_identical() {
        assert_ne!(
            SharedError::msg("some error"),
            SharedError::msg("some error")
        );
    }

    #[test]
    fn test_from_std_error() {
        let err: SharedError = IOErr::new(ErrorKind::InvalidData, "test error").into();
        assert_eq!(err.to_string(), "test error");
        let io = err.downcast_ref::<IOErr>().map(|e| e.kind());
        assert_eq!(io, Some(ErrorKind::InvalidData));
    }

    #[test]
    fn test_question_mark_conversion() {
        fn parse(s: &str) -> Result<i32, SharedError> {
            Ok(s.parse::<i32>()?)
        }
        assert_eq!(parse("7").ok(), Some(7));
        assert!(parse("seven").is_err());
    }
}
