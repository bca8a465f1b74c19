use std::error::Error;

use tonic::{Code, Status};

/// What a handler returned, as far as logging is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success,
    CodedFailure { code: Code, message: String },
    UncodedFailure { message: String },
}

impl Outcome {
    pub fn of<T, E: Classify>(result: &Result<T, E>) -> Outcome {
        match result {
            Ok(_) => Outcome::Success,
            Err(err) => err.classify(),
        }
    }
}

/// Errors that can tell whether they carry a gRPC status code.
pub trait Classify {
    fn classify(&self) -> Outcome;
}

impl Classify for Status {
    fn classify(&self) -> Outcome {
        Outcome::CodedFailure {
            code: self.code(),
            message: self.message().to_string(),
        }
    }
}

impl Classify for Box<dyn Error + Send + Sync> {
    fn classify(&self) -> Outcome {
        match self.downcast_ref::<Status>() {
            Some(status) => status.classify(),
            None => Outcome::UncodedFailure { message: self.to_string() },
        }
    }
}

impl Classify for std::io::Error {
    fn classify(&self) -> Outcome {
        Outcome::UncodedFailure { message: self.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type BoxError = Box<dyn Error + Send + Sync>;

    #[test]
    fn success() {
        assert_eq!(Outcome::of(&Ok::<_, Status>(())), Outcome::Success);
    }

    #[test]
    fn status() {
        let result: Result<(), Status> = Err(Status::invalid_argument("example error"));
        assert_eq!(
            Outcome::of(&result),
            Outcome::CodedFailure {
                code: Code::InvalidArgument,
                message: "example error".into()
            }
        );
    }

    #[test]
    fn boxed_status_is_coded() {
        let result: Result<(), BoxError> = Err(Box::new(Status::internal("internal")));
        assert_eq!(
            Outcome::of(&result),
            Outcome::CodedFailure { code: Code::Internal, message: "internal".into() }
        );
    }

    #[test]
    fn plain_error_is_uncoded() {
        let result: Result<(), BoxError> = Err("unhandled error".into());
        assert_eq!(
            Outcome::of(&result),
            Outcome::UncodedFailure { message: "unhandled error".into() }
        );
    }
}
