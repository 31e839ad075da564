use thiserror::Error;

pub type Result<T> = std::result::Result<T, MutationError>;

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("unmarshaling request failed with {0}")]
    MalformedReview(#[source] serde_json::Error),

    #[error("unable to unmarshal pod json object: {0}")]
    MalformedPodObject(String),

    #[error("cannot marshal admission review: {0}")]
    Encode(#[source] serde_json::Error),
}
