use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Webhook secret is empty")]
    EmptySecret,

    #[error("Signature is not valid hex")]
    MalformedSignature,

    #[error("Signature does not match payload")]
    Mismatch,
}
