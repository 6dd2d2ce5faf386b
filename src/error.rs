use std::fmt;

/// Failures surfaced by an enhancement run or by the stores backing it.
///
/// Every variant's Display text is shown to the user verbatim, so messages
/// stay short and free of internal jargon.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EnhanceError {
    #[error("sign in before enhancing photos")]
    AuthenticationRequired,

    #[error("{0}")]
    Validation(String),

    #[error("could not read a style from the reference photo")]
    InstructionDerivation,

    #[error("the model returned no image")]
    NoImageReturned,

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("service request failed: {0}")]
    Transport(String),
}

impl EnhanceError {
    /// Short machine-readable label, used in diagnostics lines.
    pub fn kind(&self) -> Kind {
        match self {
            Self::AuthenticationRequired => Kind::AuthenticationRequired,
            Self::Validation(_) => Kind::Validation,
            Self::InstructionDerivation => Kind::InstructionDerivation,
            Self::NoImageReturned => Kind::NoImageReturned,
            Self::Storage(_) => Kind::Storage,
            Self::Transport(_) => Kind::Transport,
        }
    }

    pub fn storage(context: &str, err: impl fmt::Display) -> Self {
        Self::Storage(format!("{context}: {err}"))
    }

    pub fn transport(context: &str, err: impl fmt::Display) -> Self {
        Self::Transport(format!("{context}: {err}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    AuthenticationRequired,
    Validation,
    InstructionDerivation,
    NoImageReturned,
    Storage,
    Transport,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AuthenticationRequired => "auth-required",
            Self::Validation => "validation",
            Self::InstructionDerivation => "instruction-derivation",
            Self::NoImageReturned => "no-image-returned",
            Self::Storage => "storage",
            Self::Transport => "transport",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_user_facing() {
        let err = EnhanceError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "storage failure: disk full");

        let err = EnhanceError::Validation("add a dish photo first".to_string());
        assert_eq!(err.to_string(), "add a dish photo first");
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            EnhanceError::NoImageReturned.kind(),
            Kind::NoImageReturned
        );
        assert_eq!(
            EnhanceError::transport("post failed", "timed out").kind(),
            Kind::Transport
        );
    }
}
