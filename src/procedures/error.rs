#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid procedure name `{name}`: {reason}")]
    InvalidName { name: String, reason: String },
    #[error("procedure `{procedure}` declares parameter `{param}` twice")]
    DuplicateParameter { procedure: String, param: String },
    #[error("procedure `{procedure}` declares invalid cache output `{filename}`: {reason}")]
    InvalidCacheOutput {
        procedure: String,
        filename: String,
        reason: String,
    },
    #[error("unknown procedure `{name}`")]
    UnknownProcedure { name: String },
    #[error("procedure `{procedure}` has no parameter `{argument}`")]
    UnknownArgument { procedure: String, argument: String },
    #[error("procedure `{procedure}` is missing required argument `{argument}`")]
    MissingArgument { procedure: String, argument: String },
    #[error("argument `{argument}` is bound twice for procedure `{procedure}`")]
    DuplicateArgument { procedure: String, argument: String },
    #[error("procedure `{procedure}` failed: {message}")]
    ProcedureFailed { procedure: String, message: String },
    #[error("procedure `{procedure}` panicked: {message}")]
    ProcedurePanicked { procedure: String, message: String },
}
