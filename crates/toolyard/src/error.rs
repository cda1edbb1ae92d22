use std::fmt;

/// Unified domain error for the toolyard crate.
#[derive(Debug, Clone)]
pub enum RegistryError {
    /// No tool exists for the given (name, version) pair.
    ToolNotFound { name: String, version: String },
    /// No tool exists with the given identifier.
    ToolIdNotFound { id: String },
    /// A tool with the given (name, version) pair is already registered.
    ToolAlreadyExists { name: String, version: String },
    /// The principal already holds a grant for this tool version.
    PermissionAlreadyExists {
        principal_type: String,
        principal_id: String,
        tool: String,
    },
    /// The configuration schema failed shape validation.
    InvalidSchema(Vec<String>),
    /// The tool is deactivated and cannot be executed.
    ToolInactive { id: String },
    /// No session exists with the given identifier.
    SessionNotFound { id: String },
    /// Invalid input provided by the caller.
    InvalidInput(String),
    /// Storage layer failure.
    Store(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::ToolNotFound { name, version } => {
                write!(f, "tool '{name}@{version}' not found")
            }
            RegistryError::ToolIdNotFound { id } => write!(f, "tool '{id}' not found"),
            RegistryError::ToolAlreadyExists { name, version } => {
                write!(f, "tool '{name}@{version}' already exists")
            }
            RegistryError::PermissionAlreadyExists {
                principal_type,
                principal_id,
                tool,
            } => write!(
                f,
                "permission for {principal_type} '{principal_id}' on tool '{tool}' already exists"
            ),
            RegistryError::InvalidSchema(errors) => {
                write!(f, "invalid configuration schema: {}", errors.join("; "))
            }
            RegistryError::ToolInactive { id } => write!(f, "tool '{id}' is inactive"),
            RegistryError::SessionNotFound { id } => write!(f, "session '{id}' not found"),
            RegistryError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            RegistryError::Store(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Result type alias using [`RegistryError`].
pub type RegistryResult<T> = Result<T, RegistryError>;
