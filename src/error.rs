use thiserror::Error;

// ─── Top-level error hierarchy ───────────────────────────────────────────────

/// Structured error hierarchy for `StrideSync`.
///
/// Each subsystem defines its own error variant. Library callers can match on
/// these to decide recovery strategy; the CLI layer continues to use
/// `anyhow::Result` for ad-hoc context chains.
#[derive(Debug, Error)]
pub enum SyncError {
    // ── Config ───────────────────────────────────────────────────────────
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    // ── Local persistence ───────────────────────────────────────────────
    #[error("store: {0}")]
    Store(#[from] StoreError),

    // ── Remote API / auth ───────────────────────────────────────────────
    #[error("api: {0}")]
    Api(#[from] ApiError),

    // ── Generic fallthrough (wraps anyhow for interop) ──────────────────
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// ─── Local store errors ─────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt state file {path}: {message}")]
    Corrupt { path: String, message: String },

    #[error("serialize {key}: {message}")]
    Serialize { key: String, message: String },
}

// ─── Remote API errors ──────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    /// Raw 401 from the server. The refresh gate consumes this; callers only
    /// see it when a request already retried once after a refresh.
    #[error("request unauthorized")]
    Unauthorized,

    /// The refresh token was missing or rejected. Stored tokens are cleared.
    #[error("authentication expired: {reason}")]
    AuthExpired { reason: String },

    /// The task driving a token refresh was dropped before it completed.
    #[error("token refresh aborted")]
    RefreshAborted,

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid request body: {0}")]
    Encode(String),

    #[error("invalid response body: {0}")]
    Decode(String),

    #[error("store: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Transport failures (including timeouts) and 5xx responses.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Errors after which the user must sign in again.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired { .. } | Self::Unauthorized)
    }
}

// ─── Convenience re-exports ─────────────────────────────────────────────────

/// Shorthand result type for the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
