//! Error types.
//!
//! Three families, matching when they can happen:
//!
//! - [`RegistryError`]: configuration mistakes, found while registering
//!   filters or resolving a route's chain. Always before the first request.
//! - [`Fault`] / [`PipelineFault`]: per-request failures raised inside the
//!   chain. A `Fault` travels outward through every `next.run(..)` call site;
//!   whatever escapes the outermost filter becomes a `PipelineFault`.
//! - [`TerminationFailure`]: a post-response hook failed. Reported, never
//!   escalated.
//!
//! [`Error`] is the infrastructure error returned by startup and serving.

use std::fmt;

// ── Error ─────────────────────────────────────────────────────────────────────

/// The error type returned by strata's fallible startup and serving operations.
///
/// Application-level errors (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s.
#[derive(Debug)]
pub enum Error {
    /// Binding to a port or accepting a connection failed.
    Io(std::io::Error),
    /// A route's filter chain could not be resolved.
    Registry(RegistryError),
    /// A route path was rejected by the router.
    Route { path: String, source: matchit::InsertError },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io: {e}"),
            Self::Registry(e) => write!(f, "registry: {e}"),
            Self::Route { path, source } => write!(f, "invalid route `{path}`: {source}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Registry(e) => Some(e),
            Self::Route { source, .. } => Some(source),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Self::Registry(e)
    }
}

// ── RegistryError ─────────────────────────────────────────────────────────────

/// A filter registration or resolution mistake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// A route referenced a key nothing was registered under.
    UnknownFilterKey(String),
    /// A key was registered twice while the registry was in strict mode.
    DuplicateKey(String),
    /// A group expands (directly or transitively) into itself.
    GroupCycle(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFilterKey(key) => write!(f, "unknown filter key `{key}`"),
            Self::DuplicateKey(key) => write!(f, "filter key `{key}` registered twice"),
            Self::GroupCycle(name) => write!(f, "filter group `{name}` contains itself"),
        }
    }
}

impl std::error::Error for RegistryError {}

// ── Fault ─────────────────────────────────────────────────────────────────────

/// An application failure raised by a filter or the terminal handler.
///
/// Any `std::error::Error + Send + Sync` converts into a `Fault`, so `?`
/// works inside filters and handlers:
///
/// ```rust
/// use strata::Fault;
///
/// fn parse_age(raw: &str) -> Result<u32, Fault> {
///     Ok(raw.parse::<u32>()?)
/// }
///
/// assert!(parse_age("forty").is_err());
/// ```
///
/// `Fault` itself does not implement `std::error::Error`; the blanket `From`
/// impl depends on that.
pub struct Fault(Box<dyn std::error::Error + Send + Sync + 'static>);

impl Fault {
    pub fn new<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self(Box::new(error))
    }

    /// A fault carrying only a message.
    pub fn msg(message: impl fmt::Display) -> Self {
        Self(Box::new(Message(message.to_string())))
    }

    /// Returns the underlying error if it is of type `E`.
    pub fn downcast_ref<E: std::error::Error + 'static>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }

    pub fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        &*self.0
    }

    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self.0
    }
}

impl<E> From<E> for Fault
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(e: E) -> Self {
        Self::new(e)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug)]
struct Message(String);

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for Message {}

// ── PipelineFault ─────────────────────────────────────────────────────────────

/// Why a pipeline execution produced no response.
#[derive(Debug)]
pub enum PipelineFault {
    /// A fault escaped the outermost filter.
    Unhandled(Fault),
    /// A filter or the terminal handler broke the execution contract.
    Contract(ContractViolation),
}

impl PipelineFault {
    /// `true` when the failure points at a filter-authoring bug rather than a
    /// request-domain failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::Contract(_))
    }
}

impl fmt::Display for PipelineFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unhandled(cause) => write!(f, "unhandled fault: {cause}"),
            Self::Contract(v) => write!(f, "contract violation: {v}"),
        }
    }
}

impl std::error::Error for PipelineFault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Unhandled(cause) => Some(cause.as_error()),
            Self::Contract(v) => Some(v),
        }
    }
}

/// A layer panicked while it held control of the request.
///
/// `Next` is consumed on use and `handle` must return a `Response` or a
/// `Fault`, so the remaining way to break the contract is to unwind out of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractViolation {
    /// Name of the layer that was running, or `"endpoint"`.
    pub layer: String,
    /// The panic payload, when it was a string.
    pub message: String,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}` panicked: {}", self.layer, self.message)
    }
}

impl std::error::Error for ContractViolation {}

// ── TerminationFailure ────────────────────────────────────────────────────────

/// One failed `terminate` hook.
#[derive(Debug)]
pub struct TerminationFailure {
    pub layer: String,
    pub fault: Fault,
}

impl fmt::Display for TerminationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terminate `{}` failed: {}", self.layer, self.fault)
    }
}

/// Extracts a printable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}
