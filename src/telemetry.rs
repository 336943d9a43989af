//! Structured telemetry pipeline for synchronization anomalies.
//!
//! Instead of just logging with `tracing::warn!`, anomalies in the lock-step
//! engine are structured data that can be:
//!
//! - Logged via tracing (default behavior)
//! - Collected programmatically for testing
//! - Sent to custom observers (metrics, alerting, etc.)
//!
//! Ordinary packet discards (duplicate, stale, gapped windows) are *not*
//! violations; they are absorbed by policy and only counted in
//! [`NetworkStats`](crate::NetworkStats). Violations are reserved for
//! things that should never happen in a healthy session.
//!
//! # Example
//!
//! ```
//! use lockstep_tics::telemetry::{CollectingObserver, Violation, ViolationKind, ViolationObserver, ViolationSeverity};
//!
//! let observer = CollectingObserver::new();
//! observer.on_violation(&Violation::new(
//!     ViolationSeverity::Warning,
//!     ViolationKind::FramePacing,
//!     "spin exceeded its bound",
//!     "test.rs:1",
//! ));
//! assert!(observer.has_violation(ViolationKind::FramePacing));
//! ```

use crate::Tic;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Serializes `Option<Tic>` as a plain integer or `null`.
mod tic_serializer {
    use crate::Tic;
    use serde::Serializer;

    #[allow(clippy::ref_option)]
    pub fn serialize<S>(tic: &Option<Tic>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match tic {
            None => serializer.serialize_none(),
            Some(t) => serializer.serialize_i32(t.as_i32()),
        }
    }
}

/// Severity of a violation.
///
/// Severities are ordered from least to most severe, allowing filtering
/// and comparison operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// Unexpected but recoverable - operation continued with fallback.
    Warning,
    /// Serious issue - operation may have degraded behavior.
    Error,
    /// Critical invariant broken - state may be corrupted.
    Critical,
}

impl ViolationSeverity {
    /// Returns a string representation suitable for logging/metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories of violations, one per engine subsystem.
///
/// # Forward Compatibility
///
/// This enum is marked `#[non_exhaustive]`. Always include a wildcard arm when matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ViolationKind {
    /// Reconstruction of a full tic from its low byte went wrong.
    TicExpansion,
    /// Inbound window handling saw something impossible.
    PacketIngest,
    /// Local production ran into the run-ahead bound unexpectedly.
    Backpressure,
    /// Real-time pacing could not keep up (spin bail-out, clock going backwards).
    FramePacing,
    /// Ring buffer addressing or capacity problem.
    CommandHistory,
    /// Transport-level problem (socket errors, undecodable datagrams).
    Network,
    /// Invalid configuration was supplied.
    Configuration,
    /// A type's internal invariant check failed.
    Invariant,
    /// Internal logic error that should not be reachable.
    InternalError,
}

impl ViolationKind {
    /// Returns a string representation suitable for logging/metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TicExpansion => "tic_expansion",
            Self::PacketIngest => "packet_ingest",
            Self::Backpressure => "backpressure",
            Self::FramePacing => "frame_pacing",
            Self::CommandHistory => "command_history",
            Self::Network => "network",
            Self::Configuration => "configuration",
            Self::Invariant => "invariant",
            Self::InternalError => "internal_error",
        }
    }
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reported violation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Violation {
    /// How severe the violation is.
    pub severity: ViolationSeverity,
    /// Which subsystem reported it.
    pub kind: ViolationKind,
    /// Human-readable description.
    pub message: String,
    /// Source location (`file:line`) where it was detected.
    pub location: &'static str,
    /// The tic involved, if any.
    #[serde(serialize_with = "tic_serializer::serialize")]
    pub tic: Option<Tic>,
    /// Extra key-value diagnostics. Ordered for deterministic output.
    pub context: BTreeMap<String, String>,
}

impl Violation {
    /// Creates a new violation.
    #[must_use]
    pub fn new(
        severity: ViolationSeverity,
        kind: ViolationKind,
        message: impl Into<String>,
        location: &'static str,
    ) -> Self {
        Self {
            severity,
            kind,
            message: message.into(),
            location,
            tic: None,
            context: BTreeMap::new(),
        }
    }

    /// Sets the tic at which this violation occurred.
    #[must_use]
    pub fn with_tic(mut self, tic: Tic) -> Self {
        self.tic = Some(tic);
        self
    }

    /// Adds a context key-value pair.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Serializes this violation to a JSON string.
    ///
    /// # Example
    ///
    /// ```
    /// use lockstep_tics::telemetry::{Violation, ViolationSeverity, ViolationKind};
    /// use lockstep_tics::Tic;
    ///
    /// let violation = Violation::new(
    ///     ViolationSeverity::Warning,
    ///     ViolationKind::PacketIngest,
    ///     "test",
    ///     "test.rs:1",
    /// ).with_tic(Tic::new(42));
    ///
    /// let json = violation.to_json().unwrap();
    /// assert!(json.contains(r#""tic":42"#));
    /// ```
    #[cfg(feature = "json")]
    #[must_use]
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }

    /// Like [`to_json`](Self::to_json), but with indentation for readability.
    #[cfg(feature = "json")]
    #[must_use]
    pub fn to_json_pretty(&self) -> Option<String> {
        serde_json::to_string_pretty(self).ok()
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}/{}] {} (at {}",
            self.severity, self.kind, self.message, self.location
        )?;
        if let Some(tic) = self.tic {
            write!(f, ", tic={tic}")?;
        }
        if !self.context.is_empty() {
            write!(f, ", context={:?}", self.context)?;
        }
        write!(f, ")")
    }
}

/// Trait for observing violations.
///
/// Implement this to route violations to metrics, alerting, or test harnesses.
pub trait ViolationObserver: Send + Sync {
    /// Called once for every reported violation.
    fn on_violation(&self, violation: &Violation);
}

/// Default observer: forwards violations to `tracing` with structured fields.
///
/// Fields emitted: `severity`, `kind`, `location`, `tic` (or `"null"`) and a
/// compact `context` string.
#[derive(Debug, Default, Clone)]
pub struct TracingObserver;

impl TracingObserver {
    /// Creates a new tracing observer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn format_tic(tic: Option<Tic>) -> String {
        match tic {
            None => "null".to_string(),
            Some(t) => t.as_i32().to_string(),
        }
    }
}

impl ViolationObserver for TracingObserver {
    fn on_violation(&self, violation: &Violation) {
        let severity = violation.severity.as_str();
        let kind = violation.kind.as_str();
        let location = violation.location;
        let tic_str = Self::format_tic(violation.tic);

        let context_str = if violation.context.is_empty() {
            "{}".to_string()
        } else {
            let pairs: Vec<String> = violation
                .context
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            format!("{{{}}}", pairs.join(", "))
        };

        match violation.severity {
            ViolationSeverity::Warning => {
                tracing::warn!(
                    severity,
                    kind,
                    location,
                    tic = %tic_str,
                    context = %context_str,
                    "{}",
                    violation.message
                );
            },
            ViolationSeverity::Error | ViolationSeverity::Critical => {
                tracing::error!(
                    severity,
                    kind,
                    location,
                    tic = %tic_str,
                    context = %context_str,
                    "{}",
                    violation.message
                );
            },
        }
    }
}

/// Observer that stores every violation, for tests.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    violations: Mutex<Vec<Violation>>,
}

impl CollectingObserver {
    /// Creates a new collecting observer with an empty violation list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            violations: Mutex::new(Vec::new()),
        }
    }

    /// Returns a copy of all collected violations.
    #[must_use]
    pub fn violations(&self) -> Vec<Violation> {
        self.violations.lock().clone()
    }

    /// Returns the number of collected violations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.violations.lock().len()
    }

    /// Returns true if no violations have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.lock().is_empty()
    }

    /// Checks if any violation of the specified kind has been collected.
    #[must_use]
    pub fn has_violation(&self, kind: ViolationKind) -> bool {
        self.violations.lock().iter().any(|v| v.kind == kind)
    }

    /// Returns all violations matching the specified kind.
    #[must_use]
    pub fn violations_of_kind(&self, kind: ViolationKind) -> Vec<Violation> {
        self.violations
            .lock()
            .iter()
            .filter(|v| v.kind == kind)
            .cloned()
            .collect()
    }

    /// Clears all collected violations.
    pub fn clear(&self) {
        self.violations.lock().clear();
    }
}

impl ViolationObserver for CollectingObserver {
    fn on_violation(&self, violation: &Violation) {
        self.violations.lock().push(violation.clone());
    }
}

/// Forwards each violation to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn ViolationObserver>>,
}

impl CompositeObserver {
    /// Creates a new composite observer with no child observers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: Vec::new(),
        }
    }

    /// Adds an observer to the composite.
    pub fn add(&mut self, observer: Arc<dyn ViolationObserver>) {
        self.observers.push(observer);
    }
}

impl ViolationObserver for CompositeObserver {
    fn on_violation(&self, violation: &Violation) {
        for observer in &self.observers {
            observer.on_violation(violation);
        }
    }
}

impl std::fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("num_observers", &self.observers.len())
            .finish()
    }
}

/// Reports a violation with the current `file:line` to the tracing observer.
///
/// # Syntax
///
/// ```text
/// report_violation!(severity, kind, "message");
/// report_violation!(severity, kind, "message with {}", format_args);
/// ```
///
/// # Example
///
/// ```
/// use lockstep_tics::{report_violation, telemetry::{ViolationSeverity, ViolationKind}};
///
/// let expected = 10;
/// let actual = 15;
/// report_violation!(ViolationSeverity::Warning, ViolationKind::PacketIngest,
///     "window mismatch: expected={}, actual={}", expected, actual);
/// ```
#[macro_export]
macro_rules! report_violation {
    ($severity:expr, $kind:expr, $msg:literal) => {{
        use $crate::telemetry::ViolationObserver as _;
        let violation = $crate::telemetry::Violation::new(
            $severity,
            $kind,
            $msg,
            concat!(file!(), ":", line!()),
        );
        $crate::telemetry::TracingObserver.on_violation(&violation);
    }};

    ($severity:expr, $kind:expr, $fmt:literal, $($arg:tt)+) => {{
        use $crate::telemetry::ViolationObserver as _;
        let violation = $crate::telemetry::Violation::new(
            $severity,
            $kind,
            format!($fmt, $($arg)+),
            concat!(file!(), ":", line!()),
        );
        $crate::telemetry::TracingObserver.on_violation(&violation);
    }};
}

/// Reports a violation to a session's observer, or to the tracing observer
/// when the session has none.
///
/// The observer expression is an `Option<&Arc<dyn ViolationObserver>>`, usually
/// `self.violation_observer.as_ref()`.
#[macro_export]
macro_rules! report_violation_to {
    ($observer:expr, $severity:expr, $kind:expr, $fmt:literal $(, $arg:expr)* $(,)?) => {{
        let violation = $crate::telemetry::Violation::new(
            $severity,
            $kind,
            format!($fmt $(, $arg)*),
            concat!(file!(), ":", line!()),
        );
        $crate::telemetry::report_to_observer($observer, &violation);
    }};
}

/// Hands a violation to `observer`, falling back to [`TracingObserver`].
///
/// Used by [`report_violation_to!`].
pub fn report_to_observer(observer: Option<&Arc<dyn ViolationObserver>>, violation: &Violation) {
    match observer {
        Some(observer) => observer.on_violation(violation),
        None => TracingObserver.on_violation(violation),
    }
}

// ==========================================
// Runtime Invariant Checking
// ==========================================

/// Describes a broken invariant.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct InvariantViolation {
    /// Name of the type whose invariant was violated.
    pub type_name: &'static str,
    /// Description of the violated invariant.
    pub invariant: String,
    /// Additional diagnostic context.
    pub details: Option<String>,
}

impl InvariantViolation {
    /// Creates a new invariant violation.
    #[must_use]
    pub fn new(type_name: &'static str, invariant: impl Into<String>) -> Self {
        Self {
            type_name,
            invariant: invariant.into(),
            details: None,
        }
    }

    /// Adds additional details to the violation.
    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.type_name, self.invariant)?;
        if let Some(details) = &self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

/// Trait for types that maintain internal invariants.
///
/// Checked at runtime in debug builds, or in release builds with the
/// `paranoid` feature, via [`debug_check_invariants!`].
pub trait InvariantChecker {
    /// Returns `Ok(())` if all invariants hold, or the first broken one.
    fn check_invariants(&self) -> Result<(), InvariantViolation>;
}

/// Checks invariants in debug builds and reports failures as critical violations.
#[macro_export]
#[cfg(any(debug_assertions, feature = "paranoid"))]
macro_rules! debug_check_invariants {
    ($expr:expr) => {{
        use $crate::telemetry::InvariantChecker as _;
        if let Err(violation) = $expr.check_invariants() {
            $crate::report_violation!(
                $crate::telemetry::ViolationSeverity::Critical,
                $crate::telemetry::ViolationKind::Invariant,
                "{}",
                violation
            );
        }
    }};

    ($expr:expr, $context:expr) => {{
        use $crate::telemetry::InvariantChecker as _;
        if let Err(violation) = $expr.check_invariants() {
            $crate::report_violation!(
                $crate::telemetry::ViolationSeverity::Critical,
                $crate::telemetry::ViolationKind::Invariant,
                "{} [context: {}]",
                violation,
                $context
            );
        }
    }};
}

/// No-op version for release builds without `paranoid` feature.
#[macro_export]
#[cfg(not(any(debug_assertions, feature = "paranoid")))]
macro_rules! debug_check_invariants {
    ($expr:expr) => {{}};
    ($expr:expr, $context:expr) => {{}};
}
