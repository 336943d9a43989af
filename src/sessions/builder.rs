use std::sync::Arc;

use crate::clock::{Clock, WallClock, DEFAULT_TIC_RATE};
use crate::command_history::CommandHistory;
use crate::network::codec;
use crate::outbound::OutboundScheduler;
use crate::sessions::config::PacingConfig;
use crate::telemetry::ViolationObserver;
use crate::{Config, FrameScheduler, InputSource, LockstepError, Transport};

/// The [`SessionBuilder`] builds lock-step sessions.
///
/// Set the pacing and collaborators, then call
/// [`start_session`](Self::start_session) to get a running [`FrameScheduler`].
///
/// | Setting | Default | Required |
/// |---------|---------|----------|
/// | pacing | [`PacingConfig::default`] | no |
/// | clock | [`WallClock`] at 35 Hz | no |
/// | input source | none | yes |
/// | transport | none | unless `single_tics` |
/// | violation observer | [`TracingObserver`](crate::telemetry::TracingObserver) | no |
#[must_use = "SessionBuilder must be consumed by calling start_session()"]
pub struct SessionBuilder<T>
where
    T: Config,
{
    pacing: PacingConfig,
    clock: Option<Box<dyn Clock>>,
    input: Option<Box<dyn InputSource<T>>>,
    transport: Option<Box<dyn Transport>>,
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl<T: Config> std::fmt::Debug for SessionBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Destructure to ensure all fields are included when new fields are added.
        let Self {
            pacing,
            clock,
            input,
            transport,
            violation_observer,
        } = self;

        f.debug_struct("SessionBuilder")
            .field("pacing", pacing)
            .field("has_clock", &clock.is_some())
            .field("has_input_source", &input.is_some())
            .field("has_transport", &transport.is_some())
            .field("has_violation_observer", &violation_observer.is_some())
            .finish()
    }
}

impl<T: Config> Default for SessionBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Config> SessionBuilder<T> {
    /// Construct a new builder with all values set to their defaults.
    pub fn new() -> Self {
        Self {
            pacing: PacingConfig::default(),
            clock: None,
            input: None,
            transport: None,
            violation_observer: None,
        }
    }

    /// Sets the pacing configuration. It is validated by [`start_session`](Self::start_session).
    pub fn with_pacing(mut self, pacing: PacingConfig) -> Self {
        self.pacing = pacing;
        self
    }

    /// Replaces the default 35 Hz wall clock.
    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Box::new(clock));
        self
    }

    /// Sets where local commands come from.
    pub fn with_input_source(mut self, input: impl InputSource<T> + 'static) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    /// Sets the transport outbound windows are sent on and inbound windows read from.
    pub fn with_transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Box::new(transport));
        self
    }

    /// Sets an observer for violations raised by the session.
    ///
    /// Without one, violations are logged through `tracing`. Combine observers
    /// with [`CompositeObserver`](crate::telemetry::CompositeObserver).
    ///
    /// # Example
    ///
    /// ```
    /// use lockstep_tics::telemetry::CollectingObserver;
    /// use lockstep_tics::{Config, SessionBuilder};
    /// use std::sync::Arc;
    ///
    /// struct MyConfig;
    /// impl Config for MyConfig {
    ///     type Command = u8;
    ///     type Event = u8;
    /// }
    ///
    /// let observer = Arc::new(CollectingObserver::new());
    /// let _builder = SessionBuilder::<MyConfig>::new().with_violation_observer(observer.clone());
    /// ```
    pub fn with_violation_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.violation_observer = Some(observer);
        self
    }

    /// Consumes the builder to construct a [`FrameScheduler`].
    ///
    /// Every counter starts at 0. Wall time that elapsed on the clock before
    /// this call does not count as production time.
    ///
    /// # Errors
    /// - Returns [`InvalidConfig`] if the pacing is out of range or no input source was set.
    /// - Returns [`TransportUnavailable`] if a networked session has no transport.
    /// - Returns [`SerializationError`] if a networked session's default command
    ///   cannot be encoded.
    ///
    /// [`InvalidConfig`]: LockstepError::InvalidConfig
    /// [`TransportUnavailable`]: LockstepError::TransportUnavailable
    /// [`SerializationError`]: LockstepError::SerializationError
    pub fn start_session(self) -> Result<FrameScheduler<T>, LockstepError> {
        self.pacing.validate()?;

        let Some(input) = self.input else {
            return Err(LockstepError::InvalidConfig {
                info: "an input source is required".to_owned(),
            });
        };

        if !self.pacing.single_tics {
            if self.transport.is_none() {
                return Err(LockstepError::TransportUnavailable {
                    context:
                        "a networked session needs a transport; use single_tics for local play"
                            .to_owned(),
                });
            }
            // Unwritten history slots hold the default command and may be sent.
            codec::encode_command(&T::Command::default(), &mut Vec::new())?;
        }

        let history = CommandHistory::with_capacity_observed(
            self.pacing.history_capacity,
            self.violation_observer.as_ref(),
        )
        .ok_or_else(|| LockstepError::InternalError {
            context: format!(
                "validated history capacity {} was rejected",
                self.pacing.history_capacity
            ),
        })?;

        let clock: Box<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Box::new(WallClock::new(DEFAULT_TIC_RATE)),
        };
        let start_time = clock.tics() / self.pacing.ticdup;

        let outbound =
            OutboundScheduler::new(input, self.transport, start_time, self.pacing.single_tics)
                .with_violation_observer(self.violation_observer);

        tracing::debug!(
            ticdup = self.pacing.ticdup,
            history_capacity = self.pacing.history_capacity,
            single_tics = self.pacing.single_tics,
            has_violation_observer = outbound.violation_observer().is_some(),
            start_time,
            "lock-step session started"
        );

        Ok(FrameScheduler::new(
            self.pacing,
            clock,
            outbound,
            history,
            start_time,
        ))
    }
}
