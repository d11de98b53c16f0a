//! One-shot delays, used by the session watch.

use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct Timer<Ev> {
    context: CapabilityContext<TimerOperation, Ev>,
}

impl<Ev> Capability<Ev> for Timer<Ev> {
    type Operation = TimerOperation;
    type MappedSelf<MappedEv> = Timer<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Timer::new(self.context.map_event(f))
    }
}

impl<Ev> Timer<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<TimerOperation, Ev>) -> Self {
        Self { context }
    }

    /// Emits the event once `delay` has passed. There is no cancellation;
    /// callers tag the event and drop stale ones.
    pub fn after<F>(&self, delay: Duration, make_event: F)
    where
        F: FnOnce() -> Ev + Send + 'static,
    {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let TimerOutput::Elapsed = ctx.request_from_shell(TimerOperation::Start { millis }).await;
            ctx.update_app(make_event());
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerOperation {
    Start { millis: u64 },
}

impl TimerOperation {
    #[must_use]
    pub const fn duration(self) -> Duration {
        match self {
            Self::Start { millis } => Duration::from_millis(millis),
        }
    }
}

impl Operation for TimerOperation {
    type Output = TimerOutput;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerOutput {
    Elapsed,
}
