use crate::error::{Error, Result};
use crate::fixed_point::FixedPoint;

/// Request/response contract shared by every engine.
///
/// An engine holds at most one request. `start` loads it, each `tick`
/// advances one logical stage, and the result is collected once with
/// `take_result`. While a request is in flight or its result is unread,
/// `start` is rejected with `Error::Busy`.
pub trait Engine {
    type Input;

    const NAME: &'static str;

    fn start(&mut self, input: Self::Input) -> Result<()>;

    /// Advance one stage. No-op when idle or done; an error resets the engine.
    fn tick(&mut self) -> Result<()>;

    fn is_busy(&self) -> bool;

    fn take_result(&mut self) -> Option<FixedPoint>;

    /// Ticks spent on the current (or last completed) request.
    fn ticks(&self) -> u64;

    /// Blocking form: start, tick to completion, collect.
    fn run(&mut self, input: Self::Input) -> Result<FixedPoint> {
        self.start(input)?;
        while self.is_busy() {
            self.tick()?;
        }
        self.take_result().ok_or(Error::Idle { engine: Self::NAME })
    }
}
