// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::ops::ControlFlow;
use std::time::Duration;

/// Decides whether a broken connection should be established again.
///
/// `attempts` is the number of reconnections tried since the connection last worked,
/// starting at zero. Returning [`ControlFlow::Continue`] asks for another attempt after
/// the given delay. Returning [`ControlFlow::Break`] gives up, and every pending request
/// fails with the error that broke the connection.
pub trait ReconnectionPolicy: Send + Sync {
    fn should_retry(&self, attempts: usize) -> ControlFlow<(), Duration>;
}

/// Never reconnect.
pub struct NoReconnect;

impl ReconnectionPolicy for NoReconnect {
    fn should_retry(&self, _: usize) -> ControlFlow<(), Duration> {
        ControlFlow::Break(())
    }
}

/// Reconnect immediately, as many times as needed.
pub struct AlwaysReconnect;

impl ReconnectionPolicy for AlwaysReconnect {
    fn should_retry(&self, _: usize) -> ControlFlow<(), Duration> {
        ControlFlow::Continue(Duration::from_secs(0))
    }
}

/// Reconnect up to `attempts` times, waiting `delay` before each one.
pub struct FixedReconnect {
    pub attempts: usize,
    pub delay: Duration,
}

impl ReconnectionPolicy for FixedReconnect {
    fn should_retry(&self, attempts: usize) -> ControlFlow<(), Duration> {
        if attempts < self.attempts {
            ControlFlow::Continue(self.delay)
        } else {
            ControlFlow::Break(())
        }
    }
}
