//! In-memory [`Link`] pair for tests and examples: two endpoints backed by
//! shared queues instead of a real bus.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::{Address, Frame, Link, LinkError};

#[derive(Default)]
struct Shared {
    queue: VecDeque<Frame>,
}

/// One end of an in-process loopback bus. Frames sent on one end appear on
/// the other's `receive` queue; an endpoint never sees its own sends unless
/// `echo` is set.
pub struct LoopbackLink {
    address: Address,
    inbox: Arc<Mutex<Shared>>,
    outbox: Arc<Mutex<Shared>>,
    echo: bool,
}

impl LoopbackLink {
    /// Builds a connected pair: `a.send` is visible to `b.receive` and vice
    /// versa.
    pub fn pair() -> (LoopbackLink, LoopbackLink) {
        let left = Arc::new(Mutex::new(Shared::default()));
        let right = Arc::new(Mutex::new(Shared::default()));
        let a = LoopbackLink {
            address: Address::physical(0, 0),
            inbox: right.clone(),
            outbox: left.clone(),
            echo: false,
        };
        let b = LoopbackLink {
            address: Address::physical(0, 0),
            inbox: left,
            outbox: right,
            echo: false,
        };
        (a, b)
    }

    /// When set, frames this end sends are also queued for its own receive
    /// side, simulating a bus where a tester can hear its own transmissions.
    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }
}

impl Link for LoopbackLink {
    fn set_address(&mut self, address: Address) {
        self.address = address;
    }

    fn send(&mut self, frame: &Frame) -> std::result::Result<(), LinkError> {
        let mut shared = self.inbox.lock().expect("loopback mutex poisoned");
        shared.queue.push_back(frame.clone());
        if self.echo {
            drop(shared);
            let mut own = self.outbox.lock().expect("loopback mutex poisoned");
            own.queue.push_back(frame.clone());
        }
        Ok(())
    }

    fn receive(&mut self, deadline: Duration) -> std::result::Result<Frame, LinkError> {
        let deadline_at = Instant::now() + deadline;
        loop {
            {
                let mut shared = self.outbox.lock().expect("loopback mutex poisoned");
                if let Some(mut frame) = shared.queue.pop_front() {
                    frame.timestamp = Some(Instant::now());
                    return Ok(frame);
                }
            }
            if Instant::now() >= deadline_at {
                return Err(LinkError::timeout());
            }
            std::thread::yield_now();
        }
    }
}
