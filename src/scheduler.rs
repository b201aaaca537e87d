//! Cross-thread command queues.
//!
//! Each of the update and input contexts owns one [`CommandQueue`]. Any
//! thread may push boxed closures into it through a cloned
//! [`CommandSender`]; the owning context drains it once per tick and runs
//! the closures against its own state.
//!
//! ```text
//!   draw thread ──┐
//!   VrHandle ─────┼──► mpsc (unbounded) ──► drain() on owner ──► FnOnce(&mut T)
//!   other ────────┘
//! ```
//!
//! Pushing never blocks. Commands from one producer run in the order they
//! were pushed.

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::device::registry::DeviceRegistry;
use crate::input::InputState;

/// Deferred mutation of a context's state.
pub type Command<T> = Box<dyn FnOnce(&mut T) + Send + 'static>;

/// Names the context a command is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionContext {
    Update,
    Input,
}

pub struct CommandSender<T> {
    context: ExecutionContext,
    sender: mpsc::UnboundedSender<Command<T>>,
}

impl<T> Clone for CommandSender<T> {
    fn clone(&self) -> Self {
        Self {
            context: self.context,
            sender: self.sender.clone(),
        }
    }
}

impl<T> CommandSender<T> {
    /// Returns false when the owning context has been dropped.
    pub fn enqueue(&self, command: impl FnOnce(&mut T) + Send + 'static) -> bool {
        match self.sender.send(Box::new(command)) {
            Ok(()) => true,
            Err(_) => {
                debug!("{:?} context is gone, dropping command", self.context);
                false
            }
        }
    }
}

pub struct CommandQueue<T> {
    context: ExecutionContext,
    sender: mpsc::UnboundedSender<Command<T>>,
    receiver: mpsc::UnboundedReceiver<Command<T>>,
}

impl<T> CommandQueue<T> {
    pub fn new(context: ExecutionContext) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            context,
            sender,
            receiver,
        }
    }

    pub fn sender(&self) -> CommandSender<T> {
        CommandSender {
            context: self.context,
            sender: self.sender.clone(),
        }
    }

    /// Runs every command pushed before this call, oldest first.
    ///
    /// Commands pushed while the batch is running wait for the next drain.
    pub fn drain(&mut self, target: &mut T) -> usize {
        let mut batch = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(command) => batch.push(command),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    // The queue keeps its own sender, so this only happens mid-teardown
                    warn!("{:?} command channel disconnected", self.context);
                    break;
                }
            }
        }

        let count = batch.len();
        for command in batch {
            command(target);
        }
        count
    }
}

/// Producer side of both queues, cloned into whoever needs to defer work.
#[derive(Clone)]
pub struct Scheduler {
    update: CommandSender<DeviceRegistry>,
    input: CommandSender<InputState>,
}

impl Scheduler {
    pub fn new(update: CommandSender<DeviceRegistry>, input: CommandSender<InputState>) -> Self {
        Self { update, input }
    }

    pub fn enqueue_update(
        &self,
        command: impl FnOnce(&mut DeviceRegistry) + Send + 'static,
    ) -> bool {
        self.update.enqueue(command)
    }

    pub fn enqueue_input(&self, command: impl FnOnce(&mut InputState) + Send + 'static) -> bool {
        self.input.enqueue(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_enqueue_order() {
        let mut queue = CommandQueue::<Vec<&'static str>>::new(ExecutionContext::Update);
        let sender = queue.sender();
        sender.enqueue(|log| log.push("a"));
        sender.enqueue(|log| log.push("b"));
        sender.enqueue(|log| log.push("c"));

        let mut log = Vec::new();
        assert_eq!(queue.drain(&mut log), 3);
        assert_eq!(log, vec!["a", "b", "c"]);
        assert_eq!(queue.drain(&mut log), 0);
    }

    #[test]
    fn commands_enqueued_during_drain_wait_for_next_tick() {
        let mut queue = CommandQueue::<Vec<u32>>::new(ExecutionContext::Input);
        let sender = queue.sender();
        let inner = queue.sender();
        sender.enqueue(move |log| {
            log.push(1);
            inner.enqueue(|log| log.push(2));
        });

        let mut log = Vec::new();
        queue.drain(&mut log);
        assert_eq!(log, vec![1]);
        queue.drain(&mut log);
        assert_eq!(log, vec![1, 2]);
    }

    #[test]
    fn producers_on_other_threads() {
        let mut queue = CommandQueue::<Vec<u32>>::new(ExecutionContext::Update);
        let handles: Vec<_> = (0..4)
            .map(|producer| {
                let sender = queue.sender();
                std::thread::spawn(move || {
                    for n in 0..100 {
                        sender.enqueue(move |log| log.push(producer * 1000 + n));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut log = Vec::new();
        assert_eq!(queue.drain(&mut log), 400);
        for producer in 0..4 {
            let own: Vec<_> = log
                .iter()
                .copied()
                .filter(|value| value / 1000 == producer)
                .collect();
            assert_eq!(own, (0..100).map(|n| producer * 1000 + n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn sending_after_queue_dropped_reports_failure() {
        let queue = CommandQueue::<()>::new(ExecutionContext::Input);
        let sender = queue.sender();
        drop(queue);
        assert!(!sender.enqueue(|_| {}));
    }
}
