use crate::message::Message;

/// A pluggable pipeline stage. `None` discards the message at that stage and the pipeline
/// returns failure without progressing any further. Congestion control, acknowledgement
/// tracking, and message logging are all expected to be implemented as processors rather than
/// being baked into the core.
pub trait Processor: Send + Sync {
    /// Transforms or discards a message passing through this stage.
    fn process(&self, message: Message) -> Option<Message>;
}

impl<F> Processor for F
where
    F: Fn(Message) -> Option<Message> + Send + Sync,
{
    fn process(&self, message: Message) -> Option<Message> {
        self(message)
    }
}

/// A processor that additionally wants a periodic tick, driven once per
/// [`PeerController::process`](crate::peer_controller::PeerController::process) call,
/// independent of any particular message passing through.
pub trait Periodic: Send + Sync {
    /// Called once per `process()` tick.
    fn tick(&self, now_ms: i64);
}

/// Holds the four ordered processor sequences a peer runs a message through. Immutable once a
/// peer has started: processors are registered at construction time via
/// [`ProcessorChain::new`]/the `with_*` builders, and order within each sequence is
/// configuration-defined and stable.
pub struct ProcessorChain {
    sender_pre: Vec<Box<dyn Processor>>,
    sender_post: Vec<Box<dyn Processor>>,
    receiver_pre: Vec<Box<dyn Processor>>,
    receiver_post: Vec<Box<dyn Processor>>,
}

impl ProcessorChain {
    /// Creates an empty chain; every stage is a no-op pass-through until processors are added.
    pub fn new() -> Self {
        Self {
            sender_pre: Vec::new(),
            sender_post: Vec::new(),
            receiver_pre: Vec::new(),
            receiver_post: Vec::new(),
        }
    }

    /// Appends a processor to the `before_send` sequence.
    pub fn with_sender_pre(mut self, p: impl Processor + 'static) -> Self {
        self.sender_pre.push(Box::new(p));
        self
    }

    /// Appends a processor to the `after_send` sequence.
    pub fn with_sender_post(mut self, p: impl Processor + 'static) -> Self {
        self.sender_post.push(Box::new(p));
        self
    }

    /// Appends a processor to the `before_receive` sequence.
    pub fn with_receiver_pre(mut self, p: impl Processor + 'static) -> Self {
        self.receiver_pre.push(Box::new(p));
        self
    }

    /// Appends a processor to the `after_receive` sequence.
    pub fn with_receiver_post(mut self, p: impl Processor + 'static) -> Self {
        self.receiver_post.push(Box::new(p));
        self
    }

    /// Runs `message` through the `before_send` sequence. Returns `None` as soon as any processor
    /// discards it.
    pub fn run_sender_pre(&self, message: Message) -> Option<Message> {
        Self::run(&self.sender_pre, message)
    }

    /// Runs `message` through the `after_send` sequence.
    pub fn run_sender_post(&self, message: Message) -> Option<Message> {
        Self::run(&self.sender_post, message)
    }

    /// Runs `message` through the `before_receive` sequence.
    pub fn run_receiver_pre(&self, message: Message) -> Option<Message> {
        Self::run(&self.receiver_pre, message)
    }

    /// Runs `message` through the `after_receive` sequence.
    pub fn run_receiver_post(&self, message: Message) -> Option<Message> {
        Self::run(&self.receiver_post, message)
    }

    fn run(stage: &[Box<dyn Processor>], message: Message) -> Option<Message> {
        let mut current = message;
        for p in stage {
            match p.process(current) {
                Some(next) => current = next,
                None => return None,
            }
        }
        Some(current)
    }
}

impl Default for ProcessorChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::ReliableMode;

    fn msg() -> Message {
        Message::new(Box::new([1, 2, 3]), ReliableMode::Unreliable)
    }

    #[test]
    fn empty_chain_passes_through() {
        let chain = ProcessorChain::new();
        let m = msg();
        let id = m.msg_id;
        let out = chain.run_sender_pre(m).unwrap();
        assert_eq!(out.msg_id, id);
    }

    #[test]
    fn discard_short_circuits_remaining_processors() {
        let ran_second = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let ran_second_clone = ran_second.clone();

        let chain = ProcessorChain::new()
            .with_sender_pre(|_m: Message| None)
            .with_sender_pre(move |m: Message| {
                ran_second_clone.store(true, std::sync::atomic::Ordering::SeqCst);
                Some(m)
            });

        let out = chain.run_sender_pre(msg());
        assert!(out.is_none());
        assert!(!ran_second.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn processors_run_in_registration_order() {
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();

        let chain = ProcessorChain::new()
            .with_sender_pre(move |m: Message| {
                o1.lock().unwrap().push(1);
                Some(m)
            })
            .with_sender_pre(move |m: Message| {
                o2.lock().unwrap().push(2);
                Some(m)
            });

        chain.run_sender_pre(msg());
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }
}
