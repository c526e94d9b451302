use crossbeam_channel::{bounded, Receiver, Sender};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Host → panel commands and panel → host events
pub struct HostChannels<C, E> {
    pub command_tx: UnboundedSender<C>,
    pub command_rx: UnboundedReceiver<C>,
    pub event_tx: Sender<E>,
    pub event_rx: Receiver<E>,
}

impl<C, E> HostChannels<C, E> {
    pub fn new(buffer_size: usize) -> Self {
        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, event_rx) = bounded(buffer_size);

        Self {
            command_tx,
            command_rx,
            event_tx,
            event_rx,
        }
    }
}

/// Results that spawned tasks post back into the panel loop
pub struct LoopbackChannels<T> {
    pub tx: UnboundedSender<T>,
    pub rx: UnboundedReceiver<T>,
}

impl<T> LoopbackChannels<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded_channel();
        Self { tx, rx }
    }
}

impl<T> Default for LoopbackChannels<T> {
    fn default() -> Self {
        Self::new()
    }
}
