// This is free and unencumbered software released into the public domain.

//! The dedicated camera worker: a single thread that exclusively owns some
//! state and mutates it only in response to queued messages.

use crate::shared::CameraError;
use std::{
    sync::mpsc::{Receiver, Sender, TryRecvError, channel},
    thread::{self, JoinHandle},
};

/// What the worker does after handling a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Handle whatever is already queued, then stop.
    Drain,
}

enum Envelope<M> {
    Msg(M),
    Shutdown,
}

/// Cloneable handle used to queue messages onto a [`Worker`].
pub struct WorkerSender<M> {
    tx: Sender<Envelope<M>>,
}

impl<M> Clone for WorkerSender<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<M> core::fmt::Debug for WorkerSender<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerSender").finish_non_exhaustive()
    }
}

impl<M> WorkerSender<M> {
    pub fn post(&self, msg: M) -> Result<(), CameraError> {
        self.tx
            .send(Envelope::Msg(msg))
            .map_err(|_| CameraError::Closed)
    }
}

pub struct Worker<M> {
    tx: WorkerSender<M>,
    join: Option<JoinHandle<()>>,
}

impl<M: Send + 'static> Worker<M> {
    /// Spawns the worker thread. `init` builds the owned state and receives
    /// a sender so the state can queue follow-up work onto itself.
    pub fn spawn<S, I, F>(
        name: impl Into<String>,
        init: I,
        mut handler: F,
    ) -> Result<Self, CameraError>
    where
        S: Send + 'static,
        I: FnOnce(WorkerSender<M>) -> S,
        F: FnMut(&mut S, M) -> Flow + Send + 'static,
    {
        let (tx, rx) = channel::<Envelope<M>>();
        let tx = WorkerSender { tx };
        let mut state = init(tx.clone());

        let join = thread::Builder::new()
            .name(name.into())
            .spawn(move || {
                while let Ok(envelope) = rx.recv() {
                    match envelope {
                        Envelope::Msg(msg) => {
                            if handler(&mut state, msg) == Flow::Drain {
                                break;
                            }
                        },
                        Envelope::Shutdown => break,
                    }
                }
                drain(&rx, &mut state, &mut handler);
                asimov_module::tracing::debug!("camera worker stopped");
            })
            .map_err(|e| CameraError::driver("spawning camera worker", e))?;

        Ok(Self {
            tx,
            join: Some(join),
        })
    }

    pub fn sender(&self) -> WorkerSender<M> {
        self.tx.clone()
    }

    pub fn post(&self, msg: M) -> Result<(), CameraError> {
        self.tx.post(msg)
    }

    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// Stops the worker after the messages already queued have been handled,
    /// and waits for it. Safe to call more than once.
    pub fn shutdown(&mut self) {
        let Some(join) = self.join.take() else {
            return;
        };
        let _ = self.tx.tx.send(Envelope::Shutdown);
        if join.thread().id() == thread::current().id() {
            // Called from a handler: the loop exits on its own.
            return;
        }
        if join.join().is_err() {
            asimov_module::tracing::error!("camera worker panicked");
        }
    }
}

impl<M> Drop for Worker<M> {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = self.tx.tx.send(Envelope::Shutdown);
            if join.thread().id() != thread::current().id() {
                let _ = join.join();
            }
        }
    }
}

fn drain<M, S, F>(rx: &Receiver<Envelope<M>>, state: &mut S, handler: &mut F)
where
    F: FnMut(&mut S, M) -> Flow,
{
    loop {
        match rx.try_recv() {
            Ok(Envelope::Msg(msg)) => {
                let _ = handler(state, msg);
            },
            Ok(Envelope::Shutdown) => continue,
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn handles_messages_in_order_on_one_thread() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = Arc::clone(&seen);
        let mut worker = Worker::spawn(
            "test-worker",
            |_tx| seen2,
            |seen: &mut Arc<Mutex<Vec<(u32, Option<String>)>>>, n: u32| {
                let name = thread::current().name().map(str::to_owned);
                seen.lock().unwrap().push((n, name));
                Flow::Continue
            },
        )
        .unwrap();

        for n in 0..10 {
            worker.post(n).unwrap();
        }
        worker.shutdown();

        let seen = seen.lock().unwrap();
        let order: Vec<u32> = seen.iter().map(|(n, _)| *n).collect();
        assert_eq!(order, (0..10).collect::<Vec<_>>());
        assert!(seen.iter().all(|(_, name)| name.as_deref() == Some("test-worker")));
    }

    #[test]
    fn drain_handles_queued_work_then_stops() {
        let count = Arc::new(Mutex::new(0u32));
        let count2 = Arc::clone(&count);
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        let mut worker = Worker::spawn(
            "drain-worker",
            |_tx| (count2, gate_rx),
            |(count, gate): &mut (Arc<Mutex<u32>>, std::sync::mpsc::Receiver<()>),
             msg: &'static str| {
                if msg == "a" {
                    let _ = gate.recv();
                }
                *count.lock().unwrap() += 1;
                if msg == "stop" { Flow::Drain } else { Flow::Continue }
            },
        )
        .unwrap();

        worker.post("a").unwrap();
        worker.post("stop").unwrap();
        worker.post("b").unwrap();
        gate_tx.send(()).unwrap();
        worker.shutdown();
        worker.shutdown();

        assert!(!worker.is_running());
        assert!(worker.post("late").is_err());
        // "b" was already queued when the drain started.
        assert_eq!(*count.lock().unwrap(), 3);
    }

    #[test]
    fn state_can_queue_follow_up_work() {
        let total = Arc::new(Mutex::new(0u32));
        let total2 = Arc::clone(&total);
        let mut worker = Worker::spawn(
            "self-post",
            |tx: WorkerSender<u32>| (tx, total2),
            |(tx, total): &mut (WorkerSender<u32>, Arc<Mutex<u32>>), n: u32| {
                *total.lock().unwrap() += n;
                if n > 1 {
                    let _ = tx.post(n - 1);
                }
                Flow::Continue
            },
        )
        .unwrap();

        worker.post(3).unwrap();
        worker.shutdown();
        assert_eq!(*total.lock().unwrap(), 3 + 2 + 1);
    }
}
