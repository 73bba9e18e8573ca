// src/comm.rs

//! Collective communication and the process grid.
//!
//! Every collective here is blocking: all ranks of a group must enter the same
//! sequence of calls, or the group deadlocks.

use crate::error::{Result, SdcError};
use parking_lot::Mutex;
use std::any::Any;
use std::sync::{Arc, Barrier};

/// The collectives the solver needs from a process group.
pub trait Communicator: Sync {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// Replaces `value` on every rank with the value held by `root`.
    fn broadcast<T: Clone + Send + 'static>(&self, root: usize, value: &mut T);

    /// Element-wise sum of `buf` across all ranks, left in `buf` on every rank.
    fn all_reduce_sum(&self, buf: &mut [f64]);
}

/// The trivial group holding only the calling process.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfComm;

impl Communicator for SelfComm {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast<T: Clone + Send + 'static>(&self, _root: usize, _value: &mut T) {}

    fn all_reduce_sum(&self, _buf: &mut [f64]) {}
}

static SELF_COMM: SelfComm = SelfComm;

struct Shared {
    size: usize,
    barrier: Barrier,
    slots: Mutex<Vec<Vec<f64>>>,
    mailbox: Mutex<Option<Box<dyn Any + Send>>>,
}

/// One endpoint of an in-process group whose ranks are threads.
///
/// Reductions sum contributions in rank order, so every rank (and every run)
/// sees bit-identical results.
pub struct ThreadComm {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadComm {
    /// Creates `size` connected endpoints; hand one to each participating thread.
    pub fn group(size: usize) -> Vec<ThreadComm> {
        let shared = Arc::new(Shared {
            size,
            barrier: Barrier::new(size),
            slots: Mutex::new(vec![Vec::new(); size]),
            mailbox: Mutex::new(None),
        });
        (0..size)
            .map(|rank| ThreadComm {
                rank,
                shared: Arc::clone(&shared),
            })
            .collect()
    }
}

impl Communicator for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn broadcast<T: Clone + Send + 'static>(&self, root: usize, value: &mut T) {
        if self.rank == root {
            *self.shared.mailbox.lock() = Some(Box::new(value.clone()));
        }
        self.shared.barrier.wait();
        if self.rank != root {
            let mailbox = self.shared.mailbox.lock();
            match mailbox.as_ref().and_then(|boxed| boxed.downcast_ref::<T>()) {
                Some(received) => *value = received.clone(),
                None => panic!(
                    "rank {} received a broadcast of the wrong type; ranks disagree on collective order",
                    self.rank
                ),
            }
        }
        self.shared.barrier.wait();
    }

    fn all_reduce_sum(&self, buf: &mut [f64]) {
        {
            let mut slots = self.shared.slots.lock();
            slots[self.rank].clear();
            slots[self.rank].extend_from_slice(buf);
        }
        self.shared.barrier.wait();
        {
            let slots = self.shared.slots.lock();
            buf.iter_mut().for_each(|x| *x = 0.0);
            for contribution in slots.iter() {
                for (x, c) in buf.iter_mut().zip(contribution.iter()) {
                    *x += c;
                }
            }
        }
        self.shared.barrier.wait();
    }
}

/// A `height × width` process grid laid over a communicator, ranks assigned
/// column-major. Entry `(i, j)` of a matrix belongs to the rank at grid position
/// `(i mod height, j mod width)`.
pub struct Grid<'c, C: Communicator> {
    comm: &'c C,
    height: usize,
    width: usize,
}

impl Grid<'static, SelfComm> {
    /// The 1×1 grid of the calling process.
    pub fn local() -> Self {
        Grid {
            comm: &SELF_COMM,
            height: 1,
            width: 1,
        }
    }
}

impl<'c, C: Communicator> Grid<'c, C> {
    pub fn new(comm: &'c C, height: usize) -> Result<Self> {
        let size = comm.size();
        if height == 0 || size % height != 0 {
            return Err(SdcError::InvalidArgument {
                arg: "height",
                reason: format!("grid height {} does not divide {} processes", height, size),
            });
        }
        Ok(Grid {
            comm,
            height,
            width: size / height,
        })
    }

    /// The most square grid the communicator size allows.
    pub fn square(comm: &'c C) -> Self {
        let size = comm.size().max(1);
        let mut height = (size as f64).sqrt() as usize;
        while height > 1 && size % height != 0 {
            height -= 1;
        }
        let height = height.max(1);
        Grid {
            comm,
            height,
            width: size / height,
        }
    }

    pub fn comm(&self) -> &'c C {
        self.comm
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn row(&self) -> usize {
        self.rank() % self.height
    }

    pub fn col(&self) -> usize {
        self.rank() / self.height
    }

    pub fn is_root(&self) -> bool {
        self.rank() == 0
    }

    pub fn owns(&self, i: usize, j: usize) -> bool {
        i % self.height == self.row() && j % self.width == self.col()
    }
}
