//! Interrupt-to-main-loop notification queue
//!
//! Producers run in interrupt context and never wait: `post` is a
//! `try_send`. When the channel is full, hardware flags are OR-ed into an
//! overflow word instead of being lost (decoding samples the live level,
//! so merging two trigger sets loses nothing). Application words cannot
//! be merged and are counted as dropped.
//!
//! Hardware notifications are numbered as they are posted and delivered
//! in that order, so the queue can tell the allocator when everything
//! posted before some point has reached the main loop (see [`Backlog`]).

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use portable_atomic::{AtomicU32, Ordering};

use super::{ChannelMask, Notification};
use crate::config::SIGNAL_QUEUE_DEPTH;

/// Progress of hardware notifications through a queue
///
/// Both counters wrap. Every hardware notification numbered below
/// `delivered()` has been handed to the main loop.
pub trait Backlog {
    /// Hardware notifications accepted so far
    fn posted(&self) -> u32;
    /// Hardware notifications handed to the main loop so far
    fn delivered(&self) -> u32;
}

/// No queue: nothing is ever in flight
impl Backlog for () {
    fn posted(&self) -> u32 {
        0
    }

    fn delivered(&self) -> u32 {
        0
    }
}

impl<T: Backlog + ?Sized> Backlog for &T {
    fn posted(&self) -> u32 {
        T::posted(self)
    }

    fn delivered(&self) -> u32 {
        T::delivered(self)
    }
}

#[derive(Clone, Copy)]
struct Queued {
    notification: Notification,
    /// Post number, meaningful for hardware notifications only
    seq: u32,
}

#[derive(Clone, Copy)]
struct Progress {
    posted: u32,
    delivered: u32,
    overflow: u32,
    /// Post number of the last flags merged into `overflow`
    overflow_seq: u32,
}

pub struct SignalQueue<const DEPTH: usize = SIGNAL_QUEUE_DEPTH> {
    channel: Channel<CriticalSectionRawMutex, Queued, DEPTH>,
    progress: Mutex<CriticalSectionRawMutex, Cell<Progress>>,
    merged: AtomicU32,
    dropped: AtomicU32,
}

impl<const DEPTH: usize> SignalQueue<DEPTH> {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
            progress: Mutex::new(Cell::new(Progress {
                posted: 0,
                delivered: 0,
                overflow: 0,
                overflow_seq: 0,
            })),
            merged: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Post a notification without blocking
    ///
    /// Returns the notification back if it had to be discarded. Once flags
    /// sit in the overflow word, later hardware flags join them there so
    /// hardware notifications stay in post order.
    pub fn post(&self, notification: Notification) -> Result<(), Notification> {
        self.progress.lock(|progress| {
            let mut p = progress.get();
            let result = match notification {
                Notification::Hardware(mask) if mask.is_empty() => Ok(()),
                Notification::Hardware(mask) => {
                    let seq = p.posted;
                    p.posted = p.posted.wrapping_add(1);
                    let queued = Queued { notification, seq };
                    if p.overflow != 0 || self.channel.try_send(queued).is_err() {
                        p.overflow |= mask.bits();
                        p.overflow_seq = seq;
                        self.merged.fetch_add(1, Ordering::Relaxed);
                    }
                    Ok(())
                }
                Notification::Application(_) => {
                    let queued = Queued {
                        notification,
                        seq: 0,
                    };
                    self.channel.try_send(queued).map_err(|_| {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        notification
                    })
                }
            };
            progress.set(p);
            result
        })
    }

    /// Wait for the next notification
    pub async fn receive(&self) -> Notification {
        if let Some(notification) = self.try_receive() {
            return notification;
        }
        let queued = self.channel.receive().await;
        self.progress.lock(|progress| {
            let mut p = progress.get();
            Self::note_delivery(&mut p, queued);
            progress.set(p);
        });
        queued.notification
    }

    /// Take the next notification if one is ready
    ///
    /// Queued notifications come first; merged overflow flags follow once
    /// the channel has drained, since they were posted later.
    pub fn try_receive(&self) -> Option<Notification> {
        self.progress.lock(|progress| {
            let mut p = progress.get();
            let notification = if let Ok(queued) = self.channel.try_receive() {
                Self::note_delivery(&mut p, queued);
                Some(queued.notification)
            } else if p.overflow != 0 {
                let mask = ChannelMask::new(p.overflow);
                p.overflow = 0;
                p.delivered = p.overflow_seq.wrapping_add(1);
                Some(Notification::Hardware(mask))
            } else {
                None
            };
            progress.set(p);
            notification
        })
    }

    fn note_delivery(p: &mut Progress, queued: Queued) {
        if let Notification::Hardware(_) = queued.notification {
            p.delivered = queued.seq.wrapping_add(1);
        }
    }

    /// Hardware notifications folded into the overflow word
    pub fn merged(&self) -> u32 {
        self.merged.load(Ordering::Relaxed)
    }

    /// Application notifications discarded on a full queue
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl<const DEPTH: usize> Backlog for SignalQueue<DEPTH> {
    fn posted(&self) -> u32 {
        self.progress.lock(|p| p.get().posted)
    }

    fn delivered(&self) -> u32 {
        self.progress.lock(|p| p.get().delivered)
    }
}

impl<const DEPTH: usize> Default for SignalQueue<DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    fn hw(bits: u32) -> Notification {
        Notification::Hardware(ChannelMask::new(bits))
    }

    #[test]
    fn delivers_in_post_order() {
        let queue = SignalQueue::<4>::new();
        queue.post(hw(0b01)).unwrap();
        queue.post(Notification::Application(7)).unwrap();

        assert_eq!(block_on(queue.receive()), hw(0b01));
        assert_eq!(block_on(queue.receive()), Notification::Application(7));
        assert_eq!(queue.try_receive(), None);
    }

    #[test]
    fn full_queue_merges_hardware_flags() {
        let queue = SignalQueue::<1>::new();
        queue.post(hw(0b0001)).unwrap();
        queue.post(hw(0b0100)).unwrap();
        queue.post(hw(0b1000)).unwrap();

        assert_eq!(queue.merged(), 2);
        assert_eq!(queue.try_receive(), Some(hw(0b0001)));
        assert_eq!(queue.try_receive(), Some(hw(0b1100)));
        assert_eq!(queue.try_receive(), None);
    }

    #[test]
    fn full_queue_drops_application_words() {
        let queue = SignalQueue::<1>::new();
        queue.post(Notification::Application(1)).unwrap();
        assert_eq!(
            queue.post(Notification::Application(2)),
            Err(Notification::Application(2))
        );
        assert_eq!(queue.dropped(), 1);
    }

    #[test]
    fn delivery_count_follows_hardware_posts() {
        let queue = SignalQueue::<2>::new();
        queue.post(hw(0b01)).unwrap();
        queue.post(Notification::Application(5)).unwrap();
        queue.post(hw(0b10)).unwrap();
        queue.post(hw(0b100)).unwrap();
        assert_eq!((queue.posted(), queue.delivered()), (3, 0));

        assert_eq!(queue.try_receive(), Some(hw(0b01)));
        assert_eq!(queue.delivered(), 1);
        assert_eq!(queue.try_receive(), Some(Notification::Application(5)));
        assert_eq!(queue.delivered(), 1);

        // Both later flags went to the overflow word, in order
        assert_eq!(block_on(queue.receive()), hw(0b110));
        assert_eq!(queue.delivered(), 3);
    }

    #[test]
    fn empty_hardware_mask_is_not_counted() {
        let queue = SignalQueue::<2>::new();
        queue.post(hw(0)).unwrap();
        assert_eq!(queue.posted(), 0);
        assert_eq!(queue.try_receive(), None);
    }
}
