//! FIFO lease pool over a range of IPv4 addresses.
//!
//! An [`IpPool`] enumerates its range up front and hands addresses out in
//! the order they were enumerated; a released address goes back to the
//! end of the line rather than being reused immediately, so a lease that
//! was just returned is not handed to the very next caller. [`Apn`] pairs
//! a pool with the name subscribers attach to it (the Called-Station-Id
//! carried on a Gx CCR-I).
//!
//! # Test
//!
//! ```
//! use ip_pool::IpPool;
//!
//! let pool = IpPool::from_cidr("10.0.0.0/30").unwrap();
//! assert_eq!(pool.available(), 4);
//!
//! let leased = pool.allocate().unwrap();
//! assert_eq!(pool.available(), 3);
//!
//! pool.release(leased);
//! assert_eq!(pool.available(), 4);
//! ```

use std::collections::{HashSet, VecDeque};
use std::net::Ipv4Addr;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

#[derive(Debug)]
pub enum Error {
    InvalidCidr(String),
    PrefixOutOfRange(u8),
    EmptyRange,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCidr(s) => write!(f, "invalid CIDR notation: {s}"),
            Self::PrefixOutOfRange(p) => write!(f, "prefix length out of range: /{p}"),
            Self::EmptyRange => write!(f, "IP range is empty"),
        }
    }
}

/// Thrown by [`IpPool::allocate`] when the pool is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolExhausted;

impl std::error::Error for PoolExhausted {}

impl std::fmt::Display for PoolExhausted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "IP pool exhausted")
    }
}

struct State {
    free: VecDeque<Ipv4Addr>,
    allocated: HashSet<Ipv4Addr>,
}

/// A FIFO pool of leasable IPv4 addresses.
pub struct IpPool {
    state: Mutex<State>,
    released: Condvar,
    capacity: usize,
}

impl IpPool {
    /// Builds a pool enumerating every address in `start..=end` inclusive.
    pub fn from_range(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self, Error> {
        let start_u32 = u32::from(start);
        let end_u32 = u32::from(end);
        if end_u32 < start_u32 {
            return Err(Error::EmptyRange);
        }

        let free: VecDeque<Ipv4Addr> = (start_u32..=end_u32).map(Ipv4Addr::from).collect();
        let capacity = free.len();
        Ok(Self {
            state: Mutex::new(State {
                free,
                allocated: HashSet::new(),
            }),
            released: Condvar::new(),
            capacity,
        })
    }

    /// Builds a pool from CIDR notation, e.g. `"10.0.0.0/21"`. The network
    /// and broadcast addresses are included in the pool, matching the
    /// pragmatic /30-and-smaller test ranges this toolkit runs against.
    pub fn from_cidr(cidr: &str) -> Result<Self, Error> {
        let (addr_str, prefix_str) = cidr
            .split_once('/')
            .ok_or_else(|| Error::InvalidCidr(cidr.to_string()))?;

        let addr: Ipv4Addr = addr_str
            .parse()
            .map_err(|_| Error::InvalidCidr(cidr.to_string()))?;
        let prefix: u8 = prefix_str
            .parse()
            .map_err(|_| Error::InvalidCidr(cidr.to_string()))?;
        if prefix > 32 {
            return Err(Error::PrefixOutOfRange(prefix));
        }

        let mask: u32 = if prefix == 0 {
            0
        } else {
            u32::MAX << (32 - prefix)
        };
        let network = u32::from(addr) & mask;
        let broadcast = network | !mask;

        Self::from_range(Ipv4Addr::from(network), Ipv4Addr::from(broadcast))
    }

    /// Total number of addresses this pool was built with, leased or not.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.state.lock().free.len()
    }

    /// Snapshot of every address currently on lease.
    pub fn allocated(&self) -> HashSet<Ipv4Addr> {
        self.state.lock().allocated.clone()
    }

    /// Leases the next address in FIFO order.
    pub fn allocate(&self) -> Result<Ipv4Addr, PoolExhausted> {
        let mut state = self.state.lock();
        let addr = state.free.pop_front().ok_or(PoolExhausted)?;
        state.allocated.insert(addr);
        Ok(addr)
    }

    /// Like [`Self::allocate`], but waits for a release instead of failing
    /// when the pool is currently exhausted. Returns `PoolExhausted` only
    /// if `timeout` elapses with nothing freed up.
    pub fn allocate_blocking(&self, timeout: Duration) -> Result<Ipv4Addr, PoolExhausted> {
        let mut state = self.state.lock();
        loop {
            if let Some(addr) = state.free.pop_front() {
                state.allocated.insert(addr);
                return Ok(addr);
            }
            let result = self.released.wait_for(&mut state, timeout);
            if result.timed_out() {
                return match state.free.pop_front() {
                    Some(addr) => {
                        state.allocated.insert(addr);
                        Ok(addr)
                    }
                    None => Err(PoolExhausted),
                };
            }
        }
    }

    /// Returns a leased address to the back of the queue. Releasing an
    /// address that isn't currently on lease is a no-op rather than a
    /// panic: the caller (a session being torn down) may race a restart
    /// that already rebuilt the pool, or simply hold a stale address.
    pub fn release(&self, addr: Ipv4Addr) {
        let mut state = self.state.lock();
        if !state.allocated.remove(&addr) {
            return;
        }
        state.free.push_back(addr);
        drop(state);
        self.released.notify_one();
    }
}

/// An access point and the address pool its subscribers draw from.
pub struct Apn {
    pub name: String,
    pub pool: IpPool,
}

impl Apn {
    pub fn new(name: impl Into<String>, pool: IpPool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }

    pub fn from_cidr(name: impl Into<String>, cidr: &str) -> Result<Self, Error> {
        Ok(Self::new(name, IpPool::from_cidr(cidr)?))
    }

    pub fn allocate(&self) -> Result<Ipv4Addr, PoolExhausted> {
        self.pool.allocate()
    }

    pub fn allocate_blocking(&self, timeout: Duration) -> Result<Ipv4Addr, PoolExhausted> {
        self.pool.allocate_blocking(timeout)
    }

    pub fn release(&self, addr: Ipv4Addr) {
        self.pool.release(addr)
    }
}
