use rayon::prelude::*;

use crate::error::ConfigError;

/// Fans one phase of a force pass out over its independent work units.
///
/// Each unit reads only shared immutable inputs and writes only its own
/// output slot. Every method returns after all units have finished, so two
/// consecutive calls are separated by a full barrier.
pub trait Backend: Sync {
    fn name(&self) -> &'static str;

    /// Runs `kernel` for every index in `0..len` and collects the results in index order.
    fn map<T, K>(&self, len: usize, kernel: K) -> Vec<T>
    where
        T: Send,
        K: Fn(usize) -> T + Sync + Send;

    /// Runs `kernel` once per item, handing each call exclusive access to its own slot.
    fn for_each_mut<T, K>(&self, items: &mut [T], kernel: K)
    where
        T: Send,
        K: Fn(usize, &mut T) + Sync + Send;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Sequential;

impl Backend for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn map<T, K>(&self, len: usize, kernel: K) -> Vec<T>
    where
        T: Send,
        K: Fn(usize) -> T + Sync + Send,
    {
        (0..len).map(kernel).collect()
    }

    fn for_each_mut<T, K>(&self, items: &mut [T], kernel: K)
    where
        T: Send,
        K: Fn(usize, &mut T) + Sync + Send,
    {
        for (i, item) in items.iter_mut().enumerate() {
            kernel(i, item);
        }
    }
}

/// Work-stealing dispatch on either the global rayon pool or a dedicated one.
#[derive(Debug, Default)]
pub struct Rayon {
    pool: Option<rayon::ThreadPool>,
}

impl Rayon {
    pub fn new() -> Self {
        Self { pool: None }
    }

    pub fn with_threads(threads: usize) -> Result<Self, ConfigError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("nbody-bins-{i}"))
            .build()?;
        Ok(Self { pool: Some(pool) })
    }

    pub fn threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    fn install<R, OP>(&self, op: OP) -> R
    where
        R: Send,
        OP: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

impl Backend for Rayon {
    fn name(&self) -> &'static str {
        "rayon"
    }

    fn map<T, K>(&self, len: usize, kernel: K) -> Vec<T>
    where
        T: Send,
        K: Fn(usize) -> T + Sync + Send,
    {
        self.install(|| (0..len).into_par_iter().map(kernel).collect())
    }

    fn for_each_mut<T, K>(&self, items: &mut [T], kernel: K)
    where
        T: Send,
        K: Fn(usize, &mut T) + Sync + Send,
    {
        self.install(|| {
            items
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, item)| kernel(i, item))
        })
    }
}
