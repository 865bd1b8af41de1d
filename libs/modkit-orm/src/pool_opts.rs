//! Pool configuration applied to `SeaORM` connect options.

use sea_orm::ConnectOptions;

use crate::config::PoolCfg;

/// Applies pool settings onto a connection options builder.
pub trait ApplyPoolOpts {
    #[must_use]
    fn apply(self, opts: &PoolCfg) -> Self;
}

impl ApplyPoolOpts for ConnectOptions {
    fn apply(mut self, opts: &PoolCfg) -> Self {
        if let Some(n) = opts.max_conns {
            self.max_connections(n);
        }
        if let Some(n) = opts.min_conns {
            self.min_connections(n);
        }
        if let Some(t) = opts.acquire_timeout {
            self.acquire_timeout(t);
        }
        if let Some(t) = opts.idle_timeout {
            self.idle_timeout(t);
        }
        if let Some(t) = opts.max_lifetime {
            self.max_lifetime(t);
        }
        if opts.test_before_acquire {
            self.test_before_acquire(true);
        }
        self
    }
}
