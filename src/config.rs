/// What `release` and `resize` do with a pointer they did not hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReleaseGuard {
    /// Trust the caller. Foreign pointers and double frees are undefined
    /// behavior.
    #[default]
    Unchecked,
    /// Validate every header and tag free blocks, logging and aborting the
    /// process on a foreign pointer or a double free of a pool block.
    Abort,
}

/// Pool settings, fixed when the pool is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub guard: ReleaseGuard,
    /// Overwrite the payload of pool blocks with zeros when they are released.
    pub zero_on_release: bool,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            guard: ReleaseGuard::Unchecked,
            zero_on_release: false,
        }
    }

    pub const fn with_guard(mut self, guard: ReleaseGuard) -> Self {
        self.guard = guard;
        self
    }

    pub const fn with_zero_on_release(mut self, zero: bool) -> Self {
        self.zero_on_release = zero;
        self
    }

    /// Checked settings for debugging a misbehaving caller.
    pub const fn hardened() -> Self {
        Self::new()
            .with_guard(ReleaseGuard::Abort)
            .with_zero_on_release(true)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
