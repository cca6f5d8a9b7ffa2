//! Machine constants and boot-time configuration.

/// Ticks between two timer interrupts.
pub const TIMER_INTERVAL: u64 = 500;
/// Ticks charged every time interrupts go from disabled to enabled.
pub const KERNEL_TICK: u64 = 10;

/// Configuration of a simulated kernel.
///
/// # Example
/// ```
/// use xux_threads::KernelConfig;
///
/// let config = KernelConfig::default().timer_interval(100);
/// assert_eq!(config.get_timer_interval(), 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    timer_interval: u64,
    kernel_tick: u64,
}

impl KernelConfig {
    pub const fn new() -> Self {
        Self {
            timer_interval: TIMER_INTERVAL,
            kernel_tick: KERNEL_TICK,
        }
    }

    /// Sets the timer interrupt period.
    ///
    /// # Panics
    /// If `ticks` is zero.
    pub fn timer_interval(mut self, ticks: u64) -> Self {
        assert!(ticks > 0, "timer interval must be non-zero");
        self.timer_interval = ticks;
        self
    }

    /// Sets how far the clock advances when interrupts are re-enabled.
    pub fn kernel_tick(mut self, ticks: u64) -> Self {
        self.kernel_tick = ticks;
        self
    }

    pub fn get_timer_interval(&self) -> u64 {
        self.timer_interval
    }

    pub fn get_kernel_tick(&self) -> u64 {
        self.kernel_tick
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self::new()
    }
}
