// Pacing policies answer one question for the consumer core: may a send be
// issued now, and if not immediately, after what delay. Window policies gate
// on the number of requests in flight; the rate policy spaces sends at a
// fixed frequency and exposes adjustment hooks for feedback-driven variants.

// Windows are kept in Q16 so additive increase by 1/cwnd per reply needs no
// floating point.
const UNIT_Q16: u64 = 1 << 16;

/// Decides when the consumer core may issue its next request.
pub trait PacingPolicy {
    /// Delay before the next send, or `None` if sending is currently gated.
    /// A gated policy is re-consulted whenever a reply, NACK, or timeout
    /// changes the in-flight count.
    fn next_send_delay_us(&mut self, outstanding: usize) -> Option<u64>;

    fn adjust_on_data(&mut self) {}
    fn adjust_on_nack(&mut self) {}
    fn adjust_on_timeout(&mut self) {}
}

enum AimdMode {
    UnboundedSlowStart,
    ThresholdSlowStart(u64),
    CongestionAvoidance,
}

/// AIMD congestion window counted in whole interests: slow start until a
/// loss, additive increase afterwards, halve once per window on NACK, reset
/// on timeout. Floor of one interest.
pub struct AimdWindow {
    mode: AimdMode,
    cwnd_q16: u64,
    dropcnt_q16: u64,
    min_q16: u64,
}

impl AimdWindow {
    pub fn new(initial_window: u32) -> Self {
        assert!(
            initial_window >= 1,
            "invalid pacing configuration: initial window must be at least 1"
        );

        Self {
            mode: AimdMode::UnboundedSlowStart,
            cwnd_q16: u64::from(initial_window) << 16,
            dropcnt_q16: 0,
            min_q16: UNIT_Q16,
        }
    }

    pub fn window(&self) -> u32 {
        let cwnd = self.cwnd_q16 >> 16;
        cwnd.try_into().unwrap_or(u32::MAX).max(1)
    }

    fn handle_ack(&mut self) {
        // Window has advanced, subtract from drop counter
        if self.dropcnt_q16 > UNIT_Q16 {
            self.dropcnt_q16 -= UNIT_Q16;
        } else {
            self.dropcnt_q16 = 0;
        }

        match self.mode {
            AimdMode::UnboundedSlowStart => {
                // Double cwnd each RTT
                self.cwnd_q16 = self.cwnd_q16.saturating_add(UNIT_Q16);
            }
            AimdMode::ThresholdSlowStart(ssthresh) => {
                let new_cwnd_q16 = self.cwnd_q16.saturating_add(UNIT_Q16);
                if new_cwnd_q16 >= ssthresh {
                    // Enter congestion avoidance, beginning with ssthresh
                    self.cwnd_q16 = ssthresh;
                    self.mode = AimdMode::CongestionAvoidance;
                } else {
                    self.cwnd_q16 = new_cwnd_q16;
                }
            }
            AimdMode::CongestionAvoidance => {
                // Add 1/cwnd per reply, one unit per RTT overall
                let cwnd_q16 = self.cwnd_q16;
                let cwnd_inv_q16 = (UNIT_Q16 * UNIT_Q16 + cwnd_q16 / 2) / cwnd_q16;
                self.cwnd_q16 = cwnd_q16.saturating_add(cwnd_inv_q16);
            }
        }
    }

    fn handle_timeout(&mut self) {
        let cwnd_q16 = self.cwnd_q16;

        // The pipe has drained; reassess capacity in threshold slow start
        self.cwnd_q16 = self.min_q16;
        self.dropcnt_q16 = 0;
        self.mode = AimdMode::ThresholdSlowStart((cwnd_q16 / 2).max(self.min_q16));
    }

    fn handle_drop(&mut self) {
        // Halve and continue in congestion avoidance, provided we haven't
        // reacted to a drop within the current window
        if self.dropcnt_q16 == 0 {
            let new_cwnd_q16 = (self.cwnd_q16 / 2).max(self.min_q16);
            self.cwnd_q16 = new_cwnd_q16;
            self.dropcnt_q16 = new_cwnd_q16;
            self.mode = AimdMode::CongestionAvoidance;
        }
    }
}

/// Runtime form of the window algorithm selected at setup.
pub enum WindowRule {
    Fixed(u32),
    Aimd(AimdWindow),
}

impl WindowRule {
    fn window(&self) -> u32 {
        match self {
            Self::Fixed(window) => *window,
            Self::Aimd(aimd) => aimd.window(),
        }
    }
}

pub struct WindowPacing {
    rule: WindowRule,
}

impl WindowPacing {
    pub fn new(rule: WindowRule) -> Self {
        if let WindowRule::Fixed(window) = &rule {
            assert!(
                *window >= 1,
                "invalid pacing configuration: window must be at least 1"
            );
        }

        Self { rule }
    }

    pub fn window(&self) -> u32 {
        self.rule.window()
    }
}

impl PacingPolicy for WindowPacing {
    fn next_send_delay_us(&mut self, outstanding: usize) -> Option<u64> {
        if (outstanding as u64) < u64::from(self.rule.window()) {
            Some(0)
        } else {
            None
        }
    }

    fn adjust_on_data(&mut self) {
        if let WindowRule::Aimd(aimd) = &mut self.rule {
            aimd.handle_ack();
        }
    }

    fn adjust_on_nack(&mut self) {
        if let WindowRule::Aimd(aimd) = &mut self.rule {
            aimd.handle_drop();
        }
    }

    fn adjust_on_timeout(&mut self) {
        if let WindowRule::Aimd(aimd) = &mut self.rule {
            aimd.handle_timeout();
        }
    }
}

/// Fixed-frequency pacing: the first send is immediate, each later send
/// follows the previous by one period. The adjustment hooks are deliberate
/// no-ops, the override point for feedback-driven rate variants.
pub struct RatePacing {
    interval_us: u64,
    first_time: bool,
}

impl RatePacing {
    pub fn new(frequency: f64) -> Self {
        assert!(
            frequency > 0.0,
            "invalid pacing configuration: frequency must be positive"
        );

        Self {
            interval_us: (1_000_000.0 / frequency) as u64,
            first_time: true,
        }
    }
}

impl PacingPolicy for RatePacing {
    fn next_send_delay_us(&mut self, _outstanding: usize) -> Option<u64> {
        if self.first_time {
            self.first_time = false;
            Some(0)
        } else {
            Some(self.interval_us)
        }
    }
}

/// Pacing variant chosen once from configuration.
pub enum Pacing {
    Window(WindowPacing),
    Rate(RatePacing),
}

impl PacingPolicy for Pacing {
    fn next_send_delay_us(&mut self, outstanding: usize) -> Option<u64> {
        match self {
            Self::Window(pacing) => pacing.next_send_delay_us(outstanding),
            Self::Rate(pacing) => pacing.next_send_delay_us(outstanding),
        }
    }

    fn adjust_on_data(&mut self) {
        match self {
            Self::Window(pacing) => pacing.adjust_on_data(),
            Self::Rate(pacing) => pacing.adjust_on_data(),
        }
    }

    fn adjust_on_nack(&mut self) {
        match self {
            Self::Window(pacing) => pacing.adjust_on_nack(),
            Self::Rate(pacing) => pacing.adjust_on_nack(),
        }
    }

    fn adjust_on_timeout(&mut self) {
        match self {
            Self::Window(pacing) => pacing.adjust_on_timeout(),
            Self::Rate(pacing) => pacing.adjust_on_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aimd_growth_and_halving() {
        let mut aimd = AimdWindow::new(1);
        assert_eq!(aimd.window(), 1);

        // Slow start: one unit per ack
        for expected in 2..=30 {
            aimd.handle_ack();
            assert_eq!(aimd.window(), expected);
        }

        aimd.handle_drop();
        assert_eq!(aimd.window(), 15);

        // A second drop within the same window is ignored
        aimd.handle_drop();
        assert_eq!(aimd.window(), 15);

        // Congestion avoidance: ~one unit per window of acks
        for _ in 0..16 {
            aimd.handle_ack();
        }
        assert_eq!(aimd.window(), 16);
    }

    #[test]
    fn aimd_timeout_resets() {
        let mut aimd = AimdWindow::new(1);

        for _ in 0..19 {
            aimd.handle_ack();
        }
        assert_eq!(aimd.window(), 20);

        aimd.handle_timeout();
        assert_eq!(aimd.window(), 1);

        // Threshold slow start climbs back to half the old window, then
        // switches to congestion avoidance
        for _ in 0..9 {
            aimd.handle_ack();
        }
        assert_eq!(aimd.window(), 10);

        aimd.handle_ack();
        assert_eq!(aimd.window(), 10);
    }

    #[test]
    fn aimd_floor() {
        let mut aimd = AimdWindow::new(1);

        for _ in 0..10 {
            aimd.handle_timeout();
            aimd.handle_drop();
        }

        assert_eq!(aimd.window(), 1);
    }

    #[test]
    fn window_gates_on_outstanding() {
        let mut pacing = WindowPacing::new(WindowRule::Fixed(4));

        assert_eq!(pacing.next_send_delay_us(0), Some(0));
        assert_eq!(pacing.next_send_delay_us(3), Some(0));
        assert_eq!(pacing.next_send_delay_us(4), None);
        assert_eq!(pacing.next_send_delay_us(100), None);
    }

    #[test]
    fn rate_spacing() {
        let mut pacing = RatePacing::new(20.0);

        // First send immediate, then one per 50ms regardless of flight size
        assert_eq!(pacing.next_send_delay_us(0), Some(0));
        assert_eq!(pacing.next_send_delay_us(5), Some(50_000));
        assert_eq!(pacing.next_send_delay_us(100), Some(50_000));
    }
}
