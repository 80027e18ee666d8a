use crate::position::Code;

/// Debug-only tracing levels for the parse engine.
///
/// This mirrors the teacher library's own `Log<T>` pattern rather than
/// reaching for an external logging crate: a leveled enum gated behind
/// `#[cfg(debug_assertions)]` and printed with [println!]. Release builds
/// compile every trace call away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Trace {
    #[default]
    None,
    Default,
    Success,
    Result,
    Verbose,
}

impl Trace {
    fn order(&self) -> u8 {
        match self {
            Trace::None => 0,
            Trace::Default => 1,
            Trace::Success => 2,
            Trace::Result => 3,
            Trace::Verbose => 4,
        }
    }

    pub(crate) fn log_enter(&self, rule_name: &str, code: &Code, pos: usize) {
        #[cfg(debug_assertions)]
        if self.order() >= Trace::Verbose.order() {
            println!("[{:?}; enter {}] at {}", self, rule_name, code.obtain_position(pos));
        }
        #[cfg(not(debug_assertions))]
        let _ = (rule_name, code, pos);
    }

    pub(crate) fn log_success(&self, rule_name: &str, code: &Code, start: usize, end: usize) {
        #[cfg(debug_assertions)]
        if self.order() >= Trace::Success.order() {
            println!(
                "[{:?}; success {}] {} .. {}",
                self,
                rule_name,
                code.obtain_position(start),
                code.obtain_position(end)
            );
        }
        #[cfg(not(debug_assertions))]
        let _ = (rule_name, code, start, end);
    }

    pub(crate) fn log_failure(&self, rule_name: &str, code: &Code, pos: usize, expected: &str) {
        #[cfg(debug_assertions)]
        if self.order() >= Trace::Result.order() {
            println!(
                "[{:?}; failed {}] at {}, expected {}",
                self,
                rule_name,
                code.obtain_position(pos),
                expected
            );
        }
        #[cfg(not(debug_assertions))]
        let _ = (rule_name, code, pos, expected);
    }
}
