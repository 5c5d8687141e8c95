//! The pending-interrupt stack.
//!
//! Pending interrupts are ordered by class (lower class numbers are
//! higher priority) and, within a class, by the order in which they
//! were posted.
use tracing::{event, Level};

use base::collections::pq::ClassQueue;
use base::prelude::*;

/// Whether an interrupt may be taken at `point`.  Between
/// instructions anything may be taken; in the middle of an
/// instruction only those interrupts which are defined to abort it.
fn eligible_at(interrupt: &Interrupt, point: InterruptPoint) -> bool {
    match point {
        InterruptPoint::BetweenInstructions => true,
        InterruptPoint::MidExecution => interrupt.interrupt_point() != InterruptPoint::BetweenInstructions,
        InterruptPoint::IndirectExecute => interrupt.interrupt_point() == InterruptPoint::IndirectExecute,
    }
}

fn may_take(interrupt: &Interrupt, deferrable_enabled: bool, point: InterruptPoint) -> bool {
    (deferrable_enabled || !interrupt.is_deferrable()) && eligible_at(interrupt, point)
}

#[derive(Debug, Default)]
pub struct InterruptStack {
    pending: ClassQueue<Interrupt>,
}

impl InterruptStack {
    #[must_use]
    pub fn new() -> InterruptStack {
        InterruptStack::default()
    }

    /// Post an interrupt.  It is dropped if something of higher
    /// priority is already pending; otherwise it displaces any pending
    /// synchronous interrupts of lower priority.  Returns whether the
    /// interrupt was kept.
    pub fn post(&mut self, interrupt: Interrupt) -> bool {
        let class = interrupt.class();
        if self.pending.any(|pending, _| pending < class) {
            event!(Level::DEBUG, "dropping {interrupt}: a higher priority interrupt is pending");
            return false;
        }
        self.pending
            .discard_if(|pending, p| pending > class && p.synchrony() == Synchrony::Synchronous);
        self.pending.push(class, interrupt);
        true
    }

    /// The highest priority pending interrupt.
    #[must_use]
    pub fn peek(&self) -> Option<&Interrupt> {
        self.pending.peek()
    }

    /// Remove and return the highest priority interrupt which may be
    /// taken now.  Deferrable interrupts stay pending unless
    /// `deferrable_enabled`.
    pub fn pop_eligible(&mut self, deferrable_enabled: bool, point: InterruptPoint) -> Option<Interrupt> {
        let ticket = self
            .pending
            .first_matching(|_, p| may_take(p, deferrable_enabled, point))?;
        self.pending.remove(ticket)
    }

    /// Whether some pending interrupt could be taken now.
    #[must_use]
    pub fn has_eligible(&self, deferrable_enabled: bool, point: InterruptPoint) -> bool {
        self.pending.any(|_, p| may_take(p, deferrable_enabled, point))
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pending interrupts, highest priority first.
    #[must_use]
    pub fn pending(&self) -> Vec<Interrupt> {
        self.pending.in_order().into_iter().copied().collect()
    }

    pub fn dump(&self) {
        if self.is_clear() {
            event!(Level::DEBUG, "no pending interrupts");
        }
        for interrupt in self.pending() {
            event!(Level::DEBUG, "pending: {interrupt}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    const ALL: [Interrupt; 12] = [
        Interrupt::HardwareDefault,
        Interrupt::ReferenceViolation {
            kind: ReferenceViolationKind::ReadAccess,
            fetch: false,
        },
        Interrupt::AddressingException {
            reason: AddressingExceptionReason::Fatal,
            source: LevelBdi::VOID,
        },
        Interrupt::Signal {
            source: SignalSource::Er,
            code: Word36::ZERO,
        },
        Interrupt::InvalidInstruction(InvalidInstructionReason::BadFunctionCode),
        Interrupt::ArithmeticException(ArithmeticExceptionReason::DivideCheck),
        Interrupt::OperationTrap(OperationTrapReason::FixedPointBinaryOverflow),
        Interrupt::Breakpoint,
        Interrupt::QuantumTimer,
        Interrupt::JumpHistoryFull,
        Interrupt::DayClock,
        Interrupt::UpiNormal { source: 1 },
    ];

    #[test]
    fn test_lower_priority_is_dropped() {
        let mut stack = InterruptStack::new();
        assert!(stack.post(Interrupt::storage_limits(true)));
        assert!(!stack.post(Interrupt::QuantumTimer));
        assert_eq!(stack.pending(), vec![Interrupt::storage_limits(true)]);
    }

    #[test]
    fn test_synchronous_lower_priority_is_discarded() {
        let mut stack = InterruptStack::new();
        assert!(stack.post(Interrupt::InvalidInstruction(InvalidInstructionReason::BadProcessorPrivilege)));
        assert!(stack.post(Interrupt::storage_limits(false)));
        assert_eq!(stack.pending(), vec![Interrupt::storage_limits(false)]);
    }

    #[test]
    fn test_asynchronous_lower_priority_survives() {
        let mut stack = InterruptStack::new();
        assert!(stack.post(Interrupt::DayClock));
        assert!(stack.post(Interrupt::QuantumTimer));
        assert_eq!(stack.pending(), vec![Interrupt::QuantumTimer, Interrupt::DayClock]);
        assert_eq!(
            stack.pop_eligible(true, InterruptPoint::BetweenInstructions),
            Some(Interrupt::QuantumTimer)
        );
    }

    #[test]
    fn test_deferrable_interrupts_are_held() {
        let mut stack = InterruptStack::new();
        stack.post(Interrupt::JumpHistoryFull);
        assert!(!stack.has_eligible(false, InterruptPoint::BetweenInstructions));
        assert_eq!(stack.pop_eligible(false, InterruptPoint::BetweenInstructions), None);
        assert_eq!(
            stack.pop_eligible(true, InterruptPoint::BetweenInstructions),
            Some(Interrupt::JumpHistoryFull)
        );
        assert!(stack.is_clear());
    }

    #[test]
    fn test_interrupt_points() {
        let mut stack = InterruptStack::new();
        stack.post(Interrupt::UpiNormal { source: 0 });
        assert_eq!(stack.pop_eligible(true, InterruptPoint::MidExecution), None);
        stack.clear();
        stack.post(Interrupt::storage_limits(false));
        assert_eq!(stack.pop_eligible(true, InterruptPoint::IndirectExecute), None);
        assert!(stack.pop_eligible(true, InterruptPoint::MidExecution).is_some());
    }

    #[proptest]
    fn top_class_never_exceeds_posted_class(#[strategy(proptest::collection::vec(0usize..12, 1..20))] posts: Vec<usize>) {
        let mut stack = InterruptStack::new();
        for n in posts {
            let interrupt = ALL[n];
            stack.post(interrupt);
            let top = stack.peek().map(Interrupt::class);
            assert!(top.is_some_and(|c| c <= interrupt.class()));
        }
    }
}
