use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use tracing::warn;

use crate::physics::Vector2D;

static INPUT_LOCK_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn warn_input_lock_poison_once(operation: &'static str) {
    if INPUT_LOCK_POISON_WARNED
        .compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed)
        .is_ok()
    {
        warn!(operation, "input lock poisoned; recovered inner value");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputAction {
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    Jump,
    Quit,
}

const ACTION_COUNT: usize = 6;

impl InputAction {
    const fn index(self) -> usize {
        match self {
            InputAction::MoveUp => 0,
            InputAction::MoveDown => 1,
            InputAction::MoveLeft => 2,
            InputAction::MoveRight => 3,
            InputAction::Jump => 4,
            InputAction::Quit => 5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ActionStates {
    down: [bool; ACTION_COUNT],
}

impl ActionStates {
    pub(crate) fn set(&mut self, action: InputAction, is_down: bool) {
        self.down[action.index()] = is_down;
    }

    pub(crate) fn is_down(&self, action: InputAction) -> bool {
        self.down[action.index()]
    }

    /// Unit steering per axis; opposite keys held together cancel out.
    pub(crate) fn direction(&self) -> Vector2D {
        let axis = |negative: InputAction, positive: InputAction| {
            match (self.is_down(negative), self.is_down(positive)) {
                (true, false) => -1.0,
                (false, true) => 1.0,
                _ => 0.0,
            }
        };
        Vector2D::new(
            axis(InputAction::MoveLeft, InputAction::MoveRight),
            axis(InputAction::MoveDown, InputAction::MoveUp),
        )
    }
}

/// Input as seen by one simulation tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputFrame {
    /// Held steering, each axis in `{-1, 0, 1}`. Scaled by the move force in the simulation.
    pub direction: Vector2D,
    /// A jump press since the previous tick.
    pub jump_requested: bool,
}

/// Last-writer-wins register between the event handler and the simulation tick.
///
/// Writers replace the whole steering vector at once, so a reader never sees one axis from an
/// old write and one from a new write. Jump requests latch until the next [`SharedInput::take`].
#[derive(Clone, Debug, Default)]
pub struct SharedInput {
    frame: Arc<RwLock<InputFrame>>,
}

impl SharedInput {
    pub fn set_direction(&self, direction: Vector2D) {
        self.update("set_direction", |frame| frame.direction = direction);
    }

    pub fn request_jump(&self) {
        self.update("request_jump", |frame| frame.jump_requested = true);
    }

    /// Current frame without consuming the jump request.
    pub fn peek(&self) -> InputFrame {
        match self.frame.read() {
            Ok(guard) => *guard,
            Err(poisoned) => {
                warn_input_lock_poison_once("peek");
                *poisoned.into_inner()
            }
        }
    }

    /// Current frame; the jump request is cleared so it fires on one tick only.
    pub fn take(&self) -> InputFrame {
        let mut taken = InputFrame::default();
        self.update("take", |frame| {
            taken = *frame;
            frame.jump_requested = false;
        });
        taken
    }

    fn update(&self, operation: &'static str, apply: impl FnOnce(&mut InputFrame)) {
        match self.frame.write() {
            Ok(mut guard) => apply(&mut guard),
            Err(poisoned) => {
                warn_input_lock_poison_once(operation);
                let mut guard = poisoned.into_inner();
                apply(&mut guard);
            }
        }
    }
}
