//! Register model and Instruction Predictor (§4.1).

pub mod predictor;
pub mod registers;

pub use predictor::predict_next_pc;
pub use registers::{Cpsr, InstructionSet, RegisterSnapshot};
