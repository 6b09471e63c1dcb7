pub mod wire;

pub use wire::{read_frame, write_frame};
